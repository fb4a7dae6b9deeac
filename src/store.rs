// Category/todo store persisted as a single JSON document

use crate::models::{
    AddedTodo, Category, CategoryParent, OrderItem, OrderKind, StoreDocument, SubTodo, Todo, TodoPatch, new_id, now,
};
use crate::persist::{self, LoadOutcome};
use crate::record::{Completable, apply_order};
use eyre::{Result, eyre};
use std::path::{Path, PathBuf};
use tracing::{debug, error, info, warn};

/// In-memory category/todo tree backed by one JSON file.
///
/// Every successful mutation rewrites the whole file before returning. Lookups
/// that miss return `Ok(None)` / `Ok(false)` and leave the document untouched;
/// `Err` means the write failed, in which case the in-memory change stays
/// applied and the file is behind until the next successful write.
pub struct Store {
    path: PathBuf,
    doc: StoreDocument,
    /// Set when the file on disk had to be replaced but couldn't be backed up.
    /// Writes are refused so the original is never overwritten.
    hold_writes: bool,
}

impl Store {
    /// Open the store backed by `path`.
    ///
    /// A missing file is seeded with the default document. A file that can't
    /// be decoded is copied to a timestamped backup and replaced by the
    /// default document; records that individually fail to decode are skipped
    /// the same way, after a backup. If the backup can't be made the file is
    /// left alone and the store works in memory only. Opening never fails.
    pub fn open<P: AsRef<Path>>(path: P) -> Self {
        let path = path.as_ref().to_path_buf();
        let mut hold_writes = false;

        let doc = match persist::read_document(&path) {
            LoadOutcome::Loaded {
                document,
                migrated,
                dropped,
            } => {
                info!(
                    file = ?path,
                    categories = document.categories.len(),
                    todos = document.todos.len(),
                    "Loaded store document"
                );
                if dropped > 0 {
                    warn!(file = ?path, dropped, "Skipped records that could not be decoded");
                    hold_writes = !Self::preserve(&path);
                }
                if migrated {
                    info!(file = ?path, "Upgraded older document shape");
                }
                if (migrated || dropped > 0) && !hold_writes {
                    Self::write_or_warn(&path, &document);
                }
                document
            }
            LoadOutcome::Missing => {
                info!(file = ?path, "No data file, creating default document");
                let document = StoreDocument::with_defaults();
                Self::write_or_warn(&path, &document);
                document
            }
            LoadOutcome::Corrupt(reason) => {
                warn!(file = ?path, reason = %reason, "Data file unusable, falling back to defaults");
                let document = StoreDocument::with_defaults();
                hold_writes = !Self::preserve(&path);
                if !hold_writes {
                    Self::write_or_warn(&path, &document);
                }
                document
            }
        };

        Self { path, doc, hold_writes }
    }

    /// Copy the current file aside; false if it couldn't be preserved
    fn preserve(path: &Path) -> bool {
        match persist::backup_corrupt(path) {
            Ok(_) => true,
            Err(e) => {
                error!(file = ?path, error = ?e, "Failed to back up data file, leaving it untouched");
                false
            }
        }
    }

    fn write_or_warn(path: &Path, document: &StoreDocument) {
        if let Err(e) = persist::write_document(path, document) {
            error!(file = ?path, error = ?e, "Failed to write data file, continuing in memory");
        }
    }

    /// Get the path of the backing file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Borrow the current document
    pub fn document(&self) -> &StoreDocument {
        &self.doc
    }

    fn persist(&self) -> Result<()> {
        if self.hold_writes {
            return Err(eyre!(
                "Not overwriting {}: it could not be backed up",
                self.path.display()
            ));
        }
        persist::write_document(&self.path, &self.doc)
    }

    // ========================================================================
    // Whole-document API
    // ========================================================================

    /// Copy of the current document
    pub fn get_data(&self) -> StoreDocument {
        self.doc.clone()
    }

    /// Replace the whole document and persist it
    pub fn save_data(&mut self, document: StoreDocument) -> Result<()> {
        debug!(
            categories = document.categories.len(),
            todos = document.todos.len(),
            "save_data: called"
        );
        self.doc = document;
        self.persist()
    }

    // ========================================================================
    // Categories
    // ========================================================================

    /// Add a category at the end of its sibling group.
    ///
    /// Returns `None` if `parent_id` doesn't resolve or names a category that
    /// is itself a child.
    pub fn add_category(&mut self, name: &str, parent_id: Option<&str>) -> Result<Option<Category>> {
        let parent = match parent_id.filter(|p| !p.is_empty()) {
            None => CategoryParent::Root,
            Some(pid) => {
                let Some(parent) = self.doc.category(pid) else {
                    debug!(parent_id = pid, "add_category: parent not found");
                    return Ok(None);
                };
                if !parent.can_parent() {
                    debug!(parent_id = pid, "add_category: parent is already a child category");
                    return Ok(None);
                }
                CategoryParent::Child(pid.to_string())
            }
        };

        let order = self.doc.categories.iter().filter(|c| c.parent == parent).count() as i64;
        let category = Category {
            id: new_id("cat"),
            name: name.to_string(),
            order,
            parent,
        };

        debug!(id = %category.id, order, "add_category: adding");
        self.doc.categories.push(category.clone());
        self.persist()?;
        Ok(Some(category))
    }

    /// Delete a category, its direct children, and every todo filed under them
    pub fn delete_category(&mut self, id: &str) -> Result<bool> {
        if self.doc.category(id).is_none() {
            return Ok(false);
        }

        let doomed = self.doc.scope_ids(id);
        let categories_before = self.doc.categories.len();
        let todos_before = self.doc.todos.len();

        self.doc.categories.retain(|c| !doomed.contains(&c.id));
        self.doc.todos.retain(|t| !doomed.contains(&t.category_id));

        info!(
            id,
            categories_removed = categories_before - self.doc.categories.len(),
            todos_removed = todos_before - self.doc.todos.len(),
            "Deleted category"
        );
        self.persist()?;
        Ok(true)
    }

    /// Rename a category in place
    pub fn update_category(&mut self, id: &str, name: &str) -> Result<bool> {
        let Some(category) = self.doc.categories.iter_mut().find(|c| c.id == id) else {
            return Ok(false);
        };
        category.name = name.to_string();
        self.persist()?;
        Ok(true)
    }

    /// Ids of the category and its direct children.
    ///
    /// The given id is always first, whether or not it exists.
    pub fn get_category_with_children_ids(&self, category_id: &str) -> Vec<String> {
        self.doc.scope_ids(category_id)
    }

    // ========================================================================
    // Todos
    // ========================================================================

    /// Add a root todo to `category_id`, or a sub-item under `parent_id`.
    ///
    /// The category is not checked; a todo may reference a category that
    /// doesn't exist. Returns `None` only when `parent_id` doesn't resolve to
    /// a root todo.
    pub fn add_todo(&mut self, category_id: &str, title: &str, parent_id: Option<&str>) -> Result<Option<AddedTodo>> {
        if let Some(pid) = parent_id.filter(|p| !p.is_empty()) {
            let Some(parent) = self.doc.todos.iter_mut().find(|t| t.id == pid) else {
                debug!(parent_id = pid, "add_todo: parent todo not found");
                return Ok(None);
            };

            let sub = SubTodo {
                id: new_id("sub"),
                title: title.to_string(),
                completed: false,
                completed_at: None,
                order: parent.children.len() as i64,
            };
            parent.children.push(sub.clone());
            self.persist()?;
            return Ok(Some(AddedTodo::Sub(sub)));
        }

        let order = self.doc.todos.iter().filter(|t| t.category_id == category_id).count() as i64;
        let todo = Todo {
            id: new_id("todo"),
            category_id: category_id.to_string(),
            title: title.to_string(),
            completed: false,
            created_at: now(),
            completed_at: None,
            due_date: None,
            order,
            children: Vec::new(),
        };

        if self.doc.category(category_id).is_none() {
            warn!(category_id, "add_todo: category does not exist, adding anyway");
        }

        self.doc.todos.push(todo.clone());
        self.persist()?;
        Ok(Some(AddedTodo::Todo(todo)))
    }

    /// Merge a partial update into the root todo or sub-item with this id.
    ///
    /// Root todos are searched first. `completedAt` is stamped when the update
    /// completes an item that has no stamp, and cleared when it reopens one.
    pub fn update_todo(&mut self, id: &str, patch: &TodoPatch) -> Result<bool> {
        let stamp = now();

        if let Some(todo) = self.doc.todos.iter_mut().find(|t| t.id == id) {
            if let Some(title) = &patch.title {
                todo.title = title.clone();
            }
            if let Some(due_date) = patch.due_date {
                todo.due_date = due_date;
            }
            if let Some(order) = patch.order {
                todo.order = order;
            }
            if let Some(category_id) = &patch.category_id {
                todo.category_id = category_id.clone();
            }
            if let Some(completed) = patch.completed {
                todo.set_completed(completed, stamp);
            }
            self.persist()?;
            return Ok(true);
        }

        let sub = self
            .doc
            .todos
            .iter_mut()
            .flat_map(|t| t.children.iter_mut())
            .find(|s| s.id == id);

        let Some(sub) = sub else {
            return Ok(false);
        };

        if patch.due_date.is_some() || patch.category_id.is_some() {
            debug!(id, "update_todo: ignoring root-only fields for sub-item");
        }
        if let Some(title) = &patch.title {
            sub.title = title.clone();
        }
        if let Some(order) = patch.order {
            sub.order = order;
        }
        if let Some(completed) = patch.completed {
            sub.set_completed(completed, stamp);
        }
        self.persist()?;
        Ok(true)
    }

    /// Delete a root todo (with its sub-items), or a single sub-item
    pub fn delete_todo(&mut self, id: &str) -> Result<bool> {
        if let Some(index) = self.doc.todos.iter().position(|t| t.id == id) {
            self.doc.todos.remove(index);
            self.persist()?;
            return Ok(true);
        }

        let removed = self.doc.todos.iter_mut().find_map(|parent| {
            let index = parent.children.iter().position(|s| s.id == id)?;
            Some(parent.children.remove(index))
        });

        match removed {
            Some(_) => {
                self.persist()?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Move a root todo to the end of another category
    pub fn move_todo_to_category(&mut self, todo_id: &str, new_category_id: &str) -> Result<bool> {
        let order = self
            .doc
            .todos
            .iter()
            .filter(|t| t.category_id == new_category_id && t.id != todo_id)
            .count() as i64;

        let Some(todo) = self.doc.todos.iter_mut().find(|t| t.id == todo_id) else {
            return Ok(false);
        };

        todo.category_id = new_category_id.to_string();
        todo.order = order;
        debug!(todo_id, new_category_id, order, "move_todo_to_category: moved");
        self.persist()?;
        Ok(true)
    }

    /// Apply `(id, order)` pairs to categories or root todos.
    ///
    /// Unknown ids are skipped and the document is persisted regardless.
    /// Returns how many pairs matched.
    pub fn update_order(&mut self, kind: OrderKind, items: &[OrderItem]) -> Result<usize> {
        let matched = match kind {
            OrderKind::Categories => apply_order(&mut self.doc.categories, items),
            OrderKind::Todos => apply_order(&mut self.doc.todos, items),
        };

        self.persist()?;
        Ok(matched)
    }
}
