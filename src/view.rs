// Derived views over a document: sorting, counts, due-date grouping

use crate::models::{Category, StoreDocument, Todo};
use crate::record::sort_by_order;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap};
use std::str::FromStr;

/// How a todo list is ordered
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SortType {
    #[serde(rename = "createdAt-desc")]
    CreatedDesc,
    #[serde(rename = "createdAt-asc")]
    CreatedAsc,
    #[serde(rename = "title")]
    Title,
    /// Open todos first, each group by order
    #[serde(rename = "completed")]
    Completed,
    /// The user's drag-and-drop order
    #[default]
    #[serde(rename = "custom")]
    Custom,
}

impl SortType {
    pub fn as_str(&self) -> &'static str {
        match self {
            SortType::CreatedDesc => "createdAt-desc",
            SortType::CreatedAsc => "createdAt-asc",
            SortType::Title => "title",
            SortType::Completed => "completed",
            SortType::Custom => "custom",
        }
    }
}

impl FromStr for SortType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "createdAt-desc" | "newest" => Ok(SortType::CreatedDesc),
            "createdAt-asc" | "oldest" => Ok(SortType::CreatedAsc),
            "title" => Ok(SortType::Title),
            "completed" => Ok(SortType::Completed),
            "custom" => Ok(SortType::Custom),
            other => Err(format!("unknown sort: {}", other)),
        }
    }
}

impl std::fmt::Display for SortType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

fn compare_titles(a: &str, b: &str) -> Ordering {
    a.to_lowercase().cmp(&b.to_lowercase()).then_with(|| a.cmp(b))
}

/// Sort todos; all sorts are stable so ties keep their incoming order
pub fn sort_todos<'a>(mut todos: Vec<&'a Todo>, sort: SortType) -> Vec<&'a Todo> {
    match sort {
        SortType::CreatedDesc => todos.sort_by(|a, b| b.created_at.cmp(&a.created_at)),
        SortType::CreatedAsc => todos.sort_by_key(|t| t.created_at),
        SortType::Title => todos.sort_by(|a, b| compare_titles(&a.title, &b.title)),
        SortType::Completed => todos.sort_by_key(|t| (t.completed, t.order)),
        SortType::Custom => sort_by_order(&mut todos),
    }
    todos
}

/// A root category with its children, both in display order
#[derive(Debug)]
pub struct CategoryNode<'a> {
    pub category: &'a Category,
    pub children: Vec<&'a Category>,
}

/// Categories as a two-level tree in display order.
///
/// Children whose parent doesn't exist are shown as roots.
pub fn category_tree(doc: &StoreDocument) -> Vec<CategoryNode<'_>> {
    let mut roots: Vec<&Category> = doc
        .categories
        .iter()
        .filter(|c| match c.parent_id() {
            None => true,
            Some(pid) => doc.category(pid).is_none(),
        })
        .collect();
    sort_by_order(&mut roots);

    roots
        .into_iter()
        .map(|category| {
            let mut children: Vec<&Category> = doc.categories.iter().filter(|c| c.is_child_of(&category.id)).collect();
            sort_by_order(&mut children);
            CategoryNode { category, children }
        })
        .collect()
}

/// Badge numbers for the sidebar
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TodoCounts {
    /// Open root todos filed directly under each category
    pub per_category: HashMap<String, usize>,
    pub open: usize,
    pub completed: usize,
}

pub fn todo_counts(doc: &StoreDocument) -> TodoCounts {
    let mut counts = TodoCounts {
        per_category: doc.categories.iter().map(|c| (c.id.clone(), 0)).collect(),
        ..Default::default()
    };

    for todo in &doc.todos {
        if todo.completed {
            counts.completed += 1;
            continue;
        }
        counts.open += 1;
        if let Some(n) = counts.per_category.get_mut(&todo.category_id) {
            *n += 1;
        }
    }
    counts
}

/// Open root todos grouped by due date relative to `today`
#[derive(Debug, Default)]
pub struct Agenda<'a> {
    pub overdue: Vec<&'a Todo>,
    pub today: Vec<&'a Todo>,
    pub upcoming: BTreeMap<NaiveDate, Vec<&'a Todo>>,
    pub undated: Vec<&'a Todo>,
}

impl Agenda<'_> {
    pub fn is_empty(&self) -> bool {
        self.overdue.is_empty() && self.today.is_empty() && self.upcoming.is_empty() && self.undated.is_empty()
    }
}

/// Group open todos by due date; each group is in custom order, overdue
/// todos oldest date first
pub fn agenda(doc: &StoreDocument, today: NaiveDate) -> Agenda<'_> {
    let open = sort_todos(doc.todos.iter().filter(|t| !t.completed).collect(), SortType::Custom);

    let mut agenda = Agenda::default();
    for todo in open {
        match todo.due_date {
            None => agenda.undated.push(todo),
            Some(due) if due < today => agenda.overdue.push(todo),
            Some(due) if due == today => agenda.today.push(todo),
            Some(due) => agenda.upcoming.entry(due).or_default().push(todo),
        }
    }
    agenda.overdue.sort_by_key(|t| t.due_date);
    agenda
}
