// Data models for TodoStore

use chrono::{DateTime, NaiveDate, SubsecRound, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Id of the seeded "Work" category
pub const DEFAULT_WORK_ID: &str = "cat-default-1";

/// Id of the seeded "Personal" category
pub const DEFAULT_PERSONAL_ID: &str = "cat-default-2";

/// Where a category sits in the two-level tree.
///
/// Serialized as the nullable `parentId` field: `null` for a root category,
/// the parent's id for a child. A child never has children of its own, so
/// only a `Root` category can appear as someone's parent.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum CategoryParent {
    #[default]
    Root,
    Child(String),
}

impl CategoryParent {
    pub fn id(&self) -> Option<&str> {
        match self {
            CategoryParent::Root => None,
            CategoryParent::Child(id) => Some(id),
        }
    }

    pub fn is_root(&self) -> bool {
        matches!(self, CategoryParent::Root)
    }
}

impl From<Option<String>> for CategoryParent {
    fn from(value: Option<String>) -> Self {
        match value {
            Some(id) => CategoryParent::Child(id),
            None => CategoryParent::Root,
        }
    }
}

impl Serialize for CategoryParent {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.id().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for CategoryParent {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Option::<String>::deserialize(deserializer).map(CategoryParent::from)
    }
}

/// A named bucket for todos
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Category {
    pub id: String,
    pub name: String,
    pub order: i64,
    #[serde(rename = "parentId")]
    pub parent: CategoryParent,
}

impl Category {
    pub fn parent_id(&self) -> Option<&str> {
        self.parent.id()
    }

    pub fn is_root(&self) -> bool {
        self.parent.is_root()
    }

    /// Whether a new category may be created underneath this one
    pub fn can_parent(&self) -> bool {
        self.parent.is_root()
    }

    pub fn is_child_of(&self, parent_id: &str) -> bool {
        self.parent_id() == Some(parent_id)
    }
}

/// A root-level task, owned by a category
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Todo {
    pub id: String,
    pub category_id: String,
    pub title: String,
    pub completed: bool,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub due_date: Option<NaiveDate>,
    pub order: i64,
    pub children: Vec<SubTodo>,
}

/// A leaf task owned by exactly one root todo
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubTodo {
    pub id: String,
    pub title: String,
    pub completed: bool,
    pub completed_at: Option<DateTime<Utc>>,
    pub order: i64,
}

/// The unit of persistence: every mutation rewrites the whole document
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StoreDocument {
    pub categories: Vec<Category>,
    pub todos: Vec<Todo>,
}

impl StoreDocument {
    /// The document a fresh install starts with: "Work" and "Personal", no todos
    pub fn with_defaults() -> Self {
        Self {
            categories: vec![
                Category {
                    id: DEFAULT_WORK_ID.to_string(),
                    name: "Work".to_string(),
                    order: 0,
                    parent: CategoryParent::Root,
                },
                Category {
                    id: DEFAULT_PERSONAL_ID.to_string(),
                    name: "Personal".to_string(),
                    order: 1,
                    parent: CategoryParent::Root,
                },
            ],
            todos: Vec::new(),
        }
    }

    pub fn category(&self, id: &str) -> Option<&Category> {
        self.categories.iter().find(|c| c.id == id)
    }

    pub fn todo(&self, id: &str) -> Option<&Todo> {
        self.todos.iter().find(|t| t.id == id)
    }

    /// The category's id followed by the ids of its direct children.
    ///
    /// The id is returned even if no such category exists.
    pub fn scope_ids(&self, category_id: &str) -> Vec<String> {
        let mut ids = vec![category_id.to_string()];
        ids.extend(
            self.categories
                .iter()
                .filter(|c| c.is_child_of(category_id))
                .map(|c| c.id.clone()),
        );
        ids
    }
}

/// Result of adding a todo: a root todo, or a sub-item when a parent was given
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AddedTodo {
    Todo(Todo),
    Sub(SubTodo),
}

/// Partial update for a todo or sub-item.
///
/// `due_date` is tri-state: absent leaves the date alone, `null` clears it.
/// `createdAt` and `completedAt` are never taken from a patch; `completedAt`
/// follows `completed`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TodoPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed: Option<bool>,
    #[serde(default, deserialize_with = "present_or_null", skip_serializing_if = "Option::is_none")]
    pub due_date: Option<Option<NaiveDate>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub order: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category_id: Option<String>,
}

impl TodoPatch {
    pub fn is_empty(&self) -> bool {
        self == &TodoPatch::default()
    }
}

fn present_or_null<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

/// Which sibling list an order update applies to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderKind {
    Categories,
    Todos,
}

impl fmt::Display for OrderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OrderKind::Categories => write!(f, "categories"),
            OrderKind::Todos => write!(f, "todos"),
        }
    }
}

impl FromStr for OrderKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "categories" => Ok(OrderKind::Categories),
            "todos" => Ok(OrderKind::Todos),
            other => Err(format!("unknown order kind: {} (expected categories or todos)", other)),
        }
    }
}

/// One `(id, order)` pair of a reorder request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderItem {
    pub id: String,
    pub order: i64,
}

impl FromStr for OrderItem {
    type Err = String;

    /// Parses `id=order`
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (id, order) = s
            .rsplit_once('=')
            .ok_or_else(|| format!("expected id=order, got: {}", s))?;
        if id.is_empty() {
            return Err(format!("missing id in: {}", s));
        }
        let order = order
            .trim()
            .parse::<i64>()
            .map_err(|e| format!("invalid order in {}: {}", s, e))?;
        Ok(OrderItem {
            id: id.to_string(),
            order,
        })
    }
}

/// Generate a fresh id with the given prefix (`cat`, `todo`, `sub`)
pub fn new_id(prefix: &str) -> String {
    format!("{}-{}", prefix, Uuid::now_v7())
}

/// Current time at millisecond precision
pub fn now() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(3)
}

/// Helper function to get current timestamp in milliseconds
pub fn now_ms() -> i64 {
    Utc::now().timestamp_millis()
}
