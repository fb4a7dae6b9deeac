// Selecting which todos a list shows

use crate::models::{StoreDocument, Todo};
use std::str::FromStr;

/// Id the UI uses for the "all open todos" smart list
pub const SMART_ALL: &str = "__all__";

/// Id the UI uses for the "completed todos" smart list
pub const SMART_COMPLETED: &str = "__completed__";

/// Which root todos a list shows
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum TodoFilter {
    /// Every open root todo, regardless of category
    #[default]
    All,
    /// Every completed root todo
    Completed,
    /// Todos of a category and its direct child categories, open or not
    Category(String),
}

impl TodoFilter {
    /// Root todos of `doc` this filter selects, in document order
    pub fn apply<'a>(&self, doc: &'a StoreDocument) -> Vec<&'a Todo> {
        match self {
            TodoFilter::All => doc.todos.iter().filter(|t| !t.completed).collect(),
            TodoFilter::Completed => doc.todos.iter().filter(|t| t.completed).collect(),
            TodoFilter::Category(id) => {
                let scope = doc.scope_ids(id);
                doc.todos.iter().filter(|t| scope.contains(&t.category_id)).collect()
            }
        }
    }

    /// Whether this is a computed list rather than a stored category
    pub fn is_smart(&self) -> bool {
        !matches!(self, TodoFilter::Category(_))
    }

    /// Category a new todo added while this list is showing should go to.
    ///
    /// Smart lists fall back to the first category in the document.
    pub fn target_category<'a>(&'a self, doc: &'a StoreDocument) -> Option<&'a str> {
        match self {
            TodoFilter::Category(id) => Some(id),
            _ => doc.categories.first().map(|c| c.id.as_str()),
        }
    }
}

impl FromStr for TodoFilter {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "" => Err("empty list name".to_string()),
            "all" | SMART_ALL => Ok(TodoFilter::All),
            "completed" | SMART_COMPLETED => Ok(TodoFilter::Completed),
            id => Ok(TodoFilter::Category(id.to_string())),
        }
    }
}

impl std::fmt::Display for TodoFilter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TodoFilter::All => write!(f, "{}", SMART_ALL),
            TodoFilter::Completed => write!(f, "{}", SMART_COMPLETED),
            TodoFilter::Category(id) => write!(f, "{}", id),
        }
    }
}
