// TodoStore - categorized to-do list persisted as a single JSON document

pub mod api;
pub mod config;
pub mod filter;
pub mod migrate;
pub mod models;
pub mod persist;
pub mod record;
pub mod store;
pub mod view;

// Re-export main types for convenience
pub use api::{Request, Response, SharedStore, dispatch};
pub use config::Config;
pub use filter::TodoFilter;
pub use models::{
    AddedTodo, Category, CategoryParent, OrderItem, OrderKind, StoreDocument, SubTodo, Todo, TodoPatch, now, now_ms,
};
pub use record::{Completable, Ordered};
pub use store::Store;
pub use view::SortType;
