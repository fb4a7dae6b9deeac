// Shared behavior for stored items

use crate::models::{Category, OrderItem, SubTodo, Todo};
use chrono::{DateTime, Utc};
use tracing::debug;

/// An item that lives in an ordered sibling list
pub trait Ordered {
    /// Unique identifier for this item
    fn id(&self) -> &str;

    /// Sort key among siblings; not an identity
    fn order(&self) -> i64;

    fn set_order(&mut self, order: i64);

    /// Name of the item kind, used in log fields
    fn kind() -> &'static str
    where
        Self: Sized;
}

/// An item with a `completed` flag paired with a `completedAt` stamp
pub trait Completable {
    fn completion_mut(&mut self) -> (&mut bool, &mut Option<DateTime<Utc>>);

    /// Set the flag and keep the stamp in step with it.
    ///
    /// Completing stamps `now` only when no stamp exists yet; reopening
    /// always clears the stamp.
    fn set_completed(&mut self, completed: bool, now: DateTime<Utc>) {
        let (flag, at) = self.completion_mut();
        *flag = completed;
        if !completed {
            *at = None;
        } else if at.is_none() {
            *at = Some(now);
        }
    }
}

/// Apply `(id, order)` pairs to the first item matching each id.
///
/// Ids that don't resolve are skipped. Returns how many pairs matched.
pub fn apply_order<T: Ordered>(items: &mut [T], updates: &[OrderItem]) -> usize {
    let mut matched = 0;
    for update in updates {
        if let Some(item) = items.iter_mut().find(|i| i.id() == update.id) {
            item.set_order(update.order);
            matched += 1;
        }
    }
    if matched < updates.len() {
        debug!(
            kind = T::kind(),
            requested = updates.len(),
            matched,
            "apply_order: skipped unknown ids"
        );
    }
    matched
}

/// Stable sort by order; ties keep insertion order
pub fn sort_by_order<T: Ordered>(items: &mut [&T]) {
    items.sort_by_key(|i| i.order());
}

impl Ordered for Category {
    fn id(&self) -> &str {
        &self.id
    }

    fn order(&self) -> i64 {
        self.order
    }

    fn set_order(&mut self, order: i64) {
        self.order = order;
    }

    fn kind() -> &'static str {
        "category"
    }
}

impl Ordered for Todo {
    fn id(&self) -> &str {
        &self.id
    }

    fn order(&self) -> i64 {
        self.order
    }

    fn set_order(&mut self, order: i64) {
        self.order = order;
    }

    fn kind() -> &'static str {
        "todo"
    }
}

impl Ordered for SubTodo {
    fn id(&self) -> &str {
        &self.id
    }

    fn order(&self) -> i64 {
        self.order
    }

    fn set_order(&mut self, order: i64) {
        self.order = order;
    }

    fn kind() -> &'static str {
        "subtodo"
    }
}

impl Completable for Todo {
    fn completion_mut(&mut self) -> (&mut bool, &mut Option<DateTime<Utc>>) {
        (&mut self.completed, &mut self.completed_at)
    }
}

impl Completable for SubTodo {
    fn completion_mut(&mut self) -> (&mut bool, &mut Option<DateTime<Utc>>) {
        (&mut self.completed, &mut self.completed_at)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn sub(id: &str, order: i64) -> SubTodo {
        SubTodo {
            id: id.to_string(),
            title: id.to_uppercase(),
            completed: false,
            completed_at: None,
            order,
        }
    }

    #[test]
    fn test_set_completed_stamps_once() {
        let first = Utc.with_ymd_and_hms(2025, 1, 1, 12, 0, 0).unwrap();
        let later = Utc.with_ymd_and_hms(2025, 1, 2, 12, 0, 0).unwrap();
        let mut item = sub("a", 0);

        item.set_completed(true, first);
        assert!(item.completed);
        assert_eq!(item.completed_at, Some(first));

        // Completing again keeps the original stamp
        item.set_completed(true, later);
        assert_eq!(item.completed_at, Some(first));

        item.set_completed(false, later);
        assert!(!item.completed);
        assert_eq!(item.completed_at, None);
    }

    #[test]
    fn test_apply_order_skips_unknown_ids() {
        let mut items = vec![sub("a", 0), sub("b", 1)];
        let updates = vec![
            OrderItem {
                id: "b".to_string(),
                order: 0,
            },
            OrderItem {
                id: "ghost".to_string(),
                order: 7,
            },
            OrderItem {
                id: "a".to_string(),
                order: 1,
            },
        ];

        assert_eq!(apply_order(&mut items, &updates), 2);
        assert_eq!(items[0].order, 1);
        assert_eq!(items[1].order, 0);
    }

    #[test]
    fn test_sort_by_order_is_stable() {
        let items = [sub("a", 2), sub("b", 1), sub("c", 1)];
        let mut refs: Vec<&SubTodo> = items.iter().collect();
        sort_by_order(&mut refs);
        let ids: Vec<&str> = refs.iter().map(|s| s.id.as_str()).collect();
        assert_eq!(ids, vec!["b", "c", "a"]);
    }

    #[test]
    fn test_kind_names() {
        assert_eq!(Category::kind(), "category");
        assert_eq!(Todo::kind(), "todo");
        assert_eq!(SubTodo::kind(), "subtodo");
    }
}
