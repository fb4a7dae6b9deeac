// Upgrades for documents written by older versions
//
// Older files predate sub-categories (no `parentId`), due dates, sub-items and
// explicit ordering. Each step fills what is missing, or replaces a value of the
// wrong type, and leaves everything else untouched, so running the steps on a
// current document is a no-op.

use chrono::NaiveDate;
use serde_json::{Map, Value};
use std::collections::HashMap;
use tracing::{debug, warn};

/// Bring a raw document up to the current shape.
///
/// Returns true if anything was changed. Expects `categories` and `todos` to
/// be arrays; other shapes are left alone.
pub fn upgrade(doc: &mut Value) -> bool {
    let mut changed = false;
    changed |= fill_category_fields(doc);
    changed |= flatten_nested_categories(doc);
    changed |= fill_todo_fields(doc);
    if changed {
        debug!("upgrade: document shape was migrated");
    }
    changed
}

fn objects_mut<'a>(doc: &'a mut Value, key: &str) -> impl Iterator<Item = &'a mut Map<String, Value>> {
    doc.get_mut(key)
        .and_then(Value::as_array_mut)
        .into_iter()
        .flat_map(|items| items.iter_mut())
        .filter_map(Value::as_object_mut)
}

/// Set `key` to `value` unless it already holds something `valid` accepts
fn fill(obj: &mut Map<String, Value>, key: &str, valid: fn(&Value) -> bool, value: Value) -> bool {
    match obj.get(key) {
        Some(current) if valid(current) => return false,
        Some(current) => warn!(field = key, found = %current, replacement = %value, "Replacing ill-typed field"),
        None => {}
    }
    obj.insert(key.to_string(), value);
    true
}

fn is_order(v: &Value) -> bool {
    v.is_i64()
}

fn is_bool(v: &Value) -> bool {
    v.is_boolean()
}

fn is_array(v: &Value) -> bool {
    v.is_array()
}

fn is_optional_str(v: &Value) -> bool {
    v.is_null() || v.is_string()
}

fn is_optional_date(v: &Value) -> bool {
    match v {
        Value::Null => true,
        Value::String(s) => s.parse::<NaiveDate>().is_ok(),
        _ => false,
    }
}

fn fill_category_fields(doc: &mut Value) -> bool {
    let mut changed = false;
    for (index, category) in objects_mut(doc, "categories").enumerate() {
        changed |= fill(category, "parentId", is_optional_str, Value::Null);
        changed |= fill(category, "order", is_order, Value::from(index));
    }
    changed
}

/// Re-root categories whose parent is itself a child, or who point at themselves
fn flatten_nested_categories(doc: &mut Value) -> bool {
    let parents: HashMap<String, Option<String>> = objects_mut(doc, "categories")
        .filter_map(|c| {
            let id = c.get("id")?.as_str()?.to_string();
            let parent = c.get("parentId").and_then(Value::as_str).map(str::to_string);
            Some((id, parent))
        })
        .collect();

    let mut changed = false;
    for category in objects_mut(doc, "categories") {
        let id = category.get("id").and_then(Value::as_str).unwrap_or_default().to_string();
        let Some(parent) = category.get("parentId").and_then(Value::as_str).map(str::to_string) else {
            continue;
        };

        let too_deep = matches!(parents.get(&parent), Some(Some(_)));
        if too_deep || parent == id {
            warn!(category = %id, parent = %parent, "Category nested too deep, moving to root");
            category.insert("parentId".to_string(), Value::Null);
            changed = true;
        }
    }
    changed
}

fn fill_todo_fields(doc: &mut Value) -> bool {
    let mut changed = false;
    let mut per_category: HashMap<String, u64> = HashMap::new();

    for todo in objects_mut(doc, "todos") {
        let category = todo
            .get("categoryId")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        let position = per_category.entry(category).or_insert(0);

        changed |= fill(todo, "completed", is_bool, Value::Bool(false));
        changed |= fill(todo, "completedAt", is_optional_str, Value::Null);
        changed |= fill(todo, "dueDate", is_optional_date, Value::Null);
        changed |= fill(todo, "order", is_order, Value::from(*position));
        changed |= fill(todo, "children", is_array, Value::Array(Vec::new()));
        *position += 1;

        if let Some(children) = todo.get_mut("children").and_then(Value::as_array_mut) {
            for (index, child) in children.iter_mut().filter_map(Value::as_object_mut).enumerate() {
                changed |= fill(child, "completed", is_bool, Value::Bool(false));
                changed |= fill(child, "completedAt", is_optional_str, Value::Null);
                changed |= fill(child, "order", is_order, Value::from(index));
            }
        }
    }
    changed
}
