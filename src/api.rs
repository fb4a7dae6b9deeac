// Request/response contract between the UI process and the store

use crate::models::{OrderItem, OrderKind, StoreDocument, TodoPatch};
use crate::store::Store;
use eyre::Result;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{debug, error, warn};

/// One call into the store.
///
/// On the wire: `{"method": "addTodo", "categoryId": "...", "title": "..."}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "method", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum Request {
    GetData,
    SaveData {
        data: StoreDocument,
    },
    AddCategory {
        name: String,
        #[serde(default)]
        parent_id: Option<String>,
    },
    DeleteCategory {
        id: String,
    },
    UpdateCategory {
        id: String,
        name: String,
    },
    AddTodo {
        category_id: String,
        title: String,
        #[serde(default)]
        parent_id: Option<String>,
    },
    UpdateTodo {
        id: String,
        #[serde(default)]
        updates: TodoPatch,
    },
    DeleteTodo {
        id: String,
    },
    UpdateOrder {
        kind: OrderKind,
        items: Vec<OrderItem>,
    },
    MoveTodoToCategory {
        todo_id: String,
        new_category_id: String,
    },
    GetCategoryWithChildrenIds {
        category_id: String,
    },
}

impl Request {
    /// Wire name of the method
    pub fn method(&self) -> &'static str {
        match self {
            Request::GetData => "getData",
            Request::SaveData { .. } => "saveData",
            Request::AddCategory { .. } => "addCategory",
            Request::DeleteCategory { .. } => "deleteCategory",
            Request::UpdateCategory { .. } => "updateCategory",
            Request::AddTodo { .. } => "addTodo",
            Request::UpdateTodo { .. } => "updateTodo",
            Request::DeleteTodo { .. } => "deleteTodo",
            Request::UpdateOrder { .. } => "updateOrder",
            Request::MoveTodoToCategory { .. } => "moveTodoToCategory",
            Request::GetCategoryWithChildrenIds { .. } => "getCategoryWithChildrenIds",
        }
    }
}

/// Envelope written for each request line on the `serve` channel
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Response {
    pub ok: bool,
    #[serde(default)]
    pub result: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Run a request against the store and shape the result for the caller.
///
/// Results follow the call contract: documents and entities as JSON, `null`
/// for an entity that couldn't be created, booleans for everything else.
/// Store errors are logged and reported as `false`/`null`.
pub fn dispatch(store: &mut Store, request: Request) -> Value {
    let method = request.method();
    debug!(method, "dispatch: called");

    match request {
        Request::GetData => to_json(method, store.get_data()),
        Request::SaveData { data } => flag(method, store.save_data(data).map(|_| true)),
        Request::AddCategory { name, parent_id } => entity(method, store.add_category(&name, parent_id.as_deref())),
        Request::DeleteCategory { id } => flag(method, store.delete_category(&id)),
        Request::UpdateCategory { id, name } => flag(method, store.update_category(&id, &name)),
        Request::AddTodo {
            category_id,
            title,
            parent_id,
        } => entity(method, store.add_todo(&category_id, &title, parent_id.as_deref())),
        Request::UpdateTodo { id, updates } => flag(method, store.update_todo(&id, &updates)),
        Request::DeleteTodo { id } => flag(method, store.delete_todo(&id)),
        Request::UpdateOrder { kind, items } => flag(method, store.update_order(kind, &items).map(|_| true)),
        Request::MoveTodoToCategory {
            todo_id,
            new_category_id,
        } => flag(method, store.move_todo_to_category(&todo_id, &new_category_id)),
        Request::GetCategoryWithChildrenIds { category_id } => {
            to_json(method, store.get_category_with_children_ids(&category_id))
        }
    }
}

/// Parse one request line, dispatch it, and render the response line
pub fn handle_line(store: &mut Store, line: &str) -> String {
    let response = match serde_json::from_str::<Request>(line) {
        Ok(request) => Response {
            ok: true,
            result: dispatch(store, request),
            error: None,
        },
        Err(e) => {
            warn!(error = %e, "Rejected malformed request");
            Response {
                ok: false,
                result: Value::Null,
                error: Some(format!("invalid request: {}", e)),
            }
        }
    };

    serde_json::to_string(&response)
        .unwrap_or_else(|e| format!(r#"{{"ok":false,"result":null,"error":"{}"}}"#, e.to_string().replace('"', "'")))
}

fn to_json<T: Serialize>(method: &str, value: T) -> Value {
    serde_json::to_value(value).unwrap_or_else(|e| {
        error!(method, error = ?e, "Failed to serialize result");
        Value::Null
    })
}

fn flag(method: &str, result: Result<bool>) -> Value {
    match result {
        Ok(found) => Value::Bool(found),
        Err(e) => {
            error!(method, error = ?e, "Store operation failed");
            Value::Bool(false)
        }
    }
}

fn entity<T: Serialize>(method: &str, result: Result<Option<T>>) -> Value {
    match result {
        Ok(Some(value)) => to_json(method, value),
        Ok(None) => Value::Null,
        Err(e) => {
            error!(method, error = ?e, "Store operation failed");
            Value::Null
        }
    }
}

/// Cloneable handle that serializes all access to one store.
///
/// Each call holds the lock for the whole read-modify-write, so requests
/// from different threads never interleave.
#[derive(Clone)]
pub struct SharedStore {
    inner: Arc<Mutex<Store>>,
}

impl SharedStore {
    pub fn new(store: Store) -> Self {
        Self {
            inner: Arc::new(Mutex::new(store)),
        }
    }

    /// Run a request through the contract
    pub fn call(&self, request: Request) -> Value {
        dispatch(&mut self.lock(), request)
    }

    /// Run a closure with exclusive access to the store
    pub fn with<R>(&self, f: impl FnOnce(&mut Store) -> R) -> R {
        f(&mut self.lock())
    }

    fn lock(&self) -> MutexGuard<'_, Store> {
        self.inner.lock().unwrap_or_else(|poisoned| {
            warn!("Store lock poisoned by a panicked caller, recovering");
            poisoned.into_inner()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{DEFAULT_PERSONAL_ID, DEFAULT_WORK_ID};
    use serde_json::json;
    use std::fs;
    use std::thread;
    use tempfile::TempDir;

    fn open_temp() -> (TempDir, Store) {
        let temp = TempDir::new().unwrap();
        let store = Store::open(temp.path().join("todos.json"));
        (temp, store)
    }

    fn request(value: Value) -> Request {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_request_wire_format() {
        let req = request(json!({"method": "addTodo", "categoryId": "c1", "title": "Buy milk"}));
        assert_eq!(
            req,
            Request::AddTodo {
                category_id: "c1".to_string(),
                title: "Buy milk".to_string(),
                parent_id: None,
            }
        );
        assert_eq!(req.method(), "addTodo");

        let req = request(json!({"method": "getData"}));
        assert_eq!(req, Request::GetData);

        let req = request(json!({
            "method": "updateOrder",
            "kind": "categories",
            "items": [{"id": "a", "order": 1}]
        }));
        assert_eq!(req.method(), "updateOrder");

        let encoded = serde_json::to_value(Request::MoveTodoToCategory {
            todo_id: "t".to_string(),
            new_category_id: "c".to_string(),
        })
        .unwrap();
        assert_eq!(
            encoded,
            json!({"method": "moveTodoToCategory", "todoId": "t", "newCategoryId": "c"})
        );
    }

    #[test]
    fn test_dispatch_scenario() {
        let (_temp, mut store) = open_temp();

        let added = dispatch(
            &mut store,
            request(json!({"method": "addTodo", "categoryId": DEFAULT_WORK_ID, "title": "Buy milk"})),
        );
        assert_eq!(added["categoryId"], DEFAULT_WORK_ID);
        assert_eq!(added["completed"], false);
        assert_eq!(added["order"], 0);
        assert_eq!(added["children"], json!([]));
        let id = added["id"].as_str().unwrap().to_string();

        let updated = dispatch(
            &mut store,
            request(json!({"method": "updateTodo", "id": id, "updates": {"completed": true}})),
        );
        assert_eq!(updated, Value::Bool(true));

        let data = dispatch(&mut store, Request::GetData);
        assert_eq!(data["todos"][0]["completed"], true);
        assert!(data["todos"][0]["completedAt"].is_string());

        let deleted = dispatch(&mut store, request(json!({"method": "deleteCategory", "id": DEFAULT_WORK_ID})));
        assert_eq!(deleted, Value::Bool(true));
        let data = dispatch(&mut store, Request::GetData);
        assert_eq!(data["categories"].as_array().unwrap().len(), 1);
        assert!(data["todos"].as_array().unwrap().is_empty());
    }

    #[test]
    fn test_dispatch_negative_results() {
        let (_temp, mut store) = open_temp();

        let child = dispatch(
            &mut store,
            request(json!({"method": "addCategory", "name": "Sub", "parentId": DEFAULT_WORK_ID})),
        );
        let child_id = child["id"].as_str().unwrap().to_string();

        let grandchild = dispatch(
            &mut store,
            request(json!({"method": "addCategory", "name": "Too deep", "parentId": child_id})),
        );
        assert_eq!(grandchild, Value::Null);

        let missing = dispatch(&mut store, request(json!({"method": "deleteTodo", "id": "nope"})));
        assert_eq!(missing, Value::Bool(false));

        let sub = dispatch(
            &mut store,
            request(json!({"method": "addTodo", "categoryId": DEFAULT_WORK_ID, "title": "x", "parentId": "nope"})),
        );
        assert_eq!(sub, Value::Null);

        let reorder = dispatch(
            &mut store,
            request(json!({"method": "updateOrder", "kind": "todos", "items": [{"id": "ghost", "order": 3}]})),
        );
        assert_eq!(reorder, Value::Bool(true));
    }

    #[test]
    fn test_dispatch_scope_and_save() {
        let (_temp, mut store) = open_temp();

        let scope = dispatch(
            &mut store,
            request(json!({"method": "getCategoryWithChildrenIds", "categoryId": DEFAULT_PERSONAL_ID})),
        );
        assert_eq!(scope, json!([DEFAULT_PERSONAL_ID]));

        let mut doc = store.get_data();
        doc.categories.pop();
        let saved = dispatch(&mut store, Request::SaveData { data: doc.clone() });
        assert_eq!(saved, Value::Bool(true));
        assert_eq!(store.get_data(), doc);
    }

    #[test]
    fn test_dispatch_write_failure_reports_false() {
        let (temp, mut store) = open_temp();
        fs::create_dir(temp.path().join("todos.json.tmp")).unwrap();

        let result = dispatch(
            &mut store,
            request(json!({"method": "updateCategory", "id": DEFAULT_WORK_ID, "name": "Renamed"})),
        );
        assert_eq!(result, Value::Bool(false));
        assert_eq!(store.document().categories[0].name, "Renamed");
    }

    #[test]
    fn test_handle_line() {
        let (_temp, mut store) = open_temp();

        let ok: Response = serde_json::from_str(&handle_line(&mut store, r#"{"method":"getData"}"#)).unwrap();
        assert!(ok.ok);
        assert_eq!(ok.result["categories"][0]["name"], "Work");

        let bad: Response = serde_json::from_str(&handle_line(&mut store, r#"{"method":"explode"}"#)).unwrap();
        assert!(!bad.ok);
        assert!(bad.error.unwrap().contains("invalid request"));

        let garbage: Response = serde_json::from_str(&handle_line(&mut store, "not json")).unwrap();
        assert!(!garbage.ok);
    }

    #[test]
    fn test_handle_line_through_shared_store() {
        let (_temp, store) = open_temp();
        let shared = SharedStore::new(store);

        let line = format!(r#"{{"method":"addTodo","categoryId":"{}","title":"Ship"}}"#, DEFAULT_WORK_ID);
        let added: Response = serde_json::from_str(&shared.with(|s| handle_line(s, &line))).unwrap();
        assert!(added.ok);
        assert_eq!(added.result["title"], "Ship");

        let data: Response = serde_json::from_str(&shared.with(|s| handle_line(s, r#"{"method":"getData"}"#))).unwrap();
        assert_eq!(data.result["todos"][0]["title"], "Ship");
    }

    #[test]
    fn test_shared_store_serializes_writers() {
        let (_temp, store) = open_temp();
        let shared = SharedStore::new(store);

        let handles: Vec<_> = (0..8)
            .map(|i| {
                let shared = shared.clone();
                thread::spawn(move || {
                    shared.call(Request::AddTodo {
                        category_id: DEFAULT_WORK_ID.to_string(),
                        title: format!("task {}", i),
                        parent_id: None,
                    })
                })
            })
            .collect();
        for handle in handles {
            assert!(handle.join().unwrap().is_object());
        }

        let mut orders: Vec<i64> = shared.with(|s| s.document().todos.iter().map(|t| t.order).collect());
        orders.sort();
        assert_eq!(orders, (0..8).collect::<Vec<i64>>());

        let on_disk: StoreDocument =
            serde_json::from_str(&fs::read_to_string(shared.with(|s| s.path().to_path_buf())).unwrap()).unwrap();
        assert_eq!(on_disk.todos.len(), 8);
    }

    #[test]
    fn test_shared_store_recovers_from_poison() {
        let (_temp, store) = open_temp();
        let shared = SharedStore::new(store);

        let poisoner = shared.clone();
        let _ = thread::spawn(move || {
            poisoner.with(|store| {
                if store.path().exists() {
                    panic!("caller blew up");
                }
            });
        })
        .join();

        let data = shared.call(Request::GetData);
        assert_eq!(data["categories"].as_array().unwrap().len(), 2);
    }
}
