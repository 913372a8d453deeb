//! JSON patch kernel — `spec.md` §4.1.
//!
//! Pure, side-effect-free functions over `serde_json::Value`. Nothing here
//! touches the cache, the loader, or any async machinery; every function
//! takes values by reference and returns a new value, the way
//! `toka_store_core::causal_hash` and friends are pure helpers with no
//! side effects of their own.

use serde_json::{Map, Value};

use signal_cache_types::FieldSelector;

/// Apply a `MERGED` event: build the singleton patch `{path -> payload}`
/// and apply it to `base` using JSON Merge Patch semantics (RFC 7396).
pub fn merge(base: &Value, path: &str, payload: &Value) -> Value {
    let wrapped = wrap_at_pointer(path, payload.clone());
    apply_merge_patch(base, &wrapped)
}

/// Apply a `DELETED` event. An empty path deletes the whole document
/// (returns the empty object); a non-empty path removes the addressed
/// subtree, or is a no-op if the path doesn't resolve.
pub fn delete(base: &Value, path: &str) -> Value {
    if path.is_empty() {
        return Value::Object(Map::new());
    }
    let mut result = base.clone();
    remove_at_pointer(&mut result, path);
    result
}

/// Apply a `CREATED`/`MODIFIED` event (and any forward-compatible unknown
/// kind, which folds the same way). An empty path with an object `value`
/// shallow-merges every top-level field into `base`, overwriting
/// conflicts; an empty path with a non-object `value` replaces `base`
/// wholesale. A non-empty path sets the addressed subtree, creating
/// intermediate objects as needed.
pub fn overlay(base: &Value, path: &str, value: &Value) -> Value {
    if path.is_empty() {
        return match value {
            Value::Object(fields) => {
                let mut result = match base {
                    Value::Object(existing) => existing.clone(),
                    _ => Map::new(),
                };
                for (k, v) in fields {
                    result.insert(k.clone(), v.clone());
                }
                Value::Object(result)
            }
            other => other.clone(),
        };
    }
    let mut result = base.clone();
    set_at_pointer(&mut result, path, value.clone());
    result
}

/// Restrict `obj` to the pointers named by `selector`; `None` is the
/// identity projection ("whole thing").
pub fn project(obj: &Value, selector: Option<&FieldSelector>) -> Value {
    let Some(selector) = selector else {
        return obj.clone();
    };
    let mut result = Value::Object(Map::new());
    for pointer in selector.pointers() {
        if let Some(found) = obj.pointer(pointer) {
            set_at_pointer(&mut result, pointer, found.clone());
        }
    }
    result
}

/// Extract the `revision` field of a JSON object, defaulting to `0` if
/// absent or not an integer.
pub fn revision_of(obj: &Value) -> i64 {
    obj.get("revision").and_then(Value::as_i64).unwrap_or(0)
}

//─────────────────────────────
//  Pointer helpers
//─────────────────────────────

fn pointer_segments(pointer: &str) -> Vec<String> {
    pointer
        .trim_start_matches('/')
        .split('/')
        .map(unescape_segment)
        .collect()
}

fn unescape_segment(segment: &str) -> String {
    segment.replace("~1", "/").replace("~0", "~")
}

/// Build the nested-object skeleton `{seg0: {seg1: ... : payload}}` for a
/// JSON pointer, or just `payload` for the empty pointer.
fn wrap_at_pointer(pointer: &str, payload: Value) -> Value {
    if pointer.is_empty() {
        return payload;
    }
    pointer_segments(pointer)
        .into_iter()
        .rev()
        .fold(payload, |acc, segment| {
            let mut map = Map::new();
            map.insert(segment, acc);
            Value::Object(map)
        })
}

fn set_at_pointer(root: &mut Value, pointer: &str, value: Value) {
    if pointer.is_empty() {
        *root = value;
        return;
    }
    let segments = pointer_segments(pointer);
    let (last, init) = segments.split_last().expect("non-empty pointer");

    let mut current = root;
    for segment in init {
        if !current.is_object() {
            *current = Value::Object(Map::new());
        }
        let map = current.as_object_mut().expect("just normalized to object");
        current = map.entry(segment.clone()).or_insert(Value::Null);
    }
    if !current.is_object() {
        *current = Value::Object(Map::new());
    }
    current
        .as_object_mut()
        .expect("just normalized to object")
        .insert(last.clone(), value);
}

fn remove_at_pointer(root: &mut Value, pointer: &str) {
    let segments = pointer_segments(pointer);
    let (last, init) = match segments.split_last() {
        Some(split) => split,
        None => return,
    };

    let mut current = root;
    for segment in init {
        match current {
            Value::Object(map) => match map.get_mut(segment) {
                Some(next) => current = next,
                None => return,
            },
            _ => return,
        }
    }
    if let Value::Object(map) = current {
        map.remove(last);
    }
}

/// RFC 7396 JSON Merge Patch, applied immutably.
fn apply_merge_patch(target: &Value, patch: &Value) -> Value {
    match patch {
        Value::Object(patch_fields) => {
            let mut result = match target {
                Value::Object(existing) => existing.clone(),
                _ => Map::new(),
            };
            for (key, patch_value) in patch_fields {
                if patch_value.is_null() {
                    result.remove(key);
                } else {
                    let current = result.get(key).cloned().unwrap_or(Value::Null);
                    result.insert(key.clone(), apply_merge_patch(&current, patch_value));
                }
            }
            Value::Object(result)
        }
        other => other.clone(),
    }
}
