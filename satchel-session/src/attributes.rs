//! Dot-path attribute mapping
//!
//! Keys address nested mappings with `.` (`"user.profile.name"`), and
//! numeric segments index into sequences (`"roles.0"`). A literal top-level
//! key containing dots is found before the path is split.

use crate::cast::{self, BackedEnum, Collection};
use chrono::NaiveDateTime;
use satchel_core::SatchelResult;
use serde_json::{Map, Value};

/// One or more attribute paths
///
/// Lets single-key and multi-key calls share a method:
/// `store.has("a")`, `store.has(["a", "b"])`, `store.has(&keys)`.
pub trait KeyList {
    fn key_list(&self) -> Vec<&str>;
}

impl KeyList for &str {
    fn key_list(&self) -> Vec<&str> {
        vec![*self]
    }
}

impl KeyList for String {
    fn key_list(&self) -> Vec<&str> {
        vec![self.as_str()]
    }
}

impl KeyList for &String {
    fn key_list(&self) -> Vec<&str> {
        vec![self.as_str()]
    }
}

impl<const N: usize> KeyList for [&str; N] {
    fn key_list(&self) -> Vec<&str> {
        self.to_vec()
    }
}

impl KeyList for &[&str] {
    fn key_list(&self) -> Vec<&str> {
        self.to_vec()
    }
}

impl KeyList for Vec<&str> {
    fn key_list(&self) -> Vec<&str> {
        self.clone()
    }
}

impl KeyList for Vec<String> {
    fn key_list(&self) -> Vec<&str> {
        self.iter().map(String::as_str).collect()
    }
}

impl KeyList for &Vec<String> {
    fn key_list(&self) -> Vec<&str> {
        self.iter().map(String::as_str).collect()
    }
}

/// Ordered mapping from dot-path keys to structured values
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AttributeStore {
    attributes: Map<String, Value>,
}

impl From<Map<String, Value>> for AttributeStore {
    fn from(attributes: Map<String, Value>) -> Self {
        Self { attributes }
    }
}

impl AttributeStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// The full mapping
    pub fn all(&self) -> &Map<String, Value> {
        &self.attributes
    }

    pub fn into_map(self) -> Map<String, Value> {
        self.attributes
    }

    /// Number of top-level entries
    pub fn len(&self) -> usize {
        self.attributes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.attributes.is_empty()
    }

    /// Value at `path`, including a stored null
    pub fn get(&self, path: &str) -> Option<&Value> {
        lookup(&self.attributes, path)
    }

    /// Value at `path`, or `default` when the path is absent
    pub fn get_or(&self, path: &str, default: impl Into<Value>) -> Value {
        self.get(path).cloned().unwrap_or_else(|| default.into())
    }

    /// True when every path is present and not null
    pub fn has(&self, keys: impl KeyList) -> bool {
        keys.key_list()
            .into_iter()
            .all(|key| self.get(key).is_some_and(|value| !value.is_null()))
    }

    /// True when every path is present, null or not
    pub fn exists(&self, keys: impl KeyList) -> bool {
        keys.key_list().into_iter().all(|key| self.get(key).is_some())
    }

    /// Negation of [`AttributeStore::has`]
    pub fn missing(&self, keys: impl KeyList) -> bool {
        !self.has(keys)
    }

    /// Set `path`, creating intermediate mappings as needed
    pub fn put(&mut self, path: &str, value: impl Into<Value>) {
        assign(&mut self.attributes, path, value.into());
    }

    /// Set every entry of `values`, each key treated as a path
    pub fn put_many(&mut self, values: Map<String, Value>) {
        for (path, value) in values {
            assign(&mut self.attributes, &path, value);
        }
    }

    /// Overwrite the given keys, leaving the rest untouched
    pub fn replace(&mut self, values: Map<String, Value>) {
        self.put_many(values);
    }

    /// Delete `path` and return what was stored there
    pub fn remove(&mut self, path: &str) -> Option<Value> {
        take(&mut self.attributes, path)
    }

    pub fn forget(&mut self, keys: impl KeyList) {
        for key in keys.key_list() {
            take(&mut self.attributes, key);
        }
    }

    /// Subset of the mapping holding only the requested paths that exist
    pub fn only(&self, keys: impl KeyList) -> Map<String, Value> {
        let mut subset = Map::new();
        for key in keys.key_list() {
            if let Some(value) = self.get(key) {
                assign(&mut subset, key, value.clone());
            }
        }
        subset
    }

    pub fn flush(&mut self) {
        self.attributes.clear();
    }

    /// Append `value` to the sequence at `path`
    ///
    /// An absent or null path starts a new sequence. A scalar or mapping
    /// already stored there becomes the first element.
    pub fn push(&mut self, path: &str, value: impl Into<Value>) {
        let mut items = match self.remove_for_update(path) {
            None | Some(Value::Null) => Vec::new(),
            Some(Value::Array(items)) => items,
            Some(other) => vec![other],
        };
        items.push(value.into());
        self.put(path, Value::Array(items));
    }

    /// Add `by` to the number at `path` (0 when absent) and return what was stored
    ///
    /// Floats, and strings whose leading number has a fraction or exponent,
    /// stay floats. Everything else is read as an integer and saturates.
    pub fn increment(&mut self, path: &str, by: i64) -> Value {
        let next = match self.get(path) {
            Some(current) if cast::reads_as_float(current) => {
                Value::from(cast::to_float(current) + by as f64)
            }
            current => Value::from(current.map_or(0, cast::to_integer).saturating_add(by)),
        };
        self.put(path, next.clone());
        next
    }

    pub fn decrement(&mut self, path: &str, by: i64) -> Value {
        self.increment(path, by.saturating_neg())
    }

    /// String rendering of `path`; `default` only when the path is absent
    pub fn string(&self, path: &str, default: &str) -> String {
        self.get(path)
            .map_or_else(|| default.to_string(), cast::to_string)
    }

    pub fn boolean(&self, path: &str, default: bool) -> bool {
        self.get(path).map_or(default, cast::to_boolean)
    }

    /// Leading-token integer parse of `path`; null reads as 0, absent as `default`
    pub fn integer(&self, path: &str, default: i64) -> i64 {
        self.get(path).map_or(default, cast::to_integer)
    }

    pub fn float(&self, path: &str, default: f64) -> f64 {
        self.get(path).map_or(default, cast::to_float)
    }

    /// Timestamp at `path`; absent or null is `Ok(None)`, unparsable is an error
    pub fn date(&self, path: &str, format: Option<&str>) -> SatchelResult<Option<NaiveDateTime>> {
        match self.get(path) {
            Some(value) => cast::to_date(value, format, path),
            None => Ok(None),
        }
    }

    /// Variant of `E` whose raw value is stored at `path`
    pub fn enum_value<E: BackedEnum>(&self, path: &str) -> Option<E> {
        self.get(path).and_then(E::try_from_raw)
    }

    /// Wrap the value at `path`, or the whole mapping when `path` is `None`
    pub fn collect(&self, path: Option<&str>) -> Collection {
        match path {
            Some(path) => Collection::from_value(self.get(path).cloned().unwrap_or(Value::Null)),
            None => Collection::from_map(self.attributes.clone()),
        }
    }

    /// Wrap the subset of the mapping holding `keys`
    pub fn collect_only(&self, keys: impl KeyList) -> Collection {
        Collection::from_map(self.only(keys))
    }

    fn remove_for_update(&mut self, path: &str) -> Option<Value> {
        lookup_mut(&mut self.attributes, path).map(Value::take)
    }
}

fn lookup<'a>(root: &'a Map<String, Value>, path: &str) -> Option<&'a Value> {
    if let Some(value) = root.get(path) {
        return Some(value);
    }

    let mut segments = path.split('.');
    let mut current = root.get(segments.next()?)?;
    for segment in segments {
        current = match current {
            Value::Object(map) => map.get(segment)?,
            Value::Array(items) => items.get(segment.parse::<usize>().ok()?)?,
            _ => return None,
        };
    }
    Some(current)
}

fn lookup_mut<'a>(root: &'a mut Map<String, Value>, path: &str) -> Option<&'a mut Value> {
    if root.contains_key(path) {
        return root.get_mut(path);
    }

    let mut segments = path.split('.');
    let mut current = root.get_mut(segments.next()?)?;
    for segment in segments {
        current = match current {
            Value::Object(map) => map.get_mut(segment)?,
            Value::Array(items) => items.get_mut(segment.parse::<usize>().ok()?)?,
            _ => return None,
        };
    }
    Some(current)
}

fn assign(root: &mut Map<String, Value>, path: &str, value: Value) {
    let mut segments = path.split('.');
    let first = segments.next().unwrap_or(path);
    let mut slot = root.entry(first).or_insert(Value::Null);
    for segment in segments {
        slot = step_mut(slot, segment);
    }
    *slot = value;
}

/// Descend one level for writing
///
/// On a sequence, an index inside it addresses that element and an index
/// equal to its length appends. Any other segment turns the sequence into a
/// mapping keyed by position, keeping the existing elements. Scalars are
/// replaced with a mapping.
fn step_mut<'a>(slot: &'a mut Value, segment: &str) -> &'a mut Value {
    let index = match &*slot {
        Value::Array(items) => segment.parse::<usize>().ok().filter(|i| *i <= items.len()),
        _ => None,
    };

    match (slot, index) {
        (Value::Array(items), Some(index)) => {
            if index == items.len() {
                items.push(Value::Null);
            }
            &mut items[index]
        }
        (slot, _) => {
            let map = match slot.take() {
                Value::Object(map) => map,
                Value::Array(items) => items
                    .into_iter()
                    .enumerate()
                    .map(|(position, item)| (position.to_string(), item))
                    .collect(),
                _ => Map::new(),
            };
            *slot = Value::Object(map);
            match slot {
                Value::Object(map) => map.entry(segment).or_insert(Value::Null),
                _ => unreachable!("slot was just replaced with a mapping"),
            }
        }
    }
}

fn take(root: &mut Map<String, Value>, path: &str) -> Option<Value> {
    if root.contains_key(path) {
        return root.shift_remove(path);
    }

    let (parent, leaf) = path.rsplit_once('.')?;
    match lookup_mut(root, parent)? {
        Value::Object(map) => map.shift_remove(leaf),
        Value::Array(items) => {
            let index = leaf.parse::<usize>().ok().filter(|i| *i < items.len())?;
            Some(items.remove(index))
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn store(value: Value) -> AttributeStore {
        match value {
            Value::Object(map) => AttributeStore::from(map),
            _ => panic!("fixture must be an object"),
        }
    }

    #[test]
    fn test_put_then_get() {
        let mut attributes = AttributeStore::new();
        attributes.put("foo", "bar");
        attributes.put("nothing", Value::Null);

        assert_eq!(attributes.get("foo"), Some(&json!("bar")));
        assert!(attributes.has("foo"));
        assert!(attributes.exists("foo"));

        assert_eq!(attributes.get("nothing"), Some(&Value::Null));
        assert!(!attributes.has("nothing"));
        assert!(attributes.exists("nothing"));
        assert!(attributes.missing("nothing"));
    }

    #[test]
    fn test_nested_paths_create_mappings() {
        let mut attributes = AttributeStore::new();
        attributes.put("user.profile.name", "Ada");

        assert_eq!(attributes.all(), &json!({"user": {"profile": {"name": "Ada"}}}).as_object().cloned().unwrap());
        assert!(attributes.has("user.profile"));
        assert!(!attributes.exists("user.profile.email"));
    }

    #[test]
    fn test_put_over_scalar_replaces_with_mapping() {
        let mut attributes = AttributeStore::new();
        attributes.put("user", "plain");
        attributes.put("user.name", "Ada");

        assert_eq!(attributes.get("user"), Some(&json!({"name": "Ada"})));
    }

    #[test]
    fn test_sequence_indexing() {
        let mut attributes = store(json!({"roles": ["admin", "editor"]}));

        assert_eq!(attributes.get("roles.1"), Some(&json!("editor")));
        assert!(!attributes.exists("roles.2"));

        attributes.put("roles.0", "owner");
        assert_eq!(attributes.get("roles"), Some(&json!(["owner", "editor"])));

        assert_eq!(attributes.remove("roles.0"), Some(json!("owner")));
        assert_eq!(attributes.get("roles"), Some(&json!(["editor"])));
    }

    #[test]
    fn test_writing_past_sequence_end_keeps_elements() {
        let mut attributes = store(json!({"roles": ["admin", "editor"]}));

        attributes.put("roles.2", "owner");
        assert_eq!(attributes.get("roles"), Some(&json!(["admin", "editor", "owner"])));

        attributes.put("roles.5", "guest");
        assert_eq!(attributes.get("roles.0"), Some(&json!("admin")));
        assert_eq!(attributes.get("roles.2"), Some(&json!("owner")));
        assert_eq!(attributes.get("roles.5"), Some(&json!("guest")));

        let mut attributes = store(json!({"tags": ["a"]}));
        attributes.put("tags.primary", "b");
        assert_eq!(attributes.get("tags"), Some(&json!({"0": "a", "primary": "b"})));
    }

    #[test]
    fn test_literal_dotted_key_wins() {
        let mut map = Map::new();
        map.insert("a.b".to_string(), json!(1));
        map.insert("a".to_string(), json!({"b": 2}));
        let mut attributes = AttributeStore::from(map);

        assert_eq!(attributes.get("a.b"), Some(&json!(1)));
        assert_eq!(attributes.remove("a.b"), Some(json!(1)));
        assert_eq!(attributes.get("a.b"), Some(&json!(2)));
    }

    #[test]
    fn test_remove_absent_is_none() {
        let mut attributes = AttributeStore::new();
        assert_eq!(attributes.remove("ghost"), None);
        assert_eq!(attributes.remove("ghost.deep"), None);
    }

    #[test]
    fn test_remove_preserves_order() {
        let mut attributes = store(json!({"a": 1, "b": 2, "c": 3}));
        attributes.remove("a");

        let keys: Vec<&String> = attributes.all().keys().collect();
        assert_eq!(keys, vec!["b", "c"]);
    }

    #[test]
    fn test_multi_key_checks() {
        let mut attributes = AttributeStore::new();
        attributes.put("first_name", "Mehdi");
        attributes.put("last_name", "Rajabi");
        attributes.put("nickname", Value::Null);

        assert!(attributes.has(["first_name", "last_name"]));
        assert!(!attributes.has(["first_name", "nickname"]));
        assert!(attributes.exists(["first_name", "nickname"]));
        assert!(!attributes.exists(["first_name", "bogus"]));

        let keys = vec!["first_name".to_string(), "last_name".to_string()];
        assert!(attributes.has(&keys));
    }

    #[test]
    fn test_only_keeps_nested_shape() {
        let attributes = store(json!({"foo": "bar", "qu": "ux", "user": {"id": 7, "name": "x"}}));

        assert_eq!(Value::Object(attributes.only(["qu"])), json!({"qu": "ux"}));
        assert_eq!(
            Value::Object(attributes.only(["user.id", "ghost"])),
            json!({"user": {"id": 7}})
        );
    }

    #[test]
    fn test_push() {
        let mut attributes = store(json!({"language": {"rust": ["tokio"]}}));
        attributes.push("language.rust", "axum");
        assert_eq!(attributes.get("language"), Some(&json!({"rust": ["tokio", "axum"]})));

        attributes.push("fresh", 1);
        assert_eq!(attributes.get("fresh"), Some(&json!([1])));

        attributes.put("scalar", "a");
        attributes.push("scalar", "b");
        assert_eq!(attributes.get("scalar"), Some(&json!(["a", "b"])));
    }

    #[test]
    fn test_increment_and_decrement() {
        let mut attributes = AttributeStore::new();
        assert_eq!(attributes.increment("hits", 1), 1);

        attributes.put("foo", 5);
        assert_eq!(attributes.increment("foo", 4), 9);
        assert_eq!(attributes.decrement("foo", 9), 0);
        assert_eq!(attributes.decrement("bar", 1), -1);

        attributes.put("stringy", "10 apples");
        assert_eq!(attributes.increment("stringy", 1), 11);
    }

    #[test]
    fn test_increment_keeps_floats() {
        let mut attributes = AttributeStore::new();
        attributes.put("score", 1.5);
        assert_eq!(attributes.increment("score", 1), json!(2.5));
        assert_eq!(attributes.get("score"), Some(&json!(2.5)));

        assert_eq!(attributes.decrement("score", 3), json!(-0.5));

        attributes.put("ratio", "0.25");
        assert_eq!(attributes.increment("ratio", 1), json!(1.25));

        attributes.put("whole", 7);
        assert_eq!(attributes.increment("whole", 1), json!(8));
        assert!(attributes.get("whole").is_some_and(Value::is_i64));
    }

    #[test]
    fn test_typed_null_versus_absent() {
        let attributes = store(json!({"n": null}));

        assert_eq!(attributes.integer("n", 42), 0);
        assert_eq!(attributes.integer("absent", 42), 42);
        assert_eq!(attributes.float("n", 1.5), 0.0);
        assert_eq!(attributes.float("absent", 1.5), 1.5);
        assert_eq!(attributes.string("n", "dflt"), "");
        assert_eq!(attributes.string("absent", "dflt"), "dflt");
        assert!(!attributes.boolean("n", true));
        assert!(attributes.boolean("absent", true));
    }

    #[test]
    fn test_flush() {
        let mut attributes = store(json!({"a": 1}));
        attributes.flush();
        assert!(attributes.is_empty());
    }
}
