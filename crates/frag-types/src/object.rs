use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};

use crate::error::TypeError;
use crate::fragment::validate_fragment_name;

/// Opaque identifier of a managed object.
///
/// Assigned by the store on creation and immutable afterwards. The client
/// never interprets its contents.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ManagedObjectId(String);

impl ManagedObjectId {
    /// Wrap a store-assigned identifier.
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// The identifier as sent on the wire.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for ManagedObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ManagedObjectId({})", self.0)
    }
}

impl fmt::Display for ManagedObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ManagedObjectId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for ManagedObjectId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// Generic, schemaless record owned by the remote store.
///
/// A managed object carries a handful of store-owned attributes (`id`,
/// `creationTime`, `lastUpdated`) and any number of fragments: named,
/// independently encoded JSON values stored as sibling keys at the top level.
///
/// Fragment names are unique within a record. An absent name means the
/// fragment is unset; a fragment explicitly set to JSON `null` is still
/// present.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ManagedObject {
    id: Option<ManagedObjectId>,
    creation_time: Option<DateTime<Utc>>,
    last_updated: Option<DateTime<Utc>>,
    fragments: BTreeMap<String, Value>,
}

impl ManagedObject {
    /// A new, unsaved record with no fragments.
    pub fn new() -> Self {
        Self::default()
    }

    /// An empty record addressing an existing object, for partial updates.
    pub fn with_id(id: ManagedObjectId) -> Self {
        Self {
            id: Some(id),
            ..Self::default()
        }
    }

    /// Store-assigned id, `None` until created.
    pub fn id(&self) -> Option<&ManagedObjectId> {
        self.id.as_ref()
    }

    /// Assign the identifier. Only the store should call this.
    pub fn set_id(&mut self, id: ManagedObjectId) {
        self.id = Some(id);
    }

    /// When the store created the object.
    pub fn creation_time(&self) -> Option<DateTime<Utc>> {
        self.creation_time
    }

    /// When the store last wrote the object.
    pub fn last_updated(&self) -> Option<DateTime<Utc>> {
        self.last_updated
    }

    /// Set the store-owned timestamps. Only the store should call this.
    pub fn stamp(&mut self, created: DateTime<Utc>, updated: DateTime<Utc>) {
        self.creation_time = Some(created);
        self.last_updated = Some(updated);
    }

    /// Set a fragment, returning the previous value if any.
    pub fn set(&mut self, name: &str, value: Value) -> Result<Option<Value>, TypeError> {
        validate_fragment_name(name)?;
        Ok(self.fragments.insert(name.to_string(), value))
    }

    /// The fragment stored under `name`.
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.fragments.get(name)
    }

    /// Unset a fragment, returning its value.
    pub fn remove(&mut self, name: &str) -> Option<Value> {
        self.fragments.remove(name)
    }

    /// Whether a fragment named `name` is present, even if `null`.
    pub fn contains(&self, name: &str) -> bool {
        self.fragments.contains_key(name)
    }

    /// Iterate over `(name, value)` pairs in name order.
    pub fn fragments(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.fragments.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Fragment names in order.
    pub fn fragment_names(&self) -> impl Iterator<Item = &str> {
        self.fragments.keys().map(String::as_str)
    }

    /// Number of fragments (store-owned attributes are not counted).
    pub fn len(&self) -> usize {
        self.fragments.len()
    }

    /// True when the record carries no fragments.
    pub fn is_empty(&self) -> bool {
        self.fragments.is_empty()
    }

    /// Apply a partial update: fragments present in `update` replace ours,
    /// fragments absent from it are kept.
    pub fn merge_from(&mut self, update: &ManagedObject) {
        for (name, value) in &update.fragments {
            self.fragments.insert(name.clone(), value.clone());
        }
    }

    /// Render the wire shape: store attributes and fragments as sibling keys.
    pub fn to_json(&self) -> Value {
        let mut map = Map::new();
        if let Some(id) = &self.id {
            map.insert("id".into(), Value::String(id.to_string()));
        }
        if let Some(t) = self.creation_time {
            map.insert("creationTime".into(), Value::String(t.to_rfc3339()));
        }
        if let Some(t) = self.last_updated {
            map.insert("lastUpdated".into(), Value::String(t.to_rfc3339()));
        }
        for (name, value) in &self.fragments {
            map.insert(name.clone(), value.clone());
        }
        Value::Object(map)
    }

    /// Parse the wire shape. Unknown store attributes (e.g. `self`) are dropped.
    pub fn from_json(value: Value) -> Result<Self, TypeError> {
        let Value::Object(map) = value else {
            return Err(TypeError::InvalidRecord("expected a JSON object".into()));
        };

        let mut record = Self::default();
        for (key, value) in map {
            match key.as_str() {
                "id" => {
                    let id = match value {
                        Value::String(s) => s,
                        Value::Number(n) => n.to_string(),
                        other => {
                            return Err(TypeError::InvalidRecord(format!(
                                "id must be a string, got {other}"
                            )))
                        }
                    };
                    record.id = Some(ManagedObjectId(id));
                }
                "creationTime" => record.creation_time = Some(parse_timestamp(&key, &value)?),
                "lastUpdated" => record.last_updated = Some(parse_timestamp(&key, &value)?),
                "self" => {}
                _ => {
                    record.fragments.insert(key, value);
                }
            }
        }
        Ok(record)
    }
}

fn parse_timestamp(key: &str, value: &Value) -> Result<DateTime<Utc>, TypeError> {
    let raw = value
        .as_str()
        .ok_or_else(|| TypeError::InvalidRecord(format!("{key} must be a string")))?;
    DateTime::parse_from_rfc3339(raw)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| TypeError::InvalidRecord(format!("{key}: {e}")))
}

impl Serialize for ManagedObject {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_json().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for ManagedObject {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        Self::from_json(value).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn set_and_get_fragment() {
        let mut mo = ManagedObject::new();
        assert!(mo.set("c8y_Position", json!({"lat": 1.0})).unwrap().is_none());
        assert_eq!(mo.get("c8y_Position"), Some(&json!({"lat": 1.0})));
        assert!(mo.contains("c8y_Position"));
        assert_eq!(mo.len(), 1);
    }

    #[test]
    fn set_overwrites_and_returns_previous() {
        let mut mo = ManagedObject::new();
        mo.set("f", json!(1)).unwrap();
        let prev = mo.set("f", json!(2)).unwrap();
        assert_eq!(prev, Some(json!(1)));
        assert_eq!(mo.get("f"), Some(&json!(2)));
    }

    #[test]
    fn reserved_names_are_rejected() {
        let mut mo = ManagedObject::new();
        assert!(mo.set("id", json!("x")).is_err());
        assert!(mo.set("@type", json!("x")).is_err());
        assert!(mo.is_empty());
    }

    #[test]
    fn null_fragment_is_present() {
        let mut mo = ManagedObject::new();
        mo.set("maybe", Value::Null).unwrap();
        assert!(mo.contains("maybe"));
        assert!(!mo.contains("other"));
    }

    #[test]
    fn wire_shape_roundtrip() {
        let mut mo = ManagedObject::with_id("4711".into());
        let now = Utc::now();
        mo.stamp(now, now);
        mo.set("name", json!("pump")).unwrap();
        mo.set("@app_Device", json!({"@type": "app.Device", "model": "x"})).unwrap();

        let wire = mo.to_json();
        assert_eq!(wire["id"], json!("4711"));
        assert_eq!(wire["name"], json!("pump"));

        let back = ManagedObject::from_json(wire).unwrap();
        assert_eq!(back.id(), mo.id());
        assert_eq!(back.get("@app_Device"), mo.get("@app_Device"));
        assert_eq!(back.len(), 2);
    }

    #[test]
    fn from_json_accepts_numeric_id_and_drops_self() {
        let mo = ManagedObject::from_json(json!({
            "id": 12,
            "self": "https://example/inventory/managedObjects/12",
            "type": "c8y_Device"
        }))
        .unwrap();
        assert_eq!(mo.id().unwrap().as_str(), "12");
        assert_eq!(mo.fragment_names().collect::<Vec<_>>(), vec!["type"]);
    }

    #[test]
    fn from_json_rejects_non_object() {
        assert!(ManagedObject::from_json(json!([1, 2])).is_err());
    }

    #[test]
    fn merge_keeps_absent_fragments() {
        let mut stored = ManagedObject::new();
        stored.set("a", json!(1)).unwrap();
        stored.set("b", json!(2)).unwrap();

        let mut update = ManagedObject::new();
        update.set("b", json!(20)).unwrap();
        update.set("c", json!(30)).unwrap();

        stored.merge_from(&update);
        assert_eq!(stored.get("a"), Some(&json!(1)));
        assert_eq!(stored.get("b"), Some(&json!(20)));
        assert_eq!(stored.get("c"), Some(&json!(30)));
    }

    #[test]
    fn serde_goes_through_wire_shape() {
        let mut mo = ManagedObject::with_id("1".into());
        mo.set("x", json!(true)).unwrap();
        let text = serde_json::to_string(&mo).unwrap();
        let back: ManagedObject = serde_json::from_str(&text).unwrap();
        assert_eq!(back, mo);
    }
}
