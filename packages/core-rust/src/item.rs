//! Stored record type for stateful resources.
//!
//! A [`ResourceItem`] keeps its identity and timestamps outside of its
//! `data` map. The flattened JSON view produced by [`ResourceItem::to_json`]
//! (and by its `Serialize` impl) synthesizes the `id`, `createdAt` and
//! `updatedAt` keys; [`ResourceItem::from_json`] strips them again.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::ser::{Serialize, SerializeMap, Serializer};
use serde_json::{Map, Value};

/// Field name under which the item ID appears in the flattened view.
pub const ID_FIELD: &str = "id";
/// Field name under which the creation time appears in the flattened view.
pub const CREATED_AT_FIELD: &str = "createdAt";
/// Field name under which the last update time appears in the flattened view.
pub const UPDATED_AT_FIELD: &str = "updatedAt";

/// Keys that never live inside [`ResourceItem::data`].
pub const SYSTEM_FIELDS: [&str; 3] = [ID_FIELD, CREATED_AT_FIELD, UPDATED_AT_FIELD];

/// Arbitrary field map of an item.
pub type Data = Map<String, Value>;

/// Returns `true` if `field` is one of the synthesized system keys.
#[must_use]
pub fn is_system_field(field: &str) -> bool {
    SYSTEM_FIELDS.contains(&field)
}

/// One stored record: ID, user fields and timestamps.
///
/// `Clone` deep-copies `data`, which is what rollback snapshots rely on.
#[derive(Debug, Clone, PartialEq)]
pub struct ResourceItem {
    pub id: String,
    pub data: Data,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ResourceItem {
    /// Builds an item, removing any system keys from `data`.
    #[must_use]
    pub fn new(id: impl Into<String>, mut data: Data, now: DateTime<Utc>) -> Self {
        strip_system_fields(&mut data);
        Self {
            id: id.into(),
            data,
            created_at: now,
            updated_at: now,
        }
    }

    /// Flattened JSON view: `data` plus `id`, `createdAt` and `updatedAt`.
    #[must_use]
    pub fn to_json(&self) -> Value {
        Value::Object(self.to_map())
    }

    /// Same as [`to_json`](Self::to_json) but returns the object map.
    #[must_use]
    pub fn to_map(&self) -> Data {
        let mut out = self.data.clone();
        out.insert(ID_FIELD.to_string(), Value::String(self.id.clone()));
        out.insert(
            CREATED_AT_FIELD.to_string(),
            Value::String(format_time(self.created_at)),
        );
        out.insert(
            UPDATED_AT_FIELD.to_string(),
            Value::String(format_time(self.updated_at)),
        );
        out
    }

    /// Parses a flattened view back into an item.
    ///
    /// Missing or malformed timestamps fall back to `now`. Returns `None` if
    /// `value` is not an object or has no usable `id`.
    #[must_use]
    pub fn from_json(value: &Value, now: DateTime<Utc>) -> Option<Self> {
        let obj = value.as_object()?;
        let id = obj.get(ID_FIELD).map(stringify).filter(|s| !s.is_empty())?;
        let created_at = obj
            .get(CREATED_AT_FIELD)
            .and_then(Value::as_str)
            .and_then(parse_time)
            .unwrap_or(now);
        let updated_at = obj
            .get(UPDATED_AT_FIELD)
            .and_then(Value::as_str)
            .and_then(parse_time)
            .unwrap_or(created_at);

        let mut data = obj.clone();
        strip_system_fields(&mut data);
        Some(Self {
            id,
            data,
            created_at,
            updated_at,
        })
    }
}

impl Serialize for ResourceItem {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.data.len() + 3))?;
        map.serialize_entry(ID_FIELD, &self.id)?;
        for (k, v) in &self.data {
            map.serialize_entry(k, v)?;
        }
        map.serialize_entry(CREATED_AT_FIELD, &format_time(self.created_at))?;
        map.serialize_entry(UPDATED_AT_FIELD, &format_time(self.updated_at))?;
        map.end()
    }
}

/// Removes `id`, `createdAt` and `updatedAt` from a field map.
pub fn strip_system_fields(data: &mut Data) {
    for field in SYSTEM_FIELDS {
        data.remove(field);
    }
}

/// RFC 3339 with nanosecond precision, the wire format for item timestamps.
#[must_use]
pub fn format_time(t: DateTime<Utc>) -> String {
    t.to_rfc3339_opts(SecondsFormat::Nanos, true)
}

/// Parses an RFC 3339 timestamp.
#[must_use]
pub fn parse_time(s: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .ok()
        .map(|t| t.with_timezone(&Utc))
}

/// Canonical string form of a dynamic value, used for IDs and exact-match
/// filtering. Strings are taken verbatim, `null` becomes the empty string,
/// everything else uses its JSON text.
#[must_use]
pub fn stringify(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;
    use serde_json::json;

    use super::*;

    fn ts() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap()
    }

    fn data(v: Value) -> Data {
        v.as_object().cloned().unwrap()
    }

    #[test]
    fn new_strips_system_fields() {
        let item = ResourceItem::new(
            "u1",
            data(json!({"id": "other", "name": "Ada", "createdAt": "x"})),
            ts(),
        );
        assert_eq!(item.id, "u1");
        assert_eq!(item.data.len(), 1);
        assert_eq!(item.data["name"], "Ada");
    }

    #[test]
    fn flattened_view_contains_system_fields() {
        let item = ResourceItem::new("u1", data(json!({"name": "Ada"})), ts());
        let view = item.to_json();
        assert_eq!(view["id"], "u1");
        assert_eq!(view["name"], "Ada");
        assert_eq!(view["createdAt"], "2024-03-01T12:00:00.000000000Z");
        assert_eq!(view["updatedAt"], view["createdAt"]);
    }

    #[test]
    fn serialize_matches_to_json() {
        let item = ResourceItem::new("u1", data(json!({"age": 36})), ts());
        let serialized = serde_json::to_value(&item).unwrap();
        assert_eq!(serialized, item.to_json());
    }

    #[test]
    fn from_json_restores_item() {
        let item = ResourceItem::new("u1", data(json!({"age": 36})), ts());
        let parsed = ResourceItem::from_json(&item.to_json(), Utc::now()).unwrap();
        assert_eq!(parsed, item);
    }

    #[test]
    fn from_json_requires_id() {
        assert!(ResourceItem::from_json(&json!({"name": "x"}), ts()).is_none());
        assert!(ResourceItem::from_json(&json!("not an object"), ts()).is_none());
    }

    #[test]
    fn stringify_forms() {
        assert_eq!(stringify(&json!("abc")), "abc");
        assert_eq!(stringify(&json!(42)), "42");
        assert_eq!(stringify(&json!(true)), "true");
        assert_eq!(stringify(&Value::Null), "");
        assert_eq!(stringify(&json!(1.5)), "1.5");
    }
}
