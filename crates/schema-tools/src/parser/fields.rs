use std::fmt;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde::ser::SerializeMap;
use serde::de::Visitor;

/// Ordered string key/value pairs with unique keys.
///
/// Re-inserting an existing key replaces its value in place, so the
/// first-seen position is kept. Serialized as a JSON object.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Fields(Vec<(String, String)>);

impl Fields {
    pub fn new() -> Self {
        Self(Vec::new())
    }

    pub fn insert(&mut self, key: String, value: String) {
        match self.0.iter_mut().find(|(k, _)| *k == key) {
            Some(slot) => slot.1 = value,
            None => self.0.push((key, value)),
        }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &(String, String)> {
        self.0.iter()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(|(k, _)| k.as_str())
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Fields {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut fields = Fields::new();
        for (k, v) in iter {
            fields.insert(k.into(), v.into());
        }
        fields
    }
}

impl Serialize for Fields {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (k, v) in &self.0 {
            map.serialize_entry(k, v)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for Fields {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct MapVisitor;

        impl<'de> Visitor<'de> for MapVisitor {
            type Value = Fields;

            fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
                formatter.write_str("a JSON object of string values")
            }

            fn visit_map<A>(self, mut map: A) -> Result<Self::Value, A::Error>
            where
                A: serde::de::MapAccess<'de>,
            {
                let mut fields = Fields(Vec::with_capacity(map.size_hint().unwrap_or(0)));
                while let Some((key, value)) = map.next_entry::<String, String>()? {
                    fields.insert(key, value);
                }
                Ok(fields)
            }
        }

        deserializer.deserialize_map(MapVisitor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_serialize_empty_fields() {
        let json = serde_json::to_string(&Fields::new()).unwrap();
        assert_eq!(json, "{}");
    }

    #[test]
    fn test_insert_keeps_first_position() {
        let mut fields = Fields::new();
        fields.insert("a".into(), "1".into());
        fields.insert("b".into(), "2".into());
        fields.insert("a".into(), "3".into());

        assert_eq!(fields.len(), 2);
        assert_eq!(fields.get("a"), Some("3"));
        assert_eq!(fields.keys().collect::<Vec<_>>(), vec!["a", "b"]);
    }

    #[test]
    fn test_serialize_preserves_order() {
        let fields: Fields = [("zeta", "1"), ("alpha", "2")].into_iter().collect();
        let json = serde_json::to_string(&fields).unwrap();
        assert_eq!(json, r#"{"zeta":"1","alpha":"2"}"#);
    }

    #[test]
    fn test_deserialize_from_map() {
        let fields: Fields = serde_json::from_str(r#"{"host":"server-01","pid":"12345"}"#).unwrap();
        assert_eq!(fields.get("host"), Some("server-01"));
        assert_eq!(fields.get("pid"), Some("12345"));
    }

    #[test]
    fn test_serialize_special_characters() {
        let fields: Fields = [
            ("path", "/api/users?id=123&name=foo"),
            ("msg", "line with \"quotes\" and \\backslashes"),
        ]
        .into_iter()
        .collect();
        let json = serde_json::to_string(&fields).unwrap();
        let _: serde_json::Value = serde_json::from_str(&json).unwrap();
    }
}
