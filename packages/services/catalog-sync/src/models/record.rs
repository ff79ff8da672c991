use std::fmt;

use serde::Serialize;
use serde_json::{Map, Number, Value};

use crate::models::SyncProfile;

/// Natural key of a catalog document. Single-field keys have one part,
/// composite keys one part per key path.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RecordKey(Vec<String>);

impl RecordKey {
    pub fn from_parts(parts: Vec<String>) -> Self {
        Self(parts)
    }

    pub fn parts(&self) -> &[String] {
        &self.0
    }
}

impl From<&str> for RecordKey {
    fn from(value: &str) -> Self {
        Self(vec![value.to_string()])
    }
}

impl fmt::Display for RecordKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0.join("|"))
    }
}

/// Why a source item never reached classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    NotAnObject,
    MissingKey,
}

/// Result of normalizing one numeric field.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Normalized {
    Number(f64),
    Null,
    Unsupported,
}

/// Normalize a numeric source value to `f64`.
///
/// Integers widen to the nearest `f64`, floats pass through, strings are
/// accepted when they parse after trimming and dropping `,` separators.
/// `null` stays null. Anything else, including non-finite results, is
/// unsupported and left as it was.
pub fn normalize_number(value: &Value) -> Normalized {
    let parsed = match value {
        Value::Null => return Normalized::Null,
        Value::Number(n) => n.as_f64(),
        Value::String(s) => {
            let cleaned: String = s.trim().chars().filter(|c| *c != ',').collect();
            if cleaned.is_empty() {
                None
            } else {
                cleaned.parse::<f64>().ok()
            }
        }
        _ => None,
    };
    match parsed {
        Some(f) if f.is_finite() => Normalized::Number(f),
        _ => Normalized::Unsupported,
    }
}

/// One catalog item as it will be persisted: a typed core plus every other
/// source field carried through untouched in `extra`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CatalogRecord {
    #[serde(skip)]
    pub key: RecordKey,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub price: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub original_price: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub embedding: Option<Vec<f64>>,
    pub deleted: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_updated: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl CatalogRecord {
    pub fn from_value(value: Value, profile: &SyncProfile) -> std::result::Result<Self, SkipReason> {
        let Value::Object(mut extra) = value else {
            return Err(SkipReason::NotAnObject);
        };
        let key = profile.key.extract(&extra).ok_or(SkipReason::MissingKey)?;

        for field in &profile.numeric_fields {
            let Some(raw) = extra.get_mut(field) else { continue };
            match normalize_number(raw) {
                Normalized::Number(f) => {
                    if let Some(n) = Number::from_f64(f) {
                        *raw = Value::Number(n);
                    }
                }
                Normalized::Null => {}
                Normalized::Unsupported => {
                    tracing::debug!(key = %key, field = %field, value = %raw, "Numeric field left as-is; unsupported representation");
                }
            }
        }

        // Fields owned by the engine or the store are never taken from the source.
        extra.shift_remove("_id");
        extra.shift_remove("embedding");
        extra.shift_remove("deleted");
        if profile.stamp_last_updated {
            extra.shift_remove("last_updated");
        }

        // Only what the profile enriches or normalizes leaves `extra`.
        let (title, description) = if profile.embed {
            (take_string(&mut extra, "title"), take_string(&mut extra, "description"))
        } else {
            (None, None)
        };
        let price = take_numeric(&mut extra, profile, "price");
        let original_price = take_numeric(&mut extra, profile, "original_price");

        Ok(Self {
            key,
            title,
            description,
            price,
            original_price,
            embedding: None,
            deleted: false,
            last_updated: None,
            extra,
        })
    }

    /// Text handed to the embedding provider.
    pub fn embedding_text(&self) -> String {
        format!(
            "{}, {}",
            self.title.as_deref().unwrap_or(""),
            self.description.as_deref().unwrap_or("")
        )
    }
}

fn take_string(map: &mut Map<String, Value>, field: &str) -> Option<String> {
    match map.get(field) {
        Some(Value::String(_)) => match map.shift_remove(field) {
            Some(Value::String(s)) => Some(s),
            _ => None,
        },
        _ => None,
    }
}

fn take_numeric(map: &mut Map<String, Value>, profile: &SyncProfile, field: &str) -> Option<f64> {
    if !profile.numeric_fields.iter().any(|f| f == field) {
        return None;
    }
    let f = map.get(field)?.as_f64()?;
    map.shift_remove(field);
    Some(f)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn normalizes_every_accepted_representation() {
        assert_eq!(normalize_number(&json!(125000)), Normalized::Number(125000.0));
        assert_eq!(normalize_number(&json!(-3)), Normalized::Number(-3.0));
        assert_eq!(normalize_number(&json!(1999.5)), Normalized::Number(1999.5));
        assert_eq!(normalize_number(&json!("1,250,000.50")), Normalized::Number(1250000.5));
        assert_eq!(normalize_number(&json!("  42 ")), Normalized::Number(42.0));
        assert_eq!(normalize_number(&json!(null)), Normalized::Null);
        assert_eq!(normalize_number(&json!("call for price")), Normalized::Unsupported);
        assert_eq!(normalize_number(&json!("")), Normalized::Unsupported);
        assert_eq!(normalize_number(&json!("inf")), Normalized::Unsupported);
        assert_eq!(normalize_number(&json!(true)), Normalized::Unsupported);
        assert_eq!(normalize_number(&json!({"amount": 1})), Normalized::Unsupported);
    }

    #[test]
    fn builds_typed_core_and_keeps_extra_fields() {
        let raw = json!({
            "sku": "TV-55",
            "title": "55in TV",
            "description": "4K",
            "price": "450,000",
            "original_price": 410000,
            "deleted": true,
            "embedding": [1.0, 2.0],
            "specifications": {"panel": "OLED"},
            "images": ["a.jpg", "b.jpg"]
        });
        let rec = CatalogRecord::from_value(raw, &SyncProfile::products()).unwrap();
        assert_eq!(rec.key, RecordKey::from("TV-55"));
        assert_eq!(rec.price, Some(450000.0));
        assert_eq!(rec.original_price, Some(410000.0));
        assert!(!rec.deleted);
        assert!(rec.embedding.is_none());
        assert_eq!(rec.extra.get("sku"), Some(&json!("TV-55")));
        assert_eq!(rec.extra.get("specifications"), Some(&json!({"panel": "OLED"})));
        assert_eq!(rec.extra.get("images"), Some(&json!(["a.jpg", "b.jpg"])));
        assert!(!rec.extra.contains_key("deleted"));
        assert!(!rec.extra.contains_key("embedding"));
        assert_eq!(rec.embedding_text(), "55in TV, 4K");
    }

    #[test]
    fn unsupported_and_null_prices_pass_through() {
        let raw = json!({"sku": "X", "price": "call us", "original_price": null});
        let rec = CatalogRecord::from_value(raw, &SyncProfile::products()).unwrap();
        assert_eq!(rec.price, None);
        assert_eq!(rec.original_price, None);
        assert_eq!(rec.extra.get("price"), Some(&json!("call us")));
        assert_eq!(rec.extra.get("original_price"), Some(&json!(null)));
        assert_eq!(rec.embedding_text(), ", ");
    }

    #[test]
    fn serialized_record_carries_engine_fields() {
        let raw = json!({"sku": "A", "title": "Kettle", "price": 10});
        let mut rec = CatalogRecord::from_value(raw, &SyncProfile::products()).unwrap();
        rec.embedding = Some(vec![0.0; 3]);
        let out = serde_json::to_value(&rec).unwrap();
        assert_eq!(out["sku"], json!("A"));
        assert_eq!(out["title"], json!("Kettle"));
        assert_eq!(out["price"], json!(10.0));
        assert_eq!(out["deleted"], json!(false));
        assert_eq!(out["embedding"], json!([0.0, 0.0, 0.0]));
        assert!(out.get("description").is_none());
    }

    #[test]
    fn carousel_fields_stay_in_source_order_and_type() {
        let raw = json!({
            "desktop": {"url": "d"},
            "mobile": {"url": "m"},
            "title": "Summer",
            "price": 5,
            "position": 2
        });
        let rec = CatalogRecord::from_value(raw, &SyncProfile::carousel()).unwrap();
        assert_eq!(rec.title, None);
        assert_eq!(rec.price, None);
        let keys: Vec<&str> = rec.extra.keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["desktop", "mobile", "title", "price", "position"]);
        assert_eq!(rec.extra["price"], json!(5));
        assert!(rec.extra["price"].is_u64());
    }

    #[test]
    fn skips_non_objects_and_keyless_records() {
        let profile = SyncProfile::products();
        assert_eq!(CatalogRecord::from_value(json!([1, 2]), &profile).unwrap_err(), SkipReason::NotAnObject);
        assert_eq!(CatalogRecord::from_value(json!({"title": "x"}), &profile).unwrap_err(), SkipReason::MissingKey);
    }
}
