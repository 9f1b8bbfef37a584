//! Target class membership.
//!
//! Upstream detectors do not agree on how a class id is encoded. MobileNet-SSD
//! publishers emit integers, some deserializers hand over floats, and
//! `vision_msgs` carries the id as a string that may be either the numeric id
//! or the class name. `is_target_class` accepts all of these.

use serde::Deserialize;

/// Class id of "person" in the MobileNet-SSD (VOC) label map.
pub const TARGET_CLASS_ID: i64 = 15;

/// Class name accepted in place of the numeric id.
pub const TARGET_CLASS_NAME: &str = "person";

/// A class identifier as it appears on the wire.
#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum ClassId {
    Integer(i64),
    Float(f64),
    Text(String),
    /// Booleans, arrays, objects. Never the target class.
    Other(serde_json::Value),
}

impl From<i64> for ClassId {
    fn from(value: i64) -> Self {
        Self::Integer(value)
    }
}

impl From<f64> for ClassId {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl From<&str> for ClassId {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

/// Returns true when `id` denotes the target class.
///
/// Floats are truncated toward zero before comparison, so `15.9` matches and
/// `16.0` does not. Strings are trimmed and case-folded; they match either the
/// class name or the decimal id.
pub fn is_target_class(id: Option<&ClassId>) -> bool {
    match id {
        None => false,
        Some(ClassId::Integer(value)) => *value == TARGET_CLASS_ID,
        Some(ClassId::Float(value)) => {
            value.is_finite() && value.trunc() == TARGET_CLASS_ID as f64
        }
        Some(ClassId::Text(text)) => {
            let folded = text.trim().to_lowercase();
            if folded == TARGET_CLASS_NAME {
                return true;
            }
            folded
                .parse::<i64>()
                .map(|value| value == TARGET_CLASS_ID)
                .unwrap_or(false)
        }
        Some(ClassId::Other(_)) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn accepts(id: impl Into<ClassId>) -> bool {
        is_target_class(Some(&id.into()))
    }

    #[test]
    fn numeric_ids() {
        assert!(accepts(15));
        assert!(accepts(15.0));
        assert!(!accepts(16));
        assert!(!accepts(0));
    }

    #[test]
    fn floats_truncate_instead_of_rounding() {
        assert!(accepts(15.9));
        assert!(accepts(15.0001));
        assert!(!accepts(14.9));
        assert!(!accepts(16.0));
    }

    #[test]
    fn non_finite_floats_never_match() {
        assert!(!accepts(f64::NAN));
        assert!(!accepts(f64::INFINITY));
    }

    #[test]
    fn string_ids() {
        assert!(accepts("15"));
        assert!(accepts("person"));
        assert!(accepts("PERSON"));
        assert!(accepts(" person "));
        assert!(accepts(" 15\n"));
        assert!(!accepts("dog"));
        assert!(!accepts("abc"));
        assert!(!accepts("15.0"));
        assert!(!accepts(""));
    }

    #[test]
    fn absent_id_is_rejected() {
        assert!(!is_target_class(None));
    }

    #[test]
    fn other_json_types_are_rejected() {
        let id: ClassId = serde_json::from_str("true").unwrap();
        assert_eq!(id, ClassId::Other(serde_json::Value::Bool(true)));
        assert!(!is_target_class(Some(&id)));

        let id: ClassId = serde_json::from_str("[15]").unwrap();
        assert!(!is_target_class(Some(&id)));
    }

    #[test]
    fn wire_encodings_deserialize_to_expected_variants() {
        let id: ClassId = serde_json::from_str("15").unwrap();
        assert_eq!(id, ClassId::Integer(15));
        let id: ClassId = serde_json::from_str("15.5").unwrap();
        assert_eq!(id, ClassId::Float(15.5));
        let id: ClassId = serde_json::from_str("\"15\"").unwrap();
        assert_eq!(id, ClassId::Text("15".to_string()));
    }
}
