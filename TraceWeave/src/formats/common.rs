//! Shared JSON value coercions for raw asset records
//!
//! Game dumps are loosely typed: ids arrive as numbers in some tables and
//! as decimal strings in others (role ids in particular). These helpers
//! normalize both readings.

use serde_json::Value;

/// Read an integer, accepting both JSON numbers and decimal strings.
pub fn as_i64(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.parse().ok(),
        _ => None,
    }
}

/// Read a list of integers, silently skipping malformed entries.
pub fn as_id_list(value: &Value) -> Vec<i64> {
    value
        .as_array()
        .map(|items| items.iter().filter_map(as_i64).collect())
        .unwrap_or_default()
}

/// Read a string slice.
pub fn as_str(value: &Value) -> Option<&str> {
    value.as_str()
}

/// Read an integer and hide the `-1` sentinel the dumps use for "absent".
pub fn as_hash(value: &Value) -> Option<i64> {
    as_i64(value).filter(|&h| h >= 0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn integers_parse_from_numbers_and_strings() {
        assert_eq!(as_i64(&json!(42)), Some(42));
        assert_eq!(as_i64(&json!("42")), Some(42));
        assert_eq!(as_i64(&json!("4x")), None);
        assert_eq!(as_i64(&json!(null)), None);
    }

    #[test]
    fn id_lists_skip_junk() {
        assert_eq!(as_id_list(&json!([1, "2", null, "x", 3])), vec![1, 2, 3]);
        assert_eq!(as_id_list(&json!("not a list")), Vec::<i64>::new());
    }

    #[test]
    fn hashes_hide_absent_sentinel() {
        assert_eq!(as_hash(&json!(-1)), None);
        assert_eq!(as_hash(&json!(7)), Some(7));
    }
}
