//! Loosely typed values carried by command chains and save blobs.

pub use serde_json::Value;

/// Borrow the value as a string slice, if it is one.
pub fn as_str(value: &Value) -> Option<&str> {
    value.as_str()
}

/// Interpret a chain argument as an integer.
///
/// Command chains usually arrive as text, so decimal strings are accepted
/// alongside JSON numbers. Fractional numbers are rejected.
pub fn to_number(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Render a value for display in replies. Strings are shown without quotes.
pub fn render(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_to_number() {
        assert_eq!(to_number(&json!(12)), Some(12));
        assert_eq!(to_number(&json!("-3")), Some(-3));
        assert_eq!(to_number(&json!(" 7 ")), Some(7));
        assert_eq!(to_number(&json!("seven")), None);
        assert_eq!(to_number(&json!(1.5)), None);
        assert_eq!(to_number(&json!(null)), None);
    }

    #[test]
    fn test_render() {
        assert_eq!(render(&json!("hp")), "hp");
        assert_eq!(render(&json!(4)), "4");
        assert_eq!(render(&json!(true)), "true");
    }

    #[test]
    fn test_as_str() {
        assert_eq!(as_str(&json!("x")), Some("x"));
        assert_eq!(as_str(&json!(1)), None);
    }
}
