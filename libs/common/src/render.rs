//! Text rendering of broadcast payloads, as shown by viewers.
//!
//! Every top-level key becomes a label line. Hyphenated keys are split into
//! words and each word's first character is upper-cased (`call-id` renders
//! as `Call Id`). Nested objects and arrays are pretty-printed JSON with a
//! two-space indent; strings are printed without quotes.

use serde_json::Value;

/// Turn a payload key into its human-readable label.
pub fn format_label(key: &str) -> String {
    key.split('-')
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Render a single value the way it appears after its label.
pub fn format_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Object(_) | Value::Array(_) | Value::Null => {
            serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string())
        }
        other => other.to_string(),
    }
}

/// Render a whole payload, one `Label: value` line per top-level key.
///
/// Payloads that are not JSON objects have no keys to label and are rendered
/// as a single pretty-printed value.
pub fn format_message(message: &Value) -> String {
    let Value::Object(map) = message else {
        return format!("{}\n", format_value(message));
    };

    let mut out = String::new();
    for (key, value) in map {
        out.push_str(&format_label(key));
        out.push_str(": ");
        out.push_str(&format_value(value));
        out.push('\n');
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn hyphenated_keys_are_title_cased() {
        assert_eq!(format_label("call-id"), "Call Id");
        assert_eq!(format_label("status"), "Status");
        assert_eq!(format_label("caller-phone-number"), "Caller Phone Number");
    }

    #[test]
    fn only_first_character_changes() {
        assert_eq!(format_label("callId"), "CallId");
        assert_eq!(format_label("x--y"), "X  Y");
        assert_eq!(format_label(""), "");
    }

    #[test]
    fn flat_message_keeps_key_order() {
        let msg = json!({"call-id": "123", "status": "ringing", "duration": 12});
        assert_eq!(
            format_message(&msg),
            "Call Id: 123\nStatus: ringing\nDuration: 12\n"
        );
    }

    #[test]
    fn nested_objects_are_pretty_printed() {
        let msg = json!({"caller": {"name": "Ada"}});
        assert_eq!(
            format_message(&msg),
            "Caller: {\n  \"name\": \"Ada\"\n}\n"
        );
    }

    #[test]
    fn null_and_bool_values() {
        let msg = json!({"agent": null, "on-hold": false});
        assert_eq!(format_message(&msg), "Agent: null\nOn Hold: false\n");
    }

    #[test]
    fn non_object_payload_renders_as_value() {
        assert_eq!(format_message(&json!("hello")), "hello\n");
        assert_eq!(format_message(&json!([1])), "[\n  1\n]\n");
    }
}
