//! Deterministic task payloads.

use serde_json::Value;

use crate::errors::PushtaskError;
use crate::tasks::Kwargs;

/// Serializes keyword arguments to the JSON pushed to the queue.
///
/// Keys come out sorted, so equal arguments always produce byte-identical
/// payloads and the queue's uniqueness check sees them as duplicates.
pub fn serialize_payload(kwargs: &Kwargs) -> Result<String, PushtaskError> {
    Ok(serde_json::to_string(kwargs)?)
}

/// Interprets a JSON value as keyword arguments.
pub fn into_kwargs(value: Value) -> Result<Kwargs, PushtaskError> {
    match value {
        Value::Object(map) => Ok(map),
        Value::Null => Ok(Kwargs::new()),
        other => Err(PushtaskError::InvalidPayload(format!(
            "expected a JSON object, got {other}"
        ))),
    }
}

/// Parses a pushed request body. An empty body means no arguments.
pub fn parse_body(body: &[u8]) -> Result<Kwargs, PushtaskError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(Kwargs::new());
    }
    let value: Value = serde_json::from_slice(body)
        .map_err(|e| PushtaskError::InvalidPayload(e.to_string()))?;
    into_kwargs(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn test_payload_keys_are_sorted() {
        let mut kwargs = Kwargs::new();
        kwargs.insert("quantity".to_string(), json!(4));
        kwargs.insert("discount".to_string(), json!(0.1));
        kwargs.insert("price".to_string(), json!(30));

        assert_eq!(
            serialize_payload(&kwargs).unwrap(),
            r#"{"discount":0.1,"price":30,"quantity":4}"#
        );
    }

    #[test]
    fn test_empty_payload() {
        assert_eq!(serialize_payload(&Kwargs::new()).unwrap(), "{}");
    }

    #[test]
    fn test_parse_body() {
        let kwargs = parse_body(br#"{"routine_id": 7}"#).unwrap();
        assert_eq!(kwargs.get("routine_id"), Some(&json!(7)));

        assert!(parse_body(b"").unwrap().is_empty());
        assert!(parse_body(b"  \n").unwrap().is_empty());
    }

    #[test]
    fn test_parse_body_rejects_non_objects() {
        assert!(matches!(
            parse_body(b"[1, 2]"),
            Err(PushtaskError::InvalidPayload(_))
        ));
        assert!(matches!(
            parse_body(b"{not json"),
            Err(PushtaskError::InvalidPayload(_))
        ));
    }
}
