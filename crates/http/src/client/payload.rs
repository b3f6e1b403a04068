//! Response payloads as read off the wire

use super::ClientError;
use serde::de::DeserializeOwned;
use serde_json::Value;

/// Body of a successful response
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    /// Zero-length body
    Empty,
    /// Body that parsed as JSON
    Json(Value),
    /// Body that did not parse as JSON, kept verbatim
    Text(String),
}

impl Payload {
    /// Classify a raw response body
    pub fn from_body(text: String) -> Self {
        if text.is_empty() {
            return Self::Empty;
        }
        serde_json::from_str(&text).map_or(Self::Text(text), Self::Json)
    }

    pub const fn as_json(&self) -> Option<&Value> {
        match self {
            Self::Json(value) => Some(value),
            _ => None,
        }
    }

    pub fn into_json(self) -> Option<Value> {
        match self {
            Self::Json(value) => Some(value),
            _ => None,
        }
    }

    /// Deserialize a JSON payload into `T`
    pub fn decode<T: DeserializeOwned>(self) -> Result<T, ClientError> {
        match self {
            Self::Json(value) => Ok(serde_json::from_value(value)?),
            Self::Text(text) => Err(ClientError::UnexpectedPayload(format!(
                "expected JSON, got text: {text}"
            ))),
            Self::Empty => Err(ClientError::UnexpectedPayload(
                "expected JSON, got an empty body".into(),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn classifies_bodies() {
        assert_eq!(Payload::from_body(String::new()), Payload::Empty);
        assert_eq!(
            Payload::from_body(r#"{"id":1}"#.into()),
            Payload::Json(json!({"id": 1}))
        );
        assert_eq!(
            Payload::from_body("Internal Server Error".into()),
            Payload::Text("Internal Server Error".into())
        );
    }

    #[test]
    fn decode_rejects_text() {
        let result: Result<Value, _> = Payload::Text("oops".into()).decode();
        assert!(matches!(result, Err(ClientError::UnexpectedPayload(_))));
    }
}
