//! Decoded API responses.

use std::collections::HashMap;

use bytes::Bytes;
use hookline_core::ErrorResponse;
use serde::de::DeserializeOwned;
use serde_json::Value;

/// How the caller wants the response body decoded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ResponseFormat {
    /// Decode as JSON, falling back to text when the body is not JSON.
    #[default]
    Json,
    /// Decode as UTF-8 text.
    Text,
    /// Keep the raw bytes.
    Bytes,
}

/// Decoded response body.
#[derive(Debug, Clone, PartialEq)]
pub enum ResponseBody {
    Json(Value),
    Text(String),
    Bytes(Bytes),
    Empty,
}

/// The result of one API call. Owned by the caller.
#[derive(Debug, Clone)]
pub struct HttpResponse {
    /// HTTP status code.
    pub status: u16,
    /// Response headers with lowercased names.
    pub headers: HashMap<String, String>,
    /// Decoded body.
    pub body: ResponseBody,
}

impl HttpResponse {
    /// Decodes a raw body according to `format`.
    pub fn decode(
        status: u16,
        headers: HashMap<String, String>,
        raw: Bytes,
        format: ResponseFormat,
    ) -> Self {
        let body = if raw.is_empty() {
            ResponseBody::Empty
        } else {
            match format {
                ResponseFormat::Bytes => ResponseBody::Bytes(raw),
                ResponseFormat::Json => match serde_json::from_slice(&raw) {
                    Ok(value) => ResponseBody::Json(value),
                    Err(_) => ResponseBody::Text(String::from_utf8_lossy(&raw).into_owned()),
                },
                ResponseFormat::Text => {
                    ResponseBody::Text(String::from_utf8_lossy(&raw).into_owned())
                }
            }
        };
        Self {
            status,
            headers,
            body,
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Looks up a header by lowercase name.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).map(String::as_str)
    }

    /// The JSON body, if the response was JSON.
    pub fn json(&self) -> Option<&Value> {
        match &self.body {
            ResponseBody::Json(v) => Some(v),
            _ => None,
        }
    }

    /// Consumes the response and returns its JSON body (`null` otherwise).
    pub fn into_json(self) -> Value {
        match self.body {
            ResponseBody::Json(v) => v,
            _ => Value::Null,
        }
    }

    /// Deserializes the JSON body into `T`.
    pub fn parse<T: DeserializeOwned>(&self) -> serde_json::Result<T> {
        match &self.body {
            ResponseBody::Json(v) => T::deserialize(v),
            _ => T::deserialize(&Value::Null),
        }
    }

    /// Extracts `code` and `message` from an error body.
    ///
    /// Field-level `errors` are appended to the message; unstructured bodies
    /// are kept verbatim with code `0`.
    pub fn error_response(&self) -> ErrorResponse {
        match &self.body {
            ResponseBody::Json(Value::Object(map)) => {
                let code = map.get("code").and_then(Value::as_i64).unwrap_or(0);
                let mut message = map
                    .get("message")
                    .and_then(Value::as_str)
                    .unwrap_or("Unknown")
                    .to_string();
                if let Some(errors) = map.get("errors").filter(|e| !e.is_null()) {
                    message.push('\n');
                    message.push_str(&errors.to_string());
                }
                ErrorResponse::new(self.status, code, message)
            }
            ResponseBody::Json(other) => ErrorResponse::new(self.status, 0, other.to_string()),
            ResponseBody::Text(text) => ErrorResponse::new(self.status, 0, text.clone()),
            ResponseBody::Bytes(_) | ResponseBody::Empty => {
                ErrorResponse::new(self.status, 0, String::new())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_json_falls_back_to_text() {
        let r = HttpResponse::decode(
            429,
            HashMap::new(),
            Bytes::from_static(b"<html>blocked</html>"),
            ResponseFormat::Json,
        );
        assert_eq!(r.body, ResponseBody::Text("<html>blocked</html>".into()));
        assert_eq!(r.error_response().code, 0);
    }

    #[test]
    fn test_error_response_appends_field_errors() {
        let r = HttpResponse::decode(
            400,
            HashMap::new(),
            Bytes::from_static(br#"{"code":50035,"message":"Invalid Form Body","errors":{"content":"too long"}}"#),
            ResponseFormat::Json,
        );
        let err = r.error_response();
        assert_eq!(err.code, 50035);
        assert!(err.message.starts_with("Invalid Form Body\n"));
        assert!(err.message.contains("too long"));
    }

    #[test]
    fn test_parse_json_body() {
        let r = HttpResponse::decode(
            200,
            HashMap::new(),
            Bytes::from_static(br#"{"id":"42","username":"hook"}"#),
            ResponseFormat::Json,
        );
        let user: HashMap<String, String> = r.parse().unwrap();
        assert_eq!(user["username"], "hook");

        let empty = HttpResponse::decode(204, HashMap::new(), Bytes::new(), ResponseFormat::Json);
        assert_eq!(empty.parse::<Option<Value>>().unwrap(), None);
    }
}
