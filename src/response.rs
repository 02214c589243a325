//! Outgoing response envelope and its builder.
//!
//! Every route answers with the same shape the gateway expects:
//!
//! ```json
//! { "statusCode": 200, "headers": { "Content-Type": "application/json" }, "body": "<json>" }
//! ```
//!
//! The body is always JSON text. Plain messages such as `404 Not Found` are
//! encoded as JSON strings, quotes included.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::error;

use crate::status::Status;

const CONTENT_TYPE: &str = "Content-Type";
const ALLOW_ORIGIN: &str = "Access-Control-Allow-Origin";
const ALLOW_CREDENTIALS: &str = "Access-Control-Allow-Credentials";

// ── Envelope ─────────────────────────────────────────────────────────────────

/// The transport envelope returned for every request.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Envelope {
    pub status_code: u16,
    pub headers: BTreeMap<String, String>,
    pub body: String,
}

impl Envelope {
    /// Builder for envelopes; defaults to `200` without CORS headers.
    pub fn builder() -> EnvelopeBuilder {
        EnvelopeBuilder { status: Status::Ok, cors: false }
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Parses the body back into a JSON value.
    pub fn json_body(&self) -> serde_json::Result<serde_json::Value> {
        serde_json::from_str(&self.body)
    }
}

/// Wraps `body` into an envelope with the fixed JSON headers, plus the
/// permissive CORS pair when `cors` is set.
///
/// Decimals inside `body` are normalized by their own `Serialize` impls.
/// This never fails: a body that cannot be serialized is logged and sent
/// as `null`.
pub fn build_response<T: Serialize + ?Sized>(status: Status, body: &T, cors: bool) -> Envelope {
    Envelope::builder().status(status).cors(cors).json(body)
}

// ── EnvelopeBuilder ──────────────────────────────────────────────────────────

/// Fluent builder for [`Envelope`].
///
/// Obtain via [`Envelope::builder()`]. Terminated by [`json`](Self::json).
pub struct EnvelopeBuilder {
    status: Status,
    cors: bool,
}

impl EnvelopeBuilder {
    pub fn status(mut self, status: Status) -> Self {
        self.status = status;
        self
    }

    /// Adds `Access-Control-Allow-Origin: *` and
    /// `Access-Control-Allow-Credentials: true`.
    pub fn cors(mut self, enabled: bool) -> Self {
        self.cors = enabled;
        self
    }

    /// Terminate with a JSON-serialized body.
    pub fn json<T: Serialize + ?Sized>(self, body: &T) -> Envelope {
        let body = serde_json::to_string(body).unwrap_or_else(|e| {
            error!("response body serialization failed: {e}");
            "null".to_owned()
        });

        let mut headers = BTreeMap::from([(CONTENT_TYPE.to_owned(), "application/json".to_owned())]);
        if self.cors {
            headers.insert(ALLOW_ORIGIN.to_owned(), "*".to_owned());
            headers.insert(ALLOW_CREDENTIALS.to_owned(), "true".to_owned());
        }

        Envelope { status_code: self.status.as_u16(), headers, body }
    }
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use bigdecimal::BigDecimal;
    use serde_json::json;

    use super::*;
    use crate::store::{AttrValue, Item};

    #[test]
    fn plain_messages_are_json_strings() {
        let env = build_response(Status::NotFound, "404 Not Found", false);
        assert_eq!(env.status_code, 404);
        assert_eq!(env.body, r#""404 Not Found""#);
        assert_eq!(env.header("content-type"), Some("application/json"));
        assert_eq!(env.header(ALLOW_ORIGIN), None);
    }

    #[test]
    fn cors_headers_are_opt_in() {
        let env = build_response(Status::Ok, &json!({}), true);
        assert_eq!(env.header(ALLOW_ORIGIN), Some("*"));
        assert_eq!(env.header(ALLOW_CREDENTIALS), Some("true"));
    }

    #[test]
    fn decimals_leave_as_native_numbers() {
        let item = Item::from([
            ("whole".to_owned(), AttrValue::N(BigDecimal::from_str("10").unwrap())),
            ("half".to_owned(), AttrValue::N(BigDecimal::from_str("10.5").unwrap())),
        ]);
        let env = build_response(Status::Ok, &item, false);
        assert_eq!(env.body, r#"{"half":10.5,"whole":10}"#);
    }

    #[test]
    fn absent_body_is_null() {
        let env = build_response(Status::Ok, &None::<Item>, false);
        assert_eq!(env.body, "null");
    }

    #[test]
    fn envelope_uses_gateway_field_names() {
        let env = Envelope::builder()
            .status(Status::BadRequest)
            .json("Error processing request");
        let wire = serde_json::to_value(&env).unwrap();
        assert_eq!(wire["statusCode"], 400);
        assert_eq!(wire["headers"]["Content-Type"], "application/json");
        assert_eq!(wire["body"], r#""Error processing request""#);
    }
}
