//! Inbound gateway event.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::error::Error;
use crate::method::Method;

/// An HTTP-shaped request as the gateway delivers it.
///
/// Only the fields the router reads are modelled; everything else in the
/// gateway payload is ignored on deserialization. `queryStringParameters`
/// is absent (or `null`) when the request had no query string, and `body`
/// is absent for requests without one.
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Event {
    #[serde(default)]
    pub http_method: Option<String>,
    #[serde(default)]
    pub path: Option<String>,
    #[serde(default)]
    pub query_string_parameters: Option<HashMap<String, String>>,
    #[serde(default)]
    pub body: Option<String>,
}

impl Event {
    pub fn new(method: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            http_method: Some(method.into()),
            path: Some(path.into()),
            ..Self::default()
        }
    }

    pub fn with_query(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.query_string_parameters
            .get_or_insert_with(HashMap::new)
            .insert(name.into(), value.into());
        self
    }

    pub fn with_body(mut self, body: impl Into<String>) -> Self {
        self.body = Some(body.into());
        self
    }

    /// `None` when the method is missing or not a standard HTTP method.
    pub fn method(&self) -> Option<Method> {
        self.http_method.as_deref()?.parse().ok()
    }

    pub fn path(&self) -> &str {
        self.path.as_deref().unwrap_or_default()
    }

    pub fn query(&self, name: &str) -> Option<&str> {
        self.query_string_parameters.as_ref()?.get(name).map(String::as_str)
    }

    /// A query parameter the operation cannot run without.
    pub fn required_query(&self, name: &'static str) -> Result<&str, Error> {
        self.query(name).ok_or(Error::MissingParameter(name))
    }

    /// Parses the body as a JSON object.
    pub fn json_object(&self) -> Result<serde_json::Map<String, serde_json::Value>, Error> {
        let body = self.body.as_deref().ok_or(Error::MissingBody)?;
        match serde_json::from_str(body).map_err(Error::MalformedBody)? {
            serde_json::Value::Object(map) => Ok(map),
            _ => Err(Error::BodyNotObject),
        }
    }
}
