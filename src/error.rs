//! Request-level error type.
//!
//! Every failure a request can hit has its own variant. The top-level
//! handler turns each one into an envelope through [`Error::status`] and
//! [`Error::client_message`]; the variant and its source chain only ever
//! reach the logs.

use thiserror::Error;

use crate::collection::CollectionId;
use crate::status::Status;
use crate::store::{StoreError, UnsupportedNumber};

/// Body sent for every failure that is not a routing miss or a store error.
pub const GENERIC_ERROR_MESSAGE: &str = "Error processing request";

/// Body sent for an unrouted method/path pair.
pub const NOT_FOUND_MESSAGE: &str = "404 Not Found";

#[derive(Debug, Error)]
pub enum Error {
    #[error("no route for {method} {path}")]
    RouteNotFound { method: String, path: String },

    #[error("missing query parameter `{0}`")]
    MissingParameter(&'static str),

    #[error("request has no body")]
    MissingBody,

    #[error("malformed JSON body")]
    MalformedBody(#[source] serde_json::Error),

    #[error("request body is not a JSON object")]
    BodyNotObject,

    #[error(transparent)]
    UnsupportedNumber(#[from] UnsupportedNumber),

    #[error("scan of {collection} still had more records after {pages} pages")]
    ScanPageLimit { collection: CollectionId, pages: usize },

    #[error("store failure")]
    Store(#[from] StoreError),
}

impl Error {
    pub fn status(&self) -> Status {
        match self {
            Self::RouteNotFound { .. } => Status::NotFound,
            _ => Status::BadRequest,
        }
    }

    /// The text the caller gets to see.
    pub fn client_message(&self) -> &str {
        match self {
            Self::RouteNotFound { .. } => NOT_FOUND_MESSAGE,
            Self::Store(e) => e.message(),
            _ => GENERIC_ERROR_MESSAGE,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn route_misses_are_not_found() {
        let err = Error::RouteNotFound { method: "GET".into(), path: "/nope".into() };
        assert_eq!(err.status(), Status::NotFound);
        assert_eq!(err.client_message(), "404 Not Found");
    }

    #[test]
    fn store_failures_surface_their_message() {
        let err = Error::from(StoreError::AccessDenied("User is not authorized".into()));
        assert_eq!(err.status(), Status::BadRequest);
        assert_eq!(err.client_message(), "User is not authorized");
    }

    #[test]
    fn everything_else_is_generic() {
        for err in [
            Error::MissingParameter("mandirName"),
            Error::MissingBody,
            Error::BodyNotObject,
            Error::ScanPageLimit { collection: CollectionId::Kids, pages: 3 },
        ] {
            assert_eq!(err.status(), Status::BadRequest);
            assert_eq!(err.client_message(), GENERIC_ERROR_MESSAGE);
        }
    }
}
