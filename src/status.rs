//! Status codes an envelope can carry.
//!
//! The API answers with exactly three codes: `200` for every successful
//! operation (including a lookup that found nothing), `404` for an
//! unrouted method/path pair, and `400` for every other failure.

/// Envelope status code.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Status {
    Ok,         // 200
    BadRequest, // 400
    NotFound,   // 404
}

impl Status {
    pub fn as_u16(self) -> u16 {
        match self {
            Self::Ok         => 200,
            Self::BadRequest => 400,
            Self::NotFound   => 404,
        }
    }
}
