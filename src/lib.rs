//! # mandir-api
//!
//! Request router and data-access layer for a handful of mandir record
//! collections: leader contact info, satsang attendance counts, upcoming
//! events and the kids roster.
//!
//! An HTTP-shaped [`Event`] comes in, the [`Router`] picks exactly one
//! collection operation for its method and path, the operation performs a
//! single read, write or full scan against the [`KeyValueStore`], and an
//! [`Envelope`] with a JSON body goes back out. Nothing else happens.
//!
//! ## Routes
//!
//! | Method | Path | Operation |
//! |---|---|---|
//! | `GET`  | `/leaderInfo?mandirName=` | point lookup |
//! | `GET`  | `/satsangCount` | scan-all, or lookup by `mandirName` + `date` |
//! | `GET`  | `/upcomingEvents` | scan-all, or lookup by `mandirName` |
//! | `GET`  | `/kids` | scan-all ([`Surface::Roster`] only) |
//! | `POST` | any of the above | upsert the JSON body |
//!
//! Which read each path performs depends on the [`Surface`] chosen at
//! start-up.
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use mandir_api::{App, Catalog, Event, Surface};
//!
//! # async fn run() {
//! let catalog = Catalog::default();
//! let store = Arc::new(catalog.memory_store());
//! let app = App::new(store, catalog, Surface::Roster);
//!
//! let envelope = app
//!     .handle(Event::new("GET", "/leaderInfo").with_query("mandirName", "Edison"))
//!     .await;
//! assert_eq!(envelope.status_code, 200);
//! # }
//! ```

mod collection;
mod config;
mod error;
mod event;
mod handler;
mod method;
mod number;
mod response;
mod router;
mod server;
mod status;

pub mod store;

pub use collection::{Catalog, Collection, CollectionId, SaveConfirmation, ScanResult};
pub use config::{Config, RunMode, StoreBackend, Surface};
pub use error::{Error, GENERIC_ERROR_MESSAGE, NOT_FOUND_MESSAGE, Result};
pub use event::Event;
pub use handler::App;
pub use method::Method;
pub use number::{Normalized, normalize};
pub use response::{Envelope, EnvelopeBuilder, build_response};
pub use router::{Action, Route, Router};
pub use server::Server;
pub use status::Status;
pub use store::KeyValueStore;
