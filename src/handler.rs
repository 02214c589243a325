//! Top-level request handling.
//!
//! [`App`] is the explicitly constructed context every invocation runs
//! against: the store client, the table catalog and the route table. It is
//! built once at start-up and shared read-only across concurrent requests.
//!
//! The chain for one event is:
//!
//! ```text
//! App::handle(event)              ← logs the event, never fails
//!        ↓
//! App::route(&event)              ← (method, path) → Route, or RouteNotFound
//!        ↓
//! Collection::{get_by_key, scan_all, put}
//!        ↓
//! Ok(envelope)  |  Err(Error) → Error::status / Error::client_message
//! ```

use std::sync::Arc;

use tracing::{error, info, warn};

use crate::collection::{Catalog, Collection, CollectionId};
use crate::config::Surface;
use crate::error::{Error, Result};
use crate::event::Event;
use crate::response::{Envelope, build_response};
use crate::router::{Action, Router};
use crate::status::Status;
use crate::store::KeyValueStore;

const DEFAULT_MAX_SCAN_PAGES: usize = 1000;

/// Shared application context.
pub struct App {
    store: Arc<dyn KeyValueStore>,
    catalog: Catalog,
    router: Router,
    surface: Surface,
    max_scan_pages: usize,
}

impl App {
    pub fn new(store: Arc<dyn KeyValueStore>, catalog: Catalog, surface: Surface) -> Self {
        Self {
            store,
            catalog,
            router: Router::for_surface(surface),
            surface,
            max_scan_pages: DEFAULT_MAX_SCAN_PAGES,
        }
    }

    /// Caps the pages a single scan-all may follow. Clamped to at least one.
    pub fn with_max_scan_pages(mut self, pages: usize) -> Self {
        self.max_scan_pages = pages.max(1);
        self
    }

    pub fn surface(&self) -> Surface {
        self.surface
    }

    pub fn collection(&self, id: CollectionId) -> Collection<'_> {
        Collection::new(id, self.catalog.table(id), self.store.as_ref(), self.max_scan_pages)
    }

    /// Handles one event. Every outcome, failures included, is an envelope.
    pub async fn handle(&self, event: Event) -> Envelope {
        info!(?event, "request event");

        match self.route(&event).await {
            Ok(envelope) => envelope,
            Err(err) => {
                match &err {
                    Error::RouteNotFound { .. } => info!("{err}"),
                    Error::Store(source) => error!(error = %source, "{err}"),
                    _ => warn!(error = ?err, "{err}"),
                }
                build_response(err.status(), err.client_message(), self.surface.cors())
            }
        }
    }

    /// Dispatches an event to its collection operation.
    pub async fn route(&self, event: &Event) -> Result<Envelope> {
        let route = event.method()
            .and_then(|method| self.router.lookup(method, event.path()))
            .ok_or_else(|| Error::RouteNotFound {
                method: event.http_method.clone().unwrap_or_default(),
                path: event.path().to_owned(),
            })?;

        let collection = self.collection(route.collection);
        info!(collection = %route.collection, action = ?route.action, "routed");

        match route.action {
            Action::Lookup => {
                let key = collection.key_from_query(event)?;
                let item = collection.get_by_key(&key).await?;
                Ok(self.ok(&item))
            }
            Action::ScanAll => Ok(self.ok(&collection.scan_all().await?)),
            Action::Save => {
                let record = event.json_object()?;
                Ok(self.ok(&collection.put(record).await?))
            }
        }
    }

    fn ok<T: serde::Serialize + ?Sized>(&self, body: &T) -> Envelope {
        build_response(Status::Ok, body, self.surface.cors())
    }
}
