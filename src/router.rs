//! Static route table.
//!
//! One radix tree per HTTP method, each mapping a path to exactly one
//! collection operation. Paths match exactly: `/kids/` is not `/kids`.
//! The table is built once from the [`Surface`] and never changes.

use std::collections::HashMap;

use matchit::Router as MatchitRouter;

use crate::collection::CollectionId;
use crate::config::Surface;
use crate::method::Method;

/// What a route does to its collection.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Action {
    /// Point read keyed by query parameters.
    Lookup,
    /// Read every record.
    ScanAll,
    /// Upsert the JSON body.
    Save,
}

/// The target of one (method, path) pair.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Route {
    pub collection: CollectionId,
    pub action: Action,
}

impl Route {
    pub fn new(collection: CollectionId, action: Action) -> Self {
        Self { collection, action }
    }
}

/// The application route table.
pub struct Router {
    routes: HashMap<Method, MatchitRouter<Route>>,
}

impl Router {
    pub fn new() -> Self {
        Self { routes: HashMap::new() }
    }

    /// The full table for `surface`: one read route per exposed collection,
    /// plus a `POST` upsert on the same path.
    pub fn for_surface(surface: Surface) -> Self {
        read_actions(surface)
            .iter()
            .fold(Self::new(), |router, &(collection, read)| {
                router
                    .on(Method::Get, collection.path(), Route::new(collection, read))
                    .on(Method::Post, collection.path(), Route::new(collection, Action::Save))
            })
    }

    /// Register a route for a method + path pair. Returns `self` for chaining.
    ///
    /// # Panics
    ///
    /// Panics if the path is not a valid route or is already registered for
    /// this method. Route tables are static, so this is a programming error.
    pub fn on(mut self, method: Method, path: &str, route: Route) -> Self {
        self.routes
            .entry(method)
            .or_default()
            .insert(path, route)
            .unwrap_or_else(|e| panic!("invalid route `{method} {path}`: {e}"));
        self
    }

    pub fn lookup(&self, method: Method, path: &str) -> Option<Route> {
        let tree = self.routes.get(&method)?;
        tree.at(path).ok().map(|matched| *matched.value)
    }
}

impl Default for Router {
    fn default() -> Self { Self::new() }
}

fn read_actions(surface: Surface) -> &'static [(CollectionId, Action)] {
    match surface {
        Surface::Roster => &[
            (CollectionId::LeaderInfo, Action::Lookup),
            (CollectionId::SatsangCount, Action::ScanAll),
            (CollectionId::UpcomingEvents, Action::ScanAll),
            (CollectionId::Kids, Action::ScanAll),
        ],
        Surface::Keyed => &[
            (CollectionId::LeaderInfo, Action::Lookup),
            (CollectionId::SatsangCount, Action::Lookup),
            (CollectionId::UpcomingEvents, Action::Lookup),
        ],
    }
}
