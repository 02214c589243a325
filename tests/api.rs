//! End-to-end behaviour of `App::handle` against the in-memory store.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use mandir_api::store::{Item, KeyValueStore, MemoryStore, ScanPage, StoreError};
use mandir_api::{App, Catalog, Envelope, Event, Surface};
use serde_json::{Value, json};

fn app_with(store: MemoryStore, surface: Surface) -> App {
    App::new(Arc::new(store), Catalog::default(), surface)
}

fn app(surface: Surface) -> App {
    app_with(Catalog::default().memory_store(), surface)
}

fn body(envelope: &Envelope) -> Value {
    envelope.json_body().expect("body is JSON")
}

async fn post(app: &App, path: &str, record: Value) -> Envelope {
    app.handle(Event::new("POST", path).with_body(record.to_string())).await
}

// ── Leader info ──────────────────────────────────────────────────────────────

#[tokio::test]
async fn post_leader_info_confirms_save() {
    let app = app(Surface::Roster);
    let env = post(&app, "/leaderInfo", json!({ "mandirName": "X", "phone": "555" })).await;

    assert_eq!(env.status_code, 200);
    assert_eq!(
        env.body,
        r#"{"Operation":"SAVE","Message":"SUCCESS","Item":{"mandirName":"X","phone":"555"}}"#
    );
}

#[tokio::test]
async fn put_then_get_returns_the_record() {
    let app = app(Surface::Keyed);
    let record = json!({ "mandirName": "Edison", "phone": "555", "volunteers": 12, "rating": 4.5 });
    post(&app, "/leaderInfo", record.clone()).await;

    let env = app
        .handle(Event::new("GET", "/leaderInfo").with_query("mandirName", "Edison"))
        .await;
    assert_eq!(env.status_code, 200);
    assert_eq!(body(&env), record);
}

#[tokio::test]
async fn later_put_replaces_the_record() {
    let app = app(Surface::Roster);
    post(&app, "/leaderInfo", json!({ "mandirName": "A", "phone": "1" })).await;
    post(&app, "/leaderInfo", json!({ "mandirName": "A", "email": "a@example.org" })).await;

    let env = app
        .handle(Event::new("GET", "/leaderInfo").with_query("mandirName", "A"))
        .await;
    assert_eq!(body(&env), json!({ "mandirName": "A", "email": "a@example.org" }));
}

#[tokio::test]
async fn missing_leader_is_null_not_404() {
    let env = app(Surface::Roster)
        .handle(Event::new("GET", "/leaderInfo").with_query("mandirName", "nobody"))
        .await;
    assert_eq!(env.status_code, 200);
    assert_eq!(body(&env), Value::Null);
}

// ── Scans (roster surface) ───────────────────────────────────────────────────

#[tokio::test]
async fn scan_returns_every_record_across_pages() {
    let app = app_with(Catalog::default().memory_store().with_page_size(4), Surface::Roster);
    for n in 0..11 {
        let env = post(&app, "/satsangCount", json!({
            "mandirName": format!("m{n:02}"),
            "date": "2024-03-01",
            "count": n
        }))
        .await;
        assert_eq!(env.status_code, 200);
    }

    let env = app.handle(Event::new("GET", "/satsangCount")).await;
    let counts = body(&env)["satsang_count"].as_array().cloned().unwrap();
    assert_eq!(counts.len(), 11);
    assert!(counts.iter().all(|c| c["count"].is_u64()));
}

#[tokio::test]
async fn scan_labels_follow_the_collection() {
    let app = app(Surface::Roster);
    post(&app, "/upcomingEvents", json!({ "mandirName": "X", "title": "Holi" })).await;
    post(&app, "/kids", json!({ "name": "Asha", "age": 7 })).await;
    post(&app, "/kids", json!({ "name": "Ravi", "age": 9 })).await;

    let events = app.handle(Event::new("GET", "/upcomingEvents")).await;
    assert_eq!(body(&events), json!({ "upcomingEvents": [{ "mandirName": "X", "title": "Holi" }] }));

    let kids = app.handle(Event::new("GET", "/kids")).await;
    assert_eq!(body(&kids)["kids"].as_array().map(Vec::len), Some(2));
}

#[tokio::test]
async fn reposting_a_kid_does_not_duplicate_it() {
    let app = app(Surface::Roster);
    post(&app, "/kids", json!({ "name": "Asha", "age": 7 })).await;
    post(&app, "/kids", json!({ "name": "Asha", "age": 7 })).await;

    let kids = app.handle(Event::new("GET", "/kids")).await;
    assert_eq!(body(&kids), json!({ "kids": [{ "name": "Asha", "age": 7 }] }));
}

#[tokio::test]
async fn wide_integers_survive_the_round_trip() {
    let app = app(Surface::Keyed);
    let submitted = r#"{"mandirName":"X","id":123456789012345678901}"#;
    let env = app.handle(Event::new("POST", "/leaderInfo").with_body(submitted)).await;
    assert_eq!(env.body, format!(r#"{{"Operation":"SAVE","Message":"SUCCESS","Item":{submitted}}}"#));

    let env = app
        .handle(Event::new("GET", "/leaderInfo").with_query("mandirName", "X"))
        .await;
    assert_eq!(env.body, r#"{"id":123456789012345678901,"mandirName":"X"}"#);
}

#[tokio::test]
async fn empty_collection_scans_to_empty_list() {
    let env = app(Surface::Roster).handle(Event::new("GET", "/kids")).await;
    assert_eq!(env.status_code, 200);
    assert_eq!(body(&env), json!({ "kids": [] }));
}

#[tokio::test]
async fn roster_surface_sends_cors_headers() {
    let env = app(Surface::Roster).handle(Event::new("GET", "/kids")).await;
    assert_eq!(env.header("Content-Type"), Some("application/json"));
    assert_eq!(env.header("Access-Control-Allow-Origin"), Some("*"));
    assert_eq!(env.header("Access-Control-Allow-Credentials"), Some("true"));
}

// ── Keyed surface ────────────────────────────────────────────────────────────

#[tokio::test]
async fn satsang_count_looks_up_by_name_and_date() {
    let app = app(Surface::Keyed);
    post(&app, "/satsangCount", json!({ "mandirName": "X", "date": "2024-03-01", "count": 40 })).await;
    post(&app, "/satsangCount", json!({ "mandirName": "X", "date": "2024-03-08", "count": 52 })).await;

    let env = app
        .handle(
            Event::new("GET", "/satsangCount")
                .with_query("mandirName", "X")
                .with_query("date", "2024-03-08"),
        )
        .await;
    assert_eq!(body(&env)["count"], 52);
    assert_eq!(env.header("Access-Control-Allow-Origin"), None);
}

#[tokio::test]
async fn upcoming_events_looks_up_by_name() {
    let app = app(Surface::Keyed);
    post(&app, "/upcomingEvents", json!({ "mandirName": "X", "title": "Janmashtami" })).await;

    let env = app
        .handle(Event::new("GET", "/upcomingEvents").with_query("mandirName", "X"))
        .await;
    assert_eq!(body(&env)["title"], "Janmashtami");
}

#[tokio::test]
async fn keyed_surface_has_no_kids_route() {
    let env = app(Surface::Keyed).handle(Event::new("GET", "/kids")).await;
    assert_eq!(env.status_code, 404);
}

// ── Failures ─────────────────────────────────────────────────────────────────

#[tokio::test]
async fn unknown_path_is_not_found() {
    let env = app(Surface::Roster).handle(Event::new("GET", "/unknownPath")).await;
    assert_eq!(env.status_code, 404);
    assert_eq!(body(&env), json!("404 Not Found"));
}

#[tokio::test]
async fn unrouted_method_is_not_found() {
    let env = app(Surface::Roster).handle(Event::new("DELETE", "/leaderInfo")).await;
    assert_eq!(env.status_code, 404);
}

#[tokio::test]
async fn missing_parameter_is_generic_error() {
    let env = app(Surface::Roster).handle(Event::new("GET", "/leaderInfo")).await;
    assert_eq!(env.status_code, 400);
    assert_eq!(body(&env), json!("Error processing request"));
}

#[tokio::test]
async fn malformed_body_is_generic_error() {
    let app = app(Surface::Roster);
    let env = app.handle(Event::new("POST", "/kids").with_body("{oops")).await;
    assert_eq!(env.status_code, 400);
    assert_eq!(body(&env), json!("Error processing request"));

    let env = app.handle(Event::new("POST", "/kids")).await;
    assert_eq!(body(&env), json!("Error processing request"));
}

#[tokio::test]
async fn event_without_method_is_not_found() {
    let event: Event = serde_json::from_value(json!({ "path": "/kids" })).unwrap();
    let env = app(Surface::Roster).handle(event).await;
    assert_eq!(env.status_code, 404);
}

/// Throttles every call, counting how often it was asked.
#[derive(Default)]
struct ThrottledStore {
    calls: AtomicUsize,
}

#[async_trait]
impl KeyValueStore for ThrottledStore {
    async fn get_item(&self, _: &str, _: &Item) -> Result<Option<Item>, StoreError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err(StoreError::Throttled("Rate of requests exceeds the allowed throughput.".into()))
    }

    async fn put_item(&self, _: &str, _: Item) -> Result<(), StoreError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err(StoreError::Throttled("Rate of requests exceeds the allowed throughput.".into()))
    }

    async fn scan(&self, _: &str, _: Option<Item>) -> Result<ScanPage, StoreError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err(StoreError::Throttled("Rate of requests exceeds the allowed throughput.".into()))
    }
}

#[tokio::test]
async fn store_failure_surfaces_message_without_retry() {
    let store = Arc::new(ThrottledStore::default());
    let app = App::new(store.clone(), Catalog::default(), Surface::Roster);

    let env = app.handle(Event::new("GET", "/satsangCount")).await;
    assert_eq!(env.status_code, 400);
    assert_eq!(body(&env), json!("Rate of requests exceeds the allowed throughput."));
    assert_eq!(store.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn unrouted_requests_never_touch_the_store() {
    let store = Arc::new(ThrottledStore::default());
    let app = App::new(store.clone(), Catalog::default(), Surface::Keyed);

    app.handle(Event::new("GET", "/kids")).await;
    app.handle(Event::new("PATCH", "/leaderInfo")).await;
    assert_eq!(store.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn oversized_scan_is_cut_off() {
    let app = app_with(Catalog::default().memory_store().with_page_size(1), Surface::Roster)
        .with_max_scan_pages(3);
    for name in ["a", "b", "c", "d", "e"] {
        post(&app, "/kids", json!({ "name": name })).await;
    }

    let env = app.handle(Event::new("GET", "/kids")).await;
    assert_eq!(env.status_code, 400);
    assert_eq!(body(&env), json!("Error processing request"));
}
