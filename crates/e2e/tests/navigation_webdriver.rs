//! Navigation checks against a scripted WebDriver endpoint
//!
//! A small axum server answers the W3C WebDriver commands the dashboard page
//! object issues and models the dashboard: one menu entry per sub-page, and a
//! click shows the matching sub-page. Each test switches on one defect and
//! checks that the navigation checks report it.

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::body::Bytes;
use axum::extract::State;
use axum::http::{Method, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use axum::{Json, Router};
use serde_json::{json, Map, Value};
use tempfile::TempDir;

use yadoms_e2e::browser::{BrowserConfig, BrowserSession};
use yadoms_e2e::navigation::{check_exclusive_page, check_quick_navigation, check_right_pages_displayed};
use yadoms_e2e::{DashboardSuite, E2eError};

const ELEMENT_KEY: &str = "element-6066-11e4-a52e-4f735466cecf";

/// In-memory dashboard behind the WebDriver endpoint
struct FakeDashboard {
    suite: DashboardSuite,
    entries: usize,
    visible: Vec<bool>,
    /// Clicking shows the target page and hides the others
    exclusive: bool,
    /// Menu entry whose click does nothing
    dead_entry: Option<usize>,
    events: Vec<String>,
}

impl FakeDashboard {
    fn new(suite: DashboardSuite) -> Self {
        let pages = suite.expected_pages.len();
        let mut visible = vec![false; pages];
        if let Some(first) = visible.first_mut() {
            *first = true;
        }
        Self {
            suite,
            entries: pages,
            visible,
            exclusive: true,
            dead_entry: None,
            events: Vec::new(),
        }
    }

    fn page_index(&self, id: &str) -> Option<usize> {
        self.suite.expected_pages.iter().position(|p| p == id)
    }

    fn entry_index(id: &str) -> Option<usize> {
        id.strip_prefix("entry-")?.parse().ok()
    }

    fn known_id(&self, id: &str) -> bool {
        id == self.suite.open_button_id
            || id == self.suite.dashboard_id
            || id == self.suite.menu_id
            || id == self.suite.sub_window_id
            || self.page_index(id).is_some()
    }

    /// Element ids matched by a locator, searched below `scope`
    fn find(&self, scope: Option<&str>, locator: &Value) -> Vec<String> {
        let value = locator["value"].as_str().unwrap_or_default();

        if value == "./child::*" && scope == Some(self.suite.menu_id.as_str()) {
            return (0..self.entries).map(|i| format!("entry-{}", i)).collect();
        }
        if value == "div" && scope == Some(self.suite.sub_window_id.as_str()) {
            return self.suite.expected_pages.clone();
        }

        match quoted_id(value) {
            Some(id) if self.known_id(&id) => vec![id],
            _ => Vec::new(),
        }
    }

    fn click(&mut self, element: &str) {
        self.events.push(format!("click:{}", element));

        let Some(index) = Self::entry_index(element) else {
            return;
        };
        if self.dead_entry == Some(index) || index >= self.visible.len() {
            return;
        }
        if self.exclusive {
            self.visible.iter_mut().for_each(|v| *v = false);
        }
        self.visible[index] = true;
    }

    fn displayed(&mut self, element: &str) -> bool {
        match self.page_index(element) {
            Some(index) => {
                self.events.push(format!("displayed:{}", element));
                self.visible[index]
            }
            None => true,
        }
    }

    fn text(&self, element: &str) -> String {
        match Self::entry_index(element) {
            Some(index) => format!(" Entry {} ", index),
            None => String::new(),
        }
    }

    fn position(&self, event: &str) -> usize {
        self.events
            .iter()
            .position(|e| e == event)
            .unwrap_or_else(|| panic!("no '{}' in {:?}", event, self.events))
    }
}

type Shared = Arc<Mutex<FakeDashboard>>;

/// The id in `[id="..."]` or `[@id='...']`
fn quoted_id(selector: &str) -> Option<String> {
    let rest = &selector[selector.find("id=")? + 3..];
    let quote = rest.chars().next()?;
    let rest = &rest[quote.len_utf8()..];
    Some(rest[..rest.find(quote)?].to_string())
}

fn element(id: &str) -> Value {
    let mut reference = Map::new();
    reference.insert(ELEMENT_KEY.to_string(), json!(id));
    Value::Object(reference)
}

fn ok(value: Value) -> Response {
    Json(json!({ "value": value })).into_response()
}

fn no_such_element(locator: &Value) -> Response {
    let body = json!({
        "value": {
            "error": "no such element",
            "message": format!("no element matches {}", locator),
            "stacktrace": "",
        }
    });
    (StatusCode::NOT_FOUND, Json(body)).into_response()
}

async fn webdriver(State(dashboard): State<Shared>, method: Method, uri: Uri, body: Bytes) -> Response {
    let params: Value = serde_json::from_slice(&body).unwrap_or(Value::Null);
    let segments: Vec<&str> = uri.path().split('/').filter(|s| !s.is_empty()).collect();
    let mut dashboard = dashboard.lock().unwrap();

    match (method.as_str(), segments.as_slice()) {
        ("POST", ["session"]) => ok(json!({
            "sessionId": "dashboard-session",
            "capabilities": { "browserName": "chrome" },
        })),
        ("POST", ["session", _, "element"]) => match dashboard.find(None, &params).first() {
            Some(id) => ok(element(id)),
            None => no_such_element(&params),
        },
        ("POST", ["session", _, "element", scope, "element"]) => {
            match dashboard.find(Some(*scope), &params).first() {
                Some(id) => ok(element(id)),
                None => no_such_element(&params),
            }
        }
        ("POST", ["session", _, "element", scope, "elements"]) => {
            let found: Vec<Value> = dashboard.find(Some(*scope), &params).iter().map(|id| element(id)).collect();
            ok(Value::Array(found))
        }
        ("POST", ["session", _, "element", id, "click"]) => {
            dashboard.click(id);
            ok(Value::Null)
        }
        ("GET", ["session", _, "element", id, "text"]) => ok(json!(dashboard.text(id))),
        ("GET", ["session", _, "element", id, "displayed"]) => ok(json!(dashboard.displayed(id))),
        ("GET", ["session", _, "element", id, "attribute", "id"]) => {
            if FakeDashboard::entry_index(id).is_some() {
                ok(Value::Null)
            } else {
                ok(json!(id))
            }
        }
        // timeouts, session deletion
        _ => ok(Value::Null),
    }
}

struct Harness {
    dashboard: Shared,
    browser: BrowserSession,
    _screenshots: TempDir,
}

async fn start(suite: &DashboardSuite, setup: impl FnOnce(&mut FakeDashboard)) -> Harness {
    let mut fake = FakeDashboard::new(suite.clone());
    setup(&mut fake);
    let dashboard: Shared = Arc::new(Mutex::new(fake));

    let app = Router::new().fallback(webdriver).with_state(dashboard.clone());
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr: SocketAddr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    let screenshots = TempDir::new().expect("create temp dir");
    let browser = BrowserSession::launch(BrowserConfig {
        webdriver_url: format!("http://{}", addr),
        implicit_wait: Duration::from_millis(100),
        screenshot_dir: screenshots.path().to_path_buf(),
        ..Default::default()
    })
    .await
    .expect("open session on scripted endpoint");

    Harness {
        dashboard,
        browser,
        _screenshots: screenshots,
    }
}

fn short_timeouts() -> DashboardSuite {
    DashboardSuite {
        page_timeout_ms: 200,
        poll_interval_ms: 20,
        ..Default::default()
    }
}

fn assertion_message(result: Result<impl std::fmt::Debug, E2eError>) -> String {
    match result {
        Err(E2eError::AssertionFailed(msg)) => msg,
        other => panic!("expected assertion failure, got {:?}", other),
    }
}

#[tokio::test]
async fn right_pages_checked_after_each_click() {
    let suite = short_timeouts();
    let harness = start(&suite, |_| {}).await;

    check_right_pages_displayed(&harness.browser, &suite).await.unwrap();

    let dashboard = harness.dashboard.lock().unwrap();
    for (index, page) in suite.expected_pages.iter().enumerate() {
        let clicked = dashboard.position(&format!("click:entry-{}", index));
        let checked = dashboard.position(&format!("displayed:{}", page));
        assert!(clicked < checked, "{} checked before its click", page);
        if index + 1 < suite.expected_pages.len() {
            assert!(checked < dashboard.position(&format!("click:entry-{}", index + 1)));
        }
    }
    drop(dashboard);
    harness.browser.close().await.unwrap();
}

#[tokio::test]
async fn menu_size_mismatch_stops_before_clicking() {
    let suite = short_timeouts();
    let harness = start(&suite, |d| d.entries = 8).await;

    let msg = assertion_message(check_right_pages_displayed(&harness.browser, &suite).await);

    assert_eq!(msg, "dashboard menu has 8 entries, expected 9");
    let dashboard = harness.dashboard.lock().unwrap();
    assert!(!dashboard.events.iter().any(|e| e.starts_with("click:entry-")));
}

#[tokio::test]
async fn page_that_never_shows_names_page_and_index() {
    let suite = short_timeouts();
    let harness = start(&suite, |d| d.dead_entry = Some(3)).await;

    let msg = assertion_message(check_right_pages_displayed(&harness.browser, &suite).await);

    assert!(msg.contains("dashboard-devices"), "{}", msg);
    assert!(msg.contains("index 3"), "{}", msg);
    let dashboard = harness.dashboard.lock().unwrap();
    assert!(!dashboard.events.contains(&"click:entry-4".to_string()));
}

#[tokio::test]
async fn quick_navigation_counts_after_last_click() {
    let suite = short_timeouts();
    let harness = start(&suite, |_| {}).await;

    let shown = check_quick_navigation(&harness.browser, &suite).await.unwrap();

    assert_eq!(shown, "dashboard-about");
    let dashboard = harness.dashboard.lock().unwrap();
    let last_click = dashboard.position("click:entry-8");
    let first_check = dashboard
        .events
        .iter()
        .position(|e| e.starts_with("displayed:"))
        .unwrap();
    assert!(last_click < first_check);
}

#[tokio::test]
async fn quick_navigation_reports_stacked_pages() {
    let suite = short_timeouts();
    let harness = start(&suite, |d| d.exclusive = false).await;

    let msg = assertion_message(check_quick_navigation(&harness.browser, &suite).await);

    assert!(msg.starts_with("9 pages displayed, expected 1"), "{}", msg);
}

#[tokio::test]
async fn devices_page_shown_alone() {
    let suite = short_timeouts();
    let harness = start(&suite, |_| {}).await;

    check_exclusive_page(&harness.browser, &suite, "dashboard-devices")
        .await
        .unwrap();

    let dashboard = harness.dashboard.lock().unwrap();
    assert!(dashboard.events.contains(&"click:entry-3".to_string()));
}

#[tokio::test]
async fn devices_page_with_leftover_summary_fails() {
    let suite = short_timeouts();
    let harness = start(&suite, |d| d.exclusive = false).await;

    let msg = assertion_message(check_exclusive_page(&harness.browser, &suite, "dashboard-devices").await);

    assert_eq!(msg, "page 'dashboard-devices' displayed together with: dashboard-summary");
}
