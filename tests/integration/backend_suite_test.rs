use std::time::Duration;

use mockito::{Matcher, Mock, Server, ServerGuard};
use serde_json::{json, Value};

use stadtwache_harness::fixtures::NewMessage;
use stadtwache_harness::{HarnessConfig, Outcome, Sequencer};

const TOKEN: &str = "tok-integration";

/// One mocked endpoint
#[derive(Debug, Clone)]
struct Route {
    method: &'static str,
    path: &'static str,
    status: usize,
    body: Value,
    hits: Option<usize>,
}

impl Route {
    fn new(method: &'static str, path: &'static str, status: usize, body: Value) -> Self {
        Self {
            method,
            path,
            status,
            body,
            hits: None,
        }
    }

    fn never_called(mut self) -> Self {
        self.hits = Some(0);
        self
    }

    /// Requests before login must not carry a token
    fn anonymous(&self) -> bool {
        matches!(
            self.path,
            "/api/" | "/api/admin/create-first-user" | "/api/auth/login"
        )
    }
}

fn admin() -> Value {
    json!({
        "id": "admin-1",
        "username": "Administrator",
        "email": "admin@stadtwache.sys",
        "role": "admin",
        "badge_number": "ADMIN001"
    })
}

fn healthy_routes() -> Vec<Route> {
    vec![
        Route::new("GET", "/api/", 200, json!({"message": "Stadtwache API"})),
        Route::new(
            "POST",
            "/api/admin/create-first-user",
            400,
            json!({"detail": "Users already exist. Use regular registration."}),
        ),
        Route::new(
            "POST",
            "/api/auth/login",
            200,
            json!({"access_token": TOKEN, "token_type": "bearer", "user": admin()}),
        ),
        Route::new("GET", "/api/auth/me", 200, admin()),
        Route::new(
            "GET",
            "/api/users/by-status",
            200,
            json!({"Im Dienst": [admin()], "Pause": [], "Einsatz": []}),
        ),
        Route::new(
            "POST",
            "/api/incidents",
            200,
            json!({"id": "inc-42", "title": "Test Incident - Verkehrsunfall", "status": "open"}),
        ),
        Route::new("GET", "/api/incidents", 200, json!([{"id": "inc-42"}])),
        Route::new(
            "PUT",
            "/api/incidents/inc-42/assign",
            200,
            json!({"id": "inc-42", "assigned_to": "admin-1", "status": "in_progress"}),
        ),
        Route::new(
            "POST",
            "/api/persons",
            200,
            json!({"id": "per-1", "first_name": "Max", "last_name": "Mustermann"}),
        ),
        Route::new("GET", "/api/persons", 200, json!([])),
        Route::new(
            "GET",
            "/api/persons/stats/overview",
            200,
            json!({"total_persons": 3, "missing_persons": 2, "wanted_persons": 1, "found_persons": 0, "by_priority": {}}),
        ),
        Route::new(
            "POST",
            "/api/messages",
            200,
            json!({"id": "msg-1", "content": NewMessage::for_channel("general").content}),
        ),
        Route::new("GET", "/api/messages?channel=general", 200, json!([])),
        Route::new(
            "POST",
            "/api/reports",
            200,
            json!({"id": "rep-1", "title": "Schichtbericht - Tagesdienst"}),
        ),
        Route::new("GET", "/api/reports", 200, json!([])),
        Route::new(
            "POST",
            "/api/emergency/broadcast",
            200,
            json!({"success": true, "broadcast_id": "bc-7", "recipients": 4}),
        ),
        Route::new(
            "GET",
            "/api/admin/stats",
            200,
            json!({"total_users": 4, "total_incidents": 9, "open_incidents": 2, "total_messages": 30}),
        ),
        Route::new("GET", "/api/locations/live", 200, json!([])),
        Route::new(
            "GET",
            "/api/app/config",
            200,
            json!({"app_name": "Stadtwache", "organization_name": "Stadt Schwelm", "primary_color": "#1E40AF"}),
        ),
        Route::new("GET", "/api/districts", 200, json!([{"id": "d-1"}])),
        Route::new("GET", "/api/teams", 200, json!([])),
    ]
}

struct Backend {
    server: ServerGuard,
    mocks: Vec<(&'static str, &'static str, Mock)>,
}

impl Backend {
    /// Healthy backend with some routes replaced
    async fn start(overrides: Vec<Route>) -> Self {
        let mut routes = healthy_routes();
        for route in overrides {
            match routes
                .iter_mut()
                .find(|r| r.method == route.method && r.path == route.path)
            {
                Some(existing) => *existing = route,
                None => routes.push(route),
            }
        }

        let mut server = Server::new_async().await;
        let mut mocks = Vec::new();
        for route in routes {
            let (path, query) = match route.path.split_once('?') {
                Some((path, query)) => (path, Some(query)),
                None => (route.path, None),
            };

            let mut mock = server.mock(route.method, path);
            if let Some((key, value)) = query.and_then(|q| q.split_once('=')) {
                mock = mock.match_query(Matcher::UrlEncoded(key.into(), value.into()));
            }
            mock = if route.anonymous() {
                mock.match_header("authorization", Matcher::Missing)
            } else {
                mock.match_header("authorization", format!("Bearer {}", TOKEN).as_str())
            };
            mock = mock
                .with_status(route.status)
                .with_header("content-type", "application/json")
                .with_body(route.body.to_string());
            if let Some(hits) = route.hits {
                mock = mock.expect(hits);
            }

            mocks.push((route.method, route.path, mock.create_async().await));
        }

        Self { server, mocks }
    }

    fn config(&self) -> HarnessConfig {
        let mut config = HarnessConfig::default();
        config.api.base_url = format!("{}/api", self.server.url());
        config.api.request_timeout = Duration::from_secs(5);
        config
    }

    async fn assert_route(&self, method: &str, path: &str) {
        let (_, _, mock) = self
            .mocks
            .iter()
            .find(|(m, p, _)| *m == method && *p == path)
            .expect("route is mounted");
        mock.assert_async().await;
    }
}

#[tokio::test]
async fn test_full_run_against_healthy_backend() {
    let backend = Backend::start(Vec::new()).await;
    let mut sequencer = Sequencer::new(&backend.config()).unwrap();

    let report = sequencer.run().await;

    assert_eq!(report.records.len(), 20);
    assert!(report.all_passed(), "{}", report);
    assert!(report.halted.is_none());

    // Every authenticated route only matches with the bearer header, so a
    // full pass means the token was attached after login and never before.
    assert_eq!(sequencer.session().token(), Some(TOKEN));
    assert_eq!(sequencer.session().user().unwrap().id, "admin-1");

    backend.assert_route("PUT", "/api/incidents/inc-42/assign").await;
    backend.assert_route("GET", "/api/messages?channel=general").await;

    let names: Vec<_> = report.records.iter().map(|r| r.name.as_str()).collect();
    assert_eq!(names[0], "Server Connectivity");
    assert_eq!(names[2], "Authentication Login");
    assert_eq!(names[19], "Districts and Teams");
}

#[tokio::test]
async fn test_bootstrap_accepts_created_and_existing() {
    let existing = Backend::start(Vec::new()).await;
    let report = Sequencer::new(&existing.config()).unwrap().run().await;
    let record = report.record("Create First Admin User").unwrap();
    assert_eq!(record.outcome, Outcome::Passed);
    assert_eq!(record.message, "Admin user already exists (expected)");

    let fresh = Backend::start(vec![Route::new(
        "POST",
        "/api/admin/create-first-user",
        200,
        json!({"id": "admin-1", "email": "admin@stadtwache.sys"}),
    )])
    .await;
    let report = Sequencer::new(&fresh.config()).unwrap().run().await;
    let record = report.record("Create First Admin User").unwrap();
    assert_eq!(record.outcome, Outcome::Passed);
    assert_eq!(record.message, "First admin user created successfully");
}

#[tokio::test]
async fn test_unexpected_bootstrap_rejection_is_not_gating() {
    let backend = Backend::start(vec![Route::new(
        "POST",
        "/api/admin/create-first-user",
        400,
        json!({"detail": "Invalid email"}),
    )])
    .await;

    let report = Sequencer::new(&backend.config()).unwrap().run().await;

    assert_eq!(
        report.record("Create First Admin User").unwrap().outcome,
        Outcome::Failed
    );
    assert_eq!(report.records.len(), 20);
    assert!(report.halted.is_none());
}

#[tokio::test]
async fn test_unhealthy_server_halts_after_connectivity() {
    let backend = Backend::start(vec![
        Route::new("GET", "/api/", 503, json!({"detail": "maintenance"})),
        Route::new("POST", "/api/auth/login", 200, json!({})).never_called(),
    ])
    .await;

    let report = Sequencer::new(&backend.config()).unwrap().run().await;

    assert_eq!(report.records.len(), 1);
    assert_eq!(report.halted.as_deref(), Some("Server Connectivity"));
    assert_eq!(report.records[0].outcome, Outcome::Failed);
    assert!(report.to_string().contains("halted after gating case 'Server Connectivity'"));
    backend.assert_route("POST", "/api/auth/login").await;
}

#[tokio::test]
async fn test_rejected_login_halts_run() {
    let backend = Backend::start(vec![
        Route::new("POST", "/api/auth/login", 401, json!({"detail": "Invalid credentials"})),
        Route::new("GET", "/api/auth/me", 200, admin()).never_called(),
    ])
    .await;
    let mut sequencer = Sequencer::new(&backend.config()).unwrap();

    let report = sequencer.run().await;

    assert_eq!(report.records.len(), 3);
    assert_eq!(report.halted.as_deref(), Some("Authentication Login"));
    let login = report.record("Authentication Login").unwrap();
    assert_eq!(login.details, Some(json!({"kind": "semantic"})));
    assert!(!sequencer.session().is_authenticated());
    backend.assert_route("GET", "/api/auth/me").await;
}

#[tokio::test]
async fn test_failed_incident_creation_skips_assignment() {
    let backend = Backend::start(vec![
        Route::new("POST", "/api/incidents", 500, json!({"detail": "database unavailable"})),
        Route::new("PUT", "/api/incidents/inc-42/assign", 200, json!({})).never_called(),
    ])
    .await;

    let report = Sequencer::new(&backend.config()).unwrap().run().await;

    let assign = report.record("Assign Incident").unwrap();
    assert_eq!(assign.outcome, Outcome::Skipped);
    assert!(assign.message.contains("No test incident available"));
    assert_eq!(
        assign.details,
        Some(json!({"kind": "precondition", "prerequisite": "Create Incident"}))
    );

    // Unrelated features still ran
    assert_eq!(report.records.len(), 20);
    assert_eq!(report.record("Create Person Entry").unwrap().outcome, Outcome::Passed);
    backend.assert_route("PUT", "/api/incidents/inc-42/assign").await;
}

#[tokio::test]
async fn test_assignment_to_someone_else_fails() {
    let backend = Backend::start(vec![Route::new(
        "PUT",
        "/api/incidents/inc-42/assign",
        200,
        json!({"id": "inc-42", "assigned_to": "someone-else"}),
    )])
    .await;

    let report = Sequencer::new(&backend.config()).unwrap().run().await;

    let assign = report.record("Assign Incident").unwrap();
    assert_eq!(assign.outcome, Outcome::Failed);
    assert_eq!(assign.details, Some(json!({"kind": "protocol"})));
}

#[tokio::test]
async fn test_districts_and_teams_reports_both_failures() {
    let backend = Backend::start(vec![
        Route::new("GET", "/api/districts", 500, json!("districts down")),
        Route::new("GET", "/api/teams", 503, json!("teams down")),
    ])
    .await;

    let report = Sequencer::new(&backend.config()).unwrap().run().await;

    let record = report.record("Districts and Teams").unwrap();
    assert_eq!(record.outcome, Outcome::Failed);
    assert!(record.message.starts_with("Failed to get districts/teams: districts: "));
    assert!(record.message.contains("status 500"));
    assert!(record.message.contains("districts down"));
    assert!(record.message.contains("; teams: "));
    assert!(record.message.contains("status 503"));
    assert!(record.message.contains("teams down"));
    assert_eq!(record.details, Some(json!({"kind": "semantic"})));
}

#[tokio::test]
async fn test_message_channel_is_query_encoded() {
    let backend = Backend::start(vec![
        Route::new("GET", "/api/messages?channel=general", 200, json!([])).never_called(),
        Route::new("GET", "/api/messages?channel=Streife & Wache#1", 200, json!([{"id": "m-1"}])),
    ])
    .await;
    let mut config = backend.config();
    config.realtime.channel = "Streife & Wache#1".to_string();

    let report = Sequencer::new(&config).unwrap().run().await;

    let listing = report.record("Get Messages").unwrap();
    assert_eq!(listing.outcome, Outcome::Passed, "{}", listing.message);
    assert_eq!(listing.message, "Retrieved 1 messages");
    backend.assert_route("GET", "/api/messages?channel=general").await;
}

#[tokio::test]
async fn test_unreachable_backend_is_transport_failure() {
    let mut config = HarnessConfig::default();
    config.api.base_url = "http://127.0.0.1:9/api".to_string();
    config.api.request_timeout = Duration::from_secs(2);

    let report = Sequencer::new(&config).unwrap().run().await;

    assert_eq!(report.records.len(), 1);
    assert_eq!(report.records[0].details, Some(json!({"kind": "transport"})));
}
