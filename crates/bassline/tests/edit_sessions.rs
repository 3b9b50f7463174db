//! End-to-end edit sessions through the HTTP transport.

use std::sync::Arc;
use std::time::Duration;

use bassline::seed::seed_demo;
use bassline::App;
use bassline_config::BasslineConfig;
use bassline_core::fixtures::ManualClock;
use bassline_server::{ShutdownSignal, Transport};
use bassline_session::{Fields, ResourceKey, ResourceKind, ResourceStore};
use bytes::Bytes;
use http::header::{CONTENT_TYPE, COOKIE, HOST, LOCATION, RETRY_AFTER, SET_COOKIE};
use http::{HeaderMap, Method, Request, StatusCode};
use http_body_util::{BodyExt, Full};
use serde_json::{json, Value};

const THEME: &str = "/site/admin/theme";
const START: i64 = 1_700_000_000;

struct Harness {
    app: App,
    clock: Arc<ManualClock>,
    transport: Transport,
}

struct Response {
    status: StatusCode,
    headers: HeaderMap,
    body: Value,
}

impl Response {
    fn key(&self, field: &str) -> String {
        self.body[field]
            .as_str()
            .unwrap_or_else(|| panic!("no {field} in {}", self.body))
            .to_string()
    }
}

fn harness_with(config: BasslineConfig) -> Harness {
    let clock = Arc::new(ManualClock::new(START));
    let app = App::with_clock(config, clock.clone());
    seed_demo(app.store(), app.directory());
    app.store().insert(
        ResourceKey::new(ResourceKind::User, 4),
        fields(json!({ "username": "painter", "isSuperuser": false, "groups": [2], "primaryGroup": 2 })),
    );
    app.directory().add_login("painter", 4);
    let transport = app.transport();
    Harness {
        app,
        clock,
        transport,
    }
}

fn fields(value: Value) -> Fields {
    value.as_object().cloned().unwrap_or_default()
}

fn harness() -> Harness {
    harness_with(BasslineConfig::default())
}

impl Harness {
    async fn call(&self, method: Method, uri: &str, user: Option<&str>, body: Option<Value>) -> Response {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(user) = user {
            builder = builder.header(COOKIE, format!("login={user}"));
        }
        let body = body.map_or_else(Bytes::new, |b| Bytes::from(b.to_string()));
        let request = builder.body(Full::new(body)).unwrap();

        let response = self.transport.handle(request).await;
        let status = response.status();
        let headers = response.headers().clone();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        Response {
            status,
            headers,
            body,
        }
    }

    async fn open(&self, user: &str) -> Response {
        self.call(Method::GET, &format!("{THEME}/edit?id=1"), Some(user), None)
            .await
    }

    async fn save(&self, user: &str, save_key: &str, name: &str) -> Response {
        let body = json!({ "id": 1, "saveKey": save_key, "changes": { "name": name } });
        self.call(Method::POST, &format!("{THEME}/save"), Some(user), Some(body))
            .await
    }

    fn theme_name(&self) -> Value {
        self.app
            .store()
            .peek(ResourceKey::new(ResourceKind::Theme, 1))
            .unwrap()["name"]
            .clone()
    }
}

async fn post_form(transport: &Transport, uri: &str, form: &str) -> http::Response<Bytes> {
    let request = Request::post(uri)
        .header(CONTENT_TYPE, "application/x-www-form-urlencoded")
        .body(Full::new(Bytes::from(form.to_string())))
        .unwrap();
    let response = transport.handle(request).await;
    let (parts, body) = response.into_parts();
    let bytes = body.collect().await.unwrap().to_bytes();
    http::Response::from_parts(parts, bytes)
}

fn assert_conflict(response: &Response, holder: &str) {
    assert_eq!(response.status, StatusCode::CONFLICT, "{}", response.body);
    assert_eq!(response.body["error"]["code"], "CONFLICT");
    assert_eq!(response.body["error"]["details"]["holder_name"], holder);
}

#[tokio::test]
async fn test_second_editor_is_refused_and_stale_key_conflicts() {
    let h = harness();

    let opened = h.open("designer").await;
    assert_eq!(opened.status, StatusCode::OK);
    assert_eq!(opened.body["resource"]["name"], "Light");
    let k1 = opened.key("saveKey");

    h.clock.advance(1);
    let refused = h.open("painter").await;
    assert_conflict(&refused, "designer");
    assert_eq!(
        refused.body["error"]["message"],
        "This theme is being edited by 'designer'. Try again when the theme is no longer being edited."
    );

    let saved = h.save("designer", &k1, "Morning").await;
    assert_eq!(saved.status, StatusCode::OK);
    let k2 = saved.key("newSaveKey");
    assert_ne!(k1, k2);
    assert_eq!(h.theme_name(), "Morning");

    let stale = h.save("designer", &k1, "Evening").await;
    assert_conflict(&stale, "designer");
    assert_eq!(h.theme_name(), "Morning");

    let fresh = h.save("designer", &k2, "Evening").await;
    assert_eq!(fresh.status, StatusCode::OK);
    assert_eq!(h.theme_name(), "Evening");
}

#[tokio::test]
async fn test_grace_elapsed_hands_the_theme_over() {
    let h = harness();

    let k1 = h.open("designer").await.key("saveKey");

    h.clock.advance(11);
    let taken = h.open("painter").await;
    assert_eq!(taken.status, StatusCode::OK);

    let lost = h.save("designer", &k1, "Mine").await;
    assert_conflict(&lost, "painter");
    let message = lost.body["error"]["message"].as_str().unwrap();
    assert!(message.contains("was recently edited by 'painter'"), "{message}");
    assert_eq!(h.theme_name(), "Light");

    let painter_key = taken.key("saveKey");
    assert_eq!(h.save("painter", &painter_key, "Theirs").await.status, StatusCode::OK);
}

#[tokio::test]
async fn test_malformed_stored_token_fails_closed() {
    let h = harness();
    let key = ResourceKey::new(ResourceKind::Theme, 1);
    h.app.store().set_raw_token(key, Some("not a token".to_string()));

    let response = h.open("designer").await;
    assert_conflict(&response, "unknown");
    assert_eq!(response.body["error"]["details"]["holder_id"], Value::Null);
    assert_eq!(h.app.store().raw_token(key).as_deref(), Some("not a token"));
}

#[tokio::test]
async fn test_held_row_is_unavailable_with_retry_after() {
    let mut config = BasslineConfig::default();
    config.session.lock_timeout_ms = 20;
    let h = harness_with(config);

    let key = ResourceKey::new(ResourceKind::Theme, 1);
    let guard = h.app.store().acquire(key).await.unwrap();

    let response = h.open("designer").await;
    assert_eq!(response.status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(response.headers[RETRY_AFTER], "5");
    assert_eq!(response.body["error"]["code"], "STORAGE_UNAVAILABLE");

    drop(guard);
    assert_eq!(h.open("designer").await.status, StatusCode::OK);
}

#[tokio::test]
async fn test_create_then_edit_new_theme() {
    let h = harness();

    let created = h
        .call(Method::POST, &format!("{THEME}/create"), Some("designer"), None)
        .await;
    assert_eq!(created.status, StatusCode::SEE_OTHER);
    let location = created.headers[LOCATION].to_str().unwrap().to_string();
    assert_eq!(location, "/site/admin/theme/edit?id=3");

    let opened = h.call(Method::GET, &location, Some("designer"), None).await;
    assert_eq!(opened.body["resource"]["name"], "New Theme");

    let listed = h.call(Method::GET, &format!("{THEME}/"), Some("designer"), None).await;
    let names: Vec<_> = listed.body["items"]
        .as_array()
        .unwrap()
        .iter()
        .map(|item| item["name"].clone())
        .collect();
    assert_eq!(names, [json!("Light"), json!("Dark"), json!("New Theme")]);
}

#[tokio::test]
async fn test_invalid_save_is_rejected_without_writing() {
    let h = harness();
    let k1 = h.open("designer").await.key("saveKey");

    let response = h.save("designer", &k1, "Not/Allowed").await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);
    assert!(response.body["error"]["details"]["fields"]["name"].is_array());
    assert_eq!(h.theme_name(), "Light");

    // the key was not consumed
    assert_eq!(h.save("designer", &k1, "Allowed").await.status, StatusCode::OK);
}

#[tokio::test]
async fn test_superuser_flag_cannot_be_granted() {
    let h = harness();
    let opened = h
        .call(Method::GET, "/site/admin/users/edit?id=2", Some("admin"), None)
        .await;
    let save_key = opened.key("saveKey");

    let body = json!({ "id": 2, "saveKey": save_key, "changes": { "isSuperuser": true } });
    let response = h
        .call(Method::POST, "/site/admin/users/save", Some("admin"), Some(body))
        .await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_auth_config_singleton() {
    let h = harness();
    let opened = h
        .call(Method::GET, "/site/admin/auth_config/", Some("admin"), None)
        .await;
    assert_eq!(opened.status, StatusCode::OK);
    assert_eq!(opened.body["resource"]["noauthEnabled"], true);

    let body = json!({ "saveKey": opened.key("saveKey"), "changes": { "googleEnabled": true } });
    let saved = h
        .call(Method::POST, "/site/admin/auth_config/save", Some("admin"), Some(body))
        .await;
    assert_eq!(saved.status, StatusCode::OK);
    assert_eq!(
        h.app.store().peek(ResourceKey::auth_config()).unwrap()["googleEnabled"],
        true
    );
}

#[tokio::test]
async fn test_status_mapping() {
    let h = harness();

    let anonymous = h.call(Method::GET, &format!("{THEME}/"), None, None).await;
    assert_eq!(anonymous.status, StatusCode::UNAUTHORIZED);

    let forbidden = h
        .call(Method::GET, "/site/admin/users/", Some("designer"), None)
        .await;
    assert_eq!(forbidden.status, StatusCode::FORBIDDEN);
    assert_eq!(forbidden.body["error"]["details"]["capability"], "edit_security");

    let missing = h.call(Method::GET, "/nowhere/", None, None).await;
    assert_eq!(missing.status, StatusCode::NOT_FOUND);
    let request_id = missing.headers["x-request-id"].to_str().unwrap();
    assert_eq!(missing.body["request_id"], request_id);
    assert_eq!(missing.headers[CONTENT_TYPE], "application/json");

    let deep = h
        .call(Method::GET, &format!("{THEME}/edit/extra"), Some("designer"), None)
        .await;
    assert_eq!(deep.status, StatusCode::NOT_FOUND);

    let bad_json = h
        .call(Method::POST, &format!("{THEME}/save"), Some("designer"), Some(json!([1])))
        .await;
    assert_eq!(bad_json.status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_application_directory_redirect() {
    let h = harness();
    let response = h.call(Method::GET, "/site", None, None).await;
    assert_eq!(response.status, StatusCode::MOVED_PERMANENTLY);
    assert_eq!(response.headers[LOCATION], "/site/");

    let landing = h.call(Method::GET, "/site/", None, None).await;
    assert_eq!(landing.body["siteName"], "Bassline");
}

#[tokio::test]
async fn test_over_tcp() {
    use hyper_util::rt::TokioIo;
    use tokio::net::TcpStream;

    let mut config = BasslineConfig::default();
    config.server.http_addr = "127.0.0.1:0".to_string();
    config.server.shutdown_timeout_secs = 1;
    let h = harness_with(config);

    let bound = h.app.server().bind().await.unwrap();
    let addr = bound.local_addr();
    let shutdown = ShutdownSignal::new();
    let server = tokio::spawn(bound.serve(shutdown.clone()));

    let stream = TcpStream::connect(addr).await.unwrap();
    let (mut sender, conn) = hyper::client::conn::http1::handshake(TokioIo::new(stream))
        .await
        .unwrap();
    tokio::spawn(conn);

    let request = Request::get(format!("{THEME}/edit?id=2"))
        .header(HOST, addr.to_string())
        .header(COOKIE, "login=designer")
        .body(Full::new(Bytes::new()))
        .unwrap();
    let response = sender.send_request(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = response.into_body().collect().await.unwrap().to_bytes();
    let body: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(body["resource"]["name"], "Dark");

    drop(sender);
    shutdown.trigger();
    tokio::time::timeout(Duration::from_secs(5), server)
        .await
        .unwrap()
        .unwrap();
}

#[tokio::test]
async fn test_revoked_group_capability_applies_to_next_request() {
    let h = harness();
    assert_eq!(h.open("designer").await.status, StatusCode::OK);

    h.app.store().insert(
        ResourceKey::new(ResourceKind::Group, 2),
        fields(json!({ "groupname": "designers", "capabilities": [] })),
    );

    let refused = h.open("designer").await;
    assert_eq!(refused.status, StatusCode::FORBIDDEN);
    assert_eq!(refused.body["error"]["details"]["capability"], "edit_themes");
}

#[tokio::test]
async fn test_renamed_holder_appears_in_later_conflicts() {
    let h = harness();
    assert_eq!(h.open("designer").await.status, StatusCode::OK);

    h.app.store().insert(
        ResourceKey::new(ResourceKind::User, 2),
        fields(json!({ "username": "artist", "isSuperuser": false, "groups": [2], "primaryGroup": 2 })),
    );

    h.clock.advance(1);
    let refused = h.open("painter").await;
    assert_conflict(&refused, "artist");
    assert_eq!(refused.body["error"]["details"]["holder_id"], 2);
}

#[tokio::test]
async fn test_sign_in_edit_and_sign_out() {
    let h = harness();

    let page = h.call(Method::GET, "/login/", None, None).await;
    assert_eq!(page.status, StatusCode::OK);
    assert_eq!(page.body["methods"][0]["key"], "noauth");

    let signed_in = post_form(
        &h.transport,
        "/login/attempt?auth=noauth&redirect_uri=/site/admin/theme/",
        "user-id=2",
    )
    .await;
    assert_eq!(signed_in.status(), StatusCode::SEE_OTHER);
    assert_eq!(signed_in.headers()[LOCATION], "/site/admin/theme/");
    let cookie = signed_in.headers()[SET_COOKIE].to_str().unwrap();
    let token = cookie
        .strip_prefix("login=")
        .and_then(|rest| rest.split(';').next())
        .unwrap()
        .to_string();

    let opened = h.open(&token).await;
    assert_eq!(opened.status, StatusCode::OK);
    assert_eq!(opened.body["resource"]["name"], "Light");

    let request = Request::post("/logout/")
        .header(COOKIE, format!("login={token}"))
        .body(Full::new(Bytes::new()))
        .unwrap();
    let signed_out = h.transport.handle(request).await;
    assert_eq!(signed_out.status(), StatusCode::SEE_OTHER);
    assert!(signed_out.headers()[SET_COOKIE].to_str().unwrap().contains("Max-Age=0"));

    assert_eq!(h.open(&token).await.status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_configured_app_serves_its_index() {
    let mut config = BasslineConfig::default();
    config.site.apps.insert(
        "blog".to_string(),
        bassline_config::AppSection {
            title: "Blog".to_string(),
            capabilities: vec!["publish".to_string()],
        },
    );
    let h = harness_with(config);

    let index = h.call(Method::GET, "/blog/", Some("admin"), None).await;
    assert_eq!(index.status, StatusCode::OK, "{}", index.body);
    assert_eq!(index.body["app"], "blog");
    assert_eq!(index.body["capabilities"]["publish"], true);

    let designer = h.call(Method::GET, "/blog/", Some("designer"), None).await;
    assert_eq!(designer.body["capabilities"]["publish"], false);

    let landing = h.call(Method::GET, "/site/", None, None).await;
    assert_eq!(landing.body["apps"][0]["path"], "/blog/");
}
