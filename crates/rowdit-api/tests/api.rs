use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum::body::Body;
use axum::http::{Method, Request, StatusCode, header};
use http_body_util::BodyExt;
use serde_json::{Value, json};
use tower::ServiceExt;

use rowdit_api::{ApiConfig, AppStateInner, router};
use rowdit_db::Database;
use rowdit_kv::{KeyValueStore, MemoryStore};

struct TestApp {
    router: Router,
    db: Arc<Database>,
    kv: Arc<MemoryStore>,
}

struct Reply {
    status: StatusCode,
    cookie: Option<String>,
    body: Value,
}

impl TestApp {
    fn new() -> Self {
        let db = Arc::new(Database::open_in_memory().unwrap());
        let kv = Arc::new(MemoryStore::new());
        let state = Arc::new(AppStateInner {
            db: db.clone(),
            kv: kv.clone(),
            config: ApiConfig::default(),
        });
        Self {
            router: router(state),
            db,
            kv,
        }
    }

    async fn send(&self, method: Method, uri: &str, body: Option<Value>, cookie: Option<&str>) -> Reply {
        let mut req = Request::builder().method(method).uri(uri);
        if let Some(cookie) = cookie {
            req = req.header(header::COOKIE, cookie);
        }
        let req = match body {
            Some(body) => req
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => req.body(Body::empty()).unwrap(),
        };

        let resp = self.router.clone().oneshot(req).await.unwrap();
        let status = resp.status();
        let cookie = resp
            .headers()
            .get(header::SET_COOKIE)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.split(';').next())
            .map(str::to_string);
        let bytes = resp.into_body().collect().await.unwrap().to_bytes();
        let body = serde_json::from_slice(&bytes)
            .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into_owned()));

        Reply { status, cookie, body }
    }

    /// Register a user and return its id and session cookie.
    async fn register(&self, username: &str) -> (i64, String) {
        let reply = self
            .send(
                Method::POST,
                "/auth/register",
                Some(json!({
                    "username": username,
                    "email": format!("{username}@example.com"),
                    "password": "hunter22",
                })),
                None,
            )
            .await;
        assert_eq!(reply.status, StatusCode::CREATED, "{}", reply.body);
        let id = reply.body["user"]["id"].as_i64().unwrap();
        (id, reply.cookie.expect("session cookie"))
    }

    async fn create_post(&self, cookie: &str, title: &str) -> i64 {
        let reply = self
            .send(Method::POST, "/posts", Some(json!({ "title": title })), Some(cookie))
            .await;
        assert_eq!(reply.status, StatusCode::CREATED, "{}", reply.body);
        reply.body["id"].as_i64().unwrap()
    }

    async fn vote(&self, cookie: &str, post_id: i64, value: i64) -> Reply {
        self.send(
            Method::POST,
            &format!("/posts/{post_id}/vote"),
            Some(json!({ "value": value })),
            Some(cookie),
        )
        .await
    }
}

#[tokio::test]
async fn hello() {
    let app = TestApp::new();
    let reply = app.send(Method::GET, "/hello", None, None).await;
    assert_eq!(reply.status, StatusCode::OK);
    assert_eq!(reply.body, Value::String("hello".into()));
}

#[tokio::test]
async fn register_logs_the_user_in() {
    let app = TestApp::new();
    let (id, cookie) = app.register("carol").await;
    assert!(cookie.starts_with("qid="));

    let me = app.send(Method::GET, "/auth/me", None, Some(&cookie)).await;
    assert_eq!(me.status, StatusCode::OK);
    assert_eq!(me.body["id"], id);
    assert_eq!(me.body["username"], "carol");
    assert!(me.body.get("password").is_none());

    let anonymous = app.send(Method::GET, "/auth/me", None, None).await;
    assert_eq!(anonymous.body, Value::Null);
}

#[tokio::test]
async fn register_reports_field_errors() {
    let app = TestApp::new();
    let reply = app
        .send(
            Method::POST,
            "/auth/register",
            Some(json!({ "username": "ab", "email": "nope", "password": "123" })),
            None,
        )
        .await;

    assert_eq!(reply.status, StatusCode::BAD_REQUEST);
    let fields: Vec<&str> = reply.body["errors"]
        .as_array()
        .unwrap()
        .iter()
        .map(|e| e["field"].as_str().unwrap())
        .collect();
    assert_eq!(fields, vec!["email"]);
    assert!(reply.cookie.is_none());
}

#[tokio::test]
async fn duplicate_username_is_a_conflict() {
    let app = TestApp::new();
    app.register("dave").await;

    let reply = app
        .send(
            Method::POST,
            "/auth/register",
            Some(json!({ "username": "dave", "email": "other@example.com", "password": "hunter22" })),
            None,
        )
        .await;

    assert_eq!(reply.status, StatusCode::CONFLICT);
    assert_eq!(reply.body["errors"][0]["field"], "username");
}

#[tokio::test]
async fn login_by_username_or_email() {
    let app = TestApp::new();
    app.register("erin").await;

    for ident in ["erin", "erin@example.com"] {
        let reply = app
            .send(
                Method::POST,
                "/auth/login",
                Some(json!({ "username_or_email": ident, "password": "hunter22" })),
                None,
            )
            .await;
        assert_eq!(reply.status, StatusCode::OK);
        assert_eq!(reply.body["user"]["username"], "erin");
        assert!(reply.cookie.is_some());
    }

    let wrong = app
        .send(
            Method::POST,
            "/auth/login",
            Some(json!({ "username_or_email": "erin", "password": "nope" })),
            None,
        )
        .await;
    assert_eq!(wrong.status, StatusCode::UNAUTHORIZED);
    assert_eq!(wrong.body["errors"][0]["field"], "password");

    let unknown = app
        .send(
            Method::POST,
            "/auth/login",
            Some(json!({ "username_or_email": "nobody", "password": "hunter22" })),
            None,
        )
        .await;
    assert_eq!(unknown.status, StatusCode::UNAUTHORIZED);
    assert_eq!(unknown.body["errors"][0]["field"], "username_or_email");
}

#[tokio::test]
async fn logout_ends_the_session() {
    let app = TestApp::new();
    let (_, cookie) = app.register("frank").await;

    let reply = app.send(Method::POST, "/auth/logout", None, Some(&cookie)).await;
    assert_eq!(reply.status, StatusCode::OK);
    assert_eq!(reply.body, Value::Bool(true));

    let me = app.send(Method::GET, "/auth/me", None, Some(&cookie)).await;
    assert_eq!(me.body, Value::Null);
}

#[tokio::test]
async fn forgot_password_never_reveals_unknown_emails() {
    let app = TestApp::new();
    app.register("gina").await;

    for email in ["gina@example.com", "ghost@example.com"] {
        let reply = app
            .send(Method::POST, "/auth/forgot-password", Some(json!({ "email": email })), None)
            .await;
        assert_eq!(reply.status, StatusCode::OK);
        assert_eq!(reply.body, Value::Bool(true));
    }
}

#[tokio::test]
async fn change_password_consumes_the_token() {
    let app = TestApp::new();
    let (id, _) = app.register("hank").await;
    app.kv
        .set("forget-password:tok-1", &id.to_string(), Duration::from_secs(60))
        .await
        .unwrap();

    let short = app
        .send(
            Method::POST,
            "/auth/change-password",
            Some(json!({ "token": "tok-1", "new_password": "abc" })),
            None,
        )
        .await;
    assert_eq!(short.status, StatusCode::BAD_REQUEST);
    assert_eq!(short.body["errors"][0]["field"], "new_password");

    let changed = app
        .send(
            Method::POST,
            "/auth/change-password",
            Some(json!({ "token": "tok-1", "new_password": "brand-new" })),
            None,
        )
        .await;
    assert_eq!(changed.status, StatusCode::OK);
    assert_eq!(changed.body["user"]["id"], id);
    assert!(changed.cookie.is_some());

    let reused = app
        .send(
            Method::POST,
            "/auth/change-password",
            Some(json!({ "token": "tok-1", "new_password": "again-new" })),
            None,
        )
        .await;
    assert_eq!(reused.status, StatusCode::BAD_REQUEST);
    assert_eq!(reused.body["errors"][0]["field"], "token");

    let old = app
        .send(
            Method::POST,
            "/auth/login",
            Some(json!({ "username_or_email": "hank", "password": "hunter22" })),
            None,
        )
        .await;
    assert_eq!(old.status, StatusCode::UNAUTHORIZED);

    let new = app
        .send(
            Method::POST,
            "/auth/login",
            Some(json!({ "username_or_email": "hank", "password": "brand-new" })),
            None,
        )
        .await;
    assert_eq!(new.status, StatusCode::OK);
}

#[tokio::test]
async fn creating_a_post_requires_a_session() {
    let app = TestApp::new();

    let reply = app
        .send(Method::POST, "/posts", Some(json!({ "title": "hi" })), None)
        .await;
    assert_eq!(reply.status, StatusCode::UNAUTHORIZED);

    let (id, cookie) = app.register("ivan").await;
    let blank = app
        .send(Method::POST, "/posts", Some(json!({ "title": "   " })), Some(&cookie))
        .await;
    assert_eq!(blank.status, StatusCode::BAD_REQUEST);

    let post_id = app.create_post(&cookie, "first post").await;
    let post = app
        .send(Method::GET, &format!("/posts/{post_id}"), None, None)
        .await;
    assert_eq!(post.status, StatusCode::OK);
    assert_eq!(post.body["points"], 0);
    assert_eq!(post.body["creator"]["id"], id);
    assert_eq!(post.body["vote_status"], Value::Null);
}

#[tokio::test]
async fn voting_scenario_across_two_users() {
    let app = TestApp::new();
    let (_, alice) = app.register("alice").await;
    let (_, bob) = app.register("bob").await;
    let post_id = app.create_post(&alice, "vote on me").await;

    let r = app.vote(&alice, post_id, 1).await;
    assert_eq!(r.status, StatusCode::OK);
    assert_eq!(r.body["transition"], "cast");
    assert_eq!(r.body["points"], 1);

    assert_eq!(app.vote(&bob, post_id, 1).await.body["points"], 2);

    let flip = app.vote(&alice, post_id, -1).await;
    assert_eq!(flip.body["transition"], "flipped");
    assert_eq!(flip.body["delta"], -2);
    assert_eq!(flip.body["points"], 0);

    assert_eq!(app.vote(&alice, post_id, 1).await.body["points"], 1);

    let same = app.vote(&alice, post_id, 1).await;
    assert_eq!(same.body["transition"], "unchanged");
    assert_eq!(same.body["points"], 1);

    assert_eq!(app.db.count_votes(post_id).unwrap(), 2);
}

#[tokio::test]
async fn vote_failures() {
    let app = TestApp::new();
    let (_, cookie) = app.register("judy").await;
    let post_id = app.create_post(&cookie, "target").await;

    let anonymous = app
        .send(
            Method::POST,
            &format!("/posts/{post_id}/vote"),
            Some(json!({ "value": 1 })),
            None,
        )
        .await;
    assert_eq!(anonymous.status, StatusCode::UNAUTHORIZED);

    assert_eq!(app.vote(&cookie, 9_999, 1).await.status, StatusCode::NOT_FOUND);
    assert_eq!(app.vote(&cookie, post_id, 0).await.status, StatusCode::BAD_REQUEST);
    assert_eq!(app.vote(&cookie, post_id, 2).await.status, StatusCode::BAD_REQUEST);
    assert_eq!(app.db.count_votes(post_id).unwrap(), 0);
}

#[tokio::test]
async fn listing_resolves_creators_and_viewer_votes() {
    let app = TestApp::new();
    let (kim_id, kim) = app.register("kim").await;
    let (lee_id, lee) = app.register("lee").await;

    let kims = app.create_post(&kim, "from kim").await;
    let lees = app.create_post(&lee, "from lee").await;
    app.vote(&kim, lees, -1).await;

    let listing = app.send(Method::GET, "/posts", None, Some(&kim)).await;
    assert_eq!(listing.status, StatusCode::OK);
    let posts = listing.body.as_array().unwrap();
    assert_eq!(posts.len(), 2);

    let by_id = |id: i64| posts.iter().find(|p| p["id"] == id).unwrap();
    assert_eq!(by_id(kims)["creator"]["id"], kim_id);
    assert_eq!(by_id(lees)["creator"]["id"], lee_id);
    assert_eq!(by_id(lees)["vote_status"], -1);
    assert_eq!(by_id(lees)["points"], -1);
    assert_eq!(by_id(kims)["vote_status"], Value::Null);

    let anonymous = app.send(Method::GET, "/posts?limit=1", None, None).await;
    let page = anonymous.body.as_array().unwrap();
    assert_eq!(page.len(), 1);
    assert_eq!(page[0]["vote_status"], Value::Null);
}

#[tokio::test]
async fn listing_pages_with_timestamp_and_id_cursor() {
    let app = TestApp::new();
    let (_, cookie) = app.register("pat").await;
    let older = app.create_post(&cookie, "older").await;
    let newer = app.create_post(&cookie, "newer").await;

    let first = app.send(Method::GET, "/posts?limit=1", None, None).await;
    let first = first.body.as_array().unwrap();
    assert_eq!(first.len(), 1);
    assert_eq!(first[0]["id"], newer);

    let uri = format!(
        "/posts?limit=1&before={}&before_id={}",
        first[0]["created_at"].as_str().unwrap(),
        newer
    );
    let second = app.send(Method::GET, &uri, None, None).await;
    assert_eq!(second.status, StatusCode::OK, "{}", second.body);
    let second = second.body.as_array().unwrap();
    assert_eq!(second.len(), 1);
    assert_eq!(second[0]["id"], older);
}

#[tokio::test]
async fn missing_post_is_not_found() {
    let app = TestApp::new();
    let reply = app.send(Method::GET, "/posts/12345", None, None).await;
    assert_eq!(reply.status, StatusCode::NOT_FOUND);
    assert_eq!(reply.body["error"], "post not found");
}
