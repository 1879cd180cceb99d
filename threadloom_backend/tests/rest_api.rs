use axum::body::Body;
use axum::http::{Method, Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use pretty_assertions::assert_eq;
use serde_json::{json, Value};
use tempfile::{tempdir, TempDir};
use threadloom_backend::api::{self, AppState};
use threadloom_backend::config::{ThreadingConfig, ThreadloomConfig, ThreadloomPaths};
use threadloom_backend::database::Database;
use tower::ServiceExt;

struct TestApp {
    _dir: TempDir,
    router: Router,
}

impl TestApp {
    fn new() -> Self {
        let dir = tempdir().expect("tempdir");
        let paths = ThreadloomPaths::from_base_dir(dir.path()).expect("paths");
        let config = ThreadloomConfig::new(0, paths, ThreadingConfig::default());
        let database = Database::open_in_memory().expect("database");
        Self {
            _dir: dir,
            router: api::router(AppState::new(config, database)),
        }
    }

    async fn send(&self, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let mut request = Request::builder().method(method).uri(uri);
        let body = match body {
            Some(value) => {
                request = request.header("content-type", "application/json");
                Body::from(value.to_string())
            }
            None => Body::empty(),
        };
        let response = self
            .router
            .clone()
            .oneshot(request.body(body).expect("request"))
            .await
            .expect("response");
        let status = response.status();
        let bytes = response
            .into_body()
            .collect()
            .await
            .expect("body")
            .to_bytes();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).expect("json body")
        };
        (status, value)
    }

    async fn get(&self, uri: &str) -> (StatusCode, Value) {
        self.send(Method::GET, uri, None).await
    }

    async fn post(&self, uri: &str, body: Value) -> (StatusCode, Value) {
        self.send(Method::POST, uri, Some(body)).await
    }

    async fn discussion(&self) -> i64 {
        let (status, body) = self
            .post("/api/v2/discussions", json!({"name": "General", "insertUserID": 1}))
            .await;
        assert_eq!(status, StatusCode::CREATED);
        body["discussionID"].as_i64().expect("discussion id")
    }

    async fn comment(&self, discussion_id: i64, parent: Option<i64>) -> i64 {
        let (status, body) = self.try_comment(discussion_id, parent).await;
        assert_eq!(status, StatusCode::CREATED, "{body}");
        body["commentID"].as_i64().expect("comment id")
    }

    async fn try_comment(&self, discussion_id: i64, parent: Option<i64>) -> (StatusCode, Value) {
        self.post(
            "/api/v2/comments",
            json!({
                "discussionID": discussion_id,
                "parentCommentID": parent,
                "insertUserID": 1,
                "body": "hello",
            }),
        )
        .await
    }
}

#[tokio::test]
async fn health_reports_version() {
    let app = TestApp::new();
    let (status, body) = app.get("/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["version"], env!("CARGO_PKG_VERSION"));
    assert_eq!(body["threadingEnabled"], true);
}

#[tokio::test]
async fn thread_endpoint_returns_structure_and_comments() {
    let app = TestApp::new();
    let d = app.discussion().await;
    let first = app.comment(d, None).await;
    let reply = app.comment(d, Some(first)).await;
    let nested = app.comment(d, Some(reply)).await;
    let deep = app.comment(d, Some(nested)).await;

    let (status, body) = app
        .get(&format!(
            "/api/v2/comments/thread?parentRecordType=discussion&parentRecordID={d}"
        ))
        .await;
    assert_eq!(status, StatusCode::OK);

    let root = &body["threadStructure"][0];
    assert_eq!(root["type"], "comment");
    assert_eq!(root["commentID"], first);
    assert_eq!(root["depth"], 1);
    let nested_node = &root["children"][0]["children"][0];
    assert_eq!(nested_node["type"], "hole");
    assert_eq!(nested_node["parentCommentID"], reply);
    assert_eq!(nested_node["depth"], 3);
    assert_eq!(nested_node["countAllComments"], 2);
    assert_eq!(
        nested_node["apiUrl"],
        format!(
            "/api/v2/comments/thread?parentRecordType=discussion&parentRecordID={d}\
             &parentCommentID={reply}&sort=dateInserted&page=1&limit=30\
             &expand%5B0%5D=insertUser&expand%5B1%5D=body"
        )
    );

    let comments = body["commentsByID"].as_object().expect("commentsByID");
    let mut ids: Vec<&String> = comments.keys().collect();
    ids.sort();
    assert_eq!(ids.len(), 2);
    assert!(comments.contains_key(&first.to_string()));
    assert!(!comments.contains_key(&deep.to_string()));
    assert_eq!(comments[&first.to_string()]["body"], "hello");
    assert_eq!(comments[&first.to_string()]["countChildComments"], 3);

    let url = nested_node["apiUrl"].as_str().expect("apiUrl");
    let (status, page) = app.get(url).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(page["threadStructure"][0]["commentID"], nested);
    assert_eq!(page["threadStructure"][0]["depth"], 3);
    assert_eq!(page["threadStructure"][0]["children"][0]["commentID"], deep);
}

#[tokio::test]
async fn write_path_validation_uses_literal_messages() {
    let app = TestApp::new();
    let d = app.discussion().await;
    let other = app.discussion().await;
    let parent = app.comment(d, None).await;

    let (status, body) = app.try_comment(other, Some(parent)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "Parent comment is from a different thread.");

    let (status, _) = app
        .send(
            Method::PUT,
            "/api/v2/settings/threading.maxDepth",
            Some(json!({"value": "2"})),
        )
        .await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    let child = app.comment(d, Some(parent)).await;
    let (status, body) = app.try_comment(d, Some(child)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "Comment exceeds maximum depth.");

    app.send(
        Method::PUT,
        "/api/v2/settings/threading.enabled",
        Some(json!({"value": "false"})),
    )
    .await;
    let (status, body) = app.try_comment(d, Some(parent)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(
        body["message"],
        "Parent comments are not allowed without custom discussion threads."
    );

    let (status, body) = app.get(&format!("/api/v2/comments?discussionID={d}")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.as_array().map(Vec::len), Some(2));
    let (_, other_comments) = app.get(&format!("/api/v2/comments?discussionID={other}")).await;
    assert_eq!(other_comments, json!([]));
}

#[tokio::test]
async fn missing_records_are_not_found() {
    let app = TestApp::new();
    let (status, _) = app
        .get("/api/v2/comments/thread?parentRecordType=discussion&parentRecordID=42")
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, body) = app.get("/api/v2/comments/42").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["message"], "comment not found: 42");

    let (status, _) = app.send(Method::DELETE, "/api/v2/comments/42", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = app.get("/api/v2/comments/thread?sort=score").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn reactions_and_deletes_update_aggregates() {
    let app = TestApp::new();
    let d = app.discussion().await;
    let a = app.comment(d, None).await;
    let a1 = app.comment(d, Some(a)).await;
    let a11 = app.comment(d, Some(a1)).await;
    let a2 = app.comment(d, Some(a)).await;

    for target in [a1, a11] {
        let (status, body) = app
            .post(
                &format!("/api/v2/comments/{target}/react"),
                json!({"reactionType": "like", "userID": 1}),
            )
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["score"], 1);
    }

    let list = |body: &Value, field: &str| -> Vec<i64> {
        body.as_array()
            .expect("array")
            .iter()
            .map(|c| c[field].as_i64().expect("number"))
            .collect()
    };

    let uri = format!("/api/v2/comments?discussionID={d}&sort=commentID");
    let (_, body) = app.get(&uri).await;
    assert_eq!(list(&body, "commentID"), vec![a, a1, a11, a2]);
    assert_eq!(list(&body, "depth"), vec![1, 2, 3, 2]);
    assert_eq!(list(&body, "score"), vec![0, 1, 1, 0]);
    assert_eq!(list(&body, "scoreChildComments"), vec![2, 1, 0, 0]);
    assert_eq!(list(&body, "countChildComments"), vec![3, 1, 0, 0]);

    let (status, _) = app
        .post(
            &format!("/api/v2/comments/{a1}/unreact"),
            json!({"reactionType": "like", "userID": 1}),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    let (_, body) = app.get(&uri).await;
    assert_eq!(list(&body, "score"), vec![0, 0, 1, 0]);
    assert_eq!(list(&body, "scoreChildComments"), vec![1, 1, 0, 0]);

    let (status, _) = app
        .send(Method::DELETE, &format!("/api/v2/comments/{a11}"), None)
        .await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    let (_, body) = app.get(&uri).await;
    assert_eq!(list(&body, "commentID"), vec![a, a1, a2]);
    assert_eq!(list(&body, "depth"), vec![1, 2, 2]);
    assert_eq!(list(&body, "score"), vec![0, 0, 0]);
    assert_eq!(list(&body, "scoreChildComments"), vec![0, 0, 0]);
    assert_eq!(list(&body, "countChildComments"), vec![2, 0, 0]);

    let (_, discussion) = app.get(&format!("/api/v2/discussions/{d}")).await;
    assert_eq!(discussion["countComments"], 3);
    let (status, listed) = app.get("/api/v2/discussions?limit=5").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(listed[0]["discussionID"], d);
}

#[tokio::test]
async fn invalid_threading_settings_are_rejected() {
    let app = TestApp::new();
    let (status, body) = app
        .send(
            Method::PUT,
            "/api/v2/settings/threading.maxDepth",
            Some(json!({"value": "abc"})),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(
        body["message"],
        "threading.maxDepth must be a non-negative integer."
    );
    let (status, body) = app
        .send(
            Method::PUT,
            "/api/v2/settings/threading.enabled",
            Some(json!({"value": "sometimes"})),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "threading.enabled must be true or false.");

    let (status, stored) = app.get("/api/v2/settings/threading.maxDepth").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(stored, Value::Null);
}

#[tokio::test]
async fn flat_listing_accepts_indexed_expand_and_reports_json_errors() {
    let app = TestApp::new();
    let d = app.discussion().await;
    let c = app.comment(d, None).await;
    app.post(
        &format!("/api/v2/comments/{c}/react"),
        json!({"reactionType": "like", "userID": 2}),
    )
    .await;

    let (status, body) = app
        .get(&format!("/api/v2/comments?discussionID={d}&expand%5B0%5D=reactions"))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body[0]["reactions"]["like"], 1);
    assert!(body[0].get("body").is_none());

    let (status, body) = app.get(&format!("/api/v2/comments?discussionID={d}")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body[0]["body"], "hello");
    assert!(body[0].get("reactions").is_none());

    let (status, body) = app.get("/api/v2/comments?sort=score").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "discussionID is required.");

    let (status, body) = app.get("/api/v2/comments/not-a-number").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["message"].is_string());

    let (status, body) = app
        .post("/api/v2/comments", json!({"discussionID": d, "body": "no author"}))
        .await;
    assert!(status.is_client_error());
    assert!(body["message"].is_string());
}
