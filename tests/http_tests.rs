use axum::body::{to_bytes, Body};
use axum::http::{header, Method, Request, StatusCode};
use axum::Router;
use inkwell::models::{PostInput, UserRole};
use inkwell::services::{auth, posts};
use inkwell::web::{self, AppState};
use inkwell::{Config, Database};
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;

struct TestApp {
    db: Database,
    router: Router,
}

impl TestApp {
    fn new() -> Self {
        use rand::Rng;
        let id: u32 = rand::thread_rng().gen();
        let db = Database::open_memory(&format!("http_test_db_{}", id))
            .expect("Failed to create test database");
        db.migrate().expect("Failed to run migrations");

        let state = AppState::new(Config::with_database(":memory:"), db.clone())
            .expect("Failed to build app state");
        let router = web::router(Arc::new(state));
        Self { db, router }
    }

    /// Registers a user and returns its id with a live session token.
    fn user(&self, name: &str, email: &str) -> (i64, String) {
        let id = auth::create_user(&self.db, name, email, "secret1", UserRole::User, 6)
            .expect("Failed to create user");
        let token = auth::create_session(&self.db, id, 7).expect("Failed to create session");
        (id, token)
    }

    fn post(&self, author_id: i64, title: &str) -> i64 {
        let input = PostInput {
            title: title.to_string(),
            content: "Some words".to_string(),
            ..Default::default()
        };
        posts::create_post(&self.db, input, author_id)
            .expect("Failed to create post")
            .id
    }

    async fn send(
        &self,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::COOKIE, format!("session={}", token));
        }
        let request = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string())),
            None => builder.body(Body::empty()),
        }
        .unwrap();

        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, value)
    }
}

#[tokio::test]
async fn health_check() {
    let app = TestApp::new();
    let request = Request::builder().uri("/health").body(Body::empty()).unwrap();
    let response = app.router.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers().contains_key("x-content-type-options"));
}

#[tokio::test]
async fn anonymous_delete_is_unauthorized() {
    let app = TestApp::new();
    let (ada, _) = app.user("Ada", "ada@example.com");
    let id = app.post(ada, "Keep Me");

    let (status, body) = app
        .send(Method::DELETE, &format!("/api/posts/{}", id), None, None)
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "Unauthorized");
    assert!(posts::get_post(&app.db, id).unwrap().is_some());
}

#[tokio::test]
async fn non_owner_delete_is_forbidden() {
    let app = TestApp::new();
    let (ada, _) = app.user("Ada", "ada@example.com");
    let (_, grace_token) = app.user("Grace", "grace@example.com");
    let id = app.post(ada, "Keep Me");

    let (status, body) = app
        .send(Method::DELETE, &format!("/api/posts/{}", id), Some(&grace_token), None)
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"], "Forbidden");
    assert!(posts::get_post(&app.db, id).unwrap().is_some());
}

#[tokio::test]
async fn owner_can_delete() {
    let app = TestApp::new();
    let (ada, token) = app.user("Ada", "ada@example.com");
    let id = app.post(ada, "Goodbye");

    let (status, body) = app
        .send(Method::DELETE, &format!("/api/posts/{}", id), Some(&token), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Post deleted");
    assert!(posts::get_post(&app.db, id).unwrap().is_none());
}

#[tokio::test]
async fn missing_post_is_not_found() {
    let app = TestApp::new();
    let (_, token) = app.user("Ada", "ada@example.com");

    let (status, body) = app
        .send(Method::DELETE, "/api/posts/999", Some(&token), None)
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "Post not found");
}

#[tokio::test]
async fn reads_are_open_to_anonymous_but_not_other_users() {
    let app = TestApp::new();
    let (ada, ada_token) = app.user("Ada", "ada@example.com");
    let (_, grace_token) = app.user("Grace", "grace@example.com");
    let id = app.post(ada, "Mine");
    let uri = format!("/api/posts/{}", id);

    let (status, body) = app.send(Method::GET, &uri, None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["post"]["slug"], "mine");

    let (status, _) = app.send(Method::GET, &uri, Some(&ada_token), None).await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = app.send(Method::GET, &uri, Some(&grace_token), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn update_is_owner_only_and_keeps_slug() {
    let app = TestApp::new();
    let (ada, ada_token) = app.user("Ada", "ada@example.com");
    let (_, grace_token) = app.user("Grace", "grace@example.com");
    let id = app.post(ada, "First Draft");
    let uri = format!("/api/posts/{}", id);
    let edit = json!({ "title": "Final Version", "content": "Polished" });

    let (status, _) = app.send(Method::PUT, &uri, None, Some(edit.clone())).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = app
        .send(Method::PUT, &uri, Some(&grace_token), Some(edit.clone()))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = app.send(Method::PUT, &uri, Some(&ada_token), Some(edit)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["post"]["title"], "Final Version");
    assert_eq!(body["post"]["slug"], "first-draft");
}

#[tokio::test]
async fn create_post_requires_session() {
    let app = TestApp::new();
    let (status, body) = app
        .send(
            Method::POST,
            "/api/posts",
            None,
            Some(json!({ "title": "Hi", "content": "There" })),
        )
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "Unauthorized");
}

#[tokio::test]
async fn create_post_validates_and_generates_slugs() {
    let app = TestApp::new();
    let (ada, token) = app.user("Ada", "ada@example.com");

    let (status, body) = app
        .send(Method::POST, "/api/posts", Some(&token), Some(json!({ "content": "No title" })))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Title and content are required");

    let payload = json!({ "title": "Hello World", "content": "Body", "coverImage": "/img/c.png" });
    let (status, body) = app
        .send(Method::POST, "/api/posts", Some(&token), Some(payload.clone()))
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["post"]["slug"], "hello-world");
    assert_eq!(body["post"]["author_id"], ada);
    assert_eq!(body["post"]["cover_image"], "/img/c.png");

    let (_, body) = app
        .send(Method::POST, "/api/posts", Some(&token), Some(payload))
        .await;
    assert_eq!(body["post"]["slug"], "hello-world-1");
}

#[tokio::test]
async fn register_over_api() {
    let app = TestApp::new();
    let payload = json!({ "name": "Ada", "email": "ada@example.com", "password": "secret1" });

    let (status, body) = app
        .send(Method::POST, "/api/register", None, Some(payload.clone()))
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["user"]["email"], "ada@example.com");
    assert!(body["user"].get("password_hash").is_none());

    let (status, body) = app
        .send(Method::POST, "/api/register", None, Some(payload))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "User with this email already exists");

    let (status, _) = app
        .send(
            Method::POST,
            "/api/register",
            None,
            Some(json!({ "name": "Bob", "email": "bob@example.com", "password": "123" })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn profile_update_requires_session() {
    let app = TestApp::new();
    let (_, token) = app.user("Ada", "ada@example.com");
    let payload = json!({ "bio": "Writes about engines" });

    let (status, _) = app
        .send(Method::PUT, "/api/user/profile", None, Some(payload.clone()))
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, body) = app
        .send(Method::PUT, "/api/user/profile", Some(&token), Some(payload))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["user"]["bio"], "Writes about engines");
    assert_eq!(body["user"]["name"], "Ada");
}

#[tokio::test]
async fn public_pages_render() {
    let app = TestApp::new();
    let (ada, _) = app.user("Ada", "ada@example.com");
    app.post(ada, "Visible Post");

    let profile = format!("/profile/{}", ada);
    for uri in ["/", "/blog/visible-post", profile.as_str()] {
        let request = Request::builder().uri(uri).body(Body::empty()).unwrap();
        let response = app.router.clone().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK, "GET {}", uri);
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let html = String::from_utf8(bytes.to_vec()).unwrap();
        assert!(html.contains("Visible Post"), "GET {}", uri);
    }

    let request = Request::builder().uri("/blog/no-such-post").body(Body::empty()).unwrap();
    let response = app.router.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn dashboard_redirects_anonymous_users() {
    let app = TestApp::new();
    let request = Request::builder().uri("/dashboard").body(Body::empty()).unwrap();
    let response = app.router.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(response.headers()[header::LOCATION], "/login");
}

#[tokio::test]
async fn dashboard_delete_by_non_owner_is_forbidden() {
    let app = TestApp::new();
    let (ada, _) = app.user("Ada", "ada@example.com");
    let (_, grace_token) = app.user("Grace", "grace@example.com");
    let id = app.post(ada, "Not Yours");

    let request = Request::builder()
        .method(Method::POST)
        .uri(format!("/dashboard/delete/{}", id))
        .header(header::COOKIE, format!("session={}", grace_token))
        .body(Body::empty())
        .unwrap();
    let response = app.router.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    assert!(posts::get_post(&app.db, id).unwrap().is_some());
}

#[tokio::test]
async fn mutations_check_session_then_body_then_existence() {
    let app = TestApp::new();
    let (ada, ada_token) = app.user("Ada", "ada@example.com");
    let (_, grace_token) = app.user("Grace", "grace@example.com");
    let id = app.post(ada, "Guarded");
    let edit = json!({ "title": "New", "content": "Body" });

    let (status, _) = app.send(Method::DELETE, "/api/posts/9999", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = app
        .send(Method::PUT, "/api/posts/9999", None, Some(edit.clone()))
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, body) = app
        .send(Method::PUT, &format!("/api/posts/{}", id), Some(&grace_token), Some(json!({})))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Title and content are required");

    let (status, _) = app
        .send(Method::PUT, "/api/posts/9999", Some(&ada_token), Some(json!({})))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = app
        .send(Method::PUT, "/api/posts/9999", Some(&ada_token), Some(edit))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn register_returns_public_fields_in_camel_case() {
    let app = TestApp::new();
    let payload = json!({ "name": "Ada", "email": "ada@example.com", "password": "secret1" });

    let (status, body) = app.send(Method::POST, "/api/register", None, Some(payload)).await;
    assert_eq!(status, StatusCode::CREATED);
    let user = &body["user"];
    assert!(user["createdAt"].is_string());
    assert_eq!(user["role"], "user");
    assert_eq!(user["image"], "/default-avatar.jpg");
    assert!(user.get("created_at").is_none());
    assert!(user.get("updatedAt").is_none());
}

async fn form_post(app: &TestApp, uri: &str, token: &str, form: &str) -> axum::response::Response {
    let request = Request::builder()
        .method(Method::POST)
        .uri(uri)
        .header(header::COOKIE, format!("session={}", token))
        .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
        .body(Body::from(form.to_string()))
        .unwrap();
    app.router.clone().oneshot(request).await.unwrap()
}

#[tokio::test]
async fn profile_can_be_edited_from_the_dashboard() {
    let app = TestApp::new();
    let (ada, token) = app.user("Ada", "ada@example.com");

    let request = Request::builder()
        .uri("/dashboard/profile")
        .header(header::COOKIE, format!("session={}", token))
        .body(Body::empty())
        .unwrap();
    let response = app.router.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    assert!(String::from_utf8(bytes.to_vec()).unwrap().contains("value=\"Ada\""));

    let response = form_post(
        &app,
        "/dashboard/profile",
        &token,
        "name=Ada+Lovelace&image=%2Fimg%2Fada.png&bio=Writes+about+engines",
    )
    .await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(response.headers()[header::LOCATION], format!("/profile/{}", ada).as_str());

    let user = auth::get_user(&app.db, ada).unwrap().unwrap();
    assert_eq!(user.name, "Ada Lovelace");
    assert_eq!(user.image, "/img/ada.png");
    assert_eq!(user.bio, "Writes about engines");

    let response = form_post(&app, "/dashboard/profile", &token, "name=&image=&bio=").await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(auth::get_user(&app.db, ada).unwrap().unwrap().name, "Ada Lovelace");
}

#[tokio::test]
async fn dashboard_missing_post_renders_not_found_page() {
    let app = TestApp::new();
    let (_, token) = app.user("Ada", "ada@example.com");

    let request = Request::builder()
        .uri("/dashboard/edit/9999")
        .header(header::COOKIE, format!("session={}", token))
        .body(Body::empty())
        .unwrap();
    let response = app.router.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    assert!(String::from_utf8(bytes.to_vec())
        .unwrap()
        .contains("couldn't find what you were looking for"));
}

#[tokio::test]
async fn post_page_shows_reading_time() {
    let app = TestApp::new();
    let (ada, _) = app.user("Ada", "ada@example.com");
    app.post(ada, "Quick Read");

    let request = Request::builder().uri("/blog/quick-read").body(Body::empty()).unwrap();
    let response = app.router.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    assert!(String::from_utf8(bytes.to_vec()).unwrap().contains("1 min read"));
}
