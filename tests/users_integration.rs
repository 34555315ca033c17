use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use serde_json::{json, Value};
use std::net::TcpListener;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use videotube::auth::{PasswordHasher, TokenService};
use videotube::configuration::JwtSettings;
use videotube::cookies::SessionCookies;
use videotube::error::MediaError;
use videotube::media::{MediaAsset, MediaStore, MediaUpload};
use videotube::session::SessionManager;
use videotube::startup::run;
use videotube::store::InMemoryCredentialStore;

/// Media stand-in: files named `broken*` fail, everything else gets a URL
#[derive(Default)]
struct FakeMediaStore {
    uploads: AtomicUsize,
}

#[async_trait]
impl MediaStore for FakeMediaStore {
    async fn upload(&self, upload: MediaUpload) -> Result<MediaAsset, MediaError> {
        if upload.file_name.starts_with("broken") {
            return Err(MediaError::UploadFailed("provider rejected file".to_string()));
        }
        self.uploads.fetch_add(1, Ordering::SeqCst);
        Ok(MediaAsset {
            url: format!("https://media.test/{}", upload.file_name),
        })
    }
}

struct TestApp {
    address: String,
    media: Arc<FakeMediaStore>,
    client: reqwest::Client,
}

impl TestApp {
    fn url(&self, path: &str) -> String {
        format!("{}/api/v1/users{}", self.address, path)
    }

    async fn register(&self, form: Form) -> reqwest::Response {
        self.client
            .post(&self.url("/register"))
            .multipart(form)
            .send()
            .await
            .expect("Failed to execute request.")
    }

    async fn login(&self, body: Value) -> reqwest::Response {
        self.client
            .post(&self.url("/login"))
            .json(&body)
            .send()
            .await
            .expect("Failed to execute request.")
    }

    async fn refresh(&self, refresh_token: &str) -> reqwest::Response {
        self.client
            .post(&self.url("/refresh-token"))
            .json(&json!({ "refreshToken": refresh_token }))
            .send()
            .await
            .expect("Failed to execute request.")
    }

    /// Registers alice and logs her in; returns `(access, refresh)`
    async fn alice_session(&self) -> (String, String) {
        assert_eq!(201, self.register(alice_form()).await.status().as_u16());
        let response = self
            .login(json!({ "username": "alice", "password": "secret1" }))
            .await;
        assert_eq!(200, response.status().as_u16());

        let body: Value = response.json().await.expect("Failed to parse response");
        (
            body["data"]["accessToken"].as_str().unwrap().to_string(),
            body["data"]["refreshToken"].as_str().unwrap().to_string(),
        )
    }
}

fn spawn_app() -> TestApp {
    let listener = TcpListener::bind("127.0.0.1:0").expect("Failed to bind random port");
    let port = listener.local_addr().unwrap().port();

    let media = Arc::new(FakeMediaStore::default());
    let sessions = SessionManager::new(
        Arc::new(InMemoryCredentialStore::new()),
        TokenService::new(JwtSettings {
            access_token_secret: "test-access-secret".to_string(),
            refresh_token_secret: "test-refresh-secret".to_string(),
            access_token_expiry: 900,
            refresh_token_expiry: 864000,
            issuer: "videotube".to_string(),
        }),
        PasswordHasher::new(4),
    );

    let server = run(
        listener,
        sessions,
        media.clone(),
        SessionCookies::new(true, 900, 864000),
    )
    .expect("Failed to bind address");
    let _ = tokio::spawn(server);

    TestApp {
        address: format!("http://127.0.0.1:{}", port),
        media,
        client: reqwest::Client::new(),
    }
}

fn image(name: &str) -> Part {
    Part::bytes(vec![0x89, 0x50, 0x4e, 0x47, 0x0d, 0x0a, 0x1a, 0x0a])
        .file_name(name.to_string())
        .mime_str("image/png")
        .unwrap()
}

fn account_form(username: &str, email: &str) -> Form {
    Form::new()
        .text("fullname", "Alice Liddell")
        .text("email", email.to_string())
        .text("username", username.to_string())
        .text("password", "secret1")
}

fn alice_form() -> Form {
    account_form("alice", "alice@example.com").part("avatar", image("avatar.png"))
}

async fn error_body(response: reqwest::Response) -> Value {
    let body: Value = response.json().await.expect("Failed to parse response");
    assert_eq!(body["success"], false);
    assert!(body["errorId"].is_string());
    body
}

// --- Registration ---

#[tokio::test]
async fn register_returns_201_without_secret_fields() {
    let app = spawn_app();

    let form = alice_form().part("cover_image", image("cover.png"));
    let response = app.register(form).await;
    assert_eq!(201, response.status().as_u16());

    let body: Value = response.json().await.expect("Failed to parse response");
    let user = &body["data"];
    assert_eq!(body["statusCode"], 201);
    assert_eq!(user["username"], "alice");
    assert_eq!(user["email"], "alice@example.com");
    assert_eq!(user["avatar"], "https://media.test/avatar.png");
    assert_eq!(user["coverImage"], "https://media.test/cover.png");
    assert!(user.get("passwordHash").is_none());
    assert!(user.get("password").is_none());
    assert!(user.get("refreshTokenHash").is_none());
    assert_eq!(app.media.uploads.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn register_returns_409_for_duplicate_email() {
    let app = spawn_app();
    assert_eq!(201, app.register(alice_form()).await.status().as_u16());

    let form = account_form("alice2", "alice@example.com").part("avatar", image("avatar.png"));
    let response = app.register(form).await;

    assert_eq!(409, response.status().as_u16());
    let body = error_body(response).await;
    assert_eq!(body["statusCode"], 409);
}

#[tokio::test]
async fn register_returns_409_for_duplicate_username_in_other_case() {
    let app = spawn_app();
    assert_eq!(201, app.register(alice_form()).await.status().as_u16());

    let form = account_form("ALICE", "other@example.com").part("avatar", image("avatar.png"));
    assert_eq!(409, app.register(form).await.status().as_u16());
}

#[tokio::test]
async fn register_returns_400_listing_missing_fields() {
    let app = spawn_app();

    let form = Form::new()
        .text("fullname", "Alice Liddell")
        .text("username", "   ")
        .part("avatar", image("avatar.png"));
    let response = app.register(form).await;

    assert_eq!(400, response.status().as_u16());
    let body = error_body(response).await;
    let errors: Vec<&str> = body["errors"]
        .as_array()
        .unwrap()
        .iter()
        .filter_map(Value::as_str)
        .collect();
    assert_eq!(
        errors,
        vec!["email is required", "username is required", "password is required"]
    );
    assert_eq!(app.media.uploads.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn register_returns_400_without_avatar() {
    let app = spawn_app();

    let response = app.register(account_form("alice", "alice@example.com")).await;

    assert_eq!(400, response.status().as_u16());
    let body = error_body(response).await;
    assert_eq!(body["message"], "Avatar is required");
}

#[tokio::test]
async fn register_returns_400_when_avatar_upload_fails() {
    let app = spawn_app();

    let form = account_form("alice", "alice@example.com").part("avatar", image("broken.png"));
    let response = app.register(form).await;

    assert_eq!(400, response.status().as_u16());
    assert_eq!(error_body(response).await["message"], "Avatar is required");
}

#[tokio::test]
async fn register_succeeds_when_only_cover_upload_fails() {
    let app = spawn_app();

    let form = alice_form().part("cover_image", image("broken-cover.png"));
    let response = app.register(form).await;

    assert_eq!(201, response.status().as_u16());
    let body: Value = response.json().await.expect("Failed to parse response");
    assert_eq!(body["data"]["coverImage"], "");
}

#[tokio::test]
async fn register_returns_400_for_invalid_email() {
    let app = spawn_app();

    let form = account_form("alice", "not-an-email").part("avatar", image("avatar.png"));
    assert_eq!(400, app.register(form).await.status().as_u16());
}

#[tokio::test]
async fn register_returns_400_for_password_over_72_bytes() {
    let app = spawn_app();

    let form = Form::new()
        .text("fullname", "Alice Liddell")
        .text("email", "alice@example.com")
        .text("username", "alice")
        .text("password", format!("{}secret-one", "a".repeat(72)))
        .part("avatar", image("avatar.png"));
    let response = app.register(form).await;

    assert_eq!(400, response.status().as_u16());
    assert_eq!(error_body(response).await["code"], "VALIDATION_ERROR");
    assert_eq!(app.media.uploads.load(Ordering::SeqCst), 0);
}

// --- Login ---

#[tokio::test]
async fn login_rejects_wrong_password_then_accepts_right_one() {
    let app = spawn_app();
    assert_eq!(201, app.register(alice_form()).await.status().as_u16());

    let response = app
        .login(json!({ "username": "alice", "password": "wrong" }))
        .await;
    assert_eq!(401, response.status().as_u16());
    assert_eq!(error_body(response).await["code"], "INVALID_CREDENTIALS");

    let response = app
        .login(json!({ "username": "alice", "password": "secret1" }))
        .await;
    assert_eq!(200, response.status().as_u16());

    let cookies: Vec<String> = response
        .headers()
        .get_all(reqwest::header::SET_COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .map(str::to_string)
        .collect();
    assert!(cookies.iter().any(|c| c.starts_with("accessToken=")));
    assert!(cookies.iter().any(|c| c.starts_with("refreshToken=")));
    assert!(cookies.iter().all(|c| c.contains("HttpOnly") && c.contains("Secure")));

    let body: Value = response.json().await.expect("Failed to parse response");
    assert!(body["data"]["accessToken"].is_string());
    assert!(body["data"]["refreshToken"].is_string());
    assert_eq!(body["data"]["user"]["username"], "alice");
}

#[tokio::test]
async fn login_by_email_works() {
    let app = spawn_app();
    assert_eq!(201, app.register(alice_form()).await.status().as_u16());

    let response = app
        .login(json!({ "email": "alice@example.com", "password": "secret1" }))
        .await;
    assert_eq!(200, response.status().as_u16());
}

#[tokio::test]
async fn login_returns_400_for_unknown_user() {
    let app = spawn_app();

    let response = app
        .login(json!({ "username": "nobody", "password": "secret1" }))
        .await;
    assert_eq!(400, response.status().as_u16());
}

#[tokio::test]
async fn login_returns_400_without_identifier() {
    let app = spawn_app();

    let test_cases = vec![
        (json!({ "password": "secret1" }), "missing username and email"),
        (json!({ "username": "", "password": "secret1" }), "blank username"),
        (json!({ "username": "alice" }), "missing password"),
    ];

    for (body, description) in test_cases {
        let response = app.login(body).await;
        assert_eq!(
            400,
            response.status().as_u16(),
            "The API did not fail with 400 when the payload was {}.",
            description
        );
    }
}

#[tokio::test]
async fn login_returns_400_for_malformed_json() {
    let app = spawn_app();

    let response = app
        .client
        .post(&app.url("/login"))
        .header("Content-Type", "application/json")
        .body("{not json")
        .send()
        .await
        .expect("Failed to execute request.");

    assert_eq!(400, response.status().as_u16());
    error_body(response).await;
}

// --- Refresh token rotation ---

#[tokio::test]
async fn rotated_refresh_token_cannot_be_reused() {
    let app = spawn_app();
    let (_, token_a) = app.alice_session().await;

    let response = app.refresh(&token_a).await;
    assert_eq!(200, response.status().as_u16());
    let body: Value = response.json().await.expect("Failed to parse response");
    let token_b = body["data"]["refreshToken"].as_str().unwrap().to_string();
    assert_ne!(token_a, token_b);

    let response = app.refresh(&token_a).await;
    assert_eq!(401, response.status().as_u16());
    assert_eq!(error_body(response).await["message"], "Invalid or expired token");

    assert_eq!(200, app.refresh(&token_b).await.status().as_u16());
}

#[tokio::test]
async fn refresh_accepts_token_from_cookie() {
    let app = spawn_app();
    let (_, refresh) = app.alice_session().await;

    let response = app
        .client
        .post(&app.url("/refresh-token"))
        .header(reqwest::header::COOKIE, format!("refreshToken={}", refresh))
        .send()
        .await
        .expect("Failed to execute request.");

    assert_eq!(200, response.status().as_u16());
}

#[tokio::test]
async fn refresh_returns_401_without_token() {
    let app = spawn_app();

    let response = app
        .client
        .post(&app.url("/refresh-token"))
        .send()
        .await
        .expect("Failed to execute request.");
    assert_eq!(401, response.status().as_u16());

    assert_eq!(401, app.refresh("not-a-jwt").await.status().as_u16());
}

#[tokio::test]
async fn access_token_is_not_a_refresh_token() {
    let app = spawn_app();
    let (access, _) = app.alice_session().await;

    assert_eq!(401, app.refresh(&access).await.status().as_u16());
}

#[tokio::test]
async fn second_login_revokes_first_refresh_token() {
    let app = spawn_app();
    let (_, first) = app.alice_session().await;

    let response = app
        .login(json!({ "username": "alice", "password": "secret1" }))
        .await;
    assert_eq!(200, response.status().as_u16());

    assert_eq!(401, app.refresh(&first).await.status().as_u16());
}

// --- Protected routes ---

#[tokio::test]
async fn current_user_returns_identity_for_bearer_token() {
    let app = spawn_app();
    let (access, _) = app.alice_session().await;

    let response = app
        .client
        .get(&app.url("/current-user"))
        .bearer_auth(&access)
        .send()
        .await
        .expect("Failed to execute request.");

    assert_eq!(200, response.status().as_u16());
    let body: Value = response.json().await.expect("Failed to parse response");
    assert_eq!(body["data"]["username"], "alice");
    assert!(body["data"].get("passwordHash").is_none());
}

#[tokio::test]
async fn current_user_accepts_access_cookie() {
    let app = spawn_app();
    let (access, _) = app.alice_session().await;

    let response = app
        .client
        .get(&app.url("/current-user"))
        .header(reqwest::header::COOKIE, format!("accessToken={}", access))
        .send()
        .await
        .expect("Failed to execute request.");

    assert_eq!(200, response.status().as_u16());
}

#[tokio::test]
async fn protected_routes_require_access_token() {
    let app = spawn_app();
    let (_, refresh) = app.alice_session().await;

    let requests = vec![
        app.client.post(&app.url("/logout")),
        app.client.get(&app.url("/current-user")),
        app.client
            .patch(&app.url("/change-password"))
            .json(&json!({ "oldPassword": "secret1", "newPassword": "secret2" })),
        app.client.get(&app.url("/current-user")).bearer_auth("garbage"),
        app.client.get(&app.url("/current-user")).bearer_auth(&refresh),
        app.client
            .get(&app.url("/current-user"))
            .header(reqwest::header::AUTHORIZATION, "Basic dXNlcjpwYXNz"),
    ];

    for request in requests {
        let response = request.send().await.expect("Failed to execute request.");
        assert_eq!(401, response.status().as_u16());
        let body = error_body(response).await;
        assert_eq!(body["statusCode"], 401);
    }
}

#[tokio::test]
async fn logout_clears_cookies_and_revokes_refresh_token() {
    let app = spawn_app();
    let (access, refresh) = app.alice_session().await;

    let response = app
        .client
        .post(&app.url("/logout"))
        .bearer_auth(&access)
        .send()
        .await
        .expect("Failed to execute request.");
    assert_eq!(200, response.status().as_u16());

    let cleared = response
        .headers()
        .get_all(reqwest::header::SET_COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .filter(|c| c.starts_with("accessToken=;") || c.starts_with("refreshToken=;"))
        .count();
    assert_eq!(cleared, 2);

    assert_eq!(401, app.refresh(&refresh).await.status().as_u16());
}

#[tokio::test]
async fn change_password_requires_correct_old_password() {
    let app = spawn_app();
    let (access, _) = app.alice_session().await;

    let response = app
        .client
        .patch(&app.url("/change-password"))
        .bearer_auth(&access)
        .json(&json!({ "oldPassword": "wrong", "newPassword": "secret2" }))
        .send()
        .await
        .expect("Failed to execute request.");
    assert_eq!(400, response.status().as_u16());

    let response = app
        .client
        .patch(&app.url("/change-password"))
        .bearer_auth(&access)
        .json(&json!({ "oldPassword": "secret1", "newPassword": "secret2" }))
        .send()
        .await
        .expect("Failed to execute request.");
    assert_eq!(200, response.status().as_u16());

    let old = app
        .login(json!({ "username": "alice", "password": "secret1" }))
        .await;
    assert_eq!(401, old.status().as_u16());
    let new = app
        .login(json!({ "username": "alice", "password": "secret2" }))
        .await;
    assert_eq!(200, new.status().as_u16());
}

#[tokio::test]
async fn change_password_returns_400_for_missing_fields() {
    let app = spawn_app();
    let (access, _) = app.alice_session().await;

    let response = app
        .client
        .patch(&app.url("/change-password"))
        .bearer_auth(&access)
        .json(&json!({ "oldPassword": "secret1" }))
        .send()
        .await
        .expect("Failed to execute request.");

    assert_eq!(400, response.status().as_u16());
    let body = error_body(response).await;
    assert_eq!(body["errors"][0], "newPassword is required");
}

#[tokio::test]
async fn change_password_rejects_password_over_72_bytes() {
    let app = spawn_app();
    let (access, _) = app.alice_session().await;

    let response = app
        .client
        .patch(&app.url("/change-password"))
        .bearer_auth(&access)
        .json(&json!({ "oldPassword": "secret1", "newPassword": "a".repeat(73) }))
        .send()
        .await
        .expect("Failed to execute request.");
    assert_eq!(400, response.status().as_u16());

    let response = app
        .login(json!({ "username": "alice", "password": "secret1" }))
        .await;
    assert_eq!(200, response.status().as_u16());
}
