/// Account Routes
///
/// Registration, login/logout, refresh token rotation, password change and
/// current-user lookup. Token transport (cookies + body) lives here; the
/// session rules live in `SessionManager`.

use actix_multipart::form::{tempfile::TempFile, text::Text, MultipartForm};
use actix_web::{http::StatusCode, web, HttpRequest, HttpResponse};
use serde::{Deserialize, Serialize};

use super::ApiResponse;
use crate::auth::TokenPair;
use crate::cookies::{SessionCookies, REFRESH_COOKIE_NAME};
use crate::error::{AppError, AuthError, ErrorContext, ValidationError};
use crate::logger::RequestId;
use crate::media::{MediaStore, MediaUpload};
use crate::models::UserProfile;
use crate::session::{NewAccount, SessionManager};
use crate::validators::{
    is_valid_email, is_valid_fullname, is_valid_password, is_valid_username, require_fields,
};

/// Multipart registration form
#[derive(MultipartForm)]
pub struct RegisterForm {
    pub fullname: Option<Text<String>>,
    pub email: Option<Text<String>>,
    pub username: Option<Text<String>>,
    pub password: Option<Text<String>>,
    #[multipart(limit = "5MiB")]
    pub avatar: Option<TempFile>,
    #[multipart(limit = "10MiB")]
    pub cover_image: Option<TempFile>,
}

/// User login request; either `username` or `email` identifies the account
#[derive(Deserialize)]
pub struct LoginRequest {
    pub username: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshRequest {
    pub refresh_token: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangePasswordRequest {
    pub old_password: Option<String>,
    pub new_password: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct LoginData {
    user: UserProfile,
    #[serde(flatten)]
    tokens: TokenPair,
}

fn text(field: &Option<Text<String>>) -> Option<&str> {
    field.as_ref().map(|t| t.0.as_str())
}

/// Reads an uploaded temp file; empty parts count as no upload
async fn read_upload(file: &TempFile, fallback_name: &str) -> Result<Option<MediaUpload>, AppError> {
    if file.size == 0 {
        return Ok(None);
    }

    let path = file.file.path().to_path_buf();
    let bytes = web::block(move || std::fs::read(path))
        .await
        .map_err(|e| AppError::Internal(format!("Upload read task failed: {}", e)))?
        .map_err(|e| AppError::Internal(format!("Failed to read upload: {}", e)))?;

    Ok(Some(MediaUpload {
        file_name: file
            .file_name
            .clone()
            .unwrap_or_else(|| fallback_name.to_string()),
        content_type: file
            .content_type
            .as_ref()
            .map(|m| m.to_string())
            .unwrap_or_else(|| "application/octet-stream".to_string()),
        bytes,
    }))
}

fn with_token_cookies(
    mut builder: actix_web::HttpResponseBuilder,
    cookies: &SessionCookies,
    pair: &TokenPair,
) -> actix_web::HttpResponseBuilder {
    for cookie in cookies.issue(pair) {
        builder.cookie(cookie);
    }
    builder
}

/// POST /api/v1/users/register
///
/// # Errors
/// - 400: Missing or invalid fields, missing avatar
/// - 409: Username or email already registered
pub async fn register(
    MultipartForm(form): MultipartForm<RegisterForm>,
    sessions: web::Data<SessionManager>,
    media: web::Data<dyn MediaStore>,
    request_id: RequestId,
) -> Result<HttpResponse, AppError> {
    let context = ErrorContext::new("user_registration").with_request_id(request_id.0);

    require_fields(&[
        ("fullname", text(&form.fullname)),
        ("email", text(&form.email)),
        ("username", text(&form.username)),
        ("password", text(&form.password)),
    ])?;
    let fullname = is_valid_fullname(text(&form.fullname).unwrap_or_default())?;
    let email = is_valid_email(text(&form.email).unwrap_or_default())?;
    let username = is_valid_username(text(&form.username).unwrap_or_default())?;
    let password = text(&form.password).unwrap_or_default().to_string();
    is_valid_password(&password)?;

    sessions.ensure_available(&username, &email).await?;

    let avatar_upload = match &form.avatar {
        Some(file) => read_upload(file, "avatar").await?,
        None => None,
    }
    .ok_or_else(|| ValidationError::MissingUpload("Avatar".to_string()))?;

    let avatar = media.upload(avatar_upload).await.map_err(|e| {
        context.log_error(&AppError::Media(e));
        ValidationError::MissingUpload("Avatar".to_string())
    })?;

    let cover_image = match &form.cover_image {
        Some(file) => match read_upload(file, "cover_image").await? {
            Some(upload) => match media.upload(upload).await {
                Ok(asset) => asset.url,
                Err(e) => {
                    context.log_error(&AppError::Media(e));
                    String::new()
                }
            },
            None => String::new(),
        },
        None => String::new(),
    };

    let profile = sessions
        .register(NewAccount {
            username,
            email,
            fullname,
            password,
            avatar: avatar.url,
            cover_image,
        })
        .await?;

    tracing::info!(
        request_id = %context.request_id,
        user_id = %profile.id,
        "User registered successfully"
    );

    Ok(HttpResponse::Created().json(ApiResponse::new(
        StatusCode::CREATED,
        profile,
        "User registered successfully",
    )))
}

/// POST /api/v1/users/login
///
/// Sets `accessToken` / `refreshToken` cookies and also returns both tokens
/// in the body.
///
/// # Errors
/// - 400: Missing identifier or password, unknown user
/// - 401: Wrong password
pub async fn login(
    form: web::Json<LoginRequest>,
    sessions: web::Data<SessionManager>,
    cookies: web::Data<SessionCookies>,
    request_id: RequestId,
) -> Result<HttpResponse, AppError> {
    let context = ErrorContext::new("user_login").with_request_id(request_id.0);

    let username = form.username.as_deref().filter(|u| !u.trim().is_empty());
    let email = form.email.as_deref().filter(|e| !e.trim().is_empty());
    if username.is_none() && email.is_none() {
        return Err(ValidationError::EmptyField("username or email".to_string()).into());
    }
    require_fields(&[("password", form.password.as_deref())])?;

    let (user, tokens) = sessions
        .login(username, email, form.password.as_deref().unwrap_or_default())
        .await?;

    tracing::info!(
        request_id = %context.request_id,
        user_id = %user.id,
        "User logged in successfully"
    );

    let response = with_token_cookies(HttpResponse::Ok(), &cookies, &tokens).json(ApiResponse::new(
        StatusCode::OK,
        LoginData { user, tokens },
        "User logged in successfully",
    ));
    Ok(response)
}

/// POST /api/v1/users/logout
///
/// **Requires authentication.** Clears the stored refresh token and both
/// cookies.
pub async fn logout(
    identity: web::ReqData<UserProfile>,
    sessions: web::Data<SessionManager>,
    cookies: web::Data<SessionCookies>,
    request_id: RequestId,
) -> Result<HttpResponse, AppError> {
    let context = ErrorContext::new("user_logout")
        .with_request_id(request_id.0)
        .with_user_id(identity.id.to_string());

    sessions.logout(identity.id).await.map_err(|e| {
        context.log_error(&e);
        e
    })?;

    let mut builder = HttpResponse::Ok();
    for cookie in cookies.clear() {
        builder.cookie(cookie);
    }
    Ok(builder.json(ApiResponse::new(
        StatusCode::OK,
        serde_json::json!({}),
        "Logged out successfully",
    )))
}

/// POST /api/v1/users/refresh-token
///
/// Token comes from the `refreshToken` cookie or the `refreshToken` body
/// field. The presented token is consumed: reusing it fails.
///
/// # Errors
/// - 401: Missing, invalid, expired or already used refresh token
pub async fn refresh_token(
    req: HttpRequest,
    body: Option<web::Json<RefreshRequest>>,
    sessions: web::Data<SessionManager>,
    cookies: web::Data<SessionCookies>,
) -> Result<HttpResponse, AppError> {
    let presented = req
        .cookie(REFRESH_COOKIE_NAME)
        .map(|c| c.value().to_string())
        .filter(|v| !v.is_empty())
        .or_else(|| body.and_then(|b| b.into_inner().refresh_token))
        .filter(|v| !v.trim().is_empty())
        .ok_or(AuthError::MissingToken)?;

    let tokens = sessions.rotate_refresh_token(presented.trim()).await?;

    let response = with_token_cookies(HttpResponse::Ok(), &cookies, &tokens).json(ApiResponse::new(
        StatusCode::OK,
        tokens.clone(),
        "Access token refreshed",
    ));
    Ok(response)
}

/// PATCH /api/v1/users/change-password
///
/// **Requires authentication.**
///
/// # Errors
/// - 400: Missing fields or wrong old password
pub async fn change_password(
    identity: web::ReqData<UserProfile>,
    form: web::Json<ChangePasswordRequest>,
    sessions: web::Data<SessionManager>,
    request_id: RequestId,
) -> Result<HttpResponse, AppError> {
    let context = ErrorContext::new("change_password")
        .with_request_id(request_id.0)
        .with_user_id(identity.id.to_string());

    require_fields(&[
        ("oldPassword", form.old_password.as_deref()),
        ("newPassword", form.new_password.as_deref()),
    ])?;
    is_valid_password(form.new_password.as_deref().unwrap_or_default())?;

    sessions
        .change_password(
            identity.id,
            form.old_password.as_deref().unwrap_or_default(),
            form.new_password.as_deref().unwrap_or_default(),
        )
        .await?;

    tracing::info!(request_id = %context.request_id, "Password changed successfully");

    Ok(HttpResponse::Ok().json(ApiResponse::new(
        StatusCode::OK,
        serde_json::json!({}),
        "Password changed successfully",
    )))
}

/// GET /api/v1/users/current-user
///
/// **Requires authentication.** Returns the identity the authenticator
/// attached to the request.
pub async fn current_user(identity: web::ReqData<UserProfile>) -> HttpResponse {
    HttpResponse::Ok().json(ApiResponse::new(
        StatusCode::OK,
        identity.into_inner(),
        "Current user fetched successfully",
    ))
}
