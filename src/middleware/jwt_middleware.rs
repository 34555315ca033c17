/// Request Authenticator
///
/// Pulls the access token from the `accessToken` cookie or an
/// `Authorization: Bearer` header, resolves it to a `UserProfile` and injects
/// the profile into request extensions for the handlers behind it.

use actix_web::{
    dev::{forward_ready, Service, ServiceRequest, ServiceResponse, Transform},
    http::header::AUTHORIZATION,
    Error, HttpMessage,
};
use futures::future::LocalBoxFuture;
use std::rc::Rc;

use crate::cookies::ACCESS_COOKIE_NAME;
use crate::session::SessionManager;

/// Cookie first, then bearer header; blank values count as absent
pub fn extract_access_token(req: &ServiceRequest) -> Option<String> {
    if let Some(cookie) = req.cookie(ACCESS_COOKIE_NAME) {
        if !cookie.value().is_empty() {
            return Some(cookie.value().to_string());
        }
    }

    req.headers()
        .get(AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .map(str::to_string)
}

/// JWT middleware for protecting routes
pub struct JwtMiddleware {
    sessions: SessionManager,
}

impl JwtMiddleware {
    pub fn new(sessions: SessionManager) -> Self {
        Self { sessions }
    }
}

impl<S, B> Transform<S, ServiceRequest> for JwtMiddleware
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type InitError = ();
    type Transform = JwtMiddlewareService<S>;
    type Future = std::future::Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        std::future::ready(Ok(JwtMiddlewareService {
            service: Rc::new(service),
            sessions: self.sessions.clone(),
        }))
    }
}

pub struct JwtMiddlewareService<S> {
    service: Rc<S>,
    sessions: SessionManager,
}

impl<S, B> Service<ServiceRequest> for JwtMiddlewareService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let token = extract_access_token(&req);
        let sessions = self.sessions.clone();
        let service = self.service.clone();

        Box::pin(async move {
            let identity = sessions.identify(token.as_deref()).await.map_err(|e| {
                tracing::warn!(path = %req.path(), cause = %e, "Request authentication failed");
                Error::from(e)
            })?;

            tracing::debug!(user_id = %identity.id, "Access token validated");
            req.extensions_mut().insert(identity);

            service.call(req).await
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::cookie::Cookie;
    use actix_web::test::TestRequest;

    #[test]
    fn test_bearer_header() {
        let req = TestRequest::default()
            .insert_header((AUTHORIZATION, "Bearer abc.def.ghi"))
            .to_srv_request();
        assert_eq!(extract_access_token(&req), Some("abc.def.ghi".to_string()));
    }

    #[test]
    fn test_cookie_takes_precedence() {
        let req = TestRequest::default()
            .cookie(Cookie::new(ACCESS_COOKIE_NAME, "from-cookie"))
            .insert_header((AUTHORIZATION, "Bearer from-header"))
            .to_srv_request();
        assert_eq!(extract_access_token(&req), Some("from-cookie".to_string()));
    }

    #[test]
    fn test_cleared_cookie_falls_back_to_header() {
        let req = TestRequest::default()
            .cookie(Cookie::new(ACCESS_COOKIE_NAME, ""))
            .insert_header((AUTHORIZATION, "Bearer from-header"))
            .to_srv_request();
        assert_eq!(extract_access_token(&req), Some("from-header".to_string()));
    }

    #[test]
    fn test_malformed_headers() {
        for header in ["Bearer", "Bearer ", "Basic dXNlcjpwYXNz", "BearerToken", ""] {
            let req = TestRequest::default()
                .insert_header((AUTHORIZATION, header))
                .to_srv_request();
            assert_eq!(extract_access_token(&req), None, "header: {:?}", header);
        }
    }

    #[test]
    fn test_no_credentials() {
        let req = TestRequest::default().to_srv_request();
        assert_eq!(extract_access_token(&req), None);
    }
}
