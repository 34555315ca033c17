/// Middleware module
///
/// Request authentication for protected routes.

mod jwt_middleware;

pub use jwt_middleware::{extract_access_token, JwtMiddleware};
