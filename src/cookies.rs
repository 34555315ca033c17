use actix_web::cookie::{time::Duration, Cookie, SameSite};

use crate::auth::TokenPair;

pub const ACCESS_COOKIE_NAME: &str = "accessToken";
pub const REFRESH_COOKIE_NAME: &str = "refreshToken";

/// Builds the HTTP-only cookies that carry the token pair
#[derive(Debug, Clone)]
pub struct SessionCookies {
    secure: bool,
    access_max_age: i64,
    refresh_max_age: i64,
}

impl SessionCookies {
    pub fn new(secure: bool, access_max_age: i64, refresh_max_age: i64) -> Self {
        Self {
            secure,
            access_max_age,
            refresh_max_age,
        }
    }

    fn build(&self, name: &'static str, value: String, max_age: i64) -> Cookie<'static> {
        Cookie::build(name, value)
            .path("/")
            .http_only(true)
            .secure(self.secure)
            .same_site(SameSite::Lax)
            .max_age(Duration::seconds(max_age))
            .finish()
    }

    /// `[access, refresh]` cookies for a freshly issued pair
    pub fn issue(&self, pair: &TokenPair) -> [Cookie<'static>; 2] {
        [
            self.build(ACCESS_COOKIE_NAME, pair.access_token.clone(), self.access_max_age),
            self.build(REFRESH_COOKIE_NAME, pair.refresh_token.clone(), self.refresh_max_age),
        ]
    }

    /// Removal cookies for both tokens
    pub fn clear(&self) -> [Cookie<'static>; 2] {
        [ACCESS_COOKIE_NAME, REFRESH_COOKIE_NAME].map(|name| {
            let mut cookie = self.build(name, String::new(), 0);
            cookie.make_removal();
            cookie
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pair() -> TokenPair {
        TokenPair {
            access_token: "access".to_string(),
            refresh_token: "refresh".to_string(),
            expires_in: 900,
        }
    }

    #[test]
    fn test_issued_cookies_are_http_only() {
        let [access, refresh] = SessionCookies::new(true, 900, 864000).issue(&pair());

        assert_eq!(access.name(), ACCESS_COOKIE_NAME);
        assert_eq!(access.value(), "access");
        assert_eq!(refresh.value(), "refresh");
        for cookie in [&access, &refresh] {
            assert_eq!(cookie.http_only(), Some(true));
            assert_eq!(cookie.secure(), Some(true));
            assert_eq!(cookie.path(), Some("/"));
        }
        assert_eq!(refresh.max_age(), Some(Duration::seconds(864000)));
    }

    #[test]
    fn test_cleared_cookies_are_empty_and_expired() {
        let cleared = SessionCookies::new(false, 900, 864000).clear();

        assert_eq!(cleared[0].name(), ACCESS_COOKIE_NAME);
        assert_eq!(cleared[1].name(), REFRESH_COOKIE_NAME);
        for cookie in &cleared {
            assert_eq!(cookie.value(), "");
            assert_eq!(cookie.max_age(), Some(Duration::ZERO));
        }
    }
}
