//! HTTP basic-auth middleware.

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use http::header::{AUTHORIZATION, WWW_AUTHENTICATE};
use http::{HeaderValue, StatusCode};

use crate::context::{Context, Key};
use crate::handler::Handler;

/// Store key under which [`basic_auth`] records the authenticated user.
pub const AUTH_USER: Key<String> = Key::new("auth.user");

const BASIC_REALM: HeaderValue =
    HeaderValue::from_static("Basic realm=\"Authorization Required\"");

/// Middleware validating requests against a user/password table.
///
/// The expected `Authorization` header values are computed once, at
/// construction. On success the user name is stored under [`AUTH_USER`]
/// and the chain continues; otherwise the chain is aborted with status
/// 401 and a `WWW-Authenticate` challenge.
pub fn basic_auth<I, U, P>(accounts: I) -> impl Handler
where
    I: IntoIterator<Item = (U, P)>,
    U: Into<String>,
    P: Into<String>,
{
    let pairs: Vec<(String, String)> = accounts
        .into_iter()
        .map(|(user, password)| {
            let user = user.into();
            let credential = format!("{user}:{}", password.into());
            (format!("Basic {}", STANDARD.encode(credential)), user)
        })
        .collect();

    move |cx: &mut Context| {
        let authorization = cx.request().header(AUTHORIZATION).unwrap_or("");
        match search_credential(&pairs, authorization) {
            Some(user) => {
                let user = user.to_owned();
                cx.insert(AUTH_USER, user);
            }
            None => {
                cx.set_header(WWW_AUTHENTICATE, BASIC_REALM);
                cx.abort_with_status(StatusCode::UNAUTHORIZED);
            }
        }
    }
}

fn search_credential<'a>(pairs: &'a [(String, String)], authorization: &str) -> Option<&'a str> {
    if authorization.is_empty() {
        return None;
    }
    let mut found = None;
    for (value, user) in pairs {
        if constant_time_eq(value.as_bytes(), authorization.as_bytes()) {
            found = Some(user.as_str());
        }
    }
    found
}

/// Comparison cost does not depend on where the first difference sits.
fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut diff = 0u8;
    for (x, y) in a.iter().zip(b) {
        diff |= x ^ y;
    }
    diff == 0
}

#[cfg(test)]
mod tests {
    use http::Method;

    use super::*;
    use crate::request::Request;
    use crate::router::Router;

    fn guarded_router() -> Router {
        let mut router = Router::new();
        router.with(basic_auth([("admin", "secret")])).unwrap();
        router
            .get("/private", |cx: &mut Context| {
                let user = match cx.require(AUTH_USER) {
                    Ok(user) => user,
                    Err(err) => {
                        cx.record_error(err);
                        return;
                    }
                };
                cx.text(StatusCode::OK, format!("hello {user}"));
            })
            .unwrap();
        router
    }

    fn authorization(user: &str, password: &str) -> HeaderValue {
        let encoded = STANDARD.encode(format!("{user}:{password}"));
        HeaderValue::from_str(&format!("Basic {encoded}")).unwrap()
    }

    #[test]
    fn test_valid_credentials_pass_and_bind_the_user() {
        let router = guarded_router();
        let request = Request::new(Method::GET, "/private")
            .with_header(AUTHORIZATION, authorization("admin", "secret"));

        let response = router.dispatch(request);
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(&response.body()[..], b"hello admin");
    }

    #[test]
    fn test_wrong_password_is_challenged() {
        let router = guarded_router();
        let request = Request::new(Method::GET, "/private")
            .with_header(AUTHORIZATION, authorization("admin", "wrong"));

        let response = router.dispatch(request);
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert!(response.headers().contains_key(WWW_AUTHENTICATE));
        assert!(response.body().is_empty());
    }

    #[test]
    fn test_missing_header_is_challenged() {
        let router = guarded_router();
        let response = router.dispatch(Request::new(Method::GET, "/private"));
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[test]
    fn test_constant_time_eq() {
        assert!(constant_time_eq(b"abc", b"abc"));
        assert!(!constant_time_eq(b"abc", b"abd"));
        assert!(!constant_time_eq(b"abc", b"abcd"));
        assert!(constant_time_eq(b"", b""));
    }
}
