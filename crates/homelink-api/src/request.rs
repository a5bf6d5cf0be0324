// Request descriptors.
//
// An `ApiRequest` is a fully described call (method, relative path,
// optional JSON body, optional pinned bearer). It is plain data so the
// session layer can inspect it, resend it after a token refresh, or
// decide to skip interception for the auth endpoints.

use reqwest::Method;
use secrecy::SecretString;
use serde_json::Value;

use crate::endpoints;

/// A single call against the hub API, relative to the client base URL.
#[derive(Debug, Clone)]
pub struct ApiRequest {
    method: Method,
    path: String,
    body: Option<Value>,
    bearer: Option<SecretString>,
}

impl ApiRequest {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            body: None,
            bearer: None,
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path)
    }

    pub fn post(path: impl Into<String>) -> Self {
        Self::new(Method::POST, path)
    }

    pub fn put(path: impl Into<String>) -> Self {
        Self::new(Method::PUT, path)
    }

    pub fn patch(path: impl Into<String>) -> Self {
        Self::new(Method::PATCH, path)
    }

    pub fn delete(path: impl Into<String>) -> Self {
        Self::new(Method::DELETE, path)
    }

    /// Attach a JSON body.
    pub fn with_body(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    /// Pin the bearer credential for this request (used by the refresh
    /// call, which authenticates with the refresh token).
    pub fn with_bearer(mut self, token: SecretString) -> Self {
        self.bearer = Some(token);
        self
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn body(&self) -> Option<&Value> {
        self.body.as_ref()
    }

    pub fn bearer(&self) -> Option<&SecretString> {
        self.bearer.as_ref()
    }

    /// `true` for the endpoints that establish or renew a session.
    /// Calls to them must never be intercepted for token refresh.
    pub fn is_auth_endpoint(&self) -> bool {
        let path = self.path.trim_matches('/');
        self.method == Method::POST
            && matches!(
                path,
                endpoints::LOGIN_PATH | endpoints::REFRESH_PATH | endpoints::REGISTER_PATH
            )
    }
}

impl std::fmt::Display for ApiRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} /{}", self.method, self.path.trim_start_matches('/'))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn auth_endpoints_are_recognized() {
        assert!(ApiRequest::post("auth/login").is_auth_endpoint());
        assert!(ApiRequest::post("/auth/refresh").is_auth_endpoint());
        assert!(ApiRequest::post("auth/register").is_auth_endpoint());
        assert!(!ApiRequest::get("auth/me").is_auth_endpoint());
        assert!(!ApiRequest::get("auth/login").is_auth_endpoint());
        assert!(!ApiRequest::get("devices").is_auth_endpoint());
    }

    #[test]
    fn display_shows_method_and_path() {
        assert_eq!(ApiRequest::delete("/rooms/3").to_string(), "DELETE /rooms/3");
    }
}
