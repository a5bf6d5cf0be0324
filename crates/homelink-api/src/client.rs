// Hub REST client
//
// Wraps `reqwest::Client` with base-URL joining, bearer attachment and
// response decoding. The client is stateless with respect to sessions:
// every call is told which bearer to present, so token lifecycle stays
// in `homelink-core`.

use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use tracing::{debug, trace};
use url::Url;

use crate::error::Error;
use crate::models::ErrorBody;
use crate::request::ApiRequest;
use crate::transport::TransportConfig;

/// Raw HTTP client for the hub API.
#[derive(Debug, Clone)]
pub struct HubClient {
    http: reqwest::Client,
    base_url: Url,
}

impl HubClient {
    /// Create a client from a `TransportConfig`.
    ///
    /// `base_url` is the API root, e.g. `http://hub.local:5000/api`.
    pub fn new(base_url: Url, transport: &TransportConfig) -> Result<Self, Error> {
        let http = transport.build_client()?;
        Ok(Self::with_client(http, base_url))
    }

    /// Wrap a pre-built `reqwest::Client`.
    pub fn with_client(http: reqwest::Client, base_url: Url) -> Self {
        Self {
            http,
            base_url: normalize_base_url(base_url),
        }
    }

    /// The API root every request path is joined onto.
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn url(&self, path: &str) -> Result<Url, Error> {
        Ok(self.base_url.join(path.trim_start_matches('/'))?)
    }

    /// Send `req`, presenting `bearer` in the `Authorization` header when
    /// given, and decode the JSON body into `T`.
    ///
    /// An empty success body decodes as JSON `null`, so `T = ()` works for
    /// endpoints that answer with nothing.
    pub async fn send<T: DeserializeOwned>(
        &self,
        req: &ApiRequest,
        bearer: Option<&SecretString>,
    ) -> Result<T, Error> {
        let url = self.url(req.path())?;
        debug!("{} {}", req.method(), url);

        let mut builder = self.http.request(req.method().clone(), url);
        if let Some(token) = bearer {
            builder = builder.bearer_auth(token.expose_secret());
        }
        if let Some(body) = req.body() {
            builder = builder.json(body);
        }

        let resp = builder.send().await?;
        handle_response(resp).await
    }
}

/// Ensure the base path ends with `/` so `Url::join` appends instead of
/// replacing the last segment.
fn normalize_base_url(mut url: Url) -> Url {
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    url
}

async fn handle_response<T: DeserializeOwned>(resp: reqwest::Response) -> Result<T, Error> {
    let status = resp.status();

    if status.is_success() {
        let body = resp.text().await?;
        trace!(bytes = body.len(), "response body received");
        let text = if body.trim().is_empty() { "null" } else { body.as_str() };
        return serde_json::from_str(text).map_err(|e| {
            let preview = truncate(&body, 200);
            Error::Deserialization {
                message: format!("{e} (body preview: {preview:?})"),
                body: body.clone(),
            }
        });
    }

    let raw = resp.text().await.unwrap_or_default();
    let message = serde_json::from_str::<ErrorBody>(&raw)
        .ok()
        .and_then(ErrorBody::into_message)
        .unwrap_or_else(|| {
            if raw.trim().is_empty() {
                status.to_string()
            } else {
                truncate(&raw, 200)
            }
        });

    if status == reqwest::StatusCode::UNAUTHORIZED {
        return Err(Error::Authentication { message });
    }

    Err(Error::Api {
        status: status.as_u16(),
        message,
    })
}

fn truncate(text: &str, max_chars: usize) -> String {
    text.chars().take(max_chars).collect()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn base_url_gets_trailing_slash() {
        let client = HubClient::with_client(
            reqwest::Client::new(),
            Url::parse("http://hub.local:5000/api").unwrap(),
        );
        assert_eq!(client.base_url().as_str(), "http://hub.local:5000/api/");
        assert_eq!(
            client.url("/devices/4/toggle").unwrap().as_str(),
            "http://hub.local:5000/api/devices/4/toggle"
        );
    }
}
