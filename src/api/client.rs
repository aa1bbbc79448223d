use std::sync::Arc;

use http::header::{HeaderMap, HeaderName, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, warn};

use crate::api::consent_signal::detect_consent_required;
use crate::api::http_client::{HttpClient, HttpMethod, HttpRequest, SimpleHttpResponse};
use crate::auth::TokenStore;
use crate::config::ClientConfig;
use crate::error::{errors, ApiError, ApiResult};
use crate::events::{SessionEvent, SessionEvents};

/// Per-call request options
#[derive(Debug, Clone)]
pub struct RequestOptions {
    pub method: HttpMethod,
    pub body: Option<String>,
    pub headers: HeaderMap,
}

impl Default for RequestOptions {
    fn default() -> Self {
        Self::new(HttpMethod::GET)
    }
}

impl RequestOptions {
    pub fn new(method: HttpMethod) -> Self {
        Self {
            method,
            body: None,
            headers: HeaderMap::new(),
        }
    }

    pub fn get() -> Self {
        Self::new(HttpMethod::GET)
    }

    pub fn post() -> Self {
        Self::new(HttpMethod::POST)
    }

    /// Attach a raw body
    pub fn body(mut self, body: impl Into<String>) -> Self {
        self.body = Some(body.into());
        self
    }

    /// Attach `value` serialized as JSON
    pub fn json<T: Serialize + ?Sized>(self, value: &T) -> ApiResult<Self> {
        Ok(self.body(serde_json::to_string(value)?))
    }

    /// Add a caller-supplied header
    pub fn header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }
}

/// Authenticated access to the VitaTwin API.
///
/// Every call reads the current token, attaches it as a bearer credential and
/// classifies the response:
///
/// * 401 clears the [`TokenStore`], publishes a session-invalidated event and
///   fails with [`ApiError::Unauthorized`].
/// * 403 with a consent body fails with [`ApiError::ConsentRequired`].
/// * Everything else, including other 403s, is returned untouched.
#[derive(Clone)]
pub struct ApiClient {
    base_url: String,
    login_route: String,
    http: Arc<dyn HttpClient>,
    tokens: Arc<TokenStore>,
    events: SessionEvents,
}

impl ApiClient {
    pub fn new(
        config: &ClientConfig,
        http: Arc<dyn HttpClient>,
        tokens: Arc<TokenStore>,
        events: SessionEvents,
    ) -> Self {
        Self {
            base_url: config.base_url(),
            login_route: config.login_route.clone(),
            http,
            tokens,
            events,
        }
    }

    pub fn tokens(&self) -> &Arc<TokenStore> {
        &self.tokens
    }

    pub fn events(&self) -> &SessionEvents {
        &self.events
    }

    /// Absolute URL for a relative API path
    pub fn url_for(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Perform an authenticated request against `path`
    pub async fn fetch(&self, path: &str, options: RequestOptions) -> ApiResult<SimpleHttpResponse> {
        let token = self.tokens.get().await;

        let mut request = self.build_request(path, options);
        if let Some(token) = token.filter(|t| !t.is_empty()) {
            let value = HeaderValue::from_str(&format!("Bearer {}", token)).map_err(|_| {
                ApiError::Validation("Session token contains invalid header characters".into())
            })?;
            request.headers.insert(AUTHORIZATION, value);
        }

        debug!(method = ?request.method, path, "Sending API request");
        let response = self.http.send(request).await.map_err(|e| {
            warn!(path, error = %e, "API request failed");
            errors::network(format!("{:#}", e))
        })?;

        self.classify(path, response).await
    }

    /// Perform a request with no token and no status classification
    pub async fn fetch_unauthenticated(
        &self,
        path: &str,
        options: RequestOptions,
    ) -> ApiResult<SimpleHttpResponse> {
        let request = self.build_request(path, options);
        debug!(method = ?request.method, path, "Sending unauthenticated request");
        self.http
            .send(request)
            .await
            .map_err(|e| errors::network(format!("{:#}", e)))
    }

    /// GET `path` and decode a successful JSON body
    pub async fn get_json<T: DeserializeOwned>(&self, path: &str) -> ApiResult<T> {
        let response = self.fetch(path, RequestOptions::get()).await?;
        read_json(&response)
    }

    /// POST `payload` as JSON to `path`
    pub async fn post_json<B: Serialize + ?Sized>(
        &self,
        path: &str,
        payload: &B,
    ) -> ApiResult<SimpleHttpResponse> {
        self.fetch(path, RequestOptions::post().json(payload)?).await
    }

    fn build_request(&self, path: &str, options: RequestOptions) -> HttpRequest {
        let mut headers = options.headers;
        if options.body.is_some() && !headers.contains_key(CONTENT_TYPE) {
            headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        }

        HttpRequest {
            method: options.method,
            url: self.url_for(path),
            headers,
            body: options.body,
        }
    }

    async fn classify(&self, path: &str, response: SimpleHttpResponse) -> ApiResult<SimpleHttpResponse> {
        match response.status() {
            401 => {
                warn!(path, "Session rejected by server, clearing token");
                self.tokens.clear().await;
                self.events
                    .publish(SessionEvent::invalidated(self.login_route.clone()));
                Err(ApiError::Unauthorized)
            }
            403 => match detect_consent_required(response.body()) {
                Some(signal) => {
                    debug!(path, scopes = ?signal.required_scopes, "Consent required");
                    Err(errors::consent_required(
                        signal.message,
                        signal.required_scopes,
                    ))
                }
                None => Ok(response),
            },
            _ => Ok(response),
        }
    }
}

/// Decode a JSON body, failing on non-2xx statuses
pub fn read_json<T: DeserializeOwned>(response: &SimpleHttpResponse) -> ApiResult<T> {
    if !response.is_success() {
        return Err(errors::http_failure(
            response.status(),
            format!("Request failed ({})", response.status()),
        ));
    }
    Ok(response.json()?)
}
