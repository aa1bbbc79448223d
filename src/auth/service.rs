use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::api::{ApiClient, RequestOptions, SimpleHttpResponse};
use crate::error::{errors, ApiResult};
use crate::events::{SessionEvent, SessionEventKind};

const FALLBACK_AUTH_ERROR: &str = "Auth failed";

/// Which credential endpoint to call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthMode {
    Login,
    Signup,
}

impl AuthMode {
    pub fn path(&self) -> &'static str {
        match self {
            AuthMode::Login => "/auth/login",
            AuthMode::Signup => "/auth/signup",
        }
    }
}

#[derive(Serialize)]
struct Credentials<'a> {
    email: &'a str,
    password: &'a str,
}

/// Body returned by the credential endpoints. Signup answers with the new
/// user instead of a token, so the token is optional.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AuthResponse {
    #[serde(default)]
    pub access_token: Option<String>,
}

/// Login, signup and logout on top of the token store
#[derive(Clone)]
pub struct AuthService {
    api: ApiClient,
}

impl AuthService {
    pub fn new(api: ApiClient) -> Self {
        Self { api }
    }

    /// Exchange credentials for a session token
    pub async fn login(&self, email: &str, password: &str) -> ApiResult<AuthResponse> {
        self.authenticate(AuthMode::Login, email, password).await
    }

    /// Create an account; stores a token only if the server returns one
    pub async fn signup(&self, email: &str, password: &str) -> ApiResult<AuthResponse> {
        self.authenticate(AuthMode::Signup, email, password).await
    }

    /// Whether a session token is present
    pub async fn is_authenticated(&self) -> bool {
        self.api.tokens().is_authenticated().await
    }

    /// Tell the server we are leaving, then drop the token regardless
    pub async fn logout(&self) {
        let options = RequestOptions::post();
        match self.api.fetch_unauthenticated("/auth/logout", options).await {
            Ok(response) if response.is_success() => debug!("Server acknowledged logout"),
            Ok(response) => debug!(status = response.status(), "Server rejected logout"),
            Err(e) => debug!(error = %e, "Logout request failed"),
        }

        self.api.tokens().clear().await;
        self.api
            .events()
            .publish(SessionEvent::new(SessionEventKind::LoggedOut));
        info!("Logged out");
    }

    async fn authenticate(
        &self,
        mode: AuthMode,
        email: &str,
        password: &str,
    ) -> ApiResult<AuthResponse> {
        let result = self.request_token(mode, email, password).await;

        match &result {
            Ok(auth) if auth.access_token.is_some() => {
                info!(mode = ?mode, "Authenticated");
                self.api
                    .events()
                    .publish(SessionEvent::new(SessionEventKind::LoggedIn));
            }
            Ok(_) => debug!(mode = ?mode, "Auth succeeded without a token"),
            Err(e) => {
                warn!(mode = ?mode, error = %e, "Authentication failed");
                self.api.tokens().clear().await;
            }
        }

        result
    }

    async fn request_token(
        &self,
        mode: AuthMode,
        email: &str,
        password: &str,
    ) -> ApiResult<AuthResponse> {
        let options = RequestOptions::post().json(&Credentials { email, password })?;
        let response = self.api.fetch_unauthenticated(mode.path(), options).await?;

        if !response.is_success() {
            return Err(errors::http_failure(
                response.status(),
                failure_message(&response),
            ));
        }

        let auth: AuthResponse = response.json()?;
        if let Some(token) = auth.access_token.as_deref() {
            self.api.tokens().set(token).await;
        }
        Ok(auth)
    }
}

/// Raw response text, or a generic message when the body is empty
fn failure_message(response: &SimpleHttpResponse) -> String {
    if response.body().trim().is_empty() {
        FALLBACK_AUTH_ERROR.to_string()
    } else {
        response.body().to_string()
    }
}
