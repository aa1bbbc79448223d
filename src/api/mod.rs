//! Authenticated access to the VitaTwin API.

pub mod client;
pub mod consent_signal;
pub mod http_client;

pub use client::{read_json, ApiClient, RequestOptions};
pub use consent_signal::{detect_consent_required, ConsentSignal, CONSENT_REQUIRED_CODE};
pub use http_client::{HttpClient, HttpMethod, HttpRequest, ReqwestHttpClient, SimpleHttpResponse};
