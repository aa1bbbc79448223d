//! Unit tests for the access layer
//!
//! These run the real client stack against the in-crate `MockHttpClient`
//! and an in-memory durable store.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use crate::api::http_client::mock::MockHttpClient;
use crate::auth::MemoryStore;
use crate::consent::{ConsentDecision, ConsentPrompt};
use crate::{ClientConfig, VitaTwinClient};

pub mod consent_flow_test;

pub const TEST_BASE: &str = "http://vitatwin.test";

/// Absolute mock URL for an API path
pub fn url(path: &str) -> String {
    format!("{}{}", TEST_BASE, path)
}

/// Client wired to a fresh mock transport and memory store
pub fn mock_client() -> (VitaTwinClient, MockHttpClient) {
    let http = MockHttpClient::new();
    let config = ClientConfig::default().with_api_base(TEST_BASE);
    let client = VitaTwinClient::with_parts(
        config,
        Arc::new(http.clone()),
        Arc::new(MemoryStore::new()),
    );
    (client, http)
}

/// Prompt that answers with a fixed decision and records what it was shown
pub struct ScriptedPrompt {
    decision: ConsentDecision,
    shown: Mutex<Vec<Vec<String>>>,
}

impl ScriptedPrompt {
    pub fn new(decision: ConsentDecision) -> Arc<Self> {
        Arc::new(Self {
            decision,
            shown: Mutex::new(Vec::new()),
        })
    }

    pub fn shown(&self) -> Vec<Vec<String>> {
        self.shown.lock().unwrap().clone()
    }
}

#[async_trait]
impl ConsentPrompt for ScriptedPrompt {
    async fn ask(&self, scopes: &[String]) -> ConsentDecision {
        self.shown.lock().unwrap().push(scopes.to_vec());
        self.decision.clone()
    }
}
