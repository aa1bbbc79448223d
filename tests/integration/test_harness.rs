//! Integration test harness
//! Provides a client wired to a mockito server and a temporary token file

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use mockito::ServerGuard;
use tempfile::TempDir;

use vitatwin_client::{ClientConfig, ConsentDecision, ConsentPrompt, VitaTwinClient};

/// Mock API server plus a client pointed at it
pub struct TestContext {
    pub server: ServerGuard,
    pub client: VitaTwinClient,
    pub store_path: PathBuf,
    _dir: TempDir,
}

impl TestContext {
    /// Start a mock server and build a client over a fresh token file
    pub async fn new() -> Self {
        let server = mockito::Server::new_async().await;
        let dir = tempfile::tempdir().expect("temp dir");
        let store_path = dir.path().join("vitatwin.secure.json");
        let client = client_for(&server.url(), &store_path);

        Self {
            server,
            client,
            store_path,
            _dir: dir,
        }
    }

    /// A second client over the same server and token file, as after a restart
    pub fn restarted_client(&self) -> VitaTwinClient {
        client_for(&self.server.url(), &self.store_path)
    }

    /// Raw contents of the token file
    pub fn stored_entries(&self) -> serde_json::Value {
        match std::fs::read_to_string(&self.store_path) {
            Ok(raw) => serde_json::from_str(&raw).expect("token file is JSON"),
            Err(_) => serde_json::Value::Null,
        }
    }
}

pub fn client_for(api_base: &str, store_path: &Path) -> VitaTwinClient {
    let config = ClientConfig::default()
        .with_api_base(api_base)
        .with_token_store_path(store_path);
    VitaTwinClient::new(config).expect("client")
}

/// Prompt with a fixed answer that counts how often it was asked
pub struct FixedPrompt {
    decision: ConsentDecision,
    asked: Mutex<usize>,
}

impl FixedPrompt {
    pub fn new(decision: ConsentDecision) -> Arc<Self> {
        Arc::new(Self {
            decision,
            asked: Mutex::new(0),
        })
    }

    pub fn times_asked(&self) -> usize {
        *self.asked.lock().unwrap()
    }
}

#[async_trait]
impl ConsentPrompt for FixedPrompt {
    async fn ask(&self, _scopes: &[String]) -> ConsentDecision {
        *self.asked.lock().unwrap() += 1;
        self.decision.clone()
    }
}
