pub mod service;
pub mod storage;
pub mod token_store;

pub use service::{AuthMode, AuthResponse, AuthService};
pub use storage::{DisabledStore, FileStore, KeyValueStore, MemoryStore};
pub use token_store::{TokenStore, TOKEN_STORAGE_KEY};
