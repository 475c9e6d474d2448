pub mod file_store;
pub mod http;
pub mod in_memory;
pub mod session;
pub mod tokenizer;

use crate::config::{ClientConfig, TokenizerConfig};
use crate::domain::ports::{CardTokenizerRef, SessionStoreBox};
use file_store::FileSessionStore;
use in_memory::InMemorySessionStore;
use std::sync::Arc;
use tokenizer::{GatewayTokenizer, ServerSideTokenizer};

/// Picks the session store: a file when one is configured, memory otherwise.
pub fn session_store(config: &ClientConfig) -> SessionStoreBox {
    match &config.session_file {
        Some(path) => Box::new(FileSessionStore::new(path)),
        None => Box::new(InMemorySessionStore::new()),
    }
}

pub fn card_tokenizer(config: &ClientConfig, client: &reqwest::Client) -> CardTokenizerRef {
    match &config.tokenizer {
        TokenizerConfig::ServerSide => Arc::new(ServerSideTokenizer),
        TokenizerConfig::Gateway { url, public_key } => Arc::new(GatewayTokenizer::new(
            client.clone(),
            url.clone(),
            public_key.clone(),
        )),
    }
}
