//! Typed service map for collaborators that cannot travel as JSON.
//!
//! `ExecutorExtensions` lets hosts inject runtime objects (model providers,
//! chain clients, the sandbox runner) into a flow run. The executor lends the
//! map to every element through its execution context.
//!
//! # Example
//!
//! ```ignore
//! use flow_engine::{ExecutorExtensions, extension_keys};
//! use std::sync::Arc;
//!
//! let mut ext = ExecutorExtensions::new();
//! ext.set_text_generator(Arc::new(MyProvider::new()));
//!
//! // In an element:
//! let generator = ctx.extensions().text_generator()?;
//! ```

use std::any::Any;
use std::collections::HashMap;
use std::sync::Arc;

use crate::collaborators::{ChainProvider, TextGenerator};
use crate::error::{FlowError, Result};

/// Services keyed by name, stored as `Any` and recovered by type
pub struct ExecutorExtensions {
    inner: HashMap<String, Box<dyn Any + Send + Sync>>,
}

impl ExecutorExtensions {
    pub fn new() -> Self {
        Self {
            inner: HashMap::new(),
        }
    }

    /// Store `value` under `key`; an existing entry is replaced
    pub fn set<T: Send + Sync + 'static>(&mut self, key: &str, value: T) {
        self.inner.insert(key.to_string(), Box::new(value));
    }

    /// The entry under `key`, if present and of type `T`
    pub fn get<T: Send + Sync + 'static>(&self, key: &str) -> Option<&T> {
        self.inner.get(key).and_then(|v| v.downcast_ref())
    }

    pub fn has(&self, key: &str) -> bool {
        self.inner.contains_key(key)
    }

    pub fn set_text_generator(&mut self, generator: Arc<dyn TextGenerator>) {
        self.set(extension_keys::TEXT_GENERATOR, generator);
    }

    /// The injected text generator, or a configuration error naming the gap.
    pub fn text_generator(&self) -> Result<Arc<dyn TextGenerator>> {
        self.get::<Arc<dyn TextGenerator>>(extension_keys::TEXT_GENERATOR)
            .cloned()
            .ok_or_else(|| FlowError::config("No text generation provider is configured"))
    }

    pub fn set_chain_provider(&mut self, provider: Arc<dyn ChainProvider>) {
        self.set(extension_keys::CHAIN_PROVIDER, provider);
    }

    /// The injected chain provider, if any
    pub fn chain_provider(&self) -> Option<Arc<dyn ChainProvider>> {
        self.get::<Arc<dyn ChainProvider>>(extension_keys::CHAIN_PROVIDER)
            .cloned()
    }
}

impl Default for ExecutorExtensions {
    fn default() -> Self {
        Self::new()
    }
}

/// Keys the built-in elements look up
pub mod extension_keys {
    /// Key for `Arc<dyn TextGenerator>`
    pub const TEXT_GENERATOR: &str = "text_generator";
    /// Key for `Arc<dyn ChainProvider>`
    pub const CHAIN_PROVIDER: &str = "chain_provider";
    /// Key for the custom-code sandbox runner
    pub const SANDBOX_RUNNER: &str = "sandbox_runner";
}
