//! Extensions setup for host applications.
//!
//! Hosts call [`setup_extensions`] once per process to install the services
//! the built-in elements look up at run time. A text generator is not
//! installed here; hosts bring their own provider.

use std::sync::Arc;

use flow_engine::{extension_keys, ExecutorExtensions, FlowConfig};

use crate::custom::SandboxRunner;
use crate::onchain::AptosRestClient;

/// Install the sandbox runner and the chain client enabled by `config`.
///
/// A missing worker binary or a client that cannot be built is logged and
/// skipped; the elements then report the problem when they run.
pub fn setup_extensions(extensions: &mut ExecutorExtensions, config: &FlowConfig) {
    if config.allow_custom_code {
        match SandboxRunner::from_config(config) {
            Ok(runner) => {
                log::info!("Custom code worker: {}", runner.worker_path().display());
                extensions.set(extension_keys::SANDBOX_RUNNER, Arc::new(runner));
            }
            Err(e) => log::warn!("Custom code is enabled but unavailable: {}", e),
        }
    }

    if config.enable_blockchain && extensions.chain_provider().is_none() {
        match AptosRestClient::new(config.http_timeout()) {
            Ok(client) => extensions.set_chain_provider(Arc::new(client)),
            Err(e) => log::warn!("Failed to create chain client: {}", e),
        }
    }
}
