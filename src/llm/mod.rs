//! Language model backends
//!
//! Three ways to produce report text, chosen by `[model] kind`:
//!
//! - **remote**: any OpenAI-compatible chat completions endpoint over HTTPS
//! - **local** (feature `llm`): a GGUF model served in-process by mistral.rs
//! - **none**: no model; the analyzer falls back to template reports
//!
//! Model failure is never fatal. The analyzer catches every [`LlmError`],
//! logs a warning, and serves a template report tagged
//! `model_available: false`.

mod sanitize;

#[cfg(feature = "llm")]
mod local;
mod remote;

#[cfg(feature = "llm")]
pub use local::LocalBackend;
pub use remote::RemoteBackend;
pub use sanitize::clean_response;

use std::sync::Arc;

use async_trait::async_trait;
use futures::stream::{self, BoxStream, StreamExt};
use thiserror::Error;
use tracing::{info, warn};

use crate::config::settings::{ModelConfig, ModelKind};

/// Model-layer errors.
#[derive(Debug, Error)]
pub enum LlmError {
    /// The backend could not be reached or refused the request.
    #[error("model backend error: {0}")]
    Backend(String),
    #[error("model request failed: {0}")]
    Http(#[from] reqwest::Error),
    /// The backend replied but the payload did not parse.
    #[error("malformed model response: {0}")]
    InvalidResponse(String),
    #[error("model response timed out")]
    Timeout,
}

/// A finite stream of generated text fragments. Not restartable.
pub type TextStream = BoxStream<'static, Result<String, LlmError>>;

/// Unified interface over the configured model backend.
#[async_trait]
pub trait LlmBackend: Send + Sync {
    /// Generate a complete response for the prompt.
    async fn generate(&self, prompt: &str) -> Result<String, LlmError>;

    /// Generate a response as a stream of fragments.
    ///
    /// The default implementation produces the full response as a single
    /// fragment; backends with native streaming override this.
    async fn generate_stream(&self, prompt: &str) -> Result<TextStream, LlmError> {
        let text = self.generate(prompt).await?;
        Ok(stream::once(async move { Ok(text) }).boxed())
    }

    /// Backend name for logging and the status endpoint.
    fn name(&self) -> &'static str;
}

/// Construct the configured backend, or `None` when reports should come from
/// the deterministic templates.
pub async fn build_backend(cfg: &ModelConfig) -> Option<Arc<dyn LlmBackend>> {
    match cfg.kind {
        ModelKind::None => {
            info!("no model configured, reports will use templates");
            None
        }
        ModelKind::Remote => match RemoteBackend::new(cfg) {
            Ok(backend) => {
                info!(model = %cfg.remote_model, "remote model backend ready");
                Some(Arc::new(backend))
            }
            Err(e) => {
                warn!(error = %e, "remote backend unavailable, falling back to templates");
                None
            }
        },
        #[cfg(feature = "llm")]
        ModelKind::Local => match LocalBackend::load(cfg).await {
            Ok(backend) => {
                info!(path = %cfg.model_path.display(), "local model loaded");
                Some(Arc::new(backend))
            }
            Err(e) => {
                warn!(error = %e, "local model failed to load, falling back to templates");
                None
            }
        },
        #[cfg(not(feature = "llm"))]
        ModelKind::Local => {
            warn!("binary built without the `llm` feature, falling back to templates");
            None
        }
    }
}
