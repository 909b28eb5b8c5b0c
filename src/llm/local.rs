//! Local GGUF backend via mistral.rs
//!
//! Loads a quantized model from disk and serves completions in-process. CPU
//! inference on an edge box is slow; requests are serialized through a
//! fixed-size scheduler so concurrent dashboard refreshes cannot pile up
//! KV cache.

use std::num::NonZeroUsize;
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tracing::{debug, info};

use super::{clean_response, LlmBackend, LlmError};
use crate::config::settings::ModelConfig;

const RESPONSE_TIMEOUT: Duration = Duration::from_secs(300);

/// In-process GGUF model.
pub struct LocalBackend {
    mistralrs: Arc<mistralrs::MistralRs>,
    max_tokens: usize,
    temperature: f64,
    /// Qwen-family models want the ChatML template; anything else gets a
    /// plain completion prompt.
    chatml: bool,
}

impl LocalBackend {
    /// Load the model named in `[model] model_path`.
    pub async fn load(cfg: &ModelConfig) -> Result<Self, LlmError> {
        use mistralrs::{
            AutoDeviceMapParams, DefaultSchedulerMethod, DeviceMapSetting, LoaderBuilder,
            MistralRsBuilder, ModelDType, ModelSelected, SchedulerConfig, TokenSource,
        };

        let path = cfg.model_path.as_path();
        if !path.exists() {
            return Err(LlmError::Backend(format!(
                "model file not found: {}",
                path.display()
            )));
        }

        let model_dir = path
            .parent()
            .and_then(Path::to_str)
            .unwrap_or(".")
            .to_string();
        let model_filename = path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| LlmError::Backend("model path has no filename".into()))?
            .to_string();
        let chatml = model_filename.to_lowercase().contains("qwen");

        info!(path = %path.display(), n_ctx = cfg.n_ctx, "loading GGUF model");
        let start = Instant::now();

        let model = ModelSelected::GGUF {
            tok_model_id: None,
            quantized_model_id: model_dir,
            quantized_filename: model_filename,
            dtype: ModelDType::Auto,
            topology: None,
            max_seq_len: cfg.n_ctx,
            max_batch_size: 1,
        };

        let loader = LoaderBuilder::new(model)
            .build()
            .map_err(|e| LlmError::Backend(format!("loader build failed: {e}")))?;

        let pipeline = tokio::task::spawn_blocking(move || {
            loader.load_model_from_hf(
                None,
                TokenSource::CacheToken,
                &ModelDType::Auto,
                &candle_device(),
                false,
                DeviceMapSetting::Auto(AutoDeviceMapParams::default_text()),
                None,
                None,
            )
        })
        .await
        .map_err(|e| LlmError::Backend(format!("model load task failed: {e}")))?
        .map_err(|e| LlmError::Backend(format!("model load failed: {e}")))?;

        let scheduler_slot = NonZeroUsize::new(1)
            .ok_or_else(|| LlmError::Backend("scheduler size must be nonzero".into()))?;
        let mistralrs = MistralRsBuilder::new(
            pipeline,
            SchedulerConfig::DefaultScheduler {
                method: DefaultSchedulerMethod::Fixed(scheduler_slot),
            },
            false,
            None,
        )
        .build()
        .await;

        info!(
            load_secs = start.elapsed().as_secs_f32(),
            chatml, "local model ready"
        );

        Ok(Self {
            mistralrs,
            max_tokens: cfg.max_tokens,
            temperature: cfg.temperature,
            chatml,
        })
    }

    fn format_prompt(&self, prompt: &str) -> String {
        if self.chatml {
            format!(
                "<|im_start|>user\n{prompt}<|im_end|>\n<|im_start|>assistant\n"
            )
        } else {
            format!("User: {prompt}\n\nAssistant:")
        }
    }

    fn stop_tokens(&self) -> Vec<String> {
        if self.chatml {
            vec!["<|im_end|>".to_string(), "<|endoftext|>".to_string()]
        } else {
            vec!["\n\nUser:".to_string()]
        }
    }
}

#[async_trait]
impl LlmBackend for LocalBackend {
    async fn generate(&self, prompt: &str) -> Result<String, LlmError> {
        use mistralrs::{
            Constraint, NormalRequest, Request, RequestMessage, Response, SamplingParams,
            StopTokens,
        };

        let text = self.format_prompt(prompt);
        debug!(prompt_len = text.len(), "local completion request");

        let (tx, mut rx) = tokio::sync::mpsc::channel(100);
        let request = Request::Normal(Box::new(NormalRequest {
            messages: RequestMessage::Completion {
                text,
                echo_prompt: false,
                best_of: Some(1),
            },
            sampling_params: SamplingParams {
                temperature: Some(self.temperature),
                top_k: Some(50),
                top_p: Some(0.9),
                max_len: Some(self.max_tokens),
                stop_toks: Some(StopTokens::Seqs(self.stop_tokens())),
                logits_bias: None,
                n_choices: 1,
                top_n_logprobs: 0,
                frequency_penalty: None,
                presence_penalty: None,
                dry_params: None,
                min_p: None,
                repetition_penalty: None,
            },
            response: tx,
            return_raw_logits: false,
            return_logprobs: false,
            is_streaming: false,
            id: 0,
            constraint: Constraint::None,
            suffix: None,
            tool_choice: None,
            tools: None,
            logits_processors: None,
            web_search_options: None,
            model_id: None,
            truncate_sequence: false,
        }));

        let mistralrs = self.mistralrs.clone();
        tokio::task::spawn_blocking(move || mistralrs.send_request(request))
            .await
            .map_err(|e| LlmError::Backend(format!("request task failed: {e}")))?
            .map_err(|e| LlmError::Backend(format!("request rejected: {e:?}")))?;

        let raw = loop {
            let response = tokio::time::timeout(RESPONSE_TIMEOUT, rx.recv())
                .await
                .map_err(|_| LlmError::Timeout)?
                .ok_or_else(|| {
                    LlmError::Backend("response channel closed before completion".into())
                })?;

            match response {
                Response::Chunk(_) | Response::CompletionChunk(_) => continue,
                Response::Done(result) => {
                    break result
                        .choices
                        .into_iter()
                        .next()
                        .and_then(|c| c.message.content)
                        .ok_or_else(|| {
                            LlmError::InvalidResponse("completion carried no text".into())
                        })?;
                }
                Response::CompletionDone(result) => {
                    break result
                        .choices
                        .into_iter()
                        .next()
                        .map(|c| c.text)
                        .ok_or_else(|| {
                            LlmError::InvalidResponse("completion carried no text".into())
                        })?;
                }
                Response::InternalError(e) => {
                    return Err(LlmError::Backend(format!("internal error: {e}")))
                }
                Response::ValidationError(e) => {
                    return Err(LlmError::Backend(format!("validation error: {e}")))
                }
                Response::ModelError(e, _) | Response::CompletionModelError(e, _) => {
                    return Err(LlmError::Backend(format!("model error: {e}")))
                }
                _ => {
                    return Err(LlmError::InvalidResponse(
                        "unexpected response variant".into(),
                    ))
                }
            }
        };

        // Drop the receiver so the KV cache sequence is released.
        drop(rx);
        Ok(clean_response(&raw))
    }

    fn name(&self) -> &'static str {
        "local gguf (mistral.rs)"
    }
}

fn candle_device() -> candle_core::Device {
    candle_core::Device::Cpu
}
