use super::messages::{GenerateMessage, GeneratedMessage, TranscribeMessage, TranscriptMessage};
use crate::config::NatsConfig;
use crate::pipeline::{
    GenerationRequest, GenerationResponse, LanguageService, TranscriptionRequest,
    TranscriptionResponse, TranscriptionService,
};
use crate::recording::TranscriptSegment;
use anyhow::{bail, Context, Result};
use async_nats::Client;
use base64::Engine;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::time::Duration;
use tracing::{debug, info};
use uuid::Uuid;

/// Request/reply client for the STT and LLM services
#[derive(Clone)]
pub struct NatsServices {
    client: Client,
    transcribe_subject: String,
    generate_subject: String,
}

impl NatsServices {
    /// Connect to NATS server. `request_timeout` bounds a single reply wait.
    pub async fn connect(config: &NatsConfig, request_timeout: Duration) -> Result<Self> {
        info!("Connecting to NATS at {}", config.url);

        let options = async_nats::ConnectOptions::new().request_timeout(Some(request_timeout));
        let client = async_nats::connect_with_options(config.url.as_str(), options)
            .await
            .context("Failed to connect to NATS")?;

        info!("Connected to NATS successfully");

        Ok(Self {
            client,
            transcribe_subject: config.transcribe_subject.clone(),
            generate_subject: config.generate_subject.clone(),
        })
    }

    async fn request<Req, Rep>(&self, subject: &str, message: &Req) -> Result<Rep>
    where
        Req: Serialize,
        Rep: DeserializeOwned,
    {
        let payload = serde_json::to_vec(message)?;
        let size = payload.len();

        let reply = self
            .client
            .request(subject.to_string(), payload.into())
            .await
            .with_context(|| format!("Request on {} failed", subject))?;

        debug!(
            "Reply on {} ({} bytes sent, {} bytes received)",
            subject,
            size,
            reply.payload.len()
        );

        serde_json::from_slice(&reply.payload)
            .with_context(|| format!("Malformed reply on {}", subject))
    }
}

#[async_trait::async_trait]
impl TranscriptionService for NatsServices {
    async fn transcribe(&self, request: TranscriptionRequest) -> Result<TranscriptionResponse> {
        let message = TranscribeMessage {
            request_id: Uuid::new_v4().to_string(),
            audio: base64::engine::general_purpose::STANDARD.encode(&request.audio),
            format: request.format.extension().to_string(),
            model_size: request.model_size,
            language: request.language,
            noise_reduction: request.flags.noise_reduction,
            silence_trimming: request.flags.silence_trimming,
            used_fallback: request.flags.used_fallback,
            timestamp: chrono::Utc::now().to_rfc3339(),
        };

        let reply: TranscriptMessage = self.request(&self.transcribe_subject, &message).await?;
        if let Some(error) = reply.error {
            bail!("STT service error: {}", error);
        }

        Ok(TranscriptionResponse {
            raw_transcript: reply.text,
            segments: reply
                .segments
                .into_iter()
                .map(|s| TranscriptSegment {
                    start: s.start,
                    end: s.end,
                    text: s.text,
                })
                .collect(),
            language: reply.language,
            average_confidence: reply.confidence,
        })
    }

    fn name(&self) -> &str {
        "nats-stt"
    }
}

#[async_trait::async_trait]
impl LanguageService for NatsServices {
    async fn generate(&self, request: GenerationRequest) -> Result<GenerationResponse> {
        let message = GenerateMessage {
            request_id: Uuid::new_v4().to_string(),
            task: request.task.as_str().to_string(),
            mode: request.mode.as_str().to_string(),
            text: request.text,
            max_tokens: request.max_units,
            instruction: request.instruction,
            custom_instruction: request.custom_instruction,
        };

        let reply: GeneratedMessage = self.request(&self.generate_subject, &message).await?;
        if let Some(error) = reply.error {
            bail!("LLM service error: {}", error);
        }

        Ok(GenerationResponse {
            text: reply.text,
            units: reply.tokens,
        })
    }

    fn name(&self) -> &str {
        "nats-llm"
    }
}
