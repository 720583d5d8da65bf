use super::cleanup;
use super::confidence;
use super::config::PipelineConfig;
use super::services::{
    GenerationRequest, GenerationTask, LanguageService, PreprocessingFlags, TranscriptionRequest,
    TranscriptionResponse, TranscriptionService,
};
use super::summary;
use crate::audio::{preprocess_or_fallback, PreprocessedAudio};
use crate::error::{Error, Result};
use crate::recording::{
    AudioStore, FailureReport, Recording, RecordingRegistry, RecordingStatus, Stage, StageOutput,
    Summary, TranscriptSegment,
};
use anyhow::{anyhow, bail, Context};
use std::future::Future;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{error, info, warn};
use uuid::Uuid;

/// Runs the ordered stage sequence for one recording at a time per id:
/// preprocessing, transcription, cleanup, summarization, confidence.
#[derive(Clone)]
pub struct Orchestrator {
    registry: RecordingRegistry,
    audio: AudioStore,
    transcriber: Arc<dyn TranscriptionService>,
    language: Arc<dyn LanguageService>,
    config: PipelineConfig,
}

impl Orchestrator {
    pub fn new(
        registry: RecordingRegistry,
        audio: AudioStore,
        transcriber: Arc<dyn TranscriptionService>,
        language: Arc<dyn LanguageService>,
        config: PipelineConfig,
    ) -> Self {
        Self {
            registry,
            audio,
            transcriber,
            language,
            config,
        }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Move an uploaded recording to processing and run its pipeline in the
    /// background. Returns as soon as the status is processing.
    ///
    /// Audio is loaded before the transition, so a storage failure leaves the
    /// recording uploaded and is returned to the caller.
    pub async fn start(&self, id: Uuid) -> Result<(Recording, JoinHandle<()>)> {
        let recording = self.registry.get(id).await?;
        if recording.status != RecordingStatus::Uploaded {
            return Err(Error::InvalidTransition {
                from: recording.status,
                to: RecordingStatus::Processing,
            });
        }

        let audio = self.audio.load(id, recording.format).await?;
        let recording = self
            .registry
            .update_status(id, RecordingStatus::Processing)
            .await?;

        info!(
            "Processing recording {} ({} mode) with {} / {}",
            id,
            recording.mode,
            self.transcriber.name(),
            self.language.name()
        );

        let orchestrator = self.clone();
        let snapshot = recording.clone();
        let handle = tokio::spawn(async move {
            orchestrator.run(snapshot, audio).await;
        });

        Ok((recording, handle))
    }

    /// Drive one pipeline to a terminal status. Stage failures never escape.
    async fn run(&self, recording: Recording, audio: Vec<u8>) {
        let id = recording.id;
        let deadline = Instant::now() + self.config.pipeline_timeout;

        match self.execute(&recording, audio, deadline).await {
            Ok(()) => {}
            Err(Error::Stage {
                stage,
                attempts,
                message,
            }) => {
                error!(
                    "Recording {} failed at {} after {} attempt(s): {}",
                    id, stage, attempts, message
                );
                self.fail(
                    id,
                    FailureReport {
                        stage,
                        attempts,
                        message,
                    },
                )
                .await;
            }
            Err(e) if e.is_not_found() => {
                info!("Recording {} was deleted mid-pipeline, discarding results", id);
            }
            Err(e) => {
                error!("Pipeline for recording {} stopped: {}", id, e);
            }
        }
    }

    async fn execute(&self, recording: &Recording, audio: Vec<u8>, deadline: Instant) -> Result<()> {
        let id = recording.id;

        // 1. Preprocessing: never retried, falls back to the raw upload
        let prepared = self.preprocess(recording, audio).await;
        if prepared.used_fallback {
            warn!(
                "Recording {} continues with original audio: {}",
                id,
                prepared.reason.as_deref().unwrap_or("unknown reason")
            );
        }
        self.registry
            .save_stage_output(
                id,
                StageOutput {
                    preprocessing: Some(prepared.report()),
                    ..Default::default()
                },
            )
            .await?;

        // 2. Transcription
        let flags = PreprocessingFlags {
            noise_reduction: self.config.preprocess.noise_reduction && !prepared.used_fallback,
            silence_trimming: self.config.preprocess.silence_trimming && !prepared.used_fallback,
            used_fallback: prepared.used_fallback,
        };
        let transcript = self
            .run_stage(id, Stage::Transcription, deadline, || {
                self.transcribe_chunks(recording, &prepared, flags)
            })
            .await?;
        info!(
            "Recording {} transcribed: {} words, language {}",
            id,
            cleanup::word_count(&transcript.raw_transcript),
            transcript.language.as_deref().unwrap_or("unknown")
        );
        self.registry
            .save_stage_output(
                id,
                StageOutput {
                    raw_transcript: Some(transcript.raw_transcript.clone()),
                    segments: Some(transcript.segments.clone()),
                    language: transcript.language.clone(),
                    ..Default::default()
                },
            )
            .await?;

        // 3. Cleanup: rules first (saved right away), then smoothing
        let raw = transcript.raw_transcript.as_str();
        let rule_text = cleanup::apply_rules(raw);
        if !rule_text.is_empty() {
            self.registry
                .save_stage_output(
                    id,
                    StageOutput {
                        clean_transcript: Some(rule_text.clone()),
                        ..Default::default()
                    },
                )
                .await?;
        }
        let clean = self
            .run_stage(id, Stage::Cleanup, deadline, || self.smooth_once(recording, raw, &rule_text))
            .await?;
        self.registry
            .save_stage_output(
                id,
                StageOutput {
                    clean_transcript: Some(clean.clone()),
                    ..Default::default()
                },
            )
            .await?;

        // 4. Summarization
        let summary = self
            .run_stage(id, Stage::Summarization, deadline, || {
                self.summarize_once(recording, &clean)
            })
            .await?;
        info!(
            "Recording {} summarized: {} units ({} budget {})",
            id,
            summary.tokens,
            summary.mode,
            summary.mode.summary_budget()
        );

        // 5. Confidence: informational only
        let score = confidence::score(transcript.average_confidence);
        self.registry
            .save_stage_output(
                id,
                StageOutput {
                    summary: Some(summary),
                    confidence_score: Some(score),
                    ..Default::default()
                },
            )
            .await?;

        // A delete may have landed while the last call was in flight
        if !self.registry.contains(id).await {
            return Err(Error::recording_not_found(id));
        }
        self.registry
            .update_status(id, RecordingStatus::Completed)
            .await?;

        if confidence::is_low(score, self.config.low_confidence_threshold) {
            warn!(
                "Recording {} completed with low confidence {:.2} (threshold {:.2})",
                id, score, self.config.low_confidence_threshold
            );
        }

        Ok(())
    }

    async fn preprocess(&self, recording: &Recording, audio: Vec<u8>) -> PreprocessedAudio {
        let format = recording.format;
        let config = self.config.preprocess.clone();
        let audio = Arc::new(audio);
        let input = Arc::clone(&audio);

        match tokio::task::spawn_blocking(move || preprocess_or_fallback(&input, format, &config))
            .await
        {
            Ok(prepared) => prepared,
            Err(e) => {
                error!("Preprocessing task for {} panicked: {}", recording.id, e);
                PreprocessedAudio::fallback(&audio, format, format!("preprocessing aborted: {}", e))
            }
        }
    }

    /// Run `attempt` until it succeeds or the attempt budget is spent.
    /// The attempt count is persisted before each try.
    async fn run_stage<T, F, Fut>(
        &self,
        id: Uuid,
        stage: Stage,
        deadline: Instant,
        mut attempt: F,
    ) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = anyhow::Result<T>>,
    {
        let max_attempts = self.config.max_attempts.max(1);
        let mut last_error = String::new();

        for n in 1..=max_attempts {
            self.registry
                .save_stage_output(
                    id,
                    StageOutput {
                        attempts: Some((stage, n)),
                        ..Default::default()
                    },
                )
                .await?;

            let remaining = deadline.saturating_duration_since(Instant::now());
            let budget = remaining.min(self.config.stage_timeout);
            let outcome = if budget.is_zero() {
                Err(anyhow!("pipeline deadline exceeded"))
            } else {
                match tokio::time::timeout(budget, attempt()).await {
                    Ok(result) => result,
                    Err(_) => Err(anyhow!("timed out after {:?}", budget)),
                }
            };

            match outcome {
                Ok(value) => {
                    if n > 1 {
                        info!("{} for {} succeeded on attempt {}", stage, id, n);
                    }
                    return Ok(value);
                }
                Err(e) => {
                    warn!(
                        "{} attempt {}/{} for {} failed: {:#}",
                        stage, n, max_attempts, id, e
                    );
                    last_error = format!("{:#}", e);
                    if n < max_attempts && !self.config.retry_backoff.is_zero() {
                        tokio::time::sleep(self.config.retry_backoff).await;
                    }
                }
            }
        }

        Err(Error::Stage {
            stage,
            attempts: max_attempts,
            message: last_error,
        })
    }

    /// Transcribe every chunk in order and stitch the results
    async fn transcribe_chunks(
        &self,
        recording: &Recording,
        prepared: &PreprocessedAudio,
        flags: PreprocessingFlags,
    ) -> anyhow::Result<TranscriptionResponse> {
        let mut texts = Vec::with_capacity(prepared.chunks.len());
        let mut segments = Vec::new();
        let mut language: Option<String> = None;
        let mut confidences = Vec::with_capacity(prepared.chunks.len());

        for chunk in &prepared.chunks {
            let response = self
                .transcriber
                .transcribe(TranscriptionRequest {
                    audio: chunk.bytes.clone(),
                    format: chunk.format,
                    model_size: self.config.model_size.clone(),
                    language: recording.language_hint.clone(),
                    flags,
                })
                .await
                .with_context(|| format!("chunk {} of {}", chunk.index + 1, prepared.chunks.len()))?;

            let text = response.raw_transcript.trim();
            if !text.is_empty() {
                texts.push(text.to_string());
            }
            segments.extend(response.segments.into_iter().map(|s| TranscriptSegment {
                start: s.start + chunk.start_seconds,
                end: s.end + chunk.start_seconds,
                text: s.text.trim().to_string(),
            }));
            if language.is_none() {
                language = response.language;
            }
            confidences.push(response.average_confidence);
        }

        let raw_transcript = texts.join(" ");
        if raw_transcript.is_empty() {
            bail!("no speech recognized");
        }

        Ok(TranscriptionResponse {
            raw_transcript,
            segments,
            language: language.or_else(|| recording.language_hint.clone()),
            average_confidence: confidence::combine(&confidences),
        })
    }

    async fn smooth_once(
        &self,
        recording: &Recording,
        raw: &str,
        rule_text: &str,
    ) -> anyhow::Result<String> {
        if rule_text.is_empty() {
            bail!("transcript contains only filler words");
        }

        let response = self
            .language
            .generate(GenerationRequest {
                task: GenerationTask::Cleanup,
                text: rule_text.to_string(),
                mode: recording.mode,
                // Smoothing never needs more room than the rule output plus punctuation
                max_units: cleanup::word_count(rule_text) * 2 + 16,
                instruction: cleanup::CLEANUP_INSTRUCTION.to_string(),
                custom_instruction: None,
            })
            .await?;

        cleanup::accept_smoothed(raw, &response)
    }

    async fn summarize_once(&self, recording: &Recording, clean: &str) -> anyhow::Result<Summary> {
        let request =
            summary::build_request(recording.mode, recording.custom_prompt.as_deref(), clean);
        let response = self.language.generate(request).await?;
        summary::check_response(recording.mode, &response)?;

        let text = response.text.trim().to_string();
        Ok(Summary {
            mode: recording.mode,
            confidence: summary::estimate_confidence(&text),
            text,
            tokens: response.units,
        })
    }

    async fn fail(&self, id: Uuid, failure: FailureReport) {
        let saved = self
            .registry
            .save_stage_output(
                id,
                StageOutput {
                    failure: Some(failure),
                    ..Default::default()
                },
            )
            .await;

        let result = match saved {
            Ok(_) => self
                .registry
                .update_status(id, RecordingStatus::Failed)
                .await
                .map(|_| ()),
            Err(e) => Err(e),
        };

        match result {
            Ok(()) => {}
            Err(e) if e.is_not_found() => {
                info!("Recording {} was deleted before its failure was recorded", id);
            }
            Err(e) => error!("Could not mark recording {} as failed: {}", id, e),
        }
    }
}
