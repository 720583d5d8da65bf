// Shared fixtures for integration tests: in-process fakes of the STT and LLM
// services, a WAV generator, and a fully wired service over temp directories.

#![allow(dead_code)]

use anyhow::{anyhow, Result};
use std::collections::VecDeque;
use std::io::Cursor;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;
use tokio::sync::Notify;
use uuid::Uuid;
use whsp::pipeline::{
    GenerationRequest, GenerationResponse, GenerationTask, LanguageService, PipelineConfig,
    TranscriptionRequest, TranscriptionResponse, TranscriptionService,
};
use whsp::{
    AudioStore, ExportStore, Orchestrator, RecordingRegistry, RecordingService, RecordingStatus,
};

/// Mono 16-bit WAV: `lead_silence` seconds of near-silence then a 440Hz tone
pub fn wav_bytes(lead_silence: f64, tone: f64, sample_rate: u32) -> Vec<u8> {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };

    let quiet = (lead_silence * sample_rate as f64) as usize;
    let loud = (tone * sample_rate as f64) as usize;

    let mut cursor = Cursor::new(Vec::new());
    {
        let mut writer = hound::WavWriter::new(&mut cursor, spec).unwrap();
        for i in 0..quiet + loud {
            let sample = if i < quiet {
                0.0
            } else {
                let t = i as f32 / sample_rate as f32;
                0.5 * (2.0 * std::f32::consts::PI * 440.0 * t).sin()
            };
            writer
                .write_sample((sample * i16::MAX as f32) as i16)
                .unwrap();
        }
        writer.finalize().unwrap();
    }
    cursor.into_inner()
}

/// Two seconds of tone at 16kHz
pub fn speech_wav() -> Vec<u8> {
    wav_bytes(0.0, 2.0, 16_000)
}

pub fn transcript(text: &str, confidence: f64) -> TranscriptionResponse {
    TranscriptionResponse {
        raw_transcript: text.to_string(),
        segments: Vec::new(),
        language: Some("en".to_string()),
        average_confidence: confidence,
    }
}

/// Speech-to-text fake: fails its first `failures` calls, then replies
pub struct FakeTranscriber {
    reply: Option<TranscriptionResponse>,
    failures: AtomicU32,
    pub calls: AtomicU32,
    pub requests: Mutex<Vec<TranscriptionRequest>>,
    gate: Option<Arc<Notify>>,
    delay: Option<Duration>,
}

impl FakeTranscriber {
    pub fn replying(text: &str, confidence: f64) -> Self {
        Self {
            reply: Some(transcript(text, confidence)),
            failures: AtomicU32::new(0),
            calls: AtomicU32::new(0),
            requests: Mutex::new(Vec::new()),
            gate: None,
            delay: None,
        }
    }

    /// Every call fails
    pub fn unavailable() -> Self {
        Self {
            reply: None,
            ..Self::replying("", 0.0)
        }
    }

    pub fn failing_first(mut self, failures: u32) -> Self {
        self.failures = AtomicU32::new(failures);
        self
    }

    /// Hold each call until the gate is notified
    pub fn gated(mut self, gate: Arc<Notify>) -> Self {
        self.gate = Some(gate);
        self
    }

    pub fn delayed(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn call_count(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl TranscriptionService for FakeTranscriber {
    async fn transcribe(&self, request: TranscriptionRequest) -> Result<TranscriptionResponse> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.requests.lock().unwrap().push(request);

        if let Some(gate) = &self.gate {
            gate.notified().await;
        }
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        let remaining = self.failures.load(Ordering::SeqCst);
        if remaining > 0 {
            self.failures.store(remaining - 1, Ordering::SeqCst);
            return Err(anyhow!("stt backend unavailable"));
        }

        self.reply
            .clone()
            .ok_or_else(|| anyhow!("stt backend unavailable"))
    }

    fn name(&self) -> &str {
        "fake-stt"
    }
}

/// Language-model fake. Cleanup echoes its input unless a reply is queued;
/// summaries come from a queue, falling back to `summary`.
pub struct FakeLanguage {
    cleanup: Mutex<VecDeque<Result<String>>>,
    summaries: Mutex<VecDeque<Result<GenerationResponse>>>,
    summary: GenerationResponse,
    pub requests: Mutex<Vec<GenerationRequest>>,
    pub cleanup_calls: AtomicU32,
    pub summary_calls: AtomicU32,
}

impl FakeLanguage {
    pub fn summarizing(text: &str) -> Self {
        Self {
            cleanup: Mutex::new(VecDeque::new()),
            summaries: Mutex::new(VecDeque::new()),
            summary: GenerationResponse {
                text: text.to_string(),
                units: text.split_whitespace().count() as u32,
            },
            requests: Mutex::new(Vec::new()),
            cleanup_calls: AtomicU32::new(0),
            summary_calls: AtomicU32::new(0),
        }
    }

    pub fn with_cleanup(self, text: &str) -> Self {
        self.cleanup.lock().unwrap().push_back(Ok(text.to_string()));
        self
    }

    pub fn with_cleanup_error(self, message: &str) -> Self {
        self.cleanup
            .lock()
            .unwrap()
            .push_back(Err(anyhow!(message.to_string())));
        self
    }

    pub fn with_summary(self, text: &str, units: u32) -> Self {
        self.summaries.lock().unwrap().push_back(Ok(GenerationResponse {
            text: text.to_string(),
            units,
        }));
        self
    }

    pub fn with_summary_error(self, message: &str) -> Self {
        self.summaries
            .lock()
            .unwrap()
            .push_back(Err(anyhow!(message.to_string())));
        self
    }

    pub fn summary_requests(&self) -> Vec<GenerationRequest> {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.task == GenerationTask::Summarize)
            .cloned()
            .collect()
    }
}

#[async_trait::async_trait]
impl LanguageService for FakeLanguage {
    async fn generate(&self, request: GenerationRequest) -> Result<GenerationResponse> {
        self.requests.lock().unwrap().push(request.clone());

        match request.task {
            GenerationTask::Cleanup => {
                self.cleanup_calls.fetch_add(1, Ordering::SeqCst);
                let queued = self.cleanup.lock().unwrap().pop_front();
                let text = match queued {
                    Some(reply) => reply?,
                    None => request.text.clone(),
                };
                Ok(GenerationResponse {
                    units: text.split_whitespace().count() as u32,
                    text,
                })
            }
            GenerationTask::Summarize => {
                self.summary_calls.fetch_add(1, Ordering::SeqCst);
                let queued = self.summaries.lock().unwrap().pop_front();
                match queued {
                    Some(reply) => reply,
                    None => Ok(self.summary.clone()),
                }
            }
        }
    }

    fn name(&self) -> &str {
        "fake-llm"
    }
}

/// Pipeline settings that keep tests fast
pub fn fast_pipeline() -> PipelineConfig {
    PipelineConfig {
        stage_timeout: Duration::from_secs(5),
        pipeline_timeout: Duration::from_secs(30),
        retry_backoff: Duration::from_millis(1),
        ..PipelineConfig::default()
    }
}

pub struct TestService {
    pub service: RecordingService,
    pub transcriber: Arc<FakeTranscriber>,
    pub language: Arc<FakeLanguage>,
    pub dir: TempDir,
}

impl TestService {
    pub fn new(transcriber: FakeTranscriber, language: FakeLanguage) -> Self {
        Self::with_config(transcriber, language, fast_pipeline())
    }

    pub fn with_config(
        transcriber: FakeTranscriber,
        language: FakeLanguage,
        config: PipelineConfig,
    ) -> Self {
        let dir = TempDir::new().unwrap();
        let transcriber = Arc::new(transcriber);
        let language = Arc::new(language);

        let registry = RecordingRegistry::new();
        let audio = AudioStore::new(dir.path().join("recordings"));
        let exports = ExportStore::new(dir.path().join("exports"), Duration::from_secs(15 * 60));
        let orchestrator = Orchestrator::new(
            registry.clone(),
            audio.clone(),
            transcriber.clone(),
            language.clone(),
            config,
        );

        Self {
            service: RecordingService::new(registry, audio, orchestrator, exports),
            transcriber,
            language,
            dir,
        }
    }
}

/// Poll until the recording leaves processing
pub async fn wait_for_terminal(service: &RecordingService, id: Uuid) -> Result<RecordingStatus> {
    for _ in 0..500 {
        let recording = service.get(id).await?;
        if recording.status.is_terminal() {
            return Ok(recording.status);
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    Err(anyhow!("recording {} never finished", id))
}
