//! Mode-aware summarization policy.

use super::services::{GenerationRequest, GenerationResponse, GenerationTask};
use crate::recording::RecordingMode;
use anyhow::{bail, Result};

const LECTURE_INSTRUCTION: &str = "You are a teaching assistant. Turn the lecture \
transcript into structured notes: key concepts and their definitions, the important \
points under each concept, examples that were mentioned, and the main takeaways. \
Use markdown sections.";

const MEETING_INSTRUCTION: &str = "You are a meeting assistant. Extract the decisions \
that were made, action items with their owners when named, the topics discussed, and \
next steps. Use bullet points.";

const INTERVIEW_INSTRUCTION: &str = "You are reviewing an interview. Extract each \
question and its answer as Q/A pairs, note what the speaker was trying to convey and \
their tone, and keep notable statements verbatim.";

const CUSTOM_INSTRUCTION: &str = "Follow the caller's instructions to process the transcript.";

/// Extraction target for a mode
pub fn instruction(mode: RecordingMode) -> &'static str {
    match mode {
        RecordingMode::Lecture => LECTURE_INSTRUCTION,
        RecordingMode::Meeting => MEETING_INSTRUCTION,
        RecordingMode::Interview => INTERVIEW_INSTRUCTION,
        RecordingMode::Custom => CUSTOM_INSTRUCTION,
    }
}

pub fn build_request(
    mode: RecordingMode,
    custom_prompt: Option<&str>,
    transcript: &str,
) -> GenerationRequest {
    GenerationRequest {
        task: GenerationTask::Summarize,
        text: transcript.to_string(),
        mode,
        max_units: mode.summary_budget(),
        instruction: instruction(mode).to_string(),
        custom_instruction: match mode {
            RecordingMode::Custom => custom_prompt.map(str::to_string),
            _ => None,
        },
    }
}

/// A summary over budget was not truncated by the generator and is rejected
/// rather than cut afterwards.
pub fn check_response(mode: RecordingMode, response: &GenerationResponse) -> Result<()> {
    if response.text.trim().is_empty() {
        bail!("language model returned an empty summary");
    }

    let budget = mode.summary_budget();
    if response.units > budget {
        bail!(
            "summary used {} units, over the {} budget of {}",
            response.units,
            mode,
            budget
        );
    }

    Ok(())
}

/// Rough confidence in a generated summary, from its shape
pub fn estimate_confidence(summary: &str) -> f64 {
    let text = summary.trim();
    if text.is_empty() {
        return 0.0;
    }

    let lower = text.to_lowercase();
    let mut score: f64 = 0.5;

    if text.len() > 50 {
        score += 0.2;
    }
    let structured = text
        .lines()
        .any(|l| matches!(l.trim_start().chars().next(), Some('-' | '*' | '•' | '#')))
        || lower.contains("q:");
    if structured {
        score += 0.1;
    }
    if ["decision", "action", "conclusion", "key", "question", "answer"]
        .iter()
        .any(|w| lower.contains(w))
    {
        score += 0.1;
    }

    if lower.contains("i cannot") || lower.contains("i'm sorry") {
        score -= 0.3;
    }
    if text.split_whitespace().count() < 10 {
        score -= 0.2;
    }

    score.clamp(0.0, 1.0)
}
