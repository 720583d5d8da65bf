use super::error::AudioError;
use super::file::AudioFile;
use crate::recording::{AudioFormat, PreprocessingReport};
use rubato::{FftFixedIn, Resampler};
use std::io::Cursor;
use tracing::{info, warn};

/// Canonical rate handed to speech-to-text
pub const TARGET_SAMPLE_RATE: u32 = 16_000;

/// Analysis frame length for gating and trimming (20 ms)
const FRAME_MS: u32 = 20;

/// Noise floor is estimated from this much audio at the start of the clip
const NOISE_SAMPLE_SECS: f64 = 0.5;

/// Frames quieter than floor * ratio are attenuated
const NOISE_GATE_RATIO: f32 = 1.5;
const NOISE_GATE_ATTENUATION: f32 = 0.1;

/// Input frames per FFT resampler block
const RESAMPLE_CHUNK_FRAMES: usize = 1024;

#[derive(Debug, Clone)]
pub struct PreprocessConfig {
    pub noise_reduction: bool,
    pub silence_trimming: bool,
    /// Frames below this level (dBFS) count as silence
    pub silence_threshold_db: f32,
    /// Peak loudness target; gain is only ever increased
    pub target_peak_dbfs: f32,
    /// Upper bound on chunk length
    pub max_chunk_secs: u32,
}

impl Default for PreprocessConfig {
    fn default() -> Self {
        Self {
            noise_reduction: true,
            silence_trimming: true,
            silence_threshold_db: -40.0,
            target_peak_dbfs: -3.0,
            max_chunk_secs: 30,
        }
    }
}

/// One bounded-length piece of audio ready for transcription
#[derive(Debug, Clone)]
pub struct AudioChunk {
    pub index: usize,
    /// Offset of this chunk from the start of the (processed) clip
    pub start_seconds: f64,
    pub format: AudioFormat,
    pub bytes: Vec<u8>,
}

/// Result of preprocessing, tagged with whether the raw upload was used instead
#[derive(Debug, Clone)]
pub struct PreprocessedAudio {
    pub chunks: Vec<AudioChunk>,
    pub duration_seconds: Option<f64>,
    pub used_fallback: bool,
    pub reason: Option<String>,
}

impl PreprocessedAudio {
    /// The original upload as a single chunk
    pub fn fallback(bytes: &[u8], format: AudioFormat, reason: impl Into<String>) -> Self {
        Self {
            chunks: vec![AudioChunk {
                index: 0,
                start_seconds: 0.0,
                format,
                bytes: bytes.to_vec(),
            }],
            duration_seconds: None,
            used_fallback: true,
            reason: Some(reason.into()),
        }
    }

    pub fn report(&self) -> PreprocessingReport {
        PreprocessingReport {
            used_fallback: self.used_fallback,
            reason: self.reason.clone(),
            chunk_count: self.chunks.len(),
            processed_duration_seconds: self.duration_seconds,
        }
    }
}

/// Run preprocessing; on any failure hand back the original bytes as a single
/// chunk with `used_fallback` set. Never fails.
pub fn preprocess_or_fallback(
    bytes: &[u8],
    format: AudioFormat,
    config: &PreprocessConfig,
) -> PreprocessedAudio {
    match preprocess(bytes, format, config) {
        Ok(processed) => processed,
        Err(e) => {
            warn!("Preprocessing failed, using original audio: {}", e);
            PreprocessedAudio::fallback(bytes, format, e.to_string())
        }
    }
}

/// Decode, downmix, resample to 16kHz, denoise, trim, normalize, and chunk
pub fn preprocess(
    bytes: &[u8],
    format: AudioFormat,
    config: &PreprocessConfig,
) -> Result<PreprocessedAudio, AudioError> {
    let audio = AudioFile::decode(bytes, format)?;

    let mono = downmix_to_mono(&audio.samples, audio.channels);
    let mut samples = resample(&mono, audio.sample_rate, TARGET_SAMPLE_RATE)?;

    if config.noise_reduction {
        reduce_noise(&mut samples, TARGET_SAMPLE_RATE);
    }

    if config.silence_trimming {
        samples = trim_silence(&samples, TARGET_SAMPLE_RATE, config.silence_threshold_db)?;
    }

    normalize_peak(&mut samples, config.target_peak_dbfs);

    let chunk_len = (config.max_chunk_secs.max(1) * TARGET_SAMPLE_RATE) as usize;
    let chunks = samples
        .chunks(chunk_len)
        .enumerate()
        .map(|(index, chunk)| -> Result<AudioChunk, AudioError> {
            Ok(AudioChunk {
                index,
                start_seconds: (index * chunk_len) as f64 / TARGET_SAMPLE_RATE as f64,
                format: AudioFormat::Wav,
                bytes: encode_wav(chunk, TARGET_SAMPLE_RATE)?,
            })
        })
        .collect::<Result<Vec<_>, AudioError>>()?;

    let duration_seconds = samples.len() as f64 / TARGET_SAMPLE_RATE as f64;

    info!(
        "Preprocessed {:.1}s of audio into {} chunk(s) ({:.1}s after trimming)",
        audio.duration_seconds,
        chunks.len(),
        duration_seconds
    );

    Ok(PreprocessedAudio {
        chunks,
        duration_seconds: Some(duration_seconds),
        used_fallback: false,
        reason: None,
    })
}

/// Average interleaved channels into one
pub fn downmix_to_mono(samples: &[f32], channels: u16) -> Vec<f32> {
    if channels <= 1 {
        return samples.to_vec();
    }

    samples
        .chunks_exact(channels as usize)
        .map(|frame| frame.iter().sum::<f32>() / channels as f32)
        .collect()
}

/// Band-limited resampling through an FFT resampler. Content above the
/// target Nyquist frequency is filtered out instead of folding into the
/// speech band. Output is aligned to the input and `ceil(len * to / from)` long.
pub fn resample(samples: &[f32], from_rate: u32, to_rate: u32) -> Result<Vec<f32>, AudioError> {
    if from_rate == to_rate || samples.is_empty() {
        return Ok(samples.to_vec());
    }

    let mut resampler = FftFixedIn::<f32>::new(
        from_rate as usize,
        to_rate as usize,
        RESAMPLE_CHUNK_FRAMES,
        2, // sub-chunks
        1, // mono
    )
    .map_err(|e| AudioError::Resample(e.to_string()))?;

    let expected = (samples.len() as u64 * to_rate as u64).div_ceil(from_rate as u64) as usize;
    let delay = resampler.output_delay();
    let mut output = Vec::with_capacity(expected + delay);

    let mut remaining = samples;
    while remaining.len() >= resampler.input_frames_next() {
        let (chunk, rest) = remaining.split_at(resampler.input_frames_next());
        let out = resampler
            .process(&[chunk], None)
            .map_err(|e| AudioError::Resample(e.to_string()))?;
        output.extend_from_slice(&out[0]);
        remaining = rest;
    }

    if !remaining.is_empty() {
        let out = resampler
            .process_partial(Some(&[remaining][..]), None)
            .map_err(|e| AudioError::Resample(e.to_string()))?;
        output.extend_from_slice(&out[0]);
    }

    // Flush the filter delay
    while output.len() < expected + delay {
        let out = resampler
            .process_partial::<&[f32]>(None, None)
            .map_err(|e| AudioError::Resample(e.to_string()))?;
        if out[0].is_empty() {
            break;
        }
        output.extend_from_slice(&out[0]);
    }

    Ok(output.into_iter().skip(delay).take(expected).collect())
}

/// Attenuate frames that sit at the noise floor measured over the first 0.5s.
/// Clips shorter than a second carry no usable noise sample and are left as is.
pub fn reduce_noise(samples: &mut [f32], sample_rate: u32) {
    if samples.len() < sample_rate as usize {
        return;
    }

    let noise_len = (NOISE_SAMPLE_SECS * sample_rate as f64) as usize;
    let floor = rms(&samples[..noise_len]);
    if floor <= f32::EPSILON {
        return;
    }

    let gate = floor * NOISE_GATE_RATIO;
    for frame in samples.chunks_mut(frame_len(sample_rate)) {
        if rms(frame) < gate {
            frame.iter_mut().for_each(|s| *s *= NOISE_GATE_ATTENUATION);
        }
    }
}

/// Drop leading and trailing frames quieter than `threshold_db`
pub fn trim_silence(
    samples: &[f32],
    sample_rate: u32,
    threshold_db: f32,
) -> Result<Vec<f32>, AudioError> {
    let frame = frame_len(sample_rate);
    let loud = |chunk: &[f32]| to_dbfs(rms(chunk)) >= threshold_db;

    let frames: Vec<&[f32]> = samples.chunks(frame).collect();
    let first = frames.iter().position(|f| loud(f)).ok_or(AudioError::Silent)?;
    let last = frames.iter().rposition(|f| loud(f)).unwrap_or(first);

    let start = first * frame;
    let end = ((last + 1) * frame).min(samples.len());
    Ok(samples[start..end].to_vec())
}

/// Raise the peak to `target_dbfs`; quieter-than-target clips are amplified,
/// louder ones left alone. Output is clipped to [-1, 1].
pub fn normalize_peak(samples: &mut [f32], target_dbfs: f32) {
    let peak = samples.iter().fold(0.0f32, |acc, s| acc.max(s.abs()));
    if peak <= f32::EPSILON {
        return;
    }

    let gain_db = target_dbfs - to_dbfs(peak);
    if gain_db > 0.0 {
        let gain = 10f32.powf(gain_db / 20.0);
        samples.iter_mut().for_each(|s| *s *= gain);
    }

    samples.iter_mut().for_each(|s| *s = s.clamp(-1.0, 1.0));
}

/// 16-bit mono WAV bytes
pub fn encode_wav(samples: &[f32], sample_rate: u32) -> Result<Vec<u8>, AudioError> {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };

    let mut cursor = Cursor::new(Vec::new());
    {
        let mut writer = hound::WavWriter::new(&mut cursor, spec)?;
        for &sample in samples {
            let pcm = (sample.clamp(-1.0, 1.0) * i16::MAX as f32).round() as i16;
            writer.write_sample(pcm)?;
        }
        writer.finalize()?;
    }

    Ok(cursor.into_inner())
}

fn frame_len(sample_rate: u32) -> usize {
    ((sample_rate * FRAME_MS) / 1000).max(1) as usize
}

fn rms(samples: &[f32]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }
    let sum: f32 = samples.iter().map(|s| s * s).sum();
    (sum / samples.len() as f32).sqrt()
}

fn to_dbfs(level: f32) -> f32 {
    20.0 * (level + 1e-10).log10()
}
