use super::error::AudioError;
use crate::recording::AudioFormat;
use std::io::Cursor;
use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{CodecParameters, DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::{FormatOptions, FormatReader};
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use tracing::{debug, info};

/// Decoded audio clip (f32 PCM in [-1, 1], interleaved)
pub struct AudioFile {
    pub format: AudioFormat,
    pub duration_seconds: f64,
    pub sample_rate: u32,
    pub channels: u16,
    pub samples: Vec<f32>,
}

impl AudioFile {
    /// Decode an uploaded clip from memory
    pub fn decode(bytes: &[u8], format: AudioFormat) -> Result<Self, AudioError> {
        if bytes.is_empty() {
            return Err(AudioError::Empty);
        }

        let mut reader = open_reader(bytes, format)?;
        let track = reader
            .tracks()
            .iter()
            .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
            .ok_or(AudioError::NoAudioTrack)?;
        let track_id = track.id;
        let codec_params = track.codec_params.clone();

        let mut decoder = symphonia::default::get_codecs()
            .make(&codec_params, &DecoderOptions::default())
            .map_err(|e| AudioError::Decode(format!("Unsupported codec: {}", e)))?;

        let mut sample_rate = codec_params.sample_rate.unwrap_or(0);
        let mut channels = codec_params.channels.map(|c| c.count() as u16).unwrap_or(0);
        let mut samples: Vec<f32> = Vec::new();

        loop {
            let packet = match reader.next_packet() {
                Ok(packet) => packet,
                Err(SymphoniaError::IoError(e)) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                    break
                }
                Err(SymphoniaError::ResetRequired) => break,
                Err(e) => return Err(AudioError::Decode(format!("Failed to read packet: {}", e))),
            };

            if packet.track_id() != track_id {
                continue;
            }

            match decoder.decode(&packet) {
                Ok(decoded) => {
                    let spec = *decoded.spec();
                    sample_rate = spec.rate;
                    channels = spec.channels.count() as u16;

                    let mut buffer = SampleBuffer::<f32>::new(decoded.capacity() as u64, spec);
                    buffer.copy_interleaved_ref(decoded);
                    samples.extend_from_slice(buffer.samples());
                }
                Err(SymphoniaError::DecodeError(e)) => {
                    // Corrupt packet, skip it
                    debug!("Skipping undecodable packet: {}", e);
                }
                Err(e) => return Err(AudioError::Decode(format!("Decoder failed: {}", e))),
            }
        }

        if samples.is_empty() || sample_rate == 0 || channels == 0 {
            return Err(AudioError::Empty);
        }

        let duration_seconds = samples.len() as f64 / (sample_rate as f64 * channels as f64);

        info!(
            "Audio decoded: {:.1}s, {}Hz, {} channels, {} samples",
            duration_seconds,
            sample_rate,
            channels,
            samples.len()
        );

        Ok(Self {
            format,
            duration_seconds,
            sample_rate,
            channels,
            samples,
        })
    }

    /// Duration of a clip, read from the container header when it carries a
    /// frame count. Streams without one (e.g. MP3 lacking a Xing header) are
    /// decoded in full. Callers on the async runtime should use `spawn_blocking`.
    pub fn probe_duration(bytes: &[u8], format: AudioFormat) -> Option<f64> {
        if bytes.is_empty() {
            return None;
        }

        let reader = open_reader(bytes, format).ok()?;
        let header_duration = reader
            .tracks()
            .iter()
            .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
            .and_then(|t| header_duration(&t.codec_params));

        match header_duration {
            Some(duration) => Some(duration),
            None => {
                debug!("No frame count in {} header, decoding to measure duration", format);
                Self::decode(bytes, format).ok().map(|a| a.duration_seconds)
            }
        }
    }
}

fn open_reader(bytes: &[u8], format: AudioFormat) -> Result<Box<dyn FormatReader>, AudioError> {
    let source = MediaSourceStream::new(Box::new(Cursor::new(bytes.to_vec())), Default::default());
    let mut hint = Hint::new();
    hint.with_extension(format.extension());

    let probed = symphonia::default::get_probe()
        .format(
            &hint,
            source,
            &FormatOptions::default(),
            &MetadataOptions::default(),
        )
        .map_err(|e| AudioError::Decode(format!("Unrecognized {} stream: {}", format, e)))?;

    Ok(probed.format)
}

fn header_duration(params: &CodecParameters) -> Option<f64> {
    let frames = params.n_frames?;
    if let Some(rate) = params.sample_rate.filter(|r| *r > 0) {
        return Some(frames as f64 / rate as f64);
    }
    params.time_base.map(|tb| {
        let time = tb.calc_time(frames);
        time.seconds as f64 + time.frac
    })
}
