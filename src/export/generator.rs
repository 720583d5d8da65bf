//! Rendering of completed recordings into documents.
//!
//! Output depends only on the recording and the supplied generation time.

use super::format::ExportFormat;
use crate::error::{Error, Result};
use crate::recording::{Recording, RecordingMode, RecordingStatus};
use chrono::{DateTime, SecondsFormat, Utc};
use uuid::Uuid;

const PDF_PAGE_WIDTH: u32 = 612;
const PDF_PAGE_HEIGHT: u32 = 792;
const PDF_MARGIN: u32 = 72;
const PDF_FONT_SIZE: u32 = 10;
const PDF_LEADING: u32 = 12;
const PDF_LINES_PER_PAGE: usize = 54;
const PDF_WRAP_COLUMNS: usize = 90;

/// Identity fields carried in the markdown front matter
#[derive(Debug, Clone, PartialEq)]
pub struct ExportMetadata {
    pub recording_id: Uuid,
    pub mode: RecordingMode,
    pub confidence_score: Option<f64>,
    pub language: Option<String>,
    pub generated_at: Option<DateTime<Utc>>,
}

/// Render a completed recording. Fails with `Error::Render` otherwise.
pub fn render(
    recording: &Recording,
    format: ExportFormat,
    generated_at: DateTime<Utc>,
) -> Result<Vec<u8>> {
    if recording.status != RecordingStatus::Completed {
        return Err(Error::Render(format!(
            "recording {} is {}, only completed recordings can be exported",
            recording.id, recording.status
        )));
    }
    let transcript = recording.transcript().ok_or_else(|| {
        Error::Render(format!("recording {} has no transcript", recording.id))
    })?;

    let document = Document {
        recording,
        transcript,
        generated_at: generated_at.to_rfc3339_opts(SecondsFormat::Secs, true),
    };

    Ok(match format {
        ExportFormat::Markdown => document.markdown().into_bytes(),
        ExportFormat::Rtf => document.rtf().into_bytes(),
        ExportFormat::Pdf => document.pdf(),
    })
}

/// Read the front matter back out of a markdown export
pub fn parse_front_matter(markdown: &str) -> Result<ExportMetadata> {
    let invalid = |msg: &str| Error::Validation(format!("Invalid export front matter: {}", msg));

    let mut lines = markdown.lines();
    if lines.next().map(str::trim) != Some("---") {
        return Err(invalid("missing opening delimiter"));
    }

    let mut recording_id = None;
    let mut mode = None;
    let mut confidence_score = None;
    let mut language = None;
    let mut generated_at = None;
    let mut closed = false;

    for line in lines {
        let line = line.trim();
        if line == "---" {
            closed = true;
            break;
        }
        let Some((key, value)) = line.split_once(':') else {
            continue;
        };
        let value = value.trim();
        match key.trim() {
            "recordingId" => {
                recording_id = Some(Uuid::parse_str(value).map_err(|_| invalid("recordingId"))?)
            }
            "mode" => mode = Some(value.parse::<RecordingMode>()?),
            "confidenceScore" if value != "null" => {
                confidence_score = Some(value.parse::<f64>().map_err(|_| invalid("confidenceScore"))?)
            }
            "language" if value != "null" => language = Some(value.to_string()),
            "generatedAt" => {
                generated_at = DateTime::parse_from_rfc3339(value)
                    .ok()
                    .map(|t| t.with_timezone(&Utc))
            }
            _ => {}
        }
    }

    if !closed {
        return Err(invalid("missing closing delimiter"));
    }

    Ok(ExportMetadata {
        recording_id: recording_id.ok_or_else(|| invalid("recordingId missing"))?,
        mode: mode.ok_or_else(|| invalid("mode missing"))?,
        confidence_score,
        language,
        generated_at,
    })
}

struct Document<'a> {
    recording: &'a Recording,
    transcript: &'a str,
    generated_at: String,
}

impl Document<'_> {
    fn title(&self) -> String {
        let mode = self.recording.mode.as_str();
        let mut chars = mode.chars();
        let capitalized: String = chars
            .next()
            .map(|c| c.to_uppercase().chain(chars).collect())
            .unwrap_or_default();
        format!("{} recording", capitalized)
    }

    fn confidence(&self) -> String {
        self.recording
            .confidence_score
            .map(|c| c.to_string())
            .unwrap_or_else(|| "null".to_string())
    }

    fn language(&self) -> &str {
        self.recording.language.as_deref().unwrap_or("null")
    }

    fn summary(&self) -> Option<&str> {
        self.recording
            .summary
            .as_ref()
            .map(|s| s.text.as_str())
            .filter(|s| !s.trim().is_empty())
    }

    fn markdown(&self) -> String {
        let mut out = String::new();
        out.push_str("---\n");
        out.push_str(&format!("recordingId: {}\n", self.recording.id));
        out.push_str(&format!("mode: {}\n", self.recording.mode));
        out.push_str(&format!("confidenceScore: {}\n", self.confidence()));
        out.push_str(&format!("language: {}\n", self.language()));
        out.push_str(&format!("generatedAt: {}\n", self.generated_at));
        out.push_str("---\n\n");
        out.push_str(&format!("# {}\n\n", self.title()));
        out.push_str("## Summary\n\n");
        out.push_str(self.summary().unwrap_or("_No summary available._"));
        out.push_str("\n\n## Transcript\n\n");
        out.push_str(self.transcript);
        out.push('\n');
        out
    }

    fn rtf(&self) -> String {
        let mut out = String::from("{\\rtf1\\ansi\\deff0{\\fonttbl{\\f0 Helvetica;}}\n\\f0\\fs22\n");
        out.push_str(&format!("{{\\b\\fs32 {}\\par}}\n", rtf_escape(&self.title())));
        out.push_str(&format!("Recording: {}\\par\n", self.recording.id));
        out.push_str(&format!("Mode: {}\\par\n", self.recording.mode));
        out.push_str(&format!("Confidence: {}\\par\n", self.confidence()));
        out.push_str(&format!("Language: {}\\par\n", rtf_escape(self.language())));
        out.push_str(&format!("Generated: {}\\par\n\\par\n", self.generated_at));
        out.push_str("{\\b\\fs26 Summary\\par}\n");
        out.push_str(&rtf_escape(self.summary().unwrap_or("No summary available.")));
        out.push_str("\\par\n\\par\n{\\b\\fs26 Transcript\\par}\n");
        out.push_str(&rtf_escape(self.transcript));
        out.push_str("\\par\n}");
        out
    }

    fn pdf(&self) -> Vec<u8> {
        let mut lines = vec![
            self.title(),
            format!("Recording: {}", self.recording.id),
            format!("Mode: {}", self.recording.mode),
            format!("Confidence: {}", self.confidence()),
            format!("Language: {}", self.language()),
            format!("Generated: {}", self.generated_at),
            String::new(),
            "Summary".to_string(),
        ];
        lines.extend(wrap(self.summary().unwrap_or("No summary available."), PDF_WRAP_COLUMNS));
        lines.push(String::new());
        lines.push("Transcript".to_string());
        lines.extend(wrap(self.transcript, PDF_WRAP_COLUMNS));

        let pages: Vec<&[String]> = lines.chunks(PDF_LINES_PER_PAGE).collect();
        write_pdf(&pages)
    }
}

fn rtf_escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '{' => out.push_str("\\{"),
            '}' => out.push_str("\\}"),
            '\n' => out.push_str("\\par\n"),
            '\r' => {}
            c if c.is_ascii() => out.push(c),
            c => {
                let mut units = [0u16; 2];
                for unit in c.encode_utf16(&mut units) {
                    out.push_str(&format!("\\u{}?", *unit as i16));
                }
            }
        }
    }
    out
}

/// Greedy word wrap; paragraphs are kept, overlong words are split
fn wrap(text: &str, width: usize) -> Vec<String> {
    let mut lines = Vec::new();
    for paragraph in text.lines() {
        let mut line = String::new();
        for word in paragraph.split_whitespace() {
            let mut word: String = word.to_string();
            while word.chars().count() > width {
                if !line.is_empty() {
                    lines.push(std::mem::take(&mut line));
                }
                let head: String = word.chars().take(width).collect();
                word = word.chars().skip(width).collect();
                lines.push(head);
            }
            let separator = usize::from(!line.is_empty());
            let needed = separator + word.chars().count();
            if line.chars().count() + needed > width {
                lines.push(std::mem::take(&mut line));
            }
            if !line.is_empty() {
                line.push(' ');
            }
            line.push_str(&word);
        }
        lines.push(line);
    }
    lines
}

fn pdf_escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '\\' | '(' | ')' => {
                out.push('\\');
                out.push(c);
            }
            c if c.is_ascii() && !c.is_ascii_control() => out.push(c),
            _ => out.push('?'),
        }
    }
    out
}

/// Minimal PDF 1.4: catalog, page tree, one Helvetica font, one content
/// stream per page.
fn write_pdf(pages: &[&[String]]) -> Vec<u8> {
    let page_count = pages.len().max(1);
    let mut objects: Vec<String> = Vec::with_capacity(3 + page_count * 2);

    let kids: Vec<String> = (0..page_count)
        .map(|i| format!("{} 0 R", 4 + 2 * i))
        .collect();
    objects.push("<< /Type /Catalog /Pages 2 0 R >>".to_string());
    objects.push(format!(
        "<< /Type /Pages /Kids [{}] /Count {} >>",
        kids.join(" "),
        page_count
    ));
    objects.push(
        "<< /Type /Font /Subtype /Type1 /BaseFont /Helvetica /Encoding /WinAnsiEncoding >>"
            .to_string(),
    );

    for i in 0..page_count {
        let lines: &[String] = pages.get(i).copied().unwrap_or(&[]);
        let mut stream = format!(
            "BT\n/F1 {} Tf\n{} TL\n{} {} Td\n",
            PDF_FONT_SIZE,
            PDF_LEADING,
            PDF_MARGIN,
            PDF_PAGE_HEIGHT - PDF_MARGIN
        );
        for line in lines {
            stream.push_str(&format!("({}) Tj T*\n", pdf_escape(line)));
        }
        stream.push_str("ET");

        objects.push(format!(
            "<< /Type /Page /Parent 2 0 R /MediaBox [0 0 {} {}] \
             /Resources << /Font << /F1 3 0 R >> >> /Contents {} 0 R >>",
            PDF_PAGE_WIDTH,
            PDF_PAGE_HEIGHT,
            5 + 2 * i
        ));
        objects.push(format!(
            "<< /Length {} >>\nstream\n{}\nendstream",
            stream.len(),
            stream
        ));
    }

    let mut out: Vec<u8> = b"%PDF-1.4\n".to_vec();
    let mut offsets = Vec::with_capacity(objects.len());
    for (i, body) in objects.iter().enumerate() {
        offsets.push(out.len());
        out.extend_from_slice(format!("{} 0 obj\n{}\nendobj\n", i + 1, body).as_bytes());
    }

    let xref_offset = out.len();
    let mut xref = format!("xref\n0 {}\n0000000000 65535 f \n", objects.len() + 1);
    for offset in offsets {
        xref.push_str(&format!("{:010} 00000 n \n", offset));
    }
    xref.push_str(&format!(
        "trailer\n<< /Size {} /Root 1 0 R >>\nstartxref\n{}\n%%EOF\n",
        objects.len() + 1,
        xref_offset
    ));
    out.extend_from_slice(xref.as_bytes());
    out
}
