//! Client-side transcript export: plain text, JSON, and SubRip.

use crate::transcript::{TranscriptEntry, TranscriptStore};
use crate::{Result, StudioError};
use std::path::Path;
use std::str::FromStr;
use tracing::info;

/// Supported export formats.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ExportFormat {
    Text,
    Json,
    Srt,
}

impl ExportFormat {
    /// Conventional file extension for the format
    pub fn extension(&self) -> &'static str {
        match self {
            ExportFormat::Text => "txt",
            ExportFormat::Json => "json",
            ExportFormat::Srt => "srt",
        }
    }
}

impl FromStr for ExportFormat {
    type Err = StudioError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "txt" | "text" => Ok(ExportFormat::Text),
            "json" => Ok(ExportFormat::Json),
            "srt" => Ok(ExportFormat::Srt),
            other => Err(StudioError::ExportError(format!(
                "Unknown export format: {}",
                other
            ))),
        }
    }
}

/// Format seconds as a SubRip timestamp (`HH:MM:SS,mmm`).
fn srt_timestamp(seconds: f64) -> String {
    let total_ms = (seconds.max(0.0) * 1000.0).round() as u64;
    let ms = total_ms % 1000;
    let total_secs = total_ms / 1000;
    let secs = total_secs % 60;
    let mins = (total_secs / 60) % 60;
    let hours = total_secs / 3600;
    format!("{:02}:{:02}:{:02},{:03}", hours, mins, secs, ms)
}

/// Render the transcript as speaker-prefixed plain text.
pub fn to_plain_text(entries: &[TranscriptEntry]) -> String {
    let mut out = String::new();
    for entry in entries {
        out.push_str(&format!("{}: {}\n", entry.speaker_name, entry.text));
    }
    out
}

/// Render the transcript as pretty-printed JSON.
pub fn to_json(entries: &[TranscriptEntry]) -> Result<String> {
    serde_json::to_string_pretty(entries)
        .map_err(|e| StudioError::ExportError(format!("JSON export failed: {}", e)))
}

/// Render the transcript as SubRip subtitles.
pub fn to_srt(entries: &[TranscriptEntry]) -> String {
    let mut out = String::new();
    for (index, entry) in entries.iter().enumerate() {
        out.push_str(&format!(
            "{}\n{} --> {}\n{}: {}\n\n",
            index + 1,
            srt_timestamp(entry.start),
            srt_timestamp(entry.end),
            entry.speaker_name,
            entry.text
        ));
    }
    out
}

impl TranscriptStore {
    /// Render the whole transcript in the given format.
    pub fn render(&self, format: ExportFormat) -> Result<String> {
        match format {
            ExportFormat::Text => Ok(to_plain_text(self.entries())),
            ExportFormat::Json => to_json(self.entries()),
            ExportFormat::Srt => Ok(to_srt(self.entries())),
        }
    }

    /// Write the rendered transcript to a file.
    pub fn write_to_file<P: AsRef<Path>>(&self, path: P, format: ExportFormat) -> Result<()> {
        let rendered = self.render(format)?;
        std::fs::write(path.as_ref(), rendered)
            .map_err(|e| StudioError::ExportError(format!("Failed to write export: {}", e)))?;
        info!(
            "Exported {} transcript entries to {:?}",
            self.len(),
            path.as_ref()
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cluster::SpeakerId;

    fn sample_entries() -> Vec<TranscriptEntry> {
        vec![
            TranscriptEntry {
                speaker: SpeakerId(0),
                speaker_name: "Speaker A".into(),
                text: "Hello there.".into(),
                start: 0.0,
                end: 1.5,
                emotion: None,
            },
            TranscriptEntry {
                speaker: SpeakerId(1),
                speaker_name: "Speaker B".into(),
                text: "Hi.".into(),
                start: 1.8,
                end: 2.4,
                emotion: Some("neutral".into()),
            },
        ]
    }

    #[test]
    fn test_plain_text_export() {
        let text = to_plain_text(&sample_entries());
        assert_eq!(text, "Speaker A: Hello there.\nSpeaker B: Hi.\n");
    }

    #[test]
    fn test_json_export_round_trips() {
        let json = to_json(&sample_entries()).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value.as_array().unwrap().len(), 2);
        assert_eq!(value[0]["speaker_name"], "Speaker A");
        assert_eq!(value[1]["emotion"], "neutral");
    }

    #[test]
    fn test_srt_timestamps() {
        assert_eq!(srt_timestamp(0.0), "00:00:00,000");
        assert_eq!(srt_timestamp(1.5), "00:00:01,500");
        assert_eq!(srt_timestamp(3661.25), "01:01:01,250");
    }

    #[test]
    fn test_srt_export_layout() {
        let srt = to_srt(&sample_entries());
        let expected_head = "1\n00:00:00,000 --> 00:00:01,500\nSpeaker A: Hello there.\n\n";
        assert!(srt.starts_with(expected_head));
        assert!(srt.contains("2\n00:00:01,800 --> 00:00:02,400\nSpeaker B: Hi.\n"));
    }

    #[test]
    fn test_format_from_str() {
        assert_eq!("txt".parse::<ExportFormat>().unwrap(), ExportFormat::Text);
        assert_eq!("SRT".parse::<ExportFormat>().unwrap(), ExportFormat::Srt);
        assert!("xml".parse::<ExportFormat>().is_err());
    }

    #[test]
    fn test_write_to_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("transcript.txt");

        let mut store = TranscriptStore::new();
        for entry in sample_entries() {
            store.push(entry);
        }
        store.write_to_file(&path, ExportFormat::Text).unwrap();

        let written = std::fs::read_to_string(&path).unwrap();
        assert!(written.contains("Speaker A: Hello there."));
    }
}
