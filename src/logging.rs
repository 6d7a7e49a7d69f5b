//! Journal of finished generations, persisted as JSONL.
//!
//! Diagnostics go through `tracing`; this journal only records the outcome
//! of each generation (vendor, model, finish reason, usage) so token spend
//! can be reviewed later.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;
use std::sync::{Arc, Mutex};

use crate::providers::Vendor;
use crate::translate::streaming::Completion;
use crate::translate::types::{FinishReason, Usage};

const MAX_RECORDS: usize = 10_000;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationRecord {
    pub timestamp: DateTime<Utc>,
    pub vendor: Vendor,
    pub model: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub finish_reason: Option<FinishReason>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub usage: Option<Usage>,
}

impl GenerationRecord {
    pub fn new(vendor: Vendor, model: impl Into<String>) -> Self {
        Self {
            timestamp: Utc::now(),
            vendor,
            model: model.into(),
            finish_reason: None,
            usage: None,
        }
    }

    /// Record the outcome of a finished stream.
    pub fn with_completion(mut self, completion: &Completion) -> Self {
        self.finish_reason = completion.finish_reason;
        self.usage = completion.usage.clone();
        self
    }
}

/// Ring buffer of recent records backed by an append-only JSONL file.
pub struct GenerationJournal {
    records: VecDeque<GenerationRecord>,
    writer: BufWriter<File>,
}

impl GenerationJournal {
    /// Open (or create) the journal at `file_path`, replaying what is there.
    pub fn open(file_path: impl AsRef<Path>) -> std::io::Result<Self> {
        let file_path = file_path.as_ref();

        if let Some(parent) = file_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let mut records = VecDeque::with_capacity(MAX_RECORDS);

        if file_path.exists() {
            let reader = BufReader::new(File::open(file_path)?);
            for line in reader.lines().map_while(std::result::Result::ok) {
                if let Ok(record) = serde_json::from_str::<GenerationRecord>(&line) {
                    if records.len() >= MAX_RECORDS {
                        records.pop_front();
                    }
                    records.push_back(record);
                }
            }
        }

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(file_path)?;

        Ok(Self {
            records,
            writer: BufWriter::new(file),
        })
    }

    pub fn record(&mut self, record: GenerationRecord) {
        match serde_json::to_string(&record) {
            Ok(json) => {
                if let Err(e) = writeln!(self.writer, "{json}").and_then(|()| self.writer.flush()) {
                    tracing::warn!(error = %e, "Failed to append to generation journal");
                }
            }
            Err(e) => tracing::warn!(error = %e, "Failed to serialize generation record"),
        }
        if self.records.len() >= MAX_RECORDS {
            self.records.pop_front();
        }
        self.records.push_back(record);
    }

    /// Most recent records first.
    pub fn recent(&self, limit: usize) -> Vec<GenerationRecord> {
        self.records.iter().rev().take(limit).cloned().collect()
    }
}

#[derive(Clone)]
pub struct SharedJournal(Arc<Mutex<GenerationJournal>>);

impl SharedJournal {
    pub fn open(file_path: impl AsRef<Path>) -> std::io::Result<Self> {
        Ok(Self(Arc::new(Mutex::new(GenerationJournal::open(file_path)?))))
    }

    pub fn record(&self, record: GenerationRecord) {
        if let Ok(mut journal) = self.0.lock() {
            journal.record(record);
        }
    }

    pub fn recent(&self, limit: usize) -> Vec<GenerationRecord> {
        self.0.lock().map(|j| j.recent(limit)).unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn finished(output_tokens: u64) -> Completion {
        Completion {
            finish_reason: Some(FinishReason::Stop),
            usage: Some(Usage {
                output_tokens: Some(output_tokens),
                ..Usage::default()
            }),
            ..Completion::default()
        }
    }

    #[test]
    fn test_records_survive_reopen() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("journal.jsonl");

        let journal = SharedJournal::open(&path).unwrap();
        journal.record(GenerationRecord::new(Vendor::Anthropic, "claude").with_completion(&finished(5)));
        journal.record(GenerationRecord::new(Vendor::Google, "gemini").with_completion(&finished(9)));
        drop(journal);

        let reopened = SharedJournal::open(&path).unwrap();
        let recent = reopened.recent(10);
        assert_eq!(recent.len(), 2);
        assert_eq!(recent[0].model, "gemini");
        assert_eq!(recent[0].usage.as_ref().unwrap().output_tokens, Some(9));
        assert_eq!(recent[1].vendor, Vendor::Anthropic);
    }

    #[test]
    fn test_garbage_lines_are_skipped_on_replay() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("journal.jsonl");
        std::fs::write(&path, "not json\n").unwrap();

        let journal = SharedJournal::open(&path).unwrap();
        assert!(journal.recent(5).is_empty());

        journal.record(GenerationRecord::new(Vendor::OpenAiChat, "gpt"));
        let text = std::fs::read_to_string(&path).unwrap();
        assert_eq!(text.lines().count(), 2);
        assert!(text.lines().last().unwrap().contains("\"vendor\":\"openai_chat\""));
    }

    #[test]
    fn test_recent_respects_limit() {
        let dir = TempDir::new().unwrap();
        let journal = SharedJournal::open(dir.path().join("j.jsonl")).unwrap();
        for i in 0..5 {
            journal.record(GenerationRecord::new(Vendor::OpenAiChat, format!("m{i}")));
        }
        let recent = journal.recent(2);
        assert_eq!(recent.len(), 2);
        assert_eq!(recent[0].model, "m4");
    }
}
