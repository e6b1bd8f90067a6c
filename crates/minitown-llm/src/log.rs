//! Bounded in-memory log of LLM calls.
//!
//! Every call -- successful or not -- leaves one record. The log is a
//! fixed-capacity ring: appends are O(1), the oldest record is dropped
//! once the cap is reached, and readers get snapshots so the simulation
//! path never holds the lock across an await.

use std::collections::VecDeque;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use serde_json::Value;

/// Maximum records kept in memory.
const CAPACITY: usize = 400;

/// One recorded LLM call.
#[derive(Debug, Clone)]
pub struct CallRecord {
    /// The prompt template key.
    pub prompt_key: String,
    /// The fully rendered prompt sent to the endpoint.
    pub prompt: String,
    /// Raw concatenated response text, or the error description.
    pub raw_response: String,
    /// The parsed, sanitized output handed to the caller.
    pub output: Value,
    /// When the call completed.
    pub at: DateTime<Utc>,
}

/// Fixed-capacity ring of [`CallRecord`]s behind an internal lock.
#[derive(Debug, Default)]
pub struct CallLog {
    records: Mutex<VecDeque<CallRecord>>,
}

impl CallLog {
    /// Create an empty log.
    pub fn new() -> Self {
        Self {
            records: Mutex::new(VecDeque::with_capacity(CAPACITY)),
        }
    }

    /// Append one record, evicting the oldest past capacity.
    pub fn push(&self, record: CallRecord) {
        let Ok(mut records) = self.records.lock() else {
            return;
        };
        if records.len() >= CAPACITY {
            records.pop_front();
        }
        records.push_back(record);
    }

    /// Snapshot of all records, oldest first.
    pub fn snapshot(&self) -> Vec<CallRecord> {
        self.records
            .lock()
            .map(|records| records.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Number of records currently held.
    pub fn len(&self) -> usize {
        self.records.lock().map(|r| r.len()).unwrap_or(0)
    }

    /// True when no calls have been logged.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Render the log the way the front end's LLM panel displays it.
    pub fn rendered(&self) -> String {
        let records = self.snapshot();
        let mut out = String::new();
        for record in records {
            out.push_str(&format!(
                "--- LLM Call @ {} ---\nPrompt Key: {}\nFinal Prompt:\n{}\nRaw Response:\n{}\nParsed Output:\n{}\n\n",
                record.at.format("%Y-%m-%d %H:%M:%S"),
                record.prompt_key,
                record.prompt,
                record.raw_response,
                record.output,
            ));
        }
        out
    }
}
