//! Domain model for the TimeTagger API.
//!
//! # Design
//! `Record` and `Setting` are value objects: fields are private and every
//! change goes through a consuming `with_*` method that returns a new value
//! with the rest carried over. Defaults that depend on the clock are taken
//! once, at construction, so a value never changes after it is built.
//!
//! The JSON shapes exchanged with the service live in `wire`; these types
//! are what callers see.

use chrono::{DateTime, TimeDelta, Utc};
use serde_json::Value;
use uuid::Uuid;

/// Description prefix that marks a record as deleted.
pub const HIDDEN_MARKER: &str = "HIDDEN";

/// A single tracked time interval.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    key: String,
    start: DateTime<Utc>,
    end: Option<DateTime<Utc>>,
    description: String,
    modified_time: DateTime<Utc>,
    server_time: DateTime<Utc>,
}

impl Record {
    /// An open-ended record starting at `start`.
    ///
    /// Description defaults to empty, modified time to now, server time to
    /// the epoch (not yet known to the server).
    pub fn new(key: impl Into<String>, start: DateTime<Utc>) -> Self {
        Self {
            key: key.into(),
            start,
            end: None,
            description: String::new(),
            modified_time: Utc::now(),
            server_time: DateTime::<Utc>::UNIX_EPOCH,
        }
    }

    /// A record the service will treat as still running (`end == start`).
    pub fn running(key: impl Into<String>, start: DateTime<Utc>) -> Self {
        Self::new(key, start).with_end(start)
    }

    /// A fresh random key suitable for a record or setting that does not
    /// exist on the server yet.
    pub fn new_key() -> String {
        Uuid::new_v4().simple().to_string()
    }

    pub fn with_end(self, end: DateTime<Utc>) -> Self {
        Self {
            end: Some(end),
            ..self
        }
    }

    pub fn with_description(self, description: impl Into<String>) -> Self {
        Self {
            description: description.into(),
            ..self
        }
    }

    pub fn with_modified_time(self, modified_time: DateTime<Utc>) -> Self {
        Self {
            modified_time,
            ..self
        }
    }

    /// Server time is assigned by the service; callers only need this when
    /// rebuilding a record they already fetched.
    pub fn with_server_time(self, server_time: DateTime<Utc>) -> Self {
        Self {
            server_time,
            ..self
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn start(&self) -> DateTime<Utc> {
        self.start
    }

    /// `None` when the caller never set an end.
    pub fn end(&self) -> Option<DateTime<Utc>> {
        self.end
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn modified_time(&self) -> DateTime<Utc> {
        self.modified_time
    }

    pub fn server_time(&self) -> DateTime<Utc> {
        self.server_time
    }

    /// Whether the record is still running.
    ///
    /// The service encodes a running record as `end == start`. Anything
    /// under one millisecond of elapsed time counts, which is a fragile
    /// threshold kept for compatibility with other TimeTagger clients.
    ///
    /// An end before the start is not running: `duration()` then comes out
    /// negative so the broken interval stays visible.
    pub fn is_running(&self) -> bool {
        match self.end {
            Some(end) => {
                let elapsed = end - self.start;
                elapsed >= TimeDelta::zero() && elapsed < TimeDelta::milliseconds(1)
            }
            None => true,
        }
    }

    /// Elapsed time; for a running record this is measured up to now.
    pub fn duration(&self) -> TimeDelta {
        match self.end {
            Some(end) if !self.is_running() => end - self.start,
            _ => Utc::now() - self.start,
        }
    }

    /// `duration()` truncated to whole seconds.
    pub fn duration_seconds(&self) -> i64 {
        self.duration().num_seconds()
    }

    /// `#`-prefixed words of the description, in order of first appearance.
    pub fn tags(&self) -> Vec<&str> {
        let mut tags: Vec<&str> = Vec::new();
        for word in self.description.split_whitespace() {
            if word.len() > 1 && word.starts_with('#') && !tags.contains(&word) {
                tags.push(word);
            }
        }
        tags
    }

    /// Soft-deleted records keep existing; their description starts with
    /// [`HIDDEN_MARKER`].
    pub fn is_hidden(&self) -> bool {
        self.description.starts_with(HIDDEN_MARKER)
    }

    /// This record with the soft-delete marker applied. Already hidden
    /// records come back unchanged.
    pub fn hidden(self) -> Self {
        if self.is_hidden() {
            return self;
        }
        let description = format!("{HIDDEN_MARKER} {}", self.description);
        self.with_description(description)
    }
}

/// An opaque key/value preference entry.
#[derive(Debug, Clone, PartialEq)]
pub struct Setting {
    key: String,
    value: Value,
    modified_time: DateTime<Utc>,
    server_time: DateTime<Utc>,
}

impl Setting {
    pub fn new(key: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
            modified_time: Utc::now(),
            server_time: DateTime::<Utc>::UNIX_EPOCH,
        }
    }

    pub fn with_value(self, value: impl Into<Value>) -> Self {
        Self {
            value: value.into(),
            ..self
        }
    }

    pub fn with_modified_time(self, modified_time: DateTime<Utc>) -> Self {
        Self {
            modified_time,
            ..self
        }
    }

    pub fn with_server_time(self, server_time: DateTime<Utc>) -> Self {
        Self {
            server_time,
            ..self
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    /// Server-defined shape; the client never interprets it.
    pub fn value(&self) -> &Value {
        &self.value
    }

    pub fn modified_time(&self) -> DateTime<Utc> {
        self.modified_time
    }

    pub fn server_time(&self) -> DateTime<Utc> {
        self.server_time
    }
}

/// Outcome of a batch write. The server may accept part of a batch.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WriteResult {
    pub accepted: Vec<String>,
    pub rejected: Vec<String>,
    /// One entry per rejected key, possibly followed by general errors.
    pub errors: Vec<String>,
}

impl WriteResult {
    /// True when every submitted item was accepted and no error was reported.
    pub fn is_complete(&self) -> bool {
        self.rejected.is_empty() && self.errors.is_empty()
    }
}

/// Changes since a sync checkpoint.
#[derive(Debug, Clone, PartialEq)]
pub struct Updates {
    /// Use as `since` for the next incremental sync.
    pub server_time: DateTime<Utc>,
    /// The server asked for a full resync; `records` and `settings` hold
    /// everything rather than a delta.
    pub reset: bool,
    pub records: Vec<Record>,
    pub settings: Vec<Setting>,
}

/// Parsed body of the updates endpoint.
#[derive(Debug, Clone, PartialEq)]
pub enum UpdateFeed {
    /// The delta can be applied as-is.
    Delta(Updates),
    /// The delta is unreliable; fetch everything instead.
    Reset { server_time: DateTime<Utc> },
}
