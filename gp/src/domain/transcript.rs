//! Chat transcript and incremental answer assembly

use serde::{Deserialize, Serialize};
use tracing::debug;

/// Who said it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    /// Speaker label used when rendering a transcript as text
    pub fn speaker(&self) -> &'static str {
        match self {
            Self::User => "You",
            Self::Assistant => "Assistant",
        }
    }
}

/// One message in the conversation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TranscriptEntry {
    pub role: Role,
    pub message: String,

    /// Still receiving streamed fragments; never serialized
    #[serde(skip)]
    pending: bool,
}

impl TranscriptEntry {
    pub fn user(message: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            message: message.into(),
            pending: false,
        }
    }

    pub fn assistant(message: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            message: message.into(),
            pending: false,
        }
    }

    pub fn is_pending(&self) -> bool {
        self.pending
    }
}

/// How an answer fragment was merged
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FragmentMerge {
    /// Appended to the pending placeholder
    Pending,
    /// Appended to the last, already-finished assistant entry
    Continuation,
    /// Started a new assistant entry
    NewEntry,
}

/// Ordered conversation; at most one entry is pending and it is always the
/// most recent assistant entry
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Transcript {
    entries: Vec<TranscriptEntry>,
}

impl Transcript {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_entries(mut entries: Vec<TranscriptEntry>) -> Self {
        for entry in &mut entries {
            entry.pending = false;
        }
        Self { entries }
    }

    pub fn entries(&self) -> &[TranscriptEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn has_pending(&self) -> bool {
        self.entries.last().is_some_and(|e| e.pending)
    }

    /// Record a user message and open an empty pending assistant entry for the reply
    pub fn begin_exchange(&mut self, text: &str) {
        debug!(len = self.entries.len(), "Transcript::begin_exchange: called");
        self.finish_pending();
        self.entries.push(TranscriptEntry::user(text));
        self.entries.push(TranscriptEntry {
            role: Role::Assistant,
            message: String::new(),
            pending: true,
        });
    }

    /// Merge a streamed answer fragment
    ///
    /// Pending entry present: append to it. Otherwise, last entry is a finished
    /// assistant entry: append to it as a continuation. Otherwise start a new
    /// assistant entry.
    pub fn apply_fragment(&mut self, fragment: &str) -> FragmentMerge {
        if let Some(last) = self.entries.last_mut() {
            if last.pending {
                debug!("Transcript::apply_fragment: pending entry");
                last.message.push_str(fragment);
                return FragmentMerge::Pending;
            }
            if last.role == Role::Assistant {
                debug!("Transcript::apply_fragment: continuation");
                last.message.push_str(fragment);
                return FragmentMerge::Continuation;
            }
        }
        debug!("Transcript::apply_fragment: new entry");
        self.entries.push(TranscriptEntry::assistant(fragment));
        FragmentMerge::NewEntry
    }

    /// Mark the pending entry finished, keeping whatever text arrived
    pub fn finish_pending(&mut self) {
        if let Some(last) = self.entries.last_mut()
            && last.pending
        {
            last.pending = false;
        }
    }

    /// Give up on the in-flight answer; an empty placeholder is removed
    pub fn abandon_pending(&mut self) {
        if self.has_pending() {
            debug!("Transcript::abandon_pending: dropping in-flight answer");
            let empty = self.entries.last().is_some_and(|e| e.message.is_empty());
            if empty {
                self.entries.pop();
            } else {
                self.finish_pending();
            }
        }
    }

    /// Replace everything (history replay on resume)
    pub fn replace(&mut self, entries: Vec<TranscriptEntry>) {
        *self = Self::from_entries(entries);
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}
