//! Turning chat transcripts into plan refinement input
//!
//! A transcript comes either from the service (by session identity) or from a
//! chat export file. It is rendered as text, appended to the refinement
//! context, and separately sent off for an insights summary.

use thiserror::Error;
use tracing::{debug, warn};

use crate::codec::{CodecError, decode_chat};
use crate::domain::TranscriptEntry;
use crate::service::{InsightsReply, PlanService, ServiceError};

/// Marks imported text in the refinement context
pub const IMPORT_HEADER: &str = "--- Imported Chat History ---";

/// What the service says when a conversation has nothing useful in it
pub const NO_INSIGHTS_SENTINEL: &str = "No specific workout insights found in the conversation.";

/// Errors from fetching or reading a transcript
#[derive(Debug, Error)]
pub enum ImportError {
    #[error("No active chat session found. Please start a chat conversation first.")]
    NoSession,

    #[error("No chat history found for the current session.")]
    EmptyHistory,

    #[error("Failed to fetch chat history: {0}")]
    Service(#[from] ServiceError),

    #[error("Failed to import chat history: {0}")]
    Codec(#[from] CodecError),
}

impl ImportError {
    /// Text for the user; remote messages are passed through
    pub fn user_message(&self) -> String {
        match self {
            Self::Service(e) => e.user_message(),
            Self::Codec(_) => "Failed to import chat history. Please make sure the file is valid.".to_string(),
            other => other.to_string(),
        }
    }
}

/// Result of asking the service for insights
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InsightsOutcome {
    /// Nothing worth showing
    Nothing,
    /// Summary to show as a transient notice
    Insights(String),
}

/// `You: ...` / `Assistant: ...` lines separated by a blank line
pub fn format_transcript(entries: &[TranscriptEntry]) -> String {
    entries
        .iter()
        .map(|e| format!("{}: {}", e.role.speaker(), e.message))
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// Formatted transcript under the import header
pub fn import_block(entries: &[TranscriptEntry]) -> String {
    format!("{}\n\n{}", IMPORT_HEADER, format_transcript(entries))
}

/// Append `formatted` to existing refinement text, or use it alone when there is none
pub fn append_to_refinement(existing: &str, formatted: &str) -> String {
    if existing.is_empty() {
        formatted.to_string()
    } else {
        format!("{}\n\n{}", existing, formatted)
    }
}

/// Decide whether an insights reply has anything to show
///
/// An explicit `has_insights: false`, an empty summary, or the sentinel text
/// all mean nothing.
pub fn classify_insights(reply: InsightsReply) -> InsightsOutcome {
    let text = reply.insights.trim();
    if reply.has_insights == Some(false) || text.is_empty() || text == NO_INSIGHTS_SENTINEL {
        InsightsOutcome::Nothing
    } else {
        InsightsOutcome::Insights(reply.insights)
    }
}

/// Ask the service for insights; failures are logged and read as nothing
pub async fn derive_insights(service: &dyn PlanService, formatted: &str) -> InsightsOutcome {
    debug!(len = formatted.len(), "derive_insights: called");
    match service.analyze_insights(formatted).await {
        Ok(reply) => classify_insights(reply),
        Err(e) => {
            warn!(error = %e, "derive_insights: analysis failed, ignoring");
            InsightsOutcome::Nothing
        }
    }
}

/// Fetch the stored transcript for a session
///
/// No identity is [`ImportError::NoSession`]; a known session with no
/// messages is [`ImportError::EmptyHistory`].
pub async fn fetch_transcript(
    service: &dyn PlanService,
    session_id: Option<&str>,
) -> Result<Vec<TranscriptEntry>, ImportError> {
    debug!(?session_id, "fetch_transcript: called");
    let session_id = session_id.filter(|id| !id.trim().is_empty()).ok_or(ImportError::NoSession)?;
    let history = service.fetch_history(session_id).await?;
    if history.is_empty() {
        return Err(ImportError::EmptyHistory);
    }
    Ok(history)
}

/// Read the messages out of a chat export
pub fn transcript_from_export(raw: &str) -> Result<Vec<TranscriptEntry>, ImportError> {
    Ok(decode_chat(raw)?.messages)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::service::client::mock::MockPlanService;
    use proptest::prelude::*;

    fn two_entries() -> Vec<TranscriptEntry> {
        vec![TranscriptEntry::user("hi"), TranscriptEntry::assistant("hello")]
    }

    #[test]
    fn test_format_transcript() {
        assert_eq!(format_transcript(&two_entries()), "You: hi\n\nAssistant: hello");
        assert_eq!(format_transcript(&[]), "");
    }

    #[test]
    fn test_import_block_has_header() {
        assert_eq!(
            import_block(&two_entries()),
            "--- Imported Chat History ---\n\nYou: hi\n\nAssistant: hello"
        );
    }

    #[test]
    fn test_append_to_refinement() {
        assert_eq!(append_to_refinement("", "new"), "new");
        assert_eq!(append_to_refinement("bad knee", "new"), "bad knee\n\nnew");
    }

    #[test]
    fn test_classify_insights() {
        let sentinel = InsightsReply {
            insights: NO_INSIGHTS_SENTINEL.to_string(),
            has_insights: None,
        };
        assert_eq!(classify_insights(sentinel), InsightsOutcome::Nothing);
        assert_eq!(classify_insights(InsightsReply::default()), InsightsOutcome::Nothing);

        let flagged = InsightsReply {
            insights: "Prefers mornings".to_string(),
            has_insights: Some(false),
        };
        assert_eq!(classify_insights(flagged), InsightsOutcome::Nothing);

        let found = InsightsReply {
            insights: "Prefers mornings".to_string(),
            has_insights: None,
        };
        assert_eq!(
            classify_insights(found),
            InsightsOutcome::Insights("Prefers mornings".to_string())
        );
    }

    #[tokio::test]
    async fn test_derive_insights_swallows_failure() {
        let service = MockPlanService::new();
        MockPlanService::push(&service.insights, Err("model offline"));
        assert_eq!(derive_insights(&service, "text").await, InsightsOutcome::Nothing);
    }

    #[tokio::test]
    async fn test_fetch_without_session() {
        let service = MockPlanService::new();
        assert!(matches!(fetch_transcript(&service, None).await, Err(ImportError::NoSession)));
        assert!(matches!(fetch_transcript(&service, Some("  ")).await, Err(ImportError::NoSession)));
        assert_eq!(service.call_count(), 0);
    }

    #[tokio::test]
    async fn test_fetch_distinguishes_empty_from_failure() {
        let service = MockPlanService::new();
        MockPlanService::push(&service.histories, Ok(vec![]));
        MockPlanService::push(&service.histories, Err("Session not found"));
        MockPlanService::push(&service.histories, Ok(two_entries()));

        assert!(matches!(
            fetch_transcript(&service, Some("s")).await,
            Err(ImportError::EmptyHistory)
        ));
        let err = fetch_transcript(&service, Some("s")).await.unwrap_err();
        assert!(matches!(err, ImportError::Service(_)));
        assert_eq!(err.user_message(), "Session not found");
        assert_eq!(fetch_transcript(&service, Some("s")).await.unwrap().len(), 2);
    }

    #[test]
    fn test_transcript_from_export() {
        let raw = r#"{"sessionId": "s", "messages": [{"role": "user", "message": "hi"}]}"#;
        assert_eq!(transcript_from_export(raw).unwrap(), vec![TranscriptEntry::user("hi")]);
        assert!(matches!(transcript_from_export("{}"), Err(ImportError::Codec(_))));
    }

    proptest! {
        #[test]
        fn prop_append_keeps_prior_text(first in ".+", second in ".+", third in ".*") {
            let once = append_to_refinement(&first, &second);
            let twice = append_to_refinement(&once, &third);
            prop_assert!(twice.contains(&first));
            prop_assert!(twice.contains(&once));
        }
    }
}
