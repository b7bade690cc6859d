//! PlanService trait definition

use async_trait::async_trait;
use serde::Deserialize;

use super::ServiceError;
use crate::domain::{Assessment, Plan, Profile, RefinementContext, TranscriptEntry};

/// Reply from the chat-insights endpoint
#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize)]
pub struct InsightsReply {
    #[serde(default)]
    pub insights: String,

    /// Explicit flag, when the service sends one; preferred over sentinel text
    #[serde(default)]
    pub has_insights: Option<bool>,
}

/// Request/response side of the remote assistant
///
/// Every call is independent; the service keeps no workflow state for us.
/// Implementations are bounded by their own timeout.
#[async_trait]
pub trait PlanService: Send + Sync {
    /// Narrative assessment of a profile
    async fn create_assessment(&self, profile: &Profile) -> Result<Assessment, ServiceError>;

    /// Full plan from profile plus refinement context
    async fn generate_plan(&self, profile: &Profile, refinement: &RefinementContext) -> Result<Plan, ServiceError>;

    /// Service-computed replacement for `plan` given free-form adjustment text
    async fn adjust_plan(&self, name: &str, adjustment: &str, plan: &Plan) -> Result<Plan, ServiceError>;

    /// Explanation of one exercise in the context of the whole plan
    async fn explain_exercise(
        &self,
        profile: &Profile,
        plan: &Plan,
        day: &str,
        exercise: &str,
    ) -> Result<String, ServiceError>;

    /// Insights summary derived from a formatted transcript
    async fn analyze_insights(&self, transcript_text: &str) -> Result<InsightsReply, ServiceError>;

    /// Stored transcript for a session identity
    async fn fetch_history(&self, session_id: &str) -> Result<Vec<TranscriptEntry>, ServiceError>;

    /// Delete the stored transcript for a session identity
    async fn clear_history(&self, session_id: &str) -> Result<(), ServiceError>;
}
