//! HTTP implementation of the plan service
//!
//! Form-encoded requests against the assistant's REST endpoints. Replies are
//! either `{<field>: result}` or `{error: message}`, sometimes with a non-2xx
//! status and sometimes not.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Method, Response};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use super::{InsightsReply, PlanService, ServiceError};
use crate::config::ServiceConfig;
use crate::domain::{Assessment, Plan, Profile, RefinementContext, TranscriptEntry};

/// Maximum number of retries for idempotent requests
const MAX_RETRIES: u32 = 3;

/// Initial backoff delay for retries
const INITIAL_BACKOFF_MS: u64 = 500;

/// Envelope shared by every reply: the payload field or an error message
#[derive(Debug, Deserialize)]
struct Envelope<T> {
    #[serde(default)]
    error: Option<String>,
    #[serde(flatten)]
    payload: Option<T>,
}

#[derive(Debug, Deserialize)]
struct AssessmentReply {
    assessment: String,
}

#[derive(Debug, Deserialize)]
struct PlanReply {
    plan: Plan,
}

#[derive(Debug, Deserialize)]
struct ExplanationReply {
    explanation: String,
}

#[derive(Debug, Deserialize)]
struct HistoryReply {
    history: Vec<TranscriptEntry>,
}

#[derive(Debug, Deserialize)]
struct MessageReply {
    #[allow(dead_code)]
    message: Option<String>,
}

/// Plan service over HTTP
#[derive(Debug, Clone)]
pub struct HttpPlanService {
    base_url: String,
    http: Client,
}

impl HttpPlanService {
    /// Create a new client from configuration
    pub fn from_config(config: &ServiceConfig) -> Result<Self, ServiceError> {
        debug!(base_url = %config.base_url, timeout_ms = config.timeout_ms, "from_config: called");
        let http = Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .build()
            .map_err(ServiceError::Network)?;
        Ok(Self {
            base_url: config.base_url.trim_end_matches('/').to_string(),
            http,
        })
    }

    pub(crate) fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    pub(crate) fn http(&self) -> &Client {
        &self.http
    }

    /// POST form fields once; no retry since generation is not idempotent
    async fn post_form<T: DeserializeOwned>(&self, path: &str, fields: &[(&str, String)]) -> Result<T, ServiceError> {
        debug!(%path, field_count = fields.len(), "post_form: called");
        let response = self.http.post(self.url(path)).form(fields).send().await?;
        decode_reply(response).await
    }

    /// Idempotent request with exponential backoff on transient failures
    async fn request_with_retry<T: DeserializeOwned>(&self, method: Method, path: &str) -> Result<T, ServiceError> {
        debug!(%method, %path, "request_with_retry: called");
        let url = self.url(path);
        let mut last_error = None;
        for attempt in 0..=MAX_RETRIES {
            if attempt > 0 {
                let backoff = INITIAL_BACKOFF_MS * 2u64.pow(attempt - 1);
                warn!(attempt, backoff_ms = backoff, %path, "request_with_retry: retrying after transient error");
                tokio::time::sleep(Duration::from_millis(backoff)).await;
            }

            let result = match self.http.request(method.clone(), &url).send().await {
                Ok(response) => decode_reply(response).await,
                Err(e) => Err(ServiceError::Network(e)),
            };

            match result {
                Err(e) if e.is_retryable() && attempt < MAX_RETRIES => {
                    debug!(attempt, error = %e, "request_with_retry: transient failure");
                    last_error = Some(e);
                }
                other => return other,
            }
        }

        Err(last_error.unwrap_or_else(|| ServiceError::InvalidResponse("Max retries exceeded".to_string())))
    }
}

/// Decode a reply body, mapping `{error}` payloads and bad statuses to [`ServiceError::Remote`]
pub(crate) async fn decode_reply<T: DeserializeOwned>(response: Response) -> Result<T, ServiceError> {
    let status = response.status();
    let body = response.text().await?;
    debug!(status = status.as_u16(), body_len = body.len(), "decode_reply: called");
    parse_reply(status.as_u16(), status.is_success(), &body)
}

fn parse_reply<T: DeserializeOwned>(status: u16, success: bool, body: &str) -> Result<T, ServiceError> {
    let envelope: Result<Envelope<T>, _> = serde_json::from_str(body);
    match envelope {
        Ok(Envelope { error: Some(message), .. }) => Err(ServiceError::Remote { status, message }),
        Ok(_) | Err(_) if !success => Err(ServiceError::Remote {
            status,
            message: String::new(),
        }),
        Ok(Envelope { payload: Some(payload), .. }) => Ok(payload),
        Ok(Envelope { payload: None, .. }) => Err(ServiceError::InvalidResponse(
            "reply is missing its result field".to_string(),
        )),
        Err(e) => Err(ServiceError::InvalidResponse(e.to_string())),
    }
}

#[async_trait]
impl PlanService for HttpPlanService {
    async fn create_assessment(&self, profile: &Profile) -> Result<Assessment, ServiceError> {
        debug!(name = %profile.name, "create_assessment: called");
        let reply: AssessmentReply = self
            .post_form("/generate_physical_assessment", &profile.form_fields())
            .await?;
        Ok(Assessment(reply.assessment))
    }

    async fn generate_plan(&self, profile: &Profile, refinement: &RefinementContext) -> Result<Plan, ServiceError> {
        debug!(name = %profile.name, env = %refinement.training_environment, "generate_plan: called");
        let mut fields = profile.form_fields();
        fields.push(("additional_info", refinement.additional_info.clone()));
        fields.push(("training_environment", refinement.training_environment.to_string()));
        let reply: PlanReply = self.post_form("/generate_workout_plan", &fields).await?;
        Ok(reply.plan)
    }

    async fn adjust_plan(&self, name: &str, adjustment: &str, plan: &Plan) -> Result<Plan, ServiceError> {
        debug!(%name, adjustment_len = adjustment.len(), "adjust_plan: called");
        let fields = [
            ("name", name.to_string()),
            ("adjustment_text", adjustment.to_string()),
            ("current_plan", serde_json::to_string(plan)?),
        ];
        let reply: PlanReply = self.post_form("/adjust_workout_plan", &fields).await?;
        Ok(reply.plan)
    }

    async fn explain_exercise(
        &self,
        profile: &Profile,
        plan: &Plan,
        day: &str,
        exercise: &str,
    ) -> Result<String, ServiceError> {
        debug!(%day, %exercise, "explain_exercise: called");
        let fields = [
            ("name", profile.name.clone()),
            ("day", day.to_string()),
            ("exercise", exercise.to_string()),
            ("current_plan", serde_json::to_string(plan)?),
            ("user_data", serde_json::to_string(profile)?),
        ];
        let reply: ExplanationReply = self.post_form("/explain_exercise", &fields).await?;
        Ok(reply.explanation)
    }

    async fn analyze_insights(&self, transcript_text: &str) -> Result<InsightsReply, ServiceError> {
        debug!(text_len = transcript_text.len(), "analyze_insights: called");
        let fields = [("chat_history", transcript_text.to_string())];
        self.post_form("/analyze_chat_insights", &fields).await
    }

    async fn fetch_history(&self, session_id: &str) -> Result<Vec<TranscriptEntry>, ServiceError> {
        debug!(%session_id, "fetch_history: called");
        let reply: HistoryReply = self
            .request_with_retry(Method::GET, &format!("/get_chat_history/{}", session_id))
            .await?;
        Ok(reply.history)
    }

    async fn clear_history(&self, session_id: &str) -> Result<(), ServiceError> {
        debug!(%session_id, "clear_history: called");
        let _: MessageReply = self
            .request_with_retry(Method::DELETE, &format!("/clear_chat_history/{}", session_id))
            .await?;
        Ok(())
    }
}
