//! The plan workflow state machine

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use super::{ExplanationCache, Notice, WorkflowError, WorkflowPhase};
use crate::codec::PlanDocument;
use crate::domain::{Assessment, Plan, Profile, RefinementContext, TrainingEnvironment, TranscriptEntry};
use crate::import::{self, InsightsOutcome};
use crate::service::PlanService;

/// An explanation and whether it came from the cache
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Explanation {
    pub text: String,
    pub cached: bool,
}

/// Restorable workflow content
#[derive(Debug, Clone, PartialEq, Default)]
pub struct WorkflowSnapshot {
    pub profile: Option<Profile>,
    pub assessment: Option<Assessment>,
    pub refinement: RefinementContext,
    pub plan: Option<Plan>,
}

impl From<PlanDocument> for WorkflowSnapshot {
    fn from(document: PlanDocument) -> Self {
        Self {
            profile: Some(document.profile),
            assessment: None,
            refinement: document.refinement,
            plan: Some(document.plan),
        }
    }
}

#[derive(Debug, Default)]
struct WorkflowState {
    phase: WorkflowPhase,
    profile: Option<Profile>,
    assessment: Option<Assessment>,
    refinement: RefinementContext,
    plan: Option<Plan>,
    cache: ExplanationCache,
    last_error: Option<String>,
    notice: Option<Notice>,
}

impl WorkflowState {
    fn expect(&self, expected: WorkflowPhase) -> Result<(), WorkflowError> {
        if self.phase == expected {
            Ok(())
        } else {
            Err(WorkflowError::InvalidPhase {
                expected,
                actual: self.phase,
            })
        }
    }

    /// Keep the error for display and hand it back
    fn record(&mut self, error: WorkflowError) -> WorkflowError {
        warn!(error = %error, phase = %self.phase, "workflow action failed");
        self.last_error = Some(error.user_message());
        error
    }
}

/// Clears the busy flag when the action finishes, however it finishes
struct BusyGuard<'a>(&'a AtomicBool);

impl Drop for BusyGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Drives one plan from profile to finished, adjustable plan
pub struct PlanWorkflow {
    service: Arc<dyn PlanService>,
    insight_ttl: Duration,
    state: Mutex<WorkflowState>,
    busy: AtomicBool,
}

impl PlanWorkflow {
    pub fn new(service: Arc<dyn PlanService>, insight_ttl: Duration) -> Self {
        Self {
            service,
            insight_ttl,
            state: Mutex::new(WorkflowState::default()),
            busy: AtomicBool::new(false),
        }
    }

    fn begin(&self) -> Result<BusyGuard<'_>, WorkflowError> {
        self.busy
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map_err(|_| WorkflowError::Busy)?;
        Ok(BusyGuard(&self.busy))
    }

    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }

    pub async fn phase(&self) -> WorkflowPhase {
        self.state.lock().await.phase
    }

    pub async fn snapshot(&self) -> WorkflowSnapshot {
        let state = self.state.lock().await;
        WorkflowSnapshot {
            profile: state.profile.clone(),
            assessment: state.assessment.clone(),
            refinement: state.refinement.clone(),
            plan: state.plan.clone(),
        }
    }

    /// Error from the last failed action, until dismissed or a later success
    pub async fn last_error(&self) -> Option<String> {
        self.state.lock().await.last_error.clone()
    }

    pub async fn dismiss_error(&self) {
        self.state.lock().await.last_error = None;
    }

    /// Insights notice, if one is still within its display window
    pub async fn active_notice(&self, now: Instant) -> Option<String> {
        let state = self.state.lock().await;
        state
            .notice
            .as_ref()
            .filter(|n| n.is_active(now))
            .map(|n| n.text.clone())
    }

    pub async fn dismiss_notice(&self) {
        self.state.lock().await.notice = None;
    }

    pub async fn cached_explanations(&self) -> usize {
        self.state.lock().await.cache.len()
    }

    /// Submit the profile and request an assessment
    ///
    /// The profile is kept when the assessment fails so the form can be
    /// offered again prefilled; only the phase goes back.
    pub async fn submit_profile(&self, profile: Profile) -> Result<Assessment, WorkflowError> {
        debug!(name = %profile.name, "submit_profile: called");
        let _busy = self.begin()?;
        {
            let mut state = self.state.lock().await;
            state.expect(WorkflowPhase::CollectingProfile)?;
            if let Err(msg) = profile.validate() {
                return Err(state.record(WorkflowError::Validation(msg)));
            }
            state.profile = Some(profile.clone());
            state.phase = WorkflowPhase::Assessing;
        }

        let result = self.service.create_assessment(&profile).await;

        let mut state = self.state.lock().await;
        match result {
            Ok(assessment) => {
                info!(name = %profile.name, "assessment ready");
                state.assessment = Some(assessment.clone());
                state.phase = WorkflowPhase::RefiningInputs;
                state.last_error = None;
                Ok(assessment)
            }
            Err(e) => {
                state.phase = WorkflowPhase::CollectingProfile;
                Err(state.record(e.into()))
            }
        }
    }

    /// Replace the free-form refinement text
    pub async fn set_additional_info(&self, text: &str) -> Result<(), WorkflowError> {
        debug!(len = text.len(), "set_additional_info: called");
        let _busy = self.begin()?;
        let mut state = self.state.lock().await;
        state.expect(WorkflowPhase::RefiningInputs)?;
        state.refinement.additional_info = text.to_string();
        state.last_error = None;
        Ok(())
    }

    pub async fn set_training_environment(&self, environment: TrainingEnvironment) -> Result<(), WorkflowError> {
        debug!(%environment, "set_training_environment: called");
        let _busy = self.begin()?;
        let mut state = self.state.lock().await;
        state.expect(WorkflowPhase::RefiningInputs)?;
        state.refinement.training_environment = environment;
        state.last_error = None;
        Ok(())
    }

    /// Return to the profile form, discarding the assessment
    pub async fn back_to_profile(&self) -> Result<(), WorkflowError> {
        debug!("back_to_profile: called");
        let _busy = self.begin()?;
        let mut state = self.state.lock().await;
        state.expect(WorkflowPhase::RefiningInputs)?;
        state.assessment = None;
        state.phase = WorkflowPhase::CollectingProfile;
        state.last_error = None;
        Ok(())
    }

    /// Generate the plan from profile and refinement context
    ///
    /// On failure the workflow goes back to refining with the context intact.
    pub async fn generate(&self) -> Result<Plan, WorkflowError> {
        debug!("generate: called");
        let _busy = self.begin()?;
        let (profile, refinement) = {
            let mut state = self.state.lock().await;
            state.expect(WorkflowPhase::RefiningInputs)?;
            let Some(profile) = state.profile.clone() else {
                return Err(state.record(WorkflowError::Validation("No profile submitted".to_string())));
            };
            state.phase = WorkflowPhase::Generating;
            (profile, state.refinement.clone())
        };

        let result = self.service.generate_plan(&profile, &refinement).await;

        let mut state = self.state.lock().await;
        match result {
            Ok(plan) => {
                info!(days = plan.len(), "plan ready");
                state.plan = Some(plan.clone());
                state.phase = WorkflowPhase::PlanReady;
                state.last_error = None;
                Ok(plan)
            }
            Err(e) => {
                state.phase = WorkflowPhase::RefiningInputs;
                Err(state.record(e.into()))
            }
        }
    }

    /// Ask the service to rework the current plan
    ///
    /// Blank text is rejected without contacting the service. The plan is only
    /// replaced on success.
    pub async fn adjust(&self, text: &str) -> Result<Plan, WorkflowError> {
        debug!(len = text.len(), "adjust: called");
        if text.trim().is_empty() {
            return Err(WorkflowError::Validation("Adjustment text is empty".to_string()));
        }
        let _busy = self.begin()?;
        let (name, plan) = {
            let state = self.state.lock().await;
            state.expect(WorkflowPhase::PlanReady)?;
            match (&state.profile, &state.plan) {
                (Some(profile), Some(plan)) => (profile.name.clone(), plan.clone()),
                _ => return Err(WorkflowError::Validation("No plan loaded".to_string())),
            }
        };

        let result = self.service.adjust_plan(&name, text, &plan).await;

        let mut state = self.state.lock().await;
        match result {
            Ok(adjusted) => {
                info!(days = adjusted.len(), "plan adjusted");
                state.plan = Some(adjusted.clone());
                state.last_error = None;
                Ok(adjusted)
            }
            Err(e) => Err(state.record(e.into())),
        }
    }

    /// Explanation for one exercise, from the cache when possible
    pub async fn explain(&self, day: &str, exercise: &str) -> Result<Explanation, WorkflowError> {
        debug!(%day, %exercise, "explain: called");
        {
            let state = self.state.lock().await;
            state.expect(WorkflowPhase::PlanReady)?;
            if let Some(text) = state.cache.get(day, exercise) {
                debug!(%day, %exercise, "explain: cache hit");
                return Ok(Explanation {
                    text: text.to_string(),
                    cached: true,
                });
            }
        }

        let _busy = self.begin()?;
        let (profile, plan) = {
            let state = self.state.lock().await;
            state.expect(WorkflowPhase::PlanReady)?;
            match (&state.profile, &state.plan) {
                (Some(profile), Some(plan)) => (profile.clone(), plan.clone()),
                _ => return Err(WorkflowError::Validation("No plan loaded".to_string())),
            }
        };

        let result = self.service.explain_exercise(&profile, &plan, day, exercise).await;

        let mut state = self.state.lock().await;
        match result {
            Ok(text) => {
                state.cache.insert(day, exercise, text.clone());
                state.last_error = None;
                Ok(Explanation { text, cached: false })
            }
            Err(e) => Err(state.record(e.into())),
        }
    }

    /// Start over: clears profile, assessment, plan, refinement and cached explanations
    pub async fn new_plan(&self) -> Result<(), WorkflowError> {
        debug!("new_plan: called");
        let _busy = self.begin()?;
        let mut state = self.state.lock().await;
        state.phase = WorkflowPhase::CollectingProfile;
        state.profile = None;
        state.assessment = None;
        state.refinement = RefinementContext::default();
        state.plan = None;
        state.cache.clear();
        state.last_error = None;
        state.notice = None;
        Ok(())
    }

    /// Jump straight to refining (profile + assessment) or to a finished plan
    /// (profile + plan) without calling the service
    pub async fn restore(&self, snapshot: WorkflowSnapshot) -> Result<WorkflowPhase, WorkflowError> {
        debug!(
            has_plan = snapshot.plan.is_some(),
            has_assessment = snapshot.assessment.is_some(),
            "restore: called"
        );
        let _busy = self.begin()?;
        let phase = match (&snapshot.profile, &snapshot.assessment, &snapshot.plan) {
            (Some(_), _, Some(_)) => WorkflowPhase::PlanReady,
            (Some(_), Some(_), None) => WorkflowPhase::RefiningInputs,
            _ => {
                return Err(WorkflowError::Validation(
                    "Nothing to restore: needs a profile with an assessment or a plan".to_string(),
                ));
            }
        };

        let mut state = self.state.lock().await;
        state.profile = snapshot.profile;
        state.assessment = snapshot.assessment;
        state.refinement = snapshot.refinement;
        state.plan = snapshot.plan;
        state.phase = phase;
        state.last_error = None;
        info!(%phase, "workflow restored");
        Ok(phase)
    }

    /// Plan export for the current state
    pub async fn export_document(&self, session_id: Option<&str>) -> Result<PlanDocument, WorkflowError> {
        debug!(?session_id, "export_document: called");
        let state = self.state.lock().await;
        match (&state.profile, &state.plan) {
            (Some(profile), Some(plan)) => Ok(PlanDocument {
                plan: plan.clone(),
                profile: profile.clone(),
                refinement: state.refinement.clone(),
                session_id: session_id.map(str::to_string),
            }),
            _ => Err(WorkflowError::Validation("No plan to export".to_string())),
        }
    }

    /// Append a transcript to the refinement text and look for insights
    pub async fn import_transcript(&self, entries: &[TranscriptEntry]) -> Result<InsightsOutcome, WorkflowError> {
        debug!(count = entries.len(), "import_transcript: called");
        let _busy = self.begin()?;
        self.apply_import(entries).await
    }

    /// Import the stored transcript of a chat session
    pub async fn import_from_session(&self, session_id: Option<&str>) -> Result<InsightsOutcome, WorkflowError> {
        debug!(?session_id, "import_from_session: called");
        let _busy = self.begin()?;
        self.state.lock().await.expect(WorkflowPhase::RefiningInputs)?;

        match import::fetch_transcript(self.service.as_ref(), session_id).await {
            Ok(entries) => self.apply_import(&entries).await,
            Err(e) => Err(self.state.lock().await.record(e.into())),
        }
    }

    /// Import the messages of a chat export file's contents
    pub async fn import_from_export(&self, raw: &str) -> Result<InsightsOutcome, WorkflowError> {
        debug!(len = raw.len(), "import_from_export: called");
        let _busy = self.begin()?;
        self.state.lock().await.expect(WorkflowPhase::RefiningInputs)?;

        match import::transcript_from_export(raw) {
            Ok(entries) => self.apply_import(&entries).await,
            Err(e) => Err(self.state.lock().await.record(e.into())),
        }
    }

    async fn apply_import(&self, entries: &[TranscriptEntry]) -> Result<InsightsOutcome, WorkflowError> {
        let block = import::import_block(entries);
        {
            let mut state = self.state.lock().await;
            state.expect(WorkflowPhase::RefiningInputs)?;
            let merged = import::append_to_refinement(&state.refinement.additional_info, &block);
            state.refinement.additional_info = merged;
            state.last_error = None;
        }

        let outcome = import::derive_insights(self.service.as_ref(), &block).await;
        if let InsightsOutcome::Insights(text) = &outcome {
            info!(len = text.len(), "chat insights found");
            self.state.lock().await.notice = Some(Notice::new(text.clone(), Instant::now(), self.insight_ttl));
        }
        Ok(outcome)
    }
}
