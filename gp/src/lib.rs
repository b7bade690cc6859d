//! Gymplan - client for a remote workout-plan assistant
//!
//! Keeps a streaming chat session with the assistant and walks a user from
//! profile to a finished, adjustable training plan. All content comes from
//! the service; this crate is about sequencing, state and round-tripping.
//!
//! # Modules
//!
//! - [`domain`] - Profile, plan and transcript types
//! - [`session`] - Streaming chat channel and session identity
//! - [`workflow`] - Plan workflow state machine and explanation cache
//! - [`import`] - Chat transcripts as plan refinement input
//! - [`codec`] - Chat, plan and calendar export documents
//! - [`service`] - REST client for the assistant
//! - [`config`] - Configuration types and loading
//! - [`cli`] - Command-line interface
//! - [`repl`] - Interactive chat and plan front ends

pub mod cli;
pub mod codec;
pub mod config;
pub mod domain;
pub mod import;
pub mod repl;
pub mod service;
pub mod session;
pub mod workflow;

// Re-export commonly used types
pub use codec::{ChatDocument, CodecError, PlanDocument, decode_chat, decode_plan, encode_calendar};
pub use config::Config;
pub use domain::{
    Assessment, ExerciseEntry, Plan, Profile, RefinementContext, Role, TrainingEnvironment, Transcript, TranscriptEntry,
};
pub use import::{ImportError, InsightsOutcome, append_to_refinement, format_transcript};
pub use service::{DocumentClient, HttpPlanService, PlanService, ServiceError};
pub use session::{
    ChannelError, ChannelUpdate, Connection, ConnectionState, Connector, FileIdentityStore, IdentityStore,
    MemoryIdentityStore, SessionChannel, WsConnector,
};
pub use workflow::{Explanation, PlanWorkflow, WorkflowError, WorkflowPhase, WorkflowSnapshot};
