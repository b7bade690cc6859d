//! Plan workflow
//!
//! Sequences profile → assessment → refinement → generation → adjustment
//! against the [`PlanService`](crate::service::PlanService). Each action
//! runs alone: while one is waiting on the service, others are rejected with
//! [`WorkflowError::Busy`].

mod cache;
mod machine;
mod notice;

use std::fmt;

use thiserror::Error;

use crate::import::ImportError;
use crate::service::ServiceError;

use cache::ExplanationCache;
pub use machine::{Explanation, PlanWorkflow, WorkflowSnapshot};
pub use notice::Notice;

/// Where the workflow is
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WorkflowPhase {
    #[default]
    CollectingProfile,
    Assessing,
    RefiningInputs,
    Generating,
    PlanReady,
}

impl fmt::Display for WorkflowPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::CollectingProfile => "collecting profile",
            Self::Assessing => "assessing",
            Self::RefiningInputs => "refining inputs",
            Self::Generating => "generating",
            Self::PlanReady => "plan ready",
        };
        f.write_str(s)
    }
}

/// Errors from workflow actions
#[derive(Debug, Error)]
pub enum WorkflowError {
    #[error("Another request is still in progress")]
    Busy,

    #[error("Not allowed while {actual} (needs {expected})")]
    InvalidPhase {
        expected: WorkflowPhase,
        actual: WorkflowPhase,
    },

    #[error("{0}")]
    Validation(String),

    #[error(transparent)]
    Service(#[from] ServiceError),

    #[error(transparent)]
    Import(#[from] ImportError),
}

impl WorkflowError {
    /// Text suitable for the persistent error annotation
    pub fn user_message(&self) -> String {
        match self {
            Self::Service(e) => e.user_message(),
            Self::Import(e) => e.user_message(),
            other => other.to_string(),
        }
    }
}
