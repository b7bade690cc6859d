//! Domain types shared by the chat session and the plan workflow
//!
//! These are plain data: a user's [`Profile`], the [`Plan`] returned by the
//! service, and the chat [`Transcript`]. Behaviour that needs the network
//! lives in [`crate::session`] and [`crate::workflow`].

mod plan;
mod profile;
mod transcript;

pub use plan::{ExerciseEntry, Plan};
pub use profile::{Assessment, Profile, RefinementContext, TrainingEnvironment};
pub use transcript::{FragmentMerge, Role, Transcript, TranscriptEntry};
