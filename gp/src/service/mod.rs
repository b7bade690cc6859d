//! Remote assistant service
//!
//! [`PlanService`] is the seam between the workflow and the network. The
//! HTTP implementation talks to the assistant's REST endpoints; tests swap in
//! a scripted mock.

pub mod client;
mod documents;
mod error;
mod http;

pub use client::{InsightsReply, PlanService};
pub use documents::DocumentClient;
pub use error::{GENERIC_FAILURE, ServiceError};
pub use http::HttpPlanService;
