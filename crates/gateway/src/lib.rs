//! Client side of the external media generation service.
//!
//! - [`GenerationGateway`]: the seam the workflow engine calls through.
//! - [`HttpGateway`]: `reqwest` implementation of the service's REST API.
//! - [`poll::wait_for_video`]: cancellable, capped polling of video jobs.

pub mod client;
pub mod config;
pub mod error;
pub mod poll;
pub mod types;

pub use client::{GenerationGateway, HttpGateway};
pub use config::GatewayConfig;
pub use error::GatewayError;
pub use poll::{wait_for_video, PollPolicy};
pub use types::{ImageRequest, JobStatus, VideoRequest, VideoSubmission};
