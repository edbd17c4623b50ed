//! The regeneration request workflow.
//!
//! A collaborator asks for a scene's image or video to be regenerated; an
//! approver prepays a bounded attempt budget; the requester drives attempts
//! against the generation service and picks a candidate; the approver signs
//! off, which applies the candidate to the scene and deletes the rest.
//!
//! [`RegenerationEngine`] owns every transition. Its collaborators are
//! injected as trait objects: see [`collaborators`] and [`store`]. The
//! [`postgres`] module adapts them to the database, [`memory`] provides
//! in-process versions.

pub mod cleanup;
pub mod collaborators;
pub mod config;
pub mod engine;
pub mod memory;
pub mod notify;
pub mod params;
pub mod postgres;
pub mod reaper;
pub mod request;
pub mod store;

mod attempt;

pub use attempt::AttemptOutcome;
pub use collaborators::{
    CapabilityResolver, CreditLedger, LedgerError, Notification, NotificationSink, SpendReceipt,
};
pub use config::RegenerationConfig;
pub use engine::{ApprovalQuote, ApproveInput, Collaborators, CreateRequestInput, RegenerationEngine};
pub use request::{RegenerationDetail, RegenerationRequest};
pub use store::{ProductionCatalog, RegenerationStore};
