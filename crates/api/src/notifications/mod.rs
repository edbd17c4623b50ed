//! Delivery of workflow notifications to users' in-app inboxes.

pub mod inbox;

pub use inbox::InboxSink;
