//! Build triggering
//!
//! [`BuildTriggerQueue`] collects trigger requests from watchers and a
//! single worker POSTs them to build servers via a [`TriggerClient`],
//! handling CSRF crumbs and retries.

mod client;
mod queue;

pub use client::{Crumb, JenkinsClient, TriggerClient, TriggerError, TriggerResponse, origin_of};
pub use queue::BuildTriggerQueue;
