//! Rhizone Succession
//!
//! Keeps exactly one admission token alive for a community and decides who
//! holds it. Each custodian either lets someone in with the token, passes on
//! it, or lets it time out into a public release; then the next custodian is
//! drawn from the lottery.
//!
//! # Architecture
//!
//! ```text
//!   platform events ──┐                      ┌──▶ NotificationSink
//!   operator commands ┼─▶ SuccessionService ─┤
//!   audit interval ───┘     (one task)       └──▶ MembershipPlatform
//!                               │
//!             SuccessionController + ReconciliationAuditor
//!                               │
//!                         Ledger (RocksDB)
//! ```
//!
//! The ledger is the only durable state. The controller's in-memory state is
//! derived from it on load and only advances after a write succeeded; the
//! auditor repairs anything the platform lost in between.

pub mod activity;
pub mod auditor;
pub mod config;
pub mod controller;
pub mod error;
pub mod notice;
pub mod platform;
pub mod queries;
pub mod service;

pub use activity::{ActivityTracker, SweepReport};
pub use auditor::{AuditAction, AuditOutcome, ReconciliationAuditor};
pub use config::SuccessionConfig;
pub use controller::{
    DrawGuard, DrawOutcome, Resolution, SkipOutcome, SuccessionController, SuccessionState,
};
pub use error::{Error, Result};
pub use notice::Notice;
pub use platform::{
    AdmissionToken, Capability, LogSink, Member, MembershipPlatform, MemoryPlatform,
    NotificationSink, RecordingSink,
};
pub use queries::{Descendant, Lineage, LineageStep, Progeny, StatsDetail, StatsReport};
pub use service::{Command, ServiceHandle, SuccessionService};
