//! Ledger records.
//!
//! # Core Types
//!
//! - [`CustodyGrant`] - one entrustment of the admission token
//! - [`ActivityRecord`] - last time a member was seen
//! - [`InactivityMark`] - a lapse recorded against an open grant
//!
//! # Supporting Types
//!
//! - [`MemberId`], [`GrantId`] - identifiers
//! - [`Suspension`] - why automatic succession is halted
//! - [`LedgerSnapshot`] - everything the lottery needs, read in one pass

mod activity;
mod grant;
mod ids;
mod snapshot;

pub use activity::{ActivityRecord, InactivityMark, Suspension};
pub use grant::{CustodyGrant, GrantStatus};
pub use ids::{now_secs, GrantId, MemberId, Timestamp};
pub use snapshot::LedgerSnapshot;
