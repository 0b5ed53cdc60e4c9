//! Rhizone Ledger - the custody ledger
//!
//! Single source of truth for succession: who was active when, which member
//! held the admission token under which grant, and who lapsed while a grant
//! was open.
//!
//! # Records
//!
//! - **Activity**: member → last-seen timestamp (latest write wins)
//! - **Custody grants**: append-only, sequence-numbered; the sequence id is
//!   also the public invite number
//! - **Inactivity marks**: (grant, member) pairs, recorded at most once
//! - **Suspension**: present iff automatic succession is halted
//!
//! # Invariant
//!
//! At most one grant is open (unresolved) at any time, and it is always the
//! most recently appended one. [`Ledger::append_grant`] refuses to open a
//! second grant and [`Ledger::resolve_grant`] only accepts the open one.
//!
//! # Example
//!
//! ```no_run
//! use rhizone_ledger::{Ledger, MemberId};
//!
//! fn main() -> rhizone_ledger::Result<()> {
//!     let ledger = Ledger::open("./rhizone-data")?;
//!     ledger.bootstrap(MemberId(1), 1_700_000_000)?;
//!     let grant = ledger.append_grant(MemberId(1), 1_700_000_100)?;
//!     ledger.resolve_grant(grant, MemberId(2), 1_700_000_200)?;
//!     Ok(())
//! }
//! ```

pub mod error;
pub mod models;
pub mod storage;

pub use error::{LedgerError, Result};
pub use models::{
    now_secs, ActivityRecord, CustodyGrant, GrantId, GrantStatus, InactivityMark, LedgerSnapshot,
    MemberId, Suspension, Timestamp,
};
pub use storage::Ledger;
