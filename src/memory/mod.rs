//! memory
//!
//! Memory branches: isolated, linear branches rooted in an empty tree that
//! hold coordination documents next to a project without touching its
//! checkout.
//!
//! # Modules
//!
//! - [`clock`] - Time source for commit dates
//! - [`store`] - The commit/read protocol ([`MemoryBranchStore`])
//! - [`push`] - Safe publishing ([`PushGuard`])
//! - [`facade`] - The public entry point ([`MemoryFacade`])

pub mod clock;
pub mod facade;
pub mod push;
pub mod store;

pub use clock::{clock_from_env, Clock, FixedClock, SystemClock};
pub use facade::{MemoryError, MemoryFacade};
pub use push::{PushError, PushGuard, PushOptions, PushOutcome};
pub use store::{
    CommitReceipt, MemoryBranchStore, MemoryCommit, PublishStatus, RefUpdatePolicy, StoreError,
    SEED_MESSAGE,
};
