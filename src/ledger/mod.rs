// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Ledger Module
//!
//! Double-entry transaction engine over [`crate::storage`].
//!
//! ## Flow
//!
//! ```text
//! validate amount -> idempotency probe -> unit of work {
//!     lock wallet -> re-check id -> funds check (spend) ->
//!     transaction row -> user entry -> system entry -> read balance
//! } -> commit
//! ```
//!
//! Any failure inside the unit of work rolls back all of it.

pub mod balance;
pub mod bonus;
pub mod engine;
pub mod error;
pub mod idempotency;

pub use balance::BalanceResolver;
pub use bonus::OpenedWallet;
pub use engine::{
    EngineConfig, TransferEngine, TransferOutcome, ALREADY_PROCESSED, SPEND_SUCCESSFUL,
    TOPUP_SUCCESSFUL,
};
pub use error::LedgerError;
pub use idempotency::{IdempotencyCheck, IdempotencyGuard};
