// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Custodial Wallet Server - Double-Entry Ledger Service
//!
//! Users hold a balance in an internal currency. Every top-up and spend is
//! recorded as a pair of offsetting ledger entries against the user's wallet
//! and a system counterparty wallet, applied atomically and idempotently.
//!
//! ## Modules
//!
//! - `api` - HTTP API handlers (Axum)
//! - `accounts` - Signup and signin
//! - `auth` - Access tokens and the request extractor
//! - `ledger` - Transfer engine, idempotency and balances
//! - `storage` - Embedded ledger database (redb)

pub mod accounts;
pub mod api;
pub mod auth;
pub mod config;
pub mod error;
pub mod ledger;
pub mod models;
pub mod state;
pub mod storage;
pub mod telemetry;
