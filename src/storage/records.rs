// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Persisted row types for the ledger database.
//!
//! Rows are stored as JSON bytes, keyed by the `u128` form of their UUID.
//! Balances are never stored; see [`super::LedgerDatabase::get_balance`].

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

macro_rules! uuid_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, ToSchema,
        )]
        #[serde(transparent)]
        pub struct $name(pub Uuid);

        impl $name {
            /// Generate a fresh random identifier.
            pub fn new_v4() -> Self {
                Self(Uuid::new_v4())
            }

            pub fn as_uuid(&self) -> &Uuid {
                &self.0
            }

            pub(crate) fn as_key(&self) -> u128 {
                self.0.as_u128()
            }

            pub(crate) fn from_key(key: u128) -> Self {
                Self(Uuid::from_u128(key))
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<Uuid> for $name {
            fn from(value: Uuid) -> Self {
                Self(value)
            }
        }
    };
}

uuid_id!(
    /// Opaque wallet identifier.
    WalletId
);
uuid_id!(
    /// Caller-supplied transaction identifier; doubles as the idempotency key.
    TransactionId
);
uuid_id!(
    /// Registered user identifier.
    UserId
);

/// Owner id recorded on the singleton system wallet.
pub const SYSTEM_OWNER_ID: Uuid = Uuid::nil();

/// Who owns a wallet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OwnerType {
    User,
    System,
}

impl OwnerType {
    pub fn as_str(&self) -> &'static str {
        match self {
            OwnerType::User => "USER",
            OwnerType::System => "SYSTEM",
        }
    }
}

/// One owner's holding. Never mutated after creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct Wallet {
    pub id: WalletId,
    pub owner_type: OwnerType,
    pub owner_id: Uuid,
    /// Asset the balance is denominated in.
    pub asset_code: String,
    pub created_at: DateTime<Utc>,
}

/// Kind of client-visible operation a transaction records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub enum TransactionType {
    #[serde(rename = "TOPUP")]
    TopUp,
    #[serde(rename = "SPEND")]
    Spend,
    #[serde(rename = "BONUS")]
    Bonus,
}

impl fmt::Display for TransactionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TransactionType::TopUp => "TOPUP",
            TransactionType::Spend => "SPEND",
            TransactionType::Bonus => "BONUS",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct Transaction {
    pub id: TransactionId,
    #[serde(rename = "type")]
    pub kind: TransactionType,
    pub created_at: DateTime<Utc>,
}

/// Signed movement of funds against one wallet.
///
/// Positive amounts credit the wallet, negative amounts debit it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct LedgerEntry {
    /// Monotonic sequence number assigned by the database.
    pub id: u64,
    pub transaction_id: TransactionId,
    pub wallet_id: WalletId,
    pub amount: i64,
}

/// Registered user. The password is only ever stored as a PHC hash string.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub username: String,
    pub password_hash: String,
    pub created_at: DateTime<Utc>,
}
