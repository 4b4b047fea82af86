// Copyright (c) 2026 ALAS Technology. MIT License.
// See LICENSE for details.

//! # UPACP Gateway Client: Core Library
//!
//! Merchant-side engine for the UnionPay online payment gateway (ACP 5.0.0):
//! it signs what we send, verifies what we receive, and turns the daily
//! settlement bundle into records.
//!
//! ## Architecture
//!
//! - **encoding**: Canonical `key=value&...` encoding, form parsing and bodies.
//! - **credential**: PKCS#12 signing credential and the gateway's certificate.
//! - **signer**: The signature procedure, both directions.
//! - **transaction**: Typed requests and their field projection.
//! - **client**: Async HTTP client: sign, post, verify, check `respCode`.
//! - **settlement**: base64 → zlib → ZIP → fixed-width records.
//! - **config**: Protocol constants and config sections.
//! - **error**: The crate-wide error taxonomy.
//!
//! ## Ground rules
//!
//! 1. Nothing from the gateway is trusted before its signature verifies.
//! 2. The canonical encoding is always sorted and never escaped.
//! 3. Credentials are loaded once and shared read-only.

pub mod client;
pub mod config;
pub mod credential;
pub mod encoding;
pub mod error;
pub mod settlement;
pub mod signer;
pub mod transaction;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

pub use client::{GatewayClient, PayOutcome};
pub use credential::{PrivateCredential, VerificationCertificate};
pub use encoding::{FieldMap, FieldValue};
pub use error::{Result, UpacpError};
pub use settlement::{SettlementBatch, SettlementRecord, SkippedLine};
pub use signer::{DigestMethod, Signer};
pub use transaction::TransactionRequest;
