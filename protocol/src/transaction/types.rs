//! Code tables shared by every request kind.
//!
//! The gateway identifies operations with two-digit strings. These enums
//! are the closed set of codes this client speaks; anything else is
//! rejected at parse time instead of being passed through.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::UpacpError;

// ---------------------------------------------------------------------------
// TradeType
// ---------------------------------------------------------------------------

/// `txnType` codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TradeType {
    /// `01` consumption.
    Pay,
    /// `00` transaction status query.
    Query,
    /// `31` same-day cancellation of a consumption.
    Revoke,
    /// `04` refund.
    Refund,
    /// `02` pre-authorization.
    Auth,
    /// `32` pre-authorization cancellation.
    AuthRevoke,
    /// `03` pre-authorization completion.
    AuthComplete,
    /// `33` pre-authorization completion cancellation.
    AuthCompleteRevoke,
    /// `71` balance query.
    BalanceQuery,
    /// `76` settlement file transfer.
    FileTransfer,
}

impl TradeType {
    pub const ALL: [TradeType; 10] = [
        Self::Pay,
        Self::Query,
        Self::Revoke,
        Self::Refund,
        Self::Auth,
        Self::AuthRevoke,
        Self::AuthComplete,
        Self::AuthCompleteRevoke,
        Self::BalanceQuery,
        Self::FileTransfer,
    ];

    /// Wire code.
    pub fn code(self) -> &'static str {
        match self {
            Self::Pay => "01",
            Self::Query => "00",
            Self::Revoke => "31",
            Self::Refund => "04",
            Self::Auth => "02",
            Self::AuthRevoke => "32",
            Self::AuthComplete => "03",
            Self::AuthCompleteRevoke => "33",
            Self::BalanceQuery => "71",
            Self::FileTransfer => "76",
        }
    }
}

impl fmt::Display for TradeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for TradeType {
    type Err = UpacpError;

    fn from_str(code: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|t| t.code() == code)
            .ok_or_else(|| UpacpError::InvalidField(format!("txnType (unknown code {:?})", code)))
    }
}

// ---------------------------------------------------------------------------
// ChannelType
// ---------------------------------------------------------------------------

/// `channelType`: where the cardholder is.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ChannelType {
    /// `07` desktop browser. Payment goes through an auto-posted form.
    #[default]
    Desktop,
    /// `08` mobile app. Payment is a server-to-server call.
    Mobile,
}

impl ChannelType {
    pub fn code(self) -> &'static str {
        match self {
            Self::Desktop => "07",
            Self::Mobile => "08",
        }
    }
}

impl fmt::Display for ChannelType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for ChannelType {
    type Err = UpacpError;

    fn from_str(code: &str) -> Result<Self, Self::Err> {
        match code {
            "07" => Ok(Self::Desktop),
            "08" => Ok(Self::Mobile),
            other => Err(UpacpError::InvalidField(format!("channelType (unknown code {:?})", other))),
        }
    }
}
