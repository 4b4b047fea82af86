//! Typed transaction requests.
//!
//! Each request kind is its own struct carrying only what the caller
//! decides; [`TransactionRequest::to_fields`] adds the envelope (version,
//! encoding, merchant id, timestamps) and projects the whole thing into a
//! [`FieldMap`] ready for signing. The projection is checked against
//! [`REQUIRED_FIELDS`] so a request that would be rejected remotely for a
//! missing field fails here instead.

use chrono::{NaiveDateTime, TimeDelta};

use super::types::{ChannelType, TradeType};
use crate::config::{
    MerchantConfig, ACCESS_TYPE_MERCHANT, BIZ_TYPE_B2C_GATEWAY, BIZ_TYPE_NONE, CURRENCY_CNY,
    DEFAULT_PAY_EXPIRE_MINUTES, ENCODING, FIELD_MER_ID, FIELD_ORDER_ID, FIELD_SETTLE_DATE,
    FILE_TYPE_STANDARD, PROTOCOL_VERSION, SIGN_METHOD_RSA, TXN_TIME_FORMAT,
};
use crate::encoding::{filter_empty, FieldMap};
use crate::error::{Result, UpacpError};

// ---------------------------------------------------------------------------
// Required fields
// ---------------------------------------------------------------------------

/// Discriminant of [`TransactionRequest`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RequestKind {
    Pay,
    Query,
    Revoke,
    Refund,
    FileTransfer,
}

impl RequestKind {
    pub fn trade_type(self) -> TradeType {
        match self {
            Self::Pay => TradeType::Pay,
            Self::Query => TradeType::Query,
            Self::Revoke => TradeType::Revoke,
            Self::Refund => TradeType::Refund,
            Self::FileTransfer => TradeType::FileTransfer,
        }
    }

    /// Fields that must be present and non-empty before signing.
    pub fn required_fields(self) -> &'static [&'static str] {
        REQUIRED_FIELDS
            .iter()
            .find(|(kind, _)| *kind == self)
            .map(|(_, fields)| *fields)
            .unwrap_or(&[])
    }
}

/// Per-kind mandatory fields, envelope included.
pub const REQUIRED_FIELDS: &[(RequestKind, &[&str])] = &[
    (
        RequestKind::Pay,
        &[
            "version", "encoding", "signMethod", "txnType", "txnSubType", "bizType", "accessType",
            "merId", "channelType", "backUrl", "orderId", "txnTime", "txnAmt", "currencyCode",
        ],
    ),
    (
        RequestKind::Query,
        &[
            "version", "encoding", "signMethod", "txnType", "txnSubType", "bizType", "accessType",
            "merId", "orderId", "txnTime",
        ],
    ),
    (
        RequestKind::Revoke,
        &[
            "version", "encoding", "signMethod", "txnType", "txnSubType", "bizType", "accessType",
            "merId", "channelType", "backUrl", "orderId", "origQryId", "txnTime", "txnAmt",
        ],
    ),
    (
        RequestKind::Refund,
        &[
            "version", "encoding", "signMethod", "txnType", "txnSubType", "bizType", "accessType",
            "merId", "channelType", "backUrl", "orderId", "origQryId", "txnTime", "txnAmt",
        ],
    ),
    (
        RequestKind::FileTransfer,
        &[
            "version", "encoding", "signMethod", "txnType", "txnSubType", "bizType", "accessType",
            "merId", "settleDate", "txnTime", "fileType",
        ],
    ),
];

/// Fail with [`UpacpError::MissingField`] on the first absent required field.
pub fn check_required(kind: RequestKind, fields: &FieldMap) -> Result<()> {
    for name in kind.required_fields() {
        match fields.get(name) {
            Some(v) if !v.is_empty() => {}
            _ => return Err(UpacpError::MissingField((*name).to_string())),
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Request structs
// ---------------------------------------------------------------------------

/// Consumption (`txnType=01`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PayRequest {
    pub order_id: String,
    /// Amount in fen.
    pub txn_amt: u64,
    pub channel: ChannelType,
    pub currency_code: String,
    pub biz_type: String,
    /// Overrides the merchant's configured `frontUrl`.
    pub front_url: Option<String>,
    pub customer_ip: Option<String>,
    pub order_desc: Option<String>,
    /// Minutes until `payTimeout`.
    pub expire_minutes: i64,
}

impl PayRequest {
    pub fn new(order_id: impl Into<String>, txn_amt: u64) -> Self {
        Self {
            order_id: order_id.into(),
            txn_amt,
            channel: ChannelType::default(),
            currency_code: CURRENCY_CNY.to_string(),
            biz_type: BIZ_TYPE_B2C_GATEWAY.to_string(),
            front_url: None,
            customer_ip: None,
            order_desc: None,
            expire_minutes: DEFAULT_PAY_EXPIRE_MINUTES,
        }
    }

    pub fn channel(mut self, channel: ChannelType) -> Self {
        self.channel = channel;
        self
    }

    pub fn front_url(mut self, url: impl Into<String>) -> Self {
        self.front_url = Some(url.into());
        self
    }

    pub fn customer_ip(mut self, ip: impl Into<String>) -> Self {
        self.customer_ip = Some(ip.into());
        self
    }

    pub fn order_desc(mut self, desc: impl Into<String>) -> Self {
        self.order_desc = Some(desc.into());
        self
    }

    pub fn expire_minutes(mut self, minutes: i64) -> Self {
        self.expire_minutes = minutes;
        self
    }
}

/// Status query for an earlier order (`txnType=00`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryRequest {
    pub order_id: String,
    /// `txnTime` of the order being queried.
    pub txn_time: String,
}

/// Same-day cancellation (`txnType=31`) or refund (`txnType=04`) of an
/// earlier consumption identified by its `queryId`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReversalRequest {
    /// New order id for the reversal itself.
    pub order_id: String,
    /// `queryId` the gateway assigned to the original consumption.
    pub orig_qry_id: String,
    /// Amount in fen.
    pub txn_amt: u64,
}

/// Settlement file download (`txnType=76`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileTransferRequest {
    /// `MMDD`.
    pub settle_date: String,
    pub file_type: String,
}

impl FileTransferRequest {
    /// Standard reconciliation bundle for `settle_date` (`MMDD`).
    pub fn new(settle_date: impl Into<String>) -> Result<Self> {
        let settle_date = settle_date.into();
        validate_settle_date(&settle_date)?;
        Ok(Self {
            settle_date,
            file_type: FILE_TYPE_STANDARD.to_string(),
        })
    }
}

/// `MMDD` with a plausible month and day.
pub fn validate_settle_date(settle_date: &str) -> Result<()> {
    let valid = settle_date.len() == 4
        && settle_date.bytes().all(|b| b.is_ascii_digit())
        && matches!(settle_date[..2].parse::<u32>(), Ok(1..=12))
        && matches!(settle_date[2..].parse::<u32>(), Ok(1..=31));
    if valid {
        Ok(())
    } else {
        Err(UpacpError::InvalidField(format!(
            "settleDate must be MMDD, got {:?}",
            settle_date
        )))
    }
}

// ---------------------------------------------------------------------------
// TransactionRequest
// ---------------------------------------------------------------------------

/// Every request this client can send.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransactionRequest {
    Pay(PayRequest),
    Query(QueryRequest),
    Revoke(ReversalRequest),
    Refund(ReversalRequest),
    FileTransfer(FileTransferRequest),
}

impl TransactionRequest {
    pub fn kind(&self) -> RequestKind {
        match self {
            Self::Pay(_) => RequestKind::Pay,
            Self::Query(_) => RequestKind::Query,
            Self::Revoke(_) => RequestKind::Revoke,
            Self::Refund(_) => RequestKind::Refund,
            Self::FileTransfer(_) => RequestKind::FileTransfer,
        }
    }

    /// The order id the request concerns, if it has one.
    pub fn order_id(&self) -> Option<&str> {
        match self {
            Self::Pay(r) => Some(&r.order_id),
            Self::Query(r) => Some(&r.order_id),
            Self::Revoke(r) | Self::Refund(r) => Some(&r.order_id),
            Self::FileTransfer(_) => None,
        }
    }

    /// Project into an unsigned, filtered field mapping.
    ///
    /// `now` becomes `txnTime` (except for queries, which carry the
    /// original order's time) and anchors `payTimeout`.
    pub fn to_fields(&self, merchant: &MerchantConfig, now: NaiveDateTime) -> Result<FieldMap> {
        let kind = self.kind();
        let txn_time = now.format(TXN_TIME_FORMAT).to_string();

        let mut fields = FieldMap::new()
            .with("version", PROTOCOL_VERSION)
            .with("encoding", ENCODING)
            .with("signMethod", SIGN_METHOD_RSA)
            .with("txnType", kind.trade_type().code())
            .with("accessType", ACCESS_TYPE_MERCHANT)
            .with(FIELD_MER_ID, &merchant.merchant_id);

        match self {
            Self::Pay(pay) => {
                let pay_timeout = TimeDelta::try_minutes(pay.expire_minutes)
                    .and_then(|expiry| now.checked_add_signed(expiry))
                    .ok_or_else(|| {
                        UpacpError::InvalidField(format!(
                            "payTimeout: {} minutes from {} is out of range",
                            pay.expire_minutes, txn_time
                        ))
                    })?;
                fields = fields
                    .with("txnSubType", "01")
                    .with("bizType", &pay.biz_type)
                    .with("channelType", pay.channel.code())
                    .with("backUrl", &merchant.back_url)
                    .with(FIELD_ORDER_ID, &pay.order_id)
                    .with("txnTime", txn_time)
                    .with("txnAmt", pay.txn_amt.to_string())
                    .with("currencyCode", &pay.currency_code)
                    .with("payTimeout", pay_timeout.format(TXN_TIME_FORMAT).to_string())
                    .with("customerIp", pay.customer_ip.clone())
                    .with("orderDesc", pay.order_desc.clone());

                if pay.channel == ChannelType::Desktop {
                    let front_url = pay
                        .front_url
                        .clone()
                        .or_else(|| merchant.front_url.clone())
                        .filter(|u| !u.is_empty())
                        .ok_or_else(|| UpacpError::MissingField("frontUrl (required for desktop payments)".into()))?;
                    fields.insert("frontUrl", front_url);
                }
            }
            Self::Query(query) => {
                fields = fields
                    .with("txnSubType", "00")
                    .with("bizType", BIZ_TYPE_NONE)
                    .with(FIELD_ORDER_ID, &query.order_id)
                    .with("txnTime", &query.txn_time);
            }
            Self::Revoke(rev) | Self::Refund(rev) => {
                fields = fields
                    .with("txnSubType", "00")
                    .with("bizType", BIZ_TYPE_B2C_GATEWAY)
                    .with("channelType", ChannelType::Desktop.code())
                    .with("backUrl", &merchant.back_url)
                    .with(FIELD_ORDER_ID, &rev.order_id)
                    .with("origQryId", &rev.orig_qry_id)
                    .with("txnTime", txn_time)
                    .with("txnAmt", rev.txn_amt.to_string());
            }
            Self::FileTransfer(file) => {
                validate_settle_date(&file.settle_date)?;
                fields = fields
                    .with("txnSubType", "01")
                    .with("bizType", BIZ_TYPE_NONE)
                    .with(FIELD_SETTLE_DATE, &file.settle_date)
                    .with("txnTime", txn_time)
                    .with("fileType", &file.file_type);
            }
        }

        let fields = filter_empty(&fields);
        check_required(kind, &fields)?;
        Ok(fields)
    }
}

/// `prefix` followed by `now` as `YYYYMMDDhhmmss`.
pub fn make_order_id(prefix: &str, now: NaiveDateTime) -> String {
    format!("{}{}", prefix, now.format(TXN_TIME_FORMAT))
}
