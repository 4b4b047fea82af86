//! # Gateway Configuration & Constants
//!
//! Every magic string the gateway expects lives here, next to the config
//! sections a deployment fills in. If a field name or code is spelled out
//! somewhere else in the crate, it should probably be a constant here.

use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;

use crate::signer::DigestMethod;

// ---------------------------------------------------------------------------
// Protocol envelope
// ---------------------------------------------------------------------------

/// ACP interface version these requests are built for.
pub const PROTOCOL_VERSION: &str = "5.0.0";

/// Character encoding declared on every request.
pub const ENCODING: &str = "UTF-8";

/// `signMethod` for RSA certificate signatures.
pub const SIGN_METHOD_RSA: &str = "01";

/// Merchant direct access.
pub const ACCESS_TYPE_MERCHANT: &str = "0";

/// ISO 4217 numeric code for CNY, the default currency.
pub const CURRENCY_CNY: &str = "156";

/// `bizType` for B2C online gateway payments.
pub const BIZ_TYPE_B2C_GATEWAY: &str = "000201";

/// `bizType` for non-business requests (file transfer).
pub const BIZ_TYPE_NONE: &str = "000000";

/// `respCode` meaning success.
pub const RESP_CODE_SUCCESS: &str = "00";

/// Minutes an unpaid order stays open when the caller does not say.
pub const DEFAULT_PAY_EXPIRE_MINUTES: i64 = 10;

/// `txnTime` / `payTimeout` format.
pub const TXN_TIME_FORMAT: &str = "%Y%m%d%H%M%S";

// ---------------------------------------------------------------------------
// Field names
// ---------------------------------------------------------------------------

pub const FIELD_CERT_ID: &str = "certId";
pub const FIELD_SIGNATURE: &str = "signature";
pub const FIELD_FILE_CONTENT: &str = "fileContent";
pub const FIELD_RESP_CODE: &str = "respCode";
pub const FIELD_RESP_MSG: &str = "respMsg";
pub const FIELD_ORDER_ID: &str = "orderId";
pub const FIELD_MER_ID: &str = "merId";
pub const FIELD_SETTLE_DATE: &str = "settleDate";

// ---------------------------------------------------------------------------
// Settlement files
// ---------------------------------------------------------------------------

/// `fileType` for the standard merchant reconciliation bundle.
pub const FILE_TYPE_STANDARD: &str = "00";

/// Default prefix of the per-date extraction directory.
pub const DEFAULT_SETTLE_DIR_PREFIX: &str = "unionpay_";

/// Prefix of the temporary archive written before extraction.
pub const TEMP_ARCHIVE_PREFIX: &str = "SMT_";

// ---------------------------------------------------------------------------
// Transport
// ---------------------------------------------------------------------------

/// Request timeout when the config does not set one.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Content type of every outbound request.
pub const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded;charset=UTF-8";

// ---------------------------------------------------------------------------
// Config sections
// ---------------------------------------------------------------------------

/// Where the key material lives.
#[derive(Debug, Clone, Deserialize)]
pub struct CredentialConfig {
    /// PKCS#12 container with the signing key.
    pub pfx_path: PathBuf,
    /// Password of the PKCS#12 container.
    pub password: String,
    /// Gateway certificate (PEM) used to verify responses.
    pub x509_path: PathBuf,
    /// Digest for the RSA step. Defaults to `sha1`.
    #[serde(default)]
    pub digest_method: DigestMethod,
}

/// Who we are to the gateway.
#[derive(Debug, Clone, Deserialize)]
pub struct MerchantConfig {
    /// 15-digit merchant id (`merId`).
    pub merchant_id: String,
    /// Asynchronous notification URL (`backUrl`).
    pub back_url: String,
    /// Browser return URL (`frontUrl`) for desktop payments.
    #[serde(default)]
    pub front_url: Option<String>,
}

/// Gateway endpoints.
#[derive(Debug, Clone, Deserialize)]
pub struct GatewayEndpoints {
    /// Browser-posted transactions (desktop pay).
    pub front_trans_url: String,
    /// Server-to-server transactions (revoke, refund).
    pub back_trans_url: String,
    /// App transactions (mobile pay).
    pub app_trans_url: String,
    /// Single transaction status query.
    pub query_url: String,
    /// Settlement file download.
    pub file_trans_url: String,
    /// Per-request timeout in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl GatewayEndpoints {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Every endpoint rooted at `base`, using the gateway's standard paths.
    /// Handy for test gateways and mocks.
    pub fn rooted_at(base: &str) -> Self {
        let base = base.trim_end_matches('/');
        Self {
            front_trans_url: format!("{}/gateway/api/frontTransReq.do", base),
            back_trans_url: format!("{}/gateway/api/backTransReq.do", base),
            app_trans_url: format!("{}/gateway/api/appTransReq.do", base),
            query_url: format!("{}/gateway/api/queryTrans.do", base),
            file_trans_url: format!("{}/", base),
            timeout_secs: default_timeout_secs(),
        }
    }
}

/// Where settlement bundles get unpacked.
#[derive(Debug, Clone, Deserialize)]
pub struct SettlementConfig {
    /// Parent directory of the per-date extraction directories.
    #[serde(default = "std::env::temp_dir")]
    pub work_dir: PathBuf,
    /// Prefix of each per-date directory name.
    #[serde(default = "default_dir_prefix")]
    pub dir_prefix: String,
}

impl Default for SettlementConfig {
    fn default() -> Self {
        Self {
            work_dir: std::env::temp_dir(),
            dir_prefix: default_dir_prefix(),
        }
    }
}

fn default_timeout_secs() -> u64 {
    DEFAULT_TIMEOUT.as_secs()
}

fn default_dir_prefix() -> String {
    DEFAULT_SETTLE_DIR_PREFIX.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rooted_endpoints_share_the_base() {
        let endpoints = GatewayEndpoints::rooted_at("http://127.0.0.1:9000/");
        assert_eq!(
            endpoints.back_trans_url,
            "http://127.0.0.1:9000/gateway/api/backTransReq.do"
        );
        assert_eq!(endpoints.file_trans_url, "http://127.0.0.1:9000/");
        assert_eq!(endpoints.timeout(), DEFAULT_TIMEOUT);
    }

    #[test]
    fn credential_config_defaults_to_sha1() {
        let config: CredentialConfig = serde_json::from_value(serde_json::json!({
            "pfx_path": "acp.pfx",
            "password": "111111",
            "x509_path": "verify.cer"
        }))
        .unwrap();
        assert_eq!(config.digest_method, DigestMethod::Sha1);
    }

    #[test]
    fn credential_config_rejects_unknown_digest() {
        let result: Result<CredentialConfig, _> = serde_json::from_value(serde_json::json!({
            "pfx_path": "acp.pfx",
            "password": "111111",
            "x509_path": "verify.cer",
            "digest_method": "md5"
        }));
        assert!(result.is_err());
    }

    #[test]
    fn settlement_config_defaults() {
        let config: SettlementConfig = serde_json::from_value(serde_json::json!({})).unwrap();
        assert_eq!(config.dir_prefix, "unionpay_");
        assert_eq!(config.work_dir, std::env::temp_dir());
    }
}
