//! # Gateway Client
//!
//! Async HTTP client for the gateway's transaction and file endpoints.
//!
//! Every call follows the same path: project the request into fields, sign,
//! POST as a form, parse the reply, verify its signature, and only then
//! look at `respCode`. A reply whose signature does not check out is never
//! inspected further.

use std::sync::Arc;

use chrono::{Datelike, Local, NaiveDateTime};
use reqwest::header::CONTENT_TYPE;

use crate::config::{
    GatewayEndpoints, MerchantConfig, SettlementConfig, FIELD_FILE_CONTENT, FIELD_ORDER_ID,
    FIELD_RESP_CODE, FIELD_RESP_MSG, FORM_CONTENT_TYPE, RESP_CODE_SUCCESS,
};
use crate::encoding::{form_body, parse_form, FieldMap};
use crate::error::{Result, UpacpError};
use crate::settlement::{self, SettlementBatch};
use crate::signer::Signer;
use crate::transaction::{
    auto_submit_form, ChannelType, FileTransferRequest, PayRequest, QueryRequest, ReversalRequest,
    TransactionRequest,
};

/// What a payment call produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PayOutcome {
    /// Desktop: HTML the merchant hands to the browser.
    Form(String),
    /// Mobile: the verified gateway reply (carries `tn`).
    Response(FieldMap),
}

/// Talks to one gateway on behalf of one merchant.
pub struct GatewayClient {
    signer: Arc<Signer>,
    merchant: MerchantConfig,
    endpoints: GatewayEndpoints,
    settlement: SettlementConfig,
    http: reqwest::Client,
}

impl GatewayClient {
    pub fn new(
        signer: Arc<Signer>,
        merchant: MerchantConfig,
        endpoints: GatewayEndpoints,
        settlement: SettlementConfig,
    ) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(endpoints.timeout())
            .build()
            .map_err(|e| UpacpError::Transport(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            signer,
            merchant,
            endpoints,
            settlement,
            http,
        })
    }

    pub fn signer(&self) -> &Signer {
        &self.signer
    }

    pub fn merchant(&self) -> &MerchantConfig {
        &self.merchant
    }

    pub fn endpoints(&self) -> &GatewayEndpoints {
        &self.endpoints
    }

    // -----------------------------------------------------------------------
    // Plumbing
    // -----------------------------------------------------------------------

    /// Project and sign `request` as of `now`.
    pub fn prepare(&self, request: &TransactionRequest, now: NaiveDateTime) -> Result<FieldMap> {
        let mut fields = request.to_fields(&self.merchant, now)?;
        self.signer.sign(&mut fields)?;
        Ok(fields)
    }

    /// POST signed `fields` to `url` and return the raw body.
    ///
    /// A non-200 status is a [`UpacpError::Gateway`] carrying the status
    /// code as `resp_code`.
    pub async fn post(&self, url: &str, fields: &FieldMap) -> Result<String> {
        let response = self
            .http
            .post(url)
            .header(CONTENT_TYPE, FORM_CONTENT_TYPE)
            .body(form_body(fields))
            .send()
            .await
            .map_err(|e| self.map_reqwest_error(url, e))?;

        let status = response.status();
        if status != reqwest::StatusCode::OK {
            return Err(UpacpError::Gateway {
                resp_code: status.as_u16().to_string(),
                order_id: fields.get_str(FIELD_ORDER_ID).unwrap_or_default().to_string(),
                message: status.canonical_reason().unwrap_or("unexpected HTTP status").to_string(),
            });
        }

        response
            .text()
            .await
            .map_err(|e| UpacpError::Transport(format!("failed to read response body: {}", e)))
    }

    /// POST signed `fields`, then parse and verify the reply and check
    /// `respCode`.
    pub async fn send(&self, url: &str, fields: &FieldMap) -> Result<FieldMap> {
        let order_id = fields.get_str(FIELD_ORDER_ID).unwrap_or_default();
        tracing::info!(
            url,
            txn_type = fields.get_str("txnType").unwrap_or("-"),
            order_id,
            "sending gateway request"
        );

        let raw = self.post(url, fields).await?;
        let reply = self.signer.verify(parse_form(&raw))?;

        // A missing respCode is a rejection with an empty code.
        let resp_code = reply.get_str(FIELD_RESP_CODE).unwrap_or_default();
        if resp_code != RESP_CODE_SUCCESS {
            let message = match reply.get_non_empty(FIELD_RESP_MSG) {
                Some(msg) => msg.to_string(),
                None if resp_code.is_empty() => "reply carries no respCode".to_string(),
                None => String::new(),
            };
            let err = UpacpError::Gateway {
                resp_code: resp_code.to_string(),
                order_id: reply
                    .get_non_empty(FIELD_ORDER_ID)
                    .unwrap_or(order_id)
                    .to_string(),
                message,
            };
            tracing::warn!(error = %err, "gateway rejected request");
            return Err(err);
        }

        tracing::info!(order_id, resp_code, "gateway request succeeded");
        Ok(reply)
    }

    fn map_reqwest_error(&self, url: &str, e: reqwest::Error) -> UpacpError {
        if e.is_timeout() {
            UpacpError::Transport(format!(
                "request to {} timed out after {}s",
                url, self.endpoints.timeout_secs
            ))
        } else if e.is_connect() {
            UpacpError::Transport(format!("could not connect to {}: {}", url, e))
        } else {
            UpacpError::Transport(format!("request to {} failed: {}", url, e))
        }
    }

    // -----------------------------------------------------------------------
    // Operations
    // -----------------------------------------------------------------------

    /// Start a consumption.
    ///
    /// Desktop payments come back as an auto-submitting form for the
    /// browser; nothing is sent. Mobile payments go to the app endpoint.
    pub async fn pay(&self, request: PayRequest) -> Result<PayOutcome> {
        let channel = request.channel;
        let fields = self.prepare(&TransactionRequest::Pay(request), now())?;
        match channel {
            ChannelType::Desktop => Ok(PayOutcome::Form(auto_submit_form(
                &fields,
                &self.endpoints.front_trans_url,
            ))),
            ChannelType::Mobile => self
                .send(&self.endpoints.app_trans_url, &fields)
                .await
                .map(PayOutcome::Response),
        }
    }

    /// Status of an earlier order.
    pub async fn query(&self, request: QueryRequest) -> Result<FieldMap> {
        let fields = self.prepare(&TransactionRequest::Query(request), now())?;
        self.send(&self.endpoints.query_url, &fields).await
    }

    /// Cancel a same-day consumption.
    pub async fn revoke(&self, request: ReversalRequest) -> Result<FieldMap> {
        let fields = self.prepare(&TransactionRequest::Revoke(request), now())?;
        self.send(&self.endpoints.back_trans_url, &fields).await
    }

    pub async fn refund(&self, request: ReversalRequest) -> Result<FieldMap> {
        let fields = self.prepare(&TransactionRequest::Refund(request), now())?;
        self.send(&self.endpoints.back_trans_url, &fields).await
    }

    /// Download, unpack and parse the settlement files for `settle_date`
    /// (`MMDD`).
    pub async fn fetch_settlement(&self, settle_date: &str) -> Result<SettlementBatch> {
        let request = FileTransferRequest::new(settle_date)?;
        let now = now();
        let fields = self.prepare(&TransactionRequest::FileTransfer(request), now)?;
        let mut reply = self.send(&self.endpoints.file_trans_url, &fields).await?;

        let content = match reply.remove(FIELD_FILE_CONTENT) {
            Some(value) if !value.is_empty() => value.to_text(),
            _ => return Err(UpacpError::MissingField(FIELD_FILE_CONTENT.into())),
        };

        let settle_date = settle_date.to_string();
        let merchant_id = self.merchant.merchant_id.clone();
        let config = self.settlement.clone();
        let year = now.year();
        tokio::task::spawn_blocking(move || {
            settlement::ingest(&content, &settle_date, &merchant_id, &config, year)
        })
        .await
        .map_err(|e| UpacpError::Archive(format!("settlement task failed: {}", e)))?
    }
}

fn now() -> NaiveDateTime {
    Local::now().naive_local()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::credential::{PrivateCredential, VerificationCertificate};
    use crate::signer::DigestMethod;
    use crate::test_utils::{generate_identity, TEST_MERCHANT_ID, TEST_PASSWORD};

    fn client(base: &str) -> GatewayClient {
        let id = generate_identity(42);
        let signer = Signer::new(
            PrivateCredential::from_pkcs12_der(&id.pkcs12_der, TEST_PASSWORD).unwrap(),
            VerificationCertificate::from_pem(&id.certificate_pem).unwrap(),
            DigestMethod::Sha1,
        );
        GatewayClient::new(
            Arc::new(signer),
            MerchantConfig {
                merchant_id: TEST_MERCHANT_ID.into(),
                back_url: "https://merchant.example/notify".into(),
                front_url: Some("https://merchant.example/return".into()),
            },
            GatewayEndpoints::rooted_at(base),
            SettlementConfig::default(),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn desktop_pay_renders_signed_form_without_network() {
        // Nothing listens here; a network call would fail.
        let client = client("http://127.0.0.1:9");
        let outcome = client.pay(PayRequest::new("ORD1", 100)).await.unwrap();
        let PayOutcome::Form(html) = outcome else {
            panic!("desktop pay should produce a form");
        };
        assert!(html.contains("http://127.0.0.1:9/gateway/api/frontTransReq.do"));
        assert!(html.contains(r#"name="signature""#));
        assert!(html.contains(r#"name="certId" id="certId" value="42""#));
        assert!(html.contains(r#"name="frontUrl""#));
    }

    #[tokio::test]
    async fn connection_failure_is_retryable_transport_error() {
        let client = client("http://127.0.0.1:9");
        let err = client
            .query(QueryRequest {
                order_id: "ORD1".into(),
                txn_time: "20261016120000".into(),
            })
            .await
            .unwrap_err();
        assert!(err.is_retryable(), "unexpected error: {err}");
    }

    #[tokio::test]
    async fn bad_settle_date_fails_before_sending() {
        let client = client("http://127.0.0.1:9");
        let err = client.fetch_settlement("2016-10-16").await.unwrap_err();
        assert!(matches!(err, UpacpError::InvalidField(_)));
    }

    #[test]
    fn prepared_fields_verify_with_own_certificate() {
        let client = client("http://127.0.0.1:9");
        let request = TransactionRequest::Query(QueryRequest {
            order_id: "ORD1".into(),
            txn_time: "20261016120000".into(),
        });
        let fields = client.prepare(&request, now()).unwrap();
        assert!(client.signer().verify(fields).is_ok());
    }
}
