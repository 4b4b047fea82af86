//! End-to-end tests against a mocked gateway.
//!
//! The mock plays the gateway: it holds its own key, signs its replies and
//! checks the merchant's signature on what it receives. Each test starts its
//! own server and scratch directory.

mod common;

use std::sync::Arc;
use std::time::Duration;

use chrono::{Datelike, Local};
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use upacp_protocol::config::{CredentialConfig, GatewayEndpoints, SettlementConfig};
use upacp_protocol::encoding::{parse_form, FieldMap};
use upacp_protocol::transaction::{ChannelType, PayRequest, QueryRequest, ReversalRequest};
use upacp_protocol::{GatewayClient, PayOutcome, Signer, UpacpError};

use common::*;

// ---------------------------------------------------------------------------
// Test Helpers
// ---------------------------------------------------------------------------

fn success_fields(order_id: &str) -> FieldMap {
    FieldMap::new()
        .with("version", "5.0.0")
        .with("encoding", "UTF-8")
        .with("txnType", "01")
        .with("merId", TEST_MERCHANT_ID)
        .with("orderId", order_id)
        .with("respCode", "00")
        .with("respMsg", "success")
        .with("tn", "761603311111111111111")
}

async fn mount(server: &MockServer, route: &str, body: String) {
    Mock::given(method("POST"))
        .and(path(route))
        .and(header("content-type", "application/x-www-form-urlencoded;charset=UTF-8"))
        .respond_with(ResponseTemplate::new(200).set_body_string(body))
        .mount(server)
        .await;
}

/// The single request the mock received, verified with the gateway's view
/// of the merchant certificate.
async fn received_request(server: &MockServer, gateway: &Signer) -> FieldMap {
    let requests = server.received_requests().await.expect("recording enabled");
    assert_eq!(requests.len(), 1);
    let body = std::str::from_utf8(&requests[0].body).expect("utf-8 body");
    gateway.verify(parse_form(body)).expect("merchant signature verifies")
}

// ---------------------------------------------------------------------------
// Transactions
// ---------------------------------------------------------------------------

#[tokio::test]
async fn mobile_pay_round_trip() {
    let server = MockServer::start().await;
    let parties = parties();
    mount(
        &server,
        "/gateway/api/appTransReq.do",
        signed_reply(&parties.gateway, success_fields("TEST20261016120000")),
    )
    .await;

    let scratch = tempfile::tempdir().unwrap();
    let client = client(&server.uri(), Arc::clone(&parties.merchant), scratch.path());
    let outcome = client
        .pay(
            PayRequest::new("TEST20261016120000", 1000)
                .channel(ChannelType::Mobile)
                .order_desc("coffee & cake"),
        )
        .await
        .unwrap();

    let PayOutcome::Response(reply) = outcome else {
        panic!("mobile pay should be sent to the gateway");
    };
    assert_eq!(reply.get_str("tn"), Some("761603311111111111111"));
    assert!(!reply.contains_key("signature"));

    let sent = received_request(&server, &parties.gateway).await;
    assert_eq!(sent.get_str("certId"), Some("69026553251"));
    assert_eq!(sent.get_str("channelType"), Some("08"));
    assert_eq!(sent.get_str("orderDesc"), Some("coffee & cake"));
}

#[tokio::test]
async fn unescaped_plus_in_reply_signature_is_tolerated() {
    let server = MockServer::start().await;
    let parties = parties();

    // Sign until the signature actually contains a '+', so the repair path
    // is exercised.
    let mut order = 0;
    let body = loop {
        order += 1;
        let body = unescaped_reply(&parties.gateway, success_fields(&format!("ORD{}", order)));
        if body.contains('+') {
            break body;
        }
    };
    mount(&server, "/gateway/api/queryTrans.do", body).await;

    let scratch = tempfile::tempdir().unwrap();
    let client = client(&server.uri(), Arc::clone(&parties.merchant), scratch.path());
    let reply = client
        .query(QueryRequest {
            order_id: format!("ORD{}", order),
            txn_time: "20261016120000".into(),
        })
        .await
        .unwrap();
    assert_eq!(reply.get_str("respCode"), Some("00"));
}

#[tokio::test]
async fn gateway_rejection_carries_code_and_order() {
    let server = MockServer::start().await;
    let parties = parties();
    let fields = success_fields("REV1")
        .with("respCode", "12")
        .with("respMsg", "duplicate transaction");
    mount(&server, "/gateway/api/backTransReq.do", signed_reply(&parties.gateway, fields)).await;

    let scratch = tempfile::tempdir().unwrap();
    let client = client(&server.uri(), Arc::clone(&parties.merchant), scratch.path());
    let err = client
        .revoke(ReversalRequest {
            order_id: "REV1".into(),
            orig_qry_id: "201610161200001234567".into(),
            txn_amt: 1000,
        })
        .await
        .unwrap_err();

    match err {
        UpacpError::Gateway { resp_code, order_id, message } => {
            assert_eq!(resp_code, "12");
            assert_eq!(order_id, "REV1");
            assert_eq!(message, "duplicate transaction");
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn tampered_reply_is_rejected_before_resp_code() {
    let server = MockServer::start().await;
    let parties = parties();
    let body = signed_reply(&parties.gateway, success_fields("REF1").with("txnAmt", "1000"))
        .replace("txnAmt=1000", "txnAmt=9000");
    mount(&server, "/gateway/api/backTransReq.do", body).await;

    let scratch = tempfile::tempdir().unwrap();
    let client = client(&server.uri(), Arc::clone(&parties.merchant), scratch.path());
    let err = client
        .refund(ReversalRequest {
            order_id: "REF1".into(),
            orig_qry_id: "201610161200001234567".into(),
            txn_amt: 1000,
        })
        .await
        .unwrap_err();
    assert!(err.is_authentication_failure(), "unexpected error: {err}");
}

#[tokio::test]
async fn reply_signed_by_wrong_key_is_rejected() {
    let server = MockServer::start().await;
    let parties = parties();
    // A gateway key the merchant has never seen.
    let impostor = common::parties().gateway;
    mount(
        &server,
        "/gateway/api/queryTrans.do",
        signed_reply(&impostor, success_fields("ORD1")),
    )
    .await;

    let scratch = tempfile::tempdir().unwrap();
    let client = client(&server.uri(), Arc::clone(&parties.merchant), scratch.path());
    let err = client
        .query(QueryRequest {
            order_id: "ORD1".into(),
            txn_time: "20261016120000".into(),
        })
        .await
        .unwrap_err();
    assert!(matches!(err, UpacpError::Verification(_)));
}

#[tokio::test]
async fn http_error_status_is_gateway_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let parties = parties();
    let scratch = tempfile::tempdir().unwrap();
    let client = client(&server.uri(), Arc::clone(&parties.merchant), scratch.path());
    let err = client
        .query(QueryRequest {
            order_id: "ORD1".into(),
            txn_time: "20261016120000".into(),
        })
        .await
        .unwrap_err();
    match err {
        UpacpError::Gateway { resp_code, order_id, .. } => {
            assert_eq!(resp_code, "503");
            assert_eq!(order_id, "ORD1");
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn slow_gateway_times_out_as_retryable_transport_error() {
    let server = MockServer::start().await;
    let parties = parties();
    Mock::given(method("POST"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(signed_reply(&parties.gateway, success_fields("ORD1")))
                .set_delay(Duration::from_secs(3)),
        )
        .mount(&server)
        .await;

    let mut endpoints = GatewayEndpoints::rooted_at(&server.uri());
    endpoints.timeout_secs = 1;
    let scratch = tempfile::tempdir().unwrap();
    let client = GatewayClient::new(
        Arc::clone(&parties.merchant),
        merchant_config(),
        endpoints,
        SettlementConfig {
            work_dir: scratch.path().to_path_buf(),
            dir_prefix: "unionpay_".into(),
        },
    )
    .unwrap();

    let err = client
        .query(QueryRequest {
            order_id: "ORD1".into(),
            txn_time: "20261016120000".into(),
        })
        .await
        .unwrap_err();
    assert!(matches!(err, UpacpError::Transport(ref msg) if msg.contains("timed out")), "unexpected error: {err}");
    assert!(err.is_retryable());
}

#[tokio::test]
async fn reply_without_resp_code_is_gateway_error() {
    let server = MockServer::start().await;
    let parties = parties();
    let mut fields = success_fields("ORD1");
    fields.remove("respCode");
    fields.remove("respMsg");
    mount(&server, "/gateway/api/queryTrans.do", signed_reply(&parties.gateway, fields)).await;

    let scratch = tempfile::tempdir().unwrap();
    let client = client(&server.uri(), Arc::clone(&parties.merchant), scratch.path());
    let err = client
        .query(QueryRequest {
            order_id: "ORD1".into(),
            txn_time: "20261016120000".into(),
        })
        .await
        .unwrap_err();
    match err {
        UpacpError::Gateway { resp_code, order_id, message } => {
            assert!(resp_code.is_empty());
            assert_eq!(order_id, "ORD1");
            assert!(message.contains("respCode"));
        }
        other => panic!("unexpected error: {other}"),
    }
}

// ---------------------------------------------------------------------------
// Settlement
// ---------------------------------------------------------------------------

#[tokio::test]
async fn settlement_download_end_to_end() {
    let server = MockServer::start().await;
    let parties = parties();

    let normal = format!(
        "{}\n{}\n",
        settlement_line("1016093000", "000000001000", "ORD1", TEST_MERCHANT_ID),
        settlement_line("1016094500", "000000002500", "ORD2", TEST_MERCHANT_ID),
    );
    let periodic = format!(
        "{}\ntruncated line\n",
        settlement_line("1016100000", "000000000300", "ORD3", TEST_MERCHANT_ID),
    );
    let content = settlement_file_content(&[
        ("INN26101688ZM_700000000000001", normal.as_bytes()),
        ("INN26101688ZM_999999999999999", normal.as_bytes()),
        ("INN26101688XX_700000000000001", normal.as_bytes()),
        ("INN26101688PED_700000000000001", periodic.as_bytes()),
    ]);

    let reply = FieldMap::new()
        .with("version", "5.0.0")
        .with("txnType", "76")
        .with("merId", TEST_MERCHANT_ID)
        .with("settleDate", "1016")
        .with("fileType", "00")
        .with("respCode", "00")
        .with("fileContent", content);
    mount(&server, "/", unescaped_reply(&parties.gateway, reply)).await;

    let scratch = tempfile::tempdir().unwrap();
    let client = client(&server.uri(), Arc::clone(&parties.merchant), scratch.path());
    let batch = client.fetch_settlement("1016").await.unwrap();

    let orders: Vec<_> = batch.records.iter().map(|r| r.order_id_trimmed()).collect();
    assert_eq!(orders, vec!["ORD1", "ORD2", "ORD3"]);
    assert_eq!(batch.records[1].amount_fen(), Some(2500));
    assert!(batch.records.iter().all(|r| r.settle_date == "1016"));

    assert_eq!(batch.skipped.len(), 1);
    assert_eq!(batch.skipped[0].file, "INN26101688PED_700000000000001");
    assert_eq!(batch.skipped[0].line, 2);
    assert_eq!(batch.skipped[0].length, "truncated line".len());

    let dir = scratch.path().join(format!("unionpay_{}1016", Local::now().year()));
    let leftovers: Vec<_> = std::fs::read_dir(&dir)
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .filter(|name| name.starts_with("SMT_"))
        .collect();
    assert!(leftovers.is_empty(), "temporary archive left behind: {:?}", leftovers);

    let sent = received_request(&server, &parties.gateway).await;
    assert_eq!(sent.get_str("txnType"), Some("76"));
    assert_eq!(sent.get_str("settleDate"), Some("1016"));
}

#[tokio::test]
async fn settlement_reply_without_file_content_is_missing_field() {
    let server = MockServer::start().await;
    let parties = parties();
    let reply = FieldMap::new().with("txnType", "76").with("respCode", "00");
    mount(&server, "/", signed_reply(&parties.gateway, reply)).await;

    let scratch = tempfile::tempdir().unwrap();
    let client = client(&server.uri(), Arc::clone(&parties.merchant), scratch.path());
    let err = client.fetch_settlement("1016").await.unwrap_err();
    assert!(matches!(err, UpacpError::MissingField(ref f) if f == "fileContent"));
}

// ---------------------------------------------------------------------------
// Credentials on disk
// ---------------------------------------------------------------------------

#[test]
fn signer_loads_from_credential_files() {
    let scratch = tempfile::tempdir().unwrap();
    let identity = generate_identity(4_242);
    let paths = identity.write_to(scratch.path());

    let config = CredentialConfig {
        pfx_path: paths.pfx_path.clone(),
        password: TEST_PASSWORD.into(),
        x509_path: paths.x509_path.clone(),
        digest_method: Default::default(),
    };
    let signer = Signer::from_config(&config).unwrap();
    assert_eq!(signer.cert_id(), "4242");

    let mut fields = FieldMap::new().with("orderId", "ORD1");
    signer.sign(&mut fields).unwrap();
    assert!(signer.verify(fields).is_ok());

    let wrong_password = CredentialConfig {
        password: "000000".into(),
        ..config
    };
    let err = Signer::from_config(&wrong_password).unwrap_err();
    assert!(matches!(err, UpacpError::Credential(_)));
}
