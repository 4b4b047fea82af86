//! Shared fixtures for the integration tests: a merchant and a gateway,
//! each with its own key, and helpers to forge gateway replies.

#![allow(dead_code)]

use std::path::Path;
use std::sync::Arc;

use upacp_protocol::config::{GatewayEndpoints, MerchantConfig, SettlementConfig};
use upacp_protocol::encoding::{canonical_string, form_body, FieldMap};
use upacp_protocol::{DigestMethod, GatewayClient, PrivateCredential, Signer, VerificationCertificate};

#[path = "../../src/test_utils.rs"]
mod test_utils;

pub use test_utils::*;

/// Both sides of the conversation.
pub struct Parties {
    /// Signs with the merchant key, verifies with the gateway certificate.
    pub merchant: Arc<Signer>,
    /// Signs with the gateway key, verifies with the merchant certificate.
    pub gateway: Signer,
}

pub fn parties() -> Parties {
    let merchant = generate_identity(69_026_553_251);
    let gateway = generate_identity(69_042_905_377);
    Parties {
        merchant: Arc::new(pair(&merchant, &gateway)),
        gateway: pair(&gateway, &merchant),
    }
}

fn pair(ours: &TestIdentity, theirs: &TestIdentity) -> Signer {
    Signer::new(
        PrivateCredential::from_pkcs12_der(&ours.pkcs12_der, TEST_PASSWORD).expect("pkcs12"),
        VerificationCertificate::from_pem(&theirs.certificate_pem).expect("pem"),
        DigestMethod::Sha1,
    )
}

pub fn merchant_config() -> MerchantConfig {
    MerchantConfig {
        merchant_id: TEST_MERCHANT_ID.into(),
        back_url: "https://merchant.example/notify".into(),
        front_url: Some("https://merchant.example/return".into()),
    }
}

pub fn client(base: &str, signer: Arc<Signer>, work_dir: &Path) -> GatewayClient {
    GatewayClient::new(
        signer,
        merchant_config(),
        GatewayEndpoints::rooted_at(base),
        SettlementConfig {
            work_dir: work_dir.to_path_buf(),
            dir_prefix: "unionpay_".into(),
        },
    )
    .expect("client")
}

/// A reply signed by the gateway, form-encoded properly.
pub fn signed_reply(gateway: &Signer, mut fields: FieldMap) -> String {
    gateway.sign(&mut fields).expect("gateway sign");
    form_body(&fields)
}

/// A reply signed by the gateway and joined without any escaping, so `+`
/// in base64 values reaches the client unencoded.
pub fn unescaped_reply(gateway: &Signer, mut fields: FieldMap) -> String {
    gateway.sign(&mut fields).expect("gateway sign");
    canonical_string(&fields)
}
