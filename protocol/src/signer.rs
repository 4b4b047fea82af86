//! # Signature Engine
//!
//! Signs outbound field mappings with our PKCS#12 key and verifies inbound
//! ones against the gateway's certificate.
//!
//! ## Wire procedure
//!
//! ```text
//! fields ──► + certId ──► canonical_bytes ──► SHA-1 ──► lowercase hex
//!                                                          │
//!                        signature = base64(RSA-sign(digest_method, hex))
//! ```
//!
//! The gateway signs the *hex rendering* of the SHA-1 digest, not the raw
//! digest bytes, and the RSA step hashes that text again with the
//! configured digest method. Both quirks are part of the protocol.
//!
//! Verification undoes one transport artifact first: form decoding turns
//! `+` into a space, and base64 is full of `+`. Spaces in `signature` and
//! in `fileContent` are turned back into `+` before anything is decoded or
//! hashed.

use std::fmt;
use std::str::FromStr;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use openssl::hash::MessageDigest;
use openssl::sign::{Signer as RsaSigner, Verifier as RsaVerifier};
use serde::Deserialize;
use sha1::{Digest, Sha1};

use crate::config::{CredentialConfig, FIELD_CERT_ID, FIELD_FILE_CONTENT, FIELD_SIGNATURE};
use crate::credential::{PrivateCredential, VerificationCertificate};
use crate::encoding::{canonical_bytes, FieldMap, FieldValue};
use crate::error::{Result, UpacpError};

// ---------------------------------------------------------------------------
// DigestMethod
// ---------------------------------------------------------------------------

/// Digest used by the RSA signature step.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Deserialize)]
#[serde(try_from = "String")]
pub enum DigestMethod {
    /// `sha1`, what the gateway expects from 5.0.0 merchants.
    #[default]
    Sha1,
    /// `sha256`.
    Sha256,
}

impl DigestMethod {
    fn message_digest(self) -> MessageDigest {
        match self {
            Self::Sha1 => MessageDigest::sha1(),
            Self::Sha256 => MessageDigest::sha256(),
        }
    }
}

impl fmt::Display for DigestMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Sha1 => write!(f, "sha1"),
            Self::Sha256 => write!(f, "sha256"),
        }
    }
}

impl FromStr for DigestMethod {
    type Err = UpacpError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "sha1" | "sha-1" => Ok(Self::Sha1),
            "sha256" | "sha-256" => Ok(Self::Sha256),
            other => Err(UpacpError::Credential(format!("unsupported digest method: {}", other))),
        }
    }
}

impl TryFrom<String> for DigestMethod {
    type Error = UpacpError;

    fn try_from(s: String) -> Result<Self> {
        s.parse()
    }
}

// ---------------------------------------------------------------------------
// Signer
// ---------------------------------------------------------------------------

/// Holds the credentials for one merchant and applies the wire procedure.
///
/// Construct once and share (`Arc<Signer>`); nothing in it mutates.
#[derive(Debug)]
pub struct Signer {
    credential: PrivateCredential,
    counterparty: VerificationCertificate,
    digest: DigestMethod,
}

impl Signer {
    pub fn new(
        credential: PrivateCredential,
        counterparty: VerificationCertificate,
        digest: DigestMethod,
    ) -> Self {
        Self {
            credential,
            counterparty,
            digest,
        }
    }

    /// Load both credentials from the paths in `config`.
    pub fn from_config(config: &CredentialConfig) -> Result<Self> {
        let credential = PrivateCredential::load(&config.pfx_path, &config.password)?;
        let counterparty = VerificationCertificate::load(&config.x509_path)?;
        Ok(Self::new(credential, counterparty, config.digest_method))
    }

    /// The `certId` stamped on outbound requests.
    pub fn cert_id(&self) -> &str {
        self.credential.cert_id()
    }

    pub fn digest_method(&self) -> DigestMethod {
        self.digest
    }

    /// Sign `fields` in place and return the base64 signature.
    ///
    /// Sets `certId`, drops any stale `signature`, signs the canonical
    /// encoding, then stores the new `signature`.
    pub fn sign(&self, fields: &mut FieldMap) -> Result<String> {
        fields.insert(FIELD_CERT_ID, self.credential.cert_id());
        fields.remove(FIELD_SIGNATURE);

        let digest = sha1_hex(&canonical_bytes(fields));

        let raw = RsaSigner::new(self.digest.message_digest(), self.credential.private_key())
            .and_then(|mut signer| {
                signer.update(digest.as_bytes())?;
                signer.sign_to_vec()
            })
            .map_err(|e| UpacpError::Sign(e.to_string()))?;

        let signature = STANDARD.encode(raw);
        fields.insert(FIELD_SIGNATURE, signature.clone());
        Ok(signature)
    }

    /// Verify a mapping received from the gateway.
    ///
    /// On success returns the mapping without its `signature`. On failure
    /// the mapping is dropped; none of it should be trusted.
    pub fn verify(&self, mut fields: FieldMap) -> Result<FieldMap> {
        let encoded = match fields.remove(FIELD_SIGNATURE) {
            Some(value) if !value.is_empty() => value.to_text(),
            _ => return Err(UpacpError::Verification("payload carries no signature".into())),
        };
        let signature = STANDARD
            .decode(repair_plus(&encoded))
            .map_err(|e| UpacpError::Verification(format!("signature is not valid base64: {}", e)))?;

        if let Some(FieldValue::Text(content)) = fields.get_mut(FIELD_FILE_CONTENT) {
            if content.contains(' ') {
                *content = repair_plus(content);
            }
        }

        let digest = sha1_hex(&canonical_bytes(&fields));

        let matched = RsaVerifier::new(self.digest.message_digest(), self.counterparty.public_key())
            .and_then(|mut verifier| {
                verifier.update(digest.as_bytes())?;
                verifier.verify(&signature)
            })
            .map_err(|e| UpacpError::Verification(e.to_string()))?;

        if !matched {
            tracing::warn!(
                cert_id = fields.get_str(FIELD_CERT_ID).unwrap_or("-"),
                "signature does not match payload"
            );
            return Err(UpacpError::Verification("signature does not match payload".into()));
        }
        Ok(fields)
    }
}

/// Lowercase hex SHA-1 of `data`.
pub fn sha1_hex(data: &[u8]) -> String {
    hex::encode(Sha1::digest(data))
}

/// Undo the `+` → space substitution of form decoding.
fn repair_plus(s: &str) -> String {
    s.replace(' ', "+")
}
