//! # Credential Store
//!
//! Two pieces of key material, loaded once and never mutated:
//!
//! - [`PrivateCredential`]: our signing key and certificate, shipped by the
//!   acquirer as a password-protected PKCS#12 container. The certificate's
//!   serial number, in decimal, is the `certId` stamped on every request.
//! - [`VerificationCertificate`]: the gateway's PEM X.509 certificate. It
//!   only ever verifies.
//!
//! Both wrap OpenSSL handles that are `Send + Sync`, so a loaded credential
//! can sit behind an `Arc` and serve concurrent requests.

use std::fmt;
use std::path::Path;

use openssl::pkcs12::Pkcs12;
use openssl::pkey::{PKey, Private, Public};
use openssl::x509::X509;

use crate::error::{Result, UpacpError};

/// Signing key plus the certificate that identifies it.
pub struct PrivateCredential {
    key: PKey<Private>,
    certificate: X509,
    cert_id: String,
}

impl PrivateCredential {
    /// Load a PKCS#12 container from disk.
    pub fn load(path: impl AsRef<Path>, password: &str) -> Result<Self> {
        let path = path.as_ref();
        let der = std::fs::read(path).map_err(|e| {
            UpacpError::Credential(format!("cannot read PKCS#12 file {}: {}", path.display(), e))
        })?;
        let credential = Self::from_pkcs12_der(&der, password)?;
        tracing::debug!(path = %path.display(), cert_id = %credential.cert_id, "signing credential loaded");
        Ok(credential)
    }

    /// Parse a PKCS#12 container held in memory.
    pub fn from_pkcs12_der(der: &[u8], password: &str) -> Result<Self> {
        let parsed = Pkcs12::from_der(der)
            .map_err(|e| UpacpError::Credential(format!("malformed PKCS#12 container: {}", e)))?
            .parse2(password)
            .map_err(|e| UpacpError::Credential(format!("cannot open PKCS#12 container (bad password?): {}", e)))?;

        let key = parsed
            .pkey
            .ok_or_else(|| UpacpError::Credential("PKCS#12 container holds no private key".into()))?;
        let certificate = parsed
            .cert
            .ok_or_else(|| UpacpError::Credential("PKCS#12 container holds no certificate".into()))?;
        let cert_id = serial_decimal(&certificate)?;

        Ok(Self {
            key,
            certificate,
            cert_id,
        })
    }

    /// Decimal serial number of the signer certificate.
    pub fn cert_id(&self) -> &str {
        &self.cert_id
    }

    pub fn private_key(&self) -> &PKey<Private> {
        &self.key
    }

    pub fn certificate(&self) -> &X509 {
        &self.certificate
    }

    /// Public half of the signing key, taken from the certificate.
    pub fn public_key(&self) -> Result<PKey<Public>> {
        self.certificate
            .public_key()
            .map_err(|e| UpacpError::Credential(format!("signer certificate has no usable public key: {}", e)))
    }
}

impl fmt::Debug for PrivateCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PrivateCredential")
            .field("cert_id", &self.cert_id)
            .finish_non_exhaustive()
    }
}

/// The counterparty's certificate, used for verification only.
pub struct VerificationCertificate {
    certificate: X509,
    public_key: PKey<Public>,
    cert_id: String,
}

impl VerificationCertificate {
    /// Load a PEM certificate from disk.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let pem = std::fs::read(path).map_err(|e| {
            UpacpError::Credential(format!("cannot read certificate {}: {}", path.display(), e))
        })?;
        let cert = Self::from_pem(&pem)?;
        tracing::debug!(path = %path.display(), cert_id = %cert.cert_id, "verification certificate loaded");
        Ok(cert)
    }

    /// Parse a PEM certificate held in memory.
    pub fn from_pem(pem: &[u8]) -> Result<Self> {
        let certificate = X509::from_pem(pem)
            .map_err(|e| UpacpError::Credential(format!("malformed X.509 certificate: {}", e)))?;
        let public_key = certificate
            .public_key()
            .map_err(|e| UpacpError::Credential(format!("certificate has no usable public key: {}", e)))?;
        let cert_id = serial_decimal(&certificate)?;
        Ok(Self {
            certificate,
            public_key,
            cert_id,
        })
    }

    pub fn public_key(&self) -> &PKey<Public> {
        &self.public_key
    }

    pub fn certificate(&self) -> &X509 {
        &self.certificate
    }

    /// Decimal serial number, useful for matching the `certId` the gateway
    /// puts on its own responses.
    pub fn cert_id(&self) -> &str {
        &self.cert_id
    }
}

impl fmt::Debug for VerificationCertificate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VerificationCertificate")
            .field("cert_id", &self.cert_id)
            .finish_non_exhaustive()
    }
}

fn serial_decimal(cert: &X509) -> Result<String> {
    let serial = cert
        .serial_number()
        .to_bn()
        .and_then(|bn| bn.to_dec_str())
        .map_err(|e| UpacpError::Credential(format!("unreadable certificate serial: {}", e)))?;
    Ok(serial.to_string())
}
