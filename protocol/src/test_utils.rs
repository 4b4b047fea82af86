//! Fixtures for tests: throwaway credentials and synthetic settlement data.
//!
//! Everything here panics on failure. It is test scaffolding, not API.
//! The file only depends on external crates so integration tests and
//! benches can pull it in with `#[path]`.

#![allow(dead_code)]

use std::io::Write;
use std::path::{Path, PathBuf};

use base64::Engine;
use openssl::asn1::Asn1Time;
use openssl::bn::BigNum;
use openssl::hash::MessageDigest;
use openssl::pkcs12::Pkcs12;
use openssl::pkey::{PKey, Private};
use openssl::rsa::Rsa;
use openssl::x509::{X509Name, X509};

/// Password protecting every generated PKCS#12 container.
pub const TEST_PASSWORD: &str = "111111";

/// Merchant id used across the fixtures.
pub const TEST_MERCHANT_ID: &str = "700000000000001";

/// A freshly generated RSA identity in every encoding the crate consumes.
pub struct TestIdentity {
    pub key: PKey<Private>,
    pub certificate: X509,
    pub certificate_pem: Vec<u8>,
    pub pkcs12_der: Vec<u8>,
}

/// Where [`TestIdentity::write_to`] put the files.
pub struct CredentialPaths {
    pub pfx_path: PathBuf,
    pub x509_path: PathBuf,
}

impl TestIdentity {
    /// Write `acp.pfx` and `verify.cer` into `dir`.
    pub fn write_to(&self, dir: &Path) -> CredentialPaths {
        let pfx_path = dir.join("acp.pfx");
        let x509_path = dir.join("verify.cer");
        std::fs::write(&pfx_path, &self.pkcs12_der).expect("write pfx");
        std::fs::write(&x509_path, &self.certificate_pem).expect("write cer");
        CredentialPaths { pfx_path, x509_path }
    }
}

/// Generate an RSA-2048 key with a self-signed certificate carrying `serial`.
pub fn generate_identity(serial: u64) -> TestIdentity {
    let key = PKey::from_rsa(Rsa::generate(2048).expect("rsa keygen")).expect("pkey");

    let mut name = X509Name::builder().expect("name builder");
    name.append_entry_by_text("CN", "upacp-test").expect("cn");
    let name = name.build();

    let serial = BigNum::from_dec_str(&serial.to_string())
        .and_then(|bn| bn.to_asn1_integer())
        .expect("serial");

    let mut builder = X509::builder().expect("x509 builder");
    builder.set_version(2).expect("version");
    builder.set_serial_number(&serial).expect("serial number");
    builder.set_subject_name(&name).expect("subject");
    builder.set_issuer_name(&name).expect("issuer");
    builder.set_pubkey(&key).expect("pubkey");
    builder
        .set_not_before(&Asn1Time::days_from_now(0).expect("not before"))
        .expect("set not before");
    builder
        .set_not_after(&Asn1Time::days_from_now(365).expect("not after"))
        .expect("set not after");
    builder.sign(&key, MessageDigest::sha256()).expect("self-sign");
    let certificate = builder.build();

    let certificate_pem = certificate.to_pem().expect("pem");
    let pkcs12_der = Pkcs12::builder()
        .name("upacp-test")
        .pkey(&key)
        .cert(&certificate)
        .build2(TEST_PASSWORD)
        .and_then(|p12| p12.to_der())
        .expect("pkcs12");

    TestIdentity {
        key,
        certificate,
        certificate_pem,
        pkcs12_der,
    }
}

/// A 300-byte settlement line with the four projected fields placed at
/// their offsets and filler everywhere else.
pub fn settlement_line(txn_time: &str, txn_amt: &str, order_id: &str, mer_id: &str) -> String {
    let mut line = vec![b' '; 300];
    let mut put = |start: usize, width: usize, value: &str| {
        let bytes = value.as_bytes();
        assert!(bytes.len() <= width, "fixture value wider than its column");
        line[start..start + bytes.len()].copy_from_slice(bytes);
    };
    put(0, 36, "00049992   01  6216261000000000018");
    put(36, 10, txn_time);
    put(65, 12, txn_amt);
    put(106, 32, order_id);
    put(245, 15, mer_id);
    String::from_utf8(line).expect("ascii fixture")
}

/// ZIP the given entries, zlib-compress the archive and base64 the result,
/// the way the gateway ships `fileContent`.
pub fn settlement_file_content(entries: &[(&str, &[u8])]) -> String {
    let mut zipped = std::io::Cursor::new(Vec::new());
    {
        let mut zip = zip::ZipWriter::new(&mut zipped);
        let options = zip::write::SimpleFileOptions::default()
            .compression_method(zip::CompressionMethod::Deflated);
        for (name, data) in entries {
            zip.start_file(*name, options).expect("zip entry");
            zip.write_all(data).expect("zip write");
        }
        zip.finish().expect("zip finish");
    }

    let mut encoder = flate2::write::ZlibEncoder::new(Vec::new(), flate2::Compression::default());
    encoder.write_all(&zipped.into_inner()).expect("zlib write");
    let deflated = encoder.finish().expect("zlib finish");

    base64::engine::general_purpose::STANDARD.encode(deflated)
}
