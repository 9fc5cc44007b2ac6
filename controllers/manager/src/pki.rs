//! TLS material parsing and self-signed synthesis.
//!
//! Certificates issued by this controller carry an issuer common name of the
//! form `tigera-operator-signer@<unix-seconds>`, which is how later passes
//! recognise them as operator-managed.

use k8s_openapi::api::core::v1::Secret;
use rcgen::{CertificateParams, DistinguishedName, DnType, DnValue, KeyPair};
use thiserror::Error;
use x509_parser::prelude::*;

/// Lifetime of synthesized certificates.
pub const CERTIFICATE_VALIDITY_DAYS: i64 = 825;

/// Issuer common name prefix used for operator-signed certificates.
pub const OPERATOR_SIGNER_PREFIX: &str = "tigera-operator-signer";

/// Errors raised while handling TLS material
#[derive(Debug, Error)]
pub enum CertificateError {
    /// A required field is absent from a secret
    #[error("secret {secret} is missing field {field}")]
    MissingField { secret: String, field: String },

    /// PEM or DER content could not be parsed
    #[error("failed to parse {0}")]
    Parse(String),

    /// Key or certificate generation failed
    #[error("failed to generate certificate: {0}")]
    Generation(String),

    /// Certificate was not issued by an accepted signer
    #[error("{0}")]
    Untrusted(String),
}

/// Fields of a certificate the controller cares about.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CertificateInfo {
    pub issuer_common_name: String,
    pub dns_names: Vec<String>,
    pub not_before: i64,
    pub not_after: i64,
}

impl CertificateInfo {
    /// Whether the issuer is the operator's own signer.
    pub fn is_operator_issued(&self) -> bool {
        self.issuer_common_name.starts_with(OPERATOR_SIGNER_PREFIX)
    }
}

/// A generated key and certificate, both PEM encoded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedKeyPair {
    pub key_pem: String,
    pub cert_pem: String,
}

/// Reads a secret field as UTF-8, checking `data` then `stringData`.
pub fn secret_field(secret: &Secret, field: &str) -> Option<String> {
    if let Some(bytes) = secret.data.as_ref().and_then(|d| d.get(field)) {
        return String::from_utf8(bytes.0.clone()).ok();
    }
    secret
        .string_data
        .as_ref()
        .and_then(|d| d.get(field))
        .cloned()
}

/// Like [`secret_field`], but absence is an error.
pub fn require_secret_field(secret: &Secret, field: &str) -> Result<String, CertificateError> {
    secret_field(secret, field).ok_or_else(|| CertificateError::MissingField {
        secret: secret.metadata.name.clone().unwrap_or_default(),
        field: field.to_string(),
    })
}

fn parse_pem_block(pem_data: &str, what: &str) -> Result<::pem::Pem, CertificateError> {
    ::pem::parse(pem_data.as_bytes())
        .map_err(|e| CertificateError::Parse(format!("{what} PEM: {e}")))
}

/// Parses a PEM certificate.
pub fn parse_certificate(cert_pem: &str) -> Result<CertificateInfo, CertificateError> {
    let block = parse_pem_block(cert_pem, "certificate")?;
    if block.tag() != "CERTIFICATE" {
        return Err(CertificateError::Parse(format!(
            "certificate PEM: unexpected block {}",
            block.tag()
        )));
    }

    let (_, cert) = X509Certificate::from_der(block.contents())
        .map_err(|e| CertificateError::Parse(format!("certificate: {e}")))?;

    let issuer_common_name = cert
        .issuer()
        .iter_common_name()
        .next()
        .and_then(|cn| cn.as_str().ok())
        .unwrap_or("")
        .to_string();

    let dns_names = match cert.subject_alternative_name() {
        Ok(Some(san)) => san
            .value
            .general_names
            .iter()
            .filter_map(|name| match name {
                GeneralName::DNSName(dns) => Some((*dns).to_string()),
                _ => None,
            })
            .collect(),
        Ok(None) => Vec::new(),
        Err(e) => return Err(CertificateError::Parse(format!("subjectAltName: {e}"))),
    };

    Ok(CertificateInfo {
        issuer_common_name,
        dns_names,
        not_before: cert.validity().not_before.timestamp(),
        not_after: cert.validity().not_after.timestamp(),
    })
}

/// Validates a PEM private key and certificate pair.
pub fn validate_key_pair(key_pem: &str, cert_pem: &str) -> Result<CertificateInfo, CertificateError> {
    KeyPair::from_pem(key_pem).map_err(|e| CertificateError::Parse(format!("private key: {e}")))?;
    parse_certificate(cert_pem)
}

/// Synthesizes a self-signed serving certificate for `dns_names`, valid for
/// [`CERTIFICATE_VALIDITY_DAYS`] from `now`.
pub fn synthesize_self_signed(
    dns_names: &[String],
    now: ::time::OffsetDateTime,
) -> Result<GeneratedKeyPair, CertificateError> {
    let mut params = CertificateParams::new(dns_names.to_vec())
        .map_err(|e| CertificateError::Generation(format!("invalid DNS name: {e}")))?;

    let signer = format!("{OPERATOR_SIGNER_PREFIX}@{}", now.unix_timestamp());
    let mut dn = DistinguishedName::new();
    dn.push(DnType::CommonName, DnValue::Utf8String(signer));
    params.distinguished_name = dn;

    params.not_before = now;
    params.not_after = now + ::time::Duration::days(CERTIFICATE_VALIDITY_DAYS);

    let key_pair = KeyPair::generate()
        .map_err(|e| CertificateError::Generation(format!("key generation: {e}")))?;
    let cert = params
        .self_signed(&key_pair)
        .map_err(|e| CertificateError::Generation(e.to_string()))?;

    Ok(GeneratedKeyPair {
        key_pem: key_pair.serialize_pem(),
        cert_pem: cert.pem(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use k8s_openapi::ByteString;
    use std::collections::BTreeMap;

    fn names() -> Vec<String> {
        vec!["tigera-manager".to_string(), "localhost".to_string()]
    }

    #[test]
    fn test_synthesized_certificate_round_trips() {
        let now = ::time::OffsetDateTime::now_utc();
        let generated = synthesize_self_signed(&names(), now).unwrap();

        let info = validate_key_pair(&generated.key_pem, &generated.cert_pem).unwrap();
        assert!(info.is_operator_issued());
        assert_eq!(info.dns_names, names());
        assert_eq!(info.not_after - info.not_before, CERTIFICATE_VALIDITY_DAYS * 24 * 3600);
    }

    #[test]
    fn test_garbage_is_rejected() {
        assert!(matches!(
            parse_certificate("not a certificate"),
            Err(CertificateError::Parse(_))
        ));

        let generated = synthesize_self_signed(&names(), ::time::OffsetDateTime::now_utc()).unwrap();
        // Key in the certificate slot
        assert!(parse_certificate(&generated.key_pem).is_err());
        assert!(validate_key_pair("junk", &generated.cert_pem).is_err());
    }

    #[test]
    fn test_secret_field_reads_data_and_string_data() {
        let mut data = BTreeMap::new();
        data.insert("cert".to_string(), ByteString(b"abc".to_vec()));
        let mut string_data = BTreeMap::new();
        string_data.insert("key".to_string(), "def".to_string());

        let secret = Secret {
            data: Some(data),
            string_data: Some(string_data),
            ..Default::default()
        };
        assert_eq!(secret_field(&secret, "cert").as_deref(), Some("abc"));
        assert_eq!(secret_field(&secret, "key").as_deref(), Some("def"));
        assert!(require_secret_field(&secret, "tls.crt").is_err());
    }
}
