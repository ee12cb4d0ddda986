//! Certification - signed, immutable proof that a creative passed.
//!
//! A certificate carries a canonical JSON snapshot of the report and the
//! creative identity, plus a signature over the snapshot bytes. Signing is
//! delegated to a [`Signer`]; the engine never holds raw key material
//! beyond what the signer exposes.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use chrono::{DateTime, Utc};
use ed25519_dalek::{Signature, Signer as _, SigningKey, Verifier, VerifyingKey};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{ComplianceError, InputError};
use crate::hashing::{canonical_json, sha256_hex};
use crate::validation::{ComplianceReport, ComplianceStatus};
use crate::ENGINE_VERSION;

/// Signing capability held by the server.
pub trait Signer: Send + Sync {
    fn algorithm(&self) -> &'static str;

    /// Stable identifier of the key, recorded on each certificate.
    fn key_id(&self) -> String;

    fn sign(&self, message: &[u8]) -> Result<Vec<u8>, ComplianceError>;
}

pub struct Ed25519Signer {
    key: SigningKey,
}

impl Ed25519Signer {
    pub fn new(key: SigningKey) -> Self {
        Self { key }
    }

    pub fn generate() -> Self {
        Self::new(SigningKey::generate(&mut rand::rngs::OsRng))
    }

    /// Build from a 32-byte secret encoded as 64 hex characters.
    pub fn from_hex(secret: &str) -> Result<Self, ComplianceError> {
        let bytes = hex::decode(secret.trim()).map_err(|e| ComplianceError::Signing(format!("invalid key hex: {e}")))?;
        let bytes: [u8; 32] = bytes
            .try_into()
            .map_err(|_| ComplianceError::Signing("signing key must be 32 bytes".into()))?;
        Ok(Self::new(SigningKey::from_bytes(&bytes)))
    }

    pub fn verifying_key(&self) -> VerifyingKey {
        self.key.verifying_key()
    }
}

impl Signer for Ed25519Signer {
    fn algorithm(&self) -> &'static str {
        "ed25519"
    }

    fn key_id(&self) -> String {
        key_id_for(&self.verifying_key())
    }

    fn sign(&self, message: &[u8]) -> Result<Vec<u8>, ComplianceError> {
        Ok(self.key.sign(message).to_bytes().to_vec())
    }
}

/// First 16 hex characters of the SHA-256 of the public key.
pub fn key_id_for(key: &VerifyingKey) -> String {
    sha256_hex(key.as_bytes())[..16].to_string()
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct Snapshot<'a> {
    creative_id: &'a str,
    creative_name: &'a str,
    engine_version: &'a str,
    report: &'a ComplianceReport,
}

/// Issued certificate. Read-only: re-certifying issues a new one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Certificate {
    certificate_id: Uuid,
    creative_id: String,
    creative_name: String,
    report_id: Uuid,
    score: f64,
    status: ComplianceStatus,
    retailer: Option<String>,
    issued_at: DateTime<Utc>,
    snapshot: String,
    snapshot_hash: String,
    algorithm: String,
    key_id: String,
    signature: String,
}

impl Certificate {
    pub fn certificate_id(&self) -> Uuid {
        self.certificate_id
    }

    pub fn creative_id(&self) -> &str {
        &self.creative_id
    }

    pub fn creative_name(&self) -> &str {
        &self.creative_name
    }

    pub fn report_id(&self) -> Uuid {
        self.report_id
    }

    pub fn score(&self) -> f64 {
        self.score
    }

    pub fn status(&self) -> ComplianceStatus {
        self.status
    }

    pub fn retailer(&self) -> Option<&str> {
        self.retailer.as_deref()
    }

    pub fn issued_at(&self) -> DateTime<Utc> {
        self.issued_at
    }

    pub fn snapshot(&self) -> &str {
        &self.snapshot
    }

    pub fn snapshot_hash(&self) -> &str {
        &self.snapshot_hash
    }

    pub fn algorithm(&self) -> &str {
        &self.algorithm
    }

    pub fn key_id(&self) -> &str {
        &self.key_id
    }

    /// Base64 signature over the snapshot bytes.
    pub fn signature(&self) -> &str {
        &self.signature
    }
}

/// Issues certificates for passing and warning-level reports.
pub struct Certifier<S: Signer> {
    signer: S,
}

impl<S: Signer> Certifier<S> {
    pub fn new(signer: S) -> Self {
        Self { signer }
    }

    pub fn signer(&self) -> &S {
        &self.signer
    }

    /// Fails with a business-rule violation when the report status is fail.
    pub fn generate_certificate(
        &self,
        report: &ComplianceReport,
        creative_id: &str,
        creative_name: &str,
    ) -> Result<Certificate, ComplianceError> {
        if report.status == ComplianceStatus::Fail {
            return Err(ComplianceError::BusinessRule(format!(
                "report {} for creative {} failed compliance ({} errors, score {}); certificates require pass or warning",
                report.id,
                creative_id,
                report.count(crate::rules::Severity::Error),
                report.score
            )));
        }
        if creative_id.trim().is_empty() {
            return Err(InputError::InvalidMetadata {
                field: "creativeId",
                reason: "must not be empty".into(),
            }
            .into());
        }

        let snapshot = canonical_json(&Snapshot {
            creative_id,
            creative_name,
            engine_version: ENGINE_VERSION,
            report,
        })?;
        let signature = self.signer.sign(snapshot.as_bytes())?;

        let certificate = Certificate {
            certificate_id: Uuid::new_v4(),
            creative_id: creative_id.to_string(),
            creative_name: creative_name.to_string(),
            report_id: report.id,
            score: report.score,
            status: report.status,
            retailer: report.retailer.clone(),
            issued_at: Utc::now(),
            snapshot_hash: sha256_hex(snapshot.as_bytes()),
            snapshot,
            algorithm: self.signer.algorithm().to_string(),
            key_id: self.signer.key_id(),
            signature: BASE64.encode(signature),
        };
        tracing::info!(
            certificate_id = %certificate.certificate_id,
            creative_id,
            score = certificate.score,
            "certificate issued"
        );
        Ok(certificate)
    }
}

/// Check the snapshot hash and the ed25519 signature.
pub fn verify_certificate(certificate: &Certificate, key: &VerifyingKey) -> bool {
    if certificate.algorithm != "ed25519" || certificate.key_id != key_id_for(key) {
        return false;
    }
    if sha256_hex(certificate.snapshot.as_bytes()) != certificate.snapshot_hash {
        return false;
    }
    let Ok(bytes) = BASE64.decode(&certificate.signature) else {
        return false;
    };
    let Ok(signature) = Signature::from_slice(&bytes) else {
        return false;
    };
    key.verify(certificate.snapshot.as_bytes(), &signature).is_ok()
}
