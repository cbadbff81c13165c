//! Request signing for the token exchange
//!
//! A SigV4-shaped scheme with SHA-512 throughout. The only signed header is
//! `x-amz-date`, and the query string is always empty.

use std::fmt;

use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use sha2::{Digest, Sha512};

type HmacSha512 = Hmac<Sha512>;

pub const ALGORITHM: &str = "AWS4-HMAC-SHA512";
pub const REGION: &str = "us-east-1";
pub const SERVICE: &str = "vdb";
pub const TERMINATOR: &str = "aws4_request";
pub const SIGNED_HEADERS: &str = "x-amz-date";

const AMZ_DATE_FORMAT: &str = "%Y%m%dT%H%M%SZ";
const DATE_STAMP_FORMAT: &str = "%Y%m%d";

#[derive(Debug, thiserror::Error)]
pub enum SigningError {
    #[error("failed to initialise HMAC key: {0}")]
    InvalidKey(String),
}

/// Headers produced for one signed request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedHeaders {
    /// Value for `X-Amz-Date`
    pub amz_date: String,
    /// Value for `Authorization`
    pub authorization: String,
}

/// Signs requests with an organization id and shared secret
#[derive(Clone)]
pub struct RequestSigner {
    access_key: String,
    secret: String,
}

impl fmt::Debug for RequestSigner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestSigner")
            .field("access_key", &self.access_key)
            .field("secret", &"<redacted>")
            .finish()
    }
}

impl RequestSigner {
    pub fn new(access_key: impl Into<String>, secret: impl Into<String>) -> Self {
        Self {
            access_key: access_key.into(),
            secret: secret.into(),
        }
    }

    /// Sign `method path` with `body` at `timestamp`
    pub fn sign(
        &self,
        method: &str,
        path: &str,
        body: &[u8],
        timestamp: DateTime<Utc>,
    ) -> Result<SignedHeaders, SigningError> {
        let amz_date = timestamp.format(AMZ_DATE_FORMAT).to_string();
        let date_stamp = timestamp.format(DATE_STAMP_FORMAT).to_string();

        let payload_hash = sha512_hex(body);
        let canonical = canonical_request(method, path, &amz_date, &payload_hash);
        let scope = credential_scope(&date_stamp);
        let to_sign = string_to_sign(&amz_date, &scope, &canonical);

        let signing_key = self.signing_key(&date_stamp)?;
        let signature = hex::encode(hmac_sha512(&signing_key, to_sign.as_bytes())?);

        let authorization = format!(
            "{} Credential={}/{}, SignedHeaders={}, Signature={}",
            ALGORITHM, self.access_key, scope, SIGNED_HEADERS, signature
        );

        Ok(SignedHeaders {
            amz_date,
            authorization,
        })
    }

    fn signing_key(&self, date_stamp: &str) -> Result<Vec<u8>, SigningError> {
        let seed = format!("AWS4{}", self.secret);
        let k_date = hmac_sha512(seed.as_bytes(), date_stamp.as_bytes())?;
        let k_region = hmac_sha512(&k_date, REGION.as_bytes())?;
        let k_service = hmac_sha512(&k_region, SERVICE.as_bytes())?;
        hmac_sha512(&k_service, TERMINATOR.as_bytes())
    }
}

/// `date/region/service/terminator`
pub fn credential_scope(date_stamp: &str) -> String {
    format!("{}/{}/{}/{}", date_stamp, REGION, SERVICE, TERMINATOR)
}

/// Canonical request; the header block keeps its trailing newline so a
/// blank line separates it from the signed header list.
pub fn canonical_request(method: &str, path: &str, amz_date: &str, payload_hash: &str) -> String {
    let canonical_headers = format!("x-amz-date:{}\n", amz_date);
    [method, path, "", &canonical_headers, SIGNED_HEADERS, payload_hash].join("\n")
}

pub fn string_to_sign(amz_date: &str, scope: &str, canonical_request: &str) -> String {
    [
        ALGORITHM,
        amz_date,
        scope,
        &sha512_hex(canonical_request.as_bytes()),
    ]
    .join("\n")
}

fn sha512_hex(data: &[u8]) -> String {
    hex::encode(Sha512::digest(data))
}

fn hmac_sha512(key: &[u8], data: &[u8]) -> Result<Vec<u8>, SigningError> {
    let mut mac =
        HmacSha512::new_from_slice(key).map_err(|e| SigningError::InvalidKey(e.to_string()))?;
    mac.update(data);
    Ok(mac.finalize().into_bytes().to_vec())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    const ORG: &str = "11111111-1111-1111-1111-111111111111";
    const EMPTY_SHA512: &str = "cf83e1357eefb8bdf1542850d66d8007d620e4050b5715dc83f4a921d36ce9ce47d0d13c5d85f2b0ff8318d2877eec2f63b931bd47417a81a538327af927da3e";

    fn pinned() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 15, 12, 0, 0).unwrap()
    }

    fn signature_of(headers: &SignedHeaders) -> &str {
        headers.authorization.rsplit("Signature=").next().unwrap()
    }

    #[test]
    fn test_canonical_request_bytes() {
        let canonical = canonical_request("GET", "/auth/token", "20240115T120000Z", EMPTY_SHA512);
        let expected = format!(
            "GET\n/auth/token\n\nx-amz-date:20240115T120000Z\n\nx-amz-date\n{}",
            EMPTY_SHA512
        );
        assert_eq!(canonical, expected);
    }

    #[test]
    fn test_string_to_sign_bytes() {
        let canonical = canonical_request("GET", "/auth/token", "20240115T120000Z", EMPTY_SHA512);
        let sts = string_to_sign("20240115T120000Z", &credential_scope("20240115"), &canonical);
        assert_eq!(
            sts,
            "AWS4-HMAC-SHA512\n20240115T120000Z\n20240115/us-east-1/vdb/aws4_request\n\
             2d9a8ecbcf1f3fcf7b78d6fc09183483ea61af92c5a32eb571bcca577cf1575b\
             3ffb4e67761ca252dc76aff0495fcb571c0e3ca8e557c4a935ffdf4b63287ced"
        );
    }

    #[test]
    fn test_pinned_signature() {
        let signer = RequestSigner::new(ORG, "s3cr3t");
        let headers = signer.sign("GET", "/auth/token", b"", pinned()).unwrap();

        assert_eq!(headers.amz_date, "20240115T120000Z");
        assert_eq!(
            headers.authorization,
            format!(
                "AWS4-HMAC-SHA512 Credential={}/20240115/us-east-1/vdb/aws4_request, \
                 SignedHeaders=x-amz-date, Signature=\
                 289e828df358a2654739f58878c49a75fd137a7229083e6e1e94046eeddde927\
                 a76ead8144d301507dcc92a0999d0d67a9a6db621a97616357ab6798bc99e294",
                ORG
            )
        );
    }

    #[test]
    fn test_deterministic() {
        let signer = RequestSigner::new(ORG, "s3cr3t");
        let a = signer.sign("POST", "/x", b"body", pinned()).unwrap();
        let b = signer.sign("POST", "/x", b"body", pinned()).unwrap();
        assert_eq!(a, b);
        assert_eq!(signature_of(&a).len(), 128);
    }

    #[test]
    fn test_sensitive_to_every_input() {
        let base_signer = RequestSigner::new(ORG, "s3cr3t");
        let base = base_signer.sign("GET", "/auth/token", b"", pinned()).unwrap();
        let base_sig = signature_of(&base).to_string();

        let variants = [
            RequestSigner::new(ORG, "other").sign("GET", "/auth/token", b"", pinned()),
            base_signer.sign("POST", "/auth/token", b"", pinned()),
            base_signer.sign("GET", "/auth/other", b"", pinned()),
            base_signer.sign("GET", "/auth/token", b"x", pinned()),
            base_signer.sign("GET", "/auth/token", b"", pinned() + chrono::Duration::seconds(1)),
        ];

        for v in variants {
            let v = v.unwrap();
            assert_ne!(signature_of(&v), base_sig);
        }

        // Org id changes the credential, not the signature
        let other_org = RequestSigner::new("org-b", "s3cr3t")
            .sign("GET", "/auth/token", b"", pinned())
            .unwrap();
        assert!(other_org.authorization.contains("Credential=org-b/"));
    }

    #[test]
    fn test_debug_redacts_secret() {
        let signer = RequestSigner::new(ORG, "super-secret");
        assert!(!format!("{:?}", signer).contains("super-secret"));
    }
}
