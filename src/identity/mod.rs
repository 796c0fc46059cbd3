// identity/mod.rs — bearer credential verification.
//
// Tokens are stateless: `b64url(claims_json) . b64url(hmac_sha256(secret, claims_b64))`
// with claims `{"sub": <principal>, "exp": <epoch secs>}`. Issuance happens
// out of band (`taskd token issue`); the HTTP layer only ever verifies.

use anyhow::Result;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use chrono::Utc;
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use std::path::Path;
use thiserror::Error;
use uuid::Uuid;

type HmacSha256 = Hmac<Sha256>;

/// The authenticated owner a request acts on behalf of. Every task query and
/// mutation is scoped to it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Principal(pub String);

impl Principal {
    pub fn id(&self) -> &str {
        &self.0
    }
}

/// The four distinguishable credential-rejection reasons. All map to 401;
/// the `reason` string tells the client which one it hit.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthError {
    #[error("missing bearer credential")]
    Missing,
    #[error("credential expired")]
    Expired,
    #[error("malformed credential")]
    Malformed,
    #[error("credential verification failed")]
    Unverifiable,
}

impl AuthError {
    pub fn reason(&self) -> &'static str {
        match self {
            AuthError::Missing => "missing",
            AuthError::Expired => "expired",
            AuthError::Malformed => "malformed",
            AuthError::Unverifiable => "unverifiable",
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct Claims {
    sub: String,
    exp: i64,
}

/// Return the signing secret for this daemon instance.
///
/// On first call, generates a random 32-character hex secret and writes it to
/// `{data_dir}/token_secret` with user-only read/write permissions (mode 0600
/// on Unix). On subsequent calls, reads and returns the existing secret.
///
/// The secret file must be kept private — anyone who can read it can mint
/// tokens for any principal.
pub fn get_or_create_secret(data_dir: &Path) -> Result<String> {
    let path = data_dir.join("token_secret");

    if path.exists() {
        let secret = std::fs::read_to_string(&path)?.trim().to_string();
        if !secret.is_empty() {
            return Ok(secret);
        }
    }

    // UUID v4, hex without dashes = 32 chars
    let secret = Uuid::new_v4().to_string().replace('-', "");

    std::fs::create_dir_all(data_dir)?;
    std::fs::write(&path, &secret)?;

    // Restrict to owner read/write only on Unix
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o600))?;
    }

    Ok(secret)
}

#[derive(Clone)]
pub struct TokenVerifier {
    secret: Vec<u8>,
}

impl TokenVerifier {
    pub fn new(secret: impl Into<Vec<u8>>) -> Self {
        Self {
            secret: secret.into(),
        }
    }

    pub fn from_data_dir(data_dir: &Path) -> Result<Self> {
        Ok(Self::new(get_or_create_secret(data_dir)?))
    }

    /// Mint a token for `sub` valid for `ttl_secs` from now.
    pub fn issue(&self, sub: &str, ttl_secs: i64) -> Result<String> {
        let claims = Claims {
            sub: sub.to_string(),
            exp: Utc::now().timestamp() + ttl_secs,
        };
        let claims_b64 = URL_SAFE_NO_PAD.encode(serde_json::to_vec(&claims)?);
        let sig = self.sign(claims_b64.as_bytes())?;
        Ok(format!("{claims_b64}.{sig}"))
    }

    /// Validate an `Authorization` header value and yield the principal.
    ///
    /// `None` or a non-Bearer scheme → Missing; a Bearer value that does not
    /// decode → Malformed; a bad signature → Unverifiable; a good signature
    /// past its expiry → Expired.
    pub fn verify_header(&self, header: Option<&str>) -> Result<Principal, AuthError> {
        let header = header.ok_or(AuthError::Missing)?;
        let token = header.strip_prefix("Bearer ").ok_or(AuthError::Missing)?;
        self.verify_token(token.trim())
    }

    pub fn verify_token(&self, token: &str) -> Result<Principal, AuthError> {
        let (claims_b64, sig_b64) = token.split_once('.').ok_or(AuthError::Malformed)?;

        let sig = URL_SAFE_NO_PAD
            .decode(sig_b64)
            .map_err(|_| AuthError::Malformed)?;

        let mut mac = HmacSha256::new_from_slice(&self.secret)
            .map_err(|_| AuthError::Unverifiable)?;
        mac.update(claims_b64.as_bytes());
        // Constant-time comparison.
        if mac.verify_slice(&sig).is_err() {
            return Err(AuthError::Unverifiable);
        }

        let claims_raw = URL_SAFE_NO_PAD
            .decode(claims_b64)
            .map_err(|_| AuthError::Malformed)?;
        let claims: Claims =
            serde_json::from_slice(&claims_raw).map_err(|_| AuthError::Malformed)?;

        if claims.exp <= Utc::now().timestamp() {
            return Err(AuthError::Expired);
        }

        Ok(Principal(claims.sub))
    }

    fn sign(&self, data: &[u8]) -> Result<String> {
        let mut mac = HmacSha256::new_from_slice(&self.secret)
            .map_err(|e| anyhow::anyhow!("HMAC init failed: {e}"))?;
        mac.update(data);
        Ok(URL_SAFE_NO_PAD.encode(mac.finalize().into_bytes()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn verifier() -> TokenVerifier {
        TokenVerifier::new("0123456789abcdef0123456789abcdef")
    }

    #[test]
    fn test_issue_then_verify() {
        let v = verifier();
        let token = v.issue("user-1", 3600).unwrap();
        let principal = v.verify_token(&token).unwrap();
        assert_eq!(principal.id(), "user-1");
    }

    #[test]
    fn test_header_roundtrip() {
        let v = verifier();
        let token = v.issue("user-1", 3600).unwrap();
        let header = format!("Bearer {token}");
        assert_eq!(
            v.verify_header(Some(&header)).unwrap(),
            Principal("user-1".to_string())
        );
    }

    #[test]
    fn test_missing_header() {
        assert_eq!(verifier().verify_header(None), Err(AuthError::Missing));
        // Wrong scheme counts as missing a bearer credential.
        assert_eq!(
            verifier().verify_header(Some("Basic dXNlcjpwdw==")),
            Err(AuthError::Missing)
        );
    }

    #[test]
    fn test_expired_token() {
        let v = verifier();
        let token = v.issue("user-1", -60).unwrap();
        assert_eq!(v.verify_token(&token), Err(AuthError::Expired));
    }

    #[test]
    fn test_malformed_token() {
        let v = verifier();
        assert_eq!(v.verify_token("no-dot-here"), Err(AuthError::Malformed));
        assert_eq!(v.verify_token("a.!!!"), Err(AuthError::Malformed));
    }

    #[test]
    fn test_tampered_token_is_unverifiable() {
        let v = verifier();
        let token = v.issue("user-1", 3600).unwrap();
        let (_, sig) = token.split_once('.').unwrap();
        // Re-encode claims for a different subject, keep the old signature.
        let forged_claims = URL_SAFE_NO_PAD.encode(br#"{"sub":"user-2","exp":99999999999}"#);
        let forged = format!("{forged_claims}.{sig}");
        assert_eq!(v.verify_token(&forged), Err(AuthError::Unverifiable));
    }

    #[test]
    fn test_wrong_secret_is_unverifiable() {
        let token = verifier().issue("user-1", 3600).unwrap();
        let other = TokenVerifier::new("another-secret-another-secret!!!");
        assert_eq!(other.verify_token(&token), Err(AuthError::Unverifiable));
    }

    #[test]
    fn test_secret_file_persists() {
        let dir = tempfile::tempdir().unwrap();
        let first = get_or_create_secret(dir.path()).unwrap();
        let second = get_or_create_secret(dir.path()).unwrap();
        assert_eq!(first, second);
        assert_eq!(first.len(), 32);
    }
}
