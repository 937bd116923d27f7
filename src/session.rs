use base64::Engine;
use serde::Deserialize;

/// An authenticated session with the analysis service.
///
/// Holds the bearer credential for the lifetime of one sign-in. Issuing,
/// refreshing and revoking tokens belongs to the authentication layer; this
/// type only carries the credential to the API calls that need it.
#[derive(Clone)]
pub struct Session {
    token: String,
}

#[derive(Deserialize)]
struct TokenClaims {
    sub: String,
}

impl Session {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
        }
    }

    pub fn bearer_token(&self) -> &str {
        &self.token
    }

    /// Best-effort username from the token's `sub` claim.
    ///
    /// The payload segment is decoded without signature verification; this is
    /// display/attribution data, not an authorization decision. Returns `None`
    /// for opaque or malformed tokens.
    pub fn username(&self) -> Option<String> {
        let payload = self.token.split('.').nth(1)?;
        let bytes = base64::engine::general_purpose::URL_SAFE_NO_PAD
            .decode(payload)
            .ok()?;
        let claims: TokenClaims = serde_json::from_slice(&bytes).ok()?;
        Some(claims.sub)
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session").field("token", &"<redacted>").finish()
    }
}
