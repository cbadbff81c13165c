//! Token exchange types.

use serde::{Deserialize, Serialize};

/// Response of the signed `GET /auth/token` exchange.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenResponse {
    /// Bearer token to attach to subsequent requests.
    pub token: String,
    /// Issuer.
    #[serde(default)]
    pub iss: String,
    /// Subject (the organization).
    #[serde(default)]
    pub sub: String,
    /// Expiry as unix seconds.
    pub exp: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_response_parse() {
        let json = r#"{"token":"jwt.abc","iss":"vdb","sub":"org-1","exp":1700000900}"#;
        let resp: TokenResponse = serde_json::from_str(json).unwrap();
        assert_eq!(resp.token, "jwt.abc");
        assert_eq!(resp.exp, 1_700_000_900);
    }
}
