//! Google OAuth 2.0 web-server flow.
//!
//! Only the two pieces the bot needs: building the authorization redirect and
//! exchanging the callback code for tokens. There is no automatic refresh —
//! an expired token surfaces as API failures in the poll loop.

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};

const AUTHORIZE_URL: &str = "https://accounts.google.com/o/oauth2/v2/auth";
const TOKEN_URL: &str = "https://oauth2.googleapis.com/token";

/// Scopes requested on login: read channel data, write live chat messages.
const SCOPES: &[&str] = &[
    "https://www.googleapis.com/auth/youtube.readonly",
    "https://www.googleapis.com/auth/youtube.force-ssl",
];

/// Token pair returned by the provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenSet {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub expires_in: u64,
}

pub struct OAuthClient {
    client_id: String,
    client_secret: String,
    redirect_uri: String,
    http: reqwest::Client,
}

impl OAuthClient {
    pub fn new(client_id: &str, client_secret: &str, redirect_uri: &str) -> Self {
        Self {
            client_id: client_id.to_string(),
            client_secret: client_secret.to_string(),
            redirect_uri: redirect_uri.to_string(),
            http: reqwest::Client::new(),
        }
    }

    /// Build the authorization URL the browser is redirected to.
    /// `state` is the per-session CSRF token, echoed back on the callback.
    pub fn authorize_url(&self, state: &str) -> String {
        let scope = SCOPES.join(" ");
        let params = [
            ("client_id", self.client_id.as_str()),
            ("redirect_uri", self.redirect_uri.as_str()),
            ("response_type", "code"),
            ("scope", &scope),
            ("access_type", "offline"),
            ("prompt", "consent"),
            ("state", state),
        ];

        let query = params
            .iter()
            .map(|(k, v)| format!("{}={}", k, urlencoded(v)))
            .collect::<Vec<_>>()
            .join("&");

        format!("{AUTHORIZE_URL}?{query}")
    }

    /// Exchange an authorization code for a token pair.
    pub async fn exchange_code(&self, code: &str) -> Result<TokenSet> {
        let form = [
            ("grant_type", "authorization_code"),
            ("code", code),
            ("client_id", &self.client_id),
            ("client_secret", &self.client_secret),
            ("redirect_uri", &self.redirect_uri),
        ];

        let resp = self
            .http
            .post(TOKEN_URL)
            .form(&form)
            .send()
            .await
            .context("Failed to reach token endpoint")?;

        if !resp.status().is_success() {
            let text = resp.text().await.unwrap_or_default();
            bail!("token exchange failed: {}", text);
        }

        resp.json().await.context("Failed to parse token response")
    }
}

/// Minimal URL encoding for query parameters.
fn urlencoded(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for b in s.bytes() {
        match b {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                out.push(b as char);
            }
            _ => {
                out.push_str(&format!("%{:02X}", b));
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client() -> OAuthClient {
        OAuthClient::new("my-id", "my-secret", "https://bot.example.com/oauth2callback")
    }

    #[test]
    fn test_authorize_url_has_required_params() {
        let url = client().authorize_url("csrf123");
        assert!(url.starts_with(AUTHORIZE_URL));
        assert!(url.contains("client_id=my-id"));
        assert!(url.contains("response_type=code"));
        assert!(url.contains("access_type=offline"));
        assert!(url.contains("prompt=consent"));
        assert!(url.contains("state=csrf123"));
        assert!(url.contains(
            "redirect_uri=https%3A%2F%2Fbot.example.com%2Foauth2callback"
        ));
    }

    #[test]
    fn test_authorize_url_encodes_scopes() {
        let url = client().authorize_url("s");
        // Two scopes joined by an encoded space.
        assert!(url.contains("youtube.readonly%20"));
        assert!(url.contains("youtube.force-ssl"));
    }

    #[test]
    fn test_urlencoded_passthrough() {
        assert_eq!(urlencoded("abc-DEF_123.~"), "abc-DEF_123.~");
    }

    #[test]
    fn test_urlencoded_escapes() {
        assert_eq!(urlencoded("a b/c"), "a%20b%2Fc");
    }

    #[test]
    fn test_token_set_without_refresh_token() {
        let set: TokenSet =
            serde_json::from_str(r#"{"access_token":"at","expires_in":3599}"#).unwrap();
        assert_eq!(set.access_token, "at");
        assert!(set.refresh_token.is_none());
    }
}
