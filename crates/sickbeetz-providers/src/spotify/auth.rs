//! Spotify accounts service: consent URL and code exchange.

use serde::Deserialize;
use tracing::info;
use url::Url;

use crate::error::{ProviderError, ProviderResult};
use crate::oauth::CodeExchange;
use crate::provider::BoxFuture;
use crate::tokens::Token;

use super::config::{OAuthCredentials, SpotifyConfig};
use super::{PROVIDER_NAME, http_client, request_error};

/// [`CodeExchange`] against `accounts.spotify.com`.
///
/// Uses PKCE (S256) and authenticates the token request with the client
/// secret over HTTP basic auth.
#[derive(Debug)]
pub struct SpotifyOAuth {
    credentials: OAuthCredentials,
    scopes: Vec<String>,
    authorize_url: Url,
    token_url: Url,
    http_client: reqwest::Client,
}

impl SpotifyOAuth {
    /// Creates the exchange from a validated configuration.
    pub fn new(config: &SpotifyConfig) -> ProviderResult<Self> {
        config.validate().map_err(ProviderError::configuration)?;

        let parse = |path: &str| {
            Url::parse(&format!("{}{}", config.accounts_base, path)).map_err(|e| {
                ProviderError::configuration(format!(
                    "invalid accounts URL {:?}: {}",
                    config.accounts_base, e
                ))
            })
        };

        Ok(Self {
            credentials: config.credentials.clone(),
            scopes: config.scopes.clone(),
            authorize_url: parse("/authorize")?,
            token_url: parse("/api/token")?,
            http_client: http_client(config)?,
        })
    }

    async fn request_token(
        &self,
        code: &str,
        verifier: &str,
        redirect_uri: &str,
    ) -> ProviderResult<Token> {
        let params = [
            ("grant_type", "authorization_code"),
            ("code", code),
            ("redirect_uri", redirect_uri),
            ("client_id", self.credentials.client_id.as_str()),
            ("code_verifier", verifier),
        ];

        let response = self
            .http_client
            .post(self.token_url.clone())
            .basic_auth(
                &self.credentials.client_id,
                Some(&self.credentials.client_secret),
            )
            .form(&params)
            .send()
            .await
            .map_err(request_error)?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| ProviderError::network(format!("failed to read response: {}", e)))?;

        if !status.is_success() {
            return Err(ProviderError::authentication(format!(
                "token exchange failed ({}): {}",
                status, body
            )));
        }

        let token_response: TokenResponse = serde_json::from_str(&body).map_err(|e| {
            ProviderError::invalid_response(format!("invalid token response: {}", e))
        })?;

        info!("successfully obtained token");
        Ok(token_response.into_token(&self.scopes))
    }
}

impl CodeExchange for SpotifyOAuth {
    fn authorization_url(&self, redirect_uri: &str, state: &str, challenge: &str) -> String {
        let mut url = self.authorize_url.clone();
        url.query_pairs_mut()
            .append_pair("client_id", &self.credentials.client_id)
            .append_pair("response_type", "code")
            .append_pair("redirect_uri", redirect_uri)
            .append_pair("scope", &self.scopes.join(" "))
            .append_pair("state", state)
            .append_pair("code_challenge_method", "S256")
            .append_pair("code_challenge", challenge);
        url.into()
    }

    fn exchange_code<'a>(
        &'a self,
        code: &'a str,
        verifier: &'a str,
        redirect_uri: &'a str,
    ) -> BoxFuture<'a, ProviderResult<Token>> {
        Box::pin(async move {
            self.request_token(code, verifier, redirect_uri)
                .await
                .map_err(|e| e.with_provider(PROVIDER_NAME))
        })
    }
}

/// Response from the accounts service token endpoint.
#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    token_type: Option<String>,
    #[serde(default)]
    scope: Option<String>,
    #[serde(default)]
    expires_in: Option<i64>,
    #[serde(default)]
    refresh_token: Option<String>,
}

impl TokenResponse {
    fn into_token(self, requested: &[String]) -> Token {
        let scopes = match self.scope.as_deref() {
            Some(granted) if !granted.trim().is_empty() => {
                granted.split_whitespace().map(String::from).collect()
            }
            _ => requested.to_vec(),
        };
        Token::new(
            self.access_token,
            self.token_type.unwrap_or_else(|| "Bearer".to_string()),
            self.refresh_token,
            self.expires_in,
            scopes,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ProviderErrorCode;
    use crate::spotify::test_server;

    fn test_config() -> SpotifyConfig {
        SpotifyConfig::new(OAuthCredentials::new("client-id", "client-secret"))
    }

    #[test]
    fn authorization_url_format() {
        let oauth = SpotifyOAuth::new(&test_config()).unwrap();
        let url = oauth.authorization_url("http://localhost:8080/callback", "st4te", "chall");

        assert!(url.starts_with("https://accounts.spotify.com/authorize?"));
        let parsed = Url::parse(&url).unwrap();
        let pairs: Vec<(String, String)> = parsed.query_pairs().into_owned().collect();
        let get = |k: &str| {
            pairs
                .iter()
                .find(|(key, _)| key == k)
                .map(|(_, v)| v.as_str())
        };
        assert_eq!(get("client_id"), Some("client-id"));
        assert_eq!(get("response_type"), Some("code"));
        assert_eq!(get("redirect_uri"), Some("http://localhost:8080/callback"));
        assert_eq!(
            get("scope"),
            Some("playlist-read-collaborative playlist-read-private")
        );
        assert_eq!(get("state"), Some("st4te"));
        assert_eq!(get("code_challenge_method"), Some("S256"));
        assert_eq!(get("code_challenge"), Some("chall"));
    }

    #[test]
    fn new_rejects_invalid_config() {
        let err = SpotifyOAuth::new(&SpotifyConfig::new(OAuthCredentials::new("", ""))).unwrap_err();
        assert_eq!(err.code(), ProviderErrorCode::ConfigurationError);

        let err = SpotifyOAuth::new(&test_config().with_accounts_base("not a url")).unwrap_err();
        assert_eq!(err.code(), ProviderErrorCode::ConfigurationError);
    }

    #[test]
    fn token_response_uses_granted_scopes() {
        let json = r#"{
            "access_token": "BQD",
            "token_type": "Bearer",
            "scope": "playlist-read-private",
            "expires_in": 3600,
            "refresh_token": "AQC"
        }"#;
        let response: TokenResponse = serde_json::from_str(json).unwrap();
        let token = response.into_token(&["other".to_string()]);

        assert_eq!(token.access_token, "BQD");
        assert_eq!(token.refresh_token.as_deref(), Some("AQC"));
        assert_eq!(token.scopes, vec!["playlist-read-private".to_string()]);
        assert!(token.expiry.is_some());
    }

    #[test]
    fn token_response_falls_back_to_requested_scopes() {
        let response: TokenResponse = serde_json::from_str(r#"{"access_token":"BQD"}"#).unwrap();
        let token = response.into_token(&["playlist-read-collaborative".to_string()]);
        assert_eq!(token.token_type, "Bearer");
        assert_eq!(token.scopes, vec!["playlist-read-collaborative".to_string()]);
        assert!(token.expiry.is_none());
    }

    #[tokio::test]
    async fn exchange_posts_form_with_basic_auth() {
        let server = test_server::serve(vec![(
            200,
            r#"{"access_token":"BQD","token_type":"Bearer","expires_in":3600}"#,
        )])
        .await;
        let oauth = SpotifyOAuth::new(&test_config().with_accounts_base(&server.base)).unwrap();

        let token = oauth
            .exchange_code("the-code", "the-verifier", "http://localhost:8080/callback")
            .await
            .unwrap();
        assert_eq!(token.access_token, "BQD");

        let requests = server.requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].target, "/api/token");
        // base64("client-id:client-secret")
        assert_eq!(
            requests[0].header("authorization"),
            Some("Basic Y2xpZW50LWlkOmNsaWVudC1zZWNyZXQ=")
        );
        let form: Vec<(String, String)> = url::form_urlencoded::parse(requests[0].body.as_bytes())
            .into_owned()
            .collect();
        assert!(form.contains(&("grant_type".to_string(), "authorization_code".to_string())));
        assert!(form.contains(&("code".to_string(), "the-code".to_string())));
        assert!(form.contains(&("code_verifier".to_string(), "the-verifier".to_string())));
        assert!(form.contains(&(
            "redirect_uri".to_string(),
            "http://localhost:8080/callback".to_string()
        )));
    }

    #[tokio::test]
    async fn rejected_exchange_is_authentication_error() {
        let server = test_server::serve(vec![(
            400,
            r#"{"error":"invalid_grant","error_description":"Invalid authorization code"}"#,
        )])
        .await;
        let oauth = SpotifyOAuth::new(&test_config().with_accounts_base(&server.base)).unwrap();

        let err = oauth
            .exchange_code("stale", "verifier", "http://localhost:8080/callback")
            .await
            .unwrap_err();
        assert_eq!(err.code(), ProviderErrorCode::AuthenticationFailed);
        assert_eq!(err.provider(), Some("spotify"));
        assert!(err.message().contains("invalid_grant"));
    }
}
