//! OAuth for the Sheets API.
//!
//! A cached authorized-user file (`token.json`) is used when present and its
//! access token is refreshed when it expires. Without one, the installed-app
//! consent flow runs against a loopback listener and the resulting tokens are
//! written back to `token.json`.

use crate::domain::ports::TokenSource;
use crate::utils::error::{EnricherError, Result};
use async_trait::async_trait;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use reqwest::Client;
use rand::Rng as _;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpListener;
use tokio::sync::Mutex;
use url::Url;

pub const SHEETS_SCOPE: &str = "https://www.googleapis.com/auth/spreadsheets";
const DEFAULT_AUTH_URI: &str = "https://accounts.google.com/o/oauth2/auth";
const DEFAULT_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";
const CALLBACK_TIMEOUT: Duration = Duration::from_secs(300);
const CODE_VERIFIER_LENGTH: usize = 32;

/// Client secrets as downloaded from the Google Cloud console.
#[derive(Debug, Clone, Deserialize)]
pub struct ClientSecrets {
    pub client_id: String,
    pub client_secret: String,
    #[serde(default = "default_auth_uri")]
    pub auth_uri: String,
    #[serde(default = "default_token_uri")]
    pub token_uri: String,
}

#[derive(Debug, Deserialize)]
struct ClientSecretsFile {
    installed: Option<ClientSecrets>,
    web: Option<ClientSecrets>,
}

fn default_auth_uri() -> String {
    DEFAULT_AUTH_URI.to_string()
}

fn default_token_uri() -> String {
    DEFAULT_TOKEN_URI.to_string()
}

impl ClientSecrets {
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            EnricherError::auth(format!("failed to read {}: {}", path.display(), e))
        })?;
        Self::from_json(&content)
    }

    pub fn from_json(content: &str) -> Result<Self> {
        let file: ClientSecretsFile = serde_json::from_str(content)?;
        file.installed
            .or(file.web)
            .ok_or_else(|| EnricherError::auth("client secrets need an 'installed' or 'web' section"))
    }
}

/// Authorized-user credentials, same layout as the `token.json` written by
/// Google's client libraries.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthorizedUser {
    pub token: Option<String>,
    pub refresh_token: Option<String>,
    #[serde(default = "default_token_uri")]
    pub token_uri: String,
    pub client_id: String,
    pub client_secret: String,
    #[serde(default)]
    pub scopes: Vec<String>,
    pub expiry: Option<DateTime<Utc>>,
}

impl AuthorizedUser {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        std::fs::write(path, serde_json::to_string_pretty(self)?)?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let _ = std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600));
        }
        Ok(())
    }

    /// 提前一分鐘視為過期
    pub fn is_expired(&self) -> bool {
        match (&self.token, self.expiry) {
            (None, _) => true,
            (Some(_), Some(expiry)) => Utc::now() + ChronoDuration::seconds(60) >= expiry,
            (Some(_), None) => false,
        }
    }

    fn apply(&mut self, response: TokenResponse) {
        self.token = Some(response.access_token);
        self.expiry = response
            .expires_in
            .map(|secs| Utc::now() + ChronoDuration::seconds(secs));
        if response.refresh_token.is_some() {
            self.refresh_token = response.refresh_token;
        }
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: Option<i64>,
    refresh_token: Option<String>,
}

/// Hands out Sheets access tokens, refreshing and persisting them as needed.
pub struct GoogleAuthenticator {
    http: Client,
    token_path: PathBuf,
    user: Mutex<AuthorizedUser>,
}

impl GoogleAuthenticator {
    pub fn new(user: AuthorizedUser, token_path: impl Into<PathBuf>, timeout: Duration) -> Result<Self> {
        let http = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http,
            token_path: token_path.into(),
            user: Mutex::new(user),
        })
    }

    /// Uses `token_path` if it exists, otherwise runs the consent flow with
    /// `credentials_path` and saves the result to `token_path`.
    pub async fn from_files(
        credentials_path: &Path,
        token_path: &Path,
        timeout: Duration,
    ) -> Result<Self> {
        if token_path.exists() {
            tracing::info!("🔑 Using cached credentials from {}", token_path.display());
            let user = AuthorizedUser::load(token_path)?;
            return Self::new(user, token_path, timeout);
        }

        tracing::info!("🔑 No cached token, starting consent flow");
        let secrets = ClientSecrets::from_file(credentials_path)?;
        let http = Client::builder().timeout(timeout).build()?;
        let user = run_consent_flow(&http, &secrets).await?;
        user.save(token_path)?;
        tracing::info!("🔑 Saved credentials to {}", token_path.display());

        Self::new(user, token_path, timeout)
    }

    async fn refresh(&self, user: &mut AuthorizedUser) -> Result<()> {
        let refresh_token = user
            .refresh_token
            .clone()
            .ok_or_else(|| EnricherError::auth("access token expired and no refresh token is stored"))?;

        let params = [
            ("client_id", user.client_id.as_str()),
            ("client_secret", user.client_secret.as_str()),
            ("refresh_token", refresh_token.as_str()),
            ("grant_type", "refresh_token"),
        ];
        let response = request_token(&self.http, &user.token_uri, &params).await?;
        user.apply(response);

        if let Err(e) = user.save(&self.token_path) {
            tracing::warn!("Could not persist refreshed token: {}", e);
        }
        tracing::info!("🔑 Refreshed access token");
        Ok(())
    }
}

#[async_trait]
impl TokenSource for GoogleAuthenticator {
    async fn access_token(&self) -> Result<String> {
        let mut user = self.user.lock().await;
        if user.is_expired() {
            self.refresh(&mut user).await?;
        }
        user.token
            .clone()
            .ok_or_else(|| EnricherError::auth("token endpoint returned no access token"))
    }
}

/// Fixed bearer token.
#[derive(Debug, Clone)]
pub struct StaticToken(String);

impl StaticToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }
}

#[async_trait]
impl TokenSource for StaticToken {
    async fn access_token(&self) -> Result<String> {
        Ok(self.0.clone())
    }
}

async fn request_token(http: &Client, token_uri: &str, params: &[(&str, &str)]) -> Result<TokenResponse> {
    let response = http.post(token_uri).form(params).send().await?;
    let status = response.status();
    let body = response.text().await?;

    if !status.is_success() {
        return Err(EnricherError::auth(format!(
            "token request failed ({}): {}",
            status, body
        )));
    }
    Ok(serde_json::from_str(&body)?)
}

/// PKCE verifier/challenge pair plus the CSRF state for one consent attempt.
#[derive(Debug)]
pub struct PkceFlow {
    pub verifier: String,
    pub challenge: String,
    pub state: String,
}

impl PkceFlow {
    pub fn new() -> Self {
        let verifier = random_token(CODE_VERIFIER_LENGTH);
        Self {
            challenge: code_challenge(&verifier),
            verifier,
            state: random_token(16),
        }
    }
}

impl Default for PkceFlow {
    fn default() -> Self {
        Self::new()
    }
}

fn random_token(len: usize) -> String {
    let mut rng = rand::rng();
    let bytes: Vec<u8> = (0..len).map(|_| rng.random()).collect();
    URL_SAFE_NO_PAD.encode(&bytes)
}

/// S256 challenge: base64url(sha256(verifier)).
pub fn code_challenge(verifier: &str) -> String {
    URL_SAFE_NO_PAD.encode(Sha256::digest(verifier.as_bytes()))
}

pub fn authorization_url(
    secrets: &ClientSecrets,
    redirect_uri: &str,
    pkce: &PkceFlow,
) -> Result<Url> {
    let mut url = Url::parse(&secrets.auth_uri)
        .map_err(|e| EnricherError::auth(format!("invalid auth_uri: {}", e)))?;
    url.query_pairs_mut()
        .append_pair("client_id", &secrets.client_id)
        .append_pair("redirect_uri", redirect_uri)
        .append_pair("response_type", "code")
        .append_pair("scope", SHEETS_SCOPE)
        .append_pair("code_challenge", &pkce.challenge)
        .append_pair("code_challenge_method", "S256")
        .append_pair("state", &pkce.state)
        .append_pair("access_type", "offline")
        .append_pair("prompt", "consent");
    Ok(url)
}

/// Parses `GET /?state=..&code=.. HTTP/1.1` into `(code, state)`.
///
/// Returns `None` for anything that is not the OAuth redirect (favicon
/// requests, empty preconnects) so the listener can keep waiting.
pub fn parse_callback(request_line: &str) -> Option<Result<(String, String)>> {
    let mut parts = request_line.split_whitespace();
    let target = match (parts.next(), parts.next()) {
        (Some("GET"), Some(target)) => target,
        _ => return None,
    };
    let url = Url::parse(&format!("http://localhost{}", target)).ok()?;

    let mut code = None;
    let mut state = None;
    for (key, value) in url.query_pairs() {
        match key.as_ref() {
            "code" => code = Some(value.into_owned()),
            "state" => state = Some(value.into_owned()),
            "error" => {
                return Some(Err(EnricherError::auth(format!(
                    "authorization denied: {}",
                    value
                ))))
            }
            _ => {}
        }
    }

    code.map(|code| Ok((code, state.unwrap_or_default())))
}

/// Accepts connections until one carries the OAuth redirect.
pub async fn wait_for_callback(
    listener: &TcpListener,
    timeout: Duration,
) -> Result<(String, String)> {
    tokio::time::timeout(timeout, accept_callback(listener))
        .await
        .map_err(|_| EnricherError::auth("timed out waiting for the OAuth callback"))?
}

async fn accept_callback(listener: &TcpListener) -> Result<(String, String)> {
    loop {
        let (mut stream, _) = listener.accept().await?;
        let mut request_line = String::new();
        if BufReader::new(&mut stream)
            .read_line(&mut request_line)
            .await
            .is_err()
        {
            continue;
        }

        let Some(callback) = parse_callback(&request_line) else {
            tracing::debug!("Ignoring request on OAuth listener: {:?}", request_line.trim());
            let _ = stream.write_all(NOT_FOUND_PAGE.as_bytes()).await;
            let _ = stream.shutdown().await;
            continue;
        };

        let page = if callback.is_ok() { SUCCESS_PAGE } else { FAILURE_PAGE };
        let _ = stream.write_all(page.as_bytes()).await;
        let _ = stream.shutdown().await;
        return callback;
    }
}

const SUCCESS_PAGE: &str = "HTTP/1.1 200 OK\r\nContent-Type: text/html\r\n\r\n\
    <html><body><h1>Authorization complete</h1><p>You can close this window.</p></body></html>";
const FAILURE_PAGE: &str = "HTTP/1.1 400 Bad Request\r\nContent-Type: text/html\r\n\r\n\
    <html><body><h1>Authorization failed</h1><p>You can close this window.</p></body></html>";
const NOT_FOUND_PAGE: &str = "HTTP/1.1 404 Not Found\r\nContent-Length: 0\r\n\r\n";

async fn run_consent_flow(http: &Client, secrets: &ClientSecrets) -> Result<AuthorizedUser> {
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let port = listener.local_addr()?.port();
    let redirect_uri = format!("http://127.0.0.1:{}/", port);
    let pkce = PkceFlow::new();

    let auth_url = authorization_url(secrets, &redirect_uri, &pkce)?;
    tracing::info!("🌐 Opening browser for OAuth consent (listening on port {})", port);
    if let Err(e) = open::that(auth_url.as_str()) {
        tracing::warn!("Failed to open browser: {}", e);
        eprintln!("\nPlease visit this URL to authorize this application:\n\n{}\n", auth_url);
    }

    let (code, received_state) = wait_for_callback(&listener, CALLBACK_TIMEOUT).await?;
    if received_state != pkce.state {
        return Err(EnricherError::auth("OAuth state mismatch"));
    }

    let params = [
        ("client_id", secrets.client_id.as_str()),
        ("client_secret", secrets.client_secret.as_str()),
        ("code", code.as_str()),
        ("code_verifier", pkce.verifier.as_str()),
        ("grant_type", "authorization_code"),
        ("redirect_uri", redirect_uri.as_str()),
    ];
    let response = request_token(http, &secrets.token_uri, &params).await?;

    let mut user = AuthorizedUser {
        token: None,
        refresh_token: None,
        token_uri: secrets.token_uri.clone(),
        client_id: secrets.client_id.clone(),
        client_secret: secrets.client_secret.clone(),
        scopes: vec![SHEETS_SCOPE.to_string()],
        expiry: None,
    };
    user.apply(response);
    Ok(user)
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;
    use tempfile::TempDir;

    fn user_with(token_uri: String, expiry: Option<DateTime<Utc>>) -> AuthorizedUser {
        AuthorizedUser {
            token: Some("old-token".to_string()),
            refresh_token: Some("refresh-me".to_string()),
            token_uri,
            client_id: "client-id".to_string(),
            client_secret: "client-secret".to_string(),
            scopes: vec![SHEETS_SCOPE.to_string()],
            expiry,
        }
    }

    #[test]
    fn test_client_secrets_installed_and_web() {
        let installed = r#"{"installed": {"client_id": "abc", "client_secret": "shh",
            "auth_uri": "https://accounts.google.com/o/oauth2/auth",
            "token_uri": "https://oauth2.googleapis.com/token",
            "redirect_uris": ["http://localhost"]}}"#;
        let web = r#"{"web": {"client_id": "web-id", "client_secret": "web-secret"}}"#;

        let secrets = ClientSecrets::from_json(installed).unwrap();
        assert_eq!(secrets.client_id, "abc");

        let secrets = ClientSecrets::from_json(web).unwrap();
        assert_eq!(secrets.client_id, "web-id");
        assert_eq!(secrets.token_uri, DEFAULT_TOKEN_URI);

        assert!(ClientSecrets::from_json(r#"{"other": {}}"#).is_err());
    }

    #[test]
    fn test_authorized_user_from_python_token_file() {
        let content = r#"{"token": "ya29.abc", "refresh_token": "1//r", "token_uri": "https://oauth2.googleapis.com/token",
            "client_id": "id", "client_secret": "secret",
            "scopes": ["https://www.googleapis.com/auth/spreadsheets"],
            "universe_domain": "googleapis.com", "account": "", "expiry": "2030-01-01T00:00:00.123456Z"}"#;
        let user: AuthorizedUser = serde_json::from_str(content).unwrap();

        assert_eq!(user.token.as_deref(), Some("ya29.abc"));
        assert!(!user.is_expired());
    }

    #[test]
    fn test_expiry_check() {
        let expired = user_with(String::new(), Some(Utc::now() - ChronoDuration::minutes(5)));
        let nearly = user_with(String::new(), Some(Utc::now() + ChronoDuration::seconds(30)));
        let fresh = user_with(String::new(), Some(Utc::now() + ChronoDuration::hours(1)));

        assert!(expired.is_expired());
        assert!(nearly.is_expired());
        assert!(!fresh.is_expired());
    }

    #[test]
    fn test_parse_callback() {
        let (code, state) = parse_callback("GET /?state=xyz&code=4%2F0Ab&scope=s HTTP/1.1\r\n")
            .unwrap()
            .unwrap();
        assert_eq!(code, "4/0Ab");
        assert_eq!(state, "xyz");

        assert!(parse_callback("GET /?error=access_denied HTTP/1.1").unwrap().is_err());
        assert!(parse_callback("POST / HTTP/1.1").is_none());
        assert!(parse_callback("GET /favicon.ico HTTP/1.1").is_none());
        assert!(parse_callback("").is_none());
    }

    #[test]
    fn test_pkce_challenge_and_randomness() {
        // RFC 7636 appendix B
        assert_eq!(
            code_challenge("dBjftJeZ4CVP-mB92K27uhbUJU1p1r_wW1gFWFOEjXk"),
            "E9Melhoa2OwvFrEMTJguCHaoeK1t8URWbuGJSstw-cM"
        );

        let a = PkceFlow::new();
        let b = PkceFlow::new();
        assert_eq!(a.verifier.len(), 43);
        assert_eq!(a.challenge, code_challenge(&a.verifier));
        assert_ne!(a.state, b.state);
        assert_ne!(a.verifier, b.verifier);
    }

    #[test]
    fn test_authorization_url() {
        let secrets = ClientSecrets::from_json(
            r#"{"installed": {"client_id": "abc", "client_secret": "shh"}}"#,
        )
        .unwrap();
        let pkce = PkceFlow::new();
        let url = authorization_url(&secrets, "http://127.0.0.1:8765/", &pkce).unwrap();
        let pairs: Vec<(String, String)> = url.query_pairs().into_owned().collect();
        let has = |k: &str, v: &str| pairs.contains(&(k.to_string(), v.to_string()));

        assert!(url.as_str().starts_with(DEFAULT_AUTH_URI));
        assert!(has("scope", SHEETS_SCOPE));
        assert!(has("redirect_uri", "http://127.0.0.1:8765/"));
        assert!(has("access_type", "offline"));
        assert!(has("code_challenge", &pkce.challenge));
        assert!(has("code_challenge_method", "S256"));
        assert!(has("state", &pkce.state));
    }

    #[tokio::test]
    async fn test_callback_listener_skips_stray_requests() {
        use tokio::net::TcpStream;

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let browser = tokio::spawn(async move {
            // 預連線：不送任何資料就關閉
            drop(TcpStream::connect(addr).await.unwrap());

            let mut favicon = TcpStream::connect(addr).await.unwrap();
            favicon
                .write_all(b"GET /favicon.ico HTTP/1.1\r\nHost: localhost\r\n\r\n")
                .await
                .unwrap();
            let mut reply = String::new();
            BufReader::new(&mut favicon).read_line(&mut reply).await.unwrap();
            assert!(reply.starts_with("HTTP/1.1 404"));

            let mut redirect = TcpStream::connect(addr).await.unwrap();
            redirect
                .write_all(b"GET /?state=s1&code=c1 HTTP/1.1\r\nHost: localhost\r\n\r\n")
                .await
                .unwrap();
            let mut reply = String::new();
            BufReader::new(&mut redirect).read_line(&mut reply).await.unwrap();
            reply
        });

        let (code, state) = wait_for_callback(&listener, Duration::from_secs(5)).await.unwrap();
        assert_eq!(code, "c1");
        assert_eq!(state, "s1");
        assert!(browser.await.unwrap().starts_with("HTTP/1.1 200"));
    }

    #[tokio::test]
    async fn test_callback_listener_times_out() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let err = wait_for_callback(&listener, Duration::from_millis(50))
            .await
            .unwrap_err();
        assert!(matches!(err, EnricherError::AuthError { .. }));
    }

    #[tokio::test]
    async fn test_expired_token_is_refreshed_and_saved() {
        let server = MockServer::start();
        let token_mock = server.mock(|when, then| {
            when.method(POST)
                .path("/token")
                .body_contains("grant_type=refresh_token")
                .body_contains("refresh_token=refresh-me");
            then.status(200)
                .json_body(serde_json::json!({"access_token": "new-token", "expires_in": 3599, "token_type": "Bearer"}));
        });

        let dir = TempDir::new().unwrap();
        let token_path = dir.path().join("token.json");
        let user = user_with(server.url("/token"), Some(Utc::now() - ChronoDuration::minutes(1)));
        let auth = GoogleAuthenticator::new(user, &token_path, Duration::from_secs(5)).unwrap();

        assert_eq!(auth.access_token().await.unwrap(), "new-token");
        // 第二次不應再刷新
        assert_eq!(auth.access_token().await.unwrap(), "new-token");
        token_mock.assert_hits(1);

        let saved = AuthorizedUser::load(&token_path).unwrap();
        assert_eq!(saved.token.as_deref(), Some("new-token"));
        assert_eq!(saved.refresh_token.as_deref(), Some("refresh-me"));
    }

    #[tokio::test]
    async fn test_valid_cached_token_skips_refresh() {
        let server = MockServer::start();
        let token_mock = server.mock(|when, then| {
            when.method(POST).path("/token");
            then.status(200).json_body(serde_json::json!({"access_token": "unused"}));
        });

        let dir = TempDir::new().unwrap();
        let token_path = dir.path().join("token.json");
        let user = user_with(server.url("/token"), Some(Utc::now() + ChronoDuration::hours(1)));
        user.save(&token_path).unwrap();

        let auth = GoogleAuthenticator::from_files(
            &dir.path().join("credentials.json"),
            &token_path,
            Duration::from_secs(5),
        )
        .await
        .unwrap();

        assert_eq!(auth.access_token().await.unwrap(), "old-token");
        token_mock.assert_hits(0);
    }

    #[tokio::test]
    async fn test_refresh_rejection_is_auth_error() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(POST).path("/token");
            then.status(400).json_body(serde_json::json!({"error": "invalid_grant"}));
        });

        let dir = TempDir::new().unwrap();
        let user = user_with(server.url("/token"), Some(Utc::now() - ChronoDuration::minutes(1)));
        let auth = GoogleAuthenticator::new(user, dir.path().join("token.json"), Duration::from_secs(5)).unwrap();

        let err = auth.access_token().await.unwrap_err();
        assert!(matches!(err, EnricherError::AuthError { .. }));
    }
}
