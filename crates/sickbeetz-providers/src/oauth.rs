//! OAuth 2.0 authorization code flow with a loopback redirect.
//!
//! The flow is service agnostic: a [`CodeExchange`] implementation knows how to
//! build the consent URL and how to trade a code for a [`Token`]. The flow
//! itself handles the token cache, the local callback listener and the
//! hand-off of the result to the waiting caller.
//!
//! # Flow Overview
//!
//! 1. Return the cached token if the token file holds one
//! 2. Bind the callback listener and generate fresh state and PKCE values
//! 3. Print the authorization URL (and optionally open a browser)
//! 4. Serve requests until one callback carries the expected state
//! 5. Exchange the code, persist the token, deliver it to the caller
//!
//! # Security
//!
//! - The `state` value is random per attempt and checked before any exchange
//! - PKCE (S256) binds the code to this process
//! - The listener binds the loopback interface only

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use rand::Rng as _;
use sha2::{Digest, Sha256};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};
use url::Url;

use crate::error::{ProviderError, ProviderResult};
use crate::provider::BoxFuture;
use crate::tokens::{Token, TokenStore};

/// The PKCE code verifier length (in bytes, before base64 encoding).
const CODE_VERIFIER_LENGTH: usize = 32;

/// The state value length (in bytes, before base64 encoding).
const STATE_LENGTH: usize = 16;

/// Upper bound on the bytes read from one callback request.
const MAX_REQUEST_BYTES: u64 = 8192;

/// How long a callback connection may stay silent before it is dropped.
const REQUEST_READ_TIMEOUT: Duration = Duration::from_secs(10);

/// Service-specific half of the authorization flow.
pub trait CodeExchange: Send + Sync + 'static {
    /// Builds the consent page URL the user has to visit.
    fn authorization_url(&self, redirect_uri: &str, state: &str, challenge: &str) -> String;

    /// Trades an authorization code for a token.
    fn exchange_code<'a>(
        &'a self,
        code: &'a str,
        verifier: &'a str,
        redirect_uri: &'a str,
    ) -> BoxFuture<'a, ProviderResult<Token>>;
}

/// Where the callback listener binds and how the redirect URI is spelled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthorizationConfig {
    /// Interface the listener binds to.
    pub bind_host: String,
    /// Listener port; 0 picks a free one.
    pub port: u16,
    /// Host name used in the redirect URI registered with the service.
    pub redirect_host: String,
    /// Path the service redirects to.
    pub callback_path: String,
    /// Whether to try opening the URL in a browser.
    pub open_browser: bool,
}

impl Default for AuthorizationConfig {
    fn default() -> Self {
        Self {
            bind_host: "127.0.0.1".to_string(),
            port: 8080,
            redirect_host: "localhost".to_string(),
            callback_path: "/callback".to_string(),
            open_browser: true,
        }
    }
}

impl AuthorizationConfig {
    /// Builder method to set the listener port.
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Builder method to set the redirect host name.
    pub fn with_redirect_host(mut self, host: impl Into<String>) -> Self {
        self.redirect_host = host.into();
        self
    }

    /// Builder method to enable or disable opening a browser.
    pub fn with_open_browser(mut self, open: bool) -> Self {
        self.open_browser = open;
        self
    }

    fn redirect_uri(&self, port: u16) -> String {
        format!("http://{}:{}{}", self.redirect_host, port, self.callback_path)
    }
}

/// Obtains a token from the cache or through the interactive flow.
pub struct AuthorizationFlow<E> {
    exchange: Arc<E>,
    store: TokenStore,
    config: AuthorizationConfig,
}

impl<E: CodeExchange> AuthorizationFlow<E> {
    /// Creates a new flow.
    pub fn new(exchange: E, store: TokenStore, config: AuthorizationConfig) -> Self {
        Self {
            exchange: Arc::new(exchange),
            store,
            config,
        }
    }

    /// Returns a usable token, running the interactive flow only when the
    /// token file holds none.
    ///
    /// # Errors
    ///
    /// Every error is terminal for the attempt: binding failures, state
    /// mismatches, denied consent, failed exchanges and failed writes.
    pub async fn authorize(&self) -> ProviderResult<Token> {
        if let Some(token) = self.cached_token() {
            return Ok(token);
        }

        let pending = self.start().await?;
        self.present(&pending);
        pending.wait().await
    }

    /// Reads the token file.
    ///
    /// An unreadable or corrupt file counts as no token.
    pub fn cached_token(&self) -> Option<Token> {
        match self.store.load() {
            Ok(Some(token)) if token.looks_valid() => {
                info!(path = %self.store.path().display(), "using cached token");
                Some(token)
            }
            Ok(Some(_)) => {
                warn!(path = %self.store.path().display(), "cached token is empty, re-authorizing");
                None
            }
            Ok(None) => None,
            Err(e) => {
                warn!(error = %e, "ignoring unreadable token file, re-authorizing");
                None
            }
        }
    }

    /// Binds the callback listener and starts serving it.
    ///
    /// The returned [`PendingAuthorization`] resolves once a callback has been
    /// handled. Dropping it stops the listener.
    pub async fn start(&self) -> ProviderResult<PendingAuthorization> {
        let listener = TcpListener::bind((self.config.bind_host.as_str(), self.config.port))
            .await
            .map_err(|e| {
                ProviderError::configuration(format!(
                    "failed to bind callback listener on {}:{}: {}",
                    self.config.bind_host, self.config.port, e
                ))
                .with_source(e)
            })?;
        let port = listener
            .local_addr()
            .map_err(|e| ProviderError::internal(format!("listener has no address: {}", e)))?
            .port();

        let pkce = PkceFlow::new();
        let redirect_uri = self.config.redirect_uri(port);
        let auth_url = self
            .exchange
            .authorization_url(&redirect_uri, &pkce.state, &pkce.challenge);

        debug!(port, redirect_uri = %redirect_uri, "callback listener bound");

        let (tx, rx) = oneshot::channel();
        let callback = CallbackHandler {
            exchange: Arc::clone(&self.exchange),
            store: self.store.clone(),
            state: pkce.state.clone(),
            verifier: pkce.verifier,
            redirect_uri: redirect_uri.clone(),
            callback_path: self.config.callback_path.clone(),
        };
        tokio::spawn(serve_callbacks(listener, callback, tx));

        Ok(PendingAuthorization {
            auth_url,
            redirect_uri,
            state: pkce.state,
            port,
            rx,
        })
    }

    fn present(&self, pending: &PendingAuthorization) {
        info!(
            url = %pending.auth_url,
            redirect_uri = %pending.redirect_uri(),
            "waiting for authorization"
        );
        eprintln!(
            "\nPlease authorize access by visiting the following page in your browser:\n\n{}\n",
            pending.auth_url
        );

        if self.config.open_browser
            && let Err(e) = open::that(&pending.auth_url)
        {
            warn!(error = %e, "failed to open browser");
        }
    }
}

/// An interactive authorization that is waiting for its callback.
#[derive(Debug)]
pub struct PendingAuthorization {
    auth_url: String,
    redirect_uri: String,
    state: String,
    port: u16,
    rx: oneshot::Receiver<ProviderResult<Token>>,
}

impl PendingAuthorization {
    /// The URL the user has to visit.
    pub fn auth_url(&self) -> &str {
        &self.auth_url
    }

    /// The redirect URI sent to the service.
    pub fn redirect_uri(&self) -> &str {
        &self.redirect_uri
    }

    /// The state value the callback must echo.
    pub fn state(&self) -> &str {
        &self.state
    }

    /// The port the listener is bound to.
    pub fn port(&self) -> u16 {
        self.port
    }

    /// Waits for the callback outcome. There is no timeout.
    pub async fn wait(self) -> ProviderResult<Token> {
        self.rx
            .await
            .map_err(|_| ProviderError::internal("callback listener stopped without a result"))?
    }
}

struct CallbackHandler<E> {
    exchange: Arc<E>,
    store: TokenStore,
    state: String,
    verifier: String,
    redirect_uri: String,
    callback_path: String,
}

/// A response to write back plus, for callbacks, the outcome to deliver.
struct Handled {
    status: u16,
    reason: &'static str,
    body: &'static str,
    outcome: Option<ProviderResult<Token>>,
}

impl Handled {
    fn ignored() -> Self {
        Self {
            status: 200,
            reason: "OK",
            body: "",
            outcome: None,
        }
    }

    fn deliver(
        status: u16,
        reason: &'static str,
        body: &'static str,
        outcome: ProviderResult<Token>,
    ) -> Self {
        Self {
            status,
            reason,
            body,
            outcome: Some(outcome),
        }
    }
}

async fn serve_callbacks<E: CodeExchange>(
    listener: TcpListener,
    handler: CallbackHandler<E>,
    mut tx: oneshot::Sender<ProviderResult<Token>>,
) {
    let handler = Arc::new(handler);
    let (outcome_tx, mut outcome_rx) = mpsc::channel(1);

    let outcome = loop {
        tokio::select! {
            _ = tx.closed() => {
                debug!("authorization abandoned, closing callback listener");
                return;
            }
            Some(outcome) = outcome_rx.recv() => break outcome,
            accepted = listener.accept() => match accepted {
                Ok((stream, _)) => {
                    let handler = Arc::clone(&handler);
                    let outcome_tx = outcome_tx.clone();
                    tokio::spawn(async move {
                        if let Some(outcome) = handler.handle_connection(stream).await {
                            let _ = outcome_tx.send(outcome).await;
                        }
                    });
                }
                Err(e) => warn!(error = %e, "failed to accept callback connection"),
            },
        }
    };

    let _ = tx.send(outcome);
    debug!("callback handled, closing callback listener");
}

impl<E: CodeExchange> CallbackHandler<E> {
    async fn handle_connection(&self, stream: TcpStream) -> Option<ProviderResult<Token>> {
        let mut reader = BufReader::new(stream.take(MAX_REQUEST_BYTES));

        let target =
            match tokio::time::timeout(REQUEST_READ_TIMEOUT, read_request_target(&mut reader)).await
            {
                Ok(Ok(Some(target))) => target,
                Ok(Ok(None)) => {
                    let _ = write_response(reader.get_mut().get_mut(), 400, "Bad Request", "").await;
                    return None;
                }
                Ok(Err(e)) => {
                    debug!(error = %e, "failed to read callback request");
                    return None;
                }
                Err(_) => {
                    debug!("callback connection idle, dropping it");
                    return None;
                }
            };

        let handled = self.route(&target).await;
        let written = write_response(
            reader.get_mut().get_mut(),
            handled.status,
            handled.reason,
            handled.body,
        )
        .await;
        if let Err(e) = written {
            debug!(error = %e, "failed to write callback response");
        }
        handled.outcome
    }

    async fn route(&self, target: &str) -> Handled {
        let Some(url) = Url::parse("http://localhost")
            .ok()
            .and_then(|base| base.join(target).ok())
        else {
            info!(request = %target, "Got request for");
            return Handled::ignored();
        };

        if url.path() != self.callback_path {
            info!(path = url.path(), "Got request for");
            return Handled::ignored();
        }

        let params: HashMap<String, String> = url.query_pairs().into_owned().collect();
        self.handle_callback(&params).await
    }

    async fn handle_callback(&self, params: &HashMap<String, String>) -> Handled {
        let received = params.get("state").map(String::as_str);
        if received != Some(self.state.as_str()) {
            warn!(received = received.unwrap_or(""), "authorization state mismatch");
            return Handled::deliver(
                403,
                "Forbidden",
                "State mismatch",
                Err(ProviderError::state_mismatch(&self.state, received)),
            );
        }

        if let Some(error) = params.get("error") {
            warn!(error = %error, "authorization denied");
            return Handled::deliver(
                400,
                "Bad Request",
                "Authorization denied",
                Err(ProviderError::authentication(format!(
                    "authorization denied: {}",
                    error
                ))),
            );
        }

        let Some(code) = params.get("code").filter(|c| !c.is_empty()) else {
            return Handled::deliver(
                400,
                "Bad Request",
                "Missing authorization code",
                Err(ProviderError::authentication(
                    "missing authorization code in callback",
                )),
            );
        };

        info!("received authorization code, exchanging for token");
        let token = match self
            .exchange
            .exchange_code(code, &self.verifier, &self.redirect_uri)
            .await
        {
            Ok(token) => token,
            Err(e) => {
                warn!(error = %e, "token exchange failed");
                return Handled::deliver(403, "Forbidden", "Couldn't get token", Err(e));
            }
        };

        if let Err(e) = self.store.save(&token) {
            warn!(error = %e, "failed to persist token");
            return Handled::deliver(500, "Internal Server Error", "Couldn't save token", Err(e));
        }

        info!(path = %self.store.path().display(), "authorization completed");
        Handled::deliver(200, "OK", "Login Completed!", Ok(token))
    }
}

/// Reads the request line and drains the headers.
///
/// The caller bounds how many bytes the reader yields. Returns the request target of a `GET`, or `None` for anything else.
async fn read_request_target<R: AsyncBufRead + Unpin>(
    reader: &mut R,
) -> std::io::Result<Option<String>> {
    let mut request_line = String::new();
    if reader.read_line(&mut request_line).await? == 0 {
        return Ok(None);
    }
    if !request_line.ends_with('\n') {
        // Cut off by the size limit.
        return Ok(None);
    }

    let mut header = String::new();
    loop {
        header.clear();
        let n = reader.read_line(&mut header).await?;
        if n == 0 || header == "\r\n" || header == "\n" {
            break;
        }
    }

    // GET /callback?code=...&state=... HTTP/1.1
    let mut parts = request_line.split_whitespace();
    match (parts.next(), parts.next()) {
        (Some("GET"), Some(target)) => Ok(Some(target.to_string())),
        _ => Ok(None),
    }
}

async fn write_response(
    stream: &mut TcpStream,
    status: u16,
    reason: &str,
    body: &str,
) -> std::io::Result<()> {
    let response = format!(
        "HTTP/1.1 {} {}\r\nContent-Type: text/plain; charset=utf-8\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
        status,
        reason,
        body.len(),
        body
    );
    stream.write_all(response.as_bytes()).await?;
    stream.flush().await?;
    stream.shutdown().await
}

/// PKCE flow state and utilities.
///
/// Implements RFC 7636 (Proof Key for Code Exchange) plus the CSRF state value.
#[derive(Debug)]
pub struct PkceFlow {
    /// The code verifier (high-entropy random string).
    pub verifier: String,
    /// The code challenge (SHA-256 hash of verifier, base64url encoded).
    pub challenge: String,
    /// Random state for CSRF protection.
    pub state: String,
}

impl PkceFlow {
    /// Creates a new PKCE flow with random verifier and state.
    pub fn new() -> Self {
        let verifier = random_token(CODE_VERIFIER_LENGTH);
        let challenge = Self::compute_challenge(&verifier);
        let state = random_token(STATE_LENGTH);

        Self {
            verifier,
            challenge,
            state,
        }
    }

    /// Computes the SHA-256 challenge for a code verifier.
    pub fn compute_challenge(verifier: &str) -> String {
        let digest = Sha256::digest(verifier.as_bytes());
        URL_SAFE_NO_PAD.encode(digest)
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
