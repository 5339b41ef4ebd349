//! Authenticated HTTP client for the Hack The Box v4 API.
//!
//! `HtbClient` wraps a `reqwest::Client` and the session's [`AuthState`]
//! behind a `Mutex`. It is the sole path to the network: the finder
//! functions and [`LazyResource`](crate::resource::LazyResource) loads all
//! go through [`get`](HtbClient::get) / [`post`](HtbClient::post) here.
//!
//! Session lifecycle:
//! - [`login`](HtbClient::login) installs the access/refresh token pair and
//!   reports whether a one-time password is still outstanding.
//! - [`submit_two_factor`](HtbClient::submit_two_factor) completes the 2FA
//!   leg; codes are dispatched by length (6 = OTP, 20 = backup code).
//! - [`refresh_session`](HtbClient::refresh_session) rotates the token
//!   pair. The held refresh token is taken *before* the network call, so a
//!   failed refresh can never be replayed with a stale token.
//! - [`logout`](HtbClient::logout) invalidates the session server-side and
//!   clears local state whether or not the server call succeeded.
//!
//! One-shot 401 retry: when a request comes back `401 Unauthorized` and a
//! refresh token is held, the client refreshes once and resends the same
//! request exactly once, rebuilt from the values on the call stack. A
//! second 401 (or any other error on the resend) propagates to the caller.
//! The retry is only idempotent-safe for the GET/POST patterns this API
//! uses; there is no idempotency-key scheme. Auth endpoints (`/login`,
//! `/login/refresh`, `/2fa/*`) bypass the retry entirely: a time-based
//! code must not be resent, and the refresh path cannot recurse because
//! the refresh token is taken up front.

use std::sync::Arc;
use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderValue, ACCEPT};
use reqwest::{Client, Method, StatusCode};
use serde::Deserialize;
use serde_json::{json, Value};
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::auth::{AuthState, TokenStore};
use crate::error::{json_to_message, HtbError, Result};

const BASE_URL: &str = "https://www.hackthebox.eu/api/v4";

const LOGIN_ENDPOINT: &str = "/login";
const REFRESH_ENDPOINT: &str = "/login/refresh";
const OTP_ENDPOINT: &str = "/2fa/login";
const BACKUP_CODE_ENDPOINT: &str = "/2fa/login/bypass";
const LOGOUT_ENDPOINT: &str = "/logout";

/// User-Agent sent with every request.
const USER_AGENT: &str = concat!("htb-api/", env!("CARGO_PKG_VERSION"));

/// Connect timeout for the API HTTP client. Covers TCP + TLS handshake.
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Overall request timeout, including response body download. API payloads
/// are small JSON documents; thirty seconds is generous.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Builds the underlying `reqwest::Client` with explicit timeouts and the
/// default headers the API expects.
fn build_http_client() -> Client {
    let mut headers = HeaderMap::new();
    headers.insert(
        ACCEPT,
        HeaderValue::from_static("application/json, text/plain, */*"),
    );
    Client::builder()
        .user_agent(USER_AGENT)
        .default_headers(headers)
        .connect_timeout(CONNECT_TIMEOUT)
        .timeout(REQUEST_TIMEOUT)
        .build()
        .expect("failed to build HTTP client for the HTB API")
}

/// The state a login or refresh left the session in.
///
/// A pending second factor is an expected state, not an error: callers
/// branch on the returned variant and submit a code when asked to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoginOutcome {
    /// Tokens are installed and no second factor is outstanding.
    Authenticated,
    /// Tokens are installed but a one-time password (or backup code) must
    /// be submitted via
    /// [`submit_two_factor`](HtbClient::submit_two_factor) before other
    /// endpoints will accept the session.
    TwoFactorRequired,
}

/// Envelope the auth endpoints wrap their payload in.
#[derive(Deserialize)]
struct AuthEnvelope {
    message: TokenGrant,
}

/// Token pair (and 2FA flag) returned by `/login` and `/login/refresh`.
/// The refresh response does not always repeat the 2FA flag, hence the
/// `Option`.
#[derive(Deserialize)]
struct TokenGrant {
    access_token: String,
    refresh_token: String,
    #[serde(rename = "is2FAEnabled")]
    is_two_factor_enabled: Option<bool>,
}

/// A fully read HTTP response: status line plus body text.
///
/// The body is read eagerly so error reporting can quote it even when the
/// status already condemned the request.
#[derive(Debug)]
struct RawResponse {
    status: StatusCode,
    body: String,
}

/// Authenticated session for the HTB REST API.
///
/// Design notes:
/// - `state` is behind a `tokio::sync::Mutex`: token reads lock briefly,
///   and a refresh holds the lock across its own round-trip so concurrent
///   401s serialize and the single-use refresh token is taken exactly
///   once. The lock is never held across an ordinary API round-trip.
/// - `base_url` is a `String` rather than the constant so tests can point
///   the client at a wiremock server.
pub struct HtbClient {
    http: Client,
    base_url: String,
    state: Mutex<AuthState>,
}

impl HtbClient {
    /// Creates a client against the production API.
    ///
    /// Pass a [`TokenStore`] to mirror tokens to persistent storage and to
    /// pick up a previously stored session; pass `None` for a purely
    /// in-memory session.
    pub fn new(store: Option<Arc<dyn TokenStore>>) -> Self {
        Self::with_base_url(BASE_URL, store)
    }

    /// Creates a client against a custom base URL, used by tests to point
    /// at a local mock server instead of the real API.
    pub fn with_base_url(base_url: &str, store: Option<Arc<dyn TokenStore>>) -> Self {
        HtbClient {
            http: build_http_client(),
            base_url: base_url.trim_end_matches('/').to_string(),
            state: Mutex::new(AuthState::new(store)),
        }
    }

    /// True when an access token is held (in memory or in the store) and
    /// no one-time password is outstanding.
    pub async fn is_authenticated(&self) -> bool {
        self.state.lock().await.is_authenticated()
    }

    /// True when the account has 2FA enabled and the current token has
    /// not yet cleared it.
    pub async fn needs_otp(&self) -> bool {
        self.state.lock().await.needs_otp()
    }

    /// The current access token, for callers managing persistence
    /// themselves.
    pub async fn access_token(&self) -> Option<String> {
        self.state.lock().await.access_token().map(str::to_owned)
    }

    /// The current refresh token, for callers managing persistence
    /// themselves.
    pub async fn refresh_token(&self) -> Option<String> {
        self.state.lock().await.refresh_token().map(str::to_owned)
    }

    /// Installs a token pair exported from a previous session.
    ///
    /// No network call is made. The restored token is assumed to have
    /// cleared 2FA when it was minted, so no OTP is reported outstanding;
    /// if the server disagrees it will answer 401 and the normal
    /// refresh-and-retry path takes over.
    pub async fn restore_session(&self, access: &str, refresh: &str) {
        let mut state = self.state.lock().await;
        state.install_tokens(access.to_owned(), refresh.to_owned());
        state.set_two_factor_required(false);
        state.set_two_factor_satisfied(false);
        debug!("restored session from exported tokens");
    }

    /// Logs in with email and password.
    ///
    /// On success the returned access/refresh pair is installed (and
    /// mirrored to the store, if any) regardless of the 2FA state, so a
    /// caller that receives [`LoginOutcome::TwoFactorRequired`] can submit
    /// a code without logging in again.
    ///
    /// # Errors
    ///
    /// - `RequestFailed` — credentials rejected or transport failure.
    /// - `RemoteError` — 2xx response carrying an `error` body.
    /// - `Parse` — the success body did not match the auth envelope.
    pub async fn login(&self, email: &str, password: &str) -> Result<LoginOutcome> {
        let body = json!({
            "email": email,
            "password": password,
            "remember": true,
        });
        let raw = self
            .dispatch(Method::POST, LOGIN_ENDPOINT, Some(&body), None)
            .await?;
        let raw = Self::check(raw)?;
        let grant: AuthEnvelope = serde_json::from_str(&raw.body)?;
        let grant = grant.message;

        let mut state = self.state.lock().await;
        state.install_tokens(grant.access_token, grant.refresh_token);
        state.set_two_factor_required(grant.is_two_factor_enabled.unwrap_or(false));
        state.set_two_factor_satisfied(false);
        if state.needs_otp() {
            debug!("login accepted; a one-time password is outstanding");
            Ok(LoginOutcome::TwoFactorRequired)
        } else {
            debug!("login complete");
            Ok(LoginOutcome::Authenticated)
        }
    }

    /// Submits a two-factor code for the current session.
    ///
    /// The code is interpreted by length: exactly 6 characters is posted
    /// to the OTP endpoint, exactly 20 characters to the backup-code
    /// endpoint. Any other length fails with
    /// [`InvalidCode`](HtbError::InvalidCode) before any network call.
    /// On HTTP success the session is marked 2FA-satisfied; tokens are
    /// not touched. This path never auto-retries: a time-based code is
    /// single-use.
    ///
    /// # Errors
    ///
    /// - `InvalidCode` — unusable code length, nothing was sent.
    /// - `RequestFailed` — the server rejected the code.
    pub async fn submit_two_factor(&self, code: &str) -> Result<()> {
        let (endpoint, body) = match code.chars().count() {
            6 => (OTP_ENDPOINT, json!({ "one_time_password": code })),
            20 => (BACKUP_CODE_ENDPOINT, json!({ "backup_code": code })),
            _ => return Err(HtbError::InvalidCode),
        };
        let raw = self.dispatch(Method::POST, endpoint, Some(&body), None).await?;
        Self::check(raw)?;
        self.state.lock().await.set_two_factor_satisfied(true);
        debug!("two-factor challenge satisfied");
        Ok(())
    }

    /// Rotates the session's token pair using the held refresh token.
    ///
    /// The refresh token is taken out of the session (memory and store)
    /// *before* the network call; a failed refresh therefore leaves the
    /// session without a usable refresh token rather than inviting a
    /// replay of the stale one. The rotated access token keeps its 2FA
    /// standing; the outcome reports `TwoFactorRequired` only when the
    /// session still needs an OTP.
    ///
    /// # Errors
    ///
    /// - `RequestFailed{401}` — no refresh token held (no network call).
    /// - `RequestFailed` / `RemoteError` / `Parse` — the refresh call
    ///   itself failed.
    pub async fn refresh_session(&self) -> Result<LoginOutcome> {
        let mut state = self.state.lock().await;
        self.refresh_locked(&mut state).await
    }

    /// Logs the session out.
    ///
    /// POSTs `/logout`, then clears tokens and 2FA flags unconditionally:
    /// local credentials are dropped even when the server call failed,
    /// and the failure is still returned to the caller afterwards.
    pub async fn logout(&self) -> Result<()> {
        let result = self
            .request(Method::POST, LOGOUT_ENDPOINT, None, None)
            .await;
        self.state.lock().await.clear();
        result.map(|_| ())
    }

    /// Logs in and, when 2FA is pending and a code was supplied, submits
    /// it in the same call.
    ///
    /// Returns [`LoginOutcome::TwoFactorRequired`] only when 2FA is
    /// pending and no code was given; the caller then prompts for one and
    /// calls [`submit_two_factor`](HtbClient::submit_two_factor).
    pub async fn authenticate(
        &self,
        email: &str,
        password: &str,
        otp: Option<&str>,
    ) -> Result<LoginOutcome> {
        match self.login(email, password).await? {
            LoginOutcome::Authenticated => Ok(LoginOutcome::Authenticated),
            LoginOutcome::TwoFactorRequired => match otp {
                Some(code) => {
                    self.submit_two_factor(code).await?;
                    Ok(LoginOutcome::Authenticated)
                }
                None => Ok(LoginOutcome::TwoFactorRequired),
            },
        }
    }

    /// Issues a GET request and returns the parsed JSON body.
    ///
    /// Goes through the one-shot 401 retry described in the module docs.
    ///
    /// # Errors
    ///
    /// - `RequestFailed` — HTTP error status or transport failure.
    /// - `RemoteError` — 2xx body carrying an `error` key.
    /// - `FurtherAuthRequired` — a mid-request refresh succeeded but the
    ///   session still needs an OTP.
    /// - `Parse` — the body was not valid JSON.
    pub async fn get(&self, endpoint: &str) -> Result<Value> {
        let raw = self.request(Method::GET, endpoint, None, None).await?;
        Self::parse_body(&raw)
    }

    /// Issues a GET request with query parameters and returns the parsed
    /// JSON body. Same retry and error behavior as [`get`](HtbClient::get).
    pub async fn get_with_query(
        &self,
        endpoint: &str,
        query: &[(&str, &str)],
    ) -> Result<Value> {
        let raw = self
            .request(Method::GET, endpoint, None, Some(query))
            .await?;
        Self::parse_body(&raw)
    }

    /// Issues a POST request with an optional JSON body and returns the
    /// parsed JSON response. Endpoints that answer with an empty body
    /// yield `Value::Null`. Same retry and error behavior as
    /// [`get`](HtbClient::get).
    pub async fn post(&self, endpoint: &str, body: Option<&Value>) -> Result<Value> {
        let raw = self.request(Method::POST, endpoint, body, None).await?;
        Self::parse_body(&raw)
    }

    /// Core request path with the one-shot refresh-and-retry protocol.
    ///
    /// The request is rebuilt from the arguments for the retry, so a retry
    /// can only ever resend its own call, never another call's request.
    async fn request(
        &self,
        method: Method,
        endpoint: &str,
        body: Option<&Value>,
        query: Option<&[(&str, &str)]>,
    ) -> Result<RawResponse> {
        let first = self
            .dispatch(method.clone(), endpoint, body, query)
            .await?;

        if first.status == StatusCode::UNAUTHORIZED {
            if let Some(outcome) = self.try_refresh(endpoint).await? {
                if outcome == LoginOutcome::TwoFactorRequired {
                    return Err(HtbError::FurtherAuthRequired);
                }
                let second = self.dispatch(method, endpoint, body, query).await?;
                return Self::check(second);
            }
        }
        Self::check(first)
    }

    /// Refreshes the session in response to a 401, if a refresh token is
    /// held. Returns `None` when there is nothing to refresh with, in
    /// which case the caller reports the original 401.
    ///
    /// The state lock is held across the refresh round-trip so concurrent
    /// 401s serialize; whichever call locks first consumes the refresh
    /// token, and the rest find fresh tokens already installed or no
    /// token at all.
    async fn try_refresh(&self, endpoint: &str) -> Result<Option<LoginOutcome>> {
        let mut state = self.state.lock().await;
        if state.refresh_token().is_none() {
            return Ok(None);
        }
        warn!(endpoint, "request was rejected with 401; refreshing session and retrying once");
        let outcome = self.refresh_locked(&mut state).await?;
        Ok(Some(outcome))
    }

    /// Rotates tokens with the auth state already locked. Must not touch
    /// `self.state` (the caller holds the guard).
    async fn refresh_locked(&self, state: &mut AuthState) -> Result<LoginOutcome> {
        let Some(refresh) = state.take_refresh_token() else {
            return Err(HtbError::RequestFailed {
                code: 401,
                message: "no refresh token held".to_string(),
            });
        };
        debug!("rotating session tokens");
        let bearer = state.access_token().map(str::to_owned);
        let body = json!({ "refresh_token": refresh });
        let raw = self
            .dispatch_with_bearer(
                Method::POST,
                REFRESH_ENDPOINT,
                bearer.as_deref(),
                Some(&body),
                None,
            )
            .await?;
        let raw = Self::check(raw)?;
        let grant: AuthEnvelope = serde_json::from_str(&raw.body)?;
        let grant = grant.message;

        state.install_tokens(grant.access_token, grant.refresh_token);
        if let Some(required) = grant.is_two_factor_enabled {
            state.set_two_factor_required(required);
        }
        if state.needs_otp() {
            Ok(LoginOutcome::TwoFactorRequired)
        } else {
            Ok(LoginOutcome::Authenticated)
        }
    }

    /// Sends one request with the session's current bearer token.
    async fn dispatch(
        &self,
        method: Method,
        endpoint: &str,
        body: Option<&Value>,
        query: Option<&[(&str, &str)]>,
    ) -> Result<RawResponse> {
        let bearer = self.state.lock().await.access_token().map(str::to_owned);
        self.dispatch_with_bearer(method, endpoint, bearer.as_deref(), body, query)
            .await
    }

    /// Sends one request with an explicit bearer token (or none), reading
    /// the body eagerly. Transport failures become the uniform code-0
    /// error; status handling is the caller's job.
    async fn dispatch_with_bearer(
        &self,
        method: Method,
        endpoint: &str,
        bearer: Option<&str>,
        body: Option<&Value>,
        query: Option<&[(&str, &str)]>,
    ) -> Result<RawResponse> {
        let url = self.url(endpoint);
        debug!(%method, endpoint, "dispatching API request");

        let mut req = self.http.request(method, &url);
        if let Some(token) = bearer {
            req = req.bearer_auth(token);
        }
        if let Some(payload) = body {
            req = req.json(payload);
        }
        if let Some(pairs) = query {
            req = req.query(pairs);
        }

        let resp = req.send().await.map_err(HtbError::transport)?;
        let status = resp.status();
        let body = resp.text().await.map_err(HtbError::transport)?;
        Ok(RawResponse { status, body })
    }

    /// Resolves an endpoint to a full URL, tolerating a missing leading
    /// slash.
    fn url(&self, endpoint: &str) -> String {
        if endpoint.starts_with('/') {
            format!("{}{}", self.base_url, endpoint)
        } else {
            format!("{}/{}", self.base_url, endpoint)
        }
    }

    /// Screens a response: error statuses become `RequestFailed` with the
    /// best-effort extracted message, and a nominally successful response
    /// whose JSON body carries an `error` key becomes `RemoteError`.
    /// Non-JSON success bodies pass through untouched.
    fn check(raw: RawResponse) -> Result<RawResponse> {
        if raw.status.as_u16() >= 400 {
            return Err(HtbError::request_failed(raw.status.as_u16(), &raw.body));
        }
        if let Ok(value) = serde_json::from_str::<Value>(&raw.body) {
            if let Some(err) = value.get("error") {
                return Err(HtbError::RemoteError {
                    message: json_to_message(err),
                });
            }
        }
        Ok(raw)
    }

    /// Parses a screened body as JSON; an empty body becomes `Null`.
    fn parse_body(raw: &RawResponse) -> Result<Value> {
        if raw.body.trim().is_empty() {
            return Ok(Value::Null);
        }
        Ok(serde_json::from_str(&raw.body)?)
    }
}
