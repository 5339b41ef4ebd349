//! Typed error hierarchy for the htb-api crate.
//!
//! Every failure a caller can observe is a variant of [`HtbError`]. The
//! variants map to the system's real boundaries:
//!
//! - `FurtherAuthRequired` / `InvalidCode` cover the two-factor leg of the
//!   authentication state machine.
//! - `RequestFailed` covers HTTP error statuses and transport failures.
//!   A transport failure (DNS, TCP, TLS, no response at all) is reported
//!   with `code == 0` so callers see one uniform shape for "the request
//!   did not succeed", whether or not a status line ever arrived.
//! - `RemoteError` covers the API's habit of returning 2xx responses whose
//!   JSON body nonetheless carries an `error` key.
//! - `ObjectLoadFailed` / `AttributeNotFound` cover the lazy resource
//!   model. `AttributeNotFound` keeps a swallowed load error reachable via
//!   `source()` (thiserror derives the chain from the `#[source]` field).

use crate::resource::ResourceKind;

/// Fixed fallback used when an error response body cannot be interpreted.
const UNPARSEABLE_BODY: &str = "could not parse error message";

/// Unified error type for all htb-api operations.
#[derive(Debug, thiserror::Error)]
pub enum HtbError {
    /// Two-factor authentication is enabled for the account and has not
    /// been satisfied for the current access token.
    ///
    /// Surfaced by [`refresh_session`](crate::client::HtbClient::refresh_session)
    /// and by the automatic retry path when a refreshed session still
    /// needs an OTP. A pending-2FA *login* is not an error; see
    /// [`LoginOutcome`](crate::client::LoginOutcome).
    #[error("two-factor authentication must be completed before continuing")]
    FurtherAuthRequired,

    /// The submitted 2FA code has an unusable length.
    ///
    /// Codes are interpreted by length alone: 6 characters for a
    /// time-based one-time password, 20 for a backup code. Anything else
    /// fails immediately, before any network call is made.
    #[error("invalid two-factor code: expected a 6-digit one-time password or a 20-character backup code")]
    InvalidCode,

    /// The request failed with an HTTP error status, or never produced a
    /// response at all.
    ///
    /// `code` is the HTTP status for server-reported failures and `0` for
    /// transport-level failures. `message` is extracted best-effort from
    /// the response body: the `error` field, else the `message` field,
    /// else a fixed fallback.
    #[error("request failed ({code}): {message}")]
    RequestFailed {
        /// HTTP status code, or 0 when no response was received.
        code: u16,
        /// Best-effort human-readable description of the failure.
        message: String,
    },

    /// The transport reported success but the JSON body carried an
    /// `error` key.
    #[error("API reported an error: {message}")]
    RemoteError {
        /// The value of the body's `error` field.
        message: String,
    },

    /// A [`LazyResource`](crate::resource::LazyResource) detail load
    /// could not be carried out.
    ///
    /// Either the fetch could not be issued (the kind defines no detail
    /// endpoint, as with teams, or the record id needed for the URL is
    /// unset), or the response arrived without the expected payload under
    /// the kind's envelope key.
    #[error("cannot load {kind}: {reason}")]
    ObjectLoadFailed {
        /// The kind of resource whose load was refused.
        kind: ResourceKind,
        /// Why the load failed.
        reason: String,
    },

    /// A field was absent from a resource even after the best-effort
    /// detail fetch.
    ///
    /// When the miss triggered a load and that load itself failed, the
    /// load error is attached as `source` rather than replacing this
    /// error; the degradation is intentional so that lazy field access
    /// reports "no such field" uniformly.
    #[error("no field `{field}` on {kind}")]
    AttributeNotFound {
        /// The kind of resource that was queried.
        kind: ResourceKind,
        /// The field that could not be resolved.
        field: String,
        /// The load failure that preceded the miss, if any.
        #[source]
        source: Option<Box<HtbError>>,
    },

    /// JSON deserialization failed on a success-path response body.
    #[error("failed to parse response: {0}")]
    Parse(#[from] serde_json::Error),
}

impl HtbError {
    /// Builds the uniform code-0 error for a request that produced no
    /// response (DNS, connect, TLS, or read failure).
    pub(crate) fn transport(err: reqwest::Error) -> Self {
        HtbError::RequestFailed {
            code: 0,
            message: err.to_string(),
        }
    }

    /// Builds a `RequestFailed` from an HTTP error status and raw body.
    ///
    /// Message extraction order matches the API's error envelope: the
    /// `error` field wins, then `message`, then a fixed fallback when the
    /// body is not JSON or carries neither key. Non-string values are
    /// rendered as compact JSON.
    pub(crate) fn request_failed(code: u16, body: &str) -> Self {
        let message = serde_json::from_str::<serde_json::Value>(body)
            .ok()
            .and_then(|v| {
                v.get("error")
                    .or_else(|| v.get("message"))
                    .map(json_to_message)
            })
            .unwrap_or_else(|| UNPARSEABLE_BODY.to_string());
        HtbError::RequestFailed { code, message }
    }
}

/// Renders a JSON error value as a plain message: strings verbatim,
/// anything else as compact JSON.
pub(crate) fn json_to_message(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Convenience alias used throughout the library.
pub type Result<T> = std::result::Result<T, HtbError>;
