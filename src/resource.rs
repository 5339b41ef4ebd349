//! The lazy-loading resource model.
//!
//! Remote records arrive in two shapes: thin search fragments (an id, a
//! display name, little else) and full detail payloads. [`LazyResource`]
//! unifies them: a [`ResourceKind`] plus a JSON field map, with a detail
//! fetch available on demand for the kinds that have a detail endpoint.
//!
//! Field access is explicit about I/O:
//!
//! - [`get`](LazyResource::get) is a pure lookup and never touches the
//!   network.
//! - [`get_or_load`](LazyResource::get_or_load) resolves a missing field
//!   with at most one detail fetch, then reports
//!   [`AttributeNotFound`](crate::error::HtbError::AttributeNotFound) if
//!   the field still is not there.
//! - [`load`](LazyResource::load) fetches eagerly, merging the detail
//!   payload over the known fields.
//!
//! Construction normalizes the search shape: a fragment carrying `value`
//! but no `name` gets `value` copied into `name`, so `name()` works the
//! same whether the record came from search or from a detail fetch.

use std::fmt;

use serde_json::{Map, Value};
use tracing::warn;

use crate::client::HtbClient;
use crate::error::{HtbError, Result};

/// The kinds of remote record the API serves.
///
/// The kind fixes the detail endpoint and the envelope key the detail
/// response wraps its payload in. Teams are listable via search but have
/// no detail endpoint; their loads fail without network I/O.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceKind {
    /// A user profile, loadable via `/user/profile/basic/{id}`.
    Profile,
    /// A machine, loadable via `/machine/profile/{id}`.
    Machine,
    /// A challenge, loadable via `/challenge/info/{id}`.
    Challenge,
    /// A team. Searchable, but the API exposes no detail endpoint.
    Team,
    /// The authenticated account, loadable via `/user/info` (no id).
    Account,
}

impl ResourceKind {
    /// True when the API exposes a detail endpoint for this kind.
    /// Teams have none.
    pub fn has_detail_endpoint(self) -> bool {
        !matches!(self, ResourceKind::Team)
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ResourceKind::Profile => "profile",
            ResourceKind::Machine => "machine",
            ResourceKind::Challenge => "challenge",
            ResourceKind::Team => "team",
            ResourceKind::Account => "account",
        })
    }
}

/// Reads a record id out of a JSON value. Search fragments deliver ids as
/// strings of digits, detail payloads as numbers; both are accepted.
fn value_as_id(value: &Value) -> Option<u64> {
    match value {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.parse().ok(),
        _ => None,
    }
}

/// One remote record, known partially or fully.
///
/// The field map holds whatever the API has revealed so far; `is_loaded`
/// says whether a full detail fetch has completed. The resource never
/// owns a client; the operations that need the network take one.
#[derive(Debug, Clone)]
pub struct LazyResource {
    kind: ResourceKind,
    fields: Map<String, Value>,
    id: Option<u64>,
    loaded: bool,
}

impl LazyResource {
    /// Wraps a raw JSON fragment as an unloaded resource.
    ///
    /// Applies the `value` → `name` normalization and extracts the record
    /// id (accepting an integer or a string of digits). The finders in
    /// [`search`](crate::search) and the per-kind modules call this for
    /// you; building one by hand is mainly useful to load a record by a
    /// known id without searching first.
    pub fn new(kind: ResourceKind, fields: Map<String, Value>) -> Self {
        let mut resource = LazyResource {
            kind,
            fields,
            id: None,
            loaded: false,
        };
        resource.normalize();
        resource
    }

    /// The kind this record belongs to.
    pub fn kind(&self) -> ResourceKind {
        self.kind
    }

    /// The record id, if one has been seen.
    pub fn id(&self) -> Option<u64> {
        self.id
    }

    /// The display name, if one has been seen.
    pub fn name(&self) -> Option<&str> {
        self.fields.get("name").and_then(Value::as_str)
    }

    /// True once a full detail fetch has completed.
    pub fn is_loaded(&self) -> bool {
        self.loaded
    }

    /// All currently known fields.
    pub fn fields(&self) -> &Map<String, Value> {
        &self.fields
    }

    /// Looks a field up in the known data. Pure lookup, never any I/O.
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.fields.get(field)
    }

    /// Resolves a field, fetching the record's detail payload if needed.
    ///
    /// A field that is already known is returned without I/O, loaded or
    /// not. A missing field triggers at most one [`load`](Self::load)
    /// (skipped when the kind has no detail endpoint, or when a load has
    /// already completed); if the field is still absent afterwards the
    /// call fails with `AttributeNotFound`.
    ///
    /// A load failure on this path is deliberately demoted: the caller
    /// asked for a field, so the answer is "no such field", with the
    /// underlying failure attached as the error's `source` and logged at
    /// `warn`. `loaded` stays false, so a later call may try again. Use
    /// [`load`](Self::load) directly when the load result itself matters.
    ///
    /// # Errors
    ///
    /// - `AttributeNotFound` — the field is not present, even after the
    ///   best-effort fetch.
    pub async fn get_or_load(&mut self, client: &HtbClient, field: &str) -> Result<&Value> {
        let mut load_failure = None;
        if !self.fields.contains_key(field) && !self.loaded && self.kind.has_detail_endpoint() {
            if let Err(err) = self.load(client, false).await {
                warn!(
                    kind = %self.kind,
                    field,
                    error = %err,
                    "lazy load failed; reporting the field as missing"
                );
                load_failure = Some(Box::new(err));
            }
        }
        match self.fields.get(field) {
            Some(value) => Ok(value),
            None => Err(HtbError::AttributeNotFound {
                kind: self.kind,
                field: field.to_string(),
                source: load_failure,
            }),
        }
    }

    /// Fetches the record's detail payload and merges it into the known
    /// fields.
    ///
    /// A no-op when already loaded, unless `force` is set, in which case
    /// the fetch is repeated and the payload overwrites what is held.
    /// Freshly arrived fields win over stale ones; the `value` → `name`
    /// normalization is re-applied and the id refreshed afterwards.
    ///
    /// # Errors
    ///
    /// - `ObjectLoadFailed` — the kind has no detail endpoint (teams), the
    ///   record id is unset (all kinds except Account), or the response
    ///   did not carry the expected payload.
    /// - `RequestFailed` / `RemoteError` / `FurtherAuthRequired` /
    ///   `Parse` — the detail request itself failed; see
    ///   [`HtbClient::get`](crate::client::HtbClient::get).
    pub async fn load(&mut self, client: &HtbClient, force: bool) -> Result<()> {
        if self.loaded && !force {
            return Ok(());
        }
        let (endpoint, envelope) = self.detail_route()?;
        let response = client.get(&endpoint).await?;
        let payload = response
            .get(envelope)
            .cloned()
            .ok_or_else(|| HtbError::ObjectLoadFailed {
                kind: self.kind,
                reason: format!("detail response is missing the `{envelope}` payload"),
            })?;
        let Value::Object(incoming) = payload else {
            return Err(HtbError::ObjectLoadFailed {
                kind: self.kind,
                reason: "detail payload is not a JSON object".to_string(),
            });
        };
        for (key, value) in incoming {
            self.fields.insert(key, value);
        }
        self.normalize();
        self.loaded = true;
        Ok(())
    }

    /// Builds the detail URL for this record, paired with the envelope
    /// key its response wraps the payload in. One table: a kind cannot
    /// have an endpoint without an envelope, or the other way round.
    fn detail_route(&self) -> Result<(String, &'static str)> {
        match self.kind {
            ResourceKind::Profile => Ok((
                format!("/user/profile/basic/{}", self.require_id()?),
                "profile",
            )),
            ResourceKind::Machine => Ok((
                format!("/machine/profile/{}", self.require_id()?),
                "info",
            )),
            ResourceKind::Challenge => Ok((
                format!("/challenge/info/{}", self.require_id()?),
                "challenge",
            )),
            ResourceKind::Account => Ok(("/user/info".to_string(), "info")),
            ResourceKind::Team => Err(HtbError::ObjectLoadFailed {
                kind: self.kind,
                reason: "the API exposes no team detail endpoint".to_string(),
            }),
        }
    }

    fn require_id(&self) -> Result<u64> {
        self.id.ok_or_else(|| HtbError::ObjectLoadFailed {
            kind: self.kind,
            reason: "no record id to build the detail URL from".to_string(),
        })
    }

    /// Search fragments name records under `value`; detail payloads use
    /// `name`. Copy `value` into `name` when `name` is absent, and pick
    /// up the record id in whichever shape it arrived.
    fn normalize(&mut self) {
        if !self.fields.contains_key("name") {
            if let Some(value) = self.fields.get("value").cloned() {
                self.fields.insert("name".to_string(), value);
            }
        }
        if let Some(id) = self.fields.get("id").and_then(value_as_id) {
            self.id = Some(id);
        }
    }
}
