//! The authenticated account.
//!
//! The account behind the current session is a resource like any other,
//! except that its detail endpoint (`/user/info`) is fixed and needs no
//! record id:
//!
//! - [`current_user`] — the account as an unloaded record; fields
//!   arrive on first [`LazyResource::get_or_load`].
//! - [`fetch_current_user`] — the account loaded eagerly.
//!
//! ## Known fields
//!
//! Loaded accounts commonly carry: `id`, `name`, `email`, `timezone`,
//! `isVip`, `canAccessVIP`, `isServerVIP`, `server_id`, `avatar`.

use serde_json::Map;

use crate::client::HtbClient;
use crate::error::Result;
use crate::resource::{LazyResource, ResourceKind};

/// The current account as an unloaded record.
///
/// No network call is made; fields arrive on the first
/// [`get_or_load`](LazyResource::get_or_load) or an explicit
/// [`load`](LazyResource::load). Which account it resolves to is decided
/// by the session of whichever client the load is given.
pub fn current_user() -> LazyResource {
    LazyResource::new(ResourceKind::Account, Map::new())
}

/// Fetches the current account eagerly.
///
/// # Errors
///
/// - `RequestFailed` / `RemoteError` — the detail call failed; a 401
///   without a refreshable session means nobody is logged in.
/// - `FurtherAuthRequired` — a mid-request refresh left 2FA outstanding.
/// - `ObjectLoadFailed` — the response did not carry the account
///   payload.
pub async fn fetch_current_user(client: &HtbClient) -> Result<LazyResource> {
    let mut account = current_user();
    account.load(client, false).await?;
    Ok(account)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn current_user_starts_unloaded_and_empty() {
        let account = current_user();
        assert_eq!(account.kind(), ResourceKind::Account);
        assert!(!account.is_loaded());
        assert!(account.fields().is_empty());
        assert_eq!(account.id(), None, "the account id is only known after a load");
    }
}
