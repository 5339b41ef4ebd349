//! Team lookup.
//!
//! Covers the `teams` search tag:
//!
//! - [`find_teams`] — all teams matching a partial or full name.
//! - [`find_team`] — the team whose name matches exactly, if any.
//!
//! Teams are the one kind without a detail endpoint: what search
//! reveals is all there is, and a [`LazyResource::load`] on a team
//! fails without touching the network.
//!
//! ## Known fields
//!
//! Team fragments commonly carry: `id`, `name`, `motto`, `respected`,
//! `ranking`, `avatar`.

use crate::client::HtbClient;
use crate::error::Result;
use crate::resource::LazyResource;
use crate::search::{search, SearchTag};

/// Searches for teams matching a partial or full name.
///
/// Every hit comes back as a [`LazyResource`] of kind `Team`.
///
/// # Errors
///
/// - `RequestFailed` / `RemoteError` — the search call failed.
/// - `FurtherAuthRequired` — a mid-request refresh left 2FA outstanding.
pub async fn find_teams(client: &HtbClient, name: &str) -> Result<Vec<LazyResource>> {
    let results = search(client, name, &[SearchTag::Teams]).await?;
    Ok(results.teams)
}

/// Finds the team whose name matches `name` exactly.
///
/// Search matches partially; this scans the hits for the exact name and
/// returns the first, or `None` when nothing matches exactly.
///
/// # Errors
///
/// Same failure modes as [`find_teams`].
pub async fn find_team(client: &HtbClient, name: &str) -> Result<Option<LazyResource>> {
    let matches = find_teams(client, name).await?;
    Ok(matches.into_iter().find(|team| team.name() == Some(name)))
}
