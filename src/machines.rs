//! Machine lookup.
//!
//! Covers the `machines` search tag and the `/machine/profile/{id}`
//! detail endpoint:
//!
//! - [`find_machines`] — all machines matching a partial or full name.
//! - [`find_machine`] — the machine whose name matches exactly, if any.
//!
//! Search gives back thin fragments (id and name); the rest arrives on
//! demand via [`LazyResource::get_or_load`] or an explicit
//! [`LazyResource::load`].
//!
//! ## Known fields
//!
//! Loaded machines commonly carry: `id`, `name`, `os`, `active`,
//! `retired`, `points`, `static_points`, `release`, `user_owns_count`,
//! `root_owns_count`, `free`, `authUserInUserOwns`,
//! `authUserInRootOwns`, `authUserHasReviewed`, `stars`, `difficulty`,
//! `difficultyText`, `feedbackForChart`, `avatar`, `isCompleted`,
//! `last_reset_time`, `playInfo`, `maker`, `maker2`,
//! `authUserFirstUserTime`, `authUserFirstRootTime`, `userBlood`,
//! `rootBlood`, `firstUserBloodTime`, `firstRootBloodTime`,
//! `recommended`.

use crate::client::HtbClient;
use crate::error::Result;
use crate::resource::LazyResource;
use crate::search::{search, SearchTag};

/// Searches for machines matching a partial or full name.
///
/// Every hit comes back as an unloaded [`LazyResource`] of kind
/// `Machine`.
///
/// # Errors
///
/// - `RequestFailed` / `RemoteError` — the search call failed.
/// - `FurtherAuthRequired` — a mid-request refresh left 2FA outstanding.
pub async fn find_machines(client: &HtbClient, name: &str) -> Result<Vec<LazyResource>> {
    let results = search(client, name, &[SearchTag::Machines]).await?;
    Ok(results.machines)
}

/// Finds the machine whose name matches `name` exactly.
///
/// Search matches partially, so `"Lame"` may also return `Lament`;
/// this scans the hits for the exact name and returns the first, or
/// `None` when nothing matches exactly.
///
/// # Errors
///
/// Same failure modes as [`find_machines`].
pub async fn find_machine(client: &HtbClient, name: &str) -> Result<Option<LazyResource>> {
    let matches = find_machines(client, name).await?;
    Ok(matches
        .into_iter()
        .find(|machine| machine.name() == Some(name)))
}
