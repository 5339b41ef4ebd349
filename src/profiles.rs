//! User profile lookup.
//!
//! Covers the `users` search tag and the `/user/profile/basic/{id}`
//! detail endpoint:
//!
//! - [`find_profiles`] — all profiles matching a partial or full
//!   username.
//! - [`find_profile`] — the profile whose username matches exactly, if
//!   any.
//!
//! Search gives back thin fragments (id and username); the rest arrives
//! on demand via [`LazyResource::get_or_load`] or an explicit
//! [`LazyResource::load`].
//!
//! ## Known fields
//!
//! Loaded profiles commonly carry: `id`, `name`, `timezone`, `isVip`,
//! `avatar`, `points`, `system_owns`, `user_owns`, `system_bloods`,
//! `user_bloods`, `respects`, `country_name`, `country_code`, `team`,
//! `university_name`, `description`, `github`, `linkedin`, `twitter`,
//! `website`, `isRespected`, `isFollowed`, `rank`, `rank_id`,
//! `current_rank_progress`, `next_rank`, `next_rank_points`,
//! `rank_ownership`, `rank_requirement`, `ranking`.

use crate::client::HtbClient;
use crate::error::Result;
use crate::resource::LazyResource;
use crate::search::{search, SearchTag};

/// Searches for profiles matching a partial or full username.
///
/// Every hit comes back as an unloaded [`LazyResource`] of kind
/// `Profile`.
///
/// # Errors
///
/// - `RequestFailed` / `RemoteError` — the search call failed.
/// - `FurtherAuthRequired` — a mid-request refresh left 2FA outstanding.
pub async fn find_profiles(client: &HtbClient, username: &str) -> Result<Vec<LazyResource>> {
    let results = search(client, username, &[SearchTag::Users]).await?;
    Ok(results.users)
}

/// Finds the profile whose username matches `username` exactly.
///
/// Search matches partially, so `"alice"` may return `alice`,
/// `alice2` and `malice`; this scans the hits for the exact name and
/// returns the first, or `None` when nothing matches exactly.
///
/// # Errors
///
/// Same failure modes as [`find_profiles`].
pub async fn find_profile(client: &HtbClient, username: &str) -> Result<Option<LazyResource>> {
    let matches = find_profiles(client, username).await?;
    Ok(matches
        .into_iter()
        .find(|profile| profile.name() == Some(username)))
}
