//! Challenge lookup.
//!
//! Covers the `challenges` search tag and the `/challenge/info/{id}`
//! detail endpoint:
//!
//! - [`find_challenges`] — all challenges matching a partial or full
//!   name.
//! - [`find_challenge`] — the challenge whose name matches exactly, if
//!   any.
//!
//! Search gives back thin fragments (id and name); the rest arrives on
//! demand via [`LazyResource::get_or_load`] or an explicit
//! [`LazyResource::load`].
//!
//! ## Known fields
//!
//! Loaded challenges commonly carry: `id`, `name`, `retired`,
//! `difficulty`, `difficulty_chart`, `points`, `solves`,
//! `authUserSolve`, `authUserSolveTime`, `likes`, `dislikes`,
//! `description`, `category_name`, `first_blood_user`,
//! `first_blood_user_id`, `first_blood_time`, `creator_id`,
//! `creator_name`, `creator_avatar`, `isRespected`, `download`,
//! `sha256`, `docker`, `docker_port`, `release_date`, `likeByAuthUser`,
//! `dislikeByAuthUser`, `isTodo`, `recommended`.

use crate::client::HtbClient;
use crate::error::Result;
use crate::resource::LazyResource;
use crate::search::{search, SearchTag};

/// Searches for challenges matching a partial or full name.
///
/// Every hit comes back as an unloaded [`LazyResource`] of kind
/// `Challenge`.
///
/// # Errors
///
/// - `RequestFailed` / `RemoteError` — the search call failed.
/// - `FurtherAuthRequired` — a mid-request refresh left 2FA outstanding.
pub async fn find_challenges(client: &HtbClient, name: &str) -> Result<Vec<LazyResource>> {
    let results = search(client, name, &[SearchTag::Challenges]).await?;
    Ok(results.challenges)
}

/// Finds the challenge whose name matches `name` exactly.
///
/// Search matches partially; this scans the hits for the exact name and
/// returns the first, or `None` when nothing matches exactly.
///
/// # Errors
///
/// Same failure modes as [`find_challenges`].
pub async fn find_challenge(client: &HtbClient, name: &str) -> Result<Option<LazyResource>> {
    let matches = find_challenges(client, name).await?;
    Ok(matches
        .into_iter()
        .find(|challenge| challenge.name() == Some(name)))
}
