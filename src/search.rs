//! Multi-kind search against `/search/fetch`.
//!
//! One query term is matched against several record kinds at once; the
//! kinds are selected by [`SearchTag`]s. The response is an object keyed
//! by tag name, each bucket a sequence of thin fragments, and a tag with
//! no matches is simply absent. [`search`] turns the buckets into
//! unloaded [`LazyResource`]s sorted into a [`SearchResults`].
//!
//! The per-kind modules ([`profiles`](crate::profiles),
//! [`machines`](crate::machines), [`challenges`](crate::challenges),
//! [`teams`](crate::teams)) wrap this with single-tag searches and
//! exact-name lookups.

use serde_json::Value;

use crate::client::HtbClient;
use crate::error::Result;
use crate::resource::{LazyResource, ResourceKind};

const SEARCH_ENDPOINT: &str = "/search/fetch";

/// A record kind selector for [`search`].
///
/// The variants are named after the API's tag strings, which differ from
/// the [`ResourceKind`] labels: the `users` tag yields profile records.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchTag {
    /// Match user profiles.
    Users,
    /// Match machines.
    Machines,
    /// Match challenges.
    Challenges,
    /// Match teams.
    Teams,
}

impl SearchTag {
    /// Every tag the API knows. The usual choice when not narrowing to a
    /// single kind.
    pub const ALL: [SearchTag; 4] = [
        SearchTag::Users,
        SearchTag::Machines,
        SearchTag::Challenges,
        SearchTag::Teams,
    ];

    /// The tag string sent to (and keyed in the response of) the API.
    pub fn as_str(self) -> &'static str {
        match self {
            SearchTag::Users => "users",
            SearchTag::Machines => "machines",
            SearchTag::Challenges => "challenges",
            SearchTag::Teams => "teams",
        }
    }

    /// The resource kind a fragment under this tag becomes.
    fn kind(self) -> ResourceKind {
        match self {
            SearchTag::Users => ResourceKind::Profile,
            SearchTag::Machines => ResourceKind::Machine,
            SearchTag::Challenges => ResourceKind::Challenge,
            SearchTag::Teams => ResourceKind::Team,
        }
    }
}

/// Search matches, one bucket per kind.
///
/// Buckets for tags that were not requested, or that matched nothing,
/// are empty. Every entry is an unloaded [`LazyResource`].
#[derive(Debug, Clone, Default)]
pub struct SearchResults {
    /// Profiles matched under the `users` tag.
    pub users: Vec<LazyResource>,
    /// Machines matched under the `machines` tag.
    pub machines: Vec<LazyResource>,
    /// Challenges matched under the `challenges` tag.
    pub challenges: Vec<LazyResource>,
    /// Teams matched under the `teams` tag.
    pub teams: Vec<LazyResource>,
}

/// Searches the requested kinds for a term.
///
/// The tags travel as a JSON-encoded array in the `tags` query parameter,
/// which is the shape the endpoint expects.
///
/// # Errors
///
/// - `RequestFailed` / `RemoteError` — the search call failed; a
///   malformed tag set surfaces as `RemoteError` with the API's
///   "Failed to parse tags." message.
/// - `FurtherAuthRequired` — a mid-request refresh left 2FA outstanding.
pub async fn search(
    client: &HtbClient,
    term: &str,
    tags: &[SearchTag],
) -> Result<SearchResults> {
    let tag_names: Vec<&str> = tags.iter().map(|tag| tag.as_str()).collect();
    let tags_json = serde_json::to_string(&tag_names)?;
    let response = client
        .get_with_query(SEARCH_ENDPOINT, &[("query", term), ("tags", &tags_json)])
        .await?;

    let mut results = SearchResults::default();
    for tag in tags {
        let bucket = fragments(&response, tag.as_str(), tag.kind());
        match tag {
            SearchTag::Users => results.users = bucket,
            SearchTag::Machines => results.machines = bucket,
            SearchTag::Challenges => results.challenges = bucket,
            SearchTag::Teams => results.teams = bucket,
        }
    }
    Ok(results)
}

/// Reads one tag's bucket out of the response. An absent key means no
/// matches; anything that is not an array of objects is skipped.
fn fragments(response: &Value, key: &str, kind: ResourceKind) -> Vec<LazyResource> {
    response
        .get(key)
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(|item| item.as_object().cloned())
                .map(|map| LazyResource::new(kind, map))
                .collect()
        })
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn all_covers_every_tag() {
        assert_eq!(SearchTag::ALL.len(), 4);
        let names: Vec<&str> = SearchTag::ALL.iter().map(|t| t.as_str()).collect();
        assert_eq!(names, ["users", "machines", "challenges", "teams"]);
    }

    #[test]
    fn tags_encode_as_a_json_array() {
        let names: Vec<&str> = SearchTag::ALL.iter().map(|t| t.as_str()).collect();
        let encoded = serde_json::to_string(&names).unwrap();
        assert_eq!(encoded, r#"["users","machines","challenges","teams"]"#);
    }

    #[test]
    fn users_tag_yields_profile_records() {
        let response = json!({
            "users": [{"id": "86421", "value": "alice"}]
        });
        let bucket = fragments(&response, "users", SearchTag::Users.kind());
        assert_eq!(bucket.len(), 1);
        assert_eq!(bucket[0].kind(), ResourceKind::Profile);
        assert_eq!(bucket[0].name(), Some("alice"));
        assert_eq!(bucket[0].id(), Some(86421));
    }

    #[test]
    fn absent_bucket_means_no_matches() {
        let response = json!({"machines": []});
        assert!(fragments(&response, "teams", ResourceKind::Team).is_empty());
        assert!(fragments(&response, "machines", ResourceKind::Machine).is_empty());
    }

    #[test]
    fn malformed_bucket_entries_are_skipped() {
        let response = json!({
            "machines": [{"id": 1, "value": "Lame"}, "stray-string", 42]
        });
        let bucket = fragments(&response, "machines", ResourceKind::Machine);
        assert_eq!(bucket.len(), 1, "non-object fragments are dropped");
        assert_eq!(bucket[0].name(), Some("Lame"));
    }
}
