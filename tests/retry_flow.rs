//! Integration tests for the refresh-on-401 retry protocol using wiremock.
//!
//! The contract under test: a 401 with a refresh token held triggers
//! exactly one POST /login/refresh and exactly one resend of the
//! original request, rebuilt from the original method, body and query.
//! Everything else — a second 401, a non-401 error, a 401 with nothing
//! to refresh with, a request that never produced a response at all —
//! propagates without another refresh.

use std::sync::Arc;

use htb_api::auth::{MemoryTokenStore, TokenStore, SESSION_TOKEN_KEY};
use htb_api::client::HtbClient;
use htb_api::error::HtbError;
use serde_json::json;
use wiremock::matchers::{bearer_token, body_json, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Helper: a client holding a stale access token and a usable refresh
/// token, as if restored from a previous session.
async fn stale_client(server: &MockServer) -> HtbClient {
    let client = HtbClient::with_base_url(&server.uri(), None);
    client.restore_session("stale-acc", "ref-1").await;
    client
}

/// Helper: mounts the refresh endpoint, rotating `ref-1` into
/// `fresh-acc` / `ref-2`.
async fn mount_refresh(server: &MockServer, times: u64) {
    Mock::given(method("POST"))
        .and(path("/login/refresh"))
        .and(body_json(json!({"refresh_token": "ref-1"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "message": {"access_token": "fresh-acc", "refresh_token": "ref-2"}
        })))
        .expect(times)
        .mount(server)
        .await;
}

#[tokio::test]
async fn expired_token_is_refreshed_and_the_request_resent() {
    let server = MockServer::start().await;
    let client = stale_client(&server).await;

    // First attempt carries the stale token and is rejected.
    Mock::given(method("GET"))
        .and(path("/user/info"))
        .and(bearer_token("stale-acc"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({"message": "Unauthorized"})))
        .expect(1)
        .mount(&server)
        .await;

    mount_refresh(&server, 1).await;

    // The resend carries the rotated token and succeeds.
    Mock::given(method("GET"))
        .and(path("/user/info"))
        .and(bearer_token("fresh-acc"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "info": {"id": 42, "name": "somebody"}
        })))
        .expect(1)
        .mount(&server)
        .await;

    let value = client.get("/user/info").await.unwrap();

    assert_eq!(value["info"]["name"], "somebody");
    assert_eq!(
        client.refresh_token().await.as_deref(),
        Some("ref-2"),
        "the rotated pair replaces the stale one"
    );
}

#[tokio::test]
async fn second_401_propagates_without_a_second_refresh() {
    let server = MockServer::start().await;
    let client = stale_client(&server).await;

    // Both the original attempt and the resend come back 401. The
    // expect(1) on the refresh mock is the assertion that no second
    // refresh is attempted.
    Mock::given(method("GET"))
        .and(path("/user/info"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({"message": "Unauthorized"})))
        .expect(2)
        .mount(&server)
        .await;

    mount_refresh(&server, 1).await;

    let err = client.get("/user/info").await.unwrap_err();
    assert!(
        matches!(err, HtbError::RequestFailed { code: 401, .. }),
        "the resend's 401 is reported as-is, got {err:?}"
    );
}

#[tokio::test]
async fn non_401_errors_never_trigger_a_refresh() {
    let server = MockServer::start().await;
    let client = stale_client(&server).await;

    Mock::given(method("GET"))
        .and(path("/machine/profile/999999"))
        .respond_with(
            ResponseTemplate::new(404).set_body_json(json!({"message": "Machine not found"})),
        )
        .expect(1)
        .mount(&server)
        .await;

    mount_refresh(&server, 0).await;

    let err = client.get("/machine/profile/999999").await.unwrap_err();
    match err {
        HtbError::RequestFailed { code, message } => {
            assert_eq!(code, 404);
            assert_eq!(message, "Machine not found");
        }
        other => panic!("expected RequestFailed, got {other:?}"),
    }
    assert_eq!(
        client.refresh_token().await.as_deref(),
        Some("ref-1"),
        "the refresh token is untouched by a non-401 failure"
    );
}

#[tokio::test]
async fn a_401_with_no_refresh_token_is_reported_as_is() {
    let server = MockServer::start().await;

    // Only an access token in the store; nothing to refresh with.
    let store = Arc::new(MemoryTokenStore::new());
    store.save(SESSION_TOKEN_KEY, "stale-acc");
    let client = HtbClient::with_base_url(&server.uri(), Some(store));

    Mock::given(method("GET"))
        .and(path("/user/info"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({"message": "Unauthorized"})))
        .expect(1)
        .mount(&server)
        .await;

    mount_refresh(&server, 0).await;

    let err = client.get("/user/info").await.unwrap_err();
    assert!(
        matches!(err, HtbError::RequestFailed { code: 401, .. }),
        "got {err:?}"
    );
}

#[tokio::test]
async fn refresh_that_leaves_2fa_outstanding_blocks_the_retry() {
    let server = MockServer::start().await;
    let client = stale_client(&server).await;

    Mock::given(method("GET"))
        .and(path("/user/info"))
        .and(bearer_token("stale-acc"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({"message": "Unauthorized"})))
        .expect(1)
        .mount(&server)
        .await;

    // The rotated token still needs an OTP; the original call must not
    // be resent with it.
    Mock::given(method("POST"))
        .and(path("/login/refresh"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "message": {
                "access_token": "fresh-acc",
                "refresh_token": "ref-2",
                "is2FAEnabled": true,
            }
        })))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/user/info"))
        .and(bearer_token("fresh-acc"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"info": {}})))
        .expect(0)
        .mount(&server)
        .await;

    let err = client.get("/user/info").await.unwrap_err();
    assert!(matches!(err, HtbError::FurtherAuthRequired), "got {err:?}");
    assert!(client.needs_otp().await);
}

#[tokio::test]
async fn retry_resends_the_original_body() {
    let server = MockServer::start().await;
    let client = stale_client(&server).await;
    let body = json!({"difficulty": 90, "note": "rooted it"});

    Mock::given(method("POST"))
        .and(path("/machine/feedback"))
        .and(bearer_token("stale-acc"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({"message": "Unauthorized"})))
        .expect(1)
        .mount(&server)
        .await;

    mount_refresh(&server, 1).await;

    // Matching on the body proves the resend was rebuilt from the
    // original call, not from some shared slot.
    Mock::given(method("POST"))
        .and(path("/machine/feedback"))
        .and(bearer_token("fresh-acc"))
        .and(body_json(body.clone()))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"message": "thanks"})))
        .expect(1)
        .mount(&server)
        .await;

    let value = client.post("/machine/feedback", Some(&body)).await.unwrap();
    assert_eq!(value["message"], "thanks");
}

#[tokio::test]
async fn retry_resends_the_original_query() {
    let server = MockServer::start().await;
    let client = stale_client(&server).await;

    Mock::given(method("GET"))
        .and(path("/search/fetch"))
        .and(bearer_token("stale-acc"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({"message": "Unauthorized"})))
        .expect(1)
        .mount(&server)
        .await;

    mount_refresh(&server, 1).await;

    Mock::given(method("GET"))
        .and(path("/search/fetch"))
        .and(bearer_token("fresh-acc"))
        .and(query_param("query", "Lame"))
        .and(query_param("tags", r#"["machines"]"#))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "machines": [{"id": "1", "value": "Lame"}]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let value = client
        .get_with_query("/search/fetch", &[("query", "Lame"), ("tags", r#"["machines"]"#)])
        .await
        .unwrap();
    assert_eq!(value["machines"][0]["value"], "Lame");
}

#[tokio::test]
async fn anonymous_requests_carry_no_authorization_header() {
    let server = MockServer::start().await;
    let client = HtbClient::with_base_url(&server.uri(), None);

    Mock::given(method("GET"))
        .and(path("/user/info"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({"message": "Unauthorized"})))
        .mount(&server)
        .await;

    // No tokens held: the 401 is final (nothing to refresh with).
    let err = client.get("/user/info").await.unwrap_err();
    assert!(matches!(err, HtbError::RequestFailed { code: 401, .. }), "got {err:?}");

    let requests = server.received_requests().await.unwrap();
    assert_eq!(requests.len(), 1);
    assert!(
        !requests[0].headers.contains_key("authorization"),
        "a bearer header must only be attached when a token is held"
    );
}

#[tokio::test]
async fn transport_failure_is_reported_with_code_zero() {
    // Nothing listens on the discard port; the request dies before any
    // status line exists. The uniform shape for that is RequestFailed
    // with code 0.
    let client = HtbClient::with_base_url("http://127.0.0.1:9", None);
    client.restore_session("acc", "ref-1").await;

    let err = client.get("/user/info").await.unwrap_err();
    match err {
        HtbError::RequestFailed { code, message } => {
            assert_eq!(code, 0, "no response means code 0, not an HTTP status");
            assert!(!message.is_empty(), "the transport error rides in the message");
        }
        other => panic!("expected RequestFailed, got {other:?}"),
    }
    assert_eq!(
        client.refresh_token().await.as_deref(),
        Some("ref-1"),
        "a dead connection is not a 401; the refresh token stays put"
    );
}
