//! End-to-end tests of the reqwest-backed client against a mock API.

use hookline_core::{HttpError, MessageData, Snowflake};
use hookline_transport::{ClientConfig, Followup, HttpClient, Method, Route};
use serde_json::json;
use wiremock::matchers::{body_json, header, header_exists, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

async fn client(server: &MockServer) -> HttpClient {
    let config = ClientConfig::new("token-123")
        .application_id(99u64)
        .base_url(format!("{}/api", server.uri()));
    HttpClient::new(config).unwrap()
}

#[tokio::test]
async fn test_me_sends_credentials_and_updates_bucket() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v10/users/@me"))
        .and(header("authorization", "Bot token-123"))
        .and(header_exists("user-agent"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"id": "1", "username": "hook"}))
                .insert_header("x-ratelimit-limit", "5")
                .insert_header("x-ratelimit-remaining", "4")
                .insert_header("x-ratelimit-reset-after", "1.0"),
        )
        .expect(1)
        .mount(&server)
        .await;

    let client = client(&server).await;
    let me = client.me().await.unwrap();
    assert_eq!(me["username"], "hook");

    let bucket = client.buckets().get("GET /users/@me");
    assert_eq!(bucket.remaining(), 4);
}

#[tokio::test]
async fn test_error_statuses_are_typed() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v10/channels/5"))
        .respond_with(
            ResponseTemplate::new(404).set_body_json(json!({"code": 10003, "message": "Unknown Channel"})),
        )
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/v10/channels/5/messages"))
        .respond_with(
            ResponseTemplate::new(400).set_body_json(json!({"code": 200000, "message": "blocked"})),
        )
        .mount(&server)
        .await;
    Mock::given(method("DELETE"))
        .and(path("/api/v10/channels/5"))
        .respond_with(ResponseTemplate::new(429).set_body_string("error code: 1015"))
        .mount(&server)
        .await;

    let client = client(&server).await;

    let err = client
        .request(&Route::new(Method::Get, "/channels/{channel_id}").param("channel_id", 5), None)
        .await
        .unwrap_err();
    assert!(matches!(err, HttpError::NotFound(ref r) if r.code == 10003), "got {err:?}");

    let err = client
        .request(
            &Route::new(Method::Post, "/channels/{channel_id}/messages").param("channel_id", 5),
            Some(json!({"content": "hi"})),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, HttpError::AutomodBlock(_)), "got {err:?}");

    let err = client
        .request(&Route::new(Method::Delete, "/channels/{channel_id}").param("channel_id", 5), None)
        .await
        .unwrap_err();
    assert!(matches!(err, HttpError::Ratelimited(_)), "got {err:?}");
}

#[tokio::test]
async fn test_update_commands_targets_guild() {
    let server = MockServer::start().await;
    let commands = json!([{"name": "ping", "description": "Pong!", "type": 1}]);
    Mock::given(method("PUT"))
        .and(path("/api/v10/applications/99/guilds/7/commands"))
        .and(body_json(commands.clone()))
        .respond_with(ResponseTemplate::new(200).set_body_json(commands.clone()))
        .expect(1)
        .mount(&server)
        .await;

    let client = client(&server).await;
    let stored = client
        .update_commands(&commands, Some(Snowflake(7)))
        .await
        .unwrap();
    assert_eq!(stored, commands);
}

#[tokio::test]
async fn test_followup_uses_webhook_base_without_bot_token() {
    let server = MockServer::start().await;
    Mock::given(method("PATCH"))
        .and(path("/api/webhooks/99/tok/messages/@original"))
        .and(body_json(json!({"content": "done"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": "555"})))
        .expect(1)
        .mount(&server)
        .await;

    let followup = Followup::new(client(&server).await, Snowflake(99), "tok");
    let message = followup
        .edit_original_response(&MessageData::text("done"))
        .await
        .unwrap();
    assert_eq!(message["id"], "555");

    let requests = server.received_requests().await.unwrap();
    assert!(requests[0].headers.get("authorization").is_none());
}
