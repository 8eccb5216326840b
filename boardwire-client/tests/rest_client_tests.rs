//! The reqwest transport against a mock HTTP server.

use std::sync::Arc;
use std::time::Duration;

use boardwire_client::{
    ApiRequest, ClientFactory, ClientSettings, InstanceConfig, InstanceRegistry, MapEnv, RestClient,
    Transport,
};
use boardwire_test_utils::assertions::assert_upstream_status;
use boardwire_test_utils::fixtures;
use secrecy::SecretString;
use serde_json::json;
use wiremock::matchers::{body_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn instance(server: &MockServer) -> InstanceConfig {
    InstanceConfig {
        api_url: format!("{}/api/v2/", server.uri()),
        ..fixtures::instance("production")
    }
}

fn client(server: &MockServer) -> RestClient {
    RestClient::new(
        &instance(server),
        &SecretString::new("secret-token".into()),
        Duration::from_secs(5),
    )
    .unwrap()
}

#[tokio::test]
async fn test_sends_apikey_and_query() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v2/cards"))
        .and(header("apikey", "secret-token"))
        .and(header("accept", "application/json"))
        .and(query_param("board_ids", "10"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"data": []})))
        .expect(1)
        .mount(&server)
        .await;

    let body = client(&server)
        .execute(ApiRequest::get("/cards").query("board_ids", 10))
        .await
        .unwrap();

    assert_eq!(body, json!({"data": []}));
}

#[tokio::test]
async fn test_patch_sends_json_body() {
    let server = MockServer::start().await;
    Mock::given(method("PATCH"))
        .and(path("/api/v2/cards/100"))
        .and(body_json(json!({"title": "Renamed"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"data": {"card_id": 100}})))
        .expect(1)
        .mount(&server)
        .await;

    let body = client(&server)
        .execute(ApiRequest::patch("/cards/100", json!({"title": "Renamed"})))
        .await
        .unwrap();

    assert_eq!(body["data"]["card_id"], 100);
}

#[tokio::test]
async fn test_empty_body_is_null() {
    let server = MockServer::start().await;
    Mock::given(method("DELETE"))
        .and(path("/api/v2/cards/100"))
        .respond_with(ResponseTemplate::new(204))
        .mount(&server)
        .await;

    let body = client(&server)
        .execute(ApiRequest::delete("/cards/100"))
        .await
        .unwrap();

    assert!(body.is_null());
}

#[tokio::test]
async fn test_error_status_and_message_are_mapped() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v2/cards/999"))
        .respond_with(
            ResponseTemplate::new(404)
                .set_body_json(json!({"error": {"message": "Card not found"}})),
        )
        .mount(&server)
        .await;

    let result = client(&server).execute(ApiRequest::get("/cards/999")).await;

    assert_upstream_status(&result, 404);
    assert!(result.unwrap_err().to_string().contains("Card not found"));
}

#[tokio::test]
async fn test_non_json_success_is_decode_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v2/me"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>login</html>"))
        .mount(&server)
        .await;

    let result = client(&server).execute(ApiRequest::get("/me")).await;

    assert!(matches!(result, Err(boardwire_client::ClientError::Decode { .. })));
}

#[tokio::test]
async fn test_factory_client_unwraps_envelope_and_caches() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v2/workspaces"))
        .and(header("apikey", "prod-token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": [{"workspace_id": 1, "name": "Engineering", "is_archived": false}]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let registry = InstanceRegistry::from_instances(vec![instance(&server)], "production").unwrap();
    let factory = ClientFactory::new(registry, ClientSettings::default())
        .with_env(Arc::new(MapEnv::new().with("PRODUCTION_TOKEN", "prod-token")));
    let client = factory.get_client(None).unwrap();

    let first = client.workspaces().list().await.unwrap();
    let second = client.workspaces().list().await.unwrap();

    assert_eq!(first, second);
    assert_eq!(first[0].name, "Engineering");
    assert_eq!(client.workspaces().cache_stats().hits, 1);
}
