//! Integration tests for the banking API client

use reqwest::Method;
use serde_json::json;
use teller_http::client::{ApiClient, ClientError, DEVICE_ID_HEADER, Payload};
use teller_http::types::{AccountCreate, AccountType, TransactionCreate, TransactionType};
use wiremock::matchers::{body_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[tokio::test]
async fn test_client_builder() {
    let client = ApiClient::builder()
        .base_url("http://localhost:8000/")
        .build();

    assert!(client.is_ok());
    assert_eq!(client.unwrap().base_url(), "http://localhost:8000");
}

#[tokio::test]
async fn test_client_builder_requires_base_url() {
    let result = ApiClient::builder().build();
    assert!(matches!(result, Err(ClientError::Configuration(_))));
}

#[tokio::test]
async fn test_client_builder_rejects_bad_urls() {
    assert!(matches!(
        ApiClient::new("not a url"),
        Err(ClientError::Configuration(_))
    ));
    assert!(matches!(
        ApiClient::new("ftp://bank.example"),
        Err(ClientError::Configuration(_))
    ));
}

#[tokio::test]
async fn test_created_json_is_returned_unchanged() {
    let mock_server = MockServer::start().await;
    let created = json!({
        "id": 9,
        "account_id": 3,
        "type": "deposit",
        "amount": 10000,
        "currency": "USD",
        "created_at": "2025-01-01T00:00:00Z"
    });

    Mock::given(method("POST"))
        .and(path("/v1/transactions"))
        .and(header("content-type", "application/json"))
        .and(header("authorization", "Bearer access-1"))
        .respond_with(ResponseTemplate::new(201).set_body_json(&created))
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = ApiClient::new(mock_server.uri()).unwrap();
    let body = json!({"account_id": 3, "type": "deposit", "amount": 10000, "currency": "USD"});
    let payload = client
        .call(
            Method::POST,
            "/v1/transactions",
            Some(&body),
            Some("access-1"),
            &[],
        )
        .await
        .unwrap();

    assert_eq!(payload, Payload::Json(created));
}

#[tokio::test]
async fn test_error_status_carries_body() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/v1/statements/99"))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({"error": "not found"})))
        .mount(&mock_server)
        .await;

    let client = ApiClient::new(mock_server.uri()).unwrap();
    let error = client
        .with_bearer("access-1")
        .statement(99)
        .await
        .unwrap_err();

    assert_eq!(error.status(), Some(404));
    let message = error.to_string();
    assert!(message.contains("404"), "{message}");
    assert!(message.contains(r#"{"error":"not found"}"#), "{message}");
}

#[tokio::test]
async fn test_unauthorized_is_flagged() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/v1/auth/me"))
        .respond_with(ResponseTemplate::new(401).set_body_string("expired"))
        .mount(&mock_server)
        .await;

    let client = ApiClient::new(mock_server.uri()).unwrap();
    let error = client.with_bearer("stale").me().await.unwrap_err();

    assert!(error.is_auth_expired());
    assert_eq!(error.body(), Some("expired"));
}

#[tokio::test]
async fn test_non_json_and_empty_bodies() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/v1/text"))
        .respond_with(ResponseTemplate::new(200).set_body_string("plain ok"))
        .mount(&mock_server)
        .await;
    Mock::given(method("DELETE"))
        .and(path("/v1/empty"))
        .respond_with(ResponseTemplate::new(204))
        .mount(&mock_server)
        .await;

    let client = ApiClient::new(mock_server.uri()).unwrap();

    let text = client
        .call(Method::GET, "/v1/text", None, None, &[])
        .await
        .unwrap();
    assert_eq!(text, Payload::Text("plain ok".into()));

    let empty = client
        .call(Method::DELETE, "/v1/empty", None, None, &[])
        .await
        .unwrap();
    assert_eq!(empty, Payload::Empty);
}

#[tokio::test]
async fn test_unreachable_server_is_transport_error() {
    let port = {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap().port()
    };

    let client = ApiClient::new(format!("http://127.0.0.1:{port}")).unwrap();
    let error = client.health().await.unwrap_err();

    assert!(error.is_transport());
    assert_eq!(error.status(), None);
}

#[tokio::test]
async fn test_login_sends_device_id() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/auth/login"))
        .and(header(DEVICE_ID_HEADER, "demo-cli"))
        .and(body_json(
            json!({"email": "ada@example.com", "password": "pw"}),
        ))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "access-1",
            "refresh_token": "refresh-1",
            "token_type": "bearer",
            "expires_in": 1800
        })))
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = ApiClient::new(mock_server.uri()).unwrap();
    let tokens = client
        .login("ada@example.com", "pw", "demo-cli")
        .await
        .unwrap();

    assert_eq!(tokens.access_token, "access-1");
    assert_eq!(tokens.refresh_token.as_deref(), Some("refresh-1"));
    assert_eq!(tokens.expires_in, Some(1800));
}

#[tokio::test]
async fn test_refresh_posts_token() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/auth/refresh"))
        .and(body_json(json!({"refresh_token": "refresh-1"})))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"access_token": "access-2", "expires_in": 900})),
        )
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = ApiClient::new(mock_server.uri()).unwrap();
    let tokens = client.refresh("refresh-1", "demo-cli").await.unwrap();

    assert_eq!(tokens.access_token, "access-2");
    assert_eq!(tokens.refresh_token, None);
}

#[tokio::test]
async fn test_typed_banking_calls() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/accounts"))
        .and(body_json(json!({"type": "savings", "currency": "USD"})))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({
            "id": 4,
            "holder_id": 1,
            "type": "savings",
            "currency": "USD",
            "balance": 0,
            "status": "active",
            "created_at": "2025-01-01T00:00:00Z"
        })))
        .mount(&mock_server)
        .await;
    Mock::given(method("POST"))
        .and(path("/v1/transactions"))
        .and(body_json(
            json!({"account_id": 4, "type": "withdrawal", "amount": 250, "currency": "USD"}),
        ))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({
            "id": 11,
            "account_id": 4,
            "type": "withdrawal",
            "amount": 250,
            "currency": "USD",
            "created_at": "2025-01-01T00:00:01Z"
        })))
        .mount(&mock_server)
        .await;

    let client = ApiClient::new(mock_server.uri()).unwrap();
    let authorized = client.with_bearer("access-1");

    let account = authorized
        .create_account(&AccountCreate {
            account_type: AccountType::Savings,
            currency: "USD".into(),
        })
        .await
        .unwrap();
    assert_eq!(account.id, 4);
    assert_eq!(account.account_type, AccountType::Savings);

    let transaction = authorized
        .create_transaction(&TransactionCreate {
            account_id: account.id,
            transaction_type: TransactionType::Withdrawal,
            amount: 250,
            currency: "USD".into(),
        })
        .await
        .unwrap();
    assert_eq!(transaction.id, 11);
}
