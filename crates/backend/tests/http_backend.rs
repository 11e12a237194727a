//! Integration tests for the HTTP backend against a local mock server.

use std::sync::{Arc, Mutex};

use axum::Router;
use axum::extract::State;
use axum::http::{HeaderMap, Method, StatusCode, Uri};
use backend::{BackendConfig, BackendError, CommerceBackend, HttpCommerceBackend, Operation};
use common::{AssetId, EstimateId, OrderId, OrganizationId, ServiceId, TransactionId, UserId};
use domain::{LineUpdate, PaymentInput, TransactionStatus};
use rust_decimal_macros::dec;

#[derive(Debug, Clone)]
struct Received {
    method: Method,
    path: String,
    authorization: Option<String>,
    body: serde_json::Value,
}

type Log = Arc<Mutex<Vec<Received>>>;

async fn mock(State(log): State<Log>, method: Method, uri: Uri, headers: HeaderMap, body: String) -> (StatusCode, String) {
    let parsed = serde_json::from_str(&body).unwrap_or(serde_json::Value::Null);
    log.lock().unwrap().push(Received {
        method: method.clone(),
        path: uri.path().to_string(),
        authorization: headers
            .get("authorization")
            .and_then(|v| v.to_str().ok())
            .map(str::to_string),
        body: parsed.clone(),
    });

    let path = uri.path();
    match (method.as_str(), path) {
        ("POST", "/api/payment/transaction") => {
            if parsed["serviceId"] == "svc-down" {
                (StatusCode::BAD_GATEWAY, "{\"error\":\"upstream\"}".to_string())
            } else {
                (
                    StatusCode::OK,
                    serde_json::json!({"transactionId": "txn-77", "status": "PENDING", "extra": 1})
                        .to_string(),
                )
            }
        }
        ("PUT", "/api/payment/transaction") => (StatusCode::OK, String::new()),
        ("GET", "/api/payment/estimate/est-1") => (
            StatusCode::OK,
            serde_json::json!({
                "estimateId": "est-1",
                "estimateNumber": "EST-0001",
                "details": {"services": [], "subTotal": 10, "total": 12.1, "status": "SENT"},
                "items": []
            })
            .to_string(),
        ),
        ("GET", "/api/payment/estimate/est-garbled") => (StatusCode::OK, "<html>".to_string()),
        ("GET", _) => (StatusCode::NOT_FOUND, "{\"error\":\"no such estimate\"}".to_string()),
        ("PUT", "/api/payment/order/ord-1/lines/A") => (StatusCode::OK, "{}".to_string()),
        ("DELETE", "/api/payment/order") => (StatusCode::NO_CONTENT, String::new()),
        ("POST", "/api/payment/payment") => (
            StatusCode::OK,
            serde_json::json!({"paymentId": "PAY-1", "redirectUrl": "https://psp.example/1"})
                .to_string(),
        ),
        _ => (StatusCode::METHOD_NOT_ALLOWED, String::new()),
    }
}

async fn setup(token: Option<&str>) -> (HttpCommerceBackend, Log) {
    let log: Log = Arc::default();
    let app = Router::new().fallback(mock).with_state(log.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    let config = BackendConfig {
        base_url: format!("http://{addr}"),
        api_token: token.map(str::to_string),
        timeout: None,
    };
    (HttpCommerceBackend::new(config).unwrap(), log)
}

fn transaction_request(service_id: &str) -> backend::CreateTransactionRequest {
    backend::CreateTransactionRequest {
        service_id: ServiceId::new(service_id),
        seller_organization_id: Some(OrganizationId::new("org-1")),
        currency: "EUR".to_string(),
        buyer_user_id: UserId::new("user-1"),
        buyer_organization_id: None,
        total_amount: dec!(120),
        metadata: serde_json::json!({"source": "test"}),
    }
}

#[tokio::test]
async fn test_create_transaction_posts_contract_body() {
    let (backend, log) = setup(Some("tok-123")).await;

    let tx = backend
        .create_transaction(transaction_request("svc-1"))
        .await
        .unwrap();

    assert_eq!(tx.transaction_id.as_str(), "txn-77");
    assert_eq!(tx.service_id.as_str(), "svc-1");
    assert_eq!(tx.status, TransactionStatus::Pending);

    let received = log.lock().unwrap()[0].clone();
    assert_eq!(received.method, Method::POST);
    assert_eq!(received.path, "/api/payment/transaction");
    assert_eq!(received.authorization.as_deref(), Some("Bearer tok-123"));
    assert_eq!(received.body["serviceId"], "svc-1");
    assert_eq!(received.body["sellerOrganizationId"], "org-1");
    assert_eq!(received.body["buyerUserId"], "user-1");
    assert_eq!(received.body["currency"], "EUR");
    assert_eq!(received.body["totalAmount"].as_f64(), Some(120.0));
}

#[tokio::test]
async fn test_non_ok_status_maps_to_fixed_message() {
    let (backend, _) = setup(None).await;

    let err = backend
        .create_transaction(transaction_request("svc-down"))
        .await
        .unwrap_err();

    assert_eq!(
        err,
        BackendError::Http {
            operation: Operation::CreateTransaction,
            status: 502
        }
    );
    assert_eq!(err.to_string(), "Failed to create transaction (HTTP 502)");
}

#[tokio::test]
async fn test_finalize_puts_status() {
    let (backend, log) = setup(None).await;

    backend
        .update_transaction_status(&TransactionId::new("txn-77"), TransactionStatus::Completed)
        .await
        .unwrap();

    let received = log.lock().unwrap()[0].clone();
    assert_eq!(received.method, Method::PUT);
    assert_eq!(received.authorization, None);
    assert_eq!(
        received.body,
        serde_json::json!({"transactionId": "txn-77", "status": "COMPLETED"})
    );
}

#[tokio::test]
async fn test_get_estimate_and_errors() {
    let (backend, _) = setup(None).await;

    let details = backend.get_estimate(&EstimateId::new("est-1")).await.unwrap();
    assert_eq!(details.estimate_number, "EST-0001");
    assert_eq!(details.details.total, dec!(12.1));

    let missing = backend.get_estimate(&EstimateId::new("nope")).await;
    assert!(matches!(
        missing,
        Err(BackendError::Http { status: 404, .. })
    ));

    let garbled = backend
        .get_estimate(&EstimateId::new("est-garbled"))
        .await;
    assert!(matches!(
        garbled,
        Err(BackendError::Decode {
            operation: Operation::GetEstimate,
            ..
        })
    ));
}

#[tokio::test]
async fn test_line_update_and_delete_paths() {
    let (backend, log) = setup(None).await;
    let order_id = OrderId::new("ord-1");
    let asset_id = AssetId::new("A");

    backend
        .update_order_line(
            &order_id,
            &asset_id,
            LineUpdate {
                quantity: Some(2),
                unit_price: None,
            },
        )
        .await
        .unwrap();
    backend
        .delete_order_line(&order_id, &AssetId::new("B"))
        .await
        .unwrap();

    let log = log.lock().unwrap();
    assert_eq!(log[0].path, "/api/payment/order/ord-1/lines/A");
    assert_eq!(log[0].body, serde_json::json!({"quantity": 2}));
    assert_eq!(log[1].method, Method::DELETE);
    assert_eq!(log[1].path, "/api/payment/order");
    assert_eq!(
        log[1].body,
        serde_json::json!({"orderId": "ord-1", "assetId": "B"})
    );
}

#[tokio::test]
async fn test_submit_payment_returns_raw_response() {
    let (backend, _) = setup(None).await;

    let response = backend
        .submit_payment(PaymentInput {
            order_id: OrderId::new("ord-1"),
            transaction_id: TransactionId::new("txn-77"),
            amount: dec!(145.2),
            currency: "EUR".to_string(),
            method: "card".to_string(),
            return_url: None,
        })
        .await
        .unwrap();

    assert_eq!(response["paymentId"], "PAY-1");
    assert_eq!(response["redirectUrl"], "https://psp.example/1");
}

#[tokio::test]
async fn test_unreachable_backend_is_transport_error() {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let backend =
        HttpCommerceBackend::new(BackendConfig::default().with_base_url(format!("http://{addr}")))
            .unwrap();
    let result = backend.get_estimate(&EstimateId::new("est-1")).await;

    assert!(matches!(
        result,
        Err(BackendError::Transport {
            operation: Operation::GetEstimate,
            ..
        })
    ));
}
