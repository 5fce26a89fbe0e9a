use actix_web::{http::StatusCode, test::TestRequest, web, web::ServiceConfig};
use chrono::Utc;
use serde_json::Value;
use storefront_payment_engine::{
    db_types::{AuditEntry, LineItem, OrderId, OrderStatus, PaymentStatus},
    helpers::BackoffPolicy,
    AdminApi,
    RefundCoordinator,
};

use super::{
    helpers::{echo_audit_entry, sample_order, try_request, with_admin_identity},
    mocks::{MockBackend, MockGateway, SharedBackend, SharedGateway},
};
use crate::{config::ServerOptions, routes};

fn configure_with(backend: MockBackend) -> impl FnOnce(&mut ServiceConfig) {
    move |cfg| {
        let db = SharedBackend::new(backend);
        let gateway = SharedGateway::new(MockGateway::new());
        let refunds = RefundCoordinator::new(db.clone(), gateway, BackoffPolicy::no_retries());
        let admin_api = AdminApi::new(db, refunds);
        cfg.app_data(web::Data::new(admin_api))
            .app_data(web::Data::new(ServerOptions { use_x_forwarded_for: false, use_forwarded: false }))
            .service(web::scope("/api").configure(routes::configure_api::<SharedBackend, SharedGateway>));
    }
}

#[actix_web::test]
async fn search_without_identity_is_rejected() {
    let _ = env_logger::try_init().ok();
    let backend = MockBackend::new();
    let err = try_request(TestRequest::get().uri("/api/orders"), configure_with(backend))
        .await
        .expect_err("Expected error");
    assert!(err.contains("No actor identity was supplied"), "unexpected error: {err}");
}

#[actix_web::test]
async fn search_needs_the_read_all_role() {
    let _ = env_logger::try_init().ok();
    let backend = MockBackend::new();
    let req = with_admin_identity(TestRequest::get().uri("/api/orders"), "admin:alice", "write");
    let err = try_request(req, configure_with(backend)).await.expect_err("Expected error");
    assert!(err.contains("Insufficient Permissions"), "unexpected error: {err}");
}

#[actix_web::test]
async fn search_returns_orders() {
    let _ = env_logger::try_init().ok();
    let mut backend = MockBackend::new();
    backend.expect_search_orders().returning(|_| {
        Ok(vec![
            sample_order(1, OrderStatus::Pending, PaymentStatus::Pending),
            sample_order(4, OrderStatus::Shipped, PaymentStatus::Paid),
        ])
    });
    let req = with_admin_identity(TestRequest::get().uri("/api/orders"), "admin:alice", "read_all");
    let (status, body) = try_request(req, configure_with(backend)).await.expect("Request failed");
    assert_eq!(status, StatusCode::OK);
    let orders: Value = serde_json::from_str(&body).unwrap();
    assert_eq!(orders.as_array().unwrap().len(), 2);
    assert_eq!(orders[0]["order_id"], "ord-1001");
    assert_eq!(orders[1]["status"], "Shipped");
}

#[actix_web::test]
async fn get_order_includes_line_items() {
    let _ = env_logger::try_init().ok();
    let mut backend = MockBackend::new();
    backend
        .expect_fetch_order()
        .returning(|_| Ok(Some(sample_order(2, OrderStatus::Processing, PaymentStatus::Paid))));
    backend.expect_fetch_order_items().returning(|order_id| {
        Ok(vec![LineItem {
            id: 1,
            order_id: order_id.clone(),
            product_id: "sku-1".to_string(),
            quantity: 2,
            unit_price: 25_000.into(),
            line_total: 50_000.into(),
        }])
    });
    let req = with_admin_identity(TestRequest::get().uri("/api/orders/ord-1001"), "admin:alice", "read_all");
    let (status, body) = try_request(req, configure_with(backend)).await.expect("Request failed");
    assert_eq!(status, StatusCode::OK);
    let order: Value = serde_json::from_str(&body).unwrap();
    assert_eq!(order["order_id"], "ord-1001");
    assert_eq!(order["items"][0]["product_id"], "sku-1");
}

#[actix_web::test]
async fn get_unknown_order_is_not_found() {
    let _ = env_logger::try_init().ok();
    let mut backend = MockBackend::new();
    backend.expect_fetch_order().returning(|_| Ok(None));
    let req = with_admin_identity(TestRequest::get().uri("/api/orders/ord-9999"), "admin:alice", "read_all");
    let err = try_request(req, configure_with(backend)).await.expect_err("Expected error");
    assert!(err.contains("The data was not found"), "unexpected error: {err}");
}

#[actix_web::test]
async fn transition_applies_and_returns_the_new_version() {
    let _ = env_logger::try_init().ok();
    let mut backend = MockBackend::new();
    backend
        .expect_fetch_order()
        .returning(|_| Ok(Some(sample_order(3, OrderStatus::Pending, PaymentStatus::Paid))));
    backend
        .expect_update_order()
        .withf(|order_id: &OrderId, expected_version: &i64, patch| {
            order_id.as_str() == "ord-1001" &&
                *expected_version == 3 &&
                patch.status == Some(OrderStatus::Processing)
        })
        .returning(|_, _, _| Ok(sample_order(4, OrderStatus::Processing, PaymentStatus::Paid)));
    backend.expect_append_audit_entry().times(1).returning(|entry| Ok(echo_audit_entry(entry)));
    let req = with_admin_identity(
        TestRequest::post()
            .uri("/api/orders/ord-1001/transition")
            .set_json(serde_json::json!({"expected_version": 3, "target": "Processing"})),
        "admin:alice",
        "write",
    );
    let (status, body) = try_request(req, configure_with(backend)).await.expect("Request failed");
    assert_eq!(status, StatusCode::OK);
    let order: Value = serde_json::from_str(&body).unwrap();
    assert_eq!(order["version"], 4);
    assert_eq!(order["status"], "Processing");
}

#[actix_web::test]
async fn stale_version_is_a_conflict() {
    let _ = env_logger::try_init().ok();
    let mut backend = MockBackend::new();
    // Someone advanced the order to v5 after the console read v3
    backend
        .expect_fetch_order()
        .returning(|_| Ok(Some(sample_order(5, OrderStatus::Processing, PaymentStatus::Paid))));
    let req = with_admin_identity(
        TestRequest::post()
            .uri("/api/orders/ord-1001/transition")
            .set_json(serde_json::json!({"expected_version": 3, "target": "Shipped"})),
        "admin:alice",
        "write",
    );
    let err = try_request(req, configure_with(backend)).await.expect_err("Expected error");
    assert!(err.contains("was modified concurrently"), "unexpected error: {err}");
}

#[actix_web::test]
async fn illegal_transition_is_rejected() {
    let _ = env_logger::try_init().ok();
    let mut backend = MockBackend::new();
    backend
        .expect_fetch_order()
        .returning(|_| Ok(Some(sample_order(7, OrderStatus::Delivered, PaymentStatus::Paid))));
    let req = with_admin_identity(
        TestRequest::post()
            .uri("/api/orders/ord-1001/transition")
            .set_json(serde_json::json!({"expected_version": 7, "target": "Pending"})),
        "admin:alice",
        "write",
    );
    let err = try_request(req, configure_with(backend)).await.expect_err("Expected error");
    assert!(err.contains("Invalid transition"), "unexpected error: {err}");
}

#[actix_web::test]
async fn audit_search_returns_entries_newest_first() {
    let _ = env_logger::try_init().ok();
    let mut backend = MockBackend::new();
    backend.expect_search_audit_entries().returning(|_| {
        let order = sample_order(1, OrderStatus::Pending, PaymentStatus::Pending);
        let newer = AuditEntry {
            id: 2,
            actor_id: "admin:alice".to_string(),
            action: storefront_payment_engine::db_types::AuditAction::OrderTransition,
            order_id: order.order_id.clone(),
            prior_state: order.state_snapshot(),
            new_state: order.state_snapshot(),
            order_version: 2,
            remote_ip: None,
            user_agent: None,
            created_at: Utc::now(),
        };
        let older = AuditEntry { id: 1, order_version: 1, ..newer.clone() };
        Ok(vec![newer, older])
    });
    let req = with_admin_identity(TestRequest::get().uri("/api/audit"), "admin:alice", "read_all");
    let (status, body) = try_request(req, configure_with(backend)).await.expect("Request failed");
    assert_eq!(status, StatusCode::OK);
    let entries: Value = serde_json::from_str(&body).unwrap();
    assert_eq!(entries[0]["id"], 2);
    assert_eq!(entries[1]["id"], 1);
}
