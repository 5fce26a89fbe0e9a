use actix_web::{http::StatusCode, test::TestRequest, web, web::ServiceConfig};
use serde_json::Value;
use sps_common::Money;
use storefront_payment_engine::{
    db_types::{OrderStatus, PaymentStatus, Refund, RefundStatus},
    helpers::BackoffPolicy,
    traits::{GatewayError, GatewayRefund},
    AdminApi,
    RefundCoordinator,
};

use super::{
    helpers::{echo_audit_entry, sample_order, try_request, with_admin_identity},
    mocks::{MockBackend, MockGateway, SharedBackend, SharedGateway},
};
use crate::{config::ServerOptions, routes};

fn configure_with(backend: MockBackend, gateway: MockGateway) -> impl FnOnce(&mut ServiceConfig) {
    move |cfg| {
        let db = SharedBackend::new(backend);
        let gateway = SharedGateway::new(gateway);
        let refunds = RefundCoordinator::new(db.clone(), gateway, BackoffPolicy::no_retries());
        let admin_api = AdminApi::new(db, refunds);
        cfg.app_data(web::Data::new(admin_api))
            .app_data(web::Data::new(ServerOptions { use_x_forwarded_for: false, use_forwarded: false }))
            .service(web::scope("/api").configure(routes::configure_api::<SharedBackend, SharedGateway>));
    }
}

fn paid_order(version: i64) -> storefront_payment_engine::db_types::Order {
    let mut order = sample_order(version, OrderStatus::Processing, PaymentStatus::Paid);
    order.payment_reference = Some("pay_123".to_string());
    order
}

fn refund_request(amount: i64) -> TestRequest {
    TestRequest::post()
        .uri("/api/orders/ord-1001/refund")
        .set_json(serde_json::json!({"amount": amount, "reason": "damaged"}))
}

#[actix_web::test]
async fn refund_dispatches_and_records_the_pending_sub_record() {
    let _ = env_logger::try_init().ok();
    let mut backend = MockBackend::new();
    backend.expect_fetch_order().returning(|_| Ok(Some(paid_order(2))));
    backend
        .expect_update_order()
        .withf(|_, expected_version, patch| {
            *expected_version == 2 &&
                patch.refund.as_ref().map(|r| r.status == RefundStatus::Pending && r.refund_id == "rf_9") == Some(true)
        })
        .returning(|_, _, patch| {
            let mut order = paid_order(3);
            order.refund = patch.refund;
            Ok(order)
        });
    backend.expect_append_audit_entry().times(1).returning(|entry| Ok(echo_audit_entry(entry)));
    let mut gateway = MockGateway::new();
    gateway
        .expect_create_refund()
        .withf(|reference: &str, amount: &Money, currency: &str, _reason: &str| {
            reference == "pay_123" && *amount == Money::from(50_000) && currency == "INR"
        })
        .returning(|reference, amount, currency, _| {
            Ok(GatewayRefund {
                refund_id: "rf_9".to_string(),
                payment_reference: reference.to_string(),
                amount,
                currency: currency.to_string(),
                status: RefundStatus::Pending,
            })
        });
    let req = with_admin_identity(refund_request(50_000), "admin:alice", "write");
    let (status, body) = try_request(req, configure_with(backend, gateway)).await.expect("Request failed");
    assert_eq!(status, StatusCode::OK);
    let order: Value = serde_json::from_str(&body).unwrap();
    assert_eq!(order["refund"]["refund_id"], "rf_9");
    assert_eq!(order["refund"]["status"], "Pending");
}

#[actix_web::test]
async fn refund_above_the_order_total_is_rejected() {
    let _ = env_logger::try_init().ok();
    let mut backend = MockBackend::new();
    backend.expect_fetch_order().returning(|_| Ok(Some(paid_order(2))));
    // No gateway expectations: an invalid amount must never reach the provider
    let req = with_admin_identity(refund_request(60_000), "admin:alice", "write");
    let err = try_request(req, configure_with(backend, MockGateway::new())).await.expect_err("Expected error");
    assert!(err.contains("exceeds the order total"), "unexpected error: {err}");
}

#[actix_web::test]
async fn unpaid_orders_cannot_be_refunded() {
    let _ = env_logger::try_init().ok();
    let mut backend = MockBackend::new();
    backend
        .expect_fetch_order()
        .returning(|_| Ok(Some(sample_order(2, OrderStatus::Pending, PaymentStatus::Pending))));
    let req = with_admin_identity(refund_request(50_000), "admin:alice", "write");
    let err = try_request(req, configure_with(backend, MockGateway::new())).await.expect_err("Expected error");
    assert!(err.contains("Refund not permitted"), "unexpected error: {err}");
}

#[actix_web::test]
async fn outstanding_refund_blocks_a_second_attempt() {
    let _ = env_logger::try_init().ok();
    let mut backend = MockBackend::new();
    backend.expect_fetch_order().returning(|_| {
        let mut order = paid_order(3);
        order.refund = Some(Refund {
            refund_id: "rf_1".to_string(),
            amount: Money::from(50_000),
            reason: "damaged".to_string(),
            status: RefundStatus::Pending,
            requested_at: chrono::Utc::now(),
            resolved_at: None,
        });
        Ok(Some(order))
    });
    let req = with_admin_identity(refund_request(50_000), "admin:alice", "write");
    let err = try_request(req, configure_with(backend, MockGateway::new())).await.expect_err("Expected error");
    assert!(err.contains("already has refund"), "unexpected error: {err}");
}

#[actix_web::test]
async fn provider_timeout_surfaces_as_upstream_failure() {
    let _ = env_logger::try_init().ok();
    let mut backend = MockBackend::new();
    backend.expect_fetch_order().returning(|_| Ok(Some(paid_order(2))));
    let mut gateway = MockGateway::new();
    gateway.expect_create_refund().times(1).returning(|_, _, _, _| Err(GatewayError::Timeout));
    let req = with_admin_identity(refund_request(50_000), "admin:alice", "write");
    let err = try_request(req, configure_with(backend, gateway)).await.expect_err("Expected error");
    assert!(err.contains("Could not dispatch the refund"), "unexpected error: {err}");
}

#[actix_web::test]
async fn refunds_require_the_write_role() {
    let _ = env_logger::try_init().ok();
    let req = with_admin_identity(refund_request(50_000), "admin:alice", "read_all");
    let err = try_request(req, configure_with(MockBackend::new(), MockGateway::new()))
        .await
        .expect_err("Expected error");
    assert!(err.contains("Insufficient Permissions"), "unexpected error: {err}");
}
