use actix_web::{http::StatusCode, test::TestRequest, web, web::ServiceConfig};
use serde_json::Value;
use sps_common::Secret;
use storefront_payment_engine::{
    db_types::{OrderStatus, PaymentStatus, Refund, RefundStatus},
    helpers::BackoffPolicy,
    PaymentReconciler,
    RefundCoordinator,
};

use super::{
    helpers::{echo_audit_entry, sample_order, try_request},
    mocks::{MockBackend, MockGateway, SharedBackend, SharedGateway},
};
use crate::{
    config::GATEWAY_HMAC_HEADER,
    helpers::calculate_hmac,
    middleware::HmacMiddlewareFactory,
    webhook_routes,
};

const WEBHOOK_SECRET: &str = "test-webhook-secret";

fn configure_with(backend: MockBackend, hmac_checks: bool) -> impl FnOnce(&mut ServiceConfig) {
    move |cfg| {
        let db = SharedBackend::new(backend);
        let gateway = SharedGateway::new(MockGateway::new());
        let reconciler = PaymentReconciler::new(db.clone(), gateway.clone(), BackoffPolicy::no_retries());
        let refunds = RefundCoordinator::new(db, gateway, BackoffPolicy::no_retries());
        cfg.app_data(web::Data::new(reconciler)).app_data(web::Data::new(refunds)).service(
            web::scope("/gateway")
                .wrap(HmacMiddlewareFactory::new(
                    GATEWAY_HMAC_HEADER,
                    Secret::new(WEBHOOK_SECRET.to_string()),
                    hmac_checks,
                ))
                .configure(webhook_routes::configure_webhooks::<SharedBackend, SharedGateway>),
        );
    }
}

fn signed_post(uri: &str, body: &str) -> TestRequest {
    TestRequest::post()
        .uri(uri)
        .insert_header(("Content-Type", "application/json"))
        .insert_header((GATEWAY_HMAC_HEADER, calculate_hmac(WEBHOOK_SECRET, body.as_bytes())))
        .set_payload(body.to_string())
}

fn captured_payment_body() -> String {
    serde_json::json!({
        "event_id": "evt_1",
        "order_id": "ord-1001",
        "payment_reference": "pay_123",
        "status": "captured",
        "amount": "500.00",
        "currency": "INR"
    })
    .to_string()
}

#[actix_web::test]
async fn signed_payment_webhook_reconciles_the_order() {
    let _ = env_logger::try_init().ok();
    let mut backend = MockBackend::new();
    backend
        .expect_fetch_order()
        .returning(|_| Ok(Some(sample_order(1, OrderStatus::Pending, PaymentStatus::Pending))));
    backend
        .expect_update_order()
        .withf(|_, expected_version, patch| {
            *expected_version == 1 &&
                patch.payment_status == Some(PaymentStatus::Paid) &&
                patch.payment_reference.as_deref() == Some("pay_123")
        })
        .returning(|_, _, patch| {
            let mut order = sample_order(2, OrderStatus::Pending, PaymentStatus::Paid);
            order.payment_reference = patch.payment_reference;
            Ok(order)
        });
    backend.expect_append_audit_entry().times(1).returning(|entry| Ok(echo_audit_entry(entry)));
    let body = captured_payment_body();
    let (status, body) =
        try_request(signed_post("/gateway/webhook/payment", &body), configure_with(backend, true))
            .await
            .expect("Request failed");
    assert_eq!(status, StatusCode::OK);
    let response: Value = serde_json::from_str(&body).unwrap();
    assert_eq!(response["success"], true);
    assert_eq!(response["message"], "Event applied.");
}

#[actix_web::test]
async fn redelivered_payment_webhook_is_a_no_op() {
    let _ = env_logger::try_init().ok();
    let mut backend = MockBackend::new();
    // Already paid with the same reference; no update_order or audit expectations, so any write would panic
    backend.expect_fetch_order().returning(|_| {
        let mut order = sample_order(2, OrderStatus::Pending, PaymentStatus::Paid);
        order.payment_reference = Some("pay_123".to_string());
        Ok(Some(order))
    });
    let body = captured_payment_body();
    let (status, body) =
        try_request(signed_post("/gateway/webhook/payment", &body), configure_with(backend, true))
            .await
            .expect("Request failed");
    assert_eq!(status, StatusCode::OK);
    let response: Value = serde_json::from_str(&body).unwrap();
    assert_eq!(response["success"], true);
    assert_eq!(response["message"], "Event already applied.");
}

#[actix_web::test]
async fn unsigned_webhook_is_rejected() {
    let _ = env_logger::try_init().ok();
    let body = captured_payment_body();
    let req = TestRequest::post()
        .uri("/gateway/webhook/payment")
        .insert_header(("Content-Type", "application/json"))
        .set_payload(body);
    let err = try_request(req, configure_with(MockBackend::new(), true)).await.expect_err("Expected error");
    assert!(err.contains("No HMAC signature found"), "unexpected error: {err}");
}

#[actix_web::test]
async fn forged_webhook_is_rejected() {
    let _ = env_logger::try_init().ok();
    let body = captured_payment_body();
    let req = TestRequest::post()
        .uri("/gateway/webhook/payment")
        .insert_header(("Content-Type", "application/json"))
        .insert_header((GATEWAY_HMAC_HEADER, calculate_hmac("wrong-secret", body.as_bytes())))
        .set_payload(body);
    let err = try_request(req, configure_with(MockBackend::new(), true)).await.expect_err("Expected error");
    assert!(err.contains("Invalid HMAC signature"), "unexpected error: {err}");
}

#[actix_web::test]
async fn refund_webhook_marks_a_failed_refund_retryable() {
    let _ = env_logger::try_init().ok();
    let mut backend = MockBackend::new();
    backend.expect_fetch_order_by_refund_id().returning(|refund_id| {
        let mut order = sample_order(3, OrderStatus::Processing, PaymentStatus::Paid);
        order.payment_reference = Some("pay_123".to_string());
        order.refund = Some(Refund {
            refund_id: refund_id.to_string(),
            amount: 50_000.into(),
            reason: "damaged".to_string(),
            status: RefundStatus::Pending,
            requested_at: chrono::Utc::now(),
            resolved_at: None,
        });
        Ok(Some(order))
    });
    backend
        .expect_update_order()
        .withf(|_, expected_version, patch| {
            *expected_version == 3 &&
                patch.status.is_none() &&
                patch.refund.as_ref().map(|r| r.status == RefundStatus::Failed) == Some(true)
        })
        .returning(|_, _, patch| {
            let mut order = sample_order(4, OrderStatus::Processing, PaymentStatus::Paid);
            order.refund = patch.refund;
            Ok(order)
        });
    backend.expect_append_audit_entry().times(1).returning(|entry| Ok(echo_audit_entry(entry)));
    let body = serde_json::json!({
        "event_id": "evt_9",
        "refund_id": "rf_9",
        "payment_reference": "pay_123",
        "status": "failed"
    })
    .to_string();
    let (status, body) =
        try_request(signed_post("/gateway/webhook/refund", &body), configure_with(backend, true))
            .await
            .expect("Request failed");
    assert_eq!(status, StatusCode::OK);
    let response: Value = serde_json::from_str(&body).unwrap();
    assert_eq!(response["success"], true);
}
