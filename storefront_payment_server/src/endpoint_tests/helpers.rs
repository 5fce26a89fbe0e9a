use actix_web::{http::StatusCode, test, test::TestRequest, web::ServiceConfig, App};
use chrono::{TimeZone, Utc};
use sps_common::Money;
use storefront_payment_engine::db_types::{AuditEntry, NewAuditEntry, Order, OrderId, OrderStatus, PaymentStatus};

/// Builds a test app from the given configure closure and runs the request through it. Errors raised inside the
/// service chain (auth, ACL, HMAC) come back as `Err` with their display string; error responses rendered by a
/// handler (4xx/5xx) come back as `Err` with their body; successful responses come back as the status and body.
pub async fn try_request<F>(req: TestRequest, configure: F) -> Result<(StatusCode, String), String>
where F: FnOnce(&mut ServiceConfig) {
    let app = test::init_service(App::new().configure(configure)).await;
    match test::try_call_service(&app, req.to_request()).await {
        Ok(resp) => {
            let status = resp.status();
            let body = test::read_body(resp).await;
            let body = String::from_utf8_lossy(&body).to_string();
            if status.is_client_error() || status.is_server_error() {
                Err(body)
            } else {
                Ok((status, body))
            }
        },
        Err(e) => Err(e.to_string()),
    }
}

pub fn with_admin_identity(req: TestRequest, actor: &str, roles: &str) -> TestRequest {
    req.insert_header(("x-sps-actor", actor)).insert_header(("x-sps-roles", roles))
}

/// What the real store does to a new entry: assign an id and a timestamp.
pub fn echo_audit_entry(entry: NewAuditEntry) -> AuditEntry {
    AuditEntry {
        id: 1,
        actor_id: entry.actor_id,
        action: entry.action,
        order_id: entry.order_id,
        prior_state: entry.prior_state,
        new_state: entry.new_state,
        order_version: entry.order_version,
        remote_ip: entry.remote_ip,
        user_agent: entry.user_agent,
        created_at: Utc::now(),
    }
}

pub fn sample_order(version: i64, status: OrderStatus, payment_status: PaymentStatus) -> Order {
    Order {
        id: 1,
        order_id: OrderId::from("ord-1001"),
        customer_id: "cust-42".to_string(),
        currency: "INR".to_string(),
        total_price: Money::from(50_000),
        status,
        payment_status,
        payment_reference: None,
        refund: None,
        version,
        created_at: Utc.with_ymd_and_hms(2024, 2, 29, 13, 30, 0).unwrap(),
        updated_at: Utc.with_ymd_and_hms(2024, 2, 29, 13, 30, 0).unwrap(),
    }
}
