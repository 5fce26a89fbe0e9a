// Each test binary compiles this module separately and uses a different slice of it
#![allow(dead_code)]

use std::{
    collections::{HashMap, VecDeque},
    sync::{Arc, Mutex},
};

use log::*;
use sps_common::Money;
use sqlx::{migrate::MigrateDatabase, Sqlite};
use storefront_payment_engine::{
    db_types::{NewLineItem, NewOrder, OrderId, PaymentEventOutcome, RefundStatus},
    traits::{GatewayError, GatewayPayment, GatewayRefund, PaymentGateway},
    SqliteDatabase,
};

pub async fn prepare_test_env(url: &str) {
    dotenvy::from_filename(".env.test").ok();
    let _ = env_logger::try_init();
    debug!("🚀️ Logging initialised");
    create_database(url).await;
}

pub fn random_db_path() -> String {
    format!("sqlite://{}/sps_test_store_{}.db", std::env::temp_dir().display(), rand::random::<u64>())
}

pub async fn create_database(url: &str) {
    if let Err(e) = Sqlite::drop_database(url).await {
        warn!("Error dropping database {url}: {e:?}");
    }
    Sqlite::create_database(url).await.expect("Error creating database");
    info!("Created Sqlite database {url}");
}

pub async fn new_test_db() -> SqliteDatabase {
    let url = random_db_path();
    prepare_test_env(&url).await;
    // A single connection so sequential operations in a test share one consistent view of the throwaway database
    // (a multi-connection pool lets a read land on a different connection than the write that preceded it).
    let db = SqliteDatabase::new_with_url(&url, 1).await.expect("Error creating database");
    db.run_migrations().await.expect("Error running DB migrations");
    db
}

/// A 50 000 minor-unit INR order, two line items, as the checkout flow would hand it over.
pub fn inr_order(order_id: &str) -> NewOrder {
    NewOrder::new(
        OrderId::from(order_id),
        "cust-42".to_string(),
        "INR".to_string(),
        vec![
            NewLineItem {
                product_id: "sku-kettle".to_string(),
                quantity: 1,
                unit_price: Money::from(30_000),
                line_total: Money::from(30_000),
            },
            NewLineItem {
                product_id: "sku-mug".to_string(),
                quantity: 2,
                unit_price: Money::from(10_000),
                line_total: Money::from(20_000),
            },
        ],
    )
}

#[derive(Default)]
struct TestGatewayState {
    /// Scripted responses for `create_refund`; when empty, refunds are accepted with generated ids.
    refund_dispatch: VecDeque<Result<(), GatewayError>>,
    refund_counter: u32,
    create_refund_calls: u32,
    /// payment_reference -> (order_id, outcome, amount, currency)
    payments: HashMap<String, (String, Option<PaymentEventOutcome>, Money, String)>,
    /// refund_id -> status reported by `verify_refund`
    refunds: HashMap<String, RefundStatus>,
}

/// A scriptable in-memory stand-in for the provider. Shared behind an `Arc` so clones held by the engine APIs all
/// see the same script.
#[derive(Clone, Default)]
pub struct TestGateway {
    state: Arc<Mutex<TestGatewayState>>,
}

impl TestGateway {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue an error for the next `create_refund` call. Calls beyond the queue succeed.
    pub fn fail_next_refund_dispatch(&self, error: GatewayError) {
        self.state.lock().unwrap().refund_dispatch.push_back(Err(error));
    }

    pub fn create_refund_calls(&self) -> u32 {
        self.state.lock().unwrap().create_refund_calls
    }

    /// Teach `verify_payment` about a payment.
    pub fn set_payment(
        &self,
        reference: &str,
        order_id: &str,
        outcome: Option<PaymentEventOutcome>,
        amount: Money,
        currency: &str,
    ) {
        self.state
            .lock()
            .unwrap()
            .payments
            .insert(reference.to_string(), (order_id.to_string(), outcome, amount, currency.to_string()));
    }

    /// Teach `verify_refund` about a refund's provider-side status.
    pub fn set_refund_status(&self, refund_id: &str, status: RefundStatus) {
        self.state.lock().unwrap().refunds.insert(refund_id.to_string(), status);
    }
}

impl PaymentGateway for TestGateway {
    async fn create_payment(
        &self,
        order_id: &OrderId,
        amount: Money,
        currency: &str,
    ) -> Result<GatewayPayment, GatewayError> {
        Ok(GatewayPayment {
            payment_reference: format!("pay-{}", order_id.as_str()),
            order_id: order_id.clone(),
            amount,
            currency: currency.to_string(),
            outcome: None,
        })
    }

    async fn verify_payment(&self, payment_reference: &str) -> Result<GatewayPayment, GatewayError> {
        let state = self.state.lock().unwrap();
        match state.payments.get(payment_reference) {
            Some((order_id, outcome, amount, currency)) => Ok(GatewayPayment {
                payment_reference: payment_reference.to_string(),
                order_id: OrderId::from(order_id.as_str()),
                amount: *amount,
                currency: currency.clone(),
                outcome: *outcome,
            }),
            None => Err(GatewayError::Rejected(format!("Unknown payment {payment_reference}"))),
        }
    }

    async fn create_refund(
        &self,
        payment_reference: &str,
        amount: Money,
        currency: &str,
        _reason: &str,
    ) -> Result<GatewayRefund, GatewayError> {
        let mut state = self.state.lock().unwrap();
        state.create_refund_calls += 1;
        if let Some(scripted) = state.refund_dispatch.pop_front() {
            scripted?;
        }
        state.refund_counter += 1;
        let refund_id = format!("rf-{}", state.refund_counter);
        state.refunds.insert(refund_id.clone(), RefundStatus::Pending);
        Ok(GatewayRefund {
            refund_id,
            payment_reference: payment_reference.to_string(),
            amount,
            currency: currency.to_string(),
            status: RefundStatus::Pending,
        })
    }

    async fn verify_refund(&self, refund_id: &str) -> Result<GatewayRefund, GatewayError> {
        let state = self.state.lock().unwrap();
        let status = state.refunds.get(refund_id).copied().unwrap_or(RefundStatus::Pending);
        Ok(GatewayRefund {
            refund_id: refund_id.to_string(),
            payment_reference: String::new(),
            amount: Money::from(0),
            currency: String::new(),
            status,
        })
    }
}
