use std::{sync::Arc, time::Duration};

use log::*;
use reqwest::{
    header::{HeaderMap, HeaderValue},
    Client,
    Method,
};
use serde::{de::DeserializeOwned, Serialize};
use sps_common::Money;

use crate::{
    config::GatewayConfig,
    data_objects::{NewPaymentRequest, NewRefundRequest, PaymentRecord, RefundRecord},
    helpers::format_gateway_amount,
    GatewayApiError,
};

#[derive(Clone)]
pub struct GatewayApi {
    config: GatewayConfig,
    client: Arc<Client>,
}

impl GatewayApi {
    pub fn new(config: GatewayConfig) -> Result<Self, GatewayApiError> {
        let mut headers = HeaderMap::with_capacity(2);
        let val = HeaderValue::from_str(&format!("Bearer {}", config.api_key.reveal()))
            .map_err(|e| GatewayApiError::Initialization(e.to_string()))?;
        headers.insert("Authorization", val);
        headers.insert("Content-Type", HeaderValue::from_static("application/json"));
        let client = Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| GatewayApiError::Initialization(e.to_string()))?;
        Ok(Self { config, client: Arc::new(client) })
    }

    pub async fn rest_query<T: DeserializeOwned, B: Serialize>(
        &self,
        method: Method,
        path: &str,
        body: Option<B>,
    ) -> Result<T, GatewayApiError> {
        let url = self.url(path);
        trace!("Sending REST query: {url}");
        let mut req = self.client.request(method, url);
        if let Some(body) = body {
            req = req.json(&body);
        }
        let response = req.send().await.map_err(|e| {
            if e.is_timeout() {
                GatewayApiError::Timeout
            } else {
                GatewayApiError::RestResponseError(e.to_string())
            }
        })?;
        if response.status().is_success() {
            trace!("REST query successful. {}", response.status());
            response.json::<T>().await.map_err(|e| GatewayApiError::JsonError(e.to_string()))
        } else {
            let status = response.status().as_u16();
            let message = response.text().await.map_err(|e| GatewayApiError::RestResponseError(e.to_string()))?;
            Err(GatewayApiError::QueryError { status, message })
        }
    }

    pub fn url(&self, path: &str) -> String {
        format!("https://{}/{}{path}", self.config.host, self.config.api_version)
    }

    /// Register a payment for the given order with the provider. Amounts are rendered in the order's own currency;
    /// the provider echoes both back and the response is checked for a currency swap.
    pub async fn create_payment(
        &self,
        order_id: &str,
        amount: Money,
        currency: &str,
    ) -> Result<PaymentRecord, GatewayApiError> {
        let body = NewPaymentRequest {
            order_id: order_id.to_string(),
            amount: format_gateway_amount(amount, currency)?,
            currency: currency.to_string(),
        };
        debug!("Creating payment for order {order_id}: {} {currency}", body.amount);
        let payment = self.rest_query::<PaymentRecord, _>(Method::POST, "/payments", Some(body)).await?;
        self.check_currency(currency, &payment.currency)?;
        info!("Created payment {} for order {order_id}", payment.payment_reference);
        Ok(payment)
    }

    /// Fetch the provider's current view of a payment.
    pub async fn verify_payment(&self, payment_reference: &str) -> Result<PaymentRecord, GatewayApiError> {
        let path = format!("/payments/{payment_reference}");
        debug!("Verifying payment {payment_reference}");
        self.rest_query::<PaymentRecord, ()>(Method::GET, &path, None).await
    }

    /// Ask the provider to return funds against a captured payment. The provider processes refunds asynchronously;
    /// the returned record will typically still be pending.
    pub async fn create_refund(
        &self,
        payment_reference: &str,
        amount: Money,
        currency: &str,
        reason: &str,
    ) -> Result<RefundRecord, GatewayApiError> {
        let body = NewRefundRequest {
            payment_reference: payment_reference.to_string(),
            amount: format_gateway_amount(amount, currency)?,
            currency: currency.to_string(),
            reason: reason.to_string(),
        };
        debug!("Creating refund against payment {payment_reference}: {} {currency}", body.amount);
        let refund = self.rest_query::<RefundRecord, _>(Method::POST, "/refunds", Some(body)).await?;
        self.check_currency(currency, &refund.currency)?;
        info!("Created refund {} against payment {payment_reference}", refund.refund_id);
        Ok(refund)
    }

    /// Fetch the provider's current view of a refund.
    pub async fn verify_refund(&self, refund_id: &str) -> Result<RefundRecord, GatewayApiError> {
        let path = format!("/refunds/{refund_id}");
        debug!("Verifying refund {refund_id}");
        self.rest_query::<RefundRecord, ()>(Method::GET, &path, None).await
    }

    fn check_currency(&self, expected: &str, actual: &str) -> Result<(), GatewayApiError> {
        if expected == actual {
            Ok(())
        } else {
            Err(GatewayApiError::CurrencyMismatch { expected: expected.to_string(), actual: actual.to_string() })
        }
    }
}
