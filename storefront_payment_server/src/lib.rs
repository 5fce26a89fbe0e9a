//! # Storefront payment server
//! This crate hosts the HTTP surface for the payment engine. It is responsible for:
//! * the admin console REST API (order search, order detail, fulfillment transitions, refunds, audit search),
//! * listening for incoming webhook notifications from the payment provider and feeding them to the reconciler,
//! * the background sweep that polls the provider for payments and refunds stuck in flight.
//!
//! ## Configuration
//! The server is configured via environment variables. See [config](config/index.html) for more information.
//!
//! ## Routes
//! * `/health`: a health check route that returns a 200 OK response.
//! * `/api/...`: the admin console API. Requests carry the authenticated actor identity in trusted headers
//!   installed by the auth layer in front of this service.
//! * `/gateway/webhook/...`: provider notifications, HMAC-signed.
pub mod auth;
pub mod cli;
pub mod config;
pub mod data_objects;
pub mod errors;

pub mod helpers;
pub mod integrations;
pub mod middleware;
pub mod poll_worker;
pub mod routes;
pub mod server;
pub mod webhook_routes;

#[cfg(test)]
mod endpoint_tests;
