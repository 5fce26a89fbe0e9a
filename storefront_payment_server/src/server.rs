use std::time::Duration;

use actix_web::{dev::Server, http::KeepAlive, middleware::Logger, web, App, HttpServer};
use log::info;
use storefront_payment_engine::{AdminApi, PaymentReconciler, RefundCoordinator, SqliteDatabase};

use crate::{
    config::{ServerConfig, ServerOptions, GATEWAY_HMAC_HEADER},
    errors::ServerError,
    integrations::gateway::RestPaymentGateway,
    middleware::HmacMiddlewareFactory,
    poll_worker::start_poll_worker,
    routes::{self, health},
    webhook_routes,
};

pub async fn run_server(config: ServerConfig) -> Result<(), ServerError> {
    let db = SqliteDatabase::new_with_url(&config.database_url, 25)
        .await
        .map_err(|e| ServerError::InitializeError(e.to_string()))?;
    db.run_migrations().await.map_err(|e| ServerError::InitializeError(e.to_string()))?;
    let gateway = RestPaymentGateway::new(config.gateway.clone())?;
    let _sweep =
        start_poll_worker(db.clone(), gateway.clone(), config.backoff, config.poll_interval, config.poll_pending_age);
    info!("💻️ Database and provider client ready");
    let srv = create_server_instance(config, db, gateway)?;
    srv.await.map_err(|e| ServerError::Unspecified(e.to_string()))
}

pub fn create_server_instance(
    config: ServerConfig,
    db: SqliteDatabase,
    gateway: RestPaymentGateway,
) -> Result<Server, ServerError> {
    let host = config.host.clone();
    let port = config.port;
    let srv = HttpServer::new(move || {
        let refunds = RefundCoordinator::new(db.clone(), gateway.clone(), config.backoff);
        let reconciler = PaymentReconciler::new(db.clone(), gateway.clone(), config.backoff);
        let admin_api = AdminApi::new(db.clone(), refunds.clone());
        let options = ServerOptions::from_config(&config);
        let app = App::new()
            .wrap(Logger::new("%t (%D ms) %s %a %{Host}i %U").log_target("sps::access_log"))
            .app_data(web::Data::new(admin_api))
            .app_data(web::Data::new(reconciler))
            .app_data(web::Data::new(refunds))
            .app_data(web::Data::new(options));
        let api_scope =
            web::scope("/api").configure(routes::configure_api::<SqliteDatabase, RestPaymentGateway>);
        let webhook_scope = web::scope("/gateway")
            .wrap(HmacMiddlewareFactory::new(
                GATEWAY_HMAC_HEADER,
                config.gateway.webhook_secret.clone(),
                config.hmac_checks,
            ))
            .configure(webhook_routes::configure_webhooks::<SqliteDatabase, RestPaymentGateway>);
        app.service(health).service(api_scope).service(webhook_scope)
    })
    .keep_alive(KeepAlive::Timeout(Duration::from_secs(600)))
    .bind((host.as_str(), port))?
    .run();
    Ok(srv)
}
