//! `SqliteDatabase` is a concrete implementation of a storefront payment engine backend.
//!
//! Unsurprisingly, it uses SQLite as the backend and implements the storage traits defined in the [`crate::traits`]
//! module.
use std::fmt::Debug;

use log::*;
use sqlx::SqlitePool;

use super::db::{audit, db_url, new_pool, orders};
use crate::{
    db_types::{AuditEntry, LineItem, NewAuditEntry, NewOrder, Order, OrderId},
    spe_api::objects::{AuditQueryFilter, OrderQueryFilter},
    traits::{AuditStore, AuditStoreError, OrderPatch, OrderStore, OrderStoreError},
};

#[derive(Clone)]
pub struct SqliteDatabase {
    url: String,
    pool: SqlitePool,
}

impl Debug for SqliteDatabase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "SqliteDatabase ({:?})", self.pool)
    }
}

impl OrderStore for SqliteDatabase {
    async fn insert_order(&self, order: NewOrder) -> Result<(Order, bool), OrderStoreError> {
        let mut tx = self.pool.begin().await?;
        let (order, inserted) = orders::idempotent_insert(order, &mut tx).await?;
        tx.commit().await?;
        if inserted {
            debug!("🗃️ Order {} has been saved in the DB with id {}", order.order_id, order.id);
        } else {
            debug!("🗃️ Order {} was already present. Nothing to do.", order.order_id);
        }
        Ok((order, inserted))
    }

    async fn fetch_order(&self, order_id: &OrderId) -> Result<Option<Order>, OrderStoreError> {
        let mut conn = self.pool.acquire().await?;
        let order = orders::fetch_order_by_order_id(order_id, &mut conn).await?;
        Ok(order)
    }

    async fn fetch_order_items(&self, order_id: &OrderId) -> Result<Vec<LineItem>, OrderStoreError> {
        let mut conn = self.pool.acquire().await?;
        let items = orders::fetch_items_for_order(order_id, &mut conn).await?;
        Ok(items)
    }

    async fn fetch_order_by_refund_id(&self, refund_id: &str) -> Result<Option<Order>, OrderStoreError> {
        let mut conn = self.pool.acquire().await?;
        let order = orders::fetch_order_by_refund_id(refund_id, &mut conn).await?;
        Ok(order)
    }

    async fn search_orders(&self, query: OrderQueryFilter) -> Result<Vec<Order>, OrderStoreError> {
        let mut conn = self.pool.acquire().await?;
        let orders = orders::search_orders(query, &mut conn).await?;
        Ok(orders)
    }

    async fn update_order(
        &self,
        order_id: &OrderId,
        expected_version: i64,
        patch: OrderPatch,
    ) -> Result<Order, OrderStoreError> {
        let mut conn = self.pool.acquire().await?;
        let order = orders::update_order_checked(order_id, expected_version, patch, &mut conn).await?;
        trace!("🗃️ Order {} is now at version {}", order.order_id, order.version);
        Ok(order)
    }
}

impl AuditStore for SqliteDatabase {
    async fn append_audit_entry(&self, entry: NewAuditEntry) -> Result<AuditEntry, AuditStoreError> {
        let mut conn = self.pool.acquire().await?;
        let entry = audit::insert_entry(entry, &mut conn).await?;
        debug!("🧾 Audit entry #{} recorded: {} on {} by {}", entry.id, entry.action, entry.order_id, entry.actor_id);
        Ok(entry)
    }

    async fn search_audit_entries(&self, query: AuditQueryFilter) -> Result<Vec<AuditEntry>, AuditStoreError> {
        let mut conn = self.pool.acquire().await?;
        let entries = audit::search_entries(query, &mut conn).await?;
        Ok(entries)
    }
}

impl SqliteDatabase {
    /// Creates a new database API object
    pub async fn new(max_connections: u32) -> Result<Self, sqlx::Error> {
        let url = db_url();
        SqliteDatabase::new_with_url(url.as_str(), max_connections).await
    }

    pub async fn new_with_url(url: &str, max_connections: u32) -> Result<Self, sqlx::Error> {
        trace!("Creating new database connection pool with url {url}");
        let pool = new_pool(url, max_connections).await?;
        let url = url.to_string();
        Ok(Self { url, pool })
    }

    /// Applies the embedded migrations. The server binary runs this on startup; tests run it against throwaway
    /// databases.
    pub async fn run_migrations(&self) -> Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        info!("🗃️ Migrations complete");
        Ok(())
    }

    pub fn url(&self) -> &str {
        self.url.as_str()
    }

    /// Returns a reference to the database connection pool.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }
}
