use log::{debug, trace};
use sqlx::{QueryBuilder, SqliteConnection};

use crate::{
    db_types::{LineItem, NewOrder, Order, OrderId},
    spe_api::objects::OrderQueryFilter,
    traits::{OrderPatch, OrderStoreError},
};

/// Inserts the order into the database, returning `false` in the second parameter if the order already exists.
pub async fn idempotent_insert(
    order: NewOrder,
    conn: &mut SqliteConnection,
) -> Result<(Order, bool), OrderStoreError> {
    order.validate().map_err(|e| OrderStoreError::InvalidOrder(e.to_string()))?;
    let inserted = match fetch_order_by_order_id(&order.order_id, conn).await? {
        Some(order) => (order, false),
        None => {
            let order = insert_order(order, conn).await?;
            debug!("📝️ Order [{}] inserted with id {}", order.order_id, order.id);
            (order, true)
        },
    };
    Ok(inserted)
}

/// Inserts a new order and its line items using the given connection. This is not atomic on its own. You can embed
/// this call inside a transaction if you need atomicity, and pass `&mut *tx` as the connection argument.
async fn insert_order(order: NewOrder, conn: &mut SqliteConnection) -> Result<Order, OrderStoreError> {
    let inserted: Order = sqlx::query_as(
        r#"
            INSERT INTO orders (
                order_id,
                customer_id,
                currency,
                total_price,
                payment_reference,
                created_at
            ) VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING *;
        "#,
    )
    .bind(order.order_id.clone())
    .bind(order.customer_id)
    .bind(order.currency)
    .bind(order.total_price)
    .bind(order.payment_reference)
    .bind(order.created_at)
    .fetch_one(&mut *conn)
    .await?;
    for item in order.items {
        sqlx::query(
            "INSERT INTO order_items (order_id, product_id, quantity, unit_price, line_total) VALUES ($1, $2, $3, \
             $4, $5)",
        )
        .bind(order.order_id.as_str())
        .bind(item.product_id)
        .bind(item.quantity)
        .bind(item.unit_price)
        .bind(item.line_total)
        .execute(&mut *conn)
        .await?;
    }
    Ok(inserted)
}

pub async fn fetch_order_by_order_id(
    order_id: &OrderId,
    conn: &mut SqliteConnection,
) -> Result<Option<Order>, sqlx::Error> {
    let order =
        sqlx::query_as("SELECT * FROM orders WHERE order_id = $1").bind(order_id.as_str()).fetch_optional(conn).await?;
    Ok(order)
}

/// Returns the order carrying the given provider-issued refund id, if any. The unique index on `refund_id`
/// guarantees at most one match.
pub async fn fetch_order_by_refund_id(
    refund_id: &str,
    conn: &mut SqliteConnection,
) -> Result<Option<Order>, sqlx::Error> {
    let order =
        sqlx::query_as("SELECT * FROM orders WHERE refund_id = $1").bind(refund_id).fetch_optional(conn).await?;
    Ok(order)
}

pub async fn fetch_items_for_order(
    order_id: &OrderId,
    conn: &mut SqliteConnection,
) -> Result<Vec<LineItem>, sqlx::Error> {
    let items = sqlx::query_as("SELECT * FROM order_items WHERE order_id = $1 ORDER BY id ASC")
        .bind(order_id.as_str())
        .fetch_all(conn)
        .await?;
    Ok(items)
}

/// Fetches orders according to criteria specified in the `OrderQueryFilter`.
///
/// Resulting orders are ordered by `created_at`, newest first.
pub async fn search_orders(query: OrderQueryFilter, conn: &mut SqliteConnection) -> Result<Vec<Order>, sqlx::Error> {
    let mut builder = QueryBuilder::new(
        r#"
    SELECT * FROM orders
    "#,
    );
    if !query.is_empty() {
        builder.push("WHERE ");
    }
    let mut where_clause = builder.separated(" AND ");
    if let Some(order_id) = query.order_id {
        where_clause.push("order_id = ");
        where_clause.push_bind_unseparated(order_id.0);
    }
    if let Some(cid) = query.customer_id {
        where_clause.push("customer_id = ");
        where_clause.push_bind_unseparated(cid);
    }
    if let Some(currency) = query.currency {
        where_clause.push("currency = ");
        where_clause.push_bind_unseparated(currency);
    }
    if query.status.as_ref().map(|s| !s.is_empty()).unwrap_or(false) {
        let statuses =
            query.status.as_ref().unwrap().iter().map(|s| format!("'{s}'")).collect::<Vec<_>>().join(",");
        where_clause.push(format!("status IN ({statuses})"));
    }
    if query.payment_status.as_ref().map(|s| !s.is_empty()).unwrap_or(false) {
        let statuses =
            query.payment_status.as_ref().unwrap().iter().map(|s| format!("'{s}'")).collect::<Vec<_>>().join(",");
        where_clause.push(format!("payment_status IN ({statuses})"));
    }
    if query.refund_status.as_ref().map(|s| !s.is_empty()).unwrap_or(false) {
        let statuses =
            query.refund_status.as_ref().unwrap().iter().map(|s| format!("'{s}'")).collect::<Vec<_>>().join(",");
        where_clause.push(format!("refund_status IN ({statuses})"));
    }
    if let Some(since) = query.since {
        where_clause.push("created_at >= ");
        where_clause.push_bind_unseparated(since);
    }
    if let Some(until) = query.until {
        where_clause.push("created_at <= ");
        where_clause.push_bind_unseparated(until);
    }
    builder.push(" ORDER BY created_at DESC");

    trace!("📝️ Executing query: {}", builder.sql());
    let query = builder.build_query_as::<Order>();
    let orders = query.fetch_all(conn).await?;
    trace!("📝️ Result of search_orders: {:?}", orders.len());
    Ok(orders)
}

/// The conditional update primitive: applies the patch if and only if the stored version still equals
/// `expected_version`, bumping the version in the same statement. This is the only place order rows are written.
pub async fn update_order_checked(
    order_id: &OrderId,
    expected_version: i64,
    patch: OrderPatch,
    conn: &mut SqliteConnection,
) -> Result<Order, OrderStoreError> {
    if patch.is_empty() {
        debug!("📝️ No fields to update for order {order_id}. Update request skipped.");
        return Err(OrderStoreError::EmptyUpdate);
    }
    let mut builder =
        QueryBuilder::new("UPDATE orders SET updated_at = CURRENT_TIMESTAMP, version = version + 1, ");
    let mut set_clause = builder.separated(", ");
    if let Some(status) = patch.status {
        set_clause.push("status = ");
        set_clause.push_bind_unseparated(status.to_string());
    }
    if let Some(payment_status) = patch.payment_status {
        set_clause.push("payment_status = ");
        set_clause.push_bind_unseparated(payment_status.to_string());
    }
    if let Some(reference) = patch.payment_reference {
        set_clause.push("payment_reference = ");
        set_clause.push_bind_unseparated(reference);
    }
    if let Some(refund) = patch.refund {
        set_clause.push("refund_id = ");
        set_clause.push_bind_unseparated(refund.refund_id);
        set_clause.push("refund_amount = ");
        set_clause.push_bind_unseparated(refund.amount);
        set_clause.push("refund_reason = ");
        set_clause.push_bind_unseparated(refund.reason);
        set_clause.push("refund_status = ");
        set_clause.push_bind_unseparated(refund.status.to_string());
        set_clause.push("refund_requested_at = ");
        set_clause.push_bind_unseparated(refund.requested_at);
        set_clause.push("refund_resolved_at = ");
        set_clause.push_bind_unseparated(refund.resolved_at);
    }
    builder.push(" WHERE order_id = ");
    builder.push_bind(order_id.as_str());
    builder.push(" AND version = ");
    builder.push_bind(expected_version);
    builder.push(" RETURNING *");
    trace!("📝️ Executing query: {}", builder.sql());
    let updated = builder.build_query_as::<Order>().fetch_optional(&mut *conn).await?;
    match updated {
        Some(order) => Ok(order),
        // No row matched: either the order is gone or someone else won the version race. Look again to say which.
        None => match fetch_order_by_order_id(order_id, conn).await? {
            Some(current) => Err(OrderStoreError::VersionConflict {
                order_id: order_id.clone(),
                expected: expected_version,
                actual: current.version,
            }),
            None => Err(OrderStoreError::OrderNotFound(order_id.clone())),
        },
    }
}
