use log::trace;
use sqlx::{QueryBuilder, SqliteConnection};

use crate::{
    db_types::{AuditEntry, NewAuditEntry},
    spe_api::objects::AuditQueryFilter,
};

const DEFAULT_SEARCH_LIMIT: i64 = 200;

/// Appends one entry to the ledger. There is no update or delete counterpart; the schema enforces that with
/// triggers.
pub async fn insert_entry(entry: NewAuditEntry, conn: &mut SqliteConnection) -> Result<AuditEntry, sqlx::Error> {
    let inserted = sqlx::query_as(
        r#"
            INSERT INTO audit_log (
                actor_id,
                action,
                order_id,
                prior_state,
                new_state,
                order_version,
                remote_ip,
                user_agent
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING *;
        "#,
    )
    .bind(entry.actor_id)
    .bind(entry.action.to_string())
    .bind(entry.order_id)
    .bind(entry.prior_state.to_string())
    .bind(entry.new_state.to_string())
    .bind(entry.order_version)
    .bind(entry.remote_ip)
    .bind(entry.user_agent)
    .fetch_one(conn)
    .await?;
    Ok(inserted)
}

/// Fetches entries according to the criteria in the filter, newest first.
pub async fn search_entries(
    query: AuditQueryFilter,
    conn: &mut SqliteConnection,
) -> Result<Vec<AuditEntry>, sqlx::Error> {
    let mut builder = QueryBuilder::new(
        r#"
    SELECT * FROM audit_log
    "#,
    );
    let has_filters = query.actor_id.is_some() ||
        query.order_id.is_some() ||
        query.action.is_some() ||
        query.since.is_some() ||
        query.until.is_some();
    if has_filters {
        builder.push("WHERE ");
    }
    let mut where_clause = builder.separated(" AND ");
    if let Some(actor_id) = query.actor_id {
        where_clause.push("actor_id = ");
        where_clause.push_bind_unseparated(actor_id);
    }
    if let Some(order_id) = query.order_id {
        where_clause.push("order_id = ");
        where_clause.push_bind_unseparated(order_id.0);
    }
    if let Some(action) = query.action {
        where_clause.push("action = ");
        where_clause.push_bind_unseparated(action.to_string());
    }
    if let Some(since) = query.since {
        where_clause.push("created_at >= ");
        where_clause.push_bind_unseparated(since);
    }
    if let Some(until) = query.until {
        where_clause.push("created_at <= ");
        where_clause.push_bind_unseparated(until);
    }
    builder.push(" ORDER BY id DESC LIMIT ");
    builder.push_bind(query.limit.unwrap_or(DEFAULT_SEARCH_LIMIT));

    trace!("🧾 Executing query: {}", builder.sql());
    let entries = builder.build_query_as::<AuditEntry>().fetch_all(conn).await?;
    trace!("🧾 Result of search_entries: {:?}", entries.len());
    Ok(entries)
}
