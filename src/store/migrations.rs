//! Version-tracked database migrations for the libSQL backend.
//!
//! `run_migrations()` applies every step newer than the recorded version,
//! oldest first.

use libsql::Connection;

use crate::error::DatabaseError;

/// A single migration step.
struct Migration {
    version: i64,
    name: &'static str,
    sql: &'static str,
}

/// All migrations in order. Add new versions to the end.
static MIGRATIONS: &[Migration] = &[
    Migration {
        version: 1,
        name: "initial_schema",
        sql: r#"
            CREATE TABLE IF NOT EXISTS customer (
                customer_id      INTEGER PRIMARY KEY AUTOINCREMENT,
                customer_name    TEXT NOT NULL UNIQUE,
                customer_address TEXT NOT NULL,
                customer_phone   TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS product (
                product_id    INTEGER PRIMARY KEY AUTOINCREMENT,
                product_name  TEXT NOT NULL,
                unit          TEXT NOT NULL,
                price         TEXT NOT NULL,
                stock         INTEGER NOT NULL DEFAULT 0 CHECK (stock >= 0),
                safety_stock  INTEGER NOT NULL DEFAULT 0,
                supplier      TEXT,
                specification TEXT
            );

            CREATE TABLE IF NOT EXISTS wastage (
                id            INTEGER PRIMARY KEY AUTOINCREMENT,
                product_name  TEXT NOT NULL,
                product_id    INTEGER NOT NULL REFERENCES product(product_id),
                loss_quantity INTEGER NOT NULL CHECK (loss_quantity > 0)
            );

            CREATE TABLE IF NOT EXISTS orders (
                order_id        INTEGER PRIMARY KEY AUTOINCREMENT,
                customer_name   TEXT NOT NULL,
                delivery_method TEXT NOT NULL,
                payment_method  TEXT NOT NULL,
                total_price     TEXT NOT NULL DEFAULT '0',
                is_delivered    INTEGER NOT NULL DEFAULT 0
            );

            CREATE TABLE IF NOT EXISTS customer_order_detail (
                id          INTEGER PRIMARY KEY AUTOINCREMENT,
                customer_id INTEGER NOT NULL REFERENCES customer(customer_id),
                product_id  INTEGER NOT NULL REFERENCES product(product_id),
                order_id    INTEGER NOT NULL REFERENCES orders(order_id),
                quantity    INTEGER NOT NULL CHECK (quantity > 0),
                unit_price  TEXT NOT NULL DEFAULT '0'
            );
        "#,
    },
    Migration {
        version: 2,
        name: "timestamps",
        sql: r#"
            ALTER TABLE orders ADD COLUMN created_at TEXT;
            ALTER TABLE wastage ADD COLUMN recorded_at TEXT;
        "#,
    },
];

/// Bring the schema up to the latest version.
///
/// Each pending migration runs in its own transaction together with the
/// `_migrations` row that records it.
pub async fn run_migrations(conn: &Connection) -> Result<(), DatabaseError> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS _migrations (
            version INTEGER PRIMARY KEY,
            name TEXT NOT NULL,
            applied_at TEXT NOT NULL DEFAULT (datetime('now'))
        )",
        (),
    )
    .await
    .map_err(|e| DatabaseError::Migration(format!("_migrations table: {e}")))?;

    let mut version = applied_version(conn).await?;
    let start = version;
    for step in MIGRATIONS.iter().filter(|m| m.version > start) {
        tracing::info!(version = step.version, name = step.name, "Applying migration");
        apply(conn, step).await.map_err(|e| {
            DatabaseError::Migration(format!("V{} ({}): {e}", step.version, step.name))
        })?;
        version = step.version;
    }

    tracing::info!(version, "Schema up to date");
    Ok(())
}

async fn apply(conn: &Connection, step: &Migration) -> Result<(), libsql::Error> {
    let tx = conn.transaction().await?;
    tx.execute_batch(step.sql).await?;
    tx.execute(
        "INSERT INTO _migrations (version, name) VALUES (?1, ?2)",
        libsql::params![step.version, step.name],
    )
    .await?;
    tx.commit().await
}

/// Highest recorded migration version, 0 on a fresh database.
async fn applied_version(conn: &Connection) -> Result<i64, DatabaseError> {
    let mut rows = conn
        .query("SELECT COALESCE(MAX(version), 0) FROM _migrations", ())
        .await
        .map_err(|e| DatabaseError::Migration(format!("reading schema version: {e}")))?;
    match rows
        .next()
        .await
        .map_err(|e| DatabaseError::Migration(format!("reading schema version: {e}")))?
    {
        Some(row) => row
            .get::<i64>(0)
            .map_err(|e| DatabaseError::Migration(format!("parsing schema version: {e}"))),
        None => Ok(0),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn test_conn() -> Connection {
        let db = libsql::Builder::new_local(":memory:")
            .build()
            .await
            .unwrap();
        db.connect().unwrap()
    }

    #[tokio::test]
    async fn migrations_create_all_tables() {
        let conn = test_conn().await;
        run_migrations(&conn).await.unwrap();

        for table in &[
            "customer",
            "product",
            "orders",
            "customer_order_detail",
            "wastage",
            "_migrations",
        ] {
            let mut rows = conn
                .query(
                    "SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name=?1",
                    libsql::params![*table],
                )
                .await
                .unwrap();
            let row = rows.next().await.unwrap().unwrap();
            let count: i64 = row.get(0).unwrap();
            assert_eq!(count, 1, "Table '{}' should exist", table);
        }
    }

    #[tokio::test]
    async fn migrations_are_idempotent() {
        let conn = test_conn().await;
        run_migrations(&conn).await.unwrap();
        run_migrations(&conn).await.unwrap();

        assert_eq!(applied_version(&conn).await.unwrap(), 2);
        let mut rows = conn.query("SELECT COUNT(*) FROM _migrations", ()).await.unwrap();
        let count: i64 = rows.next().await.unwrap().unwrap().get(0).unwrap();
        assert_eq!(count, 2);
    }

    #[tokio::test]
    async fn stock_check_constraint_rejects_negative() {
        let conn = test_conn().await;
        run_migrations(&conn).await.unwrap();
        let result = conn
            .execute(
                "INSERT INTO product (product_name, unit, price, stock) VALUES ('x', '箱', '1', -1)",
                (),
            )
            .await;
        assert!(result.is_err());
    }
}
