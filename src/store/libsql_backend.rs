//! libSQL backend: async `Database` trait implementation.
//!
//! Supports local file and in-memory databases. All access goes through one
//! connection guarded by an async mutex, so a transaction never interleaves
//! with another request's statements.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use libsql::{Connection, Database as LibSqlDatabase, TransactionBehavior, params};
use rust_decimal::Decimal;
use tokio::sync::{Mutex, MutexGuard};
use tracing::{debug, info, warn};

use crate::error::{DatabaseError, OrderError};
use crate::orders::model::{
    AdminTable, ConfirmedOrder, Customer, CustomerRegistration, OrderDetail, OrderDetailLine,
    OrderRequest, OrderSummary, Product, TableDump, WastageRecord,
};
use crate::orders::pricing::{price_items, resolve_product};
use crate::store::traits::Database;
use crate::store::{migrations, seed};

/// libSQL database backend.
pub struct LibSqlBackend {
    #[allow(dead_code)]
    db: Arc<LibSqlDatabase>,
    conn: Mutex<Connection>,
}

impl LibSqlBackend {
    /// Open (or create) a local database file and run migrations.
    pub async fn new_local(path: &Path) -> Result<Self, DatabaseError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                DatabaseError::Pool(format!("Failed to create database directory: {e}"))
            })?;
        }

        let db = libsql::Builder::new_local(path)
            .build()
            .await
            .map_err(|e| DatabaseError::Pool(format!("Failed to open libSQL database: {e}")))?;

        let backend = Self::from_database(db).await?;
        info!(path = %path.display(), "Database opened");
        Ok(backend)
    }

    /// Create an in-memory database (for tests).
    pub async fn new_memory() -> Result<Self, DatabaseError> {
        let db = libsql::Builder::new_local(":memory:")
            .build()
            .await
            .map_err(|e| {
                DatabaseError::Pool(format!("Failed to create in-memory database: {e}"))
            })?;
        Self::from_database(db).await
    }

    async fn from_database(db: LibSqlDatabase) -> Result<Self, DatabaseError> {
        let conn = db
            .connect()
            .map_err(|e| DatabaseError::Pool(format!("Failed to create connection: {e}")))?;
        conn.execute("PRAGMA foreign_keys = ON", ())
            .await
            .map_err(|e| DatabaseError::Pool(format!("Failed to enable foreign keys: {e}")))?;

        let backend = Self {
            db: Arc::new(db),
            conn: Mutex::new(conn),
        };
        backend.init_schema().await?;
        Ok(backend)
    }

    /// Lock the connection for the duration of one operation.
    async fn conn(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().await
    }
}

// ── Helper functions ────────────────────────────────────────────────

fn parse_decimal(column: &str, raw: &str) -> Result<Decimal, DatabaseError> {
    raw.parse::<Decimal>()
        .map_err(|e| DatabaseError::Serialization(format!("{column} '{raw}': {e}")))
}

const PRODUCT_COLUMNS: &str =
    "product_id, product_name, unit, price, stock, safety_stock, supplier, specification";

const ORDER_COLUMNS: &str =
    "order_id, customer_name, delivery_method, payment_method, total_price, is_delivered, created_at";

/// Map a libsql Row to a Product. Column order matches PRODUCT_COLUMNS.
fn row_to_product(row: &libsql::Row) -> Result<Product, DatabaseError> {
    let read = |e: libsql::Error| DatabaseError::Query(format!("product row: {e}"));
    let price: String = row.get(3).map_err(read)?;
    Ok(Product {
        product_id: row.get(0).map_err(read)?,
        product_name: row.get(1).map_err(read)?,
        unit: row.get(2).map_err(read)?,
        price: parse_decimal("price", &price)?,
        stock: row.get(4).map_err(read)?,
        safety_stock: row.get(5).map_err(read)?,
        supplier: row.get::<String>(6).ok(),
        specification: row.get::<String>(7).ok(),
    })
}

/// Map a libsql Row to an OrderSummary. Column order matches ORDER_COLUMNS.
fn row_to_order(row: &libsql::Row) -> Result<OrderSummary, DatabaseError> {
    let read = |e: libsql::Error| DatabaseError::Query(format!("order row: {e}"));
    let total: String = row.get(4).map_err(read)?;
    let delivered: i64 = row.get(5).map_err(read)?;
    Ok(OrderSummary {
        order_id: row.get(0).map_err(read)?,
        customer_name: row.get(1).map_err(read)?,
        delivery_method: row.get(2).map_err(read)?,
        payment_method: row.get(3).map_err(read)?,
        total_price: parse_decimal("total_price", &total)?,
        is_delivered: delivered != 0,
        created_at: row.get::<String>(6).ok(),
    })
}

fn row_to_customer(row: &libsql::Row) -> Result<Customer, DatabaseError> {
    let read = |e: libsql::Error| DatabaseError::Query(format!("customer row: {e}"));
    Ok(Customer {
        customer_id: row.get(0).map_err(read)?,
        customer_name: row.get(1).map_err(read)?,
        customer_address: row.get(2).map_err(read)?,
        customer_phone: row.get(3).map_err(read)?,
    })
}

fn value_to_json(value: libsql::Value) -> serde_json::Value {
    match value {
        libsql::Value::Null => serde_json::Value::Null,
        libsql::Value::Integer(i) => serde_json::json!(i),
        libsql::Value::Real(f) => serde_json::json!(f),
        libsql::Value::Text(s) => serde_json::Value::String(s),
        libsql::Value::Blob(b) => serde_json::json!(b),
    }
}

async fn load_products(
    conn: &Connection,
    pattern: Option<&str>,
) -> Result<Vec<Product>, DatabaseError> {
    let mut rows = match pattern {
        Some(p) => {
            conn.query(
                &format!(
                    "SELECT {PRODUCT_COLUMNS} FROM product WHERE instr(product_name, ?1) > 0 ORDER BY product_id"
                ),
                params![p],
            )
            .await
        }
        None => {
            conn.query(
                &format!("SELECT {PRODUCT_COLUMNS} FROM product ORDER BY product_id"),
                (),
            )
            .await
        }
    }
    .map_err(|e| DatabaseError::Query(format!("load_products: {e}")))?;

    let mut products = Vec::new();
    while let Some(row) = rows
        .next()
        .await
        .map_err(|e| DatabaseError::Query(format!("load_products: {e}")))?
    {
        products.push(row_to_product(&row)?);
    }
    Ok(products)
}

async fn find_customer(conn: &Connection, name: &str) -> Result<Option<Customer>, DatabaseError> {
    let mut rows = conn
        .query(
            "SELECT customer_id, customer_name, customer_address, customer_phone
             FROM customer WHERE customer_name = ?1",
            params![name],
        )
        .await
        .map_err(|e| DatabaseError::Query(format!("find_customer: {e}")))?;

    match rows.next().await {
        Ok(Some(row)) => Ok(Some(row_to_customer(&row)?)),
        Ok(None) => Ok(None),
        Err(e) => Err(DatabaseError::Query(format!("find_customer: {e}"))),
    }
}

/// Decrement stock, refusing to go below zero.
async fn decrement_stock(
    conn: &Connection,
    product: &str,
    product_id: i64,
    quantity: i64,
) -> Result<(), OrderError> {
    let changed = conn
        .execute(
            "UPDATE product SET stock = stock - ?1 WHERE product_id = ?2 AND stock >= ?1",
            params![quantity, product_id],
        )
        .await
        .map_err(|e| DatabaseError::Query(format!("decrement_stock: {e}")))?;
    if changed == 1 {
        return Ok(());
    }

    let mut rows = conn
        .query(
            "SELECT stock FROM product WHERE product_id = ?1",
            params![product_id],
        )
        .await
        .map_err(|e| DatabaseError::Query(format!("decrement_stock: {e}")))?;
    let row = rows
        .next()
        .await
        .map_err(|e| DatabaseError::Query(format!("decrement_stock: {e}")))?
        .ok_or_else(|| DatabaseError::Query(format!("decrement_stock: no product {product_id}")))?;
    let stock: i64 = row
        .get(0)
        .map_err(|e| DatabaseError::Query(format!("decrement_stock: {e}")))?;
    Err(OrderError::InsufficientStock {
        product: product.to_string(),
        stock,
        requested: quantity,
    })
}

/// Body of the confirm transaction. Every read happens inside the
/// transaction so stock is validated against what will be written.
async fn confirm_in_tx(conn: &Connection, request: &OrderRequest) -> Result<ConfirmedOrder, OrderError> {
    let customer = find_customer(conn, &request.customer_name)
        .await?
        .ok_or_else(|| OrderError::CustomerNotFound(request.customer_name.clone()))?;

    let catalog = load_products(conn, None).await?;
    let (lines, total) = price_items(&catalog, &request.items)?;

    conn.execute(
        "INSERT INTO orders (customer_name, delivery_method, payment_method, total_price, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![
            customer.customer_name.as_str(),
            request.delivery.label(),
            request.payment.label(),
            total.to_string(),
            Utc::now().to_rfc3339()
        ],
    )
    .await
    .map_err(|e| DatabaseError::Query(format!("insert order: {e}")))?;
    let order_id = conn.last_insert_rowid();

    for line in &lines {
        conn.execute(
            "INSERT INTO customer_order_detail (customer_id, product_id, order_id, quantity, unit_price)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                customer.customer_id,
                line.product_id,
                order_id,
                line.quantity,
                line.unit_price.to_string()
            ],
        )
        .await
        .map_err(|e| DatabaseError::Query(format!("insert order line: {e}")))?;
        decrement_stock(conn, &line.product_name, line.product_id, line.quantity).await?;
    }

    Ok(ConfirmedOrder {
        order_id,
        customer_name: customer.customer_name,
        lines,
        total,
        delivery: request.delivery,
        payment: request.payment,
    })
}

/// Body of the wastage transaction.
async fn wastage_in_tx(
    conn: &Connection,
    product_name: &str,
    loss_quantity: i64,
) -> Result<WastageRecord, OrderError> {
    let candidates = load_products(conn, Some(product_name)).await?;
    let product = resolve_product(&candidates, product_name)?;

    if loss_quantity <= 0 {
        return Err(OrderError::InvalidQuantity {
            product: product.product_name.clone(),
            quantity: loss_quantity,
        });
    }
    if product.stock < loss_quantity {
        return Err(OrderError::WastageExceedsStock {
            stock: product.stock,
            requested: loss_quantity,
        });
    }

    conn.execute(
        "INSERT INTO wastage (product_name, product_id, loss_quantity, recorded_at)
         VALUES (?1, ?2, ?3, ?4)",
        params![
            product.product_name.as_str(),
            product.product_id,
            loss_quantity,
            Utc::now().to_rfc3339()
        ],
    )
    .await
    .map_err(|e| DatabaseError::Query(format!("insert wastage: {e}")))?;
    let id = conn.last_insert_rowid();

    decrement_stock(conn, &product.product_name, product.product_id, loss_quantity).await?;

    Ok(WastageRecord {
        id,
        product_name: product.product_name.clone(),
        loss_quantity,
        remaining_stock: product.stock - loss_quantity,
    })
}

// ── Trait implementation ────────────────────────────────────────────

#[async_trait]
impl Database for LibSqlBackend {
    async fn init_schema(&self) -> Result<(), DatabaseError> {
        let conn = self.conn().await;
        migrations::run_migrations(&conn).await
    }

    async fn seed_sample_data(&self) -> Result<bool, DatabaseError> {
        let conn = self.conn().await;
        seed::seed_sample_data(&conn).await
    }

    // ── Customers ───────────────────────────────────────────────────

    async fn upsert_customer(
        &self,
        name: &str,
        address: &str,
        phone: &str,
    ) -> Result<CustomerRegistration, DatabaseError> {
        let conn = self.conn().await;

        if let Some(existing) = find_customer(&conn, name).await? {
            conn.execute(
                "UPDATE customer SET customer_address = ?1, customer_phone = ?2 WHERE customer_id = ?3",
                params![address, phone, existing.customer_id],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("update customer: {e}")))?;

            return Ok(CustomerRegistration {
                customer: Customer {
                    customer_address: address.to_string(),
                    customer_phone: phone.to_string(),
                    ..existing
                },
                created: false,
            });
        }

        conn.execute(
            "INSERT INTO customer (customer_name, customer_address, customer_phone) VALUES (?1, ?2, ?3)",
            params![name, address, phone],
        )
        .await
        .map_err(|e| DatabaseError::Query(format!("insert customer: {e}")))?;

        Ok(CustomerRegistration {
            customer: Customer {
                customer_id: conn.last_insert_rowid(),
                customer_name: name.to_string(),
                customer_address: address.to_string(),
                customer_phone: phone.to_string(),
            },
            created: true,
        })
    }

    async fn get_customer_by_name(&self, name: &str) -> Result<Option<Customer>, DatabaseError> {
        let conn = self.conn().await;
        find_customer(&conn, name).await
    }

    // ── Products ────────────────────────────────────────────────────

    async fn search_products(&self, pattern: Option<&str>) -> Result<Vec<Product>, DatabaseError> {
        let conn = self.conn().await;
        load_products(&conn, pattern).await
    }

    // ── Orders ──────────────────────────────────────────────────────

    async fn confirm_order(&self, request: &OrderRequest) -> Result<ConfirmedOrder, OrderError> {
        let conn = self.conn().await;
        let tx = conn
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .await
            .map_err(|e| DatabaseError::Transaction(format!("confirm_order begin: {e}")))?;

        match confirm_in_tx(&tx, request).await {
            Ok(order) => {
                tx.commit()
                    .await
                    .map_err(|e| DatabaseError::Transaction(format!("confirm_order commit: {e}")))?;
                Ok(order)
            }
            Err(e) => {
                debug!(error = %e, "Rolling back confirm_order");
                if let Err(rb) = tx.rollback().await {
                    warn!(error = %rb, "confirm_order rollback failed");
                }
                Err(e)
            }
        }
    }

    async fn list_orders_by_customer(
        &self,
        pattern: &str,
    ) -> Result<Vec<OrderSummary>, DatabaseError> {
        let conn = self.conn().await;
        let mut rows = conn
            .query(
                &format!(
                    "SELECT {ORDER_COLUMNS} FROM orders WHERE instr(customer_name, ?1) > 0 ORDER BY order_id"
                ),
                params![pattern],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("list_orders_by_customer: {e}")))?;

        let mut orders = Vec::new();
        while let Some(row) = rows
            .next()
            .await
            .map_err(|e| DatabaseError::Query(format!("list_orders_by_customer: {e}")))?
        {
            orders.push(row_to_order(&row)?);
        }
        Ok(orders)
    }

    async fn get_order_detail(&self, order_id: i64) -> Result<Option<OrderDetail>, DatabaseError> {
        let conn = self.conn().await;
        let mut rows = conn
            .query(
                &format!("SELECT {ORDER_COLUMNS} FROM orders WHERE order_id = ?1"),
                params![order_id],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("get_order_detail: {e}")))?;

        let order = match rows.next().await {
            Ok(Some(row)) => row_to_order(&row)?,
            Ok(None) => return Ok(None),
            Err(e) => return Err(DatabaseError::Query(format!("get_order_detail: {e}"))),
        };

        let mut rows = conn
            .query(
                "SELECT d.quantity, d.unit_price, p.product_name, p.unit
                 FROM customer_order_detail d
                 JOIN product p ON d.product_id = p.product_id
                 WHERE d.order_id = ?1
                 ORDER BY d.id",
                params![order_id],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("get_order_detail lines: {e}")))?;

        let mut items = Vec::new();
        while let Some(row) = rows
            .next()
            .await
            .map_err(|e| DatabaseError::Query(format!("get_order_detail lines: {e}")))?
        {
            let read = |e: libsql::Error| DatabaseError::Query(format!("order line row: {e}"));
            let quantity: i64 = row.get(0).map_err(read)?;
            let unit_price_raw: String = row.get(1).map_err(read)?;
            let unit_price = parse_decimal("unit_price", &unit_price_raw)?;
            items.push(OrderDetailLine {
                product_name: row.get(2).map_err(read)?,
                unit: row.get(3).map_err(read)?,
                quantity,
                unit_price,
                subtotal: unit_price * Decimal::from(quantity),
            });
        }

        Ok(Some(OrderDetail { order, items }))
    }

    // ── Wastage ─────────────────────────────────────────────────────

    async fn record_wastage(
        &self,
        product_name: &str,
        loss_quantity: i64,
    ) -> Result<WastageRecord, OrderError> {
        let conn = self.conn().await;
        let tx = conn
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .await
            .map_err(|e| DatabaseError::Transaction(format!("record_wastage begin: {e}")))?;

        match wastage_in_tx(&tx, product_name, loss_quantity).await {
            Ok(record) => {
                tx.commit()
                    .await
                    .map_err(|e| DatabaseError::Transaction(format!("record_wastage commit: {e}")))?;
                Ok(record)
            }
            Err(e) => {
                debug!(error = %e, "Rolling back record_wastage");
                if let Err(rb) = tx.rollback().await {
                    warn!(error = %rb, "record_wastage rollback failed");
                }
                Err(e)
            }
        }
    }

    // ── Admin ───────────────────────────────────────────────────────

    async fn dump_table(&self, table: AdminTable) -> Result<TableDump, DatabaseError> {
        let conn = self.conn().await;
        // The table name comes from a closed enum, never from user input.
        let mut rows = conn
            .query(&format!("SELECT * FROM {}", table.as_str()), ())
            .await
            .map_err(|e| DatabaseError::Query(format!("dump_table: {e}")))?;

        let columns: Vec<String> = (0..rows.column_count())
            .map(|i| rows.column_name(i).unwrap_or_default().to_string())
            .collect();

        let mut out = Vec::new();
        while let Some(row) = rows
            .next()
            .await
            .map_err(|e| DatabaseError::Query(format!("dump_table: {e}")))?
        {
            let mut map = serde_json::Map::new();
            for (i, name) in columns.iter().enumerate() {
                let value = row
                    .get_value(i as i32)
                    .map_err(|e| DatabaseError::Query(format!("dump_table value: {e}")))?;
                map.insert(name.clone(), value_to_json(value));
            }
            out.push(map);
        }

        Ok(TableDump { columns, rows: out })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::orders::model::{DeliveryMethod, ItemRequest, PaymentMethod};
    use rust_decimal_macros::dec;

    async fn test_db() -> LibSqlBackend {
        let db = LibSqlBackend::new_memory().await.unwrap();
        db.seed_sample_data().await.unwrap();
        db
    }

    async fn stock_of(db: &LibSqlBackend, name: &str) -> i64 {
        let products = db.search_products(Some(name)).await.unwrap();
        products
            .iter()
            .find(|p| p.product_name == name)
            .map(|p| p.stock)
            .unwrap()
    }

    #[tokio::test]
    async fn refused_decrement_reports_current_stock() {
        let db = test_db().await;
        let apple = db
            .search_products(Some("蘋果"))
            .await
            .unwrap()
            .into_iter()
            .find(|p| p.product_name == "蘋果")
            .unwrap();
        let conn = db.conn.lock().await;
        let err = decrement_stock(&conn, "蘋果", apple.product_id, apple.stock + 1)
            .await
            .unwrap_err();
        match err {
            OrderError::InsufficientStock {
                stock, requested, ..
            } => {
                assert_eq!(stock, apple.stock);
                assert_eq!(requested, apple.stock + 1);
            }
            other => panic!("expected insufficient stock, got {other:?}"),
        }
    }

    async fn count(db: &LibSqlBackend, table: AdminTable) -> usize {
        db.dump_table(table).await.unwrap().rows.len()
    }

    fn order_request(customer: &str, items: Vec<ItemRequest>) -> OrderRequest {
        OrderRequest {
            customer_name: customer.to_string(),
            items,
            delivery: DeliveryMethod::Post,
            payment: PaymentMethod::Cash,
        }
    }

    // ── Schema / seed ───────────────────────────────────────────────

    #[tokio::test]
    async fn seed_runs_once() {
        let db = LibSqlBackend::new_memory().await.unwrap();
        assert!(db.seed_sample_data().await.unwrap());
        assert!(!db.seed_sample_data().await.unwrap());
        assert_eq!(count(&db, AdminTable::Customer).await, 3);
        assert_eq!(count(&db, AdminTable::Product).await, 5);
    }

    #[tokio::test]
    async fn open_creates_directory() {
        let tmp = tempfile::tempdir().unwrap();
        let db_path = tmp.path().join("nested").join("dir").join("product.db");
        let db = LibSqlBackend::new_local(&db_path).await.unwrap();
        assert!(db_path.exists());
        drop(db);
    }

    #[tokio::test]
    async fn file_database_persists_between_opens() {
        let tmp = tempfile::tempdir().unwrap();
        let db_path = tmp.path().join("product.db");
        {
            let db = LibSqlBackend::new_local(&db_path).await.unwrap();
            db.upsert_customer("陳先生", "新竹市", "0955000111").await.unwrap();
        }
        let db = LibSqlBackend::new_local(&db_path).await.unwrap();
        assert!(db.get_customer_by_name("陳先生").await.unwrap().is_some());
    }

    // ── Customers ───────────────────────────────────────────────────

    #[tokio::test]
    async fn register_same_name_twice_updates() {
        let db = test_db().await;
        let first = db
            .upsert_customer("王小明", "台北市", "0900000000")
            .await
            .unwrap();
        assert!(first.created);

        let second = db
            .upsert_customer("王小明", "新北市", "0911111111")
            .await
            .unwrap();
        assert!(!second.created);
        assert_eq!(second.customer.customer_id, first.customer.customer_id);

        let stored = db.get_customer_by_name("王小明").await.unwrap().unwrap();
        assert_eq!(stored.customer_address, "新北市");
        assert_eq!(stored.customer_phone, "0911111111");
        assert_eq!(count(&db, AdminTable::Customer).await, 4);
    }

    #[tokio::test]
    async fn customer_lookup_is_exact() {
        let db = test_db().await;
        assert!(db.get_customer_by_name("王大").await.unwrap().is_none());
        assert!(db.get_customer_by_name("王大明").await.unwrap().is_some());
    }

    // ── Products ────────────────────────────────────────────────────

    #[tokio::test]
    async fn search_products_by_substring() {
        let db = test_db().await;
        let all = db.search_products(None).await.unwrap();
        assert_eq!(all.len(), 5);

        let apples = db.search_products(Some("蘋")).await.unwrap();
        assert_eq!(apples.len(), 1);
        assert_eq!(apples[0].product_name, "蘋果");
        assert_eq!(apples[0].price, dec!(500));
        assert_eq!(apples[0].supplier.as_deref(), Some("台灣水果商"));

        assert!(db.search_products(Some("榴槤")).await.unwrap().is_empty());
    }

    // ── Orders ──────────────────────────────────────────────────────

    #[tokio::test]
    async fn confirm_order_writes_header_lines_and_stock() {
        let db = test_db().await;
        db.upsert_customer("王小明", "台北市", "0900000000")
            .await
            .unwrap();

        let order = db
            .confirm_order(&order_request(
                "王小明",
                vec![ItemRequest::new("蘋果", 2), ItemRequest::new("牛奶", 3)],
            ))
            .await
            .unwrap();

        assert_eq!(order.total, dec!(1135));
        assert_eq!(stock_of(&db, "蘋果").await, 98);
        assert_eq!(stock_of(&db, "牛奶").await, 197);

        let detail = db.get_order_detail(order.order_id).await.unwrap().unwrap();
        assert_eq!(detail.order.customer_name, "王小明");
        assert_eq!(detail.order.delivery_method, "郵寄");
        assert_eq!(detail.order.payment_method, "現金");
        assert_eq!(detail.order.total_price, dec!(1135));
        assert!(!detail.order.is_delivered);
        assert!(detail.order.created_at.is_some());
        assert_eq!(detail.items.len(), 2);
        assert_eq!(detail.items[0].product_name, "蘋果");
        assert_eq!(detail.items[0].subtotal, dec!(1000));
        let sum: Decimal = detail.items.iter().map(|i| i.subtotal).sum();
        assert_eq!(sum, detail.order.total_price);
    }

    #[tokio::test]
    async fn confirm_over_stock_fails_and_leaves_everything_unchanged() {
        let db = test_db().await;
        db.upsert_customer("王小明", "台北市", "0900000000")
            .await
            .unwrap();

        let err = db
            .confirm_order(&order_request(
                "王小明",
                vec![ItemRequest::new("香蕉", 1), ItemRequest::new("白米", 61)],
            ))
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            OrderError::InsufficientStock { stock: 60, requested: 61, .. }
        ));
        assert_eq!(stock_of(&db, "香蕉").await, 80);
        assert_eq!(stock_of(&db, "白米").await, 60);
        assert_eq!(count(&db, AdminTable::Orders).await, 0);
        assert_eq!(count(&db, AdminTable::CustomerOrderDetail).await, 0);
    }

    #[tokio::test]
    async fn confirm_unknown_customer_fails() {
        let db = test_db().await;
        let err = db
            .confirm_order(&order_request("路人甲", vec![ItemRequest::new("蘋果", 1)]))
            .await
            .unwrap_err();
        assert!(matches!(err, OrderError::CustomerNotFound(_)));
        assert_eq!(stock_of(&db, "蘋果").await, 100);
    }

    #[tokio::test]
    async fn unit_price_is_snapshotted() {
        let db = test_db().await;
        db.upsert_customer("王小明", "台北市", "0900000000")
            .await
            .unwrap();
        let order = db
            .confirm_order(&order_request("王小明", vec![ItemRequest::new("蘋果", 2)]))
            .await
            .unwrap();

        {
            let conn = db.conn().await;
            conn.execute("UPDATE product SET price = '999' WHERE product_name = '蘋果'", ())
                .await
                .unwrap();
        }

        let detail = db.get_order_detail(order.order_id).await.unwrap().unwrap();
        assert_eq!(detail.items[0].unit_price, dec!(500));
        assert_eq!(detail.order.total_price, dec!(1000));
    }

    #[tokio::test]
    async fn list_orders_by_customer_substring() {
        let db = test_db().await;
        db.confirm_order(&order_request("王大明", vec![ItemRequest::new("雞蛋", 1)]))
            .await
            .unwrap();
        db.confirm_order(&order_request("李小華", vec![ItemRequest::new("雞蛋", 1)]))
            .await
            .unwrap();

        let wang = db.list_orders_by_customer("王").await.unwrap();
        assert_eq!(wang.len(), 1);
        assert_eq!(wang[0].customer_name, "王大明");
        assert!(db.list_orders_by_customer("趙").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn order_detail_unknown_id_is_none() {
        let db = test_db().await;
        assert!(db.get_order_detail(42).await.unwrap().is_none());
    }

    // ── Wastage ─────────────────────────────────────────────────────

    #[tokio::test]
    async fn record_wastage_decrements_stock() {
        let db = test_db().await;
        let record = db.record_wastage("雞蛋", 10).await.unwrap();
        assert_eq!(record.product_name, "雞蛋");
        assert_eq!(record.remaining_stock, 140);
        assert_eq!(stock_of(&db, "雞蛋").await, 140);
        assert_eq!(count(&db, AdminTable::Wastage).await, 1);
    }

    #[tokio::test]
    async fn wastage_over_stock_fails_and_leaves_log_unchanged() {
        let db = test_db().await;
        let err = db.record_wastage("白米", 61).await.unwrap_err();
        assert!(matches!(
            err,
            OrderError::WastageExceedsStock { stock: 60, requested: 61 }
        ));
        assert_eq!(stock_of(&db, "白米").await, 60);
        assert_eq!(count(&db, AdminTable::Wastage).await, 0);
    }

    #[tokio::test]
    async fn wastage_rejects_unknown_product_and_non_positive_quantity() {
        let db = test_db().await;
        assert!(matches!(
            db.record_wastage("榴槤", 1).await,
            Err(OrderError::ProductNotFound(_))
        ));
        assert!(matches!(
            db.record_wastage("白米", 0).await,
            Err(OrderError::InvalidQuantity { .. })
        ));
        assert_eq!(count(&db, AdminTable::Wastage).await, 0);
    }

    // ── Admin ───────────────────────────────────────────────────────

    #[tokio::test]
    async fn dump_table_returns_columns_even_when_empty() {
        let db = test_db().await;
        let dump = db.dump_table(AdminTable::Orders).await.unwrap();
        assert!(dump.rows.is_empty());
        assert_eq!(
            dump.columns,
            vec![
                "order_id",
                "customer_name",
                "delivery_method",
                "payment_method",
                "total_price",
                "is_delivered",
                "created_at"
            ]
        );
    }

    #[tokio::test]
    async fn dump_table_maps_values() {
        let db = test_db().await;
        let dump = db.dump_table(AdminTable::Product).await.unwrap();
        let apple = &dump.rows[0];
        assert_eq!(apple["product_name"], "蘋果");
        assert_eq!(apple["stock"], 100);
        assert_eq!(apple["price"], "500");
    }
}
