//! `Database` trait: single async interface for all persistence.

use async_trait::async_trait;

use crate::error::{DatabaseError, OrderError};
use crate::orders::model::{
    AdminTable, ConfirmedOrder, Customer, CustomerRegistration, OrderDetail, OrderRequest,
    OrderSummary, Product, TableDump, WastageRecord,
};

/// Backend-agnostic store for customers, products, orders and wastage.
///
/// Methods that decrement stock run as a single transaction and re-validate
/// stock inside it; they return `OrderError` so validation failures stay
/// distinguishable from database failures.
#[async_trait]
pub trait Database: Send + Sync {
    /// Create or upgrade the schema.
    async fn init_schema(&self) -> Result<(), DatabaseError>;

    /// Insert the sample customers and products if the customer table is
    /// empty. Returns whether anything was inserted.
    async fn seed_sample_data(&self) -> Result<bool, DatabaseError>;

    // ── Customers ───────────────────────────────────────────────────

    /// Insert a customer, or update address and phone of the row with the
    /// same name.
    async fn upsert_customer(
        &self,
        name: &str,
        address: &str,
        phone: &str,
    ) -> Result<CustomerRegistration, DatabaseError>;

    /// Exact-name lookup.
    async fn get_customer_by_name(&self, name: &str) -> Result<Option<Customer>, DatabaseError>;

    // ── Products ────────────────────────────────────────────────────

    /// Products whose name contains `pattern` (case-sensitive), or all
    /// products when `pattern` is `None`. Ordered by id.
    async fn search_products(&self, pattern: Option<&str>) -> Result<Vec<Product>, DatabaseError>;

    // ── Orders ──────────────────────────────────────────────────────

    /// Validate, insert the order and its lines, and decrement stock.
    async fn confirm_order(&self, request: &OrderRequest) -> Result<ConfirmedOrder, OrderError>;

    /// Orders whose customer name contains `pattern`.
    async fn list_orders_by_customer(
        &self,
        pattern: &str,
    ) -> Result<Vec<OrderSummary>, DatabaseError>;

    /// Order header plus joined lines.
    async fn get_order_detail(&self, order_id: i64) -> Result<Option<OrderDetail>, DatabaseError>;

    // ── Wastage ─────────────────────────────────────────────────────

    /// Append a wastage entry and decrement stock.
    async fn record_wastage(
        &self,
        product_name: &str,
        loss_quantity: i64,
    ) -> Result<WastageRecord, OrderError>;

    // ── Admin ───────────────────────────────────────────────────────

    /// Every column and row of an allow-listed table.
    async fn dump_table(&self, table: AdminTable) -> Result<TableDump, DatabaseError>;
}
