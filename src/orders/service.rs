//! Domain operations over the store.
//!
//! Every operation is stateless: read, validate, and at most one write
//! transaction. Validation failures come back as `OrderError` values for the
//! caller to show; database failures come back as `OrderError::Database`.

use std::sync::Arc;

use tracing::info;

use super::model::{
    AdminTable, ConfirmedOrder, CustomerRegistration, DeliveryMethod, ItemRequest, OrderDetail,
    OrderDraft, OrderPreview, OrderQueryResult, OrderRequest, PaymentMethod, Product, StockReport,
    TableDump, WastageRecord,
};
use super::pricing::{price_items, resolve_product};
use crate::error::{DatabaseError, OrderError};
use crate::store::Database;

/// Stateless facade over the domain operations.
#[derive(Clone)]
pub struct OrderService {
    db: Arc<dyn Database>,
}

impl OrderService {
    pub fn new(db: Arc<dyn Database>) -> Self {
        Self { db }
    }

    /// Create a customer, or update address and phone when the name exists.
    pub async fn register_customer(
        &self,
        name: &str,
        address: &str,
        phone: &str,
    ) -> Result<CustomerRegistration, OrderError> {
        let reg = self
            .db
            .upsert_customer(name.trim(), address.trim(), phone.trim())
            .await?;
        info!(
            customer_id = reg.customer.customer_id,
            created = reg.created,
            "Customer registered"
        );
        Ok(reg)
    }

    /// Validate and price an order without writing anything.
    pub async fn draft_order(
        &self,
        customer_name: &str,
        items: &[ItemRequest],
    ) -> Result<OrderDraft, OrderError> {
        if self.db.get_customer_by_name(customer_name).await?.is_none() {
            return Err(OrderError::CustomerNotFound(customer_name.to_string()));
        }
        let catalog = self.db.search_products(None).await?;
        let (lines, total) = price_items(&catalog, items)?;
        Ok(OrderDraft {
            customer_name: customer_name.to_string(),
            lines,
            total,
        })
    }

    /// Same checks as `draft_order`, with delivery and payment attached.
    pub async fn preview_order(
        &self,
        customer_name: &str,
        items: &[ItemRequest],
        delivery: DeliveryMethod,
        payment: PaymentMethod,
    ) -> Result<OrderPreview, OrderError> {
        let draft = self.draft_order(customer_name, items).await?;
        Ok(OrderPreview {
            draft,
            delivery,
            payment,
        })
    }

    /// Persist the order and decrement stock in one transaction.
    pub async fn confirm_order(&self, request: &OrderRequest) -> Result<ConfirmedOrder, OrderError> {
        let order = self.db.confirm_order(request).await?;
        info!(
            order_id = order.order_id,
            customer = %order.customer_name,
            total = %order.total,
            "Order confirmed"
        );
        Ok(order)
    }

    /// Products whose name contains `name`, or every product.
    pub async fn query_products(&self, name: Option<&str>) -> Result<Vec<Product>, DatabaseError> {
        let pattern = name.map(str::trim).filter(|s| !s.is_empty());
        self.db.search_products(pattern).await
    }

    pub async fn check_stock(&self, name: &str) -> Result<StockReport, OrderError> {
        let name = name.trim();
        let candidates = self.db.search_products(Some(name)).await?;
        let product = resolve_product(&candidates, name)?;
        Ok(StockReport::from(product))
    }

    /// Look up one order by id, or list orders whose customer name contains
    /// `customer_name`. The id wins when both are given.
    pub async fn query_orders(
        &self,
        customer_name: Option<&str>,
        order_id: Option<i64>,
    ) -> Result<OrderQueryResult, OrderError> {
        if let Some(id) = order_id.filter(|id| *id > 0) {
            return self
                .db
                .get_order_detail(id)
                .await?
                .map(OrderQueryResult::Single)
                .ok_or(OrderError::OrderNotFound(id));
        }
        match customer_name.map(str::trim).filter(|s| !s.is_empty()) {
            Some(name) => Ok(OrderQueryResult::List(
                self.db.list_orders_by_customer(name).await?,
            )),
            None => Err(OrderError::MissingQuery),
        }
    }

    pub async fn order_detail(&self, order_id: i64) -> Result<Option<OrderDetail>, DatabaseError> {
        self.db.get_order_detail(order_id).await
    }

    /// Append a wastage entry and decrement stock in one transaction.
    pub async fn record_wastage(
        &self,
        product_name: &str,
        loss_quantity: i64,
    ) -> Result<WastageRecord, OrderError> {
        let record = self.db.record_wastage(product_name.trim(), loss_quantity).await?;
        info!(
            product = %record.product_name,
            loss = record.loss_quantity,
            remaining = record.remaining_stock,
            "Wastage recorded"
        );
        Ok(record)
    }

    pub async fn dump_table(&self, table: AdminTable) -> Result<TableDump, DatabaseError> {
        self.db.dump_table(table).await
    }
}
