//! Domain types for customers, products, orders and wastage.

use std::fmt;
use std::str::FromStr;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// A registered customer. `customer_name` is the business key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Customer {
    pub customer_id: i64,
    pub customer_name: String,
    pub customer_address: String,
    pub customer_phone: String,
}

/// Outcome of `register_customer`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CustomerRegistration {
    pub customer: Customer,
    /// `false` when an existing row with the same name was updated.
    pub created: bool,
}

/// A product row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    pub product_id: i64,
    pub product_name: String,
    pub unit: String,
    pub price: Decimal,
    pub stock: i64,
    pub safety_stock: i64,
    pub supplier: Option<String>,
    pub specification: Option<String>,
}

impl Product {
    /// At or below the replenishment threshold.
    pub fn below_safety_stock(&self) -> bool {
        self.stock <= self.safety_stock
    }
}

/// A requested line as the customer phrased it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemRequest {
    pub product_name: String,
    pub quantity: i64,
}

impl ItemRequest {
    pub fn new(product_name: impl Into<String>, quantity: i64) -> Self {
        Self {
            product_name: product_name.into(),
            quantity,
        }
    }
}

/// A validated, priced line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DraftLine {
    pub product_id: i64,
    pub product_name: String,
    pub unit: String,
    pub quantity: i64,
    pub unit_price: Decimal,
    pub subtotal: Decimal,
}

/// A validated order summary that has not been persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderDraft {
    pub customer_name: String,
    pub lines: Vec<DraftLine>,
    pub total: Decimal,
}

impl OrderDraft {
    /// The lines rewritten as requests against the resolved product names.
    pub fn item_requests(&self) -> Vec<ItemRequest> {
        self.lines
            .iter()
            .map(|l| ItemRequest::new(&l.product_name, l.quantity))
            .collect()
    }
}

/// How the order is shipped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DeliveryMethod {
    #[serde(rename = "專車")]
    DedicatedVehicle,
    #[serde(rename = "郵寄")]
    Post,
}

impl DeliveryMethod {
    pub const ALL: [DeliveryMethod; 2] = [Self::DedicatedVehicle, Self::Post];

    pub fn label(&self) -> &'static str {
        match self {
            Self::DedicatedVehicle => "專車",
            Self::Post => "郵寄",
        }
    }

    /// Find a delivery keyword anywhere in free text.
    pub fn detect(text: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|m| text.contains(m.label()))
    }
}

impl fmt::Display for DeliveryMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for DeliveryMethod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::detect(s.trim()).ok_or_else(|| format!("unknown delivery method: {s}"))
    }
}

/// How the order is paid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PaymentMethod {
    #[serde(rename = "現金")]
    Cash,
    #[serde(rename = "匯款")]
    BankTransfer,
    #[serde(rename = "貨到付款")]
    CashOnDelivery,
}

impl PaymentMethod {
    pub const ALL: [PaymentMethod; 3] = [Self::Cash, Self::BankTransfer, Self::CashOnDelivery];

    pub fn label(&self) -> &'static str {
        match self {
            Self::Cash => "現金",
            Self::BankTransfer => "匯款",
            Self::CashOnDelivery => "貨到付款",
        }
    }

    /// Find a payment keyword anywhere in free text. "轉帳" counts as a transfer.
    pub fn detect(text: &str) -> Option<Self> {
        if text.contains("貨到付款") {
            return Some(Self::CashOnDelivery);
        }
        if text.contains("匯款") || text.contains("轉帳") {
            return Some(Self::BankTransfer);
        }
        if text.contains("現金") {
            return Some(Self::Cash);
        }
        None
    }
}

impl fmt::Display for PaymentMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for PaymentMethod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::detect(s.trim()).ok_or_else(|| format!("unknown payment method: {s}"))
    }
}

/// Everything `confirm_order` needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderRequest {
    pub customer_name: String,
    pub items: Vec<ItemRequest>,
    pub delivery: DeliveryMethod,
    pub payment: PaymentMethod,
}

/// A draft plus delivery and payment, ready for the final confirmation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderPreview {
    pub draft: OrderDraft,
    pub delivery: DeliveryMethod,
    pub payment: PaymentMethod,
}

/// A persisted order as returned by `confirm_order`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfirmedOrder {
    pub order_id: i64,
    pub customer_name: String,
    pub lines: Vec<DraftLine>,
    pub total: Decimal,
    pub delivery: DeliveryMethod,
    pub payment: PaymentMethod,
}

/// An `orders` row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OrderSummary {
    pub order_id: i64,
    pub customer_name: String,
    pub delivery_method: String,
    pub payment_method: String,
    pub total_price: Decimal,
    pub is_delivered: bool,
    pub created_at: Option<String>,
}

/// A line item joined with its product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OrderDetailLine {
    pub product_name: String,
    pub unit: String,
    pub quantity: i64,
    pub unit_price: Decimal,
    pub subtotal: Decimal,
}

/// Order header plus line items.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OrderDetail {
    pub order: OrderSummary,
    pub items: Vec<OrderDetailLine>,
}

/// Result of `query_orders`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OrderQueryResult {
    Single(OrderDetail),
    List(Vec<OrderSummary>),
}

/// Stock report for a single product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StockReport {
    pub product_name: String,
    pub unit: String,
    pub stock: i64,
    pub safety_stock: i64,
    pub below_safety_stock: bool,
}

impl From<&Product> for StockReport {
    fn from(p: &Product) -> Self {
        Self {
            product_name: p.product_name.clone(),
            unit: p.unit.clone(),
            stock: p.stock,
            safety_stock: p.safety_stock,
            below_safety_stock: p.below_safety_stock(),
        }
    }
}

/// A recorded wastage entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WastageRecord {
    pub id: i64,
    pub product_name: String,
    pub loss_quantity: i64,
    pub remaining_stock: i64,
}

/// Tables the admin dump endpoint may read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdminTable {
    Customer,
    Product,
    Orders,
    CustomerOrderDetail,
    Wastage,
}

impl AdminTable {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Customer => "customer",
            Self::Product => "product",
            Self::Orders => "orders",
            Self::CustomerOrderDetail => "customer_order_detail",
            Self::Wastage => "wastage",
        }
    }
}

impl FromStr for AdminTable {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "customer" => Ok(Self::Customer),
            "product" => Ok(Self::Product),
            "orders" => Ok(Self::Orders),
            "customer_order_detail" => Ok(Self::CustomerOrderDetail),
            "wastage" => Ok(Self::Wastage),
            other => Err(format!("table not allowed: {other}")),
        }
    }
}

/// Column names and rows of one table.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TableDump {
    pub columns: Vec<String>,
    pub rows: Vec<serde_json::Map<String, serde_json::Value>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn delivery_detect_in_sentence() {
        assert_eq!(DeliveryMethod::detect("我要郵寄"), Some(DeliveryMethod::Post));
        assert_eq!(
            DeliveryMethod::detect("專車送過來"),
            Some(DeliveryMethod::DedicatedVehicle)
        );
        assert_eq!(DeliveryMethod::detect("自取"), None);
    }

    #[test]
    fn payment_detect_prefers_cod() {
        assert_eq!(
            PaymentMethod::detect("貨到付款就好"),
            Some(PaymentMethod::CashOnDelivery)
        );
        assert_eq!(PaymentMethod::detect("轉帳"), Some(PaymentMethod::BankTransfer));
        assert_eq!(PaymentMethod::detect("付現金"), Some(PaymentMethod::Cash));
        assert_eq!(PaymentMethod::detect("刷卡"), None);
    }

    #[test]
    fn serde_uses_chinese_labels() {
        let json = serde_json::to_string(&PaymentMethod::CashOnDelivery).unwrap();
        assert_eq!(json, "\"貨到付款\"");
        let parsed: DeliveryMethod = serde_json::from_str("\"郵寄\"").unwrap();
        assert_eq!(parsed, DeliveryMethod::Post);
    }

    #[test]
    fn admin_table_allow_list() {
        for name in ["customer", "product", "orders", "customer_order_detail", "wastage"] {
            let table: AdminTable = name.parse().unwrap();
            assert_eq!(table.as_str(), name);
        }
        assert!("sqlite_master".parse::<AdminTable>().is_err());
        assert!("product; DROP TABLE product".parse::<AdminTable>().is_err());
    }

    #[test]
    fn safety_stock_threshold_is_inclusive() {
        let mut p = Product {
            product_id: 1,
            product_name: "牛奶".into(),
            unit: "瓶".into(),
            price: Decimal::new(45, 0),
            stock: 50,
            safety_stock: 50,
            supplier: None,
            specification: None,
        };
        assert!(p.below_safety_stock());
        p.stock = 51;
        assert!(!p.below_safety_stock());
    }
}
