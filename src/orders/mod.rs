//! Ordering domain: customers, products, drafts, confirmed orders and wastage.

pub mod format;
pub mod model;
pub mod pricing;
pub mod service;

pub use model::{
    AdminTable, ConfirmedOrder, Customer, CustomerRegistration, DeliveryMethod, DraftLine,
    ItemRequest, OrderDetail, OrderDetailLine, OrderDraft, OrderPreview, OrderQueryResult,
    OrderRequest, OrderSummary, PaymentMethod, Product, StockReport, TableDump, WastageRecord,
};
pub use service::OrderService;
