//! Sample customers and products for a fresh database.

use libsql::{Connection, params};

use crate::error::DatabaseError;

const SAMPLE_CUSTOMERS: &[(&str, &str, &str)] = &[
    ("王大明", "台北市信義區信義路五段7號", "0912345678"),
    ("李小華", "台中市西屯區台灣大道四段1號", "0923456789"),
    ("張美玲", "高雄市前鎮區中山二路2號", "0934567890"),
];

/// name, unit, price, stock, safety_stock, supplier, specification
const SAMPLE_PRODUCTS: &[(&str, &str, &str, i64, i64, &str, &str)] = &[
    ("蘋果", "箱", "500", 100, 20, "台灣水果商", "每箱20斤"),
    ("香蕉", "箱", "300", 80, 15, "台灣水果商", "每箱15斤"),
    ("牛奶", "瓶", "45", 200, 50, "鮮奶供應商", "1000ml"),
    ("雞蛋", "盒", "60", 150, 30, "養雞場", "每盒30顆"),
    ("白米", "包", "250", 60, 10, "米商", "每包5公斤"),
];

/// Insert the sample rows when the customer table is empty.
pub async fn seed_sample_data(conn: &Connection) -> Result<bool, DatabaseError> {
    let mut rows = conn
        .query("SELECT COUNT(*) FROM customer", ())
        .await
        .map_err(|e| DatabaseError::Query(format!("seed count: {e}")))?;
    let count: i64 = match rows.next().await {
        Ok(Some(row)) => row.get(0).unwrap_or(0),
        Ok(None) => 0,
        Err(e) => return Err(DatabaseError::Query(format!("seed count: {e}"))),
    };
    if count > 0 {
        return Ok(false);
    }

    let tx = conn
        .transaction()
        .await
        .map_err(|e| DatabaseError::Transaction(format!("seed begin: {e}")))?;

    for (name, address, phone) in SAMPLE_CUSTOMERS {
        tx.execute(
            "INSERT INTO customer (customer_name, customer_address, customer_phone) VALUES (?1, ?2, ?3)",
            params![*name, *address, *phone],
        )
        .await
        .map_err(|e| DatabaseError::Query(format!("seed customer: {e}")))?;
    }

    for (name, unit, price, stock, safety, supplier, spec) in SAMPLE_PRODUCTS {
        tx.execute(
            "INSERT INTO product (product_name, unit, price, stock, safety_stock, supplier, specification)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![*name, *unit, *price, *stock, *safety, *supplier, *spec],
        )
        .await
        .map_err(|e| DatabaseError::Query(format!("seed product: {e}")))?;
    }

    tx.commit()
        .await
        .map_err(|e| DatabaseError::Transaction(format!("seed commit: {e}")))?;

    tracing::info!(
        customers = SAMPLE_CUSTOMERS.len(),
        products = SAMPLE_PRODUCTS.len(),
        "Seeded sample data"
    );
    Ok(true)
}
