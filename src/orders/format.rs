//! Customer-facing text for domain results.

use std::fmt::Write;

use rust_decimal::Decimal;

use super::model::{
    ConfirmedOrder, CustomerRegistration, DraftLine, OrderDetail, OrderDraft, OrderPreview,
    OrderSummary, Product, StockReport, WastageRecord,
};

/// Money as shown to customers: whole amounts without decimals.
pub fn money(amount: Decimal) -> String {
    amount.normalize().to_string()
}

pub fn registration(reg: &CustomerRegistration) -> String {
    let headline = if reg.created {
        "客戶資料建立成功！"
    } else {
        "客戶資料已更新！"
    };
    format!(
        "{headline}\n客戶ID: {}\n名稱: {}\n地址: {}\n電話: {}",
        reg.customer.customer_id,
        reg.customer.customer_name,
        reg.customer.customer_address,
        reg.customer.customer_phone
    )
}

pub fn product_list(products: &[Product]) -> String {
    if products.is_empty() {
        return "找不到符合的產品。".to_string();
    }
    products
        .iter()
        .map(|p| {
            format!(
                "產品ID: {}, 名稱: {}, 價格: {}元/{}, 庫存: {}{}, 供應商: {}, 規格: {}",
                p.product_id,
                p.product_name,
                money(p.price),
                p.unit,
                p.stock,
                p.unit,
                p.supplier.as_deref().unwrap_or("-"),
                p.specification.as_deref().unwrap_or("-"),
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Short catalog shown when the customer starts picking items.
pub fn product_menu(products: &[Product]) -> String {
    let mut out = String::from("可訂購的產品：\n");
    for p in products {
        let _ = writeln!(out, "- {}：{}元/{}", p.product_name, money(p.price), p.unit);
    }
    out.push_str("請告訴我您要訂購的品項與數量。");
    out
}

pub fn stock_report(report: &StockReport) -> String {
    let status = if report.below_safety_stock {
        "⚠️ 低於安全庫存，需要補貨！"
    } else {
        "正常"
    };
    format!(
        "產品: {}\n目前庫存: {}{}\n安全庫存: {}{}\n庫存狀態: {status}",
        report.product_name, report.stock, report.unit, report.safety_stock, report.unit
    )
}

fn draft_lines(out: &mut String, lines: &[DraftLine]) {
    for l in lines {
        let _ = writeln!(
            out,
            "- {} x {}{}（單價: {}元，小計: {}元）",
            l.product_name,
            l.quantity,
            l.unit,
            money(l.unit_price),
            money(l.subtotal)
        );
    }
}

pub fn draft(draft: &OrderDraft) -> String {
    let mut out = format!("客戶: {}\n", draft.customer_name);
    draft_lines(&mut out, &draft.lines);
    let _ = write!(
        out,
        "總價格: {} 元\n訂單內容是否正確？需要修改請告訴我，正確請回覆「確認」。",
        money(draft.total)
    );
    out
}

pub fn preview(preview: &OrderPreview) -> String {
    let mut out = format!("客戶: {}\n", preview.draft.customer_name);
    draft_lines(&mut out, &preview.draft.lines);
    let _ = write!(
        out,
        "總價格: {} 元\n配送方式: {}\n收款方式: {}\n以上訂單是否正確？確認請回覆「確認」，需要修改請告訴我。",
        money(preview.draft.total),
        preview.delivery,
        preview.payment
    );
    out
}

pub fn confirmed(order: &ConfirmedOrder) -> String {
    format!(
        "✅ 訂單建立成功！\n訂單編號: {}\n客戶: {}\n總價格: {} 元\n配送方式: {}\n收款方式: {}",
        order.order_id,
        order.customer_name,
        money(order.total),
        order.delivery,
        order.payment
    )
}

pub fn order_detail(detail: &OrderDetail) -> String {
    let o = &detail.order;
    let mut out = format!(
        "訂單編號: {}\n客戶: {}\n配送方式: {}\n收款方式: {}\n總價格: {} 元\n訂單明細:",
        o.order_id,
        o.customer_name,
        o.delivery_method,
        o.payment_method,
        money(o.total_price)
    );
    for item in &detail.items {
        let _ = write!(
            out,
            "\n  - {} x {}{} (單價: {}元)",
            item.product_name,
            item.quantity,
            item.unit,
            money(item.unit_price)
        );
    }
    out
}

pub fn order_list(customer_query: &str, orders: &[OrderSummary]) -> String {
    if orders.is_empty() {
        return format!("找不到客戶「{customer_query}」的訂單。");
    }
    orders
        .iter()
        .map(|o| {
            format!(
                "訂單編號: {}, 客戶: {}, 總價格: {}元, 配送: {}, 收款: {}",
                o.order_id,
                o.customer_name,
                money(o.total_price),
                o.delivery_method,
                o.payment_method
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn wastage(record: &WastageRecord) -> String {
    format!(
        "損耗記錄成功！\n產品: {}\n損耗數量: {}\n剩餘庫存: {}",
        record.product_name, record.loss_quantity, record.remaining_stock
    )
}
