//! Phase handlers.
//!
//! Each handler reads the session snapshot and the latest utterance and
//! returns a `Transition`. Validation failures become replies; database
//! failures propagate as `Err` and leave the session untouched.

use tracing::warn;

use super::extractor::{DeliveryChoice, Extractor, Intent};
use super::keywords::{is_confirmation, is_order_request};
use super::state::{CustomerInfo, Phase, SessionState, StatePatch, Transition};
use crate::error::{Error, OrderError};
use crate::orders::{
    DeliveryMethod, OrderQueryResult, OrderRequest, OrderService, PaymentMethod, format,
};

const ASK_CUSTOMER_INFO: &str = "您好，我們先建立您的基本資料。請提供您的 名稱、地址、電話。";
const ASK_DELIVERY: &str = "請問配送方式要選擇 專車 還是 郵寄？";
const ASK_PAYMENT: &str = "請問收款方式是？（現金、匯款、貨到付款）";
const ASK_ITEMS_AGAIN: &str = "請告訴我要訂購的產品名稱與數量，例如：蘋果 2 箱。";
const CHAT_UNAVAILABLE: &str = "抱歉，我暫時無法回覆，請再試一次。";

/// Collaborators every handler may use.
pub struct HandlerContext<'a> {
    pub service: &'a OrderService,
    pub extractor: &'a dyn Extractor,
}

/// Route the utterance to the handler for the session's phase.
pub async fn handle(
    ctx: &HandlerContext<'_>,
    state: &SessionState,
    text: &str,
) -> Result<Transition, Error> {
    match state.phase {
        Phase::Idle => idle(ctx, state, text).await,
        Phase::CollectInfo => collect_info(ctx, state, text).await,
        Phase::ConfirmInfo => confirm_info(ctx, state, text).await,
        Phase::CollectItems => collect_items(ctx, state, text).await,
        Phase::ConfirmItems => confirm_items(ctx, state, text).await,
        Phase::CollectDelivery => collect_delivery(ctx, state, text).await,
        Phase::PreviewOrder => preview_order(ctx, state, text).await,
    }
}

/// Turn a validation failure into reply text; pass database failures up.
fn rebound(err: OrderError) -> Result<String, Error> {
    if err.is_validation() {
        Ok(err.to_string())
    } else {
        Err(err.into())
    }
}

fn confirm_info_text(info: &CustomerInfo) -> String {
    format!(
        "請確認您的資料：\n- 名稱：{}\n- 地址：{}\n- 電話：{}\n正確請回覆「確認」",
        info.name.as_deref().unwrap_or_default(),
        info.address.as_deref().unwrap_or_default(),
        info.phone.as_deref().unwrap_or_default()
    )
}

/// Merge newly extracted customer data and decide where to go.
fn customer_info_step(pending: &CustomerInfo, extracted: CustomerInfo) -> Transition {
    let merged = pending.merge(extracted);
    let patch = StatePatch {
        pending_customer: Some(merged.clone()),
        ..Default::default()
    };
    if merged.complete().is_some() {
        Transition::to(Phase::ConfirmInfo, confirm_info_text(&merged), patch)
    } else {
        let missing = merged.missing_fields().join("、");
        Transition::to(
            Phase::CollectInfo,
            format!("還需要您的 {missing}，請補充。"),
            patch,
        )
    }
}

async fn catalog_names(ctx: &HandlerContext<'_>) -> Result<Vec<String>, Error> {
    Ok(ctx
        .service
        .query_products(None)
        .await?
        .into_iter()
        .map(|p| p.product_name)
        .collect())
}

// ── idle ────────────────────────────────────────────────────────────

async fn idle(
    ctx: &HandlerContext<'_>,
    state: &SessionState,
    text: &str,
) -> Result<Transition, Error> {
    if is_order_request(text) {
        let reset = StatePatch {
            clear_selections: true,
            clear_pending_customer: true,
            ..Default::default()
        };
        if let Some(name) = &state.customer_name {
            let products = ctx.service.query_products(None).await?;
            let reply = format!("歡迎回來，{name}！\n{}", format::product_menu(&products));
            return Ok(Transition::to(Phase::CollectItems, reply, reset));
        }
        return Ok(Transition::to(Phase::CollectInfo, ASK_CUSTOMER_INFO, reset));
    }

    let intent = match ctx.extractor.extract_intent(text).await {
        Ok(intent) => intent,
        Err(e) => {
            warn!(error = %e, "Intent extraction failed, falling back to chat");
            Intent::Chat
        }
    };

    let reply = match intent {
        Intent::QueryProducts { product_name } => {
            let products = ctx.service.query_products(product_name.as_deref()).await?;
            format::product_list(&products)
        }
        Intent::CheckStock { product_name } => {
            match ctx.service.check_stock(&product_name).await {
                Ok(report) => format::stock_report(&report),
                Err(e) => rebound(e)?,
            }
        }
        Intent::QueryOrders {
            customer_name,
            order_id,
        } => match ctx
            .service
            .query_orders(customer_name.as_deref(), order_id)
            .await
        {
            Ok(OrderQueryResult::Single(detail)) => format::order_detail(&detail),
            Ok(OrderQueryResult::List(orders)) => {
                format::order_list(customer_name.as_deref().unwrap_or_default(), &orders)
            }
            Err(e) => rebound(e)?,
        },
        Intent::RecordWastage {
            product_name,
            quantity,
        } => match ctx.service.record_wastage(&product_name, quantity).await {
            Ok(record) => format::wastage(&record),
            Err(e) => rebound(e)?,
        },
        Intent::Chat => match ctx.extractor.chat(&state.history, text).await {
            Ok(reply) => reply,
            Err(e) => {
                warn!(error = %e, "Chat reply failed");
                CHAT_UNAVAILABLE.to_string()
            }
        },
    };

    Ok(Transition::stay(Phase::Idle, reply))
}

// ── customer data ───────────────────────────────────────────────────

async fn collect_info(
    ctx: &HandlerContext<'_>,
    state: &SessionState,
    text: &str,
) -> Result<Transition, Error> {
    match ctx.extractor.extract_customer(text).await {
        Ok(extracted) => Ok(customer_info_step(&state.pending_customer, extracted)),
        Err(e) => {
            warn!(error = %e, "Customer extraction failed");
            Ok(Transition::stay(
                Phase::CollectInfo,
                "抱歉，我沒有讀懂您的資料。請再提供一次 名稱、地址、電話。",
            ))
        }
    }
}

async fn confirm_info(
    ctx: &HandlerContext<'_>,
    state: &SessionState,
    text: &str,
) -> Result<Transition, Error> {
    if !is_confirmation(text) {
        // Anything else is a correction.
        return match ctx.extractor.extract_customer(text).await {
            Ok(extracted) => Ok(customer_info_step(&state.pending_customer, extracted)),
            Err(e) => {
                warn!(error = %e, "Customer correction extraction failed");
                Ok(Transition::stay(
                    Phase::ConfirmInfo,
                    format!(
                        "抱歉，我沒有讀懂要修改的內容。\n{}",
                        confirm_info_text(&state.pending_customer)
                    ),
                ))
            }
        };
    }

    let Some((name, address, phone)) = state.pending_customer.complete() else {
        let missing = state.pending_customer.missing_fields().join("、");
        return Ok(Transition::to(
            Phase::CollectInfo,
            format!("還需要您的 {missing}，請補充。"),
            StatePatch::default(),
        ));
    };

    let reg = ctx.service.register_customer(name, address, phone).await?;
    let products = ctx.service.query_products(None).await?;
    let reply = format!(
        "{}\n\n{}",
        format::registration(&reg),
        format::product_menu(&products)
    );
    let patch = StatePatch {
        customer: Some((reg.customer.customer_id, reg.customer.customer_name.clone())),
        clear_pending_customer: true,
        clear_selections: true,
        ..Default::default()
    };
    Ok(Transition::to(Phase::CollectItems, reply, patch))
}

// ── items ───────────────────────────────────────────────────────────

async fn collect_items(
    ctx: &HandlerContext<'_>,
    state: &SessionState,
    text: &str,
) -> Result<Transition, Error> {
    let Some(customer) = &state.customer_name else {
        return Ok(Transition::to(
            Phase::CollectInfo,
            ASK_CUSTOMER_INFO,
            StatePatch::default(),
        ));
    };

    let catalog = catalog_names(ctx).await?;
    let items = match ctx.extractor.extract_items(text, &[], &catalog).await {
        Ok(items) if !items.is_empty() => items,
        Ok(_) => return Ok(Transition::stay(Phase::CollectItems, ASK_ITEMS_AGAIN)),
        Err(e) => {
            warn!(error = %e, "Item extraction failed");
            return Ok(Transition::stay(Phase::CollectItems, ASK_ITEMS_AGAIN));
        }
    };

    match ctx.service.draft_order(customer, &items).await {
        Ok(draft) => Ok(Transition::to(
            Phase::ConfirmItems,
            format::draft(&draft),
            StatePatch {
                items: Some(draft.item_requests()),
                ..Default::default()
            },
        )),
        Err(e) => {
            let msg = rebound(e)?;
            Ok(Transition::stay(
                Phase::CollectItems,
                format!("{msg}\n{ASK_ITEMS_AGAIN}"),
            ))
        }
    }
}

async fn confirm_items(
    ctx: &HandlerContext<'_>,
    state: &SessionState,
    text: &str,
) -> Result<Transition, Error> {
    if is_confirmation(text) {
        return Ok(Transition::to(
            Phase::CollectDelivery,
            format!("{ASK_DELIVERY}\n{ASK_PAYMENT}"),
            StatePatch::default(),
        ));
    }

    let Some(customer) = &state.customer_name else {
        return Ok(Transition::to(
            Phase::CollectInfo,
            ASK_CUSTOMER_INFO,
            StatePatch::default(),
        ));
    };

    let catalog = catalog_names(ctx).await?;
    let revised = match ctx.extractor.extract_items(text, &state.items, &catalog).await {
        Ok(items) if !items.is_empty() => items,
        Ok(_) => {
            return Ok(Transition::stay(
                Phase::ConfirmItems,
                "訂單至少需要一項產品。請告訴我要如何修改，或回覆「確認」。",
            ));
        }
        Err(e) => {
            warn!(error = %e, "Item modification extraction failed");
            return Ok(Transition::stay(
                Phase::ConfirmItems,
                "抱歉，我沒有讀懂要修改的內容。請再說一次，或回覆「確認」。",
            ));
        }
    };

    match ctx.service.draft_order(customer, &revised).await {
        Ok(draft) => Ok(Transition::to(
            Phase::ConfirmItems,
            format::draft(&draft),
            StatePatch {
                items: Some(draft.item_requests()),
                ..Default::default()
            },
        )),
        Err(e) => {
            let msg = rebound(e)?;
            Ok(Transition::stay(
                Phase::ConfirmItems,
                format!("{msg}\n目前的訂單內容維持不變。"),
            ))
        }
    }
}

// ── delivery, preview, confirm ──────────────────────────────────────

async fn collect_delivery(
    ctx: &HandlerContext<'_>,
    state: &SessionState,
    text: &str,
) -> Result<Transition, Error> {
    let mut choice = DeliveryChoice::detect(text);
    if choice.is_empty() {
        choice = match ctx.extractor.extract_delivery(text).await {
            Ok(c) => c,
            Err(e) => {
                warn!(error = %e, "Delivery extraction failed");
                DeliveryChoice::default()
            }
        };
    }

    let delivery = choice.delivery.or(state.delivery);
    let payment = choice.payment.or(state.payment);
    let patch = StatePatch {
        delivery,
        payment,
        ..Default::default()
    };

    match (delivery, payment) {
        (Some(delivery), Some(payment)) => {
            run_preview(ctx, state, delivery, payment).await
        }
        (None, Some(_)) => Ok(Transition::to(Phase::CollectDelivery, ASK_DELIVERY, patch)),
        (Some(_), None) => Ok(Transition::to(Phase::CollectDelivery, ASK_PAYMENT, patch)),
        (None, None) => Ok(Transition::stay(
            Phase::CollectDelivery,
            format!("{ASK_DELIVERY}\n{ASK_PAYMENT}"),
        )),
    }
}

/// Preview with the given selections. A validation failure sends the
/// customer back to item selection.
async fn run_preview(
    ctx: &HandlerContext<'_>,
    state: &SessionState,
    delivery: DeliveryMethod,
    payment: PaymentMethod,
) -> Result<Transition, Error> {
    let customer = state.customer_name.as_deref().unwrap_or_default();
    match ctx
        .service
        .preview_order(customer, &state.items, delivery, payment)
        .await
    {
        Ok(preview) => Ok(Transition::to(
            Phase::PreviewOrder,
            format::preview(&preview),
            StatePatch {
                delivery: Some(delivery),
                payment: Some(payment),
                ..Default::default()
            },
        )),
        Err(e) => {
            let msg = rebound(e)?;
            Ok(Transition::to(
                Phase::CollectItems,
                format!("{msg}\n{ASK_ITEMS_AGAIN}"),
                StatePatch {
                    clear_selections: true,
                    ..Default::default()
                },
            ))
        }
    }
}

async fn preview_order(
    ctx: &HandlerContext<'_>,
    state: &SessionState,
    text: &str,
) -> Result<Transition, Error> {
    let (Some(delivery), Some(payment)) = (state.delivery, state.payment) else {
        return Ok(Transition::to(
            Phase::CollectDelivery,
            format!("{ASK_DELIVERY}\n{ASK_PAYMENT}"),
            StatePatch::default(),
        ));
    };

    // A changed selection always wins over an affirmative in the same message.
    let choice = DeliveryChoice::detect(text);
    let new_delivery = choice.delivery.unwrap_or(delivery);
    let new_payment = choice.payment.unwrap_or(payment);
    let changed = new_delivery != delivery || new_payment != payment;
    if changed || (!choice.is_empty() && !is_confirmation(text)) {
        return run_preview(ctx, state, new_delivery, new_payment).await;
    }
    if !is_confirmation(text) {
        return Ok(Transition::stay(
            Phase::PreviewOrder,
            "確認請回覆「確認」；要更改配送或收款方式請直接告訴我，或輸入「取消」重新開始。",
        ));
    }

    let request = OrderRequest {
        customer_name: state.customer_name.clone().unwrap_or_default(),
        items: state.items.clone(),
        delivery,
        payment,
    };
    let done = StatePatch {
        clear_selections: true,
        ..Default::default()
    };
    match ctx.service.confirm_order(&request).await {
        Ok(order) => Ok(Transition::to(Phase::Idle, format::confirmed(&order), done)),
        Err(e) => {
            let msg = rebound(e)?;
            Ok(Transition::to(
                Phase::CollectItems,
                format!("{msg}\n訂單尚未建立。{ASK_ITEMS_AGAIN}"),
                done,
            ))
        }
    }
}
