//! System prompts for LLM extraction and free chat, and JSON reply parsing.

use std::sync::LazyLock;

use regex::Regex;
use serde::de::DeserializeOwned;

use crate::error::LlmError;
use crate::orders::ItemRequest;

pub const CHAT_SYSTEM_PROMPT: &str = "\
你是客戶服務助手，用繁體中文回覆，簡潔友善。
你可以協助：查詢產品資訊、下單訂購、查詢訂單、安排配送（專車/郵寄）、記錄損耗。
如果客戶想下單，請他輸入「下單」。不要自行編造產品、價格或訂單資料。";

pub const CUSTOMER_PROMPT: &str = r#"You extract customer registration data from a Traditional Chinese message.
Output only a JSON object:
{"name": string or null, "address": string or null, "phone": string or null}
Use null for anything not mentioned. Do not invent values."#;

pub const DELIVERY_PROMPT: &str = r#"You extract delivery and payment choices from a Traditional Chinese message.
Output only a JSON object:
{"delivery": "專車" | "郵寄" | null, "payment": "現金" | "匯款" | "貨到付款" | null}
Use null when the customer did not choose."#;

pub const INTENT_PROMPT: &str = r#"You classify a Traditional Chinese customer-service message.
Output only a JSON object with an "intent" field and its arguments:
{"intent": "query_products", "product_name": string or null}
{"intent": "check_stock", "product_name": string}
{"intent": "query_orders", "customer_name": string or null, "order_id": integer or null}
{"intent": "record_wastage", "product_name": string, "quantity": integer}
{"intent": "chat"}
Use "chat" for greetings and anything else."#;

/// Item extraction prompt. `current` is the order being modified, if any.
pub fn items_prompt(catalog: &[String], current: &[ItemRequest]) -> String {
    let mut prompt = format!(
        r#"You extract ordered items from a Traditional Chinese message.
Known products: {}
Output only a JSON object:
{{"items": [{{"product_name": string, "quantity": integer}}]}}
Use the known product name closest to what the customer wrote."#,
        catalog.join(", ")
    );
    if !current.is_empty() {
        let lines: Vec<String> = current
            .iter()
            .map(|i| format!("{} x {}", i.product_name, i.quantity))
            .collect();
        prompt.push_str(&format!(
            "\nThe current order is: {}.\nThe message modifies it. Return the COMPLETE revised list, \
keeping items the customer did not mention and dropping items they removed.",
            lines.join(", ")
        ));
    }
    prompt
}

static CODE_FENCE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)^\s*```(?:json)?\s*(.*?)\s*```\s*$").expect("static regex")
});

/// Parse a model reply as JSON, tolerating a surrounding code fence and
/// leading or trailing chatter around a single object.
pub fn parse_json_reply<T: DeserializeOwned>(raw: &str) -> Result<T, LlmError> {
    let mut text = raw.trim();
    if let Some(caps) = CODE_FENCE.captures(text) {
        if let Some(inner) = caps.get(1) {
            text = inner.as_str();
        }
    }
    if let Ok(parsed) = serde_json::from_str(text) {
        return Ok(parsed);
    }
    match (text.find('{'), text.rfind('}')) {
        (Some(start), Some(end)) if start < end => Ok(serde_json::from_str(&text[start..=end])?),
        _ => Err(LlmError::Extraction(format!("no JSON object in reply: {raw}"))),
    }
}
