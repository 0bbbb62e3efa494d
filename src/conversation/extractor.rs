//! Structured extraction from free text, backed by an LLM.
//!
//! Handlers only see the `Extractor` trait so tests can script it.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;

use super::prompts::{
    CHAT_SYSTEM_PROMPT, CUSTOMER_PROMPT, DELIVERY_PROMPT, INTENT_PROMPT, items_prompt,
    parse_json_reply,
};
use super::state::CustomerInfo;
use crate::error::LlmError;
use crate::llm::{ChatMessage, CompletionRequest, LlmProvider};
use crate::orders::{DeliveryMethod, ItemRequest, PaymentMethod};

/// Delivery and payment as understood from one message.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeliveryChoice {
    pub delivery: Option<DeliveryMethod>,
    pub payment: Option<PaymentMethod>,
}

impl DeliveryChoice {
    /// Keyword-only detection, no model involved.
    pub fn detect(text: &str) -> Self {
        Self {
            delivery: DeliveryMethod::detect(text),
            payment: PaymentMethod::detect(text),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.delivery.is_none() && self.payment.is_none()
    }
}

/// What an idle-phase message asks for.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "intent", rename_all = "snake_case")]
pub enum Intent {
    QueryProducts {
        #[serde(default)]
        product_name: Option<String>,
    },
    CheckStock {
        product_name: String,
    },
    QueryOrders {
        #[serde(default)]
        customer_name: Option<String>,
        #[serde(default)]
        order_id: Option<i64>,
    },
    RecordWastage {
        product_name: String,
        quantity: i64,
    },
    #[serde(other)]
    Chat,
}

/// Text → structured record, or text → reply. Every call may fail.
#[async_trait]
pub trait Extractor: Send + Sync {
    async fn extract_customer(&self, text: &str) -> Result<CustomerInfo, LlmError>;

    /// Items named in `text`. When `current` is non-empty the message is a
    /// modification and the result is the full revised list.
    async fn extract_items(
        &self,
        text: &str,
        current: &[ItemRequest],
        catalog: &[String],
    ) -> Result<Vec<ItemRequest>, LlmError>;

    async fn extract_delivery(&self, text: &str) -> Result<DeliveryChoice, LlmError>;

    async fn extract_intent(&self, text: &str) -> Result<Intent, LlmError>;

    /// Free-form reply for messages outside the ordering flow.
    async fn chat(&self, history: &[ChatMessage], text: &str) -> Result<String, LlmError>;
}

#[derive(Deserialize)]
struct ItemsReply {
    #[serde(default)]
    items: Vec<ItemRequest>,
}

#[derive(Deserialize)]
struct DeliveryReply {
    #[serde(default)]
    delivery: Option<String>,
    #[serde(default)]
    payment: Option<String>,
}

/// `Extractor` that asks the configured model for JSON.
pub struct LlmExtractor {
    llm: Arc<dyn LlmProvider>,
}

impl LlmExtractor {
    pub fn new(llm: Arc<dyn LlmProvider>) -> Self {
        Self { llm }
    }

    async fn extract_json<T: serde::de::DeserializeOwned>(
        &self,
        system: &str,
        text: &str,
    ) -> Result<T, LlmError> {
        let request = CompletionRequest::new(vec![
            ChatMessage::system(system),
            ChatMessage::user(text),
        ])
        .with_max_tokens(512)
        .with_temperature(0.0)
        .with_json_output();

        let response = self.llm.complete(request).await?;
        debug!(
            model = self.llm.model_name(),
            tokens = response.output_tokens,
            "Extraction reply"
        );
        parse_json_reply(&response.content)
    }
}

#[async_trait]
impl Extractor for LlmExtractor {
    async fn extract_customer(&self, text: &str) -> Result<CustomerInfo, LlmError> {
        self.extract_json(CUSTOMER_PROMPT, text).await
    }

    async fn extract_items(
        &self,
        text: &str,
        current: &[ItemRequest],
        catalog: &[String],
    ) -> Result<Vec<ItemRequest>, LlmError> {
        let prompt = items_prompt(catalog, current);
        let reply: ItemsReply = self.extract_json(&prompt, text).await?;
        Ok(reply.items)
    }

    async fn extract_delivery(&self, text: &str) -> Result<DeliveryChoice, LlmError> {
        let reply: DeliveryReply = self.extract_json(DELIVERY_PROMPT, text).await?;
        Ok(DeliveryChoice {
            delivery: reply.delivery.and_then(|d| d.parse().ok()),
            payment: reply.payment.and_then(|p| p.parse().ok()),
        })
    }

    async fn extract_intent(&self, text: &str) -> Result<Intent, LlmError> {
        self.extract_json(INTENT_PROMPT, text).await
    }

    async fn chat(&self, history: &[ChatMessage], text: &str) -> Result<String, LlmError> {
        let mut messages = Vec::with_capacity(history.len() + 2);
        messages.push(ChatMessage::system(CHAT_SYSTEM_PROMPT));
        messages.extend_from_slice(history);
        messages.push(ChatMessage::user(text));

        let response = self
            .llm
            .complete(
                CompletionRequest::new(messages)
                    .with_max_tokens(1024)
                    .with_temperature(0.0),
            )
            .await?;
        let reply = response.content.trim();
        if reply.is_empty() {
            return Err(LlmError::Extraction("empty chat reply".to_string()));
        }
        Ok(reply.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::CompletionResponse;
    use std::sync::Mutex;

    /// Provider returning canned replies and recording requests.
    struct CannedProvider {
        reply: String,
        seen: Mutex<Vec<CompletionRequest>>,
    }

    impl CannedProvider {
        fn new(reply: &str) -> Arc<Self> {
            Arc::new(Self {
                reply: reply.to_string(),
                seen: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl LlmProvider for CannedProvider {
        fn model_name(&self) -> &str {
            "canned"
        }

        async fn complete(
            &self,
            request: CompletionRequest,
        ) -> Result<CompletionResponse, LlmError> {
            self.seen.lock().unwrap().push(request);
            Ok(CompletionResponse {
                content: self.reply.clone(),
                input_tokens: 0,
                output_tokens: 0,
            })
        }
    }

    #[tokio::test]
    async fn extracts_customer_fields() {
        let llm = CannedProvider::new(
            r#"{"name": "王小明", "address": "台北市", "phone": null}"#,
        );
        let ex = LlmExtractor::new(llm.clone());
        let info = ex.extract_customer("我是王小明，住台北市").await.unwrap();
        assert_eq!(info.name.as_deref(), Some("王小明"));
        assert!(info.phone.is_none());

        let seen = llm.seen.lock().unwrap();
        assert!(seen[0].json_output);
        assert_eq!(seen[0].temperature, Some(0.0));
    }

    #[tokio::test]
    async fn extracts_items_from_fenced_reply() {
        let llm = CannedProvider::new(
            "```json\n{\"items\": [{\"product_name\": \"蘋果\", \"quantity\": 2}]}\n```",
        );
        let ex = LlmExtractor::new(llm);
        let items = ex
            .extract_items("蘋果兩箱", &[], &["蘋果".into()])
            .await
            .unwrap();
        assert_eq!(items, vec![ItemRequest::new("蘋果", 2)]);
    }

    #[tokio::test]
    async fn unknown_delivery_labels_are_dropped() {
        let llm = CannedProvider::new(r#"{"delivery": "宅配", "payment": "匯款"}"#);
        let ex = LlmExtractor::new(llm);
        let choice = ex.extract_delivery("宅配，用轉帳").await.unwrap();
        assert_eq!(choice.delivery, None);
        assert_eq!(choice.payment, Some(PaymentMethod::BankTransfer));
    }

    #[tokio::test]
    async fn unknown_intent_is_chat() {
        let llm = CannedProvider::new(r#"{"intent": "weather"}"#);
        let ex = LlmExtractor::new(llm);
        assert_eq!(ex.extract_intent("今天天氣如何").await.unwrap(), Intent::Chat);
    }

    #[tokio::test]
    async fn wastage_intent_parses() {
        let llm = CannedProvider::new(
            r#"{"intent": "record_wastage", "product_name": "雞蛋", "quantity": 3}"#,
        );
        let ex = LlmExtractor::new(llm);
        assert_eq!(
            ex.extract_intent("雞蛋破了三盒").await.unwrap(),
            Intent::RecordWastage {
                product_name: "雞蛋".into(),
                quantity: 3
            }
        );
    }

    #[tokio::test]
    async fn chat_sends_history() {
        let llm = CannedProvider::new("您好！");
        let ex = LlmExtractor::new(llm.clone());
        let history = vec![ChatMessage::user("嗨"), ChatMessage::assistant("您好")];
        assert_eq!(ex.chat(&history, "你是誰").await.unwrap(), "您好！");
        let seen = llm.seen.lock().unwrap();
        assert_eq!(seen[0].messages.len(), 4);
        assert_eq!(seen[0].messages[0].role, crate::llm::Role::System);
    }

    #[test]
    fn keyword_detection() {
        let c = DeliveryChoice::detect("郵寄，貨到付款");
        assert_eq!(c.delivery, Some(DeliveryMethod::Post));
        assert_eq!(c.payment, Some(PaymentMethod::CashOnDelivery));
        assert!(DeliveryChoice::detect("隨便").is_empty());
    }
}
