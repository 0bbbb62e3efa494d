//! Conversation state machine: tracks which ordering phase a session is in.

use serde::{Deserialize, Serialize};

use crate::llm::ChatMessage;
use crate::orders::{DeliveryMethod, ItemRequest, PaymentMethod};

/// Free-chat turns kept per session for context.
const MAX_HISTORY: usize = 20;

/// The phases of the ordering conversation.
///
/// Progresses linearly: Idle → CollectInfo → ConfirmInfo → CollectItems →
/// ConfirmItems → CollectDelivery → PreviewOrder → Idle. Cancel returns to
/// Idle from anywhere.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    #[default]
    Idle,
    CollectInfo,
    ConfirmInfo,
    CollectItems,
    ConfirmItems,
    CollectDelivery,
    PreviewOrder,
}

impl Phase {
    /// Check if a transition from `self` to `target` is valid.
    ///
    /// Staying in the same phase is always allowed (re-prompt).
    pub fn can_transition_to(&self, target: Phase) -> bool {
        use Phase::*;
        if *self == target || target == Idle {
            return true;
        }
        matches!(
            (self, target),
            (Idle, CollectInfo)
                // Returning customer skips registration.
                | (Idle, CollectItems)
                | (CollectInfo, ConfirmInfo)
                | (ConfirmInfo, CollectInfo)
                | (ConfirmInfo, CollectItems)
                | (CollectItems, ConfirmItems)
                | (ConfirmItems, CollectDelivery)
                | (CollectDelivery, PreviewOrder)
                | (CollectDelivery, CollectItems)
                | (PreviewOrder, CollectItems)
        )
    }

    /// The next phase in the linear progression.
    pub fn next(&self) -> Phase {
        use Phase::*;
        match self {
            Idle => CollectInfo,
            CollectInfo => ConfirmInfo,
            ConfirmInfo => CollectItems,
            CollectItems => ConfirmItems,
            ConfirmItems => CollectDelivery,
            CollectDelivery => PreviewOrder,
            PreviewOrder => Idle,
        }
    }

    /// Whether a flow is in progress.
    pub fn is_active(&self) -> bool {
        !matches!(self, Self::Idle)
    }
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Idle => "idle",
            Self::CollectInfo => "collect_info",
            Self::ConfirmInfo => "confirm_info",
            Self::CollectItems => "collect_items",
            Self::ConfirmItems => "confirm_items",
            Self::CollectDelivery => "collect_delivery",
            Self::PreviewOrder => "preview_order",
        };
        write!(f, "{s}")
    }
}

/// Customer fields gathered before registration. Any may still be missing.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomerInfo {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
}

impl CustomerInfo {
    /// Overlay the non-empty fields of `newer` onto `self`.
    pub fn merge(&self, newer: CustomerInfo) -> CustomerInfo {
        fn pick(new: Option<String>, old: &Option<String>) -> Option<String> {
            new.map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .or_else(|| old.clone())
        }
        CustomerInfo {
            name: pick(newer.name, &self.name),
            address: pick(newer.address, &self.address),
            phone: pick(newer.phone, &self.phone),
        }
    }

    /// Labels of the fields still missing, in asking order.
    pub fn missing_fields(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if self.name.is_none() {
            missing.push("名稱");
        }
        if self.address.is_none() {
            missing.push("地址");
        }
        if self.phone.is_none() {
            missing.push("電話");
        }
        missing
    }

    /// All three fields, when present.
    pub fn complete(&self) -> Option<(&str, &str, &str)> {
        match (&self.name, &self.address, &self.phone) {
            (Some(n), Some(a), Some(p)) => Some((n.as_str(), a.as_str(), p.as_str())),
            _ => None,
        }
    }
}

/// Everything remembered about one chat session.
#[derive(Debug, Clone, Default)]
pub struct SessionState {
    pub phase: Phase,
    /// Set once registration succeeds; survives cancel.
    pub customer_id: Option<i64>,
    pub customer_name: Option<String>,
    /// Unconfirmed customer data.
    pub pending_customer: CustomerInfo,
    pub items: Vec<ItemRequest>,
    pub delivery: Option<DeliveryMethod>,
    pub payment: Option<PaymentMethod>,
    /// Recent turns, oldest first.
    pub history: Vec<ChatMessage>,
}

impl SessionState {
    /// Abandon the current flow, keeping a registered customer.
    pub fn cancel(&mut self) {
        self.phase = Phase::Idle;
        self.pending_customer = CustomerInfo::default();
        self.clear_selections();
    }

    fn clear_selections(&mut self) {
        self.items.clear();
        self.delivery = None;
        self.payment = None;
    }

    /// Apply a handler's patch and move to `next`.
    pub fn apply(&mut self, patch: StatePatch, next: Phase) {
        if patch.clear_selections {
            self.clear_selections();
        }
        if patch.clear_pending_customer {
            self.pending_customer = CustomerInfo::default();
        }
        if let Some((id, name)) = patch.customer {
            self.customer_id = Some(id);
            self.customer_name = Some(name);
        }
        if let Some(info) = patch.pending_customer {
            self.pending_customer = info;
        }
        if let Some(items) = patch.items {
            self.items = items;
        }
        if patch.delivery.is_some() {
            self.delivery = patch.delivery;
        }
        if patch.payment.is_some() {
            self.payment = patch.payment;
        }
        self.phase = next;
    }

    /// Append one user/assistant exchange, dropping the oldest beyond the cap.
    pub fn record_turn(&mut self, user: &str, reply: &str) {
        self.history.push(ChatMessage::user(user));
        self.history.push(ChatMessage::assistant(reply));
        if self.history.len() > MAX_HISTORY {
            let excess = self.history.len() - MAX_HISTORY;
            self.history.drain(..excess);
        }
    }
}

/// Changes a handler wants applied to the session. Clears run before sets.
#[derive(Debug, Clone, Default)]
pub struct StatePatch {
    pub customer: Option<(i64, String)>,
    pub pending_customer: Option<CustomerInfo>,
    pub clear_pending_customer: bool,
    pub items: Option<Vec<ItemRequest>>,
    pub delivery: Option<DeliveryMethod>,
    pub payment: Option<PaymentMethod>,
    pub clear_selections: bool,
}

/// Output of one phase handler.
#[derive(Debug, Clone)]
pub struct Transition {
    pub reply: String,
    pub patch: StatePatch,
    pub next: Phase,
}

impl Transition {
    /// Reply and stay in `phase` without touching state.
    pub fn stay(phase: Phase, reply: impl Into<String>) -> Self {
        Self {
            reply: reply.into(),
            patch: StatePatch::default(),
            next: phase,
        }
    }

    pub fn to(next: Phase, reply: impl Into<String>, patch: StatePatch) -> Self {
        Self {
            reply: reply.into(),
            patch,
            next,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn linear_progression_is_valid() {
        let mut phase = Phase::Idle;
        for _ in 0..7 {
            let next = phase.next();
            assert!(
                phase.can_transition_to(next),
                "{phase} should transition to {next}"
            );
            phase = next;
        }
        assert_eq!(phase, Phase::Idle);
    }

    #[test]
    fn invalid_transitions() {
        use Phase::*;
        assert!(!Idle.can_transition_to(PreviewOrder));
        assert!(!CollectInfo.can_transition_to(CollectItems));
        assert!(!ConfirmItems.can_transition_to(PreviewOrder));
        assert!(!PreviewOrder.can_transition_to(CollectDelivery));
    }

    #[test]
    fn every_phase_can_cancel() {
        use Phase::*;
        for p in [
            CollectInfo,
            ConfirmInfo,
            CollectItems,
            ConfirmItems,
            CollectDelivery,
            PreviewOrder,
        ] {
            assert!(p.can_transition_to(Idle));
            assert!(p.is_active());
        }
        assert!(!Idle.is_active());
    }

    #[test]
    fn display_matches_serde() {
        for p in [Phase::Idle, Phase::CollectItems, Phase::PreviewOrder] {
            let json = serde_json::to_string(&p).unwrap();
            assert_eq!(json, format!("\"{p}\""));
        }
    }

    #[test]
    fn merge_keeps_old_values_for_missing_fields() {
        let old = CustomerInfo {
            name: Some("王小明".into()),
            address: Some("台北市".into()),
            phone: None,
        };
        let merged = old.merge(CustomerInfo {
            name: Some("  ".into()),
            address: Some("新北市".into()),
            phone: Some("0900000000".into()),
        });
        assert_eq!(merged.name.as_deref(), Some("王小明"));
        assert_eq!(merged.address.as_deref(), Some("新北市"));
        assert!(merged.complete().is_some());
    }

    #[test]
    fn missing_fields_in_order() {
        let info = CustomerInfo {
            address: Some("台北市".into()),
            ..Default::default()
        };
        assert_eq!(info.missing_fields(), vec!["名稱", "電話"]);
    }

    #[test]
    fn cancel_keeps_registered_customer() {
        let mut state = SessionState {
            phase: Phase::CollectDelivery,
            customer_id: Some(7),
            customer_name: Some("王小明".into()),
            items: vec![ItemRequest::new("蘋果", 2)],
            delivery: Some(DeliveryMethod::Post),
            ..Default::default()
        };
        state.cancel();
        assert_eq!(state.phase, Phase::Idle);
        assert_eq!(state.customer_id, Some(7));
        assert!(state.items.is_empty());
        assert!(state.delivery.is_none());
    }

    #[test]
    fn apply_clears_before_setting() {
        let mut state = SessionState {
            items: vec![ItemRequest::new("蘋果", 2)],
            payment: Some(PaymentMethod::Cash),
            ..Default::default()
        };
        state.apply(
            StatePatch {
                clear_selections: true,
                items: Some(vec![ItemRequest::new("牛奶", 1)]),
                ..Default::default()
            },
            Phase::ConfirmItems,
        );
        assert_eq!(state.items, vec![ItemRequest::new("牛奶", 1)]);
        assert!(state.payment.is_none());
        assert_eq!(state.phase, Phase::ConfirmItems);
    }

    #[test]
    fn history_is_bounded() {
        let mut state = SessionState::default();
        for i in 0..30 {
            state.record_turn(&format!("q{i}"), "a");
        }
        assert_eq!(state.history.len(), MAX_HISTORY);
        assert_eq!(state.history.last().unwrap().content, "a");
    }
}
