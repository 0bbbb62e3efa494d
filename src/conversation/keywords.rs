//! Keyword detection for short control utterances.

/// Utterances longer than this are never treated as confirm or cancel.
const MAX_CONTROL_CHARS: usize = 10;

const CONFIRM_KEYWORDS: &[&str] = &[
    "確認", "確定", "正確", "沒問題", "好", "對", "是", "可以", "ok", "yes", "confirm",
];

const NEGATIONS: &[&str] = &["不", "否", "錯", "別", "沒有", "no", "not", "don't"];

const CANCEL_KEYWORDS: &[&str] = &["取消", "cancel"];

const ORDER_KEYWORDS: &[&str] = &["下單", "訂購", "我要買"];

fn is_short(text: &str) -> bool {
    text.trim().chars().count() <= MAX_CONTROL_CHARS
}

/// A short affirmative without negation.
pub fn is_confirmation(text: &str) -> bool {
    let lower = text.trim().to_lowercase();
    if !is_short(&lower) {
        return false;
    }
    // "沒問題" is affirmative even though it contains a negation marker.
    let without_idiom = lower.replace("沒問題", "");
    if NEGATIONS.iter().any(|n| without_idiom.contains(n)) {
        return false;
    }
    CONFIRM_KEYWORDS.iter().any(|k| lower.contains(k))
}

pub fn is_cancel(text: &str) -> bool {
    let lower = text.trim().to_lowercase();
    is_short(&lower) && CANCEL_KEYWORDS.iter().any(|k| lower.contains(k))
}

/// Whether the customer wants to start placing an order.
pub fn is_order_request(text: &str) -> bool {
    if ORDER_KEYWORDS.iter().any(|k| text.contains(k)) {
        return true;
    }
    text.to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .any(|w| w == "order")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn confirmations() {
        for t in ["確認", "好的", "沒問題", "OK", " yes ", "對，確定"] {
            assert!(is_confirmation(t), "{t} should confirm");
        }
    }

    #[test]
    fn negated_or_long_is_not_confirmation() {
        for t in ["不確認", "不對", "no", "這樣不好", "好的不過我想再加兩箱蘋果跟三瓶牛奶"] {
            assert!(!is_confirmation(t), "{t} should not confirm");
        }
    }

    #[test]
    fn cancel_only_on_short_utterances() {
        assert!(is_cancel("取消"));
        assert!(is_cancel("我要取消"));
        assert!(is_cancel("Cancel"));
        assert!(!is_cancel("請幫我查一下上週取消的那筆訂單狀態"));
    }

    #[test]
    fn order_keywords() {
        assert!(is_order_request("我要下單"));
        assert!(is_order_request("我要買蘋果"));
        assert!(is_order_request("I want to order"));
        assert!(!is_order_request("查詢訂單 3"));
        assert!(!is_order_request("show orders"));
    }
}
