//! The ordering conversation: phases, keyword detection, LLM extraction,
//! phase handlers and the per-session dispatcher.

pub mod dispatcher;
pub mod extractor;
pub mod handlers;
pub mod keywords;
pub mod prompts;
pub mod state;

pub use dispatcher::Dispatcher;
pub use extractor::{DeliveryChoice, Extractor, Intent, LlmExtractor};
pub use state::{CustomerInfo, Phase, SessionState, StatePatch, Transition};
