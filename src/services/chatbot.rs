use crate::graph;
use crate::message::{ChatMessage, MessageRole};

/// Specialist agent a user message is routed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Product,
    Technical,
    CustomerService,
    Human,
}

impl Stage {
    pub fn node_id(&self) -> &'static str {
        match self {
            Stage::Product => graph::PRODUCT,
            Stage::Technical => graph::TECHNICAL,
            Stage::CustomerService => graph::CUSTOMER_SERVICE,
            Stage::Human => graph::HUMAN,
        }
    }

    /// A human handoff needs the user to act.
    pub fn requires_action(&self) -> bool {
        matches!(self, Stage::Human)
    }
}

const HUMAN_WORDS: &[&str] = &["human", "person", "representative", "operator", "someone"];
const TECHNICAL_WORDS: &[&str] = &[
    "error", "bug", "crash", "crashes", "crashing", "broken", "login", "password", "app", "website",
    "troubleshoot",
];
const CUSTOMER_SERVICE_WORDS: &[&str] = &[
    "refund", "billing", "invoice", "charge", "charged", "account", "cancel", "complaint",
];
const PRODUCT_WORDS: &[&str] = &[
    "price", "pricing", "cost", "available", "availability", "flight", "flights", "hotel", "hotels",
    "car", "rental", "excursion", "excursions", "book", "booking", "tour",
];

fn words(msg: &str) -> Vec<String> {
    msg.split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .map(str::to_lowercase)
        .collect()
}

fn mentions(words: &[String], vocabulary: &[&str]) -> bool {
    words.iter().any(|w| vocabulary.contains(&w.as_str()))
}

/// Keyword routing, checked from the most to the least specific agent.
pub fn detect_stage(msg: &str) -> Stage {
    let lower = msg.to_lowercase();
    let words = words(msg);

    if lower.contains("speak to") || lower.contains("talk to") || mentions(&words, HUMAN_WORDS) {
        Stage::Human
    } else if lower.contains("not working") || mentions(&words, TECHNICAL_WORDS) {
        Stage::Technical
    } else if mentions(&words, CUSTOMER_SERVICE_WORDS) {
        Stage::CustomerService
    } else if mentions(&words, PRODUCT_WORDS) {
        Stage::Product
    } else {
        Stage::CustomerService
    }
}

/// Reply of the agent `stage` to `user_msg`; `history` is the conversation so far,
/// including `user_msg`.
pub fn generate_reply(stage: Stage, history: &[ChatMessage], user_msg: &str) -> String {
    let first_turn = history
        .iter()
        .filter(|m| m.role == MessageRole::User)
        .count()
        <= 1;
    let greeting = if first_turn { "Hi, thanks for reaching out. " } else { "" };

    let body = match stage {
        Stage::Product => {
            "I can help with flights, hotels, car rentals and excursions. \
             Tell me your dates and destination and I'll check availability and prices."
                .to_string()
        }
        Stage::Technical => format!(
            "Sorry you're running into trouble. \
             Could you describe what happens when you see \"{}\"?",
            user_msg.trim()
        ),
        Stage::CustomerService => {
            "I can look into bookings, billing and account questions. \
             Could you share your booking reference?"
                .to_string()
        }
        Stage::Human => {
            "I'm handing this conversation over to a member of our support team. \
             Please confirm you'd like to be contacted."
                .to_string()
        }
    };

    format!("{greeting}{body}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn matches_whole_words_only() {
        assert_eq!(detect_stage("I'm so happy with my trip"), Stage::CustomerService);
        assert_eq!(detect_stage("the app keeps crashing"), Stage::Technical);
    }

    #[test]
    fn greets_on_first_turn_only() {
        let one = vec![ChatMessage::new(MessageRole::User, "price?")];
        assert!(generate_reply(Stage::Product, &one, "price?").starts_with("Hi"));

        let two = vec![
            ChatMessage::new(MessageRole::User, "price?"),
            ChatMessage::new(MessageRole::Assistant, "..."),
            ChatMessage::new(MessageRole::User, "and hotels?"),
        ];
        assert!(!generate_reply(Stage::Product, &two, "and hotels?").starts_with("Hi"));
    }
}
