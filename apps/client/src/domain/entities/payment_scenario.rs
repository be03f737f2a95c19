use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString};

/// Outcome the dummy gateway simulates for a card.
///
/// Driven by well-known test card numbers.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, AsRefStr, Display, EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
#[derive(Default)]
pub enum PaymentScenario {
    /// 4242424242424242
    #[default]
    Success,
    /// 4000000000000002
    Decline,
    /// 4000000000009995
    InsufficientFunds,
    /// 4000000000000069
    ExpiredCard,
    /// 4000000000000119
    ProcessingError,
    /// 4000000000000259; the gateway is unreachable
    GatewayUnavailable,
}

impl PaymentScenario {
    pub fn test_card_number(&self) -> &'static str {
        match self {
            PaymentScenario::Success => "4242424242424242",
            PaymentScenario::Decline => "4000000000000002",
            PaymentScenario::InsufficientFunds => "4000000000009995",
            PaymentScenario::ExpiredCard => "4000000000000069",
            PaymentScenario::ProcessingError => "4000000000000119",
            PaymentScenario::GatewayUnavailable => "4000000000000259",
        }
    }

    /// Detect the scenario from a card number; spaces and dashes are ignored.
    pub fn from_card_number(card: &str) -> Self {
        let card = card.replace([' ', '-'], "");

        match card.as_str() {
            "4000000000000002" => PaymentScenario::Decline,
            "4000000000009995" => PaymentScenario::InsufficientFunds,
            "4000000000000069" => PaymentScenario::ExpiredCard,
            "4000000000000119" => PaymentScenario::ProcessingError,
            "4000000000000259" => PaymentScenario::GatewayUnavailable,
            s if s.starts_with("4000") => PaymentScenario::Decline,
            _ => PaymentScenario::Success,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, PaymentScenario::Success)
    }

    /// Message shown to the customer when the card is refused.
    ///
    /// `None` for success and for gateway outages, which are not declines.
    pub fn decline_message(&self) -> Option<&'static str> {
        match self {
            PaymentScenario::Success | PaymentScenario::GatewayUnavailable => None,
            PaymentScenario::Decline => Some("Your card was declined."),
            PaymentScenario::InsufficientFunds => Some("Your card has insufficient funds."),
            PaymentScenario::ExpiredCard => Some("Your card has expired."),
            PaymentScenario::ProcessingError => {
                Some("An error occurred while processing your card.")
            }
        }
    }

    pub fn all() -> &'static [PaymentScenario] {
        &[
            PaymentScenario::Success,
            PaymentScenario::Decline,
            PaymentScenario::InsufficientFunds,
            PaymentScenario::ExpiredCard,
            PaymentScenario::ProcessingError,
            PaymentScenario::GatewayUnavailable,
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_card_number() {
        assert_eq!(
            PaymentScenario::from_card_number("4242 4242 4242 4242"),
            PaymentScenario::Success
        );
        assert_eq!(
            PaymentScenario::from_card_number("4000-0000-0000-0002"),
            PaymentScenario::Decline
        );
        assert_eq!(
            PaymentScenario::from_card_number("4000000000000259"),
            PaymentScenario::GatewayUnavailable
        );
        assert_eq!(
            PaymentScenario::from_card_number("4000123412341234"),
            PaymentScenario::Decline
        );
        assert_eq!(
            PaymentScenario::from_card_number("5555555555554444"),
            PaymentScenario::Success
        );
    }

    #[test]
    fn test_test_cards_map_back_to_their_scenario() {
        for scenario in PaymentScenario::all() {
            assert_eq!(
                PaymentScenario::from_card_number(scenario.test_card_number()),
                *scenario
            );
        }
    }

    #[test]
    fn test_decline_messages() {
        assert!(PaymentScenario::Success.decline_message().is_none());
        assert!(PaymentScenario::GatewayUnavailable.decline_message().is_none());
        assert!(PaymentScenario::ExpiredCard.decline_message().is_some());
    }

    #[test]
    fn test_from_str_case_insensitive() {
        assert_eq!(
            "Insufficient_Funds".parse::<PaymentScenario>().unwrap(),
            PaymentScenario::InsufficientFunds
        );
        assert!("3ds".parse::<PaymentScenario>().is_err());
    }
}
