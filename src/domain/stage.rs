use std::error::Error;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Stage {
    #[default]
    FirstContact,
    TechnicalDiscussion,
    PricingProposal,
    Negotiation,
    ConvertedClient,
}

impl Stage {
    pub const ALL: [Stage; 5] = [
        Stage::FirstContact,
        Stage::TechnicalDiscussion,
        Stage::PricingProposal,
        Stage::Negotiation,
        Stage::ConvertedClient,
    ];

    pub fn number(self) -> i64 {
        match self {
            Stage::FirstContact => 1,
            Stage::TechnicalDiscussion => 2,
            Stage::PricingProposal => 3,
            Stage::Negotiation => 4,
            Stage::ConvertedClient => 5,
        }
    }

    pub fn from_number(value: i64) -> Result<Self, InvalidStage> {
        match value {
            1 => Ok(Stage::FirstContact),
            2 => Ok(Stage::TechnicalDiscussion),
            3 => Ok(Stage::PricingProposal),
            4 => Ok(Stage::Negotiation),
            5 => Ok(Stage::ConvertedClient),
            _ => Err(InvalidStage { value }),
        }
    }

    pub fn slug(self) -> &'static str {
        match self {
            Stage::FirstContact => "first_contact",
            Stage::TechnicalDiscussion => "technical_discussion",
            Stage::PricingProposal => "pricing_proposal",
            Stage::Negotiation => "negotiation",
            Stage::ConvertedClient => "converted_client",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Stage::FirstContact => "First Contact",
            Stage::TechnicalDiscussion => "Technical Discussion",
            Stage::PricingProposal => "Pricing Proposal",
            Stage::Negotiation => "Negotiation",
            Stage::ConvertedClient => "Converted Client",
        }
    }

    pub fn is_converted(self) -> bool {
        self == Stage::ConvertedClient
    }

    /// Stages strictly after `FirstContact` up to and including `self`.
    pub fn reached(self) -> impl Iterator<Item = Stage> {
        Stage::ALL
            .into_iter()
            .filter(move |stage| *stage != Stage::FirstContact && *stage <= self)
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl TryFrom<i64> for Stage {
    type Error = InvalidStage;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        Stage::from_number(value)
    }
}

impl FromStr for Stage {
    type Err = ParseStageError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let trimmed = value.trim();
        if let Ok(number) = trimmed.parse::<i64>() {
            return Stage::from_number(number).map_err(|_| ParseStageError {
                value: value.to_string(),
            });
        }

        let normalized = trimmed.to_ascii_lowercase().replace(['-', ' '], "_");
        let stage = match normalized.as_str() {
            "first_contact" | "contact" | "lead" => Stage::FirstContact,
            "technical_discussion" | "technical" | "discussion" => Stage::TechnicalDiscussion,
            "pricing_proposal" | "pricing" | "proposal" => Stage::PricingProposal,
            "negotiation" | "negotiating" => Stage::Negotiation,
            "converted_client" | "converted" | "won" => Stage::ConvertedClient,
            _ => {
                return Err(ParseStageError {
                    value: value.to_string(),
                });
            }
        };

        Ok(stage)
    }
}

impl Serialize for Stage {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_i64(self.number())
    }
}

impl<'de> Deserialize<'de> for Stage {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = i64::deserialize(deserializer)?;
        Stage::from_number(value).map_err(serde::de::Error::custom)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InvalidStage {
    pub value: i64,
}

impl fmt::Display for InvalidStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid stage {}: expected a value from 1 to 5", self.value)
    }
}

impl Error for InvalidStage {}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseStageError {
    value: String,
}

impl fmt::Display for ParseStageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "invalid stage '{}': expected 1-5 or one of {}",
            self.value,
            Stage::ALL
                .iter()
                .map(|stage| stage.slug())
                .collect::<Vec<_>>()
                .join(", ")
        )
    }
}

impl Error for ParseStageError {}

#[cfg(test)]
mod tests {
    use super::Stage;
    use std::str::FromStr;

    #[test]
    fn parses_numbers_slugs_and_labels() {
        assert_eq!(Stage::from_str("3").unwrap(), Stage::PricingProposal);
        assert_eq!(
            Stage::from_str("technical_discussion").unwrap(),
            Stage::TechnicalDiscussion
        );
        assert_eq!(
            Stage::from_str("Converted Client").unwrap(),
            Stage::ConvertedClient
        );
        assert_eq!(Stage::from_str("first-contact").unwrap(), Stage::FirstContact);
    }

    #[test]
    fn rejects_out_of_range_numbers() {
        assert!(Stage::from_str("0").is_err());
        assert!(Stage::from_str("6").is_err());
        assert_eq!(Stage::from_number(9).unwrap_err().value, 9);
        assert!(Stage::try_from(-1).is_err());
    }

    #[test]
    fn numbers_round_trip_for_every_stage() {
        for stage in Stage::ALL {
            assert_eq!(Stage::from_number(stage.number()).unwrap(), stage);
        }
    }

    #[test]
    fn reached_lists_stages_after_first_contact() {
        assert_eq!(Stage::FirstContact.reached().count(), 0);
        assert_eq!(
            Stage::Negotiation.reached().collect::<Vec<_>>(),
            vec![
                Stage::TechnicalDiscussion,
                Stage::PricingProposal,
                Stage::Negotiation
            ]
        );
    }

    #[test]
    fn serializes_as_integer() {
        let json = serde_json::to_string(&Stage::Negotiation).unwrap();
        assert_eq!(json, "4");
        let parsed: Stage = serde_json::from_str("2").unwrap();
        assert_eq!(parsed, Stage::TechnicalDiscussion);
        assert!(serde_json::from_str::<Stage>("7").is_err());
    }
}
