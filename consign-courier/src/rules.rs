use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use consign_core::CourierCode;

use crate::error::CourierError;

/// Destination-table entry: who ships there by default and why.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DestinationRule {
    pub primary: CourierCode,
    #[serde(default)]
    pub secondary: Option<CourierCode>,
    pub reason: String,
}

/// Immutable courier-selection configuration. Updates go through [`SelectionRules::apply`],
/// which returns a new value with the next version.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SelectionRules {
    pub version: u64,
    /// Keyed by upper-case ISO country code
    pub destinations: BTreeMap<String, DestinationRule>,
    pub default_destination: DestinationRule,
    pub heavy_weight_kg: f64,
    pub heavy_courier: CourierCode,
    pub high_value_threshold: f64,
    pub high_value_courier: CourierCode,
    pub express_courier: CourierCode,
    /// Couriers that actually deliver to a destination
    pub availability: BTreeMap<String, Vec<CourierCode>>,
    pub default_availability: Vec<CourierCode>,
}

impl Default for SelectionRules {
    fn default() -> Self {
        let mut destinations = BTreeMap::new();
        destinations.insert(
            "IN".to_string(),
            DestinationRule {
                primary: CourierCode::BlueDart,
                secondary: Some(CourierCode::Dhl),
                reason: "Best domestic coverage and pricing".to_string(),
            },
        );

        let mut availability = BTreeMap::new();
        availability.insert("IN".to_string(), vec![CourierCode::BlueDart, CourierCode::Dhl]);

        Self {
            version: 1,
            destinations,
            default_destination: DestinationRule {
                primary: CourierCode::Dhl,
                secondary: None,
                reason: "International shipping specialist".to_string(),
            },
            heavy_weight_kg: 10.0,
            heavy_courier: CourierCode::Dhl,
            high_value_threshold: 50_000.0,
            high_value_courier: CourierCode::Dhl,
            express_courier: CourierCode::BlueDart,
            availability,
            default_availability: vec![CourierCode::Dhl],
        }
    }
}

/// Partial change to the selection rules. Absent fields keep their current value;
/// map entries are merged key by key.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RulesUpdate {
    #[serde(default)]
    pub destinations: BTreeMap<String, DestinationRule>,
    pub default_destination: Option<DestinationRule>,
    pub heavy_weight_kg: Option<f64>,
    pub heavy_courier: Option<CourierCode>,
    pub high_value_threshold: Option<f64>,
    pub high_value_courier: Option<CourierCode>,
    pub express_courier: Option<CourierCode>,
    #[serde(default)]
    pub availability: BTreeMap<String, Vec<CourierCode>>,
    pub default_availability: Option<Vec<CourierCode>>,
}

impl RulesUpdate {
    pub fn is_empty(&self) -> bool {
        self.destinations.is_empty()
            && self.default_destination.is_none()
            && self.heavy_weight_kg.is_none()
            && self.heavy_courier.is_none()
            && self.high_value_threshold.is_none()
            && self.high_value_courier.is_none()
            && self.express_courier.is_none()
            && self.availability.is_empty()
            && self.default_availability.is_none()
    }
}

pub fn normalize_destination(destination: &str) -> String {
    destination.trim().to_ascii_uppercase()
}

impl SelectionRules {
    pub fn destination_rule(&self, destination: &str) -> &DestinationRule {
        self.destinations
            .get(&normalize_destination(destination))
            .unwrap_or(&self.default_destination)
    }

    pub fn available_for(&self, destination: &str) -> &[CourierCode] {
        self.availability
            .get(&normalize_destination(destination))
            .map(Vec::as_slice)
            .unwrap_or(&self.default_availability)
    }

    /// Produce the next rules version. `self` is left untouched.
    pub fn apply(&self, update: RulesUpdate) -> Result<SelectionRules, CourierError> {
        let mut next = self.clone();
        next.version = self.version + 1;

        for (destination, rule) in update.destinations {
            next.destinations.insert(normalize_destination(&destination), rule);
        }
        for (destination, couriers) in update.availability {
            next.availability.insert(normalize_destination(&destination), couriers);
        }
        if let Some(rule) = update.default_destination {
            next.default_destination = rule;
        }
        if let Some(couriers) = update.default_availability {
            next.default_availability = couriers;
        }
        if let Some(kg) = update.heavy_weight_kg {
            next.heavy_weight_kg = kg;
        }
        if let Some(courier) = update.heavy_courier {
            next.heavy_courier = courier;
        }
        if let Some(value) = update.high_value_threshold {
            next.high_value_threshold = value;
        }
        if let Some(courier) = update.high_value_courier {
            next.high_value_courier = courier;
        }
        if let Some(courier) = update.express_courier {
            next.express_courier = courier;
        }

        next.validate()?;
        Ok(next)
    }

    fn validate(&self) -> Result<(), CourierError> {
        if !(self.heavy_weight_kg.is_finite() && self.heavy_weight_kg > 0.0) {
            return Err(CourierError::InvalidRules("heavy_weight_kg must be positive".to_string()));
        }
        if !(self.high_value_threshold.is_finite() && self.high_value_threshold > 0.0) {
            return Err(CourierError::InvalidRules("high_value_threshold must be positive".to_string()));
        }
        if self.default_availability.is_empty() {
            return Err(CourierError::InvalidRules("default_availability cannot be empty".to_string()));
        }
        if let Some((destination, _)) = self.availability.iter().find(|(_, couriers)| couriers.is_empty()) {
            return Err(CourierError::InvalidRules(format!("no courier available for {}", destination)));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_table() {
        let rules = SelectionRules::default();
        assert_eq!(rules.destination_rule("in").primary, CourierCode::BlueDart);
        assert_eq!(rules.destination_rule("US").primary, CourierCode::Dhl);
        assert_eq!(rules.destination_rule("US").secondary, None);
        assert_eq!(rules.available_for("IN"), &[CourierCode::BlueDart, CourierCode::Dhl]);
        assert_eq!(rules.available_for("DE"), &[CourierCode::Dhl]);
    }

    #[test]
    fn test_apply_produces_new_version() {
        let rules = SelectionRules::default();
        let update = RulesUpdate {
            heavy_weight_kg: Some(20.0),
            destinations: BTreeMap::from([(
                "ae".to_string(),
                DestinationRule {
                    primary: CourierCode::Dhl,
                    secondary: None,
                    reason: "Gulf lane".to_string(),
                },
            )]),
            ..Default::default()
        };

        let next = rules.apply(update).unwrap();

        assert_eq!(next.version, 2);
        assert_eq!(next.heavy_weight_kg, 20.0);
        assert_eq!(next.destination_rule("AE").reason, "Gulf lane");
        // the original value is unchanged
        assert_eq!(rules.version, 1);
        assert_eq!(rules.heavy_weight_kg, 10.0);
    }

    #[test]
    fn test_apply_rejects_invalid_threshold() {
        let update = RulesUpdate {
            high_value_threshold: Some(-1.0),
            ..Default::default()
        };
        assert!(matches!(
            SelectionRules::default().apply(update),
            Err(CourierError::InvalidRules(_))
        ));
    }

    #[test]
    fn test_update_deserializes_partial_json() {
        let update: RulesUpdate = serde_json::from_str(r#"{"express_courier": "dhl"}"#).unwrap();
        assert_eq!(update.express_courier, Some(CourierCode::Dhl));
        assert!(!update.is_empty());
        assert!(RulesUpdate::default().is_empty());
    }
}
