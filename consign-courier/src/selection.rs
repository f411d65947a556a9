//! Courier selection. Pure functions over a [`SelectionRules`] snapshot; no I/O.

use serde::{Deserialize, Serialize};

use consign_core::{CourierCode, ServiceLevel};

use crate::error::CourierError;
use crate::rules::{normalize_destination, SelectionRules};

/// Attributes of a shipment that drive courier choice.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShipmentProfile {
    /// ISO country code of the delivery address
    pub destination: String,
    pub weight_kg: f64,
    #[serde(default)]
    pub declared_value: f64,
    #[serde(default)]
    pub priority: ServiceLevel,
    #[serde(default)]
    pub user_preference: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CourierRecommendation {
    pub primary: CourierCode,
    pub secondary: Option<CourierCode>,
    pub reason: String,
    pub factors: Vec<String>,
    /// The customer's preference decided the primary courier
    pub overridden: bool,
    /// The primary pick was not offered at the destination and was replaced
    pub is_fallback: bool,
    pub rules_version: u64,
}

/// Recommend a courier for the shipment.
///
/// Precedence, highest first: user preference, weight, declared value, priority,
/// destination default. Constraints are applied lowest-precedence first so that a
/// higher one always has the last word.
pub fn recommend(rules: &SelectionRules, profile: &ShipmentProfile) -> CourierRecommendation {
    let destination = normalize_destination(&profile.destination);
    let base = rules.destination_rule(&destination);

    let mut primary = base.primary;
    let mut reason = base.reason.clone();
    let mut factors = Vec::new();

    if profile.priority.is_expedited() {
        let factor = format!(
            "{} delivery requested: {} preferred for express service",
            profile.priority.as_str(),
            rules.express_courier.display_name()
        );
        primary = rules.express_courier;
        reason = factor.clone();
        factors.push(factor);
    }

    if profile.declared_value > rules.high_value_threshold {
        let factor = format!(
            "High-value shipment ({:.2} > {:.2}): {} preferred for insurance coverage",
            profile.declared_value,
            rules.high_value_threshold,
            rules.high_value_courier.display_name()
        );
        primary = rules.high_value_courier;
        reason = factor.clone();
        factors.push(factor);
    }

    if profile.weight_kg > rules.heavy_weight_kg {
        let factor = format!(
            "Heavy package ({} kg > {} kg): {} preferred for heavy shipments",
            profile.weight_kg,
            rules.heavy_weight_kg,
            rules.heavy_courier.display_name()
        );
        primary = rules.heavy_courier;
        reason = factor.clone();
        factors.push(factor);
    }

    let mut secondary = if primary == base.primary {
        base.secondary
    } else {
        Some(base.primary)
    };

    let mut overridden = false;
    if let Some(preference) = profile.user_preference.as_deref().filter(|p| !p.trim().is_empty()) {
        match preference.parse::<CourierCode>() {
            Ok(code) if rules.available_for(&destination).contains(&code) => {
                if code != primary {
                    secondary = Some(primary);
                }
                primary = code;
                overridden = true;
                reason = format!("Customer preference: {}", code.display_name());
                factors.push(format!("Customer chose {}", code.display_name()));
            }
            Ok(code) => factors.push(format!(
                "Preferred courier {} does not deliver to {}; preference ignored",
                code.display_name(),
                destination
            )),
            Err(_) => factors.push(format!("Unknown preferred courier '{}' ignored", preference)),
        }
    }

    if secondary == Some(primary) {
        secondary = None;
    }

    CourierRecommendation {
        primary,
        secondary,
        reason,
        factors,
        overridden,
        is_fallback: false,
        rules_version: rules.version,
    }
}

/// [`recommend`], then resolve the pick against the couriers that actually serve
/// the destination, falling back to the secondary (or any available courier).
pub fn select_courier(
    rules: &SelectionRules,
    profile: &ShipmentProfile,
) -> Result<CourierRecommendation, CourierError> {
    let mut recommendation = recommend(rules, profile);
    let destination = normalize_destination(&profile.destination);
    let available = rules.available_for(&destination);

    if available.contains(&recommendation.primary) {
        return Ok(recommendation);
    }

    let fallback = recommendation
        .secondary
        .filter(|code| available.contains(code))
        .or_else(|| available.first().copied())
        .ok_or_else(|| CourierError::NoCourierAvailable(destination.clone()))?;

    recommendation.reason = format!(
        "{} does not deliver to {}; falling back to {}",
        recommendation.primary.display_name(),
        destination,
        fallback.display_name()
    );
    recommendation.factors.push(recommendation.reason.clone());
    recommendation.primary = fallback;
    recommendation.secondary = None;
    recommendation.is_fallback = true;
    Ok(recommendation)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn profile(destination: &str, weight_kg: f64, declared_value: f64, priority: ServiceLevel) -> ShipmentProfile {
        ShipmentProfile {
            destination: destination.to_string(),
            weight_kg,
            declared_value,
            priority,
            user_preference: None,
        }
    }

    #[test]
    fn test_domestic_default_has_no_factors() {
        let rules = SelectionRules::default();
        let rec = select_courier(&rules, &profile("IN", 1.0, 1000.0, ServiceLevel::Standard)).unwrap();

        assert_eq!(rec.primary, CourierCode::BlueDart);
        assert_eq!(rec.secondary, Some(CourierCode::Dhl));
        assert!(rec.factors.is_empty());
        assert!(!rec.overridden);
        assert!(!rec.is_fallback);
        assert_eq!(rec.rules_version, 1);
    }

    #[test]
    fn test_heavy_domestic_switches_to_heavy_carrier() {
        let rules = SelectionRules::default();
        let rec = select_courier(&rules, &profile("IN", 15.0, 1000.0, ServiceLevel::Standard)).unwrap();

        assert_eq!(rec.primary, CourierCode::Dhl);
        assert_eq!(rec.secondary, Some(CourierCode::BlueDart));
        assert!(rec.factors.iter().any(|f| f.contains("Heavy package")));
    }

    #[test]
    fn test_international_default() {
        let rules = SelectionRules::default();
        let rec = select_courier(&rules, &profile("US", 1.0, 1000.0, ServiceLevel::Standard)).unwrap();

        assert_eq!(rec.primary, CourierCode::Dhl);
        assert_eq!(rec.secondary, None);
        assert!(rec.factors.is_empty());
    }

    #[test]
    fn test_weight_beats_priority() {
        let rules = SelectionRules::default();
        for weight in [10.5, 15.0, 30.0, 80.0] {
            for priority in [ServiceLevel::Standard, ServiceLevel::Express, ServiceLevel::Overnight] {
                let rec = select_courier(&rules, &profile("IN", weight, 1000.0, priority)).unwrap();
                assert_eq!(rec.primary, CourierCode::Dhl, "weight {} priority {:?}", weight, priority);
            }
        }
    }

    #[test]
    fn test_high_value_beats_light_standard() {
        let rules = SelectionRules::default();
        for value in [50_000.01, 75_000.0, 1_000_000.0] {
            let rec = select_courier(&rules, &profile("IN", 0.5, value, ServiceLevel::Standard)).unwrap();
            assert_eq!(rec.primary, CourierCode::Dhl);
            assert!(rec.factors.iter().any(|f| f.contains("High-value")));
        }
    }

    #[test]
    fn test_threshold_is_exclusive() {
        let rules = SelectionRules::default();
        let rec = select_courier(&rules, &profile("IN", 10.0, 50_000.0, ServiceLevel::Standard)).unwrap();
        assert_eq!(rec.primary, CourierCode::BlueDart);
    }

    #[test]
    fn test_express_prefers_express_carrier() {
        let rules = SelectionRules::default();
        let rec = select_courier(&rules, &profile("IN", 1.0, 1000.0, ServiceLevel::Express)).unwrap();
        assert_eq!(rec.primary, CourierCode::BlueDart);
        assert_eq!(rec.factors.len(), 1);
    }

    #[test]
    fn test_user_preference_always_wins() {
        let rules = SelectionRules::default();
        for weight in [1.0, 15.0] {
            for value in [1000.0, 90_000.0] {
                for priority in [ServiceLevel::Standard, ServiceLevel::Overnight] {
                    for preference in [CourierCode::BlueDart, CourierCode::Dhl] {
                        let mut p = profile("IN", weight, value, priority);
                        p.user_preference = Some(preference.as_str().to_string());
                        let rec = select_courier(&rules, &p).unwrap();
                        assert!(rec.overridden);
                        assert_eq!(rec.primary, preference);
                    }
                }
            }
        }
    }

    #[test]
    fn test_preference_not_offered_at_destination_is_ignored() {
        let rules = SelectionRules::default();
        let mut p = profile("US", 1.0, 1000.0, ServiceLevel::Standard);
        p.user_preference = Some("bluedart".to_string());

        let rec = select_courier(&rules, &p).unwrap();
        assert!(!rec.overridden);
        assert_eq!(rec.primary, CourierCode::Dhl);
    }

    #[test]
    fn test_unavailable_primary_falls_back() {
        let rules = SelectionRules::default();
        // express prefers the domestic carrier, which does not deliver abroad
        let rec = select_courier(&rules, &profile("US", 1.0, 1000.0, ServiceLevel::Express)).unwrap();

        assert_eq!(rec.primary, CourierCode::Dhl);
        assert!(rec.is_fallback);
        assert_eq!(rec.secondary, None);
    }

    #[test]
    fn test_recommend_is_deterministic() {
        let rules = SelectionRules::default();
        let p = profile("IN", 12.0, 60_000.0, ServiceLevel::Express);
        assert_eq!(recommend(&rules, &p), recommend(&rules, &p));
    }
}
