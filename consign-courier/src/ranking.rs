use serde::Serialize;

use consign_core::CourierCode;

use crate::rules::{normalize_destination, SelectionRules};
use crate::selection::{recommend, select_courier, ShipmentProfile};

/// One row of the courier picker.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct RankedCourier {
    pub courier: CourierCode,
    pub name: String,
    pub score: u32,
    pub recommended: bool,
    pub reasons: Vec<String>,
}

fn base_score(code: CourierCode) -> u32 {
    match code {
        CourierCode::BlueDart => 80,
        CourierCode::Dhl => 75,
    }
}

fn strengths(code: CourierCode) -> &'static [&'static str] {
    match code {
        CourierCode::BlueDart => &[
            "Widest domestic pincode coverage",
            "Next-day delivery between metro cities",
            "Scheduled doorstep pickup",
        ],
        CourierCode::Dhl => &[
            "Delivers to over 220 countries",
            "Customs clearance handled end to end",
            "Declared-value insurance for high-value parcels",
        ],
    }
}

/// Domestic carriers suit domestic lanes, international carriers the rest.
fn suitability(code: CourierCode, domestic: bool) -> u32 {
    match (code, domestic) {
        (CourierCode::BlueDart, true) | (CourierCode::Dhl, false) => 10,
        _ => 0,
    }
}

/// Every courier available for the destination, best first.
pub fn rank(rules: &SelectionRules, profile: &ShipmentProfile, home_country: &str) -> Vec<RankedCourier> {
    let destination = normalize_destination(&profile.destination);
    let domestic = destination == normalize_destination(home_country);
    let pick = select_courier(rules, profile).unwrap_or_else(|_| recommend(rules, profile));

    let mut ranked: Vec<RankedCourier> = rules
        .available_for(&destination)
        .iter()
        .map(|&code| {
            let mut score = base_score(code) + suitability(code, domestic);
            let mut reasons: Vec<String> = strengths(code).iter().map(|s| s.to_string()).collect();
            if code == pick.primary {
                score += 25;
                reasons.push(pick.reason.clone());
                reasons.extend(pick.factors.iter().cloned());
            } else if Some(code) == pick.secondary {
                score += 5;
                reasons.push("Recommended alternative".to_string());
            }
            RankedCourier {
                courier: code,
                name: code.display_name().to_string(),
                score,
                recommended: code == pick.primary,
                reasons,
            }
        })
        .collect();

    ranked.sort_by(|a, b| b.score.cmp(&a.score).then(a.courier.cmp(&b.courier)));
    ranked
}

#[cfg(test)]
mod tests {
    use super::*;
    use consign_core::ServiceLevel;

    fn profile(destination: &str, weight_kg: f64) -> ShipmentProfile {
        ShipmentProfile {
            destination: destination.to_string(),
            weight_kg,
            declared_value: 1000.0,
            priority: ServiceLevel::Standard,
            user_preference: None,
        }
    }

    #[test]
    fn test_domestic_ranking() {
        let ranked = rank(&SelectionRules::default(), &profile("IN", 1.0), "IN");

        assert_eq!(ranked.len(), 2);
        assert_eq!(ranked[0].courier, CourierCode::BlueDart);
        assert!(ranked[0].recommended);
        assert!(!ranked[1].recommended);
        assert!(ranked[1].reasons.iter().any(|r| r == "Recommended alternative"));
    }

    #[test]
    fn test_heavy_domestic_ranks_heavy_carrier_first() {
        let ranked = rank(&SelectionRules::default(), &profile("IN", 25.0), "IN");

        assert_eq!(ranked[0].courier, CourierCode::Dhl);
        assert!(ranked[0].reasons.iter().any(|r| r.contains("Heavy package")));
    }

    #[test]
    fn test_international_lists_only_available() {
        let ranked = rank(&SelectionRules::default(), &profile("GB", 1.0), "IN");

        assert_eq!(ranked.len(), 1);
        assert_eq!(ranked[0].courier, CourierCode::Dhl);
        assert_eq!(ranked[0].score, 75 + 10 + 25);
    }
}
