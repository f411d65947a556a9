use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::courier::CourierCode;

/// Where a tracking snapshot came from
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TrackingSource {
    /// Reported by the carrier
    Live,
    /// Inferred from the order's own lifecycle status because the carrier call failed
    Degraded,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TrackingEvent {
    pub timestamp: Option<DateTime<Utc>>,
    pub status_code: String,
    pub description: String,
    pub location: Option<String>,
}

/// Latest known state of a shipment. Only the newest snapshot is kept.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TrackingSnapshot {
    pub tracking_number: String,
    pub courier: Option<CourierCode>,
    pub status: String,
    pub events: Vec<TrackingEvent>,
    pub last_refreshed: DateTime<Utc>,
    pub estimated_delivery: Option<NaiveDate>,
    pub source: TrackingSource,
}

impl TrackingSnapshot {
    pub fn live(tracking_number: impl Into<String>, courier: CourierCode, status: impl Into<String>) -> Self {
        Self {
            tracking_number: tracking_number.into(),
            courier: Some(courier),
            status: status.into(),
            events: Vec::new(),
            last_refreshed: Utc::now(),
            estimated_delivery: None,
            source: TrackingSource::Live,
        }
    }

    pub fn is_degraded(&self) -> bool {
        self.source == TrackingSource::Degraded
    }

    /// Events newest first, undated events last
    pub fn sort_events(&mut self) {
        self.events.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
    }

    pub fn latest_event(&self) -> Option<&TrackingEvent> {
        self.events.first()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_sort_events_newest_first() {
        let mut snapshot = TrackingSnapshot::live("AWB1", CourierCode::Dhl, "IN TRANSIT");
        snapshot.events = vec![
            TrackingEvent {
                timestamp: Some(Utc.with_ymd_and_hms(2024, 10, 1, 9, 0, 0).unwrap()),
                status_code: "PU".to_string(),
                description: "Picked up".to_string(),
                location: None,
            },
            TrackingEvent {
                timestamp: None,
                status_code: "XX".to_string(),
                description: "Undated".to_string(),
                location: None,
            },
            TrackingEvent {
                timestamp: Some(Utc.with_ymd_and_hms(2024, 10, 2, 9, 0, 0).unwrap()),
                status_code: "IT".to_string(),
                description: "In transit".to_string(),
                location: Some("DELHI".to_string()),
            },
        ];

        snapshot.sort_events();

        assert_eq!(snapshot.latest_event().unwrap().status_code, "IT");
        assert_eq!(snapshot.events[2].status_code, "XX");
        assert!(!snapshot.is_degraded());
    }
}
