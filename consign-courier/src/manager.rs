use std::collections::BTreeMap;
use std::sync::{Arc, RwLock};

use futures_util::future::join_all;
use serde::Serialize;
use tracing::{info, warn};

use consign_core::{
    CancelPickupRequest, CarrierResult, CourierCode, PickupCancellation, PickupConfirmation,
    PickupRequest, RateQuery, RateQuote, Serviceability, ShipmentConfirmation, ShipmentRequest,
    ShippingProvider, TrackingSnapshot, Waybill, WaybillRequest,
};

use crate::error::CourierError;
use crate::ranking::{rank, RankedCourier};
use crate::rules::{normalize_destination, RulesUpdate, SelectionRules};
use crate::selection::{self, CourierRecommendation, ShipmentProfile};

/// An adapter result annotated with the courier that served it.
#[derive(Debug, Clone, Serialize)]
pub struct Routed<T> {
    pub courier: CourierCode,
    /// Courier was picked by the manager rather than named by the caller
    pub auto_selected: bool,
    #[serde(flatten)]
    pub result: T,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ServicesHealth {
    pub services: BTreeMap<CourierCode, bool>,
    /// At least one courier is reachable
    pub healthy: bool,
}

/// Single entry point to the configured carrier adapters.
pub struct CourierManager {
    providers: BTreeMap<CourierCode, Arc<dyn ShippingProvider>>,
    rules: RwLock<Arc<SelectionRules>>,
    home_country: String,
}

impl CourierManager {
    pub fn new(home_country: impl Into<String>, rules: SelectionRules) -> Self {
        Self {
            providers: BTreeMap::new(),
            rules: RwLock::new(Arc::new(rules)),
            home_country: normalize_destination(&home_country.into()),
        }
    }

    pub fn with_provider(mut self, provider: Arc<dyn ShippingProvider>) -> Self {
        self.providers.insert(provider.code(), provider);
        self
    }

    pub fn home_country(&self) -> &str {
        &self.home_country
    }

    pub fn couriers(&self) -> Vec<CourierCode> {
        self.providers.keys().copied().collect()
    }

    pub fn provider(&self, code: CourierCode) -> Result<&Arc<dyn ShippingProvider>, CourierError> {
        self.providers.get(&code).ok_or(CourierError::NotConfigured(code))
    }

    pub fn is_domestic(&self, destination: &str) -> bool {
        normalize_destination(destination) == self.home_country
    }

    /// Current rules snapshot. Callers keep the `Arc` for the whole computation.
    pub fn rules(&self) -> Arc<SelectionRules> {
        let guard = self.rules.read().unwrap_or_else(|poisoned| poisoned.into_inner());
        Arc::clone(&guard)
    }

    /// Swap in `current.apply(update)`. Concurrent readers keep the version they started with.
    pub fn update_rules(&self, update: RulesUpdate) -> Result<Arc<SelectionRules>, CourierError> {
        let mut guard = self.rules.write().unwrap_or_else(|poisoned| poisoned.into_inner());
        let next = Arc::new(guard.apply(update)?);
        *guard = Arc::clone(&next);
        info!("Selection rules updated to version {}", next.version);
        Ok(next)
    }

    pub fn recommend(&self, profile: &ShipmentProfile) -> CourierRecommendation {
        selection::recommend(&self.rules(), profile)
    }

    pub fn select_courier(&self, profile: &ShipmentProfile) -> Result<CourierRecommendation, CourierError> {
        selection::select_courier(&self.rules(), profile)
    }

    /// Ranked, display-ready list of the configured couriers serving the destination.
    pub fn get_recommendations(&self, profile: &ShipmentProfile) -> Vec<RankedCourier> {
        let mut ranked = rank(&self.rules(), profile, &self.home_country);
        ranked.retain(|r| self.providers.contains_key(&r.courier));
        ranked
    }

    /// Domestic destinations go to the domestic carrier, everything else abroad.
    fn route_by_destination(&self, explicit: Option<CourierCode>, destination: &str) -> (CourierCode, bool) {
        match explicit {
            Some(code) => (code, false),
            None if self.is_domestic(destination) => (CourierCode::BlueDart, true),
            None => (CourierCode::Dhl, true),
        }
    }

    fn route_by_selection(
        &self,
        explicit: Option<CourierCode>,
        profile: &ShipmentProfile,
    ) -> Result<(CourierCode, bool), CourierError> {
        match explicit {
            Some(code) => Ok((code, false)),
            None => Ok((self.select_courier(profile)?.primary, true)),
        }
    }

    pub async fn track_shipment(
        &self,
        number: &str,
        explicit: Option<CourierCode>,
        destination: &str,
    ) -> Result<Routed<TrackingSnapshot>, CourierError> {
        let (courier, auto_selected) = self.route_by_destination(explicit, destination);
        let provider = self.provider(courier)?;
        let snapshot = provider.track_shipment(number).await?;
        Ok(Routed {
            courier,
            auto_selected,
            result: snapshot,
        })
    }

    pub async fn create_shipment(
        &self,
        request: &ShipmentRequest,
        explicit: Option<CourierCode>,
    ) -> Result<Routed<CarrierResult<ShipmentConfirmation>>, CourierError> {
        let profile = ShipmentProfile {
            destination: request.receiver.country.clone(),
            weight_kg: request.package.weight_kg,
            declared_value: request.package.declared_value,
            priority: request.service,
            user_preference: None,
        };
        let (courier, auto_selected) = self.route_by_selection(explicit, &profile)?;
        let provider = self.provider(courier)?;
        let token = provider.authenticate().await?;
        let result = provider.create_shipment(&token, request).await?;
        log_outcome(courier, "create_shipment", &result);
        Ok(Routed {
            courier,
            auto_selected,
            result,
        })
    }

    pub async fn calculate_rates(
        &self,
        query: &RateQuery,
        explicit: Option<CourierCode>,
    ) -> Result<Routed<CarrierResult<Vec<RateQuote>>>, CourierError> {
        let profile = ShipmentProfile {
            destination: query.destination_country.clone(),
            weight_kg: query.weight_kg,
            declared_value: query.declared_value,
            priority: Default::default(),
            user_preference: None,
        };
        let (courier, auto_selected) = self.route_by_selection(explicit, &profile)?;
        let provider = self.provider(courier)?;
        let token = provider.authenticate().await?;
        let result = provider.calculate_rates(&token, query).await?;
        Ok(Routed {
            courier,
            auto_selected,
            result,
        })
    }

    pub async fn check_serviceability(
        &self,
        pincode: &str,
        country: &str,
        explicit: Option<CourierCode>,
    ) -> Result<Routed<CarrierResult<Serviceability>>, CourierError> {
        let (courier, auto_selected) = self.route_by_destination(explicit, country);
        let provider = self.provider(courier)?;
        let token = provider.authenticate().await?;
        let result = provider.check_serviceability(&token, pincode, country).await?;
        Ok(Routed {
            courier,
            auto_selected,
            result,
        })
    }

    pub async fn register_pickup(
        &self,
        courier: CourierCode,
        request: &PickupRequest,
    ) -> Result<CarrierResult<PickupConfirmation>, CourierError> {
        let provider = self.provider(courier)?;
        let token = provider.authenticate().await?;
        let result = provider.register_pickup(&token, request).await?;
        log_outcome(courier, "register_pickup", &result);
        Ok(result)
    }

    pub async fn cancel_pickup(
        &self,
        courier: CourierCode,
        request: &CancelPickupRequest,
    ) -> Result<CarrierResult<PickupCancellation>, CourierError> {
        let provider = self.provider(courier)?;
        let token = provider.authenticate().await?;
        let result = provider.cancel_pickup(&token, request).await?;
        log_outcome(courier, "cancel_pickup", &result);
        Ok(result)
    }

    pub async fn generate_waybill(
        &self,
        courier: CourierCode,
        request: &WaybillRequest,
    ) -> Result<CarrierResult<Waybill>, CourierError> {
        let provider = self.provider(courier)?;
        let token = provider.authenticate().await?;
        let result = provider.generate_waybill(&token, request).await?;
        log_outcome(courier, "generate_waybill", &result);
        Ok(result)
    }

    pub async fn generate_waybills(
        &self,
        courier: CourierCode,
        requests: &[WaybillRequest],
    ) -> Result<Vec<CarrierResult<Waybill>>, CourierError> {
        let provider = self.provider(courier)?;
        let token = provider.authenticate().await?;
        Ok(provider.generate_waybills(&token, requests).await?)
    }

    /// Probe every configured courier concurrently. One failure never fails the aggregate.
    pub async fn check_services_health(&self) -> ServicesHealth {
        let probes = self.providers.iter().map(|(code, provider)| async move {
            let healthy = provider.check_health().await;
            if !healthy {
                warn!("Courier {} is unreachable", code);
            }
            (*code, healthy)
        });
        let services: BTreeMap<CourierCode, bool> = join_all(probes).await.into_iter().collect();
        let healthy = services.values().any(|h| *h);
        ServicesHealth { services, healthy }
    }
}

fn log_outcome<T>(courier: CourierCode, operation: &str, result: &CarrierResult<T>) {
    match result {
        CarrierResult::Success(_) => info!("{} {} succeeded", courier, operation),
        CarrierResult::Rejected(rejection) => warn!(
            "{} {} rejected: {} (status {:?})",
            courier, operation, rejection.message, rejection.provider_status_code
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use consign_core::{
        AuthToken, CarrierCall, CarrierError, ContactAddress, PackageDetails, SenderProfile,
        ServiceLevel,
    };
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct StubProvider {
        code: CourierCode,
        healthy: bool,
        logins: AtomicUsize,
        shipments: AtomicUsize,
    }

    impl StubProvider {
        fn new(code: CourierCode, healthy: bool) -> Arc<Self> {
            Arc::new(Self {
                code,
                healthy,
                logins: AtomicUsize::new(0),
                shipments: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl ShippingProvider for StubProvider {
        fn code(&self) -> CourierCode {
            self.code
        }

        async fn authenticate(&self) -> Result<AuthToken, CarrierError> {
            self.logins.fetch_add(1, Ordering::SeqCst);
            Ok(AuthToken::new("token"))
        }

        async fn create_shipment(&self, _: &AuthToken, request: &ShipmentRequest) -> CarrierCall<ShipmentConfirmation> {
            self.shipments.fetch_add(1, Ordering::SeqCst);
            Ok(CarrierResult::Success(ShipmentConfirmation {
                tracking_number: format!("{}-{}", self.code, request.reference),
                status: "Created".to_string(),
                label_url: None,
                raw: serde_json::Value::Null,
            }))
        }

        async fn register_pickup(&self, _: &AuthToken, _: &PickupRequest) -> CarrierCall<PickupConfirmation> {
            Err(CarrierError::Transport("not used".to_string()))
        }

        async fn cancel_pickup(&self, _: &AuthToken, _: &CancelPickupRequest) -> CarrierCall<PickupCancellation> {
            Err(CarrierError::Transport("not used".to_string()))
        }

        async fn generate_waybill(&self, _: &AuthToken, _: &WaybillRequest) -> CarrierCall<Waybill> {
            Err(CarrierError::Transport("not used".to_string()))
        }

        async fn track_shipment(&self, identifier: &str) -> Result<TrackingSnapshot, CarrierError> {
            Ok(TrackingSnapshot::live(identifier, self.code, "IN TRANSIT"))
        }

        async fn check_health(&self) -> bool {
            self.healthy
        }
    }

    fn manager(bluedart: Arc<StubProvider>, dhl: Arc<StubProvider>) -> CourierManager {
        CourierManager::new("IN", SelectionRules::default())
            .with_provider(bluedart)
            .with_provider(dhl)
    }

    fn shipment(country: &str, weight_kg: f64) -> ShipmentRequest {
        ShipmentRequest {
            sender: SenderProfile {
                pincode: "400093".to_string(),
                country: "IN".to_string(),
                ..Default::default()
            },
            receiver: ContactAddress {
                name: "Asha Rao".to_string(),
                pincode: "560025".to_string(),
                country: country.to_string(),
                ..Default::default()
            },
            package: PackageDetails {
                weight_kg,
                pieces: 1,
                declared_value: 1000.0,
                description: "Books".to_string(),
            },
            service: ServiceLevel::Standard,
            reference: "ORD-1".to_string(),
        }
    }

    #[tokio::test]
    async fn test_tracking_routes_by_destination() {
        let mgr = manager(
            StubProvider::new(CourierCode::BlueDart, true),
            StubProvider::new(CourierCode::Dhl, true),
        );

        let domestic = mgr.track_shipment("AWB1", None, "in").await.unwrap();
        assert_eq!(domestic.courier, CourierCode::BlueDart);
        assert!(domestic.auto_selected);

        let abroad = mgr.track_shipment("AWB2", None, "US").await.unwrap();
        assert_eq!(abroad.courier, CourierCode::Dhl);

        let explicit = mgr.track_shipment("AWB3", Some(CourierCode::Dhl), "IN").await.unwrap();
        assert_eq!(explicit.courier, CourierCode::Dhl);
        assert!(!explicit.auto_selected);
    }

    #[tokio::test]
    async fn test_create_shipment_uses_selection_engine() {
        let bluedart = StubProvider::new(CourierCode::BlueDart, true);
        let dhl = StubProvider::new(CourierCode::Dhl, true);
        let mgr = manager(Arc::clone(&bluedart), Arc::clone(&dhl));

        let routed = mgr.create_shipment(&shipment("IN", 15.0), None).await.unwrap();
        assert_eq!(routed.courier, CourierCode::Dhl);
        assert!(routed.auto_selected);
        assert_eq!(dhl.shipments.load(Ordering::SeqCst), 1);
        assert_eq!(dhl.logins.load(Ordering::SeqCst), 1);
        assert_eq!(bluedart.shipments.load(Ordering::SeqCst), 0);

        let json = serde_json::to_value(&routed).unwrap();
        assert_eq!(json["courier"], "dhl");
        assert_eq!(json["success"], true);
        assert_eq!(json["data"]["tracking_number"], "dhl-ORD-1");
    }

    #[tokio::test]
    async fn test_each_operation_authenticates() {
        let bluedart = StubProvider::new(CourierCode::BlueDart, true);
        let mgr = manager(Arc::clone(&bluedart), StubProvider::new(CourierCode::Dhl, true));

        mgr.create_shipment(&shipment("IN", 1.0), None).await.unwrap();
        mgr.create_shipment(&shipment("IN", 1.0), None).await.unwrap();
        assert_eq!(bluedart.logins.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_unconfigured_courier() {
        let mgr = CourierManager::new("IN", SelectionRules::default())
            .with_provider(StubProvider::new(CourierCode::Dhl, true));

        let err = mgr.track_shipment("AWB1", None, "IN").await.unwrap_err();
        assert!(matches!(err, CourierError::NotConfigured(CourierCode::BlueDart)));
    }

    #[tokio::test]
    async fn test_unsupported_operation_surfaces_as_error() {
        let mgr = manager(
            StubProvider::new(CourierCode::BlueDart, true),
            StubProvider::new(CourierCode::Dhl, true),
        );
        let err = mgr.check_serviceability("560025", "IN", None).await.unwrap_err();
        assert!(matches!(err, CourierError::Carrier(CarrierError::Unsupported { .. })));
    }

    #[tokio::test]
    async fn test_health_is_overall_or() {
        let mgr = manager(
            StubProvider::new(CourierCode::BlueDart, false),
            StubProvider::new(CourierCode::Dhl, true),
        );
        let health = mgr.check_services_health().await;
        assert_eq!(health.services[&CourierCode::BlueDart], false);
        assert_eq!(health.services[&CourierCode::Dhl], true);
        assert!(health.healthy);

        let down = manager(
            StubProvider::new(CourierCode::BlueDart, false),
            StubProvider::new(CourierCode::Dhl, false),
        );
        assert!(!down.check_services_health().await.healthy);
    }

    #[tokio::test]
    async fn test_rules_update_swaps_snapshot() {
        let mgr = manager(
            StubProvider::new(CourierCode::BlueDart, true),
            StubProvider::new(CourierCode::Dhl, true),
        );
        let before = mgr.rules();
        let profile = ShipmentProfile {
            destination: "IN".to_string(),
            weight_kg: 12.0,
            declared_value: 0.0,
            priority: ServiceLevel::Standard,
            user_preference: None,
        };
        assert_eq!(mgr.recommend(&profile).primary, CourierCode::Dhl);

        mgr.update_rules(RulesUpdate {
            heavy_weight_kg: Some(20.0),
            ..Default::default()
        })
        .unwrap();

        let rec = mgr.recommend(&profile);
        assert_eq!(rec.primary, CourierCode::BlueDart);
        assert_eq!(rec.rules_version, 2);
        assert_eq!(before.version, 1);
    }

    #[test]
    fn test_recommendations_only_list_configured_couriers() {
        let mgr = CourierManager::new("IN", SelectionRules::default())
            .with_provider(StubProvider::new(CourierCode::Dhl, true));
        let profile = ShipmentProfile {
            destination: "IN".to_string(),
            weight_kg: 1.0,
            declared_value: 0.0,
            priority: ServiceLevel::Standard,
            user_preference: None,
        };
        let ranked = mgr.get_recommendations(&profile);
        assert_eq!(ranked.len(), 1);
        assert_eq!(ranked[0].courier, CourierCode::Dhl);
    }
}
