use serde::Deserialize;
use std::env;

use consign_carriers::{BlueDartConfig, DhlConfig};
use consign_core::SenderProfile;
use consign_courier::RulesUpdate;
use consign_order::FulfillmentSettings;

#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    pub server: ServerConfig,
    /// Warehouse every pickup and waybill is sent from
    pub sender: SenderProfile,
    #[serde(default)]
    pub carriers: CarriersConfig,
    #[serde(default)]
    pub fulfillment: FulfillmentSettings,
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub kafka: Option<KafkaConfig>,
    /// Applied on top of the built-in selection rules at start-up
    #[serde(default)]
    pub selection: RulesUpdate,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub port: u16,
    #[serde(default = "default_home_country")]
    pub home_country: String,
}

fn default_home_country() -> String {
    "IN".to_string()
}

/// A carrier without a section is not registered with the courier manager.
#[derive(Debug, Deserialize, Clone, Default)]
pub struct CarriersConfig {
    pub bluedart: Option<BlueDartConfig>,
    pub dhl: Option<DhlConfig>,
}

#[derive(Debug, Deserialize, Clone, Copy, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    #[default]
    Memory,
    Postgres,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct StoreConfig {
    #[serde(default)]
    pub backend: StoreBackend,
    pub database_url: Option<String>,
    /// Per-order locks go to Redis when set, otherwise they are process-local
    pub redis_url: Option<String>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct KafkaConfig {
    pub brokers: String,
    #[serde(default = "default_topic")]
    pub topic: String,
}

fn default_topic() -> String {
    "fulfillment-events".to_string()
}

impl AppConfig {
    pub fn load() -> Result<Self, config::ConfigError> {
        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        let s = config::Config::builder()
            .add_source(config::File::with_name("config/default"))
            .add_source(config::File::with_name(&format!("config/{}", run_mode)).required(false))
            // Not checked in
            .add_source(config::File::with_name("config/local").required(false))
            // e.g. CONSIGN__CARRIERS__BLUEDART__LICENCE_KEY
            .add_source(config::Environment::with_prefix("CONSIGN").separator("__"))
            .build()?;

        s.try_deserialize()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use config::{Config, File, FileFormat};

    const SAMPLE: &str = r#"
        [server]
        port = 8080

        [sender]
        contact_name = "Dispatch Desk"
        company = "Warehouse One"
        line1 = "Plot 7, MIDC"
        city = "Mumbai"
        pincode = "400093"
        country = "IN"
        phone = "2240000000"
        area_code = "BOM"
        customer_code = "099960"

        [carriers.bluedart]
        base_url = "https://apigateway.example.test"
        client_id = "id"
        client_secret = "secret"
        login_id = "BOM00001"
        licence_key = "lk"

        [fulfillment]
        outbox_max_attempts = 3

        [store]
        backend = "postgres"
        database_url = "postgres://localhost/consign"

        [selection]
        heavy_weight_kg = 20.0
    "#;

    #[test]
    fn test_layered_config_deserializes() {
        let config: AppConfig = Config::builder()
            .add_source(File::from_str(SAMPLE, FileFormat::Toml))
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap();

        assert_eq!(config.server.port, 8080);
        assert_eq!(config.server.home_country, "IN");
        assert_eq!(config.sender.area_code, "BOM");
        assert!(config.carriers.dhl.is_none());
        let bluedart = config.carriers.bluedart.unwrap();
        assert_eq!(bluedart.licence_key.expose(), "lk");
        assert_eq!(bluedart.timeout_secs, 10);
        assert_eq!(config.fulfillment.outbox_max_attempts, 3);
        assert_eq!(config.fulfillment.pickup_time, "1400");
        assert_eq!(config.store.backend, StoreBackend::Postgres);
        assert_eq!(config.selection.heavy_weight_kg, Some(20.0));
        assert!(config.kafka.is_none());
    }
}
