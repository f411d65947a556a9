pub mod error;
pub mod manager;
pub mod ranking;
pub mod rules;
pub mod selection;

pub use error::CourierError;
pub use manager::{CourierManager, Routed, ServicesHealth};
pub use ranking::RankedCourier;
pub use rules::{DestinationRule, RulesUpdate, SelectionRules};
pub use selection::{recommend, select_courier, CourierRecommendation, ShipmentProfile};
