pub mod models;
pub mod pii;

pub use models::events::{FulfillmentEvent, FulfillmentEventKind};
pub use pii::Masked;
