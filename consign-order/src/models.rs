use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use consign_core::{ContactAddress, CourierCode, ServiceLevel, TrackingSnapshot};

use crate::lifecycle::OrderError;
use crate::outbox::PendingEffect;

/// Longest error message kept on an order, in characters
pub const ERROR_MESSAGE_CAP: usize = 500;

/// Order lifecycle status
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum OrderStatus {
    Pending,
    Processing,
    Shipped,
    Delivered,
    Cancelled,
}

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "Pending",
            OrderStatus::Processing => "Processing",
            OrderStatus::Shipped => "Shipped",
            OrderStatus::Delivered => "Delivered",
            OrderStatus::Cancelled => "Cancelled",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, OrderStatus::Delivered | OrderStatus::Cancelled)
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OrderStatus {
    type Err = OrderError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pending" => Ok(OrderStatus::Pending),
            "processing" => Ok(OrderStatus::Processing),
            "shipped" => Ok(OrderStatus::Shipped),
            "delivered" => Ok(OrderStatus::Delivered),
            "cancelled" | "canceled" => Ok(OrderStatus::Cancelled),
            other => Err(OrderError::UnknownStatus(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Customer {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub email: Option<String>,
    pub phone: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OrderItem {
    pub sku: String,
    pub name: String,
    pub quantity: u32,
    pub unit_price: f64,
    /// Per-unit weight, when the catalog knows it
    #[serde(default)]
    pub weight_kg: Option<f64>,
}

/// Pickup registered with a courier. Created once per order, never deleted.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PickupRecord {
    pub courier: CourierCode,
    pub token_number: String,
    pub status: String,
    pub pickup_date: NaiveDate,
    pub pickup_time: String,
    pub pieces: u32,
    pub weight_kg: f64,
    pub area_code: String,
    #[serde(default)]
    pub remarks: Option<String>,
    pub registered_at: DateTime<Utc>,
    #[serde(default)]
    pub cancellation: Option<PickupCancellationRecord>,
}

impl PickupRecord {
    pub fn is_cancelled(&self) -> bool {
        self.cancellation.as_ref().map(|c| c.cancelled).unwrap_or(false)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PickupCancellationRecord {
    pub cancelled: bool,
    pub cancelled_at: DateTime<Utc>,
    pub reason: String,
    #[serde(default)]
    pub carrier_status: Option<String>,
}

/// Air waybill issued for the order. Immutable once the courier confirms it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WaybillRecord {
    pub courier: CourierCode,
    pub awb_number: String,
    pub status: String,
    pub generated_at: DateTime<Utc>,
    #[serde(default)]
    pub destination_area: Option<String>,
    #[serde(default)]
    pub destination_location: Option<String>,
    /// Courier payload kept verbatim for audits and disputes
    #[serde(default)]
    pub raw: serde_json::Value,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum FulfillmentOperation {
    PickupRegistration,
    PickupCancellation,
    WaybillGeneration,
}

impl FulfillmentOperation {
    pub fn as_str(&self) -> &'static str {
        match self {
            FulfillmentOperation::PickupRegistration => "pickup_registration",
            FulfillmentOperation::PickupCancellation => "pickup_cancellation",
            FulfillmentOperation::WaybillGeneration => "waybill_generation",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ErrorLogEntry {
    pub operation: FulfillmentOperation,
    pub message: String,
    #[serde(default)]
    pub details: Option<serde_json::Value>,
    #[serde(default)]
    pub provider_status_code: Option<u16>,
    pub timestamp: DateTime<Utc>,
}

impl ErrorLogEntry {
    pub fn new(operation: FulfillmentOperation, message: &str) -> Self {
        Self {
            operation,
            message: truncate_message(message, ERROR_MESSAGE_CAP),
            details: None,
            provider_status_code: None,
            timestamp: Utc::now(),
        }
    }

    pub fn with_provider(mut self, details: serde_json::Value, status: Option<u16>) -> Self {
        self.details = Some(details);
        self.provider_status_code = status;
        self
    }
}

/// Cut `message` to at most `cap` characters, marking the cut with an ellipsis.
pub fn truncate_message(message: &str, cap: usize) -> String {
    if message.chars().count() <= cap {
        return message.to_string();
    }
    let mut cut: String = message.chars().take(cap.saturating_sub(1)).collect();
    cut.push('…');
    cut
}

/// The order document the fulfillment core reads and patches.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Order {
    pub id: Uuid,
    pub order_number: String,
    pub customer: Customer,
    pub items: Vec<OrderItem>,
    pub shipping_address: ContactAddress,
    #[serde(default)]
    pub billing_address: Option<ContactAddress>,
    pub total_amount: f64,
    #[serde(default)]
    pub cash_on_delivery: bool,
    #[serde(default)]
    pub service: ServiceLevel,
    #[serde(default)]
    pub preferred_courier: Option<String>,
    pub status: OrderStatus,
    #[serde(default)]
    pub courier: Option<CourierCode>,
    #[serde(default)]
    pub pickup: Option<PickupRecord>,
    #[serde(default)]
    pub waybill: Option<WaybillRecord>,
    #[serde(default)]
    pub tracking: Option<TrackingSnapshot>,
    #[serde(default)]
    pub fulfillment_errors: Vec<ErrorLogEntry>,
    #[serde(default)]
    pub pending_effects: Vec<PendingEffect>,
    /// Bumped by every store write
    #[serde(default)]
    pub version: u64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Order {
    pub fn new(
        order_number: impl Into<String>,
        customer: Customer,
        items: Vec<OrderItem>,
        shipping_address: ContactAddress,
    ) -> Self {
        let now = Utc::now();
        let total_amount = items.iter().map(|i| i.unit_price * i.quantity as f64).sum();
        Self {
            id: Uuid::new_v4(),
            order_number: order_number.into(),
            customer,
            items,
            shipping_address,
            billing_address: None,
            total_amount,
            cash_on_delivery: false,
            service: ServiceLevel::Standard,
            preferred_courier: None,
            status: OrderStatus::Pending,
            courier: None,
            pickup: None,
            waybill: None,
            tracking: None,
            fulfillment_errors: Vec::new(),
            pending_effects: Vec::new(),
            version: 0,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn piece_count(&self) -> u32 {
        self.items.iter().map(|i| i.quantity).sum()
    }

    /// Sum of item weights, using `default_item_kg` for items without one.
    pub fn estimated_weight_kg(&self, default_item_kg: f64) -> f64 {
        self.items
            .iter()
            .map(|i| i.quantity as f64 * i.weight_kg.filter(|w| *w > 0.0).unwrap_or(default_item_kg))
            .sum()
    }

    pub fn has_pickup(&self) -> bool {
        self.pickup.as_ref().map(|p| !p.token_number.is_empty()).unwrap_or(false)
    }

    pub fn has_active_pickup(&self) -> bool {
        self.pickup
            .as_ref()
            .map(|p| !p.token_number.is_empty() && !p.is_cancelled())
            .unwrap_or(false)
    }

    pub fn package_description(&self) -> String {
        let names: Vec<&str> = self.items.iter().map(|i| i.name.as_str()).collect();
        truncate_message(&names.join(", "), 100)
    }
}
