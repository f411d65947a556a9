use chrono::Utc;

use consign_core::{TrackingEvent, TrackingSnapshot, TrackingSource};

use crate::models::{Order, OrderStatus};

fn describe(status: OrderStatus) -> &'static str {
    match status {
        OrderStatus::Pending => "Order received and awaiting processing",
        OrderStatus::Processing => "Order is being packed for dispatch",
        OrderStatus::Shipped => "Shipment handed over to the courier",
        OrderStatus::Delivered => "Shipment delivered",
        OrderStatus::Cancelled => "Order cancelled",
    }
}

/// Timeline inferred from the order's own status, used when the courier cannot be asked.
pub fn degraded_snapshot(order: &Order) -> TrackingSnapshot {
    let tracking_number = order
        .waybill
        .as_ref()
        .map(|w| w.awb_number.clone())
        .or_else(|| order.pickup.as_ref().map(|p| p.token_number.clone()))
        .unwrap_or_else(|| order.order_number.clone());

    TrackingSnapshot {
        tracking_number,
        courier: order.courier,
        status: order.status.as_str().to_string(),
        events: vec![TrackingEvent {
            timestamp: Some(order.updated_at),
            status_code: order.status.as_str().to_ascii_uppercase(),
            description: describe(order.status).to_string(),
            location: None,
        }],
        last_refreshed: Utc::now(),
        estimated_delivery: order.tracking.as_ref().and_then(|t| t.estimated_delivery),
        source: TrackingSource::Degraded,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Customer;
    use consign_core::ContactAddress;

    #[test]
    fn test_degraded_snapshot_reflects_order_status() {
        let mut order = Order::new("ORD-9", Customer::default(), vec![], ContactAddress::default());
        order.status = OrderStatus::Shipped;

        let snapshot = degraded_snapshot(&order);

        assert!(snapshot.is_degraded());
        assert_eq!(snapshot.tracking_number, "ORD-9");
        assert_eq!(snapshot.status, "Shipped");
        assert_eq!(snapshot.events.len(), 1);
        assert_eq!(snapshot.events[0].status_code, "SHIPPED");
    }
}
