use uuid::Uuid;

use crate::models::{Order, OrderStatus};
use crate::outbox::SideEffect;

#[derive(Debug, thiserror::Error)]
pub enum OrderError {
    #[error("Order not found: {0}")]
    NotFound(Uuid),

    #[error("Invalid state transition from {from} to {to}")]
    InvalidTransition { from: OrderStatus, to: OrderStatus },

    #[error("Unknown order status: {0}")]
    UnknownStatus(String),
}

fn rank(status: OrderStatus) -> u8 {
    match status {
        OrderStatus::Pending => 0,
        OrderStatus::Processing => 1,
        OrderStatus::Shipped => 2,
        OrderStatus::Delivered => 3,
        OrderStatus::Cancelled => 4,
    }
}

/// Forward moves (skipping allowed) and cancellation from any non-terminal state.
/// Re-sending the current status is accepted and changes nothing.
pub fn validate_transition(from: OrderStatus, to: OrderStatus) -> Result<(), OrderError> {
    if from == to {
        return Ok(());
    }
    let allowed = !from.is_terminal() && (to == OrderStatus::Cancelled || rank(to) > rank(from));
    if allowed {
        Ok(())
    } else {
        Err(OrderError::InvalidTransition { from, to })
    }
}

/// Side-effects owed by the move from `previous` to `next`.
pub fn effects_for(previous: OrderStatus, next: OrderStatus, order: &Order) -> Vec<SideEffect> {
    let mut effects = Vec::new();

    let entering_processing = next == OrderStatus::Processing
        && !matches!(
            previous,
            OrderStatus::Processing | OrderStatus::Shipped | OrderStatus::Delivered
        );
    if entering_processing && !order.has_pickup() {
        effects.push(SideEffect::RegisterPickup);
    }

    if next == OrderStatus::Cancelled && previous != OrderStatus::Cancelled && order.has_active_pickup() {
        effects.push(SideEffect::CancelPickup {
            reason: format!("Order {} cancelled", order.order_number),
        });
    }

    effects
}

/// Queued effects made pointless by the move to `next`: a pickup still waiting
/// to be registered is dropped once the order is delivered or cancelled.
pub fn superseded_effects(next: OrderStatus, order: &Order) -> Vec<Uuid> {
    if !next.is_terminal() {
        return Vec::new();
    }
    order
        .pending_effects
        .iter()
        .filter(|e| matches!(e.effect, SideEffect::RegisterPickup))
        .map(|e| e.id)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Customer, PickupRecord};
    use chrono::{NaiveDate, Utc};
    use consign_core::{ContactAddress, CourierCode};

    fn order() -> Order {
        Order::new("ORD-1", Customer::default(), vec![], ContactAddress::default())
    }

    fn pickup() -> PickupRecord {
        PickupRecord {
            courier: CourierCode::BlueDart,
            token_number: "7712345".to_string(),
            status: "Registered".to_string(),
            pickup_date: NaiveDate::from_ymd_opt(2024, 10, 12).unwrap(),
            pickup_time: "1400".to_string(),
            pieces: 1,
            weight_kg: 0.5,
            area_code: "BOM".to_string(),
            remarks: None,
            registered_at: Utc::now(),
            cancellation: None,
        }
    }

    #[test]
    fn test_forward_transitions() {
        use OrderStatus::*;
        assert!(validate_transition(Pending, Processing).is_ok());
        assert!(validate_transition(Processing, Shipped).is_ok());
        assert!(validate_transition(Shipped, Delivered).is_ok());
        assert!(validate_transition(Pending, Shipped).is_ok());
        assert!(validate_transition(Processing, Processing).is_ok());
    }

    #[test]
    fn test_cancellation_only_from_non_terminal() {
        use OrderStatus::*;
        assert!(validate_transition(Pending, Cancelled).is_ok());
        assert!(validate_transition(Shipped, Cancelled).is_ok());
        assert!(matches!(
            validate_transition(Delivered, Cancelled),
            Err(OrderError::InvalidTransition { .. })
        ));
        assert!(validate_transition(Cancelled, Processing).is_err());
    }

    #[test]
    fn test_backward_transition_rejected() {
        assert!(validate_transition(OrderStatus::Shipped, OrderStatus::Processing).is_err());
    }

    #[test]
    fn test_entering_processing_registers_pickup_once() {
        let mut order = order();
        assert_eq!(
            effects_for(OrderStatus::Pending, OrderStatus::Processing, &order),
            vec![SideEffect::RegisterPickup]
        );
        assert!(effects_for(OrderStatus::Processing, OrderStatus::Processing, &order).is_empty());
        assert!(effects_for(OrderStatus::Pending, OrderStatus::Shipped, &order).is_empty());

        order.pickup = Some(pickup());
        assert!(effects_for(OrderStatus::Pending, OrderStatus::Processing, &order).is_empty());
    }

    #[test]
    fn test_cancelling_with_pickup_cancels_it() {
        let mut order = order();
        assert!(effects_for(OrderStatus::Processing, OrderStatus::Cancelled, &order).is_empty());

        order.pickup = Some(pickup());
        let effects = effects_for(OrderStatus::Processing, OrderStatus::Cancelled, &order);
        assert!(matches!(effects.as_slice(), [SideEffect::CancelPickup { .. }]));
    }

    #[test]
    fn test_cancelling_drops_queued_pickup_registration() {
        use crate::outbox::PendingEffect;

        let mut order = order();
        let register = PendingEffect::new(SideEffect::RegisterPickup);
        let cancel = PendingEffect::new(SideEffect::CancelPickup {
            reason: "Order ORD-1 cancelled".to_string(),
        });
        order.pending_effects = vec![register.clone(), cancel];

        assert_eq!(superseded_effects(OrderStatus::Cancelled, &order), vec![register.id]);
        assert_eq!(superseded_effects(OrderStatus::Delivered, &order), vec![register.id]);
        assert!(superseded_effects(OrderStatus::Shipped, &order).is_empty());
    }
}
