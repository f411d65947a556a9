pub mod fulfillment;
pub mod lifecycle;
pub mod lock;
pub mod memory;
pub mod models;
pub mod outbox;
pub mod repository;
pub mod tracking;

pub use fulfillment::{
    CancelOutcome, FulfillmentError, FulfillmentOrchestrator, FulfillmentSettings, PickupOutcome,
    StatusUpdate, WaybillOutcome,
};
pub use lifecycle::{effects_for, superseded_effects, validate_transition, OrderError};
pub use lock::{InProcessOrderLock, OrderLock};
pub use memory::MemoryOrderStore;
pub use models::{
    Customer, ErrorLogEntry, FulfillmentOperation, Order, OrderItem, OrderStatus, PickupCancellationRecord,
    PickupRecord, WaybillRecord,
};
pub use outbox::{PendingEffect, SideEffect};
pub use repository::{OrderPatch, OrderStore, StoreError};
pub use tracking::degraded_snapshot;
