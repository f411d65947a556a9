pub mod address;
pub mod carrier;
pub mod courier;
pub mod notify;
pub mod shipment;
pub mod tracking;

pub use address::{ContactAddress, SenderProfile};
pub use carrier::{AuthToken, CarrierCall, CarrierError, CarrierRejection, CarrierResult, ShippingProvider};
pub use courier::CourierCode;
pub use notify::{LogNotifier, NotificationSink};
pub use shipment::{
    CancelPickupRequest, PackageDetails, PickupCancellation, PickupConfirmation, PickupRequest,
    RateQuery, RateQuote, ServiceLevel, Serviceability, ShipmentConfirmation, ShipmentRequest,
    Waybill, WaybillRequest,
};
pub use tracking::{TrackingEvent, TrackingSnapshot, TrackingSource};
