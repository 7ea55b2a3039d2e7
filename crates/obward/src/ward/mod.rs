//! Ward state transitions: bed assignment, discharge prediction, alerting
//! and order scheduling.
//!
//! Each operation runs in exactly one transaction on a [`Session`](crate::core::Session)
//! and either commits every change or none.

mod ops;
pub mod types;

pub use ops::{
    assign_bed, create_alert, create_order, update_prediction, MAX_LOS_HOURS, MIN_LOS_HOURS,
};
pub use types::{
    parse_timestamp, AdmissionStatus, AlertType, BedStatus, NewOrder, OrderType, Priority,
    Severity, WriteOutcome,
};
