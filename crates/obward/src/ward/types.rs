//! Closed value sets and argument types for the ward write operations.
//!
//! Enum-valued arguments arrive as strings from callers (chat handlers,
//! HTTP adapters) and are parsed once here; the operations only ever see
//! the typed form.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::dialect::parse_timestamp_text;
use crate::error::{Result, WardError};

/// Admission lifecycle status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AdmissionStatus {
    Admitted,
    InLabor,
    Postpartum,
    Discharged,
}

impl AdmissionStatus {
    pub const ALL: &'static [&'static str] = &["admitted", "in_labor", "postpartum", "discharged"];

    pub fn as_str(&self) -> &'static str {
        match self {
            AdmissionStatus::Admitted => "admitted",
            AdmissionStatus::InLabor => "in_labor",
            AdmissionStatus::Postpartum => "postpartum",
            AdmissionStatus::Discharged => "discharged",
        }
    }
}

impl FromStr for AdmissionStatus {
    type Err = WardError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "admitted" => Ok(AdmissionStatus::Admitted),
            "in_labor" => Ok(AdmissionStatus::InLabor),
            "postpartum" => Ok(AdmissionStatus::Postpartum),
            "discharged" => Ok(AdmissionStatus::Discharged),
            other => Err(WardError::invalid_argument("status", other, Self::ALL)),
        }
    }
}

/// Bed occupancy status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BedStatus {
    Available,
    Occupied,
}

impl BedStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BedStatus::Available => "available",
            BedStatus::Occupied => "occupied",
        }
    }
}

/// Kind of clinical alert.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertType {
    HighBp,
    AbnormalFhr,
    Fever,
    PretermRisk,
}

impl AlertType {
    pub const ALL: &'static [&'static str] = &["high_bp", "abnormal_fhr", "fever", "preterm_risk"];

    pub fn as_str(&self) -> &'static str {
        match self {
            AlertType::HighBp => "high_bp",
            AlertType::AbnormalFhr => "abnormal_fhr",
            AlertType::Fever => "fever",
            AlertType::PretermRisk => "preterm_risk",
        }
    }
}

impl FromStr for AlertType {
    type Err = WardError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "high_bp" => Ok(AlertType::HighBp),
            "abnormal_fhr" => Ok(AlertType::AbnormalFhr),
            "fever" => Ok(AlertType::Fever),
            "preterm_risk" => Ok(AlertType::PretermRisk),
            other => Err(WardError::invalid_argument("alert_type", other, Self::ALL)),
        }
    }
}

/// Alert severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Warning,
    Critical,
}

impl Severity {
    pub const ALL: &'static [&'static str] = &["warning", "critical"];

    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Warning => "warning",
            Severity::Critical => "critical",
        }
    }
}

impl FromStr for Severity {
    type Err = WardError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "warning" => Ok(Severity::Warning),
            "critical" => Ok(Severity::Critical),
            other => Err(WardError::invalid_argument("severity", other, Self::ALL)),
        }
    }
}

/// Kind of medical order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderType {
    CSection,
    Induction,
    Epidural,
    LabTest,
    Medication,
    Consult,
}

impl OrderType {
    pub const ALL: &'static [&'static str] = &[
        "c_section",
        "induction",
        "epidural",
        "lab_test",
        "medication",
        "consult",
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            OrderType::CSection => "c_section",
            OrderType::Induction => "induction",
            OrderType::Epidural => "epidural",
            OrderType::LabTest => "lab_test",
            OrderType::Medication => "medication",
            OrderType::Consult => "consult",
        }
    }
}

impl FromStr for OrderType {
    type Err = WardError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "c_section" => Ok(OrderType::CSection),
            "induction" => Ok(OrderType::Induction),
            "epidural" => Ok(OrderType::Epidural),
            "lab_test" => Ok(OrderType::LabTest),
            "medication" => Ok(OrderType::Medication),
            "consult" => Ok(OrderType::Consult),
            other => Err(WardError::invalid_argument("order_type", other, Self::ALL)),
        }
    }
}

/// Order priority.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    #[default]
    Routine,
    Urgent,
    Emergency,
}

impl Priority {
    pub const ALL: &'static [&'static str] = &["routine", "urgent", "emergency"];

    pub fn as_str(&self) -> &'static str {
        match self {
            Priority::Routine => "routine",
            Priority::Urgent => "urgent",
            Priority::Emergency => "emergency",
        }
    }
}

impl FromStr for Priority {
    type Err = WardError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "routine" => Ok(Priority::Routine),
            "urgent" => Ok(Priority::Urgent),
            "emergency" => Ok(Priority::Emergency),
            other => Err(WardError::invalid_argument("priority", other, Self::ALL)),
        }
    }
}

macro_rules! impl_display_as_str {
    ($($ty:ty),*) => {
        $(impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        })*
    };
}

impl_display_as_str!(AdmissionStatus, BedStatus, AlertType, Severity, OrderType, Priority);

/// Parse an ISO-8601 timestamp argument.
///
/// Offsets are converted to UTC; a value without one is taken as UTC.
pub fn parse_timestamp(field: &'static str, value: &str) -> Result<DateTime<Utc>> {
    parse_timestamp_text(value)
        .map(|naive| naive.and_utc())
        .ok_or_else(|| WardError::malformed(field, value, "Expected an ISO-8601 timestamp"))
}

/// Arguments for [`create_order`](super::create_order).
#[derive(Debug, Clone)]
pub struct NewOrder {
    pub admission_id: String,
    pub order_type: OrderType,
    pub scheduled_time: DateTime<Utc>,
    pub assigned_provider_id: String,
    pub priority: Priority,
    pub assigned_room_id: Option<String>,
    pub notes: String,
}

impl NewOrder {
    /// Order with routine priority, no room and empty notes.
    pub fn new(
        admission_id: impl Into<String>,
        order_type: OrderType,
        scheduled_time: DateTime<Utc>,
        assigned_provider_id: impl Into<String>,
    ) -> Self {
        Self {
            admission_id: admission_id.into(),
            order_type,
            scheduled_time,
            assigned_provider_id: assigned_provider_id.into(),
            priority: Priority::default(),
            assigned_room_id: None,
            notes: String::new(),
        }
    }

    pub fn priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }

    pub fn room(mut self, room_id: impl Into<String>) -> Self {
        self.assigned_room_id = Some(room_id.into());
        self
    }

    pub fn notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = notes.into();
        self
    }
}

/// Result of a successful write operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WriteOutcome {
    pub success: bool,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alert_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub order_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub triggered_at: Option<DateTime<Utc>>,
}

impl WriteOutcome {
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
            alert_id: None,
            order_id: None,
            triggered_at: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use chrono::{TimeZone, Timelike};

    #[test]
    fn test_enum_parsing() {
        assert_eq!("high_bp".parse::<AlertType>().unwrap(), AlertType::HighBp);
        assert_eq!("critical".parse::<Severity>().unwrap(), Severity::Critical);
        assert_eq!("c_section".parse::<OrderType>().unwrap(), OrderType::CSection);
        assert_eq!("emergency".parse::<Priority>().unwrap(), Priority::Emergency);
        assert_eq!(
            "in_labor".parse::<AdmissionStatus>().unwrap(),
            AdmissionStatus::InLabor
        );
    }

    #[test]
    fn test_unknown_value_lists_allowed_set() {
        let err = "migraine".parse::<AlertType>().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);
        assert_eq!(
            err.to_string(),
            "Invalid alert_type: migraine. Must be one of {high_bp, abnormal_fhr, fever, preterm_risk}"
        );
        // Case matters: stored values are lowercase.
        assert!("Urgent".parse::<Priority>().is_err());
    }

    #[test]
    fn test_display_matches_stored_form() {
        assert_eq!(OrderType::LabTest.to_string(), "lab_test");
        assert_eq!(BedStatus::Occupied.to_string(), "occupied");
        assert_eq!(Priority::default(), Priority::Routine);
    }

    #[test]
    fn test_parse_timestamp_with_and_without_offset() {
        let naive = parse_timestamp("scheduled_time", "2024-03-02T09:00:00").unwrap();
        assert_eq!(naive, Utc.with_ymd_and_hms(2024, 3, 2, 9, 0, 0).unwrap());

        let offset = parse_timestamp("scheduled_time", "2024-03-02T17:00:00+08:00").unwrap();
        assert_eq!(offset, naive);
        assert_eq!(offset.hour(), 9);
    }

    #[test]
    fn test_parse_timestamp_rejects_garbage() {
        let err = parse_timestamp("predicted_discharge_time", "thursday").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);
        assert!(err.to_string().contains("predicted_discharge_time"));
    }

    #[test]
    fn test_new_order_defaults() {
        let at = Utc.with_ymd_and_hms(2024, 3, 2, 9, 0, 0).unwrap();
        let order = NewOrder::new("A001", OrderType::Epidural, at, "D01");
        assert_eq!(order.priority, Priority::Routine);
        assert!(order.assigned_room_id.is_none());
        assert_eq!(order.notes, "");

        let order = order.priority(Priority::Urgent).room("R01").notes("NPO");
        assert_eq!(order.assigned_room_id.as_deref(), Some("R01"));
    }

    #[test]
    fn test_outcome_json_omits_absent_ids() {
        let json = serde_json::to_string(&WriteOutcome::ok("Assigned admission A001 to bed B01"))
            .unwrap();
        assert_eq!(
            json,
            r#"{"success":true,"message":"Assigned admission A001 to bed B01"}"#
        );
    }
}
