//! Transactional ward write operations.
//!
//! Every operation opens one transaction on the injected session, checks
//! its preconditions against rows read under a row lock, and commits only
//! when every step succeeded. Any error rolls the transaction back.

use chrono::{DateTime, NaiveDateTime, SubsecRound, Utc};
use tracing::{debug, info};
use uuid::Uuid;

use crate::core::traits::{finish, Session, Transaction};
use crate::core::value::SqlValue;
use crate::dialect::to_timestamp;
use crate::error::{Result, WardError};

use super::types::{AdmissionStatus, AlertType, BedStatus, NewOrder, Severity, WriteOutcome};

/// Shortest predicted length of stay, in hours.
pub const MIN_LOS_HOURS: i64 = 6;

/// Longest predicted length of stay (14 days), in hours.
pub const MAX_LOS_HOURS: i64 = 336;

/// Status of a freshly created order.
const ORDER_STATUS_SCHEDULED: &str = "scheduled";

/// `created_by` marker for orders placed through this crate.
const CREATED_BY: &str = "ai_assisted";

/// Admission columns the operations check.
struct AdmissionRecord {
    admit_time: Option<NaiveDateTime>,
    current_bed_id: Option<String>,
}

/// Load an admission under a row lock and refuse discharged ones.
async fn load_admission(
    tx: &mut dyn Transaction,
    lock: &str,
    admission_id: &str,
    action: &'static str,
) -> Result<AdmissionRecord> {
    let sql = format!(
        "SELECT status, admit_time, current_bed_id FROM admission WHERE admission_id = $1{}",
        lock
    );
    let row = tx
        .fetch_optional(&sql, &[SqlValue::text_owned(admission_id)])
        .await?
        .ok_or_else(|| WardError::not_found("Admission", admission_id))?;

    let status = row.get_str("status").unwrap_or_default();
    if status == AdmissionStatus::Discharged.as_str() {
        return Err(WardError::InvalidState {
            admission_id: admission_id.to_string(),
            status: status.to_string(),
            action,
        });
    }

    Ok(AdmissionRecord {
        admit_time: row.get("admit_time").and_then(to_timestamp),
        current_bed_id: row.get_str("current_bed_id").map(str::to_string),
    })
}

/// Check that a referenced row exists.
async fn require_row(
    tx: &mut dyn Transaction,
    table: &str,
    key: &str,
    id: &str,
    entity: &'static str,
) -> Result<()> {
    let sql = format!("SELECT {key} FROM {table} WHERE {key} = $1");
    tx.fetch_optional(&sql, &[SqlValue::text_owned(id)])
        .await?
        .map(|_| ())
        .ok_or_else(|| WardError::not_found(entity, id))
}

/// Assign or transfer an admission to a bed.
///
/// A bed the admission already holds is released first. The target bed
/// must exist and be available; the admission must exist and not be
/// discharged.
pub async fn assign_bed(
    session: &dyn Session,
    admission_id: &str,
    bed_id: &str,
) -> Result<WriteOutcome> {
    let lock = session.dialect().row_lock();
    let mut tx = session.begin().await?;
    let result = assign_bed_in(&mut *tx, lock, admission_id, bed_id).await;
    finish(tx, result).await
}

async fn assign_bed_in(
    tx: &mut dyn Transaction,
    lock: &str,
    admission_id: &str,
    bed_id: &str,
) -> Result<WriteOutcome> {
    let admission = load_admission(tx, lock, admission_id, "assign bed").await?;

    let bed_sql = format!("SELECT status FROM bed WHERE bed_id = $1{}", lock);
    let bed = tx
        .fetch_optional(&bed_sql, &[SqlValue::text_owned(bed_id)])
        .await?
        .ok_or_else(|| WardError::not_found("Bed", bed_id))?;
    let bed_status = bed.get_str("status").unwrap_or_default();
    if bed_status != BedStatus::Available.as_str() {
        return Err(WardError::NotAvailable {
            bed_id: bed_id.to_string(),
            status: bed_status.to_string(),
        });
    }

    if let Some(old_bed_id) = admission.current_bed_id {
        debug!("Releasing bed {} held by admission {}", old_bed_id, admission_id);
        tx.execute(
            "UPDATE bed SET status = $1, current_admission_id = NULL WHERE bed_id = $2",
            &[
                SqlValue::from(BedStatus::Available.as_str()),
                SqlValue::from(old_bed_id),
            ],
        )
        .await?;
    }

    tx.execute(
        "UPDATE bed SET status = $1, current_admission_id = $2 WHERE bed_id = $3",
        &[
            SqlValue::from(BedStatus::Occupied.as_str()),
            SqlValue::text_owned(admission_id),
            SqlValue::text_owned(bed_id),
        ],
    )
    .await?;

    tx.execute(
        "UPDATE admission SET current_bed_id = $1 WHERE admission_id = $2",
        &[SqlValue::text_owned(bed_id), SqlValue::text_owned(admission_id)],
    )
    .await?;

    info!("Assigned admission {} to bed {}", admission_id, bed_id);
    Ok(WriteOutcome::ok(format!(
        "Assigned admission {} to bed {}",
        admission_id, bed_id
    )))
}

/// Record a length-of-stay prediction for an admission.
///
/// `predicted_los_hours` must lie in `6..=336` and the predicted discharge
/// must fall after the admission's admit time.
pub async fn update_prediction(
    session: &dyn Session,
    admission_id: &str,
    predicted_los_hours: i64,
    predicted_discharge_time: DateTime<Utc>,
) -> Result<WriteOutcome> {
    if !(MIN_LOS_HOURS..=MAX_LOS_HOURS).contains(&predicted_los_hours) {
        return Err(WardError::Range(format!(
            "Predicted LOS hours must be between {} and {}, got: {}",
            MIN_LOS_HOURS, MAX_LOS_HOURS, predicted_los_hours
        )));
    }

    let lock = session.dialect().row_lock();
    let mut tx = session.begin().await?;
    let result = update_prediction_in(
        &mut *tx,
        lock,
        admission_id,
        predicted_los_hours,
        predicted_discharge_time.naive_utc(),
    )
    .await;
    finish(tx, result).await
}

async fn update_prediction_in(
    tx: &mut dyn Transaction,
    lock: &str,
    admission_id: &str,
    predicted_los_hours: i64,
    discharge: NaiveDateTime,
) -> Result<WriteOutcome> {
    let admission = load_admission(tx, lock, admission_id, "update prediction").await?;

    let admit = admission.admit_time.ok_or_else(|| {
        WardError::Storage(format!(
            "admission {} has no readable admit_time",
            admission_id
        ))
    })?;
    if discharge <= admit {
        return Err(WardError::Range(format!(
            "Predicted discharge time for admission {} must be after admit time ({} <= {})",
            admission_id, discharge, admit
        )));
    }

    tx.execute(
        "UPDATE admission SET predicted_los_hours = $1, predicted_discharge_time = $2 \
         WHERE admission_id = $3",
        &[
            SqlValue::I64(predicted_los_hours),
            SqlValue::DateTime(discharge),
            SqlValue::text_owned(admission_id),
        ],
    )
    .await?;

    info!(
        "Updated prediction for admission {}: {}h, discharge {}",
        admission_id, predicted_los_hours, discharge
    );
    Ok(WriteOutcome::ok(format!(
        "Updated prediction for admission {}",
        admission_id
    )))
}

/// Raise an unacknowledged alert on an admission.
pub async fn create_alert(
    session: &dyn Session,
    admission_id: &str,
    alert_type: AlertType,
    severity: Severity,
    message: &str,
) -> Result<WriteOutcome> {
    let lock = session.dialect().row_lock();
    let mut tx = session.begin().await?;
    let result = create_alert_in(&mut *tx, lock, admission_id, alert_type, severity, message).await;
    finish(tx, result).await
}

async fn create_alert_in(
    tx: &mut dyn Transaction,
    lock: &str,
    admission_id: &str,
    alert_type: AlertType,
    severity: Severity,
    message: &str,
) -> Result<WriteOutcome> {
    load_admission(tx, lock, admission_id, "create alert").await?;

    let alert_id = Uuid::new_v4().to_string();
    // Microseconds: the finest precision both backends store.
    let triggered_at = Utc::now().trunc_subsecs(6);

    tx.execute(
        "INSERT INTO alert \
         (alert_id, admission_id, alert_type, severity, message, triggered_at, acknowledged) \
         VALUES ($1, $2, $3, $4, $5, $6, $7)",
        &[
            SqlValue::text_owned(alert_id.as_str()),
            SqlValue::text_owned(admission_id),
            SqlValue::from(alert_type.as_str()),
            SqlValue::from(severity.as_str()),
            SqlValue::text_owned(message),
            SqlValue::DateTime(triggered_at.naive_utc()),
            SqlValue::Bool(false),
        ],
    )
    .await?;

    info!(
        "Created {} {} alert {} for admission {}",
        severity, alert_type, alert_id, admission_id
    );
    Ok(WriteOutcome {
        message: format!("Created alert {}", alert_id),
        alert_id: Some(alert_id),
        triggered_at: Some(triggered_at),
        ..WriteOutcome::ok("")
    })
}

/// Schedule a medical order for an admission.
///
/// The assigned provider, and the room when one is given, must exist.
pub async fn create_order(session: &dyn Session, order: &NewOrder) -> Result<WriteOutcome> {
    let lock = session.dialect().row_lock();
    let mut tx = session.begin().await?;
    let result = create_order_in(&mut *tx, lock, order).await;
    finish(tx, result).await
}

async fn create_order_in(
    tx: &mut dyn Transaction,
    lock: &str,
    order: &NewOrder,
) -> Result<WriteOutcome> {
    load_admission(tx, lock, &order.admission_id, "create order").await?;
    require_row(
        tx,
        "provider",
        "provider_id",
        &order.assigned_provider_id,
        "Provider",
    )
    .await?;
    if let Some(room_id) = &order.assigned_room_id {
        require_row(tx, "room", "room_id", room_id, "Room").await?;
    }

    let order_id = Uuid::new_v4().to_string();
    tx.execute(
        "INSERT INTO medical_order \
         (order_id, admission_id, order_type, status, scheduled_time, \
          assigned_provider_id, assigned_room_id, priority, notes, created_by) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)",
        &[
            SqlValue::text_owned(order_id.as_str()),
            SqlValue::text_owned(order.admission_id.as_str()),
            SqlValue::from(order.order_type.as_str()),
            SqlValue::from(ORDER_STATUS_SCHEDULED),
            SqlValue::DateTime(order.scheduled_time.naive_utc()),
            SqlValue::text_owned(order.assigned_provider_id.as_str()),
            SqlValue::from(order.assigned_room_id.clone()),
            SqlValue::from(order.priority.as_str()),
            SqlValue::text_owned(order.notes.as_str()),
            SqlValue::from(CREATED_BY),
        ],
    )
    .await?;

    info!(
        "Created {} order {} ({}) for admission {}",
        order.order_type, order_id, order.priority, order.admission_id
    );
    Ok(WriteOutcome {
        message: format!("Created order {}", order_id),
        order_id: Some(order_id),
        ..WriteOutcome::ok("")
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::drivers::SqliteSession;
    use crate::error::ErrorKind;
    use chrono::TimeZone;

    #[tokio::test]
    async fn test_los_range_checked_before_storage() {
        // No tables exist: reaching storage would fail with a SQLite error.
        let session = SqliteSession::connect(":memory:").await.unwrap();
        let at = Utc.with_ymd_and_hms(2024, 3, 4, 10, 0, 0).unwrap();

        for hours in [0, 5, 337, -1] {
            let err = update_prediction(&session, "A001", hours, at)
                .await
                .unwrap_err();
            assert_eq!(err.kind(), ErrorKind::Range, "hours={hours}");
        }
    }

    #[tokio::test]
    async fn test_missing_admission_is_not_found() {
        let session = SqliteSession::connect(":memory:").await.unwrap();
        let mut tx = session.begin().await.unwrap();
        tx.execute(
            "CREATE TABLE admission (admission_id TEXT PRIMARY KEY, status TEXT, \
             admit_time DATETIME, current_bed_id TEXT)",
            &[],
        )
        .await
        .unwrap();
        tx.commit().await.unwrap();

        let err = create_alert(&session, "A404", AlertType::Fever, Severity::Warning, "38.9C")
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
        assert_eq!(err.to_string(), "Admission not found: A404");
    }
}
