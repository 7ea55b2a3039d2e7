//! Shared fixtures: a small ward database in in-memory SQLite.

#![allow(dead_code)]

use obward::core::Row;
use obward::{Session, SqlValue, SqliteSession, Transaction};

/// Ward schema as the local database declares it, including the
/// admission/bed reference cycle.
pub const WARD_SCHEMA: &[&str] = &[
    "CREATE TABLE patient (patient_id VARCHAR(20) PRIMARY KEY, name TEXT NOT NULL, \
     date_of_birth DATE)",
    "CREATE TABLE provider (provider_id VARCHAR(20) PRIMARY KEY, name TEXT NOT NULL, \
     role TEXT)",
    "CREATE TABLE room (room_id VARCHAR(20) PRIMARY KEY, room_type TEXT)",
    "CREATE TABLE ob_profile (patient_id VARCHAR(20) PRIMARY KEY REFERENCES patient(patient_id), \
     gravida INTEGER, para INTEGER, gestational_weeks REAL)",
    "CREATE TABLE shift (shift_id VARCHAR(20) PRIMARY KEY, \
     provider_id VARCHAR(20) REFERENCES provider(provider_id), \
     start_time DATETIME, end_time DATETIME)",
    "CREATE TABLE admission (admission_id VARCHAR(20) PRIMARY KEY, \
     patient_id VARCHAR(20) NOT NULL REFERENCES patient(patient_id), \
     status TEXT NOT NULL, admit_time DATETIME NOT NULL, \
     current_bed_id VARCHAR(20) REFERENCES bed(bed_id), \
     predicted_los_hours INTEGER, predicted_discharge_time DATETIME)",
    "CREATE TABLE bed (bed_id VARCHAR(20) PRIMARY KEY, \
     room_id VARCHAR(20) REFERENCES room(room_id), status TEXT NOT NULL, \
     current_admission_id VARCHAR(20) REFERENCES admission(admission_id))",
    "CREATE TABLE labor_progress (progress_id VARCHAR(36) PRIMARY KEY, \
     admission_id VARCHAR(20) REFERENCES admission(admission_id), \
     recorded_at DATETIME, dilation_cm NUMERIC(4, 1))",
    "CREATE TABLE vital_sign (vital_id VARCHAR(36) PRIMARY KEY, \
     admission_id VARCHAR(20) REFERENCES admission(admission_id), \
     recorded_at DATETIME, systolic INTEGER, diastolic INTEGER, temperature_c REAL)",
    "CREATE TABLE medical_order (order_id VARCHAR(36) PRIMARY KEY, \
     admission_id VARCHAR(20) REFERENCES admission(admission_id), \
     order_type TEXT, status TEXT, scheduled_time DATETIME, \
     assigned_provider_id VARCHAR(20) REFERENCES provider(provider_id), \
     assigned_room_id VARCHAR(20) REFERENCES room(room_id), \
     priority TEXT, notes TEXT, created_by TEXT)",
    "CREATE TABLE alert (alert_id VARCHAR(36) PRIMARY KEY, \
     admission_id VARCHAR(20) REFERENCES admission(admission_id), \
     alert_type TEXT, severity TEXT, message TEXT, triggered_at DATETIME, \
     acknowledged BOOLEAN)",
];

/// Rows for the ward fixture. A001 holds B01; A002 has been discharged.
pub const WARD_ROWS: &[&str] = &[
    "INSERT INTO patient VALUES ('P001', 'Ada Lin', '1992-04-11'), \
     ('P002', 'Bea Ortiz', '1988-09-30')",
    "INSERT INTO provider VALUES ('D01', 'Dr. Hale', 'obstetrician'), \
     ('N01', 'Kim Park', 'midwife')",
    "INSERT INTO room VALUES ('R01', 'delivery'), ('R02', 'operating')",
    "INSERT INTO ob_profile VALUES ('P001', 2, 1, 38.5), ('P002', 1, 0, 40.0)",
    "INSERT INTO shift VALUES ('S01', 'D01', '2024-03-01 07:00:00', '2024-03-01 19:00:00')",
    "INSERT INTO admission VALUES \
     ('A001', 'P001', 'in_labor', '2024-03-01 08:00:00', 'B01', NULL, NULL), \
     ('A002', 'P002', 'discharged', '2024-02-20 10:30:00', NULL, 48, '2024-02-22 10:30:00')",
    "INSERT INTO bed VALUES ('B01', 'R01', 'occupied', 'A001'), \
     ('B02', 'R01', 'available', NULL), ('B03', 'R02', 'occupied', NULL)",
    "INSERT INTO labor_progress VALUES ('LP1', 'A001', '2024-03-01 09:00:00', 4.5)",
    "INSERT INTO vital_sign VALUES ('V1', 'A001', '2024-03-01 09:00:00', 128, 84, 37.1), \
     ('V2', 'A001', '2024-03-01 10:00:00', 142, 92, 37.9)",
    "INSERT INTO medical_order VALUES ('O1', 'A001', 'lab_test', 'scheduled', \
     '2024-03-01 11:00:00', 'D01', NULL, 'routine', '', 'staff')",
    "INSERT INTO alert VALUES \
     ('AL1', 'A001', 'high_bp', 'warning', 'BP 142/92', '2024-03-01 10:00:00', 0), \
     ('AL2', 'A001', 'fever', 'warning', '37.9C', '2024-03-01 10:00:00', 'true'), \
     ('AL3', 'A001', 'abnormal_fhr', 'critical', 'FHR 170', '2024-03-01 10:05:00', 1)",
];

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("obward=debug")),
        )
        .with_test_writer()
        .try_init();
}

/// Run statements in one committed transaction.
pub async fn exec_all(session: &dyn Session, statements: &[&str]) {
    let mut tx = session.begin().await.unwrap();
    for sql in statements {
        tx.execute(sql, &[]).await.unwrap();
    }
    tx.commit().await.unwrap();
}

/// An in-memory session holding the seeded ward database.
pub async fn ward_session() -> SqliteSession {
    ward_session_at(":memory:").await
}

/// A session on `path` seeded with the ward database.
pub async fn ward_session_at(path: &str) -> SqliteSession {
    init_tracing();
    let session = SqliteSession::connect(path).await.unwrap();
    exec_all(&session, WARD_SCHEMA).await;
    exec_all(&session, WARD_ROWS).await;
    session
}

pub async fn query(session: &dyn Session, sql: &str, params: &[SqlValue<'static>]) -> Vec<Row> {
    let mut tx = session.begin().await.unwrap();
    let rows = tx.fetch_all(sql, params).await.unwrap();
    tx.rollback().await.unwrap();
    rows
}

pub async fn query_one(session: &dyn Session, sql: &str, params: &[SqlValue<'static>]) -> Row {
    let mut rows = query(session, sql, params).await;
    assert_eq!(rows.len(), 1, "expected one row for: {sql}");
    rows.remove(0)
}

pub async fn count(session: &dyn Session, table: &str) -> i64 {
    let row = query_one(session, &format!("SELECT COUNT(*) AS n FROM {table}"), &[]).await;
    row.get_i64("n").unwrap()
}

/// Status and holder of a bed.
pub async fn bed(session: &dyn Session, bed_id: &str) -> (String, Option<String>) {
    let row = query_one(
        session,
        "SELECT status, current_admission_id FROM bed WHERE bed_id = $1",
        &[SqlValue::text_owned(bed_id)],
    )
    .await;
    (
        row.get_str("status").unwrap().to_string(),
        row.get_str("current_admission_id").map(str::to_string),
    )
}

pub async fn current_bed(session: &dyn Session, admission_id: &str) -> Option<String> {
    let row = query_one(
        session,
        "SELECT current_bed_id FROM admission WHERE admission_id = $1",
        &[SqlValue::text_owned(admission_id)],
    )
    .await;
    row.get_str("current_bed_id").map(str::to_string)
}
