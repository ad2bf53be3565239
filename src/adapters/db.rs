use std::time::Duration;

use chrono::NaiveDateTime;
use rusqlite::types::Type;
use rusqlite::{Connection, Params, Row, params};
use thiserror::Error;

use crate::domain::aggregation::TimeWindow;
use crate::domain::models::{
    Device, DeviceEvent, EventType, NewDeviceEvent, TIMESTAMP_FORMAT, format_timestamp,
};

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS devices (
    device_id INTEGER PRIMARY KEY,
    client_id INTEGER,
    name TEXT NOT NULL,
    mac_address TEXT NOT NULL,
    location TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS device_events (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    device_id INTEGER NOT NULL,
    created_at TEXT NOT NULL,
    event_type TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_device_events_device_created_at
ON device_events (device_id, created_at);

CREATE INDEX IF NOT EXISTS idx_devices_client_id
ON devices (client_id);
"#;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreConfig {
    pub db_path: String,
}

#[derive(Debug, Error)]
pub enum DbError {
    #[error("failed to open database: {0}")]
    Open(#[source] rusqlite::Error),
    #[error("database write failed: {0}")]
    Write(#[source] rusqlite::Error),
    #[error("database read failed: {0}")]
    Read(#[source] rusqlite::Error),
}

/// Parameterized access to the device event tables.
///
/// Every call opens its own connection and drops it before returning, on the
/// success path as well as on every error path.
#[derive(Debug, Clone)]
pub struct EventStore {
    config: StoreConfig,
}

impl EventStore {
    pub fn new(config: StoreConfig) -> Self {
        Self { config }
    }

    fn connect(&self) -> Result<Connection, DbError> {
        let connection = Connection::open(&self.config.db_path).map_err(DbError::Open)?;
        connection
            .busy_timeout(BUSY_TIMEOUT)
            .map_err(DbError::Open)?;
        Ok(connection)
    }

    pub fn ensure_schema(&self) -> Result<(), DbError> {
        let connection = self.connect()?;
        connection.execute_batch(SCHEMA).map_err(DbError::Write)
    }

    pub fn insert<P: Params>(&self, sql: &str, params: P) -> Result<usize, DbError> {
        let connection = self.connect()?;
        connection.execute(sql, params).map_err(DbError::Write)
    }

    /// Runs a read and maps every row. No matching rows is an empty vector.
    pub fn select<T, P, F>(&self, sql: &str, params: P, map_row: F) -> Result<Vec<T>, DbError>
    where
        P: Params,
        F: FnMut(&Row<'_>) -> rusqlite::Result<T>,
    {
        let connection = self.connect()?;
        let mut statement = connection.prepare(sql).map_err(DbError::Read)?;
        let rows = statement.query_map(params, map_row).map_err(DbError::Read)?;

        let mut mapped = Vec::new();
        for row in rows {
            mapped.push(row.map_err(DbError::Read)?);
        }

        Ok(mapped)
    }

    pub fn insert_event(&self, new_event: &NewDeviceEvent) -> Result<(), DbError> {
        self.insert(
            "INSERT INTO device_events (device_id, created_at, event_type) VALUES (?1, ?2, ?3)",
            params![
                new_event.device_id,
                format_timestamp(&new_event.created_at),
                new_event.event_type.as_str(),
            ],
        )?;
        Ok(())
    }

    pub fn insert_device(&self, device: &Device) -> Result<(), DbError> {
        self.insert(
            "INSERT INTO devices (device_id, client_id, name, mac_address, location) VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                device.device_id,
                device.client_id,
                device.name,
                device.mac_address,
                device.location,
            ],
        )?;
        Ok(())
    }

    pub fn list_device_events(&self, device_id: i64) -> Result<Vec<DeviceEvent>, DbError> {
        self.select(
            "SELECT device_id, created_at, event_type
             FROM device_events
             WHERE device_id = ?1
             ORDER BY created_at DESC, id DESC",
            params![device_id],
            map_event,
        )
    }

    pub fn list_all_events(&self) -> Result<Vec<DeviceEvent>, DbError> {
        self.select(
            "SELECT device_id, created_at, event_type
             FROM device_events
             ORDER BY created_at DESC, id DESC",
            [],
            map_event,
        )
    }

    pub fn list_device_events_between(
        &self,
        device_id: i64,
        window: &TimeWindow,
    ) -> Result<Vec<DeviceEvent>, DbError> {
        self.select(
            "SELECT device_id, created_at, event_type
             FROM device_events
             WHERE device_id = ?1 AND created_at >= ?2 AND created_at < ?3
             ORDER BY created_at ASC, id ASC",
            params![
                device_id,
                format_timestamp(&window.start),
                format_timestamp(&window.end),
            ],
            map_event,
        )
    }

    pub fn list_client_events_between(
        &self,
        client_id: i64,
        window: &TimeWindow,
    ) -> Result<Vec<DeviceEvent>, DbError> {
        self.select(
            "SELECT e.device_id, e.created_at, e.event_type
             FROM device_events e
             JOIN devices d ON d.device_id = e.device_id
             WHERE d.client_id = ?1 AND e.created_at >= ?2 AND e.created_at < ?3
             ORDER BY e.created_at ASC, e.id ASC",
            params![
                client_id,
                format_timestamp(&window.start),
                format_timestamp(&window.end),
            ],
            map_event,
        )
    }

    /// Distinct ids of the client's devices that have at least one event.
    pub fn list_client_device_ids(&self, client_id: i64) -> Result<Vec<i64>, DbError> {
        self.select(
            "SELECT DISTINCT e.device_id
             FROM device_events e
             JOIN devices d ON d.device_id = e.device_id
             WHERE d.client_id = ?1
             ORDER BY e.device_id ASC",
            params![client_id],
            |row| row.get(0),
        )
    }
}

fn map_event(row: &Row<'_>) -> rusqlite::Result<DeviceEvent> {
    let raw_created_at: String = row.get(1)?;
    let created_at = NaiveDateTime::parse_from_str(&raw_created_at, TIMESTAMP_FORMAT)
        .map_err(|error| rusqlite::Error::FromSqlConversionFailure(1, Type::Text, Box::new(error)))?;
    let raw_event_type: String = row.get(2)?;

    Ok(DeviceEvent {
        device_id: row.get(0)?,
        created_at,
        event_type: EventType::from_raw(&raw_event_type),
    })
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use chrono::{NaiveDate, NaiveDateTime};
    use rusqlite::params;

    use super::{DbError, EventStore, StoreConfig};
    use crate::domain::aggregation::Interval;
    use crate::domain::models::{Device, EventType, NewDeviceEvent};

    fn temp_db_path(name: &str) -> PathBuf {
        let dir = tempfile::tempdir().expect("tempdir should be created");
        let path = dir.path().join(name);
        std::mem::forget(dir);
        path
    }

    fn migrated_store(name: &str) -> EventStore {
        let store = EventStore::new(StoreConfig {
            db_path: temp_db_path(name).to_string_lossy().into_owned(),
        });
        store.ensure_schema().expect("schema should be created");
        store
    }

    fn at(day: u32, hour: u32, minute: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2021, 3, day)
            .and_then(|date| date.and_hms_opt(hour, minute, 0))
            .expect("valid timestamp")
    }

    fn record(store: &EventStore, device_id: i64, created_at: NaiveDateTime, event_type: &str) {
        store
            .insert_event(&NewDeviceEvent {
                device_id,
                created_at,
                event_type: EventType::from_raw(event_type),
            })
            .expect("insert should succeed");
    }

    fn device(device_id: i64, client_id: Option<i64>) -> Device {
        Device {
            device_id,
            client_id,
            name: format!("gate-{device_id}"),
            mac_address: "00:11:22:33:44:55".to_string(),
            location: "lobby".to_string(),
        }
    }

    #[test]
    fn ensure_schema_is_idempotent() {
        let store = migrated_store("schema.sqlite");
        store.ensure_schema().expect("second run should succeed");

        let tables = store
            .select(
                "SELECT name FROM sqlite_master WHERE type='table' AND name IN ('devices', 'device_events') ORDER BY name",
                [],
                |row| row.get::<_, String>(0),
            )
            .expect("sqlite_master should be readable");
        assert_eq!(tables, vec!["device_events", "devices"]);
    }

    #[test]
    fn select_without_matches_returns_empty() {
        let store = migrated_store("empty.sqlite");
        let events = store.list_device_events(42).expect("query should succeed");
        assert!(events.is_empty());
    }

    #[test]
    fn insert_into_missing_table_reports_write_failure() {
        let store = migrated_store("missing-table.sqlite");
        let result = store.insert("INSERT INTO nowhere (x) VALUES (?1)", params![1]);
        assert!(matches!(result, Err(DbError::Write(_))));
    }

    #[test]
    fn select_with_bad_sql_reports_read_failure() {
        let store = migrated_store("bad-select.sqlite");
        let result = store.select("SELECT nope FROM device_events", [], |row| {
            row.get::<_, i64>(0)
        });
        assert!(matches!(result, Err(DbError::Read(_))));
    }

    #[test]
    fn unreachable_database_reports_open_failure() {
        let store = EventStore::new(StoreConfig {
            db_path: "/nonexistent-dir/turnstile/events.sqlite".to_string(),
        });
        assert!(matches!(store.list_all_events(), Err(DbError::Open(_))));
    }

    #[test]
    fn parameter_binding_keeps_input_out_of_sql_text() {
        let store = migrated_store("injection.sqlite");
        record(&store, 1, at(1, 8, 0), "entry'); DROP TABLE device_events; --");

        let events = store.list_device_events(1).expect("table should survive");
        assert_eq!(events.len(), 1);
        assert_eq!(
            events[0].event_type.as_str(),
            "entry'); DROP TABLE device_events; --"
        );
    }

    #[test]
    fn lists_device_events_newest_first() {
        let store = migrated_store("newest-first.sqlite");
        record(&store, 1, at(1, 8, 0), "entry");
        record(&store, 1, at(2, 8, 0), "exit");
        record(&store, 2, at(3, 8, 0), "entry");

        let events = store.list_device_events(1).expect("query should succeed");

        assert_eq!(events.len(), 2);
        assert_eq!(events[0].created_at, at(2, 8, 0));
        assert_eq!(events[0].event_type, EventType::Exit);
        assert_eq!(events[1].created_at, at(1, 8, 0));
        assert_eq!(store.list_all_events().expect("dump").len(), 3);
    }

    #[test]
    fn lists_distinct_client_devices_with_events() {
        let store = migrated_store("client-devices.sqlite");
        store.insert_device(&device(3, Some(10))).expect("device");
        store.insert_device(&device(1, Some(10))).expect("device");
        store.insert_device(&device(2, Some(10))).expect("device");
        store.insert_device(&device(4, Some(11))).expect("device");
        record(&store, 3, at(1, 8, 0), "entry");
        record(&store, 3, at(1, 9, 0), "exit");
        record(&store, 1, at(1, 9, 0), "entry");
        record(&store, 4, at(1, 9, 0), "entry");

        let ids = store.list_client_device_ids(10).expect("query should succeed");

        assert_eq!(ids, vec![1, 3]);
    }

    #[test]
    fn duplicate_device_is_a_write_failure() {
        let store = migrated_store("duplicate-device.sqlite");
        store.insert_device(&device(1, Some(10))).expect("device");
        assert!(matches!(
            store.insert_device(&device(1, Some(10))),
            Err(DbError::Write(_))
        ));
    }

    #[test]
    fn filters_client_events_to_window() {
        let store = migrated_store("client-window.sqlite");
        store.insert_device(&device(1, Some(10))).expect("device");
        record(&store, 1, at(4, 0, 0), "entry");
        record(&store, 1, at(4, 23, 59), "exit");
        record(&store, 1, at(5, 0, 0), "entry");
        record(&store, 1, at(3, 23, 59), "entry");

        let window = Interval::Day
            .window(NaiveDate::from_ymd_opt(2021, 3, 4).expect("date"))
            .expect("window");
        let events = store
            .list_client_events_between(10, &window)
            .expect("query should succeed");

        assert_eq!(events.len(), 2);
        assert_eq!(events[0].created_at, at(4, 0, 0));
        assert_eq!(events[1].created_at, at(4, 23, 59));

        let device_events = store
            .list_device_events_between(1, &window)
            .expect("query should succeed");
        assert_eq!(device_events, events);
    }
}
