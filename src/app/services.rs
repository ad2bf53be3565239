use std::sync::Arc;

use chrono::NaiveDate;
use thiserror::Error;

use crate::adapters::db::{DbError, EventStore};
use crate::domain::aggregation::{
    AggregationError, BucketMap, DeviceCount, Interval, bucketize, count_today,
};
use crate::domain::clock::Clock;
use crate::domain::models::{Device, DeviceEvent, EventType, NewDeviceEvent};

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("database operation failed: {0}")]
    Database(#[from] DbError),
    #[error("aggregation failed: {0}")]
    Aggregation(#[from] AggregationError),
}

pub trait DeviceEventQueryHandler {
    fn list_device_events(&self, device_id: i64) -> Result<Vec<DeviceEvent>, ServiceError>;
    fn list_all_events(&self) -> Result<Vec<DeviceEvent>, ServiceError>;
    fn list_client_devices(&self, client_id: i64) -> Result<Vec<i64>, ServiceError>;
    fn count_device_today(&self, device_id: i64) -> Result<DeviceCount, ServiceError>;
    fn device_count_history(
        &self,
        client_id: i64,
        interval: Interval,
        reference: NaiveDate,
    ) -> Result<BucketMap, ServiceError>;
}

pub trait DeviceEventCommandHandler {
    fn register_event(&self, device_id: i64, event_type: EventType) -> Result<(), ServiceError>;
    fn add_device(&self, device: &Device) -> Result<(), ServiceError>;
}

#[derive(Clone)]
pub struct StoreEventService {
    store: EventStore,
    clock: Arc<dyn Clock>,
}

impl StoreEventService {
    pub fn new(store: EventStore, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }
}

impl DeviceEventQueryHandler for StoreEventService {
    fn list_device_events(&self, device_id: i64) -> Result<Vec<DeviceEvent>, ServiceError> {
        Ok(self.store.list_device_events(device_id)?)
    }

    fn list_all_events(&self) -> Result<Vec<DeviceEvent>, ServiceError> {
        Ok(self.store.list_all_events()?)
    }

    fn list_client_devices(&self, client_id: i64) -> Result<Vec<i64>, ServiceError> {
        Ok(self.store.list_client_device_ids(client_id)?)
    }

    fn count_device_today(&self, device_id: i64) -> Result<DeviceCount, ServiceError> {
        let today = self.clock.now().date();
        let window = Interval::Day.window(today)?;
        let rows = self.store.list_device_events_between(device_id, &window)?;
        Ok(count_today(&rows, device_id))
    }

    fn device_count_history(
        &self,
        client_id: i64,
        interval: Interval,
        reference: NaiveDate,
    ) -> Result<BucketMap, ServiceError> {
        let window = interval.window(reference)?;
        let rows = self.store.list_client_events_between(client_id, &window)?;

        tracing::debug!(
            client_id,
            rows = rows.len(),
            window_start = %window.start,
            window_end = %window.end,
            "bucketing device events"
        );

        Ok(bucketize(&rows, interval, reference)?)
    }
}

impl DeviceEventCommandHandler for StoreEventService {
    fn register_event(&self, device_id: i64, event_type: EventType) -> Result<(), ServiceError> {
        let new_event = NewDeviceEvent {
            device_id,
            created_at: self.clock.now(),
            event_type,
        };
        self.store.insert_event(&new_event)?;

        tracing::info!(
            device_id,
            event_type = new_event.event_type.as_str(),
            "device event registered"
        );
        Ok(())
    }

    fn add_device(&self, device: &Device) -> Result<(), ServiceError> {
        self.store.insert_device(device)?;

        tracing::info!(
            device_id = device.device_id,
            client_id = ?device.client_id,
            "device added"
        );
        Ok(())
    }
}
