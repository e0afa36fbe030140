//! Job consumer that reverse-geocodes a project stage's measurements.

use std::future::Future;
use std::time::Duration;

use sidewalk_database::MeasurementStore;
use sidewalk_measurement_models::{Coordinate, JobName, JobRequest, Stage};
use tokio::sync::mpsc::{self, error::TryRecvError};

use crate::{GeocodeError, GeocoderConfig, nominatim};

/// Resolves a coordinate to street address text.
pub trait ReverseGeocoder: Send + Sync {
    /// Returns `None` when the point has no street address.
    fn reverse(
        &self,
        coordinate: Coordinate,
    ) -> impl Future<Output = Result<Option<String>, GeocodeError>> + Send;
}

/// [`ReverseGeocoder`] backed by a Nominatim `/reverse` endpoint.
#[derive(Debug, Clone)]
pub struct NominatimClient {
    client: reqwest::Client,
    base_url: String,
}

impl NominatimClient {
    /// Creates a client for `base_url` identifying as `user_agent`.
    ///
    /// # Errors
    ///
    /// Returns [`GeocodeError::Http`] if the HTTP client cannot be built.
    pub fn new(base_url: &str, user_agent: &str) -> Result<Self, GeocodeError> {
        Ok(Self {
            client: nominatim::client(user_agent)?,
            base_url: base_url.to_string(),
        })
    }
}

impl ReverseGeocoder for NominatimClient {
    fn reverse(
        &self,
        coordinate: Coordinate,
    ) -> impl Future<Output = Result<Option<String>, GeocodeError>> + Send {
        nominatim::reverse_geocode(&self.client, &self.base_url, coordinate)
    }
}

/// Outcome of geocoding one project stage.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GeocodeSummary {
    /// Points looked up.
    pub requested: u64,
    /// Points that resolved to an address.
    pub resolved: u64,
    /// Rows written back.
    pub updated: u64,
}

/// Rate-limited reverse geocoder over a [`ReverseGeocoder`].
#[derive(Debug, Clone)]
pub struct Geocoder<R> {
    resolver: R,
    rate_limit: Duration,
}

impl Geocoder<NominatimClient> {
    /// Creates a Nominatim-backed geocoder from configuration.
    ///
    /// # Errors
    ///
    /// Returns [`GeocodeError::Http`] if the HTTP client cannot be built.
    pub fn from_config(config: &GeocoderConfig) -> Result<Self, GeocodeError> {
        Ok(Self::new(
            NominatimClient::new(&config.base_url, &config.user_agent)?,
            Duration::from_millis(config.rate_limit_ms),
        ))
    }
}

impl<R: ReverseGeocoder> Geocoder<R> {
    /// Wraps `resolver`, waiting `rate_limit` between requests.
    pub const fn new(resolver: R, rate_limit: Duration) -> Self {
        Self {
            resolver,
            rate_limit,
        }
    }

    /// Reverse-geocodes every measurement of a project stage and stores
    /// the addresses. Points that fail to resolve are stored as null.
    ///
    /// # Errors
    ///
    /// Returns [`GeocodeError::Storage`] if reading the measurements or
    /// writing the addresses fails.
    pub async fn geocode_project<S: MeasurementStore>(
        &self,
        store: &S,
        project_id: i64,
        stage: Stage,
    ) -> Result<GeocodeSummary, GeocodeError> {
        let records = store.find(project_id, stage)?;
        log::info!(
            "Reverse geocoding {} {stage} measurements for project {project_id}",
            records.len()
        );

        let mut addresses = Vec::with_capacity(records.len());
        let mut summary = GeocodeSummary::default();

        for (i, record) in records.iter().enumerate() {
            if i > 0 && !self.rate_limit.is_zero() {
                tokio::time::sleep(self.rate_limit).await;
            }
            summary.requested += 1;

            let address = match self.resolver.reverse(record.coordinate).await {
                Ok(Some(address)) => {
                    summary.resolved += 1;
                    Some(address)
                }
                Ok(None) => {
                    log::debug!("No address for object {}", record.object_id);
                    None
                }
                Err(e) => {
                    log::warn!(
                        "Reverse geocoding failed for object {}: {e}",
                        record.object_id
                    );
                    None
                }
            };
            addresses.push((record.object_id, address));
        }

        summary.updated = store.update_geocoded_addresses(project_id, stage, &addresses)?;
        log::info!(
            "Project {project_id} {stage}: resolved {}/{} addresses",
            summary.resolved,
            summary.requested
        );

        Ok(summary)
    }

    /// Decodes and runs one job message.
    ///
    /// # Errors
    ///
    /// Returns [`GeocodeError::Job`] for a malformed message, otherwise
    /// whatever [`Self::geocode_project`] returns.
    pub async fn handle<S: MeasurementStore>(
        &self,
        store: &S,
        message: &str,
    ) -> Result<GeocodeSummary, GeocodeError> {
        let job: JobRequest = serde_json::from_str(message)?;
        match job.job_name {
            JobName::Geocoding => {
                self.geocode_project(store, job.payload.project_id, job.payload.stage)
                    .await
            }
        }
    }

    async fn handle_logged<S: MeasurementStore>(&self, store: &S, message: &str) {
        if let Err(e) = self.handle(store, message).await {
            log::error!("Geocoding job failed: {e}");
        }
    }

    /// Runs every job already waiting on the queue, then returns the number
    /// of messages taken. Failed jobs are logged and skipped.
    pub async fn drain<S: MeasurementStore>(
        &self,
        store: &S,
        receiver: &mut mpsc::UnboundedReceiver<String>,
    ) -> u64 {
        let mut taken = 0;
        loop {
            match receiver.try_recv() {
                Ok(message) => {
                    taken += 1;
                    self.handle_logged(store, &message).await;
                }
                Err(TryRecvError::Empty | TryRecvError::Disconnected) => break,
            }
        }
        taken
    }

    /// Runs jobs as they arrive until every sender is dropped.
    pub async fn run<S: MeasurementStore>(
        &self,
        store: &S,
        mut receiver: mpsc::UnboundedReceiver<String>,
    ) {
        while let Some(message) = receiver.recv().await {
            self.handle_logged(store, &message).await;
        }
        log::info!("Geocoding queue closed");
    }
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone as _, Utc};
    use sidewalk_database::DuckDbStore;
    use sidewalk_measurement_models::{MeasurementRecord, StageDetails};

    use super::*;

    /// Resolves points east of -122.415 and fails everything else.
    struct FakeResolver;

    impl ReverseGeocoder for FakeResolver {
        fn reverse(
            &self,
            coordinate: Coordinate,
        ) -> impl Future<Output = Result<Option<String>, GeocodeError>> + Send {
            async move {
                if coordinate.longitude > -122.415 {
                    Ok(Some("100 Market Street".to_string()))
                } else {
                    Err(GeocodeError::RateLimited)
                }
            }
        }
    }

    fn record(object_id: i64, longitude: f64) -> MeasurementRecord {
        MeasurementRecord {
            object_id,
            coordinate: Coordinate::new(longitude, 37.7749),
            length: 0.0,
            width: 0.0,
            area: 0.0,
            h1: 0.0,
            h2: 0.0,
            curb_length: 0.0,
            measured_hazard_length: 0.0,
            inch_feet: 0.0,
            special_case: None,
            hazard_size: None,
            tech: Some("jdoe".to_string()),
            note: None,
            geocoded_address: None,
            measured_at: Utc.with_ymd_and_hms(2024, 1, 15, 9, 0, 0).unwrap(),
            details: StageDetails::Production { slope: None },
        }
    }

    fn store() -> DuckDbStore {
        let store = DuckDbStore::open_in_memory().unwrap();
        store
            .replace_all(
                5,
                Stage::Production,
                &[record(1, -122.4094), record(2, -122.4194)],
            )
            .unwrap();
        store
    }

    fn addresses(store: &DuckDbStore) -> Vec<Option<String>> {
        store
            .find(5, Stage::Production)
            .unwrap()
            .into_iter()
            .map(|r| r.geocoded_address)
            .collect()
    }

    #[tokio::test]
    async fn failed_points_stay_null() {
        let store = store();
        let geocoder = Geocoder::new(FakeResolver, Duration::ZERO);

        let summary = geocoder
            .geocode_project(&store, 5, Stage::Production)
            .await
            .unwrap();

        assert_eq!(
            summary,
            GeocodeSummary {
                requested: 2,
                resolved: 1,
                updated: 2,
            }
        );
        assert_eq!(
            addresses(&store),
            vec![Some("100 Market Street".to_string()), None]
        );
    }

    #[tokio::test]
    async fn drains_queued_jobs() {
        let store = store();
        let geocoder = Geocoder::new(FakeResolver, Duration::ZERO);
        let (sender, mut receiver) = mpsc::unbounded_channel();

        sender
            .send(serde_json::to_string(&JobRequest::geocoding(5, Stage::Production)).unwrap())
            .unwrap();
        sender.send("not json".to_string()).unwrap();

        assert_eq!(geocoder.drain(&store, &mut receiver).await, 2);
        assert_eq!(addresses(&store)[0].as_deref(), Some("100 Market Street"));
    }

    #[tokio::test]
    async fn malformed_message_is_an_error() {
        let store = store();
        let geocoder = Geocoder::new(FakeResolver, Duration::ZERO);
        assert!(matches!(
            geocoder.handle(&store, "{}").await,
            Err(GeocodeError::Job(_))
        ));
    }
}
