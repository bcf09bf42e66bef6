//! The beacon-sensing provider boundary.
//!
//! Everything hardware-shaped lives behind [`BeaconProvider`]: region
//! monitoring, ranging, advertising control, and runtime location
//! authorization. The store consumes the provider's normalized event feed
//! and issues intents through the trait; provider failures never cross this
//! boundary as store-level errors (they are logged and absorbed by the
//! caller).
//!
//! A test double, [`mock::MockProvider`], records issued intents and lets
//! tests inject events.

use futures::future::BoxFuture;
use serde::Deserialize;
use thiserror::Error;
use tokio::sync::mpsc::UnboundedSender;

use crate::region::{BeaconReading, BeaconRegionDescriptor, Proximity};

/// Failure reported by the sensing/advertising provider.
///
/// Always non-fatal to a store: callers at the boundary log these and keep
/// the prior snapshot.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// The provider rejected an issued intent.
    #[error("Provider rejected {intent}: {message}")]
    IntentRejected {
        /// The intent that was rejected.
        intent: &'static str,
        /// Provider-supplied rejection detail.
        message: String,
    },

    /// The provider (or its radio stack) is not available.
    #[error("Beacon provider unavailable: {0}")]
    Unavailable(String),

    /// An opaque backend failure.
    #[error("Beacon provider backend error: {0}")]
    Backend(#[from] anyhow::Error),
}

/// Runtime location-access tier requested from the platform.
///
/// Region monitoring needs `Always`; ranging alone works with `WhenInUse`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthorizationTier {
    /// Location access at any time, required for background monitoring.
    Always,
    /// Location access while the application is in use.
    WhenInUse,
}

/// A normalized event delivered by the provider adapter.
#[derive(Debug, Clone)]
pub enum ProviderEvent {
    /// The provider determined the device's relationship to the region.
    /// Carries the raw membership string; mapping to the tri-state happens
    /// in the store.
    RegionState {
        /// Raw provider state value.
        raw: String,
    },

    /// A ranging pass completed with the given raw readings.
    Ranged {
        /// Raw readings, in provider delivery order.
        readings: Vec<RawBeaconReading>,
    },

    /// Monitoring started for the region. Diagnostic only.
    MonitoringStarted {
        /// Raw provider payload, logged verbatim.
        raw: String,
    },

    /// Local advertising started.
    AdvertisingStarted,

    /// The local advertising state changed.
    AdvertisingStateChanged {
        /// Whether the device is currently advertising.
        advertising: bool,
    },
}

/// An integer field as it appears on the wire: some providers deliver
/// `major`/`minor` as numbers, others as numeric strings.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum RawInt {
    /// Delivered as a native number.
    Number(i64),
    /// Delivered as a numeric string.
    Text(String),
}

impl RawInt {
    /// Coerce to `u16`, whichever way the value was delivered.
    ///
    /// Returns `None` for out-of-range numbers and non-numeric strings.
    #[must_use]
    pub fn as_u16(&self) -> Option<u16> {
        match self {
            Self::Number(n) => u16::try_from(*n).ok(),
            Self::Text(s) => s.trim().parse().ok(),
        }
    }
}

impl From<u16> for RawInt {
    fn from(value: u16) -> Self {
        Self::Number(i64::from(value))
    }
}

impl From<&str> for RawInt {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

/// One beacon observation exactly as the provider delivered it.
#[derive(Debug, Clone, Deserialize)]
pub struct RawBeaconReading {
    /// Advertised proximity UUID.
    pub uuid: String,
    /// Major value, possibly a numeric string.
    pub major: RawInt,
    /// Minor value, possibly a numeric string.
    pub minor: RawInt,
    /// Raw proximity bucket string.
    pub proximity: String,
    /// Estimated distance in meters; negative means unknown.
    pub accuracy: f64,
    /// Received signal strength in dBm.
    pub rssi: i16,
}

impl RawBeaconReading {
    /// Normalize into the typed reading the store compares and publishes.
    ///
    /// Returns `None` when `major` or `minor` cannot be coerced to an
    /// integer; the caller drops such readings (with a diagnostic) rather
    /// than failing the whole ranging pass.
    #[must_use]
    pub fn normalize(&self) -> Option<BeaconReading> {
        Some(BeaconReading {
            uuid: self.uuid.clone(),
            major: self.major.as_u16()?,
            minor: self.minor.as_u16()?,
            proximity: Proximity::from_raw(&self.proximity),
            accuracy: (self.accuracy >= 0.0).then_some(self.accuracy),
            rssi: self.rssi,
        })
    }
}

/// Parse a raw ranging payload as providers deliver it: a JSON object
/// carrying a `beacons` array.
///
/// # Errors
///
/// Returns the underlying JSON error when the payload does not have the
/// expected shape.
pub fn readings_from_json(payload: &str) -> Result<Vec<RawBeaconReading>, serde_json::Error> {
    #[derive(Deserialize)]
    struct RangingPayload {
        beacons: Vec<RawBeaconReading>,
    }

    serde_json::from_str::<RangingPayload>(payload).map(|payload| payload.beacons)
}

/// The external beacon-sensing provider.
///
/// Implementations translate these intents into platform calls and feed
/// normalized [`ProviderEvent`]s into the sink registered by the store. All
/// intents are asynchronous and may fail; the store treats every failure as
/// non-fatal.
pub trait BeaconProvider: Send + Sync {
    /// Register the event sink the provider delivers normalized events into.
    ///
    /// A store calls this once during construction, before issuing any start
    /// intents.
    fn set_event_sink(&self, sink: UnboundedSender<ProviderEvent>);

    /// Request runtime location authorization at the given tier.
    fn request_authorization<'a>(
        &'a self,
        tier: AuthorizationTier,
    ) -> BoxFuture<'a, Result<(), ProviderError>>;

    /// Start membership monitoring for the region.
    fn start_monitoring<'a>(
        &'a self,
        region: &'a BeaconRegionDescriptor,
    ) -> BoxFuture<'a, Result<(), ProviderError>>;

    /// Stop membership monitoring for the region.
    fn stop_monitoring<'a>(
        &'a self,
        region: &'a BeaconRegionDescriptor,
    ) -> BoxFuture<'a, Result<(), ProviderError>>;

    /// Start ranging beacons matching the region.
    fn start_ranging<'a>(
        &'a self,
        region: &'a BeaconRegionDescriptor,
    ) -> BoxFuture<'a, Result<(), ProviderError>>;

    /// Stop ranging beacons matching the region.
    fn stop_ranging<'a>(
        &'a self,
        region: &'a BeaconRegionDescriptor,
    ) -> BoxFuture<'a, Result<(), ProviderError>>;

    /// Whether the platform can transmit as a beacon at all.
    fn advertising_capability(&self) -> BoxFuture<'_, Result<bool, ProviderError>>;

    /// Whether the device is currently advertising.
    fn is_advertising(&self) -> BoxFuture<'_, Result<bool, ProviderError>>;

    /// Start advertising as the given region identity.
    fn start_advertising<'a>(
        &'a self,
        region: &'a BeaconRegionDescriptor,
    ) -> BoxFuture<'a, Result<(), ProviderError>>;

    /// Stop advertising.
    fn stop_advertising(&self) -> BoxFuture<'_, Result<(), ProviderError>>;
}

#[cfg(any(test, feature = "mock-provider"))]
pub mod mock {
    //! In-memory provider double for tests.

    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::{Mutex, PoisonError};

    use futures::future::BoxFuture;
    use tokio::sync::mpsc::UnboundedSender;

    use super::{AuthorizationTier, BeaconProvider, ProviderError, ProviderEvent};
    use crate::region::BeaconRegionDescriptor;

    /// An intent the store issued through the provider boundary.
    #[derive(Debug, Clone, PartialEq, Eq)]
    pub enum RecordedIntent {
        /// `request_authorization` with the given tier.
        RequestAuthorization(AuthorizationTier),
        /// `start_monitoring` for the region identifier.
        StartMonitoring(String),
        /// `stop_monitoring` for the region identifier.
        StopMonitoring(String),
        /// `start_ranging` for the region identifier.
        StartRanging(String),
        /// `stop_ranging` for the region identifier.
        StopRanging(String),
        /// `advertising_capability` query.
        QueryAdvertisingCapability,
        /// `is_advertising` query.
        QueryIsAdvertising,
        /// `start_advertising` as the region identifier.
        StartAdvertising(String),
        /// `stop_advertising`.
        StopAdvertising,
    }

    /// Provider double: records intents, answers queries from configured
    /// values, and forwards injected events into the registered sink.
    pub struct MockProvider {
        sink: Mutex<Option<UnboundedSender<ProviderEvent>>>,
        intents: Mutex<Vec<RecordedIntent>>,
        advertising_capable: bool,
        advertising: AtomicBool,
        fail_intents: bool,
    }

    impl MockProvider {
        /// A provider that accepts every intent and can advertise.
        #[must_use]
        pub fn new() -> Self {
            Self::with_capability(true)
        }

        /// A provider with the given advertising capability.
        #[must_use]
        pub fn with_capability(advertising_capable: bool) -> Self {
            Self {
                sink: Mutex::new(None),
                intents: Mutex::new(Vec::new()),
                advertising_capable,
                advertising: AtomicBool::new(false),
                fail_intents: false,
            }
        }

        /// A provider that fails every intent and query.
        #[must_use]
        pub fn failing() -> Self {
            Self {
                sink: Mutex::new(None),
                intents: Mutex::new(Vec::new()),
                advertising_capable: true,
                advertising: AtomicBool::new(false),
                fail_intents: true,
            }
        }

        /// Deliver an event into the registered sink, as hardware would.
        pub fn emit(&self, event: ProviderEvent) {
            let sink = self.sink.lock().unwrap_or_else(PoisonError::into_inner);
            if let Some(sink) = sink.as_ref() {
                let _ = sink.send(event);
            }
        }

        /// Every intent issued so far, in order.
        #[must_use]
        pub fn intents(&self) -> Vec<RecordedIntent> {
            self.intents
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .clone()
        }

        fn record(&self, intent: RecordedIntent) {
            self.intents
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .push(intent);
        }

        fn outcome(&self, intent: &'static str) -> Result<(), ProviderError> {
            if self.fail_intents {
                Err(ProviderError::IntentRejected {
                    intent,
                    message: "mock provider configured to fail".to_string(),
                })
            } else {
                Ok(())
            }
        }
    }

    impl Default for MockProvider {
        fn default() -> Self {
            Self::new()
        }
    }

    impl BeaconProvider for MockProvider {
        fn set_event_sink(&self, sink: UnboundedSender<ProviderEvent>) {
            *self.sink.lock().unwrap_or_else(PoisonError::into_inner) = Some(sink);
        }

        fn request_authorization<'a>(
            &'a self,
            tier: AuthorizationTier,
        ) -> BoxFuture<'a, Result<(), ProviderError>> {
            Box::pin(async move {
                self.record(RecordedIntent::RequestAuthorization(tier));
                self.outcome("request_authorization")
            })
        }

        fn start_monitoring<'a>(
            &'a self,
            region: &'a BeaconRegionDescriptor,
        ) -> BoxFuture<'a, Result<(), ProviderError>> {
            Box::pin(async move {
                self.record(RecordedIntent::StartMonitoring(
                    region.identifier().to_string(),
                ));
                self.outcome("start_monitoring")
            })
        }

        fn stop_monitoring<'a>(
            &'a self,
            region: &'a BeaconRegionDescriptor,
        ) -> BoxFuture<'a, Result<(), ProviderError>> {
            Box::pin(async move {
                self.record(RecordedIntent::StopMonitoring(
                    region.identifier().to_string(),
                ));
                self.outcome("stop_monitoring")
            })
        }

        fn start_ranging<'a>(
            &'a self,
            region: &'a BeaconRegionDescriptor,
        ) -> BoxFuture<'a, Result<(), ProviderError>> {
            Box::pin(async move {
                self.record(RecordedIntent::StartRanging(
                    region.identifier().to_string(),
                ));
                self.outcome("start_ranging")
            })
        }

        fn stop_ranging<'a>(
            &'a self,
            region: &'a BeaconRegionDescriptor,
        ) -> BoxFuture<'a, Result<(), ProviderError>> {
            Box::pin(async move {
                self.record(RecordedIntent::StopRanging(
                    region.identifier().to_string(),
                ));
                self.outcome("stop_ranging")
            })
        }

        fn advertising_capability(&self) -> BoxFuture<'_, Result<bool, ProviderError>> {
            Box::pin(async move {
                self.record(RecordedIntent::QueryAdvertisingCapability);
                self.outcome("advertising_capability")?;
                Ok(self.advertising_capable)
            })
        }

        fn is_advertising(&self) -> BoxFuture<'_, Result<bool, ProviderError>> {
            Box::pin(async move {
                self.record(RecordedIntent::QueryIsAdvertising);
                self.outcome("is_advertising")?;
                Ok(self.advertising.load(Ordering::Acquire))
            })
        }

        fn start_advertising<'a>(
            &'a self,
            region: &'a BeaconRegionDescriptor,
        ) -> BoxFuture<'a, Result<(), ProviderError>> {
            Box::pin(async move {
                self.record(RecordedIntent::StartAdvertising(
                    region.identifier().to_string(),
                ));
                self.outcome("start_advertising")?;
                self.advertising.store(true, Ordering::Release);
                self.emit(ProviderEvent::AdvertisingStarted);
                self.emit(ProviderEvent::AdvertisingStateChanged { advertising: true });
                Ok(())
            })
        }

        fn stop_advertising(&self) -> BoxFuture<'_, Result<(), ProviderError>> {
            Box::pin(async move {
                self.record(RecordedIntent::StopAdvertising);
                self.outcome("stop_advertising")?;
                self.advertising.store(false, Ordering::Release);
                self.emit(ProviderEvent::AdvertisingStateChanged { advertising: false });
                Ok(())
            })
        }
    }
}
