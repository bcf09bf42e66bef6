//! The reactive region store.
//!
//! [`RegionStore`] is the single authoritative holder of a
//! [`BeaconSnapshot`] for one region. It consumes normalized provider
//! events, runs them through the change detector, and notifies armed
//! subscribers exactly once per accepted change. Provider failures never
//! escape a store operation; they are logged and the prior snapshot stays in
//! place.

use std::sync::{Arc, Mutex, PoisonError, RwLock};

use tokio::sync::mpsc::{self, UnboundedReceiver};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::config::RegionOptions;
use crate::diff;
use crate::error::Result;
use crate::observer::{ObserverRegistry, Subscription};
use crate::provider::{AuthorizationTier, BeaconProvider, ProviderEvent, RawBeaconReading};
use crate::region::{BeaconRegionDescriptor, BeaconSnapshot, RegionMembership};

/// Callbacks registered by [`RegionStore::start_advertising`], invoked from
/// the event pump when the provider reports advertising lifecycle events.
struct AdvertisingHooks {
    on_started: Option<Box<dyn FnOnce() + Send>>,
    on_state_changed: Arc<dyn Fn(bool) + Send + Sync>,
}

type SnapshotCell = Arc<RwLock<Arc<BeaconSnapshot>>>;
type HooksCell = Arc<Mutex<Option<AdvertisingHooks>>>;

/// Reactive store for one beacon region.
///
/// Construction subscribes to the provider's event feed, requests location
/// authorization (`Always` when monitoring is enabled, `WhenInUse`
/// otherwise), and issues the start-ranging/start-monitoring intents
/// according to the enable flags. Every intent failure is logged and
/// swallowed: a store whose provider is broken simply stays at its initial
/// Unknown/empty snapshot.
///
/// Must be constructed inside a Tokio runtime; the store runs an event pump
/// task that lives until the store is dropped.
pub struct RegionStore {
    descriptor: BeaconRegionDescriptor,
    options: RegionOptions,
    provider: Arc<dyn BeaconProvider>,
    snapshot: SnapshotCell,
    observers: Arc<ObserverRegistry>,
    hooks: HooksCell,
    pump: JoinHandle<()>,
}

impl RegionStore {
    /// Create a store for `descriptor` and start the configured provider
    /// services.
    ///
    /// The snapshot starts as `Unknown` membership with no readings.
    /// Descriptor invariants are guaranteed by
    /// [`BeaconRegionDescriptor::new`], which is the construction-time
    /// validation site.
    pub async fn new(
        descriptor: BeaconRegionDescriptor,
        options: RegionOptions,
        provider: Arc<dyn BeaconProvider>,
    ) -> Self {
        let snapshot: SnapshotCell = Arc::new(RwLock::new(Arc::new(BeaconSnapshot::default())));
        let observers = Arc::new(ObserverRegistry::new());
        let hooks: HooksCell = Arc::new(Mutex::new(None));

        let (sink, events) = mpsc::unbounded_channel();
        provider.set_event_sink(sink);

        let pump = tokio::spawn(pump_events(
            events,
            Arc::clone(&snapshot),
            Arc::clone(&observers),
            Arc::clone(&hooks),
            descriptor.identifier().to_string(),
        ));

        // Monitoring needs background location access; ranging alone does not.
        let tier = if options.monitoring_enabled {
            AuthorizationTier::Always
        } else {
            AuthorizationTier::WhenInUse
        };
        if let Err(err) = provider.request_authorization(tier).await {
            error!(region = %descriptor.identifier(), error = %err, "location authorization request failed");
        }

        if options.ranging_enabled {
            if let Err(err) = provider.start_ranging(&descriptor).await {
                error!(region = %descriptor.identifier(), error = %err, "failed to start ranging");
            }
        }

        if options.monitoring_enabled {
            if let Err(err) = provider.start_monitoring(&descriptor).await {
                error!(region = %descriptor.identifier(), error = %err, "failed to start monitoring");
            }
        }

        Self {
            descriptor,
            options,
            provider,
            snapshot,
            observers,
            hooks,
            pump,
        }
    }

    /// The region this store tracks.
    #[must_use]
    pub const fn descriptor(&self) -> &BeaconRegionDescriptor {
        &self.descriptor
    }

    /// The enable flags this store was constructed with.
    #[must_use]
    pub const fn options(&self) -> RegionOptions {
        self.options
    }

    /// Register a new observer of this store's snapshot.
    ///
    /// The returned handle is unarmed: call [`Subscription::read`] to get
    /// the current snapshot and become eligible for the next change
    /// notification.
    #[must_use]
    pub fn subscribe(&self) -> Subscription {
        Subscription::new(Arc::clone(&self.observers), Arc::clone(&self.snapshot))
    }

    /// The current snapshot, without establishing a subscription.
    #[must_use]
    pub fn snapshot(&self) -> Arc<BeaconSnapshot> {
        let guard = self
            .snapshot
            .read()
            .unwrap_or_else(PoisonError::into_inner);
        Arc::clone(&guard)
    }

    /// Apply a raw membership state reported by the provider.
    ///
    /// Unrecognized values map to `Unknown`; that is defined behavior, not
    /// an error. A value equal to the current membership is a no-op and
    /// fires no notification.
    pub fn apply_membership_event(&self, raw: &str) {
        apply_membership(
            &self.snapshot,
            &self.observers,
            self.descriptor.identifier(),
            raw,
        );
    }

    /// Apply a raw ranging result reported by the provider.
    ///
    /// Readings are normalized first (numeric-string major/minor coercion);
    /// a batch structurally equal to the current readings is a no-op.
    pub fn apply_ranging_event(&self, raw: Vec<RawBeaconReading>) {
        apply_ranging(
            &self.snapshot,
            &self.observers,
            self.descriptor.identifier(),
            raw,
        );
    }

    /// Ask the provider whether this platform can transmit as a beacon.
    ///
    /// Fire-and-forget: the answer is delivered to `on_result`; a provider
    /// failure is logged and the callback is never invoked.
    pub fn request_advertising_capability<F>(&self, on_result: F)
    where
        F: FnOnce(bool) + Send + 'static,
    {
        let provider = Arc::clone(&self.provider);
        tokio::spawn(async move {
            match provider.advertising_capability().await {
                Ok(capable) => on_result(capable),
                Err(err) => error!(error = %err, "advertising capability query failed"),
            }
        });
    }

    /// Ask the provider whether the device is currently advertising.
    ///
    /// Same fire-and-forget shape as
    /// [`request_advertising_capability`](Self::request_advertising_capability).
    pub fn request_is_advertising<F>(&self, on_result: F)
    where
        F: FnOnce(bool) + Send + 'static,
    {
        let provider = Arc::clone(&self.provider);
        tokio::spawn(async move {
            match provider.is_advertising().await {
                Ok(advertising) => on_result(advertising),
                Err(err) => error!(error = %err, "advertising status query failed"),
            }
        });
    }

    /// Start advertising as the given beacon identity.
    ///
    /// Best-effort: the capability is checked first, and an unsupported
    /// platform only logs - the call still returns `Ok` and no callback
    /// fires. `on_started` runs once when the provider reports advertising
    /// has started; `on_state_changed` runs on every advertising state
    /// transition until [`stop_advertising`](Self::stop_advertising).
    ///
    /// # Errors
    ///
    /// Returns a validation error when the transmit identity itself is
    /// malformed (empty uuid/identifier, minor without major).
    pub fn start_advertising<F, G>(
        &self,
        uuid: impl Into<String>,
        identifier: impl Into<String>,
        major: Option<u16>,
        minor: Option<u16>,
        on_started: F,
        on_state_changed: G,
    ) -> Result<()>
    where
        F: FnOnce() + Send + 'static,
        G: Fn(bool) + Send + Sync + 'static,
    {
        let transmit = BeaconRegionDescriptor::new(identifier, uuid, major, minor)?;

        let provider = Arc::clone(&self.provider);
        let hooks = Arc::clone(&self.hooks);
        tokio::spawn(async move {
            match provider.advertising_capability().await {
                Ok(true) => {
                    {
                        let mut guard = hooks.lock().unwrap_or_else(PoisonError::into_inner);
                        *guard = Some(AdvertisingHooks {
                            on_started: Some(Box::new(on_started)),
                            on_state_changed: Arc::new(on_state_changed),
                        });
                    }
                    if let Err(err) = provider.start_advertising(&transmit).await {
                        error!(region = %transmit.identifier(), error = %err, "failed to start advertising");
                    }
                }
                Ok(false) => {
                    info!(region = %transmit.identifier(), "advertising is not supported on this platform");
                }
                Err(err) => {
                    error!(error = %err, "advertising capability query failed");
                }
            }
        });

        Ok(())
    }

    /// Stop advertising and clear the registered lifecycle callbacks.
    ///
    /// Failures are logged, never returned.
    pub fn stop_advertising(&self) {
        self.hooks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();

        let provider = Arc::clone(&self.provider);
        tokio::spawn(async move {
            if let Err(err) = provider.stop_advertising().await {
                error!(error = %err, "failed to stop advertising");
            }
        });
    }
}

impl Drop for RegionStore {
    fn drop(&mut self) {
        self.pump.abort();
        // Dropping the notification senders lets pending `changed()` calls
        // resolve as torn-down instead of hanging.
        self.observers.clear();
    }
}

fn apply_membership(
    snapshot: &SnapshotCell,
    observers: &ObserverRegistry,
    region: &str,
    raw: &str,
) {
    let mapped = RegionMembership::from_raw(raw);

    let mut guard = snapshot.write().unwrap_or_else(PoisonError::into_inner);
    if !diff::membership_changed(guard.membership, mapped) {
        return;
    }
    let next = BeaconSnapshot {
        membership: mapped,
        readings: guard.readings.clone(),
    };
    *guard = Arc::new(next);
    drop(guard);

    debug!(%region, membership = ?mapped, "region membership changed");
    observers.notify_armed();
}

fn apply_ranging(
    snapshot: &SnapshotCell,
    observers: &ObserverRegistry,
    region: &str,
    raw: Vec<RawBeaconReading>,
) {
    let mut readings = Vec::with_capacity(raw.len());
    for reading in raw {
        match reading.normalize() {
            Some(normalized) => readings.push(normalized),
            None => {
                warn!(%region, uuid = %reading.uuid, "dropping beacon reading with uncoercible major/minor");
            }
        }
    }

    let mut guard = snapshot.write().unwrap_or_else(PoisonError::into_inner);
    if !diff::readings_changed(&guard.readings, &readings) {
        return;
    }
    let next = BeaconSnapshot {
        membership: guard.membership,
        readings,
    };
    *guard = Arc::new(next);
    drop(guard);

    debug!(%region, "ranged beacon set changed");
    observers.notify_armed();
}

async fn pump_events(
    mut events: UnboundedReceiver<ProviderEvent>,
    snapshot: SnapshotCell,
    observers: Arc<ObserverRegistry>,
    hooks: HooksCell,
    region: String,
) {
    while let Some(event) = events.recv().await {
        match event {
            ProviderEvent::RegionState { raw } => {
                apply_membership(&snapshot, &observers, &region, &raw);
            }
            ProviderEvent::Ranged { readings } => {
                apply_ranging(&snapshot, &observers, &region, readings);
            }
            ProviderEvent::MonitoringStarted { raw } => {
                info!(%region, payload = %raw, "monitoring started");
            }
            ProviderEvent::AdvertisingStarted => {
                let started = hooks
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .as_mut()
                    .and_then(|h| h.on_started.take());
                if let Some(on_started) = started {
                    on_started();
                }
            }
            ProviderEvent::AdvertisingStateChanged { advertising } => {
                // Clone the handler out so user code never runs under the lock.
                let handler = hooks
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .as_ref()
                    .map(|h| Arc::clone(&h.on_state_changed));
                if let Some(on_state_changed) = handler {
                    on_state_changed(advertising);
                }
            }
        }
    }
}
