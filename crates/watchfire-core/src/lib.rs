//! # watchfire-core
//!
//! Core reactive store for the watchfire beacon region tracking system.
//!
//! This crate provides:
//! - A change-only view over noisy beacon hardware callbacks
//! - Region membership tracking (inside/outside/unknown) and ranged beacon lists
//! - An observer protocol with "read, then get notified once" semantics
//! - An advertising control surface with best-effort error policy
//!
//! ## Architecture
//!
//! The crate is organized into the following modules:
//!
//! - [`region`] - Region identity and sensor value types
//! - [`diff`] - Change detection between successive sensor states
//! - [`store`] - The reactive region store and its event pump
//! - [`observer`] - Observer registry and subscription handles
//! - [`provider`] - The external beacon-sensing provider boundary
//! - [`config`] - Store option loading
//! - [`error`] - Unified error types for the crate
//!
//! ## Usage
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use watchfire_core::{BeaconRegionDescriptor, RegionOptions, RegionStore};
//!
//! let descriptor = BeaconRegionDescriptor::new(
//!     "entrance",
//!     "F7826DA6-4FA2-4E98-8024-BC5B71E0893E",
//!     None,
//!     None,
//! )?;
//! let store = RegionStore::new(descriptor, RegionOptions::default(), provider).await;
//!
//! let mut subscription = store.subscribe();
//! let snapshot = subscription.read();
//! while subscription.changed().await {
//!     let snapshot = subscription.read();
//!     println!("membership: {:?}", snapshot.membership);
//! }
//! ```

#![forbid(unsafe_code)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![warn(missing_docs)]

pub mod config;
pub mod diff;
pub mod error;
pub mod observer;
pub mod provider;
pub mod region;
pub mod store;

// Re-export primary types for convenience
pub use config::{ConfigError, RegionOptions};
pub use diff::{membership_changed, readings_changed};
pub use error::{Result, WatchfireError};
pub use observer::{Subscription, SubscriptionId};
#[cfg(any(test, feature = "mock-provider"))]
pub use provider::mock::MockProvider;
pub use provider::{
    readings_from_json, AuthorizationTier, BeaconProvider, ProviderError, ProviderEvent,
    RawBeaconReading, RawInt,
};
pub use region::{
    is_valid_beacon_uuid, BeaconReading, BeaconRegionDescriptor, BeaconSnapshot, Proximity,
    RegionMembership, ValidationError,
};
pub use store::RegionStore;
