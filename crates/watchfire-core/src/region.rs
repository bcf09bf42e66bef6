//! Beacon region identity and sensor value types.
//!
//! This module defines the data model shared by the rest of the crate:
//! - [`BeaconRegionDescriptor`] - the validated identity of a monitored region
//! - [`RegionMembership`] - tri-state inside/outside/unknown membership
//! - [`Proximity`] and [`BeaconReading`] - a single ranged beacon observation
//! - [`BeaconSnapshot`] - the current membership + readings value owned by a store

use std::hash::{Hash, Hasher};

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use thiserror::Error;

/// Errors raised while constructing a [`BeaconRegionDescriptor`].
///
/// These are construction-time contract violations: no descriptor (and thus
/// no store) is created when one is returned.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    /// The region identifier was empty.
    #[error("Region identifier cannot be empty")]
    EmptyIdentifier,

    /// The region proximity UUID was empty.
    #[error("Region proximity UUID cannot be empty")]
    EmptyUuid,

    /// A minor value was supplied without a major value.
    ///
    /// Beacon addressing is hierarchical: minor only has meaning within a
    /// major group.
    #[error("Region minor {minor} requires a major value")]
    MinorWithoutMajor {
        /// The minor value that was provided.
        minor: u16,
    },
}

/// Identity of a beacon region being monitored, ranged, or advertised.
///
/// Immutable after construction; [`BeaconRegionDescriptor::new`] is the only
/// way to obtain one, so every descriptor in circulation satisfies the
/// invariants (non-empty identifier and UUID, no minor without major).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BeaconRegionDescriptor {
    identifier: String,
    uuid: String,
    major: Option<u16>,
    minor: Option<u16>,
}

impl BeaconRegionDescriptor {
    /// Build a validated descriptor.
    ///
    /// # Errors
    ///
    /// Returns a [`ValidationError`] if `identifier` or `uuid` is empty, or
    /// if `minor` is present without `major`.
    pub fn new(
        identifier: impl Into<String>,
        uuid: impl Into<String>,
        major: Option<u16>,
        minor: Option<u16>,
    ) -> Result<Self, ValidationError> {
        let identifier = identifier.into();
        let uuid = uuid.into();

        if identifier.is_empty() {
            return Err(ValidationError::EmptyIdentifier);
        }
        if uuid.is_empty() {
            return Err(ValidationError::EmptyUuid);
        }
        if let (None, Some(minor)) = (major, minor) {
            return Err(ValidationError::MinorWithoutMajor { minor });
        }

        Ok(Self {
            identifier,
            uuid,
            major,
            minor,
        })
    }

    /// The caller-chosen region identifier.
    #[must_use]
    pub fn identifier(&self) -> &str {
        &self.identifier
    }

    /// The proximity UUID the region matches on.
    #[must_use]
    pub fn uuid(&self) -> &str {
        &self.uuid
    }

    /// The major group, if the region is narrowed to one.
    #[must_use]
    pub const fn major(&self) -> Option<u16> {
        self.major
    }

    /// The minor value, if the region is narrowed to a single beacon.
    #[must_use]
    pub const fn minor(&self) -> Option<u16> {
        self.minor
    }
}

/// Whether the device is currently inside the monitored region.
///
/// `Unknown` is a distinct state, not a stand-in for either answer: a store
/// starts out `Unknown` and returns to it whenever the provider reports an
/// unrecognized membership value.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RegionMembership {
    /// Membership has not been determined yet (or was reported unrecognizably).
    #[default]
    Unknown,
    /// The device is inside the region.
    Inside,
    /// The device is outside the region.
    Outside,
}

impl RegionMembership {
    /// Map a raw provider membership string onto the tri-state.
    ///
    /// Anything other than the two recognized in/out values (including the
    /// provider's explicit unknown) maps to `Unknown`. This is defined
    /// behavior, never an error.
    #[must_use]
    pub fn from_raw(raw: &str) -> Self {
        match raw {
            "CLRegionStateInside" => Self::Inside,
            "CLRegionStateOutside" => Self::Outside,
            _ => Self::Unknown,
        }
    }
}

/// Coarse distance estimate reported for a ranged beacon.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Proximity {
    /// Within centimeters of the device.
    Immediate,
    /// Within a couple of meters.
    Near,
    /// Detected, but far away.
    Far,
    /// The provider could not estimate a distance.
    Unknown,
}

impl Proximity {
    /// Map a raw provider proximity string onto the enum.
    ///
    /// Unrecognized strings map to `Unknown`.
    #[must_use]
    pub fn from_raw(raw: &str) -> Self {
        match raw {
            "ProximityImmediate" => Self::Immediate,
            "ProximityNear" => Self::Near,
            "ProximityFar" => Self::Far,
            _ => Self::Unknown,
        }
    }
}

/// One ranged beacon observation.
///
/// A reading has no identity beyond its field values: two readings are equal
/// exactly when every field matches. `accuracy` takes part in equality
/// bitwise, which lets readings live in hash sets for the change detector's
/// set-difference comparison.
#[derive(Debug, Clone, Serialize)]
pub struct BeaconReading {
    /// Proximity UUID the beacon advertised.
    pub uuid: String,
    /// Major group value.
    pub major: u16,
    /// Minor value within the major group.
    pub minor: u16,
    /// Coarse distance bucket.
    pub proximity: Proximity,
    /// Estimated distance in meters; `None` when the provider reported the
    /// negative "unknown" sentinel.
    pub accuracy: Option<f64>,
    /// Received signal strength in dBm.
    pub rssi: i16,
}

impl PartialEq for BeaconReading {
    fn eq(&self, other: &Self) -> bool {
        self.uuid == other.uuid
            && self.major == other.major
            && self.minor == other.minor
            && self.proximity == other.proximity
            && self.accuracy.map(f64::to_bits) == other.accuracy.map(f64::to_bits)
            && self.rssi == other.rssi
    }
}

impl Eq for BeaconReading {}

impl Hash for BeaconReading {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.uuid.hash(state);
        self.major.hash(state);
        self.minor.hash(state);
        self.proximity.hash(state);
        self.accuracy.map(f64::to_bits).hash(state);
        self.rssi.hash(state);
    }
}

/// The current known sensor state for one region.
///
/// A store owns exactly one snapshot at a time and replaces it wholesale on
/// every accepted change, so a snapshot handed out to a reader never mutates
/// underneath them.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BeaconSnapshot {
    /// Latest known region membership.
    pub membership: RegionMembership,
    /// Latest ranged beacon list, in provider delivery order.
    pub readings: Vec<BeaconReading>,
}

static BEACON_UUID_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[0-9A-Fa-f]{8}-[0-9A-Fa-f]{4}-[0-9A-Fa-f]{4}-[0-9A-Fa-f]{4}-[0-9A-Fa-f]{12}$")
        .expect("beacon uuid regex is valid")
});

/// Check whether a string is a canonically formatted proximity UUID.
///
/// Descriptor validation deliberately does not require this (providers accept
/// arbitrary identifiers); adapters that want stricter input checking can
/// call it before building a descriptor.
#[must_use]
pub fn is_valid_beacon_uuid(uuid: &str) -> bool {
    BEACON_UUID_RE.is_match(uuid)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reading(minor: u16, proximity: Proximity) -> BeaconReading {
        BeaconReading {
            uuid: "F7826DA6-4FA2-4E98-8024-BC5B71E0893E".to_string(),
            major: 22728,
            minor,
            proximity,
            accuracy: Some(0.12),
            rssi: -65,
        }
    }

    #[test]
    fn test_descriptor_accepts_minimal_identity() {
        let descriptor = BeaconRegionDescriptor::new("123", "123", None, None).unwrap();
        assert_eq!(descriptor.identifier(), "123");
        assert_eq!(descriptor.uuid(), "123");
        assert_eq!(descriptor.major(), None);
        assert_eq!(descriptor.minor(), None);
    }

    #[test]
    fn test_descriptor_accepts_full_identity() {
        let descriptor =
            BeaconRegionDescriptor::new("door", "F7826DA6", Some(22728), Some(13911)).unwrap();
        assert_eq!(descriptor.major(), Some(22728));
        assert_eq!(descriptor.minor(), Some(13911));
    }

    #[test]
    fn test_descriptor_rejects_empty_identifier() {
        let err = BeaconRegionDescriptor::new("", "123", None, None).unwrap_err();
        assert_eq!(err, ValidationError::EmptyIdentifier);
    }

    #[test]
    fn test_descriptor_rejects_empty_uuid() {
        let err = BeaconRegionDescriptor::new("123", "", None, None).unwrap_err();
        assert_eq!(err, ValidationError::EmptyUuid);
    }

    #[test]
    fn test_descriptor_rejects_minor_without_major() {
        let err = BeaconRegionDescriptor::new("123", "123", None, Some(7)).unwrap_err();
        assert_eq!(err, ValidationError::MinorWithoutMajor { minor: 7 });
    }

    #[test]
    fn test_descriptor_accepts_major_without_minor() {
        assert!(BeaconRegionDescriptor::new("123", "123", Some(1), None).is_ok());
    }

    #[test]
    fn test_membership_from_raw_recognized_values() {
        assert_eq!(
            RegionMembership::from_raw("CLRegionStateInside"),
            RegionMembership::Inside
        );
        assert_eq!(
            RegionMembership::from_raw("CLRegionStateOutside"),
            RegionMembership::Outside
        );
        assert_eq!(
            RegionMembership::from_raw("CLRegionStateUnknown"),
            RegionMembership::Unknown
        );
    }

    #[test]
    fn test_membership_from_raw_unrecognized_maps_to_unknown() {
        assert_eq!(
            RegionMembership::from_raw("invalid"),
            RegionMembership::Unknown
        );
        assert_eq!(RegionMembership::from_raw(""), RegionMembership::Unknown);
    }

    #[test]
    fn test_proximity_from_raw() {
        assert_eq!(
            Proximity::from_raw("ProximityImmediate"),
            Proximity::Immediate
        );
        assert_eq!(Proximity::from_raw("ProximityNear"), Proximity::Near);
        assert_eq!(Proximity::from_raw("ProximityFar"), Proximity::Far);
        assert_eq!(Proximity::from_raw("ProximityUnknown"), Proximity::Unknown);
        assert_eq!(Proximity::from_raw("something else"), Proximity::Unknown);
    }

    #[test]
    fn test_reading_equality_is_structural() {
        assert_eq!(
            reading(13911, Proximity::Immediate),
            reading(13911, Proximity::Immediate)
        );
    }

    #[test]
    fn test_reading_equality_covers_every_field() {
        let base = reading(13912, Proximity::Near);

        let mut shifted = base.clone();
        shifted.proximity = Proximity::Far;
        assert_ne!(base, shifted);

        let mut shifted = base.clone();
        shifted.accuracy = Some(0.13);
        assert_ne!(base, shifted);

        let mut shifted = base.clone();
        shifted.rssi = -66;
        assert_ne!(base, shifted);

        let mut shifted = base.clone();
        shifted.accuracy = None;
        assert_ne!(base, shifted);
    }

    #[test]
    fn test_snapshot_starts_unknown_and_empty() {
        let snapshot = BeaconSnapshot::default();
        assert_eq!(snapshot.membership, RegionMembership::Unknown);
        assert!(snapshot.readings.is_empty());
    }

    #[test]
    fn test_is_valid_beacon_uuid() {
        assert!(is_valid_beacon_uuid("F7826DA6-4FA2-4E98-8024-BC5B71E0893E"));
        assert!(is_valid_beacon_uuid("f7826da6-4fa2-4e98-8024-bc5b71e0893e"));
        assert!(!is_valid_beacon_uuid("123"));
        assert!(!is_valid_beacon_uuid(""));
        assert!(!is_valid_beacon_uuid("F7826DA6-4FA2-4E98-8024"));
    }
}
