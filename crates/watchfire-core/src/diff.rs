//! Change detection between successive sensor states.
//!
//! Pure comparison logic with no side effects; the store calls into this
//! module to decide whether an incoming provider event is a real change or a
//! no-op repeat.

use std::collections::HashSet;

use crate::region::{BeaconReading, RegionMembership};

/// Whether the region membership value has changed.
///
/// `Unknown` is its own state, so `Unknown -> Inside` and `Inside -> Unknown`
/// both count as changes.
#[must_use]
pub fn membership_changed(old: RegionMembership, new: RegionMembership) -> bool {
    old != new
}

/// Whether a newly ranged beacon list differs from the current one.
///
/// Two lists are considered equal only when every reading value in one
/// appears with the same structural shape in the other: the lists differ if
/// their lengths differ, or if deduplicating the concatenation of both lists
/// yields a count other than the old list's length. Delivery order does not
/// participate in the comparison.
#[must_use]
pub fn readings_changed(old: &[BeaconReading], new: &[BeaconReading]) -> bool {
    if old.len() != new.len() {
        return true;
    }

    let distinct: HashSet<&BeaconReading> = old.iter().chain(new.iter()).collect();
    distinct.len() != old.len()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::region::Proximity;

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
    fn test_membership_changed() {
        assert!(membership_changed(
            RegionMembership::Unknown,
            RegionMembership::Inside
        ));
        assert!(membership_changed(
            RegionMembership::Inside,
            RegionMembership::Outside
        ));
        assert!(membership_changed(
            RegionMembership::Outside,
            RegionMembership::Unknown
        ));
        assert!(!membership_changed(
            RegionMembership::Inside,
            RegionMembership::Inside
        ));
        assert!(!membership_changed(
            RegionMembership::Unknown,
            RegionMembership::Unknown
        ));
    }

    #[test]
    fn test_identical_lists_are_unchanged() {
        let old = vec![
            reading(13911, Proximity::Immediate),
            reading(13912, Proximity::Near),
        ];
        let new = old.clone();
        assert!(!readings_changed(&old, &new));
    }

    #[test]
    fn test_empty_versus_empty_is_unchanged() {
        assert!(!readings_changed(&[], &[]));
    }

    #[test]
    fn test_empty_versus_non_empty_is_changed() {
        let new = vec![reading(13911, Proximity::Immediate)];
        assert!(readings_changed(&[], &new));
        assert!(readings_changed(&new, &[]));
    }

    #[test]
    fn test_single_field_difference_is_changed() {
        let old = vec![
            reading(13911, Proximity::Immediate),
            reading(13912, Proximity::Near),
        ];
        let new = vec![
            reading(13911, Proximity::Immediate),
            reading(13912, Proximity::Far),
        ];
        assert!(readings_changed(&old, &new));
    }

    #[test]
    fn test_superset_is_changed() {
        let old = vec![
            reading(13911, Proximity::Immediate),
            reading(13912, Proximity::Near),
        ];
        let mut new = old.clone();
        new.push(reading(13913, Proximity::Near));
        assert!(readings_changed(&old, &new));
    }

    #[test]
    fn test_duplicated_existing_reading_is_changed() {
        // Same beacon delivered twice: length grows, so this counts as a change.
        let old = vec![
            reading(13911, Proximity::Immediate),
            reading(13912, Proximity::Near),
        ];
        let mut new = old.clone();
        new.push(reading(13912, Proximity::Near));
        assert!(readings_changed(&old, &new));
    }

    #[test]
    fn test_reordered_lists_are_unchanged() {
        let old = vec![
            reading(13911, Proximity::Immediate),
            reading(13912, Proximity::Near),
        ];
        let new = vec![
            reading(13912, Proximity::Near),
            reading(13911, Proximity::Immediate),
        ];
        assert!(!readings_changed(&old, &new));
    }
}
