//! Unified error types for the watchfire core library.
//!
//! Each module defines its own specific error type ([`ValidationError`],
//! [`ProviderError`], [`ConfigError`]); this module provides the unified
//! [`WatchfireError`] that public construction surfaces return.
//!
//! Note the propagation policy: only construction-time contract violations
//! surface as errors. Run-time provider failures are absorbed at the
//! provider boundary (logged, never returned), so [`ProviderError`] appears
//! here for completeness but is never produced by a store operation.

use thiserror::Error;

use crate::config::ConfigError;
use crate::provider::ProviderError;
use crate::region::ValidationError;

/// The unified error type for watchfire operations.
#[derive(Debug, Error)]
pub enum WatchfireError {
    /// A malformed region identity or option set was rejected at
    /// construction. Fatal: no value is created.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// An options file could not be read or parsed.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// A provider failure that crossed the boundary. Stores never return
    /// this; it exists for adapters that want to reuse the unified type.
    #[error(transparent)]
    Provider(#[from] ProviderError),
}

/// A specialized [`Result`] type for watchfire operations.
pub type Result<T> = std::result::Result<T, WatchfireError>;

impl WatchfireError {
    /// Returns `true` if this error is a construction-time validation
    /// failure.
    #[inline]
    #[must_use]
    pub const fn is_validation_error(&self) -> bool {
        matches!(self, Self::Validation(_))
    }

    /// Returns `true` if this error came from loading options from disk.
    #[inline]
    #[must_use]
    pub const fn is_config_error(&self) -> bool {
        matches!(self, Self::Config(_))
    }

    /// Returns `true` if this error came from the sensing provider.
    #[inline]
    #[must_use]
    pub const fn is_provider_error(&self) -> bool {
        matches!(self, Self::Provider(_))
    }

    /// Returns a machine-readable code for diagnostics.
    #[inline]
    #[must_use]
    pub const fn error_code(&self) -> &'static str {
        match self {
            Self::Validation(_) => "VALIDATION_ERROR",
            Self::Config(_) => "CONFIG_ERROR",
            Self::Provider(_) => "PROVIDER_ERROR",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classification() {
        let err = WatchfireError::from(ValidationError::EmptyIdentifier);
        assert!(err.is_validation_error());
        assert!(!err.is_config_error());
        assert!(!err.is_provider_error());

        let err = WatchfireError::from(ProviderError::Unavailable("radio off".into()));
        assert!(err.is_provider_error());
        assert!(!err.is_validation_error());
    }

    #[test]
    fn test_error_codes() {
        assert_eq!(
            WatchfireError::from(ValidationError::EmptyUuid).error_code(),
            "VALIDATION_ERROR"
        );
        assert_eq!(
            WatchfireError::from(ProviderError::Unavailable("x".into())).error_code(),
            "PROVIDER_ERROR"
        );
    }

    #[test]
    fn test_display_passes_through_module_errors() {
        let err = WatchfireError::from(ValidationError::MinorWithoutMajor { minor: 7 });
        assert!(format!("{err}").contains("requires a major value"));
    }

    #[test]
    fn test_error_is_send_and_sync() {
        fn assert_send<T: Send>() {}
        fn assert_sync<T: Sync>() {}

        assert_send::<WatchfireError>();
        assert_sync::<WatchfireError>();
    }
}
