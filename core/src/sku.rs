//! SKU identification and versioning types.
//!
//! This module defines strong types for stock record identification (`SkuId`),
//! reservation holder naming (`HolderId`), and the version counter used for
//! optimistic concurrency control (`Version`).

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Error type for `SkuId` parsing.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Invalid SKU id: {0}")]
pub struct ParseSkuIdError(String);

/// Unique identifier for a stock-keeping unit.
///
/// A SKU id uniquely identifies a single sellable unit, and therefore a single
/// `StockRecord`. For example:
/// - `"SKU-TSHIRT-RED-M"`
/// - `"9781861972712"`
///
/// # Validation
///
/// - `FromStr::from_str()`: Validates input (rejects empty strings)
/// - `From::from()` and `new()`: No validation (for internal use with trusted input)
///
/// Use `FromStr` when parsing external/user input. Use `new()` or `From` when
/// constructing SKU ids from application-controlled data.
///
/// # Examples
///
/// ```
/// use holdfast_core::sku::SkuId;
///
/// let sku = SkuId::new("SKU-1001");
/// assert_eq!(sku.as_str(), "SKU-1001");
///
/// let parsed: SkuId = "SKU-1002".parse().unwrap();
/// assert_eq!(parsed, SkuId::new("SKU-1002"));
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SkuId(String);

impl SkuId {
    /// Create a new `SkuId` from a string.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Get the SKU id as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Convert the `SkuId` into its inner `String`.
    #[must_use]
    pub fn into_inner(self) -> String {
        self.0
    }
}

impl fmt::Display for SkuId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for SkuId {
    type Err = ParseSkuIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.is_empty() {
            return Err(ParseSkuIdError("SKU id cannot be empty".to_string()));
        }
        Ok(Self(s.to_string()))
    }
}

impl From<String> for SkuId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for SkuId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl AsRef<str> for SkuId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Caller-supplied identifier naming the party performing an operation.
///
/// Typically an order id or cart id. The reservation subsystem treats it as
/// opaque: it names the current holder of a `LeaseLock` and shows up in logs,
/// nothing more.
///
/// # Examples
///
/// ```
/// use holdfast_core::sku::HolderId;
///
/// let holder = HolderId::new("order-8842");
/// assert_eq!(holder.as_str(), "order-8842");
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct HolderId(String);

impl HolderId {
    /// Create a new `HolderId` from a string.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Get the holder id as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for HolderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for HolderId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for HolderId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Stock record version number for optimistic concurrency control.
///
/// Versions start at 0 when a `StockRecord` is created and increase by exactly
/// 1 on every successful mutation. The version number is used to detect
/// concurrent modifications:
///
/// - A writer reads the record at version V and applies its transition
/// - The write back is conditioned on "version still equals V"
/// - If the condition fails, another writer committed first and the whole
///   attempt is discarded and retried from a fresh read
///
/// # Examples
///
/// ```
/// use holdfast_core::sku::Version;
///
/// let v0 = Version::INITIAL;
/// let v1 = v0.next();
/// assert_eq!(v1, Version::new(1));
/// ```
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Version(u64);

impl Version {
    /// The initial version (0) for a newly created stock record.
    pub const INITIAL: Self = Self(0);

    /// Create a new `Version` with the given value.
    #[must_use]
    pub const fn new(value: u64) -> Self {
        Self(value)
    }

    /// Get the version number.
    #[must_use]
    pub const fn value(self) -> u64 {
        self.0
    }

    /// Get the next version (current + 1).
    ///
    /// # Overflow Behavior
    ///
    /// Reaching `u64::MAX` commits on a single stock record is not a realistic
    /// concern, so plain addition is used.
    #[must_use]
    pub const fn next(self) -> Self {
        Self(self.0 + 1)
    }

    /// Check if this is the initial version (0).
    #[must_use]
    pub const fn is_initial(self) -> bool {
        self.0 == 0
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for Version {
    fn from(value: u64) -> Self {
        Self(value)
    }
}

impl From<Version> for u64 {
    fn from(version: Version) -> Self {
        version.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    mod sku_id_tests {
        use super::*;

        #[test]
        fn new_creates_sku_id() {
            let sku = SkuId::new("SKU-1001");
            assert_eq!(sku.as_str(), "SKU-1001");
        }

        #[test]
        #[allow(clippy::expect_used)] // Panics: Test will fail if parse fails
        fn parse_from_str() {
            let sku: SkuId = "SKU-1001".parse().expect("parse should succeed");
            assert_eq!(sku, SkuId::new("SKU-1001"));
        }

        #[test]
        fn parse_empty_string_fails() {
            let result = "".parse::<SkuId>();
            assert!(result.is_err());
        }

        #[test]
        fn display() {
            let sku = SkuId::new("SKU-1001");
            assert_eq!(format!("{sku}"), "SKU-1001");
        }

        #[test]
        fn equality() {
            assert_eq!(SkuId::new("a"), SkuId::new("a"));
            assert_ne!(SkuId::new("a"), SkuId::new("b"));
        }
    }

    mod version_tests {
        use super::*;

        #[test]
        fn initial_is_zero() {
            assert_eq!(Version::INITIAL.value(), 0);
            assert!(Version::INITIAL.is_initial());
        }

        #[test]
        fn next_increments_by_one() {
            let v = Version::new(41);
            assert_eq!(v.next(), Version::new(42));
            assert!(!v.next().is_initial());
        }

        #[test]
        fn ordering() {
            assert!(Version::new(1) < Version::new(2));
        }
    }

    mod holder_id_tests {
        use super::*;

        #[test]
        fn from_str_slice() {
            let holder = HolderId::from("order-1");
            assert_eq!(holder.as_str(), "order-1");
            assert_eq!(format!("{holder}"), "order-1");
        }
    }
}
