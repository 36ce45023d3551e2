//! # Delivery Fees
//!
//! Great-circle distance from the hub and the travel fee derived from it.
//!
//! ## Calculation
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  hub (lat, lng) ──┐                                                     │
//! │                   ├──► haversine (R = 6371 km) ──► 16.0873... km       │
//! │  dest (lat, lng) ─┘                                    │                │
//! │                                                        ▼                │
//! │                                       round to 0.1 km: 16.1 km         │
//! │                                       (stored as 161 tenths)           │
//! │                                                        │                │
//! │                                                        ▼                │
//! │             fee = BASE + PER_KM × 16.1 = R20.00 + R112.70 = R132.70    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The rounded distance is what gets stored, displayed and charged, so any
//! order's fee can be recomputed exactly from its stored distance.
//!
//! When no coordinates are available the caller passes its own fallback
//! distance to [`FeeSchedule::quote_for_distance`]; this module never guesses.

use serde::{Deserialize, Serialize};
use std::fmt;
use ts_rs::TS;

use crate::money::Money;
use crate::types::Coordinates;

/// Mean Earth radius used by the haversine formula.
pub const EARTH_RADIUS_KM: f64 = 6371.0;

/// Default dispatch hub.
pub const DEFAULT_HUB: Coordinates = Coordinates::new(-25.1530, 29.0500);

/// Default base travel fee: R20.00.
pub const DEFAULT_BASE_FEE_CENTS: i64 = 2_000;

/// Default per-kilometre travel fee: R7.00.
pub const DEFAULT_PER_KM_FEE_CENTS: i64 = 700;

// =============================================================================
// Distance
// =============================================================================

/// Great-circle distance between two points, in kilometres.
pub fn haversine_km(from: Coordinates, to: Coordinates) -> f64 {
    let d_lat = (to.lat - from.lat).to_radians();
    let d_lng = (to.lng - from.lng).to_radians();
    let a = (d_lat / 2.0).sin().powi(2)
        + from.lat.to_radians().cos() * to.lat.to_radians().cos() * (d_lng / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());
    EARTH_RADIUS_KM * c
}

/// A distance rounded to one decimal place, held as whole tenths of a km.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct DistanceKm(i64);

impl DistanceKm {
    /// Rounds a raw kilometre value to the nearest tenth.
    /// Negative or non-finite input is treated as zero.
    pub fn from_km(km: f64) -> Self {
        if !km.is_finite() || km <= 0.0 {
            return DistanceKm(0);
        }
        DistanceKm((km * 10.0).round() as i64)
    }

    #[inline]
    pub const fn from_tenths(tenths: i64) -> Self {
        DistanceKm(tenths)
    }

    #[inline]
    pub const fn tenths(&self) -> i64 {
        self.0
    }

    /// For display only.
    #[inline]
    pub fn km(&self) -> f64 {
        self.0 as f64 / 10.0
    }
}

impl fmt::Display for DistanceKm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{} km", self.0 / 10, self.0 % 10)
    }
}

// =============================================================================
// Fee Schedule
// =============================================================================

/// Hub location plus the two fee components.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FeeSchedule {
    pub hub: Coordinates,
    pub base_fee: Money,
    pub per_km_fee: Money,
}

/// Distance and fee for one delivery.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct FeeQuote {
    pub distance: DistanceKm,
    pub travel_fee: Money,
}

impl Default for FeeSchedule {
    fn default() -> Self {
        FeeSchedule {
            hub: DEFAULT_HUB,
            base_fee: Money::from_cents(DEFAULT_BASE_FEE_CENTS),
            per_km_fee: Money::from_cents(DEFAULT_PER_KM_FEE_CENTS),
        }
    }
}

impl FeeSchedule {
    /// Quotes the travel fee from the hub to `destination`.
    pub fn quote(&self, destination: Coordinates) -> FeeQuote {
        let km = haversine_km(self.hub, destination);
        self.quote_for_distance(DistanceKm::from_km(km))
    }

    /// Quotes the travel fee for an already-known distance.
    ///
    /// ## Example
    /// ```rust
    /// use fulfil_core::fees::{DistanceKm, FeeSchedule};
    ///
    /// let quote = FeeSchedule::default().quote_for_distance(DistanceKm::from_km(16.1));
    /// assert_eq!(quote.travel_fee.cents(), 13_270); // R132.70
    /// ```
    pub fn quote_for_distance(&self, distance: DistanceKm) -> FeeQuote {
        // per_km × tenths / 10, rounded half-up (both operands are non-negative)
        let per_tenths = self.per_km_fee.cents() as i128 * distance.tenths() as i128;
        let distance_part = ((per_tenths + 5) / 10) as i64;

        FeeQuote {
            distance,
            travel_fee: self.base_fee + Money::from_cents(distance_part),
        }
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
