//! # Validation Module
//!
//! Input validation for everything that enters the fulfilment workflow.
//!
//! ## Validation Layers
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Validation Layers                                  │
//! │                                                                         │
//! │  Layer 1: Engine operation (Rust)                                      │
//! │  └── THIS MODULE: cart lines, addresses, coordinates, rates            │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 2: Lifecycle rules (fulfil-core::lifecycle)                     │
//! │  └── Which actor may move which order where                            │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 3: Database (SQLite)                                            │
//! │  ├── CHECK constraints on statuses and amounts                         │
//! │  ├── UNIQUE order codes / idempotency keys                             │
//! │  └── Foreign keys from items and ledger rows to orders                 │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use crate::error::ValidationError;
use crate::money::Rate;
use crate::types::Coordinates;
use crate::{MAX_ORDER_ITEMS, MAX_ITEM_QUANTITY};

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

const MAX_ADDRESS_LEN: usize = 300;
const MAX_CONTACT_LEN: usize = 100;

// =============================================================================
// String Validators
// =============================================================================

/// Rejects empty or whitespace-only identifiers.
pub fn validate_required(field: &str, value: &str) -> ValidationResult<()> {
    if value.trim().is_empty() {
        return Err(ValidationError::Required {
            field: field.to_string(),
        });
    }
    Ok(())
}

/// Validates a delivery address.
///
/// ## Rules
/// - Must not be empty
/// - At most 300 characters
///
/// ## Returns
/// The trimmed address.
///
/// ## Example
/// ```rust
/// use fulfil_core::validation::validate_delivery_address;
///
/// assert_eq!(validate_delivery_address("  12 Church St ").unwrap(), "12 Church St");
/// assert!(validate_delivery_address("   ").is_err());
/// ```
pub fn validate_delivery_address(address: &str) -> ValidationResult<String> {
    let address = address.trim();

    if address.is_empty() {
        return Err(ValidationError::Required {
            field: "delivery_address".to_string(),
        });
    }

    if address.chars().count() > MAX_ADDRESS_LEN {
        return Err(ValidationError::TooLong {
            field: "delivery_address".to_string(),
            max: MAX_ADDRESS_LEN,
        });
    }

    Ok(address.to_string())
}

/// Trims an optional contact field; blank becomes `None`.
pub fn validate_contact(field: &str, value: Option<&str>) -> ValidationResult<Option<String>> {
    let Some(value) = value.map(str::trim).filter(|v| !v.is_empty()) else {
        return Ok(None);
    };

    if value.chars().count() > MAX_CONTACT_LEN {
        return Err(ValidationError::TooLong {
            field: field.to_string(),
            max: MAX_CONTACT_LEN,
        });
    }

    Ok(Some(value.to_string()))
}

// =============================================================================
// Numeric Validators
// =============================================================================

/// Validates an item quantity.
///
/// ## Rules
/// - At least 1
/// - At most [`MAX_ITEM_QUANTITY`]
pub fn validate_quantity(qty: i64) -> ValidationResult<()> {
    if !(1..=MAX_ITEM_QUANTITY).contains(&qty) {
        return Err(ValidationError::OutOfRange {
            field: "quantity".to_string(),
            min: 1,
            max: MAX_ITEM_QUANTITY,
        });
    }
    Ok(())
}

/// Validates a snapshotted unit price.
pub fn validate_price_cents(cents: i64) -> ValidationResult<()> {
    if cents < 0 {
        return Err(ValidationError::Negative {
            field: "unit_price".to_string(),
        });
    }
    Ok(())
}

/// Validates a rate is a proportion (0–100%).
pub fn validate_rate(field: &str, rate: Rate) -> ValidationResult<()> {
    if !rate.is_proportion() {
        return Err(ValidationError::OutOfRange {
            field: field.to_string(),
            min: 0,
            max: Rate::WHOLE_BPS as i64,
        });
    }
    Ok(())
}

/// Validates the number of lines in a cart.
pub fn validate_cart_size(lines: usize) -> ValidationResult<()> {
    if lines > MAX_ORDER_ITEMS {
        return Err(ValidationError::OutOfRange {
            field: "items".to_string(),
            min: 1,
            max: MAX_ORDER_ITEMS as i64,
        });
    }
    Ok(())
}

/// Validates a caller-supplied fallback distance in kilometres.
pub fn validate_distance_km(km: f64) -> ValidationResult<()> {
    if !km.is_finite() {
        return Err(ValidationError::InvalidFormat {
            field: "distance_km".to_string(),
            reason: "must be a finite number".to_string(),
        });
    }
    if km < 0.0 {
        return Err(ValidationError::Negative {
            field: "distance_km".to_string(),
        });
    }
    Ok(())
}

/// Validates a latitude/longitude pair.
///
/// ## Example
/// ```rust
/// use fulfil_core::types::Coordinates;
/// use fulfil_core::validation::validate_coordinates;
///
/// assert!(validate_coordinates(Coordinates::new(-25.153, 29.05)).is_ok());
/// assert!(validate_coordinates(Coordinates::new(95.0, 29.05)).is_err());
/// ```
pub fn validate_coordinates(coords: Coordinates) -> ValidationResult<()> {
    if !coords.lat.is_finite() || !(-90.0..=90.0).contains(&coords.lat) {
        return Err(ValidationError::InvalidFormat {
            field: "lat".to_string(),
            reason: "must be between -90 and 90".to_string(),
        });
    }
    if !coords.lng.is_finite() || !(-180.0..=180.0).contains(&coords.lng) {
        return Err(ValidationError::InvalidFormat {
            field: "lng".to_string(),
            reason: "must be between -180 and 180".to_string(),
        });
    }
    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================
