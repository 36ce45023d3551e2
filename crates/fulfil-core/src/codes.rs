//! # Codes
//!
//! Identifier generation. The RNG is passed in so tests stay deterministic
//! and the crate keeps no ambient state.
//!
//! | Code       | Format                          | Example          |
//! |------------|---------------------------------|------------------|
//! | Entity id  | UUID v4                         | `5f0c…`          |
//! | Order code | `RSA-` + 5 digits (10000–99999) | `RSA-48213`      |
//! | Waybill    | 14 chars, no `I` / `O`          | `K7MPX2QW9DRT4A` |

use rand::Rng;
use uuid::Uuid;

/// Prefix of every human-readable order code.
pub const ORDER_CODE_PREFIX: &str = "RSA-";

/// Waybill length.
pub const WAYBILL_LEN: usize = 14;

/// Upper-case letters and digits without the easily confused `I` and `O`.
pub const WAYBILL_ALPHABET: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZ0123456789";

/// New primary key for any entity.
pub fn new_entity_id() -> String {
    Uuid::new_v4().to_string()
}

/// `RSA-` followed by a number in 10000..=99999.
pub fn generate_order_code<R: Rng + ?Sized>(rng: &mut R) -> String {
    format!("{}{}", ORDER_CODE_PREFIX, rng.gen_range(10_000..=99_999))
}

/// 14 characters drawn from [`WAYBILL_ALPHABET`].
pub fn generate_waybill<R: Rng + ?Sized>(rng: &mut R) -> String {
    (0..WAYBILL_LEN)
        .map(|_| WAYBILL_ALPHABET[rng.gen_range(0..WAYBILL_ALPHABET.len())] as char)
        .collect()
}
