//! Phone number normalization for client lookup and duplicate detection
//!
//! Numbers are reduced to digits and canonicalized for Qatar: the calling
//! code is `974` and local subscriber numbers have 8 digits.

/// Country calling code
pub const CALLING_CODE: &str = "974";

/// International prefix form of the calling code
pub const INTERNATIONAL_PREFIX: &str = "00974";

/// Length of a local subscriber number
pub const LOCAL_NUMBER_LENGTH: usize = 8;

/// Shortest normalized number accepted for lookups
pub const MIN_LOOKUP_DIGITS: usize = 8;

/// Normalize a free-form phone number to a canonical digit sequence.
///
/// Total and idempotent; empty input yields an empty string.
pub fn normalize_phone(phone: &str) -> String {
    let digits: String = phone.chars().filter(|c| c.is_ascii_digit()).collect();

    if digits.starts_with(CALLING_CODE) {
        digits
    } else if digits.starts_with(INTERNATIONAL_PREFIX) {
        digits["00".len()..].to_string()
    } else if digits.len() == LOCAL_NUMBER_LENGTH {
        format!("{CALLING_CODE}{digits}")
    } else {
        digits
    }
}

/// Whether a normalized number is long enough to look a client up by
pub fn is_lookup_candidate(normalized: &str) -> bool {
    normalized.len() >= MIN_LOOKUP_DIGITS
}
