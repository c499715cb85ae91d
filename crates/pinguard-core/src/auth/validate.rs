//! PIN format validation
//!
//! Every operation that stores a new PIN goes through [`validate_pin_format`].
//! Verification only checks the shape, since a weak PIN can never have been
//! stored in the first place.

use crate::error::{PinError, Result};

/// Required PIN length
pub const PIN_LENGTH: usize = 6;

/// PINs rejected at setup time
pub const WEAK_PINS: &[&str] = &[
    "000000", "111111", "222222", "333333", "444444", "555555", "666666", "777777", "888888",
    "999999", "123456", "654321", "123321", "112233", "121212",
];

/// Check that `pin` is exactly [`PIN_LENGTH`] ASCII digits
pub fn validate_pin_shape(pin: &str) -> Result<()> {
    if pin.chars().count() != PIN_LENGTH {
        return Err(PinError::InvalidLength(PIN_LENGTH));
    }

    if !pin.chars().all(|c| c.is_ascii_digit()) {
        return Err(PinError::NonDigit);
    }

    Ok(())
}

/// Full validation for a PIN about to be stored: shape plus denylist
pub fn validate_pin_format(pin: &str) -> Result<()> {
    validate_pin_shape(pin)?;

    if is_weak_pin(pin) {
        return Err(PinError::WeakPin);
    }

    Ok(())
}

/// Validate a new PIN together with its confirmation entry
pub fn validate_new_pin(pin: &str, confirmation: &str) -> Result<()> {
    validate_pin_format(pin)?;

    if pin != confirmation {
        return Err(PinError::PinMismatch);
    }

    Ok(())
}

/// Whether `pin` is on the denylist
pub fn is_weak_pin(pin: &str) -> bool {
    WEAK_PINS.contains(&pin)
}
