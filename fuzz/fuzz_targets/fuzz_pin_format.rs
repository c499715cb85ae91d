#![no_main]

use libfuzzer_sys::fuzz_target;
use pinguard_core::auth::{is_weak_pin, validate_pin_format, validate_pin_shape, PIN_LENGTH};

fuzz_target!(|data: &[u8]| {
    let Ok(pin) = std::str::from_utf8(data) else {
        return;
    };

    // Should not panic
    let shape = validate_pin_shape(pin);
    let format = validate_pin_format(pin);

    if format.is_ok() {
        assert!(shape.is_ok());
        assert_eq!(pin.len(), PIN_LENGTH);
        assert!(pin.bytes().all(|b| b.is_ascii_digit()));
        assert!(!is_weak_pin(pin));
    }
});
