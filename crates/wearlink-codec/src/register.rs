//! Register id conventions.
//!
//! The high bit of a register id marks a read: the host sets it on read
//! requests and the device echoes it on the matching response.

/// Read flag carried in the register byte.
pub const READ_FLAG: u8 = 0x80;

/// Register id with the read flag set.
pub fn read_register(register: u8) -> u8 {
    register | READ_FLAG
}

/// Returns true if the register id carries the read flag.
pub fn is_read(register: u8) -> bool {
    register & READ_FLAG != 0
}

/// Register id with the read flag cleared.
pub fn base_register(register: u8) -> u8 {
    register & !READ_FLAG
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn read_flag_roundtrip() {
        assert_eq!(read_register(0x02), 0x82);
        assert!(is_read(0x82));
        assert!(!is_read(0x02));
        assert_eq!(base_register(0x82), 0x02);
        assert_eq!(base_register(0x02), 0x02);
    }
}
