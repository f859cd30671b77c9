//! Structures shared between probe drivers and target code.

use bitfield::bitfield;

bitfield! {
    /// A JTAG IDCODE.
    /// Identifies a particular Test Access Port (TAP) on the JTAG scan chain.
    #[derive(Copy, Clone, Eq, PartialEq)]
    pub struct IdCode(u32);
    impl Debug;

    u8;
    /// The IDCODE version.
    pub version, set_version: 31, 28;

    u16;
    /// The part number.
    pub part_number, set_part_number: 27, 12;

    /// The JEDEC JEP-106 Manufacturer ID.
    pub manufacturer, set_manufacturer: 11, 1;

    u8;
    /// The continuation code of the JEDEC JEP-106 Manufacturer ID.
    pub manufacturer_continuation, set_manufacturer_continuation: 11, 8;

    /// The identity code of the JEDEC JEP-106 Manufacturer ID.
    pub manufacturer_identity, set_manufacturer_identity: 7, 1;

    bool;
    /// The least-significant bit.
    /// Always set.
    pub lsbit, set_lsbit: 0;
}

impl std::fmt::Display for IdCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if let Some(mfn) = self.manufacturer_name() {
            write!(f, "0x{:08X} ({})", self.0, mfn)
        } else {
            write!(f, "0x{:08X}", self.0)
        }
    }
}

impl From<u32> for IdCode {
    fn from(value: u32) -> Self {
        IdCode(value)
    }
}

impl IdCode {
    /// The raw 32 bit IDCODE.
    pub fn raw(&self) -> u32 {
        self.0
    }

    /// Returns `true` iff the IDCODE's least significant bit is `1`
    /// and the 7-bit `manufacturer_identity` is set to one of the non-reserved values in the range `[1,126]`.
    pub fn valid(&self) -> bool {
        self.lsbit() && (self.manufacturer_identity() != 0) && (self.manufacturer_identity() != 127)
    }

    /// Return the manufacturer name, if available.
    pub fn manufacturer_name(&self) -> Option<&'static str> {
        let cc = self.manufacturer_continuation();
        let id = self.manufacturer_identity();
        jep106::JEP106Code::new(cc, id).get()
    }
}

#[cfg(test)]
mod tests {
    use super::IdCode;

    // ATmega128: version 6, part 0x9702, Atmel.
    const ATMEGA128: u32 = 0x6970_203F;

    #[test]
    fn decodes_avr_idcode() {
        let idcode = IdCode(ATMEGA128);

        assert!(idcode.valid());
        assert_eq!(idcode.version(), 0x6);
        assert_eq!(idcode.part_number(), 0x9702);
        assert_eq!(idcode.manufacturer_continuation(), 0);
        assert_eq!(idcode.manufacturer_identity(), 0x1F);
        assert!(idcode.manufacturer_name().is_some());
    }

    #[test]
    fn converts_from_raw_value() {
        let idcode = IdCode::from(ATMEGA128);

        assert_eq!(idcode.raw(), ATMEGA128);
        assert_eq!(idcode, IdCode(ATMEGA128));
    }

    #[test]
    fn bypass_pattern_is_invalid() {
        assert!(!IdCode(0).valid());
        assert!(!IdCode(0xFFFF_FFFF).valid());
    }
}
