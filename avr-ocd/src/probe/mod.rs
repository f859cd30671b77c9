//! Access to the JTAG scan chain.
//!
//! The driver never clocks the chain itself. Scans are collected in a [`ScanQueue`] and handed to
//! a [`JtagAccess`] implementation in one batch, which keeps the number of round trips to the
//! adapter low. Captured bits become available once the batch has been executed.

pub(crate) mod common;
pub mod fake_probe;
pub mod queue;

use bitvec::{field::BitField, order::Lsb0, vec::BitVec};

pub use common::IdCode;
pub use queue::{BatchExecutionError, DeferredResultIndex, DeferredResultSet, ScanQueue};

/// Bits shifted into or captured from a scan, least significant bit first.
pub type ScanBits = BitVec<u8, Lsb0>;

/// Builds the bit sequence for a scan of `len` bits carrying `value`.
///
/// Bits above 32 are zero. If `len` is shorter than the width of `value`, the upper bits of
/// `value` are dropped, exactly as a shorter shift would drop them on the wire.
pub fn scan_bits(value: u32, len: u32) -> ScanBits {
    let mut bits = ScanBits::repeat(false, len as usize);
    let width = bits.len().min(32);
    if width > 0 {
        bits[..width].store_le(value);
    }
    bits
}

/// One device on the JTAG scan chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct JtagTap {
    /// Position of the TAP on the chain, counted from TDO.
    pub position: usize,
    /// Length of the instruction register, in bits.
    pub ir_len: u32,
}

impl JtagTap {
    /// Creates a handle for the TAP at `position` with an `ir_len` bit instruction register.
    pub fn new(position: usize, ir_len: u32) -> Self {
        Self { position, ir_len }
    }
}

/// The register a scan is shifted through.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanRegister {
    /// Shift-IR
    Instruction,
    /// Shift-DR
    Data,
}

/// The TAP controller state a scan ends in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TapState {
    /// Run-Test/Idle
    #[default]
    Idle,
}

/// A single IR or DR scan waiting in a [`ScanQueue`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanCommand {
    /// The TAP the scan is addressed to.
    pub tap: JtagTap,
    /// Which register is shifted.
    pub register: ScanRegister,
    /// The bits shifted out to the TAP. Its length is the length of the scan.
    pub out_bits: ScanBits,
    /// The state the TAP controller is left in.
    pub end_state: TapState,
}

impl ScanCommand {
    /// Length of the scan in bits.
    pub fn len(&self) -> u32 {
        self.out_bits.len() as u32
    }

    /// Returns `true` for a scan without any bits.
    pub fn is_empty(&self) -> bool {
        self.out_bits.is_empty()
    }

    /// The shifted-out bits as an integer. Only the first 32 bits are considered.
    pub fn out_value(&self) -> u32 {
        let width = self.out_bits.len().min(32);
        if width == 0 {
            0
        } else {
            self.out_bits[..width].load_le::<u32>()
        }
    }
}

/// An error reported by the probe while executing a batch of scans.
#[derive(thiserror::Error, Debug)]
pub enum DebugProbeError {
    /// The adapter did not answer in time.
    #[error("Operation timed out")]
    Timeout,
    /// The adapter cannot shift the requested scan.
    #[error("Command not supported by probe: {0}")]
    CommandNotSupportedByProbe(&'static str),
}

/// Low-level batched access to a JTAG scan chain.
///
/// This is implemented by the adapter driver. The driver executes every scan of the queue in
/// order and reports the captured bits of each scan whose [`DeferredResultIndex`] is still held
/// by the issuing code (see [`DeferredResultIndex::should_capture`]).
pub trait JtagAccess {
    /// Clock out all scans in `queue`.
    ///
    /// On failure, the returned error carries the results of the scans that completed before
    /// the failing one.
    fn execute(
        &mut self,
        queue: &ScanQueue,
    ) -> Result<DeferredResultSet<ScanBits>, BatchExecutionError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use test_case::test_case;

    #[test_case(0x0B, 4, 0x0B ; "instruction fits")]
    #[test_case(0x0010_002A, 5, 0x0A ; "five bit scan keeps low bits")]
    #[test_case(0x0010_002A, 21, 0x0010_002A ; "twenty one bit scan keeps flag")]
    #[test_case(0xFFFF_FFFF, 32, 0xFFFF_FFFF ; "full width")]
    fn scan_bits_truncate_to_length(value: u32, len: u32, expected: u32) {
        let command = ScanCommand {
            tap: JtagTap::new(0, 4),
            register: ScanRegister::Data,
            out_bits: scan_bits(value, len),
            end_state: TapState::Idle,
        };

        assert_eq!(command.len(), len);
        assert_eq!(command.out_value(), expected);
    }

    #[test]
    fn zero_length_scan_has_no_bits() {
        let bits = scan_bits(0xFF, 0);
        assert!(bits.is_empty());
    }
}
