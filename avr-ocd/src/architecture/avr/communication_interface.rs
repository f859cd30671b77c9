//! JTAG access to the AVR debug logic.
//!
//! All accesses are queued in a [`ScanQueue`] and only reach the target when
//! [`AvrCommunicationInterface::flush_queue`] is called.

use std::fmt;

use bitvec::field::BitField;

use crate::probe::{
    DebugProbeError, DeferredResultIndex, DeferredResultSet, IdCode, JtagAccess, JtagTap,
    ScanBits, ScanCommand, ScanQueue, TapState,
};

/// JTAG instructions understood by the AVR TAP.
pub mod instruction {
    /// Length of the AVR instruction register.
    pub const LEN: u32 = 4;

    pub const EXTEST: u8 = 0x0;
    pub const IDCODE: u8 = 0x1;
    pub const SAMPLE_PRELOAD: u8 = 0x2;
    pub const PROG_ENABLE: u8 = 0x4;
    pub const PROG_COMMANDS: u8 = 0x5;
    pub const PROG_PAGELOAD: u8 = 0x6;
    pub const PROG_PAGEREAD: u8 = 0x7;
    /// Halt the core.
    pub const FORCE_BREAK: u8 = 0x8;
    /// Resume the core.
    pub const RUN: u8 = 0x9;
    /// Execute the instruction shifted into the data register.
    pub const EXEC_INS: u8 = 0xA;
    /// Access the OCD register file.
    pub const ACCESS_OCD_REG: u8 = 0xB;
    /// Select the reset register.
    pub const AVR_RESET: u8 = 0xC;
    pub const BYPASS: u8 = 0xF;
}

/// Lengths of the AVR data registers, in bits.
pub mod data_register_len {
    pub const BYPASS: u32 = 1;
    pub const RESET: u32 = 1;
    pub const JTAG_ID: u32 = 32;
    pub const PROGRAMMING_ENABLE: u32 = 16;
    pub const PROGRAMMING_COMMAND: u32 = 15;
    pub const FLASH_DATA_BYTE: u32 = 16;
    /// Instructions executed through `EXEC_INS`.
    pub const INSTRUCTION: u32 = 16;
}

/// No data register scan of the OCD protocol is longer than this.
pub const MAX_DATA_REGISTER_LEN: u32 = 32;

/// Coarse classification of [`AvrError`]s.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// The tap is missing or does not match the request.
    Configuration,
    /// A scan is longer than the protocol allows.
    ProtocolLength,
    /// The core is not in the state the request needs.
    Precondition,
    /// The request carries invalid arguments.
    Argument,
    /// The memory access is not aligned to its size.
    Alignment,
    /// Executing the scan queue failed.
    Execution,
    /// Memory for the result could not be allocated.
    Resource,
}

/// An error specific to AVR targets.
#[derive(Debug, thiserror::Error)]
pub enum AvrError {
    /// The target has no tap to scan through.
    #[error("No JTAG tap is configured for this target")]
    MissingTap,
    /// An IR scan does not match the instruction register length of the tap.
    #[error("The instruction register is {expected} bits long, but a {actual} bit scan was requested")]
    IrLengthMismatch { expected: u32, actual: u32 },
    /// A DR scan is longer than any AVR data register.
    #[error("A data register scan of {0} bits exceeds the maximum of 32 bits")]
    DataRegisterTooLong(u32),
    /// The OCD register address does not fit the 5 bit address field.
    #[error("OCD register address {0} is out of range")]
    InvalidOcdAddress(u8),
    /// The request needs a halted core.
    #[error("The target is not halted")]
    NotHalted,
    /// Memory accesses must be 1, 2 or 4 bytes wide.
    #[error("Memory accesses of {0} bytes are not supported")]
    InvalidAccessSize(u32),
    /// A memory access of zero items.
    #[error("Memory accesses must transfer at least one item")]
    InvalidAccessCount,
    /// The buffer is empty or cannot hold the whole access.
    #[error("A buffer of {actual} bytes cannot hold the {required} bytes of the access")]
    BufferTooSmall { required: usize, actual: usize },
    /// The address is not aligned to the access size.
    #[error("Address {address:#06x} is not aligned to the access size of {size} bytes")]
    UnalignedAccess { address: u64, size: u32 },
    /// Allocating a result failed.
    #[error("Out of memory")]
    OutOfMemory,
    /// The probe failed to execute the scan queue.
    #[error("Executing the queued scans failed")]
    Execution(#[source] DebugProbeError),
    /// The captured bits of a scan were not returned by the probe.
    #[error("The result of a queued scan is not available")]
    BatchedResultNotAvailable,
    /// The device does not report the configured IDCODE.
    #[error("Expected IDCODE {expected}, but the device reports {found}")]
    UnexpectedIdCode { expected: IdCode, found: IdCode },
}

impl AvrError {
    /// Returns the class of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            AvrError::MissingTap
            | AvrError::IrLengthMismatch { .. }
            | AvrError::UnexpectedIdCode { .. } => ErrorKind::Configuration,
            AvrError::DataRegisterTooLong(_) => ErrorKind::ProtocolLength,
            AvrError::NotHalted => ErrorKind::Precondition,
            AvrError::InvalidOcdAddress(_)
            | AvrError::InvalidAccessSize(_)
            | AvrError::InvalidAccessCount
            | AvrError::BufferTooSmall { .. } => ErrorKind::Argument,
            AvrError::UnalignedAccess { .. } => ErrorKind::Alignment,
            AvrError::Execution(_) | AvrError::BatchedResultNotAvailable => ErrorKind::Execution,
            AvrError::OutOfMemory => ErrorKind::Resource,
        }
    }
}

/// Queued JTAG access to one AVR TAP.
pub struct AvrCommunicationInterface<'probe> {
    probe: &'probe mut dyn JtagAccess,
    tap: Option<JtagTap>,
    queue: ScanQueue,
    results: DeferredResultSet<ScanBits>,
}

impl fmt::Debug for AvrCommunicationInterface<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AvrCommunicationInterface")
            .field("tap", &self.tap)
            .field("queue", &self.queue)
            .finish_non_exhaustive()
    }
}

impl<'probe> AvrCommunicationInterface<'probe> {
    /// Creates an interface that talks to `tap` through `probe`.
    ///
    /// Without a tap, every scan fails with [`AvrError::MissingTap`].
    pub fn new(probe: &'probe mut dyn JtagAccess, tap: Option<JtagTap>) -> Self {
        Self {
            probe,
            tap,
            queue: ScanQueue::new(),
            results: DeferredResultSet::new(),
        }
    }

    /// The tap this interface is bound to.
    pub fn tap(&self) -> Option<JtagTap> {
        self.tap
    }

    /// The scans waiting for the next flush.
    pub fn queue(&self) -> &ScanQueue {
        &self.queue
    }

    fn selected_tap(&self) -> Result<JtagTap, AvrError> {
        self.tap.ok_or_else(|| {
            tracing::error!("invalid tap");
            AvrError::MissingTap
        })
    }

    /// Queue a scan of `len` bits shifting `instruction` into the instruction register.
    ///
    /// `len` must match the instruction register length of the tap. The returned index yields
    /// the bits captured from the instruction register once the queue has been flushed.
    pub fn write_instruction(
        &mut self,
        instruction: u8,
        len: u32,
    ) -> Result<DeferredResultIndex, AvrError> {
        let tap = self.selected_tap()?;

        if len != tap.ir_len {
            tracing::error!(
                "Instruction register of tap {} is {} bits long, refusing a {} bit scan",
                tap.position,
                tap.ir_len,
                len
            );
            return Err(AvrError::IrLengthMismatch {
                expected: tap.ir_len,
                actual: len,
            });
        }

        tracing::trace!("IR scan: {:#x} ({} bits)", instruction, len);
        Ok(self
            .queue
            .enqueue_ir_scan(tap, len, u32::from(instruction), TapState::Idle))
    }

    /// Queue a scan of `len` bits shifting `value` into the data register.
    ///
    /// The returned index yields the bits captured from the data register once the queue has
    /// been flushed.
    pub fn write_data(&mut self, value: u32, len: u32) -> Result<DeferredResultIndex, AvrError> {
        let tap = self.selected_tap()?;

        if len > MAX_DATA_REGISTER_LEN {
            tracing::error!("DR length {} overflows the maximum of 32 bits", len);
            return Err(AvrError::DataRegisterTooLong(len));
        }

        tracing::trace!("DR scan: {:#x} ({} bits)", value, len);
        Ok(self.queue.enqueue_dr_scan(tap, len, value, TapState::Idle))
    }

    /// Execute all queued scans.
    ///
    /// The probe is called even if nothing is queued. On failure, the results of scans that
    /// completed before the error remain available.
    pub fn flush_queue(&mut self) -> Result<(), AvrError> {
        let queue = std::mem::take(&mut self.queue);
        tracing::trace!("Executing {} queued scans", queue.len());

        let outcome = self.probe.execute(&queue);
        // The queue holds a reference to every index, drop it so that
        // only results with a live index are kept.
        drop(queue);

        match outcome {
            Ok(results) => {
                self.results.merge_from(results);
                Ok(())
            }
            Err(e) => {
                tracing::error!("Executing the scan queue failed: {}", e);
                self.results.merge_from(e.results);
                Err(AvrError::Execution(e.error))
            }
        }
    }

    /// Takes the captured bits of a flushed scan.
    pub fn take_result(&mut self, index: DeferredResultIndex) -> Result<ScanBits, AvrError> {
        self.results
            .take(index)
            .map_err(|_| AvrError::BatchedResultNotAvailable)
    }

    /// Reads the JTAG IDCODE of the device.
    ///
    /// This flushes the queue.
    pub fn read_idcode(&mut self) -> Result<IdCode, AvrError> {
        self.write_instruction(instruction::IDCODE, instruction::LEN)?;
        let index = self.write_data(0, data_register_len::JTAG_ID)?;
        self.flush_queue()?;

        let bits = self.take_result(index)?;
        let idcode = IdCode::from(bits.load_le::<u32>());
        tracing::debug!("IDCODE: {}", idcode);

        Ok(idcode)
    }

    /// Iterates over the scans waiting for the next flush.
    pub fn queued_scans(&self) -> impl Iterator<Item = &ScanCommand> {
        self.queue.commands()
    }
}
