//! Access to the on-chip debug (OCD) registers and instruction injection.
//!
//! OCD registers are reached through the `ACCESS_OCD_REG` instruction. A read takes two data
//! register scans: a 5 bit scan latching the register address, followed by a 21 bit scan that
//! shifts the register contents out. A write is a single 21 bit scan:
//!
//! ```text
//!  20      19..16    15..0
//! [write | address | value]
//! ```

use bitvec::field::BitField;

use super::communication_interface::{
    data_register_len, instruction, AvrCommunicationInterface, AvrError,
};

/// Length of the scan latching an OCD register address.
const OCD_ADDRESS_LEN: u32 = 5;
/// Length of the scan transferring an OCD register value.
const OCD_ACCESS_LEN: u32 = 21;
const OCD_WRITE_FLAG: u32 = 1 << 20;
const OCD_ADDRESS_SHIFT: u32 = 16;
/// Highest address that fits the 5 bit address field.
pub const MAX_OCD_ADDRESS: u8 = 0x1F;

/// Named OCD registers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum OcdRegister {
    /// Program memory single breakpoint 0.
    Psb0 = 0,
    /// Program memory single breakpoint 1.
    Psb1 = 1,
    /// Program/data memory mask or single breakpoint.
    Pdmsb = 2,
    /// Program/data memory single breakpoint.
    Pdsb = 3,
    /// Break control.
    BrkCtl = 8,
    /// Break status.
    BrkStatus = 9,
    /// Read back of the instruction executed via `EXEC_INS`.
    RdBack = 12,
    /// OCD control and status.
    OcdCtlStatus = 13,
}

impl OcdRegister {
    /// The address of the register.
    pub const fn address(self) -> u8 {
        self as u8
    }
}

impl From<OcdRegister> for u8 {
    fn from(register: OcdRegister) -> Self {
        register.address()
    }
}

fn checked_address(address: u8) -> Result<u32, AvrError> {
    if address > MAX_OCD_ADDRESS {
        return Err(AvrError::InvalidOcdAddress(address));
    }
    Ok(u32::from(address))
}

impl AvrCommunicationInterface<'_> {
    /// Reads an OCD register.
    ///
    /// This flushes the queue.
    pub fn read_ocd_register(&mut self, address: impl Into<u8>) -> Result<u16, AvrError> {
        let address = checked_address(address.into())?;

        self.write_instruction(instruction::ACCESS_OCD_REG, instruction::LEN)?;

        // Latch the register address, read direction.
        self.write_data(address, OCD_ADDRESS_LEN)?;

        // Shift the value out. The 16 data bits we send are ignored.
        let index = self.write_data(address << OCD_ADDRESS_SHIFT, OCD_ACCESS_LEN)?;

        self.flush_queue()?;

        let bits = self.take_result(index)?;
        let value = (bits.load_le::<u32>() & 0xFFFF) as u16;

        tracing::debug!("Read OCD register {:#04x} = {:#06x}", address, value);
        Ok(value)
    }

    /// Writes an OCD register.
    ///
    /// The write is only queued; it reaches the target with the next flush.
    pub fn write_ocd_register(
        &mut self,
        address: impl Into<u8>,
        value: u16,
    ) -> Result<(), AvrError> {
        let address = checked_address(address.into())?;

        tracing::debug!("Write OCD register {:#04x} = {:#06x}", address, value);

        self.write_instruction(instruction::ACCESS_OCD_REG, instruction::LEN)?;

        let word = OCD_WRITE_FLAG | (address << OCD_ADDRESS_SHIFT) | u32::from(value);
        self.write_data(word, OCD_ACCESS_LEN)?;

        Ok(())
    }

    /// Injects a single AVR instruction into the core.
    ///
    /// Only queued. The caller has to flush and then check the core state.
    pub fn exec_instruction(&mut self, opcode: u16) -> Result<(), AvrError> {
        tracing::trace!("Executing instruction {:#06x}", opcode);

        self.write_instruction(instruction::EXEC_INS, instruction::LEN)?;
        self.write_data(u32::from(opcode), data_register_len::INSTRUCTION)?;

        Ok(())
    }
}
