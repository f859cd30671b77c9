//! A simulated AVR TAP, used for tests and dry runs.

use crate::architecture::avr::communication_interface::instruction;
use crate::probe::{
    scan_bits, BatchExecutionError, DebugProbeError, DeferredResultSet, JtagAccess, ScanBits,
    ScanCommand, ScanQueue, ScanRegister,
};

/// Bits every JTAG TAP captures into its instruction register.
const IR_CAPTURE: u32 = 0b0001;
const OCD_ACCESS_LEN: u32 = 21;
const OCD_ADDRESS_LEN: u32 = 5;
const OCD_WRITE_FLAG: u32 = 1 << 20;

/// This is a mock probe with a single AVR TAP on the chain.
///
/// It decodes the scans the driver issues, keeps an OCD register file, and records every scan
/// so tests can check the exact traffic.
#[derive(Debug)]
pub struct FakeAvrProbe {
    idcode: u32,
    instruction: u8,
    /// Address latched by a 5 bit `ACCESS_OCD_REG` scan, waiting for the read-out scan.
    latched: Option<u8>,
    // The write word only has room for 4 address bits.
    ocd_registers: [u16; 16],
    reset_asserted: bool,
    executed_instructions: Vec<u16>,
    executed_scans: Vec<ScanCommand>,
    fail_next_execute: bool,
    flush_count: usize,
}

impl Default for FakeAvrProbe {
    fn default() -> Self {
        Self {
            // ATmega128
            idcode: 0x6970_203F,
            instruction: instruction::BYPASS,
            latched: None,
            ocd_registers: [0; 16],
            reset_asserted: false,
            executed_instructions: Vec::new(),
            executed_scans: Vec::new(),
            fail_next_execute: false,
            flush_count: 0,
        }
    }
}

impl FakeAvrProbe {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_idcode(mut self, idcode: u32) -> Self {
        self.idcode = idcode;
        self
    }

    pub fn set_ocd_register(&mut self, address: u8, value: u16) {
        self.ocd_registers[usize::from(address & 0xF)] = value;
    }

    pub fn ocd_register(&self, address: u8) -> u16 {
        self.ocd_registers[usize::from(address & 0xF)]
    }

    /// Whether the last scan of the reset register shifted in a one.
    pub fn reset_asserted(&self) -> bool {
        self.reset_asserted
    }

    /// Opcodes shifted in with `EXEC_INS`, in execution order.
    pub fn executed_instructions(&self) -> &[u16] {
        &self.executed_instructions
    }

    pub fn executed_scans(&self) -> &[ScanCommand] {
        &self.executed_scans
    }

    /// Number of calls to [`JtagAccess::execute`], including empty and failed ones.
    pub fn flush_count(&self) -> usize {
        self.flush_count
    }

    /// Makes the next call to [`JtagAccess::execute`] fail with a timeout before any scan.
    pub fn fail_next_execute(&mut self) {
        self.fail_next_execute = true;
    }

    fn shift_ir(&mut self, value: u32) -> u32 {
        self.instruction = (value & 0xF) as u8;
        self.latched = None;
        IR_CAPTURE
    }

    fn shift_dr(&mut self, value: u32, len: u32) -> u32 {
        match (self.instruction, len) {
            (instruction::IDCODE, _) => self.idcode,
            (instruction::ACCESS_OCD_REG, OCD_ADDRESS_LEN) => {
                self.latched = Some((value & 0x1F) as u8);
                0
            }
            (instruction::ACCESS_OCD_REG, OCD_ACCESS_LEN) => {
                if let Some(address) = self.latched.take() {
                    u32::from(self.ocd_register(address))
                } else if value & OCD_WRITE_FLAG != 0 {
                    self.set_ocd_register((value >> 16) as u8, value as u16);
                    0
                } else {
                    u32::from(self.ocd_register((value >> 16) as u8))
                }
            }
            (instruction::EXEC_INS, 16) => {
                self.executed_instructions.push(value as u16);
                0
            }
            (instruction::AVR_RESET, 1) => {
                self.reset_asserted = value & 1 != 0;
                u32::from(self.reset_asserted)
            }
            _ => 0,
        }
    }
}

impl JtagAccess for FakeAvrProbe {
    fn execute(
        &mut self,
        queue: &ScanQueue,
    ) -> Result<DeferredResultSet<ScanBits>, BatchExecutionError> {
        self.flush_count += 1;

        let mut results = DeferredResultSet::with_capacity(queue.len());

        if std::mem::take(&mut self.fail_next_execute) {
            return Err(BatchExecutionError::new(DebugProbeError::Timeout, results));
        }

        for (index, command) in queue.iter() {
            if command.tap.position != 0 {
                return Err(BatchExecutionError::new(
                    DebugProbeError::CommandNotSupportedByProbe("scan chains with multiple taps"),
                    results,
                ));
            }

            let value = command.out_value();
            let captured = match command.register {
                ScanRegister::Instruction => self.shift_ir(value),
                ScanRegister::Data => self.shift_dr(value, command.len()),
            };

            self.executed_scans.push(command.clone());

            if index.should_capture() {
                results.push(index, scan_bits(captured, command.len()));
            }
        }

        Ok(results)
    }
}
