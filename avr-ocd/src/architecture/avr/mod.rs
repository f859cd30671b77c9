//! AVR support

pub mod communication_interface;
pub mod ocd;
pub mod registers;

use communication_interface::{
    data_register_len, instruction, AvrCommunicationInterface, AvrError,
};

use crate::config::AvrTargetConfig;
use crate::core::{
    Breakpoint, CoreInterface, CoreStatus, HaltReason, Register, RegisterClass, RegisterFile,
};
use crate::error::Error;
use crate::probe::{IdCode, JtagAccess};

/// An AVR core, driven through its JTAG OCD interface.
#[derive(Debug)]
pub struct Avr<'probe> {
    interface: AvrCommunicationInterface<'probe>,
    name: String,
    state: CoreStatus,
    debug_reason: HaltReason,
    registers: RegisterFile,
    expected_idcode: Option<IdCode>,
}

impl<'probe> Avr<'probe> {
    /// Creates a target on top of `interface`. The core state starts out unknown.
    pub fn new(interface: AvrCommunicationInterface<'probe>) -> Self {
        Self {
            interface,
            name: "avr".to_string(),
            state: CoreStatus::Unknown,
            debug_reason: HaltReason::NotHalted,
            registers: RegisterFile::new(registers::AVR_REGISTERS),
            expected_idcode: None,
        }
    }

    /// Creates a target from its configuration, talking through `probe`.
    pub fn from_config(probe: &'probe mut dyn JtagAccess, config: &AvrTargetConfig) -> Self {
        let tap = config.tap.as_ref();
        let interface = AvrCommunicationInterface::new(probe, tap.map(|tap| tap.tap()));

        Self {
            name: config.name.clone(),
            expected_idcode: tap.and_then(|tap| tap.expected_idcode()),
            ..Self::new(interface)
        }
    }

    /// The JTAG interface of the core.
    pub fn interface(&self) -> &AvrCommunicationInterface<'probe> {
        &self.interface
    }

    /// The JTAG interface of the core.
    pub fn interface_mut(&mut self) -> &mut AvrCommunicationInterface<'probe> {
        &mut self.interface
    }

    /// Why the core is, or is about to be, halted.
    pub fn debug_reason(&self) -> HaltReason {
        self.debug_reason
    }

    /// The cached register values.
    pub fn registers(&self) -> &RegisterFile {
        &self.registers
    }

    /// Checks a memory access request. The first failing check decides the error.
    fn validate_memory_access(
        &self,
        address: u64,
        size: u32,
        count: u32,
        buffer_len: usize,
    ) -> Result<(), AvrError> {
        if !self.state.is_halted() {
            tracing::error!("Target not halted");
            return Err(AvrError::NotHalted);
        }

        if !matches!(size, 1 | 2 | 4) {
            return Err(AvrError::InvalidAccessSize(size));
        }

        if count == 0 {
            return Err(AvrError::InvalidAccessCount);
        }

        let required = size as usize * count as usize;
        if buffer_len == 0 || buffer_len < required {
            return Err(AvrError::BufferTooSmall {
                required,
                actual: buffer_len,
            });
        }

        if address % u64::from(size) != 0 {
            return Err(AvrError::UnalignedAccess { address, size });
        }

        Ok(())
    }
}

impl CoreInterface for Avr<'_> {
    fn init(&mut self) -> Result<(), Error> {
        tracing::debug!("Initializing AVR target {}", self.name);

        if let Some(expected) = self.expected_idcode {
            let found = self.interface.read_idcode()?;
            if found != expected {
                tracing::error!("Expected IDCODE {}, found {}", expected, found);
                return Err(AvrError::UnexpectedIdCode { expected, found }.into());
            }
            tracing::info!("Found {} ({})", self.name, found);
        }

        Ok(())
    }

    fn status(&self) -> CoreStatus {
        self.state
    }

    fn poll(&mut self) -> Result<(), Error> {
        if self.state.is_running() {
            self.state = CoreStatus::Halted;
        }

        Ok(())
    }

    fn halt(&mut self) -> Result<(), Error> {
        tracing::debug!("target->state: {:?}", self.state);

        match self.state {
            CoreStatus::Halted => {
                tracing::debug!("target was already halted");
                return Ok(());
            }
            CoreStatus::Unknown => {
                tracing::warn!("target was in unknown state when halt was requested")
            }
            _ => {}
        }

        self.debug_reason = HaltReason::Request;
        self.interface.flush_queue()?;

        Ok(())
    }

    fn resume(
        &mut self,
        current: bool,
        address: u64,
        handle_breakpoints: bool,
        debug_execution: bool,
    ) -> Result<(), Error> {
        tracing::debug!(
            "resume: current {}, address {:#x}, handle breakpoints {}, debug execution {}",
            current,
            address,
            handle_breakpoints,
            debug_execution
        );
        Ok(())
    }

    fn step(&mut self, current: bool, address: u64, handle_breakpoints: bool) -> Result<(), Error> {
        tracing::debug!(
            "step: current {}, address {:#x}, handle breakpoints {}",
            current,
            address,
            handle_breakpoints
        );
        Ok(())
    }

    fn assert_reset(&mut self) -> Result<(), Error> {
        tracing::debug!("Asserting reset");

        self.interface
            .write_instruction(instruction::AVR_RESET, instruction::LEN)?;
        self.interface.write_data(1, data_register_len::RESET)?;

        self.state = CoreStatus::Reset;

        Ok(())
    }

    fn deassert_reset(&mut self) -> Result<(), Error> {
        // The reset register is not cleared here, the core stays in reset until the next
        // scan of the reset register.
        tracing::debug!("Deasserting reset without a release scan");
        self.state = CoreStatus::Running;

        Ok(())
    }

    fn read_memory(
        &mut self,
        address: u64,
        size: u32,
        count: u32,
        buffer: &mut [u8],
    ) -> Result<(), Error> {
        tracing::debug!(
            "address: {:#010x}, size: {}, count: {}",
            address,
            size,
            count
        );
        self.validate_memory_access(address, size, count, buffer.len())?;

        Ok(())
    }

    fn write_memory(
        &mut self,
        address: u64,
        size: u32,
        count: u32,
        buffer: &[u8],
    ) -> Result<(), Error> {
        tracing::debug!(
            "address: {:#010x}, size: {}, count: {}",
            address,
            size,
            count
        );
        self.validate_memory_access(address, size, count, buffer.len())?;

        Ok(())
    }

    fn add_breakpoint(&mut self, breakpoint: &Breakpoint) -> Result<(), Error> {
        tracing::debug!("add breakpoint {:?}", breakpoint);
        Ok(())
    }

    fn remove_breakpoint(&mut self, breakpoint: &Breakpoint) -> Result<(), Error> {
        tracing::debug!("remove breakpoint {:?}", breakpoint);
        Ok(())
    }

    fn register_list(&self, class: RegisterClass) -> Result<Vec<&Register>, Error> {
        self.registers
            .query(class)
            .map_err(|_| AvrError::OutOfMemory.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TapConfig;
    use crate::core::{BreakpointKind, RegisterId};
    use crate::error::ErrorCode;
    use crate::probe::{fake_probe::FakeAvrProbe, JtagTap, ScanRegister};
    use pretty_assertions::assert_eq;
    use test_case::test_case;

    fn avr(probe: &mut FakeAvrProbe) -> Avr<'_> {
        Avr::new(AvrCommunicationInterface::new(
            probe,
            Some(JtagTap::new(0, instruction::LEN)),
        ))
    }

    fn halted(probe: &mut FakeAvrProbe) -> Avr<'_> {
        let mut avr = avr(probe);
        avr.state = CoreStatus::Halted;
        avr
    }

    #[test]
    fn starts_in_unknown_state() {
        let mut probe = FakeAvrProbe::new();
        let avr = avr(&mut probe);

        assert_eq!(avr.status(), CoreStatus::Unknown);
        assert_eq!(avr.debug_reason(), HaltReason::NotHalted);
    }

    #[test_case(CoreStatus::Running, CoreStatus::Halted ; "running")]
    #[test_case(CoreStatus::DebugRunning, CoreStatus::Halted ; "debug running")]
    #[test_case(CoreStatus::Halted, CoreStatus::Halted ; "halted")]
    #[test_case(CoreStatus::Reset, CoreStatus::Reset ; "reset")]
    #[test_case(CoreStatus::Unknown, CoreStatus::Unknown ; "unknown")]
    fn poll_transitions(before: CoreStatus, after: CoreStatus) {
        let mut probe = FakeAvrProbe::new();
        let mut avr = avr(&mut probe);
        avr.state = before;

        avr.poll().unwrap();

        assert_eq!(avr.status(), after);
    }

    #[test]
    fn halting_a_halted_core_does_nothing() {
        let mut probe = FakeAvrProbe::new();
        {
            let mut avr = halted(&mut probe);
            avr.halt().unwrap();
            assert_eq!(avr.debug_reason(), HaltReason::NotHalted);
        }

        assert_eq!(probe.flush_count(), 0);
    }

    #[test_case(CoreStatus::Unknown ; "unknown")]
    #[test_case(CoreStatus::Running ; "running")]
    #[test_case(CoreStatus::Reset ; "reset")]
    fn halt_requests_and_flushes(state: CoreStatus) {
        let mut probe = FakeAvrProbe::new();
        {
            let mut avr = avr(&mut probe);
            avr.state = state;

            avr.halt().unwrap();

            assert_eq!(avr.debug_reason(), HaltReason::Request);
            assert_eq!(avr.status(), state);
        }

        assert_eq!(probe.flush_count(), 1);
    }

    #[test]
    fn halt_reports_flush_failure() {
        let mut probe = FakeAvrProbe::new();
        probe.fail_next_execute();
        let mut avr = avr(&mut probe);
        avr.state = CoreStatus::Running;

        let error = avr.halt().unwrap_err();

        assert!(matches!(error, Error::Avr(AvrError::Execution(_))));
        assert_eq!(error.code(), ErrorCode::Fail);
    }

    #[test]
    fn resume_and_step_leave_the_core_alone() {
        let mut probe = FakeAvrProbe::new();
        {
            let mut avr = halted(&mut probe);

            avr.resume(true, 0, true, false).unwrap();
            avr.step(false, 0x100, false).unwrap();

            assert_eq!(avr.status(), CoreStatus::Halted);
            assert!(avr.interface().queue().is_empty());
        }

        assert_eq!(probe.flush_count(), 0);
    }

    #[test]
    fn assert_reset_queues_reset_register_scan() {
        let mut probe = FakeAvrProbe::new();
        {
            let mut avr = avr(&mut probe);
            avr.state = CoreStatus::Running;

            avr.assert_reset().unwrap();

            assert_eq!(avr.status(), CoreStatus::Reset);
            let scans: Vec<(ScanRegister, u32, u32)> = avr
                .interface()
                .queued_scans()
                .map(|scan| (scan.register, scan.len(), scan.out_value()))
                .collect();
            assert_eq!(
                scans,
                vec![
                    (ScanRegister::Instruction, 4, 0xC),
                    (ScanRegister::Data, 1, 1),
                ]
            );

            avr.interface_mut().flush_queue().unwrap();
        }

        assert!(probe.reset_asserted());
    }

    #[test]
    fn deassert_reset_issues_no_scans() {
        let mut probe = FakeAvrProbe::new();
        let mut avr = avr(&mut probe);
        avr.assert_reset().unwrap();
        avr.interface_mut().flush_queue().unwrap();

        avr.deassert_reset().unwrap();

        assert_eq!(avr.status(), CoreStatus::Running);
        assert!(avr.interface().queue().is_empty());
    }

    #[test]
    fn memory_access_requires_halted_core() {
        let mut probe = FakeAvrProbe::new();
        let mut avr = avr(&mut probe);
        avr.state = CoreStatus::Running;
        let mut buffer = [0u8; 4];

        // Invalid size too, the halt check comes first.
        let error = avr.read_memory(0x100, 3, 1, &mut buffer).unwrap_err();

        assert!(matches!(error, Error::Avr(AvrError::NotHalted)));
        assert_eq!(error.code(), ErrorCode::NotHalted);
    }

    #[test_case(0x100, 3, 1, 4 ; "size three")]
    #[test_case(0x100, 8, 1, 8 ; "size eight")]
    #[test_case(0x100, 1, 0, 4 ; "zero count")]
    #[test_case(0x100, 1, 1, 0 ; "empty buffer")]
    #[test_case(0x100, 4, 2, 4 ; "short buffer")]
    #[test_case(0x101, 4, 1, 0 ; "argument before alignment")]
    fn memory_access_rejects_bad_arguments(address: u64, size: u32, count: u32, len: usize) {
        let mut probe = FakeAvrProbe::new();
        let mut avr = halted(&mut probe);
        let buffer = vec![0u8; len];

        let error = avr.write_memory(address, size, count, &buffer).unwrap_err();

        assert_eq!(error.code(), ErrorCode::CommandSyntax);
    }

    #[test_case(0x101, 2 ; "odd halfword")]
    #[test_case(0x102, 4 ; "halfword aligned word")]
    #[test_case(0x103, 4 ; "odd word")]
    fn memory_access_checks_alignment(address: u64, size: u32) {
        let mut probe = FakeAvrProbe::new();
        let mut avr = halted(&mut probe);
        let mut buffer = [0u8; 4];

        let error = avr.read_memory(address, size, 1, &mut buffer).unwrap_err();

        assert!(matches!(
            error,
            Error::Avr(AvrError::UnalignedAccess { .. })
        ));
        assert_eq!(error.code(), ErrorCode::UnalignedAccess);
    }

    #[test_case(0x101, 1, 4 ; "bytes anywhere")]
    #[test_case(0x102, 2, 2 ; "halfwords")]
    #[test_case(0x104, 4, 1 ; "word")]
    fn valid_memory_access_succeeds(address: u64, size: u32, count: u32) {
        let mut probe = FakeAvrProbe::new();
        let mut avr = halted(&mut probe);
        let mut buffer = [0u8; 4];

        avr.read_memory(address, size, count, &mut buffer).unwrap();
        avr.write_memory(address, size, count, &buffer).unwrap();
    }

    #[test]
    fn breakpoints_are_accepted() {
        let mut probe = FakeAvrProbe::new();
        let mut avr = halted(&mut probe);
        let breakpoint = Breakpoint {
            address: 0x1F0,
            length: 2,
            kind: BreakpointKind::Hardware,
        };

        avr.add_breakpoint(&breakpoint).unwrap();
        avr.remove_breakpoint(&breakpoint).unwrap();
        // Removing twice is fine as well.
        avr.remove_breakpoint(&breakpoint).unwrap();
    }

    #[test]
    fn register_list_by_class() {
        let mut probe = FakeAvrProbe::new();
        let avr = avr(&mut probe);

        let all = avr.register_list(RegisterClass::All).unwrap();
        let general = avr.register_list(RegisterClass::General).unwrap();

        assert_eq!(all.len(), 36);
        assert_eq!(general.len(), 32);
        assert_eq!(all[35].id(), RegisterId(35));
        assert_eq!(all[35].name(), "pc");
        assert!(!all[32].exists);
    }

    #[test]
    fn init_without_expected_idcode_does_no_io() {
        let mut probe = FakeAvrProbe::new();
        {
            let mut avr = avr(&mut probe);
            avr.init().unwrap();
        }

        assert_eq!(probe.flush_count(), 0);
    }

    #[test]
    fn init_checks_configured_idcode() {
        let mut probe = FakeAvrProbe::new().with_idcode(0x6970_203F);
        let config = AvrTargetConfig {
            name: "atmega128".to_string(),
            tap: Some(TapConfig {
                idcode: Some(0x6970_203F),
                ..TapConfig::default()
            }),
        };
        let mut avr = Avr::from_config(&mut probe, &config);

        avr.init().unwrap();
    }

    #[test]
    fn init_rejects_other_device() {
        // ATmega16
        let mut probe = FakeAvrProbe::new().with_idcode(0x8940_303F);
        let config = AvrTargetConfig {
            name: "atmega128".to_string(),
            tap: Some(TapConfig {
                idcode: Some(0x6970_203F),
                ..TapConfig::default()
            }),
        };
        let mut avr = Avr::from_config(&mut probe, &config);

        let error = avr.init().unwrap_err();

        assert!(matches!(
            error,
            Error::Avr(AvrError::UnexpectedIdCode { .. })
        ));
        assert_eq!(error.code(), ErrorCode::Fail);
    }

    #[test]
    fn target_without_tap_cannot_scan() {
        let mut probe = FakeAvrProbe::new();
        let config = AvrTargetConfig {
            name: "detached".to_string(),
            tap: None,
        };
        let mut avr = Avr::from_config(&mut probe, &config);
        avr.state = CoreStatus::Halted;

        let error = avr.assert_reset().unwrap_err();

        assert!(matches!(error, Error::Avr(AvrError::MissingTap)));
        assert_eq!(avr.status(), CoreStatus::Halted);
        assert!(avr.interface().queue().is_empty());
    }
}
