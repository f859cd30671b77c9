//! # JTAG on-chip debugging for AVR microcontrollers
//!
//! The driver talks to the OCD block of an AVR core through its JTAG TAP. All scans are
//! collected in a queue and executed in batches by a [`JtagAccess`] implementation, which is
//! supplied by the probe driver.
//!
//! # Examples
//!
//! ## Reading the break status
//!
//! ```
//! # use avr_ocd::Error;
//! use avr_ocd::{Avr, AvrTargetConfig, CoreInterface, OcdRegister, probe::fake_probe::FakeAvrProbe};
//!
//! let config = AvrTargetConfig::from_yaml_str(
//!     "name: atmega128\ntap:\n  ir_len: 4\n  idcode: 0x6970203F\n",
//! )?;
//!
//! let mut probe = FakeAvrProbe::new();
//! let mut avr = Avr::from_config(&mut probe, &config);
//!
//! // Checks the IDCODE of the device.
//! avr.init()?;
//!
//! let status = avr
//!     .interface_mut()
//!     .read_ocd_register(OcdRegister::BrkStatus)?;
//! assert_eq!(status, 0);
//! # Ok::<(), Error>(())
//! ```
//!
//! ## Resetting the core
//!
//! ```
//! # use avr_ocd::Error;
//! use avr_ocd::{Avr, AvrTargetConfig, CoreInterface, CoreStatus, probe::fake_probe::FakeAvrProbe};
//!
//! let mut probe = FakeAvrProbe::new();
//! let mut avr = Avr::from_config(&mut probe, &AvrTargetConfig::default());
//!
//! avr.assert_reset()?;
//! assert_eq!(avr.status(), CoreStatus::Reset);
//!
//! // Nothing reaches the target before the queue is flushed.
//! avr.interface_mut().flush_queue()?;
//! # Ok::<(), Error>(())
//! ```

pub mod architecture;
pub mod config;
mod core;
mod error;
pub mod probe;

pub use crate::architecture::avr::{
    communication_interface::{AvrCommunicationInterface, AvrError, ErrorKind},
    ocd::OcdRegister,
    Avr,
};
pub use crate::config::{AvrTargetConfig, ConfigError, TapConfig};
pub use crate::core::{
    Breakpoint, BreakpointKind, CoreInterface, CoreStatus, HaltReason, Register, RegisterClass,
    RegisterDescription, RegisterFile, RegisterId, RegisterKind,
};
pub use crate::error::{Error, ErrorCode};
pub use crate::probe::{DebugProbeError, IdCode, JtagAccess};
