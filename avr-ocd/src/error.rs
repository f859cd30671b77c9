use crate::architecture::avr::communication_interface::{AvrError, ErrorKind};
use crate::config::ConfigError;
use crate::probe::DebugProbeError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("An error with the usage of the probe occurred")]
    Probe(#[from] DebugProbeError),
    #[error("An AVR specific error occurred")]
    Avr(#[from] AvrError),
    #[error("The target configuration is invalid")]
    Config(#[from] ConfigError),
}

/// The result code reported to the host debugger.
///
/// Success is reported as `Ok(())`, so only failure codes are listed here.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    /// Generic failure.
    Fail,
    /// The arguments of the request were malformed.
    CommandSyntax,
    /// The request needs a halted target.
    NotHalted,
    /// The memory access is not aligned to its size.
    UnalignedAccess,
}

impl Error {
    /// The code the host debugger should report for this error.
    pub fn code(&self) -> ErrorCode {
        match self {
            Error::Avr(e) => match e.kind() {
                ErrorKind::Argument => ErrorCode::CommandSyntax,
                ErrorKind::Precondition => ErrorCode::NotHalted,
                ErrorKind::Alignment => ErrorCode::UnalignedAccess,
                _ => ErrorCode::Fail,
            },
            Error::Probe(_) | Error::Config(_) => ErrorCode::Fail,
        }
    }
}
