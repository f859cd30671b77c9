//! The interface a host debugger uses to drive a core.

pub mod core_status;
pub mod registers;

pub use core_status::*;
pub use registers::*;

use crate::error::Error;

/// The kind of a breakpoint requested by the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BreakpointKind {
    /// A breakpoint implemented by the debug logic of the core.
    Hardware,
    /// A breakpoint implemented by patching a break instruction into program memory.
    Software,
}

/// A breakpoint as requested by the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Breakpoint {
    /// Program address of the breakpoint.
    pub address: u64,
    /// Length of the instruction at `address`, in bytes.
    pub length: u32,
    /// How the breakpoint should be implemented.
    pub kind: BreakpointKind,
}

/// A generic interface to control a MCU core.
///
/// A host holds a `dyn CoreInterface` and does not need to know which architecture it talks to.
pub trait CoreInterface {
    /// Finish bringing up the target after it was created.
    fn init(&mut self) -> Result<(), Error>;

    /// Returns the current debug state of the core.
    fn status(&self) -> CoreStatus;

    /// Updates the debug state from the hardware.
    fn poll(&mut self) -> Result<(), Error>;

    /// Request the core to halt.
    fn halt(&mut self) -> Result<(), Error>;

    /// Continue to execute instructions.
    ///
    /// If `current` is `false`, execution continues at `address`.
    fn resume(
        &mut self,
        current: bool,
        address: u64,
        handle_breakpoints: bool,
        debug_execution: bool,
    ) -> Result<(), Error>;

    /// Execute a single instruction.
    ///
    /// If `current` is `false`, the instruction at `address` is executed.
    fn step(&mut self, current: bool, address: u64, handle_breakpoints: bool)
        -> Result<(), Error>;

    /// Put the core into reset.
    fn assert_reset(&mut self) -> Result<(), Error>;

    /// Release the core from reset.
    fn deassert_reset(&mut self) -> Result<(), Error>;

    /// Read `count` items of `size` bytes each, starting at `address`, into `buffer`.
    fn read_memory(
        &mut self,
        address: u64,
        size: u32,
        count: u32,
        buffer: &mut [u8],
    ) -> Result<(), Error>;

    /// Write `count` items of `size` bytes each from `buffer`, starting at `address`.
    fn write_memory(
        &mut self,
        address: u64,
        size: u32,
        count: u32,
        buffer: &[u8],
    ) -> Result<(), Error>;

    /// Set a breakpoint.
    fn add_breakpoint(&mut self, breakpoint: &Breakpoint) -> Result<(), Error>;

    /// Clear a breakpoint previously set with [`CoreInterface::add_breakpoint`].
    fn remove_breakpoint(&mut self, breakpoint: &Breakpoint) -> Result<(), Error>;

    /// Returns the registers of `class`, in ascending id order.
    fn register_list(&self, class: RegisterClass) -> Result<Vec<&Register>, Error>;
}
