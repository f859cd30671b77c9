/// The debug state of the core, as tracked by the driver.
#[derive(Debug, PartialEq, Eq, Copy, Clone, Default)]
pub enum CoreStatus {
    /// The core state is currently unknown. This is always the case when the core is first created.
    #[default]
    Unknown,
    /// The core is currently running.
    Running,
    /// The core is running code on behalf of the debugger.
    DebugRunning,
    /// The core is currently halted.
    Halted,
    /// The core is held in reset.
    Reset,
}

impl CoreStatus {
    /// Returns `true` if the core is currently halted.
    pub fn is_halted(&self) -> bool {
        *self == Self::Halted
    }

    /// Returns `true` if the core is running, either on its own or for the debugger.
    pub fn is_running(&self) -> bool {
        matches!(self, Self::Running | Self::DebugRunning)
    }
}

/// The reason why a core was, or is about to be, halted.
#[derive(Debug, PartialEq, Eq, Copy, Clone, Default)]
pub enum HaltReason {
    /// The core has not been halted by the debugger.
    #[default]
    NotHalted,
    /// Core halted because of a debugger request
    Request,
    /// Core halted due to a breakpoint.
    Breakpoint,
    /// Core halted after single step
    Step,
    /// Unknown reason for halt.
    ///
    /// This can happen for example when the core is already halted when we connect.
    Unknown,
}
