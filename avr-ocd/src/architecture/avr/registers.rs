//! AVR register descriptions.
//!
//! The numbering follows the register numbers host debuggers use for AVR: the 32 working
//! registers first, then SREG, SP and PC. Number 32 is not assigned to any register.

use crate::core::{RegisterDescription, RegisterId, RegisterKind};

/// The status register.
pub const SREG: RegisterId = RegisterId(33);
/// The stack pointer.
pub const SP: RegisterId = RegisterId(34);
/// The program counter.
pub const PC: RegisterId = RegisterId(35);

/// Number of register slots, including the unassigned one.
pub const AVR_REGISTER_COUNT: usize = 36;

const fn gpr(name: &'static str, id: u16) -> RegisterDescription {
    RegisterDescription {
        name,
        id: RegisterId(id),
        kind: RegisterKind::General,
        size_in_bits: 8,
    }
}

/// All AVR register slots, ordered by id.
pub static AVR_REGISTERS: &[RegisterDescription] = &[
    gpr("r0", 0),
    gpr("r1", 1),
    gpr("r2", 2),
    gpr("r3", 3),
    gpr("r4", 4),
    gpr("r5", 5),
    gpr("r6", 6),
    gpr("r7", 7),
    gpr("r8", 8),
    gpr("r9", 9),
    gpr("r10", 10),
    gpr("r11", 11),
    gpr("r12", 12),
    gpr("r13", 13),
    gpr("r14", 14),
    gpr("r15", 15),
    gpr("r16", 16),
    gpr("r17", 17),
    gpr("r18", 18),
    gpr("r19", 19),
    gpr("r20", 20),
    gpr("r21", 21),
    gpr("r22", 22),
    gpr("r23", 23),
    gpr("r24", 24),
    gpr("r25", 25),
    gpr("r26", 26),
    gpr("r27", 27),
    gpr("r28", 28),
    gpr("r29", 29),
    gpr("r30", 30),
    gpr("r31", 31),
    // Placeholder, so that ids keep matching slot indices.
    RegisterDescription {
        name: "reserved",
        id: RegisterId(32),
        kind: RegisterKind::Reserved,
        size_in_bits: 0,
    },
    RegisterDescription {
        name: "sreg",
        id: SREG,
        kind: RegisterKind::Status,
        size_in_bits: 8,
    },
    RegisterDescription {
        name: "sp",
        id: SP,
        kind: RegisterKind::StackPointer,
        size_in_bits: 16,
    },
    RegisterDescription {
        name: "pc",
        id: PC,
        kind: RegisterKind::ProgramCounter,
        size_in_bits: 16,
    },
];
