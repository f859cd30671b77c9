//! Core registers are described by a static table of [`RegisterDescription`]s per architecture
//! and instantiated into a [`RegisterFile`], which owns the backing storage of all of them.

use std::{collections::TryReserveError, ops::Range};

/// The location of a CPU register. This is not an actual memory address, but the number the
/// host debugger uses to refer to the register.
#[derive(Debug, Copy, Clone, PartialEq, PartialOrd, Ord, Eq, Hash)]
pub struct RegisterId(pub u16);

impl From<RegisterId> for u32 {
    fn from(value: RegisterId) -> Self {
        u32::from(value.0)
    }
}

impl From<u16> for RegisterId {
    fn from(value: u16) -> Self {
        RegisterId(value)
    }
}

/// Which registers a register list query should return.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegisterClass {
    /// Every register slot, including slots that are not backed by a register.
    All,
    /// The general purpose registers only.
    General,
}

/// The role of a register inside the core.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegisterKind {
    /// General purpose register.
    General,
    /// Status register.
    Status,
    /// Stack pointer.
    StackPointer,
    /// Program counter.
    ProgramCounter,
    /// A register number that is not assigned to any register.
    Reserved,
}

/// Static description of a register.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegisterDescription {
    pub(crate) name: &'static str,
    pub(crate) id: RegisterId,
    pub(crate) kind: RegisterKind,
    pub(crate) size_in_bits: usize,
}

impl RegisterDescription {
    /// Get the display name of this register
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Get the number of this register
    pub fn id(&self) -> RegisterId {
        self.id
    }

    /// Get the role of this register
    pub fn kind(&self) -> RegisterKind {
        self.kind
    }

    /// Get the size, in bits, of this register
    pub fn size_in_bits(&self) -> usize {
        self.size_in_bits
    }

    /// Get the size, in bytes, of this register
    pub fn size_in_bytes(&self) -> usize {
        // Always round up
        self.size_in_bits.div_ceil(8)
    }
}

/// A register instance inside a [`RegisterFile`].
///
/// The value lives in the register file's storage; the register only knows where.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Register {
    description: &'static RegisterDescription,
    storage: Range<usize>,
    /// The cached value differs from the value in the core.
    pub dirty: bool,
    /// The cached value has been read from, or written to, the core.
    pub valid: bool,
    /// The register number is backed by an actual register.
    pub exists: bool,
}

impl Register {
    /// The register number.
    pub fn id(&self) -> RegisterId {
        self.description.id
    }

    /// The register name.
    pub fn name(&self) -> &'static str {
        self.description.name
    }

    /// The register width in bits.
    pub fn size_in_bits(&self) -> usize {
        self.description.size_in_bits
    }

    /// The static description the register was created from.
    pub fn description(&self) -> &'static RegisterDescription {
        self.description
    }
}

/// A fixed set of registers and their backing storage.
///
/// Registers are kept in slots indexed by their id. A slot without a register in the
/// description table holds a placeholder whose `exists` flag is cleared.
#[derive(Debug, Clone)]
pub struct RegisterFile {
    registers: Vec<Register>,
    storage: Vec<u8>,
}

impl RegisterFile {
    /// Allocates the storage for every register in `table` and places each register at the slot
    /// given by its id. Values start out invalid and clean.
    ///
    /// # Panics
    ///
    /// Panics if two entries of `table` share an id, or if ids skip a slot that has no
    /// placeholder entry. Both are errors in a static table.
    pub fn new(table: &'static [RegisterDescription]) -> Self {
        let mut registers: Vec<Register> = Vec::with_capacity(table.len());
        let mut offset = 0;

        for description in table {
            assert_eq!(
                usize::from(description.id.0),
                registers.len(),
                "register table must list every id exactly once, in order"
            );

            let size = description.size_in_bytes();
            registers.push(Register {
                description,
                storage: offset..offset + size,
                dirty: false,
                valid: false,
                exists: description.kind != RegisterKind::Reserved,
            });
            offset += size;
        }

        Self {
            registers,
            storage: vec![0; offset],
        }
    }

    /// Returns the registers of `class`, in ascending id order.
    ///
    /// Fails only if the result list cannot be allocated.
    pub fn query(&self, class: RegisterClass) -> Result<Vec<&Register>, TryReserveError> {
        let selected = self.registers.iter().filter(|register| match class {
            RegisterClass::All => true,
            RegisterClass::General => register.description.kind == RegisterKind::General,
        });

        let count = selected.clone().count();
        let mut list = Vec::new();
        list.try_reserve_exact(count)?;
        list.extend(selected);

        Ok(list)
    }

    /// Number of register slots.
    pub fn len(&self) -> usize {
        self.registers.len()
    }

    /// Returns `true` if the file has no slots.
    pub fn is_empty(&self) -> bool {
        self.registers.is_empty()
    }

    /// Looks up a register slot by id.
    pub fn get(&self, id: RegisterId) -> Option<&Register> {
        self.registers.get(usize::from(id.0))
    }

    /// Looks up an existing register by name.
    pub fn by_name(&self, name: &str) -> Option<&Register> {
        self.registers
            .iter()
            .find(|register| register.exists && register.name() == name)
    }

    /// The cached value of a register, least significant byte first.
    pub fn value(&self, id: RegisterId) -> Option<&[u8]> {
        let register = self.get(id)?;
        Some(&self.storage[register.storage.clone()])
    }

    /// Updates the cached value of a register and marks it valid and dirty.
    ///
    /// `value` is truncated or zero extended to the width of the register.
    pub fn set_value(&mut self, id: RegisterId, value: &[u8]) -> Option<()> {
        let register = self.registers.get_mut(usize::from(id.0))?;
        if !register.exists {
            return None;
        }

        let slot = &mut self.storage[register.storage.clone()];
        slot.fill(0);
        let n = slot.len().min(value.len());
        slot[..n].copy_from_slice(&value[..n]);

        register.valid = true;
        register.dirty = true;
        Some(())
    }

    /// Marks the cached value of a register as written back to the core.
    pub fn mark_clean(&mut self, id: RegisterId) {
        if let Some(register) = self.registers.get_mut(usize::from(id.0)) {
            register.dirty = false;
        }
    }

    /// Forgets all cached values, e.g. after the core ran.
    pub fn invalidate(&mut self) {
        for register in &mut self.registers {
            register.valid = false;
            register.dirty = false;
        }
    }
}
