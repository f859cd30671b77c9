//! All the architecture specific code.

pub mod avr;
