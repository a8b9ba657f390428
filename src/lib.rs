//! Intcode virtual machine library.
//!
//! Provides the Intcode executor, its assembler and disassembler, and drivers
//! that compose several VMs into pipelines, networks and device loops.

pub mod composition;
pub mod utils;
pub mod virtual_machine;
