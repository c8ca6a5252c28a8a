//! A virtual machine for the Synacor Challenge bytecode: a tagged-
//! operand fetch-decode-execute loop over 22 opcodes, a separately
//! addressed register file and call/data stack, and the console
//! side-channel (debug toggle, snapshot) bound to the `in` instruction.
//!
//! The binary (`src/main.rs`) is a thin CLI driver; everything that
//! matters is importable as a library so it can be exercised directly
//! in tests without going through a terminal or a file on disk.

pub mod cli;
pub mod console;
pub mod error;
pub mod image;
pub mod machine;
pub mod opcode;
pub mod operand;
pub mod snapshot;
pub mod trace;

pub use error::{VmError, VmResult};
pub use image::Image;
pub use machine::{StepResult, Vm};
