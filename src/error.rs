// error handling and fallible return values for the interpreter

use std::path::PathBuf;

use thiserror::Error;

/// Every fatal condition the VM can raise, plus the boundary I/O errors
/// from the loader, snapshot service, and terminal.
#[derive(Debug, Error)]
pub enum VmError {
    #[error("could not load program image {path}: {source}")]
    Load {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("program image {path} has odd length {len} bytes, expected a multiple of 2")]
    OddImageLength { path: PathBuf, len: usize },

    #[error("invalid operand {raw} at pc={pc}")]
    InvalidOperand { raw: u16, pc: u16 },

    #[error("operand {raw} at pc={pc} is not a register")]
    NotARegister { raw: u16, pc: u16 },

    #[error("unknown opcode {code} at pc={pc}")]
    UnknownOpcode { code: u16, pc: u16 },

    #[error("stack underflow at pc={pc}")]
    StackUnderflow { pc: u16 },

    #[error("division or modulus by zero at pc={pc}")]
    DivideByZero { pc: u16 },

    #[error("program counter {pc} out of bounds")]
    ProgramCounterOutOfBounds { pc: u16 },

    #[error("terminal I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("snapshot error: {0}")]
    Snapshot(String),

    #[error("interrupted at pc={pc}")]
    Interrupted { pc: u16 },
}

pub type VmResult<T> = Result<T, VmError>;
