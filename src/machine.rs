// the fetch-decode-execute loop: the hard part of this crate. every
// opcode is specified purely in terms of `operand::resolve` and
// `operand::register_index` — no opcode body ever inspects a raw cell
// directly.

use std::io::Write;
use std::path::Path;

use crate::console::{self, ByteSource};
use crate::error::{VmError, VmResult};
use crate::image::Image;
use crate::operand;
use crate::opcode::Opcode;
use crate::snapshot::{self, SnapshotState};
use crate::trace;

const WORD_MASK: u32 = 0x7fff;

pub enum StepResult {
    Continue,
    Halted,
}

/// The full VM state (memory, registers, stack, pc) plus the console
/// and output handles that make it runnable. `input`/`output` are
/// boxed trait objects so tests can substitute canned byte sources and
/// capture buffers for the real terminal/stdout.
pub struct Vm {
    image: Image,
    registers: [u16; 8],
    stack: Vec<u16>,
    pc: u16,
    trace: bool,
    input: Box<dyn ByteSource>,
    output: Box<dyn Write>,
}

impl Vm {
    pub fn new(
        image: Image,
        trace: bool,
        input: Box<dyn ByteSource>,
        output: Box<dyn Write>,
    ) -> Self {
        Self {
            image,
            registers: [0; 8],
            stack: Vec::new(),
            pc: 0,
            trace,
            input,
            output,
        }
    }

    #[cfg(test)]
    pub fn new_headless(image: Image, input: Box<dyn ByteSource>, output: Box<dyn Write>) -> Self {
        Self::new(image, false, input, output)
    }

    pub fn image(&self) -> &Image {
        &self.image
    }

    pub fn registers(&self) -> &[u16; 8] {
        &self.registers
    }

    #[cfg(test)]
    pub fn registers_mut(&mut self) -> &mut [u16; 8] {
        &mut self.registers
    }

    pub fn stack(&self) -> &[u16] {
        &self.stack
    }

    #[cfg(test)]
    pub fn stack_mut(&mut self) -> &mut Vec<u16> {
        &mut self.stack
    }

    pub fn pc(&self) -> u16 {
        self.pc
    }

    #[cfg(test)]
    pub fn set_pc(&mut self, pc: u16) {
        self.pc = pc;
    }

    pub fn trace_enabled(&self) -> bool {
        self.trace
    }

    /// Replaces memory, then pc/registers/stack, per spec.md §4.6.
    pub fn restore(&mut self, image: Image, state: SnapshotState) {
        self.image = image;
        self.pc = state.pc;
        self.registers = state.registers;
        self.stack = state.stack;
    }

    pub fn load_snapshot(&mut self, bin_path: &Path, json_path: &Path) -> VmResult<()> {
        let (image, state) = snapshot::load(bin_path, json_path)?;
        self.restore(image, state);
        Ok(())
    }

    /// Runs until `halt`, an empty-stack `ret`, or a fatal error.
    pub fn run(&mut self) -> VmResult<()> {
        loop {
            match self.step() {
                Ok(StepResult::Continue) => continue,
                Ok(StepResult::Halted) => return Ok(()),
                Err(e) => return Err(e),
            }
        }
    }

    /// Executes exactly one instruction, fetching fresh from `image`
    /// every time — `wmem` can overwrite code ahead of the pc, so there
    /// is no decoded-instruction cache to invalidate.
    pub fn step(&mut self) -> VmResult<StepResult> {
        if self.trace {
            trace::emit(&self.image, self.pc, &self.registers, &self.stack);
        }

        let code = self.image.read_raw(self.pc)?;
        let opcode = Opcode::decode(code).ok_or(VmError::UnknownOpcode {
            code,
            pc: self.pc,
        })?;

        match opcode {
            Opcode::Halt => return Ok(StepResult::Halted),

            Opcode::Set => {
                let dst = operand::register_index(self.operand_raw(0)?, self.pc)?;
                let a = operand::resolve(self.operand_raw(1)?, &self.registers, self.pc)?;
                self.registers[dst] = a;
                self.advance(opcode);
            }

            Opcode::Push => {
                let a = operand::resolve(self.operand_raw(0)?, &self.registers, self.pc)?;
                self.stack.push(a);
                self.advance(opcode);
            }

            Opcode::Pop => {
                let dst = operand::register_index(self.operand_raw(0)?, self.pc)?;
                let value = self.pop()?;
                self.registers[dst] = value;
                self.advance(opcode);
            }

            Opcode::Eq => {
                let dst = operand::register_index(self.operand_raw(0)?, self.pc)?;
                let a = operand::resolve(self.operand_raw(1)?, &self.registers, self.pc)?;
                let b = operand::resolve(self.operand_raw(2)?, &self.registers, self.pc)?;
                self.registers[dst] = (a == b) as u16;
                self.advance(opcode);
            }

            Opcode::Gt => {
                let dst = operand::register_index(self.operand_raw(0)?, self.pc)?;
                let a = operand::resolve(self.operand_raw(1)?, &self.registers, self.pc)?;
                let b = operand::resolve(self.operand_raw(2)?, &self.registers, self.pc)?;
                self.registers[dst] = (a > b) as u16;
                self.advance(opcode);
            }

            Opcode::Jmp => {
                let target = operand::resolve(self.operand_raw(0)?, &self.registers, self.pc)?;
                self.pc = target;
            }

            Opcode::Jt => {
                let cond = operand::resolve(self.operand_raw(0)?, &self.registers, self.pc)?;
                let target = operand::resolve(self.operand_raw(1)?, &self.registers, self.pc)?;
                if cond != 0 {
                    self.pc = target;
                } else {
                    self.advance(opcode);
                }
            }

            Opcode::Jf => {
                let cond = operand::resolve(self.operand_raw(0)?, &self.registers, self.pc)?;
                let target = operand::resolve(self.operand_raw(1)?, &self.registers, self.pc)?;
                if cond == 0 {
                    self.pc = target;
                } else {
                    self.advance(opcode);
                }
            }

            Opcode::Add => {
                let dst = operand::register_index(self.operand_raw(0)?, self.pc)?;
                let a = operand::resolve(self.operand_raw(1)?, &self.registers, self.pc)?;
                let b = operand::resolve(self.operand_raw(2)?, &self.registers, self.pc)?;
                self.registers[dst] = (((a as u32) + (b as u32)) & WORD_MASK) as u16;
                self.advance(opcode);
            }

            Opcode::Mult => {
                let dst = operand::register_index(self.operand_raw(0)?, self.pc)?;
                let a = operand::resolve(self.operand_raw(1)?, &self.registers, self.pc)?;
                let b = operand::resolve(self.operand_raw(2)?, &self.registers, self.pc)?;
                self.registers[dst] = (((a as u32) * (b as u32)) % 32768) as u16;
                self.advance(opcode);
            }

            Opcode::Mod => {
                let dst = operand::register_index(self.operand_raw(0)?, self.pc)?;
                let a = operand::resolve(self.operand_raw(1)?, &self.registers, self.pc)?;
                let b = operand::resolve(self.operand_raw(2)?, &self.registers, self.pc)?;
                if b == 0 {
                    return Err(VmError::DivideByZero { pc: self.pc });
                }
                self.registers[dst] = a % b;
                self.advance(opcode);
            }

            Opcode::And => {
                let dst = operand::register_index(self.operand_raw(0)?, self.pc)?;
                let a = operand::resolve(self.operand_raw(1)?, &self.registers, self.pc)?;
                let b = operand::resolve(self.operand_raw(2)?, &self.registers, self.pc)?;
                self.registers[dst] = a & b;
                self.advance(opcode);
            }

            Opcode::Or => {
                let dst = operand::register_index(self.operand_raw(0)?, self.pc)?;
                let a = operand::resolve(self.operand_raw(1)?, &self.registers, self.pc)?;
                let b = operand::resolve(self.operand_raw(2)?, &self.registers, self.pc)?;
                self.registers[dst] = a | b;
                self.advance(opcode);
            }

            Opcode::Not => {
                let dst = operand::register_index(self.operand_raw(0)?, self.pc)?;
                let a = operand::resolve(self.operand_raw(1)?, &self.registers, self.pc)?;
                self.registers[dst] = a ^ 0x7fff;
                self.advance(opcode);
            }

            Opcode::Rmem => {
                let dst = operand::register_index(self.operand_raw(0)?, self.pc)?;
                let addr = operand::resolve(self.operand_raw(1)?, &self.registers, self.pc)?;
                self.registers[dst] = self.image.read(addr)?;
                self.advance(opcode);
            }

            Opcode::Wmem => {
                let addr = operand::resolve(self.operand_raw(0)?, &self.registers, self.pc)?;
                let value = operand::resolve(self.operand_raw(1)?, &self.registers, self.pc)?;
                self.image.write(addr, value)?;
                self.advance(opcode);
            }

            Opcode::Call => {
                let target = operand::resolve(self.operand_raw(0)?, &self.registers, self.pc)?;
                self.stack.push(self.pc.wrapping_add(2));
                self.pc = target;
            }

            Opcode::Ret => match self.stack.pop() {
                Some(target) => self.pc = target,
                None => return Err(VmError::StackUnderflow { pc: self.pc }),
            },

            Opcode::Out => {
                let a = operand::resolve(self.operand_raw(0)?, &self.registers, self.pc)?;
                self.output.write_all(&[(a & 0xff) as u8])?;
                self.output.flush()?;
                self.advance(opcode);
            }

            Opcode::In => {
                self.execute_in(self.operand_raw(0)?)?;
                self.advance(opcode);
            }

            Opcode::Noop => {
                self.advance(opcode);
            }
        }

        Ok(StepResult::Continue)
    }

    fn advance(&mut self, opcode: Opcode) {
        self.pc = self.pc.wrapping_add(opcode.width() as u16);
    }

    /// Raw cell at `offset` words past the opcode currently at `pc`.
    fn operand_raw(&self, offset: u16) -> VmResult<u16> {
        self.image.read_raw(self.pc.wrapping_add(1).wrapping_add(offset))
    }

    fn pop(&mut self) -> VmResult<u16> {
        self.stack
            .pop()
            .ok_or(VmError::StackUnderflow { pc: self.pc })
    }

    /// Reads one filtered byte from the console, handling Ctrl-D
    /// (toggle trace mode and announce the new state) and Ctrl-S
    /// (snapshot, reported on failure rather than fatal) without the
    /// rest of the opcode match knowing about them, then stores the
    /// delivered byte at the destination named by `dst_raw` — a
    /// register if it is a register reference, a memory address
    /// otherwise (spec.md §4.5).
    fn execute_in(&mut self, dst_raw: u16) -> VmResult<()> {
        let pc = self.pc;
        let byte = console::read_filtered(
            &mut *self.input,
            || {
                self.trace = !self.trace;
                let state = if self.trace { "on" } else { "off" };
                writeln!(self.output, "trace mode: {state}")?;
                Ok(())
            },
            || {
                if let Err(e) = snapshot::save(
                    &self.image,
                    &self.registers,
                    &self.stack,
                    self.pc,
                    Path::new(snapshot::DEFAULT_BIN_PATH),
                    Path::new(snapshot::DEFAULT_JSON_PATH),
                ) {
                    tracing::error!("failed to write snapshot: {e}");
                    eprintln!("failed to write snapshot: {e}");
                }
                Ok(())
            },
        )
        .map_err(|e| match e {
            VmError::Interrupted { .. } => VmError::Interrupted { pc },
            other => other,
        })?;

        console::echo(&mut self.output, byte)?;

        let value = byte as u16;
        if let Ok(reg) = operand::register_index(dst_raw, pc) {
            self.registers[reg] = value;
        } else {
            let addr = operand::resolve(dst_raw, &self.registers, pc)?;
            self.image.write(addr, value)?;
        }
        Ok(())
    }
}
