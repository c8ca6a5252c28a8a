// raw-mode terminal byte source and the control-key filter used by the
// `in` instruction. kept separate from the interpreter so the opcode
// match never has to know about Ctrl-C/Ctrl-D/Ctrl-S/Ctrl-L.

use std::fs::{File, OpenOptions};
use std::io::{self, Read, Write};
use std::os::unix::io::AsRawFd;

use termios::{Termios, TCSANOW};

use crate::error::{VmError, VmResult};

const CTRL_C: u8 = 3;
const CTRL_D: u8 = 4;
const CTRL_L: u8 = 12;
const CR: u8 = 13;
const LF: u8 = 10;
const CTRL_S: u8 = 19;

/// A single byte delivered by the console filter, or a request for the
/// caller (the interpreter, via `Vm::execute_in`) to perform an
/// out-of-band action before another byte is read.
pub enum ControlEvent {
    Byte(u8),
    ToggleTrace,
    Snapshot,
    Interrupted,
    LoadReserved,
}

/// Anything that can hand the VM one raw byte at a time. `Console` is
/// the real terminal; tests substitute a canned byte queue.
pub trait ByteSource {
    fn read_raw_byte(&mut self) -> VmResult<u8>;
}

/// Opens the controlling terminal in raw mode for the duration of each
/// read and restores the prior terminal state on every exit path,
/// including panics, via `RawModeGuard`'s `Drop`.
pub struct Console {
    tty: File,
}

impl Console {
    pub fn open() -> VmResult<Self> {
        let tty = OpenOptions::new()
            .read(true)
            .write(false)
            .open("/dev/tty")?;
        Ok(Self { tty })
    }
}

impl ByteSource for Console {
    fn read_raw_byte(&mut self) -> VmResult<u8> {
        let fd = self.tty.as_raw_fd();
        let _guard = RawModeGuard::enable(fd)?;
        let mut buf = [0u8; 1];
        self.tty.read_exact(&mut buf)?;
        Ok(buf[0])
    }
}

struct RawModeGuard {
    fd: std::os::unix::io::RawFd,
    original: Termios,
}

impl RawModeGuard {
    fn enable(fd: std::os::unix::io::RawFd) -> VmResult<Self> {
        let original = Termios::from_fd(fd)?;
        let mut raw = original;
        termios::cfmakeraw(&mut raw);
        termios::tcsetattr(fd, TCSANOW, &raw)?;
        Ok(Self { fd, original })
    }
}

impl Drop for RawModeGuard {
    fn drop(&mut self) {
        let _ = termios::tcsetattr(self.fd, TCSANOW, &self.original);
    }
}

/// Classifies one raw byte per spec.md §4.5. CR is normalized to LF
/// here so the rest of the VM never sees a bare 13.
fn classify(byte: u8) -> ControlEvent {
    match byte {
        CTRL_C => ControlEvent::Interrupted,
        CTRL_D => ControlEvent::ToggleTrace,
        CTRL_S => ControlEvent::Snapshot,
        CTRL_L => ControlEvent::LoadReserved,
        CR => ControlEvent::Byte(LF),
        other => ControlEvent::Byte(other),
    }
}

/// Reads and filters bytes from `source` until a program-visible byte
/// is produced, invoking `on_toggle_trace`/`on_snapshot` for the
/// corresponding control bytes and restarting the filter afterward.
/// `on_toggle_trace` is expected to announce the new state (spec.md
/// §4.5: "print a single line indicating the new state"); `on_snapshot`
/// is expected to report and swallow its own failures so a snapshot
/// write error never aborts the VM (spec.md §7).
pub fn read_filtered(
    source: &mut dyn ByteSource,
    mut on_toggle_trace: impl FnMut() -> VmResult<()>,
    mut on_snapshot: impl FnMut() -> VmResult<()>,
) -> VmResult<u8> {
    loop {
        let raw = source.read_raw_byte()?;
        match classify(raw) {
            ControlEvent::Byte(b) => return Ok(b),
            ControlEvent::ToggleTrace => on_toggle_trace()?,
            ControlEvent::Snapshot => on_snapshot()?,
            ControlEvent::LoadReserved => {}
            ControlEvent::Interrupted => return Err(VmError::Interrupted { pc: 0 }),
        }
    }
}

/// Echoes a delivered byte to standard output, as every non-control
/// byte read by `in` must be.
pub fn echo(out: &mut impl Write, byte: u8) -> VmResult<()> {
    out.write_all(&[byte])?;
    out.flush()?;
    Ok(())
}
