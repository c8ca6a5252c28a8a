// end-to-end scenarios from spec.md §8, built in-process from raw
// memory images so no challenge.bin/terminal is required.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use synacor_vm::console::ByteSource;
use synacor_vm::error::VmError;
use synacor_vm::{Image, Vm};

struct QueueSource(VecDeque<u8>);

impl ByteSource for QueueSource {
    fn read_raw_byte(&mut self) -> synacor_vm::VmResult<u8> {
        self.0.pop_front().ok_or(VmError::Io(std::io::Error::new(
            std::io::ErrorKind::UnexpectedEof,
            "no more input",
        )))
    }
}

#[derive(Clone, Default)]
struct SharedBuffer(Arc<Mutex<Vec<u8>>>);

impl std::io::Write for SharedBuffer {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.lock().unwrap().write(buf)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

fn run_capturing(words: Vec<u16>, input: Vec<u8>) -> (Result<(), VmError>, Vec<u8>) {
    let buffer = SharedBuffer::default();
    let mut vm = Vm::new(
        Image::new(words),
        false,
        Box::new(QueueSource(VecDeque::from(input))),
        Box::new(buffer.clone()),
    );
    let result = vm.run();
    let captured = buffer.0.lock().unwrap().clone();
    (result, captured)
}

#[test]
fn hello_program_prints_hi_and_exits_cleanly() {
    let (result, output) = run_capturing(vec![19, 72, 19, 105, 0], vec![]);
    assert!(result.is_ok());
    assert_eq!(output, b"Hi");
}

#[test]
fn register_set_and_print() {
    let (result, output) = run_capturing(vec![1, 32768, 65, 19, 32768, 0], vec![]);
    assert!(result.is_ok());
    assert_eq!(output, b"A");
}

#[test]
fn call_ret_returns_cleanly_with_empty_stack() {
    let buffer = SharedBuffer::default();
    let mut vm = Vm::new(
        Image::new(vec![17, 4, 0, 0, 21, 18]),
        false,
        Box::new(QueueSource(VecDeque::new())),
        Box::new(buffer),
    );
    vm.run().unwrap();
    assert!(vm.stack().is_empty());
}

#[test]
fn arithmetic_modulus_prints_byte_four() {
    let (result, output) = run_capturing(vec![9, 32768, 32767, 5, 19, 32768, 0], vec![]);
    assert!(result.is_ok());
    assert_eq!(output, vec![4]);
}

#[test]
fn bitwise_not_computes_expected_register_value() {
    let buffer = SharedBuffer::default();
    let mut vm = Vm::new(
        Image::new(vec![14, 32768, 170, 19, 32768, 0]),
        false,
        Box::new(QueueSource(VecDeque::new())),
        Box::new(buffer),
    );
    vm.run().unwrap();
    assert_eq!(vm.registers()[0], 32767 ^ 170);
}

#[test]
fn ctrl_c_during_in_exits_with_failure_and_no_output() {
    let (result, output) = run_capturing(vec![20, 32768, 0], vec![3]);
    assert!(matches!(result, Err(VmError::Interrupted { .. })));
    assert!(output.is_empty());
}
