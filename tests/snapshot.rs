// Ctrl-S pressed at an `in` prompt should write both snapshot files
// and then resume reading, exercising the whole console-filter path
// rather than calling the snapshot service directly.

use std::collections::VecDeque;
use std::env;

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

#[test]
fn ctrl_s_at_in_prompt_writes_snapshot_then_resumes() {
    // synacor_vm::snapshot::save writes to the cwd-relative default
    // paths; run this test from a scratch directory so it doesn't
    // race other tests writing the same files.
    let dir = tempfile::tempdir().unwrap();
    let original_cwd = env::current_dir().unwrap();
    env::set_current_dir(dir.path()).unwrap();

    let result = (|| {
        let mut vm = Vm::new(
            Image::new(vec![20, 32768, 0]),
            false,
            Box::new(QueueSource(VecDeque::from([19, b'z']))),
            Box::new(Vec::new()),
        );
        vm.run().unwrap();
        assert_eq!(vm.registers()[0], b'z' as u16);

        assert!(dir.path().join("saved.bin").exists());
        assert!(dir.path().join("saved.json").exists());
    })();

    env::set_current_dir(original_cwd).unwrap();
    result
}
