// persists and restores the full VM state tuple: (memory, registers,
// stack, pc). the image is dumped as a raw word sequence, identical to
// the program-image format; the rest is a small serde record.
//
// operates on the individual state components rather than a whole
// `Vm` so the Ctrl-S handler inside `Vm::execute_in` can call `save`
// while its own `input` field is separately borrowed.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{VmError, VmResult};
use crate::image::Image;

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct SnapshotState {
    pub pc: u16,
    pub registers: [u16; 8],
    pub stack: Vec<u16>,
}

pub const DEFAULT_BIN_PATH: &str = "saved.bin";
pub const DEFAULT_JSON_PATH: &str = "saved.json";

/// Writes the two snapshot files. Called synchronously from the `in`
/// control-byte filter on Ctrl-S; failures here are reported by the
/// caller and execution continues, per spec.md §7.
pub fn save(
    image: &Image,
    registers: &[u16; 8],
    stack: &[u16],
    pc: u16,
    bin_path: &Path,
    json_path: &Path,
) -> VmResult<()> {
    image.dump(bin_path)?;
    let state = SnapshotState {
        pc,
        registers: *registers,
        stack: stack.to_vec(),
    };
    let json =
        serde_json::to_string_pretty(&state).map_err(|e| VmError::Snapshot(e.to_string()))?;
    std::fs::write(json_path, json)?;
    Ok(())
}

/// Reads the two snapshot files back into an `Image` and a
/// `SnapshotState`. The caller (`Vm::restore`) replaces memory first,
/// then pc/registers/stack, per spec.md §4.6.
pub fn load(bin_path: &Path, json_path: &Path) -> VmResult<(Image, SnapshotState)> {
    let image = Image::load(bin_path)?;
    let json = std::fs::read_to_string(json_path)?;
    let state: SnapshotState =
        serde_json::from_str(&json).map_err(|e| VmError::Snapshot(e.to_string()))?;
    Ok((image, state))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn round_trip_preserves_full_state() {
        let dir = tempdir().unwrap();
        let bin_path = dir.path().join("saved.bin");
        let json_path = dir.path().join("saved.json");

        let image = Image::new(vec![1, 32768, 65, 19, 32768, 0]);
        let mut registers = [0u16; 8];
        registers[2] = 42;
        let stack = vec![7u16];
        let pc = 3u16;

        save(&image, &registers, &stack, pc, &bin_path, &json_path).unwrap();

        let (restored_image, state) = load(&bin_path, &json_path).unwrap();

        assert_eq!(restored_image.as_slice(), image.as_slice());
        assert_eq!(state.registers, registers);
        assert_eq!(state.stack, stack);
        assert_eq!(state.pc, pc);
    }

    #[test]
    fn stack_contents_round_trip_in_order() {
        let dir = tempdir().unwrap();
        let bin_path = dir.path().join("saved.bin");
        let json_path = dir.path().join("saved.json");

        let image = Image::new(vec![0; 4]);
        let registers = [0u16; 8];
        let stack = vec![1u16, 2, 3];

        save(&image, &registers, &stack, 0, &bin_path, &json_path).unwrap();
        let (_, state) = load(&bin_path, &json_path).unwrap();
        assert_eq!(state.stack, vec![1, 2, 3]);
    }

    #[test]
    fn missing_files_are_a_load_error() {
        let dir = tempdir().unwrap();
        let err = load(
            &dir.path().join("nope.bin"),
            &dir.path().join("nope.json"),
        )
        .unwrap_err();
        assert!(matches!(err, VmError::Load { .. }));
    }
}
