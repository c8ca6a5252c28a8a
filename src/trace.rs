// diagnostic single-block dump emitted before each instruction when
// trace mode is on. not part of any compatibility contract — format
// may change freely.

use crate::image::Image;

/// Builds the multi-line trace block for the instruction about to
/// execute at `pc`: position, the next up to four raw cells, the
/// register file, and the full stack.
pub fn format_block(image: &Image, pc: u16, registers: &[u16; 8], stack: &[u16]) -> String {
    let next: Vec<u16> = (0..4u16)
        .filter_map(|i| image.read_raw(pc.wrapping_add(i)).ok())
        .collect();

    format!(
        "--- trace ---\npc: {pc}\nnext: {next:?}\nregisters: {registers:?}\nstack: {stack:?}"
    )
}

/// Emits the block through `tracing`, gated by the VM's own trace
/// flag rather than `RUST_LOG` — Ctrl-D is a player-controlled VM
/// feature, not an operator log-level concern. `main.rs` forces this
/// module's directive to `trace` unconditionally so `--log-level`
/// can never suppress a dump the VM flag says should appear.
pub fn emit(image: &Image, pc: u16, registers: &[u16; 8], stack: &[u16]) {
    tracing::trace!("{}", format_block(image, pc, registers, stack));
}
