use std::process::ExitCode;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use synacor_vm::cli::Cli;
use synacor_vm::console::Console;
use synacor_vm::error::VmError;
use synacor_vm::{Image, Vm};

fn main() -> ExitCode {
    let cli = Cli::parse();

    // The VM's own trace flag (toggled by `-d`/Ctrl-D) is the sole gate on
    // the per-instruction trace dump; it must not additionally get
    // filtered out by the operator-facing `--log-level`, so the trace
    // module's events always pass the subscriber regardless of that level.
    let filter = EnvFilter::new(&cli.log_level)
        .add_directive("synacor_vm::trace=trace".parse().expect("valid directive"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{e}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: &Cli) -> Result<(), VmError> {
    let console = Console::open()?;
    let stdout = std::io::stdout();

    let image = Image::load(&cli.image)?;
    let mut vm = Vm::new(image, cli.debug, Box::new(console), Box::new(stdout));

    if cli.load {
        vm.load_snapshot(&cli.snapshot_bin, &cli.snapshot_json)?;
        tracing::info!(
            bin = %cli.snapshot_bin.display(),
            json = %cli.snapshot_json.display(),
            "restored VM state from snapshot"
        );
    }

    vm.run()
}
