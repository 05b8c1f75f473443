//! WonderSwan emulator binary.
//!
//! Runs a cartridge headless for a number of frames and optionally dumps
//! the CPU state afterwards.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::{Parser, ValueEnum};
use emu_core::Observable;
use emu_wonderswan::{MachineConfig, Model, RunOutcome, WonderSwan};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Clone, Copy, ValueEnum)]
enum ModelArg {
    /// Monochrome WonderSwan
    Mono,
    /// WonderSwan Color
    Color,
}

impl From<ModelArg> for Model {
    fn from(arg: ModelArg) -> Self {
        match arg {
            ModelArg::Mono => Self::WonderSwan,
            ModelArg::Color => Self::WonderSwanColor,
        }
    }
}

#[derive(Parser, Debug)]
#[command(
    name = "emu-wonderswan",
    about = "Run a WonderSwan cartridge headless on the V30MZ interpreter."
)]
struct Args {
    /// Machine model
    #[arg(long, value_enum, default_value_t = ModelArg::Mono)]
    model: ModelArg,

    /// Bootstrap ROM image (4 KiB mono, 8 KiB color); boots the cartridge
    /// directly when omitted
    #[arg(long, value_name = "FILE")]
    bootstrap: Option<PathBuf>,

    /// Cartridge ROM image
    #[arg(long, value_name = "FILE")]
    rom: PathBuf,

    /// Cartridge SRAM size in bytes
    #[arg(long, value_name = "BYTES", default_value_t = 0)]
    sram: usize,

    /// Frames to run
    #[arg(long, default_value_t = 60)]
    frames: u64,

    /// Print every CPU observable path after running
    #[arg(long, action = clap::ArgAction::SetTrue)]
    dump: bool,
}

fn read_image(path: &Path, what: &str) -> anyhow::Result<Vec<u8>> {
    fs::read(path).with_context(|| format!("reading {what} {}", path.display()))
}

fn main() -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let args = Args::parse();

    let bootstrap = args
        .bootstrap
        .as_deref()
        .map(|path| read_image(path, "bootstrap ROM"))
        .transpose()?;
    let rom = read_image(&args.rom, "cartridge ROM")?;

    let config = MachineConfig {
        model: args.model.into(),
        bootstrap,
        rom,
        sram_size: args.sram,
    };
    let mut machine = WonderSwan::new(&config).context("building machine")?;

    for _ in 0..args.frames {
        if machine.run_frame() == RunOutcome::Intercepted {
            break;
        }
    }

    tracing::info!(
        frames = machine.frame_count(),
        cycles = machine.clock().get(),
        "run finished"
    );

    if args.dump {
        for (path, value) in machine.cpu().snapshot() {
            println!("cpu.{path} = {value}");
        }
    }

    Ok(())
}
