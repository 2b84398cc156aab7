use anyhow::{Context, Result};
use clap::Parser;
use emu_core::logging::{LogCategory, LogConfig, LogLevel};
use emu_core::System;
use emu_pc::{BootPriority, PcSystem};
use std::fs::File;
use std::io::Write;

/// Run the PC core headlessly: mount disk images, boot, execute frames,
/// optionally print a debug trace per frame, and dump a save state.
#[derive(Parser)]
struct Args {
    /// Raw floppy disk image mounted at drive 0x00
    #[arg(long)]
    fd0: Option<String>,

    /// Raw hard disk image mounted at drive 0x80
    #[arg(long)]
    hd0: Option<String>,

    /// Boot priority: "floppy" (default), "harddisk", "floppy-only", "harddisk-only"
    #[arg(long, default_value = "floppy")]
    boot: String,

    /// BIOS ROM image installed at 0xF0000
    #[arg(long)]
    bios: Option<String>,

    /// Target instructions per scheduler quantum (pacing only, not cycle-exact)
    #[arg(long, default_value_t = emu_pc::DEFAULT_QUANTUM)]
    speed: u32,

    /// Print per-frame register/cycle state instead of running silently
    #[arg(long, default_value_t = false)]
    console: bool,

    /// Increase core log verbosity: -v Warn, -vv Info, -vvv Debug, -vvvv Trace
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Number of scheduler quanta (frames) to run
    #[arg(long, default_value_t = 60)]
    frames: u32,

    /// Dump save-state to this file as JSON
    #[arg(long, default_value = "state.json")]
    save: String,
}

fn boot_priority(s: &str) -> Result<BootPriority> {
    match s {
        "floppy" => Ok(BootPriority::FloppyFirst),
        "harddisk" => Ok(BootPriority::HardDriveFirst),
        "floppy-only" => Ok(BootPriority::FloppyOnly),
        "harddisk-only" => Ok(BootPriority::HardDriveOnly),
        other => anyhow::bail!("unknown --boot value: {other}"),
    }
}

fn apply_verbosity(verbose: u8) {
    let level = match verbose {
        0 => LogLevel::Error,
        1 => LogLevel::Warn,
        2 => LogLevel::Info,
        3 => LogLevel::Debug,
        _ => LogLevel::Trace,
    };
    let log = LogConfig::global();
    log.set_global_level(level);
    for category in [
        LogCategory::CPU,
        LogCategory::Bus,
        LogCategory::Interrupts,
        LogCategory::Stubs,
    ] {
        log.set_level(category, level);
    }
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();
    apply_verbosity(args.verbose);

    let mut sys = PcSystem::new();
    sys.set_boot_priority(boot_priority(&args.boot)?);
    sys.set_quantum(args.speed);

    if let Some(path) = args.bios.as_ref() {
        sys.load_bios(path, true)
            .with_context(|| format!("loading BIOS image {path}"))?;
    }
    if let Some(path) = args.fd0.as_ref() {
        sys.load_disk(0x00, path, true)
            .with_context(|| format!("loading floppy image {path}"))?;
    }
    if let Some(path) = args.hd0.as_ref() {
        sys.load_disk(0x80, path, true)
            .with_context(|| format!("loading hard disk image {path}"))?;
    }
    sys.reset();

    for frame_num in 1..=args.frames {
        let frame = sys.step_frame().map_err(anyhow::Error::new)?;
        if args.console {
            let info = sys.debug_info();
            println!(
                "frame {frame_num}: {}x{} cs:ip={:04x}:{:04x} ax={:04x} cycles={}",
                frame.width, frame.height, info.cs, info.ip, info.ax, info.cycles
            );
        }
    }

    let state = sys.save_state();
    let mut f = File::create(&args.save)?;
    write!(f, "{}", serde_json::to_string_pretty(&state)?)?;

    Ok(())
}
