use anyhow::{Context, Result};
use clap::Parser;
use emu_core::logging::LogConfig;
use emu_core::types::Frame;
use emu_core::System;
use emu_megadrive::{Button, MachineConfig, MegaDrive};
use std::fs::{self, File};
use std::io::BufWriter;
use std::path::{Path, PathBuf};

#[derive(Parser)]
struct Args {
    /// Cartridge image (.md, .gen, .bin)
    rom: PathBuf,

    /// Number of frames to run
    #[arg(long, default_value_t = 60)]
    frames: u32,

    /// Use 50 Hz PAL timing
    #[arg(long, default_value_t = false)]
    pal: bool,

    /// Emulate the Japanese console variant
    #[arg(long, default_value_t = false)]
    japanese: bool,

    /// Machine configuration as JSON; --pal and --japanese take precedence
    #[arg(long)]
    config: Option<PathBuf>,

    /// Emulator log levels, e.g. "bus=error,vdp=debug,warn"
    #[arg(long)]
    log: Option<String>,

    /// Buttons held on pad 1 for the whole run, e.g. "up,start"
    #[arg(long, value_delimiter = ',', value_parser = parse_button)]
    hold: Vec<Button>,

    /// Write the last frame to this PNG file
    #[arg(long)]
    dump: Option<PathBuf>,

    /// Print the effective machine configuration as JSON before running
    #[arg(long, default_value_t = false)]
    print_config: bool,
}

fn parse_button(name: &str) -> Result<Button, String> {
    match name.to_ascii_lowercase().as_str() {
        "up" => Ok(Button::Up),
        "down" => Ok(Button::Down),
        "left" => Ok(Button::Left),
        "right" => Ok(Button::Right),
        "a" => Ok(Button::A),
        "b" => Ok(Button::B),
        "c" => Ok(Button::C),
        "start" => Ok(Button::Start),
        other => Err(format!("unknown button: {}", other)),
    }
}

/// Module filter for emulator records only; `emu_cli` and `emu_megadrive` stay at the env level.
const EMULATOR_TARGETS: &str = "emu::";

fn init_logging(spec: Option<&str>) -> Result<()> {
    let mut builder = env_logger::Builder::from_default_env();
    if let Some(spec) = spec {
        LogConfig::global()
            .apply_spec(spec)
            .with_context(|| format!("invalid --log value {:?}", spec))?;
        // Emulator messages are already filtered by LogConfig.
        builder.filter_module(EMULATOR_TARGETS, log::LevelFilter::Trace);
    }
    builder.init();
    Ok(())
}

fn load_config(path: &Path) -> Result<MachineConfig> {
    let json = fs::read_to_string(path)
        .with_context(|| format!("failed to read config {}", path.display()))?;
    MachineConfig::from_json(&json).with_context(|| format!("invalid config {}", path.display()))
}

fn write_png(path: &Path, frame: &Frame) -> Result<()> {
    let file = File::create(path).with_context(|| format!("failed to create {}", path.display()))?;
    let mut encoder = png::Encoder::new(BufWriter::new(file), frame.width, frame.height);
    encoder.set_color(png::ColorType::Rgba);
    encoder.set_depth(png::BitDepth::Eight);

    // Frame pixels are 0xAARRGGBB
    let rgba: Vec<u8> = frame
        .pixels
        .iter()
        .flat_map(|&argb| {
            let [a, r, g, b] = argb.to_be_bytes();
            [r, g, b, a]
        })
        .collect();

    let mut writer = encoder.write_header()?;
    writer.write_image_data(&rgba)?;
    Ok(())
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(args.log.as_deref())?;

    let mut sys = MegaDrive::new();

    if let Some(path) = args.config.as_ref() {
        sys.apply_config(&load_config(path)?)?;
    }
    if args.pal {
        sys.set_pal(true);
    }
    if args.japanese {
        sys.set_japanese(true);
    }

    if args.print_config {
        let effective = MachineConfig {
            pal: sys.pal(),
            japanese: sys.japanese(),
            rom_writeable: sys.rom_writeable(),
            timing: Some(*sys.timing()),
        };
        println!("{}", serde_json::to_string_pretty(&effective)?);
    }

    let rom = fs::read(&args.rom)
        .with_context(|| format!("failed to read ROM {}", args.rom.display()))?;
    sys.mount("cartridge", &rom)?;
    sys.set_held_buttons(&args.hold);

    log::info!(
        "Loaded {} ({} bytes), {} timing, {} cycles per scanline",
        args.rom.display(),
        rom.len(),
        if sys.pal() { "PAL" } else { "NTSC" },
        sys.cycles_per_scanline()
    );

    let mut last = None;
    for fnum in 1..=args.frames {
        let frame = sys.step_frame()?;
        log::debug!("Frame {}: {}x{}", fnum, frame.width, frame.height);
        last = Some(frame);
    }

    match (args.dump.as_ref(), last.as_ref()) {
        (Some(path), Some(frame)) => {
            write_png(path, frame)?;
            println!("Wrote {}x{} frame to {}", frame.width, frame.height, path.display());
        }
        (Some(_), None) => anyhow::bail!("--dump needs at least one frame"),
        _ => println!("Ran {} frames", args.frames),
    }

    Ok(())
}
