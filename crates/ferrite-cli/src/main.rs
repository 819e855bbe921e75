//! Headless front-end: boot an ELF or a disc image, run frames, and
//! optionally dump scanout to PNG.
//!
//! Log filtering follows `RUST_LOG`, e.g. `RUST_LOG=gif=trace,dmac=debug`.

use std::fs;
use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use log::info;

use ferrite_core::Emulator;

#[derive(Parser)]
#[command(name = "ferrite", about = "PlayStation 2 core emulator", version)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Boot an ELF or ISO and run it.
    Run {
        /// Path to an .elf executable or .iso disc image.
        image: PathBuf,

        /// Console BIOS ROM (required for disc boot).
        #[arg(long)]
        bios: Option<PathBuf>,

        /// Number of frames to run before exiting.
        #[arg(long, default_value_t = 60)]
        frames: u64,

        /// Write the final frame's scanout to this PNG.
        #[arg(long)]
        dump_frame: Option<PathBuf>,
    },
}

fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();
    match cli.command {
        Command::Run { image, bios, frames, dump_frame } => run(image, bios, frames, dump_frame),
    }
}

fn run(image: PathBuf, bios: Option<PathBuf>, frames: u64, dump_frame: Option<PathBuf>) -> Result<()> {
    let mut emulator = Emulator::new();

    if let Some(bios_path) = &bios {
        let rom = fs::read(bios_path)
            .with_context(|| format!("reading BIOS {}", bios_path.display()))?;
        emulator.load_bios(&rom);
        info!("BIOS loaded ({} bytes)", rom.len());
    }

    let extension = image.extension().and_then(|e| e.to_str()).unwrap_or("").to_lowercase();
    match extension.as_str() {
        "elf" => {
            let data = fs::read(&image).with_context(|| format!("reading {}", image.display()))?;
            emulator.load_elf(&data).context("loading ELF")?;
        }
        "iso" => {
            if bios.is_none() {
                bail!("disc boot requires --bios");
            }
            emulator.insert_disc(&image).context("inserting disc")?;
        }
        other => bail!("unsupported image type '{other}' (expected elf or iso)"),
    }

    let mut last_frame = None;
    for frame in 0..frames {
        let info = emulator
            .run_frame()
            .with_context(|| format!("emulation fault in frame {frame}"))?;
        last_frame = Some(info);
    }
    info!("ran {frames} frames");

    if let Some(path) = dump_frame {
        let Some(frame) = last_frame else {
            bail!("no frame was produced");
        };
        if frame.width == 0 || frame.height == 0 {
            bail!("display is not configured; nothing to dump");
        }
        let pixels = frame.buffer.lock().expect("scanout buffer poisoned");
        let mut png = image::RgbaImage::new(frame.width, frame.height);
        for (i, pixel) in png.pixels_mut().enumerate() {
            let value = pixels[i];
            *pixel = image::Rgba([
                value as u8,
                (value >> 8) as u8,
                (value >> 16) as u8,
                (value >> 24) as u8,
            ]);
        }
        png.save(&path).with_context(|| format!("writing {}", path.display()))?;
        info!("frame dumped to {}", path.display());
    }
    Ok(())
}
