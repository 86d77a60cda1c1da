// LabWired - Firmware Simulation Platform
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

use anyhow::Context;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;
use stm32_mcu_core::capabilities::{Capabilities, PRESET_NAMES};
use stm32_mcu_core::memory::{AddressSpace, ProgramImage};
use stm32_mcu_core::system::builder::{build_mcu, BuildOptions};
use stm32_mcu_core::system::stm32::FLASH_ALIAS_BASE;
use stm32_mcu_core::Stm32Mcu;
use tracing::{error, info};

const EXIT_OK: u8 = 0;
const EXIT_CONFIG_ERROR: u8 = 2;

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "Assemble an STM32 MCU from its capabilities and report what was built",
    long_about = None
)]
struct Cli {
    /// Path to the board manifest (YAML)
    #[arg(short, long)]
    board: Option<PathBuf>,

    /// Path to a chip descriptor (YAML); overrides the board's chip
    #[arg(short, long, conflicts_with = "part")]
    chip: Option<PathBuf>,

    /// Built-in part name, e.g. stm32f407vg
    #[arg(short, long)]
    part: Option<String>,

    /// External high-speed crystal frequency
    #[arg(long)]
    hse_freq_hz: Option<u32>,

    /// External low-speed crystal frequency
    #[arg(long)]
    lse_freq_hz: Option<u32>,

    /// Raw firmware image, programmed at 0x08000000
    #[arg(short, long)]
    firmware: Option<PathBuf>,

    /// Number of system resets to apply after assembly
    #[arg(long, default_value = "0")]
    resets: u32,

    /// Print the MCU snapshot as JSON instead of a summary
    #[arg(long)]
    json: bool,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    trace: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// List the built-in parts
    Parts,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let level = if cli.trace {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Some(Commands::Parts) => run_parts(),
        None => run_assemble(cli),
    }
}

fn run_parts() -> ExitCode {
    for name in PRESET_NAMES {
        let Some(caps) = Capabilities::preset(name) else {
            continue;
        };
        println!(
            "{:<12} {}  flash {:>5} KiB  sram {:>4} KiB  gpio {}  serial {}",
            caps.name,
            caps.family,
            caps.flash_size_kb,
            caps.sram_size_kb,
            caps.gpio.bits().count_ones(),
            caps.serial.bits().count_ones()
        );
    }
    ExitCode::from(EXIT_OK)
}

fn run_assemble(cli: Cli) -> ExitCode {
    let opts = BuildOptions {
        board: cli.board.clone(),
        chip: cli.chip.clone(),
        part: cli.part.clone(),
        hse_freq_hz: cli.hse_freq_hz,
        lse_freq_hz: cli.lse_freq_hz,
    };

    match assemble(&cli, &opts) {
        Ok((mcu, sysmem)) => {
            if cli.json {
                match mcu.snapshot(&sysmem).to_json() {
                    Ok(json) => println!("{}", json),
                    Err(e) => {
                        error!("Failed to serialize snapshot: {}", e);
                        return ExitCode::from(EXIT_CONFIG_ERROR);
                    }
                }
            } else {
                print_summary(&mcu, &sysmem);
            }
            ExitCode::from(EXIT_OK)
        }
        Err(e) => {
            error!("{:#}", e);
            ExitCode::from(EXIT_CONFIG_ERROR)
        }
    }
}

fn assemble(cli: &Cli, opts: &BuildOptions) -> anyhow::Result<(Stm32Mcu, AddressSpace)> {
    let (mut mcu, mut sysmem) = build_mcu(opts)?;

    if let Some(path) = &cli.firmware {
        info!("Loading firmware: {:?}", path);
        let data =
            std::fs::read(path).with_context(|| format!("Failed to read firmware {:?}", path))?;
        let image = ProgramImage::from_raw(FLASH_ALIAS_BASE, data);
        mcu.load_firmware(&mut sysmem, &image)?;
    }

    for _ in 0..cli.resets {
        mcu.reset();
    }
    Ok((mcu, sysmem))
}

fn print_summary(mcu: &Stm32Mcu, sysmem: &AddressSpace) {
    let caps = mcu.capabilities();
    println!("Part: {} (STM32 {})", caps.name, caps.family);
    println!(
        "Clocks: HSI {} Hz, LSI {} Hz, HSE {} Hz, LSE {} Hz",
        caps.hsi_freq_hz,
        caps.lsi_freq_hz,
        mcu.hse_freq_hz(),
        mcu.lse_freq_hz()
    );

    println!("Devices:");
    for (_, path, dev) in mcu.tree().iter() {
        println!("  {:<32} {}", path, dev.type_name());
    }

    println!("Memory map:");
    for m in sysmem.mappings() {
        println!(
            "  {:#010x}-{:#010x}  {:<16} {}{}",
            m.base,
            m.base + m.size - 1,
            m.name,
            m.kind,
            if m.readonly { " (ro)" } else { "" }
        );
    }
}
