// LabWired - Firmware Simulation Platform
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

use crate::capabilities::Capabilities;
use crate::chardev::{
    shared, CharBackendRef, FileBackend, HostSerial, NullBackend, StdoutBackend,
    DEFAULT_MAX_SERIAL_PORTS,
};
use crate::memory::AddressSpace;
use crate::ports::{Port, SerialPort};
use crate::system::stm32::{McuBuilder, Stm32Mcu};
use anyhow::Context;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use stm32_mcu_config::{BoardManifest, ChipDescriptor, SerialBackendKind, SerialBinding};
use tracing::info;

pub const DEFAULT_PART: &str = "stm32f103rb";

/// Where the MCU description comes from. Explicit `chip`/`part` win over the
/// board's own choice; crystal overrides win over the board's values.
#[derive(Debug, Clone, Default)]
pub struct BuildOptions {
    pub board: Option<PathBuf>,
    pub chip: Option<PathBuf>,
    pub part: Option<String>,
    pub hse_freq_hz: Option<u32>,
    pub lse_freq_hz: Option<u32>,
}

/// Loads configuration and assembles an MCU into a fresh system address space.
pub fn build_mcu(opts: &BuildOptions) -> anyhow::Result<(Stm32Mcu, AddressSpace)> {
    let board = match &opts.board {
        Some(path) => {
            info!("Loading board manifest: {:?}", path);
            Some(BoardManifest::from_file(path)?)
        }
        None => None,
    };
    let board_dir = opts
        .board
        .as_deref()
        .and_then(Path::parent)
        .unwrap_or_else(|| Path::new("."));

    let caps = if let Some(chip) = &opts.chip {
        load_chip(chip)?
    } else if let Some(part) = &opts.part {
        preset(part)?
    } else if let Some(manifest) = &board {
        match (&manifest.chip, &manifest.part) {
            (Some(chip), _) => load_chip(&board_dir.join(chip))?,
            (None, Some(part)) => preset(part)?,
            (None, None) => anyhow::bail!("Board '{}' names no chip", manifest.name),
        }
    } else {
        info!("Using default part {}", DEFAULT_PART);
        preset(DEFAULT_PART)?
    };

    let mut host = HostSerial::new(
        board
            .as_ref()
            .and_then(|b| b.max_serial_ports)
            .unwrap_or(DEFAULT_MAX_SERIAL_PORTS),
    );
    if let Some(manifest) = &board {
        for (name, binding) in &manifest.serial {
            let port: SerialPort = name
                .parse()
                .map_err(anyhow::Error::msg)
                .with_context(|| format!("Board '{}': bad serial binding", manifest.name))?;
            let backend = open_backend(port, binding, board_dir)?;
            if !host.set_backend(port.index(), backend) {
                anyhow::bail!(
                    "Board '{}': {} is beyond max_serial_ports",
                    manifest.name,
                    port
                );
            }
        }
    }

    let hse = opts
        .hse_freq_hz
        .or(board.as_ref().map(|b| b.hse_freq_hz))
        .unwrap_or(0);
    let lse = opts
        .lse_freq_hz
        .or(board.as_ref().map(|b| b.lse_freq_hz))
        .unwrap_or(0);

    let mut sysmem = AddressSpace::new("system");
    let mcu = McuBuilder::new()
        .capabilities(Arc::new(caps))
        .hse_freq_hz(hse)
        .lse_freq_hz(lse)
        .serial_host(host)
        .build(&mut sysmem)?;
    Ok((mcu, sysmem))
}

fn load_chip(path: &Path) -> anyhow::Result<Capabilities> {
    info!("Loading chip descriptor: {:?}", path);
    let chip = ChipDescriptor::from_file(path)?;
    Capabilities::from_descriptor(&chip)
}

fn preset(part: &str) -> anyhow::Result<Capabilities> {
    Capabilities::preset(part).with_context(|| {
        format!(
            "Unknown part '{}'; known parts: {}",
            part,
            crate::capabilities::PRESET_NAMES.join(", ")
        )
    })
}

fn open_backend(
    port: SerialPort,
    binding: &SerialBinding,
    board_dir: &Path,
) -> anyhow::Result<CharBackendRef> {
    let label = format!("serial{}", port.index());
    let backend = match binding.backend {
        SerialBackendKind::Null => shared(NullBackend::new(&label)),
        SerialBackendKind::Stdout => shared(StdoutBackend::new(&label)),
        SerialBackendKind::File => {
            let path = binding
                .path
                .as_ref()
                .with_context(|| format!("{} file backend has no path", port))?;
            let path = board_dir.join(path);
            let file = FileBackend::create(&label, &path)
                .with_context(|| format!("Failed to open {:?} for {}", path, port))?;
            shared(file)
        }
    };
    Ok(backend)
}
