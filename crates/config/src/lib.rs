// LabWired - Firmware Simulation Platform
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Default schema version for YAML configs
fn default_schema_version() -> String {
    "1.0".to_string()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Family {
    #[serde(alias = "stm32f1")]
    F1,
    #[serde(alias = "stm32f2")]
    F2,
    #[serde(alias = "stm32f3")]
    F3,
    #[serde(alias = "stm32f4")]
    F4,
    #[serde(alias = "stm32l1")]
    L1,
}

/// Static feature table of one STM32 part.
///
/// Peripheral lists hold port names (`a`..`g` for GPIO, `usart1`..`usart6`
/// for serial ports); they are validated when the descriptor is turned into
/// capabilities, not here.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ChipDescriptor {
    #[serde(default = "default_schema_version")]
    pub schema_version: String,
    pub name: String,
    pub family: Family,
    pub hsi_freq_hz: u32,
    pub lsi_freq_hz: u32,
    pub flash_size: String, // e.g. "128KiB"
    pub sram_size: String,
    #[serde(default)]
    pub has_periph_bitband: bool,
    #[serde(default)]
    pub has_pwr: bool,
    #[serde(default)]
    pub gpio: Vec<String>,
    #[serde(default)]
    pub serial: Vec<String>,
}

impl ChipDescriptor {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read chip descriptor {:?}", path))?;
        Self::from_yaml(&content)
    }

    pub fn from_yaml(yaml: &str) -> Result<Self> {
        serde_yaml::from_str(yaml).context("Failed to parse Chip Descriptor YAML")
    }

    pub fn flash_size_bytes(&self) -> Result<u64> {
        parse_size(&self.flash_size)
            .with_context(|| format!("Invalid flash_size for chip '{}'", self.name))
    }

    pub fn sram_size_bytes(&self) -> Result<u64> {
        parse_size(&self.sram_size)
            .with_context(|| format!("Invalid sram_size for chip '{}'", self.name))
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum SerialBackendKind {
    /// Discard everything the port transmits.
    #[default]
    Null,
    Stdout,
    File,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct SerialBinding {
    #[serde(default)]
    pub backend: SerialBackendKind,
    /// Output path, required for `file` backends.
    #[serde(default)]
    pub path: Option<PathBuf>,
}

/// Board-level wiring around a chip: crystals and host serial backends.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct BoardManifest {
    #[serde(default = "default_schema_version")]
    pub schema_version: String,
    pub name: String,
    /// Path to a chip descriptor, relative to the manifest.
    #[serde(default)]
    pub chip: Option<String>,
    /// Name of a built-in part, used instead of `chip`.
    #[serde(default)]
    pub part: Option<String>,
    #[serde(default)]
    pub hse_freq_hz: u32,
    #[serde(default)]
    pub lse_freq_hz: u32,
    #[serde(default)]
    pub max_serial_ports: Option<usize>,
    #[serde(default)]
    pub serial: BTreeMap<String, SerialBinding>,
}

impl BoardManifest {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let f = std::fs::File::open(path)
            .with_context(|| format!("Failed to open board manifest {:?}", path))?;
        let manifest: Self =
            serde_yaml::from_reader(f).context("Failed to parse Board Manifest")?;
        manifest.validate()?;
        Ok(manifest)
    }

    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let manifest: Self = serde_yaml::from_str(yaml).context("Failed to parse Board Manifest")?;
        manifest.validate()?;
        Ok(manifest)
    }

    pub fn validate(&self) -> Result<()> {
        if self.schema_version != "1.0" {
            anyhow::bail!(
                "Unsupported schema_version '{}' in board '{}'; expected '1.0'",
                self.schema_version,
                self.name
            );
        }
        match (&self.chip, &self.part) {
            (Some(_), Some(_)) => {
                anyhow::bail!("Board '{}' sets both 'chip' and 'part'", self.name)
            }
            (None, None) => anyhow::bail!("Board '{}' needs one of 'chip' or 'part'", self.name),
            _ => {}
        }
        if self.max_serial_ports == Some(0) {
            anyhow::bail!("Board '{}': max_serial_ports must be positive", self.name);
        }
        for (port, binding) in &self.serial {
            if binding.backend == SerialBackendKind::File && binding.path.is_none() {
                anyhow::bail!(
                    "Board '{}': serial port '{}' uses a file backend without 'path'",
                    self.name,
                    port
                );
            }
        }
        Ok(())
    }
}

pub fn parse_size(size_str: &str) -> Result<u64> {
    use human_size::{Byte, Size, SpecificSize};
    let s: Size = size_str
        .parse()
        .map_err(|e| anyhow::anyhow!("Invalid size format: {}", e))?;
    let bytes: SpecificSize<Byte> = s.into();
    Ok(bytes.value() as u64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_size_binary_units() {
        assert_eq!(parse_size("128KiB").unwrap(), 128 * 1024);
        assert_eq!(parse_size("1MiB").unwrap(), 1024 * 1024);
        assert!(parse_size("lots").is_err());
    }

    #[test]
    fn test_board_requires_chip_or_part() {
        let yaml = r#"
name: "bare"
hse_freq_hz: 8000000
"#;
        let err = BoardManifest::from_yaml(yaml).unwrap_err();
        assert!(err.to_string().contains("needs one of"));
    }

    #[test]
    fn test_board_rejects_both_chip_and_part() {
        let yaml = r#"
name: "ambiguous"
chip: "chips/stm32f103rb.yaml"
part: "stm32f103rb"
"#;
        assert!(BoardManifest::from_yaml(yaml).is_err());
    }

    #[test]
    fn test_file_backend_needs_path() {
        let yaml = r#"
name: "logger"
part: "stm32f407vg"
serial:
  usart1:
    backend: file
"#;
        let err = BoardManifest::from_yaml(yaml).unwrap_err();
        assert!(err.to_string().contains("without 'path'"));
    }

    #[test]
    fn test_unknown_schema_version_rejected() {
        let yaml = r#"
schema_version: "2.0"
name: "future"
part: "stm32f103rb"
"#;
        assert!(BoardManifest::from_yaml(yaml).is_err());
    }
}
