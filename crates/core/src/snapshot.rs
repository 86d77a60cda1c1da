// LabWired - Firmware Simulation Platform
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

use crate::capabilities::Family;
use crate::memory::MappingInfo;
use serde::Serialize;
use std::collections::BTreeMap;

/// Point-in-time view of an assembled MCU.
#[derive(Debug, Clone, Serialize)]
pub struct McuSnapshot {
    pub part: String,
    pub family: Family,
    pub hse_freq_hz: u32,
    pub lse_freq_hz: u32,
    /// Device state keyed by tree path.
    pub devices: BTreeMap<String, serde_json::Value>,
    pub memory_map: Vec<MappingInfo>,
}

impl McuSnapshot {
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}
