// LabWired - Firmware Simulation Platform
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

//! Cortex-M bit-band aliasing.
//!
//! Each 32-bit word in the alias window maps to one bit of the target
//! region: word `n` of the alias is bit `n % 8` of byte `n / 8`. Only the
//! lowest byte lane of an alias word carries the bit; the others read as
//! zero and ignore writes.

use super::{AddressSpace, MemoryError, MemoryRegion};

/// Distance between a bit-band target region and its alias window.
pub const BITBAND_ALIAS_OFFSET: u64 = 0x0200_0000;
/// Size of the alias window: 32 alias bytes per target byte over 1 MiB.
pub const BITBAND_ALIAS_SIZE: u64 = 0x0200_0000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct BitAddress {
    pub byte_addr: u64,
    pub bit: u8,
    lane: u8,
}

impl BitAddress {
    pub(crate) fn decode(target_base: u64, alias_offset: u64) -> Self {
        let word = alias_offset / 4;
        Self {
            byte_addr: target_base + word / 8,
            bit: (word % 8) as u8,
            lane: (alias_offset % 4) as u8,
        }
    }

    pub(crate) fn is_first_lane(&self) -> bool {
        self.lane == 0
    }
}

/// Map a bit-band alias window for the 1 MiB starting at `target_base`.
pub fn install(space: &mut AddressSpace, name: &str, target_base: u64) -> Result<(), MemoryError> {
    let region = MemoryRegion::bitband(name, target_base, BITBAND_ALIAS_SIZE);
    space.add_subregion(target_base + BITBAND_ALIAS_OFFSET, region)
}

/// Alias address of `bit` in the byte at `addr`, for a target at `target_base`.
pub fn alias_address(target_base: u64, addr: u64, bit: u8) -> u64 {
    target_base + BITBAND_ALIAS_OFFSET + (addr - target_base) * 32 + u64::from(bit) * 4
}
