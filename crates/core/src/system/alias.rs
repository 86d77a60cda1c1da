// LabWired - Firmware Simulation Platform
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

use super::cortex_m::{CortexMCore, MemoryRegionsExtension, FLASH_PRIORITY};
use crate::memory::{AddressSpace, MemoryRegion};
use crate::McuResult;
use tracing::debug;

/// STM32 parts execute from flash at its native address as well as from the
/// boot window at 0.
pub const FLASH_ALIAS_BASE: u64 = 0x0800_0000;
pub const FLASH_ALIAS_NAME: &str = "mem-flash-alias";
/// Above the boot flash, below ordinary regions.
pub const FLASH_ALIAS_PRIORITY: i32 = FLASH_PRIORITY + 1;

/// Maps a read-only view of the core's flash at [`FLASH_ALIAS_BASE`].
#[derive(Debug, Clone, Copy)]
pub struct FlashAlias {
    pub flash_size_kb: u32,
}

impl MemoryRegionsExtension for FlashAlias {
    fn create_additional_regions(
        &self,
        core: &CortexMCore,
        sysmem: &mut AddressSpace,
    ) -> McuResult<()> {
        let size = u64::from(self.flash_size_kb) * 1024;
        let mut alias = MemoryRegion::alias(FLASH_ALIAS_NAME, core.flash_mem(), 0, size)?;
        alias.set_readonly(true);
        debug!("Flash alias {} KiB at {:#010x}", self.flash_size_kb, FLASH_ALIAS_BASE);
        sysmem.add_subregion_overlap(FLASH_ALIAS_BASE, alias, FLASH_ALIAS_PRIORITY)?;
        Ok(())
    }
}
