// LabWired - Firmware Simulation Platform
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

//! Generic Cortex-M core: interrupt controller plus boot flash and SRAM.

use crate::capabilities::{Capabilities, Family};
use crate::memory::{AddressSpace, MemoryRegion};
use crate::object::{DeviceHandle, DeviceTree, PropertyValue};
use crate::peripherals::{props, DeviceFactory, DeviceType};
use crate::McuResult;

pub const FLASH_BASE: u64 = 0x0000_0000;
pub const SRAM_BASE: u64 = 0x2000_0000;
pub const CORE_CONTAINER: &str = "/machine/mcu/cortexm";
/// Boot flash sits below ordinary regions, so SRAM and peripherals stay
/// reachable when a large flash extends over them.
pub const FLASH_PRIORITY: i32 = -2;

/// Hook for variants that map regions on top of the core's flash and SRAM.
pub trait MemoryRegionsExtension {
    fn create_additional_regions(
        &self,
        core: &CortexMCore,
        sysmem: &mut AddressSpace,
    ) -> McuResult<()>;
}

/// External interrupt lines wired to the NVIC.
pub fn num_irq(family: Family) -> u32 {
    match family {
        Family::F1 => 68,
        Family::F2 => 81,
        Family::F3 => 82,
        Family::F4 => 91,
        Family::L1 => 57,
    }
}

#[derive(Debug)]
pub struct CortexMCore {
    nvic: DeviceHandle,
    flash: MemoryRegion,
    sram: MemoryRegion,
}

impl CortexMCore {
    /// Create and realize the NVIC and allocate the memory regions.
    ///
    /// Nothing is mapped until [`CortexMCore::create_memory_regions`] runs.
    pub fn new(
        tree: &mut DeviceTree,
        caps: &Capabilities,
        factory: &dyn DeviceFactory,
    ) -> McuResult<Self> {
        let container = tree.container(CORE_CONTAINER);
        let nvic = tree.create(&container, "nvic", factory.create(DeviceType::Nvic))?;
        tree.set_property(
            nvic,
            props::NUM_IRQ,
            PropertyValue::Int(num_irq(caps.family).into()),
        )?;
        tree.realize(nvic)?;

        Ok(Self {
            nvic,
            flash: MemoryRegion::rom("mem-flash", caps.flash_size_bytes()),
            sram: MemoryRegion::ram("mem-sram", caps.sram_size_bytes()),
        })
    }

    /// Map flash and SRAM, then let `extension` add its own regions.
    pub fn create_memory_regions(
        &self,
        sysmem: &mut AddressSpace,
        extension: Option<&dyn MemoryRegionsExtension>,
    ) -> McuResult<()> {
        sysmem.add_subregion_overlap(FLASH_BASE, self.flash.clone(), FLASH_PRIORITY)?;
        sysmem.add_subregion(SRAM_BASE, self.sram.clone())?;
        if let Some(extension) = extension {
            extension.create_additional_regions(self, sysmem)?;
        }
        Ok(())
    }

    pub fn nvic(&self) -> DeviceHandle {
        self.nvic
    }

    /// The primary flash region, mapped at [`FLASH_BASE`].
    pub fn flash_mem(&self) -> &MemoryRegion {
        &self.flash
    }

    pub fn sram_mem(&self) -> &MemoryRegion {
        &self.sram
    }

    pub fn reset(&self, tree: &mut DeviceTree) {
        tree.reset(self.nvic);
    }
}
