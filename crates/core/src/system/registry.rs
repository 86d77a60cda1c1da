// LabWired - Firmware Simulation Platform
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

use crate::object::DeviceHandle;

/// Shared singletons that later peripherals link to.
#[derive(Debug, Clone, Copy)]
pub struct ResourceRegistry {
    nvic: DeviceHandle,
    rcc: Option<DeviceHandle>,
}

impl ResourceRegistry {
    pub fn new(nvic: DeviceHandle) -> Self {
        Self { nvic, rcc: None }
    }

    pub fn register_clock(&mut self, rcc: DeviceHandle) {
        self.rcc = Some(rcc);
    }

    /// The clock controller, once it has been built.
    pub fn clock(&self) -> Option<DeviceHandle> {
        self.rcc
    }

    pub fn interrupt_controller(&self) -> DeviceHandle {
        self.nvic
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clock_registration() {
        let mut registry = ResourceRegistry::new(DeviceHandle::from_index(0));
        assert_eq!(registry.clock(), None);
        registry.register_clock(DeviceHandle::from_index(3));
        assert_eq!(registry.clock(), Some(DeviceHandle::from_index(3)));
        assert_eq!(registry.interrupt_controller(), DeviceHandle::from_index(0));
    }
}
