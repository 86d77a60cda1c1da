// LabWired - Firmware Simulation Platform
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

pub mod alias;
pub mod builder;
pub mod cortex_m;
pub mod factory;
pub mod registry;
pub mod stm32;
