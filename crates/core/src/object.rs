// LabWired - Firmware Simulation Platform
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

//! Device object model.
//!
//! Devices live in a [`DeviceTree`] arena under slash-separated paths such as
//! `/machine/mcu/stm32/gpio[a]`. Construction is two-phase: a device is
//! created and configured through string-keyed properties, then realized.
//! Properties are frozen once a device is realized.

use crate::capabilities::Capabilities;
use crate::chardev::CharBackendRef;
use crate::SimResult;
use std::any::Any;
use std::fmt;
use std::sync::Arc;
use tracing::debug;

#[derive(Debug, thiserror::Error)]
pub enum DeviceError {
    #[error("unknown property '{0}'")]
    UnknownProperty(String),
    #[error("property '{name}' expects {expected}")]
    PropertyType { name: String, expected: &'static str },
    #[error("required property '{0}' was not set")]
    MissingProperty(&'static str),
    #[error("invalid value for property '{name}': {reason}")]
    InvalidValue { name: String, reason: String },
    #[error("'{0}' already exists")]
    DuplicateChild(String),
    #[error("cannot set property '{property}' on realized device '{path}'")]
    AlreadyRealized { path: String, property: String },
    #[error("failed to set property on '{path}': {source}")]
    Property {
        path: String,
        #[source]
        source: Box<DeviceError>,
    },
    #[error("failed to realize '{path}': {source}")]
    Realize {
        path: String,
        #[source]
        source: Box<DeviceError>,
    },
}

/// Opaque reference to a device in the tree that created it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize)]
pub struct DeviceHandle(usize);

impl DeviceHandle {
    pub(crate) fn from_index(index: usize) -> Self {
        Self(index)
    }

    pub fn index(self) -> usize {
        self.0
    }
}

#[derive(Debug, Clone)]
pub enum PropertyValue {
    Int(u64),
    Capabilities(Arc<Capabilities>),
    Link(DeviceHandle),
    Chardev(CharBackendRef),
}

impl PropertyValue {
    pub fn as_u32(&self, name: &str) -> Result<u32, DeviceError> {
        match self {
            PropertyValue::Int(v) => u32::try_from(*v).map_err(|_| DeviceError::InvalidValue {
                name: name.to_string(),
                reason: format!("{} does not fit in 32 bits", v),
            }),
            _ => Err(Self::type_error(name, "an integer")),
        }
    }

    pub fn into_capabilities(self, name: &str) -> Result<Arc<Capabilities>, DeviceError> {
        match self {
            PropertyValue::Capabilities(caps) => Ok(caps),
            _ => Err(Self::type_error(name, "a capabilities reference")),
        }
    }

    pub fn as_link(&self, name: &str) -> Result<DeviceHandle, DeviceError> {
        match self {
            PropertyValue::Link(handle) => Ok(*handle),
            _ => Err(Self::type_error(name, "a device link")),
        }
    }

    pub fn into_chardev(self, name: &str) -> Result<CharBackendRef, DeviceError> {
        match self {
            PropertyValue::Chardev(backend) => Ok(backend),
            _ => Err(Self::type_error(name, "a character backend")),
        }
    }

    fn type_error(name: &str, expected: &'static str) -> DeviceError {
        DeviceError::PropertyType {
            name: name.to_string(),
            expected,
        }
    }
}

/// A device model that can be created, configured, realized and reset.
pub trait Device: fmt::Debug + Send {
    fn type_name(&self) -> &'static str;

    fn set_property(&mut self, name: &str, value: PropertyValue) -> Result<(), DeviceError>;

    fn property(&self, _name: &str) -> Option<PropertyValue> {
        None
    }

    /// Finish construction. Called once, after all properties are set.
    fn realize(&mut self) -> Result<(), DeviceError> {
        Ok(())
    }

    /// Bring the device back to its power-on state.
    ///
    /// Must not depend on any earlier reset having happened and must be
    /// safe to call any number of times.
    fn reset(&mut self);

    fn read(&self, _offset: u64) -> SimResult<u8> {
        Ok(0)
    }

    fn write(&mut self, _offset: u64, _value: u8) -> SimResult<()> {
        Ok(())
    }

    fn as_any(&self) -> Option<&dyn Any> {
        None
    }

    fn as_any_mut(&mut self) -> Option<&mut dyn Any> {
        None
    }

    fn snapshot(&self) -> serde_json::Value {
        serde_json::Value::Null
    }
}

/// A namespace node that devices are created under.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Container {
    path: String,
}

impl Container {
    pub fn path(&self) -> &str {
        &self.path
    }

    fn child_path(&self, name: &str) -> String {
        if self.path == "/" {
            format!("/{}", name)
        } else {
            format!("{}/{}", self.path, name)
        }
    }
}

#[derive(Debug)]
struct Node {
    path: String,
    realized: bool,
    dev: Box<dyn Device>,
}

#[derive(Debug, Default)]
pub struct DeviceTree {
    containers: Vec<String>,
    nodes: Vec<Node>,
}

impl DeviceTree {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the container at `path`, creating it and its parents if needed.
    pub fn container(&mut self, path: &str) -> Container {
        let mut current = String::new();
        for part in path.split('/').filter(|p| !p.is_empty()) {
            current.push('/');
            current.push_str(part);
            if !self.containers.contains(&current) {
                self.containers.push(current.clone());
            }
        }
        if current.is_empty() {
            current.push('/');
        }
        Container { path: current }
    }

    pub fn containers(&self) -> impl Iterator<Item = &str> {
        self.containers.iter().map(String::as_str)
    }

    pub fn create(
        &mut self,
        parent: &Container,
        name: &str,
        dev: Box<dyn Device>,
    ) -> Result<DeviceHandle, DeviceError> {
        let path = parent.child_path(name);
        if self.lookup(&path).is_some() || self.containers.contains(&path) {
            return Err(DeviceError::DuplicateChild(path));
        }
        debug!("Creating {} ({})", path, dev.type_name());
        self.nodes.push(Node {
            path,
            realized: false,
            dev,
        });
        Ok(DeviceHandle(self.nodes.len() - 1))
    }

    pub fn set_property(
        &mut self,
        handle: DeviceHandle,
        name: &str,
        value: PropertyValue,
    ) -> Result<(), DeviceError> {
        let node = &mut self.nodes[handle.0];
        if node.realized {
            return Err(DeviceError::AlreadyRealized {
                path: node.path.clone(),
                property: name.to_string(),
            });
        }
        node.dev
            .set_property(name, value)
            .map_err(|e| DeviceError::Property {
                path: node.path.clone(),
                source: Box::new(e),
            })
    }

    pub fn property(&self, handle: DeviceHandle, name: &str) -> Option<PropertyValue> {
        self.nodes[handle.0].dev.property(name)
    }

    /// Realizing an already realized device is a no-op.
    pub fn realize(&mut self, handle: DeviceHandle) -> Result<(), DeviceError> {
        let node = &mut self.nodes[handle.0];
        if node.realized {
            return Ok(());
        }
        node.dev.realize().map_err(|e| DeviceError::Realize {
            path: node.path.clone(),
            source: Box::new(e),
        })?;
        node.realized = true;
        debug!("Realized {}", node.path);
        Ok(())
    }

    pub fn reset(&mut self, handle: DeviceHandle) {
        let node = &mut self.nodes[handle.0];
        tracing::trace!("Reset {}", node.path);
        node.dev.reset();
    }

    pub fn is_realized(&self, handle: DeviceHandle) -> bool {
        self.nodes[handle.0].realized
    }

    pub fn path(&self, handle: DeviceHandle) -> &str {
        &self.nodes[handle.0].path
    }

    pub fn lookup(&self, path: &str) -> Option<DeviceHandle> {
        self.nodes
            .iter()
            .position(|n| n.path == path)
            .map(DeviceHandle)
    }

    pub fn device(&self, handle: DeviceHandle) -> &dyn Device {
        self.nodes[handle.0].dev.as_ref()
    }

    pub fn device_mut(&mut self, handle: DeviceHandle) -> &mut dyn Device {
        self.nodes[handle.0].dev.as_mut()
    }

    pub fn downcast_ref<T: 'static>(&self, handle: DeviceHandle) -> Option<&T> {
        self.device(handle).as_any()?.downcast_ref::<T>()
    }

    pub fn downcast_mut<T: 'static>(&mut self, handle: DeviceHandle) -> Option<&mut T> {
        self.device_mut(handle).as_any_mut()?.downcast_mut::<T>()
    }

    /// All devices in creation order.
    pub fn iter(&self) -> impl Iterator<Item = (DeviceHandle, &str, &dyn Device)> {
        self.nodes
            .iter()
            .enumerate()
            .map(|(i, n)| (DeviceHandle(i), n.path.as_str(), n.dev.as_ref()))
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}
