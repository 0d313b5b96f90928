//! Device classification and the weight tables used for initial trust.

use serde::{Deserialize, Serialize};

use crate::error::{ReputationError, Result};

/// Memory weight bands as `(upper bound in GB, weight)`, checked in order.
pub const MEMORY_BANDS: [(f64, f64); 4] = [(2.0, 0.2), (4.0, 0.4), (8.0, 0.6), (16.0, 0.8)];

/// Memory weight for anything above the last band.
pub const MEMORY_WEIGHT_MAX: f64 = 1.0;

/// Computing weight assigned to device types outside the known set.
pub const UNKNOWN_COMPUTING_WEIGHT: f64 = 0.5;

/// Kind of device participating in the network.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum DeviceType {
    /// Roadside unit.
    Rsu,
    /// General-purpose computer.
    Computer,
    /// Smartphone.
    Smartphone,
    /// Smart (IoT) device.
    SmartDevice,
    /// Sensor.
    Sensor,
    /// RFID tag.
    Rfid,
    /// Any type the weight table does not know.
    Other(String),
}

impl DeviceType {
    /// Wire name of the device type.
    #[must_use]
    pub fn name(&self) -> &str {
        match self {
            DeviceType::Rsu => "RSU",
            DeviceType::Computer => "Computer",
            DeviceType::Smartphone => "Smartphone",
            DeviceType::SmartDevice => "Smart Device",
            DeviceType::Sensor => "Sensor",
            DeviceType::Rfid => "RFID",
            DeviceType::Other(name) => name,
        }
    }

    /// Computing weight of this device type.
    #[must_use]
    pub fn computing_weight(&self) -> f64 {
        match self {
            DeviceType::Rsu => 1.0,
            DeviceType::Computer => 0.9,
            DeviceType::Smartphone => 0.8,
            DeviceType::SmartDevice => 0.6,
            DeviceType::Sensor => 0.4,
            DeviceType::Rfid => 0.2,
            DeviceType::Other(_) => UNKNOWN_COMPUTING_WEIGHT,
        }
    }

    /// Rank among coordinator-capable types (lower wins), `None` if the type
    /// can never coordinate.
    #[must_use]
    pub fn coordinator_rank(&self) -> Option<u8> {
        match self {
            DeviceType::Rsu => Some(0),
            DeviceType::Computer => Some(1),
            _ => None,
        }
    }
}

impl From<&str> for DeviceType {
    fn from(name: &str) -> Self {
        match name {
            "RSU" => DeviceType::Rsu,
            "Computer" => DeviceType::Computer,
            "Smartphone" => DeviceType::Smartphone,
            "Smart Device" => DeviceType::SmartDevice,
            "Sensor" => DeviceType::Sensor,
            "RFID" => DeviceType::Rfid,
            other => DeviceType::Other(other.to_string()),
        }
    }
}

impl From<String> for DeviceType {
    fn from(name: String) -> Self {
        DeviceType::from(name.as_str())
    }
}

impl From<DeviceType> for String {
    fn from(device_type: DeviceType) -> Self {
        device_type.name().to_string()
    }
}

impl std::fmt::Display for DeviceType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Who operates a device.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OwnershipType {
    /// Operated by the network owner.
    Internal,
    /// Third-party device.
    External,
}

impl OwnershipType {
    /// Wire name of the ownership type.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            OwnershipType::Internal => "internal",
            OwnershipType::External => "external",
        }
    }
}

impl std::fmt::Display for OwnershipType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Memory weight for a device with `memory_gb` of memory.
#[must_use]
pub fn memory_weight(memory_gb: f64) -> f64 {
    MEMORY_BANDS
        .iter()
        .find(|(upper, _)| memory_gb <= *upper)
        .map_or(MEMORY_WEIGHT_MAX, |(_, weight)| *weight)
}

/// Computing weight for a device type.
#[must_use]
pub fn computing_weight(device_type: &DeviceType) -> f64 {
    device_type.computing_weight()
}

/// Reject memory capacities that are negative or not finite.
pub fn validate_memory(memory_gb: f64) -> Result<f64> {
    if memory_gb.is_finite() && memory_gb >= 0.0 {
        Ok(memory_gb)
    } else {
        Err(ReputationError::InvalidMemory(memory_gb))
    }
}
