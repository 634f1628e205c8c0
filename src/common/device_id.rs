//! Device identifier type.

use std::fmt;

/// Identifies a device in the registry.
///
/// The id is derived from a minor number by the registry
/// (`minor >> part_shift`) and doubles as the suffix of the device name.
///
/// # Example
/// ```
/// use brickdisk::DeviceId;
///
/// let id = DeviceId::new(5);
/// assert_eq!(id.to_string(), "brick5");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DeviceId(pub u32);

impl DeviceId {
    /// Create a new DeviceId.
    #[inline]
    pub fn new(id: u32) -> Self {
        DeviceId(id)
    }
}

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "brick{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_device_id_equality() {
        assert_eq!(DeviceId::new(5), DeviceId::new(5));
        assert_ne!(DeviceId::new(5), DeviceId::new(6));
    }

    #[test]
    fn test_device_id_display() {
        assert_eq!(format!("{}", DeviceId::new(0)), "brick0");
    }
}
