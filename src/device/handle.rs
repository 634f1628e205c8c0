//! RAII open handles.
//!
//! An [`OpenHandle`] stands for one opener of a device. Destructive
//! operations consult the opener count, and the count only drops when the
//! handle does.

use std::ops::Deref;
use std::sync::Arc;

use super::Device;

/// One open reference to a [`Device`].
///
/// Dereferences to the device, so requests can be issued through it.
/// The reference is released when the handle is dropped.
///
/// # Example
/// ```
/// use std::sync::Arc;
/// use brickdisk::device::Device;
/// use brickdisk::storage::SystemAllocator;
/// use brickdisk::DeviceId;
///
/// let device = Arc::new(Device::create(DeviceId::new(0), 64, Arc::new(SystemAllocator)));
/// {
///     let handle = device.open();
///     assert_eq!(handle.openers(), 1);
/// }
/// assert_eq!(device.openers(), 0);
/// ```
pub struct OpenHandle {
    device: Arc<Device>,
}

impl OpenHandle {
    /// Wrap an already counted reference. Called by `Device::open()`.
    pub(crate) fn new(device: Arc<Device>) -> Self {
        Self { device }
    }

    /// The device this handle holds open.
    #[inline]
    pub fn device(&self) -> &Arc<Device> {
        &self.device
    }
}

impl Deref for OpenHandle {
    type Target = Device;

    #[inline]
    fn deref(&self) -> &Device {
        &self.device
    }
}

impl Drop for OpenHandle {
    fn drop(&mut self) {
        self.device.close_internal();
    }
}

impl std::fmt::Debug for OpenHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenHandle")
            .field("device", &self.device.id())
            .finish()
    }
}
