//! Device registry.
//!
//! The [`Registry`] owns every device. It creates a configured number of
//! devices up front, creates further ones on demand when a minor number is
//! probed, and destroys them on removal or shutdown.

use std::collections::BTreeMap;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::debug;

use crate::common::config::{DEFAULT_DEVICE_COUNT, DEFAULT_SIZE_KB, DISK_MAX_PARTS, MINORBITS};
use crate::common::{DeviceId, Error, Result};
use crate::device::Device;
use crate::storage::{PageAllocator, SystemAllocator};

/// Registry configuration.
///
/// # Example
/// ```
/// use brickdisk::device::RegistryConfig;
///
/// let config = RegistryConfig {
///     device_count: Some(2),
///     size_kb: 1024,
///     ..Default::default()
/// };
/// assert_eq!(config.capacity_sectors(), 2048);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistryConfig {
    /// Devices created up front. `Some(n)` also caps on-demand creation at
    /// `n`; `None` creates [`DEFAULT_DEVICE_COUNT`] and leaves creation open.
    pub device_count: Option<u32>,

    /// Size of each device in kilobytes.
    pub size_kb: u64,

    /// Partitions per device. Rounded up so that ids map to minors by a
    /// shift.
    pub max_part: u32,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            device_count: None,
            size_kb: DEFAULT_SIZE_KB,
            max_part: 0,
        }
    }
}

impl RegistryConfig {
    /// Capacity of each device in sectors.
    ///
    /// Cannot overflow once [`validate`](Self::validate) has passed.
    pub fn capacity_sectors(&self) -> u64 {
        self.size_kb * 2
    }

    /// Number of minor bits reserved for partitions.
    pub fn part_shift(&self) -> u32 {
        if self.max_part == 0 {
            0
        } else {
            u32::BITS - self.max_part.leading_zeros()
        }
    }

    /// Check the configuration.
    ///
    /// # Errors
    /// - `Error::InvalidConfig` for a zero size, a size whose byte count
    ///   overflows `u64`, too many partitions, or more devices than the
    ///   minor space can number
    pub fn validate(&self) -> Result<()> {
        if self.size_kb == 0 {
            return Err(Error::InvalidConfig("size_kb must be > 0".into()));
        }
        if self.size_kb.checked_mul(1024).is_none() {
            return Err(Error::InvalidConfig(format!(
                "size_kb {} overflows a byte count",
                self.size_kb
            )));
        }

        let part_shift = self.part_shift();
        if (1u64 << part_shift) > DISK_MAX_PARTS as u64 {
            return Err(Error::InvalidConfig(format!(
                "max_part {} exceeds {} partitions",
                self.max_part, DISK_MAX_PARTS
            )));
        }

        if let Some(count) = self.device_count {
            let limit = 1u64 << (MINORBITS - part_shift);
            if count as u64 > limit {
                return Err(Error::InvalidConfig(format!(
                    "device_count {} exceeds {} minors",
                    count, limit
                )));
            }
        }

        Ok(())
    }
}

/// Owns every device and maps minor numbers to them.
///
/// # Thread Safety
/// - `devices`: `Mutex`. Held while looking up, creating or removing a
///   device, never while a request runs.
///
/// # Usage
/// ```
/// use brickdisk::device::{Registry, RegistryConfig};
///
/// let registry = Registry::new(RegistryConfig::default()).unwrap();
/// assert_eq!(registry.len(), 16);
///
/// // Probing an unknown minor creates the device
/// let device = registry.probe(20).unwrap();
/// assert_eq!(device.name(), "brick20");
/// ```
pub struct Registry {
    config: RegistryConfig,

    /// Minor bits reserved for partitions.
    part_shift: u32,

    /// Shared by every device's store.
    allocator: Arc<dyn PageAllocator>,

    /// Live devices.
    devices: Mutex<BTreeMap<DeviceId, Arc<Device>>>,
}

impl Registry {
    /// Create a registry backed by the system allocator.
    ///
    /// # Errors
    /// - `Error::InvalidConfig` if `config` does not validate
    pub fn new(config: RegistryConfig) -> Result<Self> {
        Self::with_allocator(config, Arc::new(SystemAllocator))
    }

    /// Create a registry whose devices allocate pages from `allocator`.
    ///
    /// # Errors
    /// - `Error::InvalidConfig` if `config` does not validate
    pub fn with_allocator(config: RegistryConfig, allocator: Arc<dyn PageAllocator>) -> Result<Self> {
        config.validate()?;

        let part_shift = config.part_shift();
        let count = config.device_count.unwrap_or(DEFAULT_DEVICE_COUNT);
        let capacity = config.capacity_sectors();

        let devices: BTreeMap<DeviceId, Arc<Device>> = (0..count)
            .map(|i| {
                let id = DeviceId::new(i);
                (id, Arc::new(Device::create(id, capacity, Arc::clone(&allocator))))
            })
            .collect();

        debug!(count, capacity, part_shift, "registry loaded");

        Ok(Self {
            config,
            part_shift,
            allocator,
            devices: Mutex::new(devices),
        })
    }

    // ========================================================================
    // Lookup and creation
    // ========================================================================

    /// Return the device owning `minor`, creating it if needed.
    ///
    /// # Errors
    /// - `Error::DeviceLimit` if the device would exceed the configured count
    pub fn probe(&self, minor: u32) -> Result<Arc<Device>> {
        self.get_or_create(self.id_for_minor(minor))
    }

    /// Return device `id`, creating it if needed.
    ///
    /// # Errors
    /// - `Error::DeviceLimit` if `id` is beyond the configured count or the
    ///   minor space
    pub fn get_or_create(&self, id: DeviceId) -> Result<Arc<Device>> {
        let mut devices = self.devices.lock();
        if let Some(device) = devices.get(&id) {
            return Ok(Arc::clone(device));
        }

        let limit = self.device_limit();
        if id.0 as u64 >= limit {
            return Err(Error::DeviceLimit {
                id,
                limit: limit.min(u32::MAX as u64) as u32,
            });
        }

        let device = Arc::new(Device::create(
            id,
            self.config.capacity_sectors(),
            Arc::clone(&self.allocator),
        ));
        devices.insert(id, Arc::clone(&device));

        Ok(device)
    }

    /// Get device `id` if it exists.
    pub fn get(&self, id: DeviceId) -> Option<Arc<Device>> {
        self.devices.lock().get(&id).cloned()
    }

    // ========================================================================
    // Removal
    // ========================================================================

    /// Destroy and forget device `id`.
    ///
    /// # Errors
    /// - `Error::NoSuchDevice` if `id` is not registered
    /// - `Error::Busy` if the device is open. Nothing changes.
    pub fn remove(&self, id: DeviceId) -> Result<()> {
        let mut devices = self.devices.lock();
        let device = devices.get(&id).ok_or(Error::NoSuchDevice(id))?;

        device.destroy_if_idle()?;
        devices.remove(&id);

        Ok(())
    }

    /// Destroy every device. Returns how many were destroyed.
    ///
    /// # Precondition
    /// No request may be running against any device.
    pub fn shutdown(&self) -> usize {
        let devices = std::mem::take(&mut *self.devices.lock());
        let count = devices.len();

        for device in devices.into_values() {
            device.destroy();
        }

        if count > 0 {
            debug!(count, "registry unloaded");
        }
        count
    }

    // ========================================================================
    // Info
    // ========================================================================

    /// Device id that owns `minor`.
    pub fn id_for_minor(&self, minor: u32) -> DeviceId {
        DeviceId::new(minor >> self.part_shift)
    }

    /// First minor number of device `id`.
    pub fn first_minor(&self, id: DeviceId) -> u32 {
        id.0 << self.part_shift
    }

    /// Minor bits reserved for partitions.
    pub fn part_shift(&self) -> u32 {
        self.part_shift
    }

    /// Effective partitions per device after rounding.
    pub fn max_part(&self) -> u32 {
        (1 << self.part_shift) - 1
    }

    /// The configuration in effect.
    pub fn config(&self) -> &RegistryConfig {
        &self.config
    }

    /// Number of live devices.
    pub fn len(&self) -> usize {
        self.devices.lock().len()
    }

    /// Whether no device is live.
    pub fn is_empty(&self) -> bool {
        self.devices.lock().is_empty()
    }

    /// Ids of all live devices, in order.
    pub fn ids(&self) -> Vec<DeviceId> {
        self.devices.lock().keys().copied().collect()
    }

    /// Highest id (exclusive) that may exist.
    fn device_limit(&self) -> u64 {
        let minors = 1u64 << (MINORBITS - self.part_shift);
        match self.config.device_count {
            Some(count) => (count as u64).min(minors),
            None => minors,
        }
    }
}

impl Drop for Registry {
    fn drop(&mut self) {
        self.shutdown();
    }
}
