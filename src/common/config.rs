//! Geometry and limit constants for brickdisk.

/// Size of a sector in bytes.
///
/// Sectors are the unit of the device's logical address space. Requests
/// address the device by sector number; all segment lengths are a whole
/// number of sectors.
pub const SECTOR_SIZE: usize = 512;

/// log2 of [`SECTOR_SIZE`].
pub const SECTOR_SHIFT: u32 = 9;

/// Size of a backing page in bytes (4KB).
///
/// This is the allocation unit of the page store. A page backs a contiguous
/// run of [`PAGE_SECTORS`] sectors.
pub const PAGE_SIZE: usize = 4096;

/// log2 of [`PAGE_SECTORS`].
pub const PAGE_SECTORS_SHIFT: u32 = 3;

/// Number of sectors backed by one page.
///
/// # Memory Layout
/// ```text
/// page index:      0                       1
///             ┌───┬───┬───┬───┬───┬───┬───┬───┬───┬───┬───
/// sector:     │ 0 │ 1 │ 2 │ 3 │ 4 │ 5 │ 6 │ 7 │ 8 │ 9 │ ...
///             └───┴───┴───┴───┴───┴───┴───┴───┴───┴───┴───
/// ```
pub const PAGE_SECTORS: u64 = 1 << PAGE_SECTORS_SHIFT;

/// Number of devices created up front when no explicit count is configured.
pub const DEFAULT_DEVICE_COUNT: u32 = 16;

/// Default size of each device in kilobytes (4MB).
pub const DEFAULT_SIZE_KB: u64 = 4096;

/// Maximum number of partitions (including the whole disk) per device.
pub const DISK_MAX_PARTS: u32 = 256;

/// Number of bits in a minor number.
pub const MINORBITS: u32 = 20;

/// Number of pages removed per pass when releasing a whole store.
pub const FREE_BATCH: usize = 16;

const _: () = assert!(SECTOR_SIZE == 1 << SECTOR_SHIFT);
const _: () = assert!(PAGE_SIZE == SECTOR_SIZE << PAGE_SECTORS_SHIFT);
const _: () = assert!(PAGE_SIZE.is_power_of_two());

/// Byte offset of `sector` within the page that backs it.
#[inline]
pub fn sector_offset(sector: u64) -> usize {
    ((sector & (PAGE_SECTORS - 1)) as usize) << SECTOR_SHIFT
}
