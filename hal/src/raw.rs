use crate::regs::REGISTER_SPACE;
use crate::{HalError, HalResult, RegisterFile};
use memmap2::{MmapOptions, MmapRaw};
use std::fmt::{Debug, Formatter};
use std::fs::OpenOptions;
use std::path::Path;

/// Register file backed by a memory mapping of the first 256 bytes of a file or device.
///
/// Useful for driving an external simulator that exposes the MCU data space as a shared memory
/// file, or for dumping the register image the drivers produce.
pub struct MappedRegisters {
    mmap: MmapRaw,
}

impl MappedRegisters {
    /// Maps the register space of the file at `path`.
    ///
    /// # Errors
    /// - `HalError::Io` if the file can't be opened or mapped.
    /// - `HalError::Other` if the file is smaller than the register space.
    pub fn open(path: impl AsRef<Path>) -> HalResult<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .open(path)?;

        let len = file.metadata()?.len();
        if len < REGISTER_SPACE as u64 {
            return Err(HalError::Other(format!(
                "register file is {} bytes, expected at least {}",
                len, REGISTER_SPACE
            )));
        }

        let mmap = MmapOptions::new()
            .len(REGISTER_SPACE)
            .map_raw(&file)?;

        Ok(MappedRegisters { mmap })
    }

    /// Flushes outstanding writes to the backing file.
    pub fn flush(&self) -> HalResult<()> {
        self.mmap.flush()?;
        Ok(())
    }
}

impl Debug for MappedRegisters {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "MappedRegisters({:?})", self.mmap.as_ptr().addr())
    }
}

impl RegisterFile for MappedRegisters {
    fn read(&self, address: u8) -> u8 {
        // Any u8 address is below REGISTER_SPACE, so it stays inside the mapping.
        let register_ptr = unsafe { self.mmap.as_ptr().add(address as usize) };
        unsafe { register_ptr.read_volatile() }
    }

    fn write(&self, address: u8, value: u8) {
        let register_ptr = unsafe { self.mmap.as_mut_ptr().add(address as usize) };
        unsafe { register_ptr.write_volatile(value) };
    }
}
