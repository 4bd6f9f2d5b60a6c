//! Read-only view of a named file mapping

use crate::{Result, TelemetryError};
use std::ptr::NonNull;
use tracing::{debug, trace};
use windows::Win32::Foundation::{CloseHandle, HANDLE};
use windows::Win32::System::Memory::{
    FILE_MAP_READ, MEMORY_MAPPED_VIEW_ADDRESS, MapViewOfFile, OpenFileMappingW, UnmapViewOfFile,
};
use windows::core::PCWSTR;

/// A named file mapping created by another process, mapped read-only.
pub struct MappedRegion {
    mapping: HANDLE,
    base: NonNull<u8>,
    len: usize,
}

impl MappedRegion {
    /// Open `name` and map its first `len` bytes.
    ///
    /// Fails if the mapping does not exist yet or is smaller than `len`.
    pub fn open(name: &str, len: usize) -> Result<Self> {
        trace!(name, len, "Opening file mapping");

        let mapping = unsafe {
            let wide_name = wide_string(name);
            OpenFileMappingW(FILE_MAP_READ.0, false, PCWSTR::from_raw(wide_name.as_ptr()))
                .map_err(|e| TelemetryError::region_unavailable_with_source(name, Box::new(e)))?
        };

        let base = unsafe {
            let view = MapViewOfFile(mapping, FILE_MAP_READ, 0, 0, len);
            match NonNull::new(view.Value as *mut u8) {
                Some(base) => base,
                None => {
                    let win_err = windows::core::Error::from_thread();
                    let _ = CloseHandle(mapping);
                    return Err(TelemetryError::windows_api_error("MapViewOfFile", win_err));
                }
            }
        };

        debug!(name, len, "Mapped shared memory region");
        Ok(Self { mapping, base, len })
    }

    /// Copy the mapped bytes into `buf`, returning how many were copied.
    pub fn copy_to(&self, buf: &mut [u8]) -> usize {
        let count = buf.len().min(self.len);
        // SAFETY: the view is at least `self.len` bytes and stays mapped until drop.
        // The publisher may write concurrently; a torn copy is caught by decode.
        unsafe {
            std::ptr::copy_nonoverlapping(self.base.as_ptr(), buf.as_mut_ptr(), count);
        }
        count
    }
}

impl Drop for MappedRegion {
    fn drop(&mut self) {
        unsafe {
            let addr = MEMORY_MAPPED_VIEW_ADDRESS { Value: self.base.as_ptr() as *mut _ };
            let _ = UnmapViewOfFile(addr);
            let _ = CloseHandle(self.mapping);
        }
    }
}

// SAFETY: only a handle and a read-only view pointer, both usable from any thread
unsafe impl Send for MappedRegion {}

/// Convert string to null-terminated wide string for Windows APIs
fn wide_string(s: &str) -> Vec<u16> {
    use std::ffi::OsStr;
    use std::os::windows::ffi::OsStrExt;
    OsStr::new(s).encode_wide().chain(std::iter::once(0)).collect()
}
