//! Platform access to the simulator's shared memory region.

use crate::Result;

/// A readable shared memory region.
pub(crate) trait SharedRegion: Send {
    /// Copy the current contents into `buf`, returning the number of bytes copied.
    ///
    /// Fewer bytes than `buf.len()` means the region is not fully populated yet.
    fn read_into(&mut self, buf: &mut [u8]) -> std::io::Result<usize>;
}

#[cfg(windows)]
mod platform {
    use super::SharedRegion;
    use crate::Result;
    use crate::snapshot::SNAPSHOT_SIZE;
    use crate::windows::MappedRegion;

    impl SharedRegion for MappedRegion {
        fn read_into(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
            Ok(self.copy_to(buf))
        }
    }

    pub(crate) fn open_region(name: &str) -> Result<Box<dyn SharedRegion>> {
        Ok(Box::new(MappedRegion::open(name, SNAPSHOT_SIZE)?))
    }
}

#[cfg(not(windows))]
mod platform {
    use super::SharedRegion;
    use crate::{Result, TelemetryError};
    use std::fs::File;
    use std::io::{ErrorKind, Read, Seek, SeekFrom};
    use std::path::PathBuf;
    use tracing::debug;

    /// POSIX shared memory object (or any file) read from the start on every poll.
    struct FileRegion {
        file: File,
    }

    impl SharedRegion for FileRegion {
        fn read_into(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
            self.file.seek(SeekFrom::Start(0))?;
            let mut filled = 0;
            while filled < buf.len() {
                match self.file.read(&mut buf[filled..]) {
                    Ok(0) => break,
                    Ok(n) => filled += n,
                    Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                    Err(e) => return Err(e),
                }
            }
            Ok(filled)
        }
    }

    /// `/dev/shm/<name>`, or `name` itself when it already looks like a path.
    pub(crate) fn region_path(name: &str) -> PathBuf {
        if name.contains('/') {
            PathBuf::from(name)
        } else {
            PathBuf::from("/dev/shm").join(name)
        }
    }

    pub(crate) fn open_region(name: &str) -> Result<Box<dyn SharedRegion>> {
        let path = region_path(name);
        let file = File::open(&path)
            .map_err(|e| TelemetryError::region_unavailable_with_source(name, Box::new(e)))?;
        debug!(path = %path.display(), "Opened shared memory region");
        Ok(Box::new(FileRegion { file }))
    }
}

pub(crate) use platform::open_region;

#[cfg(all(test, not(windows)))]
mod tests {
    use super::platform::region_path;
    use super::*;
    use crate::TelemetryError;
    use std::io::Write;

    #[test]
    fn names_map_to_dev_shm_unless_they_are_paths() {
        assert_eq!(region_path("$Slipstream"), std::path::PathBuf::from("/dev/shm/$Slipstream"));
        assert_eq!(region_path("/tmp/r3e.bin"), std::path::PathBuf::from("/tmp/r3e.bin"));
    }

    #[test]
    fn missing_region_is_retryable() {
        let dir = tempfile::tempdir().unwrap();
        let name = dir.path().join("absent").display().to_string();
        let err = open_region(&name).err().expect("region should be missing");
        assert!(matches!(err, TelemetryError::RegionUnavailable { .. }));
        assert!(err.is_retryable());
    }

    #[test]
    fn reads_restart_from_the_beginning() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(&[1, 2, 3, 4]).unwrap();
        file.flush().unwrap();

        let mut region = open_region(&file.path().display().to_string()).unwrap();
        let mut buf = [0u8; 8];
        assert_eq!(region.read_into(&mut buf).unwrap(), 4);
        assert_eq!(&buf[..4], &[1, 2, 3, 4]);

        file.write_all(&[5, 6, 7, 8]).unwrap();
        file.flush().unwrap();
        assert_eq!(region.read_into(&mut buf).unwrap(), 8);
        assert_eq!(buf, [1, 2, 3, 4, 5, 6, 7, 8]);
    }
}
