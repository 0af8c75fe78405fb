// SPDX-License-Identifier: GPL-2.0 OR MIT

use std::fs;
use std::io::{self, Seek, SeekFrom};
use std::os::unix::fs::FileExt;
use std::path::{Path, PathBuf};

use crate::repair::RepairDevice;

/// A block device interface to a file.
#[derive(Debug)]
pub struct BlockDevice {
    /// Block device file.
    file: fs::File,

    /// Path the file was opened with.
    path: PathBuf,
}

impl BlockDevice {
    /** Open the path as a block device, for reading and writing.
     *
     * # Errors
     *
     * Returns [`BlockDeviceOpenError`] in case of error.
     */
    pub fn open(path: &Path) -> Result<BlockDevice, BlockDeviceOpenError> {
        BlockDevice::open_with(path, true)
    }

    /** Open the path as a block device, for reading only.
     *
     * Writes return an [`io::Error`].
     *
     * # Errors
     *
     * Returns [`BlockDeviceOpenError`] in case of error.
     */
    pub fn open_read_only(path: &Path) -> Result<BlockDevice, BlockDeviceOpenError> {
        BlockDevice::open_with(path, false)
    }

    fn open_with(path: &Path, write: bool) -> Result<BlockDevice, BlockDeviceOpenError> {
        let file = fs::OpenOptions::new()
            .read(true)
            .write(write)
            .open(path)
            .map_err(|err| BlockDeviceOpenError::Open {
                path: path.to_path_buf(),
                err,
            })?;

        Ok(BlockDevice {
            file,
            path: path.to_path_buf(),
        })
    }

    /// Path of the device.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl RepairDevice for BlockDevice {
    /// Seeks to the end, which also works for block devices whose metadata
    /// length is zero.
    fn size(&mut self) -> io::Result<u64> {
        self.file.seek(SeekFrom::End(0))
    }

    fn read_at(&mut self, data: &mut [u8], offset: u64) -> io::Result<usize> {
        let mut done = 0;

        // Short reads are retried until end of file.
        while done < data.len() {
            match self.file.read_at(&mut data[done..], offset + done as u64) {
                Ok(0) => break,
                Ok(read) => done += read,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            }
        }

        Ok(done)
    }

    fn write_at(&mut self, data: &[u8], offset: u64) -> io::Result<usize> {
        let mut done = 0;

        while done < data.len() {
            match self.file.write_at(&data[done..], offset + done as u64) {
                Ok(0) => break,
                Ok(written) => done += written,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            }
        }

        Ok(done)
    }

    fn sync(&mut self) -> io::Result<()> {
        self.file.sync_all()
    }
}

/// [`BlockDevice`] open error.
#[derive(Debug, thiserror::Error)]
pub enum BlockDeviceOpenError {
    /// Block device open error.
    #[error("cannot open '{}': {err}", path.display())]
    Open {
        /// Path.
        path: PathBuf,
        /// Error.
        #[source]
        err: io::Error,
    },
}

////////////////////////////////////////////////////////////////////////////////

#[cfg(test)]
mod tests {

    use std::io::Write;

    use crate::repair::RepairDevice;
    use crate::userspace::{BlockDevice, BlockDeviceOpenError};

    #[test]
    fn read_write_size() -> Result<(), Box<dyn std::error::Error>> {
        let mut file = tempfile::NamedTempFile::new()?;
        file.write_all(&[1; 4096])?;
        file.flush()?;

        let mut device = BlockDevice::open(file.path())?;
        assert_eq!(device.size()?, 4096);

        assert_eq!(device.write_at(&[2; 16], 100)?, 16);
        device.sync()?;

        let mut data = [0; 32];
        assert_eq!(device.read_at(&mut data, 92)?, 32);
        assert_eq!(&data[0..8], &[1; 8]);
        assert_eq!(&data[8..24], &[2; 16]);
        assert_eq!(&data[24..32], &[1; 8]);

        // Read past end is short.
        assert_eq!(device.read_at(&mut data, 4080)?, 16);
        assert_eq!(device.read_at(&mut data, 8192)?, 0);

        Ok(())
    }

    #[test]
    fn read_only_rejects_writes() -> Result<(), Box<dyn std::error::Error>> {
        let mut file = tempfile::NamedTempFile::new()?;
        file.write_all(&[0; 512])?;
        file.flush()?;

        let mut device = BlockDevice::open_read_only(file.path())?;
        assert!(device.write_at(&[1; 8], 0).is_err());
        assert_eq!(device.path(), file.path());

        Ok(())
    }

    #[test]
    fn open_missing() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing");
        assert!(matches!(
            BlockDevice::open(&path),
            Err(BlockDeviceOpenError::Open { .. })
        ));
    }
}
