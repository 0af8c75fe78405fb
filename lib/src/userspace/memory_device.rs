// SPDX-License-Identifier: GPL-2.0 OR MIT

use std::io;

use crate::repair::RepairDevice;

/** An in memory device.
 *
 * Counts calls to [`RepairDevice::write_at`] and [`RepairDevice::sync`], and
 * can limit the bytes transferred per call to simulate short reads and
 * writes.
 */
#[derive(Debug, Default)]
pub struct MemoryDevice {
    data: Vec<u8>,
    read_limit: Option<usize>,
    write_limit: Option<usize>,
    writes: usize,
    syncs: usize,
}

impl MemoryDevice {
    /// Create a device with the `data`.
    pub fn new(data: Vec<u8>) -> MemoryDevice {
        MemoryDevice {
            data,
            ..Default::default()
        }
    }

    /// Device bytes.
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Consumes the device, returning its bytes.
    pub fn into_inner(self) -> Vec<u8> {
        self.data
    }

    /// Number of [`RepairDevice::write_at`] calls.
    pub fn write_count(&self) -> usize {
        self.writes
    }

    /// Number of [`RepairDevice::sync`] calls.
    pub fn sync_count(&self) -> usize {
        self.syncs
    }

    /// Limits the bytes read per call.
    pub fn set_read_limit(&mut self, limit: Option<usize>) {
        self.read_limit = limit;
    }

    /// Limits the bytes written per call.
    pub fn set_write_limit(&mut self, limit: Option<usize>) {
        self.write_limit = limit;
    }

    /// Range of at most `length` bytes at `offset`, clamped to the data.
    fn range(&self, offset: u64, length: usize, limit: Option<usize>) -> (usize, usize) {
        let start = usize::try_from(offset)
            .unwrap_or(usize::MAX)
            .min(self.data.len());
        let length = length
            .min(self.data.len() - start)
            .min(limit.unwrap_or(usize::MAX));

        (start, length)
    }
}

impl RepairDevice for MemoryDevice {
    fn size(&mut self) -> io::Result<u64> {
        Ok(self.data.len() as u64)
    }

    fn read_at(&mut self, data: &mut [u8], offset: u64) -> io::Result<usize> {
        let (start, length) = self.range(offset, data.len(), self.read_limit);
        data[..length].copy_from_slice(&self.data[start..start + length]);
        Ok(length)
    }

    fn write_at(&mut self, data: &[u8], offset: u64) -> io::Result<usize> {
        self.writes += 1;
        let (start, length) = self.range(offset, data.len(), self.write_limit);
        self.data[start..start + length].copy_from_slice(&data[..length]);
        Ok(length)
    }

    fn sync(&mut self) -> io::Result<()> {
        self.syncs += 1;
        Ok(())
    }
}

////////////////////////////////////////////////////////////////////////////////

#[cfg(test)]
mod tests {

    use std::io;

    use crate::repair::RepairDevice;
    use crate::userspace::MemoryDevice;

    #[test]
    fn limits_and_bounds() -> io::Result<()> {
        let mut device = MemoryDevice::new(vec![0; 64]);

        assert_eq!(device.write_at(&[1; 16], 56)?, 8);
        assert_eq!(device.write_count(), 1);

        device.set_write_limit(Some(4));
        assert_eq!(device.write_at(&[2; 16], 0)?, 4);

        let mut data = [0; 16];
        assert_eq!(device.read_at(&mut data, 0)?, 16);
        assert_eq!(&data[0..4], &[2; 4]);
        assert_eq!(&data[4..16], &[0; 12]);

        device.set_read_limit(Some(2));
        assert_eq!(device.read_at(&mut data, 0)?, 2);
        assert_eq!(device.read_at(&mut data, 1000)?, 0);

        assert_eq!(device.size()?, 64);
        device.sync()?;
        assert_eq!(device.sync_count(), 1);
        assert_eq!(device.into_inner()[56..], [1; 8]);

        Ok(())
    }
}
