// SPDX-License-Identifier: GPL-2.0 OR MIT

use tracing::{error, info};

use crate::checksum::Sha256;
use crate::phys::Label;
use crate::repair::{repair_label, LabelReport, RepairDevice, RepairError};

/// Repair outcome of all labels of a device.
#[derive(Debug)]
pub struct RepairReport {
    /// Device size in bytes.
    pub size: u64,

    /// Device size in bytes, rounded down to a multiple of [`Label::SIZE`].
    pub aligned_size: u64,

    /// Labels, in index order.
    pub labels: Vec<LabelReport>,
}

impl RepairReport {
    /// Number of repaired sections across all labels.
    pub fn repaired_count(&self) -> usize {
        self.labels.iter().map(LabelReport::repaired_count).sum()
    }

    /// Process exit code: 0 if any section was repaired, else 1.
    pub fn exit_code(&self) -> i32 {
        if self.repaired_count() > 0 {
            0
        } else {
            1
        }
    }

    /// One status line per label.
    pub fn lines(&self) -> Vec<String> {
        self.labels.iter().map(|label| label.to_string()).collect()
    }
}

/// Gets the label offsets of a device, logging the size adjustment.
pub(crate) fn label_offsets<D: RepairDevice + ?Sized>(
    device: &mut D,
) -> Result<(u64, u64, [u64; Label::COUNT]), RepairError> {
    let size = device.size().map_err(|err| RepairError::Io {
        operation: "stat device",
        offset: 0,
        err,
    })?;
    info!("Calculated filesize to be {size}");

    let aligned_size = Label::aligned_size(size);
    if aligned_size != size {
        info!(
            "Filesize is not divisible by {}, recalculated to {aligned_size}",
            Label::SIZE
        );
    }

    let offsets = Label::offsets(aligned_size)
        .map_err(|_| RepairError::DeviceTooSmall { size: aligned_size })?;

    Ok((size, aligned_size, offsets))
}

/** Repairs all labels of a device, in index order.
 *
 * The device is synced once at the end. A sync failure is logged, and does
 * not change the report.
 *
 * # Errors
 *
 * Returns [`RepairError`] if the device size cannot be determined, or is too
 * small for [`Label::COUNT`] labels. Label errors are part of the report.
 */
pub fn repair_device<D: RepairDevice + ?Sized>(
    device: &mut D,
) -> Result<RepairReport, RepairError> {
    let (size, aligned_size, offsets) = label_offsets(device)?;

    let mut sha256 = Sha256::new();
    let mut labels = Vec::with_capacity(Label::COUNT);

    for (index, offset) in offsets.into_iter().enumerate() {
        labels.push(repair_label(device, index, offset, &mut sha256));
    }

    if let Err(err) = device.sync() {
        error!("cannot sync device: {err}");
    }

    Ok(RepairReport {
        size,
        aligned_size,
        labels,
    })
}

////////////////////////////////////////////////////////////////////////////////

#[cfg(test)]
mod tests {

    use std::io;

    use crate::checksum::{label_verify, Sha256};
    use crate::phys::{
        ChecksumTail, EndianOrder, Label, LabelNvPairs, NvList, NvUnique, NvValue, UberBlock,
        ENDIAN_ORDER_NATIVE, ENDIAN_ORDER_SWAP,
    };
    use crate::repair::image::{build_image, magic_bytes, LabelImage, IMAGE_SIZE};
    use crate::repair::{
        repair_device, ConfigKey, LabelSection, RepairDevice, RepairError, SectionStatus,
    };
    use crate::userspace::MemoryDevice;

    fn uber_block_offset(index: usize) -> usize {
        [0, 262144, IMAGE_SIZE - 524288, IMAGE_SIZE - 262144][index] + UberBlock::LABEL_OFFSET
    }

    fn vdev_phys_offset(index: usize) -> usize {
        [0, 262144, IMAGE_SIZE - 524288, IMAGE_SIZE - 262144][index] + LabelNvPairs::LABEL_OFFSET
    }

    fn config_at(device: &MemoryDevice, index: usize) -> NvList {
        let start = vdev_phys_offset(index);
        NvList::from_bytes(&device.data()[start..start + LabelNvPairs::PAYLOAD_SIZE]).unwrap()
    }

    #[test]
    fn end_to_end() -> Result<(), RepairError> {
        let mut device = MemoryDevice::new(build_image([
            LabelImage::fresh(42),
            LabelImage::blank(),
            LabelImage::blank(),
            LabelImage::blank(),
        ]));

        let report = repair_device(&mut device)?;
        assert_eq!(
            report.lines(),
            [
                "label 0: uberblock: repaired checksum: repaired",
                "label 1: uberblock: skipped checksum: skipped",
                "label 2: uberblock: skipped checksum: skipped",
                "label 3: uberblock: skipped checksum: skipped",
            ]
        );
        assert_eq!(report.exit_code(), 0);
        assert_eq!(device.write_count(), 2);
        assert_eq!(device.sync_count(), 1);

        // Blank labels fail to unpack.
        for label in &report.labels[1..] {
            assert!(matches!(
                label.failure(LabelSection::UberBlock),
                Some(RepairError::MalformedConfig { .. })
            ));
        }

        // Txg was patched in the uberblock and the configuration.
        let start = uber_block_offset(0);
        let uber_block = &device.data()[start..start + 4096];
        assert_eq!(UberBlock::txg(uber_block, ENDIAN_ORDER_NATIVE)?, 42);

        let config = config_at(&device, 0);
        assert_eq!(config.get_u64(ConfigKey::POOL_TXG)?, Some(42));
        assert!(!config.contains(ConfigKey::CREATE_TXG));

        // Both sections verify.
        let mut sha = Sha256::new();
        label_verify(uber_block, start as u64, &mut sha)?;
        let start = vdev_phys_offset(0);
        label_verify(
            &device.data()[start..start + LabelNvPairs::SIZE],
            start as u64,
            &mut sha,
        )?;

        // Second run does nothing.
        let report = repair_device(&mut device)?;
        assert!(report
            .lines()
            .iter()
            .all(|line| line.ends_with("uberblock: skipped checksum: skipped")));
        assert_eq!(report.exit_code(), 1);
        assert_eq!(device.write_count(), 2);

        Ok(())
    }

    /// Without a birth txg, a second run finds a correct configuration
    /// checksum, and a finalized uberblock.
    #[test]
    fn idempotent_without_birth() -> Result<(), RepairError> {
        let mut device = MemoryDevice::new(build_image([LabelImage::fresh(0); 4]));

        let report = repair_device(&mut device)?;
        assert_eq!(report.repaired_count(), 8);
        assert_eq!(device.write_count(), 8);

        let before = device.data().to_vec();
        let report = repair_device(&mut device)?;
        assert_eq!(report.repaired_count(), 0);
        assert_eq!(report.exit_code(), 1);
        assert_eq!(device.write_count(), 8);
        assert_eq!(device.data(), &before[..]);

        for label in &report.labels {
            assert_eq!(label.vdev_phys, SectionStatus::Skipped);
            assert!(label.failure(LabelSection::VdevPhys).is_none());
            assert!(matches!(
                label.failure(LabelSection::UberBlock),
                Some(RepairError::AlreadyFinalized { .. })
            ));
        }

        Ok(())
    }

    /// A correct configuration checksum is not written again.
    #[test]
    fn no_spurious_writes() -> Result<(), RepairError> {
        let mut image = LabelImage::fresh(0);
        image.vdev_phys_checksum_valid = true;
        let mut device = MemoryDevice::new(build_image([image; 4]));

        let report = repair_device(&mut device)?;
        for label in &report.labels {
            assert_eq!(label.uber_block, SectionStatus::Repaired);
            assert_eq!(label.vdev_phys, SectionStatus::Skipped);
            assert!(label.failures.is_empty());
        }
        assert_eq!(device.write_count(), 4);

        Ok(())
    }

    #[test]
    fn foreign_byte_order() -> Result<(), RepairError> {
        let mut image = LabelImage::fresh(42);
        image.order = ENDIAN_ORDER_SWAP;
        image.vdev_phys_magic = magic_bytes(ChecksumTail::MAGIC, ENDIAN_ORDER_SWAP);
        let mut device = MemoryDevice::new(build_image([image; 4]));

        let report = repair_device(&mut device)?;
        assert_eq!(report.repaired_count(), 8);

        let mut sha = Sha256::new();
        for index in 0..Label::COUNT {
            let start = uber_block_offset(index);
            let uber_block = &device.data()[start..start + 4096];

            assert_eq!(UberBlock::txg(uber_block, ENDIAN_ORDER_SWAP)?, 42);

            let tail = ChecksumTail::from_bytes(ChecksumTail::tail_bytes(uber_block)?)?;
            assert_eq!(tail.order, ENDIAN_ORDER_SWAP);
            label_verify(uber_block, start as u64, &mut sha)?;

            let start = vdev_phys_offset(index);
            let vdev_phys = &device.data()[start..start + LabelNvPairs::SIZE];
            let tail = ChecksumTail::from_bytes(ChecksumTail::tail_bytes(vdev_phys)?)?;
            assert_eq!(tail.order, ENDIAN_ORDER_SWAP);
            label_verify(vdev_phys, start as u64, &mut sha)?;
        }

        Ok(())
    }

    #[test]
    fn already_finalized_is_untouched() -> Result<(), RepairError> {
        let mut image = LabelImage::fresh(42);
        image.uber_block_tail_magic = magic_bytes(ChecksumTail::MAGIC, ENDIAN_ORDER_NATIVE);
        let mut device = MemoryDevice::new(build_image([image; 4]));

        let before = device.data().to_vec();
        let report = repair_device(&mut device)?;

        for label in &report.labels {
            assert_eq!(label.uber_block, SectionStatus::Skipped);
            assert!(matches!(
                label.failure(LabelSection::UberBlock),
                Some(RepairError::AlreadyFinalized { .. })
            ));
            assert_eq!(label.vdev_phys, SectionStatus::Repaired);
        }

        for index in 0..Label::COUNT {
            let start = uber_block_offset(index);
            assert_eq!(
                &device.data()[start..start + 4096],
                &before[start..start + 4096]
            );
        }

        Ok(())
    }

    #[test]
    fn missing_checksum_marker() -> Result<(), RepairError> {
        let mut zero = LabelImage::fresh(0);
        zero.vdev_phys_magic = [0; 8];
        let mut garbage = LabelImage::fresh(0);
        garbage.vdev_phys_magic = [0x5a; 8];

        let mut device = MemoryDevice::new(build_image([zero, garbage, zero, garbage]));

        let report = repair_device(&mut device)?;
        for label in &report.labels {
            assert_eq!(label.uber_block, SectionStatus::Repaired);
            assert_eq!(label.vdev_phys, SectionStatus::Skipped);
            assert!(matches!(
                label.failure(LabelSection::VdevPhys),
                Some(RepairError::MissingChecksumMarker { .. })
            ));
        }
        assert_eq!(report.exit_code(), 0);

        Ok(())
    }

    #[test]
    fn rejected_labels() -> Result<(), RepairError> {
        let mut txg = LabelImage::fresh(42);
        txg.txg = 5;
        let mut guid = LabelImage::fresh(42);
        guid.guid = false;
        let mut ashift = LabelImage::fresh(42);
        ashift.ashift = 0;
        let mut overflow = LabelImage::fresh(42);
        overflow.fill_payload = true;

        let mut device = MemoryDevice::new(build_image([txg, guid, ashift, overflow]));
        let before = device.data().to_vec();

        let report = repair_device(&mut device)?;
        assert_eq!(report.exit_code(), 1);
        assert_eq!(device.write_count(), 0);
        assert_eq!(device.data(), &before[..]);

        assert!(matches!(
            report.labels[0].failure(LabelSection::VdevPhys),
            Some(RepairError::UnexpectedTxg { txg: 5 })
        ));
        assert!(matches!(
            report.labels[1].failure(LabelSection::VdevPhys),
            Some(RepairError::MissingField { name: "guid" })
        ));
        assert!(matches!(
            report.labels[2].failure(LabelSection::VdevPhys),
            Some(RepairError::MissingField { name: "ashift" })
        ));
        assert!(matches!(
            report.labels[3].failure(LabelSection::VdevPhys),
            Some(RepairError::PackOverflow { .. })
        ));

        for label in &report.labels {
            assert_eq!(label.failures.len(), 1);
            assert!(label.failures[0].section.is_none());
        }

        Ok(())
    }

    #[test]
    fn deeply_nested_config() -> Result<(), RepairError> {
        let mut nested = NvList::new(NvUnique::Name);
        for _ in 0..NvList::MAX_DEPTH {
            let mut outer = NvList::new(NvUnique::Name);
            outer.add("", NvValue::NvList(nested));
            nested = outer;
        }
        let mut config = LabelImage::fresh(42).config();
        config.add("nested", NvValue::NvList(nested));

        let mut data = build_image([LabelImage::fresh(42); 4]);
        let start = vdev_phys_offset(0);
        config
            .to_bytes(&mut data[start..start + LabelNvPairs::PAYLOAD_SIZE])
            .unwrap();
        let mut device = MemoryDevice::new(data);

        let report = repair_device(&mut device)?;
        assert!(matches!(
            report.labels[0].failure(LabelSection::VdevPhys),
            Some(RepairError::MalformedConfig { .. })
        ));
        assert_eq!(report.labels[0].uber_block, SectionStatus::Skipped);
        assert_eq!(report.labels[1].uber_block, SectionStatus::Repaired);

        Ok(())
    }

    #[test]
    fn short_writes_are_skipped() -> Result<(), RepairError> {
        let mut device = MemoryDevice::new(build_image([LabelImage::fresh(42); 4]));
        device.set_write_limit(Some(512));

        let report = repair_device(&mut device)?;
        assert_eq!(report.exit_code(), 1);
        assert_eq!(device.write_count(), 8);

        for label in &report.labels {
            assert!(matches!(
                label.failure(LabelSection::UberBlock),
                Some(RepairError::ShortWrite { actual: 512, .. })
            ));
            assert!(matches!(
                label.failure(LabelSection::VdevPhys),
                Some(RepairError::ShortWrite { actual: 512, .. })
            ));
        }

        Ok(())
    }

    /// An unaligned device uses the same label offsets as the rounded size.
    #[test]
    fn size_alignment() -> Result<(), RepairError> {
        let aligned = build_image([LabelImage::fresh(42); 4]);
        let mut unaligned = aligned.clone();
        unaligned.extend_from_slice(&[0; 100]);

        let mut aligned = MemoryDevice::new(aligned);
        let mut unaligned = MemoryDevice::new(unaligned);

        let a = repair_device(&mut aligned)?;
        let b = repair_device(&mut unaligned)?;

        assert_eq!(b.size, IMAGE_SIZE as u64 + 100);
        assert_eq!(b.aligned_size, IMAGE_SIZE as u64);
        assert_eq!(a.lines(), b.lines());
        assert_eq!(
            a.labels.iter().map(|l| l.offset).collect::<Vec<_>>(),
            b.labels.iter().map(|l| l.offset).collect::<Vec<_>>()
        );
        assert_eq!(aligned.data(), &unaligned.data()[..IMAGE_SIZE]);

        Ok(())
    }

    #[test]
    fn device_too_small() {
        let mut device = MemoryDevice::new(vec![0; Label::SIZE * 4 - 1]);
        assert!(matches!(
            repair_device(&mut device),
            Err(RepairError::DeviceTooSmall { size: 786432 })
        ));
        assert_eq!(device.write_count(), 0);
    }

    /// Device whose reads and sync fail.
    struct FailingDevice {}

    impl RepairDevice for FailingDevice {
        fn size(&mut self) -> io::Result<u64> {
            Ok(IMAGE_SIZE as u64)
        }

        fn read_at(&mut self, _data: &mut [u8], _offset: u64) -> io::Result<usize> {
            Err(io::Error::other("read failed"))
        }

        fn write_at(&mut self, _data: &[u8], _offset: u64) -> io::Result<usize> {
            Err(io::Error::other("write failed"))
        }

        fn sync(&mut self) -> io::Result<()> {
            Err(io::Error::other("sync failed"))
        }
    }

    #[test]
    fn read_errors_continue() -> Result<(), RepairError> {
        let report = repair_device(&mut FailingDevice {})?;

        assert_eq!(report.labels.len(), Label::COUNT);
        assert_eq!(report.exit_code(), 1);
        for label in &report.labels {
            assert!(matches!(
                label.failure(LabelSection::UberBlock),
                Some(RepairError::Io {
                    operation: "read label",
                    ..
                })
            ));
        }

        Ok(())
    }

    #[test]
    fn short_read() -> Result<(), RepairError> {
        let mut device = MemoryDevice::new(build_image([LabelImage::fresh(42); 4]));
        device.set_read_limit(Some(4096));

        let report = repair_device(&mut device)?;
        assert_eq!(report.exit_code(), 1);
        assert!(matches!(
            report.labels[0].failure(LabelSection::UberBlock),
            Some(RepairError::ShortRead {
                offset: 0,
                expected: 262144,
                actual: 4096
            })
        ));

        Ok(())
    }

    #[test]
    fn byte_order_tracks_uber_block_magic() -> Result<(), RepairError> {
        // Without a valid configuration magic, the uberblock magic decides
        // the order of its fields.
        let mut image = LabelImage::fresh(42);
        image.order = EndianOrder::Big;
        image.vdev_phys_magic = [0; 8];
        let mut device = MemoryDevice::new(build_image([image; 4]));

        let report = repair_device(&mut device)?;
        let start = uber_block_offset(0);
        let uber_block = &device.data()[start..start + 4096];

        assert_eq!(report.labels[0].uber_block, SectionStatus::Repaired);
        assert_eq!(UberBlock::txg(uber_block, EndianOrder::Big)?, 42);
        assert_eq!(
            ChecksumTail::from_bytes(ChecksumTail::tail_bytes(uber_block)?)?.order,
            EndianOrder::Big
        );

        Ok(())
    }
}
