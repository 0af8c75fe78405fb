// SPDX-License-Identifier: GPL-2.0 OR MIT

//! Synthetic device images for tests.

use crate::checksum::{label_checksum, Sha256};
use crate::phys::{
    ChecksumTail, EndianOrder, Label, LabelNvPairs, NvList, NvUnique, NvValue, UberBlock,
    UberBlockHeader, ENDIAN_ORDER_NATIVE,
};
use crate::repair::ConfigKey;

/// Size of a built image, 1 MiB.
pub(crate) const IMAGE_SIZE: usize = 4 * Label::SIZE;

/// Encodes a magic in `order`.
pub(crate) fn magic_bytes(magic: u64, order: EndianOrder) -> [u8; 8] {
    match order {
        EndianOrder::Big => magic.to_be_bytes(),
        EndianOrder::Little => magic.to_le_bytes(),
    }
}

/// Contents of one label of an image.
#[derive(Clone, Copy, Debug)]
pub(crate) struct LabelImage {
    /// All zero label.
    pub blank: bool,

    /// Order of the uberblock fields.
    pub order: EndianOrder,

    /// Uberblock txg.
    pub txg: u64,

    /// Root block pointer birth txg.
    pub birth: u64,

    /// Ashift in the vdev tree.
    pub ashift: u64,

    /// Include the pool GUID.
    pub guid: bool,

    /// Pad the configuration until adding a txg no longer fits.
    pub fill_payload: bool,

    /// Raw uberblock checksum tail magic.
    pub uber_block_tail_magic: [u8; 8],

    /// Raw configuration checksum tail magic.
    pub vdev_phys_magic: [u8; 8],

    /// Store a correct configuration checksum, instead of garbage.
    pub vdev_phys_checksum_valid: bool,
}

impl LabelImage {
    /// A label left behind before its first sync.
    pub(crate) fn fresh(birth: u64) -> LabelImage {
        LabelImage {
            blank: false,
            order: ENDIAN_ORDER_NATIVE,
            txg: 0,
            birth,
            ashift: 12,
            guid: true,
            fill_payload: false,
            uber_block_tail_magic: [0; 8],
            vdev_phys_magic: magic_bytes(ChecksumTail::MAGIC, ENDIAN_ORDER_NATIVE),
            vdev_phys_checksum_valid: false,
        }
    }

    pub(crate) fn blank() -> LabelImage {
        LabelImage {
            blank: true,
            ..LabelImage::fresh(0)
        }
    }

    pub(crate) fn config(&self) -> NvList {
        let mut vdev_tree = NvList::new(NvUnique::Name);
        vdev_tree.add("type", NvValue::String("disk".to_string()));
        vdev_tree.add_u64("id", 0);
        vdev_tree.add_u64(ConfigKey::GUID, 0x5eed);
        vdev_tree.add("path", NvValue::String("/dev/sda1".to_string()));
        vdev_tree.add_u64(ConfigKey::ASHIFT, self.ashift);

        let mut config = NvList::new(NvUnique::Name);
        config.order = self.order.into();
        config.add_u64(ConfigKey::VERSION, 5000);
        config.add("name", NvValue::String("tank".to_string()));
        config.add_u64(ConfigKey::POOL_STATE, 0);
        if !self.fill_payload {
            config.add_u64(ConfigKey::POOL_TXG, 0);
            config.add_u64(ConfigKey::CREATE_TXG, 4);
        }
        if self.guid {
            config.add_u64(ConfigKey::GUID, 0xdeadbeef);
        }
        config.add_u64("top_guid", 0x5eed);
        config.add(ConfigKey::VDEV_TREE, NvValue::NvList(vdev_tree));

        if self.fill_payload {
            // Pair header, and the aligned name "pad".
            let used = config.encoded_size() + 20 + 4;
            let length = (LabelNvPairs::PAYLOAD_SIZE - used) & !3;
            config.add("pad", NvValue::ByteArray(vec![0xcc; length]));
        }

        config
    }

    /// Builds a label located at `offset` in the device.
    pub(crate) fn build(&self, offset: u64) -> Vec<u8> {
        let mut label = vec![0; Label::SIZE];
        if self.blank {
            return label;
        }

        let vdev_phys = LabelNvPairs::bytes_mut(&mut label).unwrap();
        LabelNvPairs::set_config(vdev_phys, &self.config()).unwrap();

        let tail = ChecksumTail::tail_bytes_mut(vdev_phys).unwrap();
        tail[0..8].copy_from_slice(&self.vdev_phys_magic);
        tail[8..].fill(0x5a);

        if self.vdev_phys_checksum_valid {
            label_checksum(
                vdev_phys,
                offset + LabelNvPairs::LABEL_OFFSET as u64,
                &mut Sha256::new(),
                self.order,
            )
            .unwrap();
        }

        let uber_block = Label::uber_block_mut(&mut label, self.ashift).unwrap();
        let header = UberBlockHeader {
            version: 5000,
            txg: self.txg,
            guid_sum: 0xdeadbeef + 0x5eed,
            timestamp: 1700000000,
            birth_txg: self.birth,
        };
        UberBlock::init(uber_block, self.order, &header).unwrap();

        let tail = ChecksumTail::tail_bytes_mut(uber_block).unwrap();
        tail[0..8].copy_from_slice(&self.uber_block_tail_magic);

        label
    }
}

/// Builds a 1 MiB image with four labels.
pub(crate) fn build_image(labels: [LabelImage; Label::COUNT]) -> Vec<u8> {
    let mut image = vec![0; IMAGE_SIZE];
    let offsets = Label::offsets(IMAGE_SIZE as u64).unwrap();

    for (label, offset) in labels.iter().zip(offsets) {
        let start = offset as usize;
        image[start..start + Label::SIZE].copy_from_slice(&label.build(offset));
    }

    image
}
