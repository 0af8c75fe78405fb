// SPDX-License-Identifier: GPL-2.0 OR MIT

use crate::phys::{ChecksumTail, NvDecodeError, NvEncodeError, NvList, UberBlock};

////////////////////////////////////////////////////////////////////////////////

/**
 * NV Pairs portion of a [`Label`], also known as `vdev_phys`.
 *
 * ### Byte layout.
 *
 * - Bytes: 114688 (112 KiB)
 *
 * ```text
 * +---------------+--------+
 * | payload       | 114648 |
 * +---------------+--------+
 * | checksum tail |     40 |
 * +---------------+--------+
 * ```
 *
 * The payload is an XDR encoded [`NvList`], followed by zero bytes.
 */
#[derive(Debug)]
pub struct LabelNvPairs {}

impl LabelNvPairs {
    /// Byte size of an encoded [`LabelNvPairs`].
    pub const SIZE: usize = 112 * 1024;

    /// Byte offset into a [`Label`].
    pub const LABEL_OFFSET: usize = Label::BLANK_SIZE + Label::BOOT_HEADER_SIZE;

    /// Byte size of the payload (114648).
    pub const PAYLOAD_SIZE: usize = LabelNvPairs::SIZE - ChecksumTail::SIZE;

    /** Gets the bytes of the [`LabelNvPairs`] in a label.
     *
     * # Errors
     *
     * Returns [`LabelError`] if `label` is not [`Label::SIZE`] bytes.
     */
    pub fn bytes(label: &[u8]) -> Result<&[u8; LabelNvPairs::SIZE], LabelError> {
        Label::check_size(label)?;
        label[LabelNvPairs::LABEL_OFFSET..LabelNvPairs::LABEL_OFFSET + LabelNvPairs::SIZE]
            .try_into()
            .map_err(|_| LabelError::InvalidSize { size: label.len() })
    }

    /** Gets the mutable bytes of the [`LabelNvPairs`] in a label.
     *
     * # Errors
     *
     * Returns [`LabelError`] if `label` is not [`Label::SIZE`] bytes.
     */
    pub fn bytes_mut(label: &mut [u8]) -> Result<&mut [u8; LabelNvPairs::SIZE], LabelError> {
        Label::check_size(label)?;
        let size = label.len();
        (&mut label[LabelNvPairs::LABEL_OFFSET..LabelNvPairs::LABEL_OFFSET + LabelNvPairs::SIZE])
            .try_into()
            .map_err(|_| LabelError::InvalidSize { size })
    }

    /** Decodes the configuration [`NvList`] from the payload.
     *
     * # Errors
     *
     * Returns [`NvDecodeError`] if the payload is not a valid [`NvList`].
     */
    pub fn config(bytes: &[u8; LabelNvPairs::SIZE]) -> Result<NvList, NvDecodeError> {
        NvList::from_bytes(&bytes[0..LabelNvPairs::PAYLOAD_SIZE])
    }

    /** Encodes the configuration [`NvList`] into the payload, and zero fills
     * the rest of the payload. The checksum tail is not modified.
     *
     * Returns the encoded size of the [`NvList`].
     *
     * # Errors
     *
     * Returns [`NvEncodeError`] if the [`NvList`] does not fit. The bytes are
     * not modified in that case.
     */
    pub fn set_config(
        bytes: &mut [u8; LabelNvPairs::SIZE],
        config: &NvList,
    ) -> Result<usize, NvEncodeError> {
        let payload = &mut bytes[0..LabelNvPairs::PAYLOAD_SIZE];
        let length = config.to_bytes(payload)?;
        payload[length..].fill(0);

        Ok(length)
    }
}

////////////////////////////////////////////////////////////////////////////////

/**
 * Label of a block device.
 *
 * ### Byte layout.
 *
 * - Bytes: 262144 (256 KiB)
 *
 * ```text
 * +--------------+--------+
 * | Blank        |   8192 |
 * +--------------+--------+
 * | BootHeader   |   8192 |
 * | NvPairs      | 114688 |
 * | UberBlock[0] |      X |
 * | ...          |    ... |
 * | UberBlock[N] |      X |
 * +--------------+--------+
 *
 * X: Refer to UberBlock documentation.
 * N: (128 * KiB / X) - 1
 *    Minus one for 0 offset indexing
 * ```
 *
 * ### Label layout in block device.
 *
 * ```text
 * +----+----+-----+----+----+
 * | L0 | L1 | ... | L2 | L3 |
 * +----+----+-----+----+----+
 * ```
 */
#[derive(Debug)]
pub struct Label {}

impl Label {
    /// Count of [`Label`] in a vdev.
    pub const COUNT: usize = 4;

    /// Byte size of the blank space at the start of a [`Label`].
    pub const BLANK_SIZE: usize = 8 * 1024;

    /// Byte size of the boot header of a [`Label`].
    pub const BOOT_HEADER_SIZE: usize = 8 * 1024;

    /// Byte size of an encoded [`Label`] (256 KiB).
    pub const SIZE: usize =
        Label::BLANK_SIZE + Label::BOOT_HEADER_SIZE + LabelNvPairs::SIZE + UberBlock::TOTAL_SIZE;

    fn check_size(label: &[u8]) -> Result<(), LabelError> {
        if label.len() == Label::SIZE {
            Ok(())
        } else {
            Err(LabelError::InvalidSize { size: label.len() })
        }
    }

    /** Rounds a device size down to a multiple of [`Label::SIZE`].
     *
     * ```
     * use rzhack::phys::Label;
     *
     * assert_eq!(Label::aligned_size(1048576 + 100), 1048576);
     * assert_eq!(Label::aligned_size(1048576), 1048576);
     * assert_eq!(Label::aligned_size(100), 0);
     * ```
     */
    pub fn aligned_size(size: u64) -> u64 {
        size - (size % (Label::SIZE as u64))
    }

    /** Gets label byte offsets for a device size in bytes.
     *
     * The size should already be rounded with [`Label::aligned_size`].
     *
     * # Errors
     *
     * Returns [`LabelError`] if `size` is too small for [`Label::COUNT`] labels.
     *
     * ```
     * use rzhack::phys::Label;
     *
     * assert_eq!(
     *     Label::offsets(1048576).unwrap(),
     *     [0, 262144, 524288, 786432]
     * );
     * assert!(Label::offsets(524288).is_err());
     * ```
     */
    pub fn offsets(size: u64) -> Result<[u64; Label::COUNT], LabelError> {
        let label_size = Label::SIZE as u64;

        // Check if vdev is too small.
        if size < label_size * (Label::COUNT as u64) {
            return Err(LabelError::TooSmall { size });
        }

        Ok([
            // L0
            0,
            // L1
            label_size,
            // L2
            size - 2 * label_size,
            // L3
            size - label_size,
        ])
    }

    /** Gets the bytes of the first [`UberBlock`] in a label.
     *
     * The size of the [`UberBlock`] is derived from `ashift`.
     *
     * # Errors
     *
     * Returns [`LabelError`] if `label` is not [`Label::SIZE`] bytes.
     */
    pub fn uber_block(label: &[u8], ashift: u64) -> Result<&[u8], LabelError> {
        Label::check_size(label)?;
        let size = UberBlock::get_size_from_ashift(ashift);
        Ok(&label[UberBlock::LABEL_OFFSET..UberBlock::LABEL_OFFSET + size])
    }

    /** Gets the mutable bytes of the first [`UberBlock`] in a label.
     *
     * # Errors
     *
     * Returns [`LabelError`] if `label` is not [`Label::SIZE`] bytes.
     */
    pub fn uber_block_mut(label: &mut [u8], ashift: u64) -> Result<&mut [u8], LabelError> {
        Label::check_size(label)?;
        let size = UberBlock::get_size_from_ashift(ashift);
        Ok(&mut label[UberBlock::LABEL_OFFSET..UberBlock::LABEL_OFFSET + size])
    }
}

/// [`Label`] error.
#[derive(Debug, thiserror::Error)]
pub enum LabelError {
    /// Label bytes are not [`Label::SIZE`].
    #[error("Label has invalid size {size}")]
    InvalidSize {
        /// Size.
        size: usize,
    },

    /// Not enough bytes for [`Label::offsets`].
    #[error("Not enough bytes for Label::offsets: {size}")]
    TooSmall {
        /// Size.
        size: u64,
    },
}

////////////////////////////////////////////////////////////////////////////////
