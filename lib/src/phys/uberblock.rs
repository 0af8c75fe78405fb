// SPDX-License-Identifier: GPL-2.0 OR MIT

use crate::phys::{
    ChecksumTail, EndianDecodeError, EndianDecoder, EndianEncodeError, EndianEncoder, EndianOrder,
    LabelNvPairs,
};

////////////////////////////////////////////////////////////////////////////////

/** Uberblock.
 *
 * ### Byte layout.
 *
 * - Bytes: power of two from 1024 to 8192
 * - The size is derived from the `ashift` of the top level vdev, clamped
 *   to [`UberBlock::MIN_SHIFT`] and [`UberBlock::MAX_SHIFT`].
 *
 * ```text
 * +------------------+------+
 * | Field            | Size |
 * +------------------+------+
 * | magic            |   8  |
 * | version          |   8  |
 * | txg              |   8  |
 * | guid sum         |   8  |
 * | timestamp        |   8  |
 * | block pointer    | 128  |
 * | ...              |   X  |
 * | checksum tail    |  40  |
 * +------------------+------+
 * ```
 *
 * All fields are encoded in the byte order of the writer. The `magic` field
 * matches [`UberBlock::MAGIC`] in that order, once the [`UberBlock`] has been
 * written out.
 *
 * Only the fields needed to patch the transaction group are accessed. The
 * block pointer is not decoded, except for its logical birth transaction
 * group.
 */
#[derive(Debug)]
pub struct UberBlock {}

impl UberBlock {
    /// Total byte size of all encoded [`UberBlock`] in bytes in a [`crate::phys::Label`].
    pub const TOTAL_SIZE: usize = 131072;

    /// Offset in bytes from the start of a [`crate::phys::Label`] of first [`UberBlock`].
    pub const LABEL_OFFSET: usize = LabelNvPairs::LABEL_OFFSET + LabelNvPairs::SIZE;

    /// Magic value for an encoded [`UberBlock`].
    pub const MAGIC: u64 = 0x0000000000bab10c;

    /// Minimum shift of an [`UberBlock`] size.
    pub const MIN_SHIFT: u64 = 10;

    /// Maximum shift of an [`UberBlock`] size.
    pub const MAX_SHIFT: u64 = 13;

    /// Byte offset of `magic`.
    pub const MAGIC_OFFSET: usize = 0;

    /// Byte offset of `version`.
    pub const VERSION_OFFSET: usize = 8;

    /// Byte offset of `txg`.
    pub const TXG_OFFSET: usize = 16;

    /// Byte offset of `guid_sum`.
    pub const GUID_SUM_OFFSET: usize = 24;

    /// Byte offset of `timestamp`.
    pub const TIMESTAMP_OFFSET: usize = 32;

    /// Byte offset of the root block pointer.
    pub const BLOCK_POINTER_OFFSET: usize = 40;

    /// Byte offset of the logical birth txg of the root block pointer.
    pub const BIRTH_TXG_OFFSET: usize = UberBlock::BLOCK_POINTER_OFFSET + 80;

    /// Smallest encoded [`UberBlock`].
    const MIN_SIZE: usize = 1 << UberBlock::MIN_SHIFT;

    /** Gets the shift of an [`UberBlock`] from the `ashift` value.
     *
     * The byte size is `1 << shift`.
     *
     * ```
     * use rzhack::phys::UberBlock;
     *
     * assert_eq!(UberBlock::get_shift_from_ashift(9), 10);
     * assert_eq!(UberBlock::get_shift_from_ashift(12), 12);
     * assert_eq!(UberBlock::get_shift_from_ashift(17), 13);
     * ```
     */
    pub fn get_shift_from_ashift(ashift: u64) -> u32 {
        // Clamped to 10..=13, so the cast is lossless.
        ashift.clamp(UberBlock::MIN_SHIFT, UberBlock::MAX_SHIFT) as u32
    }

    /// Gets the byte size of an [`UberBlock`] from the `ashift` value.
    pub fn get_size_from_ashift(ashift: u64) -> usize {
        1 << UberBlock::get_shift_from_ashift(ashift)
    }

    /** Gets the [`EndianOrder`] of the `magic` field.
     *
     * Returns [`None`] if it does not match [`UberBlock::MAGIC`] in either
     * order, for example if it is zero.
     */
    pub fn magic_order(bytes: &[u8]) -> Option<EndianOrder> {
        let magic = bytes.get(UberBlock::MAGIC_OFFSET..UberBlock::MAGIC_OFFSET + 8)?;
        EndianOrder::from_u64_magic(magic.try_into().ok()?, UberBlock::MAGIC)
    }

    /// Gets the raw bytes of the `magic` field, or zero if too short.
    pub fn magic_bytes(bytes: &[u8]) -> [u8; 8] {
        let mut magic = [0; 8];
        if let Some(v) = bytes.get(UberBlock::MAGIC_OFFSET..UberBlock::MAGIC_OFFSET + 8) {
            magic.copy_from_slice(v);
        }
        magic
    }

    fn check_size(bytes: &[u8]) -> Result<(), UberBlockDecodeError> {
        if bytes.len() < UberBlock::MIN_SIZE {
            return Err(UberBlockDecodeError::InvalidSize { size: bytes.len() });
        }
        Ok(())
    }

    fn get_u64(
        bytes: &[u8],
        order: EndianOrder,
        offset: usize,
    ) -> Result<u64, UberBlockDecodeError> {
        UberBlock::check_size(bytes)?;
        let decoder = EndianDecoder::from_bytes(bytes, order);
        decoder.seek(offset)?;
        Ok(decoder.get_u64()?)
    }

    fn put_u64(
        bytes: &mut [u8],
        order: EndianOrder,
        offset: usize,
        value: u64,
    ) -> Result<(), UberBlockEncodeError> {
        if bytes.len() < UberBlock::MIN_SIZE {
            return Err(UberBlockEncodeError::InvalidSize { size: bytes.len() });
        }
        let mut encoder = EndianEncoder::to_bytes(&mut bytes[offset..], order);
        Ok(encoder.put_u64(value)?)
    }

    /** Gets the transaction group.
     *
     * # Errors
     *
     * Returns [`UberBlockDecodeError`] if `bytes` are too short.
     */
    pub fn txg(bytes: &[u8], order: EndianOrder) -> Result<u64, UberBlockDecodeError> {
        UberBlock::get_u64(bytes, order, UberBlock::TXG_OFFSET)
    }

    /** Sets the transaction group.
     *
     * # Errors
     *
     * Returns [`UberBlockEncodeError`] if `bytes` are too short.
     */
    pub fn set_txg(
        bytes: &mut [u8],
        order: EndianOrder,
        txg: u64,
    ) -> Result<(), UberBlockEncodeError> {
        UberBlock::put_u64(bytes, order, UberBlock::TXG_OFFSET, txg)
    }

    /** Gets the logical birth transaction group of the root block pointer.
     *
     * # Errors
     *
     * Returns [`UberBlockDecodeError`] if `bytes` are too short.
     */
    pub fn birth_txg(bytes: &[u8], order: EndianOrder) -> Result<u64, UberBlockDecodeError> {
        UberBlock::get_u64(bytes, order, UberBlock::BIRTH_TXG_OFFSET)
    }

    /** Initializes the header fields of an [`UberBlock`].
     *
     * Sets `magic`, `version`, `txg`, `guid_sum`, `timestamp`, and the birth
     * transaction group of the block pointer. Other bytes are not modified.
     *
     * # Errors
     *
     * Returns [`UberBlockEncodeError`] if `bytes` are too short.
     */
    pub fn init(
        bytes: &mut [u8],
        order: EndianOrder,
        header: &UberBlockHeader,
    ) -> Result<(), UberBlockEncodeError> {
        UberBlock::put_u64(bytes, order, UberBlock::MAGIC_OFFSET, UberBlock::MAGIC)?;
        UberBlock::put_u64(bytes, order, UberBlock::VERSION_OFFSET, header.version)?;
        UberBlock::put_u64(bytes, order, UberBlock::TXG_OFFSET, header.txg)?;
        UberBlock::put_u64(bytes, order, UberBlock::GUID_SUM_OFFSET, header.guid_sum)?;
        UberBlock::put_u64(bytes, order, UberBlock::TIMESTAMP_OFFSET, header.timestamp)?;
        UberBlock::put_u64(bytes, order, UberBlock::BIRTH_TXG_OFFSET, header.birth_txg)
    }

    /** Gets the [`ChecksumTail`] bytes of an [`UberBlock`].
     *
     * # Errors
     *
     * Returns [`UberBlockDecodeError`] if `bytes` are too short.
     */
    pub fn tail(bytes: &[u8]) -> Result<&[u8; ChecksumTail::SIZE], UberBlockDecodeError> {
        UberBlock::check_size(bytes)?;
        Ok(ChecksumTail::tail_bytes(bytes)?)
    }
}

/// Header fields written by [`UberBlock::init`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct UberBlockHeader {
    /// Format of on disk data.
    pub version: u64,

    /// Transaction group number.
    pub txg: u64,

    /// Sum of all leaf vdev GUIDs.
    pub guid_sum: u64,

    /// UTC timestamp in seconds since January 1st 1970 (GMT).
    pub timestamp: u64,

    /// Logical birth transaction group of the root block pointer.
    pub birth_txg: u64,
}

/// [`UberBlock`] decode error.
#[derive(Debug, thiserror::Error)]
pub enum UberBlockDecodeError {
    /// [`ChecksumTail`] error.
    #[error("UberBlock decode error | {err}")]
    ChecksumTail {
        /// Error.
        #[from]
        err: crate::phys::ChecksumTailDecodeError,
    },

    /// [`EndianDecoder`] error.
    #[error("UberBlock decode error | {err}")]
    Endian {
        /// Error.
        #[from]
        err: EndianDecodeError,
    },

    /// Bytes are smaller than the minimum [`UberBlock`] size.
    #[error("UberBlock decode error, invalid size {size}")]
    InvalidSize {
        /// Size.
        size: usize,
    },
}

/// [`UberBlock`] encode error.
#[derive(Debug, thiserror::Error)]
pub enum UberBlockEncodeError {
    /// [`EndianEncoder`] error.
    #[error("UberBlock encode error | {err}")]
    Endian {
        /// Error.
        #[from]
        err: EndianEncodeError,
    },

    /// Bytes are smaller than the minimum [`UberBlock`] size.
    #[error("UberBlock encode error, invalid size {size}")]
    InvalidSize {
        /// Size.
        size: usize,
    },
}

////////////////////////////////////////////////////////////////////////////////

#[cfg(test)]
mod tests {

    use crate::phys::{
        EndianOrder, UberBlock, UberBlockDecodeError, UberBlockHeader, ENDIAN_ORDER_SWAP,
    };

    #[test]
    fn init_and_read_fields() -> Result<(), UberBlockDecodeError> {
        for order in [EndianOrder::Big, EndianOrder::Little] {
            let mut bytes = vec![0; 4096];
            let header = UberBlockHeader {
                version: 5000,
                txg: 0,
                guid_sum: 0x1234,
                timestamp: 1700000000,
                birth_txg: 42,
            };
            UberBlock::init(&mut bytes, order, &header).unwrap();

            assert_eq!(UberBlock::magic_order(&bytes), Some(order));
            assert_eq!(UberBlock::txg(&bytes, order)?, 0);
            assert_eq!(UberBlock::birth_txg(&bytes, order)?, 42);

            UberBlock::set_txg(&mut bytes, order, 42).unwrap();
            assert_eq!(UberBlock::txg(&bytes, order)?, 42);
            assert_eq!(&bytes[120..128], &bytes[16..24]);
        }

        Ok(())
    }

    #[test]
    fn magic_of_empty_and_swapped() {
        let mut bytes = vec![0; 1024];
        assert_eq!(UberBlock::magic_order(&bytes), None);
        assert_eq!(UberBlock::magic_bytes(&bytes), [0; 8]);

        bytes[0..8].copy_from_slice(&UberBlock::MAGIC.swap_bytes().to_ne_bytes());
        assert_eq!(UberBlock::magic_order(&bytes), Some(ENDIAN_ORDER_SWAP));
    }

    #[test]
    fn too_short() {
        let mut bytes = vec![0; 512];
        assert!(matches!(
            UberBlock::txg(&bytes, EndianOrder::Little),
            Err(UberBlockDecodeError::InvalidSize { size: 512 })
        ));
        assert!(UberBlock::set_txg(&mut bytes, EndianOrder::Little, 1).is_err());
        assert!(UberBlock::tail(&bytes).is_err());
        assert_eq!(UberBlock::get_size_from_ashift(0), 1024);
    }
}
