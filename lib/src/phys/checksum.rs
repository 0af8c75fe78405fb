// SPDX-License-Identifier: GPL-2.0 OR MIT

/*! Checksum value and embedded checksum tail.
 *
 * ### Byte layout.
 *
 * - Bytes: 40
 *
 * ```text
 * +----------+------+
 * | Field    | Size |
 * +----------+------+
 * | magic    |    8 |
 * | checksum |   32 |
 * +----------+------+
 * ```
 *
 * All fields are encoded in the byte order of the block that the tail is
 * embedded in. A magic of zero means the tail was never written.
 */
use crate::phys::{
    EndianDecodeError, EndianDecoder, EndianEncodeError, EndianEncoder, EndianOrder,
};

////////////////////////////////////////////////////////////////////////////////

/// Checksum value of four [`u64`] words.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ChecksumValue {
    /// Words.
    pub words: [u64; 4],
}

impl ChecksumValue {
    /// Byte size of an encoded [`ChecksumValue`] (32).
    pub const SIZE: usize = 32;

    /** Decodes a [`ChecksumValue`].
     *
     * # Errors
     *
     * Returns [`ChecksumValueDecodeError`] in case of decoding error.
     */
    pub fn from_decoder(
        decoder: &EndianDecoder<'_>,
    ) -> Result<ChecksumValue, ChecksumValueDecodeError> {
        Ok(ChecksumValue {
            words: [
                decoder.get_u64()?,
                decoder.get_u64()?,
                decoder.get_u64()?,
                decoder.get_u64()?,
            ],
        })
    }

    /** Encodes a [`ChecksumValue`].
     *
     * # Errors
     *
     * Returns [`ChecksumValueEncodeError`] in case of encoding error.
     */
    pub fn to_encoder(
        &self,
        encoder: &mut EndianEncoder<'_>,
    ) -> Result<(), ChecksumValueEncodeError> {
        for word in self.words {
            encoder.put_u64(word)?;
        }

        Ok(())
    }
}

/// [`ChecksumValue`] decode error.
#[derive(Debug, thiserror::Error)]
pub enum ChecksumValueDecodeError {
    /// [`EndianDecoder`] error.
    #[error("ChecksumValue decode error | {err}")]
    Endian {
        /// Error.
        #[from]
        err: EndianDecodeError,
    },
}

/// [`ChecksumValue`] encode error.
#[derive(Debug, thiserror::Error)]
pub enum ChecksumValueEncodeError {
    /// [`EndianEncoder`] error.
    #[error("ChecksumValue encode error | {err}")]
    Endian {
        /// Error.
        #[from]
        err: EndianEncodeError,
    },
}

////////////////////////////////////////////////////////////////////////////////

/// Checksum tail embedded at the end of a label block.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ChecksumTail {
    /// Endian order of the magic and value.
    pub order: EndianOrder,

    /// Checksum value.
    pub value: ChecksumValue,
}

impl ChecksumTail {
    /// Byte size of an encoded [`ChecksumTail`] (40).
    pub const SIZE: usize = 8 + ChecksumValue::SIZE;

    /// Magic value for an encoded [`ChecksumTail`].
    pub const MAGIC: u64 = 0x0210da7ab10c7a11;

    /** Gets the [`EndianOrder`] of the magic in an encoded [`ChecksumTail`].
     *
     * Returns [`None`] if the magic is zero, meaning the tail was never
     * written.
     *
     * # Errors
     *
     * Returns [`ChecksumTailDecodeError`] if the magic is not zero, and does
     * not match [`ChecksumTail::MAGIC`] in either order.
     */
    pub fn magic_order(
        bytes: &[u8; ChecksumTail::SIZE],
    ) -> Result<Option<EndianOrder>, ChecksumTailDecodeError> {
        let magic = ChecksumTail::magic_bytes(bytes);

        if magic == [0; 8] {
            return Ok(None);
        }

        match EndianOrder::from_u64_magic(magic, ChecksumTail::MAGIC) {
            Some(order) => Ok(Some(order)),
            None => Err(ChecksumTailDecodeError::InvalidMagic { magic }),
        }
    }

    /** Gets the [`ChecksumTail`] bytes at the end of a block.
     *
     * # Errors
     *
     * Returns [`ChecksumTailDecodeError`] if the block is shorter than a tail.
     */
    pub fn tail_bytes(block: &[u8]) -> Result<&[u8; ChecksumTail::SIZE], ChecksumTailDecodeError> {
        let length = block.len();
        match length.checked_sub(ChecksumTail::SIZE) {
            Some(start) => block[start..]
                .try_into()
                .map_err(|_| ChecksumTailDecodeError::TooShort { length }),
            None => Err(ChecksumTailDecodeError::TooShort { length }),
        }
    }

    /** Gets the mutable [`ChecksumTail`] bytes at the end of a block.
     *
     * # Errors
     *
     * Returns [`ChecksumTailDecodeError`] if the block is shorter than a tail.
     */
    pub fn tail_bytes_mut(
        block: &mut [u8],
    ) -> Result<&mut [u8; ChecksumTail::SIZE], ChecksumTailDecodeError> {
        let length = block.len();
        match length.checked_sub(ChecksumTail::SIZE) {
            Some(start) => (&mut block[start..])
                .try_into()
                .map_err(|_| ChecksumTailDecodeError::TooShort { length }),
            None => Err(ChecksumTailDecodeError::TooShort { length }),
        }
    }

    /// Gets the raw magic bytes of an encoded [`ChecksumTail`].
    pub fn magic_bytes(bytes: &[u8; ChecksumTail::SIZE]) -> [u8; 8] {
        let mut magic = [0; 8];
        magic.copy_from_slice(&bytes[0..8]);
        magic
    }

    /** Decodes the stored [`ChecksumValue`] in the given [`EndianOrder`],
     * without looking at the magic.
     *
     * # Errors
     *
     * Returns [`ChecksumTailDecodeError`] in case of decoding error.
     */
    pub fn value_from_bytes(
        bytes: &[u8; ChecksumTail::SIZE],
        order: EndianOrder,
    ) -> Result<ChecksumValue, ChecksumTailDecodeError> {
        let decoder = EndianDecoder::from_bytes(&bytes[8..], order);
        Ok(ChecksumValue::from_decoder(&decoder)?)
    }

    /** Decodes a [`ChecksumTail`].
     *
     * # Errors
     *
     * Returns [`ChecksumTailDecodeError`] in case of decoding error, or if the
     * magic is not [`ChecksumTail::MAGIC`].
     */
    pub fn from_bytes(
        bytes: &[u8; ChecksumTail::SIZE],
    ) -> Result<ChecksumTail, ChecksumTailDecodeError> {
        let decoder = EndianDecoder::from_u64_magic(bytes, ChecksumTail::MAGIC)?;

        Ok(ChecksumTail {
            order: decoder.order(),
            value: ChecksumValue::from_decoder(&decoder)?,
        })
    }

    /** Encodes a [`ChecksumTail`].
     *
     * # Errors
     *
     * Returns [`ChecksumTailEncodeError`] in case of encoding error.
     */
    pub fn to_bytes(
        &self,
        bytes: &mut [u8; ChecksumTail::SIZE],
    ) -> Result<(), ChecksumTailEncodeError> {
        let mut encoder = EndianEncoder::to_bytes(bytes, self.order);
        encoder.put_u64(ChecksumTail::MAGIC)?;
        self.value.to_encoder(&mut encoder)?;

        Ok(())
    }
}

/// [`ChecksumTail`] decode error.
#[derive(Debug, thiserror::Error)]
pub enum ChecksumTailDecodeError {
    /// [`ChecksumValue`] decode error.
    #[error("ChecksumTail decode error | {err}")]
    ChecksumValue {
        /// Error.
        #[from]
        err: ChecksumValueDecodeError,
    },

    /// [`EndianDecoder`] error.
    #[error("ChecksumTail decode error | {err}")]
    Endian {
        /// Error.
        #[from]
        err: EndianDecodeError,
    },

    /// Magic is neither zero nor [`ChecksumTail::MAGIC`].
    #[error("ChecksumTail decode error, invalid magic {magic:02x?}")]
    InvalidMagic {
        /// Raw magic bytes.
        magic: [u8; 8],
    },

    /// Block is too short to hold a tail.
    #[error("ChecksumTail decode error, block length {length} is too short")]
    TooShort {
        /// Block length.
        length: usize,
    },
}

/// [`ChecksumTail`] encode error.
#[derive(Debug, thiserror::Error)]
pub enum ChecksumTailEncodeError {
    /// [`ChecksumValue`] encode error.
    #[error("ChecksumTail encode error | {err}")]
    ChecksumValue {
        /// Error.
        #[from]
        err: ChecksumValueEncodeError,
    },

    /// [`EndianEncoder`] error.
    #[error("ChecksumTail encode error | {err}")]
    Endian {
        /// Error.
        #[from]
        err: EndianEncodeError,
    },
}

////////////////////////////////////////////////////////////////////////////////
