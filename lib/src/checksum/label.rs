// SPDX-License-Identifier: GPL-2.0 OR MIT

/*! Label checksum.
 *
 * - The `label` checksum is embedded at the tail end of a block.
 * - It uses `sha256`, where the checksum endian encoding is specified using the magic.
 * - It is used to checksum blocks in the label (nv list, uber blocks).
 * - The checksum is calculated over the entire block (including the tail).
 * - When calculating the checksum, `checksum 0` is set to the byte `offset` of the
 *   block from the start of the block device, and `checksum 1`, `checksum 2`,
 *   `checksum 3` are all set to `0`.
 *
 * ### Byte layout.
 *
 * - Bytes: N
 *
 * ```text
 * +----------+--------+
 * | Field    | Size   |
 * +----------+--------+
 * | payload  | N - 40 |
 * +----------+--------+
 * | checksum |     40 |
 * +----------+--------+
 * ```
 */
use crate::checksum::{Checksum, ChecksumError, Sha256};
use crate::phys::{
    ChecksumTail, ChecksumTailDecodeError, ChecksumTailEncodeError, ChecksumValue, EndianOrder,
};

////////////////////////////////////////////////////////////////////////////////

/// Offset encoded into [`ChecksumTail`] bytes.
fn offset_tail(
    offset: u64,
    order: EndianOrder,
) -> Result<[u8; ChecksumTail::SIZE], ChecksumTailEncodeError> {
    let offset_tail = ChecksumTail {
        order,
        value: ChecksumValue {
            words: [offset, 0, 0, 0],
        },
    };

    let mut offset_tail_bytes = [0; ChecksumTail::SIZE];
    offset_tail.to_bytes(&mut offset_tail_bytes)?;

    Ok(offset_tail_bytes)
}

/// Splits `data` into payload and tail, or returns [`None`] if too short.
fn split_tail(data: &[u8]) -> Option<(&[u8], &[u8; ChecksumTail::SIZE])> {
    let payload_length = data.len().checked_sub(ChecksumTail::SIZE)?;
    let (payload, tail) = data.split_at(payload_length);
    Some((payload, tail.try_into().ok()?))
}

/** Compute the checksum of the `data` block without modifying it.
 *
 * - `data` to checksum, including its tail
 * - `offset` in bytes of `data` from start of device, included in checksum
 * - `sha256` instance to use for checksum
 * - `order` to use for the offset and magic
 *
 * # Errors
 *
 * Returns [`LabelChecksumError`] if `data` is shorter than a tail.
 */
pub fn label_compute(
    data: &[u8],
    offset: u64,
    sha256: &mut Sha256,
    order: EndianOrder,
) -> Result<ChecksumValue, LabelChecksumError> {
    let (payload, _) = match split_tail(data) {
        Some(v) => v,
        None => return Err(LabelChecksumError::InvalidLength { length: data.len() }),
    };

    let offset_tail_bytes = offset_tail(offset, order)?;

    sha256.reset(order)?;
    sha256.update(payload)?;
    sha256.update(&offset_tail_bytes)?;

    Ok(ChecksumValue {
        words: sha256.finalize()?,
    })
}

/** Compute the checksum of the `data` block and encode it at the end of `data`.
 *
 * The magic and the checksum value are both encoded in `order`. Returns the
 * computed checksum.
 *
 * # Errors
 *
 * Returns [`LabelChecksumError`] in case of encoding error.
 */
pub fn label_checksum(
    data: &mut [u8],
    offset: u64,
    sha256: &mut Sha256,
    order: EndianOrder,
) -> Result<ChecksumValue, LabelChecksumError> {
    let value = label_compute(data, offset, sha256, order)?;

    let length = data.len();
    let tail_bytes: &mut [u8; ChecksumTail::SIZE] = (&mut data[length - ChecksumTail::SIZE..])
        .try_into()
        .map_err(|_| LabelChecksumError::InvalidLength { length })?;

    ChecksumTail { order, value }.to_bytes(tail_bytes)?;

    Ok(value)
}

/** Verify the checksum of the `data` block.
 *
 * - `data` to checksum
 * - `offset` in bytes of `data` from start of device, included in checksum
 * - `sha256` instance to use for checksum
 *
 * # Errors
 *
 * Returns [`LabelVerifyError`] in case of decoding error or checksum mismatch.
 */
pub fn label_verify(data: &[u8], offset: u64, sha256: &mut Sha256) -> Result<(), LabelVerifyError> {
    let tail = match split_tail(data) {
        Some((_, tail)) => ChecksumTail::from_bytes(tail)?,
        None => return Err(LabelVerifyError::InvalidLength { length: data.len() }),
    };

    let computed = label_compute(data, offset, sha256, tail.order)?;

    if tail.value == computed {
        Ok(())
    } else {
        Err(LabelVerifyError::Mismatch {
            computed: computed.words,
            stored: tail.value.words,
        })
    }
}

////////////////////////////////////////////////////////////////////////////////

/// Label checksum error.
#[derive(Debug, thiserror::Error)]
pub enum LabelChecksumError {
    /// [`Checksum`] error.
    #[error("Label checksum error | {err}")]
    Checksum {
        /// Error.
        #[from]
        err: ChecksumError,
    },

    /// [`ChecksumTail`] error.
    #[error("Label checksum error | {err}")]
    ChecksumTail {
        /// Error.
        #[from]
        err: ChecksumTailEncodeError,
    },

    /// Invalid length.
    #[error("Label checksum error, invalid length {length}")]
    InvalidLength {
        /// Length.
        length: usize,
    },
}

/// Label verify error.
#[derive(Debug, thiserror::Error)]
pub enum LabelVerifyError {
    /// Checksum computation error.
    #[error("Label verify error | {err}")]
    Compute {
        /// Error.
        #[from]
        err: LabelChecksumError,
    },

    /// [`ChecksumTail`] error.
    #[error("Label verify error | {err}")]
    ChecksumTail {
        /// Error.
        #[from]
        err: ChecksumTailDecodeError,
    },

    /// Invalid length.
    #[error("Label verify error, invalid length {length}")]
    InvalidLength {
        /// Length.
        length: usize,
    },

    /// Checksum mismatch.
    #[error("Label verify checksum mismatch, computed {computed:#016x?} stored {stored:#016x?}")]
    Mismatch {
        /// Computed checksum.
        computed: [u64; 4],
        /// Stored checksum.
        stored: [u64; 4],
    },
}

////////////////////////////////////////////////////////////////////////////////
