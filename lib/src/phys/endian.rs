// SPDX-License-Identifier: GPL-2.0 OR MIT

/*! An Endian decoder and encoder.
 *
 * Decodes and encodes numbers in big or little endian.
 *
 * - [`EndianDecoder`] uses an internal [`Cell`] field for the `offset` field
 *   in order to implement a split borrow.
 */
use core::cell::Cell;
use core::fmt;

////////////////////////////////////////////////////////////////////////////////

/// Byte order of encoded values.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EndianOrder {
    /// Big endian.
    Big,

    /// Little endian.
    Little,
}

/// [`EndianOrder`] of the running machine.
#[cfg(target_endian = "little")]
pub const ENDIAN_ORDER_NATIVE: EndianOrder = EndianOrder::Little;

/// Opposite of [`ENDIAN_ORDER_NATIVE`].
#[cfg(target_endian = "little")]
pub const ENDIAN_ORDER_SWAP: EndianOrder = EndianOrder::Big;

/// [`EndianOrder`] of the running machine.
#[cfg(target_endian = "big")]
pub const ENDIAN_ORDER_NATIVE: EndianOrder = EndianOrder::Big;

/// Opposite of [`ENDIAN_ORDER_NATIVE`].
#[cfg(target_endian = "big")]
pub const ENDIAN_ORDER_SWAP: EndianOrder = EndianOrder::Little;

impl EndianOrder {
    /** Detects the [`EndianOrder`] of an encoded `magic` value.
     *
     * Returns [`None`] if the bytes match `magic` in neither order.
     *
     * ```
     * use rzhack::phys::EndianOrder;
     *
     * let magic: u64 = 0x0000000000bab10c;
     *
     * assert_eq!(
     *     EndianOrder::from_u64_magic(magic.to_be_bytes(), magic),
     *     Some(EndianOrder::Big)
     * );
     * assert_eq!(
     *     EndianOrder::from_u64_magic(magic.to_le_bytes(), magic),
     *     Some(EndianOrder::Little)
     * );
     * assert_eq!(EndianOrder::from_u64_magic([0; 8], magic), None);
     * ```
     */
    pub fn from_u64_magic(bytes: [u8; 8], magic: u64) -> Option<EndianOrder> {
        if u64::from_be_bytes(bytes) == magic {
            Some(EndianOrder::Big)
        } else if u64::from_le_bytes(bytes) == magic {
            Some(EndianOrder::Little)
        } else {
            None
        }
    }

    /// Returns true if this is not the [`EndianOrder`] of the running machine.
    pub fn is_swapped(&self) -> bool {
        *self != ENDIAN_ORDER_NATIVE
    }
}

impl fmt::Display for EndianOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EndianOrder::Big => write!(f, "Big"),
            EndianOrder::Little => write!(f, "Little"),
        }
    }
}

////////////////////////////////////////////////////////////////////////////////

/** An endian decoder.
 *
 * Uses an internal [`Cell`] field for the `offset` field in order to implement
 * a split borrow.
 */
pub struct EndianDecoder<'a> {
    data: &'a [u8],
    offset: Cell<usize>,
    order: EndianOrder,
}

impl fmt::Debug for EndianDecoder<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Change debug printing to print length instead of raw data.
        f.debug_struct("EndianDecoder")
            .field("length", &self.data.len())
            .field("offset", &self.offset.get())
            .field("order", &self.order)
            .finish()
    }
}

impl EndianDecoder<'_> {
    /** Initializes an [`EndianDecoder`] for the supplied [`EndianOrder`].
     *
     * ```
     * use rzhack::phys::{EndianDecoder, EndianOrder};
     *
     * let data = [0x12, 0x34, 0x56, 0x78, 0x9a, 0xbc, 0xde, 0xf0];
     *
     * let decoder = EndianDecoder::from_bytes(&data, EndianOrder::Big);
     * assert_eq!(decoder.get_u64().unwrap(), 0x123456789abcdef0);
     *
     * // Error end of input.
     * assert!(decoder.get_u64().is_err());
     * ```
     */
    pub fn from_bytes(data: &[u8], order: EndianOrder) -> EndianDecoder<'_> {
        EndianDecoder {
            data,
            offset: Cell::new(0),
            order,
        }
    }

    /** Initializes an [`EndianDecoder`] whose order is detected from the
     * first eight bytes, which must hold `magic`.
     *
     * The magic is consumed.
     *
     * # Errors
     *
     * Returns [`EndianDecodeError`] if the input is too short, or the magic
     * does not match in either order.
     */
    pub fn from_u64_magic(data: &[u8], magic: u64) -> Result<EndianDecoder<'_>, EndianDecodeError> {
        let bytes: [u8; 8] = match data.get(0..8) {
            Some(v) => v.try_into().map_err(|_| EndianDecodeError::EndOfInput {
                offset: 0,
                capacity: data.len(),
                count: 8,
            })?,
            None => {
                return Err(EndianDecodeError::EndOfInput {
                    offset: 0,
                    capacity: data.len(),
                    count: 8,
                })
            }
        };

        let order = match EndianOrder::from_u64_magic(bytes, magic) {
            Some(v) => v,
            None => {
                return Err(EndianDecodeError::InvalidMagic {
                    expected: magic,
                    actual: bytes,
                })
            }
        };

        let decoder = EndianDecoder::from_bytes(data, order);
        decoder.skip(8)?;

        Ok(decoder)
    }

    /** Checks if there are enough bytes left to decode.
     *
     * # Errors
     *
     * Returns [`EndianDecodeError`] if there are not enough bytes available.
     */
    fn check_need(&self, count: usize) -> Result<(), EndianDecodeError> {
        if self.len() >= count {
            Ok(())
        } else {
            Err(EndianDecodeError::EndOfInput {
                offset: self.offset.get(),
                capacity: self.capacity(),
                count,
            })
        }
    }

    /// Returns the source data capacity.
    pub fn capacity(&self) -> usize {
        self.data.len()
    }

    /// Returns the number of bytes still available for decoding.
    pub fn len(&self) -> usize {
        self.data.len().saturating_sub(self.offset.get())
    }

    /// Returns true if there are no more bytes to decode.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Gets the current offset in bytes.
    pub fn offset(&self) -> usize {
        self.offset.get()
    }

    /// Returns the [`EndianOrder`] of the decoder.
    pub fn order(&self) -> EndianOrder {
        self.order
    }

    /** Seeks to the byte offset.
     *
     * # Errors
     *
     * Returns [`EndianDecodeError`] if the offset is past the end.
     */
    pub fn seek(&self, offset: usize) -> Result<(), EndianDecodeError> {
        if offset > self.data.len() {
            return Err(EndianDecodeError::SeekPastEnd {
                offset,
                capacity: self.capacity(),
            });
        }

        self.offset.set(offset);
        Ok(())
    }

    /** Skips bytes.
     *
     * # Errors
     *
     * Returns [`EndianDecodeError`] if there are not enough bytes available.
     */
    pub fn skip(&self, count: usize) -> Result<(), EndianDecodeError> {
        self.check_need(count)?;
        self.offset.set(self.offset.get() + count);
        Ok(())
    }

    /** Decodes a [`u64`].
     *
     * # Errors
     *
     * Returns [`EndianDecodeError`] if there are not enough bytes available.
     */
    pub fn get_u64(&self) -> Result<u64, EndianDecodeError> {
        self.check_need(8)?;

        let start = self.offset.get();
        let end = start + 8;

        let mut bytes = [0; 8];
        bytes.copy_from_slice(&self.data[start..end]);
        self.offset.set(end);

        Ok(match self.order {
            EndianOrder::Big => u64::from_be_bytes(bytes),
            EndianOrder::Little => u64::from_le_bytes(bytes),
        })
    }
}

/// [`EndianDecoder`] error.
#[derive(Debug, thiserror::Error)]
pub enum EndianDecodeError {
    /// End of input data.
    #[error("Endian end of input at offset {offset} capacity {capacity} count {count}")]
    EndOfInput {
        /// Byte offset of data.
        offset: usize,
        /// Total capacity of data.
        capacity: usize,
        /// Number of bytes needed.
        count: usize,
    },

    /// Magic does not match in either order.
    #[error("Endian invalid magic expected {expected:#016x} actual {actual:02x?}")]
    InvalidMagic {
        /// Expected magic.
        expected: u64,
        /// Actual bytes.
        actual: [u8; 8],
    },

    /// Seek past end.
    #[error("Endian seek past end to offset {offset} capacity {capacity}")]
    SeekPastEnd {
        /// Requested offset.
        offset: usize,
        /// Total capacity of data.
        capacity: usize,
    },
}

////////////////////////////////////////////////////////////////////////////////

/// An endian encoder.
pub struct EndianEncoder<'a> {
    data: &'a mut [u8],
    offset: usize,
    order: EndianOrder,
}

impl fmt::Debug for EndianEncoder<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Change debug printing to print length instead of raw data.
        f.debug_struct("EndianEncoder")
            .field("length", &self.data.len())
            .field("offset", &self.offset)
            .field("order", &self.order)
            .finish()
    }
}

impl EndianEncoder<'_> {
    /** Initializes an [`EndianEncoder`] for the supplied [`EndianOrder`].
     *
     * ```
     * use rzhack::phys::{EndianEncoder, EndianOrder};
     *
     * // Destination.
     * let mut data: [u8; 8] = [0; 8];
     *
     * // Create encoder.
     * let mut encoder = EndianEncoder::to_bytes(&mut data, EndianOrder::Little);
     *
     * // Put values.
     * assert!(encoder.put_u64(0x123456789abcdef0).is_ok());
     *
     * // Error end of output.
     * assert!(encoder.put_u64(1).is_err());
     *
     * // Expected result.
     * let exp: [u8; 8] = [0xf0, 0xde, 0xbc, 0x9a, 0x78, 0x56, 0x34, 0x12];
     * assert_eq!(data, exp);
     * ```
     */
    pub fn to_bytes(data: &mut [u8], order: EndianOrder) -> EndianEncoder<'_> {
        EndianEncoder {
            data,
            offset: 0,
            order,
        }
    }

    /** Checks if there is enough space in data slice to encode.
     *
     * # Errors
     *
     * Returns [`EndianEncodeError`] if there are not enough bytes available.
     */
    fn check_need(&self, count: usize) -> Result<(), EndianEncodeError> {
        if self.available() >= count {
            Ok(())
        } else {
            Err(EndianEncodeError::EndOfOutput {
                offset: self.offset,
                capacity: self.data.len(),
                count,
            })
        }
    }

    /// Returns the number of bytes still available for encoding in data slice.
    pub fn available(&self) -> usize {
        // Gracefully handle offset errors, and just return 0.
        self.data.len().saturating_sub(self.offset)
    }

    /// Returns the [`EndianOrder`] of the encoder.
    pub fn order(&self) -> EndianOrder {
        self.order
    }

    /** Encodes a [`u64`].
     *
     * # Errors
     *
     * Returns [`EndianEncodeError`] if there are not enough bytes available.
     */
    pub fn put_u64(&mut self, value: u64) -> Result<(), EndianEncodeError> {
        self.check_need(8)?;

        let start = self.offset;
        let end = start + 8;

        self.offset = end;

        let bytes = match self.order {
            EndianOrder::Big => value.to_be_bytes(),
            EndianOrder::Little => value.to_le_bytes(),
        };
        self.data[start..end].copy_from_slice(&bytes);

        Ok(())
    }
}

/// [`EndianEncoder`] error.
#[derive(Debug, thiserror::Error)]
pub enum EndianEncodeError {
    /// End of output data.
    #[error("Endian end of output at offset {offset} capacity {capacity} count {count}")]
    EndOfOutput {
        /// Byte offset of data.
        offset: usize,
        /// Total capacity of data.
        capacity: usize,
        /// Number of bytes needed.
        count: usize,
    },
}

////////////////////////////////////////////////////////////////////////////////

#[cfg(test)]
mod tests {

    use crate::phys::{
        EndianDecodeError, EndianDecoder, EndianEncoder, EndianOrder, ENDIAN_ORDER_NATIVE,
        ENDIAN_ORDER_SWAP,
    };

    #[test]
    fn native_and_swap_differ() {
        assert_ne!(ENDIAN_ORDER_NATIVE, ENDIAN_ORDER_SWAP);
        assert!(!ENDIAN_ORDER_NATIVE.is_swapped());
        assert!(ENDIAN_ORDER_SWAP.is_swapped());
    }

    #[test]
    fn decoder_from_u64_magic() -> Result<(), EndianDecodeError> {
        let magic = 0x0000000000bab10c;

        for order in [EndianOrder::Big, EndianOrder::Little] {
            let mut data = [0; 16];
            let mut encoder = EndianEncoder::to_bytes(&mut data, order);
            encoder.put_u64(magic).unwrap();
            encoder.put_u64(42).unwrap();

            let decoder = EndianDecoder::from_u64_magic(&data, magic)?;
            assert_eq!(decoder.order(), order);
            assert_eq!(decoder.offset(), 8);
            assert_eq!(decoder.get_u64()?, 42);
            assert!(decoder.is_empty());
        }

        Ok(())
    }

    #[test]
    fn decoder_invalid_magic() {
        let data = [0xff; 8];
        assert!(matches!(
            EndianDecoder::from_u64_magic(&data, 0x0000000000bab10c),
            Err(EndianDecodeError::InvalidMagic { .. })
        ));

        let data = [0; 4];
        assert!(matches!(
            EndianDecoder::from_u64_magic(&data, 0x0000000000bab10c),
            Err(EndianDecodeError::EndOfInput { .. })
        ));
    }

    #[test]
    fn decoder_seek_and_skip() {
        let data = [1, 0, 0, 0, 0, 0, 0, 0, 2, 0, 0, 0, 0, 0, 0, 0];
        let decoder = EndianDecoder::from_bytes(&data, EndianOrder::Little);

        assert!(decoder.seek(8).is_ok());
        assert_eq!(decoder.get_u64().unwrap(), 2);
        assert!(decoder.seek(0).is_ok());
        assert_eq!(decoder.get_u64().unwrap(), 1);
        assert!(decoder.skip(9).is_err());
        assert!(decoder.seek(17).is_err());
    }
}
