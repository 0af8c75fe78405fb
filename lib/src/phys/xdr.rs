// SPDX-License-Identifier: GPL-2.0 OR MIT

/*! An XDR decoder and encoder.
 *
 * [XDR](https://www.rfc-editor.org/rfc/rfc4506) is a standard of encoding
 * numbers and strings to bytes.
 *
 * - Boolean values are encoded as the number 0 [`false`], 1 [`true`].
 * - Numbers smaller than 32 bits are encoded as [`i32`] or [`u32`], since that
 *   is the minimum XDR encoding size.
 * - Numbers are encoded in big endian format.
 * - Strings are encoded as a length followed by the bytes, padded to a
 *   multiple of four. The length does not include the padding.
 * - Fixed length opaque data is encoded as the bytes padded to a multiple of
 *   four, without a length.
 * - [`XdrDecoder`] uses an internal [`Cell`] field for the `offset` field
 *   in order to implement a split borrow.
 */
use core::cell::Cell;
use core::fmt;
use core::num;

////////////////////////////////////////////////////////////////////////////////

/// Returns `length` rounded up to a multiple of four.
pub(crate) fn xdr_align(length: usize) -> usize {
    (length + 3) & !3
}

////////////////////////////////////////////////////////////////////////////////

/** An XDR decoder.
 *
 * Uses an internal [`Cell`] field for the `offset` field in order to implement
 * a split borrow.
 */
pub struct XdrDecoder<'a> {
    data: &'a [u8],
    offset: Cell<usize>,
}

impl fmt::Debug for XdrDecoder<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Change debug printing to print length instead of raw data.
        f.debug_struct("XdrDecoder")
            .field("length", &self.data.len())
            .field("offset", &self.offset.get())
            .finish()
    }
}

impl<'a> XdrDecoder<'a> {
    /** Initializes an [`XdrDecoder`] from a slice of bytes.
     *
     * ```
     * use rzhack::phys::XdrDecoder;
     *
     * let data = [0x00, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00, 0x00];
     *
     * let decoder = XdrDecoder::from_bytes(&data);
     * assert_eq!(decoder.len(), 8);
     *
     * assert_eq!(decoder.get_bool().unwrap(), true);
     * assert_eq!(decoder.get_bool().unwrap(), false);
     * assert!(decoder.is_empty());
     * ```
     */
    pub fn from_bytes(data: &'a [u8]) -> XdrDecoder<'a> {
        XdrDecoder {
            data,
            offset: Cell::new(0),
        }
    }

    /** Decodes `length` bytes of fixed length opaque data, and skips the
     * padding.
     *
     * # Errors
     *
     * Returns [`XdrDecodeError`] if there are not enough bytes available.
     *
     * ```
     * use rzhack::phys::XdrDecoder;
     *
     * let data = [0x61, 0x62, 0x63, 0x00, 0x64];
     * let decoder = XdrDecoder::from_bytes(&data);
     *
     * assert_eq!(decoder.get_opaque(3).unwrap(), b"abc");
     * assert_eq!(decoder.offset(), 4);
     *
     * // Need 3 more bytes for padding.
     * assert!(decoder.get_opaque(1).is_err());
     * ```
     */
    pub fn get_opaque(&self, length: usize) -> Result<&'a [u8], XdrDecodeError> {
        let padded_length = match length.checked_add(3) {
            Some(v) => v & !3,
            None => {
                return Err(XdrDecodeError::EndOfInput {
                    offset: self.offset.get(),
                    capacity: self.capacity(),
                    count: length,
                })
            }
        };

        self.check_need(padded_length)?;

        let start = self.offset.get();
        let value = &self.data[start..start + length];
        self.offset.set(start + padded_length);

        Ok(value)
    }

    /** Decodes a [`str`].
     *
     * # Errors
     *
     * Returns [`XdrDecodeError`] if there are not enough bytes available, or
     * the bytes are not a valid UTF8 string.
     *
     * ```
     * use rzhack::phys::XdrDecoder;
     *
     * let data = [
     *     0x00, 0x00, 0x00, 0x03, 0x61, 0x62, 0x63, 0x00,
     *     0x00, 0x00, 0x00, 0x02, 0x64, 0xff, 0x00, 0x00,
     * ];
     * let decoder = XdrDecoder::from_bytes(&data);
     *
     * assert_eq!(decoder.get_str().unwrap(), "abc");
     *
     * // Malformed UTF8.
     * assert!(decoder.get_str().is_err());
     * assert_eq!(decoder.offset(), 8);
     * ```
     */
    pub fn get_str(&self) -> Result<&'a str, XdrDecodeError> {
        let offset = self.offset.get();

        let length = self.get_usize()?;
        let value = match self.get_opaque(length) {
            Ok(v) => v,
            Err(err) => {
                self.offset.set(offset);
                return Err(err);
            }
        };

        match core::str::from_utf8(value) {
            Ok(v) => Ok(v),
            Err(err) => {
                self.offset.set(offset);
                Err(XdrDecodeError::InvalidStr {
                    offset,
                    length: value.len(),
                    err,
                })
            }
        }
    }
}

impl XdrDecoder<'_> {
    /// Checks if there are enough bytes to decode from the data slice.
    fn check_need(&self, count: usize) -> Result<(), XdrDecodeError> {
        if self.len() >= count {
            Ok(())
        } else {
            Err(XdrDecodeError::EndOfInput {
                offset: self.offset.get(),
                capacity: self.capacity(),
                count,
            })
        }
    }

    /// Returns the source data length.
    pub fn capacity(&self) -> usize {
        self.data.len()
    }

    /// Returns true if there are no more bytes to decode.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns length of bytes remaining to be processed.
    pub fn len(&self) -> usize {
        // Gracefully handle offset errors, and just return 0.
        self.data.len().saturating_sub(self.offset.get())
    }

    /// Gets the current offset in bytes.
    pub fn offset(&self) -> usize {
        self.offset.get()
    }

    /** Skips the next `count` bytes.
     *
     * # Errors
     *
     * Returns [`XdrDecodeError`] if `count` is not a multiple of four, or
     * there are not enough bytes available.
     */
    pub fn skip(&self, count: usize) -> Result<(), XdrDecodeError> {
        if (count % 4) != 0 {
            return Err(XdrDecodeError::SkipAlignment { count });
        }

        self.check_need(count)?;
        self.offset.set(self.offset.get() + count);
        Ok(())
    }

    /// Returns `N` bytes.
    fn get_n_bytes<const N: usize>(&self) -> Result<[u8; N], XdrDecodeError> {
        self.check_need(N)?;

        let start = self.offset.get();
        let mut bytes = [0; N];
        bytes.copy_from_slice(&self.data[start..start + N]);
        self.offset.set(start + N);

        Ok(bytes)
    }

    /** Decodes a [`bool`].
     *
     * # Errors
     *
     * Returns [`XdrDecodeError`] if there are not enough bytes available, or
     * the value is not 0 or 1.
     */
    pub fn get_bool(&self) -> Result<bool, XdrDecodeError> {
        let offset = self.offset.get();
        let value = self.get_u32()?;
        match value {
            0 => Ok(false),
            1 => Ok(true),
            _ => {
                self.offset.set(offset);
                Err(XdrDecodeError::InvalidBoolean { offset, value })
            }
        }
    }

    /** Decodes an [`f64`].
     *
     * # Errors
     *
     * Returns [`XdrDecodeError`] if there are not enough bytes available.
     */
    pub fn get_f64(&self) -> Result<f64, XdrDecodeError> {
        Ok(f64::from_be_bytes(self.get_n_bytes()?))
    }

    /** Decodes an [`i32`] and casts it to an [`i8`].
     *
     * # Errors
     *
     * Returns [`XdrDecodeError`] if there are not enough bytes available, or
     * the value does not fit.
     */
    pub fn get_i8(&self) -> Result<i8, XdrDecodeError> {
        let offset = self.offset.get();
        let value = self.get_i32()?;

        i8::try_from(value).map_err(|err| {
            self.offset.set(offset);
            XdrDecodeError::I32Conversion { offset, value, err }
        })
    }

    /** Decodes an [`i32`] and casts it to an [`i16`].
     *
     * # Errors
     *
     * Returns [`XdrDecodeError`] if there are not enough bytes available, or
     * the value does not fit.
     */
    pub fn get_i16(&self) -> Result<i16, XdrDecodeError> {
        let offset = self.offset.get();
        let value = self.get_i32()?;

        i16::try_from(value).map_err(|err| {
            self.offset.set(offset);
            XdrDecodeError::I32Conversion { offset, value, err }
        })
    }

    /** Decodes an [`i32`].
     *
     * # Errors
     *
     * Returns [`XdrDecodeError`] if there are not enough bytes available.
     */
    pub fn get_i32(&self) -> Result<i32, XdrDecodeError> {
        Ok(i32::from_be_bytes(self.get_n_bytes()?))
    }

    /** Decodes an [`i64`].
     *
     * # Errors
     *
     * Returns [`XdrDecodeError`] if there are not enough bytes available.
     */
    pub fn get_i64(&self) -> Result<i64, XdrDecodeError> {
        Ok(i64::from_be_bytes(self.get_n_bytes()?))
    }

    /** Decodes a [`u32`] and casts it to a [`u8`].
     *
     * # Errors
     *
     * Returns [`XdrDecodeError`] if there are not enough bytes available, or
     * the value does not fit.
     */
    pub fn get_u8(&self) -> Result<u8, XdrDecodeError> {
        let offset = self.offset.get();
        let value = self.get_u32()?;

        u8::try_from(value).map_err(|err| {
            self.offset.set(offset);
            XdrDecodeError::U32Conversion { offset, value, err }
        })
    }

    /** Decodes a [`u32`] and casts it to a [`u16`].
     *
     * # Errors
     *
     * Returns [`XdrDecodeError`] if there are not enough bytes available, or
     * the value does not fit.
     */
    pub fn get_u16(&self) -> Result<u16, XdrDecodeError> {
        let offset = self.offset.get();
        let value = self.get_u32()?;

        u16::try_from(value).map_err(|err| {
            self.offset.set(offset);
            XdrDecodeError::U32Conversion { offset, value, err }
        })
    }

    /** Decodes a [`u32`].
     *
     * # Errors
     *
     * Returns [`XdrDecodeError`] if there are not enough bytes available.
     */
    pub fn get_u32(&self) -> Result<u32, XdrDecodeError> {
        Ok(u32::from_be_bytes(self.get_n_bytes()?))
    }

    /** Decodes a [`u64`].
     *
     * # Errors
     *
     * Returns [`XdrDecodeError`] if there are not enough bytes available.
     *
     * ```
     * use rzhack::phys::XdrDecoder;
     *
     * let data = [0x12, 0x34, 0x56, 0x78, 0x9a, 0xbc, 0xde, 0xf0, 0x11];
     * let decoder = XdrDecoder::from_bytes(&data);
     *
     * assert_eq!(decoder.get_u64().unwrap(), 0x123456789abcdef0);
     * assert!(decoder.get_u64().is_err());
     * ```
     */
    pub fn get_u64(&self) -> Result<u64, XdrDecodeError> {
        Ok(u64::from_be_bytes(self.get_n_bytes()?))
    }

    /** Decodes a [`usize`] for array or string lengths.
     *
     * # Errors
     *
     * Returns [`XdrDecodeError`] if there are not enough bytes available.
     */
    pub fn get_usize(&self) -> Result<usize, XdrDecodeError> {
        let offset = self.offset.get();
        let value = self.get_u32()?;

        usize::try_from(value).map_err(|err| {
            self.offset.set(offset);
            XdrDecodeError::U32Conversion { offset, value, err }
        })
    }
}

/// [`XdrDecoder`] error.
#[derive(Debug, thiserror::Error)]
pub enum XdrDecodeError {
    /// End of input data.
    #[error("XDR end of input at offset {offset} capacity {capacity} count {count}")]
    EndOfInput {
        /// Byte offset of data.
        offset: usize,
        /// Total capacity of data.
        capacity: usize,
        /// Number of bytes needed.
        count: usize,
    },

    /// Invalid boolean.
    #[error("XDR invalid boolean {value} at offset {offset}")]
    InvalidBoolean {
        /// Byte offset of data.
        offset: usize,
        /// Value.
        value: u32,
    },

    /// Invalid str.
    #[error("XDR invalid str at offset {offset} length {length} | {err}")]
    InvalidStr {
        /// Byte offset of data.
        offset: usize,
        /// Length of string.
        length: usize,
        /// Error.
        #[source]
        err: core::str::Utf8Error,
    },

    /// Size conversion error from [`i32`].
    #[error("XDR i32 conversion error for value {value} at offset {offset} | {err}")]
    I32Conversion {
        /// Byte offset of data.
        offset: usize,
        /// Value.
        value: i32,
        /// Error.
        #[source]
        err: num::TryFromIntError,
    },

    /// Size conversion error from [`u32`].
    #[error("XDR u32 conversion error for value {value} at offset {offset} | {err}")]
    U32Conversion {
        /// Byte offset of data.
        offset: usize,
        /// Value.
        value: u32,
        /// Error.
        #[source]
        err: num::TryFromIntError,
    },

    /// Skip count is not a multiple of 4.
    #[error("XDR skip count {count} is not a multiple of 4")]
    SkipAlignment {
        /// Skip count.
        count: usize,
    },
}

////////////////////////////////////////////////////////////////////////////////

/// An XDR encoder.
pub struct XdrEncoder<'a> {
    data: &'a mut [u8],
    offset: usize,
}

impl fmt::Debug for XdrEncoder<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Change debug printing to print length instead of raw data.
        f.debug_struct("XdrEncoder")
            .field("length", &self.data.len())
            .field("offset", &self.offset)
            .finish()
    }
}

impl XdrEncoder<'_> {
    /** Initializes an [`XdrEncoder`].
     *
     * ```
     * use rzhack::phys::XdrEncoder;
     *
     * let mut data = [0; 12];
     * let mut encoder = XdrEncoder::to_bytes(&mut data);
     *
     * encoder.put_str("abcde").unwrap();
     * assert_eq!(encoder.offset(), 12);
     *
     * // Error end of output.
     * assert!(encoder.put_bool(true).is_err());
     *
     * assert_eq!(data, [0, 0, 0, 5, 0x61, 0x62, 0x63, 0x64, 0x65, 0, 0, 0]);
     * ```
     */
    pub fn to_bytes(data: &mut [u8]) -> XdrEncoder<'_> {
        XdrEncoder { data, offset: 0 }
    }

    /// Checks if there is enough space in data slice to encode.
    fn check_need(&self, count: usize) -> Result<(), XdrEncodeError> {
        if self.available() >= count {
            Ok(())
        } else {
            Err(XdrEncodeError::EndOfOutput {
                offset: self.offset,
                capacity: self.data.len(),
                count,
            })
        }
    }

    /// Returns the number of bytes still available for encoding in data slice.
    pub fn available(&self) -> usize {
        self.data.len().saturating_sub(self.offset)
    }

    /// Gets the current offset in bytes.
    pub fn offset(&self) -> usize {
        self.offset
    }

    fn put_n_bytes<const N: usize>(&mut self, bytes: [u8; N]) -> Result<(), XdrEncodeError> {
        self.check_need(N)?;
        self.data[self.offset..self.offset + N].copy_from_slice(&bytes);
        self.offset += N;
        Ok(())
    }

    /** Encodes fixed length opaque data, followed by zero padding.
     *
     * # Errors
     *
     * Returns [`XdrEncodeError`] if there are not enough bytes available.
     */
    pub fn put_opaque(&mut self, value: &[u8]) -> Result<(), XdrEncodeError> {
        let padded_length = xdr_align(value.len());
        self.check_need(padded_length)?;

        let start = self.offset;
        self.data[start..start + value.len()].copy_from_slice(value);
        self.data[start + value.len()..start + padded_length].fill(0);
        self.offset += padded_length;

        Ok(())
    }

    /** Encodes a [`str`].
     *
     * # Errors
     *
     * Returns [`XdrEncodeError`] if there are not enough bytes available, or
     * the string is too long.
     */
    pub fn put_str(&mut self, value: &str) -> Result<(), XdrEncodeError> {
        let length = u32::try_from(value.len()).map_err(|_| XdrEncodeError::TooLong {
            length: value.len(),
        })?;

        self.check_need(4 + xdr_align(value.len()))?;
        self.put_u32(length)?;
        self.put_opaque(value.as_bytes())
    }

    /** Encodes a [`bool`].
     *
     * # Errors
     *
     * Returns [`XdrEncodeError`] if there are not enough bytes available.
     */
    pub fn put_bool(&mut self, value: bool) -> Result<(), XdrEncodeError> {
        self.put_u32(u32::from(value))
    }

    /** Encodes an [`f64`].
     *
     * # Errors
     *
     * Returns [`XdrEncodeError`] if there are not enough bytes available.
     */
    pub fn put_f64(&mut self, value: f64) -> Result<(), XdrEncodeError> {
        self.put_n_bytes(value.to_be_bytes())
    }

    /** Encodes an [`i32`].
     *
     * # Errors
     *
     * Returns [`XdrEncodeError`] if there are not enough bytes available.
     */
    pub fn put_i32(&mut self, value: i32) -> Result<(), XdrEncodeError> {
        self.put_n_bytes(value.to_be_bytes())
    }

    /** Encodes an [`i64`].
     *
     * # Errors
     *
     * Returns [`XdrEncodeError`] if there are not enough bytes available.
     */
    pub fn put_i64(&mut self, value: i64) -> Result<(), XdrEncodeError> {
        self.put_n_bytes(value.to_be_bytes())
    }

    /** Encodes a [`u32`].
     *
     * # Errors
     *
     * Returns [`XdrEncodeError`] if there are not enough bytes available.
     */
    pub fn put_u32(&mut self, value: u32) -> Result<(), XdrEncodeError> {
        self.put_n_bytes(value.to_be_bytes())
    }

    /** Encodes a [`u64`].
     *
     * # Errors
     *
     * Returns [`XdrEncodeError`] if there are not enough bytes available.
     */
    pub fn put_u64(&mut self, value: u64) -> Result<(), XdrEncodeError> {
        self.put_n_bytes(value.to_be_bytes())
    }

    /** Encodes a [`usize`] as a [`u32`] array or string length.
     *
     * # Errors
     *
     * Returns [`XdrEncodeError`] if there are not enough bytes available, or
     * the value does not fit.
     */
    pub fn put_usize(&mut self, value: usize) -> Result<(), XdrEncodeError> {
        let value = u32::try_from(value).map_err(|_| XdrEncodeError::TooLong { length: value })?;
        self.put_u32(value)
    }
}

/// [`XdrEncoder`] error.
#[derive(Debug, thiserror::Error)]
pub enum XdrEncodeError {
    /// End of output data.
    #[error("XDR end of output at offset {offset} capacity {capacity} count {count}")]
    EndOfOutput {
        /// Byte offset of data.
        offset: usize,
        /// Total capacity of data.
        capacity: usize,
        /// Number of bytes needed.
        count: usize,
    },

    /// Length does not fit in a [`u32`].
    #[error("XDR length {length} is too long")]
    TooLong {
        /// Length.
        length: usize,
    },
}

////////////////////////////////////////////////////////////////////////////////

#[cfg(test)]
mod tests {

    use crate::phys::{XdrDecodeError, XdrDecoder, XdrEncoder};

    #[test]
    fn encode_decode_values() -> Result<(), XdrDecodeError> {
        let mut data = [0xff; 64];
        let mut encoder = XdrEncoder::to_bytes(&mut data);

        encoder.put_u32(7).unwrap();
        encoder.put_i32(-3).unwrap();
        encoder.put_u64(0x0102030405060708).unwrap();
        encoder.put_i64(-42).unwrap();
        encoder.put_f64(1.5).unwrap();
        encoder.put_str("vdev_tree").unwrap();
        encoder.put_opaque(&[9, 8]).unwrap();
        let length = encoder.offset();

        // Padding is zeroed.
        assert_eq!(&data[32..48], b"\x00\x00\x00\x09vdev_tree\x00\x00\x00");
        assert_eq!(&data[48..52], &[9, 8, 0, 0]);

        let decoder = XdrDecoder::from_bytes(&data[0..length]);
        assert_eq!(decoder.get_u8()?, 7);
        assert_eq!(decoder.get_i16()?, -3);
        assert_eq!(decoder.get_u64()?, 0x0102030405060708);
        assert_eq!(decoder.get_i64()?, -42);
        assert_eq!(decoder.get_f64()?, 1.5);
        assert_eq!(decoder.get_str()?, "vdev_tree");
        assert_eq!(decoder.get_opaque(2)?, &[9, 8]);
        assert!(decoder.is_empty());

        Ok(())
    }

    #[test]
    fn decode_errors() {
        let data = [0, 0, 1, 0, 0, 0, 0, 2];
        let decoder = XdrDecoder::from_bytes(&data);

        // Does not fit, and offset is restored.
        assert!(matches!(
            decoder.get_u8(),
            Err(XdrDecodeError::U32Conversion { value: 256, .. })
        ));
        assert_eq!(decoder.offset(), 0);

        assert!(matches!(
            decoder.skip(2),
            Err(XdrDecodeError::SkipAlignment { count: 2 })
        ));
        assert!(decoder.skip(4).is_ok());

        assert!(matches!(
            decoder.get_bool(),
            Err(XdrDecodeError::InvalidBoolean { value: 2, .. })
        ));

        // String length longer than input.
        let data = [0, 0, 0, 9, 0x61];
        let decoder = XdrDecoder::from_bytes(&data);
        assert!(matches!(
            decoder.get_str(),
            Err(XdrDecodeError::EndOfInput { .. })
        ));
        assert_eq!(decoder.offset(), 0);
    }
}
