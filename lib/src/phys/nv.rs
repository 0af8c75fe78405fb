// SPDX-License-Identifier: GPL-2.0 OR MIT

/*! Name Value decoder and encoder.
 *
 * A Name Value list is a sequence of Name Value [`NvPair`].
 *
 * Header
 * ======
 * The first four bytes of the parent list are:
 * - [`NvEncoding`]
 * - [`NvEndianOrder`]
 * - Two zero bytes
 *
 * [`NvEncoding`] and [`NvEndianOrder`] specify how the rest of the data is encoded.
 * Nested lists inherit [`NvEncoding`] and [`NvEndianOrder`] from the parent list.
 * Only [`NvEncoding::Xdr`] is supported, which is always big endian, regardless
 * of [`NvEndianOrder`].
 *
 * List
 * ====
 * A list starts with:
 * - [`u32`] version
 * - [`u32`] flags
 *
 * And is followed by a sequence of [`NvPair`], and two zero [`u32`].
 *
 * NvPair
 * ======
 * An [`NvPair`] starts with:
 * - [`u32`] encoded size (of entire pair, including this number)
 * - [`u32`] decoded size (in memory size of the pair in libnvpair)
 *
 * If both values are zero, then this is the end of the list.
 *
 * If they are not zero, then what follows is:
 * - [`String`] name
 * - [`u32`] [`NvDataType`]
 * - [`u32`] count for number of values in this pair
 *   - 0 for [`NvDataType::Boolean`].
 *   - 1 for all non array types [`NvDataType::Uint32`] etc...
 *   - 0 to N for array types [`NvDataType::Uint32Array`] etc...
 * - [`NvValue`] whose encoding corresponds to [`NvDataType`] and count
 *
 * Values
 * ======
 * - Values smaller than 32 bits are encoded as 32 bits.
 * - [`NvDataType::ByteArray`] is opaque bytes padded to four, with no length.
 * - Other numeric and boolean arrays are prefixed with their length.
 * - [`NvDataType::StringArray`] is a sequence of strings, with no length.
 * - [`NvDataType::NvList`] is a list without the header.
 * - [`NvDataType::NvListArray`] is a sequence of lists without the header.
 *
 * Booleans
 * ========
 * A note about the two different boolean data types:
 * - [`NvDataType::Boolean`] has a count of 0, has no value, and is used as a flag.
 *   For example, the `features_for_read` list contains a sequence of flags,
 *   such as `org.openzfs:blake3`
 * - [`NvDataType::BooleanValue`] has a count of 1, and an actual value that can
 *   be [`true`] or [`false`]
 */
use core::fmt;
use core::fmt::Display;

use crate::phys::xdr::xdr_align;
use crate::phys::{
    EndianOrder, XdrDecodeError, XdrDecoder, XdrEncodeError, XdrEncoder, ENDIAN_ORDER_NATIVE,
};

////////////////////////////////////////////////////////////////////////////////

/// Name Value List byte order.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NvEndianOrder {
    /// Big byte order.
    Big = 0,

    /// Little byte order.
    Little = 1,
}

impl From<EndianOrder> for NvEndianOrder {
    fn from(val: EndianOrder) -> NvEndianOrder {
        match val {
            EndianOrder::Big => NvEndianOrder::Big,
            EndianOrder::Little => NvEndianOrder::Little,
        }
    }
}

impl Display for NvEndianOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NvEndianOrder::Big => write!(f, "Big"),
            NvEndianOrder::Little => write!(f, "Little"),
        }
    }
}

impl TryFrom<u8> for NvEndianOrder {
    type Error = NvDecodeError;

    /** Try converting from a [`u8`] to a [`NvEndianOrder`].
     *
     * # Errors
     *
     * Returns [`NvDecodeError`] in case of an unknown [`NvEndianOrder`].
     */
    fn try_from(order: u8) -> Result<Self, Self::Error> {
        match order {
            0 => Ok(NvEndianOrder::Big),
            1 => Ok(NvEndianOrder::Little),
            _ => Err(NvDecodeError::UnknownEndian { order }),
        }
    }
}

////////////////////////////////////////////////////////////////////////////////

/// Name Value List encoding.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NvEncoding {
    /// Native binary encoding.
    Native = 0,

    /// XDR encoding.
    Xdr = 1,
}

impl Display for NvEncoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NvEncoding::Native => write!(f, "Native"),
            NvEncoding::Xdr => write!(f, "Xdr"),
        }
    }
}

impl TryFrom<u8> for NvEncoding {
    type Error = NvDecodeError;

    /** Try converting from a [`u8`] to a [`NvEncoding`].
     *
     * # Errors
     *
     * Returns [`NvDecodeError`] in case of an unknown [`NvEncoding`].
     */
    fn try_from(encoding: u8) -> Result<Self, Self::Error> {
        match encoding {
            0 => Ok(NvEncoding::Native),
            1 => Ok(NvEncoding::Xdr),
            _ => Err(NvDecodeError::UnknownEncoding { encoding }),
        }
    }
}

////////////////////////////////////////////////////////////////////////////////

/// Name Value List Unique flags.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NvUnique {
    /// No unique constraints.
    None = 0,

    /// Name must be unique.
    Name = 1,

    /// Name and type must be unique.
    NameType = 2,
}

impl Display for NvUnique {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NvUnique::None => write!(f, "None"),
            NvUnique::Name => write!(f, "Name"),
            NvUnique::NameType => write!(f, "NameType"),
        }
    }
}

impl From<NvUnique> for u32 {
    fn from(val: NvUnique) -> u32 {
        val as u32
    }
}

impl TryFrom<u32> for NvUnique {
    type Error = NvDecodeError;

    /** Try converting from the [`u32`] list flags to a [`NvUnique`].
     *
     * # Errors
     *
     * Returns [`NvDecodeError`] in case of unknown flags.
     */
    fn try_from(flags: u32) -> Result<Self, Self::Error> {
        match flags {
            0 => Ok(NvUnique::None),
            1 => Ok(NvUnique::Name),
            2 => Ok(NvUnique::NameType),
            _ => Err(NvDecodeError::UnknownFlags { flags }),
        }
    }
}

////////////////////////////////////////////////////////////////////////////////

/// Name Value Pair Data Type.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NvDataType {
    /// A boolean flag (no value).
    Boolean = 1,

    /// A [u8] byte.
    Byte = 2,

    /// A [i16].
    Int16 = 3,

    /// A [u16].
    Uint16 = 4,

    /// A [i32].
    Int32 = 5,

    /// A [u32].
    Uint32 = 6,

    /// A [i64].
    Int64 = 7,

    /// A [u64].
    Uint64 = 8,

    /// A [str].
    String = 9,

    /// An array of [u8] bytes.
    ByteArray = 10,

    /// An array of [i16].
    Int16Array = 11,

    /// An array of [u16].
    Uint16Array = 12,

    /// An array of [i32].
    Int32Array = 13,

    /// An array of [u32].
    Uint32Array = 14,

    /// An array of [i64].
    Int64Array = 15,

    /// An array of [u64].
    Uint64Array = 16,

    /// An array of [str].
    StringArray = 17,

    /// High resolution time in nanoseconds.
    HrTime = 18,

    /// A [`NvList`].
    NvList = 19,

    /// An array of nested [`NvList`].
    NvListArray = 20,

    /// A [bool].
    BooleanValue = 21,

    /// A [i8].
    Int8 = 22,

    /// A [u8].
    Uint8 = 23,

    /// An array of [bool].
    BooleanArray = 24,

    /// An array of [i8].
    Int8Array = 25,

    /// An array of [u8].
    Uint8Array = 26,

    /// A [f64].
    Double = 27,
}

impl Display for NvDataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

impl From<NvDataType> for u32 {
    fn from(val: NvDataType) -> u32 {
        val as u32
    }
}

impl TryFrom<u32> for NvDataType {
    type Error = NvDecodeError;

    /** Try converting from a [`u32`] to a [`NvDataType`].
     *
     * # Errors
     *
     * Returns [`NvDecodeError`] in case of an unknown [`NvDataType`].
     */
    fn try_from(data_type: u32) -> Result<Self, Self::Error> {
        match data_type {
            1 => Ok(NvDataType::Boolean),
            2 => Ok(NvDataType::Byte),
            3 => Ok(NvDataType::Int16),
            4 => Ok(NvDataType::Uint16),
            5 => Ok(NvDataType::Int32),
            6 => Ok(NvDataType::Uint32),
            7 => Ok(NvDataType::Int64),
            8 => Ok(NvDataType::Uint64),
            9 => Ok(NvDataType::String),
            10 => Ok(NvDataType::ByteArray),
            11 => Ok(NvDataType::Int16Array),
            12 => Ok(NvDataType::Uint16Array),
            13 => Ok(NvDataType::Int32Array),
            14 => Ok(NvDataType::Uint32Array),
            15 => Ok(NvDataType::Int64Array),
            16 => Ok(NvDataType::Uint64Array),
            17 => Ok(NvDataType::StringArray),
            18 => Ok(NvDataType::HrTime),
            19 => Ok(NvDataType::NvList),
            20 => Ok(NvDataType::NvListArray),
            21 => Ok(NvDataType::BooleanValue),
            22 => Ok(NvDataType::Int8),
            23 => Ok(NvDataType::Uint8),
            24 => Ok(NvDataType::BooleanArray),
            25 => Ok(NvDataType::Int8Array),
            26 => Ok(NvDataType::Uint8Array),
            27 => Ok(NvDataType::Double),
            _ => Err(NvDecodeError::UnknownDataType { data_type }),
        }
    }
}

////////////////////////////////////////////////////////////////////////////////

/// Rounds up to a multiple of eight, the in memory alignment of libnvpair.
fn nv_align8(size: usize) -> usize {
    (size + 7) & !7
}

/// In memory size of a libnvpair `nvlist_t`.
const NV_LIST_NATIVE_SIZE: usize = 24;

/// In memory size of a libnvpair `nvpair_t` header.
const NV_PAIR_NATIVE_SIZE: usize = 16;

/// XDR size of list version, flags, and the two zero terminator values.
const NV_LIST_XDR_FRAME_SIZE: usize = 16;

/// Name Value Pair value.
#[derive(Clone, Debug, PartialEq)]
pub enum NvValue {
    /// A boolean flag (no value).
    Boolean,

    /// A [u8] byte.
    Byte(u8),

    /// A [i16].
    Int16(i16),

    /// A [u16].
    Uint16(u16),

    /// A [i32].
    Int32(i32),

    /// A [u32].
    Uint32(u32),

    /// A [i64].
    Int64(i64),

    /// A [u64].
    Uint64(u64),

    /// A [str].
    String(String),

    /// An array of [u8] bytes.
    ByteArray(Vec<u8>),

    /// An array of [i16].
    Int16Array(Vec<i16>),

    /// An array of [u16].
    Uint16Array(Vec<u16>),

    /// An array of [i32].
    Int32Array(Vec<i32>),

    /// An array of [u32].
    Uint32Array(Vec<u32>),

    /// An array of [i64].
    Int64Array(Vec<i64>),

    /// An array of [u64].
    Uint64Array(Vec<u64>),

    /// An array of [str].
    StringArray(Vec<String>),

    /// High resolution time in nanoseconds.
    HrTime(i64),

    /// A nested [`NvList`].
    NvList(NvList),

    /// An array of nested [`NvList`].
    NvListArray(Vec<NvList>),

    /// A [bool].
    BooleanValue(bool),

    /// A [i8].
    Int8(i8),

    /// A [u8].
    Uint8(u8),

    /// An array of [bool].
    BooleanArray(Vec<bool>),

    /// An array of [i8].
    Int8Array(Vec<i8>),

    /// An array of [u8].
    Uint8Array(Vec<u8>),

    /// A [f64].
    Double(f64),
}

impl NvValue {
    /// Gets the [`NvDataType`] of the value.
    pub fn data_type(&self) -> NvDataType {
        match self {
            NvValue::Boolean => NvDataType::Boolean,
            NvValue::Byte(_) => NvDataType::Byte,
            NvValue::Int16(_) => NvDataType::Int16,
            NvValue::Uint16(_) => NvDataType::Uint16,
            NvValue::Int32(_) => NvDataType::Int32,
            NvValue::Uint32(_) => NvDataType::Uint32,
            NvValue::Int64(_) => NvDataType::Int64,
            NvValue::Uint64(_) => NvDataType::Uint64,
            NvValue::String(_) => NvDataType::String,
            NvValue::ByteArray(_) => NvDataType::ByteArray,
            NvValue::Int16Array(_) => NvDataType::Int16Array,
            NvValue::Uint16Array(_) => NvDataType::Uint16Array,
            NvValue::Int32Array(_) => NvDataType::Int32Array,
            NvValue::Uint32Array(_) => NvDataType::Uint32Array,
            NvValue::Int64Array(_) => NvDataType::Int64Array,
            NvValue::Uint64Array(_) => NvDataType::Uint64Array,
            NvValue::StringArray(_) => NvDataType::StringArray,
            NvValue::HrTime(_) => NvDataType::HrTime,
            NvValue::NvList(_) => NvDataType::NvList,
            NvValue::NvListArray(_) => NvDataType::NvListArray,
            NvValue::BooleanValue(_) => NvDataType::BooleanValue,
            NvValue::Int8(_) => NvDataType::Int8,
            NvValue::Uint8(_) => NvDataType::Uint8,
            NvValue::BooleanArray(_) => NvDataType::BooleanArray,
            NvValue::Int8Array(_) => NvDataType::Int8Array,
            NvValue::Uint8Array(_) => NvDataType::Uint8Array,
            NvValue::Double(_) => NvDataType::Double,
        }
    }

    /// Number of elements, as encoded in the pair.
    fn count(&self) -> usize {
        match self {
            NvValue::Boolean => 0,
            NvValue::ByteArray(v) | NvValue::Uint8Array(v) => v.len(),
            NvValue::Int16Array(v) => v.len(),
            NvValue::Uint16Array(v) => v.len(),
            NvValue::Int32Array(v) => v.len(),
            NvValue::Uint32Array(v) => v.len(),
            NvValue::Int64Array(v) => v.len(),
            NvValue::Uint64Array(v) => v.len(),
            NvValue::StringArray(v) => v.len(),
            NvValue::NvListArray(v) => v.len(),
            NvValue::BooleanArray(v) => v.len(),
            NvValue::Int8Array(v) => v.len(),
            _ => 1,
        }
    }

    /// Size of the value in libnvpair memory, before alignment.
    fn native_size(&self) -> usize {
        match self {
            NvValue::Boolean => 0,
            NvValue::Byte(_) | NvValue::Int8(_) | NvValue::Uint8(_) => 1,
            NvValue::Int16(_) | NvValue::Uint16(_) => 2,
            NvValue::Int32(_) | NvValue::Uint32(_) | NvValue::BooleanValue(_) => 4,
            NvValue::Int64(_) | NvValue::Uint64(_) | NvValue::HrTime(_) | NvValue::Double(_) => 8,
            NvValue::String(v) => v.len() + 1,
            NvValue::ByteArray(v) | NvValue::Uint8Array(v) => v.len(),
            NvValue::Int8Array(v) => v.len(),
            NvValue::Int16Array(v) => v.len() * 2,
            NvValue::Uint16Array(v) => v.len() * 2,
            NvValue::Int32Array(v) => v.len() * 4,
            NvValue::Uint32Array(v) => v.len() * 4,
            NvValue::BooleanArray(v) => v.len() * 4,
            NvValue::Int64Array(v) => v.len() * 8,
            NvValue::Uint64Array(v) => v.len() * 8,
            NvValue::StringArray(v) => v.iter().map(|s| 8 + s.len() + 1).sum(),
            NvValue::NvList(_) => NV_LIST_NATIVE_SIZE,
            NvValue::NvListArray(v) => v.len() * (8 + nv_align8(NV_LIST_NATIVE_SIZE)),
        }
    }

    /// Size of the XDR encoded value.
    fn encoded_size(&self) -> usize {
        match self {
            NvValue::Boolean => 0,
            NvValue::Byte(_)
            | NvValue::Int8(_)
            | NvValue::Uint8(_)
            | NvValue::Int16(_)
            | NvValue::Uint16(_)
            | NvValue::Int32(_)
            | NvValue::Uint32(_)
            | NvValue::BooleanValue(_) => 4,
            NvValue::Int64(_) | NvValue::Uint64(_) | NvValue::HrTime(_) | NvValue::Double(_) => 8,
            NvValue::String(v) => 4 + xdr_align(v.len()),
            NvValue::ByteArray(v) => xdr_align(v.len()),
            NvValue::Uint8Array(v) => 4 + 4 * v.len(),
            NvValue::Int8Array(v) => 4 + 4 * v.len(),
            NvValue::Int16Array(v) => 4 + 4 * v.len(),
            NvValue::Uint16Array(v) => 4 + 4 * v.len(),
            NvValue::Int32Array(v) => 4 + 4 * v.len(),
            NvValue::Uint32Array(v) => 4 + 4 * v.len(),
            NvValue::BooleanArray(v) => 4 + 4 * v.len(),
            NvValue::Int64Array(v) => 4 + 8 * v.len(),
            NvValue::Uint64Array(v) => 4 + 8 * v.len(),
            NvValue::StringArray(v) => v.iter().map(|s| 4 + xdr_align(s.len())).sum(),
            NvValue::NvList(v) => v.body_encoded_size(),
            NvValue::NvListArray(v) => v.iter().map(NvList::body_encoded_size).sum(),
        }
    }

    /// Decodes a value of the `data_type` with `count` elements, nested
    /// `depth` lists below the top level.
    fn from_decoder(
        decoder: &XdrDecoder<'_>,
        data_type: NvDataType,
        count: usize,
        depth: usize,
    ) -> Result<NvValue, NvDecodeError> {
        // Check count for non array types.
        let expected = match data_type {
            NvDataType::Boolean => Some(0),
            NvDataType::Byte
            | NvDataType::Int16
            | NvDataType::Uint16
            | NvDataType::Int32
            | NvDataType::Uint32
            | NvDataType::Int64
            | NvDataType::Uint64
            | NvDataType::String
            | NvDataType::HrTime
            | NvDataType::NvList
            | NvDataType::BooleanValue
            | NvDataType::Int8
            | NvDataType::Uint8
            | NvDataType::Double => Some(1),
            _ => None,
        };
        if let Some(expected) = expected {
            if count != expected {
                return Err(NvDecodeError::InvalidCount { data_type, count });
            }
        }

        // Counted arrays repeat the count before the elements.
        let counted = |decoder: &XdrDecoder<'_>| -> Result<usize, NvDecodeError> {
            let length = decoder.get_usize()?;
            if length != count {
                return Err(NvDecodeError::ArrayLengthMismatch { count, length });
            }
            Ok(length)
        };

        macro_rules! array {
            ($variant:ident, $getter:ident) => {{
                let length = counted(decoder)?;
                let mut values = Vec::new();
                for _ in 0..length {
                    values.push(decoder.$getter()?);
                }
                NvValue::$variant(values)
            }};
        }

        Ok(match data_type {
            NvDataType::Boolean => NvValue::Boolean,
            NvDataType::Byte => NvValue::Byte(decoder.get_u8()?),
            NvDataType::Int16 => NvValue::Int16(decoder.get_i16()?),
            NvDataType::Uint16 => NvValue::Uint16(decoder.get_u16()?),
            NvDataType::Int32 => NvValue::Int32(decoder.get_i32()?),
            NvDataType::Uint32 => NvValue::Uint32(decoder.get_u32()?),
            NvDataType::Int64 => NvValue::Int64(decoder.get_i64()?),
            NvDataType::Uint64 => NvValue::Uint64(decoder.get_u64()?),
            NvDataType::String => NvValue::String(decoder.get_str()?.to_string()),
            NvDataType::ByteArray => NvValue::ByteArray(decoder.get_opaque(count)?.to_vec()),
            NvDataType::Int16Array => array!(Int16Array, get_i16),
            NvDataType::Uint16Array => array!(Uint16Array, get_u16),
            NvDataType::Int32Array => array!(Int32Array, get_i32),
            NvDataType::Uint32Array => array!(Uint32Array, get_u32),
            NvDataType::Int64Array => array!(Int64Array, get_i64),
            NvDataType::Uint64Array => array!(Uint64Array, get_u64),
            NvDataType::StringArray => {
                let mut values = Vec::new();
                for _ in 0..count {
                    values.push(decoder.get_str()?.to_string());
                }
                NvValue::StringArray(values)
            }
            NvDataType::HrTime => NvValue::HrTime(decoder.get_i64()?),
            NvDataType::NvList => NvValue::NvList(NvList::body_from_decoder(decoder, depth + 1)?),
            NvDataType::NvListArray => {
                let mut values = Vec::new();
                for _ in 0..count {
                    values.push(NvList::body_from_decoder(decoder, depth + 1)?);
                }
                NvValue::NvListArray(values)
            }
            NvDataType::BooleanValue => NvValue::BooleanValue(decoder.get_bool()?),
            NvDataType::Int8 => NvValue::Int8(decoder.get_i8()?),
            NvDataType::Uint8 => NvValue::Uint8(decoder.get_u8()?),
            NvDataType::BooleanArray => array!(BooleanArray, get_bool),
            NvDataType::Int8Array => array!(Int8Array, get_i8),
            NvDataType::Uint8Array => array!(Uint8Array, get_u8),
            NvDataType::Double => NvValue::Double(decoder.get_f64()?),
        })
    }

    /// Encodes the value, without the pair header.
    fn to_encoder(&self, encoder: &mut XdrEncoder<'_>) -> Result<(), NvEncodeError> {
        macro_rules! array {
            ($values:expr, $putter:ident) => {{
                encoder.put_usize($values.len())?;
                for v in $values.iter() {
                    encoder.$putter((*v).into())?;
                }
            }};
        }

        match self {
            NvValue::Boolean => (),
            NvValue::Byte(v) | NvValue::Uint8(v) => encoder.put_u32((*v).into())?,
            NvValue::Int8(v) => encoder.put_i32((*v).into())?,
            NvValue::Int16(v) => encoder.put_i32((*v).into())?,
            NvValue::Uint16(v) => encoder.put_u32((*v).into())?,
            NvValue::Int32(v) => encoder.put_i32(*v)?,
            NvValue::Uint32(v) => encoder.put_u32(*v)?,
            NvValue::Int64(v) | NvValue::HrTime(v) => encoder.put_i64(*v)?,
            NvValue::Uint64(v) => encoder.put_u64(*v)?,
            NvValue::String(v) => encoder.put_str(v)?,
            NvValue::ByteArray(v) => encoder.put_opaque(v)?,
            NvValue::Int16Array(v) => array!(v, put_i32),
            NvValue::Uint16Array(v) => array!(v, put_u32),
            NvValue::Int32Array(v) => array!(v, put_i32),
            NvValue::Uint32Array(v) => array!(v, put_u32),
            NvValue::Int64Array(v) => array!(v, put_i64),
            NvValue::Uint64Array(v) => array!(v, put_u64),
            NvValue::StringArray(v) => {
                for s in v {
                    encoder.put_str(s)?;
                }
            }
            NvValue::NvList(v) => v.body_to_encoder(encoder)?,
            NvValue::NvListArray(v) => {
                for list in v {
                    list.body_to_encoder(encoder)?;
                }
            }
            NvValue::BooleanValue(v) => encoder.put_bool(*v)?,
            NvValue::BooleanArray(v) => array!(v, put_bool),
            NvValue::Int8Array(v) => array!(v, put_i32),
            NvValue::Uint8Array(v) => array!(v, put_u32),
            NvValue::Double(v) => encoder.put_f64(*v)?,
        }

        Ok(())
    }
}

////////////////////////////////////////////////////////////////////////////////

/// Name Value Pair.
#[derive(Clone, Debug, PartialEq)]
pub struct NvPair {
    /// Name.
    pub name: String,

    /// Value.
    pub value: NvValue,
}

impl NvPair {
    /// Fixed XDR size of the pair header: sizes, name length, type, count.
    const XDR_HEADER_SIZE: usize = 20;

    /// Size of the pair in libnvpair memory, stored as the decoded size.
    pub fn native_size(&self) -> usize {
        nv_align8(NV_PAIR_NATIVE_SIZE + self.name.len() + 1) + nv_align8(self.value.native_size())
    }

    /// Size of the XDR encoded pair, stored as the encoded size.
    pub fn encoded_size(&self) -> usize {
        NvPair::XDR_HEADER_SIZE + xdr_align(self.name.len()) + self.value.encoded_size()
    }

    /// Decodes a pair, or returns [`None`] at the end of the list.
    fn from_decoder(
        decoder: &XdrDecoder<'_>,
        depth: usize,
    ) -> Result<Option<NvPair>, NvDecodeError> {
        let start = decoder.offset();

        let encoded_size = decoder.get_usize()?;
        let decoded_size = decoder.get_usize()?;

        if encoded_size == 0 && decoded_size == 0 {
            return Ok(None);
        }

        let name = decoder.get_str()?.to_string();
        let data_type = NvDataType::try_from(decoder.get_u32()?)?;
        let count = decoder.get_usize()?;
        let value = NvValue::from_decoder(decoder, data_type, count, depth)?;

        let used = decoder.offset() - start;
        if used != encoded_size {
            return Err(NvDecodeError::InvalidEncodedSize { encoded_size, used });
        }

        Ok(Some(NvPair { name, value }))
    }

    fn to_encoder(&self, encoder: &mut XdrEncoder<'_>) -> Result<(), NvEncodeError> {
        encoder.put_usize(self.encoded_size())?;
        encoder.put_usize(self.native_size())?;
        encoder.put_str(&self.name)?;
        encoder.put_u32(self.value.data_type().into())?;
        encoder.put_usize(self.value.count())?;
        self.value.to_encoder(encoder)
    }
}

////////////////////////////////////////////////////////////////////////////////

/** Name Value List.
 *
 * Owns its pairs, so that it can be modified and encoded again. Pairs are kept
 * in encoding order.
 *
 * ```
 * use rzhack::phys::{NvList, NvUnique};
 *
 * let mut list = NvList::new(NvUnique::Name);
 * list.add_u64("txg", 4);
 * list.add_u64("txg", 5);
 *
 * let mut data = [0; 64];
 * let length = list.to_bytes(&mut data).unwrap();
 * assert_eq!(length, list.encoded_size());
 *
 * let decoded = NvList::from_bytes(&data).unwrap();
 * assert_eq!(decoded.get_u64("txg").unwrap(), Some(5));
 * assert_eq!(decoded, list);
 * ```
 */
#[derive(Clone, Debug, PartialEq)]
pub struct NvList {
    /// Byte order recorded in the header of a top level list.
    pub order: NvEndianOrder,

    /// Unique flags.
    pub unique: NvUnique,

    /// Pairs.
    pub pairs: Vec<NvPair>,
}

impl NvList {
    /// Byte size of the header of a top level list.
    pub const HEADER_SIZE: usize = 4;

    /// Supported list version.
    pub const VERSION: u32 = 0;

    /// Deepest nesting of lists accepted by the decoder, as in libnvpair.
    pub const MAX_DEPTH: usize = 20;

    /// Create an empty [`NvList`].
    pub fn new(unique: NvUnique) -> NvList {
        NvList {
            order: ENDIAN_ORDER_NATIVE.into(),
            unique,
            pairs: Vec::new(),
        }
    }

    /** Decode a top level [`NvList`] from a slice of bytes.
     *
     * Bytes after the end of the list are ignored.
     *
     * # Errors
     *
     * Returns [`NvDecodeError`] in case of decoding error.
     */
    pub fn from_bytes(data: &[u8]) -> Result<NvList, NvDecodeError> {
        let decoder = XdrDecoder::from_bytes(data);

        let header = decoder.get_opaque(NvList::HEADER_SIZE)?;

        let encoding = NvEncoding::try_from(header[0])?;
        let order = NvEndianOrder::try_from(header[1])?;
        let reserved = [header[2], header[3]];
        if reserved != [0, 0] {
            return Err(NvDecodeError::InvalidReservedBytes { reserved });
        }
        if encoding != NvEncoding::Xdr {
            return Err(NvDecodeError::UnsupportedEncoding { encoding });
        }

        let mut list = NvList::body_from_decoder(&decoder, 0)?;
        list.order = order;

        Ok(list)
    }

    /// Decodes version, flags, pairs, and the terminator.
    fn body_from_decoder(
        decoder: &XdrDecoder<'_>,
        depth: usize,
    ) -> Result<NvList, NvDecodeError> {
        if depth > NvList::MAX_DEPTH {
            return Err(NvDecodeError::NestingTooDeep { depth });
        }

        let version = decoder.get_u32()?;
        if version != NvList::VERSION {
            return Err(NvDecodeError::UnknownVersion { version });
        }

        let unique = NvUnique::try_from(decoder.get_u32()?)?;

        let mut pairs = Vec::new();
        while let Some(pair) = NvPair::from_decoder(decoder, depth)? {
            pairs.push(pair);
        }

        Ok(NvList {
            order: ENDIAN_ORDER_NATIVE.into(),
            unique,
            pairs,
        })
    }

    /// Size of the XDR encoded top level list, including the header.
    pub fn encoded_size(&self) -> usize {
        NvList::HEADER_SIZE + self.body_encoded_size()
    }

    fn body_encoded_size(&self) -> usize {
        NV_LIST_XDR_FRAME_SIZE + self.pairs.iter().map(NvPair::encoded_size).sum::<usize>()
    }

    /** Encode a top level [`NvList`] to a slice of bytes.
     *
     * Returns the number of bytes written. Bytes past that are not modified.
     *
     * # Errors
     *
     * Returns [`NvEncodeError`] if `data` is too small.
     */
    pub fn to_bytes(&self, data: &mut [u8]) -> Result<usize, NvEncodeError> {
        let size = self.encoded_size();
        if size > data.len() {
            return Err(NvEncodeError::EndOfOutput {
                size,
                capacity: data.len(),
            });
        }

        let mut encoder = XdrEncoder::to_bytes(data);
        encoder.put_opaque(&[NvEncoding::Xdr as u8, self.order as u8, 0, 0])?;
        self.body_to_encoder(&mut encoder)?;

        Ok(encoder.offset())
    }

    fn body_to_encoder(&self, encoder: &mut XdrEncoder<'_>) -> Result<(), NvEncodeError> {
        encoder.put_u32(NvList::VERSION)?;
        encoder.put_u32(self.unique.into())?;

        for pair in &self.pairs {
            pair.to_encoder(encoder)?;
        }

        encoder.put_u32(0)?;
        encoder.put_u32(0)?;

        Ok(())
    }

    /// Gets the value of the first pair with the `name`.
    pub fn get(&self, name: &str) -> Option<&NvValue> {
        self.pairs
            .iter()
            .find(|pair| pair.name == name)
            .map(|pair| &pair.value)
    }

    /// Returns true if a pair with the `name` exists.
    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /** Gets a [`u64`] value.
     *
     * # Errors
     *
     * Returns [`NvDecodeError::DataTypeMismatch`] if the pair is not a
     * [`NvDataType::Uint64`].
     */
    pub fn get_u64(&self, name: &str) -> Result<Option<u64>, NvDecodeError> {
        match self.get(name) {
            None => Ok(None),
            Some(NvValue::Uint64(v)) => Ok(Some(*v)),
            Some(v) => Err(NvDecodeError::DataTypeMismatch {
                expected: NvDataType::Uint64,
                actual: v.data_type(),
            }),
        }
    }

    /** Gets a [`str`] value.
     *
     * # Errors
     *
     * Returns [`NvDecodeError::DataTypeMismatch`] if the pair is not a
     * [`NvDataType::String`].
     */
    pub fn get_str(&self, name: &str) -> Result<Option<&str>, NvDecodeError> {
        match self.get(name) {
            None => Ok(None),
            Some(NvValue::String(v)) => Ok(Some(v)),
            Some(v) => Err(NvDecodeError::DataTypeMismatch {
                expected: NvDataType::String,
                actual: v.data_type(),
            }),
        }
    }

    /** Gets a nested [`NvList`] value.
     *
     * # Errors
     *
     * Returns [`NvDecodeError::DataTypeMismatch`] if the pair is not a
     * [`NvDataType::NvList`].
     */
    pub fn get_nv_list(&self, name: &str) -> Result<Option<&NvList>, NvDecodeError> {
        match self.get(name) {
            None => Ok(None),
            Some(NvValue::NvList(v)) => Ok(Some(v)),
            Some(v) => Err(NvDecodeError::DataTypeMismatch {
                expected: NvDataType::NvList,
                actual: v.data_type(),
            }),
        }
    }

    /// Removes all pairs with the `name`, and returns how many were removed.
    pub fn remove_all(&mut self, name: &str) -> usize {
        let before = self.pairs.len();
        self.pairs.retain(|pair| pair.name != name);
        before - self.pairs.len()
    }

    /// Appends a pair, first removing pairs that the [`NvUnique`] flags forbid.
    pub fn add(&mut self, name: &str, value: NvValue) {
        match self.unique {
            NvUnique::None => (),
            NvUnique::Name => {
                self.remove_all(name);
            }
            NvUnique::NameType => {
                let data_type = value.data_type();
                self.pairs
                    .retain(|pair| pair.name != name || pair.value.data_type() != data_type);
            }
        }

        self.pairs.push(NvPair {
            name: name.to_string(),
            value,
        });
    }

    /// Appends a [`u64`] pair.
    pub fn add_u64(&mut self, name: &str, value: u64) {
        self.add(name, NvValue::Uint64(value));
    }
}

////////////////////////////////////////////////////////////////////////////////

/// [`NvList`] decode error.
#[derive(Debug, thiserror::Error)]
pub enum NvDecodeError {
    /// Counted array length does not match pair count.
    #[error("NV decode error, array length {length} does not match count {count}")]
    ArrayLengthMismatch {
        /// Pair count.
        count: usize,
        /// Array length.
        length: usize,
    },

    /// Data type mismatch.
    #[error("NV decode error, data type mismatch, expected {expected} actual {actual}")]
    DataTypeMismatch {
        /// Expected.
        expected: NvDataType,
        /// Actual.
        actual: NvDataType,
    },

    /// Invalid count for data type.
    #[error("NV decode error, invalid count {count} for data type {data_type}")]
    InvalidCount {
        /// Data type.
        data_type: NvDataType,
        /// Count.
        count: usize,
    },

    /// Encoded size of pair does not match the bytes used.
    #[error("NV decode error, encoded size {encoded_size} does not match used {used}")]
    InvalidEncodedSize {
        /// Encoded size.
        encoded_size: usize,
        /// Bytes used.
        used: usize,
    },

    /// Lists are nested deeper than [`NvList::MAX_DEPTH`].
    #[error("NV decode error, nesting depth {depth} exceeds limit")]
    NestingTooDeep {
        /// Depth.
        depth: usize,
    },

    /// Header reserved bytes are not zero.
    #[error("NV decode error, invalid reserved bytes {reserved:?}")]
    InvalidReservedBytes {
        /// Reserved bytes.
        reserved: [u8; 2],
    },

    /// Unknown data type.
    #[error("NV decode error, unknown data type {data_type}")]
    UnknownDataType {
        /// Data type.
        data_type: u32,
    },

    /// Unknown encoding.
    #[error("NV decode error, unknown encoding {encoding}")]
    UnknownEncoding {
        /// Encoding.
        encoding: u8,
    },

    /// Unknown endian.
    #[error("NV decode error, unknown endian {order}")]
    UnknownEndian {
        /// Endian.
        order: u8,
    },

    /// Unknown flags.
    #[error("NV decode error, unknown flags {flags}")]
    UnknownFlags {
        /// Flags.
        flags: u32,
    },

    /// Unknown version.
    #[error("NV decode error, unknown version {version}")]
    UnknownVersion {
        /// Version.
        version: u32,
    },

    /// Encoding is known, but not supported.
    #[error("NV decode error, unsupported encoding {encoding}")]
    UnsupportedEncoding {
        /// Encoding.
        encoding: NvEncoding,
    },

    /// [`XdrDecoder`] error.
    #[error("NV decode error | {err}")]
    Xdr {
        /// Error.
        #[from]
        err: XdrDecodeError,
    },
}

/// [`NvList`] encode error.
#[derive(Debug, thiserror::Error)]
pub enum NvEncodeError {
    /// Encoded list does not fit.
    #[error("NV encode error, encoded size {size} exceeds capacity {capacity}")]
    EndOfOutput {
        /// Encoded size.
        size: usize,
        /// Capacity.
        capacity: usize,
    },

    /// [`XdrEncoder`] error.
    #[error("NV encode error | {err}")]
    Xdr {
        /// Error.
        #[from]
        err: XdrEncodeError,
    },
}

////////////////////////////////////////////////////////////////////////////////
