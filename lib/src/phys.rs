// SPDX-License-Identifier: GPL-2.0 OR MIT

pub(crate) mod checksum;
pub use checksum::{
    ChecksumTail, ChecksumTailDecodeError, ChecksumTailEncodeError, ChecksumValue,
    ChecksumValueDecodeError, ChecksumValueEncodeError,
};

pub(crate) mod endian;
pub use endian::{
    EndianDecodeError, EndianDecoder, EndianEncodeError, EndianEncoder, EndianOrder,
    ENDIAN_ORDER_NATIVE, ENDIAN_ORDER_SWAP,
};

pub(crate) mod label;
pub use label::{Label, LabelError, LabelNvPairs};

pub(crate) mod nv;
pub use nv::{
    NvDataType, NvDecodeError, NvEncodeError, NvEncoding, NvEndianOrder, NvList, NvPair, NvUnique,
    NvValue,
};

pub(crate) mod uberblock;
pub use uberblock::{UberBlock, UberBlockDecodeError, UberBlockEncodeError, UberBlockHeader};

pub(crate) mod xdr;
pub use xdr::{XdrDecodeError, XdrDecoder, XdrEncodeError, XdrEncoder};
