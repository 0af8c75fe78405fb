// SPDX-License-Identifier: GPL-2.0 OR MIT

use std::io;

use crate::checksum::{LabelChecksumError, LabelVerifyError};
use crate::phys::{
    ChecksumTailDecodeError, LabelError, NvDecodeError, NvEncodeError, UberBlockDecodeError,
    UberBlockEncodeError,
};

/// Label repair error.
#[derive(Debug, thiserror::Error)]
pub enum RepairError {
    /// Device I/O error.
    #[error("cannot {operation} at offset {offset}: {err}")]
    Io {
        /// Operation that failed.
        operation: &'static str,
        /// Byte offset.
        offset: u64,
        /// Error.
        #[source]
        err: io::Error,
    },

    /// Device returned fewer bytes than requested.
    #[error("bad read size at offset {offset}, expected {expected} got {actual}")]
    ShortRead {
        /// Byte offset.
        offset: u64,
        /// Requested bytes.
        expected: usize,
        /// Read bytes.
        actual: usize,
    },

    /// Device wrote fewer bytes than requested.
    #[error("bad write size at offset {offset}, expected {expected} got {actual}")]
    ShortWrite {
        /// Byte offset.
        offset: u64,
        /// Requested bytes.
        expected: usize,
        /// Written bytes.
        actual: usize,
    },

    /// Configuration cannot be unpacked.
    #[error("cannot unpack nvlist | {err}")]
    MalformedConfig {
        /// Error.
        #[from]
        err: NvDecodeError,
    },

    /// Required configuration key is absent, of the wrong type, or zero.
    #[error("cannot find nvlist key {name}")]
    MissingField {
        /// Key.
        name: &'static str,
    },

    /// Uberblock checksum magic is already set.
    #[error("expected uberblock checksum magic number to be 0, but got {magic:02x?}")]
    AlreadyFinalized {
        /// Raw magic bytes.
        magic: [u8; 8],
    },

    /// Configuration checksum magic is not set.
    #[error("expected the nvlist checksum magic number to be valid, but got {magic:02x?}")]
    MissingChecksumMarker {
        /// Raw magic bytes.
        magic: [u8; 8],
    },

    /// Configuration does not fit in its region.
    #[error("failed to pack nvlist | {err}")]
    PackOverflow {
        /// Error.
        #[from]
        err: NvEncodeError,
    },

    /// Uberblock transaction group is not zero.
    #[error("uberblock txg of 0 expected, but got {txg}")]
    UnexpectedTxg {
        /// Transaction group.
        txg: u64,
    },

    /// Device cannot hold all labels.
    #[error("device size {size} is too small for labels")]
    DeviceTooSmall {
        /// Aligned size in bytes.
        size: u64,
    },

    /// Checksum computation error.
    #[error("checksum error | {err}")]
    Checksum {
        /// Error.
        #[from]
        err: LabelChecksumError,
    },

    /// Checksum tail error.
    #[error("checksum tail error | {err}")]
    ChecksumTail {
        /// Error.
        #[from]
        err: ChecksumTailDecodeError,
    },

    /// Label layout error.
    #[error("label layout error | {err}")]
    Label {
        /// Error.
        #[from]
        err: LabelError,
    },

    /// Uberblock decode error.
    #[error("uberblock error | {err}")]
    UberBlockDecode {
        /// Error.
        #[from]
        err: UberBlockDecodeError,
    },

    /// Uberblock encode error.
    #[error("uberblock error | {err}")]
    UberBlockEncode {
        /// Error.
        #[from]
        err: UberBlockEncodeError,
    },

    /// Checksum verification failed.
    #[error("verify error | {err}")]
    Verify {
        /// Error.
        #[from]
        err: LabelVerifyError,
    },
}
