// SPDX-License-Identifier: GPL-2.0 OR MIT

pub(crate) mod common;
pub use common::{Checksum, ChecksumError};

pub(crate) mod label;
pub use label::{
    label_checksum, label_compute, label_verify, LabelChecksumError, LabelVerifyError,
};

pub(crate) mod sha256;
pub use sha256::Sha256;
