// SPDX-License-Identifier: GPL-2.0 OR MIT

//! ZFS label checksum repair library.

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

/// Checksum calculation.
pub mod checksum;

/// On disk physical structure encoding and decoding.
pub mod phys;

/// Label checksum repair.
pub mod repair;

/// Userspace devices.
pub mod userspace;
