// SPDX-License-Identifier: GPL-2.0 OR MIT

pub(crate) mod device;
pub use device::RepairDevice;

pub(crate) mod driver;
pub use driver::{repair_label, ConfigKey};

pub(crate) mod error;
pub use error::RepairError;

pub(crate) mod scanner;
pub use scanner::{repair_device, RepairReport};

pub(crate) mod section;
pub use section::{LabelReport, LabelSection, RepairFailure, SectionStatus};

pub(crate) mod verify;
pub use verify::{verify_device, LabelVerifyReport, VerifyReport, VerifyStatus};

pub(crate) mod writer;
pub use writer::write_section;

#[cfg(test)]
pub(crate) mod capture;

#[cfg(test)]
pub(crate) mod image;
