// SPDX-License-Identifier: GPL-2.0 OR MIT

use core::fmt;

use tracing::error;

use crate::phys::{LabelNvPairs, UberBlock};
use crate::repair::RepairError;

/// Section of a label protected by its own checksum.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LabelSection {
    /// First [`UberBlock`] of the ring.
    UberBlock,

    /// Configuration, [`LabelNvPairs`].
    VdevPhys,
}

impl LabelSection {
    /// Byte offset of the section from the start of a label.
    pub fn label_offset(&self) -> usize {
        match self {
            LabelSection::UberBlock => UberBlock::LABEL_OFFSET,
            LabelSection::VdevPhys => LabelNvPairs::LABEL_OFFSET,
        }
    }
}

impl fmt::Display for LabelSection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LabelSection::UberBlock => write!(f, "uberblock"),
            LabelSection::VdevPhys => write!(f, "vdev_phys"),
        }
    }
}

/// Outcome of a [`LabelSection`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum SectionStatus {
    /// New checksum was written.
    Repaired,

    /// Nothing was written, either because the checksum was already correct
    /// or because the section was rejected.
    #[default]
    Skipped,
}

impl fmt::Display for SectionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SectionStatus::Repaired => write!(f, "repaired"),
            SectionStatus::Skipped => write!(f, "skipped"),
        }
    }
}

/// Error that stopped the repair of a section, or of the whole label when
/// `section` is [`None`].
#[derive(Debug)]
pub struct RepairFailure {
    /// Section.
    pub section: Option<LabelSection>,

    /// Error.
    pub err: RepairError,
}

/// Repair outcome of one label.
#[derive(Debug)]
pub struct LabelReport {
    /// Label index.
    pub index: usize,

    /// Byte offset of the label in the device.
    pub offset: u64,

    /// [`LabelSection::UberBlock`] status.
    pub uber_block: SectionStatus,

    /// [`LabelSection::VdevPhys`] status.
    pub vdev_phys: SectionStatus,

    /// Errors, in the order they happened.
    pub failures: Vec<RepairFailure>,
}

impl LabelReport {
    pub(crate) fn new(index: usize, offset: u64) -> LabelReport {
        LabelReport {
            index,
            offset,
            uber_block: SectionStatus::Skipped,
            vdev_phys: SectionStatus::Skipped,
            failures: Vec::new(),
        }
    }

    /// Gets the status of a section.
    pub fn status(&self, section: LabelSection) -> SectionStatus {
        match section {
            LabelSection::UberBlock => self.uber_block,
            LabelSection::VdevPhys => self.vdev_phys,
        }
    }

    pub(crate) fn set_status(&mut self, section: LabelSection, status: SectionStatus) {
        match section {
            LabelSection::UberBlock => self.uber_block = status,
            LabelSection::VdevPhys => self.vdev_phys = status,
        }
    }

    /// Records an error, and logs it.
    pub(crate) fn reject(&mut self, section: Option<LabelSection>, err: RepairError) {
        match section {
            Some(section) => error!(label = self.index, %section, "{err}"),
            None => error!(label = self.index, "{err}"),
        }
        self.failures.push(RepairFailure { section, err });
    }

    /// Number of repaired sections.
    pub fn repaired_count(&self) -> usize {
        [self.uber_block, self.vdev_phys]
            .iter()
            .filter(|status| **status == SectionStatus::Repaired)
            .count()
    }

    /// Gets the first failure of a section, including whole label failures.
    pub fn failure(&self, section: LabelSection) -> Option<&RepairError> {
        self.failures
            .iter()
            .find(|failure| failure.section.is_none() || failure.section == Some(section))
            .map(|failure| &failure.err)
    }
}

impl fmt::Display for LabelReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "label {}: uberblock: {} checksum: {}",
            self.index, self.uber_block, self.vdev_phys
        )
    }
}
