// SPDX-License-Identifier: GPL-2.0 OR MIT

use core::fmt;

use tracing::{info_span, warn};

use crate::checksum::{label_verify, Sha256};
use crate::phys::{Label, LabelNvPairs, UberBlock};
use crate::repair::driver::read_label;
use crate::repair::scanner::label_offsets;
use crate::repair::{ConfigKey, LabelSection, RepairDevice, RepairError, RepairFailure};

/// Verification outcome of a [`LabelSection`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum VerifyStatus {
    /// Checksum matches.
    Ok,

    /// Checksum is missing, or does not match.
    Bad,
}

impl fmt::Display for VerifyStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VerifyStatus::Ok => write!(f, "ok"),
            VerifyStatus::Bad => write!(f, "bad"),
        }
    }
}

/// Verification outcome of one label.
#[derive(Debug)]
pub struct LabelVerifyReport {
    /// Label index.
    pub index: usize,

    /// [`LabelSection::UberBlock`] status.
    pub uber_block: VerifyStatus,

    /// [`LabelSection::VdevPhys`] status.
    pub vdev_phys: VerifyStatus,

    /// Errors.
    pub failures: Vec<RepairFailure>,
}

impl fmt::Display for LabelVerifyReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "label {}: uberblock: {} checksum: {}",
            self.index, self.uber_block, self.vdev_phys
        )
    }
}

/// Verification outcome of all labels of a device.
#[derive(Debug)]
pub struct VerifyReport {
    /// Labels, in index order.
    pub labels: Vec<LabelVerifyReport>,
}

impl VerifyReport {
    /// Process exit code: 0 if every section verified, else 1.
    pub fn exit_code(&self) -> i32 {
        let ok = self.labels.iter().all(|label| {
            label.uber_block == VerifyStatus::Ok && label.vdev_phys == VerifyStatus::Ok
        });

        if ok {
            0
        } else {
            1
        }
    }

    /// One status line per label.
    pub fn lines(&self) -> Vec<String> {
        self.labels.iter().map(|label| label.to_string()).collect()
    }
}

fn verify_label<D: RepairDevice + ?Sized>(
    device: &mut D,
    index: usize,
    offset: u64,
    sha256: &mut Sha256,
) -> LabelVerifyReport {
    let span = info_span!("label", label = index);
    let _guard = span.enter();

    let mut report = LabelVerifyReport {
        index,
        uber_block: VerifyStatus::Bad,
        vdev_phys: VerifyStatus::Bad,
        failures: Vec::new(),
    };

    let label = match read_label(device, offset) {
        Ok(v) => v,
        Err(err) => {
            warn!("{err}");
            report.failures.push(RepairFailure { section: None, err });
            return report;
        }
    };

    // Without a readable ashift, the smallest uberblock is checked.
    let ashift = LabelNvPairs::bytes(&label)
        .ok()
        .and_then(|bytes| LabelNvPairs::config(bytes).ok())
        .and_then(|config| ConfigKey::required_ashift(&config).ok())
        .unwrap_or(UberBlock::MIN_SHIFT);

    for section in [LabelSection::UberBlock, LabelSection::VdevPhys] {
        let data = match section {
            LabelSection::UberBlock => Label::uber_block(&label, ashift),
            LabelSection::VdevPhys => LabelNvPairs::bytes(&label).map(|v| &v[..]),
        };
        let section_offset = offset + section.label_offset() as u64;

        let result = data
            .map_err(RepairError::from)
            .and_then(|data| Ok(label_verify(data, section_offset, sha256)?));

        match result {
            Ok(()) => match section {
                LabelSection::UberBlock => report.uber_block = VerifyStatus::Ok,
                LabelSection::VdevPhys => report.vdev_phys = VerifyStatus::Ok,
            },
            Err(err) => {
                warn!(%section, "{err}");
                report.failures.push(RepairFailure {
                    section: Some(section),
                    err,
                });
            }
        }
    }

    report
}

/** Verifies the checksums of all labels of a device, without writing.
 *
 * # Errors
 *
 * Returns [`RepairError`] if the device size cannot be determined, or is too
 * small for [`Label::COUNT`] labels.
 */
pub fn verify_device<D: RepairDevice + ?Sized>(
    device: &mut D,
) -> Result<VerifyReport, RepairError> {
    let (_, _, offsets) = label_offsets(device)?;

    let mut sha256 = Sha256::new();
    let mut labels = Vec::with_capacity(Label::COUNT);

    for (index, offset) in offsets.into_iter().enumerate() {
        labels.push(verify_label(device, index, offset, &mut sha256));
    }

    Ok(VerifyReport { labels })
}

////////////////////////////////////////////////////////////////////////////////
