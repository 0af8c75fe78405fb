// SPDX-License-Identifier: GPL-2.0 OR MIT

use tracing::{debug, info};

use crate::checksum::{label_compute, LabelChecksumError, Sha256};
use crate::phys::{ChecksumTail, EndianOrder};
use crate::repair::{LabelSection, RepairDevice, RepairError, SectionStatus};

/** Writes a section with a fresh checksum, if the stored one is stale.
 *
 * - `data` of the whole section, ending with its [`ChecksumTail`]
 * - `offset` in bytes of the section from the start of the device
 * - `order` of the checksum tail
 *
 * The checksum is computed with the offset as salt, and compared with the
 * value stored in the tail. If they are equal, nothing is written and
 * [`SectionStatus::Skipped`] is returned. Otherwise the tail of `data` is
 * updated, and the whole section is written.
 *
 * # Errors
 *
 * Returns [`RepairError`] if the write fails, or is short. The section is
 * then in an unknown state on the device.
 */
pub fn write_section<D: RepairDevice + ?Sized>(
    device: &mut D,
    section: LabelSection,
    data: &mut [u8],
    offset: u64,
    order: EndianOrder,
    sha256: &mut Sha256,
) -> Result<SectionStatus, RepairError> {
    let stored = ChecksumTail::value_from_bytes(ChecksumTail::tail_bytes(data)?, order)?;
    let computed = label_compute(data, offset, sha256, order)?;

    if stored == computed {
        debug!(%section, offset, "checksum is already correct");
        return Ok(SectionStatus::Skipped);
    }

    let tail = ChecksumTail {
        order,
        value: computed,
    };
    tail.to_bytes(ChecksumTail::tail_bytes_mut(data)?)
        .map_err(LabelChecksumError::from)?;

    let expected = data.len();
    let actual = device
        .write_at(data, offset)
        .map_err(|err| RepairError::Io {
            operation: "write",
            offset,
            err,
        })?;

    if actual != expected {
        return Err(RepairError::ShortWrite {
            offset,
            expected,
            actual,
        });
    }

    info!(%section, "wrote {expected} bytes at offset {offset}");

    Ok(SectionStatus::Repaired)
}

////////////////////////////////////////////////////////////////////////////////
