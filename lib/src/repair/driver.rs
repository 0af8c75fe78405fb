// SPDX-License-Identifier: GPL-2.0 OR MIT

/*! Repair of a single label.
 *
 * A label is only repaired when its first uberblock was never synced: the
 * uberblock transaction group is zero, and its checksum tail magic is zero.
 * The configuration must have a valid checksum tail magic.
 *
 * If the root block pointer of the uberblock has a birth transaction group,
 * it is copied into the uberblock and into the configuration, replacing the
 * `txg` and `create_txg` keys.
 *
 * Both sections then get a checksum salted with their device offset, and are
 * written only if the stored checksum differs.
 */
use tracing::{debug, info, info_span};

use crate::checksum::Sha256;
use crate::phys::{
    ChecksumTail, EndianOrder, Label, LabelNvPairs, NvList, UberBlock, ENDIAN_ORDER_NATIVE,
};
use crate::repair::{
    write_section, LabelReport, LabelSection, RepairDevice, RepairError, SectionStatus,
};

////////////////////////////////////////////////////////////////////////////////

/// Configuration keys of a label.
#[derive(Debug)]
pub struct ConfigKey {}

impl ConfigKey {
    /// Pool version.
    pub const VERSION: &'static str = "version";

    /// Pool state.
    pub const POOL_STATE: &'static str = "state";

    /// Pool GUID.
    pub const GUID: &'static str = "guid";

    /// Nested vdev tree list.
    pub const VDEV_TREE: &'static str = "vdev_tree";

    /// Ashift, in [`ConfigKey::VDEV_TREE`].
    pub const ASHIFT: &'static str = "ashift";

    /// Pool transaction group.
    pub const POOL_TXG: &'static str = "txg";

    /// Pool creation transaction group.
    pub const CREATE_TXG: &'static str = "create_txg";

    /** Gets the ashift from a configuration, checking that the required keys
     * are present.
     *
     * # Errors
     *
     * Returns [`RepairError::MissingField`] naming the first key that is
     * absent, not a [`u64`], or a zero ashift.
     */
    pub fn required_ashift(config: &NvList) -> Result<u64, RepairError> {
        for name in [ConfigKey::VERSION, ConfigKey::POOL_STATE, ConfigKey::GUID] {
            if !matches!(config.get_u64(name), Ok(Some(_))) {
                return Err(RepairError::MissingField { name });
            }
        }

        let vdev_tree = match config.get_nv_list(ConfigKey::VDEV_TREE) {
            Ok(Some(v)) => v,
            _ => {
                return Err(RepairError::MissingField {
                    name: ConfigKey::VDEV_TREE,
                })
            }
        };

        match vdev_tree.get_u64(ConfigKey::ASHIFT) {
            Ok(Some(ashift)) if ashift != 0 => Ok(ashift),
            _ => Err(RepairError::MissingField {
                name: ConfigKey::ASHIFT,
            }),
        }
    }
}

////////////////////////////////////////////////////////////////////////////////

/** Detects the [`EndianOrder`] of a label.
 *
 * Uses the configuration checksum tail magic when it is valid, then the
 * uberblock magic, and falls back to [`ENDIAN_ORDER_NATIVE`].
 *
 * A nonzero configuration magic that is not the marker in either order also
 * falls through to the uberblock magic, and the configuration section is
 * later rejected with [`RepairError::MissingChecksumMarker`], rather than
 * repaired in native order.
 */
pub(crate) fn detect_order(label: &[u8]) -> Result<EndianOrder, RepairError> {
    let tail = ChecksumTail::tail_bytes(LabelNvPairs::bytes(label)?)?;
    if let Ok(Some(order)) = ChecksumTail::magic_order(tail) {
        return Ok(order);
    }

    let uber_block = Label::uber_block(label, UberBlock::MIN_SHIFT)?;
    Ok(UberBlock::magic_order(uber_block).unwrap_or(ENDIAN_ORDER_NATIVE))
}

/// Reads a whole label at `offset`.
pub(crate) fn read_label<D: RepairDevice + ?Sized>(
    device: &mut D,
    offset: u64,
) -> Result<Vec<u8>, RepairError> {
    let mut label = vec![0; Label::SIZE];

    let actual = device
        .read_at(&mut label, offset)
        .map_err(|err| RepairError::Io {
            operation: "read label",
            offset,
            err,
        })?;

    if actual != label.len() {
        return Err(RepairError::ShortRead {
            offset,
            expected: label.len(),
            actual,
        });
    }

    Ok(label)
}

/** Repairs the label `index` at byte `offset` of the device.
 *
 * Errors are recorded in the returned [`LabelReport`], and never stop the
 * caller from repairing the next label.
 */
pub fn repair_label<D: RepairDevice + ?Sized>(
    device: &mut D,
    index: usize,
    offset: u64,
    sha256: &mut Sha256,
) -> LabelReport {
    let span = info_span!("label", label = index);
    let _guard = span.enter();

    let mut report = LabelReport::new(index, offset);

    if let Err(err) = repair_sections(device, &mut report, sha256) {
        report.reject(None, err);
    }

    report
}

/// Validates and patches the label, then repairs each section. Errors
/// returned from here reject the whole label.
fn repair_sections<D: RepairDevice + ?Sized>(
    device: &mut D,
    report: &mut LabelReport,
    sha256: &mut Sha256,
) -> Result<(), RepairError> {
    let offset = report.offset;
    let mut label = read_label(device, offset)?;

    ////////////////////////////////////
    // Validate.
    let mut config = LabelNvPairs::config(LabelNvPairs::bytes(&label)?)?;

    let order = detect_order(&label)?;
    let header = Label::uber_block(&label, UberBlock::MIN_SHIFT)?;
    let tail = ChecksumTail::tail_bytes(LabelNvPairs::bytes(&label)?)?;
    let vdev_phys_magic = u64::from_ne_bytes(ChecksumTail::magic_bytes(tail));
    let uber_block_magic = u64::from_ne_bytes(UberBlock::magic_bytes(header));
    info!(
        byteswap = order.is_swapped(),
        vdev_phys_magic = format_args!("{vdev_phys_magic:#x}"),
        uber_block_magic = format_args!("{uber_block_magic:#x}"),
        "detected {order} byte order",
    );

    let txg = UberBlock::txg(header, order)?;
    if txg != 0 {
        return Err(RepairError::UnexpectedTxg { txg });
    }

    let ashift = ConfigKey::required_ashift(&config)?;
    let birth = UberBlock::birth_txg(header, order)?;

    ////////////////////////////////////
    // Patch transaction group.
    if birth != 0 {
        UberBlock::set_txg(Label::uber_block_mut(&mut label, ashift)?, order, birth)?;

        config.remove_all(ConfigKey::CREATE_TXG);
        config.remove_all(ConfigKey::POOL_TXG);
        config.add_u64(ConfigKey::POOL_TXG, birth);

        info!("set txg to root block pointer birth {birth}");
    } else {
        debug!("root block pointer birth is zero, txg is not patched");
    }

    ////////////////////////////////////
    // Repack.
    let length = LabelNvPairs::set_config(LabelNvPairs::bytes_mut(&mut label)?, &config)?;
    debug!("packed nvlist into {length} bytes");

    ////////////////////////////////////
    // Uberblock.
    let section = LabelSection::UberBlock;
    let uber_block = Label::uber_block_mut(&mut label, ashift)?;
    let magic = ChecksumTail::magic_bytes(ChecksumTail::tail_bytes(uber_block)?);

    if magic != [0; 8] {
        report.reject(Some(section), RepairError::AlreadyFinalized { magic });
    } else {
        repair_section(device, report, section, uber_block, order, sha256);
    }

    ////////////////////////////////////
    // Configuration.
    let section = LabelSection::VdevPhys;
    let vdev_phys = LabelNvPairs::bytes_mut(&mut label)?;
    let tail = ChecksumTail::tail_bytes(vdev_phys)?;
    let magic = ChecksumTail::magic_bytes(tail);

    match ChecksumTail::magic_order(tail) {
        Ok(Some(_)) => repair_section(device, report, section, vdev_phys, order, sha256),
        _ => report.reject(Some(section), RepairError::MissingChecksumMarker { magic }),
    }

    Ok(())
}

/// Writes one section, and records its status.
fn repair_section<D: RepairDevice + ?Sized>(
    device: &mut D,
    report: &mut LabelReport,
    section: LabelSection,
    data: &mut [u8],
    order: EndianOrder,
    sha256: &mut Sha256,
) {
    let offset = report.offset + section.label_offset() as u64;

    match write_section(device, section, data, offset, order, sha256) {
        Ok(status) => report.set_status(section, status),
        Err(err) => {
            report.set_status(section, SectionStatus::Skipped);
            report.reject(Some(section), err);
        }
    }
}

////////////////////////////////////////////////////////////////////////////////
