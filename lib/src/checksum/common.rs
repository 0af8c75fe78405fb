// SPDX-License-Identifier: GPL-2.0 OR MIT

use crate::phys::EndianOrder;

/// [`Checksum`] error.
#[derive(Debug, thiserror::Error)]
pub enum ChecksumError {
    /// Checksum was finalized, and must be reset before it is used again.
    #[error("Checksum {implementation} used after finalize without reset")]
    NotReset {
        /// Implementation.
        implementation: &'static str,
    },
}

/** Checksum for on disk data integrity.
 */
pub trait Checksum {
    /** Reset the checksum to initial state to update bytes in [`EndianOrder`].
     *
     * # Errors
     *
     * Returns [`ChecksumError`] in case of error.
     */
    fn reset(&mut self, order: EndianOrder) -> Result<(), ChecksumError>;

    /** Update the checksum state with the given bytes.
     *
     * # Errors
     *
     * Returns [`ChecksumError`] if the checksum was finalized and not reset.
     */
    fn update(&mut self, data: &[u8]) -> Result<(), ChecksumError>;

    /** Finalize the checksum and return the result.
     *
     * Checksum is returned in native byte order.
     *
     * # Errors
     *
     * Returns [`ChecksumError`] if the checksum was finalized and not reset.
     */
    fn finalize(&mut self) -> Result<[u64; 4], ChecksumError>;

    /** Hash the bytes in [`EndianOrder`] and return the result.
     *
     * Checksum is returned in native byte order.
     *
     * # Errors
     *
     * Returns [`ChecksumError`] in case of error.
     */
    fn hash(&mut self, data: &[u8], order: EndianOrder) -> Result<[u64; 4], ChecksumError> {
        self.reset(order)?;
        self.update(data)?;
        self.finalize()
    }
}
