// SPDX-License-Identifier: GPL-2.0 OR MIT

use std::io;

/** Device that labels are read from, and repaired sections written to.
 *
 * Offsets are in bytes from the start of the device.
 */
pub trait RepairDevice {
    /** Size of the device in bytes.
     *
     * # Errors
     *
     * Returns [`io::Error`] if the size cannot be determined.
     */
    fn size(&mut self) -> io::Result<u64>;

    /** Reads into `data` at `offset`, returning the number of bytes read.
     *
     * A count less than `data.len()` means the end of the device was
     * reached.
     *
     * # Errors
     *
     * Returns [`io::Error`] in case of error.
     */
    fn read_at(&mut self, data: &mut [u8], offset: u64) -> io::Result<usize>;

    /** Writes `data` at `offset`, returning the number of bytes written.
     *
     * # Errors
     *
     * Returns [`io::Error`] in case of error.
     */
    fn write_at(&mut self, data: &[u8], offset: u64) -> io::Result<usize>;

    /** Flushes written data to stable storage.
     *
     * # Errors
     *
     * Returns [`io::Error`] in case of error.
     */
    fn sync(&mut self) -> io::Result<()>;
}
