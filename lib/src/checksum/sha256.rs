// SPDX-License-Identifier: GPL-2.0 OR MIT

/*! SHA-256 checksum.
 *
 * The digest is the standard big endian SHA-256 digest, split into four
 * [`u64`] words. SHA-256 operates on bytes, so the [`EndianOrder`] passed to
 * [`Checksum::reset`] does not change the result.
 */
use sha2::Digest;

use crate::checksum::{Checksum, ChecksumError};
use crate::phys::EndianOrder;

////////////////////////////////////////////////////////////////////////////////

/// SHA-256 [`Checksum`].
#[derive(Debug)]
pub struct Sha256 {
    /// [`None`] after [`Checksum::finalize`], until [`Checksum::reset`].
    hasher: Option<sha2::Sha256>,
}

impl Default for Sha256 {
    fn default() -> Self {
        Sha256::new()
    }
}

impl Sha256 {
    /// Create a new, reset [`Sha256`] instance.
    pub fn new() -> Sha256 {
        Sha256 {
            hasher: Some(sha2::Sha256::new()),
        }
    }

    fn hasher(&mut self) -> Result<&mut sha2::Sha256, ChecksumError> {
        self.hasher.as_mut().ok_or(ChecksumError::NotReset {
            implementation: "sha256",
        })
    }
}

impl Checksum for Sha256 {
    fn reset(&mut self, _order: EndianOrder) -> Result<(), ChecksumError> {
        self.hasher = Some(sha2::Sha256::new());
        Ok(())
    }

    fn update(&mut self, data: &[u8]) -> Result<(), ChecksumError> {
        self.hasher()?.update(data);
        Ok(())
    }

    fn finalize(&mut self) -> Result<[u64; 4], ChecksumError> {
        let hasher = self.hasher.take().ok_or(ChecksumError::NotReset {
            implementation: "sha256",
        })?;
        let digest = hasher.finalize();

        let mut words = [0; 4];
        for (word, chunk) in words.iter_mut().zip(digest.chunks_exact(8)) {
            let mut bytes = [0; 8];
            bytes.copy_from_slice(chunk);
            *word = u64::from_be_bytes(bytes);
        }

        Ok(words)
    }
}

////////////////////////////////////////////////////////////////////////////////

#[cfg(test)]
mod tests {

    use crate::checksum::{Checksum, ChecksumError, Sha256};
    use crate::phys::{EndianOrder, ENDIAN_ORDER_NATIVE, ENDIAN_ORDER_SWAP};

    #[test]
    fn empty_and_abc() -> Result<(), ChecksumError> {
        let mut h = Sha256::new();

        assert_eq!(
            h.hash(&[], EndianOrder::Little)?,
            [
                0xe3b0c44298fc1c14,
                0x9afbf4c8996fb924,
                0x27ae41e4649b934c,
                0xa495991b7852b855,
            ]
        );

        assert_eq!(
            h.hash(b"abc", EndianOrder::Big)?,
            [
                0xba7816bf8f01cfea,
                0x414140de5dae2223,
                0xb00361a396177a9c,
                0xb410ff61f20015ad,
            ]
        );

        Ok(())
    }

    /// Split updates match a single update, in either order.
    #[test]
    fn split_updates() -> Result<(), ChecksumError> {
        let data: Vec<u8> = (0..1000u32).map(|x| (x * 7) as u8).collect();
        let mut h = Sha256::new();

        let whole = h.hash(&data, ENDIAN_ORDER_NATIVE)?;

        h.reset(ENDIAN_ORDER_SWAP)?;
        for chunk in data.chunks(63) {
            h.update(chunk)?;
        }
        assert_eq!(h.finalize()?, whole);

        Ok(())
    }

    #[test]
    fn update_after_finalize() -> Result<(), ChecksumError> {
        let mut h = Sha256::new();
        h.update(b"a")?;
        h.finalize()?;

        assert!(matches!(h.update(b"b"), Err(ChecksumError::NotReset { .. })));
        assert!(matches!(h.finalize(), Err(ChecksumError::NotReset { .. })));

        h.reset(EndianOrder::Big)?;
        h.update(b"abc")?;
        assert_eq!(h.finalize()?[0], 0xba7816bf8f01cfea);

        Ok(())
    }
}
