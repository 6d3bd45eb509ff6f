//! Streaming hash computation for pack files.
//!
//! Provides, in a single read pass:
//! - SHA1 (Modrinth pack index)
//! - SHA256 (GitHub release asset digests)
//! - SHA512 (Modrinth version file lookup)
//! - CurseForge fingerprint (MurmurHash2 over whitespace-stripped bytes)

use crate::error::{ExportError, Result};
use crate::models::{HashAlgorithm, LocalFile};
use sha1::Sha1;
use sha2::{Digest, Sha256, Sha512};
use std::io::Read;
use std::path::Path;

/// Chunk size for reading files.
const CHUNK_SIZE: usize = 1024 * 1024;

/// Seed CurseForge uses for file fingerprints.
const CURSEFORGE_SEED: u32 = 1;

/// Bytes CurseForge drops before fingerprinting.
const FINGERPRINT_WHITESPACE: [u8; 4] = [9, 10, 13, 32];

/// All digests computed for one file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileDigests {
    /// SHA1 hash as lowercase hex string
    pub sha1: String,
    /// SHA256 hash as lowercase hex string
    pub sha256: String,
    /// SHA512 hash as lowercase hex string
    pub sha512: String,
    /// CurseForge fingerprint
    pub murmur2: u32,
    pub size_bytes: u64,
}

impl FileDigests {
    /// Attach these digests to a descriptor.
    pub fn apply(&self, file: LocalFile) -> LocalFile {
        file.with_hash(HashAlgorithm::Sha1, self.sha1.clone())
            .with_hash(HashAlgorithm::Sha256, self.sha256.clone())
            .with_hash(HashAlgorithm::Sha512, self.sha512.clone())
            .with_hash(HashAlgorithm::Murmur2, self.murmur2.to_string())
    }
}

/// Compute every digest in a single pass over the file.
pub fn compute_file_digests(path: impl AsRef<Path>) -> Result<FileDigests> {
    let path = path.as_ref();
    let mut file = std::fs::File::open(path).map_err(|e| ExportError::io_with_path(e, path))?;

    let mut sha1_hasher = Sha1::new();
    let mut sha256_hasher = Sha256::new();
    let mut sha512_hasher = Sha512::new();
    let mut fingerprint_bytes = Vec::new();
    let mut size_bytes: u64 = 0;

    let mut buffer = vec![0u8; CHUNK_SIZE];
    loop {
        let bytes_read = file
            .read(&mut buffer)
            .map_err(|e| ExportError::io_with_path(e, path))?;
        if bytes_read == 0 {
            break;
        }

        let chunk = &buffer[..bytes_read];
        sha1_hasher.update(chunk);
        sha256_hasher.update(chunk);
        sha512_hasher.update(chunk);
        fingerprint_bytes.extend(
            chunk
                .iter()
                .copied()
                .filter(|b| !FINGERPRINT_WHITESPACE.contains(b)),
        );
        size_bytes += bytes_read as u64;
    }

    Ok(FileDigests {
        sha1: hex::encode(sha1_hasher.finalize()),
        sha256: hex::encode(sha256_hasher.finalize()),
        sha512: hex::encode(sha512_hasher.finalize()),
        murmur2: murmur2(&fingerprint_bytes, CURSEFORGE_SEED),
        size_bytes,
    })
}

/// CurseForge fingerprint of an in-memory buffer.
pub fn curseforge_fingerprint(bytes: &[u8]) -> u32 {
    let filtered: Vec<u8> = bytes
        .iter()
        .copied()
        .filter(|b| !FINGERPRINT_WHITESPACE.contains(b))
        .collect();
    murmur2(&filtered, CURSEFORGE_SEED)
}

/// 32-bit MurmurHash2.
pub fn murmur2(data: &[u8], seed: u32) -> u32 {
    const M: u32 = 0x5bd1_e995;
    const R: u32 = 24;

    let mut h = seed ^ (data.len() as u32);

    let mut chunks = data.chunks_exact(4);
    for chunk in &mut chunks {
        let mut k = u32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]);
        k = k.wrapping_mul(M);
        k ^= k >> R;
        k = k.wrapping_mul(M);
        h = h.wrapping_mul(M);
        h ^= k;
    }

    let tail = chunks.remainder();
    if !tail.is_empty() {
        if tail.len() >= 3 {
            h ^= u32::from(tail[2]) << 16;
        }
        if tail.len() >= 2 {
            h ^= u32::from(tail[1]) << 8;
        }
        h ^= u32::from(tail[0]);
        h = h.wrapping_mul(M);
    }

    h ^= h >> 13;
    h = h.wrapping_mul(M);
    h ^= h >> 15;
    h
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_murmur2_empty() {
        assert_eq!(murmur2(b"", 1), 0x5bd1_5e36);
    }

    #[test]
    fn test_fingerprint_ignores_whitespace() {
        assert_eq!(
            curseforge_fingerprint(b"hello world\r\n\tagain"),
            curseforge_fingerprint(b"helloworldagain")
        );
        assert_ne!(
            curseforge_fingerprint(b"hello"),
            curseforge_fingerprint(b"hellp")
        );
    }

    #[test]
    fn test_murmur2_tail_lengths_differ() {
        let values: Vec<u32> = (1..=7).map(|n| murmur2(&b"abcdefg"[..n], 1)).collect();
        for (i, a) in values.iter().enumerate() {
            for b in &values[i + 1..] {
                assert_ne!(a, b);
            }
        }
    }

    #[test]
    fn test_compute_file_digests() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(b"hello world").unwrap();

        let digests = compute_file_digests(file.path()).unwrap();
        assert_eq!(digests.sha1, "2aae6c35c94fcfb415dbe95f408b9ce91ee846ed");
        assert_eq!(
            digests.sha256,
            "b94d27b9934d3e08a52e52d7da7dabfac484efe37a5380ee9088f7ace2efcde9"
        );
        assert_eq!(digests.sha512.len(), 128);
        assert_eq!(digests.murmur2, curseforge_fingerprint(b"hello world"));
        assert_eq!(digests.size_bytes, 11);
    }

    #[test]
    fn test_apply_sets_all_algorithms() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(b"data").unwrap();
        let digests = compute_file_digests(file.path()).unwrap();

        let local = digests.apply(LocalFile::new("mods/x.jar", 4));
        assert!(local.hash(HashAlgorithm::Sha1).is_some());
        assert!(local.hash(HashAlgorithm::Sha256).is_some());
        assert!(local.hash(HashAlgorithm::Sha512).is_some());
        assert!(local.hash(HashAlgorithm::Murmur2).is_some());
        assert!(local.validate().is_ok());
    }

    #[test]
    fn test_missing_file() {
        let result = compute_file_digests("/nonexistent/file.jar");
        assert!(matches!(result, Err(ExportError::Io { .. })));
    }
}
