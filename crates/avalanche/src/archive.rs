//! Pre-Cortina timestamp archive.
//!
//! Vertex-era X-chain transactions carry no on-chain timestamp, and the
//! node's own acceptance time is local to that node. The archive is a static
//! sorted table of `(hash prefix, timestamp delta)` tuples built offline from
//! the real network history.
//!
//! Layout: `"PXAR"` magic, `u8` version, `u8` prefix_len, `u32 BE` count,
//! `u64 BE` base_ts, then `count × (prefix_len bytes ‖ varint delta)`. The
//! prefix length is chosen collision-free at build time, so lookups have no
//! false positives within the archived set.

use std::path::Path;

use serac_core::UnixTime;

use crate::ChainError;

pub const MAGIC: &[u8; 4] = b"PXAR";
pub const VERSION: u8 = 1;

pub const MIN_PREFIX_LEN: usize = 3;
pub const MAX_PREFIX_LEN: usize = 8;

#[derive(Debug, thiserror::Error)]
pub enum ArchiveError {
    #[error("bad magic")]
    BadMagic,

    #[error("unsupported version {0}")]
    UnsupportedVersion(u8),

    #[error("truncated archive")]
    Truncated,

    #[error("prefix length {0} out of range")]
    BadPrefixLen(u8),

    #[error("no collision-free prefix length in {MIN_PREFIX_LEN}..={MAX_PREFIX_LEN}")]
    Unbuildable,

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<ArchiveError> for ChainError {
    fn from(value: ArchiveError) -> Self {
        ChainError::Decoding(value.to_string())
    }
}

/// The loaded archive: sorted prefixes with absolute timestamps.
#[derive(Debug, Clone)]
pub struct TimestampArchive {
    prefix_len: usize,
    entries: Vec<(Vec<u8>, UnixTime)>,
}

impl TimestampArchive {
    pub fn load_file(path: &Path) -> Result<Self, ArchiveError> {
        let raw = std::fs::read(path)?;
        Self::parse(&raw)
    }

    pub fn parse(raw: &[u8]) -> Result<Self, ArchiveError> {
        if raw.len() < 4 + 1 + 1 + 4 + 8 {
            return Err(ArchiveError::Truncated);
        }

        if &raw[..4] != MAGIC {
            return Err(ArchiveError::BadMagic);
        }

        let version = raw[4];
        if version != VERSION {
            return Err(ArchiveError::UnsupportedVersion(version));
        }

        let prefix_len = raw[5] as usize;
        if !(MIN_PREFIX_LEN..=MAX_PREFIX_LEN).contains(&prefix_len) {
            return Err(ArchiveError::BadPrefixLen(raw[5]));
        }

        let count = u32::from_be_bytes(raw[6..10].try_into().map_err(|_| ArchiveError::Truncated)?);
        let base_ts =
            u64::from_be_bytes(raw[10..18].try_into().map_err(|_| ArchiveError::Truncated)?);

        let mut pos = 18;
        let mut entries = Vec::with_capacity(count as usize);

        for _ in 0..count {
            if pos + prefix_len > raw.len() {
                return Err(ArchiveError::Truncated);
            }
            let prefix = raw[pos..pos + prefix_len].to_vec();
            pos += prefix_len;

            let (delta, used) = read_varint(&raw[pos..]).ok_or(ArchiveError::Truncated)?;
            pos += used;

            entries.push((prefix, base_ts + delta));
        }

        if pos != raw.len() {
            return Err(ArchiveError::Truncated);
        }

        Ok(Self { prefix_len, entries })
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// O(log n) exact-prefix lookup for a full 32-byte tx hash.
    pub fn lookup(&self, full_hash: &[u8; 32]) -> Option<UnixTime> {
        let needle = &full_hash[..self.prefix_len];

        self.entries
            .binary_search_by(|(prefix, _)| prefix.as_slice().cmp(needle))
            .ok()
            .map(|idx| self.entries[idx].1)
    }

    /// Build the serialized archive from `(hash, timestamp)` pairs, choosing
    /// the shortest collision-free prefix length.
    pub fn build(pairs: &[([u8; 32], UnixTime)]) -> Result<Vec<u8>, ArchiveError> {
        let prefix_len = (MIN_PREFIX_LEN..=MAX_PREFIX_LEN)
            .find(|len| {
                let mut prefixes: Vec<&[u8]> = pairs.iter().map(|(h, _)| &h[..*len]).collect();
                prefixes.sort_unstable();
                prefixes.windows(2).all(|w| w[0] != w[1])
            })
            .ok_or(ArchiveError::Unbuildable)?;

        let base_ts = pairs.iter().map(|(_, ts)| *ts).min().unwrap_or_default();

        let mut sorted: Vec<(&[u8], UnixTime)> =
            pairs.iter().map(|(h, ts)| (&h[..prefix_len], *ts)).collect();
        sorted.sort_unstable_by(|a, b| a.0.cmp(b.0));

        let mut buf = Vec::with_capacity(18 + sorted.len() * (prefix_len + 2));
        buf.extend_from_slice(MAGIC);
        buf.push(VERSION);
        buf.push(prefix_len as u8);
        buf.extend_from_slice(&(sorted.len() as u32).to_be_bytes());
        buf.extend_from_slice(&base_ts.to_be_bytes());

        for (prefix, ts) in sorted {
            buf.extend_from_slice(prefix);
            write_varint(&mut buf, ts - base_ts);
        }

        Ok(buf)
    }
}

fn write_varint(buf: &mut Vec<u8>, mut value: u64) {
    loop {
        let byte = (value & 0x7f) as u8;
        value >>= 7;
        if value == 0 {
            buf.push(byte);
            return;
        }
        buf.push(byte | 0x80);
    }
}

fn read_varint(raw: &[u8]) -> Option<(u64, usize)> {
    let mut value = 0u64;
    let mut shift = 0u32;

    for (used, byte) in raw.iter().enumerate() {
        if shift >= 64 {
            return None;
        }
        value |= ((byte & 0x7f) as u64) << shift;
        if byte & 0x80 == 0 {
            return Some((value, used + 1));
        }
        shift += 7;
    }

    None
}
