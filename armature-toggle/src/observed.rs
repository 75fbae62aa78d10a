//! Observable toggle maps
//!
//! [`Observed`] wraps a toggle map and exports a `checksum` gauge summarising
//! its current definitions, so that fleets can spot instances whose toggles
//! diverge without shipping the definitions themselves.

use crate::map::{MetadataIter, ToggleMap};
use crate::metadata::Metadata;
use crate::stats::{Gauge, StatsReceiver};
use crate::toggle::Toggle;
use sha2::{Digest, Sha256};
use std::sync::Arc;

/// Name of the gauge registered by [`Observed`]
pub const CHECKSUM_GAUGE: &str = "checksum";

/// Largest integer an `f32` holds exactly
const F32_EXACT_MASK: u32 = 0x00FF_FFFF;

/// Toggle map wrapper exporting a `checksum` gauge
pub struct Observed<M> {
    inner: Arc<M>,
    _checksum: Gauge,
}

impl<M: ToggleMap + 'static> Observed<M> {
    /// Wrap `inner`, registering the `checksum` gauge on `stats`.
    pub fn new(inner: M, stats: &dyn StatsReceiver) -> Self {
        let inner = Arc::new(inner);
        let source = Arc::clone(&inner);
        let gauge = stats.add_gauge(CHECKSUM_GAUGE, Box::new(move || checksum(source.iter())));

        Self {
            inner,
            _checksum: gauge,
        }
    }

    /// Wrapped map
    pub fn inner(&self) -> &M {
        &self.inner
    }
}

impl<M: ToggleMap> ToggleMap for Observed<M> {
    fn get(&self, id: &str) -> Toggle {
        self.inner.get(id)
    }

    fn iter(&self) -> MetadataIter {
        self.inner.iter()
    }
}

impl<M> std::fmt::Debug for Observed<M> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Observed").finish_non_exhaustive()
    }
}

/// Order-insensitive summary of a set of toggle definitions.
///
/// The empty set sums to `0.0`. Each entry contributes a SHA-256 derived hash
/// of its id and fraction; the wrapping sum is folded to 24 bits so the value
/// survives the trip through an `f32` gauge unchanged.
///
/// # Examples
///
/// ```
/// use armature_toggle::{Metadata, checksum};
///
/// let a = Metadata::new("a", 0.5, "test");
/// let b = Metadata::new("b", 1.0, "test");
///
/// assert_eq!(checksum(std::iter::empty()), 0.0);
/// assert_eq!(
///     checksum(vec![a.clone(), b.clone()]),
///     checksum(vec![b, a]),
/// );
/// ```
pub fn checksum(metadata: impl IntoIterator<Item = Metadata>) -> f32 {
    let sum = metadata
        .into_iter()
        .fold(0u64, |acc, md| acc.wrapping_add(entry_hash(&md)));
    let folded = ((sum >> 32) as u32) ^ (sum as u32);
    (folded & F32_EXACT_MASK) as f32
}

fn entry_hash(md: &Metadata) -> u64 {
    let mut hasher = Sha256::new();
    hasher.update(md.id.as_bytes());
    hasher.update(md.fraction.to_bits().to_le_bytes());
    let digest = hasher.finalize();

    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(&digest[..8]);
    u64::from_le_bytes(bytes)
}
