//! Toggle Core
//!
//! A [`Toggle`] is a partial predicate over an integer input: for every input it
//! is either undefined, or decides `true`/`false`. Undefined is distinct from
//! `false` so that layered toggle maps can fall through to the next source.

use sha2::{Digest, Sha256};
use std::fmt;
use std::sync::Arc;

type Decide = dyn Fn(i64) -> Option<bool> + Send + Sync;

/// Deterministic, possibly partial, yes/no decision over an `i64` input.
///
/// Cloning is cheap; clones share the underlying decision function.
#[derive(Clone)]
pub struct Toggle {
    id: Arc<str>,
    decide: Arc<Decide>,
}

impl Toggle {
    /// Create a toggle from a decision function.
    ///
    /// `None` means the toggle is not defined for that input.
    pub fn new<F>(id: &str, decide: F) -> Self
    where
        F: Fn(i64) -> Option<bool> + Send + Sync + 'static,
    {
        Self {
            id: Arc::from(id),
            decide: Arc::new(decide),
        }
    }

    /// Toggle that is defined and `true` for every input
    pub fn on(id: &str) -> Self {
        Self::new(id, |_| Some(true))
    }

    /// Toggle that is defined and `false` for every input
    pub fn off(id: &str) -> Self {
        Self::new(id, |_| Some(false))
    }

    /// Toggle that is not defined for any input
    pub fn undefined(id: &str) -> Self {
        Self::new(id, |_| None)
    }

    /// Toggle id
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Decision for `input`, or `None` when the toggle is undefined there.
    pub fn evaluate(&self, input: i64) -> Option<bool> {
        (self.decide)(input)
    }

    /// Whether the toggle has a decision for `input`.
    pub fn is_defined_at(&self, input: i64) -> bool {
        self.evaluate(input).is_some()
    }

    /// Decision for `input`, treating undefined as `false`.
    ///
    /// Use [`Toggle::evaluate`] when "undefined" and "off" must be told apart.
    pub fn apply(&self, input: i64) -> bool {
        self.evaluate(input).unwrap_or(false)
    }

    /// Combine with `other`, preferring `self` wherever it is defined.
    ///
    /// Precedence is decided per input: when `self` is undefined for a given
    /// input, `other` is consulted for that same input.
    ///
    /// # Examples
    ///
    /// ```
    /// use armature_toggle::Toggle;
    ///
    /// let toggle = Toggle::undefined("com.example").or_else(&Toggle::on("com.example"));
    /// assert_eq!(toggle.evaluate(7), Some(true));
    /// ```
    pub fn or_else(&self, other: &Toggle) -> Toggle {
        let first = self.clone();
        let second = other.clone();
        Self::new(&self.id, move |input| {
            first.evaluate(input).or_else(|| second.evaluate(input))
        })
    }
}

impl fmt::Debug for Toggle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Toggle").field("id", &self.id).finish()
    }
}

/// Build a toggle that decides `true` for roughly `fraction` of inputs.
///
/// `fraction` is expected to be validated by the caller. Every input is in the
/// toggle's domain; the decision for a given `(id, fraction, input)` never
/// changes.
///
/// # Examples
///
/// ```
/// use armature_toggle::fractional;
///
/// let toggle = fractional("com.example.new-algorithm", 0.25);
/// assert!(toggle.is_defined_at(42));
/// assert_eq!(toggle.apply(42), toggle.apply(42));
/// ```
pub fn fractional(id: &str, fraction: f64) -> Toggle {
    let seed = id_seed(id);
    Toggle::new(id, move |input| Some(bucket(seed, input) < fraction))
}

const GOLDEN_GAMMA: u64 = 0x9E37_79B9_7F4A_7C15;

/// Per-id hash seed: first 8 bytes of SHA-256(id), little-endian.
pub(crate) fn id_seed(id: &str) -> u64 {
    let digest = Sha256::digest(id.as_bytes());
    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(&digest[..8]);
    u64::from_le_bytes(bytes)
}

/// Map `(seed, input)` onto `[0.0, 1.0)`.
pub(crate) fn bucket(seed: u64, input: i64) -> f64 {
    let mixed = splitmix64(seed.wrapping_add((input as u64).wrapping_mul(GOLDEN_GAMMA)));
    // 53 high bits fill an f64 mantissa exactly, so the result is strictly below 1.0
    (mixed >> 11) as f64 * (1.0 / (1u64 << 53) as f64)
}

fn splitmix64(mut z: u64) -> u64 {
    z = z.wrapping_add(GOLDEN_GAMMA);
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    z ^ (z >> 31)
}
