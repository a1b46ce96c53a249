//! Fiat–Shamir transcript with declared challenges
//!
//! A transcript is created with the **ordered list of challenges** it will
//! produce. Data is bound to a named challenge; squeezing a challenge hashes
//! a clone of the prototype hasher over
//!
//! `DST || transcript label || challenge name || previous challenge || bindings`
//!
//! so every challenge is chained to the one before it. Items are
//! length-delimited to avoid concatenation ambiguities.
//!
//! Ordering rules are enforced, not assumed:
//! - binding to an undeclared challenge fails;
//! - binding to a challenge that was already squeezed fails;
//! - squeezing challenge `i` before challenge `i-1` fails.
//!
//! The hash function is a parameter ([`FsHasher`]); implementations are
//! provided for BLAKE3 (XOF, 64 bytes) and SHA-256 (32 bytes). The caller's
//! hasher is only ever cloned, so the same hasher state always yields the
//! same challenges.
//!
//! ```
//! use tinykzg::transcript::Transcript;
//!
//! let mut t1 = Transcript::new(blake3::Hasher::new(), "example", &["alpha", "beta"]);
//! t1.bind("alpha", b"data").unwrap();
//! let a1 = t1.squeeze("alpha").unwrap();
//!
//! let mut t2 = Transcript::new(blake3::Hasher::new(), "example", &["alpha", "beta"]);
//! t2.bind("alpha", b"data").unwrap();
//! assert_eq!(a1, t2.squeeze("alpha").unwrap());
//!
//! // `alpha` is fixed now; late bindings are rejected.
//! assert!(t2.bind("alpha", b"more").is_err());
//! ```

#![forbid(unsafe_code)]

use ark_ff::PrimeField;
use ark_serialize::{CanonicalSerialize, SerializationError};

use crate::{kzg::Digest, F};

const TRANSCRIPT_DST: &[u8] = b"tinykzg.transcript.v1";

/// Canonical labels used by the protocols in this crate.
///
/// These strings are part of the transcript's domain separation; renaming
/// one changes every derived challenge.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FsLabel {
    /// Transcript label of the single-point batch opening.
    BatchOpening,
    /// Folding challenge γ of the single-point batch opening.
    Gamma,
}

impl FsLabel {
    #[inline]
    pub fn as_str(&self) -> &'static str {
        match self {
            FsLabel::BatchOpening => "tinykzg.kzg.batch_opening",
            FsLabel::Gamma => "gamma",
        }
    }
}

/// Hash primitive driving a [`Transcript`].
pub trait FsHasher: Clone + Send + Sync {
    /// Feed bytes into the running state.
    fn absorb(&mut self, bytes: &[u8]);
    /// Consume the state and produce challenge bytes.
    fn squeeze_bytes(self) -> Vec<u8>;
}

impl FsHasher for blake3::Hasher {
    fn absorb(&mut self, bytes: &[u8]) {
        blake3::Hasher::update(self, bytes);
    }

    fn squeeze_bytes(self) -> Vec<u8> {
        // 64 bytes so the reduction mod r is statistically uniform.
        let mut out = vec![0u8; 64];
        let mut xof = self.finalize_xof();
        xof.fill(&mut out);
        out
    }
}

impl FsHasher for sha2::Sha256 {
    fn absorb(&mut self, bytes: &[u8]) {
        sha2::Digest::update(self, bytes);
    }

    fn squeeze_bytes(self) -> Vec<u8> {
        sha2::Digest::finalize(self).to_vec()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum TranscriptError {
    #[error("challenge `{0}` was not declared for this transcript")]
    UnknownChallenge(String),
    #[error("challenge `{0}` is already computed; it cannot take more bindings")]
    ChallengeAlreadyComputed(String),
    #[error("challenge `{0}` requested before the previous challenge was computed")]
    PreviousChallengeNotComputed(String),
    #[error("failed to encode transcript item: {0}")]
    Encoding(#[from] SerializationError),
}

#[derive(Debug, Clone)]
struct Challenge {
    name: String,
    bindings: Vec<u8>,
    value: Option<Vec<u8>>,
}

/// Fiat–Shamir transcript over hasher `H` (BLAKE3 by default).
#[derive(Debug, Clone)]
pub struct Transcript<H: FsHasher = blake3::Hasher> {
    hasher: H,
    label: String,
    challenges: Vec<Challenge>,
}

impl<H: FsHasher> Transcript<H> {
    /// New transcript producing `challenges` in the given order.
    pub fn new(hasher: H, label: &str, challenges: &[&str]) -> Self {
        let challenges = challenges
            .iter()
            .map(|name| Challenge { name: (*name).to_owned(), bindings: Vec::new(), value: None })
            .collect();
        Self { hasher, label: label.to_owned(), challenges }
    }

    fn position(&self, challenge: &str) -> Result<usize, TranscriptError> {
        self.challenges
            .iter()
            .position(|c| c.name == challenge)
            .ok_or_else(|| TranscriptError::UnknownChallenge(challenge.to_owned()))
    }

    /// Bind `bytes` to `challenge` (length-delimited).
    pub fn bind(&mut self, challenge: &str, bytes: &[u8]) -> Result<(), TranscriptError> {
        let idx = self.position(challenge)?;
        let c = &mut self.challenges[idx];
        if c.value.is_some() {
            return Err(TranscriptError::ChallengeAlreadyComputed(challenge.to_owned()));
        }
        c.bindings.extend_from_slice(b"item:");
        c.bindings.extend_from_slice(&(bytes.len() as u64).to_be_bytes());
        c.bindings.extend_from_slice(bytes);
        Ok(())
    }

    /// Bind a field element (compressed canonical encoding).
    pub fn bind_scalar(&mut self, challenge: &str, x: &F) -> Result<(), TranscriptError> {
        let mut bytes = Vec::with_capacity(32);
        x.serialize_compressed(&mut bytes)?;
        self.bind(challenge, &bytes)
    }

    /// Bind a commitment (compressed G1 encoding).
    pub fn bind_digest(&mut self, challenge: &str, d: &Digest) -> Result<(), TranscriptError> {
        let mut bytes = Vec::with_capacity(32);
        d.0.serialize_compressed(&mut bytes)?;
        self.bind(challenge, &bytes)
    }

    /// Compute (or return the cached) raw bytes of `challenge`.
    pub fn squeeze_bytes(&mut self, challenge: &str) -> Result<Vec<u8>, TranscriptError> {
        let idx = self.position(challenge)?;
        if let Some(v) = &self.challenges[idx].value {
            return Ok(v.clone());
        }

        let mut h = self.hasher.clone();
        h.absorb(TRANSCRIPT_DST);
        h.absorb(&(self.label.len() as u64).to_be_bytes());
        h.absorb(self.label.as_bytes());
        h.absorb(b":challenge:");
        h.absorb(challenge.as_bytes());
        if idx > 0 {
            match &self.challenges[idx - 1].value {
                Some(prev) => h.absorb(prev),
                None => {
                    return Err(TranscriptError::PreviousChallengeNotComputed(
                        challenge.to_owned(),
                    ))
                }
            }
        }
        h.absorb(&self.challenges[idx].bindings);

        let out = h.squeeze_bytes();
        self.challenges[idx].value = Some(out.clone());
        Ok(out)
    }

    /// Compute `challenge` reduced to a field element.
    pub fn squeeze(&mut self, challenge: &str) -> Result<F, TranscriptError> {
        let bytes = self.squeeze_bytes(challenge)?;
        Ok(F::from_le_bytes_mod_order(&bytes))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fresh() -> Transcript {
        Transcript::new(blake3::Hasher::new(), "test", &["alpha", "beta"])
    }

    #[test]
    fn same_schedule_same_challenges() {
        let mut t1 = fresh();
        let mut t2 = fresh();
        for t in [&mut t1, &mut t2] {
            t.bind("alpha", b"a").unwrap();
            t.bind_scalar("beta", &F::from(7u64)).unwrap();
        }
        assert_eq!(t1.squeeze("alpha").unwrap(), t2.squeeze("alpha").unwrap());
        assert_eq!(t1.squeeze("beta").unwrap(), t2.squeeze("beta").unwrap());
        // cached
        assert_eq!(t1.squeeze("beta").unwrap(), t2.squeeze("beta").unwrap());
    }

    #[test]
    fn bindings_and_labels_separate_challenges() {
        let mut base = fresh();
        base.bind("alpha", b"ab").unwrap();
        let a = base.squeeze("alpha").unwrap();

        // Split item: length delimiting makes "a"+"b" differ from "ab".
        let mut split = fresh();
        split.bind("alpha", b"a").unwrap();
        split.bind("alpha", b"b").unwrap();
        assert_ne!(a, split.squeeze("alpha").unwrap());

        let mut other = Transcript::new(blake3::Hasher::new(), "other", &["alpha"]);
        other.bind("alpha", b"ab").unwrap();
        assert_ne!(a, other.squeeze("alpha").unwrap());
    }

    #[test]
    fn challenges_are_chained() {
        let mut t1 = fresh();
        t1.bind("alpha", b"x").unwrap();
        t1.squeeze("alpha").unwrap();
        let b1 = t1.squeeze("beta").unwrap();

        let mut t2 = fresh();
        t2.bind("alpha", b"y").unwrap();
        t2.squeeze("alpha").unwrap();
        assert_ne!(b1, t2.squeeze("beta").unwrap());
    }

    #[test]
    fn ordering_rules_are_enforced() {
        let mut t = fresh();
        assert!(matches!(t.bind("gamma", b"x"), Err(TranscriptError::UnknownChallenge(_))));
        assert!(matches!(
            t.squeeze("beta"),
            Err(TranscriptError::PreviousChallengeNotComputed(_))
        ));
        t.squeeze("alpha").unwrap();
        assert!(matches!(
            t.bind("alpha", b"late"),
            Err(TranscriptError::ChallengeAlreadyComputed(_))
        ));
        assert!(t.bind("beta", b"fine").is_ok());
    }

    #[test]
    fn sha256_backend_works() {
        let mut t = Transcript::new(sha2::Sha256::default(), "test", &["alpha"]);
        t.bind("alpha", b"a").unwrap();
        assert_eq!(t.squeeze_bytes("alpha").unwrap().len(), 32);

        let mut b = fresh();
        b.bind("alpha", b"a").unwrap();
        assert_eq!(b.squeeze_bytes("alpha").unwrap().len(), 64);
    }

    #[test]
    fn blake3_squeeze_is_the_xof_prefix() {
        let mut h = blake3::Hasher::new();
        FsHasher::absorb(&mut h, b"tinykzg");
        let mut expect = [0u8; 64];
        h.finalize_xof().fill(&mut expect);
        assert_eq!(FsHasher::squeeze_bytes(h.clone()), expect.to_vec());
        assert!(expect[32..].iter().any(|&b| b != 0));
    }
}
