//! Structured Reference String (SRS)
//!
//! The SRS holds the G1 powers `[α⁰·G₁, α¹·G₁, …, α^{d}·G₁]` and the two G2
//! elements `[G₂, α·G₂]` used by the opening check. It is produced once and
//! only read afterwards; every prover and verifier entry point takes it by
//! shared reference.
//!
//! # Security
//!
//! Whoever knows α can forge openings for any commitment. Production systems
//! must load an SRS produced by a multi-party ceremony in which at least one
//! participant destroyed their contribution. [`Srs::new`] takes α explicitly
//! and performs no ceremony; it exists for tests, benchmarks and for
//! re-deriving parameters from a known secret. The `dev-srs` feature adds
//! [`Srs::new_dev`], whose α comes from a **public fixed seed**.
//!
//! # Validation layers
//!
//! 1. **Format**: ark-serialize canonical encoding (points are checked to be
//!    on-curve and in the prime-order subgroup on load).
//! 2. **Structure** ([`Srs::validate`]): at least two powers, generators in
//!    first position, `α·G₂` not the identity.
//! 3. **Algebra** ([`Srs::validate_pairing`]): one randomized pairing check
//!    that every consecutive pair of G1 powers differs by the same α as G2.
//! 4. **Digests**: compare [`Srs::g1_digest`] / [`Srs::g2_digest`] against the
//!    values published by the ceremony.

#![forbid(unsafe_code)]

use ark_bn254::{G1Affine, G1Projective, G2Affine, G2Projective};
use ark_ec::{AffineRepr, CurveGroup, Group, VariableBaseMSM};
use ark_ff::UniformRand;
use ark_serialize::{
    CanonicalDeserialize, CanonicalSerialize, Compress, Read, SerializationError, Valid, Validate,
};
use blake3::Hasher;
use rand::Rng;
use rayon::prelude::*;
use std::path::Path;

use crate::{kzg::pairing_check, F};

/// Smallest accepted SRS (`[G₁, α·G₁]`).
pub const MIN_SRS_SIZE: usize = 2;

/// Errors that can occur while creating, loading or validating an SRS.
#[derive(Debug, thiserror::Error)]
pub enum SrsError {
    /// Requested or loaded SRS is shorter than [`MIN_SRS_SIZE`].
    #[error("minimum SRS size is {MIN_SRS_SIZE} (got {0})")]
    MinSrsSize(usize),

    /// File I/O error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Malformed binary encoding.
    #[error("deserialization error: {0}")]
    Deserialize(String),

    /// Structural validation failed.
    #[error("SRS validation failed: {0}")]
    Validation(String),

    /// Pairing consistency check failed (corrupted or malicious SRS).
    #[error("pairing check failed: {0}")]
    PairingCheck(String),
}

/// KZG structured reference string.
///
/// Checked decoding (`deserialize_compressed` and friends) runs the same
/// structural checks as [`Srs::validate`].
#[derive(Debug, Clone, PartialEq, Eq, CanonicalSerialize)]
pub struct Srs {
    /// `[α^i]G₁` for `i ∈ 0..len`.
    pub g1: Vec<G1Affine>,
    /// G2 generator.
    pub g2_gen: G2Affine,
    /// `[α]G₂`.
    pub g2_alpha: G2Affine,
}

impl Srs {
    /// Build an SRS of `size` G1 powers from the secret `alpha`.
    ///
    /// The powers `α, α², …` are scaled in one parallel batch and normalized
    /// to affine with a single shared inversion.
    pub fn new(size: usize, alpha: F) -> Result<Self, SrsError> {
        if size < MIN_SRS_SIZE {
            return Err(SrsError::MinSrsSize(size));
        }

        let mut alphas = Vec::with_capacity(size - 1);
        let mut acc = alpha;
        for _ in 1..size {
            alphas.push(acc);
            acc *= alpha;
        }

        let gen1 = G1Projective::generator();
        let scaled: Vec<G1Projective> = alphas.par_iter().map(|a| gen1 * a).collect();

        let mut g1 = Vec::with_capacity(size);
        g1.push(G1Affine::generator());
        g1.extend(G1Projective::normalize_batch(&scaled));

        let g2_alpha = (G2Projective::generator() * alpha).into_affine();
        tracing::debug!(size, "generated SRS from explicit secret");

        Ok(Self { g1, g2_gen: G2Affine::generator(), g2_alpha })
    }

    /// Deterministic development SRS with a **publicly known** secret.
    ///
    /// Anyone can recompute α from the fixed seed and forge proofs. Never use
    /// this outside tests and local tooling.
    #[cfg(feature = "dev-srs")]
    pub fn new_dev(size: usize) -> Result<Self, SrsError> {
        use rand::{rngs::StdRng, SeedableRng};

        tracing::warn!(size, "generating DEVELOPMENT SRS: the secret is public, never use in production");
        let mut rng = StdRng::from_seed([42u8; 32]);
        let alpha = F::rand(&mut rng);
        Self::new(size, alpha)
    }

    /// Number of G1 powers (maximum polynomial length).
    #[inline]
    pub fn len(&self) -> usize {
        self.g1.len()
    }

    /// Always false for a validated SRS.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.g1.is_empty()
    }

    /// Maximum supported degree (`len − 1`).
    #[inline]
    pub fn max_degree(&self) -> usize {
        self.g1.len().saturating_sub(1)
    }

    /// Copy of the first `size` G1 powers with the same G2 elements.
    ///
    /// A verifier only reads `g1[0]`, so `truncated(2)` is a complete
    /// verifying key.
    pub fn truncated(&self, size: usize) -> Result<Self, SrsError> {
        if size < MIN_SRS_SIZE {
            return Err(SrsError::MinSrsSize(size));
        }
        if size > self.g1.len() {
            return Err(SrsError::Validation(format!(
                "cannot truncate an SRS of {} powers to {}",
                self.g1.len(),
                size
            )));
        }
        Ok(Self { g1: self.g1[..size].to_vec(), g2_gen: self.g2_gen, g2_alpha: self.g2_alpha })
    }

    /// Structural checks (length, generators, non-trivial `α·G₂`).
    pub fn validate(&self) -> Result<(), SrsError> {
        if self.g1.len() < MIN_SRS_SIZE {
            return Err(SrsError::MinSrsSize(self.g1.len()));
        }
        if self.g1[0] != G1Affine::generator() {
            return Err(SrsError::Validation(
                "first G1 element is not the generator (possible corruption or wrong curve)".into(),
            ));
        }
        if self.g2_gen != G2Affine::generator() {
            return Err(SrsError::Validation("first G2 element is not the generator".into()));
        }
        if self.g2_alpha.is_zero() {
            return Err(SrsError::Validation("α·G₂ is the point at infinity".into()));
        }
        Ok(())
    }

    /// Randomized pairing check of every consecutive pair of powers.
    ///
    /// With random `rᵢ`, checks `e(Σ rᵢ·g1[i+1], G₂) = e(Σ rᵢ·g1[i], α·G₂)`,
    /// which holds for all `i` at once except with negligible probability.
    pub fn validate_pairing<R: Rng + ?Sized>(&self, rng: &mut R) -> Result<(), SrsError> {
        self.validate()?;
        let n = self.g1.len() - 1;
        let rs: Vec<F> = (0..n).map(|_| F::rand(rng)).collect();

        let shifted = G1Projective::msm(&self.g1[1..], &rs)
            .map_err(|len| SrsError::Validation(format!("MSM length mismatch ({len})")))?;
        let base = G1Projective::msm(&self.g1[..n], &rs)
            .map_err(|len| SrsError::Validation(format!("MSM length mismatch ({len})")))?;

        let ok = pairing_check(
            &[shifted.into_affine(), (-base).into_affine()],
            &[self.g2_gen, self.g2_alpha],
        )
        .map_err(|e| SrsError::PairingCheck(e.to_string()))?;
        if !ok {
            return Err(SrsError::PairingCheck(
                "G1 powers are inconsistent with α·G₂".into(),
            ));
        }
        Ok(())
    }

    /// Stable digest of the G1 powers.
    pub fn g1_digest(&self) -> [u8; 32] {
        let mut bytes = Vec::with_capacity(8 + self.g1.len() * 32);
        bytes.extend_from_slice(&(self.g1.len() as u64).to_be_bytes());
        for p in &self.g1 {
            // writing into a Vec cannot fail
            let _ = p.serialize_compressed(&mut bytes);
        }
        hash_bytes(&[&bytes])
    }

    /// Stable digest of the two G2 elements.
    pub fn g2_digest(&self) -> [u8; 32] {
        let mut bytes = Vec::with_capacity(128);
        let _ = self.g2_gen.serialize_compressed(&mut bytes);
        let _ = self.g2_alpha.serialize_compressed(&mut bytes);
        hash_bytes(&[&bytes])
    }

    /// Encode (compressed) and validate-on-decode helpers.
    pub fn to_bytes(&self) -> Result<Vec<u8>, SrsError> {
        let mut bytes = Vec::with_capacity(self.compressed_size());
        self.serialize_compressed(&mut bytes)
            .map_err(|e| SrsError::Deserialize(format!("SRS serialize: {e}")))?;
        Ok(bytes)
    }

    /// Decode a compressed SRS and run the structural checks.
    pub fn from_bytes(mut bytes: &[u8]) -> Result<Self, SrsError> {
        // Unchecked decode so structural failures keep their typed error.
        let srs = Self::deserialize_compressed_unchecked(&mut bytes)
            .map_err(|e| SrsError::Deserialize(format!("SRS: {e}")))?;
        srs.check_points()
            .map_err(|e| SrsError::Deserialize(format!("SRS points: {e}")))?;
        srs.validate()?;
        Ok(srs)
    }

    // On-curve and subgroup membership of every point.
    fn check_points(&self) -> Result<(), SerializationError> {
        self.g1.check()?;
        self.g2_gen.check()?;
        self.g2_alpha.check()
    }

    /// Write the SRS to `path` in compressed ark-serialize format.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), SrsError> {
        std::fs::write(path.as_ref(), self.to_bytes()?)?;
        Ok(())
    }

    /// Load an SRS from `path`, requiring at least `min_size` G1 powers.
    pub fn load(path: impl AsRef<Path>, min_size: usize) -> Result<Self, SrsError> {
        let bytes = std::fs::read(path.as_ref())?;
        let srs = Self::from_bytes(&bytes)?;
        if srs.len() < min_size {
            return Err(SrsError::Validation(format!(
                "SRS has {} powers, need at least {} (file may be for a smaller circuit)",
                srs.len(),
                min_size
            )));
        }
        tracing::debug!(path = %path.as_ref().display(), size = srs.len(), "loaded SRS");
        Ok(srs)
    }
}

impl Valid for Srs {
    fn check(&self) -> Result<(), SerializationError> {
        self.check_points()?;
        self.validate().map_err(|_| SerializationError::InvalidData)
    }
}

impl CanonicalDeserialize for Srs {
    fn deserialize_with_mode<R: Read>(
        mut reader: R,
        compress: Compress,
        validate: Validate,
    ) -> Result<Self, SerializationError> {
        let g1 = Vec::<G1Affine>::deserialize_with_mode(&mut reader, compress, validate)?;
        let g2_gen = G2Affine::deserialize_with_mode(&mut reader, compress, validate)?;
        let g2_alpha = G2Affine::deserialize_with_mode(&mut reader, compress, validate)?;
        let srs = Self { g1, g2_gen, g2_alpha };
        // points were already checked above
        if let Validate::Yes = validate {
            srs.validate().map_err(|_| SerializationError::InvalidData)?;
        }
        Ok(srs)
    }
}

fn hash_bytes(parts: &[&[u8]]) -> [u8; 32] {
    let mut h = Hasher::new();
    h.update(b"tinykzg.SRS.v1");
    for p in parts {
        h.update(&((*p).len() as u64).to_be_bytes());
        h.update(p);
    }
    *h.finalize().as_bytes()
}
