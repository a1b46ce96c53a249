//! KZG commitments on BN254: commit, open, verify, and batched variants
//!
//! - **Commit**: one MSM of the coefficients against `srs.g1[..len]`. Under a
//!   [`ConcurrencyPolicy`] the MSM either runs inside a bounded pool, or (on
//!   wide machines, no limiter) as two halves joined by a group addition. Both
//!   paths yield the same affine point.
//! - **Open**: `h = (f − f(z)) / (X − z)` by synthetic division over the
//!   coefficient buffer, committed as `H`.
//! - **Verify**: one two-pair pairing check
//!   `e(C − [v]G₁, G₂) · e(−H, [α − z]G₂) = 1`.
//! - **Single-point batch**: polynomials are folded with powers of a
//!   transcript challenge γ bound to the point and every digest; the verifier
//!   recomputes γ and folds digests and claimed values the same way.
//! - **Multi-point batch**: verifier-local random coefficients (first one
//!   fixed to 1) fold `m` independent proofs into a single two-pair check.
//!   The coefficients are drawn after the proofs are fixed and never leave
//!   the verifier.

#![forbid(unsafe_code)]

use ark_bn254::{Bn254, G1Affine, G1Projective, G2Affine};
use ark_ec::{pairing::Pairing, AffineRepr, CurveGroup, VariableBaseMSM};
use ark_ff::{One, UniformRand, Zero};
use ark_serialize::{CanonicalDeserialize, CanonicalSerialize};
use rand::{CryptoRng, Rng};
use rayon::prelude::*;
use tracing::debug;

use crate::domain::{powers_of, Domain};
use crate::parallel::{ConcurrencyPolicy, CpuLimiter};
use crate::polynomial::eval;
use crate::srs::Srs;
use crate::transcript::{FsHasher, FsLabel, Transcript, TranscriptError};
use crate::F;

/// Commitment to a polynomial (a G1 point).
#[derive(Debug, Clone, Copy, PartialEq, Eq, CanonicalSerialize, CanonicalDeserialize)]
pub struct Digest(pub G1Affine);

impl Default for Digest {
    fn default() -> Self {
        Digest(G1Affine::zero())
    }
}

/// Opening of one polynomial at one point.
#[derive(Debug, Clone, PartialEq, Eq, CanonicalSerialize, CanonicalDeserialize)]
pub struct OpeningProof {
    /// Commitment to the quotient `(f − f(z)) / (X − z)`.
    pub h: Digest,
    /// Evaluation point `z`.
    pub point: F,
    /// Claimed value `f(z)`.
    pub claimed_value: F,
}

/// Opening of several polynomials at one shared point.
#[derive(Debug, Clone, PartialEq, Eq, CanonicalSerialize, CanonicalDeserialize)]
pub struct BatchOpeningProof {
    /// Commitment to the quotient of the γ-folded polynomial.
    pub h: Digest,
    pub point: F,
    /// Individual (unfolded) values `f_i(z)`, in input order.
    pub claimed_values: Vec<F>,
}

#[derive(Debug, thiserror::Error)]
pub enum KzgError {
    #[error("invalid number of digests ({digests}) for {expected} polynomials/values")]
    InvalidNbDigests { expected: usize, digests: usize },
    #[error("invalid polynomial size (len={len}, srs supports 1..={max})")]
    InvalidPolynomialSize { len: usize, max: usize },
    #[error("domain cardinality {domain} is smaller than polynomial length {len}")]
    InvalidDomain { domain: usize, len: usize },
    #[error("SRS has no G1 powers")]
    EmptySrs,
    #[error("can't verify opening proof")]
    VerifyOpeningProof,
    #[error("pairing computation failed")]
    Pairing,
    #[error("multi-scalar multiplication length mismatch ({0})")]
    Msm(usize),
    #[error(transparent)]
    Transcript(#[from] TranscriptError),
}

/// Whether `Π e(g1[i], g2[i]) = 1`.
pub fn pairing_check(g1: &[G1Affine], g2: &[G2Affine]) -> Result<bool, KzgError> {
    if g1.len() != g2.len() {
        return Err(KzgError::InvalidNbDigests { expected: g2.len(), digests: g1.len() });
    }
    let mlo = Bn254::multi_miller_loop(g1.iter().copied(), g2.iter().copied());
    let fe = Bn254::final_exponentiation(mlo).ok_or(KzgError::Pairing)?;
    Ok(fe.0.is_one())
}

#[inline]
fn msm(bases: &[G1Affine], scalars: &[F]) -> Result<G1Projective, KzgError> {
    G1Projective::msm(bases, scalars).map_err(KzgError::Msm)
}

fn check_size(len: usize, srs: &Srs) -> Result<(), KzgError> {
    if len == 0 || len > srs.g1.len() {
        return Err(KzgError::InvalidPolynomialSize { len, max: srs.g1.len() });
    }
    Ok(())
}

fn check_opening(len: usize, domain: &Domain, srs: &Srs) -> Result<(), KzgError> {
    check_size(len, srs)?;
    if domain.cardinality < len {
        return Err(KzgError::InvalidDomain { domain: domain.cardinality, len });
    }
    Ok(())
}

/// Commit to `p` (coefficients, low→high).
///
/// With a limiter the MSM runs inside it; without one the policy comes from
/// [`ConcurrencyPolicy::detect`].
pub fn commit(p: &[F], srs: &Srs, limiter: Option<&CpuLimiter>) -> Result<Digest, KzgError> {
    let policy = match limiter {
        Some(l) => ConcurrencyPolicy::limited(l.clone()),
        None => ConcurrencyPolicy::detect(),
    };
    commit_with_policy(p, srs, &policy)
}

/// Commit to `p` under an explicit concurrency policy.
pub fn commit_with_policy(
    p: &[F],
    srs: &Srs,
    policy: &ConcurrencyPolicy,
) -> Result<Digest, KzgError> {
    check_size(p.len(), srs)?;
    let bases = &srs.g1[..p.len()];

    let acc = if let Some(limiter) = &policy.limiter {
        limiter.install(|| msm(bases, p))?
    } else if policy.should_split(p.len()) {
        let mid = p.len() / 2;
        debug!(len = p.len(), available = policy.available, "commit: split msm");
        let (lo, hi) = rayon::join(
            || msm(&bases[..mid], &p[..mid]),
            || msm(&bases[mid..], &p[mid..]),
        );
        lo? + hi?
    } else {
        msm(bases, p)?
    };
    Ok(Digest(acc.into_affine()))
}

// A constant polynomial has an empty quotient, committed as the identity.
fn commit_quotient(h: &[F], srs: &Srs) -> Result<Digest, KzgError> {
    if h.is_empty() {
        return Ok(Digest::default());
    }
    check_size(h.len(), srs)?;
    Ok(Digest(msm(&srs.g1[..h.len()], h)?.into_affine()))
}

/// `f ← (f − fa) / (X − a)` in place; the buffer shrinks by one.
fn divide_by_x_minus_a(f: &mut Vec<F>, fa: F, a: F) {
    if f.is_empty() {
        return;
    }
    f[0] -= fa;
    for i in (0..f.len() - 1).rev() {
        let carry = f[i + 1] * a;
        f[i] += carry;
    }
    // f[0] is now the remainder, which is zero.
    f.remove(0);
}

/// Open `p` at `point`.
pub fn open(p: &[F], point: F, domain: &Domain, srs: &Srs) -> Result<OpeningProof, KzgError> {
    check_opening(p.len(), domain, srs)?;

    let claimed_value = eval(p, point);
    let mut quotient = p.to_vec();
    divide_by_x_minus_a(&mut quotient, claimed_value, point);
    let h = commit_quotient(&quotient, srs)?;

    Ok(OpeningProof { h, point, claimed_value })
}

// `[1]G₁` as committed to by this SRS.
#[inline]
fn g1_base(srs: &Srs) -> Result<G1Affine, KzgError> {
    srs.g1.first().copied().ok_or(KzgError::EmptySrs)
}

/// Check `proof` against `commitment`.
pub fn verify(commitment: &Digest, proof: &OpeningProof, srs: &Srs) -> Result<(), KzgError> {
    let g1 = g1_base(srs)?;

    // C − [v]G₁
    let lhs = (commitment.0.into_group() - g1 * proof.claimed_value).into_affine();
    // [α − z]G₂
    let shifted = (srs.g2_alpha.into_group() - srs.g2_gen * proof.point).into_affine();

    if pairing_check(&[lhs, -proof.h.0], &[srs.g2_gen, shifted])? {
        Ok(())
    } else {
        Err(KzgError::VerifyOpeningProof)
    }
}

// γ = H(label, point, digests...).
fn derive_gamma<H: FsHasher>(point: F, digests: &[Digest], hasher: &H) -> Result<F, KzgError> {
    let gamma = FsLabel::Gamma.as_str();
    let mut t = Transcript::new(hasher.clone(), FsLabel::BatchOpening.as_str(), &[gamma]);
    t.bind_scalar(gamma, &point)?;
    for d in digests {
        t.bind_digest(gamma, d)?;
    }
    Ok(t.squeeze(gamma)?)
}

// Σ γ^i · p_i, coefficient-wise.
fn fold_polynomials<P: AsRef<[F]> + Sync>(polys: &[P], gamma: F) -> Vec<F> {
    let max_len = polys.iter().map(|p| p.as_ref().len()).max().unwrap_or(0);
    let mut acc = vec![F::zero(); max_len];
    let mut factor = F::one();
    for (i, p) in polys.iter().enumerate() {
        let p = p.as_ref();
        if i == 0 {
            acc[..p.len()].copy_from_slice(p);
        } else {
            acc[..p.len()]
                .par_iter_mut()
                .zip(p.par_iter())
                .for_each(|(a, c)| *a += *c * factor);
        }
        factor *= gamma;
    }
    acc
}

/// Open every polynomial of `polys` at the shared `point`.
///
/// `digests[i]` must be the commitment of `polys[i]`; they are bound into the
/// folding challenge together with `point`.
pub fn batch_open_single_point<P, H>(
    polys: &[P],
    digests: &[Digest],
    point: F,
    hasher: &H,
    domain: &Domain,
    srs: &Srs,
) -> Result<BatchOpeningProof, KzgError>
where
    P: AsRef<[F]> + Sync,
    H: FsHasher,
{
    if polys.is_empty() || polys.len() != digests.len() {
        return Err(KzgError::InvalidNbDigests { expected: polys.len(), digests: digests.len() });
    }
    for p in polys {
        check_opening(p.as_ref().len(), domain, srs)?;
    }

    let gamma = derive_gamma(point, digests, hasher)?;
    debug!(polys = polys.len(), "batch opening at a single point");

    let ((claimed_values, folded_value), mut folded) = rayon::join(
        || {
            let values: Vec<F> = polys.par_iter().map(|p| eval(p.as_ref(), point)).collect();
            let folded = values.iter().rev().fold(F::zero(), |acc, v| acc * gamma + v);
            (values, folded)
        },
        || fold_polynomials(polys, gamma),
    );

    divide_by_x_minus_a(&mut folded, folded_value, point);
    let h = commit_quotient(&folded, srs)?;

    Ok(BatchOpeningProof { h, point, claimed_values })
}

// (Σ factors_i · digests_i, Σ factors_i · evals_i)
fn fold(digests: &[Digest], evals: &[F], factors: &[F]) -> Result<(Digest, F), KzgError> {
    let bases: Vec<G1Affine> = digests.iter().map(|d| d.0).collect();
    let folded = msm(&bases, factors)?;
    let value = evals.iter().zip(factors).map(|(e, f)| *e * f).sum::<F>();
    Ok((Digest(folded.into_affine()), value))
}

/// Collapse a single-point batch proof into one opening of one folded digest.
pub fn fold_proof<H: FsHasher>(
    digests: &[Digest],
    proof: &BatchOpeningProof,
    hasher: &H,
) -> Result<(OpeningProof, Digest), KzgError> {
    if digests.is_empty() || digests.len() != proof.claimed_values.len() {
        return Err(KzgError::InvalidNbDigests {
            expected: proof.claimed_values.len(),
            digests: digests.len(),
        });
    }

    let gamma = derive_gamma(proof.point, digests, hasher)?;
    let gammas = powers_of(gamma, digests.len());
    let (folded_digest, claimed_value) = fold(digests, &proof.claimed_values, &gammas)?;

    Ok((OpeningProof { h: proof.h, point: proof.point, claimed_value }, folded_digest))
}

/// Verify a single-point batch proof.
pub fn batch_verify_single_point<H: FsHasher>(
    digests: &[Digest],
    proof: &BatchOpeningProof,
    hasher: &H,
    srs: &Srs,
) -> Result<(), KzgError> {
    let (folded_proof, folded_digest) = fold_proof(digests, proof, hasher)?;
    verify(&folded_digest, &folded_proof, srs)
}

/// Verify `proofs[i]` against `digests[i]` for all `i`, with thread-local randomness.
pub fn batch_verify_multi_points(
    digests: &[Digest],
    proofs: &[OpeningProof],
    srs: &Srs,
) -> Result<(), KzgError> {
    batch_verify_multi_points_with_rng(digests, proofs, srs, &mut rand::thread_rng())
}

/// [`batch_verify_multi_points`] drawing the folding coefficients from `rng`.
pub fn batch_verify_multi_points_with_rng<R: Rng + CryptoRng + ?Sized>(
    digests: &[Digest],
    proofs: &[OpeningProof],
    srs: &Srs,
    rng: &mut R,
) -> Result<(), KzgError> {
    if digests.is_empty() || digests.len() != proofs.len() {
        return Err(KzgError::InvalidNbDigests { expected: proofs.len(), digests: digests.len() });
    }
    if digests.len() == 1 {
        return verify(&digests[0], &proofs[0], srs);
    }
    debug!(proofs = proofs.len(), "batch verify at multiple points");

    // r_0 = 1: scaling the whole identity by a constant keeps it valid.
    let mut random = Vec::with_capacity(proofs.len());
    random.push(F::one());
    random.extend((1..proofs.len()).map(|_| F::rand(rng)));

    let quotients: Vec<G1Affine> = proofs.iter().map(|p| p.h.0).collect();
    let folded_quotients = msm(&quotients, &random)?;

    let evals: Vec<F> = proofs.iter().map(|p| p.claimed_value).collect();
    let (folded_digest, folded_eval) = fold(digests, &evals, &random)?;

    // Σ r_i·z_i·H_i
    let scaled_points: Vec<F> = random.iter().zip(proofs).map(|(r, p)| *r * p.point).collect();
    let folded_points = msm(&quotients, &scaled_points)?;

    // Σ r_i (C_i − [v_i]G₁ + z_i·H_i) = [α]·Σ r_i H_i
    let lhs = folded_digest.0.into_group() - g1_base(srs)? * folded_eval + folded_points;

    if pairing_check(
        &[lhs.into_affine(), (-folded_quotients).into_affine()],
        &[srs.g2_gen, srs.g2_alpha],
    )? {
        Ok(())
    } else {
        Err(KzgError::VerifyOpeningProof)
    }
}
