//! Crate root: public surface and curve aliases
//!
//! `tinykzg` implements the KZG polynomial commitment scheme over BN254 and
//! the accumulating-ratio (grand-product) polynomials used by permutation and
//! lookup arguments.
//!
//! ## Invariants
//!
//! - **Field & Curve.** The scalar field is `ark_bn254::Fr` (`F`). Commitments
//!   are `G1 = ark_bn254::G1Affine` points; verification pairs against two
//!   `G2` elements `{G₂, [α]G₂}`. Unsafe code is forbidden throughout.
//!
//! - **Polynomials.** KZG operations take monomial coefficients, low→high.
//!   The ratio builders take tagged [`Polynomial`]s whose [`Form`] records
//!   the basis and storage order; tags change only through
//!   [`Polynomial::into_form`].
//!
//! - **Fiat–Shamir.** Batch-opening challenges come from a [`Transcript`] over
//!   a caller-chosen [`FsHasher`], with explicit domain separation and
//!   length-delimited bindings. Prover and verifier bind the point and then
//!   every digest, in order.
//!
//! - **No global state.** Parallelism is configured with an explicit
//!   [`ConcurrencyPolicy`]; SRS and [`Domain`] values are read-only and can be
//!   shared across threads.
//!
//! Failures are typed errors per module; a rejected proof is always
//! [`KzgError::VerifyOpeningProof`], never a shape or primitive error.
//!
//! ```
//! use tinykzg::{kzg, Domain, Srs, F};
//!
//! let srs = Srs::new(8, F::from(1234u64)).unwrap();
//! let domain = Domain::new(8).unwrap();
//! let p = vec![F::from(1u64), F::from(2u64), F::from(3u64)];
//!
//! let c = kzg::commit(&p, &srs, None).unwrap();
//! let proof = kzg::open(&p, F::from(10u64), &domain, &srs).unwrap();
//! assert_eq!(proof.claimed_value, F::from(321u64));
//! kzg::verify(&c, &proof, &srs).unwrap();
//! ```

#![forbid(unsafe_code)]
#![deny(rust_2018_idioms)]

/// Radix-2 evaluation domain, (coset) FFTs, bit-reversal.
pub mod domain;
/// KZG commit/open/verify and batched openings.
pub mod kzg;
/// Bounded thread pools, MSM split policy, sharded field kernels.
pub mod parallel;
/// Basis/layout-tagged polynomials.
pub mod polynomial;
/// Accumulating-ratio builders (shuffled vectors, copy constraint).
pub mod ratios;
/// Structured reference string: generation, validation, I/O.
pub mod srs;
/// Fiat–Shamir transcript (declared challenges, pluggable hash).
pub mod transcript;

/// Scalar field.
pub type F = ark_bn254::Fr;

/// G1 affine point (commitments, SRS powers).
pub type G1 = ark_bn254::G1Affine;

/// G2 affine point (verifier key).
pub type G2 = ark_bn254::G2Affine;

/// Pairing engine.
pub type E = ark_bn254::Bn254;

pub use crate::domain::{Domain, DomainError};
pub use crate::kzg::{BatchOpeningProof, Digest, KzgError, OpeningProof};
pub use crate::parallel::{ConcurrencyPolicy, CpuLimiter, ParallelError};
pub use crate::polynomial::{Basis, Form, IopError, Layout, Polynomial};
pub use crate::ratios::{build_ratio_copy_constraint, build_ratio_shuffled_vectors};
pub use crate::srs::{Srs, SrsError};
pub use crate::transcript::{FsHasher, Transcript, TranscriptError};
