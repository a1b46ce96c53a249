//! Evaluation Domain & Transform Primitives
//!
//! Multiplicative subgroup `H = {1, ω, …, ω^{N-1}}` of power-of-two order
//! over BN254's scalar field, together with the tables the rest of the crate
//! reads directly:
//!
//! - **twiddles**: `ω^i` for `i < N/2` (and their inverses), shared by the
//!   forward/inverse radix-2 transforms and by the identity-support table of
//!   the copy-constraint ratio;
//! - **coset table**: `g^i` for `i < N` where `g` is the field's fixed
//!   multiplicative generator, used by the coset transforms and to pick the
//!   `k`-th coset `g^k·H`.
//!
//! All transforms work **in place**, take and return **Regular** (natural)
//! order, and reject buffers whose length differs from `N`. Bit-reversed
//! storage is produced only by calling [`bit_reverse`] explicitly.

#![forbid(unsafe_code)]

use ark_ff::{FftField, Field, One};
use rayon::prelude::*;

use crate::F;

/// Evaluation domain of size `N = 2^k`.
#[derive(Debug, Clone)]
pub struct Domain {
    /// Domain size `N`; always a power of two.
    pub cardinality: usize,
    /// `N^{-1}`, applied at the end of the inverse transform.
    pub cardinality_inv: F,
    /// Generator `ω` of the size-`N` subgroup.
    pub generator: F,
    /// `ω^{-1}`.
    pub generator_inv: F,
    /// Coset shift `g` (the field's multiplicative generator).
    pub coset_shift: F,
    /// `g^{-1}`.
    pub coset_shift_inv: F,
    /// `ω^i` for `i < N/2`.
    pub twiddles: Vec<F>,
    /// `ω^{-i}` for `i < N/2`.
    pub twiddles_inv: Vec<F>,
    /// `g^i` for `i < N`.
    pub coset_table: Vec<F>,
    /// `g^{-i}` for `i < N`.
    pub coset_table_inv: Vec<F>,
}

/// Errors produced by domain construction and transforms.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DomainError {
    #[error("domain size must be a positive power of two (got {0})")]
    NotPowerOfTwo(usize),
    #[error("domain size 2^{log_n} exceeds the field's two-adicity 2^{max_log}")]
    TooLarge { log_n: u32, max_log: u32 },
    #[error("no primitive root of unity of order {0}")]
    NoRootOfUnity(usize),
    #[error("buffer length must equal the domain size (len={got}, N={n})")]
    SizeMismatch { got: usize, n: usize },
}

impl Domain {
    /// Build the domain of size exactly `n` (must be a power of two).
    pub fn new(n: usize) -> Result<Self, DomainError> {
        if n == 0 || !n.is_power_of_two() {
            return Err(DomainError::NotPowerOfTwo(n));
        }
        let log_n = n.trailing_zeros();
        if log_n > F::TWO_ADICITY {
            return Err(DomainError::TooLarge { log_n, max_log: F::TWO_ADICITY });
        }

        let generator = F::get_root_of_unity(n as u64).ok_or(DomainError::NoRootOfUnity(n))?;
        let generator_inv = generator.inverse().ok_or(DomainError::NoRootOfUnity(n))?;
        let cardinality_inv = F::from(n as u64)
            .inverse()
            .ok_or(DomainError::NotPowerOfTwo(n))?;

        let coset_shift = F::GENERATOR;
        // the multiplicative generator of a prime field is never zero
        let coset_shift_inv = coset_shift.inverse().unwrap_or_else(F::one);

        Ok(Self {
            cardinality: n,
            cardinality_inv,
            generator,
            generator_inv,
            coset_shift,
            coset_shift_inv,
            twiddles: powers_of(generator, n / 2),
            twiddles_inv: powers_of(generator_inv, n / 2),
            coset_table: powers_of(coset_shift, n),
            coset_table_inv: powers_of(coset_shift_inv, n),
        })
    }

    /// Smallest domain able to hold `m` values (`N = next_pow2(max(m, 1))`).
    pub fn with_min_size(m: usize) -> Result<Self, DomainError> {
        Self::new(m.max(1).next_power_of_two())
    }

    /// `log2(N)`.
    #[inline]
    pub fn log_cardinality(&self) -> u32 {
        self.cardinality.trailing_zeros()
    }

    /// The `i`-th element `ω^i` of the subgroup.
    pub fn element(&self, i: usize) -> F {
        self.generator.pow([(i % self.cardinality) as u64])
    }

    #[inline]
    fn check_len(&self, len: usize) -> Result<(), DomainError> {
        if len != self.cardinality {
            return Err(DomainError::SizeMismatch { got: len, n: self.cardinality });
        }
        Ok(())
    }

    /// Coefficients (Regular) → evaluations on `H` (Regular).
    pub fn fft_in_place(&self, a: &mut [F]) -> Result<(), DomainError> {
        self.check_len(a.len())?;
        radix2_in_place(a, &self.twiddles);
        Ok(())
    }

    /// Evaluations on `H` (Regular) → coefficients (Regular).
    pub fn ifft_in_place(&self, a: &mut [F]) -> Result<(), DomainError> {
        self.check_len(a.len())?;
        radix2_in_place(a, &self.twiddles_inv);
        let inv_n = self.cardinality_inv;
        a.par_iter_mut().for_each(|x| *x *= inv_n);
        Ok(())
    }

    /// Coefficients (Regular) → evaluations on the coset `g·H` (Regular).
    pub fn coset_fft_in_place(&self, a: &mut [F]) -> Result<(), DomainError> {
        self.check_len(a.len())?;
        a.par_iter_mut()
            .zip(self.coset_table.par_iter())
            .for_each(|(x, s)| *x *= s);
        radix2_in_place(a, &self.twiddles);
        Ok(())
    }

    /// Evaluations on the coset `g·H` (Regular) → coefficients (Regular).
    pub fn coset_ifft_in_place(&self, a: &mut [F]) -> Result<(), DomainError> {
        self.ifft_in_place(a)?;
        a.par_iter_mut()
            .zip(self.coset_table_inv.par_iter())
            .for_each(|(x, s)| *x *= s);
        Ok(())
    }
}

/// `[1, base, base², …]` with `len` entries.
pub(crate) fn powers_of(base: F, len: usize) -> Vec<F> {
    let mut out = Vec::with_capacity(len);
    let mut acc = F::one();
    for _ in 0..len {
        out.push(acc);
        acc *= base;
    }
    out
}

/// Index `i` with its lowest `log_n` bits reversed.
#[inline]
pub fn bit_reverse_index(i: usize, log_n: u32) -> usize {
    if log_n == 0 {
        return 0;
    }
    i.reverse_bits() >> (usize::BITS - log_n)
}

/// Permute `a` into (or out of) bit-reversed order. `a.len()` must be a power of two.
pub fn bit_reverse<T>(a: &mut [T]) {
    let n = a.len();
    debug_assert!(n == 0 || n.is_power_of_two());
    if n <= 2 {
        return;
    }
    let log_n = n.trailing_zeros();
    for i in 0..n {
        let j = bit_reverse_index(i, log_n);
        if i < j {
            a.swap(i, j);
        }
    }
}

// Cooley–Tukey over a bit-reversed copy; `twiddles[k] = root^k`, k < n/2.
fn radix2_in_place(a: &mut [F], twiddles: &[F]) {
    let n = a.len();
    debug_assert!(n.is_power_of_two());
    debug_assert_eq!(twiddles.len(), n / 2);

    bit_reverse(a);

    let mut len = 2;
    while len <= n {
        let half = len / 2;
        let step = n / len;
        a.par_chunks_mut(len).for_each(|chunk| {
            let (lo, hi) = chunk.split_at_mut(half);
            for i in 0..half {
                let v = hi[i] * twiddles[i * step];
                let u = lo[i];
                lo[i] = u + v;
                hi[i] = u - v;
            }
        });
        len <<= 1;
    }
}
