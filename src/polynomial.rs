//! Tagged polynomials: (Basis, Layout) forms and their legal transitions
//!
//! A [`Polynomial`] is a vector of field elements plus a [`Form`] that says
//! how to read it:
//!
//! | Basis           | index `i` (Regular) means              |
//! |-----------------|----------------------------------------|
//! | `Canonical`     | coefficient of `X^i`                   |
//! | `Lagrange`      | evaluation at `ω^i`                    |
//! | `LagrangeCoset` | evaluation at `g·ω^i`                  |
//!
//! With `Layout::BitReverse`, index `i` holds what Regular stores at
//! `bit_reverse(i)`.
//!
//! The only way to change a tag is [`Polynomial::into_form`], which performs
//! the transform/coset-shift/bit-reversal needed to keep the meaning, and is
//! defined for every (source, target) pair. It consumes `self`: a conversion
//! never changes a value some other owner can still observe.

#![forbid(unsafe_code)]

use std::borrow::Cow;

use ark_ff::Zero;
use ark_serialize::{
    CanonicalDeserialize, CanonicalSerialize, Compress, Read, SerializationError, Valid, Validate,
    Write,
};

use crate::domain::{bit_reverse, bit_reverse_index, Domain, DomainError};
use crate::F;

/// How the raw entries of a polynomial relate to its mathematical meaning.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Basis {
    /// Monomial coefficients.
    Canonical,
    /// Evaluations on the subgroup `H`.
    Lagrange,
    /// Evaluations on the coset `g·H`.
    LagrangeCoset,
}

/// Storage order of the entries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Layout {
    /// Natural order.
    Regular,
    /// Bit-reversed order (what an in-place FFT leaves behind).
    BitReverse,
}

/// A (Basis, Layout) tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, CanonicalSerialize, CanonicalDeserialize)]
pub struct Form {
    pub basis: Basis,
    pub layout: Layout,
}

impl Form {
    pub const fn new(basis: Basis, layout: Layout) -> Self {
        Self { basis, layout }
    }

    pub const CANONICAL: Form = Form::new(Basis::Canonical, Layout::Regular);
    pub const LAGRANGE: Form = Form::new(Basis::Lagrange, Layout::Regular);
    pub const LAGRANGE_COSET: Form = Form::new(Basis::LagrangeCoset, Layout::Regular);
}

// One-byte tags so Form can sit inside derived ark-serialize structs.
impl CanonicalSerialize for Basis {
    fn serialize_with_mode<W: Write>(&self, mut w: W, _cm: Compress) -> Result<(), SerializationError> {
        let byte = match self {
            Basis::Canonical => 0u8,
            Basis::Lagrange => 1u8,
            Basis::LagrangeCoset => 2u8,
        };
        w.write_all(&[byte])?;
        Ok(())
    }
    fn serialized_size(&self, _cm: Compress) -> usize {
        1
    }
}
impl CanonicalDeserialize for Basis {
    fn deserialize_with_mode<R: Read>(
        mut r: R,
        _cm: Compress,
        _validate: Validate,
    ) -> Result<Self, SerializationError> {
        let mut b = [0u8; 1];
        r.read_exact(&mut b)?;
        match b[0] {
            0 => Ok(Basis::Canonical),
            1 => Ok(Basis::Lagrange),
            2 => Ok(Basis::LagrangeCoset),
            _ => Err(SerializationError::InvalidData),
        }
    }
}
impl Valid for Basis {
    fn check(&self) -> Result<(), SerializationError> {
        Ok(())
    }
}

impl CanonicalSerialize for Layout {
    fn serialize_with_mode<W: Write>(&self, mut w: W, _cm: Compress) -> Result<(), SerializationError> {
        let byte = match self {
            Layout::Regular => 0u8,
            Layout::BitReverse => 1u8,
        };
        w.write_all(&[byte])?;
        Ok(())
    }
    fn serialized_size(&self, _cm: Compress) -> usize {
        1
    }
}
impl CanonicalDeserialize for Layout {
    fn deserialize_with_mode<R: Read>(
        mut r: R,
        _cm: Compress,
        _validate: Validate,
    ) -> Result<Self, SerializationError> {
        let mut b = [0u8; 1];
        r.read_exact(&mut b)?;
        match b[0] {
            0 => Ok(Layout::Regular),
            1 => Ok(Layout::BitReverse),
            _ => Err(SerializationError::InvalidData),
        }
    }
}
impl Valid for Layout {
    fn check(&self) -> Result<(), SerializationError> {
        Ok(())
    }
}

/// Errors of the polynomial IOP helpers (form conversion and ratio builders).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum IopError {
    #[error("the number of polynomials in the denominator and the numerator must be the same ({numerator} vs {denominator})")]
    NumberPolynomials { numerator: usize, denominator: usize },
    #[error("at least one polynomial is required")]
    NoPolynomials,
    #[error("the size of the polynomials must be a power of two (got {0})")]
    SizeNotPowerOfTwo(usize),
    #[error("the sizes of the polynomials must all be equal (expected {expected}, got {got})")]
    InconsistentSize { expected: usize, got: usize },
    #[error("the size of the domain must match the size of the polynomials (domain {domain}, polynomials {len})")]
    InconsistentSizeDomain { domain: usize, len: usize },
    #[error("permutation must have {expected} entries (got {got})")]
    InvalidPermutationSize { expected: usize, got: usize },
    #[error("permutation entry {index} points to {target}, outside 0..{bound}")]
    PermutationOutOfBounds { index: usize, target: usize, bound: usize },
    #[error(transparent)]
    Domain(#[from] DomainError),
}

/// A vector of field elements tagged with its [`Form`].
#[derive(Debug, Clone, PartialEq, Eq, CanonicalSerialize, CanonicalDeserialize)]
pub struct Polynomial {
    coefficients: Vec<F>,
    form: Form,
}

impl Polynomial {
    pub fn new(coefficients: Vec<F>, form: Form) -> Self {
        Self { coefficients, form }
    }

    /// Shorthand for a Canonical/Regular polynomial.
    pub fn canonical(coefficients: Vec<F>) -> Self {
        Self::new(coefficients, Form::CANONICAL)
    }

    /// Shorthand for a Lagrange/Regular polynomial.
    pub fn lagrange(evaluations: Vec<F>) -> Self {
        Self::new(evaluations, Form::LAGRANGE)
    }

    #[inline]
    pub fn coefficients(&self) -> &[F] {
        &self.coefficients
    }

    #[inline]
    pub fn into_coefficients(self) -> Vec<F> {
        self.coefficients
    }

    #[inline]
    pub fn form(&self) -> Form {
        self.form
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.coefficients.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.coefficients.is_empty()
    }

    /// Re-express this polynomial in `target` form over `domain`.
    ///
    /// A pure layout change within the same basis is a bit-reversal; any
    /// basis change goes through Canonical/Regular with the matching
    /// (coset) transform. The length must equal the domain size unless the
    /// form is unchanged.
    pub fn into_form(mut self, target: Form, domain: &Domain) -> Result<Polynomial, IopError> {
        if self.form == target {
            return Ok(self);
        }
        let n = self.coefficients.len();
        if n != domain.cardinality {
            return Err(IopError::InconsistentSizeDomain { domain: domain.cardinality, len: n });
        }

        let a = &mut self.coefficients;
        if self.form.basis == target.basis {
            bit_reverse(a);
            self.form = target;
            return Ok(self);
        }

        if self.form.layout == Layout::BitReverse {
            bit_reverse(a);
        }
        match self.form.basis {
            Basis::Canonical => {}
            Basis::Lagrange => domain.ifft_in_place(a)?,
            Basis::LagrangeCoset => domain.coset_ifft_in_place(a)?,
        }
        match target.basis {
            Basis::Canonical => {}
            Basis::Lagrange => domain.fft_in_place(a)?,
            Basis::LagrangeCoset => domain.coset_fft_in_place(a)?,
        }
        if target.layout == Layout::BitReverse {
            bit_reverse(a);
        }
        self.form = target;
        Ok(self)
    }

    /// Non-consuming variant of [`Polynomial::into_form`].
    pub fn to_form(&self, target: Form, domain: &Domain) -> Result<Polynomial, IopError> {
        self.clone().into_form(target, domain)
    }

    /// Evaluate at an arbitrary point `x`.
    ///
    /// Canonical/Regular input is evaluated directly; any other form is first
    /// interpolated over `domain`.
    pub fn evaluate(&self, x: F, domain: &Domain) -> Result<F, IopError> {
        if self.form == Form::CANONICAL {
            return Ok(eval(&self.coefficients, x));
        }
        let coeffs = self.to_form(Form::CANONICAL, domain)?;
        Ok(eval(&coeffs.coefficients, x))
    }

    /// Evaluations on `H` without touching `self`: borrowed when already in
    /// Lagrange basis (with its own layout), freshly computed (Regular)
    /// otherwise.
    pub(crate) fn lagrange_view(&self, domain: &Domain) -> Result<LagrangeView<'_>, IopError> {
        if self.form.basis == Basis::Lagrange {
            if self.coefficients.len() != domain.cardinality {
                return Err(IopError::InconsistentSizeDomain {
                    domain: domain.cardinality,
                    len: self.coefficients.len(),
                });
            }
            return Ok(LagrangeView {
                evals: Cow::Borrowed(&self.coefficients),
                layout: self.form.layout,
                log_n: domain.log_cardinality(),
            });
        }
        let p = self.to_form(Form::LAGRANGE, domain)?;
        Ok(LagrangeView {
            evals: Cow::Owned(p.coefficients),
            layout: Layout::Regular,
            log_n: domain.log_cardinality(),
        })
    }
}

/// Lagrange evaluations read through their declared layout.
pub(crate) struct LagrangeView<'a> {
    evals: Cow<'a, [F]>,
    layout: Layout,
    log_n: u32,
}

impl LagrangeView<'_> {
    /// Evaluation at `ω^i`.
    #[inline]
    pub(crate) fn at(&self, i: usize) -> F {
        match self.layout {
            Layout::Regular => self.evals[i],
            Layout::BitReverse => self.evals[bit_reverse_index(i, self.log_n)],
        }
    }
}

/// Horner evaluation of monomial coefficients (low→high) at `x`.
pub fn eval(coeffs: &[F], x: F) -> F {
    let mut acc = F::zero();
    for &c in coeffs.iter().rev() {
        acc = acc * x + c;
    }
    acc
}

#[cfg(test)]
mod tests {
    use super::*;
    use ark_ff::UniformRand;
    use rand::{rngs::StdRng, SeedableRng};

    const ALL_FORMS: [Form; 6] = [
        Form::new(Basis::Canonical, Layout::Regular),
        Form::new(Basis::Canonical, Layout::BitReverse),
        Form::new(Basis::Lagrange, Layout::Regular),
        Form::new(Basis::Lagrange, Layout::BitReverse),
        Form::new(Basis::LagrangeCoset, Layout::Regular),
        Form::new(Basis::LagrangeCoset, Layout::BitReverse),
    ];

    fn random_canonical(n: usize, seed: u8) -> Polynomial {
        let mut rng = StdRng::from_seed([seed; 32]);
        Polynomial::canonical((0..n).map(|_| F::rand(&mut rng)).collect())
    }

    #[test]
    fn every_form_keeps_the_same_polynomial() {
        let d = Domain::new(8).unwrap();
        let p = random_canonical(8, 1);
        let z = F::from(11u64);
        let expect = eval(p.coefficients(), z);

        for src in ALL_FORMS {
            let in_src = p.to_form(src, &d).unwrap();
            assert_eq!(in_src.form(), src);
            assert_eq!(in_src.evaluate(z, &d).unwrap(), expect, "from {src:?}");
            for dst in ALL_FORMS {
                let q = in_src.to_form(dst, &d).unwrap();
                assert_eq!(q.to_form(Form::CANONICAL, &d).unwrap(), p, "{src:?} -> {dst:?}");
            }
        }
    }

    #[test]
    fn lagrange_entries_are_evaluations() {
        let d = Domain::new(8).unwrap();
        let p = random_canonical(8, 2);

        let reg = p.to_form(Form::LAGRANGE, &d).unwrap();
        let rev = p.to_form(Form::new(Basis::Lagrange, Layout::BitReverse), &d).unwrap();
        let coset = p.to_form(Form::LAGRANGE_COSET, &d).unwrap();
        for i in 0..8 {
            let w = d.element(i);
            assert_eq!(reg.coefficients()[i], eval(p.coefficients(), w));
            assert_eq!(rev.coefficients()[bit_reverse_index(i, 3)], eval(p.coefficients(), w));
            assert_eq!(coset.coefficients()[i], eval(p.coefficients(), d.coset_shift * w));
        }

        let view = rev.lagrange_view(&d).unwrap();
        for i in 0..8 {
            assert_eq!(view.at(i), reg.coefficients()[i]);
        }
    }

    #[test]
    fn conversion_rejects_size_mismatch() {
        let d = Domain::new(8).unwrap();
        let p = random_canonical(4, 3);
        assert_eq!(
            p.to_form(Form::LAGRANGE, &d).unwrap_err(),
            IopError::InconsistentSizeDomain { domain: 8, len: 4 }
        );
        // Same form is always accepted.
        assert_eq!(p.to_form(Form::CANONICAL, &d).unwrap(), p);
    }

    #[test]
    fn serialization_keeps_the_tag() {
        let p = Polynomial::new(
            vec![F::from(1u64), F::from(2u64)],
            Form::new(Basis::LagrangeCoset, Layout::BitReverse),
        );
        let mut bytes = Vec::new();
        p.serialize_compressed(&mut bytes).unwrap();
        let back = Polynomial::deserialize_compressed(&bytes[..]).unwrap();
        assert_eq!(back, p);

        let last = bytes.len() - 1;
        bytes[last] = 9;
        assert!(Polynomial::deserialize_compressed(&bytes[..]).is_err());
    }
}
