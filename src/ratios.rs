//! Accumulating-ratio (grand-product) polynomials
//!
//! Both builders produce `Z` over an `n`-point domain with
//!
//! ```text
//! Z(ω⁰) = 1,     Z(ω^{j+1}) = Z(ω^j) · num_j / den_j     (0 ≤ j < n−1)
//! ```
//!
//! - **Shuffled vectors**: `num_j = Π_k (β − a_k(ω^j))`, `den_j = Π_k (β − b_k(ω^j))`.
//! - **Copy constraint**: `num_j = Π_k (e_k(ω^j) + β·id[j + k·n] + γ)` and
//!   `den_j = Π_k (e_k(ω^j) + β·id[σ(j + k·n)] + γ)`, with `id` the
//!   [`identity_support`] table.
//!
//! Shared pipeline: read every input through its Lagrange view (honoring its
//! own layout), compute the per-step terms in parallel, run two sharded prefix
//! products, batch-invert the denominators once, multiply pointwise, then
//! convert the Lagrange/Regular result to the requested form.
//!
//! Inputs are never modified; polynomials not already in Lagrange basis are
//! transformed into scratch buffers.

#![forbid(unsafe_code)]

use std::borrow::Cow;

use ark_ff::{Field, One};
use rayon::prelude::*;
use tracing::debug;

use crate::domain::Domain;
use crate::parallel::{batch_invert_in_place, prefix_products_in_place};
use crate::polynomial::{Form, IopError, LagrangeView, Polynomial};
use crate::F;

/// Build `Z` proving that the numerator vectors are a shuffle of the
/// denominator vectors (as multisets of `m`-tuples per step).
pub fn build_ratio_shuffled_vectors(
    numerator: &[Polynomial],
    denominator: &[Polynomial],
    beta: F,
    expected: Form,
    domain: Option<&Domain>,
) -> Result<Polynomial, IopError> {
    if numerator.len() != denominator.len() {
        return Err(IopError::NumberPolynomials {
            numerator: numerator.len(),
            denominator: denominator.len(),
        });
    }
    let n = common_size(numerator.iter().chain(denominator))?;
    let domain = resolve_domain(domain, n)?;
    debug!(polys = numerator.len(), n, "building shuffled-vectors ratio");

    let num = lagrange_views(numerator, &domain)?;
    let den = lagrange_views(denominator, &domain)?;

    let z = accumulate(
        n,
        |j| num.iter().fold(F::one(), |acc, p| acc * (beta - p.at(j))),
        |j| den.iter().fold(F::one(), |acc, p| acc * (beta - p.at(j))),
    );
    Polynomial::lagrange(z).into_form(expected, &domain)
}

/// Build `Z` proving that the concatenation of `entries` is invariant under
/// `permutation` (indices into the flattened `entries.len() × n` grid).
pub fn build_ratio_copy_constraint(
    entries: &[Polynomial],
    permutation: &[usize],
    beta: F,
    gamma: F,
    expected: Form,
    domain: Option<&Domain>,
) -> Result<Polynomial, IopError> {
    let n = common_size(entries)?;
    let total = entries.len() * n;
    if permutation.len() != total {
        return Err(IopError::InvalidPermutationSize { expected: total, got: permutation.len() });
    }
    if let Some((index, &target)) = permutation.iter().enumerate().find(|&(_, &s)| s >= total) {
        return Err(IopError::PermutationOutOfBounds { index, target, bound: total });
    }
    let domain = resolve_domain(domain, n)?;
    debug!(entries = entries.len(), n, "building copy-constraint ratio");

    let views = lagrange_views(entries, &domain)?;
    let id = identity_support(entries.len(), &domain);

    let z = accumulate(
        n,
        |j| {
            views.iter().enumerate().fold(F::one(), |acc, (k, e)| {
                acc * (e.at(j) + beta * id[j + k * n] + gamma)
            })
        },
        |j| {
            views.iter().enumerate().fold(F::one(), |acc, (k, e)| {
                acc * (e.at(j) + beta * id[permutation[j + k * n]] + gamma)
            })
        },
    );
    Polynomial::lagrange(z).into_form(expected, &domain)
}

/// Distinct labels for `nb` blocks of `n` positions: block `k` is the coset
/// `g^k·H`, i.e. `id[i + k·n] = g^k · ω^i`.
pub fn identity_support(nb: usize, domain: &Domain) -> Vec<F> {
    let n = domain.cardinality;

    // [1, ω, …, ω^{n−1}] from the half-size twiddle table.
    let mut first = Vec::with_capacity(n);
    first.extend_from_slice(&domain.twiddles);
    if first.is_empty() {
        first.push(F::one());
    }
    while first.len() < n {
        let last = first[first.len() - 1];
        first.push(last * domain.generator);
    }

    let mut out = vec![F::one(); nb * n];
    out.par_chunks_mut(n).enumerate().for_each(|(k, block)| {
        let shift = match domain.coset_table.get(k) {
            Some(s) => *s,
            None => domain.coset_shift.pow([k as u64]),
        };
        for (dst, w) in block.iter_mut().zip(&first) {
            *dst = *w * shift;
        }
    });
    out
}

// Shared length of all polynomials; must be a power of two.
fn common_size<'a>(polys: impl IntoIterator<Item = &'a Polynomial>) -> Result<usize, IopError> {
    let mut iter = polys.into_iter();
    let n = iter.next().ok_or(IopError::NoPolynomials)?.len();
    if !n.is_power_of_two() {
        return Err(IopError::SizeNotPowerOfTwo(n));
    }
    for p in iter {
        if p.len() != n {
            return Err(IopError::InconsistentSize { expected: n, got: p.len() });
        }
    }
    Ok(n)
}

fn resolve_domain(domain: Option<&Domain>, n: usize) -> Result<Cow<'_, Domain>, IopError> {
    match domain {
        Some(d) if d.cardinality != n => {
            Err(IopError::InconsistentSizeDomain { domain: d.cardinality, len: n })
        }
        Some(d) => Ok(Cow::Borrowed(d)),
        None => Ok(Cow::Owned(Domain::new(n)?)),
    }
}

fn lagrange_views<'a>(
    polys: &'a [Polynomial],
    domain: &Domain,
) -> Result<Vec<LagrangeView<'a>>, IopError> {
    polys.par_iter().map(|p| p.lagrange_view(domain)).collect()
}

// coeffs[j+1] = Π_{i≤j} num(i) / Π_{i≤j} den(i), coeffs[0] = 1.
fn accumulate<N, D>(n: usize, num: N, den: D) -> Vec<F>
where
    N: Fn(usize) -> F + Sync,
    D: Fn(usize) -> F + Sync,
{
    let mut coeffs = vec![F::one(); n];
    let mut t = vec![F::one(); n];
    if n > 1 {
        coeffs[1..]
            .par_iter_mut()
            .zip(t[1..].par_iter_mut())
            .enumerate()
            .for_each(|(j, (c, d))| {
                *c = num(j);
                *d = den(j);
            });
    }

    rayon::join(
        || prefix_products_in_place(&mut coeffs),
        || prefix_products_in_place(&mut t),
    );
    batch_invert_in_place(&mut t);
    coeffs
        .par_iter_mut()
        .zip(t.par_iter())
        .for_each(|(c, inv)| *c *= inv);
    coeffs
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::bit_reverse_index;
    use crate::polynomial::{Basis, Layout};
    use ark_ff::{UniformRand, Zero};
    use rand::{rngs::StdRng, SeedableRng};

    fn random_evals(rng: &mut StdRng, n: usize) -> Vec<F> {
        (0..n).map(|_| F::rand(rng)).collect()
    }

    fn step_ratio(num: &[Vec<F>], den: &[Vec<F>], beta: F, j: usize) -> F {
        let a = num.iter().fold(F::one(), |acc, v| acc * (beta - v[j]));
        let b = den.iter().fold(F::one(), |acc, v| acc * (beta - v[j]));
        a * b.inverse().unwrap()
    }

    #[test]
    fn shuffled_vectors_closes_on_a_shuffle() {
        let n = 8;
        let mut rng = StdRng::from_seed([1u8; 32]);
        let beta = F::rand(&mut rng);

        let num = vec![random_evals(&mut rng, n), random_evals(&mut rng, n)];
        // Same rows in a different order.
        let order = [3usize, 0, 7, 1, 6, 2, 5, 4];
        let den: Vec<Vec<F>> =
            num.iter().map(|v| order.iter().map(|&i| v[i]).collect()).collect();

        let z = build_ratio_shuffled_vectors(
            &num.iter().cloned().map(Polynomial::lagrange).collect::<Vec<_>>(),
            &den.iter().cloned().map(Polynomial::lagrange).collect::<Vec<_>>(),
            beta,
            Form::LAGRANGE,
            None,
        )
        .unwrap();
        let z = z.coefficients();

        assert_eq!(z[0], F::one());
        for j in 0..n - 1 {
            assert_eq!(z[j + 1], z[j] * step_ratio(&num, &den, beta, j));
        }
        // The skipped last step closes the product.
        assert_eq!(z[n - 1] * step_ratio(&num, &den, beta, n - 1), F::one());
    }

    #[test]
    fn input_forms_do_not_change_the_result() {
        let n = 8;
        let d = Domain::new(n).unwrap();
        let mut rng = StdRng::from_seed([2u8; 32]);
        let beta = F::rand(&mut rng);

        let num: Vec<Polynomial> =
            (0..3).map(|_| Polynomial::lagrange(random_evals(&mut rng, n))).collect();
        let den: Vec<Polynomial> =
            (0..3).map(|_| Polynomial::lagrange(random_evals(&mut rng, n))).collect();
        let reference =
            build_ratio_shuffled_vectors(&num, &den, beta, Form::LAGRANGE, Some(&d)).unwrap();

        let rev = Form::new(Basis::Lagrange, Layout::BitReverse);
        let num_rev: Vec<Polynomial> = num.iter().map(|p| p.to_form(rev, &d).unwrap()).collect();
        let den_canon: Vec<Polynomial> =
            den.iter().map(|p| p.to_form(Form::CANONICAL, &d).unwrap()).collect();
        let mixed =
            build_ratio_shuffled_vectors(&num_rev, &den_canon, beta, Form::LAGRANGE, None).unwrap();
        assert_eq!(mixed, reference);

        // Inputs are untouched.
        assert_eq!(num_rev[0].form(), rev);
        assert_eq!(den_canon[0].form(), Form::CANONICAL);
    }

    #[test]
    fn output_follows_requested_form() {
        let n = 8;
        let d = Domain::new(n).unwrap();
        let mut rng = StdRng::from_seed([3u8; 32]);
        let beta = F::rand(&mut rng);
        let num = vec![Polynomial::lagrange(random_evals(&mut rng, n))];
        let den = vec![Polynomial::lagrange(random_evals(&mut rng, n))];

        let base = build_ratio_shuffled_vectors(&num, &den, beta, Form::LAGRANGE, Some(&d)).unwrap();
        for basis in [Basis::Canonical, Basis::Lagrange, Basis::LagrangeCoset] {
            for layout in [Layout::Regular, Layout::BitReverse] {
                let form = Form::new(basis, layout);
                let z = build_ratio_shuffled_vectors(&num, &den, beta, form, Some(&d)).unwrap();
                assert_eq!(z.form(), form);
                assert_eq!(z, base.to_form(form, &d).unwrap());
            }
        }

        let rev = build_ratio_shuffled_vectors(
            &num,
            &den,
            beta,
            Form::new(Basis::Lagrange, Layout::BitReverse),
            Some(&d),
        )
        .unwrap();
        for i in 0..n {
            assert_eq!(rev.coefficients()[bit_reverse_index(i, 3)], base.coefficients()[i]);
        }
    }

    #[test]
    fn identity_permutation_gives_one() {
        let n = 8;
        let mut rng = StdRng::from_seed([4u8; 32]);
        let entries: Vec<Polynomial> =
            (0..3).map(|_| Polynomial::lagrange(random_evals(&mut rng, n))).collect();
        let perm: Vec<usize> = (0..3 * n).collect();
        let (beta, gamma) = (F::rand(&mut rng), F::rand(&mut rng));

        let z = build_ratio_copy_constraint(&entries, &perm, beta, gamma, Form::LAGRANGE, None)
            .unwrap();
        assert!(z.coefficients().iter().all(|v| v.is_one()));

        let z = build_ratio_copy_constraint(&entries, &perm, beta, gamma, Form::CANONICAL, None)
            .unwrap();
        assert_eq!(z.coefficients()[0], F::one());
        assert!(z.coefficients()[1..].iter().all(|v| v.is_zero()));
    }

    #[test]
    fn copy_constraint_respects_wiring() {
        let n = 4;
        let d = Domain::new(n).unwrap();
        let mut rng = StdRng::from_seed([5u8; 32]);
        let (beta, gamma) = (F::rand(&mut rng), F::rand(&mut rng));

        let mut e0 = random_evals(&mut rng, n);
        let e1 = random_evals(&mut rng, n);
        // Wire e0[1] to e1[2].
        e0[1] = e1[2];
        let mut perm: Vec<usize> = (0..2 * n).collect();
        perm.swap(1, n + 2);

        let entries = vec![Polynomial::lagrange(e0.clone()), Polynomial::lagrange(e1.clone())];
        let id = identity_support(2, &d);
        let full_ratio = |values: &[F], perm: &[usize]| {
            let (mut num, mut den) = (F::one(), F::one());
            for (i, v) in values.iter().enumerate() {
                num *= *v + beta * id[i] + gamma;
                den *= *v + beta * id[perm[i]] + gamma;
            }
            num * den.inverse().unwrap()
        };
        let flat: Vec<F> = e0.iter().chain(&e1).copied().collect();
        assert_eq!(full_ratio(&flat[..], &perm[..]), F::one());

        let z = build_ratio_copy_constraint(&entries, &perm, beta, gamma, Form::LAGRANGE, Some(&d))
            .unwrap();
        let z = z.coefficients();
        let last = n - 1;
        let last_step = (0..2).fold(F::one(), |acc, k| {
            let v = flat[last + k * n];
            acc * (v + beta * id[last + k * n] + gamma)
                * (v + beta * id[perm[last + k * n]] + gamma).inverse().unwrap()
        });
        assert_eq!(z[0], F::one());
        assert_eq!(z[last] * last_step, F::one());

        // Breaking the wired value breaks the product.
        let mut broken = entries.clone();
        let mut e0_bad = e0;
        e0_bad[1] += F::one();
        broken[0] = Polynomial::lagrange(e0_bad);
        let z_bad =
            build_ratio_copy_constraint(&broken, &perm, beta, gamma, Form::LAGRANGE, Some(&d))
                .unwrap();
        assert_ne!(z_bad.coefficients()[last] * last_step, F::one());
    }

    #[test]
    fn copy_constraint_accepts_any_entry_form() {
        let n = 8;
        let d = Domain::new(n).unwrap();
        let mut rng = StdRng::from_seed([6u8; 32]);
        let (beta, gamma) = (F::rand(&mut rng), F::rand(&mut rng));
        let entries: Vec<Polynomial> =
            (0..3).map(|_| Polynomial::lagrange(random_evals(&mut rng, n))).collect();
        let mut perm: Vec<usize> = (0..3 * n).collect();
        perm.swap(2, n + 5);
        perm.swap(n, 2 * n + 7);

        let base = build_ratio_copy_constraint(&entries, &perm, beta, gamma, Form::LAGRANGE, None)
            .unwrap();

        let rev = Form::new(Basis::Lagrange, Layout::BitReverse);
        let mixed = vec![
            entries[0].to_form(rev, &d).unwrap(),
            entries[1].to_form(Form::CANONICAL, &d).unwrap(),
            entries[2].clone(),
        ];
        let snapshot = mixed.clone();
        let z = build_ratio_copy_constraint(&mixed, &perm, beta, gamma, Form::LAGRANGE, Some(&d))
            .unwrap();
        assert_eq!(z, base);
        assert_eq!(mixed, snapshot);

        let all_rev: Vec<Polynomial> = entries.iter().map(|p| p.to_form(rev, &d).unwrap()).collect();
        let z = build_ratio_copy_constraint(&all_rev, &perm, beta, gamma, rev, None).unwrap();
        assert_eq!(z.form(), rev);
        assert_eq!(z, base.to_form(rev, &d).unwrap());
        assert_eq!(z.coefficients()[bit_reverse_index(3, 3)], base.coefficients()[3]);
    }

    #[test]
    fn identity_support_layout() {
        let d = Domain::new(8).unwrap();
        let id = identity_support(3, &d);
        assert_eq!(id.len(), 24);
        for i in 0..8 {
            assert_eq!(id[i], d.element(i));
            assert_eq!(id[8 + i], d.coset_shift * d.element(i));
            assert_eq!(id[16 + i], d.coset_shift.square() * d.element(i));
        }
        let mut sorted = id.clone();
        sorted.sort();
        sorted.dedup();
        assert_eq!(sorted.len(), id.len());

        let tiny = Domain::new(1).unwrap();
        assert_eq!(identity_support(2, &tiny), vec![F::one(), tiny.coset_shift]);
    }

    #[test]
    fn rejects_bad_shapes() {
        let p = |n: usize| Polynomial::lagrange(vec![F::one(); n]);
        let beta = F::from(3u64);

        assert_eq!(
            build_ratio_shuffled_vectors(&[p(4)], &[p(4), p(4)], beta, Form::LAGRANGE, None)
                .unwrap_err(),
            IopError::NumberPolynomials { numerator: 1, denominator: 2 }
        );
        assert_eq!(
            build_ratio_shuffled_vectors(&[], &[], beta, Form::LAGRANGE, None).unwrap_err(),
            IopError::NoPolynomials
        );
        assert_eq!(
            build_ratio_shuffled_vectors(&[p(3)], &[p(3)], beta, Form::LAGRANGE, None).unwrap_err(),
            IopError::SizeNotPowerOfTwo(3)
        );
        assert_eq!(
            build_ratio_shuffled_vectors(&[p(4)], &[p(8)], beta, Form::LAGRANGE, None).unwrap_err(),
            IopError::InconsistentSize { expected: 4, got: 8 }
        );
        let d16 = Domain::new(16).unwrap();
        assert_eq!(
            build_ratio_shuffled_vectors(&[p(8)], &[p(8)], beta, Form::LAGRANGE, Some(&d16))
                .unwrap_err(),
            IopError::InconsistentSizeDomain { domain: 16, len: 8 }
        );

        let entries = [p(4), p(4)];
        assert_eq!(
            build_ratio_copy_constraint(&entries, &[0, 1, 2], beta, beta, Form::LAGRANGE, None)
                .unwrap_err(),
            IopError::InvalidPermutationSize { expected: 8, got: 3 }
        );
        let mut perm: Vec<usize> = (0..8).collect();
        perm[5] = 8;
        assert_eq!(
            build_ratio_copy_constraint(&entries, &perm, beta, beta, Form::LAGRANGE, None)
                .unwrap_err(),
            IopError::PermutationOutOfBounds { index: 5, target: 8, bound: 8 }
        );
        assert_eq!(
            build_ratio_copy_constraint(&[], &[], beta, beta, Form::LAGRANGE, None).unwrap_err(),
            IopError::NoPolynomials
        );
    }
}
