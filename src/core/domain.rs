//! Problem domain definition such as bound constraints for variables.

use nalgebra::{convert, storage::StorageMut, DimName, Dyn, OVector, Vector, U1};

use super::base::RealField;

/// A set of bound constraints and magnitudes for the variables of a problem.
///
/// Only box bounds are supported. Each variable additionally has a
/// *magnitude*, a rough order of its typical values, which is used by
/// [finite differences](crate::derivatives) to pick sensible step sizes. For
/// bounded variables the magnitude is estimated from the bounds; it is 1
/// otherwise.
#[derive(Debug, Clone)]
pub struct Domain<T: RealField> {
    lower: OVector<T, Dyn>,
    upper: OVector<T, Dyn>,
    magnitude: OVector<T, Dyn>,
}

impl<T: RealField> Domain<T> {
    /// Builds a domain of `dim` variables without any bounds.
    pub fn unconstrained(dim: usize) -> Self {
        assert!(dim > 0, "empty domain");

        let inf: T = convert(f64::INFINITY);
        let dim = Dyn(dim);

        Self {
            lower: OVector::from_element_generic(dim, U1::name(), -inf),
            upper: OVector::from_element_generic(dim, U1::name(), inf),
            magnitude: OVector::from_element_generic(dim, U1::name(), T::one()),
        }
    }

    /// Builds a rectangular domain from per-variable lower and upper bounds.
    ///
    /// An infinite bound leaves the variable unconstrained from that side.
    ///
    /// # Panics
    ///
    /// Panics if the bounds are empty, have different lengths or if
    /// `lower[i] > upper[i]` for some variable.
    pub fn rect(lower: Vec<T>, upper: Vec<T>) -> Self {
        assert!(!lower.is_empty(), "empty domain");
        assert_eq!(
            lower.len(),
            upper.len(),
            "lower and upper bounds have different lengths"
        );
        assert!(
            lower.iter().zip(upper.iter()).all(|(l, u)| l <= u),
            "invalid bounds"
        );

        let dim = Dyn(lower.len());

        let magnitude = OVector::from_iterator_generic(
            dim,
            U1::name(),
            lower
                .iter()
                .zip(upper.iter())
                .map(|(&l, &u)| estimate_magnitude(l, u)),
        );

        Self {
            lower: OVector::from_vec_generic(dim, U1::name(), lower),
            upper: OVector::from_vec_generic(dim, U1::name(), upper),
            magnitude,
        }
    }

    /// Overrides the estimated magnitudes of the variables.
    ///
    /// # Panics
    ///
    /// Panics if the length differs from the domain dimension or if any
    /// magnitude is not positive.
    pub fn with_magnitude(mut self, magnitude: Vec<T>) -> Self {
        assert_eq!(
            magnitude.len(),
            self.dim(),
            "magnitude length does not match domain dimension"
        );
        assert!(
            magnitude.iter().all(|m| *m > T::zero()),
            "magnitude must be positive"
        );

        self.magnitude = OVector::from_vec_generic(Dyn(self.dim()), U1::name(), magnitude);
        self
    }

    /// Number of variables in the domain.
    pub fn dim(&self) -> usize {
        self.lower.len()
    }

    /// Per-variable magnitudes.
    pub fn magnitude(&self) -> &OVector<T, Dyn> {
        &self.magnitude
    }

    /// Moves an infeasible point to the nearest one inside the bounds by
    /// clamping each coordinate. Reports whether any clamping was needed.
    pub fn project<Sx>(&self, x: &mut Vector<T, Dyn, Sx>) -> bool
    where
        Sx: StorageMut<T, Dyn>,
    {
        let not_feasible = x
            .iter()
            .zip(self.lower.iter().zip(self.upper.iter()))
            .any(|(xi, (li, ui))| xi < li || xi > ui);

        if not_feasible {
            x.iter_mut()
                .zip(self.lower.iter().zip(self.upper.iter()))
                .for_each(|(xi, (li, ui))| *xi = (*xi).clamp(*li, *ui));
        }

        not_feasible
    }
}

impl<T: RealField> FromIterator<(T, T)> for Domain<T> {
    fn from_iter<I: IntoIterator<Item = (T, T)>>(iter: I) -> Self {
        let (lower, upper) = iter.into_iter().unzip();
        Self::rect(lower, upper)
    }
}

fn estimate_magnitude<T: RealField>(lower: T, upper: T) -> T {
    if !(lower.is_finite() && upper.is_finite()) {
        return T::one();
    }

    let ten: T = convert(10.0);
    let half: T = convert(0.5);

    let avg = half * (lower.abs() + upper.abs());
    let magnitude = ten.powf(avg.abs().log10().trunc());

    // For a [0, 0] range the estimate is undefined. Such ranges are allowed so
    // that a variable can be fixed to a value.
    if magnitude.is_finite() && magnitude > T::zero() {
        magnitude
    } else {
        T::one()
    }
}

#[cfg(test)]
#[allow(clippy::float_cmp)]
mod tests {
    use super::*;

    use nalgebra::dvector;

    #[test]
    fn magnitude() {
        assert_eq!(estimate_magnitude(-1e10f64, 1e10).log10(), 10.0);
        assert_eq!(estimate_magnitude(-1e4f64, -1e2).log10(), 3.0);
        assert_eq!(estimate_magnitude(-6e-6f64, 9e-6).log10().trunc(), -5.0);
    }

    #[test]
    fn magnitude_when_bound_is_zero() {
        assert_eq!(estimate_magnitude(0f64, 1e2).log10(), 1.0);
        assert_eq!(estimate_magnitude(-1e2f64, 0.0).log10(), 1.0);
    }

    #[test]
    fn magnitude_edge_cases() {
        assert_eq!(estimate_magnitude(0.0f64, 0.0), 1.0);
        assert_eq!(estimate_magnitude(f64::NEG_INFINITY, 10.0), 1.0);
    }

    #[test]
    fn projection() {
        let dom = Domain::rect(vec![0.0, -1.0], vec![1.0, 1.0]);

        let mut x = dvector![0.5, 0.5];
        assert!(!dom.project(&mut x));
        assert_eq!(x, dvector![0.5, 0.5]);

        let mut x = dvector![2.0, -3.0];
        assert!(dom.project(&mut x));
        assert_eq!(x, dvector![1.0, -1.0]);
    }

    #[test]
    fn from_bounds_iterator() {
        let dom: Domain<f64> = [(-10.0, 10.0), (0.0, 1.0)].into_iter().collect();
        assert_eq!(dom.dim(), 2);
    }
}
