use super::domain::Domain;

/// Extension of [`nalgebra::RealField`] with constants used by numerical
/// algorithms in this crate.
pub trait RealField: nalgebra::RealField + Copy {
    /// Square root of the machine epsilon. This is the standard step-size
    /// scale for first-order finite differences.
    const EPSILON_SQRT: Self;

    /// Cube root of the machine epsilon. This is the standard step-size scale
    /// for second-order finite differences.
    const EPSILON_CBRT: Self;
}

impl RealField for f64 {
    const EPSILON_SQRT: Self = 1.4901161193847656e-8;
    const EPSILON_CBRT: Self = 6.0554544523933395e-6;
}

impl RealField for f32 {
    const EPSILON_SQRT: Self = 3.4526698e-4;
    const EPSILON_CBRT: Self = 4.9215667e-3;
}

/// The base trait for objectives given to the optimizers.
///
/// An objective needs to specify the scalar type it works with and the
/// [domain](Domain) of its variables. The actual evaluation capabilities are
/// added by the [`Function`](super::function::Function),
/// [`Gradient`](super::function::Gradient) and
/// [`Hessian`](super::function::Hessian) traits.
pub trait Problem {
    /// Scalar type the objective works in, typically [`f64`].
    type Field: RealField;

    /// The domain (bound constraints) the variables live in. Use
    /// [`Domain::unconstrained`] when there are no bounds.
    fn domain(&self) -> Domain<Self::Field>;
}
