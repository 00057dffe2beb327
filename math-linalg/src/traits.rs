//! Core traits for linear algebra operations
//!
//! This module defines the fundamental abstractions shared by the assembly crates:
//! - [`ComplexField`]: Trait for scalar types (complex and real numbers)
//! - [`LinearOperator`]: Trait for matrix-like objects that can perform matrix-vector products
//! - [`TransposeMode`]: Selects plain, conjugated, transposed or adjoint application

use ndarray::Array1;
use num_complex::{Complex32, Complex64};
use num_traits::{Float, FromPrimitive, NumAssign, One, ToPrimitive, Zero};
use std::fmt::Debug;
use std::ops::Neg;

/// Trait for scalar types that can be used in linear algebra operations.
///
/// This trait abstracts over real and complex number types, providing
/// a unified interface for conjugation, norms, inversion and precision
/// conversion.
///
/// Kernel values are always evaluated in double precision; [`ComplexField::from_c64`]
/// narrows them to the result type and [`ComplexField::to_c64`] widens them back.
///
/// # Implementations
///
/// Provided for exactly four types:
/// - `Complex64` (default for Helmholtz problems)
/// - `Complex32` (for memory-constrained applications)
/// - `f64` (for real-valued problems)
/// - `f32` (for real-valued, memory-constrained applications)
pub trait ComplexField:
    NumAssign + Clone + Copy + Send + Sync + Debug + Zero + One + Neg<Output = Self> + 'static
{
    /// The real number type underlying this field
    type Real: Float + NumAssign + FromPrimitive + ToPrimitive + Send + Sync + Debug + 'static;

    /// Whether values of this type carry an imaginary part
    const IS_COMPLEX: bool;

    /// Complex conjugate
    fn conj(&self) -> Self;

    /// Squared magnitude |z|²
    fn norm_sqr(&self) -> Self::Real;

    /// Magnitude |z|
    fn norm(&self) -> Self::Real {
        self.norm_sqr().sqrt()
    }

    /// Multiplicative inverse (1/z)
    fn inv(&self) -> Self;

    /// Widen to a double precision complex number
    fn to_c64(&self) -> Complex64;

    /// Narrow a double precision complex number to this type.
    ///
    /// Real types keep the real part only.
    fn from_c64(z: Complex64) -> Self;

    /// Magnitude in double precision
    fn modulus(&self) -> f64 {
        self.to_c64().norm()
    }
}

impl ComplexField for Complex64 {
    type Real = f64;
    const IS_COMPLEX: bool = true;

    #[inline]
    fn conj(&self) -> Self {
        Complex64::conj(self)
    }

    #[inline]
    fn norm_sqr(&self) -> f64 {
        self.re * self.re + self.im * self.im
    }

    #[inline]
    fn inv(&self) -> Self {
        let denom = self.norm_sqr();
        Complex64::new(self.re / denom, -self.im / denom)
    }

    #[inline]
    fn to_c64(&self) -> Complex64 {
        *self
    }

    #[inline]
    fn from_c64(z: Complex64) -> Self {
        z
    }
}

impl ComplexField for Complex32 {
    type Real = f32;
    const IS_COMPLEX: bool = true;

    #[inline]
    fn conj(&self) -> Self {
        Complex32::conj(self)
    }

    #[inline]
    fn norm_sqr(&self) -> f32 {
        self.re * self.re + self.im * self.im
    }

    #[inline]
    fn inv(&self) -> Self {
        let denom = self.norm_sqr();
        Complex32::new(self.re / denom, -self.im / denom)
    }

    #[inline]
    fn to_c64(&self) -> Complex64 {
        Complex64::new(self.re as f64, self.im as f64)
    }

    #[inline]
    fn from_c64(z: Complex64) -> Self {
        Complex32::new(z.re as f32, z.im as f32)
    }
}

impl ComplexField for f64 {
    type Real = f64;
    const IS_COMPLEX: bool = false;

    #[inline]
    fn conj(&self) -> Self {
        *self
    }

    #[inline]
    fn norm_sqr(&self) -> f64 {
        *self * *self
    }

    #[inline]
    fn inv(&self) -> Self {
        1.0 / *self
    }

    #[inline]
    fn to_c64(&self) -> Complex64 {
        Complex64::new(*self, 0.0)
    }

    #[inline]
    fn from_c64(z: Complex64) -> Self {
        z.re
    }
}

impl ComplexField for f32 {
    type Real = f32;
    const IS_COMPLEX: bool = false;

    #[inline]
    fn conj(&self) -> Self {
        *self
    }

    #[inline]
    fn norm_sqr(&self) -> f32 {
        *self * *self
    }

    #[inline]
    fn inv(&self) -> Self {
        1.0 / *self
    }

    #[inline]
    fn to_c64(&self) -> Complex64 {
        Complex64::new(*self as f64, 0.0)
    }

    #[inline]
    fn from_c64(z: Complex64) -> Self {
        z.re as f32
    }
}

/// How an operator is applied to a vector
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TransposeMode {
    /// y = A x
    NoTranspose,
    /// y = conj(A) x
    Conjugate,
    /// y = Aᵀ x
    Transpose,
    /// y = Aᴴ x
    ConjugateTranspose,
}

impl TransposeMode {
    /// Whether rows and columns swap roles
    pub fn is_transposed(self) -> bool {
        matches!(self, Self::Transpose | Self::ConjugateTranspose)
    }

    /// Whether entries are conjugated
    pub fn is_conjugated(self) -> bool {
        matches!(self, Self::Conjugate | Self::ConjugateTranspose)
    }

    /// Build a mode from its two components
    pub fn from_parts(transposed: bool, conjugated: bool) -> Self {
        match (transposed, conjugated) {
            (false, false) => Self::NoTranspose,
            (false, true) => Self::Conjugate,
            (true, false) => Self::Transpose,
            (true, true) => Self::ConjugateTranspose,
        }
    }

    /// Mode equivalent to applying `self` to an operator that is already `inner`-transformed
    pub fn compose(self, inner: TransposeMode) -> Self {
        Self::from_parts(
            self.is_transposed() ^ inner.is_transposed(),
            self.is_conjugated() ^ inner.is_conjugated(),
        )
    }

    /// The same conjugation with rows and columns swapped
    pub fn flip_transpose(self) -> Self {
        Self::from_parts(!self.is_transposed(), self.is_conjugated())
    }
}

/// Trait for linear operators (matrices) that can perform matrix-vector products.
///
/// This abstraction allows dense matrices, sparse matrices and
/// hierarchical matrices to be used interchangeably.
pub trait LinearOperator<T: ComplexField>: Send + Sync {
    /// Number of rows in the operator
    fn num_rows(&self) -> usize;

    /// Number of columns in the operator
    fn num_cols(&self) -> usize;

    /// Apply the operator: y = A * x
    fn apply(&self, x: &Array1<T>) -> Array1<T>;

    /// Apply the transpose: y = A^T * x
    fn apply_transpose(&self, x: &Array1<T>) -> Array1<T>;

    /// Apply the Hermitian (conjugate transpose): y = A^H * x
    fn apply_hermitian(&self, x: &Array1<T>) -> Array1<T> {
        // conj(A^T * conj(x))
        let x_conj: Array1<T> = x.mapv(|v| v.conj());
        self.apply_transpose(&x_conj).mapv(|v| v.conj())
    }

    /// Apply the entrywise conjugate: y = conj(A) * x
    fn apply_conjugate(&self, x: &Array1<T>) -> Array1<T> {
        let x_conj: Array1<T> = x.mapv(|v| v.conj());
        self.apply(&x_conj).mapv(|v| v.conj())
    }

    /// Apply in the given mode
    fn apply_mode(&self, mode: TransposeMode, x: &Array1<T>) -> Array1<T> {
        match mode {
            TransposeMode::NoTranspose => self.apply(x),
            TransposeMode::Conjugate => self.apply_conjugate(x),
            TransposeMode::Transpose => self.apply_transpose(x),
            TransposeMode::ConjugateTranspose => self.apply_hermitian(x),
        }
    }
}
