//! Element trait for mapping Rust types to DType

use super::DType;
use bytemuck::{Pod, Zeroable};
use std::fmt::Debug;
use std::ops::{Add, Div, Mul, Sub};

/// Trait for types that can be elements of a device matrix or broadcast vector
///
/// # Bounds
/// - `Copy + Send + Sync + 'static` - kernels move scalars freely between simulated threads
/// - `Pod + Zeroable` - device memory is reinterpreted between scalar and wide views
/// - `Add + Sub + Mul + Div` - closure operators on the host
/// - `PartialOrd` - min/max operators
///
/// The named operators go through the `wrapping_*` methods instead, so
/// integer results are the same in every build profile and on every backend.
pub trait Element:
    Copy
    + Clone
    + Debug
    + Send
    + Sync
    + Pod
    + Zeroable
    + 'static
    + Add<Output = Self>
    + Sub<Output = Self>
    + Mul<Output = Self>
    + Div<Output = Self>
    + PartialOrd
{
    /// The corresponding DType for this Rust type
    const DTYPE: DType;

    /// Convert to f64 for tolerance checks and host reference code
    fn to_f64(self) -> f64;

    /// Convert from f64 to this type (truncating for integers)
    fn from_f64(v: f64) -> Self;

    /// Zero value
    fn zero() -> Self;

    /// One value
    fn one() -> Self;

    /// Addition, modular for integers
    fn wrapping_add(self, rhs: Self) -> Self;

    /// Subtraction, modular for integers
    fn wrapping_sub(self, rhs: Self) -> Self;

    /// Multiplication, modular for integers
    fn wrapping_mul(self, rhs: Self) -> Self;

    /// Division
    ///
    /// Integers: `x / 0 == 0` and `MIN / -1 == MIN`. Floats follow IEEE 754.
    fn wrapping_div(self, rhs: Self) -> Self;
}

macro_rules! impl_element_float {
    ($ty:ty, $dtype:expr) => {
        impl Element for $ty {
            const DTYPE: DType = $dtype;

            #[inline]
            fn to_f64(self) -> f64 {
                self as f64
            }

            #[inline]
            fn from_f64(v: f64) -> Self {
                v as $ty
            }

            #[inline]
            fn zero() -> Self {
                0.0
            }

            #[inline]
            fn one() -> Self {
                1.0
            }

            #[inline]
            fn wrapping_add(self, rhs: Self) -> Self {
                self + rhs
            }

            #[inline]
            fn wrapping_sub(self, rhs: Self) -> Self {
                self - rhs
            }

            #[inline]
            fn wrapping_mul(self, rhs: Self) -> Self {
                self * rhs
            }

            #[inline]
            fn wrapping_div(self, rhs: Self) -> Self {
                self / rhs
            }
        }
    };
}

macro_rules! impl_element_int {
    ($ty:ty, $dtype:expr) => {
        impl Element for $ty {
            const DTYPE: DType = $dtype;

            #[inline]
            fn to_f64(self) -> f64 {
                self as f64
            }

            #[inline]
            fn from_f64(v: f64) -> Self {
                v as $ty
            }

            #[inline]
            fn zero() -> Self {
                0
            }

            #[inline]
            fn one() -> Self {
                1
            }

            #[inline]
            fn wrapping_add(self, rhs: Self) -> Self {
                <$ty>::wrapping_add(self, rhs)
            }

            #[inline]
            fn wrapping_sub(self, rhs: Self) -> Self {
                <$ty>::wrapping_sub(self, rhs)
            }

            #[inline]
            fn wrapping_mul(self, rhs: Self) -> Self {
                <$ty>::wrapping_mul(self, rhs)
            }

            #[inline]
            fn wrapping_div(self, rhs: Self) -> Self {
                if rhs == 0 { 0 } else { <$ty>::wrapping_div(self, rhs) }
            }
        }
    };
}

impl_element_float!(f64, DType::F64);
impl_element_float!(f32, DType::F32);
impl_element_int!(i64, DType::I64);
impl_element_int!(i32, DType::I32);
impl_element_int!(i16, DType::I16);
impl_element_int!(i8, DType::I8);
impl_element_int!(u64, DType::U64);
impl_element_int!(u32, DType::U32);
impl_element_int!(u16, DType::U16);
impl_element_int!(u8, DType::U8);
