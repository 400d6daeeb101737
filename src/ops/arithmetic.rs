//! Elementwise operators applied by the linewise engine
//!
//! An operator combines one matrix element with the broadcast values that
//! line up with it, one per vector: `out = op(x, [v0, v1, ...])`.

use crate::dtype::Element;

/// Binary operation kind
///
/// With several broadcast vectors the operation folds left:
/// `op(...op(op(x, v0), v1)..., vn)`.
///
/// Integer arithmetic wraps; integer division by zero yields zero (see
/// [`Element::wrapping_div`]).
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum BinaryOp {
    /// Addition: a + b
    Add,
    /// Subtraction: a - b
    Sub,
    /// Multiplication: a * b
    Mul,
    /// Division: a / b
    Div,
    /// Minimum: min(a, b)
    Min,
    /// Maximum: max(a, b)
    Max,
}

impl BinaryOp {
    /// All operations, in kernel-table order
    pub const ALL: [Self; 6] = [Self::Add, Self::Sub, Self::Mul, Self::Div, Self::Min, Self::Max];

    /// Apply to a single pair
    #[inline]
    pub fn apply<T: Element>(self, a: T, b: T) -> T {
        match self {
            Self::Add => a.wrapping_add(b),
            Self::Sub => a.wrapping_sub(b),
            Self::Mul => a.wrapping_mul(b),
            Self::Div => a.wrapping_div(b),
            Self::Min => {
                if b < a {
                    b
                } else {
                    a
                }
            }
            Self::Max => {
                if b > a {
                    b
                } else {
                    a
                }
            }
        }
    }

    /// Left fold of `x` over `args`
    #[inline]
    pub fn fold<T: Element>(self, x: T, args: &[T]) -> T {
        args.iter().fold(x, |acc, &v| self.apply(acc, v))
    }

    /// Short name used in kernel symbols
    pub const fn name(self) -> &'static str {
        match self {
            Self::Add => "add",
            Self::Sub => "sub",
            Self::Mul => "mul",
            Self::Div => "div",
            Self::Min => "min",
            Self::Max => "max",
        }
    }
}

impl std::fmt::Display for BinaryOp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// An operator the linewise engine can apply
///
/// `apply` receives one matrix element and the broadcast values aligned with
/// it, in vector order. It must be pure: the engine may call it in any order
/// and from many threads at once.
pub trait LinewiseFn<T: Element>: Send + Sync + 'static {
    /// Combine `x` with the broadcast `args`
    fn apply(&self, x: T, args: &[T]) -> T;

    /// The named operation this operator is equivalent to, if any
    ///
    /// Backends that cannot run host code (CUDA) only accept operators that
    /// report one.
    fn device_op(&self) -> Option<BinaryOp> {
        None
    }
}

impl<T: Element> LinewiseFn<T> for BinaryOp {
    #[inline]
    fn apply(&self, x: T, args: &[T]) -> T {
        self.fold(x, args)
    }

    fn device_op(&self) -> Option<BinaryOp> {
        Some(*self)
    }
}

impl<T, F> LinewiseFn<T> for F
where
    T: Element,
    F: Fn(T, &[T]) -> T + Send + Sync + 'static,
{
    #[inline]
    fn apply(&self, x: T, args: &[T]) -> T {
        self(x, args)
    }
}

/// Pin down the signature of an operator closure
///
/// `linewise_fn(|x, v| x * v[0])` lets the closure's argument types be
/// inferred from the element type.
pub fn linewise_fn<T, F>(f: F) -> F
where
    T: Element,
    F: Fn(T, &[T]) -> T + Send + Sync + 'static,
{
    f
}
