//! Index types callers use to describe matrix extents

use num_traits::{NumCast, PrimInt, ToPrimitive};
use std::fmt::{Debug, Display};

use crate::error::{Error, Result};

/// Integer type used for `row_len`, `n_rows` and derived element counts
///
/// Extents are validated in the caller's index type (so `row_len * n_rows`
/// must not overflow it) and then carried as `usize` inside the kernels.
pub trait IndexType: PrimInt + NumCast + ToPrimitive + Debug + Display + Send + Sync + 'static {
    /// Name used in diagnostics
    const NAME: &'static str;

    /// Convert a non-negative extent to `usize`
    fn to_extent(self, arg: &'static str) -> Result<usize> {
        if self < Self::zero() {
            return Err(Error::InvalidArgument {
                arg,
                reason: format!("extent must be non-negative, got {}", self),
            });
        }
        self.to_usize().ok_or(Error::IndexOverflow {
            index_type: Self::NAME,
            what: arg,
        })
    }

    /// `row_len * n_rows`, checked in this index type
    fn checked_total(row_len: Self, n_rows: Self) -> Result<usize> {
        row_len.to_extent("row_len")?;
        n_rows.to_extent("n_rows")?;
        let total = row_len.checked_mul(&n_rows).ok_or(Error::IndexOverflow {
            index_type: Self::NAME,
            what: "row_len * n_rows",
        })?;
        total.to_extent("row_len * n_rows")
    }
}

impl IndexType for i32 {
    const NAME: &'static str = "i32";
}

impl IndexType for i64 {
    const NAME: &'static str = "i64";
}

impl IndexType for u32 {
    const NAME: &'static str = "u32";
}

impl IndexType for u64 {
    const NAME: &'static str = "u64";
}

impl IndexType for usize {
    const NAME: &'static str = "usize";
}
