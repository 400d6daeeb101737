//! Power-of-two arithmetic and load-width selection
//!
//! [`Pow2`] is the compile-time helper: every method is a mask or a shift.
//! [`VecWidth`] is the runtime-enumerated set of transaction widths the
//! kernels are instantiated for; it dispatches to the matching `Pow2`.

/// Arithmetic helpers for a compile-time power of two `N`
///
/// Works on byte addresses (rounding pointers to a transaction boundary) as well
/// as on element counts (dividing a length into wide chunks).
pub struct Pow2<const N: u64>;

impl<const N: u64> Pow2<N> {
    const CHECK: () = assert!(N.is_power_of_two(), "Pow2 requires a power of two");

    /// The power of two itself
    pub const VALUE: u64 = {
        let () = Self::CHECK;
        N
    };

    /// `VALUE - 1`
    pub const MASK: u64 = Self::VALUE - 1;

    /// `log2(VALUE)`
    pub const LOG2: u32 = Self::VALUE.trailing_zeros();

    /// `x / VALUE`
    #[inline]
    pub const fn div(x: u64) -> u64 {
        x >> Self::LOG2
    }

    /// `x % VALUE`
    #[inline]
    pub const fn rem(x: u64) -> u64 {
        x & Self::MASK
    }

    /// Nearest multiple of `VALUE` at or after `x`
    #[inline]
    pub const fn round_up(x: u64) -> u64 {
        (x + Self::MASK) & !Self::MASK
    }

    /// Nearest multiple of `VALUE` at or before `x`
    #[inline]
    pub const fn round_down(x: u64) -> u64 {
        x & !Self::MASK
    }

    /// Whether `x` is a multiple of `VALUE`
    #[inline]
    pub const fn is_aligned(x: u64) -> bool {
        Self::rem(x) == 0
    }

    /// Whether `a` and `b` have the same remainder modulo `VALUE`
    #[inline]
    pub const fn are_same_align_offsets(a: u64, b: u64) -> bool {
        Self::rem(a) == Self::rem(b)
    }
}

/// Width in bytes of one wide load/store transaction
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(u8)]
pub enum VecWidth {
    /// 1-byte (scalar for `u8`/`i8`)
    B1 = 1,
    /// 2 bytes
    B2 = 2,
    /// 4 bytes
    B4 = 4,
    /// 8 bytes
    B8 = 8,
    /// 16 bytes (the widest native load)
    B16 = 16,
}

macro_rules! dispatch_pow2 {
    ($width:expr, $method:ident($($arg:expr),*)) => {
        match $width {
            VecWidth::B1 => Pow2::<1>::$method($($arg),*),
            VecWidth::B2 => Pow2::<2>::$method($($arg),*),
            VecWidth::B4 => Pow2::<4>::$method($($arg),*),
            VecWidth::B8 => Pow2::<8>::$method($($arg),*),
            VecWidth::B16 => Pow2::<16>::$method($($arg),*),
        }
    };
}

impl VecWidth {
    /// Widest supported transaction
    pub const MAX: Self = Self::B16;

    /// All widths, narrowest first
    pub const ALL: [Self; 5] = [Self::B1, Self::B2, Self::B4, Self::B8, Self::B16];

    /// Width in bytes
    #[inline]
    pub const fn bytes(self) -> usize {
        self as usize
    }

    /// Width for an exact byte count, if it is one of the supported widths
    pub const fn from_bytes(bytes: usize) -> Option<Self> {
        match bytes {
            1 => Some(Self::B1),
            2 => Some(Self::B2),
            4 => Some(Self::B4),
            8 => Some(Self::B8),
            16 => Some(Self::B16),
            _ => None,
        }
    }

    /// The scalar width for an element size (one element per transaction)
    pub const fn scalar(elem_size: usize) -> Option<Self> {
        Self::from_bytes(elem_size)
    }

    /// Half this width, never going below `floor_bytes`
    #[inline]
    pub fn halve(self, floor_bytes: usize) -> Self {
        let half = (self.bytes() >> 1).max(floor_bytes).max(1);
        Self::from_bytes(half).unwrap_or(self)
    }

    /// Number of `elem_size`-byte scalars one transaction carries
    #[inline]
    pub const fn elems(self, elem_size: usize) -> usize {
        self.bytes() / elem_size
    }

    /// Round an address up to this width
    #[inline]
    pub fn round_up(self, addr: u64) -> u64 {
        dispatch_pow2!(self, round_up(addr))
    }

    /// Round an address down to this width
    #[inline]
    pub fn round_down(self, addr: u64) -> u64 {
        dispatch_pow2!(self, round_down(addr))
    }

    /// Whether an address is aligned to this width
    #[inline]
    pub fn is_aligned(self, addr: u64) -> bool {
        dispatch_pow2!(self, is_aligned(addr))
    }

    /// Whether two addresses share the same offset modulo this width
    #[inline]
    pub fn are_same_align_offsets(self, a: u64, b: u64) -> bool {
        dispatch_pow2!(self, are_same_align_offsets(a, b))
    }
}

impl std::fmt::Display for VecWidth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}B", self.bytes())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pow2_rounding() {
        assert_eq!(Pow2::<16>::round_up(0), 0);
        assert_eq!(Pow2::<16>::round_up(1), 16);
        assert_eq!(Pow2::<16>::round_up(16), 16);
        assert_eq!(Pow2::<16>::round_up(17), 32);
        assert_eq!(Pow2::<16>::round_down(31), 16);
        assert_eq!(Pow2::<16>::round_down(32), 32);
        assert_eq!(Pow2::<4>::div(13), 3);
        assert_eq!(Pow2::<4>::rem(13), 1);
        assert_eq!(Pow2::<32>::LOG2, 5);
    }

    #[test]
    fn test_pow2_same_align_offsets() {
        assert!(Pow2::<16>::are_same_align_offsets(0x1004, 0x2004));
        assert!(!Pow2::<16>::are_same_align_offsets(0x1004, 0x2008));
        assert!(Pow2::<4>::are_same_align_offsets(0x1004, 0x2008));
    }

    #[test]
    fn test_rounding_brackets_every_address() {
        for width in VecWidth::ALL {
            for addr in 0u64..100 {
                let up = width.round_up(addr);
                let down = width.round_down(addr);
                assert!(down <= addr && addr <= up);
                assert!(width.is_aligned(up) && width.is_aligned(down));
                assert!(up - down == 0 || up - down == width.bytes() as u64);
            }
        }
    }

    #[test]
    fn test_halve_respects_floor() {
        assert_eq!(VecWidth::B16.halve(4), VecWidth::B8);
        assert_eq!(VecWidth::B8.halve(4), VecWidth::B4);
        assert_eq!(VecWidth::B4.halve(4), VecWidth::B4);
        assert_eq!(VecWidth::B2.halve(1), VecWidth::B1);
        assert_eq!(VecWidth::B1.halve(1), VecWidth::B1);
    }

    #[test]
    fn test_elems_per_width() {
        assert_eq!(VecWidth::B16.elems(4), 4);
        assert_eq!(VecWidth::B16.elems(8), 2);
        assert_eq!(VecWidth::B16.elems(1), 16);
        assert_eq!(VecWidth::B4.elems(4), 1);
    }
}
