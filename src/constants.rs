//! Size-class boundaries and tuning constants.
//!
//! Protocol-shaped magic numbers live here, the way the teacher separates
//! shared wire constants from operational sizing (`config.rs`).

/// Upper (inclusive) bound of the SMALL size class.
pub const SMALL_MAX: usize = 1 << 20; // 1 MiB
/// Upper (inclusive) bound of the LARGE size class.
pub const LARGE_MAX: usize = 1 << 25; // 32 MiB

/// Round-up granularity for the SMALL size class.
pub const SMALL_GRANULARITY: usize = 512;
/// Round-up granularity for the LARGE size class.
pub const LARGE_GRANULARITY: usize = 128 * 1024;
/// Round-up granularity for the HUGE size class (served exactly).
pub const HUGE_GRANULARITY: usize = 1024 * 1024;

/// SimplePool: above this size, oversize matches are bounded to `4x`; at or
/// below it, any fit is accepted.
pub const SIMPLE_TIERED_CUTOFF: usize = 1 << 20; // 1 MiB
/// SimplePool: oversize factor applied above `SIMPLE_TIERED_CUTOFF`.
pub const SIMPLE_OVERSIZE_FACTOR: usize = 4;

/// Size classes a request can be sorted into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SizeClass {
    Small,
    Large,
    Huge,
}

impl SizeClass {
    pub fn of(size: usize) -> SizeClass {
        if size <= SMALL_MAX {
            SizeClass::Small
        } else if size <= LARGE_MAX {
            SizeClass::Large
        } else {
            SizeClass::Huge
        }
    }

    pub fn granularity(self) -> usize {
        match self {
            SizeClass::Small => SMALL_GRANULARITY,
            SizeClass::Large => LARGE_GRANULARITY,
            SizeClass::Huge => HUGE_GRANULARITY,
        }
    }

    pub fn may_split(self) -> bool {
        !matches!(self, SizeClass::Huge)
    }

    /// Round `size` up to this class's granularity.
    pub fn round_up(self, size: usize) -> usize {
        let g = self.granularity();
        size.div_ceil(g) * g
    }

    pub const ALL: [SizeClass; 3] = [SizeClass::Small, SizeClass::Large, SizeClass::Huge];
}
