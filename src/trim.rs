//! Memory pressure levels and how much a cache gives back for each.
//!
//! When the host signals memory pressure, callers pass the level to
//! [`MemoryCache::trim`](crate::MemoryCache::trim). The cache asks its
//! [`CacheTrimStrategy`] for a ratio in `[0, 1]` and evicts exclusively owned
//! entries until its total size is at most `(1 - ratio)` of what it was.
//! Entries held by clients are never trimmed.

/// Classification of a memory pressure signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MemoryTrimType {
    /// The process is close to its heap limit.
    OnCloseToHeapLimit,
    /// The system is low on memory and the app is in the foreground.
    OnSystemLowMemoryWhileAppInForeground,
    /// The system is critically low on memory and the app is in the foreground.
    OnSystemMemoryCriticallyLowWhileAppInForeground,
    /// The system is low on memory and the app is in the background.
    OnSystemLowMemoryWhileAppInBackground,
    /// The app just moved to the background.
    OnAppBackgrounded,
}

impl MemoryTrimType {
    /// All pressure levels, mildest first.
    pub const ALL: [MemoryTrimType; 5] = [
        MemoryTrimType::OnCloseToHeapLimit,
        MemoryTrimType::OnSystemLowMemoryWhileAppInForeground,
        MemoryTrimType::OnSystemMemoryCriticallyLowWhileAppInForeground,
        MemoryTrimType::OnSystemLowMemoryWhileAppInBackground,
        MemoryTrimType::OnAppBackgrounded,
    ];

    /// Fraction of the cache that should be freed for this level.
    pub fn suggested_trim_ratio(self) -> f64 {
        match self {
            MemoryTrimType::OnCloseToHeapLimit
            | MemoryTrimType::OnSystemLowMemoryWhileAppInForeground
            | MemoryTrimType::OnSystemMemoryCriticallyLowWhileAppInForeground => 0.5,
            MemoryTrimType::OnSystemLowMemoryWhileAppInBackground
            | MemoryTrimType::OnAppBackgrounded => 1.0,
        }
    }
}

/// Maps a pressure level to the fraction of the cache to free.
///
/// Any `Fn(MemoryTrimType) -> f64` closure is a strategy. Returned ratios
/// are clamped to `[0, 1]` by the cache.
pub trait CacheTrimStrategy: Send + Sync {
    /// Returns the trim ratio for `trim_type`.
    fn trim_ratio(&self, trim_type: MemoryTrimType) -> f64;
}

impl<F> CacheTrimStrategy for F
where
    F: Fn(MemoryTrimType) -> f64 + Send + Sync,
{
    #[inline]
    fn trim_ratio(&self, trim_type: MemoryTrimType) -> f64 {
        self(trim_type)
    }
}

/// Strategy that follows [`MemoryTrimType::suggested_trim_ratio`].
#[derive(Debug, Clone, Copy, Default)]
pub struct SuggestedTrimStrategy;

impl CacheTrimStrategy for SuggestedTrimStrategy {
    fn trim_ratio(&self, trim_type: MemoryTrimType) -> f64 {
        trim_type.suggested_trim_ratio()
    }
}

/// Clamps a strategy's answer into `[0, 1]`. NaN counts as "trim nothing".
pub(crate) fn clamp_ratio(ratio: f64) -> f64 {
    if ratio.is_nan() {
        0.0
    } else {
        ratio.clamp(0.0, 1.0)
    }
}
