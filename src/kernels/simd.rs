//! Runtime SIMD capability detection
//!
//! Micro-kernel variants are selected once per call from the detected level;
//! detection itself runs once per process and is cached. Targets without a
//! supported instruction set silently fall back to portable kernels that
//! keep the same per-block accumulation order.

use std::sync::OnceLock;

/// SIMD capability level detected at runtime
///
/// Ordered: higher values indicate wider vectors.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
#[allow(dead_code)] // Variants may not be constructed on all architectures
pub enum SimdLevel {
    /// AVX-512F with FMA (512-bit vectors, 16 f32 lanes)
    Avx512 = 3,
    /// AVX2 with FMA (256-bit vectors, 8 f32 lanes)
    Avx2Fma = 2,
    /// NEON baseline for AArch64 (128-bit vectors, 4 f32 lanes)
    Neon = 1,
    /// Scalar fallback (no SIMD)
    Scalar = 0,
}

impl SimdLevel {
    /// Number of f32 elements per vector register
    #[inline]
    pub const fn f32_lanes(self) -> usize {
        match self {
            Self::Avx512 => 16,
            Self::Avx2Fma => 8,
            Self::Neon => 4,
            Self::Scalar => 1,
        }
    }

    /// Name of this SIMD level as a string
    #[inline]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Avx512 => "AVX-512",
            Self::Avx2Fma => "AVX2+FMA",
            Self::Neon => "NEON",
            Self::Scalar => "Scalar",
        }
    }
}

impl std::fmt::Display for SimdLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

static SIMD_LEVEL: OnceLock<SimdLevel> = OnceLock::new();

/// Detect the best available SIMD level for the current CPU
///
/// The first call performs detection; subsequent calls return the cached
/// result.
#[inline]
pub fn detect_simd() -> SimdLevel {
    *SIMD_LEVEL.get_or_init(detect_simd_uncached)
}

#[cold]
fn detect_simd_uncached() -> SimdLevel {
    #[cfg(target_arch = "x86_64")]
    {
        if is_x86_feature_detected!("avx512f")
            && is_x86_feature_detected!("avx512vl")
            && is_x86_feature_detected!("fma")
        {
            return SimdLevel::Avx512;
        }
        if is_x86_feature_detected!("avx2") && is_x86_feature_detected!("fma") {
            return SimdLevel::Avx2Fma;
        }
    }

    #[cfg(target_arch = "aarch64")]
    {
        // NEON is mandatory for AArch64.
        return SimdLevel::Neon;
    }

    #[allow(unreachable_code)]
    SimdLevel::Scalar
}
