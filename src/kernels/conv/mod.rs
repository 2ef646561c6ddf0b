//! Convolution kernels
//!
//! The generic path gathers input patches into a column matrix (im2col for
//! 2D, vol2col for 3D) and feeds the GEMM engine; 1D convolutions are
//! normalized to 2D by unsqueezing a size-1 spatial axis. A pointwise
//! convolution (all-1 kernel, stride 1, no padding, no dilation) skips the
//! gather entirely and runs the flattened GEMM. True depthwise 2D
//! convolutions take a fused direct kernel guarded by a precondition check.
//!
//! Bias and the fused activation's lower clamp are applied while finishing
//! each output block, not as a separate pass over the whole tensor.

pub mod depthwise;
pub mod im2col;

/// Maximum spatial rank
pub const MAX_SPATIAL: usize = 3;

/// Static convolution configuration
///
/// Spatial arrays are used up to `spatial_rank`; trailing axes must hold the
/// neutral values (extent 1, kernel 1, stride 1, pad 0, dilation 1), which
/// dispatch validation enforces.
#[derive(Clone, Debug)]
pub struct ConvParams {
    /// Batch count
    pub batch: usize,
    /// Group count; `c_in` and `c_out` must both divide by it
    pub groups: usize,
    /// Total input channels
    pub c_in: usize,
    /// Total output channels
    pub c_out: usize,
    /// Spatial rank: 1, 2 or 3
    pub spatial_rank: usize,
    /// Input spatial extents
    pub input: [usize; MAX_SPATIAL],
    /// Kernel spatial extents
    pub kernel: [usize; MAX_SPATIAL],
    /// Strides
    pub stride: [usize; MAX_SPATIAL],
    /// Leading padding per axis
    pub pad_begin: [usize; MAX_SPATIAL],
    /// Trailing padding per axis
    pub pad_end: [usize; MAX_SPATIAL],
    /// Dilations
    pub dilation: [usize; MAX_SPATIAL],
    /// Fuse a ReLU epilogue (lower clamp at 0) into the output write
    pub relu: bool,
}

impl ConvParams {
    /// Output spatial extents implied by the configuration
    pub fn output_dims(&self) -> [usize; MAX_SPATIAL] {
        let mut out = [1usize; MAX_SPATIAL];
        for ax in 0..self.spatial_rank {
            let span = self.input[ax] + self.pad_begin[ax] + self.pad_end[ax];
            let eff_k = self.dilation[ax] * (self.kernel[ax] - 1) + 1;
            out[ax] = (span - eff_k) / self.stride[ax] + 1;
        }
        out
    }

    /// Lower clamp of the fused epilogue
    #[inline]
    pub(crate) fn clamp_lo(&self) -> f32 {
        if self.relu {
            0.0
        } else {
            f32::NEG_INFINITY
        }
    }

    /// Rewrite a 1D convolution as 2D with a size-1 leading spatial axis
    pub(crate) fn normalized(&self) -> ConvParams {
        if self.spatial_rank != 1 {
            return self.clone();
        }
        let mut p = self.clone();
        p.spatial_rank = 2;
        p.input = [1, self.input[0], 1];
        p.kernel = [1, self.kernel[0], 1];
        p.stride = [1, self.stride[0], 1];
        p.pad_begin = [0, self.pad_begin[0], 0];
        p.pad_end = [0, self.pad_end[0], 0];
        p.dilation = [1, self.dilation[0], 1];
        p
    }

    /// All-1 kernel, stride 1, no padding, no dilation: the gather step is
    /// the identity and the convolution is a plain flattened GEMM.
    pub(crate) fn is_pointwise(&self) -> bool {
        (0..self.spatial_rank).all(|ax| {
            self.kernel[ax] == 1
                && self.stride[ax] == 1
                && self.pad_begin[ax] == 0
                && self.pad_end[ax] == 0
                && self.dilation[ax] == 1
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_2d() -> ConvParams {
        ConvParams {
            batch: 1,
            groups: 1,
            c_in: 1,
            c_out: 1,
            spatial_rank: 2,
            input: [5, 5, 1],
            kernel: [3, 3, 1],
            stride: [1, 1, 1],
            pad_begin: [1, 1, 0],
            pad_end: [1, 1, 0],
            dilation: [1, 1, 1],
            relu: false,
        }
    }

    #[test]
    fn test_output_dims_same_padding() {
        assert_eq!(base_2d().output_dims(), [5, 5, 1]);
    }

    #[test]
    fn test_output_dims_stride_and_dilation() {
        let mut p = base_2d();
        p.stride = [2, 2, 1];
        p.pad_begin = [0, 0, 0];
        p.pad_end = [0, 0, 0];
        assert_eq!(p.output_dims(), [2, 2, 1]);

        p.stride = [1, 1, 1];
        p.dilation = [2, 2, 1];
        assert_eq!(p.output_dims(), [1, 1, 1]);
    }

    #[test]
    fn test_normalize_1d() {
        let p = ConvParams {
            batch: 1,
            groups: 1,
            c_in: 2,
            c_out: 2,
            spatial_rank: 1,
            input: [10, 1, 1],
            kernel: [3, 1, 1],
            stride: [1, 1, 1],
            pad_begin: [1, 0, 0],
            pad_end: [1, 0, 0],
            dilation: [1, 1, 1],
            relu: false,
        };
        let n = p.normalized();
        assert_eq!(n.spatial_rank, 2);
        assert_eq!(n.input, [1, 10, 1]);
        assert_eq!(n.kernel, [1, 3, 1]);
        assert_eq!(n.output_dims()[..2], [1, 10]);
    }

    #[test]
    fn test_pointwise_detection() {
        let mut p = base_2d();
        assert!(!p.is_pointwise());
        p.kernel = [1, 1, 1];
        p.pad_begin = [0, 0, 0];
        p.pad_end = [0, 0, 0];
        assert!(p.is_pointwise());
    }
}
