//! Data types supported by the execution engine

mod element;

pub use element::Element;

/// Runtime data type tag for tensor buffers
///
/// The engine executes two element types: 32-bit IEEE754 floats and 32-bit
/// two's-complement integers. Everything else is the concern of upstream
/// layers (casting, quantization) and out of scope here.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum DType {
    /// 32-bit float
    F32,
    /// 32-bit signed integer
    I32,
}

impl DType {
    /// Size of one element in bytes
    pub const fn size_in_bytes(self) -> usize {
        match self {
            DType::F32 | DType::I32 => 4,
        }
    }

    /// Whether this is a floating-point type
    pub const fn is_float(self) -> bool {
        matches!(self, DType::F32)
    }
}

/// Dispatch a generic kernel over a runtime [`DType`]
///
/// Binds the matching Rust type to the given identifier and expands the body
/// once per supported dtype.
#[macro_export]
macro_rules! dispatch_dtype {
    ($dtype:expr, $T:ident => $body:block) => {
        match $dtype {
            $crate::dtype::DType::F32 => {
                type $T = f32;
                $body
            }
            $crate::dtype::DType::I32 => {
                type $T = i32;
                $body
            }
        }
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dtype_properties() {
        assert_eq!(DType::F32.size_in_bytes(), 4);
        assert_eq!(DType::I32.size_in_bytes(), 4);
        assert!(DType::F32.is_float());
        assert!(!DType::I32.is_float());
    }

    #[test]
    fn test_dispatch_binds_matching_type() {
        for dt in [DType::F32, DType::I32] {
            let (tag, size) = crate::dispatch_dtype!(dt, T => {
                (<T as Element>::DTYPE, std::mem::size_of::<T>())
            });
            assert_eq!(tag, dt);
            assert_eq!(size, dt.size_in_bytes());
        }
    }
}
