//! CUDA-backed collaborators.
//!
//! Requires an NVIDIA driver at runtime; the driver library is loaded lazily
//! by `cudarc` on first use.

use std::ffi::c_void;
use std::sync::Arc;

use cudarc::driver::sys::{CUpointer_attribute, CUresult};
use cudarc::driver::CudaDevice;
use tracing::debug;

use crate::provider::PointerAttributes;
use crate::CodecError;

/// Answers pointer queries through the CUDA driver.
///
/// Holds the device's primary context so queries run against a current
/// context.
pub struct CudaPointerAttributes {
    device: Arc<CudaDevice>,
}

impl CudaPointerAttributes {
    /// Retain the primary context of `ordinal`.
    pub fn new(ordinal: usize) -> Result<Self, CodecError> {
        let device = CudaDevice::new(ordinal)
            .map_err(|e| CodecError::CudaError(format!("failed to open device {ordinal}: {e}")))?;
        Ok(Self { device })
    }

    /// Use an already opened device.
    pub fn with_device(device: Arc<CudaDevice>) -> Self {
        Self { device }
    }

    /// Ordinal of the device these queries run on.
    pub fn ordinal(&self) -> i32 {
        self.device.ordinal() as i32
    }
}

impl PointerAttributes for CudaPointerAttributes {
    fn device_ordinal(&self, ptr: u64) -> Result<i32, CodecError> {
        let mut ordinal: i32 = -1;
        let result = unsafe {
            cudarc::driver::sys::lib().cuPointerGetAttribute(
                &mut ordinal as *mut i32 as *mut c_void,
                CUpointer_attribute::CU_POINTER_ATTRIBUTE_DEVICE_ORDINAL,
                ptr,
            )
        };
        if result != CUresult::CUDA_SUCCESS {
            return Err(CodecError::CudaError(format!(
                "cuPointerGetAttribute failed for {ptr:#x}: {result:?}"
            )));
        }
        debug!(ptr, ordinal, "queried pointer device");
        Ok(ordinal)
    }
}
