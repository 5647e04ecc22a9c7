//! Zero-copy views over device memory and their interchange exports.
//!
//! A [`PlaneView`] describes one plane through the CUDA array interface
//! (version 3). A [`TensorView`] is the single 2-D tensor obtained by
//! coalescing the planes of a frame, exported through a DLPack-style
//! descriptor.

use serde::{Deserialize, Serialize};

use crate::layout::PlaneLayout;
use crate::ElementType;

/// CUDA array interface version produced by [`PlaneView::cuda_array_interface`].
pub const CUDA_ARRAY_INTERFACE_VERSION: u32 = 3;

/// Stream value meaning "legacy default stream".
pub const LEGACY_DEFAULT_STREAM: u64 = 1;

/// Stream value meaning "per-thread default stream".
pub const PER_THREAD_DEFAULT_STREAM: u64 = 2;

/// Opaque CUDA stream handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StreamHandle(pub u64);

/// CUDA array interface dictionary.
///
/// Used both ways: the coercer reads caller-declared descriptors in this
/// form, and plane views export themselves in it. Absent `strides` means
/// C-contiguous; absent `stream` means the per-thread default stream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArrayInterface {
    pub shape: Vec<usize>,
    #[serde(default)]
    pub strides: Option<Vec<usize>>,
    pub typestr: String,
    /// `(pointer, read_only)`.
    pub data: (u64, bool),
    pub version: u32,
    #[serde(default)]
    pub stream: Option<u64>,
}

/// Validated view of one plane in device memory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlaneView {
    pub shape: [usize; 3],
    pub strides: [usize; 3],
    pub element: ElementType,
    /// Stream the producer last wrote on; `None` for "no explicit stream".
    pub stream: Option<StreamHandle>,
    /// Device pointer to the first element.
    pub data: u64,
    pub read_only: bool,
    /// CUDA device ordinal owning the memory.
    pub device: i32,
}

impl PlaneView {
    /// Create a writable view with the given layout.
    #[must_use]
    pub fn from_layout(
        layout: PlaneLayout,
        data: u64,
        stream: Option<StreamHandle>,
        device: i32,
    ) -> Self {
        Self {
            shape: layout.shape,
            strides: layout.strides,
            element: layout.element,
            stream,
            data,
            read_only: false,
            device,
        }
    }

    /// Shape, strides and element type of this view.
    #[must_use]
    pub fn layout(&self) -> PlaneLayout {
        PlaneLayout {
            shape: self.shape,
            strides: self.strides,
            element: self.element,
        }
    }

    /// Row stride in bytes, the pitch the frame copy expects.
    #[must_use]
    pub fn row_pitch(&self) -> usize {
        self.strides[0]
    }

    /// Export through the CUDA array interface.
    #[must_use]
    pub fn cuda_array_interface(&self) -> ArrayInterface {
        ArrayInterface {
            shape: self.shape.to_vec(),
            strides: Some(self.strides.to_vec()),
            typestr: self.element.typestr().to_string(),
            data: (self.data, self.read_only),
            version: CUDA_ARRAY_INTERFACE_VERSION,
            stream: self.stream.map(|s| s.0),
        }
    }
}

/// DLPack device type codes this crate deals with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[repr(i32)]
pub enum DlDeviceType {
    Cpu = 1,
    Cuda = 2,
    CudaHost = 3,
    CudaManaged = 13,
}

impl DlDeviceType {
    /// Map a raw DLPack device type code.
    #[must_use]
    pub fn from_code(code: i32) -> Option<Self> {
        match code {
            1 => Some(Self::Cpu),
            2 => Some(Self::Cuda),
            3 => Some(Self::CudaHost),
            13 => Some(Self::CudaManaged),
            _ => None,
        }
    }

    /// Whether kernels can dereference pointers of this device type.
    #[must_use]
    pub fn is_cuda_accessible(&self) -> bool {
        matches!(self, Self::Cuda | Self::CudaHost | Self::CudaManaged)
    }
}

/// DLPack `(device_type, device_id)` pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DlDevice {
    pub device_type: DlDeviceType,
    pub device_id: i32,
}

/// DLPack data type. Code 1 is unsigned integer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DlDataType {
    pub code: u8,
    pub bits: u8,
    pub lanes: u16,
}

impl From<ElementType> for DlDataType {
    fn from(element: ElementType) -> Self {
        Self {
            code: 1,
            bits: (element.size() * 8) as u8,
            lanes: 1,
        }
    }
}

/// DLPack tensor description. Strides are in elements.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DlTensorInfo {
    pub data: u64,
    pub device: DlDevice,
    pub dtype: DlDataType,
    pub shape: Vec<i64>,
    pub strides: Vec<i64>,
    pub byte_offset: u64,
}

/// Frame planes reinterpreted as one 2-D tensor. Strides are in elements.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TensorView {
    pub shape: [usize; 2],
    pub strides: [usize; 2],
    pub element: ElementType,
    pub data: u64,
    pub device: i32,
    pub stream: Option<StreamHandle>,
}

impl TensorView {
    /// Device the tensor lives on, as DLPack reports it.
    #[must_use]
    pub fn dlpack_device(&self) -> DlDevice {
        DlDevice {
            device_type: DlDeviceType::Cuda,
            device_id: self.device,
        }
    }

    /// Export as a DLPack tensor description.
    #[must_use]
    pub fn dlpack(&self) -> DlTensorInfo {
        DlTensorInfo {
            data: self.data,
            device: self.dlpack_device(),
            dtype: self.element.into(),
            shape: self.shape.iter().map(|&d| d as i64).collect(),
            strides: self.strides.iter().map(|&s| s as i64).collect(),
            byte_offset: 0,
        }
    }
}
