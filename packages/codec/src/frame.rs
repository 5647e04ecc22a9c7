//! Decoded frame descriptors.
//!
//! The decoder hands out one device pointer per frame. [`assemble`] splits it
//! into per-plane views, assuming the planes are packed back to back with no
//! padding between them. Row padding reported through the decoder pitch is
//! not taken into account.
//!
//! A [`FrameDescriptor`] is a view into the decoder's output pool. It stays
//! valid only until the pool rotates back to the same surface; nothing here
//! detects use after rotation.

use crate::layout::{plane_offsets, resolve};
use crate::view::{PlaneView, StreamHandle, TensorView};
use crate::{CodecError, PixelFormat};

/// Multi-plane view of one decoded frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameDescriptor {
    pub timestamp: i64,
    pub format: PixelFormat,
    pub width: u32,
    pub height: u32,
    /// One view per plane, in plane order.
    pub planes: Vec<PlaneView>,
}

/// Build the descriptor of a contiguous frame starting at `ptr`.
///
/// # Errors
///
/// Fails like [`resolve`] for zero dimensions and formats without a layout,
/// and with [`CodecError::AddressOverflow`] when a plane would start past the
/// end of the address space.
pub fn assemble(
    ptr: u64,
    format: PixelFormat,
    width: u32,
    height: u32,
    timestamp: i64,
    stream: Option<StreamHandle>,
    device: i32,
) -> Result<FrameDescriptor, CodecError> {
    let offsets = plane_offsets(format, width, height)?;
    let planes = (0..format.plane_count())
        .map(|plane| {
            let layout = resolve(format, width, height, plane)?;
            let offset = offsets[plane];
            let data = ptr
                .checked_add(offset as u64)
                .ok_or(CodecError::AddressOverflow { base: ptr, offset })?;
            Ok(PlaneView::from_layout(layout, data, stream, device))
        })
        .collect::<Result<Vec<_>, CodecError>>()?;

    Ok(FrameDescriptor {
        timestamp,
        format,
        width,
        height,
        planes,
    })
}

impl FrameDescriptor {
    /// Device pointer of the first plane.
    #[must_use]
    pub fn data(&self) -> u64 {
        self.planes.first().map(|p| p.data).unwrap_or_default()
    }

    /// Total bytes covered by the planes.
    #[must_use]
    pub fn frame_size(&self) -> usize {
        self.planes.iter().map(|p| p.layout().byte_size()).sum()
    }

    /// Device pointer of plane `index`.
    pub fn plane_ptr(&self, index: usize) -> Result<u64, CodecError> {
        self.planes
            .get(index)
            .map(|p| p.data)
            .ok_or(CodecError::InvalidPlaneIndex {
                format: self.format,
                plane: index,
                planes: self.planes.len(),
            })
    }

    /// Reinterpret the frame as one 2-D tensor of rows stacked plane after plane.
    ///
    /// NV12 becomes `(3H/2, W)` and YUV444 becomes `(3H, W)`, both with
    /// strides `(W, 1)`. This is a stride reinterpretation of the plane 0
    /// allocation, not a copy.
    ///
    /// # Errors
    ///
    /// [`CodecError::UnsupportedFormat`] for every other format.
    pub fn coalesce(&self) -> Result<TensorView, CodecError> {
        let w = self.width as usize;
        let h = self.height as usize;
        let rows = match self.format {
            PixelFormat::Nv12 => h * 3 / 2,
            PixelFormat::Yuv444 => h * 3,
            other => return Err(CodecError::UnsupportedFormat(other)),
        };
        let luma = self.planes.first().ok_or(CodecError::MissingPlanes {
            expected: self.format.plane_count(),
            found: 0,
        })?;

        Ok(TensorView {
            shape: [rows, w],
            strides: [w, 1],
            element: luma.element,
            data: luma.data,
            device: luma.device,
            stream: luma.stream,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_assemble_rejects_address_overflow() {
        let base = u64::MAX - 100;
        let err = assemble(base, PixelFormat::Nv12, 64, 64, 0, None, 0).unwrap_err();
        assert!(matches!(
            err,
            CodecError::AddressOverflow { base: b, offset: 4096 } if b == base
        ));
        assert_eq!(err.kind(), crate::ErrorKind::LayoutMismatch);
    }

    #[test]
    fn test_nv12_planes_are_contiguous() {
        let frame = assemble(0x1000, PixelFormat::Nv12, 1920, 1080, 42, None, 0).unwrap();
        assert_eq!(frame.planes.len(), 2);
        assert_eq!(frame.plane_ptr(0).unwrap(), 0x1000);
        assert_eq!(frame.plane_ptr(1).unwrap(), 0x1000 + 1920 * 1080);
        assert_eq!(frame.planes[1].shape, [540, 960, 2]);
        assert_eq!(frame.timestamp, 42);
        assert_eq!(frame.frame_size(), 1920 * 1080 * 3 / 2);
    }

    #[test]
    fn test_sixteen_bit_offsets() {
        let frame = assemble(0, PixelFormat::P010, 64, 32, 0, None, 0).unwrap();
        assert_eq!(frame.plane_ptr(1).unwrap(), 2 * 64 * 32);
        assert_eq!(frame.frame_size(), 3 * 64 * 32);

        let frame = assemble(0, PixelFormat::Yuv444P16, 64, 32, 0, None, 0).unwrap();
        assert_eq!(frame.plane_ptr(1).unwrap(), 2 * 64 * 32);
        assert_eq!(frame.plane_ptr(2).unwrap(), 4 * 64 * 32);
        assert_eq!(frame.frame_size(), 6 * 64 * 32);
        assert!(frame.plane_ptr(3).is_err());
    }

    #[test]
    fn test_stream_propagates() {
        let stream = Some(StreamHandle(9));
        let frame = assemble(0, PixelFormat::Yuv444, 16, 16, 0, stream, 2).unwrap();
        assert!(frame.planes.iter().all(|p| p.stream == stream && p.device == 2));
    }

    #[test]
    fn test_coalesce() {
        let nv12 = assemble(0x2000, PixelFormat::Nv12, 1920, 1080, 0, None, 0).unwrap();
        let tensor = nv12.coalesce().unwrap();
        assert_eq!(tensor.shape, [1620, 1920]);
        assert_eq!(tensor.strides, [1920, 1]);
        assert_eq!(tensor.data, 0x2000);

        let yuv = assemble(0, PixelFormat::Yuv444, 640, 480, 0, None, 0).unwrap();
        assert_eq!(yuv.coalesce().unwrap().shape, [1440, 640]);

        let p010 = assemble(0, PixelFormat::P010, 640, 480, 0, None, 0).unwrap();
        assert!(matches!(p010.coalesce(), Err(CodecError::UnsupportedFormat(PixelFormat::P010))));
    }

    #[test]
    fn test_undefined_format() {
        assert!(assemble(0, PixelFormat::Undefined, 16, 16, 0, None, 0).is_err());
    }
}
