//! Per-plane memory layout of each pixel format.
//!
//! Everything here is pure arithmetic over `(format, width, height, plane)`.
//! Both the decoder (when building views over its output) and the encoder
//! (when checking caller buffers) go through [`resolve`], so the two sides
//! always agree on what a plane looks like.
//!
//! 4:2:0 formats expect even dimensions. Odd values are not rejected; the
//! chroma dimensions are floored and the caller must not rely on them.

use crate::{CodecError, ElementType, PixelFormat};

/// Expected layout of one plane.
///
/// `shape` is `(rows, cols, channels)`; `strides` is `(row, col, channel)`
/// in bytes, exactly as exported through the array interface.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlaneLayout {
    pub shape: [usize; 3],
    pub strides: [usize; 3],
    pub element: ElementType,
}

impl PlaneLayout {
    fn new(shape: [usize; 3], strides: [usize; 3], element: ElementType) -> Self {
        Self {
            shape,
            strides,
            element,
        }
    }

    /// Bytes occupied by the plane when packed without padding.
    #[must_use]
    pub fn byte_size(&self) -> usize {
        self.shape.iter().product::<usize>() * self.element.size()
    }
}

/// Resolve the layout of `plane` for a `width`×`height` frame in `format`.
///
/// # Errors
///
/// - [`CodecError::InvalidDimensions`] if either dimension is zero
/// - [`CodecError::UnsupportedFormat`] for packed 10-bit RGB and `Undefined`
/// - [`CodecError::InvalidPlaneIndex`] if `plane` is not below the plane count
pub fn resolve(
    format: PixelFormat,
    width: u32,
    height: u32,
    plane: usize,
) -> Result<PlaneLayout, CodecError> {
    if width == 0 || height == 0 {
        return Err(CodecError::InvalidDimensions { width, height });
    }
    if matches!(
        format,
        PixelFormat::Argb10 | PixelFormat::Abgr10 | PixelFormat::Undefined
    ) {
        return Err(CodecError::UnsupportedFormat(format));
    }
    let planes = format.plane_count();
    if plane >= planes {
        return Err(CodecError::InvalidPlaneIndex {
            format,
            plane,
            planes,
        });
    }

    let w = width as usize;
    let h = height as usize;
    let element = format.element();

    let layout = match (format, plane) {
        (PixelFormat::Nv12, 0) => PlaneLayout::new([h, w, 1], [w, 1, 1], element),
        (PixelFormat::Nv12, _) => PlaneLayout::new([h / 2, w / 2, 2], [w, 2, 1], element),
        (PixelFormat::P010, 0) => PlaneLayout::new([h, w, 1], [w * 2, 2, 1], element),
        (PixelFormat::P010, _) => PlaneLayout::new([h / 2, w / 2, 2], [w * 2, 2, 1], element),
        (PixelFormat::Yuv444, _) => PlaneLayout::new([h, w, 1], [w, 1, 1], element),
        (PixelFormat::Yuv444P16, _) => PlaneLayout::new([h, w, 1], [w * 2, 2, 1], element),
        (PixelFormat::Yv12, 0) => PlaneLayout::new([h, w, 1], [w, 1, 1], element),
        (PixelFormat::Yv12, _) => PlaneLayout::new([h / 2, w / 2, 1], [w / 2, 1, 1], element),
        _ => PlaneLayout::new([h, w, 4], [w * 4, 4, 1], element),
    };

    Ok(layout)
}

/// Total bytes of a contiguous frame.
pub fn frame_size(format: PixelFormat, width: u32, height: u32) -> Result<usize, CodecError> {
    Ok(plane_offsets(format, width, height)?
        .last()
        .copied()
        .unwrap_or_default())
}

/// Byte offset of every plane in a contiguous frame, followed by the total size.
///
/// The result has `plane_count + 1` entries.
pub fn plane_offsets(
    format: PixelFormat,
    width: u32,
    height: u32,
) -> Result<Vec<usize>, CodecError> {
    if format.plane_count() == 0 {
        return Err(CodecError::UnsupportedFormat(format));
    }
    let mut offsets = Vec::with_capacity(format.plane_count() + 1);
    let mut offset = 0;
    offsets.push(offset);
    for plane in 0..format.plane_count() {
        offset += resolve(format, width, height, plane)?.byte_size();
        offsets.push(offset);
    }
    Ok(offsets)
}
