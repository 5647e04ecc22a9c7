//! Validation of caller-supplied buffer descriptors.

use tracing::debug;

use crate::layout::resolve;
use crate::provider::PointerAttributes;
use crate::view::{
    ArrayInterface, PlaneView, StreamHandle, LEGACY_DEFAULT_STREAM, PER_THREAD_DEFAULT_STREAM,
};
use crate::{CodecError, PixelFormat};

/// Normalize an array interface `stream` entry.
///
/// An absent entry and the two default-stream sentinels mean the producer
/// has not opted into stream-ordered access and yield `None`. Stream 0 is
/// forbidden by the interface.
pub fn normalize_stream(stream: Option<u64>) -> Result<Option<StreamHandle>, CodecError> {
    match stream {
        Some(0) => Err(CodecError::InvalidStream),
        None | Some(LEGACY_DEFAULT_STREAM) | Some(PER_THREAD_DEFAULT_STREAM) => Ok(None),
        Some(handle) => Ok(Some(StreamHandle(handle))),
    }
}

/// Checks array interface descriptors against the layout of a plane.
pub struct BufferCoercer<'a> {
    attributes: &'a dyn PointerAttributes,
    device: i32,
}

impl<'a> BufferCoercer<'a> {
    /// Create a coercer accepting buffers that live on `device`.
    pub fn new(attributes: &'a dyn PointerAttributes, device: i32) -> Self {
        Self { attributes, device }
    }

    /// Validate `desc` as plane `plane` of a `width`×`height` frame in `format`.
    ///
    /// Strides are compared only when `desc` declares them; otherwise the
    /// canonical strides are used. Nothing is coerced silently: any
    /// disagreement is an error.
    pub fn coerce(
        &self,
        desc: &ArrayInterface,
        format: PixelFormat,
        width: u32,
        height: u32,
        plane: usize,
    ) -> Result<PlaneView, CodecError> {
        let layout = resolve(format, width, height, plane)?;
        let stream = normalize_stream(desc.stream)?;

        if !layout.element.accepts(&desc.typestr) {
            return Err(CodecError::FormatMismatch {
                expected: layout.element.typestr(),
                found: desc.typestr.clone(),
            });
        }

        if desc.shape != layout.shape {
            return Err(CodecError::ShapeMismatch {
                expected: layout.shape.to_vec(),
                found: desc.shape.clone(),
            });
        }

        if let Some(strides) = &desc.strides {
            if strides.as_slice() != layout.strides {
                return Err(CodecError::StrideMismatch {
                    expected: layout.strides.to_vec(),
                    found: strides.clone(),
                });
            }
        }

        let (data, read_only) = desc.data;
        let device = self.attributes.device_ordinal(data)?;
        if device != self.device {
            return Err(CodecError::DeviceMismatch {
                expected: self.device,
                found: device,
            });
        }

        debug!(plane, ptr = data, ?format, "coerced plane");

        let mut view = PlaneView::from_layout(layout, data, stream, device);
        view.read_only = read_only;
        Ok(view)
    }
}
