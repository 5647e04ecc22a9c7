//! Encoder input acquisition.
//!
//! A caller frame can reach the encoder through several buffer protocols: a
//! CUDA array interface for packed formats, a list of per-plane array
//! interfaces, a DLPack tensor holding a whole 4:2:0 frame, or a plain host
//! buffer. [`InputAssembler`] picks the protocol the configured format allows,
//! validates the plane layout, and only then asks the encoder for an input
//! slot and issues the copy. A rejected frame leaves the encoder untouched.

use tracing::debug;

use crate::coerce::BufferCoercer;
use crate::layout::{plane_offsets, resolve};
use crate::provider::{CopySource, EncodeProvider, FrameCopy, InputSlot, PointerAttributes};
use crate::view::{ArrayInterface, DlTensorInfo, PlaneView};
use crate::{CodecError, PixelFormat};

/// A caller-owned frame handed to the encoder.
///
/// Each method is one buffer-export protocol; implement the ones the frame
/// supports. Device protocols take precedence over host data.
pub trait FrameSource {
    /// Single CUDA array interface, for packed formats.
    fn array_interface(&self) -> Option<ArrayInterface> {
        None
    }

    /// One CUDA array interface per plane.
    fn planes(&self) -> Option<Vec<ArrayInterface>> {
        None
    }

    /// DLPack tensor covering the whole frame.
    fn dlpack(&self) -> Option<DlTensorInfo> {
        None
    }

    /// Contiguous row-major host buffer.
    fn host_data(&self) -> Option<&[u8]> {
        None
    }
}

/// Locates the planes of caller frames and stages them into encoder input slots.
pub struct InputAssembler<'a> {
    coercer: BufferCoercer<'a>,
    device: i32,
    format: PixelFormat,
    width: u32,
    height: u32,
    host_input: bool,
}

impl<'a> InputAssembler<'a> {
    /// Create an assembler for `width`×`height` frames in `format` on `device`.
    ///
    /// `host_input` enables the host buffer path.
    pub fn new(
        attributes: &'a dyn PointerAttributes,
        device: i32,
        format: PixelFormat,
        width: u32,
        height: u32,
        host_input: bool,
    ) -> Self {
        Self {
            coercer: BufferCoercer::new(attributes, device),
            device,
            format,
            width,
            height,
            host_input,
        }
    }

    /// Validate `frame` and copy it into the next encoder input slot.
    pub fn acquire<P>(&self, frame: &dyn FrameSource, provider: &mut P) -> Result<InputSlot, CodecError>
    where
        P: EncodeProvider + ?Sized,
    {
        let copy = self.prepare(frame)?;
        let slot = provider.next_input_slot()?;
        provider.copy_into_input_slot(&slot, &copy)?;
        Ok(slot)
    }

    /// Work out the copy for `frame` without touching the encoder.
    pub fn prepare<'f>(&self, frame: &'f dyn FrameSource) -> Result<FrameCopy<'f>, CodecError> {
        let has_device_protocol =
            frame.array_interface().is_some() || frame.planes().is_some() || frame.dlpack().is_some();
        if has_device_protocol {
            return self.prepare_device(frame);
        }
        match frame.host_data() {
            Some(data) if self.host_input => self.prepare_host(data),
            Some(_) => Err(CodecError::HostInputDisabled),
            None => Err(CodecError::UnsupportedInputType),
        }
    }

    fn prepare_device<'f>(&self, frame: &'f dyn FrameSource) -> Result<FrameCopy<'f>, CodecError> {
        match self.format {
            PixelFormat::Argb | PixelFormat::Abgr | PixelFormat::Argb10 | PixelFormat::Abgr10 => {
                let desc = frame.array_interface().ok_or(CodecError::UnsupportedInputType)?;
                let view = self.coercer.coerce(&desc, self.format, self.width, self.height, 0)?;
                Ok(self.device_copy(&view, Vec::new()))
            }
            PixelFormat::Nv12 | PixelFormat::P010 => {
                if let Some(tensor) = frame.dlpack() {
                    return self.prepare_tensor(&tensor);
                }
                let planes = self.coerce_planes(frame)?;
                let (luma, chroma) = (&planes[0], &planes[1]);
                if luma.row_pitch() != chroma.row_pitch() {
                    return Err(CodecError::StrideMismatch {
                        expected: luma.strides.to_vec(),
                        found: chroma.strides.to_vec(),
                    });
                }
                ensure_follows(1, luma, chroma)?;
                let offset = (chroma.data - luma.data) as usize;
                Ok(self.device_copy(luma, vec![offset]))
            }
            PixelFormat::Yuv444 | PixelFormat::Yuv444P16 | PixelFormat::Yv12 => {
                let planes = self.coerce_planes(frame)?;
                let (y, u, v) = (&planes[0], &planes[1], &planes[2]);
                if u.row_pitch() != v.row_pitch() {
                    return Err(CodecError::StrideMismatch {
                        expected: u.strides.to_vec(),
                        found: v.strides.to_vec(),
                    });
                }
                ensure_follows(1, y, u)?;
                ensure_follows(2, u, v)?;
                let offsets = vec![(u.data - y.data) as usize, (v.data - y.data) as usize];
                Ok(self.device_copy(y, offsets))
            }
            PixelFormat::Undefined => Err(CodecError::UnsupportedFormat(self.format)),
        }
    }

    fn coerce_planes(&self, frame: &dyn FrameSource) -> Result<Vec<PlaneView>, CodecError> {
        let descs = frame.planes().ok_or(CodecError::UnsupportedInputType)?;
        let expected = self.format.plane_count();
        if descs.len() != expected {
            return Err(CodecError::MissingPlanes {
                expected,
                found: descs.len(),
            });
        }
        descs
            .iter()
            .enumerate()
            .map(|(plane, desc)| {
                self.coercer
                    .coerce(desc, self.format, self.width, self.height, plane)
            })
            .collect()
    }

    /// A DLPack tensor stacks the 4:2:0 chroma rows under the luma rows.
    fn prepare_tensor<'f>(&self, tensor: &DlTensorInfo) -> Result<FrameCopy<'f>, CodecError> {
        if !tensor.device.device_type.is_cuda_accessible() {
            return Err(CodecError::InaccessibleDevice(tensor.device.device_type as i32));
        }
        if tensor.device.device_id != self.device {
            return Err(CodecError::DeviceMismatch {
                expected: self.device,
                found: tensor.device.device_id,
            });
        }

        let element = self.format.element();
        if usize::from(tensor.dtype.bits) != element.size() * 8 {
            return Err(CodecError::FormatMismatch {
                expected: element.typestr(),
                found: format!("dlpack uint{}", tensor.dtype.bits),
            });
        }

        let rows = tensor.shape.first().copied().unwrap_or_default().max(0) as usize;
        let expected_rows = self.height as usize * 3 / 2;
        if rows != expected_rows {
            return Err(CodecError::DimensionMismatch {
                what: "tensor height must be 1.5 times the frame height",
                expected: expected_rows,
                found: rows,
            });
        }

        let row_elements = match tensor.strides.first() {
            Some(&stride) => stride.max(0) as usize,
            None => tensor.shape.get(1).copied().unwrap_or_default().max(0) as usize,
        };
        let w = self.width as usize;
        let h = self.height as usize;

        Ok(FrameCopy {
            source: CopySource::Device(tensor.data + tensor.byte_offset),
            src_pitch: row_elements * element.size(),
            chroma_offsets: vec![w * h * element.size()],
            width: self.width,
            height: self.height,
            format: self.format,
        })
    }

    fn prepare_host<'f>(&self, data: &'f [u8]) -> Result<FrameCopy<'f>, CodecError> {
        let offsets = plane_offsets(self.format, self.width, self.height)?;
        let frame_size = offsets[offsets.len() - 1];
        if data.len() < frame_size {
            return Err(CodecError::DimensionMismatch {
                what: "host buffer size",
                expected: frame_size,
                found: data.len(),
            });
        }
        let pitch = resolve(self.format, self.width, self.height, 0)?.strides[0];
        let chroma_offsets = offsets[1..offsets.len() - 1].to_vec();

        Ok(FrameCopy {
            source: CopySource::Host(data),
            src_pitch: pitch,
            chroma_offsets,
            width: self.width,
            height: self.height,
            format: self.format,
        })
    }

    fn device_copy<'f>(&self, luma: &PlaneView, chroma_offsets: Vec<usize>) -> FrameCopy<'f> {
        debug!(ptr = luma.data, ?chroma_offsets, "staging device frame");
        FrameCopy {
            source: CopySource::Device(luma.data),
            src_pitch: luma.row_pitch(),
            chroma_offsets,
            width: self.width,
            height: self.height,
            format: self.format,
        }
    }
}

fn ensure_follows(plane: usize, previous: &PlaneView, next: &PlaneView) -> Result<(), CodecError> {
    if next.data <= previous.data {
        return Err(CodecError::InvalidPlaneOrder {
            plane,
            previous: previous.data,
            found: next.data,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{FakeEncodeProvider, FakePointerAttributes, TestFrame};
    use crate::view::{DlDataType, DlDevice, DlDeviceType};

    const W: u32 = 64;
    const H: u32 = 32;

    fn desc(shape: Vec<usize>, typestr: &str, ptr: u64) -> ArrayInterface {
        ArrayInterface {
            shape,
            strides: None,
            typestr: typestr.to_string(),
            data: (ptr, false),
            version: 3,
            stream: None,
        }
    }

    fn nv12_planes(luma: u64, chroma: u64) -> TestFrame {
        TestFrame::from_planes(vec![
            desc(vec![32, 64, 1], "|u1", luma),
            desc(vec![16, 32, 2], "|u1", chroma),
        ])
    }

    #[test]
    fn test_nv12_two_planes() {
        let attrs = FakePointerAttributes::single(0);
        let assembler = InputAssembler::new(&attrs, 0, PixelFormat::Nv12, W, H, false);
        let frame = nv12_planes(0x1000, 0x1000 + 4096);
        let copy = assembler.prepare(&frame).unwrap();
        assert_eq!(copy.source, CopySource::Device(0x1000));
        assert_eq!(copy.src_pitch, 64);
        assert_eq!(copy.chroma_offsets, vec![4096]);
    }

    #[test]
    fn test_chroma_must_follow_luma() {
        let attrs = FakePointerAttributes::single(0);
        let assembler = InputAssembler::new(&attrs, 0, PixelFormat::Nv12, W, H, false);
        for chroma in [0x1000, 0x0800] {
            let err = assembler.prepare(&nv12_planes(0x1000, chroma)).unwrap_err();
            assert!(matches!(err, CodecError::InvalidPlaneOrder { plane: 1, .. }));
        }
    }

    #[test]
    fn test_yuv444_offsets() {
        let attrs = FakePointerAttributes::single(0);
        let assembler = InputAssembler::new(&attrs, 0, PixelFormat::Yuv444P16, W, H, false);
        let frame = TestFrame::from_planes(vec![
            desc(vec![32, 64, 1], "<u2", 0x10000),
            desc(vec![32, 64, 1], "<u2", 0x11000),
            desc(vec![32, 64, 1], "<u2", 0x12000),
        ]);
        let copy = assembler.prepare(&frame).unwrap();
        assert_eq!(copy.src_pitch, 128);
        assert_eq!(copy.chroma_offsets, vec![0x1000, 0x2000]);
    }

    #[test]
    fn test_yuv444_v_before_u() {
        let attrs = FakePointerAttributes::single(0);
        let assembler = InputAssembler::new(&attrs, 0, PixelFormat::Yuv444, W, H, false);
        let frame = TestFrame::from_planes(vec![
            desc(vec![32, 64, 1], "|u1", 0x10000),
            desc(vec![32, 64, 1], "|u1", 0x12000),
            desc(vec![32, 64, 1], "|u1", 0x11000),
        ]);
        let err = assembler.prepare(&frame).unwrap_err();
        assert!(matches!(err, CodecError::InvalidPlaneOrder { plane: 2, .. }));
    }

    #[test]
    fn test_wrong_plane_count() {
        let attrs = FakePointerAttributes::single(0);
        let assembler = InputAssembler::new(&attrs, 0, PixelFormat::Yuv444, W, H, false);
        let frame = TestFrame::from_planes(vec![desc(vec![32, 64, 1], "|u1", 0x10000)]);
        assert!(matches!(
            assembler.prepare(&frame),
            Err(CodecError::MissingPlanes { expected: 3, found: 1 })
        ));
    }

    #[test]
    fn test_packed_argb() {
        let attrs = FakePointerAttributes::single(0);
        let assembler = InputAssembler::new(&attrs, 0, PixelFormat::Argb, W, H, false);
        let frame = TestFrame::from_array(desc(vec![32, 64, 4], "|u1", 0x4000));
        let copy = assembler.prepare(&frame).unwrap();
        assert_eq!(copy.src_pitch, 256);
        assert!(copy.chroma_offsets.is_empty());

        let ten_bit = InputAssembler::new(&attrs, 0, PixelFormat::Argb10, W, H, false);
        assert!(matches!(ten_bit.prepare(&frame), Err(CodecError::UnsupportedFormat(_))));
    }

    fn tensor(rows: i64, bits: u8, device_type: DlDeviceType) -> DlTensorInfo {
        DlTensorInfo {
            data: 0x8000,
            device: DlDevice { device_type, device_id: 0 },
            dtype: DlDataType { code: 1, bits, lanes: 1 },
            shape: vec![rows, 64],
            strides: vec![64, 1],
            byte_offset: 0,
        }
    }

    #[test]
    fn test_dlpack_tensor() {
        let attrs = FakePointerAttributes::single(0);
        let assembler = InputAssembler::new(&attrs, 0, PixelFormat::P010, W, H, false);
        let frame = TestFrame::from_tensor(tensor(48, 16, DlDeviceType::Cuda));
        let copy = assembler.prepare(&frame).unwrap();
        assert_eq!(copy.source, CopySource::Device(0x8000));
        assert_eq!(copy.src_pitch, 128);
        assert_eq!(copy.chroma_offsets, vec![64 * 32 * 2]);
    }

    #[test]
    fn test_dlpack_height_must_be_one_and_a_half() {
        let attrs = FakePointerAttributes::single(0);
        let assembler = InputAssembler::new(&attrs, 0, PixelFormat::Nv12, W, H, false);
        let err = assembler
            .prepare(&TestFrame::from_tensor(tensor(32, 8, DlDeviceType::Cuda)))
            .unwrap_err();
        assert!(matches!(err, CodecError::DimensionMismatch { expected: 48, found: 32, .. }));
    }

    #[test]
    fn test_dlpack_host_tensor_rejected() {
        let attrs = FakePointerAttributes::single(0);
        let assembler = InputAssembler::new(&attrs, 0, PixelFormat::Nv12, W, H, false);
        let err = assembler
            .prepare(&TestFrame::from_tensor(tensor(48, 8, DlDeviceType::Cpu)))
            .unwrap_err();
        assert!(matches!(err, CodecError::InaccessibleDevice(1)));
    }

    #[test]
    fn test_host_offsets() {
        let attrs = FakePointerAttributes::single(0);
        let wh = (W * H) as usize;
        let cases = [
            (PixelFormat::Nv12, 64, vec![wh]),
            (PixelFormat::P010, 128, vec![2 * wh]),
            (PixelFormat::Yuv444, 64, vec![wh, 2 * wh]),
            (PixelFormat::Yuv444P16, 128, vec![2 * wh, 4 * wh]),
            (PixelFormat::Yv12, 64, vec![wh, wh + wh / 4]),
            (PixelFormat::Abgr, 256, vec![]),
        ];
        let data = vec![0u8; 6 * wh];
        for (format, pitch, offsets) in cases {
            let assembler = InputAssembler::new(&attrs, 0, format, W, H, true);
            let frame = TestFrame::from_host(data.clone());
            let copy = assembler.prepare(&frame).unwrap();
            assert_eq!(copy.src_pitch, pitch, "{format:?}");
            assert_eq!(copy.chroma_offsets, offsets, "{format:?}");
            assert!(matches!(copy.source, CopySource::Host(_)));
        }
    }

    #[test]
    fn test_host_buffer_too_small() {
        let attrs = FakePointerAttributes::single(0);
        let assembler = InputAssembler::new(&attrs, 0, PixelFormat::Nv12, W, H, true);
        let err = assembler.prepare(&TestFrame::from_host(vec![0; 100])).unwrap_err();
        assert!(matches!(err, CodecError::DimensionMismatch { .. }));
    }

    #[test]
    fn test_host_disabled_and_unknown_objects() {
        let attrs = FakePointerAttributes::single(0);
        let assembler = InputAssembler::new(&attrs, 0, PixelFormat::Nv12, W, H, false);
        assert!(matches!(
            assembler.prepare(&TestFrame::from_host(vec![0; 4096])),
            Err(CodecError::HostInputDisabled)
        ));
        assert!(matches!(
            assembler.prepare(&TestFrame::default()),
            Err(CodecError::UnsupportedInputType)
        ));
    }

    #[test]
    fn test_rejected_frame_never_reaches_encoder() {
        let attrs = FakePointerAttributes::single(0);
        let assembler = InputAssembler::new(&attrs, 0, PixelFormat::Nv12, W, H, false);
        let mut encoder = FakeEncodeProvider::default();
        assert!(assembler.acquire(&nv12_planes(0x2000, 0x1000), &mut encoder).is_err());
        assert_eq!(encoder.slots_requested, 0);
        assert!(encoder.copies.is_empty());

        assembler.acquire(&nv12_planes(0x1000, 0x2000), &mut encoder).unwrap();
        assert_eq!(encoder.slots_requested, 1);
        assert_eq!(encoder.copies.len(), 1);
    }
}
