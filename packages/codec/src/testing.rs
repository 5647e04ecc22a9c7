//! In-memory stand-ins for the driver-side collaborators.
//!
//! Available to this crate's tests and, through the `test-util` feature, to
//! downstream crates.

use std::collections::VecDeque;

use crate::config::{EncodeConfig, InitializeParams};
use crate::input::FrameSource;
use crate::provider::{
    CapabilityProvider, CopySource, DecodeProvider, DecodedSurface, EncodeCapability,
    EncodeProvider, EncodedPacket, FrameCopy, InputSlot, PointerAttributes, RegistrationHandle,
};
use crate::view::{ArrayInterface, DlTensorInfo, StreamHandle};
use crate::{Codec, CodecError, PixelFormat, Preset, SurfaceFormat, TuningInfo};

/// Install a test-friendly tracing subscriber. Safe to call more than once.
pub fn init_test_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("debug")),
        )
        .try_init();
}

/// Reports the same device for every pointer. Null pointers are rejected.
#[derive(Debug, Clone, Copy)]
pub struct FakePointerAttributes {
    ordinal: i32,
}

impl FakePointerAttributes {
    #[must_use]
    pub fn single(ordinal: i32) -> Self {
        Self { ordinal }
    }
}

impl PointerAttributes for FakePointerAttributes {
    fn device_ordinal(&self, ptr: u64) -> Result<i32, CodecError> {
        if ptr == 0 {
            return Err(CodecError::CudaError("invalid device pointer".to_string()));
        }
        Ok(self.ordinal)
    }
}

/// A caller frame exposing whichever protocols are set.
#[derive(Debug, Clone, Default)]
pub struct TestFrame {
    pub array: Option<ArrayInterface>,
    pub plane_list: Option<Vec<ArrayInterface>>,
    pub tensor: Option<DlTensorInfo>,
    pub host: Option<Vec<u8>>,
}

impl TestFrame {
    #[must_use]
    pub fn from_array(array: ArrayInterface) -> Self {
        Self {
            array: Some(array),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn from_planes(planes: Vec<ArrayInterface>) -> Self {
        Self {
            plane_list: Some(planes),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn from_tensor(tensor: DlTensorInfo) -> Self {
        Self {
            tensor: Some(tensor),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn from_host(data: Vec<u8>) -> Self {
        Self {
            host: Some(data),
            ..Self::default()
        }
    }
}

impl FrameSource for TestFrame {
    fn array_interface(&self) -> Option<ArrayInterface> {
        self.array.clone()
    }

    fn planes(&self) -> Option<Vec<ArrayInterface>> {
        self.plane_list.clone()
    }

    fn dlpack(&self) -> Option<DlTensorInfo> {
        self.tensor.clone()
    }

    fn host_data(&self) -> Option<&[u8]> {
        self.host.as_deref()
    }
}

/// Owned record of one [`FrameCopy`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedCopy {
    pub slot: InputSlot,
    /// Device pointer of the source, or `None` for host memory.
    pub device_ptr: Option<u64>,
    pub host_len: usize,
    pub src_pitch: usize,
    pub chroma_offsets: Vec<usize>,
    pub format: PixelFormat,
}

/// Base address of the fake encoder's input slots.
pub const FAKE_SLOT_BASE: u64 = 0x7f00_0000_0000;

/// Encoder that turns every submitted frame into a packet whose payload is
/// the little-endian sequence number.
///
/// `latency` packets are held back until [`EncodeProvider::flush`];
/// `reverse_output` emits each drained batch in reverse order.
#[derive(Debug, Default)]
pub struct FakeEncodeProvider {
    pub initialized: Option<InitializeParams>,
    pub slots_requested: usize,
    pub copies: Vec<RecordedCopy>,
    pub submitted: Vec<u64>,
    pub latency: usize,
    pub reverse_output: bool,
    pub flushed: bool,
    pub registrations: Vec<(u64, RegistrationHandle)>,
    pub unregistered: Vec<RegistrationHandle>,
    pub fail_unregister: bool,
    pub reconfigured: Vec<InitializeParams>,
    pub reject_reconfigure: bool,
    pub pending: VecDeque<u64>,
}

impl FakeEncodeProvider {
    fn packets(&self, sequences: Vec<u64>) -> Vec<EncodedPacket> {
        let mut packets: Vec<_> = sequences
            .into_iter()
            .map(|sequence| EncodedPacket {
                sequence,
                data: sequence.to_le_bytes().to_vec(),
            })
            .collect();
        if self.reverse_output {
            packets.reverse();
        }
        packets
    }
}

impl CapabilityProvider for FakeEncodeProvider {
    fn capability(&self, _codec: Codec, _capability: EncodeCapability) -> Result<i32, CodecError> {
        Ok(1)
    }

    fn preset_config(
        &self,
        codec: Codec,
        _preset: Preset,
        _tuning: TuningInfo,
    ) -> Result<EncodeConfig, CodecError> {
        Ok(EncodeConfig::for_codec(codec))
    }
}

impl EncodeProvider for FakeEncodeProvider {
    fn initialize(&mut self, params: &InitializeParams) -> Result<(), CodecError> {
        self.initialized = Some(params.clone());
        Ok(())
    }

    fn initialize_params(&self) -> Result<InitializeParams, CodecError> {
        self.initialized
            .clone()
            .ok_or(CodecError::provider("initialize_params", -1))
    }

    fn next_input_slot(&mut self) -> Result<InputSlot, CodecError> {
        let index = self.slots_requested as u64;
        self.slots_requested += 1;
        let width = self.initialized.as_ref().map_or(0, |p| p.encode_width);
        Ok(InputSlot {
            ptr: FAKE_SLOT_BASE + index * 0x100_0000,
            pitch: width as usize,
        })
    }

    fn copy_into_input_slot(&mut self, slot: &InputSlot, copy: &FrameCopy<'_>) -> Result<(), CodecError> {
        let (device_ptr, host_len) = match copy.source {
            CopySource::Device(ptr) => (Some(ptr), 0),
            CopySource::Host(data) => (None, data.len()),
        };
        self.copies.push(RecordedCopy {
            slot: *slot,
            device_ptr,
            host_len,
            src_pitch: copy.src_pitch,
            chroma_offsets: copy.chroma_offsets.clone(),
            format: copy.format,
        });
        Ok(())
    }

    fn submit(&mut self, sequence: u64) -> Result<(), CodecError> {
        self.submitted.push(sequence);
        self.pending.push_back(sequence);
        Ok(())
    }

    fn drain(&mut self) -> Result<Vec<EncodedPacket>, CodecError> {
        let ready = self.pending.len().saturating_sub(self.latency);
        let sequences = self.pending.drain(..ready).collect();
        Ok(self.packets(sequences))
    }

    fn flush(&mut self) -> Result<Vec<EncodedPacket>, CodecError> {
        self.flushed = true;
        let sequences = self.pending.drain(..).collect();
        Ok(self.packets(sequences))
    }

    fn reconfigure(&mut self, params: &InitializeParams) -> Result<bool, CodecError> {
        if self.reject_reconfigure {
            return Ok(false);
        }
        self.reconfigured.push(params.clone());
        self.initialized = Some(params.clone());
        Ok(true)
    }

    fn register_resource(
        &mut self,
        ptr: u64,
        _pitch: usize,
        _format: PixelFormat,
    ) -> Result<RegistrationHandle, CodecError> {
        let handle = RegistrationHandle(self.registrations.len() as u64 + 1);
        self.registrations.push((ptr, handle));
        Ok(handle)
    }

    fn unregister_resource(&mut self, handle: RegistrationHandle) -> Result<(), CodecError> {
        if self.fail_unregister {
            return Err(CodecError::provider("unregister_resource", 8));
        }
        self.unregistered.push(handle);
        Ok(())
    }
}

/// Base address of the fake decoder's output pool.
pub const FAKE_SURFACE_BASE: u64 = 0x7e00_0000_0000;

/// Decoder emitting one surface per non-empty packet.
///
/// Surfaces are numbered from [`FAKE_SURFACE_BASE`] one frame apart.
/// `lockable` feeds [`DecodeProvider::lock_frame`] and is filled by the test.
#[derive(Debug)]
pub struct FakeDecodeProvider {
    pub surface_format: SurfaceFormat,
    pub width: u32,
    pub height: u32,
    pub stream: Option<StreamHandle>,
    pub device: i32,
    pub decoded: usize,
    pub lockable: VecDeque<DecodedSurface>,
    pub locked: Vec<u64>,
    pub unlocked: Vec<u64>,
    pub waits: Vec<StreamHandle>,
    pub synchronized: usize,
}

impl FakeDecodeProvider {
    #[must_use]
    pub fn new(surface_format: SurfaceFormat, width: u32, height: u32) -> Self {
        Self {
            surface_format,
            width,
            height,
            stream: None,
            device: 0,
            decoded: 0,
            lockable: VecDeque::new(),
            locked: Vec::new(),
            unlocked: Vec::new(),
            waits: Vec::new(),
            synchronized: 0,
        }
    }

    fn frame_bytes(&self) -> u64 {
        crate::layout::frame_size(self.surface_format.pixel_format(), self.width, self.height)
            .unwrap_or_default() as u64
    }
}

impl DecodeProvider for FakeDecodeProvider {
    fn decode(&mut self, data: &[u8], pts: i64) -> Result<Vec<DecodedSurface>, CodecError> {
        if data.is_empty() {
            return Ok(Vec::new());
        }
        let ptr = FAKE_SURFACE_BASE + self.decoded as u64 * self.frame_bytes();
        self.decoded += 1;
        Ok(vec![DecodedSurface { ptr, timestamp: pts }])
    }

    fn surface_format(&self) -> SurfaceFormat {
        self.surface_format
    }

    fn width(&self) -> u32 {
        self.width
    }

    fn height(&self) -> u32 {
        self.height
    }

    fn chroma_planes(&self) -> usize {
        self.surface_format.pixel_format().plane_count().saturating_sub(1)
    }

    fn bit_depth(&self) -> u32 {
        match self.surface_format {
            SurfaceFormat::P016 | SurfaceFormat::Yuv444P16 => 16,
            _ => 8,
        }
    }

    fn pitch(&self) -> usize {
        self.width as usize * self.surface_format.pixel_format().element().size()
    }

    fn stream(&self) -> Option<StreamHandle> {
        self.stream
    }

    fn device(&self) -> i32 {
        self.device
    }

    fn lock_frame(&mut self) -> Result<Option<DecodedSurface>, CodecError> {
        let surface = self.lockable.pop_front();
        if let Some(s) = surface {
            self.locked.push(s.ptr);
        }
        Ok(surface)
    }

    fn unlock_frame(&mut self, ptr: u64) -> Result<(), CodecError> {
        if !self.locked.contains(&ptr) {
            return Err(CodecError::provider("unlock_frame", 1));
        }
        self.locked.retain(|&p| p != ptr);
        self.unlocked.push(ptr);
        Ok(())
    }

    fn wait_on_stream(&mut self, stream: StreamHandle) -> Result<(), CodecError> {
        self.waits.push(stream);
        Ok(())
    }

    fn synchronize(&mut self) -> Result<(), CodecError> {
        self.synchronized += 1;
        Ok(())
    }
}
