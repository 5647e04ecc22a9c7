//! Encoder session.

use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use nvvc_codec::config::{ConfigResolver, EncoderOptions, InitializeParams, ReconfigureParams};
use nvvc_codec::provider::{CopySource, EncodeProvider, PointerAttributes, RegistrationHandle};
use nvvc_codec::registry::InputRegistry;
use nvvc_codec::{
    CodecError, FrameSource, InputAssembler, PixelFormat, TimestampLedger, TimestampedPacket,
    TuningInfo,
};
use tracing::{debug, info, warn};

/// Session-level encoder settings.
///
/// `fmt` and `s` are always derived from the format and size given here and
/// override the same keys in the options.
#[derive(Debug, Clone)]
pub struct EncoderSettings {
    pub width: u32,
    pub height: u32,
    pub format: PixelFormat,
    /// Accept host buffers as input.
    pub host_input: bool,
    /// Device the input buffers must live on.
    pub device: i32,
    pub options: EncoderOptions,
}

impl EncoderSettings {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            format: PixelFormat::Nv12,
            host_input: false,
            device: 0,
            options: EncoderOptions::new(),
        }
    }

    #[must_use]
    pub fn format(mut self, format: PixelFormat) -> Self {
        self.format = format;
        self
    }

    #[must_use]
    pub fn host_input(mut self, enabled: bool) -> Self {
        self.host_input = enabled;
        self
    }

    #[must_use]
    pub fn device(mut self, device: i32) -> Self {
        self.device = device;
        self
    }

    #[must_use]
    pub fn option(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.options.insert(key, value);
        self
    }

    #[must_use]
    pub fn options(mut self, options: EncoderOptions) -> Self {
        self.options = options;
        self
    }

    fn resolved_options(&self) -> EncoderOptions {
        let mut options = self.options.clone();
        options.insert("fmt", self.format.name());
        options.insert("s", format!("{}x{}", self.width, self.height));
        options
    }
}

/// A hardware encoder session.
///
/// Frames go in with a timestamp and come out as packets carrying the same
/// timestamp, whatever order the hardware emits them in.
pub struct Encoder<P: EncodeProvider> {
    provider: P,
    attributes: Box<dyn PointerAttributes>,
    settings: EncoderSettings,
    params: InitializeParams,
    reconfigure_params: ReconfigureParams,
    ledger: TimestampLedger,
    registry: InputRegistry,
}

impl<P: EncodeProvider> Encoder<P> {
    /// Resolve `settings` and create the hardware session.
    pub fn new(
        settings: EncoderSettings,
        mut provider: P,
        attributes: Box<dyn PointerAttributes>,
    ) -> Result<Self, CodecError> {
        let options = settings.resolved_options();
        let params = ConfigResolver::new(&options).resolve(&provider)?;
        provider.initialize(&params)?;

        info!(
            codec = params.codec.name(),
            width = settings.width,
            height = settings.height,
            format = settings.format.name(),
            "encoder session created"
        );

        Ok(Self {
            reconfigure_params: ReconfigureParams::from_params(&params),
            provider,
            attributes,
            settings,
            params,
            ledger: TimestampLedger::new(),
            registry: InputRegistry::new(),
        })
    }

    /// Encode one frame.
    ///
    /// `timestamp` defaults to the wall clock in nanoseconds. Returns the
    /// packets the encoder completed, possibly none.
    pub fn encode(
        &mut self,
        frame: &dyn FrameSource,
        timestamp: Option<i64>,
    ) -> Result<Vec<TimestampedPacket>, CodecError> {
        let assembler = InputAssembler::new(
            self.attributes.as_ref(),
            self.settings.device,
            self.settings.format,
            self.settings.width,
            self.settings.height,
            self.settings.host_input,
        );
        assembler.acquire(frame, &mut self.provider)?;

        let sequence = self.ledger.next_sequence();
        self.ledger
            .submit(sequence, timestamp.unwrap_or_else(wall_clock_ns))?;
        if let Err(e) = self.provider.submit(sequence) {
            let _ = self.ledger.resolve(sequence);
            return Err(e);
        }

        let packets = self.provider.drain()?;
        self.ledger.rewrite(packets)
    }

    /// Flush the encoder and return every remaining packet.
    pub fn end_encode(&mut self) -> Result<Vec<TimestampedPacket>, CodecError> {
        let packets = self.provider.flush()?;
        let packets = self.ledger.rewrite(packets)?;
        debug!(count = packets.len(), "encoder flushed");
        Ok(packets)
    }

    /// Reconfigurable parameters as last applied.
    pub fn reconfigure_params(&self) -> ReconfigureParams {
        self.reconfigure_params
    }

    /// Parameters the session was created with, updated by reconfiguration.
    pub fn params(&self) -> &InitializeParams {
        &self.params
    }

    /// Apply new rate control and frame rate settings to the live session.
    ///
    /// Returns the encoder's verdict; on `false` nothing changes.
    pub fn reconfigure(&mut self, params: ReconfigureParams) -> Result<bool, CodecError> {
        let mut next = self.provider.initialize_params()?;
        params.apply_to(&mut next);
        next.tuning_info = TuningInfo::LowLatency;
        self.apply_reconfigure(next)
    }

    /// Reconfigure from string options, resolved against the live session.
    pub fn reconfigure_with_options(&mut self, options: &EncoderOptions) -> Result<bool, CodecError> {
        let live = self.provider.initialize_params()?;
        let next = ConfigResolver::new(options).reconfigure(&live, &self.provider)?;
        self.apply_reconfigure(next)
    }

    fn apply_reconfigure(&mut self, next: InitializeParams) -> Result<bool, CodecError> {
        if !self.provider.reconfigure(&next)? {
            warn!("encoder rejected reconfiguration");
            return Ok(false);
        }
        self.reconfigure_params = ReconfigureParams::from_params(&next);
        self.params = next;
        debug!(params = ?self.reconfigure_params, "encoder reconfigured");
        Ok(true)
    }

    /// Register a device frame so the encoder can read it in place.
    ///
    /// The frame is validated like an encode input and kept alive until the
    /// session is dropped. Registering the same buffer twice returns the
    /// existing handle.
    pub fn register_input_frame(
        &mut self,
        frame: Arc<dyn FrameSource>,
    ) -> Result<RegistrationHandle, CodecError> {
        let assembler = InputAssembler::new(
            self.attributes.as_ref(),
            self.settings.device,
            self.settings.format,
            self.settings.width,
            self.settings.height,
            false,
        );
        let (ptr, pitch) = {
            let copy = assembler.prepare(frame.as_ref())?;
            match copy.source {
                CopySource::Device(ptr) => (ptr, copy.src_pitch),
                CopySource::Host(_) => return Err(CodecError::UnsupportedInputType),
            }
        };
        self.registry
            .register(&mut self.provider, ptr, pitch, self.settings.format, frame)
    }

    /// Handle of the registration covering the buffer at `ptr`, if any.
    pub fn registration(&self, ptr: u64) -> Option<RegistrationHandle> {
        self.registry.handle(ptr)
    }

    /// Number of registered input buffers.
    pub fn registered_inputs(&self) -> usize {
        self.registry.len()
    }

    /// The underlying hardware session.
    pub fn provider(&self) -> &P {
        &self.provider
    }
}

impl<P: EncodeProvider> Drop for Encoder<P> {
    fn drop(&mut self) {
        if let Err(e) = self.registry.unregister_all(&mut self.provider) {
            warn!(error = %e, "failed to release registered inputs");
        }
    }
}

fn wall_clock_ns() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(duration_ns)
        .unwrap_or_default()
}

/// Nanoseconds in `d`, saturating at `i64::MAX`.
fn duration_ns(d: Duration) -> i64 {
    i64::try_from(d.as_nanos()).unwrap_or(i64::MAX)
}
