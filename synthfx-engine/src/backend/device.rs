//! Realtime output through CPAL.
//!
//! The stream lives on a dedicated output thread (CPAL streams are not `Send`
//! on every platform). `start` spawns that thread and waits for it to report
//! whether the stream is playing; dropping the backend shuts it down.
//! The mono mix is duplicated to every device channel.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, OnceLock};
use std::thread::JoinHandle;

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use crossbeam_channel::{bounded, Sender};

use crate::backend::{AudioBackend, VoiceHandle};
use crate::error::EngineError;
use crate::lock;
use crate::mixer::Mixer;

/// Sample rate reported before `prepare` has picked the device format.
const FALLBACK_SAMPLE_RATE: f32 = 48_000.0;

/// Mono frames mixed per pass inside the device callback.
const SCRATCH_FRAMES: usize = 4096;

#[derive(Clone, Copy, Debug, PartialEq)]
struct OutputFormat {
    sample_rate: u32,
    channels: u16,
    sample_format: cpal::SampleFormat,
}

struct OutputThread {
    shutdown: Sender<()>,
    handle: JoinHandle<()>,
}

pub struct CpalBackend {
    mixer: Mixer,
    format: OnceLock<OutputFormat>,
    running: Arc<AtomicBool>,
    output: Mutex<Option<OutputThread>>,
}

impl Default for CpalBackend {
    fn default() -> Self { Self::new() }
}

impl CpalBackend {
    pub fn new() -> Self {
        Self {
            mixer: Mixer::new(),
            format: OnceLock::new(),
            running: Arc::new(AtomicBool::new(false)),
            output: Mutex::new(None),
        }
    }

    pub fn mixer(&self) -> &Mixer { &self.mixer }

    /// Device channel count once prepared.
    pub fn channels(&self) -> Option<u16> { self.format.get().map(|f| f.channels) }

    fn shutdown(&self) {
        if let Some(out) = lock(&self.output).take() {
            drop(out.shutdown);
            if out.handle.join().is_err() {
                log::warn!("audio output thread panicked");
            }
        }
        self.running.store(false, Ordering::SeqCst);
    }
}

impl Drop for CpalBackend {
    fn drop(&mut self) { self.shutdown(); }
}

/// Names of the output devices on the default host.
pub fn output_device_names() -> Result<Vec<String>, EngineError> {
    let host = cpal::default_host();
    let devices = host.output_devices().map_err(|e| EngineError::Prepare(e.to_string()))?;
    Ok(devices.filter_map(|d| d.name().ok()).collect())
}

fn default_device() -> Result<cpal::Device, EngineError> {
    cpal::default_host()
        .default_output_device()
        .ok_or_else(|| EngineError::Prepare("no default output device".into()))
}

fn build_stream<T>(
    device: &cpal::Device,
    cfg: &cpal::StreamConfig,
    mixer: Mixer,
    running: Arc<AtomicBool>,
) -> Result<cpal::Stream, EngineError>
where
    T: cpal::SizedSample + cpal::FromSample<f32> + Send + 'static,
{
    let channels = usize::from(cfg.channels).max(1);
    let mut mono = vec![0.0f32; SCRATCH_FRAMES];

    let err_fn = move |e: cpal::StreamError| {
        log::error!("audio stream error: {e}");
        running.store(false, Ordering::SeqCst);
    };

    device
        .build_output_stream(
            cfg,
            move |output: &mut [T], _| fill_interleaved(&mixer, &mut mono, output, channels, |s| T::from_sample(s)),
            err_fn,
            None,
        )
        .map_err(|e| EngineError::Start(e.to_string()))
}

/// Mix into `scratch` one block at a time and copy each mono frame to every
/// channel of `output`. Allocation free; trailing partial frames are zeroed.
fn fill_interleaved<T: Copy>(
    mixer: &Mixer,
    scratch: &mut [f32],
    output: &mut [T],
    channels: usize,
    convert: impl Fn(f32) -> T,
) {
    let block = scratch.len().max(1) * channels;
    for chunk in output.chunks_mut(block) {
        let frames = chunk.len() / channels;
        let mono = &mut scratch[..frames];
        mixer.render(mono);
        for (frame, s) in chunk.chunks_exact_mut(channels).zip(mono.iter()) {
            frame.fill(convert(*s));
        }
        for rest in chunk.chunks_exact_mut(channels).into_remainder() {
            *rest = convert(0.0);
        }
    }
}

/// Record the first prepared format. Returns `false` (and warns) when a later
/// `prepare` sees a different one; the stored format keeps being used.
fn store_format(cell: &OnceLock<OutputFormat>, format: OutputFormat) -> bool {
    let stored = *cell.get_or_init(|| format);
    if stored == format {
        return true;
    }
    log::warn!(
        "output format changed to {} Hz, {} ch, {:?}; keeping {} Hz, {} ch, {:?}",
        format.sample_rate,
        format.channels,
        format.sample_format,
        stored.sample_rate,
        stored.channels,
        stored.sample_format
    );
    false
}

fn open_stream(format: OutputFormat, mixer: Mixer, running: Arc<AtomicBool>) -> Result<cpal::Stream, EngineError> {
    let device = default_device()?;
    let cfg = cpal::StreamConfig {
        channels: format.channels,
        sample_rate: cpal::SampleRate(format.sample_rate),
        buffer_size: cpal::BufferSize::Default,
    };
    let stream = match format.sample_format {
        cpal::SampleFormat::F32 => build_stream::<f32>(&device, &cfg, mixer, running)?,
        cpal::SampleFormat::I16 => build_stream::<i16>(&device, &cfg, mixer, running)?,
        cpal::SampleFormat::U16 => build_stream::<u16>(&device, &cfg, mixer, running)?,
        other => return Err(EngineError::Start(format!("unsupported device sample format: {other:?}"))),
    };
    stream.play().map_err(|e| EngineError::Start(e.to_string()))?;
    Ok(stream)
}

impl AudioBackend for CpalBackend {
    fn prepare(&self) -> Result<(), EngineError> {
        let device = default_device()?;
        let sup = device.default_output_config().map_err(|e| EngineError::Prepare(e.to_string()))?;
        let format = OutputFormat {
            sample_rate: sup.sample_rate().0,
            channels: sup.channels(),
            sample_format: sup.sample_format(),
        };
        log::info!(
            "output device {:?}: {} Hz, {} ch, {:?}",
            device.name().unwrap_or_default(),
            format.sample_rate,
            format.channels,
            format.sample_format
        );
        store_format(&self.format, format);
        Ok(())
    }

    fn start(&self) -> Result<(), EngineError> {
        if self.is_running() {
            return Ok(());
        }
        self.shutdown();
        let format = *self.format.get().ok_or_else(|| EngineError::Start("backend not prepared".into()))?;

        let (ready_tx, ready_rx) = bounded::<Result<(), EngineError>>(1);
        let (shutdown_tx, shutdown_rx) = bounded::<()>(0);
        let mixer = self.mixer.clone();
        let running = Arc::clone(&self.running);

        let handle = std::thread::Builder::new()
            .name("synthfx-output".into())
            .spawn(move || match open_stream(format, mixer, Arc::clone(&running)) {
                Ok(stream) => {
                    running.store(true, Ordering::SeqCst);
                    let _ = ready_tx.send(Ok(()));
                    // Blocks until the backend drops the sender.
                    let _ = shutdown_rx.recv();
                    running.store(false, Ordering::SeqCst);
                    drop(stream);
                }
                Err(e) => {
                    let _ = ready_tx.send(Err(e));
                }
            })
            .map_err(|e| EngineError::Start(e.to_string()))?;

        let ready = ready_rx
            .recv()
            .unwrap_or_else(|_| Err(EngineError::Start("output thread exited early".into())));
        *lock(&self.output) = Some(OutputThread { shutdown: shutdown_tx, handle });
        ready
    }

    fn is_running(&self) -> bool { self.running.load(Ordering::SeqCst) }

    #[allow(clippy::cast_precision_loss)]
    fn sample_rate(&self) -> f32 {
        self.format.get().map_or(FALLBACK_SAMPLE_RATE, |f| f.sample_rate as f32)
    }

    fn create_voice(&self) -> Result<Box<dyn VoiceHandle>, EngineError> {
        Ok(Box::new(self.mixer.add_voice()))
    }
}

// ------------------------------------ Tests --------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use synthfx_core::render::SampleBuffer;

    fn format(sample_rate: u32) -> OutputFormat {
        OutputFormat { sample_rate, channels: 2, sample_format: cpal::SampleFormat::F32 }
    }

    #[test]
    fn long_callbacks_are_mixed_in_blocks() {
        let mixer = Mixer::new();
        let ramp: Vec<f32> = (0..25).map(|i| i as f32 / 100.0).collect();
        let mut v = mixer.add_voice();
        v.schedule(&SampleBuffer::from_samples(ramp.clone(), 100.0));
        v.play();

        let mut scratch = [0.0f32; 8];
        let mut out = [9.0f32; 30 * 2 + 1];
        fill_interleaved(&mixer, &mut scratch, &mut out, 2, |s| s);

        for (i, frame) in out[..60].chunks(2).enumerate() {
            let want = ramp.get(i).copied().unwrap_or(0.0);
            assert_eq!(frame, [want, want], "frame {i}");
        }
        assert_eq!(out[60], 0.0);
        assert!(!v.is_playing());
    }

    #[test]
    fn changed_format_keeps_the_first() {
        let cell = OnceLock::new();
        assert!(store_format(&cell, format(48_000)));
        assert!(store_format(&cell, format(48_000)));
        assert!(!store_format(&cell, format(44_100)));
        assert_eq!(cell.get().map(|f| f.sample_rate), Some(48_000));
    }
}
