//! Audio capture from microphone
//!
//! Uses cpal for cross-platform capture. The stream callback converts
//! whatever the device delivers to mono f32 at the requested rate and
//! pushes it into a ring buffer that the calling thread drains until it
//! has enough samples.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{mpsc, Arc};
use std::thread;
use std::time::{Duration, Instant};

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{Device, FromSample, Sample, SampleFormat, SizedSample, Stream, StreamConfig};
use ringbuf::{traits::*, HeapCons, HeapProd, HeapRb};

use super::device::AudioContext;
use super::dsp::{downmix_to_mono, LinearResampler};
use super::error::AudioError;

/// How often the recording thread drains the ring buffer
const POLL_INTERVAL: Duration = Duration::from_millis(20);

/// A device that delivers no samples for this long is considered interrupted
const STALL_TIMEOUT: Duration = Duration::from_secs(5);

/// Source of mono samples for the recorder
#[cfg_attr(test, mockall::automock)]
pub trait CaptureSource {
    /// Block until `frames` mono samples at `sample_rate` have been captured.
    ///
    /// Implementations may return more than `frames` samples; the recorder
    /// trims the excess.
    fn capture(&self, frames: usize, sample_rate: u32) -> Result<Vec<f32>, AudioError>;
}

/// Capture from the microphone named in an [`AudioContext`] via the default cpal host
pub struct CpalSource {
    context: AudioContext,
}

impl CpalSource {
    pub fn new(context: AudioContext) -> Self {
        Self { context }
    }

    /// Look the resolved microphone up again; it may have gone away since startup
    fn find_device(&self) -> Result<Device, AudioError> {
        let host = cpal::default_host();
        let wanted = self.context.microphone();

        let mut devices = host
            .input_devices()
            .map_err(|e| AudioError::DeviceUnavailable(e.to_string()))?;

        devices
            .find(|d| d.name().map(|name| name == wanted).unwrap_or(false))
            .ok_or_else(|| AudioError::DeviceUnavailable(format!("{} not found", wanted)))
    }
}

impl CaptureSource for CpalSource {
    fn capture(&self, frames: usize, sample_rate: u32) -> Result<Vec<f32>, AudioError> {
        let device = self.find_device()?;

        let supported_config = device
            .default_input_config()
            .map_err(|e| AudioError::CaptureError(e.to_string()))?;

        let source_rate = supported_config.sample_rate().0;
        let channels = supported_config.channels();
        let sample_format = supported_config.sample_format();

        tracing::info!(
            "Audio config: {}Hz {}ch {:?} -> {}Hz mono",
            source_rate,
            channels,
            sample_format,
            sample_rate
        );

        // One second of headroom between the callback and the drain loop
        let rb = HeapRb::<f32>::new(sample_rate.max(1) as usize);
        let (producer, mut consumer) = rb.split();
        let (error_tx, error_rx) = mpsc::channel::<String>();
        let dropped = Arc::new(AtomicUsize::new(0));

        let sink = CallbackSink {
            channels,
            resampler: LinearResampler::new(source_rate, sample_rate),
            producer,
            error_tx,
            dropped: Arc::clone(&dropped),
        };

        let stream_config: StreamConfig = supported_config.into();
        let stream = match sample_format {
            SampleFormat::I8 => build_stream::<i8>(&device, &stream_config, sink),
            SampleFormat::I16 => build_stream::<i16>(&device, &stream_config, sink),
            SampleFormat::I32 => build_stream::<i32>(&device, &stream_config, sink),
            SampleFormat::U8 => build_stream::<u8>(&device, &stream_config, sink),
            SampleFormat::U16 => build_stream::<u16>(&device, &stream_config, sink),
            SampleFormat::F32 => build_stream::<f32>(&device, &stream_config, sink),
            SampleFormat::F64 => build_stream::<f64>(&device, &stream_config, sink),
            other => Err(AudioError::CaptureError(format!(
                "unsupported sample format {:?}",
                other
            ))),
        }?;

        stream
            .play()
            .map_err(|e| AudioError::CaptureError(e.to_string()))?;

        tracing::info!("Audio capture started ({} samples)", frames);
        let samples = drain(&mut consumer, &error_rx, &dropped, frames, STALL_TIMEOUT);

        drop(stream);
        tracing::info!("Audio capture stopped");

        samples
    }
}

/// Pop samples until `frames` are collected.
///
/// Fails on a stream error, on any sample lost to a ring buffer overrun,
/// or when nothing arrives for `stall_timeout`.
fn drain(
    consumer: &mut HeapCons<f32>,
    errors: &mpsc::Receiver<String>,
    dropped: &AtomicUsize,
    frames: usize,
    stall_timeout: Duration,
) -> Result<Vec<f32>, AudioError> {
    let mut samples = Vec::with_capacity(frames);
    let mut chunk = vec![0.0f32; 4096];
    let mut last_data = Instant::now();

    while samples.len() < frames {
        if let Ok(message) = errors.try_recv() {
            return Err(AudioError::CaptureError(message));
        }

        let lost = dropped.load(Ordering::Relaxed);
        if lost > 0 {
            tracing::warn!("{} samples dropped on ring buffer overrun", lost);
            return Err(AudioError::CaptureError(format!(
                "{} samples lost to buffer overrun",
                lost
            )));
        }

        let read = consumer.pop_slice(&mut chunk);
        if read == 0 {
            if last_data.elapsed() > stall_timeout {
                return Err(AudioError::CaptureError(format!(
                    "no audio received for {:.1}s",
                    stall_timeout.as_secs_f64()
                )));
            }
            thread::sleep(POLL_INTERVAL);
            continue;
        }

        last_data = Instant::now();
        let take = read.min(frames - samples.len());
        samples.extend_from_slice(&chunk[..take]);
    }

    Ok(samples)
}

/// State moved into the stream callback
struct CallbackSink {
    channels: u16,
    resampler: LinearResampler,
    producer: HeapProd<f32>,
    error_tx: mpsc::Sender<String>,
    dropped: Arc<AtomicUsize>,
}

fn build_stream<T>(
    device: &Device,
    config: &StreamConfig,
    sink: CallbackSink,
) -> Result<Stream, AudioError>
where
    T: SizedSample,
    f32: FromSample<T>,
{
    let CallbackSink {
        channels,
        mut resampler,
        mut producer,
        error_tx,
        dropped,
    } = sink;

    device
        .build_input_stream(
            config,
            move |data: &[T], _: &cpal::InputCallbackInfo| {
                let converted: Vec<f32> = data.iter().map(|&s| f32::from_sample(s)).collect();
                let mono = downmix_to_mono(&converted, channels);
                let resampled = resampler.process(&mono);

                let pushed = producer.push_slice(&resampled);
                if pushed < resampled.len() {
                    dropped.fetch_add(resampled.len() - pushed, Ordering::Relaxed);
                }
            },
            move |err| {
                tracing::error!("Audio stream error: {}", err);
                let _ = error_tx.send(err.to_string());
            },
            None,
        )
        .map_err(|e| AudioError::CaptureError(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn drain_stops_at_exact_length() {
        let (mut producer, mut consumer) = HeapRb::<f32>::new(2048).split();
        let (_error_tx, error_rx) = mpsc::channel();
        let dropped = AtomicUsize::new(0);

        assert_eq!(producer.push_slice(&[0.5; 1500]), 1500);

        let samples = drain(&mut consumer, &error_rx, &dropped, 1000, STALL_TIMEOUT).unwrap();
        assert_eq!(samples.len(), 1000);
        assert!(samples.iter().all(|&s| s == 0.5));
    }

    #[test]
    fn drain_collects_across_chunks() {
        let (mut producer, mut consumer) = HeapRb::<f32>::new(1024).split();
        let (_error_tx, error_rx) = mpsc::channel();
        let dropped = AtomicUsize::new(0);

        let feeder = thread::spawn(move || {
            for _ in 0..20 {
                while producer.push_slice(&[0.25; 512]) < 512 {
                    thread::sleep(Duration::from_millis(1));
                }
            }
        });

        let samples = drain(&mut consumer, &error_rx, &dropped, 8000, STALL_TIMEOUT).unwrap();
        feeder.join().unwrap();
        assert_eq!(samples.len(), 8000);
    }

    #[test]
    fn stream_error_ends_capture() {
        let (_producer, mut consumer) = HeapRb::<f32>::new(16).split();
        let (error_tx, error_rx) = mpsc::channel();
        let dropped = AtomicUsize::new(0);

        error_tx.send("device unplugged".to_string()).unwrap();

        let err = drain(&mut consumer, &error_rx, &dropped, 100, STALL_TIMEOUT).unwrap_err();
        match err {
            AudioError::CaptureError(message) => assert_eq!(message, "device unplugged"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn silent_device_times_out() {
        let (_producer, mut consumer) = HeapRb::<f32>::new(16).split();
        let (_error_tx, error_rx) = mpsc::channel();
        let dropped = AtomicUsize::new(0);

        let started = Instant::now();
        let err = drain(
            &mut consumer,
            &error_rx,
            &dropped,
            100,
            Duration::from_millis(50),
        )
        .unwrap_err();

        assert!(matches!(err, AudioError::CaptureError(_)));
        assert!(started.elapsed() < STALL_TIMEOUT);
    }

    #[test]
    fn overrun_is_an_error() {
        let (mut producer, mut consumer) = HeapRb::<f32>::new(16).split();
        let (_error_tx, error_rx) = mpsc::channel();
        let dropped = AtomicUsize::new(3);

        producer.push_slice(&[0.0; 16]);

        let err = drain(&mut consumer, &error_rx, &dropped, 100, STALL_TIMEOUT).unwrap_err();
        assert!(matches!(err, AudioError::CaptureError(m) if m.contains("overrun")));
    }
}
