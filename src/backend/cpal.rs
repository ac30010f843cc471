//! CPAL-based output device sink for desktop platforms (Linux, macOS, Windows)
//!
//! cpal pulls samples from a real-time callback, while the pipeline pushes
//! buffers with blocking writes. The two meet in an rtrb sample ring:
//! - write() pushes samples, parking while the ring is full
//! - the device callback pops samples (silence on underrun) and wakes the writer
//!
//! `cpal::Stream` cannot move between threads, so it lives on its own
//! `cpal-stream` thread for as long as the sink exists.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{mpsc, Arc, Condvar, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use rtrb::{Consumer, Producer, PushError, RingBuffer};

use super::{AudioOutput, AudioSink, PcmFormat};
use crate::error::PipelineError;

/// Writer wake-up bound in case a device notification is missed
const WRITER_WAIT: Duration = Duration::from_millis(5);

#[derive(Default)]
struct StreamShared {
    lock: Mutex<()>,
    cvar: Condvar,
    failure: Mutex<Option<String>>,
    shutdown: AtomicBool,
}

impl StreamShared {
    fn fail(&self, reason: String) {
        let mut failure = self.failure.lock().unwrap_or_else(|e| e.into_inner());
        failure.get_or_insert(reason);
        self.cvar.notify_all();
    }

    fn check(&self) -> Result<(), PipelineError> {
        let failure = self.failure.lock().unwrap_or_else(|e| e.into_inner());
        match failure.as_ref() {
            Some(reason) => Err(PipelineError::SinkWriteFailure {
                reason: reason.clone(),
            }),
            None => Ok(()),
        }
    }

    fn wait_for_space(&self) {
        let guard = self.lock.lock().unwrap_or_else(|e| e.into_inner());
        let _ = self
            .cvar
            .wait_timeout(guard, WRITER_WAIT)
            .unwrap_or_else(|e| e.into_inner());
    }
}

/// Default output device of the default host.
#[derive(Debug, Default, Clone, Copy)]
pub struct CpalOutput;

impl AudioOutput for CpalOutput {
    type Sink = CpalSink;

    fn open(&self, format: PcmFormat) -> Result<CpalSink, PipelineError> {
        if format.bits_per_sample != 16 {
            return Err(PipelineError::SinkUnavailable {
                reason: format!(
                    "Only 16-bit PCM is supported (got {} bits)",
                    format.bits_per_sample
                ),
            });
        }

        // ~100ms of device-side buffering
        let samples = format.sample_rate as usize / 10 * format.channel_count as usize;
        let capacity = samples.max(1024);
        let (producer, consumer) = RingBuffer::new(capacity);
        let shared = Arc::new(StreamShared::default());
        let (ready_tx, ready_rx) = mpsc::channel();

        let thread_shared = Arc::clone(&shared);
        let stream_thread = thread::Builder::new()
            .name("cpal-stream".into())
            .spawn(move || {
                let stream = match build_stream(format, consumer, Arc::clone(&thread_shared)) {
                    Ok(stream) => stream,
                    Err(err) => {
                        let _ = ready_tx.send(Err(err));
                        return;
                    }
                };
                let _ = ready_tx.send(Ok(()));

                while !thread_shared.shutdown.load(Ordering::Acquire) {
                    thread::park();
                }
                drop(stream);
            })
            .map_err(|e| PipelineError::ResourceExhausted {
                resource: format!("cpal stream thread: {}", e),
            })?;

        match ready_rx.recv() {
            Ok(Ok(())) => {
                tracing::info!("[CpalSink] Output stream running: {:?}", format);
                Ok(CpalSink {
                    producer,
                    shared,
                    stream_thread: Some(stream_thread),
                })
            }
            Ok(Err(err)) => {
                let _ = stream_thread.join();
                Err(err)
            }
            Err(_) => Err(PipelineError::SinkUnavailable {
                reason: "cpal stream thread exited during setup".to_string(),
            }),
        }
    }
}

fn build_stream(
    format: PcmFormat,
    consumer: Consumer<i16>,
    shared: Arc<StreamShared>,
) -> Result<cpal::Stream, PipelineError> {
    let host = cpal::default_host();
    let device = host
        .default_output_device()
        .ok_or_else(|| PipelineError::SinkUnavailable {
            reason: "No default output device found".to_string(),
        })?;

    let supported = device
        .default_output_config()
        .map_err(|e| PipelineError::SinkUnavailable {
            reason: format!("Failed to get default output config: {:?}", e),
        })?;

    let config = cpal::StreamConfig {
        channels: format.channel_count,
        sample_rate: cpal::SampleRate(format.sample_rate),
        buffer_size: cpal::BufferSize::Default,
    };

    let err_shared = Arc::clone(&shared);
    let err_fn = move |err: cpal::StreamError| {
        tracing::error!("[CpalSink] Output stream error: {}", err);
        err_shared.fail(err.to_string());
    };

    let stream = match supported.sample_format() {
        cpal::SampleFormat::F32 => {
            let mut consumer = consumer;
            device.build_output_stream(
                &config,
                move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                    for out in data.iter_mut() {
                        *out = consumer
                            .pop()
                            .map(|s| s as f32 / 32768.0)
                            .unwrap_or(0.0);
                    }
                    shared.cvar.notify_one();
                },
                err_fn,
                None,
            )
        }
        cpal::SampleFormat::I16 => {
            let mut consumer = consumer;
            device.build_output_stream(
                &config,
                move |data: &mut [i16], _: &cpal::OutputCallbackInfo| {
                    for out in data.iter_mut() {
                        *out = consumer.pop().unwrap_or(0);
                    }
                    shared.cvar.notify_one();
                },
                err_fn,
                None,
            )
        }
        other => {
            return Err(PipelineError::SinkUnavailable {
                reason: format!("Unsupported device sample format {:?}", other),
            })
        }
    }
    .map_err(|e| PipelineError::SinkUnavailable {
        reason: format!("{:?}", e),
    })?;

    stream.play().map_err(|e| PipelineError::SinkUnavailable {
        reason: format!("Output start failed: {}", e),
    })?;

    Ok(stream)
}

pub struct CpalSink {
    producer: Producer<i16>,
    shared: Arc<StreamShared>,
    stream_thread: Option<JoinHandle<()>>,
}

impl AudioSink for CpalSink {
    fn write(&mut self, bytes: &[u8]) -> Result<usize, PipelineError> {
        let mut written = 0;

        for pair in bytes.chunks_exact(2) {
            let mut sample = i16::from_le_bytes([pair[0], pair[1]]);
            loop {
                self.shared.check()?;
                match self.producer.push(sample) {
                    Ok(()) => break,
                    Err(PushError::Full(rejected)) => {
                        sample = rejected;
                        self.shared.wait_for_space();
                    }
                }
            }
            written += 2;
        }

        Ok(written)
    }
}

impl Drop for CpalSink {
    fn drop(&mut self) {
        self.shared.shutdown.store(true, Ordering::Release);
        if let Some(handle) = self.stream_thread.take() {
            handle.thread().unpark();
            let _ = handle.join();
        }
    }
}
