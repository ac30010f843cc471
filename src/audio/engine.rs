//! Pipeline startup and the fatal-error boundary.
//!
//! # Architecture
//! ```text
//! Pipeline::start(config, output)
//!   ├─> PipelineConfig::validate()        [InvalidConfig]
//!   ├─> AudioOutput::open()               [SinkUnavailable]
//!   ├─> BufferPool::new() + handoff       [ResourceExhausted]
//!   ├─> spawn "tone-producer"  ─┐
//!   └─> spawn "sink-consumer"  ─┴─> first fatal error -> PipelineHandle::wait()
//! ```
//!
//! Both threads run until one hits a fatal error. There is no stop: the
//! caller at the top of the process decides what to do with the error.

use std::any::Any;
use std::convert::Infallible;
use std::sync::mpsc;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use super::buffer_pool::BufferPool;
use super::consumer::SinkConsumer;
use super::handoff;
use super::producer::ToneProducer;
use crate::backend::AudioOutput;
use crate::config::PipelineConfig;
use crate::error::{log_pipeline_error, PipelineError};
use crate::telemetry::{PipelineStats, StatsSnapshot};

/// Which pipeline thread reported a fatal error
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineTask {
    Producer,
    Consumer,
}

/// Fatal error together with the task that raised it
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineFailure {
    pub task: PipelineTask,
    pub error: PipelineError,
}

pub struct Pipeline;

impl Pipeline {
    /// Validate, open the sink, allocate buffers and spawn both tasks.
    ///
    /// Nothing is spawned unless every startup step succeeds.
    ///
    /// # Errors
    /// - `InvalidConfig` if the configuration is rejected
    /// - `SinkUnavailable` if the output cannot be opened
    /// - `ResourceExhausted` if buffers or threads cannot be allocated
    pub fn start<O: AudioOutput>(
        config: &PipelineConfig,
        output: &O,
    ) -> Result<PipelineHandle, PipelineError> {
        config.validate().map_err(|err| {
            log_pipeline_error(&err, "pipeline start");
            err
        })?;

        let sink = output.open(config.pcm_format()).map_err(|err| {
            log_pipeline_error(&err, "sink open");
            err
        })?;

        let (pool, recycle) = BufferPool::new(config.buffers.slot_count, config.slot_bytes())?;
        let (outbound, inbound) = handoff::try_channel(config.buffers.channel_capacity)?;
        let stats = Arc::new(PipelineStats::new());

        let producer = ToneProducer::new(
            config.tone_generator(),
            pool,
            outbound,
            config.buffers.samples_per_slot,
            Arc::clone(&stats),
        );
        let consumer = SinkConsumer::new(inbound, recycle, sink, Arc::clone(&stats));

        let (failure_tx, failures) = mpsc::channel();

        // Consumer first, so a failed producer spawn leaves no orphan writer
        // blocked on an empty channel: dropping the producer closes it.
        let consumer_thread = spawn_task(
            "sink-consumer",
            PipelineTask::Consumer,
            failure_tx.clone(),
            move || consumer.run(),
        )?;
        let producer_thread = spawn_task(
            "tone-producer",
            PipelineTask::Producer,
            failure_tx,
            move || producer.run(),
        )?;

        tracing::info!(
            "[Pipeline] Started: {} Hz, {} slots x {} bytes, channel capacity {}",
            config.format.sample_rate,
            config.buffers.slot_count,
            config.slot_bytes(),
            config.buffers.channel_capacity
        );

        Ok(PipelineHandle {
            failures,
            stats,
            producer: Some(producer_thread),
            consumer: Some(consumer_thread),
        })
    }
}

fn spawn_task<F>(
    name: &str,
    task: PipelineTask,
    failure_tx: mpsc::Sender<PipelineFailure>,
    body: F,
) -> Result<JoinHandle<()>, PipelineError>
where
    F: FnOnce() -> Result<Infallible, PipelineError> + Send + 'static,
{
    thread::Builder::new()
        .name(name.to_string())
        .spawn(move || {
            let error = match body() {
                Ok(never) => match never {},
                Err(error) => error,
            };
            log_pipeline_error(&error, &format!("{:?} task", task));
            let _ = failure_tx.send(PipelineFailure { task, error });
        })
        .map_err(|e| PipelineError::ResourceExhausted {
            resource: format!("{} thread: {}", name, e),
        })
}

/// Handle to a running pipeline.
pub struct PipelineHandle {
    failures: mpsc::Receiver<PipelineFailure>,
    stats: Arc<PipelineStats>,
    producer: Option<JoinHandle<()>>,
    consumer: Option<JoinHandle<()>>,
}

impl PipelineHandle {
    pub fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }

    /// Blocks until the first fatal error.
    pub fn wait(&self) -> PipelineFailure {
        match self.failures.recv() {
            Ok(failure) => failure,
            Err(_) => PipelineFailure {
                task: PipelineTask::Consumer,
                error: PipelineError::channel_fault("pipeline threads exited without reporting"),
            },
        }
    }

    /// Like [`wait`](Self::wait), but gives up after `timeout`.
    pub fn wait_timeout(&self, timeout: Duration) -> Option<PipelineFailure> {
        match self.failures.recv_timeout(timeout) {
            Ok(failure) => Some(failure),
            Err(mpsc::RecvTimeoutError::Timeout) => None,
            Err(mpsc::RecvTimeoutError::Disconnected) => Some(PipelineFailure {
                task: PipelineTask::Consumer,
                error: PipelineError::channel_fault("pipeline threads exited without reporting"),
            }),
        }
    }

    /// Waits for both threads to exit.
    ///
    /// Only returns once both tasks have stopped; a healthy pipeline never
    /// ends. Returns the tasks whose thread panicked rather than reporting a
    /// failure, after logging each panic.
    pub fn join(mut self) -> Vec<PipelineTask> {
        let threads = [
            (PipelineTask::Producer, self.producer.take()),
            (PipelineTask::Consumer, self.consumer.take()),
        ];

        let mut panicked = Vec::new();
        for (task, handle) in threads {
            if let Some(handle) = handle {
                if let Err(payload) = handle.join() {
                    tracing::error!(
                        "[Pipeline] {:?} task panicked: {}",
                        task,
                        panic_message(payload.as_ref())
                    );
                    panicked.push(task);
                }
            }
        }
        panicked
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(message) = payload.downcast_ref::<&str>() {
        *message
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.as_str()
    } else {
        "non-string panic payload"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{AudioSink, PcmFormat};
    use crate::testing::{FailingSink, RecordingOutput};

    struct FailingOutput;

    impl AudioOutput for FailingOutput {
        type Sink = FailingSink;

        fn open(&self, _format: PcmFormat) -> Result<FailingSink, PipelineError> {
            Ok(FailingSink::new())
        }
    }

    struct PanickingSink;

    impl AudioSink for PanickingSink {
        fn write(&mut self, _bytes: &[u8]) -> Result<usize, PipelineError> {
            panic!("sink driver crashed");
        }
    }

    struct PanickingOutput;

    impl AudioOutput for PanickingOutput {
        type Sink = PanickingSink;

        fn open(&self, _format: PcmFormat) -> Result<PanickingSink, PipelineError> {
            Ok(PanickingSink)
        }
    }

    fn small_config() -> PipelineConfig {
        let mut config = PipelineConfig::default();
        config.buffers.samples_per_slot = 64;
        config
    }

    #[test]
    fn test_invalid_config_spawns_nothing() {
        let mut config = small_config();
        config.buffers.slot_count = 2;
        let output = RecordingOutput::new();

        let result = Pipeline::start(&config, &output);
        assert!(matches!(result, Err(PipelineError::InvalidConfig { .. })));
        assert_eq!(output.opened_format(), None, "sink must not be opened");
    }

    #[test]
    fn test_unavailable_sink_aborts_start() {
        let result = Pipeline::start(&small_config(), &RecordingOutput::unavailable());
        assert!(matches!(result, Err(PipelineError::SinkUnavailable { .. })));
    }

    #[test]
    fn test_sink_failure_reaches_boundary() {
        let handle = Pipeline::start(&small_config(), &FailingOutput).unwrap();

        let failure = handle.wait();
        assert_eq!(failure.task, PipelineTask::Consumer);
        assert!(matches!(
            failure.error,
            PipelineError::SinkWriteFailure { .. }
        ));

        // Consumer gone: the producer faults on its next send or acquire
        let second = handle
            .wait_timeout(Duration::from_secs(5))
            .expect("producer must stop once the consumer is gone");
        assert_eq!(second.task, PipelineTask::Producer);
        assert!(matches!(second.error, PipelineError::ChannelFault { .. }));
        handle.join();
    }

    #[test]
    fn test_opens_sink_with_configured_format() {
        let output = RecordingOutput::with_write_limit(4);
        let handle = Pipeline::start(&small_config(), &output).unwrap();

        let format = output.opened_format().expect("sink opened");
        assert_eq!(format.sample_rate, 48000);
        assert_eq!(format.bits_per_sample, 16);
        assert_eq!(format.channel_count, 1);

        handle.wait();
        handle.join();
        assert_eq!(output.sink().write_count(), 4);
    }

    #[test]
    fn test_oversized_slot_count_is_resource_exhausted() {
        let mut config = small_config();
        config.buffers.slot_count = usize::MAX / 4;

        match Pipeline::start(&config, &RecordingOutput::new()) {
            Err(PipelineError::ResourceExhausted { .. }) => {}
            Err(other) => panic!("Expected ResourceExhausted, got {:?}", other),
            Ok(_) => panic!("Expected ResourceExhausted, pipeline started"),
        }
    }

    #[test]
    fn test_join_reports_panicked_task() {
        let handle = Pipeline::start(&small_config(), &PanickingOutput).unwrap();

        // The consumer never reports; its dropped channel halves fault the producer
        let failure = handle.wait();
        assert_eq!(failure.task, PipelineTask::Producer);
        assert!(matches!(failure.error, PipelineError::ChannelFault { .. }));

        assert_eq!(handle.join(), vec![PipelineTask::Consumer]);
    }

    #[test]
    fn test_panic_message_payloads() {
        let from_str: Box<dyn Any + Send> = Box::new("static message");
        let from_string: Box<dyn Any + Send> = Box::new(String::from("owned message"));
        let other: Box<dyn Any + Send> = Box::new(7u32);

        assert_eq!(panic_message(from_str.as_ref()), "static message");
        assert_eq!(panic_message(from_string.as_ref()), "owned message");
        assert_eq!(panic_message(other.as_ref()), "non-string panic payload");
    }
}
