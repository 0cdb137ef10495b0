//! Station abstraction and its task runner.

use crate::pipeline::error::{ErrorReporter, StationError};
use crate::shutdown::Shutdown;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// A processing stage connected to its neighbours by channels.
pub trait Station: Send + 'static {
    type Input: Send + 'static;
    type Output: Send + 'static;

    /// Processes a single input item.
    ///
    /// Returns:
    /// - `Ok(Some(output))` - Successfully processed and produced output
    /// - `Ok(None)` - Successfully processed but no output (e.g., filtered)
    /// - `Err(StationError)` - Processing failed
    fn process(&mut self, input: Self::Input) -> Result<Option<Self::Output>, StationError>;

    fn name(&self) -> &'static str;

    /// Called once when the station stops.
    fn shutdown(&mut self) {}
}

/// Runs a station on its own task until its input closes, its output is
/// dropped, a fatal error occurs or `shutdown` fires.
pub struct StationRunner {
    handle: Option<JoinHandle<()>>,
    station_name: &'static str,
}

impl StationRunner {
    pub fn spawn<S: Station>(
        mut station: S,
        mut input_rx: mpsc::Receiver<S::Input>,
        output_tx: mpsc::Sender<S::Output>,
        error_reporter: Arc<dyn ErrorReporter>,
        shutdown: Shutdown,
    ) -> Self {
        let station_name = station.name();

        let handle = tokio::spawn(async move {
            loop {
                let input = tokio::select! {
                    biased;
                    _ = shutdown.wait() => break,
                    input = input_rx.recv() => match input {
                        Some(input) => input,
                        None => break,
                    },
                };

                match station.process(input) {
                    Ok(Some(output)) => {
                        if output_tx.send(output).await.is_err() {
                            break;
                        }
                    }
                    Ok(None) => {}
                    Err(error) => {
                        error_reporter.report(station_name, &error);
                        if error.is_fatal() {
                            break;
                        }
                    }
                }
            }
            station.shutdown();
            log::debug!("station {} stopped", station_name);
        });

        Self {
            handle: Some(handle),
            station_name,
        }
    }

    /// Waits for the station task to complete.
    pub async fn join(mut self) -> Result<(), String> {
        match self.handle.take() {
            Some(handle) => handle
                .await
                .map_err(|_| format!("Station '{}' task panicked", self.station_name)),
            None => Ok(()),
        }
    }

    pub fn name(&self) -> &'static str {
        self.station_name
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicBool, Ordering};

    struct DoublerStation {
        shutdown_called: Arc<AtomicBool>,
    }

    impl Station for DoublerStation {
        type Input = i32;
        type Output = i32;

        fn process(&mut self, input: Self::Input) -> Result<Option<Self::Output>, StationError> {
            Ok(Some(input * 2))
        }

        fn name(&self) -> &'static str {
            "Doubler"
        }

        fn shutdown(&mut self) {
            self.shutdown_called.store(true, Ordering::SeqCst);
        }
    }

    struct FailingStation {
        fail_on: i32,
        fatal: bool,
    }

    impl Station for FailingStation {
        type Input = i32;
        type Output = i32;

        fn process(&mut self, input: Self::Input) -> Result<Option<Self::Output>, StationError> {
            if input == self.fail_on {
                let msg = format!("Failed on {}", input);
                Err(if self.fatal {
                    StationError::Fatal(msg)
                } else {
                    StationError::Recoverable(msg)
                })
            } else if input < 0 {
                Ok(None)
            } else {
                Ok(Some(input))
            }
        }

        fn name(&self) -> &'static str {
            "Failing"
        }
    }

    #[derive(Default)]
    struct MockReporter {
        errors: Arc<Mutex<Vec<(String, String)>>>,
    }

    impl ErrorReporter for MockReporter {
        fn report(&self, station: &str, error: &StationError) {
            let mut errors = self.errors.lock().unwrap();
            errors.push((station.to_string(), error.to_string()));
        }
    }

    async fn collect(mut rx: mpsc::Receiver<i32>) -> Vec<i32> {
        let mut outputs = Vec::new();
        while let Some(output) = rx.recv().await {
            outputs.push(output);
        }
        outputs
    }

    #[tokio::test]
    async fn test_station_runner_basic_processing() {
        let (input_tx, input_rx) = mpsc::channel(10);
        let (output_tx, output_rx) = mpsc::channel(10);
        let shutdown_flag = Arc::new(AtomicBool::new(false));

        let station = DoublerStation {
            shutdown_called: shutdown_flag.clone(),
        };
        let runner = StationRunner::spawn(
            station,
            input_rx,
            output_tx,
            Arc::new(MockReporter::default()),
            Shutdown::new(),
        );
        assert_eq!(runner.name(), "Doubler");

        for i in 1..=3 {
            input_tx.send(i).await.unwrap();
        }
        drop(input_tx);

        assert_eq!(collect(output_rx).await, vec![2, 4, 6]);
        runner.join().await.unwrap();
        assert!(shutdown_flag.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_recoverable_errors_are_reported_and_skipped() {
        let (input_tx, input_rx) = mpsc::channel(10);
        let (output_tx, output_rx) = mpsc::channel(10);
        let reporter = Arc::new(MockReporter::default());
        let errors = reporter.errors.clone();

        let runner = StationRunner::spawn(
            FailingStation {
                fail_on: 2,
                fatal: false,
            },
            input_rx,
            output_tx,
            reporter,
            Shutdown::new(),
        );

        for i in [1, 2, -1, 3] {
            input_tx.send(i).await.unwrap();
        }
        drop(input_tx);

        assert_eq!(collect(output_rx).await, vec![1, 3]);
        runner.join().await.unwrap();

        let reported = errors.lock().unwrap();
        assert_eq!(reported.len(), 1);
        assert_eq!(reported[0].0, "Failing");
        assert!(reported[0].1.contains("Failed on 2"));
    }

    #[tokio::test]
    async fn test_fatal_error_stops_station() {
        let (input_tx, input_rx) = mpsc::channel(10);
        let (output_tx, output_rx) = mpsc::channel(10);

        let runner = StationRunner::spawn(
            FailingStation {
                fail_on: 2,
                fatal: true,
            },
            input_rx,
            output_tx,
            Arc::new(MockReporter::default()),
            Shutdown::new(),
        );

        for i in [1, 2, 3] {
            input_tx.send(i).await.unwrap();
        }

        assert_eq!(collect(output_rx).await, vec![1]);
        runner.join().await.unwrap();
    }

    #[tokio::test]
    async fn test_shutdown_stops_station_with_open_input() {
        let (_input_tx, input_rx) = mpsc::channel::<i32>(10);
        let (output_tx, _output_rx) = mpsc::channel(10);
        let shutdown_flag = Arc::new(AtomicBool::new(false));
        let shutdown = Shutdown::new();

        let runner = StationRunner::spawn(
            DoublerStation {
                shutdown_called: shutdown_flag.clone(),
            },
            input_rx,
            output_tx,
            Arc::new(MockReporter::default()),
            shutdown.clone(),
        );

        shutdown.trigger();
        tokio::time::timeout(std::time::Duration::from_secs(1), runner.join())
            .await
            .unwrap()
            .unwrap();
        assert!(shutdown_flag.load(Ordering::SeqCst));
    }
}
