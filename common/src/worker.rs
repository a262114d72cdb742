//! Defines the `Worker` trait; abstracting over the lifecycle of the thread
//! groups that drive a queue so that a coordinator can start, watch, and
//! clean them up uniformly

use std::{
    fmt::Debug,
    io,
    thread::{Builder, JoinHandle},
};

use tokio::sync::mpsc::Sender;
use tracing::error;

/// The Worker trait abstracts over worker functionality with a series of
/// callbacks that allow a worker to be started, cleaned up, and restarted
pub trait Worker {
    /// The configuration needed to spawn the implementing worker
    type WorkerConfig;
    /// The error type that results from an invalid startup or cleanup
    type Error: 'static + Send + Debug;

    /// Create a new instance of the implementing worker
    fn new(config: Self::WorkerConfig) -> Result<Self, Self::Error>
    where
        Self: Sized;

    /// Spawn the worker's threads
    fn start(&mut self) -> Result<(), Self::Error>;

    /// Returns a name by which the worker can be identified
    fn name(&self) -> String;

    /// Take the join handles of the worker's threads
    ///
    /// Each thread returns the error that caused it to exit
    fn join(&mut self) -> Vec<JoinHandle<Self::Error>>;

    /// Returns whether or not the implementing type is recoverable
    fn is_recoverable(&self) -> bool;

    /// Called to cleanup the resources a worker owns when it stops
    fn cleanup(&mut self) -> Result<(), Self::Error>;
}

/// Spawn a watcher thread for each join handle in the worker being watched
///
/// A worker may have more than one join handle in the case that it spawns
/// multiple sub-worker threads. Each will be individually watched, and the
/// failure channel is notified once per thread as it exits. Returns the number
/// of threads watched, so a coordinator can wait for all of them on shutdown
pub fn watch_worker<W: Worker>(
    worker: &mut W,
    failure_channel: &Sender<()>,
) -> io::Result<usize> {
    let watcher_name = format!("{}-watcher", worker.name());
    let join_handles = worker.join();
    let n_watched = join_handles.len();
    for join_handle in join_handles {
        let worker_name = worker.name();
        let channel_clone = failure_channel.clone();

        Builder::new().name(watcher_name.clone()).spawn(move || {
            match join_handle.join() {
                Err(panic) => {
                    error!("worker {worker_name} panicked with error: {panic:?}");
                },
                Ok(err) => {
                    error!("worker {worker_name} exited with error: {err:?}");
                },
            }

            if channel_clone.blocking_send(()).is_err() {
                error!("coordinator hung up before {worker_name} exit was reported");
            }
        })?;
    }

    Ok(n_watched)
}

#[cfg(test)]
mod test {
    use std::thread::{self, JoinHandle};

    use tokio::sync::mpsc;

    use super::{Worker, watch_worker};

    /// A worker whose only thread exits immediately
    struct ShortLivedWorker {
        /// The handle of the spawned thread
        handle: Option<JoinHandle<String>>,
    }

    impl Worker for ShortLivedWorker {
        type WorkerConfig = ();
        type Error = String;

        fn new(_config: ()) -> Result<Self, Self::Error> {
            Ok(Self { handle: None })
        }

        fn start(&mut self) -> Result<(), Self::Error> {
            self.handle = Some(thread::spawn(|| "done".to_string()));
            Ok(())
        }

        fn name(&self) -> String {
            "short-lived".to_string()
        }

        fn join(&mut self) -> Vec<JoinHandle<Self::Error>> {
            self.handle.take().into_iter().collect()
        }

        fn is_recoverable(&self) -> bool {
            false
        }

        fn cleanup(&mut self) -> Result<(), Self::Error> {
            Ok(())
        }
    }

    /// Tests that the failure channel is notified when a worker exits
    #[test]
    fn test_watch_worker_reports_exit() {
        let (sender, mut receiver) = mpsc::channel(1);
        let mut worker = ShortLivedWorker::new(()).unwrap();
        worker.start().unwrap();
        assert_eq!(watch_worker(&mut worker, &sender).unwrap(), 1);

        assert_eq!(receiver.blocking_recv(), Some(()));
    }
}
