//! Keeps the asset repository's queued resource loads moving.
//!
//! The repository queues loads internally and only processes them when asked, so
//! something has to ask. A dedicated thread drains the queue whenever there is
//! work, and otherwise parks on a short bounded wait. The wait doubles as the
//! shutdown signal, so stopping the pump doesn't have to ride out a sleep.

use std::{
    sync::{
        mpsc::{self, RecvTimeoutError, TryRecvError},
        Arc,
    },
    thread::JoinHandle,
    time::Duration,
};

use crate::catalog::AssetCatalog;

/// How long the pump waits before re-checking for work when the queue is empty.
const IDLE_WAIT: Duration = Duration::from_millis(5);

/// A background thread that drains the catalog's pending-load queue until stopped.
pub struct PendingLoadPump {
    shutdown: mpsc::Sender<()>,
    handle: Option<JoinHandle<()>>,
}

impl PendingLoadPump {
    /// Starts the pump thread over `catalog`.
    pub fn spawn(catalog: Arc<dyn AssetCatalog>) -> PendingLoadPump {
        let (shutdown, signal) = mpsc::channel();

        let handle = std::thread::spawn(move || run(&*catalog, &signal));

        PendingLoadPump {
            shutdown,
            handle: Some(handle),
        }
    }

    /// Signals the pump to stop and waits for the thread to finish. The current
    /// iteration completes; anything still queued afterwards stays queued.
    pub fn stop(&mut self) {
        let _ = self.shutdown.send(());

        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                log::error!("pending-load pump thread panicked");
            }
        }
    }
}

impl Drop for PendingLoadPump {
    fn drop(&mut self) {
        self.stop();
    }
}

fn run(catalog: &dyn AssetCatalog, signal: &mpsc::Receiver<()>) {
    log::info!("pending-load pump started");

    loop {
        if catalog.has_pending_loads() {
            catalog.drain_pending_loads();

            // Shutdown is checked once per iteration even when busy.
            match signal.try_recv() {
                Ok(()) | Err(TryRecvError::Disconnected) => break,
                Err(TryRecvError::Empty) => {}
            }
        } else {
            match signal.recv_timeout(IDLE_WAIT) {
                Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
                Err(RecvTimeoutError::Timeout) => {}
            }
        }
    }

    log::info!("pending-load pump stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::MemoryCatalog;
    use std::time::Instant;

    #[test]
    fn drains_queued_loads() {
        let catalog = Arc::new(MemoryCatalog::new());
        catalog.queue_load("ui/icon/066000/066001.tex", vec![0xAB]);

        let mut pump = PendingLoadPump::spawn(catalog.clone());

        // Wait for the pump to pick the load up.
        let deadline = Instant::now() + Duration::from_secs(2);
        while catalog.has_pending_loads() && Instant::now() < deadline {
            std::thread::sleep(Duration::from_millis(1));
        }

        assert!(catalog.file_exists("ui/icon/066000/066001.tex"));

        pump.stop();
    }

    #[test]
    fn stop_terminates_promptly() {
        let catalog = Arc::new(MemoryCatalog::new());

        let mut pump = PendingLoadPump::spawn(catalog);

        let start = Instant::now();
        pump.stop();

        // Generous bound; the idle wait is 5ms.
        assert!(start.elapsed() < Duration::from_secs(1));
    }

    #[test]
    fn loads_queued_while_running_are_processed() {
        let catalog = Arc::new(MemoryCatalog::new());
        let pump = PendingLoadPump::spawn(catalog.clone());

        for i in 0..10 {
            catalog.queue_load(format!("file-{i}"), vec![i]);
        }

        let deadline = Instant::now() + Duration::from_secs(2);
        while catalog.has_pending_loads() && Instant::now() < deadline {
            std::thread::sleep(Duration::from_millis(1));
        }

        for i in 0..10u8 {
            assert_eq!(catalog.file(&format!("file-{i}")), Some(vec![i]));
        }

        drop(pump);
    }
}
