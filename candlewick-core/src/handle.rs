use tokio::sync::oneshot;
use tokio::task::JoinHandle;

/// The running side of a driver: a task that may already have exited.
pub trait DriverTask {
    /// Cancel the task at its next await point.
    fn cancel(&mut self);
    /// Whether the driver loop has returned or been cancelled.
    fn is_done(&self) -> bool;
}

impl DriverTask for JoinHandle<()> {
    fn cancel(&mut self) {
        self.abort();
    }

    fn is_done(&self) -> bool {
        self.is_finished()
    }
}

/// The controlling side of a driver: asks the loop to return after the
/// batch it is running.
pub trait StopSignal {
    /// Fire the signal. A driver that has already exited is not an error.
    fn fire(self);
}

impl StopSignal for oneshot::Sender<()> {
    fn fire(self) {
        let _ = self.send(());
    }
}

/// Tear down a driver whose handle is going away.
///
/// The stop signal is fired first so a loop between batches exits on its
/// own; a task still running afterwards is cancelled. Both halves are taken,
/// so a second call does nothing.
pub fn shutdown_on_drop<T, S>(task: &mut Option<T>, stop: &mut Option<S>)
where
    T: DriverTask,
    S: StopSignal,
{
    if let Some(signal) = stop.take() {
        signal.fire();
    }
    if let Some(mut t) = task.take().filter(|t| !t.is_done()) {
        t.cancel();
    }
}

/// Handle to a spawned collector driver.
///
/// [`stop`](Self::stop) asks the driver to exit after its current tick and
/// waits for it. Dropping the handle sends the same signal and aborts the task
/// if it is still running.
#[derive(Debug)]
pub struct DriverHandle {
    inner: Option<JoinHandle<()>>,
    stop_tx: Option<oneshot::Sender<()>>,
}

impl DriverHandle {
    /// Wrap a spawned task and its stop channel.
    #[must_use]
    pub const fn new(inner: JoinHandle<()>, stop_tx: oneshot::Sender<()>) -> Self {
        Self {
            inner: Some(inner),
            stop_tx: Some(stop_tx),
        }
    }

    /// Request a graceful stop and wait for the driver to finish.
    pub async fn stop(mut self) {
        if let Some(tx) = self.stop_tx.take() {
            let _ = tx.send(());
        }
        if let Some(h) = self.inner.take() {
            let _ = h.await;
        }
    }

    /// Abort the driver immediately.
    pub fn abort(mut self) {
        if let Some(h) = self.inner.take() {
            h.abort();
        }
    }

    /// True once the driver task has exited.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.inner.as_ref().is_none_or(JoinHandle::is_finished)
    }
}

impl Drop for DriverHandle {
    fn drop(&mut self) {
        shutdown_on_drop(&mut self.inner, &mut self.stop_tx);
    }
}
