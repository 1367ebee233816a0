//! Off-timeline work: run a job on a named worker thread and poll for its result from the render
//! timeline. Dropping a [`Pending`] abandons the result; the worker finishes and its send fails
//! silently.

use std::thread;

use crossbeam_channel::{Receiver, TryRecvError};

#[derive(Debug)]
pub enum TaskPoll<T> {
    Ready(T),
    Pending,
    /// The worker exited without sending (panicked or failed to start).
    Lost,
}

#[derive(Debug)]
pub struct Pending<T> {
    label: String,
    receiver: Receiver<T>,
}

pub fn spawn<T, F>(label: &str, job: F) -> Pending<T>
where
    T: Send + 'static,
    F: FnOnce() -> T + Send + 'static,
{
    let (sender, receiver) = crossbeam_channel::bounded(1);
    let spawned = thread::Builder::new().name(label.to_string()).spawn(move || {
        let _ = sender.send(job());
    });
    if let Err(e) = spawned {
        // The closure (and its sender) is dropped, so the receiver reports Lost.
        log::error!("failed to start worker {}: {}", label, e);
    }
    Pending { label: label.to_string(), receiver }
}

impl<T> Pending<T> {
    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn poll(&self) -> TaskPoll<T> {
        match self.receiver.try_recv() {
            Ok(v) => TaskPoll::Ready(v),
            Err(TryRecvError::Empty) => TaskPoll::Pending,
            Err(TryRecvError::Disconnected) => TaskPoll::Lost,
        }
    }

    /// Block until the worker delivers; `None` when it exited without a result.
    pub fn wait(self) -> Option<T> {
        self.receiver.recv().ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn delivers_result() {
        let pending = spawn("test-add", || 2 + 2);
        assert_eq!(pending.label(), "test-add");
        assert_eq!(pending.wait(), Some(4));
    }

    #[test]
    fn poll_is_pending_until_worker_sends() {
        let (gate_tx, gate_rx) = crossbeam_channel::bounded::<()>(0);
        let pending = spawn("test-gate", move || {
            let _ = gate_rx.recv();
            7
        });
        assert!(matches!(pending.poll(), TaskPoll::Pending));
        gate_tx.send(()).unwrap();
        loop {
            match pending.poll() {
                TaskPoll::Ready(v) => {
                    assert_eq!(v, 7);
                    break;
                }
                TaskPoll::Pending => std::thread::sleep(Duration::from_millis(1)),
                TaskPoll::Lost => panic!("worker lost"),
            }
        }
    }

    #[test]
    fn panicking_worker_is_lost() {
        let pending = spawn("test-panic", || -> u32 { panic!("boom") });
        assert_eq!(pending.wait(), None);
    }

    #[test]
    fn dropped_pending_does_not_block_worker() {
        let (done_tx, done_rx) = crossbeam_channel::bounded(1);
        let pending = spawn("test-drop", move || {
            std::thread::sleep(Duration::from_millis(5));
            let _ = done_tx.send(());
            1
        });
        drop(pending);
        assert!(done_rx.recv_timeout(Duration::from_secs(5)).is_ok());
    }
}
