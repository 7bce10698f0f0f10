//! Online/offline signal
//!
//! The host environment feeds transitions in; the engine and service read
//! the current value and subscribe to changes. Listener tasks are held by a
//! [`Subscription`] that cancels them on close or drop, so nothing keeps
//! listening past teardown.

use tokio::sync::watch;
use tokio::task::JoinHandle;

/// Shared connectivity state.
#[derive(Clone)]
pub struct Connectivity {
    sender: std::sync::Arc<watch::Sender<bool>>,
}

impl Connectivity {
    #[must_use]
    pub fn new(initially_online: bool) -> Self {
        let (sender, _receiver) = watch::channel(initially_online);
        Self {
            sender: std::sync::Arc::new(sender),
        }
    }

    /// Report a connectivity transition from the host environment.
    pub fn set_online(&self, online: bool) {
        self.sender.send_if_modified(|current| {
            if *current == online {
                false
            } else {
                tracing::debug!(online, "connectivity changed");
                *current = online;
                true
            }
        });
    }

    #[must_use]
    pub fn is_online(&self) -> bool {
        *self.sender.borrow()
    }

    /// A receiver observing connectivity transitions.
    #[must_use]
    pub fn watch(&self) -> watch::Receiver<bool> {
        self.sender.subscribe()
    }
}

/// Handle to a spawned listener task; aborts the task when closed or
/// dropped.
pub struct Subscription {
    task: JoinHandle<()>,
}

impl Subscription {
    pub(crate) const fn new(task: JoinHandle<()>) -> Self {
        Self { task }
    }

    /// Stop the listener.
    pub fn close(self) {
        self.task.abort();
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.task.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(flavor = "multi_thread")]
    async fn transitions_are_observable() {
        let connectivity = Connectivity::new(false);
        let mut receiver = connectivity.watch();
        assert!(!connectivity.is_online());

        connectivity.set_online(true);
        receiver.changed().await.unwrap();
        assert!(*receiver.borrow());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn redundant_transitions_do_not_notify() {
        let connectivity = Connectivity::new(true);
        let receiver = connectivity.watch();

        connectivity.set_online(true);
        assert!(!receiver.has_changed().unwrap());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn subscription_aborts_its_task_on_close() {
        let task = tokio::spawn(async {
            tokio::time::sleep(std::time::Duration::from_secs(60)).await;
        });
        let inner = task.abort_handle();
        Subscription::new(task).close();

        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        assert!(inner.is_finished());
    }
}
