use std::{future::Future, time::Duration};
use tokio::task::JoinHandle;

pub const SEARCH_DEBOUNCE: Duration = Duration::from_millis(300);

/// Runs only the last of a burst of calls, once `delay` has passed
/// without another call.
#[derive(Debug)]
pub struct Debouncer {
    delay: Duration,
    pending: Option<JoinHandle<()>>,
}

impl Default for Debouncer {
    fn default() -> Self {
        Self::new(SEARCH_DEBOUNCE)
    }
}

impl Debouncer {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            pending: None,
        }
    }

    pub fn call<F>(&mut self, future: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        self.cancel();
        let delay = self.delay;
        self.pending = Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            future.await;
        }));
    }

    pub fn cancel(&mut self) {
        if let Some(handle) = self.pending.take() {
            handle.abort();
        }
    }

    pub fn is_pending(&self) -> bool {
        self.pending
            .as_ref()
            .map(|handle| !handle.is_finished())
            .unwrap_or(false)
    }
}

impl Drop for Debouncer {
    fn drop(&mut self) {
        self.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc;

    #[tokio::test(start_paused = true)]
    async fn test_only_last_call_runs() {
        let (sender, mut receiver) = mpsc::unbounded_channel();
        let mut debouncer = Debouncer::default();

        for query in ["a", "al", "ali"] {
            let sender = sender.clone();
            debouncer.call(async move {
                let _ = sender.send(query);
            });
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
        assert!(receiver.try_recv().is_err());

        tokio::time::sleep(Duration::from_millis(199)).await;
        assert!(receiver.try_recv().is_err());
        assert!(debouncer.is_pending());

        tokio::time::sleep(Duration::from_millis(2)).await;
        assert_eq!(receiver.try_recv().unwrap(), "ali");
        assert!(receiver.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_drops_pending_call() {
        let (sender, mut receiver) = mpsc::unbounded_channel();
        let mut debouncer = Debouncer::new(Duration::from_millis(50));

        debouncer.call(async move {
            let _ = sender.send(());
        });
        debouncer.cancel();
        tokio::time::sleep(Duration::from_millis(100)).await;

        assert!(receiver.try_recv().is_err());
        assert!(!debouncer.is_pending());
    }
}
