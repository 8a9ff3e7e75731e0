use std::future::Future;

use tokio::task::{JoinError, JoinHandle};
use tokio_util::sync::CancellationToken;

/// Owned handle to a spawned task that can be cancelled.
///
/// The task receives a [`CancellationToken`] and is expected to wind down when
/// it fires. Dropping the handle cancels the token and aborts the task.
pub struct ScheduledTask<T> {
    cancel_token: CancellationToken,
    handle: JoinHandle<T>,
}

impl<T: Send + 'static> ScheduledTask<T> {
    pub fn spawn<F, Fut>(f: F) -> Self
    where
        F: FnOnce(CancellationToken) -> Fut,
        Fut: Future<Output = T> + Send + 'static,
    {
        Self::spawn_with_token(CancellationToken::new(), f)
    }

    pub fn spawn_with_token<F, Fut>(cancel_token: CancellationToken, f: F) -> Self
    where
        F: FnOnce(CancellationToken) -> Fut,
        Fut: Future<Output = T> + Send + 'static,
    {
        let handle = tokio::spawn(f(cancel_token.clone()));
        Self {
            cancel_token,
            handle,
        }
    }
}

impl<T> ScheduledTask<T> {
    pub fn cancel(&self) {
        self.cancel_token.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel_token.is_cancelled()
    }

    /// Waits for the task to finish on its own.
    pub async fn join(mut self) -> Result<T, JoinError> {
        (&mut self.handle).await
    }

    pub async fn cancel_and_join(mut self) -> Result<T, JoinError> {
        self.cancel_token.cancel();
        (&mut self.handle).await
    }
}

impl<T> Drop for ScheduledTask<T> {
    fn drop(&mut self) {
        self.cancel_token.cancel();
        self.handle.abort();
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[tokio::test(start_paused = true)]
    async fn cancel_and_join_returns_task_output() {
        let task = ScheduledTask::spawn(|token| async move {
            token.cancelled().await;
            "stopped"
        });

        assert_eq!(task.cancel_and_join().await.unwrap(), "stopped");
    }

    #[tokio::test(start_paused = true)]
    async fn drop_cancels_token() {
        let token = CancellationToken::new();
        let task = ScheduledTask::spawn_with_token(token.clone(), |token| async move {
            tokio::time::sleep(Duration::from_secs(60)).await;
            token.is_cancelled()
        });

        drop(task);
        assert!(token.is_cancelled());
    }

    #[tokio::test(start_paused = true)]
    async fn join_waits_for_completion() {
        let task = ScheduledTask::spawn(|_| async {
            tokio::time::sleep(Duration::from_millis(50)).await;
            7
        });
        assert!(!task.is_cancelled());
        assert_eq!(task.join().await.unwrap(), 7);
    }
}
