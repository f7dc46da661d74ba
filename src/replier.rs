//! The decoupled dispatcher that fans a released key's outcome out to its
//! waiters without ever running inside `KeyLock`'s critical section.

use tokio::sync::{broadcast, mpsc};
use tracing::trace;

use crate::keylock::ReplyJob;

/// Spawns the background task that drains `reply_rx` and delivers each job's
/// result to every waiter in it. Returns the task's `JoinHandle` so the
/// owning [`crate::partition::Partition`] can await it on shutdown.
///
/// Delivery never blocks: `oneshot::Sender::send` is synchronous, so one
/// slow or already-gone waiter can never hold up delivery to the others.
pub(crate) fn spawn<V, E>(
    mut reply_rx: mpsc::UnboundedReceiver<ReplyJob<V, E>>,
    mut shutdown: broadcast::Receiver<()>,
) -> tokio::task::JoinHandle<()>
where
    V: Clone + Send + 'static,
    E: Clone + Send + 'static,
{
    tokio::spawn(async move {
        loop {
            tokio::select! {
                biased;
                _ = shutdown.recv() => break,
                job = reply_rx.recv() => {
                    let Some(job) = job else { break };
                    for tx in job.waiters {
                        // Err means the waiter's Receiver was already
                        // dropped (cancelled) — nothing else to do.
                        if tx.send(job.result.clone()).is_err() {
                            trace!("waiter dropped before delivery");
                        }
                    }
                }
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CacheError;
    use crate::keylock::WaitOutcome;

    #[tokio::test]
    async fn delivers_result_to_every_waiter_in_a_job() {
        let (reply_tx, reply_rx) = mpsc::unbounded_channel();
        let (_shutdown_tx, shutdown_rx) = broadcast::channel(1);
        let handle = spawn::<i32, &'static str>(reply_rx, shutdown_rx);

        let (a_tx, a_rx) = tokio::sync::oneshot::channel();
        let (b_tx, b_rx) = tokio::sync::oneshot::channel();
        reply_tx
            .send(ReplyJob {
                waiters: vec![a_tx, b_tx],
                result: WaitOutcome::Retry,
            })
            .unwrap();

        assert!(matches!(a_rx.await.unwrap(), WaitOutcome::Retry));
        assert!(matches!(b_rx.await.unwrap(), WaitOutcome::Retry));

        drop(reply_tx);
        handle.await.unwrap();
    }

    #[tokio::test]
    async fn a_dropped_waiter_does_not_stop_delivery_to_the_rest() {
        let (reply_tx, reply_rx) = mpsc::unbounded_channel();
        let (_shutdown_tx, shutdown_rx) = broadcast::channel(1);
        let handle = spawn::<i32, &'static str>(reply_rx, shutdown_rx);

        let (a_tx, a_rx) = tokio::sync::oneshot::channel();
        let (b_tx, b_rx) = tokio::sync::oneshot::channel();
        drop(a_rx);
        reply_tx
            .send(ReplyJob {
                waiters: vec![a_tx, b_tx],
                result: WaitOutcome::Err(CacheError::OwnerFailure),
            })
            .unwrap();

        match b_rx.await.unwrap() {
            WaitOutcome::Err(CacheError::OwnerFailure) => {}
            other => panic!("unexpected outcome: {other:?}"),
        }

        drop(reply_tx);
        handle.await.unwrap();
    }

    #[tokio::test]
    async fn shutdown_signal_stops_the_dispatch_loop() {
        let (_reply_tx, reply_rx) = mpsc::unbounded_channel::<ReplyJob<i32, &'static str>>();
        let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
        let handle = spawn::<i32, &'static str>(reply_rx, shutdown_rx);

        shutdown_tx.send(()).unwrap();
        handle.await.unwrap();
    }
}
