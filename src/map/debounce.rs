use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::trace;

pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(100);

/// Forwards only the latest value once `delay` has passed without a new one.
///
/// Used between the map widget's move events and cluster recomputation, so a
/// pan produces one recompute instead of one per frame. The task ends when the
/// sender is dropped, flushing any pending value first.
pub fn debounce<T: Send + 'static>(
    delay: Duration,
) -> (mpsc::UnboundedSender<T>, mpsc::Receiver<T>, JoinHandle<()>) {
    let (input_tx, mut input) = mpsc::unbounded_channel::<T>();
    let (output_tx, output) = mpsc::channel::<T>(1);

    let handle = tokio::spawn(async move {
        while let Some(mut latest) = input.recv().await {
            let mut skipped = 0;

            let closed = loop {
                tokio::select! {
                    next = input.recv() => match next {
                        Some(value) => {
                            latest = value;
                            skipped += 1;
                        }
                        None => break true,
                    },
                    _ = tokio::time::sleep(delay) => break false,
                }
            };

            trace!(skipped, "Debounced value released");

            if output_tx.send(latest).await.is_err() || closed {
                break;
            }
        }
    });

    (input_tx, output, handle)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::Instant;

    #[test_log::test(tokio::test(start_paused = true))]
    async fn burst_should_release_only_the_last_value() {
        let (tx, mut rx, _handle) = debounce(DEFAULT_DEBOUNCE);

        for zoom in 1..=5 {
            tx.send(zoom).unwrap();
        }

        assert_eq!(rx.recv().await, Some(5));
        assert!(rx.try_recv().is_err());
    }

    #[test_log::test(tokio::test(start_paused = true))]
    async fn value_should_wait_for_a_quiet_period() {
        let (tx, mut rx, _handle) = debounce(DEFAULT_DEBOUNCE);
        let start = Instant::now();

        tx.send("first").unwrap();
        tokio::time::sleep(Duration::from_millis(60)).await;
        tx.send("second").unwrap();

        assert_eq!(rx.recv().await, Some("second"));
        assert!(start.elapsed() >= Duration::from_millis(160));
    }

    #[test_log::test(tokio::test(start_paused = true))]
    async fn closing_the_input_should_flush_the_pending_value() {
        let (tx, mut rx, handle) = debounce(DEFAULT_DEBOUNCE);

        tx.send(7).unwrap();
        drop(tx);

        assert_eq!(rx.recv().await, Some(7));
        handle.await.unwrap();
        assert_eq!(rx.recv().await, None);
    }
}
