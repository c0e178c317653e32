use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use tokio::sync::watch;

/// Boolean that is only published once its raw value has held steady for
/// `delay`. Flipping back before the delay elapses publishes nothing.
#[derive(Clone)]
pub struct DebouncedFlag {
    inner: Arc<FlagInner>,
}

struct FlagInner {
    delay: Duration,
    published: watch::Sender<bool>,
    pending: Mutex<PendingValue>,
}

#[derive(Default)]
struct PendingValue {
    raw: bool,
    generation: u64,
}

impl DebouncedFlag {
    pub fn new(delay: Duration) -> Self {
        let (published, _) = watch::channel(false);
        Self {
            inner: Arc::new(FlagInner {
                delay,
                published,
                pending: Mutex::new(PendingValue::default()),
            }),
        }
    }

    /// Records a new raw value. Must be called from within a tokio runtime.
    pub fn set(&self, value: bool) {
        let generation = {
            let mut pending = lock_pending(&self.inner.pending);
            if pending.raw == value {
                return;
            }
            pending.raw = value;
            pending.generation = pending.generation.wrapping_add(1);
            pending.generation
        };

        // Returning to the visible value only needs to void the pending change.
        if *self.inner.published.borrow() == value {
            return;
        }

        if self.inner.delay.is_zero() {
            publish(&self.inner, value);
            return;
        }

        let inner = self.inner.clone();
        tokio::spawn(async move {
            tokio::time::sleep(inner.delay).await;
            let still_current = lock_pending(&inner.pending).generation == generation;
            if still_current {
                publish(&inner, value);
            }
        });
    }

    pub fn raw(&self) -> bool {
        lock_pending(&self.inner.pending).raw
    }

    pub fn get(&self) -> bool {
        *self.inner.published.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<bool> {
        self.inner.published.subscribe()
    }
}

fn publish(inner: &FlagInner, value: bool) {
    inner.published.send_if_modified(|current| {
        if *current == value {
            return false;
        }
        *current = value;
        true
    });
}

fn lock_pending(pending: &Mutex<PendingValue>) -> MutexGuard<'_, PendingValue> {
    match pending.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DELAY: Duration = Duration::from_millis(150);

    #[tokio::test(start_paused = true)]
    async fn value_is_published_after_it_holds_for_the_delay() {
        let flag = DebouncedFlag::new(DELAY);
        flag.set(true);

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(!flag.get());

        tokio::time::sleep(Duration::from_millis(60)).await;
        assert!(flag.get());
    }

    #[tokio::test(start_paused = true)]
    async fn short_pulse_is_never_published() {
        let flag = DebouncedFlag::new(DELAY);
        let receiver = flag.subscribe();

        flag.set(true);
        tokio::time::sleep(Duration::from_millis(80)).await;
        flag.set(false);
        tokio::time::sleep(Duration::from_millis(500)).await;

        assert!(!flag.get());
        assert!(!receiver.has_changed().unwrap());
    }

    #[tokio::test(start_paused = true)]
    async fn falling_edge_is_debounced_too() {
        let flag = DebouncedFlag::new(DELAY);
        flag.set(true);
        tokio::time::sleep(Duration::from_millis(200)).await;
        assert!(flag.get());

        flag.set(false);
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(flag.get());
        tokio::time::sleep(Duration::from_millis(150)).await;
        assert!(!flag.get());
    }

    #[tokio::test]
    async fn zero_delay_publishes_immediately() {
        let flag = DebouncedFlag::new(Duration::ZERO);
        flag.set(true);
        assert!(flag.get());
        assert!(flag.raw());
    }
}
