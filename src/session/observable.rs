use tokio::sync::watch;

/// A value holder that replays its current value to every new subscriber
#[derive(Debug)]
pub struct Observable<T> {
    tx: watch::Sender<T>,
}

impl<T: Clone + PartialEq> Observable<T> {
    pub fn new(initial: T) -> Self {
        let (tx, _) = watch::channel(initial);
        Self { tx }
    }

    pub fn get(&self) -> T {
        self.tx.borrow().clone()
    }

    /// Store `value`, notifying subscribers only if it differs from the current one.
    /// Returns whether the value changed.
    pub fn set(&self, value: T) -> bool {
        self.tx.send_if_modified(|current| {
            if *current == value {
                return false;
            }
            *current = value;
            true
        })
    }

    /// Receiver that sees the current value immediately and every change after
    pub fn subscribe(&self) -> watch::Receiver<T> {
        self.tx.subscribe()
    }
}
