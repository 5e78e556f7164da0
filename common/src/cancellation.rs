use tokio::sync::watch;

/// Cooperative cancellation signal shared by every fiber (scheduler loop,
/// janitor, refresh, pipeline workers). Cloning the receiver is cheap; every
/// fiber should `select!` its blocking operations against `cancelled()`.
#[derive(Clone)]
pub struct CancelSignal {
    rx: watch::Receiver<bool>,
}

pub struct CancelHandle {
    tx: watch::Sender<bool>,
}

impl CancelHandle {
    pub fn cancel(&self) {
        let _ = self.tx.send(true);
    }
}

pub fn new_cancel_pair() -> (CancelHandle, CancelSignal) {
    let (tx, rx) = watch::channel(false);
    (CancelHandle { tx }, CancelSignal { rx })
}

impl CancelSignal {
    pub fn is_cancelled(&self) -> bool {
        *self.rx.borrow()
    }

    /// Resolves once cancellation has been requested. Intended to be raced
    /// with a blocking primitive's own bounded timeout via `tokio::select!`.
    pub async fn cancelled(&mut self) {
        let _ = self.rx.wait_for(|v| *v).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn cancel_propagates_to_clones() {
        let (handle, sig) = new_cancel_pair();
        let mut sig2 = sig.clone();
        assert!(!sig.is_cancelled());
        handle.cancel();
        sig2.cancelled().await;
        assert!(sig2.is_cancelled());
    }
}
