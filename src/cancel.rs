use tokio::sync::watch;

/// Owner side of a cancellation pair. Dropping it cancels as well: nobody is
/// left to receive the result.
#[derive(Debug)]
pub struct Canceller {
    tx: watch::Sender<bool>,
}

impl Canceller {
    pub fn cancel(&self) {
        let _ = self.tx.send(true);
    }
}

#[derive(Clone, Debug)]
pub struct CancelToken {
    rx: Option<watch::Receiver<bool>>,
}

pub fn cancellation() -> (Canceller, CancelToken) {
    let (tx, rx) = watch::channel(false);
    (Canceller { tx }, CancelToken { rx: Some(rx) })
}

impl CancelToken {
    pub fn never() -> Self {
        Self { rx: None }
    }

    pub fn is_cancelled(&self) -> bool {
        match &self.rx {
            None => false,
            Some(rx) => *rx.borrow() || rx.has_changed().is_err(),
        }
    }

    /// Resolves once cancelled; pends forever for [`CancelToken::never`].
    pub async fn cancelled(&mut self) {
        let Some(rx) = self.rx.as_mut() else {
            return std::future::pending().await;
        };
        loop {
            if *rx.borrow_and_update() {
                return;
            }
            if rx.changed().await.is_err() {
                return;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    #![allow(non_snake_case)]
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn cancelled__resolves_after_cancel() {
        let (canceller, mut token) = cancellation();
        assert!(!token.is_cancelled());
        canceller.cancel();
        token.cancelled().await;
        assert!(token.is_cancelled());
    }

    #[tokio::test]
    async fn cancelled__resolves_when_owner_is_dropped() {
        let (canceller, mut token) = cancellation();
        drop(canceller);
        token.cancelled().await;
        assert!(token.is_cancelled());
    }

    #[tokio::test(start_paused = true)]
    async fn never__stays_pending() {
        let mut token = CancelToken::never();
        let raced = tokio::time::timeout(Duration::from_secs(5), token.cancelled()).await;
        assert!(raced.is_err());
        assert!(!token.is_cancelled());
    }
}
