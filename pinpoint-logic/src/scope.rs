use std::sync::{
    Arc,
    atomic::{AtomicU64, Ordering},
};

use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, oneshot, watch};
use tokio_util::sync::CancellationToken;

use crate::prelude::*;

/// Push notification connection to the backend, one per application
pub trait PushChannel: Send + Sync {
    fn connect(&self) -> impl Future<Output = Result> + Send;
    fn disconnect(&self) -> impl Future<Output = ()> + Send;
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DialogRequest {
    pub id: u64,
    pub title: String,
    pub message: String,
}

type PendingDialog = (u64, oneshot::Sender<bool>);

/// Confirm dialogs as observable state.
///
/// At most one dialog is open. Views watch [ConfirmDialogs::subscribe] and answer with
/// [ConfirmDialogs::answer]; opening a new dialog declines the one it replaces.
pub struct ConfirmDialogs {
    current: watch::Sender<Option<DialogRequest>>,
    pending: Mutex<Option<PendingDialog>>,
    next_id: AtomicU64,
}

impl Default for ConfirmDialogs {
    fn default() -> Self {
        let (current, _) = watch::channel(None);
        Self {
            current,
            pending: Mutex::new(None),
            next_id: AtomicU64::new(1),
        }
    }
}

impl ConfirmDialogs {
    pub fn subscribe(&self) -> watch::Receiver<Option<DialogRequest>> {
        self.current.subscribe()
    }

    pub fn current(&self) -> Option<DialogRequest> {
        self.current.borrow().clone()
    }

    /// Open a dialog and wait for the user's answer, declined or dismissed dialogs give `false`
    pub async fn confirm(&self, title: impl Into<String>, message: impl Into<String>) -> bool {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = oneshot::channel();

        {
            let mut pending = self.pending.lock().await;
            if let Some((old_id, old_tx)) = pending.replace((id, tx)) {
                debug!("Dialog {old_id} replaced by {id}");
                old_tx.send(false).ok();
            }
            self.current.send_replace(Some(DialogRequest {
                id,
                title: title.into(),
                message: message.into(),
            }));
        }

        rx.await.unwrap_or(false)
    }

    /// Answer the open dialog, returns `false` if `id` isn't the open dialog
    pub async fn answer(&self, id: u64, accepted: bool) -> bool {
        let mut pending = self.pending.lock().await;
        match pending.take() {
            Some((open_id, tx)) if open_id == id => {
                tx.send(accepted).ok();
                self.current.send_replace(None);
                true
            }
            other => {
                *pending = other;
                warn!("Answer for dialog {id} which isn't open");
                false
            }
        }
    }

    /// Close any open dialog as declined
    pub async fn dismiss(&self) {
        if let Some((_, tx)) = self.pending.lock().await.take() {
            tx.send(false).ok();
        }
        self.current.send_replace(None);
    }
}

/// Application root, owns the services every screen shares.
///
/// Entering the scope connects the [PushChannel], exiting it disconnects, closes dialogs, and
/// cancels every token handed out by [AppScope::child_token].
pub struct AppScope<C: PushChannel> {
    channel: Arc<C>,
    dialogs: Arc<ConfirmDialogs>,
    cancel: CancellationToken,
}

impl<C: PushChannel> AppScope<C> {
    pub async fn enter(channel: C) -> Result<Self> {
        channel
            .connect()
            .await
            .context("Failed to connect notification channel")?;
        info!("Application scope entered");
        Ok(Self {
            channel: Arc::new(channel),
            dialogs: Arc::new(ConfirmDialogs::default()),
            cancel: CancellationToken::new(),
        })
    }

    pub fn channel(&self) -> Arc<C> {
        self.channel.clone()
    }

    pub fn dialogs(&self) -> Arc<ConfirmDialogs> {
        self.dialogs.clone()
    }

    /// Token for a component living inside this scope
    pub fn child_token(&self) -> CancellationToken {
        self.cancel.child_token()
    }

    pub async fn exit(self) {
        self.cancel.cancel();
        self.dialogs.dismiss().await;
        self.channel.disconnect().await;
        info!("Application scope exited");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tests::MockChannel;
    use tokio::{task::yield_now, test};

    #[test]
    async fn test_scope_lifecycle() {
        let channel = MockChannel::default();
        let scope = AppScope::enter(channel).await.unwrap();
        let channel = scope.channel();
        assert!(channel.is_connected());

        let token = scope.child_token();
        scope.exit().await;

        assert!(token.is_cancelled());
        assert!(!channel.is_connected());
    }

    #[test]
    async fn test_enter_fails_when_channel_fails() {
        let channel = MockChannel::failing();
        assert!(AppScope::enter(channel).await.is_err());
    }

    #[test]
    async fn test_confirm_answered() {
        let dialogs = Arc::new(ConfirmDialogs::default());
        let mut watcher = dialogs.subscribe();

        let asking = tokio::spawn({
            let dialogs = dialogs.clone();
            async move { dialogs.confirm("Clear pickup?", "The pin will be removed").await }
        });

        watcher.changed().await.unwrap();
        let request = watcher.borrow().clone().unwrap();
        assert_eq!(request.title, "Clear pickup?");

        assert!(!dialogs.answer(request.id + 100, true).await);
        assert!(dialogs.answer(request.id, true).await);
        assert!(asking.await.unwrap());
        assert_eq!(dialogs.current(), None);
    }

    #[test]
    async fn test_new_dialog_declines_old() {
        let dialogs = Arc::new(ConfirmDialogs::default());

        let first = tokio::spawn({
            let dialogs = dialogs.clone();
            async move { dialogs.confirm("First", "").await }
        });
        yield_now().await;
        let second = tokio::spawn({
            let dialogs = dialogs.clone();
            async move { dialogs.confirm("Second", "").await }
        });
        yield_now().await;

        assert!(!first.await.unwrap());
        let open = dialogs.current().unwrap();
        assert_eq!(open.title, "Second");
        dialogs.answer(open.id, true).await;
        assert!(second.await.unwrap());
    }

    #[test]
    async fn test_exit_dismisses_dialogs() {
        let scope = AppScope::enter(MockChannel::default()).await.unwrap();
        let dialogs = scope.dialogs();

        let asking = tokio::spawn({
            let dialogs = dialogs.clone();
            async move { dialogs.confirm("Leave?", "").await }
        });
        yield_now().await;

        scope.exit().await;
        assert!(!asking.await.unwrap());
        assert_eq!(dialogs.current(), None);
    }
}
