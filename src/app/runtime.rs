use super::ShutdownReason;
use crate::events::{CaptureEvent, EventBus};
use std::sync::Arc;
use std::time::SystemTime;
use tokio::signal;
use tokio::sync::{oneshot, Mutex};
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

type ReasonSender = Arc<Mutex<Option<oneshot::Sender<ShutdownReason>>>>;

/// Cancel `cancel` on SIGTERM or SIGINT.
///
/// The first signal wins; its reason is delivered on the returned receiver
/// and announced on the event bus.
pub fn install_signal_handlers(
    cancel: CancellationToken,
    event_bus: EventBus,
) -> oneshot::Receiver<ShutdownReason> {
    let (sender, receiver) = oneshot::channel();
    let sender: ReasonSender = Arc::new(Mutex::new(Some(sender)));

    // SIGTERM (systemd stop)
    #[cfg(unix)]
    {
        let sender = Arc::clone(&sender);
        let cancel = cancel.clone();
        let event_bus = event_bus.clone();
        tokio::spawn(async move {
            let mut sigterm = match signal::unix::signal(signal::unix::SignalKind::terminate()) {
                Ok(sigterm) => sigterm,
                Err(e) => {
                    error!("Failed to register SIGTERM handler: {}", e);
                    return;
                }
            };
            if sigterm.recv().await.is_some() {
                info!("Received SIGTERM signal");
                request_shutdown(
                    ShutdownReason::Signal("SIGTERM".to_string()),
                    &sender,
                    &cancel,
                    &event_bus,
                )
                .await;
            }
        });
    }

    // SIGINT (Ctrl+C)
    tokio::spawn(async move {
        if let Ok(()) = signal::ctrl_c().await {
            info!("Received SIGINT signal (Ctrl+C)");
            request_shutdown(
                ShutdownReason::Signal("SIGINT".to_string()),
                &sender,
                &cancel,
                &event_bus,
            )
            .await;
        }
    });

    receiver
}

async fn request_shutdown(
    reason: ShutdownReason,
    sender: &ReasonSender,
    cancel: &CancellationToken,
    event_bus: &EventBus,
) {
    let Some(sender) = sender.lock().await.take() else {
        return;
    };

    event_bus
        .emit(CaptureEvent::ShutdownRequested {
            timestamp: SystemTime::now(),
            reason: reason.to_string(),
        })
        .await;
    let _ = sender.send(reason);
    cancel.cancel();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_request_shutdown_only_once() {
        let cancel = CancellationToken::new();
        let event_bus = EventBus::new(8);
        let mut events = event_bus.subscribe();
        let (tx, mut rx) = oneshot::channel();
        let sender: ReasonSender = Arc::new(Mutex::new(Some(tx)));

        request_shutdown(ShutdownReason::UserRequest, &sender, &cancel, &event_bus).await;
        request_shutdown(
            ShutdownReason::Signal("SIGTERM".to_string()),
            &sender,
            &cancel,
            &event_bus,
        )
        .await;

        assert!(cancel.is_cancelled());
        assert!(matches!(rx.try_recv(), Ok(ShutdownReason::UserRequest)));
        match events.try_recv() {
            Ok(CaptureEvent::ShutdownRequested { reason, .. }) => {
                assert_eq!(reason, "user request")
            }
            other => panic!("Unexpected event: {:?}", other),
        }
        assert!(events.try_recv().is_err());
    }
}
