//! Best-effort message transport between the poll engine and protocol
//! plugins.
//!
//! The transport is a pair of unidirectional, non-blocking channels: an
//! outbound channel carrying serialized requests to a plugin and an
//! inbound channel polled for its replies. Messages are newline-free
//! UTF-8 JSON objects, one per message; the transport itself does no
//! correlation and guarantees no ordering across distinct requests.
//!
//! The production implementation ([`process::PluginProcess`]) runs the
//! plugin as a child process and frames messages as one JSON object per
//! line on its stdin/stdout. [`pair`] builds an in-memory loopback used
//! by tests.

pub mod process;

use tokio::sync::mpsc;

/// Errors surfaced by the transport layer.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// The outbound channel is saturated; the message was not enqueued.
    #[error("Transport: outbound channel full, message dropped")]
    ChannelFull,

    /// The peer side of the channel is gone (plugin exited or was shut down).
    #[error("Transport: channel closed")]
    Closed,

    /// The plugin process could not be started.
    #[error("Transport: failed to spawn plugin process: {0}")]
    Spawn(#[source] std::io::Error),

    /// The spawned plugin did not expose the expected stdio handles.
    #[error("Transport: plugin process is missing {0}")]
    MissingStdio(&'static str),
}

/// Sending half of a transport. Sends never block; a saturated channel
/// is observed synchronously as [`TransportError::ChannelFull`].
#[derive(Clone)]
pub struct MessageSender {
    tx: mpsc::Sender<String>,
}

impl MessageSender {
    pub fn try_send(&self, message: String) -> Result<(), TransportError> {
        self.tx.try_send(message).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => TransportError::ChannelFull,
            mpsc::error::TrySendError::Closed(_) => TransportError::Closed,
        })
    }
}

/// Receiving half of a transport, polled without blocking.
pub struct MessageReceiver {
    rx: mpsc::Receiver<String>,
}

impl MessageReceiver {
    /// Returns the next buffered message, or `None` when the channel is
    /// currently empty (or closed). Callers drain until `None` each tick.
    pub fn try_recv(&mut self) -> Option<String> {
        self.rx.try_recv().ok()
    }

    /// Awaits the next message. Used by tests and by the far side of an
    /// in-memory pair; the engine's drain loop uses [`Self::try_recv`].
    pub async fn recv(&mut self) -> Option<String> {
        self.rx.recv().await
    }
}

/// One side of a transport: requests go out through `tx`, replies come
/// back through `rx`.
pub struct TransportPair {
    pub tx: MessageSender,
    pub rx: MessageReceiver,
}

/// Builds an in-memory loopback transport. The first pair is the engine
/// side, the second is the plugin side; a message sent on one side's
/// `tx` arrives on the other side's `rx`.
pub fn pair(capacity: usize) -> (TransportPair, TransportPair) {
    let (out_tx, out_rx) = mpsc::channel(capacity);
    let (in_tx, in_rx) = mpsc::channel(capacity);
    (
        TransportPair {
            tx: MessageSender { tx: out_tx },
            rx: MessageReceiver { rx: in_rx },
        },
        TransportPair {
            tx: MessageSender { tx: in_tx },
            rx: MessageReceiver { rx: out_rx },
        },
    )
}

pub(crate) fn sender_from_raw(tx: mpsc::Sender<String>) -> MessageSender {
    MessageSender { tx }
}

pub(crate) fn receiver_from_raw(rx: mpsc::Receiver<String>) -> MessageReceiver {
    MessageReceiver { rx }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn pair_routes_messages_both_ways() {
        let (mut engine, mut plugin) = pair(8);

        engine.tx.try_send("{\"requestType\":\"polling\"}".to_string()).unwrap();
        assert_eq!(
            plugin.rx.recv().await.unwrap(),
            "{\"requestType\":\"polling\"}"
        );

        plugin.tx.try_send("{\"jobId\":1}".to_string()).unwrap();
        assert_eq!(engine.rx.try_recv().unwrap(), "{\"jobId\":1}");
        assert!(engine.rx.try_recv().is_none());
    }

    #[tokio::test]
    async fn saturated_channel_rejects_synchronously() {
        let (engine, _plugin) = pair(1);

        engine.tx.try_send("a".to_string()).unwrap();
        let err = engine.tx.try_send("b".to_string()).unwrap_err();
        assert!(matches!(err, TransportError::ChannelFull));
    }

    #[tokio::test]
    async fn closed_channel_rejects_synchronously() {
        let (engine, plugin) = pair(1);
        drop(plugin);
        let err = engine.tx.try_send("a".to_string()).unwrap_err();
        assert!(matches!(err, TransportError::Closed));
    }
}
