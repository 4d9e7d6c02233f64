use tokio::sync::mpsc;

/// Transport-agnostic handle to one live client.
///
/// `send` must not block: the hub calls it for every client in turn.
pub trait ClientConnection: Send + Sync {
    /// Deliver one serialized message.
    fn send(&self, text: &str) -> Result<(), String>;

    /// Whether the transport can still accept frames.
    fn is_open(&self) -> bool;

    /// Request a graceful close with a protocol close code.
    fn close(&self, code: u16, reason: &str) -> Result<(), String>;
}

/// Frame queued for a connection's writer task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutboundFrame {
    Text(String),
    Close { code: u16, reason: String },
}

/// Connection backed by an unbounded channel drained by a writer task.
///
/// Sends never wait on the socket. Once the receiving side is dropped the
/// connection reports closed and the hub prunes it on the next delivery.
#[derive(Debug, Clone)]
pub struct ChannelConnection {
    tx: mpsc::UnboundedSender<OutboundFrame>,
}

impl ChannelConnection {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<OutboundFrame>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl ClientConnection for ChannelConnection {
    fn send(&self, text: &str) -> Result<(), String> {
        self.tx
            .send(OutboundFrame::Text(text.to_string()))
            .map_err(|_| "connection writer has stopped".to_string())
    }

    fn is_open(&self) -> bool {
        !self.tx.is_closed()
    }

    fn close(&self, code: u16, reason: &str) -> Result<(), String> {
        self.tx
            .send(OutboundFrame::Close {
                code,
                reason: reason.to_string(),
            })
            .map_err(|_| "connection writer has stopped".to_string())
    }
}
