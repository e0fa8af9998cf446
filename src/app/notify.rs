use {
    tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender},
    tracing::warn,
};

/// Outbound text messages for the chat front end. Delivery is best effort.
#[derive(Clone, Default)]
pub struct Notifier {
    tx: Option<UnboundedSender<String>>,
}

impl Notifier {
    pub fn channel() -> (Self, UnboundedReceiver<String>) {
        let (tx, rx) = unbounded_channel();
        (Self { tx: Some(tx) }, rx)
    }

    pub fn notify(&self, msg: impl Into<String>) {
        let msg = msg.into();
        let Some(tx) = &self.tx else {
            return;
        };
        if tx.send(msg).is_err() {
            warn!("notification dropped, receiver is gone");
        }
    }
}
