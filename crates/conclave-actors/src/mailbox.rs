//! Generic actor mailbox: a bounded `mpsc` channel plus the fixed
//! capacity needed to compute queue depth for smallest-mailbox routing.
//! One `tokio::spawn`ed task owns the receiving half; callers hold only
//! the sending half, the address type every actor in the mesh uses.

use tokio::sync::mpsc;

/// The sending half of an actor's mailbox, with enough bookkeeping to
/// answer "how many messages are currently queued" without `mpsc`
/// exposing a `len()` on the sender.
#[derive(Clone)]
pub struct MailboxAddress<Msg> {
    tx: mpsc::Sender<Msg>,
    capacity: usize,
}

impl<Msg> MailboxAddress<Msg> {
    /// Number of messages currently sitting in the mailbox, derived from
    /// the sender's remaining permit count.
    pub fn queue_len(&self) -> usize {
        self.capacity.saturating_sub(self.tx.capacity())
    }

    pub async fn send(&self, msg: Msg) -> Result<(), mpsc::error::SendError<Msg>> {
        self.tx.send(msg).await
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// Create a bounded mailbox, returning the address (for routing) and the
/// receiver (for the actor's own run loop).
pub fn mailbox<Msg>(capacity: usize) -> (MailboxAddress<Msg>, mpsc::Receiver<Msg>) {
    let (tx, rx) = mpsc::channel(capacity);
    (MailboxAddress { tx, capacity }, rx)
}

/// Pick the address with the smallest current queue among `addresses`,
/// per spec §4.6 "routed via smallest-mailbox policy". Returns `None`
/// only when `addresses` is empty.
pub fn smallest_mailbox<'a, Msg>(addresses: &'a [MailboxAddress<Msg>]) -> Option<&'a MailboxAddress<Msg>> {
    addresses.iter().min_by_key(|a| a.queue_len())
}
