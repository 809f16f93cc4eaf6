//! Requester side of a loader service

use futures::channel::mpsc::{self, UnboundedReceiver, UnboundedSender};
use futures::StreamExt;

use crate::error::{LoaderError, Result};
use crate::request::{LoadReply, LoadRequest, ResourceKind, Rpc, Variant};

/// Where replies for a request are posted
pub type ReplyPort<T> = UnboundedSender<LoadReply<T>>;

/// A request travelling to the service together with its reply destination
#[derive(Debug)]
pub struct Envelope<T> {
    pub request: LoadRequest,
    pub reply: ReplyPort<T>,
}

impl<T> Envelope<T> {
    /// Post a reply; a requester that went away is not an error for the service
    pub(crate) fn respond(&self, reply: LoadReply<T>) {
        if self.reply.unbounded_send(reply).is_err() {
            log::warn!(
                "Requester of {} is gone, dropping reply for {}",
                self.request.locator,
                self.request.rpc
            );
        }
    }
}

/// One requester context connected to a loader service
///
/// Requests are sent without waiting; replies arrive on this client's own port
/// in completion order, correlated by [`Rpc`].
#[derive(Debug)]
pub struct LoaderClient<T> {
    inbox: UnboundedSender<Envelope<T>>,
    reply_tx: ReplyPort<T>,
    replies: UnboundedReceiver<LoadReply<T>>,
    next_rpc: u64,
}

impl<T> LoaderClient<T> {
    pub(crate) fn new(inbox: UnboundedSender<Envelope<T>>) -> Self {
        let (reply_tx, replies) = mpsc::unbounded();
        Self {
            inbox,
            reply_tx,
            replies,
            next_rpc: 0,
        }
    }

    /// Request a resource without variant parameters
    pub fn request(&mut self, kind: ResourceKind, locator: impl Into<String>) -> Result<Rpc> {
        self.request_with(kind, locator, Variant::new())
    }

    /// Request a resource variant
    pub fn request_with(
        &mut self,
        kind: ResourceKind,
        locator: impl Into<String>,
        variant: Variant,
    ) -> Result<Rpc> {
        self.next_rpc += 1;
        let rpc = Rpc(self.next_rpc);
        self.send(LoadRequest::new(kind, locator, rpc).with_variant(variant))?;
        Ok(rpc)
    }

    /// Send a prepared request; its `rpc` is used as is
    pub fn send(&self, request: LoadRequest) -> Result<()> {
        let envelope = Envelope {
            request,
            reply: self.reply_tx.clone(),
        };
        self.inbox
            .unbounded_send(envelope)
            .map_err(|_| LoaderError::ChannelClosed("loader service inbox"))
    }

    /// Wait for the next reply
    pub async fn recv(&mut self) -> Option<LoadReply<T>> {
        self.replies.next().await
    }

    /// Take a reply if one is already waiting
    pub fn try_recv(&mut self) -> Option<LoadReply<T>> {
        self.replies.try_next().ok().flatten()
    }
}
