/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

//! Request/reply bus between isolated execution contexts.
//!
//! Each context registers one [`Listener`] under its [`ContextAddress`].
//! [`MessageBus::send`] makes exactly one delivery attempt and resolves to the
//! single reply, or to a [`SendError`] describing why none arrived. Retrying
//! is always the caller's policy.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use ghostshell_core::TabId;
use parking_lot::RwLock;
use tokio::sync::{mpsc, oneshot};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ContextAddress {
    Background,
    ContentScript(TabId),
    PageWorld(TabId),
}

impl fmt::Display for ContextAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ContextAddress::Background => write!(f, "background"),
            ContextAddress::ContentScript(tab) => write!(f, "content-script@{tab}"),
            ContextAddress::PageWorld(tab) => write!(f, "page-world@{tab}"),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SendError {
    /// Nothing is listening at the target address (e.g. the content script
    /// has not been loaded yet). Expected, and the trigger for fallbacks.
    NoReceiver,
    /// The target went away while the request was in flight.
    ChannelClosed,
    /// The target accepted the request but did not reply in time.
    Timeout,
}

impl fmt::Display for SendError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SendError::NoReceiver => write!(f, "no receiver registered at target context"),
            SendError::ChannelClosed => write!(f, "target context closed before replying"),
            SendError::Timeout => write!(f, "target context did not reply in time"),
        }
    }
}

impl std::error::Error for SendError {}

/// One-shot reply slot. Consuming it is the only way to answer, so a request
/// gets at most one response.
#[derive(Debug)]
pub struct ReplyHandle<Resp> {
    tx: oneshot::Sender<Resp>,
}

impl<Resp> ReplyHandle<Resp> {
    /// Returns `false` when the sender stopped waiting (timed out or dropped).
    pub fn respond(self, response: Resp) -> bool {
        self.tx.send(response).is_ok()
    }
}

#[derive(Debug)]
pub struct Incoming<Req, Resp> {
    pub request: Req,
    pub reply: ReplyHandle<Resp>,
}

impl<Req, Resp> Incoming<Req, Resp> {
    pub fn respond(self, response: Resp) -> bool {
        self.reply.respond(response)
    }
}

/// Receiving end of a context registration. Dropping it makes the address
/// unreachable; requests queued but not yet received resolve to
/// [`SendError::ChannelClosed`].
#[derive(Debug)]
pub struct Listener<Req, Resp> {
    address: ContextAddress,
    rx: mpsc::UnboundedReceiver<Incoming<Req, Resp>>,
}

impl<Req, Resp> Listener<Req, Resp> {
    pub fn address(&self) -> ContextAddress {
        self.address
    }

    pub async fn recv(&mut self) -> Option<Incoming<Req, Resp>> {
        self.rx.recv().await
    }

    pub fn try_recv(&mut self) -> Option<Incoming<Req, Resp>> {
        self.rx.try_recv().ok()
    }
}

type Route<Req, Resp> = mpsc::UnboundedSender<Incoming<Req, Resp>>;

pub struct MessageBus<Req, Resp> {
    routes: Arc<RwLock<HashMap<ContextAddress, Route<Req, Resp>>>>,
    reply_timeout: Duration,
}

impl<Req, Resp> Clone for MessageBus<Req, Resp> {
    fn clone(&self) -> Self {
        Self {
            routes: Arc::clone(&self.routes),
            reply_timeout: self.reply_timeout,
        }
    }
}

impl<Req, Resp> MessageBus<Req, Resp>
where
    Req: Send + 'static,
    Resp: Send + 'static,
{
    pub fn new(reply_timeout: Duration) -> Self {
        Self {
            routes: Arc::new(RwLock::new(HashMap::new())),
            reply_timeout,
        }
    }

    /// Register a listener for `address`, replacing any previous one.
    pub fn register(&self, address: ContextAddress) -> Listener<Req, Resp> {
        let (tx, rx) = mpsc::unbounded_channel();
        if self.routes.write().insert(address, tx).is_some() {
            log::debug!("message bus: listener at {address} replaced");
        }
        Listener { address, rx }
    }

    pub fn unregister(&self, address: ContextAddress) {
        self.routes.write().remove(&address);
    }

    pub fn has_listener(&self, address: ContextAddress) -> bool {
        self.routes
            .read()
            .get(&address)
            .is_some_and(|route| !route.is_closed())
    }

    /// Deliver `request` once and wait for the single reply.
    pub async fn send(&self, target: ContextAddress, request: Req) -> Result<Resp, SendError> {
        let Some(route) = self.routes.read().get(&target).cloned() else {
            return Err(SendError::NoReceiver);
        };

        let (reply_tx, reply_rx) = oneshot::channel();
        let incoming = Incoming {
            request,
            reply: ReplyHandle { tx: reply_tx },
        };
        if route.send(incoming).is_err() {
            self.forget_closed_route(target, &route);
            return Err(SendError::NoReceiver);
        }

        match tokio::time::timeout(self.reply_timeout, reply_rx).await {
            Ok(Ok(response)) => Ok(response),
            Ok(Err(_)) => Err(SendError::ChannelClosed),
            Err(_) => Err(SendError::Timeout),
        }
    }

    fn forget_closed_route(&self, target: ContextAddress, route: &Route<Req, Resp>) {
        let mut routes = self.routes.write();
        if routes
            .get(&target)
            .is_some_and(|current| current.same_channel(route))
        {
            routes.remove(&target);
        }
    }
}
