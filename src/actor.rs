//! A request-response channel between the HTTP server thread and the station
//! thread.
//!
//! The server thread sends a request and waits for the answer; the station
//! thread picks requests up whenever its endpoint task runs, so the station
//! state is only ever touched from one thread.
use futures::{channel::oneshot, FutureExt};
use std::fmt;
use thingbuf::{
    mpsc::{self, errors::TrySendError},
    Recycle,
};

pub fn channel<Req, Rsp>(capacity: usize) -> (Client<Req, Rsp>, Actor<Req, Rsp>) {
    let (tx, rx) = mpsc::with_recycle(capacity, ChanRecycle);
    (Client(tx), Actor(rx))
}

pub struct Client<Req, Rsp>(mpsc::Sender<Slot<Req, Rsp>, ChanRecycle>);

pub struct Actor<Req, Rsp>(mpsc::Receiver<Slot<Req, Rsp>, ChanRecycle>);

pub struct Envelope<Req, Rsp> {
    req: Req,
    rsp_tx: oneshot::Sender<Rsp>,
}

pub enum ReqError<Req> {
    /// The actor is gone; here's your request back.
    Closed(Req),
    /// Too many requests are already queued; here's your request back.
    Full(Req),
    /// The actor dropped the request without answering.
    RspCanceled,
}

type Slot<Req, Rsp> = Option<Envelope<Req, Rsp>>;

struct ChanRecycle;

// === impl Client ===

impl<Req, Rsp> Client<Req, Rsp> {
    pub async fn send_request(&self, req: Req) -> Result<Rsp, ReqError<Req>> {
        let (rsp_tx, rsp_rx) = oneshot::channel();
        self.0
            .send(Some(Envelope { req, rsp_tx }))
            .await
            .map_err(|closed| ReqError::from_slot(closed.into_inner(), ReqError::Closed))?;
        rsp_rx.await.map_err(|_| ReqError::RspCanceled)
    }

    /// Sends a request and parks the calling thread until it's answered.
    ///
    /// Only call this from a thread that isn't the one running the actor.
    pub fn request_blocking(&self, req: Req) -> Result<Rsp, ReqError<Req>> {
        futures::executor::block_on(self.send_request(req))
    }

    /// Enqueues a request without waiting for channel capacity. The response
    /// arrives on the returned receiver.
    ///
    /// If the channel is full, the request is handed back as
    /// [`ReqError::Full`].
    pub fn try_send(&self, req: Req) -> Result<oneshot::Receiver<Rsp>, ReqError<Req>> {
        let (rsp_tx, rsp_rx) = oneshot::channel();
        self.0
            .try_send(Some(Envelope { req, rsp_tx }))
            .map_err(|error| match error {
                TrySendError::Full(slot) => ReqError::from_slot(slot, ReqError::Full),
                error => ReqError::from_slot(error.into_inner(), ReqError::Closed),
            })
            .map(|_| rsp_rx)
    }
}

impl<Req, Rsp> Clone for Client<Req, Rsp> {
    fn clone(&self) -> Self {
        Self(self.0.clone())
    }
}

// === impl Actor ===

impl<Req, Rsp> Actor<Req, Rsp> {
    pub async fn next_request(&mut self) -> Option<Envelope<Req, Rsp>> {
        let req = self.0.recv().await?;
        debug_assert!(
            req.is_some(),
            "empty envelope should never be received! this is a bug!"
        );
        req
    }

    /// Returns a request if one is already waiting.
    pub fn try_next_request(&mut self) -> Option<Envelope<Req, Rsp>> {
        self.next_request().now_or_never().flatten()
    }
}

// === impl Envelope ===

impl<Req, Rsp> Envelope<Req, Rsp> {
    pub fn request(&self) -> &Req {
        &self.req
    }

    pub fn respond(self, rsp: Rsp) -> Result<(), Rsp> {
        self.rsp_tx.send(rsp)
    }
}

// === impl ReqError ===

impl<Req> ReqError<Req> {
    fn from_slot<Rsp>(slot: Slot<Req, Rsp>, returned: fn(Req) -> Self) -> Self {
        match slot {
            Some(envelope) => returned(envelope.req),
            // only `Some` envelopes are ever sent
            None => Self::RspCanceled,
        }
    }
}

impl<Req> fmt::Debug for ReqError<Req> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Closed(_) => f.write_str("Closed(..)"),
            Self::Full(_) => f.write_str("Full(..)"),
            Self::RspCanceled => f.write_str("RspCanceled"),
        }
    }
}

impl<Req> fmt::Display for ReqError<Req> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Closed(_) => f.write_str("the station is no longer accepting requests"),
            Self::Full(_) => f.write_str("too many requests are waiting for the station"),
            Self::RspCanceled => f.write_str("the station dropped the request"),
        }
    }
}

// === impl ChanRecycle ===

impl<Req, Rsp> Recycle<Slot<Req, Rsp>> for ChanRecycle {
    fn new_element(&self) -> Slot<Req, Rsp> {
        None
    }

    fn recycle(&self, element: &mut Slot<Req, Rsp>) {
        *element = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn try_next_request_does_not_block() {
        let (_client, mut actor) = channel::<u32, u32>(2);
        assert!(actor.try_next_request().is_none());
    }

    #[test]
    fn answers_reach_the_caller() {
        let (client, mut actor) = channel::<u32, u32>(2);
        let rsp = client.try_send(20).unwrap();

        let envelope = actor.try_next_request().expect("request should be queued");
        let req = *envelope.request();
        envelope.respond(req * 2 + 2).unwrap();

        assert_eq!(futures::executor::block_on(rsp).unwrap(), 42);
    }

    #[test]
    fn blocking_request_from_another_thread() {
        let (client, mut actor) = channel::<&'static str, usize>(1);
        let caller = std::thread::spawn(move || client.request_blocking("hello").unwrap());

        loop {
            if let Some(envelope) = actor.try_next_request() {
                let len = envelope.request().len();
                envelope.respond(len).unwrap();
                break;
            }
            std::thread::sleep(std::time::Duration::from_millis(1));
        }

        assert_eq!(caller.join().unwrap(), 5);
    }

    #[test]
    fn dropped_envelope_cancels() {
        let (client, mut actor) = channel::<u32, u32>(1);
        let rsp = client.try_send(1).unwrap();
        drop(actor.try_next_request());
        assert!(futures::executor::block_on(rsp).is_err());
    }

    #[test]
    fn closed_actor_returns_request() {
        let (client, actor) = channel::<u32, u32>(1);
        drop(actor);
        match client.request_blocking(7) {
            Err(ReqError::Closed(req)) => assert_eq!(req, 7),
            Err(other) => panic!("unexpected error: {other:?}"),
            Ok(rsp) => panic!("unexpected response: {rsp}"),
        }
    }

    #[test]
    fn full_channel_returns_request() {
        let (client, mut actor) = channel::<u32, u32>(1);
        let _first = client.try_send(1).unwrap();
        match client.try_send(2) {
            Err(ReqError::Full(req)) => assert_eq!(req, 2),
            Err(other) => panic!("unexpected error: {other:?}"),
            Ok(_) => panic!("second request should not fit"),
        }
        let error = client.try_send(3).unwrap_err();
        assert_eq!(error.to_string(), "too many requests are waiting for the station");

        // draining the queue makes room again
        assert_eq!(actor.try_next_request().map(|envelope| *envelope.request()), Some(1));
        assert!(client.try_send(4).is_ok());
    }

    #[test]
    fn try_send_to_closed_actor() {
        let (client, actor) = channel::<u32, u32>(1);
        drop(actor);
        assert!(matches!(client.try_send(5), Err(ReqError::Closed(5))));
    }
}
