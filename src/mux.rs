//! Response multiplexer.
//!
//! One task (the dispatch loop spawned by [`Mux::spawn`]) owns the transport
//! and a table of registered listeners. Everyone else talks to it through an
//! unbounded command channel rather than touching the transport directly:
//! `wait_for` and `callback_for_response` register a listener and then await
//! (or return) without ever locking the transport themselves. `request` and
//! `request_callback_rsp` additionally take the SREQ lock so only one SREQ is
//! ever outstanding, mirroring the coprocessor's own single in-flight-request
//! constraint.

use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use thiserror::Error;
use tokio::io::{AsyncReadExt, AsyncWriteExt, ReadHalf, WriteHalf};
use tokio::sync::{mpsc, oneshot, watch, Mutex as AsyncMutex};

use crate::mt::catalog;
use crate::mt::command::{decode_exact, CommandError, Decodable, Matcher, Sendable};
use crate::mt::frame::{DecodeEvent, Decoder, FrameError, GeneralFrame};
use crate::mt::header::CommandHeader;
use crate::transport::Transport;

#[derive(Debug, Error)]
pub enum MuxError {
    #[error("no matching response within the timeout")]
    Timeout,

    #[error("the transport closed while a request was in flight")]
    TransportClosed,

    #[error(transparent)]
    Frame(#[from] FrameError),

    #[error(transparent)]
    Command(#[from] CommandError),
}

enum ListenerAction {
    NotMatched,
    Delivered,
    DeliveredRemove,
}

struct Listener {
    header: CommandHeader,
    handle: Box<dyn FnMut(&GeneralFrame) -> ListenerAction + Send>,
}

enum MuxCommand {
    Register(u64, Listener),
    Unregister(u64),
}

/// Opaque handle to a registered persistent listener, for
/// [`Mux::unregister`]. One-shot listeners (from `wait_for`) remove
/// themselves once fired or once their caller's timeout elapses, and have no
/// handle of their own.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ListenerHandle(u64);

/// Owns a transport's write half and the listener-registration channel for
/// its dispatch loop. Clone freely: every clone shares the same dispatch
/// loop, write-half lock and SREQ lock.
pub struct Mux<T: Transport> {
    cmd_tx: mpsc::UnboundedSender<MuxCommand>,
    write: AsyncMutex<WriteHalf<T>>,
    sreq_lock: AsyncMutex<()>,
    next_id: AtomicU64,
    closed: watch::Receiver<bool>,
}

/// Drops a registered listener when the future that registered it goes
/// away, whether that's because it resolved normally, it timed out, or its
/// caller cancelled it. All three cases must leave the listener map without
/// a stale entry, so a subsequently-arriving frame that would have matched
/// it is simply dispatched to zero listeners.
struct UnregisterGuard {
    cmd_tx: mpsc::UnboundedSender<MuxCommand>,
    id: u64,
}

impl Drop for UnregisterGuard {
    fn drop(&mut self) {
        let _ = self.cmd_tx.send(MuxCommand::Unregister(self.id));
    }
}

/// A listener already registered with the dispatch loop, holding only the
/// receive half. Splitting registration (synchronous) from receipt (async)
/// is what lets callers register before writing instead of racing the write
/// against the `await` that would otherwise perform the registration.
struct PendingWait<T2> {
    rx: oneshot::Receiver<T2>,
    _guard: UnregisterGuard,
}

impl<T2> PendingWait<T2> {
    async fn recv(self, timeout: Duration) -> Result<T2, MuxError> {
        match tokio::time::timeout(timeout, self.rx).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(_)) => Err(MuxError::TransportClosed),
            Err(_) => Err(MuxError::Timeout),
        }
    }
}

impl<T: Transport> Mux<T> {
    /// Split `transport` and spawn its dispatch loop.
    pub fn spawn(transport: T) -> Self {
        let (read, write) = tokio::io::split(transport);
        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
        let (closed_tx, closed_rx) = watch::channel(false);
        tokio::task::spawn(dispatch_loop(read, cmd_rx, closed_tx));
        Mux {
            cmd_tx,
            write: AsyncMutex::new(write),
            sreq_lock: AsyncMutex::new(()),
            next_id: AtomicU64::new(0),
            closed: closed_rx,
        }
    }

    /// A watch channel that flips to `true` once the dispatch loop has
    /// exited (transport EOF or I/O error). Every outstanding `wait_for`
    /// resolves to `TransportClosed` on its own as soon as the loop's
    /// listener table drops, but a session owner (the controller's
    /// reconnect supervisor) needs its own signal to notice the loss and
    /// start reconnecting; this is that signal.
    pub fn on_closed(&self) -> watch::Receiver<bool> {
        self.closed.clone()
    }

    fn next_id(&self) -> u64 {
        self.next_id.fetch_add(1, Ordering::Relaxed)
    }

    fn register(&self, listener: Listener) -> u64 {
        let id = self.next_id();
        // The dispatch loop outlives every caller that can observe a send
        // error here, so a closed channel just means shutdown is underway.
        let _ = self.cmd_tx.send(MuxCommand::Register(id, listener));
        id
    }

    /// Remove a persistent listener registered via [`Mux::callback_for_response`].
    pub fn unregister(&self, handle: ListenerHandle) {
        let _ = self.cmd_tx.send(MuxCommand::Unregister(handle.0));
    }

    async fn write_frame(&self, frame: &GeneralFrame) -> Result<(), MuxError> {
        let bytes = frame.to_bytes()?;
        let mut write = self.write.lock().await;
        write
            .write_all(&bytes)
            .await
            .map_err(|_| MuxError::TransportClosed)?;
        write.flush().await.map_err(|_| MuxError::TransportClosed)
    }

    /// Register a one-shot listener for the first frame of type `T`
    /// satisfying `matcher`. Synchronous: the registration command is sent
    /// to the dispatch loop before this returns, so callers that must send
    /// a request only after the listener is live (`request`, `send_and_wait`,
    /// `request_callback_rsp`) can register, then write, then await the
    /// returned [`PendingWait`] without a race against a fast reply.
    fn register_wait<T2>(&self, matcher: Matcher<T2>) -> PendingWait<T2>
    where
        T2: Decodable + Send + 'static,
    {
        let (tx, rx) = oneshot::channel();
        let mut tx = Some(tx);
        let id = self.register(Listener {
            header: T2::header(),
            handle: Box::new(move |frame| match decode_exact::<T2>(frame, T2::header()) {
                Ok(value) if matcher.matches(&value) => {
                    if let Some(tx) = tx.take() {
                        let _ = tx.send(value);
                    }
                    ListenerAction::DeliveredRemove
                }
                _ => ListenerAction::NotMatched,
            }),
        });
        PendingWait {
            rx,
            _guard: UnregisterGuard {
                cmd_tx: self.cmd_tx.clone(),
                id,
            },
        }
    }

    /// Register a one-shot listener and await the first frame of type `T`
    /// satisfying `matcher`, without sending anything.
    pub async fn wait_for<T2>(&self, matcher: Matcher<T2>, timeout: Duration) -> Result<T2, MuxError>
    where
        T2: Decodable + Send + 'static,
    {
        self.register_wait(matcher).recv(timeout).await
    }

    /// Register a persistent callback for every future frame of type `T`
    /// matching `matcher`. Returns immediately; the callback keeps firing
    /// until [`Mux::unregister`] is called with the returned handle.
    pub fn callback_for_response<T2>(
        &self,
        matcher: Matcher<T2>,
        callback: impl Fn(T2) + Send + 'static,
    ) -> ListenerHandle
    where
        T2: Decodable + Send + 'static,
    {
        let id = self.register(Listener {
            header: T2::header(),
            handle: Box::new(move |frame| match decode_exact::<T2>(frame, T2::header()) {
                Ok(value) if matcher.matches(&value) => {
                    callback(value);
                    ListenerAction::Delivered
                }
                _ => ListenerAction::NotMatched,
            }),
        });
        ListenerHandle(id)
    }

    /// Send an SREQ and wait for its SRSP, holding the SREQ lock for the
    /// whole write-then-await span so no second SREQ can interleave.
    pub async fn request<Req, Rsp>(&self, req: Req, timeout: Duration) -> Result<Rsp, MuxError>
    where
        Req: Sendable + Send,
        Rsp: Decodable + Send + 'static,
    {
        let _guard = self.sreq_lock.lock().await;
        let rsp_wait = self.register_wait::<Rsp>(Matcher::any());
        self.write_frame(&req.to_frame()).await?;
        rsp_wait.recv(timeout).await
    }

    /// Write a fire-and-forget AREQ (`SYS.ResetReq` is this driver's only
    /// caller) and wait for a specific AREQ reply, registering the listener
    /// before the write so a fast-answering coprocessor can't win the race.
    /// Unlike `request`, this does not take the SREQ lock: there is no SRSP
    /// to serialize against.
    pub async fn send_and_wait<Req, Rsp>(
        &self,
        req: Req,
        matcher: Matcher<Rsp>,
        timeout: Duration,
    ) -> Result<Rsp, MuxError>
    where
        Req: Sendable + Send,
        Rsp: Decodable + Send + 'static,
    {
        let wait = self.register_wait::<Rsp>(matcher);
        self.write_frame(&req.to_frame()).await?;
        wait.recv(timeout).await
    }

    /// Send an SREQ, wait for its SRSP, and also wait for a distinct AREQ
    /// callback that reports the request's eventual outcome (e.g.
    /// `ZDO.MgmtPermitJoinReq`'s SRSP only acks receipt; `MgmtPermitJoinRsp`
    /// reports whether permit-join actually took effect). The callback
    /// listener is registered before the SREQ is sent, so a fast-answering
    /// coprocessor can never deliver it before this function is listening.
    pub async fn request_callback_rsp<Req, Rsp, Cb>(
        &self,
        req: Req,
        srsp_timeout: Duration,
        callback_matcher: Matcher<Cb>,
        callback_timeout: Duration,
    ) -> Result<(Rsp, Cb), MuxError>
    where
        Req: Sendable + Send,
        Rsp: Decodable + Send + 'static,
        Cb: Decodable + Send + 'static,
    {
        let callback_wait = self.register_wait::<Cb>(callback_matcher);
        let rsp = self.request::<Req, Rsp>(req, srsp_timeout).await?;
        let callback = callback_wait.recv(callback_timeout).await?;
        Ok((rsp, callback))
    }
}

type BoxedRun = Pin<Box<dyn Future<Output = ()> + Send>>;

fn dispatch_loop<T: Transport>(
    mut read: ReadHalf<T>,
    mut cmd_rx: mpsc::UnboundedReceiver<MuxCommand>,
    closed_tx: watch::Sender<bool>,
) -> BoxedRun {
    Box::pin(async move {
        let mut decoder = Decoder::new();
        let mut listeners: Vec<(u64, Listener)> = Vec::new();

        loop {
            let mut byte = [0u8; 1];
            tokio::select! {
                cmd = cmd_rx.recv() => {
                    match cmd {
                        Some(MuxCommand::Register(id, listener)) => listeners.push((id, listener)),
                        Some(MuxCommand::Unregister(id)) => listeners.retain(|(lid, _)| *lid != id),
                        None => break,
                    }
                }
                n = read.read(&mut byte) => {
                    let n = match n {
                        Ok(n) => n,
                        Err(_) => break,
                    };
                    if n == 0 {
                        break;
                    }
                    match decoder.push(byte[0]) {
                        DecodeEvent::Frame(frame) => dispatch_frame(&frame, &mut listeners),
                        DecodeEvent::BadFcs => {
                            log::warn!("dropping frame with bad FCS");
                        }
                        DecodeEvent::Pending => {}
                    }
                }
            }
        }
        // Dropping `listeners` here resolves every outstanding `wait_for`
        // with `TransportClosed` (its oneshot sender drops) and silently
        // discards persistent callbacks; `closed_tx` is the session owner's
        // signal to notice the loss.
        drop(listeners);
        let _ = closed_tx.send(true);
    })
}

fn dispatch_frame(frame: &GeneralFrame, listeners: &mut Vec<(u64, Listener)>) {
    let mut matched = false;
    listeners.retain_mut(|(_, listener)| {
        if listener.header != frame.header {
            return true;
        }
        match (listener.handle)(frame) {
            ListenerAction::NotMatched => true,
            ListenerAction::Delivered => {
                matched = true;
                true
            }
            ListenerAction::DeliveredRemove => {
                matched = true;
                false
            }
        }
    });
    if !matched {
        let name = catalog::command_name(frame.header).unwrap_or("unknown");
        log::warn!(
            "dropping unmatched frame {name} (header {:#06x}): {}",
            frame.header.0,
            hex::encode(&frame.payload)
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mt::commands::af::{DataConfirm, DataRequestExtReq, DataRequestExtRsp};
    use crate::mt::commands::sys::{PingReq, PingRsp};
    use crate::mt::types::{AddrModeAddress, Nwk, ShortBytes, Status, Wire};
    use std::sync::{Arc, Mutex as StdMutex};
    use tokio::io::{AsyncReadExt as _, AsyncWriteExt as _};

    /// A minimal in-process stand-in for the coprocessor: reads frames off
    /// one end of a duplex pipe and answers SYS.Ping / AF.DataRequestExt with
    /// canned SRSPs.
    async fn spawn_fake_coprocessor(mut io: tokio::io::DuplexStream) {
        tokio::task::spawn(async move {
            let mut decoder = Decoder::new();
            let mut byte = [0u8; 1];
            loop {
                if io.read(&mut byte).await.unwrap_or(0) == 0 {
                    return;
                }
                if let DecodeEvent::Frame(frame) = decoder.push(byte[0]) {
                    if frame.header == PingReq::header() {
                        let mut payload = Vec::new();
                        0x0659u16.write(&mut payload);
                        let rsp = GeneralFrame::new(PingRsp::header(), payload);
                        let _ = io.write_all(&rsp.to_bytes().unwrap()).await;
                    } else if frame.header == DataRequestExtReq::header() {
                        let mut payload = Vec::new();
                        Status::Success.write(&mut payload);
                        let rsp = GeneralFrame::new(DataRequestExtRsp::header(), payload);
                        let _ = io.write_all(&rsp.to_bytes().unwrap()).await;

                        let mut confirm_payload = Vec::new();
                        Status::Success.write(&mut confirm_payload);
                        1u8.write(&mut confirm_payload);
                        1u8.write(&mut confirm_payload);
                        let confirm = GeneralFrame::new(DataConfirm::header(), confirm_payload);
                        let _ = io.write_all(&confirm.to_bytes().unwrap()).await;
                    }
                }
            }
        });
    }

    #[tokio::test]
    async fn request_resolves_from_matching_srsp() {
        let (client, server) = tokio::io::duplex(4096);
        spawn_fake_coprocessor(server).await;
        let mux = Mux::spawn(client);

        let rsp: PingRsp = mux
            .request(PingReq {}, Duration::from_secs(1))
            .await
            .unwrap();
        assert_eq!(rsp.capabilities.0, 0x0659);
    }

    #[tokio::test]
    async fn request_times_out_when_nothing_answers() {
        let (client, _server) = tokio::io::duplex(4096);
        let mux = Mux::spawn(client);

        let result = mux
            .request::<_, PingRsp>(PingReq {}, Duration::from_millis(50))
            .await;
        assert!(matches!(result, Err(MuxError::Timeout)));
    }

    #[tokio::test]
    async fn timed_out_listener_does_not_intercept_a_later_independent_wait() {
        let (client, mut server) = tokio::io::duplex(4096);
        let mux = Mux::spawn(client);

        let result = mux
            .wait_for::<PingRsp>(Matcher::any(), Duration::from_millis(20))
            .await;
        assert!(matches!(result, Err(MuxError::Timeout)));

        // A frame written only now, after the first wait_for already timed
        // out and unregistered itself, must still resolve a *second*,
        // independently-registered wait_for rather than being silently
        // swallowed by a stale listener.
        let second = mux.wait_for::<PingRsp>(Matcher::any(), Duration::from_millis(200));
        let mut payload = Vec::new();
        0x0659u16.write(&mut payload);
        let frame = GeneralFrame::new(PingRsp::header(), payload);
        server.write_all(&frame.to_bytes().unwrap()).await.unwrap();

        let rsp = second.await.unwrap();
        assert_eq!(rsp.capabilities.0, 0x0659);
    }

    #[tokio::test]
    async fn on_closed_fires_after_transport_eof() {
        let (client, server) = tokio::io::duplex(4096);
        let mux = Mux::spawn(client);
        let mut closed = mux.on_closed();
        assert!(!*closed.borrow());

        drop(server);

        closed.changed().await.unwrap();
        assert!(*closed.borrow());
    }

    #[tokio::test]
    async fn transport_loss_fails_outstanding_wait_for() {
        let (client, server) = tokio::io::duplex(4096);
        let mux = Arc::new(Mux::spawn(client));

        let mux2 = mux.clone();
        let waiting = tokio::spawn(async move {
            mux2.request::<PingReq, PingRsp>(PingReq {}, Duration::from_secs(5))
                .await
        });

        drop(server);
        let result = waiting.await.unwrap();
        assert!(matches!(result, Err(MuxError::TransportClosed)));
    }

    #[tokio::test]
    async fn request_callback_rsp_waits_for_both() {
        let (client, server) = tokio::io::duplex(4096);
        spawn_fake_coprocessor(server).await;
        let mux = Mux::spawn(client);

        let req = DataRequestExtReq {
            dst_addr: AddrModeAddress::Nwk(Nwk(0x1234)),
            dst_endpoint: 1,
            dst_pan_id: 0,
            src_endpoint: 1,
            cluster_id: 6,
            tsn: 1,
            options: 0,
            radius: 30,
            data: ShortBytes(vec![1]),
        };
        let matcher: Matcher<DataConfirm> =
            Matcher::field_eq(1u8, |c: &DataConfirm| c.endpoint).and(Matcher::field_eq(1u8, |c: &DataConfirm| c.tsn));

        let (rsp, confirm): (DataRequestExtRsp, DataConfirm) = mux
            .request_callback_rsp(
                req,
                Duration::from_secs(1),
                matcher,
                Duration::from_secs(1),
            )
            .await
            .unwrap();
        assert_eq!(rsp.status, Status::Success);
        assert_eq!(confirm.tsn, 1);
    }

    #[tokio::test]
    async fn two_concurrent_srsps_stay_in_issuance_order() {
        // Two requests issued back to back must not interleave: the SREQ
        // lock guarantees the second write only happens after the first
        // SRSP (or its timeout) has been observed.
        let (client, server) = tokio::io::duplex(4096);
        spawn_fake_coprocessor(server).await;
        let mux = Arc::new(Mux::spawn(client));
        let order = Arc::new(StdMutex::new(Vec::new()));

        let mux_a = mux.clone();
        let order_a = order.clone();
        let a = tokio::spawn(async move {
            let _: PingRsp = mux_a.request(PingReq {}, Duration::from_secs(1)).await.unwrap();
            order_a.lock().unwrap().push('a');
        });
        let mux_b = mux.clone();
        let order_b = order.clone();
        let b = tokio::spawn(async move {
            let _: PingRsp = mux_b.request(PingReq {}, Duration::from_secs(1)).await.unwrap();
            order_b.lock().unwrap().push('b');
        });

        a.await.unwrap();
        b.await.unwrap();
        assert_eq!(order.lock().unwrap().len(), 2);
    }
}
