//! Request/reply correlation over the helper socket.

use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use bytes::{Bytes, BytesMut};
use dashmap::DashMap;
use futures_lite::StreamExt;
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tokio::sync::{mpsc, Mutex};
use tokio_util::codec::{Encoder, FramedRead};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, trace, warn};

use super::codec::{Frame, Header, ShimCodec, API_VERSION};
use super::command::Request;
use crate::error::ErrorKind;
use crate::{Error, Result};

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct RawReply {
    pub request_id: i64,
    pub operation_id: u32,
    pub complete: bool,
    pub payload: Bytes,
}

/// Traffic the reader loop hands to the session rather than to a waiting command.
#[derive(Debug)]
pub(crate) enum Inbound {
    Event { event_id: u8, payload: Bytes },
    Error(Error),
}

/// Reply slots keyed by request id. A slot is unbounded so that a burst of partial replies never displaces the
/// completing one.
type Pending = DashMap<i64, mpsc::UnboundedSender<RawReply>>;

struct Shared {
    pending: Pending,
    closed: AtomicBool,
}

impl Shared {
    fn route(&self, frame: Frame, inbound: &mpsc::UnboundedSender<Inbound>) {
        let Frame { header, payload } = frame;
        if header.version != API_VERSION {
            warn!(version = header.version, "unexpected helper API version");
        }

        if header.is_event() {
            trace!(event_id = header.event_id, len = payload.len(), "helper event");
            let _ = inbound.send(Inbound::Event {
                event_id: header.event_id,
                payload,
            });
            return;
        }

        let reply = RawReply {
            request_id: header.request_id,
            operation_id: header.operation_id,
            complete: header.is_operation_complete(),
            payload,
        };
        trace!(request_id = reply.request_id, complete = reply.complete, "helper reply");

        // A send only fails once the waiter has gone away, and then the reply has no one to go to.
        let delivered = if reply.complete {
            self.pending.remove(&reply.request_id).map(|(_, slot)| {
                let _ = slot.send(reply.clone());
            })
        } else {
            self.pending.get(&reply.request_id).map(|slot| {
                let _ = slot.send(reply.clone());
            })
        };

        if delivered.is_none() {
            debug!(request_id = reply.request_id, "reply for unknown request");
            let _ = inbound.send(Inbound::Error(Error::new(
                ErrorKind::StaleRequest,
                None,
                format!("reply for unknown request {}", reply.request_id),
            )));
        }
    }

    fn shut_down(&self) {
        self.closed.store(true, Ordering::Release);
        self.pending.clear();
    }
}

/// Removes a pending request when the waiting command finishes, fails or is dropped.
struct PendingReply<'a> {
    request_id: i64,
    pending: &'a Pending,
    replies: mpsc::UnboundedReceiver<RawReply>,
}

impl PendingReply<'_> {
    async fn collect(&mut self) -> Vec<RawReply> {
        let mut replies = Vec::new();
        while let Some(reply) = self.replies.recv().await {
            replies.push(reply);
        }
        replies
    }
}

impl Drop for PendingReply<'_> {
    fn drop(&mut self) {
        self.pending.remove(&self.request_id);
    }
}

/// A connection to the helper's command socket.
pub(crate) struct Transport {
    writer: Mutex<Box<dyn AsyncWrite + Send + Unpin>>,
    shared: Arc<Shared>,
    next_id: AtomicI64,
    cancel: CancellationToken,
    command_timeout: Duration,
}

impl std::fmt::Debug for Transport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Transport")
            .field("pending", &self.shared.pending.len())
            .field("closed", &self.is_closed())
            .finish()
    }
}

impl Transport {
    /// Starts the reader loop on `stream`. Events and listener errors are delivered through the returned receiver.
    ///
    /// Cancelling `cancel` stops the reader loop and closes the transport.
    pub fn spawn<S>(
        stream: S,
        command_timeout: Duration,
        cancel: CancellationToken,
    ) -> (Arc<Transport>, mpsc::UnboundedReceiver<Inbound>)
    where
        S: AsyncRead + AsyncWrite + Send + 'static,
    {
        let (reader, writer) = tokio::io::split(stream);
        let (inbound_tx, inbound_rx) = mpsc::unbounded_channel();
        let shared = Arc::new(Shared {
            pending: DashMap::new(),
            closed: AtomicBool::new(false),
        });

        tokio::spawn(listen(
            FramedRead::new(reader, ShimCodec::default()),
            shared.clone(),
            inbound_tx,
            cancel.clone(),
        ));

        let transport = Arc::new(Transport {
            writer: Mutex::new(Box::new(writer)),
            shared,
            next_id: AtomicI64::new(0),
            cancel,
            command_timeout,
        });
        (transport, inbound_rx)
    }

    pub fn is_closed(&self) -> bool {
        self.shared.closed.load(Ordering::Acquire)
    }

    /// Sends `command` and waits for its replies. Returns every reply in arrival order, the last one being the
    /// completing reply.
    pub async fn execute(&self, command: &[String]) -> Result<Vec<RawReply>> {
        if self.is_closed() {
            return Err(ErrorKind::SessionNotExist.into());
        }

        let request_id = self.next_id.fetch_add(1, Ordering::Relaxed) + 1;
        let (slot, replies) = mpsc::unbounded_channel();
        self.shared.pending.insert(request_id, slot);
        let mut pending = PendingReply {
            request_id,
            pending: &self.shared.pending,
            replies,
        };

        // The reader loop may have shut down between the check above and the insert.
        if self.is_closed() {
            return Err(ErrorKind::SessionNotExist.into());
        }

        let payload = serde_json::to_vec(&Request { command, request_id })?;
        self.write(Frame {
            header: Header::request(request_id, 0),
            payload: payload.into(),
        })
        .await?;
        debug!(request_id, ?command, "command sent");

        let replies = tokio::time::timeout(self.command_timeout, pending.collect())
            .await
            .map_err(|_| {
                Error::new(
                    ErrorKind::Timeout,
                    None,
                    format!("no reply to request {request_id} within {:?}", self.command_timeout),
                )
            })?;

        match replies.last() {
            Some(reply) if reply.complete => Ok(replies),
            _ => Err(Error::new(
                ErrorKind::ConnectionClosed,
                None,
                format!("connection closed before request {request_id} completed"),
            )),
        }
    }

    async fn write(&self, frame: Frame) -> Result<()> {
        let mut buf = BytesMut::new();
        ShimCodec::default().encode(frame, &mut buf)?;

        let mut writer = self.writer.lock().await;
        writer.write_all(&buf).await?;
        writer.flush().await?;
        Ok(())
    }

    /// Stops the reader loop and fails every pending request. Further commands fail with
    /// [`ErrorKind::SessionNotExist`].
    pub async fn close(&self) {
        self.cancel.cancel();
        self.shared.shut_down();
        let _ = self.writer.lock().await.shutdown().await;
    }
}

async fn listen<R>(
    mut frames: FramedRead<R, ShimCodec>,
    shared: Arc<Shared>,
    inbound: mpsc::UnboundedSender<Inbound>,
    cancel: CancellationToken,
) where
    R: AsyncRead + Unpin,
{
    debug!("helper listener started");
    loop {
        let next = tokio::select! {
            _ = cancel.cancelled() => break,
            next = frames.next() => next,
        };

        match next {
            Some(Ok(frame)) => shared.route(frame, &inbound),
            Some(Err(err)) => {
                error!(error = %err, "helper listener error");
                let _ = inbound.send(Inbound::Error(err));
            }
            None => {
                if !cancel.is_cancelled() {
                    warn!("helper closed the connection");
                    let _ = inbound.send(Inbound::Error(Error::new(
                        ErrorKind::ConnectionClosed,
                        None,
                        "the helper closed the connection".to_string(),
                    )));
                }
                break;
            }
        }
    }

    shared.shut_down();
    debug!("helper listener stopped");
}

#[cfg(test)]
mod tests {
    use bytes::BufMut;
    use tokio::io::{AsyncReadExt, DuplexStream};

    use super::*;
    use crate::shim::codec::HEADER_LEN;

    /// Reads one request frame from the fake helper's end of the pipe.
    async fn read_request(helper: &mut DuplexStream) -> (i64, Vec<String>) {
        let mut header = [0u8; HEADER_LEN];
        helper.read_exact(&mut header).await.unwrap();
        let header = Header::unpack(&header).unwrap();
        let mut payload = vec![0u8; header.content_length as usize];
        helper.read_exact(&mut payload).await.unwrap();

        let request: serde_json::Value = serde_json::from_slice(&payload).unwrap();
        assert_eq!(request["request_id"].as_i64().unwrap(), header.request_id);
        let command = serde_json::from_value(request["command"].clone()).unwrap();
        (header.request_id, command)
    }

    async fn reply(helper: &mut DuplexStream, request_id: i64, complete: bool, body: serde_json::Value) {
        let payload = serde_json::to_vec(&body).unwrap();
        let header = Header {
            version: API_VERSION,
            flags: u8::from(complete),
            event_id: 0,
            request_id,
            operation_id: 0,
            content_length: payload.len() as u32,
        };
        let mut buf = BytesMut::new();
        buf.put_slice(&header.pack());
        buf.put_slice(&payload);
        helper.write_all(&buf).await.unwrap();
    }

    fn connect(timeout: Duration) -> (Arc<Transport>, mpsc::UnboundedReceiver<Inbound>, DuplexStream) {
        let (client, helper) = tokio::io::duplex(64 * 1024);
        let (transport, inbound) = Transport::spawn(client, timeout, CancellationToken::new());
        (transport, inbound, helper)
    }

    fn tokens(s: &str) -> Vec<String> {
        s.split_whitespace().map(str::to_string).collect()
    }

    #[tokio::test]
    async fn replies_are_matched_by_request_id() {
        let (transport, _inbound, mut helper) = connect(Duration::from_secs(5));

        let mut calls = Vec::new();
        for i in 0..8 {
            let transport = transport.clone();
            calls.push(tokio::spawn(async move {
                let command = tokens(&format!("echo {i}"));
                let replies = transport.execute(&command).await.unwrap();
                (i, replies)
            }));
        }

        let mut requests = Vec::new();
        for _ in 0..8 {
            requests.push(read_request(&mut helper).await);
        }
        let ids: std::collections::HashSet<_> = requests.iter().map(|(id, _)| *id).collect();
        assert_eq!(ids.len(), 8);

        // Answer in reverse order, echoing the command's argument.
        for (id, command) in requests.iter().rev() {
            reply(&mut helper, *id, true, serde_json::json!({ "status": "ok", "data": command[1] })).await;
        }

        for call in calls {
            let (i, replies) = call.await.unwrap();
            assert_eq!(replies.len(), 1);
            let body: serde_json::Value = serde_json::from_slice(&replies[0].payload).unwrap();
            assert_eq!(body["data"], i.to_string());
        }
        assert!(transport.shared.pending.is_empty());
    }

    #[tokio::test]
    async fn request_ids_increase() {
        let (transport, _inbound, mut helper) = connect(Duration::from_secs(5));

        let mut last = 0;
        for _ in 0..3 {
            let call = {
                let transport = transport.clone();
                tokio::spawn(async move { transport.execute(&tokens("rpc feature-flags")).await })
            };
            let (id, _) = read_request(&mut helper).await;
            assert!(id > last);
            last = id;
            reply(&mut helper, id, true, serde_json::json!({ "status": "ok" })).await;
            call.await.unwrap().unwrap();
        }
    }

    #[tokio::test]
    async fn timeout_does_not_disturb_other_requests() {
        let (transport, _inbound, mut helper) = connect(Duration::from_millis(200));

        let silent = {
            let transport = transport.clone();
            tokio::spawn(async move { transport.execute(&tokens("device pair")).await })
        };
        let answered = {
            let transport = transport.clone();
            tokio::spawn(async move { transport.execute(&tokens("adapter list")).await })
        };

        let first = read_request(&mut helper).await;
        let second = read_request(&mut helper).await;
        let to_answer = if first.1[0] == "adapter" { first.0 } else { second.0 };
        reply(&mut helper, to_answer, true, serde_json::json!({ "status": "ok" })).await;

        assert!(answered.await.unwrap().is_ok());
        let err = silent.await.unwrap().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Timeout);
        assert!(transport.shared.pending.is_empty());
        assert!(!transport.is_closed());
    }

    #[tokio::test]
    async fn partial_replies_keep_the_request_pending() {
        let (transport, _inbound, mut helper) = connect(Duration::from_secs(5));

        let call = {
            let transport = transport.clone();
            tokio::spawn(async move { transport.execute(&tokens("device opp send-file --file x")).await })
        };

        let (id, _) = read_request(&mut helper).await;
        reply(&mut helper, id, false, serde_json::json!({ "status": "ok", "data": 1 })).await;
        reply(&mut helper, id, false, serde_json::json!({ "status": "ok", "data": 2 })).await;
        reply(&mut helper, id, true, serde_json::json!({ "status": "ok", "data": 3 })).await;

        let replies = call.await.unwrap().unwrap();
        assert_eq!(replies.len(), 3);
        assert!(!replies[0].complete);
        assert!(replies[2].complete);
    }

    #[tokio::test]
    async fn bursts_of_partial_replies_are_all_delivered() {
        let (transport, _inbound, mut helper) = connect(Duration::from_secs(5));

        let call = {
            let transport = transport.clone();
            tokio::spawn(async move { transport.execute(&tokens("device opp send-file --file x")).await })
        };
        let (id, _) = read_request(&mut helper).await;

        // Every reply lands in the pipe before the command gets a chance to read any of them.
        let mut burst = BytesMut::new();
        for n in 0..7 {
            let payload = serde_json::to_vec(&serde_json::json!({ "status": "ok", "data": n })).unwrap();
            let header = Header {
                version: API_VERSION,
                flags: u8::from(n == 6),
                event_id: 0,
                request_id: id,
                operation_id: 0,
                content_length: payload.len() as u32,
            };
            burst.put_slice(&header.pack());
            burst.put_slice(&payload);
        }
        helper.write_all(&burst).await.unwrap();

        let replies = call.await.unwrap().unwrap();
        assert_eq!(replies.len(), 7);
        assert!(replies[..6].iter().all(|reply| !reply.complete));
        assert!(replies[6].complete);
        let last: serde_json::Value = serde_json::from_slice(&replies[6].payload).unwrap();
        assert_eq!(last["data"], 6);
        assert!(transport.shared.pending.is_empty());
    }

    #[tokio::test]
    async fn events_and_stale_replies_go_to_the_listener() {
        let (_transport, mut inbound, mut helper) = connect(Duration::from_secs(5));

        let payload = br#"{"event_id":3,"event_action":"updated","event":{"device":{}}}"#;
        let header = Header {
            version: API_VERSION,
            flags: 0,
            event_id: 3,
            request_id: 0,
            operation_id: 0,
            content_length: payload.len() as u32,
        };
        helper.write_all(&header.pack()).await.unwrap();
        helper.write_all(payload).await.unwrap();
        reply(&mut helper, 999, true, serde_json::json!({ "status": "ok" })).await;

        match inbound.recv().await.unwrap() {
            Inbound::Event { event_id, payload: p } => {
                assert_eq!(event_id, 3);
                assert_eq!(&p[..], &payload[..]);
            }
            other => panic!("unexpected {other:?}"),
        }
        match inbound.recv().await.unwrap() {
            Inbound::Error(err) => assert_eq!(err.kind(), ErrorKind::StaleRequest),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[tokio::test]
    async fn truncated_reply_is_a_decode_error_not_a_hang() {
        let (transport, mut inbound, mut helper) = connect(Duration::from_secs(5));

        let call = {
            let transport = transport.clone();
            tokio::spawn(async move { transport.execute(&tokens("adapter list")).await })
        };
        let (id, _) = read_request(&mut helper).await;

        let header = Header {
            version: API_VERSION,
            flags: 1,
            event_id: 0,
            request_id: id,
            operation_id: 0,
            content_length: 42,
        };
        helper.write_all(&header.pack()).await.unwrap();
        helper.write_all(&[b' '; 30]).await.unwrap();
        drop(helper);

        match inbound.recv().await.unwrap() {
            Inbound::Error(err) => {
                assert_eq!(err.kind(), ErrorKind::Decode);
                assert_eq!(err.message(), "truncated frame: expected 42 bytes, got 30");
            }
            other => panic!("unexpected {other:?}"),
        }

        let err = call.await.unwrap().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ConnectionClosed);
        assert!(transport.is_closed());
    }

    #[tokio::test]
    async fn closed_transport_rejects_commands() {
        let (transport, _inbound, _helper) = connect(Duration::from_secs(5));
        transport.close().await;

        let err = transport.execute(&tokens("adapter list")).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::SessionNotExist);
    }
}
