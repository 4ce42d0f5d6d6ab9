// Socket channel adapter for the backend auction namespace.
//
// One adapter owns at most one live WebSocket connection. The connection is
// created lazily by `connect()`, which spawns a background task that dials
// the namespace, forwards decoded server frames as [`ChannelEvent`]s over a
// bounded mpsc channel, and drains outbound intents from a [`ChannelHandle`].
// Transport drops are retried inside the task with capped exponential
// backoff; `Connected`/`Disconnected` transitions are reported so the state
// machine can re-join. Connection errors are logged only; the user-facing
// error path is the server's own `error` frame.

use futures_util::stream::{SplitStream, Stream};
use futures_util::{SinkExt, StreamExt};
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, info, warn};

use crate::protocol::{decode_frame, encode_intent, Intent, ServerEvent};

const OUTBOUND_CAPACITY: usize = 64;
const INITIAL_BACKOFF: Duration = Duration::from_secs(1);
const MAX_BACKOFF: Duration = Duration::from_secs(30);

/// Events delivered from the adapter to the state machine, in transport
/// arrival order.
#[derive(Debug, Clone, PartialEq)]
pub enum ChannelEvent {
    Connected,
    Disconnected,
    Event(ServerEvent),
}

/// Cloneable sender half for outbound intents.
///
/// Constructed by [`AuctionChannel::connect`], or directly from any mpsc
/// sender in tests so controllers can be exercised without a socket.
#[derive(Debug, Clone)]
pub struct ChannelHandle {
    tx: mpsc::Sender<Intent>,
}

impl ChannelHandle {
    pub fn new(tx: mpsc::Sender<Intent>) -> Self {
        ChannelHandle { tx }
    }

    /// Queue an intent for the socket task. A closed or full queue drops
    /// the intent with a warning; intents are never retried.
    pub async fn send(&self, intent: Intent) {
        if self.tx.send(intent).await.is_err() {
            warn!("channel task gone, intent dropped");
        }
    }
}

struct ChannelRuntime {
    handle: ChannelHandle,
    task: JoinHandle<()>,
}

/// Lazily-connected manager for the auction namespace. Injected into the
/// composition root rather than living in a global so tests can substitute
/// the handle/receiver pair.
pub struct AuctionChannel {
    url: String,
    event_capacity: usize,
    runtime: Option<ChannelRuntime>,
}

impl AuctionChannel {
    pub fn new(url: impl Into<String>, event_capacity: usize) -> Self {
        AuctionChannel {
            url: url.into(),
            event_capacity: event_capacity.max(1),
            runtime: None,
        }
    }

    /// Spawn the connection task and return the intent handle plus the
    /// inbound event stream. Any previous connection is torn down first;
    /// the adapter maintains at most one live connection.
    pub fn connect(&mut self) -> (ChannelHandle, mpsc::Receiver<ChannelEvent>) {
        self.disconnect();

        let (out_tx, out_rx) = mpsc::channel(OUTBOUND_CAPACITY);
        let (event_tx, event_rx) = mpsc::channel(self.event_capacity);
        let url = self.url.clone();
        let task = tokio::spawn(run_connection(url, out_rx, event_tx));

        let handle = ChannelHandle::new(out_tx);
        self.runtime = Some(ChannelRuntime {
            handle: handle.clone(),
            task,
        });
        (handle, event_rx)
    }

    pub fn handle(&self) -> Option<ChannelHandle> {
        self.runtime.as_ref().map(|r| r.handle.clone())
    }

    /// Whether a connection task is live. Socket-level connected state is
    /// reported through `ChannelEvent`s, not here.
    pub fn is_running(&self) -> bool {
        self.runtime.is_some()
    }

    /// Tear down the connection task so a later `connect()` starts fresh.
    pub fn disconnect(&mut self) {
        if let Some(runtime) = self.runtime.take() {
            info!("disconnecting auction channel");
            runtime.task.abort();
        }
    }
}

impl Drop for AuctionChannel {
    fn drop(&mut self) {
        self.disconnect();
    }
}

/// Why a drive loop ended.
#[derive(Debug, PartialEq, Eq)]
enum DriveEnd {
    /// Transport dropped; reconnect.
    Transport,
    /// The event receiver or every intent sender is gone; stop for good.
    Consumer,
}

async fn run_connection(
    url: String,
    mut out_rx: mpsc::Receiver<Intent>,
    event_tx: mpsc::Sender<ChannelEvent>,
) {
    let mut backoff = INITIAL_BACKOFF;
    loop {
        match connect_async(url.as_str()).await {
            Ok((stream, _response)) => {
                info!("connected to auction namespace at {url}");
                backoff = INITIAL_BACKOFF;
                if event_tx.send(ChannelEvent::Connected).await.is_err() {
                    return;
                }
                let end = drive(stream, &mut out_rx, &event_tx).await;
                if event_tx.send(ChannelEvent::Disconnected).await.is_err()
                    || end == DriveEnd::Consumer
                {
                    return;
                }
            }
            Err(e) => {
                warn!("connection to {url} failed: {e}");
            }
        }
        tokio::time::sleep(backoff).await;
        backoff = (backoff * 2).min(MAX_BACKOFF);
    }
}

/// Pump one live connection: decoded server frames out, queued intents in.
async fn drive(
    stream: WebSocketStream<MaybeTlsStream<tokio::net::TcpStream>>,
    out_rx: &mut mpsc::Receiver<Intent>,
    event_tx: &mpsc::Sender<ChannelEvent>,
) -> DriveEnd {
    let (mut write, mut read) = stream.split();

    loop {
        tokio::select! {
            frame = read.next() => {
                match frame {
                    Some(Ok(Message::Text(text))) => {
                        match decode_frame(&text) {
                            Some(event) => {
                                if event_tx.send(ChannelEvent::Event(event)).await.is_err() {
                                    return DriveEnd::Consumer;
                                }
                            }
                            None => warn!("dropping unrecognized frame: {text}"),
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => {
                        info!("server closed the connection");
                        return DriveEnd::Transport;
                    }
                    Some(Err(e)) => {
                        warn!("socket error: {e}");
                        return DriveEnd::Transport;
                    }
                    Some(Ok(_)) => {
                        // Binary, Ping, Pong, Frame: nothing to do.
                    }
                }
            }
            intent = out_rx.recv() => {
                match intent {
                    Some(intent) => {
                        let frame = encode_intent(&intent);
                        debug!("sending intent frame: {frame}");
                        if let Err(e) = write.send(Message::Text(frame.into())).await {
                            warn!("failed to send intent: {e}");
                            return DriveEnd::Transport;
                        }
                    }
                    None => return DriveEnd::Consumer,
                }
            }
        }
    }
}

/// Forward decoded frames from a read half until it ends. Split out from
/// [`drive`] in the same shape so the inbound path can be unit tested with
/// in-memory streams.
pub async fn forward_frames<S>(
    mut read: SplitStream<WebSocketStream<S>>,
    event_tx: &mpsc::Sender<ChannelEvent>,
) -> Result<(), ()>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    while let Some(frame) = read.next().await {
        if forward_one(frame, event_tx).await.is_err() {
            return Err(());
        }
    }
    Ok(())
}

/// Pure-logic inbound pump over any frame stream; the primary unit-test
/// target, mirroring what [`drive`] does on its read arm.
pub async fn forward_frame_stream<St>(
    mut stream: St,
    event_tx: &mpsc::Sender<ChannelEvent>,
) -> Result<(), ()>
where
    St: Stream<Item = Result<Message, tokio_tungstenite::tungstenite::Error>> + Unpin,
{
    while let Some(frame) = stream.next().await {
        match &frame {
            Ok(Message::Close(_)) | Err(_) => {
                forward_one(frame, event_tx).await?;
                break;
            }
            _ => forward_one(frame, event_tx).await?,
        }
    }
    Ok(())
}

async fn forward_one(
    frame: Result<Message, tokio_tungstenite::tungstenite::Error>,
    event_tx: &mpsc::Sender<ChannelEvent>,
) -> Result<(), ()> {
    match frame {
        Ok(Message::Text(text)) => match decode_frame(&text) {
            Some(event) => event_tx
                .send(ChannelEvent::Event(event))
                .await
                .map_err(|_| ()),
            None => {
                warn!("dropping unrecognized frame: {text}");
                Ok(())
            }
        },
        Ok(Message::Close(_)) => {
            info!("server closed the connection");
            Ok(())
        }
        Err(e) => {
            warn!("socket error: {e}");
            Ok(())
        }
        Ok(_) => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures_util::stream;
    use tokio_tungstenite::tungstenite::Error as WsError;

    fn mock_stream(
        frames: Vec<Result<Message, WsError>>,
    ) -> impl Stream<Item = Result<Message, WsError>> + Unpin {
        stream::iter(frames)
    }

    #[tokio::test]
    async fn decoded_frames_are_forwarded_in_order() {
        let (tx, mut rx) = mpsc::channel(16);
        let frames = vec![
            Ok(Message::Text(r#"{"event":"viewerCount","data":1}"#.into())),
            Ok(Message::Text(r#"{"event":"viewerCount","data":2}"#.into())),
        ];

        forward_frame_stream(mock_stream(frames), &tx).await.unwrap();

        assert_eq!(
            rx.recv().await.unwrap(),
            ChannelEvent::Event(ServerEvent::ViewerCount(1))
        );
        assert_eq!(
            rx.recv().await.unwrap(),
            ChannelEvent::Event(ServerEvent::ViewerCount(2))
        );
    }

    #[tokio::test]
    async fn unrecognized_frames_are_dropped_silently() {
        let (tx, mut rx) = mpsc::channel(16);
        let frames = vec![
            Ok(Message::Text("garbage".into())),
            Ok(Message::Text(r#"{"event":"confetti"}"#.into())),
            Ok(Message::Text(r#"{"event":"unsold"}"#.into())),
        ];

        forward_frame_stream(mock_stream(frames), &tx).await.unwrap();

        assert_eq!(
            rx.recv().await.unwrap(),
            ChannelEvent::Event(ServerEvent::Unsold)
        );
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn close_frame_stops_the_pump() {
        let (tx, mut rx) = mpsc::channel(16);
        let frames = vec![
            Ok(Message::Close(None)),
            Ok(Message::Text(r#"{"event":"viewerCount","data":9}"#.into())),
        ];

        forward_frame_stream(mock_stream(frames), &tx).await.unwrap();
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn ping_and_binary_frames_are_ignored() {
        let (tx, mut rx) = mpsc::channel(16);
        let frames = vec![
            Ok(Message::Ping(vec![].into())),
            Ok(Message::Binary(vec![1, 2].into())),
            Ok(Message::Text(r#"{"event":"viewerCount","data":7}"#.into())),
        ];

        forward_frame_stream(mock_stream(frames), &tx).await.unwrap();
        assert_eq!(
            rx.recv().await.unwrap(),
            ChannelEvent::Event(ServerEvent::ViewerCount(7))
        );
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn dropped_receiver_ends_the_pump_with_error() {
        let (tx, rx) = mpsc::channel(16);
        drop(rx);
        let frames = vec![Ok(Message::Text(
            r#"{"event":"viewerCount","data":1}"#.into(),
        ))];

        let result = forward_frame_stream(mock_stream(frames), &tx).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn handle_send_after_disconnect_is_a_noop() {
        let (tx, rx) = mpsc::channel(1);
        drop(rx);
        let handle = ChannelHandle::new(tx);
        // Must not panic or hang.
        handle
            .send(Intent::Join(crate::protocol::JoinPayload {
                tournament_id: "T1".into(),
                user_id: None,
            }))
            .await;
    }
}
