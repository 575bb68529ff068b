use std::{sync::Arc, time::Duration};

use chime_common::{ControllerSession, FrameSplitter, Link, SessionError};
use tokio::{
    io::{AsyncReadExt, AsyncWriteExt},
    net::{tcp::OwnedReadHalf, TcpStream},
    sync::{mpsc, Mutex},
    task::AbortHandle,
};
use tracing::{debug, warn};

pub type SharedSession = Arc<Mutex<ControllerSession<TcpLink>>>;

const READ_CHUNK_BYTES: usize = 256;

/// Opens the stream the device listens on. Any failure, including the
/// timeout, means there is no device to talk to.
pub async fn establish_link(addr: &str, timeout: Duration) -> Result<TcpStream, SessionError> {
    match tokio::time::timeout(timeout, TcpStream::connect(addr)).await {
        Ok(Ok(stream)) => Ok(stream),
        Ok(Err(err)) => Err(SessionError::NoDeviceFound(format!("{addr}: {err}"))),
        Err(_) => Err(SessionError::NoDeviceFound(format!(
            "{addr}: no answer within {}ms",
            timeout.as_millis()
        ))),
    }
}

/// A TCP stream standing in for the radio UART.
///
/// Writes go through a queue drained by a writer task; a reader task feeds
/// inbound frames to the session for as long as this link is the session's
/// current one.
pub struct TcpLink {
    id: u64,
    outbox: Option<mpsc::UnboundedSender<String>>,
    reader: AbortHandle,
}

impl TcpLink {
    pub fn open(
        id: u64,
        stream: TcpStream,
        session: SharedSession,
        max_frame_bytes: usize,
    ) -> Self {
        let (reader, mut writer) = stream.into_split();
        let (outbox, mut outgoing) = mpsc::unbounded_channel::<String>();

        tokio::spawn(async move {
            while let Some(frame) = outgoing.recv().await {
                if let Err(err) = writer.write_all(frame.as_bytes()).await {
                    warn!("device link {id} write error: {err}");
                    return;
                }
            }
            // Queue closed by forget(): everything queued before it is out.
            let _ = writer.shutdown().await;
        });

        let reader = tokio::spawn(receive_loop(id, reader, session, max_frame_bytes));

        Self {
            id,
            outbox: Some(outbox),
            reader: reader.abort_handle(),
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }
}

impl Link for TcpLink {
    fn send(&mut self, frame: &str) -> Result<(), SessionError> {
        let outbox = self
            .outbox
            .as_ref()
            .ok_or_else(|| SessionError::LinkLost("link already released".to_string()))?;
        outbox
            .send(frame.to_string())
            .map_err(|_| SessionError::LinkLost("device link writer stopped".to_string()))
    }

    fn forget(&mut self) {
        self.outbox = None;
        self.reader.abort();
    }
}

async fn receive_loop(
    id: u64,
    mut reader: OwnedReadHalf,
    session: SharedSession,
    max_frame_bytes: usize,
) {
    let mut splitter = FrameSplitter::new(max_frame_bytes);
    let mut chunk = [0u8; READ_CHUNK_BYTES];

    loop {
        let read = match reader.read(&mut chunk).await {
            Ok(0) => break,
            Ok(read) => read,
            Err(err) => {
                warn!("device link {id} read error: {err}");
                break;
            }
        };

        let frames = splitter.push(&chunk[..read]);
        let mut session = session.lock().await;
        if !is_current(&session, id) {
            debug!("device link {id} is not current, dropping {} frames", frames.len());
            continue;
        }
        for frame in frames {
            match frame.and_then(|frame| session.handle_frame(&frame)) {
                Ok(()) => {}
                Err(err) => debug!("device link {id} dropping frame: {err}"),
            }
        }
    }

    let mut session = session.lock().await;
    if is_current(&session, id) {
        warn!("device link {id} lost");
        session.link_lost();
    }
}

fn is_current(session: &ControllerSession<TcpLink>, id: u64) -> bool {
    session.link().map(TcpLink::id) == Some(id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;

    #[tokio::test]
    async fn refused_connection_means_no_device() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();
        drop(listener);

        let result = establish_link(&addr, Duration::from_millis(500)).await;

        assert!(matches!(result, Err(SessionError::NoDeviceFound(_))));
    }

    #[tokio::test]
    async fn frames_reach_the_device_and_replies_reach_the_mirror() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();
        let session: SharedSession = Arc::new(Mutex::new(ControllerSession::new()));

        let stream = establish_link(&addr, Duration::from_secs(1)).await.unwrap();
        let (mut device, _) = listener.accept().await.unwrap();
        let link = TcpLink::open(1, stream, session.clone(), 64);
        let now = chime_common::Time::new(10, 29, 0).unwrap();
        session.lock().await.connect(link, now).unwrap();

        let expected = b"c,s:10-29-0,";
        let mut received = vec![0u8; expected.len()];
        device.read_exact(&mut received).await.unwrap();
        assert_eq!(&received, expected);

        device.write_all(b"s1:10-29-0,m:1,").await.unwrap();
        let mut mirrored = None;
        for _ in 0..50 {
            mirrored = session.lock().await.mirror();
            if mirrored.is_some_and(|mirror| mirror.playing) {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        let mirror = mirrored.unwrap();
        assert_eq!(mirror.time, Some(now));
        assert!(mirror.playing);

        drop(device);
        for _ in 0..50 {
            if !session.lock().await.is_connected() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert!(!session.lock().await.is_connected());
    }
}
