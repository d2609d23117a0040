//! Neighbor sessions and the serve loop. Each neighbor gets one
//! sequenced-packet UNIX socket connected at startup; reader tasks
//! forward whole datagrams into a channel and a single loop drives the
//! dispatcher, so every table mutation happens serially.

use std::collections::HashMap;
use std::io;
use std::os::unix::net::UnixStream as StdUnixStream;

use log::{error, info, trace, warn};
use socket2::{Domain, SockAddr, Socket, Type};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::unix::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::UnixStream;
use tokio::sync::mpsc;

use crate::config::RouterConfig;
use crate::handler::Dispatcher;

/// Largest datagram a neighbor may send; one JSON message per packet
const MAX_DATAGRAM: usize = 65536;

#[derive(Debug)]
pub enum SessionUpdate {
    /// One whole datagram received from a neighbor
    Message(String, Vec<u8>),
    /// Neighbor closed its end of the session
    Closed(String),
    /// Transport failure; the serve loop shuts down
    Failed(String, io::Error),
}

fn connect(path: &str) -> io::Result<UnixStream> {
    let socket = Socket::new(Domain::UNIX, Type::SEQPACKET, None)?;
    socket.connect(&SockAddr::unix(path)?)?;
    socket.set_nonblocking(true)?;
    UnixStream::from_std(StdUnixStream::from(socket))
}

async fn read_loop(
    addr: String,
    mut reader: OwnedReadHalf,
    tx: mpsc::UnboundedSender<SessionUpdate>,
) {
    let mut buf = vec![0u8; MAX_DATAGRAM];
    loop {
        match reader.read(&mut buf).await {
            Ok(0) => {
                let _ = tx.send(SessionUpdate::Closed(addr));
                return;
            }
            Ok(len) => {
                trace!("Read {} bytes from {}", len, addr);
                let message = SessionUpdate::Message(addr.clone(), buf[..len].to_vec());
                if tx.send(message).is_err() {
                    return;
                }
            }
            Err(err) => {
                let _ = tx.send(SessionUpdate::Failed(addr, err));
                return;
            }
        }
    }
}

/// Connect every neighbor session and run the router until all
/// neighbors hang up
pub async fn serve(config: RouterConfig) -> io::Result<()> {
    let mut dispatcher = Dispatcher::new(config.clone());
    let (tx, mut rx) = mpsc::unbounded_channel();
    let mut writers: HashMap<String, OwnedWriteHalf> =
        HashMap::with_capacity(config.neighbors.len());

    for neighbor in &config.neighbors {
        let stream = connect(&neighbor.addr)?;
        let (reader, writer) = stream.into_split();
        writers.insert(neighbor.addr.clone(), writer);
        tokio::spawn(read_loop(neighbor.addr.clone(), reader, tx.clone()));
        info!("Session open to {}", neighbor);
    }
    drop(tx);

    let mut open_sessions = writers.len();
    while open_sessions > 0 {
        match rx.recv().await {
            Some(SessionUpdate::Message(addr, bytes)) => {
                match dispatcher.handle_raw(&addr, &bytes) {
                    Ok(outbound) => {
                        for (dest, envelope) in outbound {
                            let bytes = serde_json::to_vec(&envelope)?;
                            match writers.get_mut(&dest) {
                                Some(writer) => writer.write_all(&bytes).await?,
                                None => warn!("No session for {}", dest),
                            }
                        }
                    }
                    // Bad input is logged and dropped; the session stays up
                    Err(err) => warn!("Discarding message from {}: {}", addr, err),
                }
            }
            Some(SessionUpdate::Closed(addr)) => {
                open_sessions -= 1;
                info!("Session to {} closed ({} remaining)", addr, open_sessions);
            }
            Some(SessionUpdate::Failed(addr, err)) => {
                error!("Transport failure on session to {}: {}", addr, err);
                return Err(err);
            }
            None => break,
        }
    }
    Ok(())
}
