//! # Info Query Responder
//!
//! A minimal stand-in for a SA-MP game server that only answers the info
//! (`'i'`) query. It lets the monitor be exercised locally without a real
//! server, and backs the integration tests.
//!
//! The responder can be slowed down with [`Responder::with_delay`] to model
//! high-latency servers, or told to send fixed bytes with
//! [`Responder::with_raw_reply`] to model broken ones. Datagrams without the
//! magic or with any other opcode are dropped silently.
//!
//! ```rust,no_run
//! use responder::Responder;
//! use shared::InfoReply;
//!
//! #[tokio::main]
//! async fn main() -> std::io::Result<()> {
//!     let info = InfoReply::new("Local Test Server", 3, 50);
//!     let responder = Responder::bind("127.0.0.1:7777", info).await?;
//!     responder.run().await
//! }
//! ```

use log::{debug, error, info, warn};
use shared::{encode_info_reply, InfoReply, QueryHeader, MAX_DATAGRAM, OPCODE_INFO};
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::UdpSocket;
use tokio::task::JoinHandle;

pub struct Responder {
    socket: Arc<UdpSocket>,
    info: InfoReply,
    delay: Option<Duration>,
    raw_reply: Option<Vec<u8>>,
}

impl Responder {
    pub async fn bind(addr: &str, info: InfoReply) -> io::Result<Self> {
        let socket = Arc::new(UdpSocket::bind(addr).await?);
        info!("Responder listening on {}", socket.local_addr()?);

        Ok(Responder {
            socket,
            info,
            delay: None,
            raw_reply: None,
        })
    }

    /// Waits this long before answering each query.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Answers every valid query with these bytes instead of an encoded reply.
    pub fn with_raw_reply(mut self, datagram: Vec<u8>) -> Self {
        self.raw_reply = Some(datagram);
        self
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.socket.local_addr()
    }

    /// Builds the answer for one incoming datagram, or `None` to ignore it.
    pub fn reply_for(&self, datagram: &[u8]) -> Option<Vec<u8>> {
        let request = match QueryHeader::decode(datagram) {
            Ok(request) if request.has_magic() => request,
            _ => {
                debug!("Ignoring {} byte datagram without query header", datagram.len());
                return None;
            }
        };

        if request.opcode != OPCODE_INFO {
            debug!("Ignoring unsupported opcode {:#04x}", request.opcode);
            return None;
        }

        if let Some(raw) = &self.raw_reply {
            return Some(raw.clone());
        }

        match encode_info_reply(&request, &self.info) {
            Ok(reply) => Some(reply),
            Err(e) => {
                error!("Failed to encode info reply: {}", e);
                None
            }
        }
    }

    /// Answers queries forever. Receive errors are logged and retried.
    pub async fn run(self) -> io::Result<()> {
        let mut buffer = [0u8; MAX_DATAGRAM];

        loop {
            let (len, addr) = match self.socket.recv_from(&mut buffer).await {
                Ok(received) => received,
                Err(e) => {
                    warn!("Error receiving query: {}", e);
                    tokio::time::sleep(Duration::from_millis(10)).await;
                    continue;
                }
            };

            let Some(reply) = self.reply_for(&buffer[..len]) else {
                continue;
            };

            match self.delay {
                Some(delay) => {
                    let socket = Arc::clone(&self.socket);
                    tokio::spawn(async move {
                        tokio::time::sleep(delay).await;
                        if let Err(e) = socket.send_to(&reply, addr).await {
                            error!("Failed to send delayed reply to {}: {}", addr, e);
                        }
                    });
                }
                None => {
                    if let Err(e) = self.socket.send_to(&reply, addr).await {
                        error!("Failed to send reply to {}: {}", addr, e);
                    }
                }
            }
        }
    }

    /// Runs the responder on a background task.
    pub fn spawn(self) -> JoinHandle<io::Result<()>> {
        tokio::spawn(self.run())
    }
}
