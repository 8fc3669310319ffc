//! Single-endpoint status probe over the SA-MP query protocol

use log::debug;
use shared::{
    decode_info_reply, parse_host, InfoReply, ProtocolError, QueryHeader, StatusResult,
    MAX_DATAGRAM, QUERY_TIMEOUT,
};
use std::net::Ipv4Addr;
use std::time::Duration;
use thiserror::Error;
use tokio::net::UdpSocket;
use tokio::time::timeout;

/// Why an endpoint was judged offline
#[derive(Debug, Error)]
pub enum ProbeError {
    #[error("host {0:?} is not an IPv4 address")]
    InvalidHost(String),
    #[error("socket error: {0}")]
    Io(#[from] std::io::Error),
    #[error("no reply within {0:?}")]
    Timeout(Duration),
    #[error("malformed reply: {0}")]
    Malformed(#[from] ProtocolError),
}

/// Sends one info query and waits for one reply
///
/// Every probe uses its own ephemeral socket, connected to the target so that
/// stray datagrams from other hosts are filtered by the kernel. The socket is
/// dropped on every return path.
///
/// A server that answers from a different address than the one queried is
/// reported offline: only replies from the queried address count.
#[derive(Debug, Clone, Copy)]
pub struct StatusProbe {
    timeout: Duration,
}

impl Default for StatusProbe {
    fn default() -> Self {
        Self::new(QUERY_TIMEOUT)
    }
}

impl StatusProbe {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Probes `host:port`, folding every failure into an offline result.
    pub async fn query(&self, host: &str, port: u16) -> StatusResult {
        match self.try_query(host, port).await {
            Ok(reply) => StatusResult::from(reply),
            Err(e) => {
                debug!("{}:{} offline: {}", host, port, e);
                StatusResult::offline()
            }
        }
    }

    /// Probes `host:port` and reports exactly why it failed.
    pub async fn try_query(&self, host: &str, port: u16) -> Result<InfoReply, ProbeError> {
        let address =
            parse_host(host).ok_or_else(|| ProbeError::InvalidHost(host.to_string()))?;
        let request = QueryHeader::info(address, port).encode()?;

        let socket = UdpSocket::bind((Ipv4Addr::UNSPECIFIED, 0)).await?;
        socket.connect((address, port)).await?;
        socket.send(&request).await?;

        let mut buffer = [0u8; MAX_DATAGRAM];
        let len = timeout(self.timeout, socket.recv(&mut buffer))
            .await
            .map_err(|_| ProbeError::Timeout(self.timeout))??;

        Ok(decode_info_reply(&buffer[..len])?)
    }
}
