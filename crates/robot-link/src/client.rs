//! TCP client for the controller's variable interface

use crate::protocol::{Reply, ReplyFramer, set_var, show_var};
use fourcell_core::{CellError, Result, RobotConfig};
use std::future::Future;
use std::io;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::{sleep, timeout};
use tracing::{debug, error, info, warn};

/// Run `attempt` up to `max_attempts` times, `delay` apart.
///
/// The attempt number (1-based) is passed in. Exhaustion yields
/// [`CellError::RetriesExhausted`].
pub async fn retry_connect<T, F, Fut>(
    address: &str,
    max_attempts: u32,
    delay: Duration,
    mut attempt: F,
) -> Result<T>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T>>,
{
    for n in 1..=max_attempts {
        match attempt(n).await {
            Ok(value) => {
                info!("Successfully connected to {}", address);
                return Ok(value);
            }
            Err(e) => {
                warn!("Connection attempt {}/{} failed: {}", n, max_attempts, e);
                if n < max_attempts {
                    info!("Retrying in {:?}", delay);
                    sleep(delay).await;
                }
            }
        }
    }

    error!("Maximum retries reached ({})", max_attempts);
    Err(CellError::RetriesExhausted {
        address: address.to_string(),
        attempts: max_attempts,
    })
}

/// Bound one connection attempt so a host that drops packets fails fast
pub async fn bounded_connect<T, Fut>(address: &str, limit: Duration, connect: Fut) -> Result<T>
where
    Fut: Future<Output = io::Result<T>>,
{
    timeout(limit, connect)
        .await
        .map_err(|_| CellError::IpcError(format!("Connection timeout to {}", address)))?
        .map_err(|e| CellError::IpcError(format!("Failed to connect to {}: {}", address, e)))
}

/// One session with the controller
pub struct EkiClient {
    address: String,
    stream: Option<TcpStream>,
    framer: ReplyFramer,
    connect_timeout: Duration,
    read_timeout: Duration,
    max_retries: u32,
    retry_delay: Duration,
}

impl EkiClient {
    pub fn new(config: &RobotConfig) -> Self {
        Self {
            address: config.address(),
            stream: None,
            framer: ReplyFramer::new(config.max_reply_bytes),
            connect_timeout: config.connect_timeout(),
            read_timeout: config.read_timeout(),
            max_retries: config.max_retries,
            retry_delay: config.retry_delay(),
        }
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    pub fn is_connected(&self) -> bool {
        self.stream.is_some()
    }

    /// Single connection attempt
    pub async fn connect(&mut self) -> Result<()> {
        self.close().await;
        let address = self.address.as_str();
        let stream =
            bounded_connect(address, self.connect_timeout, TcpStream::connect(address)).await?;
        info!("Connected to interface at {}", self.address);
        self.stream = Some(stream);
        Ok(())
    }

    /// Connect under the configured retry policy
    pub async fn connect_with_retry(&mut self) -> Result<()> {
        self.close().await;
        let address = self.address.as_str();
        let limit = self.connect_timeout;
        let stream = retry_connect(address, self.max_retries, self.retry_delay, move |_| {
            bounded_connect(address, limit, TcpStream::connect(address))
        })
        .await?;
        self.stream = Some(stream);
        Ok(())
    }

    /// Shut the socket down; safe to call when not connected
    pub async fn close(&mut self) {
        self.framer.clear();
        if let Some(mut stream) = self.stream.take() {
            let _ = stream.shutdown().await;
            info!("Connection to {} closed", self.address);
        }
    }

    /// `ShowVar` request
    pub async fn read_variable(&mut self, name: &str) -> Result<Reply> {
        let reply = self.request(&show_var(name)).await?;
        debug!("[READ VARIABLE] {} -> {:?}", name, reply.fields());
        Ok(reply)
    }

    /// `SetVar` request
    pub async fn write_variable(&mut self, name: &str, value: &str) -> Result<Reply> {
        let reply = self.request(&set_var(name, value)).await?;
        debug!("[WRITE VARIABLE] {}={} -> {:?}", name, value, reply.fields());
        Ok(reply)
    }

    /// Send one request and wait for its reply; any failure closes the session
    async fn request(&mut self, xml: &str) -> Result<Reply> {
        match self.exchange(xml).await {
            Ok(reply) => Ok(reply),
            Err(e) => {
                self.close().await;
                Err(e)
            }
        }
    }

    async fn exchange(&mut self, xml: &str) -> Result<Reply> {
        let stream = self
            .stream
            .as_mut()
            .ok_or_else(|| CellError::IpcError("not connected".into()))?;

        stream
            .write_all(xml.as_bytes())
            .await
            .map_err(|e| CellError::IpcError(format!("send failed: {}", e)))?;

        let mut chunk = [0u8; 1024];
        loop {
            if let Some(reply) = self.framer.next_reply()? {
                return Ok(reply);
            }

            let n = timeout(self.read_timeout, stream.read(&mut chunk))
                .await
                .map_err(|_| {
                    CellError::IpcError(format!("no reply within {:?}", self.read_timeout))
                })?
                .map_err(|e| CellError::IpcError(format!("receive failed: {}", e)))?;

            if n == 0 {
                return Err(CellError::IpcError("connection closed by controller".into()));
            }
            self.framer.push(&chunk[..n]);
        }
    }
}
