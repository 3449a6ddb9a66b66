use std::fmt;
use std::io;
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tokio::time;
use tracing::{debug, warn};

use crate::decode::{decode, decode_single, decode_status};
use crate::error::{ApiError, ApiResult};
use crate::scanner::DEFAULT_PORT;
use crate::types::{CommandEnvelope, Device, MinerConfig, Pool, Summary, Version};

pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(2);
pub const DEFAULT_READ_TIMEOUT: Duration = Duration::from_secs(5);

/// Where a miner's API listens. Holds no connection.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct MinerEndpoint {
    pub host: String,
    pub port: u16,
}

impl MinerEndpoint {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }
}

impl fmt::Display for MinerEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.host.contains(':') {
            write!(f, "[{}]:{}", self.host, self.port)
        } else {
            write!(f, "{}:{}", self.host, self.port)
        }
    }
}

#[derive(Clone, Copy, Debug)]
pub struct ClientOptions {
    pub connect_timeout: Duration,
    /// Upper bound on waiting for the whole NUL-terminated reply.
    pub read_timeout: Duration,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            read_timeout: DEFAULT_READ_TIMEOUT,
        }
    }
}

/// Client for the cgminer-style JSON API.
///
/// Every method opens its own TCP connection, writes one command object, reads
/// the reply up to the terminating `\0` (or EOF) and closes the connection.
#[derive(Clone, Debug)]
pub struct MinerClient {
    endpoint: MinerEndpoint,
    options: ClientOptions,
}

impl MinerClient {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self::with_options(MinerEndpoint::new(host, port), ClientOptions::default())
    }

    /// Client for `host` on the default API port.
    pub fn for_host(host: impl Into<String>) -> Self {
        Self::new(host, DEFAULT_PORT)
    }

    pub fn with_options(endpoint: MinerEndpoint, options: ClientOptions) -> Self {
        Self { endpoint, options }
    }

    pub fn endpoint(&self) -> &MinerEndpoint {
        &self.endpoint
    }

    pub async fn summary(&self) -> ApiResult<Summary> {
        let raw = self.raw("summary", None).await?;
        decode_single(&raw, "SUMMARY")
    }

    pub async fn devices(&self) -> ApiResult<Vec<Device>> {
        let raw = self.raw("devs", None).await?;
        Ok(decode(&raw, "DEVS")?.payload)
    }

    pub async fn pools(&self) -> ApiResult<Vec<Pool>> {
        let raw = self.raw("pools", None).await?;
        Ok(decode(&raw, "POOLS")?.payload)
    }

    pub async fn config(&self) -> ApiResult<MinerConfig> {
        let raw = self.raw("config", None).await?;
        decode_single(&raw, "CONFIG")
    }

    pub async fn version(&self) -> ApiResult<Version> {
        let raw = self.raw("version", None).await?;
        decode_single(&raw, "VERSION")
    }

    /// Add a pool. The parameter is sent as `url,user,pass` without escaping,
    /// so none of the three may contain a comma.
    ///
    /// On [`ApiError::Rejected`] or [`ApiError::Decode`] the pool may still have
    /// been added; check with [`MinerClient::pools`] before retrying.
    pub async fn add_pool(&self, url: &str, user: &str, pass: &str) -> ApiResult<()> {
        let parameter = format!("{url},{user},{pass}");
        let raw = self.raw("addpool", Some(&parameter)).await?;
        let res = decode_status(&raw).and_then(|env| env.ensure_success());
        if let Err(e) = &res {
            warn!(endpoint = %self.endpoint, %url, error = %e, "addpool failed, remote pool list unknown");
        }
        res
    }

    pub async fn enable_pool(&self, id: i64) -> ApiResult<()> {
        self.pool_command("enablepool", id).await
    }

    pub async fn disable_pool(&self, id: i64) -> ApiResult<()> {
        self.pool_command("disablepool", id).await
    }

    pub async fn remove_pool(&self, id: i64) -> ApiResult<()> {
        self.pool_command("removepool", id).await
    }

    pub async fn switch_pool(&self, id: i64) -> ApiResult<()> {
        self.pool_command("switchpool", id).await
    }

    pub async fn restart(&self) -> ApiResult<()> {
        self.raw("restart", None).await.map(|_| ())
    }

    pub async fn quit(&self) -> ApiResult<()> {
        self.raw("quit", None).await.map(|_| ())
    }

    async fn pool_command(&self, command: &str, id: i64) -> ApiResult<()> {
        self.raw(command, Some(&id.to_string())).await.map(|_| ())
    }

    /// Send one command and return the reply bytes without the trailing `\0`.
    /// An empty `parameter` is left out of the request, like `None`.
    pub async fn raw(&self, command: &str, parameter: Option<&str>) -> ApiResult<Vec<u8>> {
        let request = CommandEnvelope {
            command: command.to_string(),
            parameter: parameter.filter(|p| !p.is_empty()).map(str::to_string),
        };
        self.round_trip(&request).await
    }

    async fn round_trip(&self, request: &CommandEnvelope) -> ApiResult<Vec<u8>> {
        let endpoint = self.endpoint.to_string();
        let body = serde_json::to_vec(request).map_err(ApiError::Encode)?;

        let connect = TcpStream::connect((self.endpoint.host.as_str(), self.endpoint.port));
        let mut stream = match time::timeout(self.options.connect_timeout, connect).await {
            Ok(Ok(s)) => s,
            Ok(Err(source)) => return Err(ApiError::Connect { endpoint, source }),
            Err(_) => {
                return Err(ApiError::Connect {
                    endpoint,
                    source: io::Error::new(io::ErrorKind::TimedOut, "connect timed out"),
                })
            }
        };

        let io_err = |source| ApiError::Io {
            endpoint: endpoint.clone(),
            source,
        };
        stream.write_all(&body).await.map_err(io_err)?;

        let mut reply = Vec::new();
        let mut reader = BufReader::new(&mut stream);
        match time::timeout(self.options.read_timeout, reader.read_until(0, &mut reply)).await {
            Ok(res) => {
                res.map_err(io_err)?;
            }
            Err(_) => {
                return Err(ApiError::Timeout {
                    endpoint: endpoint.clone(),
                    millis: self.options.read_timeout.as_millis(),
                })
            }
        }
        if reply.last() == Some(&0) {
            reply.pop();
        }
        debug!(%endpoint, command = %request.command, bytes = reply.len(), "reply received");
        Ok(reply)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoint_display() {
        assert_eq!(MinerEndpoint::new("10.0.0.5", 4028).to_string(), "10.0.0.5:4028");
        assert_eq!(MinerEndpoint::new("fe80::1", 4028).to_string(), "[fe80::1]:4028");
        assert_eq!(MinerClient::for_host("10.0.0.5").endpoint().port, DEFAULT_PORT);
    }
}
