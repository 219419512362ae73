use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::{lookup_host, TcpStream};
use tokio::time::timeout;
use tokio_rustls::rustls::pki_types::ServerName;
use tokio_rustls::TlsConnector;

use crate::cli::config::MirrorConfig;
use crate::error::{MirrorError, MirrorResult};
use crate::transport::parser::{
    build_request, find_head_end, parse_head, ResponseHead, MAX_HEAD_LEN,
};
use crate::transport::response::{Response, ResponseStatus};
use crate::transport::tls::{build_connector, handshake_error};
use crate::urls::UrlHandler;
use crate::utils::logging::{LogLevel, Logger};

/// Deadline for connecting and for every single read or write
pub const IO_TIMEOUT: Duration = Duration::from_secs(10);

const READ_CHUNK: usize = 8192;

/// One-shot HTTP/1.0 client over plain TCP or TLS
///
/// Every request opens a fresh connection. Failures never escape `get`;
/// they come back as a `Response` whose status says what went wrong.
pub struct HttpsClient {
    /// Shared run configuration, read for cookies and user agent
    config: Arc<MirrorConfig>,

    /// Crawl root, used to classify redirect targets
    root: UrlHandler,

    /// TLS client configuration with the run's trust store
    connector: TlsConnector,

    logger: Arc<dyn Logger>,

    io_timeout: Duration,
}

impl HttpsClient {
    /// Create a client; fails only if the trust store cannot be built
    pub fn new(
        config: Arc<MirrorConfig>,
        root: UrlHandler,
        logger: Arc<dyn Logger>,
    ) -> MirrorResult<Self> {
        let connector = build_connector(config.cert_store.as_deref(), logger.as_ref())?;

        Ok(Self {
            config,
            root,
            connector,
            logger,
            io_timeout: IO_TIMEOUT,
        })
    }

    /// Override the connect and read deadline
    pub fn with_timeout(mut self, io_timeout: Duration) -> Self {
        self.io_timeout = io_timeout;
        self
    }

    /// Fetch a single URL without following redirects
    pub async fn get(&self, url: &UrlHandler) -> Response {
        match self.fetch(url).await {
            Ok(response) => response,
            Err(e) => {
                self.logger.log(LogLevel::Verbose, &format!("GET {} failed: {}", url, e));
                Response::failed(e)
            }
        }
    }

    async fn fetch(&self, url: &UrlHandler) -> MirrorResult<Response> {
        let stream = self.connect(url).await?;
        let request = build_request(url, &self.config.cookies, &self.config.user_agent);

        self.logger.log(LogLevel::Verbose, &format!("GET {}", url));

        if url.is_https() {
            let host = bare_host(url.host());
            let server_name =
                ServerName::try_from(host.to_string()).map_err(|e| MirrorError::Connection {
                    host: host.to_string(),
                    reason: format!("invalid server name: {}", e),
                })?;

            let tls_stream = timeout(self.io_timeout, self.connector.connect(server_name, stream))
                .await
                .map_err(|_| MirrorError::Timeout {
                    host: url.domain().to_string(),
                })?
                .map_err(|e| handshake_error(url.domain(), e))?;

            self.exchange(tls_stream, url, request.as_bytes()).await
        } else {
            self.exchange(stream, url, request.as_bytes()).await
        }
    }

    /// Open a TCP connection to the first reachable address of the host
    async fn connect(&self, url: &UrlHandler) -> MirrorResult<TcpStream> {
        let host = bare_host(url.host());
        let port = url.effective_port();

        let addrs = timeout(self.io_timeout, lookup_host((host, port)))
            .await
            .map_err(|_| MirrorError::Timeout {
                host: url.domain().to_string(),
            })?
            .map_err(|e| MirrorError::Connection {
                host: url.domain().to_string(),
                reason: format!("name resolution failed: {}", e),
            })?;

        let mut last_error = None;
        for addr in addrs {
            match timeout(self.io_timeout, TcpStream::connect(addr)).await {
                Ok(Ok(stream)) => return Ok(stream),
                Ok(Err(e)) => {
                    last_error = Some(MirrorError::Connection {
                        host: url.domain().to_string(),
                        reason: e.to_string(),
                    })
                }
                Err(_) => {
                    last_error = Some(MirrorError::Timeout {
                        host: url.domain().to_string(),
                    })
                }
            }
        }

        Err(last_error.unwrap_or_else(|| MirrorError::Connection {
            host: url.domain().to_string(),
            reason: "no addresses resolved".to_string(),
        }))
    }

    /// Send the request and read the response off an open stream
    async fn exchange<S>(
        &self,
        mut stream: S,
        url: &UrlHandler,
        request: &[u8],
    ) -> MirrorResult<Response>
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        let host = url.domain();

        timeout(self.io_timeout, stream.write_all(request))
            .await
            .map_err(|_| MirrorError::Timeout { host: host.to_string() })?
            .map_err(|e| MirrorError::Connection {
                host: host.to_string(),
                reason: e.to_string(),
            })?;

        let mut buffer = Vec::with_capacity(READ_CHUNK);
        let mut chunk = [0u8; READ_CHUNK];

        let head_end = loop {
            if let Some(end) = find_head_end(&buffer) {
                break end;
            }

            if buffer.len() > MAX_HEAD_LEN {
                return Err(MirrorError::ServerProtocol {
                    host: host.to_string(),
                    reason: "header section too large".to_string(),
                });
            }

            let read = self.read_chunk(&mut stream, &mut chunk, host).await?;
            if read == 0 {
                return Err(MirrorError::ServerProtocol {
                    host: host.to_string(),
                    reason: "connection closed before end of headers".to_string(),
                });
            }
            buffer.extend_from_slice(&chunk[..read]);
        };

        let head = parse_head(&buffer[..head_end], host)?;
        let mut response = Response::new();
        self.apply_head(&mut response, &head, url)?;

        // The caller re-issues the request, the body is irrelevant
        if response.status == ResponseStatus::Moved {
            return Ok(response);
        }

        let mut body = buffer.split_off(head_end);
        loop {
            if let Some(length) = response.content_length {
                if body.len() >= length {
                    body.truncate(length);
                    break;
                }
            }

            let read = self.read_chunk(&mut stream, &mut chunk, host).await?;
            if read == 0 {
                break;
            }
            body.extend_from_slice(&chunk[..read]);
        }

        if let Some(length) = response.content_length {
            if body.len() < length {
                self.logger.log(
                    LogLevel::Verbose,
                    &format!("{}: body ended after {} of {} bytes", url, body.len(), length),
                );
            }
        }

        response.body = body;
        response.status = ResponseStatus::Finished;
        Ok(response)
    }

    /// Read once under the deadline; a missing TLS close_notify counts as end of stream
    async fn read_chunk<S>(
        &self,
        stream: &mut S,
        chunk: &mut [u8],
        host: &str,
    ) -> MirrorResult<usize>
    where
        S: AsyncRead + Unpin,
    {
        match timeout(self.io_timeout, stream.read(chunk)).await {
            Err(_) => Err(MirrorError::Timeout { host: host.to_string() }),
            Ok(Ok(read)) => Ok(read),
            Ok(Err(e)) if e.kind() == std::io::ErrorKind::UnexpectedEof => Ok(0),
            Ok(Err(e)) => Err(MirrorError::Connection {
                host: host.to_string(),
                reason: e.to_string(),
            }),
        }
    }

    /// Copy recognized headers into the response and resolve redirects
    fn apply_head(
        &self,
        response: &mut Response,
        head: &ResponseHead,
        url: &UrlHandler,
    ) -> MirrorResult<()> {
        response.status_code = head.status_code;
        self.logger.log(
            LogLevel::Verbose,
            &format!("{}: {} {}", url, head.status_code, head.reason),
        );

        if let Some(length) = head.header("Content-Length") {
            match length.parse::<usize>() {
                Ok(length) => response.content_length = Some(length),
                Err(_) => self.logger.log(
                    LogLevel::Verbose,
                    &format!("{}: ignoring Content-Length '{}'", url, length),
                ),
            }
        }

        if let Some(content_type) = head.header("Content-Type") {
            response.content_type = content_type.to_string();
        }

        if let Some(disposition) = head.header("Content-Disposition") {
            response.content_disposition = disposition.to_string();
        }

        if let Some(modified) = head.header("Last-Modified") {
            match DateTime::parse_from_rfc2822(modified) {
                Ok(date) => response.last_modified = Some(date.with_timezone(&Utc)),
                Err(_) => self.logger.log(
                    LogLevel::Verbose,
                    &format!("{}: ignoring Last-Modified '{}'", url, modified),
                ),
            }
        }

        if matches!(head.status_code, 301 | 302 | 303 | 307 | 308) {
            let location = head.header("Location").ok_or_else(|| MirrorError::ServerProtocol {
                host: url.domain().to_string(),
                reason: format!("{} without Location header", head.status_code),
            })?;

            response.set_moved_url(location, url, &self.root)?;
            response.status = ResponseStatus::Moved;
        }

        Ok(())
    }
}

/// Host without IPv6 brackets, as resolvers and SNI expect it
fn bare_host(host: &str) -> &str {
    host.trim_start_matches('[').trim_end_matches(']')
}
