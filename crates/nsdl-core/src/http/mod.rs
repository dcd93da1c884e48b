//! Blocking HTTP transport.
//!
//! Uses the curl crate (libcurl easy interface) for both the signed-URL API
//! calls and the archive downloads. Stages depend on the `Transport` trait so
//! they can be driven by a fake in tests.

mod parse;
#[cfg(test)]
pub(crate) mod testing;

use crate::error::TransportError;
use std::cell::RefCell;
use std::io;
use std::str;
use std::time::Duration;

/// Status and entity headers of the final response (after redirects).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResponseHead {
    pub status: u32,
    /// Advertised body size, if `Content-Length` is present and numeric.
    pub content_length: Option<u64>,
    /// Raw `Content-Type` value, if present.
    pub content_type: Option<String>,
}

impl ResponseHead {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Lowercased media type without parameters (`application/x-tar`).
    pub fn mime_type(&self) -> Option<String> {
        self.content_type.as_deref().map(|v| {
            v.split(';')
                .next()
                .unwrap_or_default()
                .trim()
                .to_ascii_lowercase()
        })
    }
}

/// Fully buffered response of a small API call.
#[derive(Debug, Clone)]
pub struct ApiResponse {
    pub status: u32,
    pub body: Vec<u8>,
}

/// Destination for a streamed download body.
pub trait BodySink {
    /// Called once for a 2xx response, before the first body byte (or after the
    /// transfer when the body is empty). Non-2xx responses never reach the sink.
    fn open(&mut self, head: &ResponseHead) -> io::Result<()>;
    fn write(&mut self, chunk: &[u8]) -> io::Result<()>;
}

/// Network operations needed by the pipeline.
pub trait Transport {
    /// GET `url` with extra request headers and a total timeout; buffers the body.
    fn get(
        &self,
        url: &str,
        headers: &[(&str, &str)],
        timeout: Duration,
    ) -> Result<ApiResponse, TransportError>;

    /// GET `url` following redirects, streaming a 2xx body into `sink`.
    /// Returns the final response head whatever its status.
    fn download(&self, url: &str, sink: &mut dyn BodySink) -> Result<ResponseHead, TransportError>;
}

/// libcurl-backed transport. Runs in the current thread.
#[derive(Debug, Clone)]
pub struct CurlTransport {
    connect_timeout: Duration,
}

impl Default for CurlTransport {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(30),
        }
    }
}

impl CurlTransport {
    pub fn new() -> Self {
        Self::default()
    }
}

fn header_list(headers: &[(&str, &str)]) -> Result<curl::easy::List, curl::Error> {
    let mut list = curl::easy::List::new();
    for (k, v) in headers {
        list.append(&format!("{}: {}", k.trim(), v.trim()))?;
    }
    Ok(list)
}

#[derive(Default)]
struct SinkState {
    opened: bool,
    error: Option<io::Error>,
}

impl Transport for CurlTransport {
    fn get(
        &self,
        url: &str,
        headers: &[(&str, &str)],
        timeout: Duration,
    ) -> Result<ApiResponse, TransportError> {
        let mut body = Vec::new();

        let mut easy = curl::easy::Easy::new();
        easy.url(url)?;
        easy.follow_location(true)?;
        easy.connect_timeout(self.connect_timeout.min(timeout))?;
        easy.timeout(timeout)?;
        if !headers.is_empty() {
            easy.http_headers(header_list(headers)?)?;
        }

        {
            let mut transfer = easy.transfer();
            transfer.write_function(|data| {
                body.extend_from_slice(data);
                Ok(data.len())
            })?;
            transfer.perform()?;
        }

        let status = easy.response_code()?;
        Ok(ApiResponse { status, body })
    }

    fn download(&self, url: &str, sink: &mut dyn BodySink) -> Result<ResponseHead, TransportError> {
        let lines: RefCell<Vec<String>> = RefCell::new(Vec::new());
        let state: RefCell<SinkState> = RefCell::new(SinkState::default());

        let mut easy = curl::easy::Easy::new();
        easy.url(url)?;
        easy.follow_location(true)?;
        easy.max_redirections(10)?;
        easy.connect_timeout(self.connect_timeout)?;

        let performed = {
            let mut transfer = easy.transfer();
            transfer.header_function(|data| {
                if let Ok(s) = str::from_utf8(data) {
                    let line = s.trim_end();
                    let mut lines = lines.borrow_mut();
                    // New status line: a redirect hop ended, keep only the latest response.
                    if line.starts_with("HTTP/") {
                        lines.clear();
                    }
                    lines.push(line.to_string());
                }
                true
            })?;
            transfer.write_function(|data| {
                let mut st = state.borrow_mut();
                if !st.opened {
                    let head = parse::parse_headers(&lines.borrow());
                    if !head.is_success() {
                        return Ok(data.len());
                    }
                    if let Err(e) = sink.open(&head) {
                        st.error = Some(e);
                        return Ok(0); // abort transfer
                    }
                    st.opened = true;
                }
                match sink.write(data) {
                    Ok(()) => Ok(data.len()),
                    Err(e) => {
                        st.error = Some(e);
                        Ok(0)
                    }
                }
            })?;
            transfer.perform()
        };

        let state = state.into_inner();
        if let Some(e) = state.error {
            return Err(TransportError::Sink(e));
        }
        performed?;

        let mut head = parse::parse_headers(&lines.into_inner());
        head.status = easy.response_code()?;
        if head.is_success() && !state.opened {
            sink.open(&head).map_err(TransportError::Sink)?;
        }
        Ok(head)
    }
}
