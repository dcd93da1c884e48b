//! In-memory `Transport` for stage tests.

use super::{ApiResponse, BodySink, ResponseHead, Transport};
use crate::error::TransportError;
use std::cell::RefCell;
use std::collections::HashMap;
use std::time::Duration;

/// Scripted API reply for one archive filename.
#[derive(Debug, Clone)]
pub(crate) enum ApiReply {
    Status(u32, String),
    Offline,
}

/// Scripted transport. API replies are keyed by the last path segment of the
/// request URL (the archive filename); download bodies by exact URL.
/// Unknown requests get a 404.
#[derive(Debug, Default)]
pub(crate) struct FakeTransport {
    api: HashMap<String, ApiReply>,
    bodies: HashMap<String, (ResponseHead, Vec<u8>)>,
    pub gets: RefCell<Vec<(String, Vec<(String, String)>)>>,
    pub downloads: RefCell<Vec<String>>,
}

impl FakeTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn signed(mut self, filename: &str, url: &str) -> Self {
        let body = format!(r#"{{"url": "{}"}}"#, url);
        self.api.insert(filename.to_string(), ApiReply::Status(200, body));
        self
    }

    pub fn reply(mut self, filename: &str, reply: ApiReply) -> Self {
        self.api.insert(filename.to_string(), reply);
        self
    }

    pub fn body(mut self, url: &str, content_type: Option<&str>, body: &[u8]) -> Self {
        let head = ResponseHead {
            status: 200,
            content_length: Some(body.len() as u64),
            content_type: content_type.map(str::to_string),
        };
        self.bodies.insert(url.to_string(), (head, body.to_vec()));
        self
    }

    pub fn failing_body(mut self, url: &str, status: u32) -> Self {
        let head = ResponseHead {
            status,
            ..Default::default()
        };
        self.bodies.insert(url.to_string(), (head, b"denied".to_vec()));
        self
    }

    pub fn downloads_of(&self, url: &str) -> usize {
        self.downloads.borrow().iter().filter(|u| *u == url).count()
    }
}

fn couldnt_connect() -> TransportError {
    TransportError::Curl(curl::Error::new(7))
}

impl Transport for FakeTransport {
    fn get(
        &self,
        url: &str,
        headers: &[(&str, &str)],
        _timeout: Duration,
    ) -> Result<ApiResponse, TransportError> {
        self.gets.borrow_mut().push((
            url.to_string(),
            headers
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        ));
        let filename = url::Url::parse(url)
            .ok()
            .and_then(|u| u.path_segments().and_then(|s| s.last().map(str::to_string)))
            .unwrap_or_default();
        match self.api.get(&filename) {
            Some(ApiReply::Status(status, body)) => Ok(ApiResponse {
                status: *status,
                body: body.clone().into_bytes(),
            }),
            Some(ApiReply::Offline) => Err(couldnt_connect()),
            None => Ok(ApiResponse {
                status: 404,
                body: Vec::new(),
            }),
        }
    }

    fn download(&self, url: &str, sink: &mut dyn BodySink) -> Result<ResponseHead, TransportError> {
        self.downloads.borrow_mut().push(url.to_string());
        let Some((head, body)) = self.bodies.get(url) else {
            return Err(couldnt_connect());
        };
        if head.is_success() {
            sink.open(head).map_err(TransportError::Sink)?;
            for chunk in body.chunks(3) {
                sink.write(chunk).map_err(TransportError::Sink)?;
            }
        }
        Ok(head.clone())
    }
}
