//! Minimal HTTP/1.1 server standing in for the archive API and its storage.
//!
//! `GET /v1/archives/v1.0/{name}?...` answers according to `ApiBehavior` after
//! checking the bearer token; `GET /blob/{name}` serves the scripted body with
//! its content type. Everything else is 404.

use std::collections::HashMap;
use std::io::{Read, Write};
use std::net::{TcpListener, TcpStream};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

#[derive(Debug, Clone)]
pub enum ApiBehavior {
    /// 200 with `{"url": "<server>/blob/<name>"}`.
    Sign,
    /// 200 with a JSON body lacking `url`.
    NoUrl,
    /// Bare status code.
    Status(u32),
}

#[derive(Debug, Clone)]
pub struct Blob {
    pub content_type: Option<String>,
    pub body: Vec<u8>,
}

#[derive(Debug, Default, Clone)]
pub struct Script {
    pub token: String,
    pub api: HashMap<String, ApiBehavior>,
    pub blobs: HashMap<String, Blob>,
}

/// Running server: base URL plus the request lines it has seen.
pub struct Server {
    pub base: String,
    pub requests: Arc<Mutex<Vec<String>>>,
}

impl Server {
    pub fn api_base(&self) -> String {
        format!("{}/v1", self.base)
    }

    pub fn blob_url(&self, name: &str) -> String {
        format!("{}/blob/{}", self.base, name)
    }

    pub fn count_matching(&self, needle: &str) -> usize {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.contains(needle))
            .count()
    }
}

/// Starts the server in a background thread. Runs until the process exits.
pub fn start(script: Script) -> Server {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
    let port = listener.local_addr().unwrap().port();
    let base = format!("http://127.0.0.1:{}", port);
    let script = Arc::new(script);
    let requests = Arc::new(Mutex::new(Vec::new()));
    let seen = Arc::clone(&requests);
    let server_base = base.clone();
    thread::spawn(move || {
        for stream in listener.incoming().flatten() {
            let script = Arc::clone(&script);
            let seen = Arc::clone(&seen);
            let base = server_base.clone();
            thread::spawn(move || handle(stream, &script, &seen, &base));
        }
    });
    Server { base, requests }
}

fn read_head(stream: &mut TcpStream) -> Option<String> {
    let mut data = Vec::new();
    let mut buf = [0u8; 4096];
    while !data.windows(4).any(|w| w == b"\r\n\r\n") {
        match stream.read(&mut buf) {
            Ok(0) | Err(_) => return None,
            Ok(n) => data.extend_from_slice(&buf[..n]),
        }
        if data.len() > 64 * 1024 {
            return None;
        }
    }
    String::from_utf8(data).ok()
}

fn respond(stream: &mut TcpStream, status: u32, content_type: Option<&str>, body: &[u8]) {
    let mut head = format!(
        "HTTP/1.1 {} X\r\nContent-Length: {}\r\nConnection: close\r\n",
        status,
        body.len()
    );
    if let Some(ct) = content_type {
        head.push_str(&format!("Content-Type: {}\r\n", ct));
    }
    head.push_str("\r\n");
    let _ = stream.write_all(head.as_bytes());
    let _ = stream.write_all(body);
}

fn handle(mut stream: TcpStream, script: &Script, seen: &Mutex<Vec<String>>, base: &str) {
    let _ = stream.set_read_timeout(Some(Duration::from_secs(2)));
    let _ = stream.set_write_timeout(Some(Duration::from_secs(2)));
    let Some(request) = read_head(&mut stream) else {
        return;
    };
    let mut lines = request.lines();
    let request_line = lines.next().unwrap_or_default().to_string();
    seen.lock().unwrap().push(request_line.clone());

    let mut authorization = None;
    for line in lines {
        if let Some((name, value)) = line.split_once(':') {
            if name.trim().eq_ignore_ascii_case("authorization") {
                authorization = Some(value.trim().to_string());
            }
        }
    }

    let target = request_line.split_whitespace().nth(1).unwrap_or("/");
    let path = target.split('?').next().unwrap_or("/");

    if let Some(name) = path.strip_prefix("/v1/archives/v1.0/") {
        let expected = format!("Bearer {}", script.token);
        if authorization.as_deref() != Some(expected.as_str()) {
            respond(&mut stream, 401, Some("application/json"), b"{}");
            return;
        }
        match script.api.get(name) {
            Some(ApiBehavior::Sign) => {
                let body = format!(r#"{{"url": "{}/blob/{}"}}"#, base, name);
                respond(&mut stream, 200, Some("application/json"), body.as_bytes());
            }
            Some(ApiBehavior::NoUrl) => {
                respond(&mut stream, 200, Some("application/json"), br#"{"message": "ok"}"#);
            }
            Some(ApiBehavior::Status(code)) => respond(&mut stream, *code, None, b""),
            None => respond(&mut stream, 404, None, b""),
        }
        return;
    }

    if let Some(name) = path.strip_prefix("/blob/") {
        match script.blobs.get(name) {
            Some(blob) => respond(&mut stream, 200, blob.content_type.as_deref(), &blob.body),
            None => respond(&mut stream, 404, None, b"missing"),
        }
        return;
    }

    respond(&mut stream, 404, None, b"");
}
