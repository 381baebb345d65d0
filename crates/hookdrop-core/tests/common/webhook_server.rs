//! Minimal HTTP/1.1 webhook endpoint for integration tests.
//!
//! Accepts multipart POSTs, records the uploaded filename and size, and answers
//! each request from a per-filename script (default `204 No Content`).

use std::collections::{HashMap, VecDeque};
use std::io::{Read, Write};
use std::net::{TcpListener, TcpStream};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

/// One scripted answer.
#[derive(Debug, Clone)]
pub enum Reply {
    Ok,
    /// 429 with a JSON body carrying `retry_after` seconds.
    RateLimited { retry_after: f64 },
    /// 429 with no hint at all.
    RateLimitedBare,
    Status(u16),
}

/// A request the server accepted.
#[derive(Debug, Clone)]
pub struct Received {
    pub field: String,
    pub filename: String,
    pub body_len: usize,
}

#[derive(Default)]
struct State {
    scripts: HashMap<String, VecDeque<Reply>>,
    received: Vec<Received>,
}

#[derive(Clone)]
pub struct WebhookServer {
    pub url: String,
    state: Arc<Mutex<State>>,
}

impl WebhookServer {
    /// Queues replies for uploads of `filename`; once used up, uploads get `204`.
    pub fn script(&self, filename: &str, replies: Vec<Reply>) {
        self.state
            .lock()
            .unwrap()
            .scripts
            .insert(filename.to_string(), replies.into());
    }

    pub fn received(&self) -> Vec<Received> {
        self.state.lock().unwrap().received.clone()
    }

    pub fn hits(&self, filename: &str) -> usize {
        self.received()
            .iter()
            .filter(|r| r.filename == filename)
            .count()
    }
}

/// Starts the server on an ephemeral port. Runs until the process exits.
pub fn start() -> WebhookServer {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
    let port = listener.local_addr().unwrap().port();
    let state = Arc::new(Mutex::new(State::default()));
    let server = WebhookServer {
        url: format!("http://127.0.0.1:{}/api/webhooks/1/token", port),
        state: Arc::clone(&state),
    };
    thread::spawn(move || {
        for stream in listener.incoming().flatten() {
            let state = Arc::clone(&state);
            thread::spawn(move || handle(stream, &state));
        }
    });
    server
}

fn handle(mut stream: TcpStream, state: &Mutex<State>) {
    let _ = stream.set_read_timeout(Some(Duration::from_secs(5)));
    let _ = stream.set_write_timeout(Some(Duration::from_secs(5)));

    let mut buf = Vec::new();
    let mut chunk = [0u8; 8192];
    let head_end = loop {
        if let Some(pos) = find(&buf, b"\r\n\r\n") {
            break pos + 4;
        }
        match stream.read(&mut chunk) {
            Ok(0) | Err(_) => return,
            Ok(n) => buf.extend_from_slice(&chunk[..n]),
        }
    };
    let head = String::from_utf8_lossy(&buf[..head_end]).to_string();
    let mut lines = head.lines();
    let method = lines
        .next()
        .and_then(|l| l.split_whitespace().next())
        .unwrap_or("")
        .to_string();
    let mut content_length = 0usize;
    let mut expect_continue = false;
    for line in lines {
        if let Some((name, value)) = line.split_once(':') {
            let name = name.trim();
            if name.eq_ignore_ascii_case("content-length") {
                content_length = value.trim().parse().unwrap_or(0);
            } else if name.eq_ignore_ascii_case("expect")
                && value.trim().eq_ignore_ascii_case("100-continue")
            {
                expect_continue = true;
            }
        }
    }
    if !method.eq_ignore_ascii_case("POST") {
        let _ = stream.write_all(b"HTTP/1.1 405 Method Not Allowed\r\nContent-Length: 0\r\nConnection: close\r\n\r\n");
        return;
    }
    if expect_continue {
        let _ = stream.write_all(b"HTTP/1.1 100 Continue\r\n\r\n");
    }

    let mut body = buf[head_end..].to_vec();
    while body.len() < content_length {
        match stream.read(&mut chunk) {
            Ok(0) | Err(_) => return,
            Ok(n) => body.extend_from_slice(&chunk[..n]),
        }
    }

    let (field, filename) = part_names(&body);
    let reply = {
        let mut st = state.lock().unwrap();
        st.received.push(Received {
            field,
            filename: filename.clone(),
            body_len: body.len(),
        });
        st.scripts
            .get_mut(&filename)
            .and_then(|q| q.pop_front())
            .unwrap_or(Reply::Ok)
    };

    let (status, extra, payload) = match reply {
        Reply::Ok => ("204 No Content", String::new(), String::new()),
        Reply::RateLimited { retry_after } => (
            "429 Too Many Requests",
            "Content-Type: application/json\r\n".to_string(),
            format!(
                "{{\"message\": \"You are being rate limited.\", \"retry_after\": {}, \"global\": false}}",
                retry_after
            ),
        ),
        Reply::RateLimitedBare => ("429 Too Many Requests", String::new(), String::new()),
        Reply::Status(code) => (
            match code {
                400 => "400 Bad Request",
                404 => "404 Not Found",
                500 => "500 Internal Server Error",
                502 => "502 Bad Gateway",
                503 => "503 Service Unavailable",
                _ => "500 Internal Server Error",
            },
            String::new(),
            format!("{{\"message\": \"error {}\"}}", code),
        ),
    };
    let response = format!(
        "HTTP/1.1 {}\r\nContent-Length: {}\r\nConnection: close\r\n{}\r\n{}",
        status,
        payload.len(),
        extra,
        payload
    );
    let _ = stream.write_all(response.as_bytes());
}

/// Field and file name from the first multipart Content-Disposition line.
fn part_names(body: &[u8]) -> (String, String) {
    let text = String::from_utf8_lossy(body);
    let field = quoted_after(&text, "name=\"").unwrap_or_default();
    let filename = quoted_after(&text, "filename=\"").unwrap_or_default();
    (field, filename)
}

fn quoted_after(text: &str, key: &str) -> Option<String> {
    let start = text.find(key)? + key.len();
    let end = text[start..].find('"')?;
    Some(text[start..start + end].to_string())
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).position(|w| w == needle)
}
