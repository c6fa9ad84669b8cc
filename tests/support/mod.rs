//! In-process servers speaking the inline request format, used by the integration tests.

#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

/// Counts the connections a test server accepted.
#[derive(Debug, Clone, Default)]
pub struct Accepted(Arc<AtomicUsize>);

impl Accepted {
    pub fn get(&self) -> usize {
        self.0.load(Ordering::SeqCst)
    }

    fn incr(&self) {
        self.0.fetch_add(1, Ordering::SeqCst);
    }
}

/// One inline command as read off the socket.
#[derive(Debug)]
pub struct Request {
    pub args: Vec<String>,
    pub payload: Option<Vec<u8>>,
}

/// Reads one command. `SET` carries a payload whose length is its last argument.
async fn read_request(reader: &mut BufReader<TcpStream>) -> Option<Request> {
    let mut line = String::new();
    if reader.read_line(&mut line).await.ok()? == 0 {
        return None;
    }

    let args: Vec<String> = line.split_whitespace().map(str::to_string).collect();

    let payload = if args.first().map(|name| name.eq_ignore_ascii_case("SET")) == Some(true) {
        let len: usize = args.last()?.parse().ok()?;
        let mut data = vec![0; len + 2];
        reader.read_exact(&mut data).await.ok()?;
        data.truncate(len);
        Some(data)
    } else {
        None
    };

    Some(Request { args, payload })
}

/// Starts a key/value server answering `GET`, `SET`, `INCR` and `KEYS`.
///
/// Missing keys are answered with an error reply.
pub async fn spawn_kv_server() -> (String, Accepted) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap().to_string();
    let accepted = Accepted::default();
    let store: Arc<Mutex<HashMap<String, Vec<u8>>>> = Arc::default();

    let counter = accepted.clone();
    tokio::spawn(async move {
        loop {
            let (socket, _) = match listener.accept().await {
                Ok(conn) => conn,
                Err(_) => return,
            };
            counter.incr();

            let store = store.clone();
            tokio::spawn(async move {
                let mut reader = BufReader::new(socket);

                while let Some(request) = read_request(&mut reader).await {
                    let response = kv_response(&store, request);
                    if reader.get_mut().write_all(&response).await.is_err() {
                        return;
                    }
                }
            });
        }
    });

    (addr, accepted)
}

fn kv_response(store: &Mutex<HashMap<String, Vec<u8>>>, request: Request) -> Vec<u8> {
    let mut store = store.lock().unwrap();
    let name = request.args.first().map(|s| s.to_uppercase()).unwrap_or_default();

    match (&name[..], request.args.get(1)) {
        ("GET", Some(key)) => match store.get(key) {
            Some(value) => {
                let mut out = format!("${}\r\n", value.len()).into_bytes();
                out.extend_from_slice(value);
                out.extend_from_slice(b"\r\n");
                out
            }
            None => b"-ERR no such key\r\n".to_vec(),
        },
        ("SET", Some(key)) => {
            store.insert(key.clone(), request.payload.unwrap_or_default());
            b"+OK\r\n".to_vec()
        }
        ("INCR", Some(key)) => {
            let current: i64 = store
                .get(key)
                .and_then(|v| String::from_utf8_lossy(v).parse().ok())
                .unwrap_or(0);
            let next = current + 1;
            store.insert(key.clone(), next.to_string().into_bytes());
            format!(":{}\r\n", next).into_bytes()
        }
        ("KEYS", _) => {
            let mut keys: Vec<&String> = store.keys().collect();
            keys.sort();

            let mut out = format!("*{}\r\n", keys.len()).into_bytes();
            for key in keys {
                out.extend_from_slice(format!("${}\r\n{}\r\n", key.len(), key).as_bytes());
            }
            out
        }
        _ => format!("-ERR unknown command '{}'\r\n", name).into_bytes(),
    }
}

/// Starts a server answering every command, on any connection, with the next scripted reply.
///
/// An empty reply closes the connection instead of answering.
pub async fn spawn_scripted_server(replies: Vec<&'static [u8]>) -> (String, Accepted) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap().to_string();
    let accepted = Accepted::default();
    let replies = Arc::new(Mutex::new(VecDeque::from(replies)));

    let counter = accepted.clone();
    tokio::spawn(async move {
        loop {
            let (socket, _) = match listener.accept().await {
                Ok(conn) => conn,
                Err(_) => return,
            };
            counter.incr();

            let replies = replies.clone();
            tokio::spawn(async move {
                let mut reader = BufReader::new(socket);

                while read_request(&mut reader).await.is_some() {
                    let next = replies.lock().unwrap().pop_front();
                    let reply = match next {
                        Some(reply) if !reply.is_empty() => reply,
                        _ => return,
                    };

                    if reader.get_mut().write_all(reply).await.is_err() {
                        return;
                    }
                }
            });
        }
    });

    (addr, accepted)
}

/// Returns an address nothing listens on.
pub async fn closed_addr() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    listener.local_addr().unwrap().to_string()
}

/// Starts a server that answers the first command with `reply` and then closes the connection.
pub async fn spawn_closing_server(reply: &'static [u8]) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap().to_string();

    tokio::spawn(async move {
        let (socket, _) = match listener.accept().await {
            Ok(conn) => conn,
            Err(_) => return,
        };

        let mut reader = BufReader::new(socket);
        if read_request(&mut reader).await.is_some() {
            let _ = reader.get_mut().write_all(reply).await;
        }
    });

    addr
}
