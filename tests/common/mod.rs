use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

/// What the one-shot server sends back.
pub enum Reply {
    /// `200 OK` with a chunked NDJSON body, one HTTP chunk per entry.
    Chunked(Vec<Vec<u8>>),
    /// A bodiless response with the given status line.
    Empty(&'static str),
}

/// The request as the server saw it.
pub struct Captured {
    pub head: String,
    pub body: String,
}

impl Captured {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.head.lines().skip(1).find_map(|line| {
            let (key, value) = line.split_once(':')?;
            key.trim()
                .eq_ignore_ascii_case(name)
                .then_some(value.trim())
        })
    }
}

/// Serves exactly one HTTP/1.1 request on a random local port. Returns the
/// base URL and a handle yielding the captured request.
pub async fn serve_once(reply: Reply) -> (String, JoinHandle<Captured>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("addr");

    let handle = tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.expect("accept");
        let captured = read_request(&mut socket).await;

        match reply {
            Reply::Chunked(chunks) => {
                socket
                    .write_all(
                        b"HTTP/1.1 200 OK\r\nContent-Type: application/x-ndjson\r\n\
                          Transfer-Encoding: chunked\r\nConnection: close\r\n\r\n",
                    )
                    .await
                    .expect("write head");
                for chunk in chunks {
                    let mut frame = format!("{:x}\r\n", chunk.len()).into_bytes();
                    frame.extend_from_slice(&chunk);
                    frame.extend_from_slice(b"\r\n");
                    socket.write_all(&frame).await.expect("write chunk");
                    socket.flush().await.expect("flush");
                    tokio::time::sleep(Duration::from_millis(5)).await;
                }
                socket.write_all(b"0\r\n\r\n").await.expect("write end");
            }
            Reply::Empty(status_line) => {
                let response = format!(
                    "HTTP/1.1 {status_line}\r\nContent-Length: 0\r\nConnection: close\r\n\r\n"
                );
                socket
                    .write_all(response.as_bytes())
                    .await
                    .expect("write response");
            }
        }
        let _ = socket.shutdown().await;
        captured
    });

    (format!("http://{addr}"), handle)
}

async fn read_request(socket: &mut tokio::net::TcpStream) -> Captured {
    let mut buffer = Vec::new();
    let mut scratch = [0u8; 4096];
    let head_end = loop {
        let read = socket.read(&mut scratch).await.expect("read request");
        assert!(read > 0, "client closed before sending headers");
        buffer.extend_from_slice(&scratch[..read]);
        if let Some(pos) = buffer.windows(4).position(|w| w == b"\r\n\r\n") {
            break pos + 4;
        }
    };

    let head = String::from_utf8_lossy(&buffer[..head_end]).into_owned();
    let content_length = head
        .lines()
        .find_map(|line| {
            let (key, value) = line.split_once(':')?;
            key.trim()
                .eq_ignore_ascii_case("content-length")
                .then(|| value.trim().parse::<usize>().ok())
                .flatten()
        })
        .unwrap_or(0);

    while buffer.len() < head_end + content_length {
        let read = socket.read(&mut scratch).await.expect("read body");
        if read == 0 {
            break;
        }
        buffer.extend_from_slice(&scratch[..read]);
    }

    Captured {
        head,
        body: String::from_utf8_lossy(&buffer[head_end..]).into_owned(),
    }
}
