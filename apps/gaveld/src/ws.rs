//! WebSocket transport for the web client. Sessions behave exactly like TCP
//! ones; only the framing differs, so records are fed through the same
//! buffered reader and dispatcher.

use std::net::SocketAddr;
use std::sync::Arc;

use bytes::Bytes;
use futures_util::SinkExt;
use futures_util::StreamExt;
use tokio::net::TcpListener;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tracing::debug;
use tracing::warn;

use tokio_tungstenite::tungstenite::handshake::server::ErrorResponse;
use tokio_tungstenite::tungstenite::handshake::server::Request;
use tokio_tungstenite::tungstenite::handshake::server::Response;
use tokio_tungstenite::tungstenite::http::StatusCode;
use tokio_tungstenite::tungstenite::protocol::Message;

use aowire::pacer::PacketPacer;
use aowire::record::RecordReader;

use crate::client::Client;
use crate::server::Server;
use crate::session::finish_session;
use crate::session::handle_record;
use crate::session::start_session;
use crate::session::OUTBOX_DEPTH;
use crate::session::PACKETS_PER_SECOND;

pub async fn listen_ws(server: Arc<Server>, listener: TcpListener) {
    loop {
        let (stream, peer) = match listener.accept().await {
            Ok(v) => v,
            Err(e) => {
                warn!(err = %e, "ws accept failed");
                continue;
            }
        };
        let server = server.clone();
        tokio::spawn(async move {
            if let Err(e) = run_ws_session(server, stream, peer).await {
                debug!(peer = %peer, err = %e, "ws connection ended with error");
            }
        });
    }
}

async fn run_ws_session(
    server: Arc<Server>,
    stream: TcpStream,
    peer: SocketAddr,
) -> anyhow::Result<()> {
    // The web client's host is the only allowed Origin (empty = open).
    let allowed_origin = server.config.webao_origin.clone();
    let check_origin = move |req: &Request, resp: Response| {
        if allowed_origin.is_empty() {
            return Ok(resp);
        }
        let origin = req
            .headers()
            .get("Origin")
            .and_then(|v| v.to_str().ok())
            .unwrap_or("");
        if origin == allowed_origin {
            Ok(resp)
        } else {
            let mut deny = ErrorResponse::new(Some("origin not allowed".to_string()));
            *deny.status_mut() = StatusCode::FORBIDDEN;
            Err(deny)
        }
    };
    let ws = tokio_tungstenite::accept_hdr_async(stream, check_origin).await?;
    let (mut sink, mut stream) = ws.split();

    let (tx, mut rx) = mpsc::channel::<Bytes>(OUTBOX_DEPTH);
    let writer = tokio::spawn(async move {
        while let Some(b) = rx.recv().await {
            let text = String::from_utf8_lossy(&b).to_string();
            if sink.send(Message::Text(text)).await.is_err() {
                break;
            }
        }
        let _ = sink.close().await;
    });

    let client = Arc::new(Client::new(server.next_conn_id(), peer.ip(), tx));
    if start_session(&server, &client, peer) {
        let mut records = RecordReader::new(tokio::io::empty());
        let mut pacer = PacketPacer::new(PACKETS_PER_SECOND);
        loop {
            let msg = tokio::select! {
                _ = client.closed() => break,
                msg = stream.next() => match msg {
                    Some(Ok(m)) => m,
                    _ => break,
                },
            };
            match msg {
                Message::Text(s) => records.push(s.as_bytes()),
                Message::Binary(b) => records.push(&b),
                Message::Close(_) => break,
                Message::Ping(_) | Message::Pong(_) => continue,
                _ => continue,
            }
            while let Some(rec) = records.pop_buffered() {
                handle_record(&server, &client, &mut pacer, &rec).await;
            }
        }
        finish_session(&server, &client, peer);
    }
    drop(client);
    let _ = writer.await;
    Ok(())
}
