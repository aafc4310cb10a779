//! The per-connection lifecycle: accept checks, handshake timeout, the read
//! loop and teardown. One task reads, one task writes; nothing else touches
//! the socket.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpListener;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tracing::debug;
use tracing::info;
use tracing::warn;

use aopacket::Packet;
use aowire::pacer::PacketPacer;
use aowire::record::RecordReader;

use crate::client::Client;
use crate::db::format_until;
use crate::db::BanInfo;
use crate::db::BanLookup;
use crate::handlers;
use crate::server::Server;

const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(60);
pub const PACKETS_PER_SECOND: u32 = 10;
pub const OUTBOX_DEPTH: usize = 256;

pub async fn listen_tcp(server: Arc<Server>, listener: TcpListener) {
    loop {
        let (stream, peer) = match listener.accept().await {
            Ok(v) => v,
            Err(e) => {
                warn!(err = %e, "accept failed");
                continue;
            }
        };
        let server = server.clone();
        tokio::spawn(async move {
            run_tcp_session(server, stream, peer).await;
        });
    }
}

async fn run_tcp_session(server: Arc<Server>, stream: TcpStream, peer: SocketAddr) {
    let (rd, mut wr) = stream.into_split();
    let (tx, mut rx) = mpsc::channel::<Bytes>(OUTBOX_DEPTH);

    // Writer task: drains the outbox until every sender is gone, so packets
    // queued right before a close still reach the wire.
    let writer = tokio::spawn(async move {
        while let Some(b) = rx.recv().await {
            if wr.write_all(&b[..]).await.is_err() {
                break;
            }
        }
        let _ = wr.shutdown().await;
    });

    let client = Arc::new(Client::new(server.next_conn_id(), peer.ip(), tx));
    if start_session(&server, &client, peer) {
        let mut reader = RecordReader::new(rd);
        let mut pacer = PacketPacer::new(PACKETS_PER_SECOND);
        loop {
            let rec = tokio::select! {
                _ = client.closed() => break,
                res = reader.read_record() => match res {
                    Ok(Some(rec)) => rec,
                    Ok(None) => break,
                    Err(e) => {
                        debug!(conn = client.conn_id, err = %e, "read error");
                        break;
                    }
                },
            };
            handle_record(&server, &client, &mut pacer, &rec).await;
        }
        finish_session(&server, &client, peer);
    }
    drop(client);
    let _ = writer.await;
}

/// Accept-time gate plus registration, handshake timeout and the legacy
/// greeting. Returns false (after sending `BD`) when the peer is banned or
/// over the multiclient limit; the caller must then just drop the client.
/// The ban check runs first: a banned identifier always sees the ban reason,
/// never the limit message.
pub fn start_session(server: &Arc<Server>, client: &Arc<Client>, peer: SocketAddr) -> bool {
    match server.db.is_banned(BanLookup::Ipid, &client.ipid) {
        Ok(Some(ban)) => {
            client.send_packet("BD", &[&ban_payload(&ban)]);
            return false;
        }
        Ok(None) => {}
        Err(e) => {
            warn!(err = %e, "ban lookup failed");
        }
    }
    if server.config.multiclient_limit > 0
        && server.ipid_session_count(&client.ipid) >= server.config.multiclient_limit
    {
        client.send_packet("BD", &["Multiclient limit exceeded."]);
        return false;
    }

    server.register_client(client.clone());
    debug!(conn = client.conn_id, peer = %peer, "connection accepted");

    // Clients that never finish the handshake are cut loose.
    let weak = Arc::downgrade(client);
    tokio::spawn(async move {
        tokio::time::sleep(HANDSHAKE_TIMEOUT).await;
        if let Some(c) = weak.upgrade() {
            if c.uid() == -1 {
                debug!(conn = c.conn_id, "handshake timed out");
                c.disconnect();
            }
        }
    });

    // FantaCrypt relic: AO2 clients wait for this before doing anything.
    client.write_raw("decryptor#NOENCRYPT#%".to_string());
    true
}

/// Throttle, parse and dispatch one raw record.
pub async fn handle_record(
    server: &Arc<Server>,
    client: &Arc<Client>,
    pacer: &mut PacketPacer,
    rec: &[u8],
) {
    // A flooder is slowed down, not desynced.
    pacer.throttle().await;

    let token = String::from_utf8_lossy(rec);
    if server.config.netdebug {
        debug!(conn = client.conn_id, "recv {token}");
    }
    let Ok(packet) = Packet::parse(&token) else {
        return; // Malformed input is silently discarded.
    };
    handlers::dispatch(server, client, &packet);
}

pub fn finish_session(server: &Arc<Server>, client: &Arc<Client>, peer: SocketAddr) {
    server.cleanup_client(client);
    info!(conn = client.conn_id, peer = %peer, "disconnected");
}

pub fn ban_payload(ban: &BanInfo) -> String {
    format!(
        "{}\nUntil: {}\nBan ID: {}",
        ban.reason,
        format_until(ban.duration),
        ban.id
    )
}
