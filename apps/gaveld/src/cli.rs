//! Operator commands on stdin. Output goes through the normal log stream so
//! it lands wherever the operator is already looking.

use std::sync::Arc;

use tokio::io::AsyncBufReadExt;
use tokio::io::BufReader;
use tracing::info;

use crate::server::Server;

pub async fn listen_input(server: Arc<Server>) {
    let stdin = BufReader::new(tokio::io::stdin());
    let mut lines = stdin.lines();
    while let Ok(Some(line)) = lines.next_line().await {
        let cmd: Vec<&str> = line.split_whitespace().collect();
        match cmd.first().copied() {
            Some("help") => {
                info!("recognized commands: help, mkusr, rmusr, players, getlog, say");
            }
            Some("mkusr") => {
                if cmd.len() < 4 {
                    info!("not enough arguments. usage: mkusr <username> <password> <role>");
                    continue;
                }
                let Some(role) = server.role(cmd[3]) else {
                    info!("invalid role");
                    continue;
                };
                match server.db.create_user(cmd[1], cmd[2].as_bytes(), role.permissions) {
                    Ok(()) => info!(user = cmd[1], "created user"),
                    Err(e) => info!(err = %e, "failed to create user"),
                }
            }
            Some("rmusr") => {
                if cmd.len() < 2 {
                    info!("not enough arguments. usage: rmusr <username>");
                    continue;
                }
                match server.db.remove_user(cmd[1]) {
                    Ok(()) => info!(user = cmd[1], "removed user"),
                    Err(e) => info!(err = %e, "failed to remove user"),
                }
            }
            Some("players") => {
                info!(
                    "{}/{} players online",
                    server.player_count(),
                    server.config.max_players
                );
            }
            Some("getlog") => {
                if cmd.len() < 2 {
                    info!("not enough arguments. usage: getlog <area>");
                    continue;
                }
                let wanted = cmd[1..].join(" ");
                match server.areas.iter().find(|a| a.name() == wanted) {
                    Some(a) => info!("{}", a.buffer().join("\n")),
                    None => info!("no such area"),
                }
            }
            Some("say") => {
                if cmd.len() < 2 {
                    info!("not enough arguments. usage: say <message>");
                    continue;
                }
                let msg = cmd[1..].join(" ");
                for c in server.clients_snapshot() {
                    c.send_server_message(&server.config.name, &msg);
                }
            }
            Some(_) => info!("unrecognized command"),
            None => {}
        }
    }
}
