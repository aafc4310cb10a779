use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tracing::info;
use tracing::Level;

mod advertiser;
mod area;
mod cli;
mod client;
mod cmdarg;
mod commands;
mod config;
mod db;
mod handlers;
mod permissions;
mod reportlog;
mod server;
mod session;
mod testimony;
mod uid;
mod webhook;
mod ws;

use crate::advertiser::Advertisement;
use crate::area::Area;
use crate::config::load_areas;
use crate::config::load_config;
use crate::config::load_lines;
use crate::config::load_music;
use crate::config::load_roles;
use crate::db::Store;
use crate::permissions::Role;
use crate::reportlog::ReportLog;
use crate::server::Server;

fn usage_and_exit() -> ! {
    eprintln!(
        "gaveld (Attorney Online 2 server)\n\n\
USAGE:\n  gaveld [-c <config-dir>] [-l|--logdir <dir>] [--ll <level>] [--netdebug]\n\n\
OPTIONS:\n  -c <dir>         config directory (default: ./config)\n  \
-l, --logdir <dir>  report/audit directory (overrides config)\n  \
--ll <level>     log level: debug, info, warning, error, fatal\n  \
--netdebug       log every inbound record\n"
    );
    std::process::exit(2);
}

struct CliArgs {
    config_dir: PathBuf,
    log_dir: Option<String>,
    log_level: Option<String>,
    netdebug: bool,
}

fn parse_args() -> CliArgs {
    let mut out = CliArgs {
        config_dir: PathBuf::from("config"),
        log_dir: None,
        log_level: None,
        netdebug: false,
    };
    let mut it = std::env::args().skip(1);
    while let Some(arg) = it.next() {
        match arg.as_str() {
            "-c" => {
                let v = it.next().unwrap_or_else(|| usage_and_exit());
                out.config_dir = PathBuf::from(v);
            }
            "-l" | "--logdir" => {
                let v = it.next().unwrap_or_else(|| usage_and_exit());
                out.log_dir = Some(v);
            }
            "--ll" => {
                let v = it.next().unwrap_or_else(|| usage_and_exit());
                out.log_level = Some(v);
            }
            "--netdebug" => out.netdebug = true,
            "-h" | "--help" => usage_and_exit(),
            _ => usage_and_exit(),
        }
    }
    out
}

fn log_level(name: &str) -> Level {
    match name {
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warning" => Level::WARN,
        // Fatal errors abort startup; anything that severe is an error here.
        "error" | "fatal" => Level::ERROR,
        _ => Level::INFO,
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = parse_args();

    let mut conf = load_config(&args.config_dir)?;
    if let Some(dir) = args.log_dir {
        conf.server.log_directory = dir;
    }
    if let Some(level) = args.log_level {
        conf.server.log_level = level;
    }
    conf.server.netdebug = args.netdebug;

    let level = log_level(&conf.server.log_level);
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                tracing_subscriber::EnvFilter::new(format!("{level}").to_lowercase())
            }),
        )
        .with_target(false)
        .init();

    // A bad default ban duration would only surface on the first /ban; fail
    // now instead.
    if !conf.server.default_ban_duration.eq_ignore_ascii_case("perma")
        && commands::parse_duration(&conf.server.default_ban_duration).is_none()
    {
        anyhow::bail!(
            "invalid default_ban_duration {:?}",
            conf.server.default_ban_duration
        );
    }

    let characters =
        load_lines(&args.config_dir.join("characters.txt")).context("loading characters")?;
    if characters.is_empty() {
        anyhow::bail!("empty character list");
    }
    let music = load_music(&args.config_dir).context("loading music")?;
    let backgrounds =
        load_lines(&args.config_dir.join("backgrounds.txt")).context("loading backgrounds")?;
    // Parrot lines are cosmetic; a missing file just means a quiet parrot.
    let parrot_lines = load_lines(&args.config_dir.join("parrot.txt")).unwrap_or_default();

    let area_configs = load_areas(&args.config_dir).context("loading areas")?;
    let roles: Vec<Role> = load_roles(&args.config_dir)
        .context("loading roles")?
        .iter()
        .map(Role::from_config)
        .collect();

    let areas: Vec<Area> = area_configs
        .into_iter()
        .map(|ac| Area::new(ac, characters.len(), conf.server.log_buffer_size))
        .collect();

    let db = Store::open(&config::db_path(&args.config_dir))?;
    let reports = ReportLog::new(PathBuf::from(&conf.server.log_directory))?;

    let bind_host = if conf.server.addr.is_empty() {
        "0.0.0.0"
    } else {
        conf.server.addr.as_str()
    };
    let addr = format!("{bind_host}:{}", conf.server.port);
    let ws_addr = format!("{bind_host}:{}", conf.server.webao_port);
    let enable_ws = conf.server.enable_webao;

    let server = Server::new(
        conf.server,
        conf.master,
        characters,
        music,
        backgrounds,
        parrot_lines,
        roles,
        areas,
        db,
        reports,
    );

    if server.master.advertise {
        let (tx, rx) = mpsc::channel(64);
        server.set_advertiser(tx);
        let advert = Advertisement {
            port: server.config.port,
            ws_port: enable_ws.then_some(server.config.webao_port),
            players: 0,
            name: server.config.name.clone(),
            description: server.config.description.clone(),
        };
        tokio::spawn(advertiser::advertise(server.master.addr.clone(), advert, rx));
    }

    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    info!(addr = %addr, "server listening");
    tokio::spawn(session::listen_tcp(server.clone(), listener));

    if enable_ws {
        let ws_listener = TcpListener::bind(&ws_addr)
            .await
            .with_context(|| format!("failed to bind {ws_addr}"))?;
        info!(addr = %ws_addr, "websocket listening");
        tokio::spawn(ws::listen_ws(server.clone(), ws_listener));
    }

    tokio::spawn(cli::listen_input(server.clone()));

    wait_for_shutdown().await;
    info!("shutting down");
    server.disconnect_all();
    // Give the per-connection writers a moment to flush.
    tokio::time::sleep(std::time::Duration::from_millis(200)).await;
    Ok(())
}

async fn wait_for_shutdown() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::signal;
        use tokio::signal::unix::SignalKind;
        let mut term = signal(SignalKind::terminate()).expect("failed to install SIGTERM handler");
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {}
            _ = term.recv() => {}
        }
    }
    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}
