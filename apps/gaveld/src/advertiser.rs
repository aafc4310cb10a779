//! Master-server advertiser: a fire-and-forget JSON POST on start, on every
//! player-count change, and every five minutes.

use std::time::Duration;

use serde::Serialize;
use tokio::sync::mpsc;
use tracing::warn;

#[derive(Debug, Clone, Serialize)]
pub struct Advertisement {
    pub port: u16,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ws_port: Option<u16>,
    pub players: i32,
    pub name: String,
    pub description: String,
}

pub async fn advertise(url: String, mut advert: Advertisement, mut players_rx: mpsc::Receiver<i32>) {
    let http = reqwest::Client::new();
    post_server(&http, &url, &advert).await;

    let mut ticker = tokio::time::interval(Duration::from_secs(5 * 60));
    ticker.tick().await; // The first tick is immediate; the initial post is done.
    loop {
        tokio::select! {
            _ = ticker.tick() => {
                post_server(&http, &url, &advert).await;
            }
            n = players_rx.recv() => {
                let Some(n) = n else {
                    return;
                };
                advert.players = n;
                post_server(&http, &url, &advert).await;
            }
        }
    }
}

async fn post_server(http: &reqwest::Client, url: &str, advert: &Advertisement) {
    match http.post(url).json(advert).send().await {
        Ok(resp) if !resp.status().is_success() => {
            warn!(status = %resp.status(), "master server rejected advertisement");
        }
        Err(e) => {
            warn!(err = %e, "failed to post advertisement");
        }
        Ok(_) => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn omits_ws_port_when_absent() {
        let advert = Advertisement {
            port: 27016,
            ws_port: None,
            players: 3,
            name: "Court".to_string(),
            description: "d".to_string(),
        };
        let j = serde_json::to_value(&advert).unwrap();
        assert!(j.get("ws_port").is_none());
        assert_eq!(j["players"], 3);

        let advert = Advertisement {
            ws_port: Some(27017),
            ..advert
        };
        let j = serde_json::to_value(&advert).unwrap();
        assert_eq!(j["ws_port"], 27017);
    }
}
