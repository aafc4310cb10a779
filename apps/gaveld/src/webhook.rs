//! Best-effort mirror of operator events to a chat webhook. Failures are
//! logged and never affect the session that triggered them.

use serde::Serialize;

const EMBED_COLOR: u32 = 0x05b2f7;

#[derive(Debug, Clone)]
pub struct Webhook {
    url: String,
    username: String,
    http: reqwest::Client,
}

#[derive(Debug, Serialize)]
struct Embed {
    title: String,
    description: String,
    color: u32,
}

#[derive(Debug, Serialize)]
struct EmbedPost<'a> {
    username: &'a str,
    embeds: Vec<Embed>,
}

impl Webhook {
    pub fn new(url: String, username: String) -> Self {
        Self {
            url,
            username,
            http: reqwest::Client::new(),
        }
    }

    /// Post a modcall notification as an embed.
    pub async fn post_modcall(
        &self,
        character: &str,
        area: &str,
        reason: &str,
    ) -> anyhow::Result<()> {
        let post = EmbedPost {
            username: &self.username,
            embeds: vec![Embed {
                title: format!("{character} sent a modcall in {area}."),
                description: reason.to_string(),
                color: EMBED_COLOR,
            }],
        };
        let resp = self.http.post(&self.url).json(&post).send().await?;
        if !resp.status().is_success() {
            anyhow::bail!("webhook returned {}", resp.status());
        }
        Ok(())
    }

    /// Upload a flushed area buffer as a file attachment.
    pub async fn post_report(&self, filename: &str, contents: String) -> anyhow::Result<()> {
        let part = reqwest::multipart::Part::text(contents)
            .file_name(filename.to_string())
            .mime_str("text/plain")?;
        let form = reqwest::multipart::Form::new()
            .text("username", self.username.clone())
            .part("file", part);
        let resp = self.http.post(&self.url).multipart(form).send().await?;
        if !resp.status().is_success() {
            anyhow::bail!("webhook returned {}", resp.status());
        }
        Ok(())
    }
}
