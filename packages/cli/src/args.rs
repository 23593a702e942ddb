// ABOUTME: Command-line arguments for the session watcher
// ABOUTME: Flag overrides are layered on top of the environment configuration

use clap::Parser;
use crs_config::{websocket_url_for, SyncConfig};
use crs_store::ReloadTarget;
use url::Url;

#[derive(Parser, Debug, Clone, PartialEq)]
#[command(name = "crs-watch")]
#[command(about = "Follow a live CRS document for one chat session")]
#[command(version)]
pub struct Args {
    /// Project whose latest document is loaded at start
    #[arg(long)]
    pub project: i64,

    /// Chat session to follow
    #[arg(long)]
    pub chat_session: i64,

    /// Load this document instead of the project's latest
    #[arg(long)]
    pub document: Option<i64>,

    #[arg(long, help = "Backend base URL (overrides CRS_API_URL)")]
    pub api_url: Option<Url>,

    #[arg(long, help = "Socket base URL (overrides CRS_WS_URL)")]
    pub ws_url: Option<Url>,

    #[arg(long, env = "CRS_ACCESS_TOKEN", hide_env_values = true)]
    pub token: Option<String>,

    #[arg(long, help = "Do not open the chat socket")]
    pub no_socket: bool,

    #[arg(long, help = "Do not open the generation stream")]
    pub no_stream: bool,
}

impl Args {
    /// Apply URL overrides. A new API URL also moves the socket URL unless
    /// one is given explicitly.
    pub fn apply_to(&self, config: &mut SyncConfig) -> anyhow::Result<()> {
        if let Some(api_url) = &self.api_url {
            config.api_url = api_url.clone();
            if self.ws_url.is_none() {
                config.ws_url = websocket_url_for(api_url)?;
            }
        }
        if let Some(ws_url) = &self.ws_url {
            if !matches!(ws_url.scheme(), "ws" | "wss") {
                anyhow::bail!("--ws-url must use ws:// or wss://");
            }
            config.ws_url = ws_url.clone();
        }
        Ok(())
    }

    pub fn reload_target(&self) -> ReloadTarget {
        match self.document {
            Some(id) => ReloadTarget::Document(id),
            None => ReloadTarget::Project(self.project),
        }
    }
}
