use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use tracing::info;
use tutor_stream::StreamConfig;

#[derive(Debug, Clone)]
pub struct Config {
    pub stream: StreamConfig,
    /// Event name that raises the on-screen notice.
    pub notice_event: String,
    pub notice_message: String,
}

#[derive(Parser, Debug)]
#[command(author, version, about = "Streams admin events for signed-in assistants", long_about = None)]
pub struct Args {
    /// JSON stream config file.
    pub config: Option<PathBuf>,

    /// Overrides the config's API base URL.
    #[arg(long, env = "TUTOR_API_BASE")]
    pub base_url: Option<String>,

    /// Bearer token for the API.
    #[arg(long, env = "TUTOR_TOKEN", hide_env_values = true)]
    pub token: Option<String>,

    /// Use this role instead of loading the user from `/login/me`.
    #[arg(long)]
    pub role: Option<String>,

    /// Replaces the config's allowed roles. Repeatable.
    #[arg(long = "allowed-role")]
    pub allowed_roles: Vec<String>,

    #[arg(long, default_value = "student_register")]
    pub notice_event: String,

    #[arg(long, default_value = "new student is waiting")]
    pub notice_message: String,
}

impl Args {
    pub fn load_config(&self) -> Result<Config> {
        let mut stream = match &self.config {
            Some(path) => {
                let stream = StreamConfig::from_json_file(path)?;
                info!("Loaded config: {}", path.display());
                stream
            }
            None => {
                info!("No config file, using defaults");
                StreamConfig::builder().allowed_roles(vec!["assistant".to_string()]).build()
            }
        };

        if let Some(base_url) = &self.base_url {
            stream.base_url = base_url.clone();
        }
        if !self.allowed_roles.is_empty() {
            stream.allowed_roles = self.allowed_roles.clone();
        }
        stream.validate()?;

        let config =
            Config { stream, notice_event: self.notice_event.clone(), notice_message: self.notice_message.clone() };

        info!("╔═══════════════════════════════════════════");
        info!("║ Admin feed");
        info!("╚═══════════════════════════════════════════");
        info!("├─ Stream URL: {}", config.stream.url());
        info!("├─ Allowed roles: {}", config.stream.allowed_roles.join(", "));
        info!("├─ Enabled: {}", config.stream.enabled);
        info!("├─ Reconnect: {:?} doubling up to {:?}", config.stream.reconnect_base_delay, config.stream.reconnect_max_delay);
        info!("└─ Notice on: {}", config.notice_event);

        Ok(config)
    }
}
