use clap::Parser;
use serde::{Deserialize, Serialize};
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use crate::errors::{AppError, Result};

/// Command-line flags. Anything set here wins over the config file and the
/// `YTDL_WEB_*` environment variables.
#[derive(Debug, Default, Parser)]
#[command(name = "ytdl-web", version, about = "Download video and audio through yt-dlp from a browser")]
pub struct CliArgs {
    /// Config file (toml, json or yaml). Defaults to <config dir>/ytdl-web/config.*
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Address to listen on
    #[arg(long)]
    pub host: Option<String>,

    /// Port to listen on
    #[arg(short, long)]
    pub port: Option<u16>,

    /// Directory downloads are written to
    #[arg(short = 'o', long)]
    pub download_path: Option<PathBuf>,

    /// yt-dlp executable
    #[arg(long)]
    pub ytdlp_path: Option<String>,

    /// ffmpeg executable or the directory holding it
    #[arg(long)]
    pub ffmpeg_location: Option<PathBuf>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub download_path: PathBuf,
    pub ytdlp_path: String,
    #[serde(default)]
    pub ffmpeg_location: Option<PathBuf>,
    pub retries: u32,
    pub concurrent_fragments: u32,
    pub socket_timeout_secs: u64,
    pub job_ttl_secs: u64,
    pub max_jobs: u64,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 5000,
            download_path: default_download_path(),
            ytdlp_path: "yt-dlp".to_string(),
            ffmpeg_location: None,
            retries: 3,
            concurrent_fragments: 3,
            socket_timeout_secs: 30,
            job_ttl_secs: 3600,
            max_jobs: 1000,
        }
    }
}

/// The user's Downloads folder, or `./downloads` when the platform has none.
pub fn default_download_path() -> PathBuf {
    dirs::download_dir().unwrap_or_else(|| PathBuf::from("./downloads"))
}

impl AppConfig {
    /// Layers defaults, the config file, `YTDL_WEB_*` variables and the
    /// command line, in that order.
    pub fn load(args: &CliArgs) -> Result<Self> {
        let defaults = AppConfig::default();

        let mut builder = config::Config::builder()
            .set_default("host", defaults.host)?
            .set_default("port", defaults.port as i64)?
            .set_default("download_path", defaults.download_path.to_string_lossy().to_string())?
            .set_default("ytdlp_path", defaults.ytdlp_path)?
            .set_default("retries", defaults.retries as i64)?
            .set_default("concurrent_fragments", defaults.concurrent_fragments as i64)?
            .set_default("socket_timeout_secs", defaults.socket_timeout_secs as i64)?
            .set_default("job_ttl_secs", defaults.job_ttl_secs as i64)?
            .set_default("max_jobs", defaults.max_jobs as i64)?;

        builder = match &args.config {
            Some(path) => builder.add_source(config::File::from(path.clone()).required(true)),
            None => match Self::default_config_file() {
                Some(path) => builder.add_source(
                    config::File::with_name(&path.to_string_lossy()).required(false),
                ),
                None => builder,
            },
        };

        let builder = builder
            .add_source(config::Environment::with_prefix("YTDL_WEB"))
            .set_override_option("host", args.host.clone())?
            .set_override_option("port", args.port.map(|p| p as i64))?
            .set_override_option(
                "download_path",
                args.download_path.as_ref().map(|p| p.to_string_lossy().to_string()),
            )?
            .set_override_option("ytdlp_path", args.ytdlp_path.clone())?
            .set_override_option(
                "ffmpeg_location",
                args.ffmpeg_location.as_ref().map(|p| p.to_string_lossy().to_string()),
            )?;

        let config: AppConfig = builder.build()?.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    fn default_config_file() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("ytdl-web").join("config"))
    }

    fn validate(&self) -> Result<()> {
        if self.ytdlp_path.trim().is_empty() {
            return Err(AppError::Config(config::ConfigError::Message(
                "ytdlp_path cannot be empty".to_string(),
            )));
        }
        if self.job_ttl_secs == 0 {
            return Err(AppError::Config(config::ConfigError::Message(
                "job_ttl_secs must be greater than zero".to_string(),
            )));
        }
        if self.max_jobs == 0 {
            return Err(AppError::Config(config::ConfigError::Message(
                "max_jobs must be greater than zero".to_string(),
            )));
        }
        self.bind_addr().map(|_| ())
    }

    pub fn bind_addr(&self) -> Result<SocketAddr> {
        let ip: IpAddr = self.host.parse().map_err(|e| {
            AppError::Config(config::ConfigError::Message(format!(
                "Invalid host '{}': {}",
                self.host, e
            )))
        })?;
        Ok(SocketAddr::new(ip, self.port))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults_match_download_tuning() {
        let config = AppConfig::default();
        assert_eq!(config.port, 5000);
        assert_eq!(config.retries, 3);
        assert_eq!(config.concurrent_fragments, 3);
        assert!(config.ffmpeg_location.is_none());
    }

    #[test]
    fn file_and_flags_are_layered() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(file, "port = 8080\nretries = 5\ndownload_path = \"/srv/media\"").unwrap();

        let args = CliArgs {
            config: Some(file.path().to_path_buf()),
            port: Some(9090),
            ..Default::default()
        };
        let config = AppConfig::load(&args).unwrap();

        assert_eq!(config.port, 9090);
        assert_eq!(config.retries, 5);
        assert_eq!(config.download_path, PathBuf::from("/srv/media"));
        assert_eq!(config.ytdlp_path, "yt-dlp");
    }

    #[test]
    fn bad_host_is_rejected() {
        let config = AppConfig {
            host: "not an address".to_string(),
            ..AppConfig::default()
        };
        assert!(matches!(config.bind_addr(), Err(AppError::Config(_))));
    }

    #[test]
    fn zero_job_limits_are_rejected() {
        let no_jobs = AppConfig {
            max_jobs: 0,
            ..AppConfig::default()
        };
        assert!(matches!(no_jobs.validate(), Err(AppError::Config(_))));

        let no_ttl = AppConfig {
            job_ttl_secs: 0,
            ..AppConfig::default()
        };
        assert!(matches!(no_ttl.validate(), Err(AppError::Config(_))));

        assert!(AppConfig::default().validate().is_ok());
    }
}
