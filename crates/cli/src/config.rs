//! Command-line and environment configuration.
//!
//! Every option can also be supplied through an environment variable with the
//! `GITHUB_ACTIONS_EXPORTER_` prefix; an explicit flag takes priority.

use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::Context;
use clap::{ArgGroup, Parser, ValueEnum};
use github::{AppCredentials, ClientConfig, Credentials, DEFAULT_API_BASE_URL};
use poller::PollerConfig;
use runs::{Account, RepositoryName};
use secrecy::SecretString;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    Text,
    Json,
}

/// Exports GitHub Actions workflow-run metrics for Prometheus.
#[derive(Debug, Parser)]
#[command(name = "github-actions-exporter", version, about)]
#[command(group(ArgGroup::new("account").required(true).args(["user", "organization"])))]
#[command(group(ArgGroup::new("auth").required(true).args(["token", "pem_file"])))]
pub struct Options {
    /// Log filter directive, e.g. `info` or `poller=debug,info`.
    #[arg(long, env = "GITHUB_ACTIONS_EXPORTER_LOG_LEVEL", default_value = "info")]
    pub log_level: String,

    #[arg(
        long,
        env = "GITHUB_ACTIONS_EXPORTER_LOG_FORMAT",
        value_enum,
        default_value = "text"
    )]
    pub log_format: LogFormat,

    /// User whose repositories are monitored.
    #[arg(long, env = "GITHUB_ACTIONS_EXPORTER_USER")]
    pub user: Option<String>,

    /// Organization whose repositories are monitored.
    #[arg(long, env = "GITHUB_ACTIONS_EXPORTER_ORGANIZATION")]
    pub organization: Option<String>,

    /// Comma-separated allow-list of repositories (`owner/name` or `name`).
    #[arg(long, env = "GITHUB_ACTIONS_EXPORTER_REPOS", value_delimiter = ',')]
    pub repos: Vec<String>,

    /// Seconds to sleep between scans.
    #[arg(
        long,
        env = "GITHUB_ACTIONS_EXPORTER_INTERVAL",
        default_value_t = 30,
        value_parser = clap::value_parser!(u64).range(1..)
    )]
    pub interval: u64,

    /// Personal access token.
    #[arg(long, env = "GITHUB_ACTIONS_EXPORTER_TOKEN", hide_env_values = true)]
    pub token: Option<String>,

    /// GitHub App private key (PEM).
    #[arg(
        long,
        env = "GITHUB_ACTIONS_EXPORTER_PEM_FILE",
        requires = "app_id",
        requires = "installation_id"
    )]
    pub pem_file: Option<PathBuf>,

    #[arg(long, env = "GITHUB_ACTIONS_EXPORTER_APP_ID")]
    pub app_id: Option<String>,

    #[arg(long, env = "GITHUB_ACTIONS_EXPORTER_INSTALLATION_ID")]
    pub installation_id: Option<String>,

    /// GitHub API root; set for GitHub Enterprise Server.
    #[arg(long, env = "GITHUB_ACTIONS_EXPORTER_API_URL", default_value = DEFAULT_API_BASE_URL)]
    pub api_url: String,

    /// Address serving `/metrics` and `/health`.
    #[arg(
        long,
        env = "GITHUB_ACTIONS_EXPORTER_LISTEN_ADDRESS",
        default_value = "0.0.0.0:9999"
    )]
    pub listen_address: SocketAddr,

    /// OTLP gRPC endpoint for span export, e.g. `http://localhost:4317`.
    #[arg(long, env = "GITHUB_ACTIONS_EXPORTER_OTLP_ENDPOINT")]
    pub otlp_endpoint: Option<String>,
}

/// Validated settings handed to the constructors.
#[derive(Debug)]
pub struct Settings {
    pub account: Account,
    pub allow_list: Vec<String>,
    pub poller: PollerConfig,
    pub client: ClientConfig,
    pub credentials: Credentials,
    pub listen_address: SocketAddr,
}

impl Options {
    pub fn into_settings(self) -> anyhow::Result<Settings> {
        let account = match (self.user, self.organization) {
            (Some(user), None) => Account::User(user),
            (None, Some(organization)) => Account::Organization(organization),
            _ => anyhow::bail!("--user or --organization must be provided, but not both"),
        };

        let credentials = match (self.token, self.pem_file) {
            (Some(token), None) => Credentials::Token(SecretString::from(token)),
            (None, Some(path)) => {
                let (Some(app_id), Some(installation_id)) = (self.app_id, self.installation_id)
                else {
                    anyhow::bail!("--pem-file requires --app-id and --installation-id");
                };
                let app = AppCredentials::from_pem_file(app_id, installation_id, &path)
                    .with_context(|| format!("failed to load GitHub App key {}", path.display()))?;
                Credentials::App(app)
            }
            _ => anyhow::bail!("--token or --pem-file must be provided, but not both"),
        };

        let poller = PollerConfig::from_secs(self.interval)
            .context("--interval must be a positive number")?;

        let allow_list = self
            .repos
            .into_iter()
            .map(|entry| entry.trim().to_string())
            .filter(|entry| !entry.is_empty())
            .collect();

        Ok(Settings {
            account,
            allow_list,
            poller,
            client: ClientConfig::with_base_url(self.api_url),
            credentials,
            listen_address: self.listen_address,
        })
    }
}

impl Settings {
    /// Applies the allow-list; an empty list keeps every repository.
    pub fn select(&self, repositories: Vec<RepositoryName>) -> Vec<RepositoryName> {
        if self.allow_list.is_empty() {
            return repositories;
        }
        repositories
            .into_iter()
            .filter(|repo| self.allow_list.iter().any(|entry| repo.matches(entry)))
            .collect()
    }
}
