//! Command-line surface of the `marquee` binary.

use std::path::PathBuf;

use anyhow::{bail, Result};
use clap::{Args, Parser, Subcommand};
use marquee_digest::config::MIN_SETUP_REFRESH_MINUTES;
use marquee_digest::MarqueeConfig;

#[derive(Debug, Parser)]
#[command(name = "marquee", version, about = "Watches a media server and reports what changed")]
pub struct Cli {
    /// Config file (defaults to the platform config directory)
    #[arg(long, global = true, env = "MARQUEE_CONFIG")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run the digest engine until interrupted (default)
    Run(RunArgs),
    /// Write a config file
    Init(InitArgs),
}

#[derive(Debug, Default, Args)]
pub struct RunArgs {
    /// Run a single digest and exit
    #[arg(long)]
    pub once: bool,
}

#[derive(Debug, Args)]
pub struct InitArgs {
    #[arg(long, env = "MARQUEE_HOSTNAME", default_value = "localhost")]
    pub hostname: String,

    #[arg(long, env = "MARQUEE_PORT", default_value_t = 32400)]
    pub port: u16,

    #[arg(long, env = "MARQUEE_HTTPS")]
    pub https: bool,

    /// Server auth token; skips the plex.tv sign-in
    #[arg(long, env = "MARQUEE_TOKEN", hide_env_values = true)]
    pub token: Option<String>,

    /// plex.tv account used to obtain a token
    #[arg(long, env = "MARQUEE_USERNAME", conflicts_with = "token")]
    pub username: Option<String>,

    #[arg(long, env = "MARQUEE_PASSWORD", hide_env_values = true, requires = "username")]
    pub password: Option<String>,

    /// Minutes between digests
    #[arg(long, env = "MARQUEE_REFRESH_MINUTES", default_value_t = 15)]
    pub refresh_minutes: u64,

    /// Snapshot file (defaults to the platform data directory)
    #[arg(long, env = "MARQUEE_CACHE_PATH")]
    pub cache_path: Option<PathBuf>,

    /// Overwrite an existing config file
    #[arg(long)]
    pub force: bool,
}

/// How `init` gets its token.
#[derive(Debug, PartialEq, Eq)]
pub enum Credentials {
    Token(String),
    SignIn { username: String, password: String },
}

impl InitArgs {
    /// Config built from the flags, without a token.
    pub fn to_config(&self) -> MarqueeConfig {
        let mut config = MarqueeConfig::default();
        config.server.hostname = self.hostname.clone();
        config.server.port = self.port;
        config.server.https = self.https;
        config.digest.refresh_minutes = self.refresh_minutes;
        config.cache.path = self.cache_path.clone();
        config
    }

    pub fn credentials(&self) -> Result<Credentials> {
        if self.refresh_minutes < MIN_SETUP_REFRESH_MINUTES {
            bail!("--refresh-minutes must be at least {MIN_SETUP_REFRESH_MINUTES}");
        }

        match (&self.token, &self.username, &self.password) {
            (Some(token), _, _) if !token.trim().is_empty() => Ok(Credentials::Token(token.clone())),
            (_, Some(username), Some(password)) => Ok(Credentials::SignIn {
                username: username.clone(),
                password: password.clone(),
            }),
            _ => bail!("pass --token, or --username and --password to sign in to plex.tv"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(std::iter::once("marquee").chain(args.iter().copied())).unwrap()
    }

    fn init_args(args: &[&str]) -> InitArgs {
        let mut full = vec!["init"];
        full.extend_from_slice(args);
        match parse(&full).command {
            Some(Command::Init(args)) => args,
            other => panic!("expected init, got {other:?}"),
        }
    }

    #[test]
    fn test_run_is_default() {
        let cli = parse(&[]);
        assert!(cli.command.is_none());

        let cli = parse(&["run", "--once"]);
        assert!(matches!(cli.command, Some(Command::Run(RunArgs { once: true }))));
    }

    #[test]
    fn test_config_flag_is_global() {
        let cli = parse(&["run", "--config", "/tmp/m.toml"]);
        assert_eq!(cli.config, Some(PathBuf::from("/tmp/m.toml")));
    }

    #[test]
    fn test_init_builds_config() {
        let args = init_args(&[
            "--hostname",
            "media.local",
            "--port",
            "32401",
            "--https",
            "--token",
            "abc",
            "--refresh-minutes",
            "10",
        ]);
        let config = args.to_config();
        assert_eq!(config.server.hostname, "media.local");
        assert_eq!(config.server.port, 32401);
        assert!(config.server.https);
        assert_eq!(config.digest.refresh_minutes, 10);
        assert_eq!(args.credentials().unwrap(), Credentials::Token("abc".into()));
    }

    #[test]
    fn test_init_sign_in_credentials() {
        let args = init_args(&["--username", "me", "--password", "pw"]);
        assert_eq!(
            args.credentials().unwrap(),
            Credentials::SignIn {
                username: "me".into(),
                password: "pw".into()
            }
        );
    }

    #[test]
    fn test_init_requires_credentials() {
        let args = init_args(&["--username", "me"]);
        assert!(args.credentials().is_err());
    }

    #[test]
    fn test_init_enforces_setup_minimum() {
        let args = init_args(&["--token", "abc", "--refresh-minutes", "4"]);
        assert!(args.credentials().is_err());
    }

    #[test]
    fn test_port_range_checked_by_parser() {
        let result = Cli::try_parse_from(["marquee", "init", "--port", "70000"]);
        assert!(result.is_err());
    }
}
