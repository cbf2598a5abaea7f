//! Account settings for the SQL client, read from the `ENV_TSQL_*` variables.
//!
//! Each variable may hold a `;`-separated list (one entry per database in a
//! cascade); only the first entry is used.

use crate::error::UpdaterError;
use regex::Regex;
use std::sync::LazyLock;

pub const ENV_URL: &str = "ENV_TSQL_URL";
pub const ENV_USER: &str = "ENV_TSQL_USER";
pub const ENV_PSWD: &str = "ENV_TSQL_PSWD";

static URL_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"//(.*?)/(\w+)").expect("valid url regex"));
static PORT_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(.*):(\d+)$").expect("valid port regex"));

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessConfig {
    pub database: String,
    pub host: String,
    pub port: Option<u16>,
    pub user: String,
    /// `None` when the password entry is the literal `\0`.
    pub password: Option<String>,
}

impl AccessConfig {
    pub fn from_env() -> Result<Self, UpdaterError> {
        let var = |name: &str| std::env::var(name).ok().filter(|v| !v.is_empty());
        match (var(ENV_URL), var(ENV_USER), var(ENV_PSWD)) {
            (Some(url), Some(user), Some(pswd)) => Self::from_parts(&url, &user, &pswd),
            _ => Err(UpdaterError::InvalidConfig {
                message: format!("one or more of {ENV_URL}, {ENV_USER} or {ENV_PSWD} is not defined"),
            }),
        }
    }

    pub fn from_parts(url: &str, user: &str, pswd: &str) -> Result<Self, UpdaterError> {
        let caps = URL_REGEX
            .captures(url)
            .ok_or_else(|| UpdaterError::InvalidConfig {
                message: format!("cannot parse {ENV_URL}: {url}"),
            })?;
        let mut host = caps[1].to_string();
        let database = caps[2].to_string();
        let mut port = None;
        if let Some(port_caps) = PORT_REGEX.captures(&caps[1]) {
            let parsed = port_caps[2]
                .parse::<u16>()
                .map_err(|e| UpdaterError::InvalidConfig {
                    message: format!("bad port in {ENV_URL}: {e}"),
                })?;
            host = port_caps[1].to_string();
            port = Some(parsed);
        }
        let password = first_entry(pswd);
        Ok(Self {
            database,
            host,
            port,
            user: first_entry(user).to_string(),
            password: (password != "\\0").then(|| password.to_string()),
        })
    }

    /// Arguments passed to the client program ahead of the piped statement.
    pub fn client_args(&self) -> Vec<String> {
        let mut args = vec![
            self.database.clone(),
            "--compress".to_string(),
            "--host".to_string(),
            self.host.clone(),
        ];
        if let Some(port) = self.port {
            args.push(format!("--port={port}"));
        }
        args.push(format!("--user={}", self.user));
        if let Some(password) = &self.password {
            args.push(format!("--password={password}"));
        }
        args
    }

    /// Client arguments with the password masked, safe for logs.
    pub fn redacted(&self) -> String {
        self.client_args()
            .into_iter()
            .map(|arg| {
                if arg.starts_with("--password=") {
                    "--password=XXX".to_string()
                } else {
                    arg
                }
            })
            .collect::<Vec<_>>()
            .join(" ")
    }
}

fn first_entry(list: &str) -> &str {
    list.split(';').next().unwrap_or(list)
}
