use serde::Deserialize;
use std::collections::HashMap;
use std::path::PathBuf;

/// How to launch an MCP tool/resource server as a child process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    pub name: String,
    pub command: PathBuf,
    pub args: Vec<String>,
    pub env: HashMap<String, String>,
    pub workdir: Option<PathBuf>,
}

impl ServerConfig {
    /// Human-readable launch line used in startup logs.
    pub fn describe(&self) -> String {
        let mut line = self.command.display().to_string();
        if !self.args.is_empty() {
            line.push(' ');
            line.push_str(&self.args.join(" "));
        }
        line
    }
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct RawServer {
    name: String,
    command: String,
    #[serde(default)]
    args: Vec<String>,
    #[serde(default)]
    env: HashMap<String, String>,
    workdir: Option<String>,
}

impl From<RawServer> for ServerConfig {
    fn from(raw: RawServer) -> Self {
        let expand = |s: &str| -> String {
            shellexpand::full(s)
                .map(|cow| cow.into_owned())
                .unwrap_or_else(|_| s.to_string())
        };

        let command = PathBuf::from(expand(&raw.command));
        let workdir = raw.workdir.map(|d| PathBuf::from(expand(&d)));
        let args = raw.args.into_iter().map(|arg| expand(&arg)).collect();
        let env = raw
            .env
            .into_iter()
            .map(|(key, value)| (key, expand(&value)))
            .collect();

        Self {
            name: raw.name,
            command,
            args,
            env,
            workdir,
        }
    }
}
