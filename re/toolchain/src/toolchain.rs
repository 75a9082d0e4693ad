use serde::Deserialize;
use simple_error::bail;
use std::collections::BTreeMap;
use std::error::Error;
use std::fs::read_to_string;
use std::path::Path;
use std::process::Command;
use std::time::Duration;
use which::which_in;

fn default_timeout_ms() -> u64 {
    600_000
}

/// How to invoke the external configuration tooling.
///
/// The command receives two extra arguments: the request file to read and
/// the image file to write, both relative to its working directory.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct Toolchain {
    pub command: Vec<String>,
    #[serde(default)]
    pub env: BTreeMap<String, String>,
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
}

impl Toolchain {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, Box<dyn Error>> {
        let s = read_to_string(path)?;
        Self::from_toml(&s)
    }

    pub fn from_toml(s: &str) -> Result<Self, Box<dyn Error>> {
        let res: Toolchain = toml::from_str(s)?;
        if res.command.is_empty() {
            bail!("toolchain command is empty");
        }
        if res.timeout_ms == 0 {
            bail!("toolchain timeout must be positive");
        }
        Ok(res)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Builds the command with the configured environment. With a `PATH` in
    /// the environment, the program is looked up there.
    pub fn command(&self) -> Result<Command, Box<dyn Error + Send + Sync>> {
        let Some((prog, args)) = self.command.split_first() else {
            bail!("toolchain command is empty");
        };
        let mut res = if let Some(path) = self.env.get("PATH") {
            Command::new(which_in(prog, Some(path), "/")?)
        } else {
            Command::new(prog)
        };
        res.args(args);
        for (k, v) in self.env.iter() {
            res.env(k, v);
        }
        Ok(res)
    }
}
