#![forbid(unsafe_code)]

//! Typed configuration for the sedum daemon: defaults, then a TOML file,
//! then `SEDUM_*` environment variables, each layer overriding the last.

mod error;
mod persistence;
mod power;
mod system;
mod validate;

pub use error::Error;
pub use persistence::Persistence;
pub use power::Power;
pub use system::System;
pub use validate::ValidationReport;

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    pub system: System,
    pub power: Power,
    pub persistence: Persistence,
}

impl Config {
    /// Built-in defaults, no file or environment involved.
    pub fn new() -> Self {
        Self::default()
    }

    /// Load configuration layered over the defaults.
    ///
    /// The file must exist; a path that silently resolves to nothing hides
    /// operator typos.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, Error> {
        let path = path.as_ref();
        if !path.is_file() {
            return Err(Error::InvalidPath(path.to_owned()));
        }
        let config = Figment::from(Serialized::defaults(Config::default()))
            .merge(Toml::file(path))
            .merge(Env::prefixed("SEDUM_").split("__"))
            .extract()?;
        Ok(config)
    }

    /// Render the effective configuration as a TOML document.
    pub fn to_toml(&self) -> Result<String, Error> {
        Ok(toml_edit::ser::to_string_pretty(self)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn missing_file_is_rejected() {
        let err = Config::load("/nonexistent/sedum.toml").unwrap_err();
        assert!(matches!(err, Error::InvalidPath(_)));
    }

    #[test]
    fn file_overrides_defaults_and_keeps_the_rest() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sedum.toml");
        std::fs::write(
            &path,
            "[power]\nidle_timeout = 120\n\n[system]\ndata_dir = \"/tmp/sedum\"\n",
        )
        .unwrap();

        let config = Config::load(&path).unwrap();
        assert_eq!(config.power.idle_timeout, Duration::from_secs(120));
        assert_eq!(config.system.data_dir, Path::new("/tmp/sedum"));
        // untouched sections keep their defaults
        assert_eq!(config.persistence, Persistence::default());
        assert_eq!(
            config.power.deep_sleep_timeout,
            Power::default().deep_sleep_timeout
        );
    }

    #[test]
    fn rendered_toml_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sedum.toml");
        let mut config = Config::default();
        config.power.presence_poll_interval = Duration::from_millis(2500);

        std::fs::write(&path, config.to_toml().unwrap()).unwrap();
        let reloaded = Config::load(&path).unwrap();
        assert_eq!(reloaded, config);
    }
}
