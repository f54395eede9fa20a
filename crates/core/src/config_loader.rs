//! Layered configuration loading.
//!
//! Sources merge in increasing precedence: `config/Config.toml`, an optional
//! per-deployment overlay `config/Config.<profile>.toml`, then `ADX_`-prefixed
//! environment variables. `config/Config.json` is joined last as a fallback
//! for values no other source sets. Missing files are simply skipped, so a
//! bare checkout runs on the `Default` impls in [`crate::config`].

use crate::config::AppConfig;
use anyhow::Result;
use figment::{
    providers::{Env, Format, Json, Toml},
    Figment,
};

pub struct ConfigLoader;

impl ConfigLoader {
    /// Loads configuration from the default sources.
    ///
    /// # Errors
    /// Returns an error if a present source cannot be parsed into
    /// [`AppConfig`].
    pub fn load() -> Result<AppConfig> {
        Ok(Self::figment(None).extract()?)
    }

    /// Loads configuration with `config/Config.<profile>.toml` layered over
    /// the base file.
    ///
    /// # Errors
    /// Returns an error if a present source cannot be parsed into
    /// [`AppConfig`].
    pub fn load_with_profile(profile: &str) -> Result<AppConfig> {
        Ok(Self::figment(Some(profile)).extract()?)
    }

    fn figment(profile: Option<&str>) -> Figment {
        let mut figment = Figment::new().merge(Toml::file("config/Config.toml"));
        if let Some(profile) = profile {
            figment = figment.merge(Toml::file(format!("config/Config.{profile}.toml")));
        }
        figment
            .merge(Env::prefixed("ADX_"))
            .join(Json::file("config/Config.json"))
    }
}
