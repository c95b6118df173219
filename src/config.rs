use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result, ensure};
use config_model::SlideshowOptions;
use serde::Deserialize;

use crate::loader::Converter;

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(rename_all = "kebab-case", default)]
pub struct Configuration {
    pub slideshow: SlideshowOptions,
    /// Descend into subdirectories of directory arguments.
    pub recursive: bool,
    pub follow_links: bool,
    /// Auto-advance interval; `None` disables the slideshow timer.
    #[serde(with = "humantime_serde")]
    pub delay: Option<Duration>,
    /// Interval for rediscovering the whole list from its sources.
    #[serde(with = "humantime_serde")]
    pub reload: Option<Duration>,
    /// Caption directory relative to each image's directory.
    pub caption_path: Option<PathBuf>,
    /// Filelist read at startup and written back on exit.
    pub filelist: Option<PathBuf>,
    pub converter: Option<ConverterConfig>,
    /// Reload the displayed image when its file changes on disk.
    pub watch: bool,
    pub verbose: bool,
}

impl Configuration {
    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self> {
        let s = std::fs::read_to_string(path)?;
        Ok(serde_yaml::from_str(&s)?)
    }

    /// Validate runtime invariants that cannot be expressed via serde defaults alone.
    pub fn validated(self) -> Result<Self> {
        if let Some(delay) = self.delay {
            ensure!(!delay.is_zero(), "delay must be greater than zero");
        }
        if let Some(reload) = self.reload {
            ensure!(!reload.is_zero(), "reload must be greater than zero");
        }
        if let Some(caption) = &self.caption_path {
            ensure!(
                !caption.as_os_str().is_empty(),
                "caption-path must not be empty"
            );
        }
        self.slideshow
            .validate()
            .context("invalid slideshow configuration")?;
        if let Some(converter) = &self.converter {
            converter
                .validate()
                .context("invalid converter configuration")?;
        }
        Ok(self)
    }

    pub fn converter(&self) -> Option<Converter> {
        self.converter.as_ref().map(ConverterConfig::to_converter)
    }
}

impl Default for Configuration {
    fn default() -> Self {
        Self {
            slideshow: SlideshowOptions::default(),
            recursive: false,
            follow_links: true,
            delay: None,
            reload: None,
            caption_path: None,
            filelist: None,
            converter: None,
            watch: false,
            verbose: false,
        }
    }
}

/// External conversion for formats the built-in decoders reject.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub struct ConverterConfig {
    /// Program and arguments; `{input}` and `{output}` are substituted.
    pub command: Vec<String>,
    #[serde(with = "humantime_serde", default = "ConverterConfig::default_timeout")]
    pub timeout: Duration,
}

impl ConverterConfig {
    const fn default_timeout() -> Duration {
        Duration::from_secs(10)
    }

    fn validate(&self) -> Result<()> {
        ensure!(!self.command.is_empty(), "converter.command must not be empty");
        ensure!(
            self.command.iter().any(|arg| arg.contains("{output}")),
            "converter.command must reference {{output}}"
        );
        ensure!(!self.timeout.is_zero(), "converter.timeout must be positive");
        Ok(())
    }

    pub fn to_converter(&self) -> Converter {
        Converter {
            command: self.command.clone(),
            timeout: self.timeout,
        }
    }
}
