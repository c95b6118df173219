use std::fmt;
use std::str::FromStr;

use anyhow::{Result, ensure};
use serde::Deserialize;
use serde::de::{self, Deserializer};

pub use dimensions::DimensionLimits;

/// What happens when the slideshow steps past either end of the list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OnLastSlide {
    /// Exit as soon as a step would wrap around.
    Quit,
    /// Stay on the boundary entry.
    Hold,
    /// Continue circularly.
    #[default]
    Resume,
}

impl OnLastSlide {
    const ALL: &'static [Self] = &[Self::Quit, Self::Hold, Self::Resume];
    const NAMES: &'static [&'static str] = &["quit", "hold", "resume"];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Quit => "quit",
            Self::Hold => "hold",
            Self::Resume => "resume",
        }
    }
}

impl fmt::Display for OnLastSlide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OnLastSlide {
    type Err = anyhow::Error;

    fn from_str(raw: &str) -> Result<Self> {
        for policy in Self::ALL {
            if raw == policy.as_str() {
                return Ok(*policy);
            }
        }
        Err(anyhow::anyhow!(
            "unknown on-last-slide policy '{}', expected one of: {}",
            raw,
            Self::NAMES.join(", ")
        ))
    }
}

impl<'de> Deserialize<'de> for OnLastSlide {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        Self::from_str(&raw).map_err(|_| de::Error::unknown_variant(&raw, Self::NAMES))
    }
}

/// Ordering applied to the image list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum SortKey {
    /// Display name (basename).
    Name,
    /// Full path as given.
    Filename,
    /// Directory component, then basename.
    Dirname,
    /// Modification time, newest first.
    Mtime,
    /// Size on disk in bytes.
    Size,
    Width,
    Height,
    /// Width times height.
    Pixels,
    /// Decoder format name.
    Format,
}

impl SortKey {
    const ALL: &'static [Self] = &[
        Self::Name,
        Self::Filename,
        Self::Dirname,
        Self::Mtime,
        Self::Size,
        Self::Width,
        Self::Height,
        Self::Pixels,
        Self::Format,
    ];
    const NAMES: &'static [&'static str] = &[
        "name", "filename", "dirname", "mtime", "size", "width", "height", "pixels", "format",
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Name => "name",
            Self::Filename => "filename",
            Self::Dirname => "dirname",
            Self::Mtime => "mtime",
            Self::Size => "size",
            Self::Width => "width",
            Self::Height => "height",
            Self::Pixels => "pixels",
            Self::Format => "format",
        }
    }

    /// Whether comparing by this key needs the lazily loaded info block.
    ///
    /// `mtime` and `size` come from the same stat call that fills the block,
    /// so they count as well.
    pub fn needs_info(&self) -> bool {
        !matches!(self, Self::Name | Self::Filename | Self::Dirname)
    }
}

impl fmt::Display for SortKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SortKey {
    type Err = anyhow::Error;

    fn from_str(raw: &str) -> Result<Self> {
        for key in Self::ALL {
            if raw == key.as_str() {
                return Ok(*key);
            }
        }
        Err(anyhow::anyhow!(
            "unknown sort key '{}', expected one of: {}",
            raw,
            Self::NAMES.join(", ")
        ))
    }
}

impl<'de> Deserialize<'de> for SortKey {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        Self::from_str(&raw).map_err(|_| de::Error::unknown_variant(&raw, Self::NAMES))
    }
}

mod dimensions {
    use super::*;

    /// Inclusive width/height bounds; an image outside them is skipped by
    /// navigation but stays in the list.
    #[derive(Debug, Clone, Copy, Deserialize, Default, PartialEq, Eq)]
    #[serde(rename_all = "kebab-case", default)]
    pub struct DimensionLimits {
        pub min_width: Option<u32>,
        pub min_height: Option<u32>,
        pub max_width: Option<u32>,
        pub max_height: Option<u32>,
    }

    impl DimensionLimits {
        pub fn allows(&self, width: u32, height: u32) -> bool {
            self.min_width.is_none_or(|min| width >= min)
                && self.min_height.is_none_or(|min| height >= min)
                && self.max_width.is_none_or(|max| width <= max)
                && self.max_height.is_none_or(|max| height <= max)
        }

        /// Parse `WxH`; either side may be empty to leave it unbounded.
        pub fn parse_pair(raw: &str) -> Result<(Option<u32>, Option<u32>)> {
            let (w, h) = raw
                .split_once('x')
                .ok_or_else(|| anyhow::anyhow!("expected WIDTHxHEIGHT, got '{raw}'"))?;
            let side = |s: &str| -> Result<Option<u32>> {
                if s.is_empty() {
                    Ok(None)
                } else {
                    Ok(Some(s.parse()?))
                }
            };
            Ok((side(w)?, side(h)?))
        }

        pub fn validate(&self, prefix: &str) -> Result<()> {
            if let (Some(min), Some(max)) = (self.min_width, self.max_width) {
                ensure!(
                    min <= max,
                    "{}.min-width must not exceed {}.max-width",
                    prefix,
                    prefix
                );
            }
            if let (Some(min), Some(max)) = (self.min_height, self.max_height) {
                ensure!(
                    min <= max,
                    "{}.min-height must not exceed {}.max-height",
                    prefix,
                    prefix
                );
            }
            Ok(())
        }
    }
}

/// Process-wide slideshow behaviour.
#[derive(Debug, Clone, Deserialize, Default, PartialEq)]
#[serde(rename_all = "kebab-case", default)]
pub struct SlideshowOptions {
    pub on_last_slide: OnLastSlide,
    /// Shuffle the list; mutually exclusive with `sort`.
    pub randomize: bool,
    pub sort: Option<SortKey>,
    /// Reverse the final order after sorting.
    pub reverse: bool,
    /// Compare names with natural ordering (`img2` before `img10`).
    pub version_sort: bool,
    /// Move the cursor to the first entry after a runtime re-sort.
    pub jump_on_resort: bool,
    /// Keep zoom, pan and rotation across image changes.
    pub keep_viewport: bool,
    /// Load the info block of every entry before the show starts.
    pub preload: bool,
    pub dimensions: DimensionLimits,
}

impl SlideshowOptions {
    /// Resolve the sort/randomize conflict. Returns `true` when a conflict
    /// was found so the caller can warn about it.
    pub fn resolve_order_conflict(&mut self) -> bool {
        if self.randomize && self.sort.is_some() {
            self.sort = None;
            return true;
        }
        false
    }

    pub fn validate(&self) -> Result<()> {
        self.dimensions.validate("slideshow.dimensions")?;
        ensure!(
            !(self.randomize && self.sort.is_some()),
            "slideshow.randomize and slideshow.sort are mutually exclusive"
        );
        Ok(())
    }
}
