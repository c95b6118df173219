use std::path::PathBuf;
use std::str::FromStr;

use anyhow::{Result, anyhow};
use config_model::SortKey;

use crate::navigation::Directive;

const PAN_STEP: i32 = 50;

/// A user action, typed as a word on stdin or forwarded from a signal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Change(Directive),
    Jump(usize),
    /// Drop the displayed entry from the list.
    Remove,
    /// Drop the displayed entry and delete its file.
    Delete,
    Sort(SortKey),
    ToggleRandomize,
    Reload,
    ReloadList,
    SaveFilelist,
    ZoomIn,
    ZoomOut,
    Rotate,
    /// Shift the viewport by `(dx, dy)` pixels.
    Pan(i32, i32),
    /// Replace the displayed entry's caption and write it to disk.
    Caption(String),
    TogglePause,
    Info,
    Quit,
}

impl FromStr for Command {
    type Err = anyhow::Error;

    fn from_str(raw: &str) -> Result<Self> {
        let word = raw.trim();
        if let Ok(n) = word.parse::<usize>() {
            return Ok(Self::Jump(n));
        }
        if let Some(key) = word.strip_prefix("sort ") {
            return Ok(Self::Sort(key.trim().parse()?));
        }
        if let Some(text) = word.strip_prefix("caption ") {
            return Ok(Self::Caption(text.trim().to_string()));
        }
        if let Some(offsets) = word.strip_prefix("pan ") {
            let mut parts = offsets.split_whitespace().map(str::parse::<i32>);
            return match (parts.next(), parts.next(), parts.next()) {
                (Some(Ok(dx)), Some(Ok(dy)), None) => Ok(Self::Pan(dx, dy)),
                _ => Err(anyhow!("pan expects two integer offsets, got '{offsets}'")),
            };
        }
        let cmd = match word {
            "" | "n" | "next" => Self::Change(Directive::Next),
            "p" | "prev" | "b" => Self::Change(Directive::Prev),
            "z" | "random" => Self::Change(Directive::Random),
            "^" | "first" | "home" => Self::Change(Directive::First),
            "$" | "last" | "end" => Self::Change(Directive::Last),
            "pgdn" | "jump" => Self::Change(Directive::JumpForward),
            "pgup" | "jump-back" => Self::Change(Directive::JumpBackward),
            "]" | "next-dir" => Self::Change(Directive::JumpNextDir),
            "[" | "prev-dir" => Self::Change(Directive::JumpPrevDir),
            "remove" | "del" => Self::Remove,
            "delete" => Self::Delete,
            "randomize" => Self::ToggleRandomize,
            "r" | "reload" => Self::Reload,
            "R" | "reload-list" => Self::ReloadList,
            "f" | "save-filelist" => Self::SaveFilelist,
            "+" | "zoom-in" => Self::ZoomIn,
            "-" | "zoom-out" => Self::ZoomOut,
            ">" | "rotate" => Self::Rotate,
            "left" => Self::Pan(-PAN_STEP, 0),
            "right" => Self::Pan(PAN_STEP, 0),
            "up" => Self::Pan(0, -PAN_STEP),
            "down" => Self::Pan(0, PAN_STEP),
            "h" | "pause" => Self::TogglePause,
            "i" | "info" => Self::Info,
            "q" | "quit" => Self::Quit,
            other => return Err(anyhow!("unknown command '{other}'")),
        };
        Ok(cmd)
    }
}

/// Everything the controller reacts to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ControlEvent {
    Command(Command),
    /// A watched file was written, created or removed.
    FileChanged(PathBuf),
    Shutdown,
}
