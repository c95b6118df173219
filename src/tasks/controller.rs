//! The event loop that owns a [`PlaylistContext`].
//!
//! One iteration handles exactly one stimulus: a [`ControlEvent`], the
//! slideshow timer or the reload timer.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Result;
use tokio::select;
use tokio::sync::mpsc::Receiver;
use tokio::time::{Instant, sleep_until};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::events::{Command, ControlEvent};
use crate::filelist::{self, Discovery};
use crate::loader::ImageLoader;
use crate::navigation::{Directive, Outcome, PlaylistContext};
use crate::render::Renderer;

const ZOOM_STEP: f32 = 1.25;

#[derive(Debug, Clone)]
pub struct ControllerSettings {
    /// Auto-advance interval.
    pub delay: Option<Duration>,
    /// Full rediscovery interval.
    pub reload: Option<Duration>,
    /// Base name for "save filelist"; a numeric suffix avoids clobbering.
    pub save_base: PathBuf,
}

impl Default for ControllerSettings {
    fn default() -> Self {
        Self {
            delay: None,
            reload: None,
            save_base: PathBuf::from("feh_filelist"),
        }
    }
}

struct Controller<'a, L, R> {
    ctx: &'a mut PlaylistContext<L, R>,
    discovery: Option<Discovery>,
    settings: ControllerSettings,
    paused: bool,
    next_slide: Option<Instant>,
    next_reload: Option<Instant>,
}

/// Drive `ctx` until a quit, a shutdown event, cancellation, or a closed
/// channel. A terminal "no more slides" comes back as an error.
pub async fn run<L, R>(
    ctx: &mut PlaylistContext<L, R>,
    mut events: Receiver<ControlEvent>,
    discovery: Option<Discovery>,
    settings: ControllerSettings,
    cancel: CancellationToken,
) -> Result<()>
where
    L: ImageLoader,
    R: Renderer,
{
    let now = Instant::now();
    let mut controller = Controller {
        next_slide: settings.delay.map(|d| now + d),
        next_reload: settings.reload.map(|d| now + d),
        ctx,
        discovery,
        settings,
        paused: false,
    };

    loop {
        let slide_due = wait_until(controller.next_slide.filter(|_| !controller.paused));
        let reload_due = wait_until(controller.next_reload);
        let outcome = select! {
            _ = cancel.cancelled() => {
                info!("cancel received; exiting controller");
                break;
            }
            event = events.recv() => match event {
                Some(event) => controller.handle(event)?,
                None => {
                    debug!("event channel closed; exiting controller");
                    break;
                }
            },
            () = slide_due => controller.advance()?,
            () = reload_due => {
                controller.next_reload = controller.settings.reload.map(|d| Instant::now() + d);
                controller.reload_list()?
            }
        };
        if outcome == Outcome::Quit {
            info!("slideshow finished");
            break;
        }
    }
    Ok(())
}

async fn wait_until(deadline: Option<Instant>) {
    match deadline {
        Some(at) => sleep_until(at).await,
        None => std::future::pending().await,
    }
}

impl<L: ImageLoader, R: Renderer> Controller<'_, L, R> {
    fn handle(&mut self, event: ControlEvent) -> Result<Outcome> {
        match event {
            ControlEvent::Shutdown => {
                info!("shutdown requested");
                Ok(Outcome::Quit)
            }
            ControlEvent::FileChanged(path) => self.file_changed(&path),
            ControlEvent::Command(cmd) => self.command(cmd),
        }
    }

    fn advance(&mut self) -> Result<Outcome> {
        self.restart_slide_timer();
        Ok(self.ctx.change_image(Directive::Next, true)?)
    }

    fn restart_slide_timer(&mut self) {
        self.next_slide = self.settings.delay.map(|d| Instant::now() + d);
    }

    fn command(&mut self, cmd: Command) -> Result<Outcome> {
        debug!(?cmd, "command");
        let outcome = match cmd {
            Command::Change(directive) => {
                self.restart_slide_timer();
                self.ctx.change_image(directive, true)?
            }
            Command::Jump(n) => {
                self.restart_slide_timer();
                self.ctx.jump_to(n, true)?
            }
            Command::Remove => self.ctx.remove_current(false)?,
            Command::Delete => self.ctx.remove_current(true)?,
            Command::Sort(key) => self.ctx.sort_by(key, true)?,
            Command::ToggleRandomize => {
                let on = !self.ctx.options().randomize;
                self.ctx.set_randomize(on, true)?
            }
            Command::Reload => self.ctx.reload_current(true)?,
            Command::ReloadList => self.reload_list()?,
            Command::SaveFilelist => {
                if let Err(err) = filelist::save_filelist(self.ctx.list(), &self.settings.save_base)
                {
                    warn!("failed to save filelist: {err}");
                }
                Outcome::Unchanged
            }
            Command::ZoomIn => self.adjust_view(|vp| vp.zoom_by(ZOOM_STEP)),
            Command::ZoomOut => self.adjust_view(|vp| vp.zoom_by(1.0 / ZOOM_STEP)),
            Command::Rotate => self.adjust_view(|vp| vp.rotate_cw()),
            Command::Pan(dx, dy) => self.adjust_view(|vp| vp.pan(dx, dy)),
            Command::Caption(text) => match self.ctx.edit_caption(&text) {
                Ok(outcome) => outcome,
                Err(err) => {
                    warn!("failed to save caption: {err}");
                    Outcome::Unchanged
                }
            },
            Command::TogglePause => {
                self.paused = !self.paused;
                if !self.paused {
                    self.restart_slide_timer();
                }
                info!(paused = self.paused, "slideshow timer toggled");
                Outcome::Unchanged
            }
            Command::Info => {
                let path = self.ctx.current().map(|e| e.path().to_path_buf());
                if let (Some((position, total)), Some(path)) = (self.ctx.position(), path) {
                    info!(position, total, path = %path.display(), "current slide");
                }
                Outcome::Unchanged
            }
            Command::Quit => Outcome::Quit,
        };
        Ok(outcome)
    }

    fn adjust_view(&mut self, change: impl FnOnce(&mut crate::render::Viewport)) -> Outcome {
        change(self.ctx.viewport_mut());
        self.ctx.render();
        Outcome::Unchanged
    }

    fn file_changed(&mut self, path: &Path) -> Result<Outcome> {
        let Some(current) = self.ctx.current().map(|e| e.path().to_path_buf()) else {
            return Ok(Outcome::Unchanged);
        };
        if same_file(&current, path) {
            info!(path = %current.display(), "displayed file changed on disk; reloading");
            return Ok(self.ctx.reload_current(true)?);
        }
        self.ctx.invalidate(path);
        Ok(Outcome::Unchanged)
    }

    fn reload_list(&mut self) -> Result<Outcome> {
        let Some(discovery) = self.discovery.as_mut() else {
            debug!("no sources to rediscover");
            return Ok(Outcome::Unchanged);
        };
        let list = discovery.discover()?;
        info!(entries = list.len(), "reloading list");
        Ok(self.ctx.replace_list(list, true)?)
    }
}

/// Entry paths may be relative while watcher paths are absolute.
fn same_file(entry: &Path, changed: &Path) -> bool {
    if entry == changed {
        return true;
    }
    if std::path::absolute(entry).is_ok_and(|abs| abs == changed) {
        return true;
    }
    match (fs::canonicalize(entry), fs::canonicalize(changed)) {
        (Ok(a), Ok(b)) => a == b,
        (Ok(a), Err(_)) => a == changed,
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_file_matches_relative_and_absolute() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("a.png");
        fs::write(&file, b"x").unwrap();
        assert!(same_file(&file, &file));
        assert!(same_file(&file, &fs::canonicalize(&file).unwrap()));
        assert!(!same_file(&file, &dir.path().join("b.png")));
    }
}
