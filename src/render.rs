use std::io::Write;

use tracing::warn;

use crate::entry::FileEntry;
use crate::loader::ImageHandle;

const ZOOM_MIN: f32 = 0.01;
const ZOOM_MAX: f32 = 64.0;

/// Per-image view state: zoom, pan and rotation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    pub zoom: f32,
    pub pan_x: i32,
    pub pan_y: i32,
    /// Clockwise rotation in degrees, always a multiple of 90.
    pub rotation: u16,
}

impl Default for Viewport {
    fn default() -> Self {
        Self {
            zoom: 1.0,
            pan_x: 0,
            pan_y: 0,
            rotation: 0,
        }
    }
}

impl Viewport {
    pub fn zoom_by(&mut self, factor: f32) {
        self.zoom = (self.zoom * factor).clamp(ZOOM_MIN, ZOOM_MAX);
    }

    pub fn pan(&mut self, dx: i32, dy: i32) {
        self.pan_x = self.pan_x.saturating_add(dx);
        self.pan_y = self.pan_y.saturating_add(dy);
    }

    pub fn rotate_cw(&mut self) {
        self.rotation = (self.rotation + 90) % 360;
    }
}

/// Everything a renderer needs to draw the current slide.
#[derive(Debug)]
pub struct Frame<'a> {
    pub entry: &'a FileEntry,
    pub image: &'a ImageHandle,
    pub viewport: &'a Viewport,
    /// 1-based position of `entry` in the list.
    pub position: usize,
    pub total: usize,
    pub caption: Option<&'a str>,
}

impl Frame<'_> {
    /// Window title in the classic `feh [3 of 12] - path` form.
    pub fn title(&self) -> String {
        format!(
            "feh [{} of {}] - {}",
            self.position,
            self.total,
            self.entry.path().display()
        )
    }
}

pub trait Renderer {
    fn render(&mut self, frame: &Frame<'_>);
}

/// Writes one title line per rendered frame, plus the caption when present.
#[derive(Debug)]
pub struct TitleRenderer<W: Write> {
    out: W,
}

impl<W: Write> TitleRenderer<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    pub fn get_ref(&self) -> &W {
        &self.out
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write> Renderer for TitleRenderer<W> {
    fn render(&mut self, frame: &Frame<'_>) {
        let mut line = frame.title();
        let vp = frame.viewport;
        if *vp != Viewport::default() {
            line.push_str(&format!(
                " ({}x{} @ {:.0}%, {}°)",
                frame.image.width(),
                frame.image.height(),
                vp.zoom * 100.0,
                vp.rotation
            ));
        }
        if let Some(caption) = frame.caption {
            line.push_str(" | ");
            line.push_str(caption);
        }
        if let Err(err) = writeln!(self.out, "{line}").and_then(|()| self.out.flush()) {
            warn!("render output failed: {err}");
        }
    }
}
