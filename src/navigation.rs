//! Slideshow navigation over an [`ImageList`].
//!
//! [`PlaylistContext`] owns the list, the cursor and the displayed image.
//! Every movement goes through one retry loop: step, try to load, and on
//! failure mark the entry for removal and step again in the retry
//! direction. The marked entry is only unlinked once the next candidate
//! has been computed, so the walk never follows a dangling link.

use std::fs;
use std::path::{Path, PathBuf};

use config_model::{OnLastSlide, SlideshowOptions, SortKey};
use rand::{Rng, SeedableRng};
use rand::rngs::StdRng;
use tracing::{debug, info, warn};

use crate::entry::FileEntry;
use crate::error::{Error, LoadError};
use crate::filelist;
use crate::list::{ImageList, NodeId};
use crate::loader::{ImageHandle, ImageLoader};
use crate::render::{Frame, Renderer, Viewport};
use crate::sort::{SortPolicy, sort_list};

/// A requested movement through the list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Directive {
    Next,
    Prev,
    Random,
    First,
    Last,
    JumpForward,
    JumpBackward,
    JumpNextDir,
    JumpPrevDir,
    /// Absolute 1-based position.
    Position(usize),
}

impl Directive {
    /// Direction used for retries after the first step fails to load.
    fn retry_forward(self) -> bool {
        !matches!(self, Self::Prev | Self::Last | Self::JumpBackward)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// A new image is displayed.
    Shown,
    /// The display did not change.
    Unchanged,
    /// The slideshow should exit.
    Quit,
}

/// Why a walk stopped before landing on an entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Halt {
    Hold,
    Quit,
}

/// Step size for jump directives.
pub fn jump_size(len: usize) -> usize {
    if len < 5 {
        1
    } else if len < 40 {
        2
    } else {
        len / 20
    }
}

pub struct PlaylistContext<L, R> {
    list: ImageList,
    /// The anchor while nothing has been displayed.
    current: NodeId,
    pending_removal: Option<NodeId>,
    image: Option<ImageHandle>,
    viewport: Viewport,
    options: SlideshowOptions,
    caption_dir: Option<PathBuf>,
    verbose: bool,
    loader: L,
    renderer: R,
    rng: StdRng,
}

impl<L: ImageLoader, R: Renderer> PlaylistContext<L, R> {
    /// Fails with [`Error::EmptyList`] when there is nothing to show.
    pub fn new(
        list: ImageList,
        mut options: SlideshowOptions,
        loader: L,
        renderer: R,
    ) -> Result<Self, Error> {
        if list.is_empty() {
            return Err(Error::EmptyList);
        }
        if options.resolve_order_conflict() {
            warn!("randomize and sort both requested; sorting is disabled");
        }
        Ok(Self {
            current: list.anchor(),
            list,
            pending_removal: None,
            image: None,
            viewport: Viewport::default(),
            options,
            caption_dir: None,
            verbose: false,
            loader,
            renderer,
            rng: StdRng::from_os_rng(),
        })
    }

    /// Deterministic shuffles.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.rng = StdRng::seed_from_u64(seed);
        self
    }

    pub fn with_caption_dir(mut self, dir: Option<PathBuf>) -> Self {
        self.caption_dir = dir;
        self
    }

    /// Print per-entry status marks to stderr while preloading.
    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    pub fn list(&self) -> &ImageList {
        &self.list
    }

    pub fn options(&self) -> &SlideshowOptions {
        &self.options
    }

    pub fn current(&self) -> Option<&FileEntry> {
        self.list.get(self.current)
    }

    pub fn current_id(&self) -> Option<NodeId> {
        self.list.contains(self.current).then_some(self.current)
    }

    pub fn image(&self) -> Option<&ImageHandle> {
        self.image.as_ref()
    }

    pub fn viewport(&self) -> &Viewport {
        &self.viewport
    }

    pub fn viewport_mut(&mut self) -> &mut Viewport {
        &mut self.viewport
    }

    pub fn renderer(&self) -> &R {
        &self.renderer
    }

    /// `(position, total)` of the displayed entry.
    pub fn position(&mut self) -> Option<(usize, usize)> {
        let total = self.list.len();
        self.list.position_of(self.current).map(|p| (p, total))
    }

    /// Apply the initial order and display the first loadable entry.
    pub fn start(&mut self, render: bool) -> Result<Outcome, Error> {
        self.prepare()?;
        self.current = self.list.anchor();
        self.traverse(Directive::First, render, None)
    }

    /// Like [`start`](Self::start) but begin at `path` when it is listed.
    pub fn start_at(&mut self, path: &Path, render: bool) -> Result<Outcome, Error> {
        self.prepare()?;
        match self.list.find_path(path) {
            Some(id) => {
                self.current = self.list.prev_of(id);
                self.traverse(Directive::Next, render, None)
            }
            None => {
                warn!(path = %path.display(), "start-at entry not in list; starting at the first entry");
                self.current = self.list.anchor();
                self.traverse(Directive::First, render, None)
            }
        }
    }

    /// Move through the list and display the resulting entry.
    ///
    /// A list with fewer than two entries only reacts under the quit
    /// policy. Returns [`Error::NoMoreSlides`] once every candidate failed.
    pub fn change_image(&mut self, directive: Directive, render: bool) -> Result<Outcome, Error> {
        let quits = self.options.on_last_slide == OnLastSlide::Quit;
        if self.list.is_empty() {
            return Ok(if quits { Outcome::Quit } else { Outcome::Unchanged });
        }
        if self.list.len() < 2 && !quits {
            return Ok(Outcome::Unchanged);
        }
        self.traverse(directive, render, None)
    }

    /// Jump to 1-based position `n`, skipping forward past failures.
    pub fn jump_to(&mut self, n: usize, render: bool) -> Result<Outcome, Error> {
        self.change_image(Directive::Position(n), render)
    }

    /// Drop the displayed entry from the list, and from disk with `delete`,
    /// then show its successor.
    pub fn remove_current(&mut self, delete: bool) -> Result<Outcome, Error> {
        let doomed = self.current;
        if !self.list.contains(doomed) {
            return Ok(Outcome::Unchanged);
        }
        let is_tail = self.list.last() == Some(doomed);
        let step = if self.list.len() == 1 {
            None
        } else {
            match (is_tail, self.options.on_last_slide) {
                (true, OnLastSlide::Quit) => None,
                (true, OnLastSlide::Hold) => Some(Directive::Prev),
                _ => Some(Directive::Next),
            }
        };
        let result = match step {
            Some(directive) => self.traverse(directive, false, Some(doomed)),
            None => Ok(Outcome::Quit),
        };

        self.detach(doomed, delete);
        if self.list.is_empty() {
            info!("list is empty after removal");
            return Ok(Outcome::Quit);
        }
        let outcome = result?;
        if outcome == Outcome::Shown {
            self.render();
        }
        Ok(outcome)
    }

    /// Re-read the displayed entry from disk, keeping the viewport.
    pub fn reload_current(&mut self, render: bool) -> Result<Outcome, Error> {
        let Some(entry) = self.list.get_mut(self.current) else {
            return Ok(Outcome::Unchanged);
        };
        entry.invalidate();
        let path = entry.path().to_path_buf();
        match self.loader.load(&path) {
            Ok(image) => {
                debug!(path = %path.display(), "reloaded in place");
                self.image = Some(image);
                if render {
                    self.render();
                }
                Ok(Outcome::Shown)
            }
            Err(err) => {
                self.report_failure(&path, &err);
                self.remove_current(false)
            }
        }
    }

    /// Replace the displayed entry's caption, write it to the caption path
    /// and redraw.
    pub fn edit_caption(&mut self, text: &str) -> Result<Outcome, Error> {
        let Some(dir) = self.caption_dir.clone() else {
            warn!("no caption path configured; caption not saved");
            return Ok(Outcome::Unchanged);
        };
        let Some(entry) = self.list.get_mut(self.current) else {
            return Ok(Outcome::Unchanged);
        };
        entry.set_caption(&dir, text)?;
        debug!(path = %entry.path().display(), "caption updated");
        self.render();
        Ok(Outcome::Unchanged)
    }

    /// Drop cached info for `path` so the next probe re-reads it.
    pub fn invalidate(&mut self, path: &Path) {
        if let Some(id) = self.list.find_path(path)
            && let Some(entry) = self.list.get_mut(id)
        {
            entry.invalidate();
        }
    }

    /// Sort by `key`, turning randomize off.
    pub fn sort_by(&mut self, key: SortKey, render: bool) -> Result<Outcome, Error> {
        if self.options.randomize {
            warn!("sorting turns randomize off");
            self.options.randomize = false;
        }
        self.options.sort = Some(key);
        if let Some(policy) = SortPolicy::from_options(&self.options) {
            sort_list(&mut self.list, &policy);
        }
        self.after_reorder(render)
    }

    /// Turn randomize on (reshuffling now) or off.
    pub fn set_randomize(&mut self, on: bool, render: bool) -> Result<Outcome, Error> {
        self.options.randomize = on;
        if !on {
            return Ok(Outcome::Unchanged);
        }
        if let Some(key) = self.options.sort.take() {
            warn!(%key, "randomize turns sorting off");
        }
        self.list.randomize(&mut self.rng);
        self.after_reorder(render)
    }

    /// Swap in a freshly discovered list, staying on the displayed path when
    /// it is still present.
    pub fn replace_list(&mut self, list: ImageList, render: bool) -> Result<Outcome, Error> {
        let keep = self.current().map(|e| e.path().to_path_buf());
        self.list = list;
        self.pending_removal = None;
        if self.list.is_empty() {
            self.current = self.list.anchor();
            self.image = None;
            return Err(Error::NoMoreSlides);
        }
        self.apply_order();
        match keep.and_then(|p| self.list.find_path(&p)) {
            Some(id) => {
                self.current = id;
                if render {
                    self.render();
                }
                Ok(Outcome::Unchanged)
            }
            None => {
                self.current = self.list.anchor();
                self.image = None;
                self.traverse(Directive::First, render, None)
            }
        }
    }

    /// Draw the displayed image again, e.g. after a viewport change.
    pub fn render(&mut self) {
        let Some(image) = self.image.as_ref() else {
            return;
        };
        let total = self.list.len();
        let position = self.list.position_of(self.current).unwrap_or(0);
        let Some(entry) = self.list.get_mut(self.current) else {
            return;
        };
        let caption = match self.caption_dir.as_deref() {
            Some(dir) => entry.caption(dir).map(str::to_owned),
            None => None,
        };
        let frame = Frame {
            entry,
            image,
            viewport: &self.viewport,
            position,
            total,
            caption: caption.as_deref(),
        };
        self.renderer.render(&frame);
    }

    fn prepare(&mut self) -> Result<(), Error> {
        let needs_info =
            self.options.preload || self.options.sort.is_some_and(|key| key.needs_info());
        if needs_info {
            filelist::preload_info(&mut self.list, self.verbose);
        }
        if self.list.is_empty() {
            return Err(Error::EmptyList);
        }
        self.apply_order();
        Ok(())
    }

    fn apply_order(&mut self) {
        if self.options.randomize {
            self.list.randomize(&mut self.rng);
        } else if let Some(policy) = SortPolicy::from_options(&self.options) {
            sort_list(&mut self.list, &policy);
        } else if self.options.reverse {
            self.list.reverse();
        }
    }

    fn after_reorder(&mut self, render: bool) -> Result<Outcome, Error> {
        if self.options.jump_on_resort {
            return self.traverse(Directive::First, render, None);
        }
        if render {
            self.render();
        }
        Ok(Outcome::Unchanged)
    }

    /// The retry loop. `exclude` is never displayed (the entry being removed).
    fn traverse(
        &mut self,
        directive: Directive,
        render: bool,
        exclude: Option<NodeId>,
    ) -> Result<Outcome, Error> {
        let budget = self.list.len();
        let start = self.current;
        let forward = directive.retry_forward();
        let mut cursor = self.current;

        for attempt in 0..budget {
            let step = if attempt == 0 {
                self.first_step(directive, cursor)
            } else {
                self.walk(cursor, forward, 1, true)
            };
            let candidate = match step {
                Ok(node) => node,
                Err(Halt::Quit) => {
                    self.flush_pending();
                    info!("reached the end of the list; quitting");
                    return Ok(Outcome::Quit);
                }
                Err(Halt::Hold) => {
                    self.flush_pending();
                    if Some(start) != exclude && self.list.contains(start) && start == self.current
                    {
                        debug!("holding at the end of the list");
                        return Ok(Outcome::Unchanged);
                    }
                    break;
                }
            };
            // The failed entry is only unlinked now that the walk has left it.
            self.flush_pending();
            if !self.list.contains(candidate) {
                break;
            }
            cursor = candidate;
            if Some(candidate) == exclude {
                continue;
            }
            let Some(path) = self.list.get(candidate).map(|e| e.path().to_path_buf()) else {
                break;
            };
            match self.loader.load(&path) {
                Ok(image) => {
                    if !self.options.dimensions.allows(image.width(), image.height()) {
                        debug!(
                            path = %path.display(),
                            width = image.width(),
                            height = image.height(),
                            "outside dimension limits; skipping"
                        );
                        continue;
                    }
                    self.show(candidate, image, render);
                    return Ok(Outcome::Shown);
                }
                Err(err) => {
                    self.report_failure(&path, &err);
                    self.pending_removal = Some(candidate);
                }
            }
        }

        self.flush_pending();
        warn!("no more slides in show");
        Err(Error::NoMoreSlides)
    }

    fn first_step(&mut self, directive: Directive, from: NodeId) -> Result<NodeId, Halt> {
        let len = self.list.len();
        match directive {
            Directive::Next => self.walk(from, true, 1, true),
            Directive::Prev => self.walk(from, false, 1, true),
            Directive::First => self.walk(self.list.anchor(), true, 1, true),
            Directive::Last => self.walk(self.list.anchor(), false, 1, true),
            Directive::JumpForward => self.jump(from, true, jump_size(len)),
            Directive::JumpBackward => self.jump(from, false, jump_size(len)),
            Directive::Random => {
                let offset = if self.list.contains(from) && len > 1 {
                    self.rng.random_range(1..len)
                } else {
                    self.rng.random_range(1..=len.max(1))
                };
                self.walk(from, true, offset, false)
            }
            Directive::JumpNextDir => self.next_dir(from),
            Directive::JumpPrevDir => self.prev_dir(from),
            Directive::Position(n) => Ok(self.list.seek(from, n).node),
        }
    }

    /// Follow `steps` links. Crossing the anchor applies the end-of-list
    /// policy when `honor_policy` is set; leaving the anchor itself is not a
    /// wrap.
    fn walk(
        &mut self,
        from: NodeId,
        forward: bool,
        steps: usize,
        honor_policy: bool,
    ) -> Result<NodeId, Halt> {
        let anchor = self.list.anchor();
        let mut node = from;
        for _ in 0..steps {
            if self.list.is_empty() {
                return Ok(anchor);
            }
            let next = self.neighbor(node, forward);
            node = if self.list.is_anchor(next) && !self.list.is_anchor(node) {
                if honor_policy {
                    match self.options.on_last_slide {
                        OnLastSlide::Quit => return Err(Halt::Quit),
                        OnLastSlide::Hold => return Err(Halt::Hold),
                        OnLastSlide::Resume => {}
                    }
                    if forward && self.options.randomize {
                        // The walk continues from the anchor, so a failed
                        // entry can go now instead of being shuffled back in.
                        self.flush_pending();
                        self.list.randomize(&mut self.rng);
                        debug!("wrapped forward; list reshuffled");
                    }
                }
                self.neighbor(anchor, forward)
            } else {
                next
            };
        }
        Ok(node)
    }

    /// A chunked walk. Under HOLD a jump past the end stops on the boundary
    /// entry instead of staying put.
    fn jump(&mut self, from: NodeId, forward: bool, steps: usize) -> Result<NodeId, Halt> {
        match self.walk(from, forward, steps, true) {
            Err(Halt::Hold) => {
                let edge = if forward { self.list.last() } else { self.list.first() };
                match edge {
                    Some(edge) if edge != from => Ok(edge),
                    _ => Err(Halt::Hold),
                }
            }
            other => other,
        }
    }

    fn neighbor(&self, node: NodeId, forward: bool) -> NodeId {
        if forward {
            self.list.next_of(node)
        } else {
            self.list.prev_of(node)
        }
    }

    fn dir_of(&self, node: NodeId) -> Option<PathBuf> {
        self.list.get(node).map(|e| e.dir().to_path_buf())
    }

    /// First entry after `from` in a different directory.
    fn next_dir(&mut self, from: NodeId) -> Result<NodeId, Halt> {
        let origin = self.dir_of(from);
        let mut node = from;
        for _ in 0..self.list.len() {
            node = self.walk(node, true, 1, true)?;
            if self.dir_of(node) != origin {
                break;
            }
        }
        Ok(node)
    }

    /// First entry of the directory before the one `from` is in.
    fn prev_dir(&mut self, from: NodeId) -> Result<NodeId, Halt> {
        let mut node = self.walk(from, false, 1, true)?;
        let origin = self.dir_of(node);
        for _ in 0..self.list.len() {
            node = self.walk(node, false, 1, true)?;
            if self.dir_of(node) != origin {
                break;
            }
        }
        self.walk(node, true, 1, true)
    }

    fn show(&mut self, node: NodeId, image: ImageHandle, render: bool) {
        self.current = node;
        self.image = Some(image);
        if !self.options.keep_viewport {
            self.viewport = Viewport::default();
        }
        if let Some(entry) = self.list.get(node) {
            debug!(path = %entry.path().display(), "now showing");
        }
        if render {
            self.render();
        }
    }

    fn flush_pending(&mut self) {
        if let Some(id) = self.pending_removal.take() {
            self.detach(id, false);
        }
    }

    fn detach(&mut self, id: NodeId, delete: bool) {
        if id == self.current {
            self.current = self.list.anchor();
            self.image = None;
        }
        let Some(entry) = self.list.remove(id) else {
            return;
        };
        debug!(path = %entry.path().display(), remaining = self.list.len(), "removed from list");
        if delete {
            match fs::remove_file(entry.path()) {
                Ok(()) => info!(path = %entry.path().display(), "deleted file"),
                Err(err) => warn!(path = %entry.path().display(), "failed to delete file: {err}"),
            }
        }
    }

    fn report_failure(&self, path: &Path, err: &LoadError) {
        warn!(path = %path.display(), kind = err.label(), "couldn't load image: {err}");
        if self.verbose {
            eprint!("{}", err.mark());
        }
    }
}
