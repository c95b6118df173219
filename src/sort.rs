use std::cmp::Ordering;

use config_model::{SlideshowOptions, SortKey};
use tracing::{debug, warn};

use crate::entry::{FileEntry, FileInfo};
use crate::list::ImageList;

/// A comparator plus the post-sort adjustments that go with it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SortPolicy {
    pub key: SortKey,
    pub reverse: bool,
    pub version_sort: bool,
}

impl SortPolicy {
    pub fn new(key: SortKey) -> Self {
        Self {
            key,
            reverse: false,
            version_sort: false,
        }
    }

    /// The configured policy, or `None` when the list keeps discovery order.
    pub fn from_options(opts: &SlideshowOptions) -> Option<Self> {
        opts.sort.map(|key| Self {
            key,
            reverse: opts.reverse,
            version_sort: opts.version_sort,
        })
    }

    /// Total order over two entries. Info-based keys expect the info block
    /// to be loaded already (see [`sort_list`]); entries without one sort
    /// after every entry that has one. Ties break on the path.
    pub fn compare(&self, a: &FileEntry, b: &FileEntry) -> Ordering {
        let primary = match self.key {
            SortKey::Name => self.compare_text(a.name(), b.name()),
            SortKey::Filename => {
                self.compare_text(&a.path().to_string_lossy(), &b.path().to_string_lossy())
            }
            SortKey::Dirname => self
                .compare_text(&a.dir().to_string_lossy(), &b.dir().to_string_lossy())
                .then_with(|| self.compare_text(a.name(), b.name())),
            // Newest first.
            SortKey::Mtime => by_info(a, b, |x, y| y.mtime.cmp(&x.mtime)),
            SortKey::Size => by_info(a, b, |x, y| x.size.cmp(&y.size)),
            SortKey::Width => by_info(a, b, |x, y| x.width.cmp(&y.width)),
            SortKey::Height => by_info(a, b, |x, y| x.height.cmp(&y.height)),
            SortKey::Pixels => by_info(a, b, |x, y| x.pixels.cmp(&y.pixels)),
            SortKey::Format => by_info(a, b, |x, y| x.format.cmp(&y.format)),
        };
        primary.then_with(|| a.path().cmp(b.path()))
    }

    fn compare_text(&self, a: &str, b: &str) -> Ordering {
        if self.version_sort {
            natord::compare(a, b)
        } else {
            a.cmp(b)
        }
    }
}

fn by_info<F>(a: &FileEntry, b: &FileEntry, cmp: F) -> Ordering
where
    F: Fn(&FileInfo, &FileInfo) -> Ordering,
{
    match (a.info(), b.info()) {
        (Some(x), Some(y)) => cmp(x, y),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

/// Sort `list` under `policy`, loading info blocks first when the key
/// needs them. Returns how many entries could not be probed.
pub fn sort_list(list: &mut ImageList, policy: &SortPolicy) -> usize {
    let mut unprobed = 0;
    if policy.key.needs_info() {
        for id in list.ids() {
            let Some(entry) = list.get_mut(id) else {
                continue;
            };
            if let Err(err) = entry.load_info().map(|_| ()) {
                warn!(path = %entry.path().display(), "cannot sort by {}: {err}", policy.key);
                unprobed += 1;
            }
        }
    }
    list.sort_by(|a, b| policy.compare(a, b));
    if policy.reverse {
        list.reverse();
    }
    debug!(key = %policy.key, reverse = policy.reverse, len = list.len(), "list sorted");
    unprobed
}
