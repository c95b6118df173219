//! Absolute positioning over [`ImageList`].
//!
//! A seek walks from whichever of the cursor or the anchor is closer to the
//! target, using the cached position counters to decide.

use tracing::trace;

use crate::list::{ImageList, NodeId};

/// Where a seek ended and how many links it followed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Seek {
    pub node: NodeId,
    pub steps: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Origin {
    Cursor,
    AnchorForward,
    AnchorBackward,
}

impl ImageList {
    /// Move from `from` to 1-based position `target`.
    ///
    /// `target` is clamped into `1..=len`; anything at or past the end lands
    /// on the tail in one step. On an empty list the anchor is returned.
    pub fn seek(&mut self, from: NodeId, target: usize) -> Seek {
        let anchor = self.anchor();
        if self.is_empty() {
            return Seek {
                node: anchor,
                steps: 0,
            };
        }
        if self.is_dirty() {
            self.recount();
        }
        let total = self.len();
        let target = target.max(1);
        let cur = if self.contains(from) {
            self.cached_count(from).unwrap_or(0)
        } else {
            0
        };

        if target == cur {
            return Seek {
                node: from,
                steps: 0,
            };
        }
        if target >= total {
            return Seek {
                node: self.prev_of(anchor),
                steps: 1,
            };
        }

        let from_cursor = target.abs_diff(cur);
        let from_head = target;
        let from_tail = total + 1 - target;
        let origin = if from_cursor <= from_head && from_cursor <= from_tail {
            Origin::Cursor
        } else if from_head <= from_tail {
            Origin::AnchorForward
        } else {
            Origin::AnchorBackward
        };

        let (start, distance, forward) = match origin {
            Origin::Cursor if cur == 0 => (anchor, from_head, true),
            Origin::Cursor => (from, from_cursor, target > cur),
            Origin::AnchorForward => (anchor, from_head, true),
            Origin::AnchorBackward => (anchor, from_tail, false),
        };
        let mut node = start;
        for _ in 0..distance {
            node = if forward {
                self.next_of(node)
            } else {
                self.prev_of(node)
            };
        }
        trace!(target, cur, total, ?origin, steps = distance, "seek");
        Seek {
            node,
            steps: distance,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entry::FileEntry;

    fn list_of_len(n: usize) -> ImageList {
        (1..=n)
            .map(|i| FileEntry::new(format!("img{i:04}.jpg")).unwrap())
            .collect()
    }

    #[test]
    fn lands_on_every_position() {
        let mut list = list_of_len(37);
        let ids = list.ids();
        for from in [list.anchor(), ids[0], ids[18], ids[36]] {
            for p in 1..=37 {
                let seek = list.seek(from, p);
                assert_eq!(list.cached_count(seek.node), Some(p), "from {from:?} to {p}");
            }
        }
    }

    #[test]
    fn steps_stay_near_the_shorter_distance() {
        let n = 200;
        let mut list = list_of_len(n);
        let ids = list.ids();
        for cur in [0usize, 10, 99, 150, 199] {
            for p in [1usize, 2, 50, 100, 101, 180, 199] {
                let seek = list.seek(ids[cur], p);
                let d = p.abs_diff(cur + 1);
                let bound = d.min(n - d) + 2;
                assert!(seek.steps <= bound, "cur {} p {p}: {} > {bound}", cur + 1, seek.steps);
            }
        }
    }

    #[test]
    fn near_head_from_near_tail_walks_from_anchor() {
        let mut list = list_of_len(1000);
        let ids = list.ids();
        let seek = list.seek(ids[998], 1);
        assert_eq!(seek.node, ids[0]);
        assert!(seek.steps <= 2, "took {} steps", seek.steps);
    }

    #[test]
    fn same_position_is_a_no_op() {
        let mut list = list_of_len(5);
        let ids = list.ids();
        let seek = list.seek(ids[2], 3);
        assert_eq!(seek, Seek { node: ids[2], steps: 0 });
    }

    #[test]
    fn past_the_end_clamps_to_tail() {
        let mut list = list_of_len(5);
        let ids = list.ids();
        assert_eq!(list.seek(ids[0], 99).node, ids[4]);
        assert_eq!(list.seek(ids[0], 5).node, ids[4]);
    }

    #[test]
    fn recounts_dirty_lists_before_trusting_counters() {
        let mut list = list_of_len(5);
        list.add_front(FileEntry::new("front.jpg").unwrap());
        let first = list.first().unwrap();
        let seek = list.seek(list.anchor(), 1);
        assert_eq!(seek.node, first);
        assert!(!list.is_dirty());
    }

    #[test]
    fn empty_list_returns_anchor() {
        let mut list = ImageList::new();
        let anchor = list.anchor();
        assert_eq!(list.seek(anchor, 3).node, anchor);
    }
}
