// Bid-increment slab editing.
//
// Slabs partition the bid-amount axis into ordered, non-overlapping ranges,
// each with its own increment; the last slab is always open-ended
// (`max_bid == None`). The server derives `bid_price` from these at bid
// time; the client only stages edits and commits them through the
// tournament REST update, never over the socket.

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BidIncrementSlab {
    pub min_bid: u64,
    pub max_bid: Option<u64>,
    pub increment: u64,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SlabError {
    #[error("slab must start above the previous slab's minimum ({previous_min})")]
    OutOfOrder { previous_min: u64 },
    #[error("increment must be greater than zero")]
    ZeroIncrement,
    #[error("at least one slab must remain")]
    LastSlab,
    #[error("no slab at index {0}")]
    BadIndex(usize),
}

/// Staged slab edits. Nothing here touches the server until the controller
/// commits the staged list via the tournament update endpoint.
#[derive(Debug, Clone, PartialEq)]
pub struct SlabEditor {
    slabs: Vec<BidIncrementSlab>,
    dirty: bool,
}

impl SlabEditor {
    /// Start editing from the tournament's current slabs. An empty list is
    /// replaced with a single open-ended default so the at-least-one
    /// invariant holds from the first render.
    pub fn new(mut slabs: Vec<BidIncrementSlab>) -> Self {
        if slabs.is_empty() {
            slabs.push(BidIncrementSlab {
                min_bid: 0,
                max_bid: None,
                increment: 100,
            });
        }
        SlabEditor {
            slabs,
            dirty: false,
        }
    }

    pub fn slabs(&self) -> &[BidIncrementSlab] {
        &self.slabs
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Append a new open-ended slab starting at `min_bid`, closing the
    /// previous last slab at `min_bid - 1`.
    pub fn add(&mut self, min_bid: u64, increment: u64) -> Result<(), SlabError> {
        if increment == 0 {
            return Err(SlabError::ZeroIncrement);
        }
        let last = self.slabs.last_mut().expect("editor never holds zero slabs");
        if min_bid <= last.min_bid {
            return Err(SlabError::OutOfOrder {
                previous_min: last.min_bid,
            });
        }
        last.max_bid = Some(min_bid - 1);
        self.slabs.push(BidIncrementSlab {
            min_bid,
            max_bid: None,
            increment,
        });
        self.dirty = true;
        Ok(())
    }

    /// Remove the slab at `index`. The new last slab re-opens so exactly
    /// one slab stays unbounded.
    pub fn remove(&mut self, index: usize) -> Result<(), SlabError> {
        if self.slabs.len() == 1 {
            return Err(SlabError::LastSlab);
        }
        if index >= self.slabs.len() {
            return Err(SlabError::BadIndex(index));
        }
        self.slabs.remove(index);
        if let Some(last) = self.slabs.last_mut() {
            last.max_bid = None;
        }
        self.dirty = true;
        Ok(())
    }

    /// Change the increment of the slab at `index`; boundaries are edited
    /// only via add/remove so the partition stays well-formed.
    pub fn set_increment(&mut self, index: usize, increment: u64) -> Result<(), SlabError> {
        if increment == 0 {
            return Err(SlabError::ZeroIncrement);
        }
        let slab = self
            .slabs
            .get_mut(index)
            .ok_or(SlabError::BadIndex(index))?;
        slab.increment = increment;
        self.dirty = true;
        Ok(())
    }

    /// Consume the editor, yielding the staged list for the REST commit.
    pub fn into_slabs(self) -> Vec<BidIncrementSlab> {
        self.slabs
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn open_tail_count(editor: &SlabEditor) -> usize {
        editor
            .slabs()
            .iter()
            .filter(|s| s.max_bid.is_none())
            .count()
    }

    fn default_editor() -> SlabEditor {
        SlabEditor::new(vec![
            BidIncrementSlab {
                min_bid: 0,
                max_bid: Some(999),
                increment: 100,
            },
            BidIncrementSlab {
                min_bid: 1000,
                max_bid: None,
                increment: 250,
            },
        ])
    }

    #[test]
    fn empty_input_seeds_one_open_slab() {
        let editor = SlabEditor::new(Vec::new());
        assert_eq!(editor.slabs().len(), 1);
        assert!(editor.slabs()[0].max_bid.is_none());
        assert!(!editor.is_dirty());
    }

    #[test]
    fn add_closes_previous_open_slab() {
        let mut editor = default_editor();
        editor.add(5000, 500).unwrap();

        let slabs = editor.slabs();
        assert_eq!(slabs.len(), 3);
        assert_eq!(slabs[1].max_bid, Some(4999));
        assert_eq!(slabs[2].min_bid, 5000);
        assert!(slabs[2].max_bid.is_none());
        assert_eq!(open_tail_count(&editor), 1);
        assert!(editor.is_dirty());
    }

    #[test]
    fn add_rejects_non_increasing_minimum() {
        let mut editor = default_editor();
        assert_eq!(
            editor.add(1000, 500),
            Err(SlabError::OutOfOrder { previous_min: 1000 })
        );
        // Rejected add leaves the partition untouched.
        assert_eq!(editor, default_editor());
    }

    #[test]
    fn add_rejects_zero_increment() {
        let mut editor = default_editor();
        assert_eq!(editor.add(5000, 0), Err(SlabError::ZeroIncrement));
    }

    #[test]
    fn remove_reopens_new_last_slab() {
        let mut editor = default_editor();
        editor.add(5000, 500).unwrap();
        editor.remove(2).unwrap();

        let slabs = editor.slabs();
        assert_eq!(slabs.len(), 2);
        assert!(slabs[1].max_bid.is_none());
        assert_eq!(open_tail_count(&editor), 1);
    }

    #[test]
    fn remove_middle_slab_keeps_single_open_tail() {
        let mut editor = default_editor();
        editor.add(5000, 500).unwrap();
        editor.remove(1).unwrap();
        assert_eq!(open_tail_count(&editor), 1);
        assert!(editor.slabs().last().unwrap().max_bid.is_none());
    }

    #[test]
    fn last_slab_cannot_be_removed() {
        let mut editor = SlabEditor::new(Vec::new());
        assert_eq!(editor.remove(0), Err(SlabError::LastSlab));
        assert_eq!(editor.slabs().len(), 1);
    }

    #[test]
    fn set_increment_targets_one_slab() {
        let mut editor = default_editor();
        editor.set_increment(0, 50).unwrap();
        assert_eq!(editor.slabs()[0].increment, 50);
        assert_eq!(editor.slabs()[1].increment, 250);
        assert_eq!(editor.set_increment(9, 50), Err(SlabError::BadIndex(9)));
    }

    #[test]
    fn slab_wire_format_is_camel_case() {
        let slab = BidIncrementSlab {
            min_bid: 1000,
            max_bid: None,
            increment: 250,
        };
        let json = serde_json::to_value(&slab).unwrap();
        assert_eq!(json["minBid"], 1000);
        assert_eq!(json["maxBid"], serde_json::Value::Null);
        assert_eq!(json["increment"], 250);
    }
}
