//! Drag-and-drop placement contract shared with tree renderers.
//!
//! # Responsibility
//! - Map a pointer position over a target row to a `DropPosition`.
//! - Decide when a hovered collapsed folder should auto-expand.
//!
//! # Invariants
//! - Folder rows split 25% / 50% / 25% into `Before` / `Inside` / `After`.
//! - Document rows split 50% / 50% into `Before` / `After`.
//! - Resolution never returns `Inside` for a document row.

use crate::model::page::PageId;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};

/// Sustained hover needed before a collapsed folder auto-expands.
pub const FOLDER_HOVER_EXPAND_DELAY: Duration = Duration::from_millis(600);

const FOLDER_EDGE_RATIO: f32 = 0.25;

/// Where a dragged page lands relative to the drop target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DropPosition {
    /// Sibling placed directly above the target.
    Before,
    /// Sibling placed directly below the target.
    After,
    /// Last child of the target folder.
    Inside,
}

/// Resolves the drop position from the pointer offset inside the target row.
///
/// `pointer_offset` is measured from the top edge of the row. Offsets outside
/// the row are clamped. A degenerate row height resolves to `Inside` for
/// folders and `After` for documents.
pub fn resolve_drop_position(
    target_is_folder: bool,
    pointer_offset: f32,
    row_height: f32,
) -> DropPosition {
    if !row_height.is_finite() || row_height <= 0.0 || !pointer_offset.is_finite() {
        return if target_is_folder {
            DropPosition::Inside
        } else {
            DropPosition::After
        };
    }

    let ratio = (pointer_offset / row_height).clamp(0.0, 1.0);
    if target_is_folder {
        if ratio < FOLDER_EDGE_RATIO {
            DropPosition::Before
        } else if ratio > 1.0 - FOLDER_EDGE_RATIO {
            DropPosition::After
        } else {
            DropPosition::Inside
        }
    } else if ratio < 0.5 {
        DropPosition::Before
    } else {
        DropPosition::After
    }
}

/// Tracks a sustained `Inside` hover over one folder.
#[derive(Debug, Default)]
pub struct HoverExpandTracker {
    hovered: Option<(PageId, Instant)>,
    fired: bool,
}

impl HoverExpandTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a drag-over sample.
    ///
    /// Returns `true` exactly once per hover, when the pointer has stayed in
    /// the `Inside` zone of the same folder for at least
    /// [`FOLDER_HOVER_EXPAND_DELAY`].
    pub fn on_drag_over(&mut self, target: &PageId, position: DropPosition, now: Instant) -> bool {
        if position != DropPosition::Inside {
            self.reset();
            return false;
        }

        match &self.hovered {
            Some((current, _)) if current == target => {}
            _ => {
                self.hovered = Some((target.clone(), now));
                self.fired = false;
            }
        }

        let Some((_, started_at)) = &self.hovered else {
            return false;
        };
        if self.fired || now.saturating_duration_since(*started_at) < FOLDER_HOVER_EXPAND_DELAY {
            return false;
        }
        self.fired = true;
        true
    }

    /// Clears hover state, e.g. on drag leave or drop.
    pub fn reset(&mut self) {
        self.hovered = None;
        self.fired = false;
    }
}
