//! Multi-slot generation progress.
//!
//! A batch of N slots is tracked as three sequences indexed identically:
//! streamed step-ends (previews), final items, and NSFW flags.

use serde::{Deserialize, Serialize};

use crate::connection::{event_names, BackendEvent};

/// Streamed progress snapshot for one slot.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StepEnd {
    pub index: usize,
    #[serde(default)]
    pub current_step: u32,
    #[serde(default)]
    pub timestep: f64,
    /// Base64 preview image.
    #[serde(rename = "image_base64", default)]
    pub preview_image: String,
}

impl StepEnd {
    /// The zeroed step-end a slot starts from.
    pub fn empty(index: usize) -> Self {
        Self {
            index,
            ..Default::default()
        }
    }
}

/// A finished artifact.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FinalItem {
    pub path: String,
    pub file_name: String,
}

impl FinalItem {
    pub fn is_empty(&self) -> bool {
        self.path.is_empty()
    }
}

/// Result of a finished generation request.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GenerationResponse {
    pub items: Vec<FinalItem>,
    pub nsfw_content_detected: Vec<bool>,
}

/// A generated image as persisted in generation history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryImage {
    pub id: i64,
    pub path: String,
    pub is_nsfw: bool,
    pub file_name: String,
    pub history_id: i64,
    #[serde(default)]
    pub created_at: String,
    #[serde(default)]
    pub updated_at: String,
}

/// What presentation should show for a slot.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SlotView<'a> {
    /// No progress yet.
    Pending,
    /// Streaming; show the latest preview.
    Previewing(&'a StepEnd),
    /// Final artifact known. Any leftover preview is stale.
    Finished { item: &'a FinalItem, is_nsfw: bool },
}

#[derive(Debug, Clone, Default)]
pub struct GenerationProgressStore {
    step_ends: Vec<StepEnd>,
    items: Vec<FinalItem>,
    nsfw: Vec<bool>,
}

impl GenerationProgressStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a batch of `count` empty slots.
    pub fn init_batch(&mut self, count: usize) {
        self.step_ends = (0..count).map(StepEnd::empty).collect();
        self.items = vec![FinalItem::default(); count];
        self.nsfw = vec![false; count];
    }

    /// Upsert by `step_end.index`: replace the entry with that index, or
    /// append if there is none.
    pub fn update_step_end(&mut self, step_end: StepEnd) {
        match self.step_ends.iter_mut().find(|s| s.index == step_end.index) {
            Some(existing) => *existing = step_end,
            None => self.step_ends.push(step_end),
        }
    }

    /// Take the final items and NSFW flags wholesale. Step-ends are left
    /// as they are.
    pub fn complete(&mut self, response: GenerationResponse) {
        self.items = response.items;
        self.nsfw = response.nsfw_content_detected;
    }

    /// Rebuild the batch from persisted history.
    pub fn restore(&mut self, images: &[HistoryImage]) {
        self.step_ends = (0..images.len()).map(StepEnd::empty).collect();
        self.items = images
            .iter()
            .map(|img| FinalItem {
                path: img.path.clone(),
                file_name: img.file_name.clone(),
            })
            .collect();
        self.nsfw = images.iter().map(|img| img.is_nsfw).collect();
    }

    /// Apply a backend event. Returns `true` if it was a step-end this store
    /// consumed.
    pub fn apply(&mut self, event: &BackendEvent) -> bool {
        if !event.is(event_names::IMAGE_GENERATION_STEP_END) {
            return false;
        }
        match event.parse::<StepEnd>() {
            Ok(step_end) => {
                self.update_step_end(step_end);
                true
            }
            Err(e) => {
                tracing::debug!("Ignoring malformed step-end: {}", e);
                false
            }
        }
    }

    pub fn step_ends(&self) -> &[StepEnd] {
        &self.step_ends
    }

    pub fn items(&self) -> &[FinalItem] {
        &self.items
    }

    pub fn nsfw_content_detected(&self) -> &[bool] {
        &self.nsfw
    }

    /// Number of slots in the batch.
    pub fn len(&self) -> usize {
        self.items.len().max(self.step_ends.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Presentation view of slot `index`, or `None` past the end.
    pub fn slot(&self, index: usize) -> Option<SlotView<'_>> {
        if index >= self.len() {
            return None;
        }
        if let Some(item) = self.items.get(index).filter(|item| !item.is_empty()) {
            let is_nsfw = self.nsfw.get(index).copied().unwrap_or(false);
            return Some(SlotView::Finished { item, is_nsfw });
        }
        match self.step_ends.iter().find(|s| s.index == index) {
            Some(step) if step.current_step > 0 || !step.preview_image.is_empty() => {
                Some(SlotView::Previewing(step))
            }
            _ => Some(SlotView::Pending),
        }
    }
}
