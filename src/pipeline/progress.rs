//! Tracking of in-flight model file loads.

/// A model file the worker is currently loading.
#[derive(Debug, Clone, PartialEq)]
pub struct ProgressItem {
    pub file: String,
    /// Percentage in `[0, 100]`.
    pub progress: f32,
}

/// Ordered set of in-flight loads keyed by file name.
///
/// Order is insertion order and only matters for display.
#[derive(Debug, Default)]
pub struct ProgressTracker {
    items: Vec<ProgressItem>,
}

impl ProgressTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start tracking `file` at 0%.
    ///
    /// A repeated initiate for a file already tracked appends a second entry;
    /// `on_done` removes both.
    pub fn on_initiate(&mut self, file: &str) {
        self.items.push(ProgressItem { file: file.to_string(), progress: 0.0 });
    }

    /// Replace the progress of `file`. Unknown files are ignored.
    ///
    /// Returns whether any item matched.
    pub fn on_progress(&mut self, file: &str, progress: f32) -> bool {
        let progress = if progress.is_nan() { 0.0 } else { progress.clamp(0.0, 100.0) };
        let mut matched = false;
        for item in self.items.iter_mut().filter(|item| item.file == file) {
            item.progress = progress;
            matched = true;
        }
        matched
    }

    /// Stop tracking every item for `file`.
    pub fn on_done(&mut self, file: &str) {
        self.items.retain(|item| item.file != file);
    }

    /// Current snapshot for rendering.
    pub fn items(&self) -> &[ProgressItem] {
        &self.items
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }
}
