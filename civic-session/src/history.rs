/// Previously sent inputs, recalled with Up/Down.
///
/// Entries are append-only; only the cursor moves. The draft that was in the
/// composer when recall began is kept aside and restored when the cursor
/// walks past the newest entry.
#[derive(Debug, Clone, Default)]
pub struct InputHistory {
    entries: Vec<String>,
    cursor: Option<usize>,
    scratch: String,
}

impl InputHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> &[String] {
        &self.entries
    }

    /// Index of the recalled entry, `None` when recall is inactive.
    pub fn cursor(&self) -> Option<usize> {
        self.cursor
    }

    /// Records a sent input and ends any recall in progress.
    pub fn push(&mut self, text: impl Into<String>) {
        self.entries.push(text.into());
        self.cursor = None;
        self.scratch.clear();
    }

    /// Steps to an older entry. Returns the text to load into the composer,
    /// or `None` when there is nothing to recall.
    pub fn up(&mut self, draft: &str) -> Option<&str> {
        let last = self.entries.len().checked_sub(1)?;
        let index = match self.cursor {
            None => {
                self.scratch = draft.to_string();
                last
            }
            Some(i) => i.saturating_sub(1),
        };
        self.cursor = Some(index);
        Some(&self.entries[index])
    }

    /// Steps to a newer entry, restoring the saved draft after the newest.
    /// Returns `None` when recall is inactive.
    pub fn down(&mut self) -> Option<&str> {
        let next = self.cursor? + 1;
        if next >= self.entries.len() {
            self.cursor = None;
            Some(&self.scratch)
        } else {
            self.cursor = Some(next);
            Some(&self.entries[next])
        }
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.cursor = None;
        self.scratch.clear();
    }
}
