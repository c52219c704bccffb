use std::time::{Duration, Instant};

use crate::model::{ContentError, Database, EditorConfig, FileContent, NodeId, RichDocument, TextIndex};
use crate::ops::signature::Signature;
use crate::ops::snippet_ops::{self, MoveDirection};
use crate::ops::tree_ops::{self, TreeError};
use crate::rich::{FormatError, FormatOp, format_document};
use crate::session::host::{Clipboard, Confirm, ConfirmChoice};
use crate::session::schedule::ScheduledTask;

/// Error type for open-document operations
#[derive(Debug, thiserror::Error)]
pub enum DocumentError {
    #[error("{0:?} is locked; unlock it before editing")]
    Locked(String),
    #[error(transparent)]
    Tree(#[from] TreeError),
    #[error(transparent)]
    Content(#[from] ContentError),
    #[error(transparent)]
    Format(#[from] FormatError),
    #[error("could not copy to clipboard: {0}")]
    Clipboard(#[from] std::io::Error),
}

/// Which document of a file a formatting action applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocTarget {
    Read,
    Snippet(usize),
}

/// How `close` ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseOutcome {
    /// Nothing to save
    Clean,
    Saved,
    Discarded,
    /// The user backed out; the document stays open
    Cancelled,
}

/// A file being edited: a draft of its content, the signature of what was
/// last saved, and the autosave task.
///
/// Edits touch only the draft. `save` writes it back into the database; the
/// caller persists the database.
#[derive(Debug)]
pub struct OpenDocument {
    file_id: NodeId,
    name: String,
    draft: FileContent,
    saved: Signature,
    autosave: Option<ScheduledTask>,
}

impl OpenDocument {
    /// Open a file, or the file a shortcut points at. An autosave task is
    /// scheduled when `autosave_interval` is non-zero; it only saves while
    /// the file's autosave setting is on.
    pub fn open(
        db: &Database,
        node_id: &str,
        autosave_interval: Duration,
        now: Instant,
    ) -> Result<Self, DocumentError> {
        let file = tree_ops::resolve_file(db, node_id)?;
        let draft = file
            .content()
            .cloned()
            .ok_or_else(|| TreeError::NotAFile(file.id.clone()))?;
        let autosave = (!autosave_interval.is_zero()).then(|| ScheduledTask::new(autosave_interval, now));
        tracing::debug!(file_id = %file.id, "document opened");
        Ok(OpenDocument {
            file_id: file.id.clone(),
            name: file.name.clone(),
            saved: Signature::of(&draft),
            draft,
            autosave,
        })
    }

    pub fn file_id(&self) -> &str {
        &self.file_id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn draft(&self) -> &FileContent {
        &self.draft
    }

    pub fn is_locked(&self) -> bool {
        self.draft.meta.locked
    }

    pub fn is_dirty(&self) -> bool {
        Signature::of(&self.draft) != self.saved
    }

    pub fn autosave_task(&self) -> Option<&ScheduledTask> {
        self.autosave.as_ref()
    }

    fn editable(&mut self) -> Result<&mut FileContent, DocumentError> {
        if self.draft.meta.locked {
            return Err(DocumentError::Locked(self.name.clone()));
        }
        Ok(&mut self.draft)
    }

    // -----------------------------------------------------------------------
    // Edits (rejected while locked)
    // -----------------------------------------------------------------------

    pub fn set_read_text(&mut self, text: &str) -> Result<(), DocumentError> {
        snippet_ops::set_read_text(self.editable()?, text);
        Ok(())
    }

    pub fn add_snippet(&mut self) -> Result<usize, DocumentError> {
        Ok(snippet_ops::add_snippet(self.editable()?))
    }

    pub fn remove_snippet(&mut self, index: usize) -> Result<RichDocument, DocumentError> {
        Ok(snippet_ops::remove_snippet(self.editable()?, index)?)
    }

    pub fn move_snippet(&mut self, index: usize, direction: MoveDirection) -> Result<usize, DocumentError> {
        Ok(snippet_ops::move_snippet(self.editable()?, index, direction)?)
    }

    pub fn set_snippet_text(&mut self, index: usize, text: &str) -> Result<(), DocumentError> {
        snippet_ops::set_snippet_text(self.editable()?, index, text)?;
        Ok(())
    }

    /// Apply a formatting action to `[start, end)` of one document.
    pub fn format(
        &mut self,
        target: DocTarget,
        start: TextIndex,
        end: TextIndex,
        op: &FormatOp,
        editor: &EditorConfig,
    ) -> Result<(), DocumentError> {
        let content = self.editable()?;
        let doc = match target {
            DocTarget::Read => &mut content.read_doc,
            DocTarget::Snippet(index) => content.copy_doc_mut(index)?,
        };
        *doc = format_document(doc, editor, start, end, op)?;
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Settings (always allowed)
    // -----------------------------------------------------------------------

    pub fn set_locked(&mut self, locked: bool) {
        self.draft.meta.locked = locked;
    }

    pub fn set_autosave(&mut self, autosave: bool) {
        self.draft.meta.autosave = autosave;
    }

    /// Copy a snippet's plain text.
    pub fn copy_snippet(&self, index: usize, clipboard: &mut dyn Clipboard) -> Result<(), DocumentError> {
        let text = snippet_ops::snippet_text(&self.draft, index)?;
        clipboard.set_text(text)?;
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Saving
    // -----------------------------------------------------------------------

    /// Stamp the save time and write the draft into `db`.
    pub fn save(&mut self, db: &mut Database) -> Result<(), DocumentError> {
        let node = db
            .get_mut(&self.file_id)
            .ok_or_else(|| TreeError::NotFound(self.file_id.clone()))?;
        let content = node
            .content_mut()
            .ok_or_else(|| TreeError::NotAFile(self.file_id.clone()))?;
        self.draft.meta.stamp_now();
        *content = self.draft.clone();
        self.saved = Signature::of(&self.draft);
        tracing::debug!(file_id = %self.file_id, "document saved");
        Ok(())
    }

    /// Autosave check. Returns true when it saved.
    pub fn tick(&mut self, now: Instant, db: &mut Database) -> Result<bool, DocumentError> {
        let due = self.autosave.as_mut().is_some_and(|task| task.poll(now));
        if !due || !self.draft.meta.autosave || !self.is_dirty() {
            return Ok(false);
        }
        self.save(db)?;
        Ok(true)
    }

    /// Stop autosaving and settle unsaved changes. On `Cancelled` the
    /// document is still open and its task still runs.
    pub fn close(&mut self, confirm: &mut dyn Confirm, db: &mut Database) -> Result<CloseOutcome, DocumentError> {
        let outcome = if self.is_dirty() {
            match confirm.ask(&format!("Save changes to {:?}?", self.name)) {
                ConfirmChoice::Yes => {
                    self.save(db)?;
                    CloseOutcome::Saved
                }
                ConfirmChoice::No => CloseOutcome::Discarded,
                ConfirmChoice::Cancel => return Ok(CloseOutcome::Cancelled),
            }
        } else {
            CloseOutcome::Clean
        };
        if let Some(task) = self.autosave.as_mut() {
            task.cancel();
        }
        Ok(outcome)
    }
}
