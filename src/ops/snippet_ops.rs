use crate::model::{ContentError, FileContent, RichDocument};

/// Direction for `move_snippet`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MoveDirection {
    Up,
    Down,
}

impl MoveDirection {
    fn offset(self, index: usize) -> Option<usize> {
        match self {
            MoveDirection::Up => index.checked_sub(1),
            MoveDirection::Down => index.checked_add(1),
        }
    }
}

/// Append a blank snippet, returning its index.
pub fn add_snippet(content: &mut FileContent) -> usize {
    content.push_copy_doc(RichDocument::blank())
}

/// Remove a snippet. The last remaining one cannot be removed.
pub fn remove_snippet(content: &mut FileContent, index: usize) -> Result<RichDocument, ContentError> {
    content.remove_copy_doc(index)
}

/// Swap a snippet with its neighbour. Moving past either end is a no-op.
/// Returns the snippet's new index.
pub fn move_snippet(
    content: &mut FileContent,
    index: usize,
    direction: MoveDirection,
) -> Result<usize, ContentError> {
    content.copy_doc(index)?;
    match direction.offset(index) {
        Some(target) if target < content.copy_docs().len() => {
            content.swap_copy_docs(index, target)?;
            Ok(target)
        }
        _ => Ok(index),
    }
}

/// Replace a snippet's text. Formatting whose ranges still fit is kept.
pub fn set_snippet_text(content: &mut FileContent, index: usize, text: &str) -> Result<(), ContentError> {
    content.copy_doc_mut(index)?.replace_text(text);
    Ok(())
}

/// Replace the read document's text. File settings and formatting that
/// still fits are kept.
pub fn set_read_text(content: &mut FileContent, text: &str) {
    content.read_doc.replace_text(text);
}

/// Plain text of a snippet, as it goes to the clipboard.
pub fn snippet_text(content: &FileContent, index: usize) -> Result<&str, ContentError> {
    Ok(content.copy_doc(index)?.text.as_str())
}
