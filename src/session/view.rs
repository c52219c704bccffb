use crate::io::state::ViewState;
use crate::model::Database;
use crate::ops::tree_ops::{DeleteResult, TreeError};

/// Make `folder_id` the current folder.
pub fn change_folder(view: &mut ViewState, db: &Database, folder_id: &str) -> Result<(), TreeError> {
    let node = db
        .get(folder_id)
        .ok_or_else(|| TreeError::NotFound(folder_id.to_string()))?;
    if !node.is_folder() {
        return Err(TreeError::NotAFolder(folder_id.to_string()));
    }
    view.current_folder_id = Some(node.id.clone());
    Ok(())
}

/// After a delete, a current folder that no longer exists moves to the
/// deleted node's former parent, or to the QuickCopy root. Returns true when
/// the view moved.
pub fn retarget_after_delete(view: &mut ViewState, db: &Database, deleted: &DeleteResult) -> bool {
    let Some(current) = view.current_folder_id.as_deref() else {
        return false;
    };
    if !deleted.contains(current) {
        return false;
    }
    view.current_folder_id = match deleted.parent_id.as_deref() {
        Some(parent) if db.folder(parent).is_some() => Some(parent.to_string()),
        _ => Some(db.quickcopy_root_id.clone()),
    };
    tracing::debug!(folder = ?view.current_folder_id, "view retargeted after delete");
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Node;
    use crate::ops::tree_ops::delete_subtree;

    fn nested() -> Database {
        let mut db = Database::blank();
        let root = db.quickcopy_root_id.clone();
        db.attach(&root, Node::folder("a".into(), "A"));
        db.attach("a", Node::folder("b".into(), "B"));
        db.attach("b", Node::folder("c".into(), "C"));
        db
    }

    #[test]
    fn test_deleting_current_folder_moves_to_parent() {
        let mut db = nested();
        let mut view = ViewState::default();
        change_folder(&mut view, &db, "c").unwrap();

        let deleted = delete_subtree(&mut db, "c").unwrap();
        assert!(retarget_after_delete(&mut view, &db, &deleted));
        assert_eq!(view.current_folder_id.as_deref(), Some("b"));
    }

    #[test]
    fn test_deleting_ancestor_moves_to_its_parent() {
        let mut db = nested();
        let mut view = ViewState::default();
        change_folder(&mut view, &db, "c").unwrap();

        let deleted = delete_subtree(&mut db, "b").unwrap();
        assert!(retarget_after_delete(&mut view, &db, &deleted));
        assert_eq!(view.current_folder_id.as_deref(), Some("a"));
    }

    #[test]
    fn test_parentless_delete_falls_back_to_root() {
        let mut db = nested();
        db.nodes.insert("lost".into(), Node::folder("lost".into(), "Lost"));
        let mut view = ViewState::default();
        change_folder(&mut view, &db, "lost").unwrap();

        let deleted = delete_subtree(&mut db, "lost").unwrap();
        assert_eq!(deleted.parent_id, None);
        assert!(retarget_after_delete(&mut view, &db, &deleted));
        assert_eq!(view.current_folder_id, Some(db.quickcopy_root_id.clone()));
    }

    #[test]
    fn test_unrelated_delete_keeps_view() {
        let mut db = nested();
        let root = db.quickcopy_root_id.clone();
        db.attach(&root, Node::folder("x".into(), "X"));
        let mut view = ViewState::default();
        change_folder(&mut view, &db, "c").unwrap();

        let deleted = delete_subtree(&mut db, "x").unwrap();
        assert!(!retarget_after_delete(&mut view, &db, &deleted));
        assert_eq!(view.current_folder_id.as_deref(), Some("c"));
    }

    #[test]
    fn test_change_folder_rejects_files() {
        let mut db = nested();
        db.attach("a", Node::file("f".into(), "F", Default::default()));
        let mut view = ViewState::default();
        assert_eq!(
            change_folder(&mut view, &db, "f"),
            Err(TreeError::NotAFolder("f".into()))
        );
        assert_eq!(change_folder(&mut view, &db, "zz"), Err(TreeError::NotFound("zz".into())));
    }
}
