use crate::model::{Database, Node, NodeId, NodeType};

/// Error type for favorite operations
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FavoriteError {
    #[error("node not found: {0}")]
    NotFound(String),
    #[error("only files can be favorited: {0}")]
    NotAFile(String),
}

/// What a favorite operation did
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FavoriteChange {
    /// A shortcut with this ID was created
    Added(NodeId),
    /// The shortcut with this ID was removed
    Removed(NodeId),
    /// Already in the requested state
    Unchanged,
}

/// The Favorites shortcut targeting `file_id`, if any.
pub fn favorite_for<'a>(db: &'a Database, file_id: &str) -> Option<&'a Node> {
    db.favorites().find(|n| n.targets(file_id))
}

pub fn is_favorited(db: &Database, file_id: &str) -> bool {
    favorite_for(db, file_id).is_some()
}

/// Add a Favorites shortcut for a file unless one already exists.
pub fn ensure_favorite(db: &mut Database, file_id: &str) -> Result<FavoriteChange, FavoriteError> {
    let file = db
        .get(file_id)
        .ok_or_else(|| FavoriteError::NotFound(file_id.to_string()))?;
    if !file.is_file() {
        return Err(FavoriteError::NotAFile(file_id.to_string()));
    }
    if is_favorited(db, file_id) {
        return Ok(FavoriteChange::Unchanged);
    }

    let shortcut = Node::shortcut(db.fresh_id(), file.name.clone(), file_id.to_string());
    let favorites_root = db.favorites_root_id.clone();
    let id = db.attach(&favorites_root, shortcut);
    tracing::debug!(file_id, shortcut_id = %id, "added favorite");
    Ok(FavoriteChange::Added(id))
}

/// Remove every Favorites shortcut targeting `file_id`. Works for dangling
/// targets too.
pub fn remove_favorite(db: &mut Database, file_id: &str) -> FavoriteChange {
    let doomed: Vec<NodeId> = db
        .favorites()
        .filter(|n| n.targets(file_id))
        .map(|n| n.id.clone())
        .collect();
    let Some(first) = doomed.first().cloned() else {
        return FavoriteChange::Unchanged;
    };

    let favorites_root = db.favorites_root_id.clone();
    if let Some(children) = db.get_mut(&favorites_root).and_then(Node::children_mut) {
        children.retain(|c| !doomed.contains(c));
    }
    for id in &doomed {
        db.nodes.shift_remove(id);
    }
    tracing::debug!(file_id, removed = doomed.len(), "removed favorite");
    FavoriteChange::Removed(first)
}

/// Flip a file's favorite status. Given a shortcut ID instead, removes that
/// shortcut.
pub fn toggle_favorite(db: &mut Database, id: &str) -> Result<FavoriteChange, FavoriteError> {
    let node = db
        .get(id)
        .ok_or_else(|| FavoriteError::NotFound(id.to_string()))?;

    if node.node_type() == NodeType::Shortcut {
        detach_shortcut(db, id);
        return Ok(FavoriteChange::Removed(id.to_string()));
    }

    if is_favorited(db, id) {
        Ok(remove_favorite(db, id))
    } else {
        ensure_favorite(db, id)
    }
}

/// Keep every shortcut's display name equal to its target's name.
pub fn sync_names(db: &mut Database, file_id: &str) {
    let Some(name) = db.get(file_id).map(|n| n.name.clone()) else {
        return;
    };
    let ids: Vec<NodeId> = db
        .favorites()
        .filter(|n| n.targets(file_id))
        .map(|n| n.id.clone())
        .collect();
    for id in ids {
        if let Some(shortcut) = db.get_mut(&id) {
            shortcut.name = name.clone();
        }
    }
}

/// Remove a shortcut node wherever it is linked.
fn detach_shortcut(db: &mut Database, shortcut_id: &str) {
    for node in db.nodes.values_mut() {
        if let Some(children) = node.children_mut() {
            children.retain(|c| c != shortcut_id);
        }
    }
    db.nodes.shift_remove(shortcut_id);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::FileContent;

    fn db_with_file() -> Database {
        let mut db = Database::blank();
        let root = db.quickcopy_root_id.clone();
        db.attach(&root, Node::file("f".into(), "Grant", FileContent::new()));
        db.attach(&root, Node::folder("d".into(), "Deeds"));
        db
    }

    #[test]
    fn test_toggle_twice_restores_state() {
        let mut db = db_with_file();
        let before = db.clone();
        let added = toggle_favorite(&mut db, "f").unwrap();
        assert!(matches!(added, FavoriteChange::Added(_)));
        assert!(is_favorited(&db, "f"));
        assert_eq!(favorite_for(&db, "f").unwrap().name, "Grant");

        let removed = toggle_favorite(&mut db, "f").unwrap();
        assert!(matches!(removed, FavoriteChange::Removed(_)));
        assert_eq!(db, before);
    }

    #[test]
    fn test_ensure_is_idempotent() {
        let mut db = db_with_file();
        ensure_favorite(&mut db, "f").unwrap();
        assert_eq!(ensure_favorite(&mut db, "f").unwrap(), FavoriteChange::Unchanged);
        assert_eq!(db.favorites().count(), 1);
    }

    #[test]
    fn test_folders_cannot_be_favorited() {
        let mut db = db_with_file();
        assert_eq!(
            toggle_favorite(&mut db, "d"),
            Err(FavoriteError::NotAFile("d".into()))
        );
        assert_eq!(
            toggle_favorite(&mut db, "nope"),
            Err(FavoriteError::NotFound("nope".into()))
        );
    }

    #[test]
    fn test_toggle_shortcut_removes_it() {
        let mut db = db_with_file();
        let FavoriteChange::Added(sc) = ensure_favorite(&mut db, "f").unwrap() else {
            panic!("expected a new shortcut");
        };
        toggle_favorite(&mut db, &sc).unwrap();
        assert!(!is_favorited(&db, "f"));
        assert!(!db.contains(&sc));
        assert!(db.favorites_root().unwrap().children().is_empty());
    }

    #[test]
    fn test_remove_dangling_favorite() {
        let mut db = db_with_file();
        ensure_favorite(&mut db, "f").unwrap();
        db.nodes.shift_remove("f");
        assert!(matches!(remove_favorite(&mut db, "f"), FavoriteChange::Removed(_)));
        assert_eq!(db.nodes.len(), 3);
    }

    #[test]
    fn test_sync_names() {
        let mut db = db_with_file();
        ensure_favorite(&mut db, "f").unwrap();
        db.get_mut("f").unwrap().name = "Quitclaim".into();
        sync_names(&mut db, "f");
        assert_eq!(favorite_for(&db, "f").unwrap().name, "Quitclaim");
    }
}
