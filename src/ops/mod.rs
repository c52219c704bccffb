pub mod bundle;
pub mod check;
pub mod favorites;
pub mod search;
pub mod signature;
pub mod snippet_ops;
pub mod tree_ops;
