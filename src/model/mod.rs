pub mod config;
pub mod content;
pub mod database;
pub mod font;
pub mod node;
pub mod rich;

pub use config::*;
pub use content::*;
pub use database::*;
pub use font::*;
pub use node::*;
pub use rich::*;
