pub mod bundle_io;
pub mod config_io;
pub mod lock;
pub mod recovery;
pub mod state;
pub mod store_io;
