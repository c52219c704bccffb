pub mod db_parser;
pub mod db_serializer;
pub mod issues;
pub mod legacy;
pub mod rich_codec;

pub use db_parser::{parse_database, parse_node_entry, ParsedNode};
pub use db_serializer::{node_to_value, serialize_database, serialize_database_pretty};
pub use issues::{IssueSink, LoadIssue};
pub use rich_codec::{parse_rich_doc, rich_doc_to_value};
