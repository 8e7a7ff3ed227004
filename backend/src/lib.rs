pub mod types;
pub mod helpers;
pub mod logger;
pub mod parser_settings;

pub mod xml_tree;
pub mod inline_render;
pub mod segmenter;
pub mod aligner;
pub mod apparatus;
pub mod header;
pub mod tei_parser;

pub mod reading_view;
pub mod book_structure;

pub use parser_settings::ParserSettings;
pub use tei_parser::{parse_tei, parse_tei_with_settings};
pub use types::{
    ApparatusEntry, CommentaryEntry, DocumentMetadata, DocumentMode, FragmentEntry, ParsedDocument, Reading,
    Section, TeiError, Variant, Verse,
};
