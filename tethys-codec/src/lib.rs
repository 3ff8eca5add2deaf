/// Shared re-export of minicbor across all Tethys crates
pub use minicbor;

/// Streaming decode with look-ahead over a borrowed byte slice
pub mod reader;

/// Round-trip friendly common helper structs
pub mod utils;

/// Streaming encode into an owned growable buffer
pub mod writer;

pub use reader::CborReader;
pub use writer::CborWriter;
