pub mod metadata;
pub mod text;
pub mod walk;

pub use metadata::{extract, FileRecord};
pub use text::read_text_prefix;
pub use walk::collect_files;
