pub mod shell;
pub mod tokenize;

pub use shell::{command_segments, redirect_targets};
pub use tokenize::{canonical_segment, merge_short_flags, path_words, strip_launchers, tokenize};
