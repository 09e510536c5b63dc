//! Batch splitting for migration scripts.
//!
//! Scripts follow the SQL tooling convention where a line consisting solely of
//! `GO` (any case, surrounding whitespace ignored) ends a batch. The separator
//! line is never part of a batch. Line terminators inside a batch are kept as
//! they appear in the script, so comments and formatting survive.

use std::str::SplitInclusive;

/// The batch separator token.
pub const BATCH_SEPARATOR: &str = "GO";

/// Split `script` into its executable batches.
///
/// Batches that contain nothing but whitespace are dropped, so an empty
/// script yields no batches at all.
pub fn split_batches(script: &str) -> Batches<'_> {
    Batches {
        lines: script.split_inclusive('\n'),
        done: false,
    }
}

/// Iterator over the batches of one script, produced by [`split_batches`].
#[derive(Debug, Clone)]
pub struct Batches<'a> {
    lines: SplitInclusive<'a, char>,
    done: bool,
}

impl Iterator for Batches<'_> {
    type Item = String;

    fn next(&mut self) -> Option<String> {
        if self.done {
            return None;
        }
        let mut buf = String::new();
        loop {
            match self.lines.next() {
                Some(line) if is_separator(line) => {
                    if buf.trim().is_empty() {
                        buf.clear();
                        continue;
                    }
                    return Some(buf);
                }
                Some(line) => buf.push_str(line),
                None => {
                    self.done = true;
                    return if buf.trim().is_empty() { None } else { Some(buf) };
                }
            }
        }
    }
}

impl std::iter::FusedIterator for Batches<'_> {}

fn is_separator(line: &str) -> bool {
    line.trim().eq_ignore_ascii_case(BATCH_SEPARATOR)
}

#[cfg(test)]
#[path = "splitter_test.rs"]
mod tests;
