//! Line filter keeping only playlist-relevant lines.
//!
//! A line is kept when it starts with `#` (an `#EXTM3U`/`#EXTINF` style
//! directive) or with `http` (a stream locator). The check is a plain,
//! case-sensitive prefix match on bytes; no URL validation happens here.
//! Kept lines retain their input order and each is terminated by exactly one
//! `\n`. Everything else is dropped silently.

use crate::error::ScanError;
use crate::models::FilteredContent;
use std::io::{BufRead, Read};

/// Longest line the scanner accepts, terminator excluded.
pub const MAX_LINE_LEN: usize = 64 * 1024;

/// Whether a single line (without terminator) belongs in the output.
pub fn is_playlist_line(line: &[u8]) -> bool {
    line.starts_with(b"#") || line.starts_with(b"http")
}

/// Filter `reader` line by line.
///
/// A line ends at `\n`; a trailing `\r` is stripped as well, and a final line
/// without terminator still counts. On failure the returned [`ScanError`]
/// carries every line kept before the failing point.
///
/// # Arguments
///
/// * `reader` - Source of the paste body; read to the end or to the first
///   failure
///
/// # Returns
///
/// The kept lines in input order, each terminated by `\n`. Fails with
/// [`ScanError::LineTooLong`] once a line exceeds [`MAX_LINE_LEN`] bytes, or
/// with [`ScanError::Io`] when `reader` errors.
///
/// # Examples
///
/// ```
/// use iptv_scraper::filter::filter;
///
/// let body = "#EXTM3U\r\nnot a playlist line\nhttp://host/stream.ts";
/// let kept = filter(body.as_bytes()).unwrap();
/// assert_eq!(kept.as_bytes(), b"#EXTM3U\nhttp://host/stream.ts\n");
/// ```
pub fn filter<R: BufRead>(mut reader: R) -> Result<FilteredContent, ScanError> {
    let mut out = FilteredContent::new();
    let mut line = Vec::new();
    // Room for the longest accepted line plus "\r\n".
    let cap = (MAX_LINE_LEN + 2) as u64;

    loop {
        line.clear();
        let read = match (&mut reader).take(cap).read_until(b'\n', &mut line) {
            Ok(n) => n,
            Err(source) => return Err(ScanError::Io { source, partial: out }),
        };
        if read == 0 {
            break;
        }

        let text = strip_line_ending(&line);
        if text.len() > MAX_LINE_LEN {
            return Err(ScanError::LineTooLong {
                limit: MAX_LINE_LEN,
                partial: out,
            });
        }
        if is_playlist_line(text) {
            out.push_line(text);
        }
    }

    Ok(out)
}

/// Filter an in-memory body.
pub fn filter_bytes(body: &[u8]) -> Result<FilteredContent, ScanError> {
    filter(body)
}

fn strip_line_ending(line: &[u8]) -> &[u8] {
    let line = line.strip_suffix(b"\n").unwrap_or(line);
    line.strip_suffix(b"\r").unwrap_or(line)
}
