//! Incremental line splitting over raw output chunks

/// Reassembles lines from arbitrarily chunked process output
///
/// Both `\n` and `\r` terminate a line, since downloaders redraw progress with
/// carriage returns. Blank lines written with `\n` are kept; the empty gap in
/// `\r\n` and empty `\r` redraws are not.
/// Bytes are decoded only once a whole line is buffered, so multi-byte UTF-8
/// sequences split across chunks survive; invalid sequences decode lossily.
#[derive(Debug, Default)]
pub struct LineSplitter {
    buf: Vec<u8>,
    after_cr: bool,
}

impl LineSplitter {
    /// Create an empty splitter
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed a chunk, returning every line it completes
    pub fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        let mut lines = Vec::new();
        for &byte in chunk {
            match byte {
                b'\n' => {
                    if !(self.after_cr && self.buf.is_empty()) {
                        lines.push(self.take_line());
                    }
                    self.after_cr = false;
                }
                b'\r' => {
                    lines.extend(self.take());
                    self.after_cr = true;
                }
                _ => {
                    self.buf.push(byte);
                    self.after_cr = false;
                }
            }
        }
        lines
    }

    /// Flush the trailing fragment once the stream has ended
    pub fn finish(&mut self) -> Option<String> {
        self.take()
    }

    fn take(&mut self) -> Option<String> {
        if self.buf.is_empty() {
            return None;
        }
        Some(self.take_line())
    }

    fn take_line(&mut self) -> String {
        let line = String::from_utf8_lossy(&self.buf).into_owned();
        self.buf.clear();
        line
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reassembles_lines_across_chunks() {
        let mut splitter = LineSplitter::new();

        assert!(splitter.push(b"[downl").is_empty());
        assert_eq!(splitter.push(b"oad]  5.0%\n[down"), vec!["[download]  5.0%"]);
        assert_eq!(splitter.push(b"load] 10.0%\n"), vec!["[download] 10.0%"]);
        assert_eq!(splitter.finish(), None);
    }

    #[test]
    fn carriage_returns_split_progress_redraws() {
        let mut splitter = LineSplitter::new();
        let lines = splitter.push(b"[download]  1.0%\r[download]  2.0%\r\n");
        assert_eq!(lines, vec!["[download]  1.0%", "[download]  2.0%"]);
    }

    #[test]
    fn blank_lines_are_kept() {
        let mut splitter = LineSplitter::new();
        let lines = splitter.push(b"[info] a\n\nERROR: b\n");
        assert_eq!(lines, vec!["[info] a", "", "ERROR: b"]);
    }

    #[test]
    fn crlf_split_across_chunks_yields_one_line() {
        let mut splitter = LineSplitter::new();
        assert_eq!(splitter.push(b"done\r"), vec!["done"]);
        assert!(splitter.push(b"\n").is_empty());
        assert_eq!(splitter.push(b"\r\rnext\n"), vec!["next"]);
    }

    #[test]
    fn trailing_fragment_is_flushed_on_finish() {
        let mut splitter = LineSplitter::new();
        assert!(splitter.push(b"no newline at end").is_empty());
        assert_eq!(splitter.finish().as_deref(), Some("no newline at end"));
        assert_eq!(splitter.finish(), None);
    }

    #[test]
    fn multibyte_characters_split_between_chunks() {
        let bytes = "título ✅\n".as_bytes();
        let mut splitter = LineSplitter::new();

        // Split inside the check mark's 3-byte encoding
        let cut = bytes.len() - 2;
        assert!(splitter.push(&bytes[..cut]).is_empty());
        assert_eq!(splitter.push(&bytes[cut..]), vec!["título ✅"]);
    }

    #[test]
    fn invalid_utf8_is_decoded_lossily() {
        let mut splitter = LineSplitter::new();
        let lines = splitter.push(b"bad \xff byte\n");
        assert_eq!(lines, vec!["bad \u{fffd} byte"]);
    }
}
