/// Splits a byte stream into newline-terminated text records.
///
/// Bytes after the last `\n` are held until a later chunk completes the
/// line. A trailing `\r` is dropped from each record. Content left over when
/// the stream ends is never emitted.
#[derive(Debug, Default)]
pub struct LineSplitter {
    carry: Vec<u8>,
}

impl LineSplitter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed the next chunk, returning every line it completes in order
    pub fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        let mut lines = Vec::new();
        let mut rest = chunk;

        while let Some(pos) = rest.iter().position(|&b| b == b'\n') {
            let (head, tail) = rest.split_at(pos);
            rest = &tail[1..];

            let record = if self.carry.is_empty() {
                decode(head)
            } else {
                self.carry.extend_from_slice(head);
                let record = decode(&self.carry);
                self.carry.clear();
                record
            };
            lines.push(record);
        }

        self.carry.extend_from_slice(rest);
        lines
    }

    /// Bytes of the incomplete line currently held
    pub fn pending_len(&self) -> usize {
        self.carry.len()
    }

    /// End of stream: the partial line is discarded, its length returned
    pub fn finish(self) -> usize {
        self.carry.len()
    }
}

fn decode(raw: &[u8]) -> String {
    let raw = raw.strip_suffix(b"\r").unwrap_or(raw);
    String::from_utf8_lossy(raw).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn split_whole(input: &[u8]) -> Vec<String> {
        LineSplitter::new().push(input)
    }

    #[test]
    fn test_complete_lines() {
        assert_eq!(split_whole(b"a\nbb\n\nccc\n"), vec!["a", "bb", "", "ccc"]);
    }

    #[test]
    fn test_partial_line_is_held_until_completed() {
        let mut splitter = LineSplitter::new();
        assert!(splitter.push(b"hel").is_empty());
        assert_eq!(splitter.pending_len(), 3);
        assert_eq!(splitter.push(b"lo\nwor"), vec!["hello"]);
        assert_eq!(splitter.push(b"ld\n"), vec!["world"]);
        assert_eq!(splitter.pending_len(), 0);
    }

    #[test]
    fn test_trailing_partial_line_is_discarded() {
        let mut splitter = LineSplitter::new();
        assert_eq!(splitter.push(b"done\nunterminated"), vec!["done"]);
        assert_eq!(splitter.finish(), "unterminated".len());
    }

    #[test]
    fn test_crlf_is_trimmed() {
        assert_eq!(split_whole(b"one\r\ntwo\r\n"), vec!["one", "two"]);
    }

    #[test]
    fn test_multibyte_char_split_across_chunks() {
        let input = "naïve café\n".as_bytes();
        let mut splitter = LineSplitter::new();
        // Split inside the two-byte 'ï'
        assert!(splitter.push(&input[..3]).is_empty());
        assert_eq!(splitter.push(&input[3..]), vec!["naïve café"]);
    }

    #[test]
    fn test_chunk_boundary_invariance() {
        let input: &[u8] = b"first\nsecond line\r\n\nthird\nfourth-partial";
        let expected = split_whole(input);

        // Every two-cut partition of the input
        for i in 0..=input.len() {
            for j in i..=input.len() {
                let mut splitter = LineSplitter::new();
                let mut lines = splitter.push(&input[..i]);
                lines.extend(splitter.push(&input[i..j]));
                lines.extend(splitter.push(&input[j..]));
                assert_eq!(lines, expected, "cuts at {} and {}", i, j);
            }
        }

        // Byte at a time
        let mut splitter = LineSplitter::new();
        let lines: Vec<String> = input.iter().flat_map(|b| splitter.push(&[*b])).collect();
        assert_eq!(lines, expected);
        assert_eq!(splitter.finish(), "fourth-partial".len());
    }
}
