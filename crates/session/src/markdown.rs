//! Markdown-aware splitting of long replies.
//!
//! Chat platforms cap message size, and a naive cut can leave a bold span
//! or a code fence open in one message and dangling in the next. The
//! splitter tracks which formatting sequences are open at every position;
//! when a chunk must end it closes them (innermost first) and reopens them
//! at the start of the next chunk, so every chunk renders on its own.
//!
//! Cuts prefer the last newline, then the last space, then the current
//! position. The whitespace at a newline/space cut is consumed. A stretch
//! with nothing but markup and whitespace never becomes a chunk of its own;
//! the reopened prefix of the next chunk carries its effect.

use std::collections::VecDeque;

use minerva_core::error::SplitError;

/// Inline formatting sequences, longest first within each family.
const FORMATTING: [&str; 7] = ["***", "**", "*", "__", "_", "~~", "||"];

/// Code sequences. Inside code every other sequence is literal text.
const CODE: [&str; 3] = ["```", "``", "`"];

/// Length of the longest sequence; chunk sizes must exceed it.
pub const LONGEST_SEQUENCE: usize = 3;

/// Longest formatting or code sequence starting at `at`.
fn match_sequence(chars: &[char], at: usize) -> Option<&'static str> {
    (1..=LONGEST_SEQUENCE).rev().find_map(|len| {
        let window = chars.get(at..at + len)?;
        FORMATTING
            .iter()
            .chain(CODE.iter())
            .find(|seq| seq.chars().eq(window.iter().copied()))
            .copied()
    })
}

fn is_code(seq: &str) -> bool {
    CODE.contains(&seq)
}

/// Stack of currently open sequences.
#[derive(Debug, Clone, Default)]
struct OpenSequences {
    seqs: Vec<&'static str>,
    /// Total characters of `seqs`; the cost of closing them all
    len: usize,
    in_code: bool,
}

impl OpenSequences {
    /// Index of the entry `seq` would close, if any.
    fn closes(&self, seq: &str) -> Option<usize> {
        if self.in_code {
            return (self.seqs.last() == Some(&seq)).then(|| self.seqs.len() - 1);
        }
        if is_code(seq) {
            return None;
        }
        self.seqs.iter().rposition(|open| *open == seq)
    }

    /// Stack length after `seq` would be applied.
    fn len_after(&self, seq: &str) -> usize {
        match self.closes(seq) {
            Some(k) => self.len - self.seqs[k..].iter().map(|s| s.len()).sum::<usize>(),
            None if self.in_code => self.len,
            None => self.len + seq.len(),
        }
    }

    fn apply(&mut self, seq: &'static str) {
        match self.closes(seq) {
            Some(k) => {
                self.len -= self.seqs[k..].iter().map(|s| s.len()).sum::<usize>();
                self.seqs.truncate(k);
                self.in_code = false;
            }
            // literal inside code
            None if self.in_code => {}
            None => {
                self.seqs.push(seq);
                self.len += seq.len();
                self.in_code = is_code(seq);
            }
        }
    }

    /// Markup that reopens every open sequence.
    fn opening(&self) -> String {
        self.seqs.concat()
    }

    /// Markup that closes every open sequence, innermost first.
    fn closing(&self) -> String {
        self.seqs.iter().rev().copied().collect()
    }
}

/// A place the current chunk could end, with the sequences open there.
#[derive(Debug, Clone)]
struct Candidate {
    pos: usize,
    open: OpenSequences,
    /// Visible text lies between the chunk start and `pos`
    has_content: bool,
}

/// Splits text into chunks of at most `max_chunk_size` characters.
#[derive(Debug, Clone, Copy)]
pub struct MarkdownSplitter {
    max_chunk_size: usize,
}

impl MarkdownSplitter {
    /// Fails when `max_chunk_size` leaves no room for the longest sequence.
    pub fn new(max_chunk_size: usize) -> Result<Self, SplitError> {
        if max_chunk_size <= LONGEST_SEQUENCE {
            return Err(SplitError::ChunkTooSmall {
                min: LONGEST_SEQUENCE,
                got: max_chunk_size,
            });
        }
        Ok(Self { max_chunk_size })
    }

    pub fn max_chunk_size(&self) -> usize {
        self.max_chunk_size
    }

    /// Lazily split `text`. Text that already fits is yielded unchanged.
    pub fn split(&self, text: &str) -> MarkdownChunks {
        let chars: Vec<char> = text.chars().collect();
        let mut ready = VecDeque::new();
        let finished = chars.len() <= self.max_chunk_size;
        if finished {
            ready.push_back(text.to_string());
        }

        MarkdownChunks {
            chars,
            max: self.max_chunk_size,
            ready,
            finished,
            pos: 0,
            start: 0,
            prefix: String::new(),
            open: OpenSequences::default(),
            newline: None,
            space: None,
            last_content: None,
        }
    }
}

/// Convenience wrapper around [`MarkdownSplitter`].
pub fn split_markdown(text: &str, max_chunk_size: usize) -> Result<MarkdownChunks, SplitError> {
    Ok(MarkdownSplitter::new(max_chunk_size)?.split(text))
}

/// Iterator over the chunks of one text.
#[derive(Debug)]
pub struct MarkdownChunks {
    chars: Vec<char>,
    max: usize,
    ready: VecDeque<String>,
    finished: bool,

    /// Next character to scan
    pos: usize,
    /// First character of the pending chunk
    start: usize,
    /// Reopened markup carried into the pending chunk
    prefix: String,
    open: OpenSequences,
    newline: Option<Candidate>,
    space: Option<Candidate>,
    /// Index of the last visible character consumed
    last_content: Option<usize>,
}

impl MarkdownChunks {
    /// Size of the pending chunk if `extra` more characters were consumed and
    /// `open_len` characters of closing markup were appended.
    fn pending(&self, extra: usize, open_len: usize) -> usize {
        self.prefix.len() + (self.pos - self.start) + extra + open_len
    }

    fn has_content_since(&self, from: usize) -> bool {
        self.last_content.is_some_and(|at| at >= from)
    }

    /// Scan one sequence or character, emitting chunks as the limit is hit.
    fn advance(&mut self) {
        if self.pos >= self.chars.len() {
            if self.start < self.chars.len() && self.has_content_since(self.start) {
                let tail: String = self.chars[self.start..].iter().collect();
                self.ready.push_back(format!("{}{}", self.prefix, tail));
            }
            self.finished = true;
            return;
        }

        match match_sequence(&self.chars, self.pos) {
            Some(seq) => {
                let after = self.open.len_after(seq);
                let opens = after > self.open.len;
                // An opening sequence needs room for at least one character
                // of content, or the chunk would end with an empty pair.
                while self.start != self.pos {
                    let projected = self.pending(seq.len(), after);
                    if projected > self.max || (opens && projected >= self.max) {
                        self.cut();
                    } else {
                        break;
                    }
                }
                self.open.apply(seq);
                self.pos += seq.len();
            }
            None => {
                let ch = self.chars[self.pos];
                // Recorded first so an overflowing separator can be the cut
                if ch == '\n' || ch == ' ' {
                    let candidate = Candidate {
                        pos: self.pos,
                        open: self.open.clone(),
                        has_content: self.has_content_since(self.start),
                    };
                    if ch == '\n' {
                        self.newline = Some(candidate);
                    } else {
                        self.space = Some(candidate);
                    }
                }
                while self.start < self.pos && self.pending(1, self.open.len) > self.max {
                    self.cut();
                }
                if !ch.is_whitespace() {
                    self.last_content = Some(self.pos);
                }
                // A cut at this separator already moved `start` past it
                self.pos += 1;
            }
        }
    }

    /// End the pending chunk at the best candidate.
    fn cut(&mut self) {
        let (pos, max, current) = (self.pos, self.max, self.open.len);
        let fits = |c: &Candidate| c.has_content && c.open.len + (pos - c.pos) + current <= max;

        let chosen = [self.newline.take(), self.space.take()]
            .into_iter()
            .flatten()
            .find(|c| fits(c));

        let (end, open, next, visible) = match chosen {
            Some(c) => (c.pos, c.open, c.pos + 1, true),
            None => (pos, self.open.clone(), pos, self.has_content_since(self.start)),
        };

        if visible {
            let body: String = self.chars[self.start..end].iter().collect();
            self.ready
                .push_back(format!("{}{}{}", self.prefix, body, open.closing()));
        }
        self.prefix = open.opening();
        self.start = next;
    }
}

impl Iterator for MarkdownChunks {
    type Item = String;

    fn next(&mut self) -> Option<String> {
        loop {
            if let Some(chunk) = self.ready.pop_front() {
                return Some(chunk);
            }
            if self.finished {
                return None;
            }
            self.advance();
        }
    }
}
