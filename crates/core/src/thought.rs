//! Reasoning/answer separation.
//!
//! Models that follow the reasoning-then-answer convention wrap their
//! thinking in a `<think>…</think>` pair. [`split_thoughts`] handles whole
//! replies; [`ThoughtSplitter`] handles streaming fragments, carrying a
//! marker that splits across a fragment boundary instead of emitting it
//! verbatim. Only the first reasoning block is extracted; anything after
//! the closing marker is answer text.

use crate::ThoughtMode;

/// Opening reasoning marker.
pub const THINK_OPEN: &str = "<think>";

/// Closing reasoning marker.
pub const THINK_CLOSE: &str = "</think>";

/// Split a whole reply into `(thought, answer)`.
///
/// `Off` performs no parsing and returns the text untouched as the answer.
/// An unclosed marker treats the rest of the text as reasoning.
pub fn split_thoughts(text: &str, mode: ThoughtMode) -> (String, String) {
    if mode == ThoughtMode::Off {
        return (String::new(), text.to_owned());
    }
    let Some(start) = text.find(THINK_OPEN) else {
        return (String::new(), text.to_owned());
    };
    let inner = start + THINK_OPEN.len();
    match text[inner..].find(THINK_CLOSE) {
        Some(end) => {
            let thought = text[inner..inner + end].to_owned();
            let mut answer = String::with_capacity(text.len());
            answer.push_str(&text[..start]);
            answer.push_str(&text[inner + end + THINK_CLOSE.len()..]);
            (thought, answer)
        }
        None => (text[inner..].to_owned(), text[..start].to_owned()),
    }
}

/// One tagged piece of streamed reply text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    /// Text inside the reasoning block.
    Thought(String),
    /// Text outside the reasoning block.
    Answer(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    /// No opening marker seen yet.
    Seeking,
    /// Inside the reasoning block.
    Thinking,
    /// Past the closing marker.
    Closed,
}

/// Incremental reasoning/answer scanner.
///
/// Feed fragments with [`push`](Self::push); each returns the tagged pieces
/// that are certain so far. A fragment holding both the tail of the
/// reasoning and the head of the answer comes back as two pieces. Call
/// [`finish`](Self::finish) at stream end to flush a held partial marker.
#[derive(Debug)]
pub struct ThoughtSplitter {
    mode: ThoughtMode,
    state: State,
    carry: String,
}

impl ThoughtSplitter {
    /// Create a scanner for one stream.
    pub fn new(mode: ThoughtMode) -> Self {
        Self {
            mode,
            state: State::Seeking,
            carry: String::new(),
        }
    }

    /// Scan one incoming fragment.
    pub fn push(&mut self, fragment: &str) -> Vec<Segment> {
        if self.mode == ThoughtMode::Off {
            if fragment.is_empty() {
                return Vec::new();
            }
            return vec![Segment::Answer(fragment.to_owned())];
        }

        let mut buf = std::mem::take(&mut self.carry);
        buf.push_str(fragment);
        let mut out = Vec::new();

        loop {
            match self.state {
                State::Seeking => {
                    if let Some(at) = buf.find(THINK_OPEN) {
                        if at > 0 {
                            out.push(Segment::Answer(buf[..at].to_owned()));
                        }
                        buf.drain(..at + THINK_OPEN.len());
                        self.state = State::Thinking;
                    } else {
                        self.hold(buf, THINK_OPEN, Segment::Answer, &mut out);
                        break;
                    }
                }
                State::Thinking => {
                    if let Some(at) = buf.find(THINK_CLOSE) {
                        if at > 0 {
                            out.push(Segment::Thought(buf[..at].to_owned()));
                        }
                        buf.drain(..at + THINK_CLOSE.len());
                        self.state = State::Closed;
                    } else {
                        self.hold(buf, THINK_CLOSE, Segment::Thought, &mut out);
                        break;
                    }
                }
                State::Closed => {
                    if !buf.is_empty() {
                        out.push(Segment::Answer(buf));
                    }
                    break;
                }
            }
        }
        out
    }

    /// Flush whatever is still held back.
    ///
    /// A partial marker at stream end was not a marker after all, so it is
    /// emitted as literal text of the current segment.
    pub fn finish(mut self) -> Option<Segment> {
        if self.carry.is_empty() {
            return None;
        }
        let carry = std::mem::take(&mut self.carry);
        Some(match self.state {
            State::Thinking => Segment::Thought(carry),
            _ => Segment::Answer(carry),
        })
    }

    /// Emit everything but a trailing partial `marker`, which is carried to
    /// the next fragment.
    fn hold(
        &mut self,
        buf: String,
        marker: &str,
        tag: fn(String) -> Segment,
        out: &mut Vec<Segment>,
    ) {
        let keep = partial_suffix(&buf, marker);
        let cut = buf.len() - keep;
        if cut > 0 {
            out.push(tag(buf[..cut].to_owned()));
        }
        self.carry = buf[cut..].to_owned();
    }
}

/// Length of the longest proper suffix of `buf` that is a prefix of
/// `marker`.
fn partial_suffix(buf: &str, marker: &str) -> usize {
    let max = marker.len().saturating_sub(1).min(buf.len());
    for len in (1..=max).rev() {
        if buf.is_char_boundary(buf.len() - len)
            && marker.as_bytes().starts_with(&buf.as_bytes()[buf.len() - len..])
        {
            return len;
        }
    }
    0
}

/// Turns tagged segments back into user-visible text per mode.
///
/// `Strip` drops reasoning; `Preserve` re-inserts synthetic markers exactly
/// once at each boundary, so the consumer sees the marker convention even
/// when the backend delivered reasoning out of band.
#[derive(Debug)]
pub struct ThoughtRender {
    mode: ThoughtMode,
    in_thought: bool,
}

impl ThoughtRender {
    /// Create a renderer for one stream.
    pub fn new(mode: ThoughtMode) -> Self {
        Self {
            mode,
            in_thought: false,
        }
    }

    /// Render one segment, or `None` when the segment is suppressed.
    pub fn render(&mut self, segment: Segment) -> Option<String> {
        match segment {
            Segment::Thought(text) => match self.mode {
                ThoughtMode::Off => Some(text),
                ThoughtMode::Strip => None,
                ThoughtMode::Preserve => Some(if self.in_thought {
                    text
                } else {
                    self.in_thought = true;
                    format!("{THINK_OPEN}{text}")
                }),
            },
            Segment::Answer(text) => {
                if self.mode == ThoughtMode::Preserve && self.in_thought {
                    self.in_thought = false;
                    Some(format!("{THINK_CLOSE}{text}"))
                } else {
                    Some(text)
                }
            }
        }
    }
}
