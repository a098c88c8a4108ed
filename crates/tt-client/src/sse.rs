//! Incremental decoder for `text/event-stream` bodies.
//!
//! Only the subset the backend emits is interpreted: `event:`, `data:` and
//! comment lines. Frames end at a blank line; chunks may split a frame (or a
//! UTF-8 sequence) anywhere.

/// One complete frame from the stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SseFrame {
    /// `event: <name>` plus joined `data:` lines. Name defaults to `message`.
    Event { event: String, data: String },
    /// A comment-only frame such as the `:ping` keepalive.
    Comment(String),
}

#[derive(Debug, Default)]
pub struct SseDecoder {
    buf: Vec<u8>,
}

impl SseDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one chunk and return every frame it completed.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<SseFrame> {
        self.buf.extend(chunk.iter().copied().filter(|b| *b != b'\r'));

        let mut frames = Vec::new();
        while let Some(end) = find_blank_line(&self.buf) {
            let block: Vec<u8> = self.buf.drain(..end + 2).collect();
            let text = String::from_utf8_lossy(&block[..end]);
            if let Some(frame) = parse_block(&text) {
                frames.push(frame);
            }
        }
        frames
    }

    /// Bytes received but not yet part of a complete frame.
    pub fn pending(&self) -> usize {
        self.buf.len()
    }
}

fn find_blank_line(buf: &[u8]) -> Option<usize> {
    buf.windows(2).position(|w| w == b"\n\n")
}

fn parse_block(block: &str) -> Option<SseFrame> {
    let mut event: Option<String> = None;
    let mut data: Vec<&str> = Vec::new();
    let mut comment: Option<String> = None;

    for line in block.lines() {
        if let Some(rest) = line.strip_prefix(':') {
            comment.get_or_insert_with(|| rest.trim().to_string());
            continue;
        }
        let (field, value) = match line.split_once(':') {
            Some((f, v)) => (f, v.strip_prefix(' ').unwrap_or(v)),
            None => (line, ""),
        };
        match field {
            "event" => event = Some(value.to_string()),
            "data" => data.push(value),
            _ => {}
        }
    }

    if event.is_some() || !data.is_empty() {
        Some(SseFrame::Event {
            event: event.unwrap_or_else(|| "message".to_string()),
            data: data.join("\n"),
        })
    } else {
        comment.map(SseFrame::Comment)
    }
}
