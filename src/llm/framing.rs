//! Turns an upstream NDJSON byte stream into plain text fragments.
//!
//! Network chunks carry no guarantee of lining up with records: one chunk can
//! hold several records, none, or half of one. [`LineFramer`] owns that
//! problem; [`decode_record`] owns the shape of a single line.

use futures_util::{Stream, StreamExt};
use serde::Deserialize;
use tracing::{debug, warn};

use crate::llm::{models::UpstreamRecord, ByteStream, LlmError};

/// How raw chunks are cut into lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LineFraming {
    /// Carry a partial trailing line over to the next chunk.
    #[default]
    Buffered,
    /// Split every chunk on its own and drop nothing but blank segments.
    /// A record straddling two chunks turns into two unparseable halves.
    PerChunk,
}

/// Longest partial line held while waiting for its newline.
pub const MAX_LINE_BYTES: usize = 1 << 20;

#[derive(Debug)]
pub struct LineFramer {
    framing: LineFraming,
    pending: Vec<u8>,
    max_line: usize,
    /// Set while the bytes of an oversized line are being thrown away.
    overflowed: bool,
}

impl LineFramer {
    pub fn new(framing: LineFraming) -> Self {
        Self::with_max_line(framing, MAX_LINE_BYTES)
    }

    pub fn with_max_line(framing: LineFraming, max_line: usize) -> Self {
        Self {
            framing,
            pending: Vec::new(),
            max_line,
            overflowed: false,
        }
    }

    /// Feeds one chunk and returns the non-blank lines it completed.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        match self.framing {
            LineFraming::PerChunk => String::from_utf8_lossy(chunk)
                .split('\n')
                .filter_map(non_blank)
                .collect(),
            LineFraming::Buffered => {
                self.pending.extend_from_slice(chunk);

                let Some(last_newline) = self.pending.iter().rposition(|b| *b == b'\n') else {
                    self.check_overflow();
                    return Vec::new();
                };

                let rest = self.pending.split_off(last_newline + 1);
                let complete = std::mem::replace(&mut self.pending, rest);

                // The first segment ends an oversized line already dropped.
                let skip = usize::from(std::mem::take(&mut self.overflowed));
                let lines = complete
                    .split(|b| *b == b'\n')
                    .skip(skip)
                    .filter_map(|line| non_blank(&String::from_utf8_lossy(line)))
                    .collect();

                self.check_overflow();
                lines
            }
        }
    }

    /// Flushes whatever is left once the upstream closes without a final newline.
    pub fn finish(&mut self) -> Option<String> {
        let rest = std::mem::take(&mut self.pending);
        if std::mem::take(&mut self.overflowed) {
            return None;
        }
        non_blank(&String::from_utf8_lossy(&rest))
    }

    fn check_overflow(&mut self) {
        if self.pending.len() > self.max_line {
            warn!(
                "Skipping upstream line longer than {} bytes as unparseable",
                self.max_line
            );
            self.pending.clear();
            self.overflowed = true;
        }
    }
}

fn non_blank(line: &str) -> Option<String> {
    let line = line.trim_end_matches('\r');
    if line.trim().is_empty() {
        None
    } else {
        Some(line.to_string())
    }
}

/// Parses one line; `None` when it is not a record we understand.
pub fn decode_record(line: &str) -> Option<UpstreamRecord> {
    serde_json::from_str(line).ok()
}

/// What one line adds to the relay.
struct Decoded {
    text: Option<String>,
    done: bool,
}

fn interpret(line: &str) -> Result<Decoded, LlmError> {
    match decode_record(line) {
        Some(UpstreamRecord::Fragment { response, done }) => Ok(Decoded {
            text: (!response.is_empty()).then_some(response),
            done,
        }),
        Some(UpstreamRecord::Failure { error }) => Err(LlmError::Api(error)),
        None => {
            warn!("Skipping unparseable upstream line: {}", line);
            Ok(Decoded {
                text: None,
                done: false,
            })
        }
    }
}

/// Relays the `response` field of every record as soon as its line completes.
///
/// The stream ends at the record marked `done`, or after yielding the first
/// error, whether it came from the network or from an upstream error record.
pub fn relay_fragments(
    mut upstream: ByteStream,
    framing: LineFraming,
) -> impl Stream<Item = Result<String, LlmError>> + Send + 'static {
    async_stream::stream! {
        let mut framer = LineFramer::new(framing);

        while let Some(chunk) = upstream.next().await {
            let bytes = match chunk {
                Ok(bytes) => bytes,
                Err(e) => {
                    yield Err(e);
                    return;
                }
            };

            for line in framer.push(&bytes) {
                match interpret(&line) {
                    Ok(decoded) => {
                        if let Some(text) = decoded.text {
                            yield Ok(text);
                        }
                        if decoded.done {
                            debug!("Upstream reported the generation complete");
                            return;
                        }
                    }
                    Err(e) => {
                        yield Err(e);
                        return;
                    }
                }
            }
        }

        if let Some(line) = framer.finish() {
            match interpret(&line) {
                Ok(Decoded { text: Some(text), .. }) => yield Ok(text),
                Ok(_) => {}
                Err(e) => yield Err(e),
            }
        }
    }
}
