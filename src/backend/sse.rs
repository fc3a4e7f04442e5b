//! SSE framing for the chat channel.
//!
//! Splits the response byte stream into frames on blank lines and yields the
//! concatenated `data:` payload of each frame. The backend emits
//! single-line `data:` records; multi-line data, comments, and CRLF endings
//! are tolerated anyway.

use std::pin::Pin;

use futures_util::Stream;

use super::errors::BackendError;

/// SSE parser that converts a byte stream into frame payloads.
pub struct SseParser<S> {
    inner: S,
    buffer: Vec<u8>,
}

impl<S> SseParser<S> {
    pub fn new(stream: S) -> Self {
        Self {
            inner: stream,
            buffer: Vec::new(),
        }
    }
}

impl<S, E> Stream for SseParser<S>
where
    S: Stream<Item = std::result::Result<bytes::Bytes, E>> + Unpin,
    E: std::fmt::Display,
{
    type Item = Result<String, BackendError>;

    fn poll_next(
        mut self: Pin<&mut Self>,
        cx: &mut std::task::Context<'_>,
    ) -> std::task::Poll<Option<Self::Item>> {
        use std::task::Poll;

        loop {
            // Check if we have a complete frame in the buffer
            if let Some(payload) = self.try_parse_frame() {
                return Poll::Ready(Some(Ok(payload)));
            }

            // Try to get more data from the underlying stream
            let inner = Pin::new(&mut self.inner);
            match inner.poll_next(cx) {
                Poll::Ready(Some(Ok(bytes))) => {
                    self.buffer.extend_from_slice(&bytes);
                    // Continue looping to parse
                }
                Poll::Ready(Some(Err(e))) => {
                    return Poll::Ready(Some(Err(BackendError::stream(format!(
                        "Stream error: {e}"
                    )))));
                }
                Poll::Ready(None) => {
                    // Stream ended - a final frame may lack the trailing
                    // blank line
                    if self.buffer.iter().all(u8::is_ascii_whitespace) {
                        return Poll::Ready(None);
                    }
                    let rest = std::mem::take(&mut self.buffer);
                    let payload = match std::str::from_utf8(&rest) {
                        Ok(text) => frame_data(text),
                        Err(err) => {
                            tracing::warn!(error = %err, "dropping trailing SSE frame with invalid UTF-8");
                            None
                        }
                    };
                    return Poll::Ready(payload.map(Ok));
                }
                Poll::Pending => return Poll::Pending,
            }
        }
    }
}

impl<S> SseParser<S> {
    /// Extracts the next frame payload from the buffer.
    ///
    /// Skips frames with no data (comments, bare field lines) and frames
    /// that are not valid UTF-8. Returns None when no complete frame is
    /// buffered yet.
    fn try_parse_frame(&mut self) -> Option<String> {
        loop {
            // SSE frames are separated by double newlines
            let (frame_end, delim_len) = find_double_newline(&self.buffer)?;

            // Extract the frame bytes and remove from buffer
            let frame_bytes: Vec<u8> = self.buffer.drain(..frame_end).collect();
            self.buffer.drain(..delim_len); // remove the delimiter

            // Decode UTF-8 only after we have the complete frame
            match std::str::from_utf8(&frame_bytes) {
                Ok(text) => {
                    if let Some(payload) = frame_data(text) {
                        return Some(payload);
                    }
                    // dataless frame, keep scanning
                }
                Err(err) => {
                    tracing::warn!(error = %err, "dropping SSE frame with invalid UTF-8");
                }
            }
        }
    }
}

/// Joins a frame's `data:` lines; None when the frame carries no data.
fn frame_data(frame: &str) -> Option<String> {
    let mut data: Option<String> = None;
    for line in frame.lines() {
        if let Some(rest) = line.strip_prefix("data:") {
            let rest = rest.strip_prefix(' ').unwrap_or(rest);
            match &mut data {
                Some(existing) => {
                    existing.push('\n');
                    existing.push_str(rest);
                }
                None => data = Some(rest.to_string()),
            }
        }
    }
    data
}

/// Finds the position of a double newline in the buffer.
/// Handles both LF (\n\n) and CRLF (\r\n\r\n) line endings.
/// Returns the position and the length of the delimiter (2 or 4 bytes).
fn find_double_newline(buffer: &[u8]) -> Option<(usize, usize)> {
    let crlf_pos = buffer.windows(4).position(|w| w == b"\r\n\r\n");
    let lf_pos = buffer.windows(2).position(|w| w == b"\n\n");

    match (crlf_pos, lf_pos) {
        (Some(c), Some(l)) => {
            // Return whichever comes first
            if l <= c { Some((l, 2)) } else { Some((c, 4)) }
        }
        (Some(c), None) => Some((c, 4)),
        (None, Some(l)) => Some((l, 2)),
        (None, None) => None,
    }
}
