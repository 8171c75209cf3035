//! Assembly of a logical response out of one or more frames.
//!
//! Chat-style services rarely answer in a single tidy frame. Many stream a
//! "typing" liveness token before the substantive reply, some split the
//! reply across frames, and some simply go quiet. The assembler is a small
//! state machine that absorbs liveness noise, accumulates real payloads, and
//! decides when the logical response is complete.
//!
//! The assembler is deliberately clock-free: it reacts to the frames it is
//! fed and to an explicit [`timed_out`](ResponseAssembler::timed_out) call.
//! The session owns the deadline and the reads; this keeps the completion
//! rules testable without any I/O.
//!
//! One instance serves exactly one request cycle and is discarded after
//! yielding its result.

/// The assembler's position in a request cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssemblerState {
    /// Waiting for the first usable frame.
    AwaitingFrame,
    /// A typing indicator was observed; the next non-indicator payload is
    /// the response.
    TypingObserved,
    /// A complete response has been produced.
    Done,
    /// The deadline elapsed; whatever was collected is the response.
    TimedOut,
}

/// Outcome of feeding one frame payload to the assembler.
#[derive(Debug, PartialEq, Eq)]
pub enum Assembly {
    /// More frames are needed.
    Pending,
    /// The logical response is complete.
    Complete(String),
}

/// Collects decoded text fragments for one request/response cycle.
pub struct ResponseAssembler {
    state: AssemblerState,
    parts: Vec<String>,
    collected_len: usize,
    typing_indicators: Vec<String>,
    respond_after_typing: bool,
    max_response_length: usize,
}

impl ResponseAssembler {
    /// Creates an assembler for a single request cycle.
    ///
    /// - `typing_indicators`: payloads containing any of these substrings
    ///   are liveness noise, absorbed and never appended.
    /// - `respond_after_typing`: when `true`, the first non-indicator
    ///   payload after an indicator completes the response; when `false`,
    ///   the first non-empty payload completes it immediately.
    /// - `max_response_length`: accumulated length beyond which the
    ///   response is considered complete.
    pub fn new(
        typing_indicators: Vec<String>,
        respond_after_typing: bool,
        max_response_length: usize,
    ) -> Self {
        Self {
            state: AssemblerState::AwaitingFrame,
            parts: Vec::new(),
            collected_len: 0,
            typing_indicators,
            respond_after_typing,
            max_response_length,
        }
    }

    /// Current state; `Done` and `TimedOut` are terminal.
    pub fn state(&self) -> AssemblerState {
        self.state
    }

    /// Feeds one decoded text payload to the state machine.
    ///
    /// Empty payloads and typing indicators leave the accumulated response
    /// untouched. Must not be called once the assembler is terminal.
    pub fn observe(&mut self, text: &str) -> Assembly {
        debug_assert!(
            !matches!(self.state, AssemblerState::Done | AssemblerState::TimedOut),
            "assembler observed a frame after completion"
        );

        // No usable payload: stay where we are and keep reading.
        if text.is_empty() {
            return Assembly::Pending;
        }

        if self.is_typing_indicator(text) {
            if self.respond_after_typing {
                self.state = AssemblerState::TypingObserved;
            }
            // Indicators are absorbed, never appended.
            return Assembly::Pending;
        }

        if !self.respond_after_typing {
            // Immediate mode: the first real payload is the whole response.
            self.state = AssemblerState::Done;
            return Assembly::Complete(text.to_owned());
        }

        if self.state == AssemblerState::TypingObserved {
            // Typing ended and the substantive answer arrived.
            self.state = AssemblerState::Done;
            return Assembly::Complete(text.to_owned());
        }

        self.parts.push(text.to_owned());
        self.collected_len += text.len();

        if self.collected_len > self.max_response_length {
            self.state = AssemblerState::Done;
            return Assembly::Complete(self.collected());
        }

        Assembly::Pending
    }

    /// Marks the deadline as elapsed and yields the soft result: the
    /// concatenation of every non-indicator payload collected so far, or an
    /// empty string when nothing usable arrived. An empty result is a soft
    /// failure for the caller to report, not an error.
    pub fn timed_out(&mut self) -> String {
        self.state = AssemblerState::TimedOut;
        self.collected()
    }

    /// Whether at least one non-indicator payload has been collected.
    pub fn has_content(&self) -> bool {
        !self.parts.is_empty()
    }

    /// The accumulated response so far.
    pub fn collected(&self) -> String {
        self.parts.concat()
    }

    fn is_typing_indicator(&self, text: &str) -> bool {
        // Substring containment, not equality: services wrap the token in
        // event envelopes like {"status": "typing on"}.
        self.typing_indicators
            .iter()
            .any(|indicator| !indicator.is_empty() && text.contains(indicator))
    }
}
