//! Utterance segmentation over streaming recognition results.
//!
//! Final fragments are space-joined into an accumulator. An utterance is
//! complete once no new final fragment has arrived for the quiet period; the
//! deadline restarts on every non-empty final fragment. End-of-turn signals
//! from the recognizer are not boundaries.

use std::time::Duration;
use tokio::time::Instant;

/// Accumulates final fragments and decides when an utterance is complete.
#[derive(Debug)]
pub struct UtteranceSegmenter {
    accumulator: String,
    interim: String,
    quiet_period: Duration,
    deadline: Option<Instant>,
}

impl UtteranceSegmenter {
    /// Create a segmenter with the given quiet period.
    pub fn new(quiet_period: Duration) -> Self {
        Self {
            accumulator: String::new(),
            interim: String::new(),
            quiet_period,
            deadline: None,
        }
    }

    /// Feed one `(final, interim)` recognition result.
    ///
    /// Returns the live preview: the interim text when present, else the
    /// accumulated final text.
    pub fn push(&mut self, final_text: &str, interim_text: &str, now: Instant) -> &str {
        let final_text = final_text.trim();
        if !final_text.is_empty() {
            if self.accumulator.is_empty() {
                self.accumulator.push_str(final_text);
            } else {
                self.accumulator.push(' ');
                self.accumulator.push_str(final_text);
            }
            self.deadline = Some(now + self.quiet_period);
        }
        self.interim = interim_text.trim().to_owned();
        self.preview()
    }

    /// Live preview text for the presentation layer.
    pub fn preview(&self) -> &str {
        if self.interim.is_empty() {
            &self.accumulator
        } else {
            &self.interim
        }
    }

    /// Text accumulated since the last boundary.
    pub fn accumulated(&self) -> &str {
        &self.accumulator
    }

    /// When the pending boundary fires, if one is armed.
    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Open a reply window after the wake prompt: if nothing is said within
    /// `window`, the boundary fires with an empty utterance.
    ///
    /// Has no effect when a boundary is already pending.
    pub fn expect_reply(&mut self, now: Instant, window: Duration) {
        if self.deadline.is_none() {
            self.deadline = Some(now + window);
        }
    }

    /// Fire the boundary if its deadline has passed.
    ///
    /// Reads and clears the accumulator and the live preview in one step.
    pub fn fire(&mut self, now: Instant) -> Option<String> {
        match self.deadline {
            Some(deadline) if now >= deadline => {
                self.deadline = None;
                self.interim.clear();
                Some(std::mem::take(&mut self.accumulator))
            }
            _ => None,
        }
    }

    /// Drop any pending boundary and buffered text.
    pub fn cancel(&mut self) {
        self.deadline = None;
        self.interim.clear();
        self.accumulator.clear();
    }
}
