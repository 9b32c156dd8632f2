//! Adaptive scan cursor
//!
//! After a capture the cursor jumps far ahead, since the frames right after a
//! slide change are usually the tail of a transition. After a rejected frame
//! it creeps forward so the next change is caught close to where it happens.

use crate::{Error, Result};

/// Frame rate assumed when the source reports none
pub const DEFAULT_FPS: f64 = 30.0;

/// Seconds-based jump configuration
#[derive(Debug, Clone)]
pub struct SkipConfig {
    /// Jump after a frame that was not captured
    pub min_skip_seconds: f64,
    /// Jump after a capture
    pub max_skip_seconds: f64,
}

impl Default for SkipConfig {
    fn default() -> Self {
        Self {
            min_skip_seconds: 2.0,
            max_skip_seconds: 10.0,
        }
    }
}

impl SkipConfig {
    pub fn validate(&self) -> Result<()> {
        for (name, value) in [
            ("min skip", self.min_skip_seconds),
            ("max skip", self.max_skip_seconds),
        ] {
            if !value.is_finite() || value <= 0.0 {
                return Err(Error::Configuration(format!(
                    "{name} must be a positive number of seconds (got {value})"
                )));
            }
        }
        Ok(())
    }
}

/// Replaces a missing or nonsensical frame rate with [`DEFAULT_FPS`]
pub fn effective_fps(reported: f64) -> f64 {
    if reported.is_finite() && reported > 0.0 {
        reported
    } else {
        DEFAULT_FPS
    }
}

/// Frame index of a point in time, truncated
pub fn frame_at(seconds: f64, frames_per_second: f64) -> u64 {
    (seconds * frames_per_second).max(0.0) as u64
}

/// First frame whose timestamp is not before `seconds`
///
/// Products within a millionth of a frame of a whole number count as exact.
pub fn first_frame_at_or_after(seconds: f64, frames_per_second: f64) -> u64 {
    let exact = (seconds * frames_per_second).max(0.0);
    let nearest = exact.round();
    if (exact - nearest).abs() < 1e-6 {
        nearest as u64
    } else {
        exact.ceil() as u64
    }
}

fn jump_frames(frames_per_second: f64, seconds: f64) -> u64 {
    (frames_per_second * seconds).round().max(0.0) as u64
}

/// Position and jump sizes of the scan
#[derive(Debug, Clone, PartialEq)]
pub struct CursorState {
    pub current_frame_index: u64,
    pub end_frame_index: u64,
    pub frames_per_second: f64,
    pub jump_small_frames: u64,
    pub jump_large_frames: u64,
}

impl CursorState {
    /// The state after one detection outcome
    pub fn transition(&self, is_new: bool) -> CursorState {
        let jump = if is_new {
            self.jump_large_frames
        } else {
            self.jump_small_frames
        };
        CursorState {
            current_frame_index: self.current_frame_index.saturating_add(jump),
            ..self.clone()
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.current_frame_index >= self.end_frame_index
    }
}

/// What the scan should do next
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CursorStep {
    /// Read the frame at this index
    Read(u64),
    /// The window is exhausted
    Finished,
}

/// Owns the cursor state for one scan
#[derive(Debug, Clone)]
pub struct CursorController {
    state: CursorState,
    start_frame_index: u64,
    steps: u64,
}

impl CursorController {
    /// Derives jump sizes from `skip` and positions the cursor at `start_frame_index`
    pub fn new(
        skip: &SkipConfig,
        reported_fps: f64,
        start_frame_index: u64,
        end_frame_index: u64,
    ) -> Result<Self> {
        skip.validate()?;

        let frames_per_second = effective_fps(reported_fps);
        let jump_small_frames = jump_frames(frames_per_second, skip.min_skip_seconds);
        let jump_large_frames = jump_frames(frames_per_second, skip.max_skip_seconds);

        if jump_small_frames < 1 || jump_large_frames < 1 {
            return Err(Error::Configuration(format!(
                "skips of {}s/{}s at {:.3} fps round to {}/{} frames, need at least one",
                skip.min_skip_seconds,
                skip.max_skip_seconds,
                frames_per_second,
                jump_small_frames,
                jump_large_frames
            )));
        }
        if jump_large_frames < jump_small_frames {
            log::warn!(
                "Jump after a capture ({} frames) is shorter than after a miss ({} frames)",
                jump_large_frames,
                jump_small_frames
            );
        }

        log::debug!(
            "Cursor over frames {}..{} at {:.3} fps, jumps {}/{} frames",
            start_frame_index,
            end_frame_index,
            frames_per_second,
            jump_small_frames,
            jump_large_frames
        );

        Ok(Self {
            state: CursorState {
                current_frame_index: start_frame_index,
                end_frame_index,
                frames_per_second,
                jump_small_frames,
                jump_large_frames,
            },
            start_frame_index,
            steps: 0,
        })
    }

    /// The step to take before any detection has happened
    pub fn first_step(&self) -> CursorStep {
        self.step()
    }

    /// Moves past the current frame according to the detection outcome
    pub fn advance(&mut self, is_new: bool) -> CursorStep {
        self.state = self.state.transition(is_new);
        self.steps += 1;
        self.step()
    }

    fn step(&self) -> CursorStep {
        if self.state.is_terminal() {
            CursorStep::Finished
        } else {
            CursorStep::Read(self.state.current_frame_index)
        }
    }

    /// Moves the cursor up to the frame the source actually delivered
    ///
    /// Sources may hand back a later frame than requested; never moves back.
    pub fn realign(&mut self, delivered_frame_index: u64) {
        if delivered_frame_index > self.state.current_frame_index {
            log::trace!(
                "Requested frame {} but source delivered {}",
                self.state.current_frame_index,
                delivered_frame_index
            );
            self.state.current_frame_index = delivered_frame_index;
        }
    }

    pub fn position(&self) -> u64 {
        self.state.current_frame_index
    }

    pub fn is_finished(&self) -> bool {
        self.state.is_terminal()
    }

    pub fn state(&self) -> &CursorState {
        &self.state
    }

    pub fn start_frame_index(&self) -> u64 {
        self.start_frame_index
    }

    /// Number of advances so far
    pub fn steps(&self) -> u64 {
        self.steps
    }

    /// Fraction of the window covered, clamped to [0, 1]
    pub fn progress(&self) -> f64 {
        let span = self
            .state
            .end_frame_index
            .saturating_sub(self.start_frame_index)
            .max(1);
        let done = self
            .state
            .current_frame_index
            .saturating_sub(self.start_frame_index);
        (done as f64 / span as f64).clamp(0.0, 1.0)
    }
}
