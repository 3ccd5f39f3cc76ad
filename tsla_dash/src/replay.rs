//! Replay cursor for progressive reveal of a loaded series.
//!
//! The controller owns a cursor into a series of known length and a small
//! state machine (Stopped / Playing / Finished). Every operation is total:
//! out-of-range input is clamped, never rejected.

use crate::debug_hooks;
use std::ops::Range;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplayPhase {
    Stopped,
    Playing,
    Finished,
}

impl ReplayPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReplayPhase::Stopped => "Stopped",
            ReplayPhase::Playing => "Playing",
            ReplayPhase::Finished => "Finished",
        }
    }
}

/// The part of the controller that the renderer and the session care about.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReplayState {
    pub cursor: usize,
    pub phase: ReplayPhase,
}

#[derive(Debug, Clone)]
pub struct ReplayController {
    len: usize,
    step: usize,
    state: ReplayState,
}

impl ReplayController {
    pub fn new(len: usize, step: usize) -> Self {
        Self {
            len,
            step: step.max(1),
            state: ReplayState {
                cursor: 0,
                phase: ReplayPhase::Stopped,
            },
        }
    }

    pub fn state(&self) -> ReplayState {
        self.state
    }

    pub fn cursor(&self) -> usize {
        self.state.cursor
    }

    pub fn phase(&self) -> ReplayPhase {
        self.state.phase
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn step(&self) -> usize {
        self.step
    }

    pub fn set_step(&mut self, step: usize) {
        self.step = step.max(1);
    }

    /// Rows `[0, cursor)` are visible.
    pub fn visible_range(&self) -> Range<usize> {
        0..self.state.cursor
    }

    pub fn progress(&self) -> f64 {
        if self.len == 0 {
            1.0
        } else {
            self.state.cursor as f64 / self.len as f64
        }
    }

    fn transition(&mut self, action: &str, to: ReplayPhase) {
        let from = self.state.phase;
        self.state.phase = to;
        if from != to {
            debug_hooks::log_replay_transition(action, from.as_str(), to.as_str(), self.state.cursor);
        }
    }

    /// Stopped -> Playing. Starting at the end goes straight to Finished.
    pub fn start(&mut self) {
        if self.state.phase != ReplayPhase::Stopped {
            return;
        }
        if self.state.cursor >= self.len {
            self.transition("start", ReplayPhase::Finished);
        } else {
            self.transition("start", ReplayPhase::Playing);
        }
    }

    /// Playing -> Stopped. No-op otherwise.
    pub fn pause(&mut self) {
        if self.state.phase == ReplayPhase::Playing {
            self.transition("pause", ReplayPhase::Stopped);
        }
    }

    /// Play/pause button: starts, pauses, or replays from the top once finished.
    pub fn toggle(&mut self) {
        match self.state.phase {
            ReplayPhase::Stopped => self.start(),
            ReplayPhase::Playing => self.pause(),
            ReplayPhase::Finished => {
                self.reset();
                self.start();
            }
        }
    }

    /// One tick. Only moves while Playing; returns the cursor either way.
    pub fn advance(&mut self) -> usize {
        if self.state.phase != ReplayPhase::Playing {
            return self.state.cursor;
        }
        self.state.cursor = self.state.cursor.saturating_add(self.step).min(self.len);
        debug_hooks::log_replay_tick(self.state.cursor, self.len);
        if self.state.cursor == self.len {
            self.transition("advance", ReplayPhase::Finished);
        }
        self.state.cursor
    }

    pub fn reset(&mut self) {
        self.state.cursor = 0;
        self.transition("reset", ReplayPhase::Stopped);
    }

    /// Jump to `index`, clamped to `[0, len]`. Leaving the end un-finishes a
    /// finished replay; landing on the end while playing finishes it.
    pub fn seek(&mut self, index: i64) -> usize {
        let cursor = index.clamp(0, self.len as i64) as usize;
        self.state.cursor = cursor;
        match self.state.phase {
            ReplayPhase::Finished if cursor < self.len => {
                self.transition("seek", ReplayPhase::Stopped)
            }
            ReplayPhase::Playing if cursor == self.len => {
                self.transition("seek", ReplayPhase::Finished)
            }
            _ => {}
        }
        cursor
    }

    /// Relative scrub.
    pub fn step_by(&mut self, delta: i64) -> usize {
        let target = (self.state.cursor as i64).saturating_add(delta);
        self.seek(target)
    }

    /// New series: keep the step, drop everything else.
    pub fn reload(&mut self, len: usize) {
        self.len = len;
        self.reset();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn playing(len: usize, step: usize) -> ReplayController {
        let mut rc = ReplayController::new(len, step);
        rc.start();
        rc
    }

    #[test]
    fn hundred_points_finish_after_hundred_ticks() {
        let mut rc = playing(100, 1);
        for _ in 0..99 {
            rc.advance();
            assert_eq!(rc.phase(), ReplayPhase::Playing);
        }
        assert_eq!(rc.advance(), 100);
        assert_eq!(
            rc.state(),
            ReplayState {
                cursor: 100,
                phase: ReplayPhase::Finished
            }
        );
    }

    #[test]
    fn finishes_in_ceil_len_over_step_calls() {
        for len in [1usize, 2, 7, 10, 99, 100, 101] {
            for step in [1usize, 2, 3, 10, 250] {
                let mut rc = playing(len, step);
                let mut calls = 0;
                while rc.phase() == ReplayPhase::Playing {
                    rc.advance();
                    calls += 1;
                }
                assert_eq!(calls, len.div_ceil(step), "len={len} step={step}");
                assert_eq!(rc.cursor(), len);
            }
        }
    }

    #[test]
    fn advance_never_decreases_cursor() {
        let mut rc = playing(37, 4);
        let mut last = rc.cursor();
        for _ in 0..50 {
            let now = rc.advance();
            assert!(now >= last);
            assert!(now <= rc.len());
            last = now;
        }
    }

    #[test]
    fn advance_is_inert_unless_playing() {
        let mut rc = ReplayController::new(10, 1);
        assert_eq!(rc.advance(), 0);

        rc.start();
        rc.advance();
        rc.pause();
        assert_eq!(rc.advance(), 1);
        assert_eq!(rc.phase(), ReplayPhase::Stopped);

        rc.seek(10);
        rc.start();
        assert_eq!(rc.phase(), ReplayPhase::Finished);
        assert_eq!(rc.advance(), 10);
    }

    #[test]
    fn reset_from_any_state() {
        let stopped = ReplayController::new(5, 1);
        let mut playing = ReplayController::new(5, 1);
        playing.start();
        playing.advance();
        let mut finished = ReplayController::new(5, 5);
        finished.start();
        finished.advance();
        assert_eq!(finished.phase(), ReplayPhase::Finished);

        for mut rc in [stopped, playing, finished] {
            rc.reset();
            assert_eq!(
                rc.state(),
                ReplayState {
                    cursor: 0,
                    phase: ReplayPhase::Stopped
                }
            );
        }
    }

    #[test]
    fn seek_clamps_to_bounds() {
        let mut rc = ReplayController::new(20, 1);
        assert_eq!(rc.seek(-5), 0);
        assert_eq!(rc.seek(i64::MIN), 0);
        assert_eq!(rc.seek(21), 20);
        assert_eq!(rc.seek(i64::MAX), 20);
        assert_eq!(rc.seek(7), 7);
        assert_eq!(rc.visible_range(), 0..7);
    }

    #[test]
    fn seek_back_from_finished_stops() {
        let mut rc = playing(3, 3);
        rc.advance();
        assert_eq!(rc.phase(), ReplayPhase::Finished);
        rc.seek(1);
        assert_eq!(rc.phase(), ReplayPhase::Stopped);
        rc.start();
        assert_eq!(rc.advance(), 3);
    }

    #[test]
    fn seek_to_end_while_playing_finishes() {
        let mut rc = playing(8, 1);
        rc.seek(8);
        assert_eq!(rc.phase(), ReplayPhase::Finished);
    }

    #[test]
    fn empty_series_finishes_on_start() {
        let mut rc = ReplayController::new(0, 1);
        rc.start();
        assert_eq!(rc.phase(), ReplayPhase::Finished);
        assert_eq!(rc.advance(), 0);
        assert_eq!(rc.progress(), 1.0);
    }

    #[test]
    fn toggle_cycles_and_replays_after_finish() {
        let mut rc = ReplayController::new(2, 2);
        rc.toggle();
        assert_eq!(rc.phase(), ReplayPhase::Playing);
        rc.toggle();
        assert_eq!(rc.phase(), ReplayPhase::Stopped);
        rc.toggle();
        rc.advance();
        assert_eq!(rc.phase(), ReplayPhase::Finished);
        rc.toggle();
        assert_eq!(rc.state().cursor, 0);
        assert_eq!(rc.phase(), ReplayPhase::Playing);
    }

    #[test]
    fn step_is_at_least_one() {
        let mut rc = ReplayController::new(4, 0);
        assert_eq!(rc.step(), 1);
        rc.set_step(0);
        assert_eq!(rc.step(), 1);
        rc.step_by(-3);
        assert_eq!(rc.cursor(), 0);
        rc.step_by(3);
        assert_eq!(rc.cursor(), 3);
    }
}
