//! Playback controller: owns the timebase and the parsed track, and turns user
//! gestures and animation frames into [`Effect`]s for the page glue to carry out.

mod timebase;

pub use timebase::{Timebase, format_time, hover_time};

use log::info;

use crate::lyrics::LyricTrack;

/// Side effects requested by the controller, in the order they should run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Effect {
    /// Schedule the next animation frame.
    RequestFrame,
    /// Drop every pending character reveal.
    CancelReveals,
    /// Redraw the lyric display and clock for the current state.
    Render,
    PlayAudio,
    PauseAudio,
    /// The run reached its end.
    Finished,
}

#[derive(Debug, Clone)]
pub struct PlaybackController {
    track: LyricTrack,
    timebase: Timebase,
    seeking: bool,
    resume_after_seek: bool,
}

impl PlaybackController {
    pub fn new(track: LyricTrack) -> Self {
        let timebase = Timebase::new(track.total_time());
        Self { track, timebase, seeking: false, resume_after_seek: false }
    }

    pub fn track(&self) -> &LyricTrack {
        &self.track
    }

    pub fn timebase(&self) -> &Timebase {
        &self.timebase
    }

    pub fn is_playing(&self) -> bool {
        self.timebase.is_playing()
    }

    pub fn is_seeking(&self) -> bool {
        self.seeking
    }

    pub fn display_index(&self) -> usize {
        self.track.display_index(self.timebase.current_time())
    }

    /// Flip play/pause. `audio_coupled` is true when the active background plays the
    /// song's audio and must follow the lyric transport.
    pub fn toggle_play(&mut self, now_ms: f64, audio_coupled: bool) -> Vec<Effect> {
        let mut effects = Vec::new();
        if self.timebase.is_playing() {
            self.timebase.pause();
            effects.extend([Effect::CancelReveals, Effect::Render]);
            if audio_coupled {
                effects.push(Effect::PauseAudio);
            }
        } else if self.timebase.play(now_ms) {
            effects.push(Effect::RequestFrame);
            if audio_coupled {
                effects.push(Effect::PlayAudio);
            }
        } else {
            info!("playback finished; seek or reset to replay");
        }
        effects
    }

    /// One animation frame at `now_ms`.
    pub fn frame(&mut self, now_ms: f64) -> Vec<Effect> {
        if !self.timebase.is_playing() {
            return Vec::new();
        }
        if self.timebase.advance_to(now_ms) {
            info!("lyric playback completed");
            vec![Effect::CancelReveals, Effect::Render, Effect::Finished]
        } else {
            vec![Effect::Render, Effect::RequestFrame]
        }
    }

    /// Pointer went down on the progress bar: pause for the duration of the gesture.
    pub fn begin_seek(&mut self) -> Vec<Effect> {
        if !self.seeking {
            self.seeking = true;
            self.resume_after_seek = self.timebase.is_playing();
        }
        self.timebase.pause();
        vec![Effect::CancelReveals]
    }

    /// Jump to `seconds`. Always re-renders, playing or not.
    pub fn seek(&mut self, seconds: f64) -> Vec<Effect> {
        self.timebase.seek(seconds);
        vec![Effect::Render]
    }

    pub fn seek_by(&mut self, delta_seconds: f64) -> Vec<Effect> {
        let target = self.timebase.current_time() + delta_seconds;
        self.seek(target)
    }

    /// Pointer released: resume only if playback was running when the gesture began.
    pub fn end_seek(&mut self, now_ms: f64) -> Vec<Effect> {
        if !self.seeking {
            return Vec::new();
        }
        self.seeking = false;
        let resume = std::mem::take(&mut self.resume_after_seek);
        if resume && self.timebase.play(now_ms) {
            vec![Effect::RequestFrame]
        } else {
            Vec::new()
        }
    }

    pub fn reset(&mut self, audio_coupled: bool) -> Vec<Effect> {
        let was_playing = self.timebase.is_playing();
        self.timebase.reset();
        self.seeking = false;
        self.resume_after_seek = false;
        let mut effects = vec![Effect::CancelReveals, Effect::Render];
        if was_playing && audio_coupled {
            effects.push(Effect::PauseAudio);
        }
        effects
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn controller() -> PlaybackController {
        let track = LyricTrack::parse("[00:01.00]Hello\n[00:03.50]World", 5.0).unwrap();
        PlaybackController::new(track)
    }

    #[test]
    fn test_toggle_play_requests_frame_then_pause_cancels() {
        let mut c = controller();
        assert_eq!(c.toggle_play(0.0, false), vec![Effect::RequestFrame]);
        assert!(c.is_playing());
        assert_eq!(c.toggle_play(16.0, false), vec![Effect::CancelReveals, Effect::Render]);
        assert!(!c.is_playing());
    }

    #[test]
    fn test_audio_follows_transport_only_when_coupled() {
        let mut c = controller();
        assert_eq!(
            c.toggle_play(0.0, true),
            vec![Effect::RequestFrame, Effect::PlayAudio]
        );
        assert_eq!(
            c.toggle_play(0.0, true),
            vec![Effect::CancelReveals, Effect::Render, Effect::PauseAudio]
        );
    }

    #[test]
    fn test_frames_advance_and_finish() {
        let mut c = controller();
        c.toggle_play(0.0, false);
        assert_eq!(c.frame(2_000.0), vec![Effect::Render, Effect::RequestFrame]);
        assert_eq!(c.display_index(), 0);
        assert_eq!(c.frame(5_000.0), vec![Effect::Render, Effect::RequestFrame]);
        assert_eq!(c.display_index(), 1);
        assert_eq!(
            c.frame(9_000.0),
            vec![Effect::CancelReveals, Effect::Render, Effect::Finished]
        );
        assert!(!c.is_playing());
        assert_eq!(c.timebase().current_time(), 8.5);
        assert!(c.frame(9_500.0).is_empty());
        assert!(c.toggle_play(10_000.0, false).is_empty());
    }

    #[test]
    fn test_seek_gesture_resumes_only_if_it_was_playing() {
        let mut c = controller();
        c.toggle_play(0.0, false);
        assert_eq!(c.begin_seek(), vec![Effect::CancelReveals]);
        assert!(!c.is_playing());
        // Repeated pointer-down events must not overwrite the saved state.
        c.begin_seek();
        assert_eq!(c.seek(4.0), vec![Effect::Render]);
        assert_eq!(c.end_seek(100.0), vec![Effect::RequestFrame]);
        assert!(c.is_playing());

        c.toggle_play(200.0, false);
        c.begin_seek();
        c.seek(1.0);
        assert!(c.end_seek(300.0).is_empty());
        assert!(!c.is_playing());
    }

    #[test]
    fn test_seek_renders_while_paused_and_clamps() {
        let mut c = controller();
        assert_eq!(c.seek(100.0), vec![Effect::Render]);
        assert_eq!(c.timebase().current_time(), 8.5);
        c.seek_by(-20.0);
        assert_eq!(c.timebase().current_time(), 0.0);
    }

    #[test]
    fn test_end_seek_without_begin_is_noop() {
        let mut c = controller();
        assert!(c.end_seek(0.0).is_empty());
    }

    #[test]
    fn test_reset_after_finish_allows_replay() {
        let mut c = controller();
        c.toggle_play(0.0, false);
        c.frame(20_000.0);
        assert_eq!(c.reset(true), vec![Effect::CancelReveals, Effect::Render]);
        assert_eq!(c.toggle_play(0.0, false), vec![Effect::RequestFrame]);
    }
}
