//! bg3: Web Audio spectrum visualizer.
//!
//! The renderer moves through three modes. `Waiting` shows a prompt until both
//! the lyric file and the audio file are loaded; `Idle` draws a synthetic wave
//! while the song is paused; `Reactive` draws the analyser's frequency data in
//! the selected [`VisualizerStyle`] while the song plays.

use std::cell::RefCell;
use std::f64::consts::TAU;
use std::rc::Rc;
use std::str::FromStr;

use futures::future::{FutureExt, LocalBoxFuture};
use rand::rngs::SmallRng;
use gloo_timers::callback::Interval;
use log::{debug, error, info, warn};
use wasm_bindgen::JsValue;
use wasm_bindgen_futures::{JsFuture, spawn_local};
use web_sys::{
    AnalyserNode, AudioContext, AudioContextState, CanvasRenderingContext2d, HtmlAudioElement, HtmlCanvasElement,
    HtmlElement, MediaElementAudioSourceNode,
};

use super::color::{DEFAULT_THEME, Rgb};
use super::dom::{Dom, backdrop_canvas, context_2d, fit_to_viewport, init_error};
use super::frame::FrameLoop;
use super::{Background, option_number};
use crate::error::{HostError, js_error_text};
use crate::rng::{self, within};

const WAITING_TEXT: &str = "Upload LRC + Audio to start visualizer";
const WAITING_REDRAW_MS: u32 = 1_000;
const IDLE_BARS: usize = 64;
const DEFAULT_BAR_COUNT: u32 = 128;
const DEFAULT_SENSITIVITY: f64 = 5.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum VisualizerStyle {
    #[default]
    Bars,
    Circular,
    Waveform,
    Particles,
}

impl FromStr for VisualizerStyle {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "bars" => Ok(Self::Bars),
            "circular" => Ok(Self::Circular),
            "waveform" => Ok(Self::Waveform),
            "particles" => Ok(Self::Particles),
            other => Err(format!("unknown visualizer style '{other}'")),
        }
    }
}

/// Analyser FFT size for a requested bar count. The analyser yields half as
/// many bins as its FFT size, and the size must be a power of two in 32..=32768.
pub fn fft_size_for(bar_count: u32) -> u32 {
    bar_count.saturating_mul(2).next_power_of_two().clamp(32, 32_768)
}

/// Height of idle bar `i` at `t` seconds.
pub fn idle_bar_height(t: f64, i: usize) -> f64 {
    (t + i as f64 * 0.2).sin() * 100.0 + 150.0
}

/// Height of a spectrum bar. Sensitivity 5 is unity gain; the result never
/// exceeds the canvas height.
pub fn bar_height(value: u8, canvas_height: f64, sensitivity: f64) -> f64 {
    let gain = sensitivity / DEFAULT_SENSITIVITY;
    (f64::from(value) / 255.0 * canvas_height * 0.8 * gain).clamp(0.0, canvas_height)
}

/// Inner and outer end of spoke `i` of `len` around a circle.
pub fn spoke(center: (f64, f64), radius: f64, i: usize, len: usize, length: f64) -> ((f64, f64), (f64, f64)) {
    let angle = i as f64 / len.max(1) as f64 * TAU;
    let (sin, cos) = angle.sin_cos();
    (
        (center.0 + cos * radius, center.1 + sin * radius),
        (center.0 + cos * (radius + length), center.1 + sin * (radius + length)),
    )
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    Waiting,
    Idle,
    Reactive,
}

struct Painter {
    canvas: HtmlCanvasElement,
    ctx: CanvasRenderingContext2d,
}

/// An element can feed only one source node for its whole life, so the
/// context and source outlive the visualizer and are reused on re-activation.
struct Taps<E, T> {
    entries: Vec<(E, T)>,
}

impl<E: PartialEq + Clone, T: Clone> Taps<E, T> {
    const fn new() -> Self {
        Self { entries: Vec::new() }
    }

    /// The tap for `element`, opened with `open` the first time. The flag is
    /// `true` when the tap was just opened.
    fn get_or_try_open<Er>(&mut self, element: &E, open: impl FnOnce() -> Result<T, Er>) -> Result<(T, bool), Er> {
        if let Some((_, tap)) = self.entries.iter().find(|(e, _)| e == element) {
            return Ok((tap.clone(), false));
        }
        let tap = open()?;
        self.entries.push((element.clone(), tap.clone()));
        Ok((tap, true))
    }
}

#[derive(Clone)]
struct Tap {
    context: AudioContext,
    source: MediaElementAudioSourceNode,
}

impl Tap {
    fn open(element: &HtmlAudioElement) -> Result<Self, JsValue> {
        let context = AudioContext::new()?;
        let source = context.create_media_element_source(element)?;
        Ok(Self { context, source })
    }
}

thread_local! {
    static TAPS: RefCell<Taps<HtmlAudioElement, Tap>> = const { RefCell::new(Taps::new()) };
}

struct AudioGraph {
    context: AudioContext,
    analyser: AnalyserNode,
    element: HtmlAudioElement,
    source: MediaElementAudioSourceNode,
    data: Vec<u8>,
}

impl AudioGraph {
    /// Route `element` through a fresh analyser. The flag is `true` when the
    /// element was tapped for the first time.
    fn connect(element: &HtmlAudioElement, fft_size: u32) -> Result<(Self, bool), JsValue> {
        let (Tap { context, source }, fresh) =
            TAPS.with(|taps| taps.borrow_mut().get_or_try_open(element, || Tap::open(element)))?;
        let analyser = context.create_analyser()?;
        analyser.set_fft_size(fft_size);
        // drops the direct route to the speakers left by `release`
        source.disconnect()?;
        source.connect_with_audio_node(&analyser)?;
        analyser.connect_with_audio_node(&context.destination())?;
        let data = vec![0; analyser.frequency_bin_count() as usize];
        Ok((Self { context, analyser, element: element.clone(), source, data }, fresh))
    }

    fn resize(&mut self, fft_size: u32) {
        self.analyser.set_fft_size(fft_size);
        self.data = vec![0; self.analyser.frequency_bin_count() as usize];
    }

    fn sample(&mut self) -> &[u8] {
        self.analyser.get_byte_frequency_data(&mut self.data);
        &self.data
    }

    /// Unhook the analyser; the element stays audible through its context.
    fn release(self) {
        let rerouted = self
            .analyser
            .disconnect()
            .and_then(|()| self.source.disconnect())
            .and_then(|()| self.source.connect_with_audio_node(&self.context.destination()).map(drop));
        if let Err(err) = rerouted {
            warn!("bg3: releasing audio graph failed: {}", js_error_text(&err));
        }
    }
}

struct State {
    painter: Option<Painter>,
    graph: Option<AudioGraph>,
    theme: Rgb,
    style: VisualizerStyle,
    sensitivity: f64,
    bar_count: u32,
    mode: Mode,
    rng: SmallRng,
}

impl State {
    fn draw_waiting(&self) -> Result<(), JsValue> {
        let Some(Painter { canvas, ctx }) = &self.painter else { return Ok(()) };
        let (w, h) = (f64::from(canvas.width()), f64::from(canvas.height()));
        ctx.set_fill_style(&JsValue::from_str("rgba(0, 0, 0, 0.95)"));
        ctx.fill_rect(0.0, 0.0, w, h);
        ctx.set_fill_style(&JsValue::from_str(&DEFAULT_THEME.css_alpha(0.5)));
        ctx.set_font("24px Poppins");
        ctx.set_text_align("center");
        ctx.fill_text(WAITING_TEXT, w / 2.0, h / 2.0)
    }

    /// One animation frame. Returns whether the loop should keep running.
    fn tick(&mut self, now_ms: f64) -> bool {
        let drawn = match self.mode {
            Mode::Waiting => return false,
            Mode::Idle => self.draw_idle(now_ms / 1000.0),
            Mode::Reactive => self.draw_reactive(),
        };
        match drawn {
            Ok(running) => running,
            Err(err) => {
                error!("bg3: drawing failed: {}", js_error_text(&err));
                false
            }
        }
    }

    fn draw_idle(&self, t: f64) -> Result<bool, JsValue> {
        let Some(Painter { canvas, ctx }) = &self.painter else { return Ok(false) };
        let (w, h) = (f64::from(canvas.width()), f64::from(canvas.height()));
        ctx.set_fill_style(&JsValue::from_str("rgba(0, 0, 0, 0.1)"));
        ctx.fill_rect(0.0, 0.0, w, h);

        let bar_width = w / IDLE_BARS as f64;
        let (top, bottom) = (self.theme.css_alpha(0.8), self.theme.css_alpha(0.2));
        for i in 0..IDLE_BARS {
            let height = idle_bar_height(t, i);
            let (x, y) = (i as f64 * bar_width, h - height);
            let gradient = ctx.create_linear_gradient(x, y, x, h);
            gradient.add_color_stop(0.0, &top)?;
            gradient.add_color_stop(1.0, &bottom)?;
            ctx.set_fill_style(&gradient);
            ctx.fill_rect(x, y, bar_width - 2.0, height);
        }
        Ok(true)
    }

    fn draw_reactive(&mut self) -> Result<bool, JsValue> {
        let Some(graph) = self.graph.as_mut() else { return Ok(false) };
        let data = graph.sample().to_vec();
        let Some(painter) = &self.painter else { return Ok(false) };
        let ctx = painter.ctx.clone();
        let (w, h) = (f64::from(painter.canvas.width()), f64::from(painter.canvas.height()));
        ctx.set_fill_style(&JsValue::from_str("rgba(0, 0, 0, 0.2)"));
        ctx.fill_rect(0.0, 0.0, w, h);

        match self.style {
            VisualizerStyle::Bars => self.draw_bars(&ctx, &data, w, h)?,
            VisualizerStyle::Circular => self.draw_circular(&ctx, &data, w, h)?,
            VisualizerStyle::Waveform => self.draw_waveform(&ctx, &data, w, h),
            VisualizerStyle::Particles => self.draw_particles(&ctx, &data, w, h)?,
        }
        Ok(true)
    }

    fn draw_bars(&self, ctx: &CanvasRenderingContext2d, data: &[u8], w: f64, h: f64) -> Result<(), JsValue> {
        let bar_width = w / data.len().max(1) as f64;
        let base = self.theme.css_alpha(0.3);
        for (i, &value) in data.iter().enumerate() {
            let height = bar_height(value, h, self.sensitivity);
            let (x, y) = (i as f64 * bar_width, h - height);
            let hue = i as f64 / data.len() as f64 * 60.0;
            let gradient = ctx.create_linear_gradient(x, y, x, h);
            gradient.add_color_stop(0.0, &format!("hsla({hue}, 100%, 50%, 0.8)"))?;
            gradient.add_color_stop(1.0, &base)?;
            ctx.set_fill_style(&gradient);
            ctx.fill_rect(x, y, bar_width - 1.0, height);
        }
        Ok(())
    }

    fn draw_circular(&self, ctx: &CanvasRenderingContext2d, data: &[u8], w: f64, h: f64) -> Result<(), JsValue> {
        let center = (w / 2.0, h / 2.0);
        let radius = w.min(h) * 0.3;
        ctx.begin_path();
        ctx.arc(center.0, center.1, radius, 0.0, TAU)?;
        ctx.set_stroke_style(&JsValue::from_str(&self.theme.css_alpha(0.2)));
        ctx.set_line_width(2.0);
        ctx.stroke();

        let inner = self.theme.css_alpha(0.8);
        let outer = self.theme.shifted(50, -30, 30).css_alpha(0.4);
        ctx.set_line_width(w / data.len().max(1) as f64 * 2.0);
        for (i, &value) in data.iter().enumerate() {
            let length = bar_height(value, radius / 0.8, self.sensitivity);
            let ((x1, y1), (x2, y2)) = spoke(center, radius, i, data.len(), length);
            let gradient = ctx.create_linear_gradient(x1, y1, x2, y2);
            gradient.add_color_stop(0.0, &inner)?;
            gradient.add_color_stop(1.0, &outer)?;
            ctx.set_stroke_style(&gradient);
            ctx.begin_path();
            ctx.move_to(x1, y1);
            ctx.line_to(x2, y2);
            ctx.stroke();
        }
        Ok(())
    }

    fn draw_waveform(&self, ctx: &CanvasRenderingContext2d, data: &[u8], w: f64, h: f64) {
        let slice = w / data.len().max(1) as f64;
        ctx.set_line_width(3.0);
        ctx.set_stroke_style(&JsValue::from_str(&self.theme.css_alpha(0.9)));
        ctx.begin_path();
        for (i, &value) in data.iter().enumerate() {
            let (x, y) = (i as f64 * slice, h - bar_height(value, h, self.sensitivity) / 0.8);
            if i == 0 {
                ctx.move_to(x, y);
            } else {
                ctx.line_to(x, y);
            }
        }
        ctx.stroke();

        // glow pass
        ctx.set_shadow_blur(20.0);
        ctx.set_shadow_color(&self.theme.css_alpha(0.5));
        ctx.stroke();
        ctx.set_shadow_blur(0.0);
    }

    fn draw_particles(&mut self, ctx: &CanvasRenderingContext2d, data: &[u8], w: f64, h: f64) -> Result<(), JsValue> {
        let (core, edge) = (self.theme.css_alpha(0.8), self.theme.css_alpha(0.0));
        for &value in data.iter().step_by(2) {
            let size = bar_height(value, 25.0, self.sensitivity) + 2.0;
            let (x, y) = (within(&mut self.rng, w), within(&mut self.rng, h));
            let gradient = ctx.create_radial_gradient(x, y, 0.0, x, y, size)?;
            gradient.add_color_stop(0.0, &core)?;
            gradient.add_color_stop(1.0, &edge)?;
            ctx.set_fill_style(&gradient);
            ctx.begin_path();
            ctx.arc(x, y, size, 0.0, TAU)?;
            ctx.fill();
        }
        Ok(())
    }
}

pub struct AudioVisualizer {
    state: Rc<RefCell<State>>,
    frames: Option<FrameLoop>,
    waiting: Option<Interval>,
}

impl Default for AudioVisualizer {
    fn default() -> Self {
        Self {
            state: Rc::new(RefCell::new(State {
                painter: None,
                graph: None,
                theme: DEFAULT_THEME,
                style: VisualizerStyle::default(),
                sensitivity: DEFAULT_SENSITIVITY,
                bar_count: DEFAULT_BAR_COUNT,
                mode: Mode::Waiting,
                rng: rng::from_entropy(),
            })),
            frames: None,
            waiting: None,
        }
    }
}

impl AudioVisualizer {
    fn enter(&mut self, mode: Mode) {
        self.state.borrow_mut().mode = mode;
        if mode != Mode::Waiting {
            self.waiting = None;
        }
        if let Some(frames) = &self.frames {
            // restart so the next frame picks up the new mode
            frames.stop();
            if mode != Mode::Waiting {
                frames.start();
            }
        }
    }

    fn redraw_waiting(state: &RefCell<State>) {
        let state = state.borrow();
        if state.mode == Mode::Waiting {
            if let Err(err) = state.draw_waiting() {
                warn!("bg3: waiting prompt failed: {}", js_error_text(&err));
            }
        }
    }
}

/// Resume a suspended context (autoplay policy), then start the element.
fn play_through(context: AudioContext, element: HtmlAudioElement) {
    spawn_local(async move {
        if context.state() == AudioContextState::Suspended {
            match context.resume() {
                Ok(promise) => match JsFuture::from(promise).await {
                    Ok(_) => debug!("bg3: audio context resumed"),
                    Err(err) => warn!("bg3: audio context resume failed: {}", js_error_text(&err)),
                },
                Err(err) => warn!("bg3: audio context resume failed: {}", js_error_text(&err)),
            }
        }
        let started = match element.play() {
            Ok(promise) => JsFuture::from(promise).await.map(|_| ()),
            Err(err) => Err(err),
        };
        if let Err(err) = started {
            warn!("bg3: audio playback failed: {}", js_error_text(&err));
        }
    });
}

impl Background<Dom> for AudioVisualizer {
    fn init<'a>(&'a mut self, container: &'a HtmlElement) -> LocalBoxFuture<'a, Result<(), HostError>> {
        async move {
            info!("initializing audio visualizer");
            let fail = init_error("bg3");
            let canvas = backdrop_canvas("bg3-canvas").map_err(&fail)?;
            let ctx = context_2d(&canvas).map_err(&fail)?;
            container.append_child(&canvas).map_err(|e| fail(e.into()))?;

            {
                let mut state = self.state.borrow_mut();
                state.painter = Some(Painter { canvas, ctx });
                state.mode = Mode::Waiting;
            }
            Self::redraw_waiting(&self.state);

            let waiting = self.state.clone();
            self.waiting = Some(Interval::new(WAITING_REDRAW_MS, move || Self::redraw_waiting(&waiting)));

            let state = self.state.clone();
            self.frames = Some(FrameLoop::new(move |now| state.borrow_mut().tick(now)));
            Ok(())
        }
        .boxed_local()
    }

    fn destroy(&mut self) -> LocalBoxFuture<'_, ()> {
        async move {
            self.waiting = None;
            self.frames = None;
            let mut state = self.state.borrow_mut();
            if let Some(graph) = state.graph.take() {
                if let Err(err) = graph.element.pause() {
                    debug!("bg3: pausing audio failed: {}", js_error_text(&err));
                }
                graph.release();
            }
            if let Some(painter) = state.painter.take() {
                painter.canvas.remove();
            }
            info!("audio visualizer destroyed");
        }
        .boxed_local()
    }

    fn update_theme(&mut self, color: Rgb) {
        self.state.borrow_mut().theme = color;
    }

    fn resize(&mut self) {
        if let Some(painter) = &self.state.borrow().painter {
            fit_to_viewport(&painter.canvas);
        }
        Self::redraw_waiting(&self.state);
    }

    fn pause(&mut self) {
        if let Some(frames) = &self.frames {
            frames.stop();
        }
        if let Some(graph) = &self.state.borrow().graph {
            if let Err(err) = graph.element.pause() {
                warn!("bg3: pausing audio failed: {}", js_error_text(&err));
            }
        }
    }

    fn supports_audio(&self) -> bool {
        true
    }

    fn set_audio(&mut self, audio: &HtmlAudioElement) -> bool {
        let mut state = self.state.borrow_mut();
        if state.graph.as_ref().is_some_and(|g| &g.element == audio) {
            return true;
        }
        if let Some(old) = state.graph.take() {
            old.release();
        }
        match AudioGraph::connect(audio, fft_size_for(state.bar_count)) {
            Ok((graph, fresh)) => {
                // Connecting can start playback on a running context.
                if let Err(err) = audio.pause() {
                    debug!("bg3: pausing audio failed: {}", js_error_text(&err));
                }
                if fresh {
                    audio.set_current_time(0.0);
                }
                state.graph = Some(graph);
                drop(state);
                if let Some(frames) = &self.frames {
                    frames.stop();
                }
                info!("bg3: audio connected to visualizer");
                true
            }
            Err(err) => {
                error!("bg3: audio setup failed: {}", js_error_text(&err));
                false
            }
        }
    }

    fn play_audio(&mut self) {
        let target = {
            let state = self.state.borrow();
            state.graph.as_ref().map(|g| (g.context.clone(), g.element.clone()))
        };
        let Some((context, element)) = target else {
            warn!("bg3: play requested before audio was connected");
            return;
        };
        play_through(context, element);
        self.enter(Mode::Reactive);
    }

    fn pause_audio(&mut self) {
        if let Some(graph) = &self.state.borrow().graph {
            if let Err(err) = graph.element.pause() {
                warn!("bg3: pausing audio failed: {}", js_error_text(&err));
            }
        }
        self.enter(Mode::Idle);
    }

    fn start_rendering(&mut self) {
        self.enter(Mode::Idle);
        info!("bg3: idle animation started");
    }

    fn configure(&mut self, key: &str, value: &str) -> bool {
        let mut state = self.state.borrow_mut();
        match key {
            "visualizer-style" => match value.parse() {
                Ok(style) => {
                    state.style = style;
                    true
                }
                Err(err) => {
                    warn!("bg3: {err}");
                    false
                }
            },
            "bar-count" => match option_number(value) {
                Some(count) if count >= 1.0 => {
                    state.bar_count = count as u32;
                    let fft = fft_size_for(state.bar_count);
                    if let Some(graph) = state.graph.as_mut() {
                        graph.resize(fft);
                    }
                    true
                }
                _ => false,
            },
            "sensitivity" => match option_number(value) {
                Some(s) if s > 0.0 => {
                    state.sensitivity = s;
                    true
                }
                _ => false,
            },
            _ => false,
        }
    }
}
