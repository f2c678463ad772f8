//! bg5: the CSS gradient layer from bg2's family with a canvas of drifting glow
//! blobs and pulsing light rays on top.

use std::cell::RefCell;
use std::f64::consts::TAU;
use std::rc::Rc;

use futures::future::{FutureExt, LocalBoxFuture};
use rand::Rng;
use rand::rngs::SmallRng;
use log::{info, warn};
use wasm_bindgen::JsValue;
use web_sys::{CanvasRenderingContext2d, HtmlCanvasElement, HtmlElement};

use super::color::{DEFAULT_THEME, Rgb, css_variables};
use super::dom::{Dom, backdrop_canvas, context_2d, div, fit_to_viewport, init_error, viewport_size};
use super::frame::FrameLoop;
use super::{Background, option_number};
use crate::error::{DomError, HostError, js_error_text};
use crate::rng::{self, spread, within};

const DEFAULT_BLOBS: usize = 8;
const DEFAULT_RAYS: usize = 12;
const DEFAULT_BLOB_SIZE: f64 = 75.0;
const MAX_EFFECTS: usize = 200;

#[derive(Debug, Clone, PartialEq)]
pub struct Blob {
    pub x: f64,
    pub y: f64,
    pub vx: f64,
    pub vy: f64,
    pub base_radius: f64,
    pub radius: f64,
    pub pulse: f64,
}

impl Blob {
    fn spawn(rng: &mut SmallRng, (w, h): (f64, f64), radius: f64, speed_factor: f64) -> Self {
        Self {
            x: within(rng, w),
            y: within(rng, h),
            vx: spread(rng, 0.25) * speed_factor,
            vy: spread(rng, 0.25) * speed_factor,
            base_radius: radius,
            radius,
            pulse: rng.gen_range(0.0..TAU),
        }
    }

    /// Drift, bounce off the viewport edges, and breathe.
    pub fn update(&mut self, width: f64, height: f64) {
        self.x += self.vx;
        self.y += self.vy;
        if self.x < 0.0 || self.x > width {
            self.vx = -self.vx;
        }
        if self.y < 0.0 || self.y > height {
            self.vy = -self.vy;
        }
        self.pulse += 0.02;
        self.radius = self.base_radius + self.pulse.sin() * 10.0;
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct LightRay {
    pub x: f64,
    pub y: f64,
    pub length: f64,
    pub angle: f64,
    pub opacity: f64,
    pub fade_speed: f64,
}

impl LightRay {
    fn spawn(rng: &mut SmallRng, (w, h): (f64, f64)) -> Self {
        Self {
            x: within(rng, w),
            y: within(rng, h),
            length: rng.gen_range(200.0..500.0),
            angle: rng.gen_range(0.0..TAU),
            opacity: rng.gen_range(0.1..0.4),
            fade_speed: rng.gen_range(0.005..0.015),
        }
    }

    /// Opacity oscillates between roughly 0.1 and 0.4.
    pub fn update(&mut self) {
        self.opacity += self.fade_speed;
        if self.opacity > 0.4 || self.opacity < 0.1 {
            self.fade_speed = -self.fade_speed;
        }
    }
}

struct Effects {
    blobs: Vec<Blob>,
    rays: Vec<LightRay>,
    theme: Rgb,
    blob_count: usize,
    ray_count: usize,
    blob_size: Option<f64>,
    speed_factor: f64,
    rng: SmallRng,
}

impl Effects {
    fn new(rng: SmallRng) -> Self {
        Self {
            blobs: Vec::new(),
            rays: Vec::new(),
            theme: DEFAULT_THEME,
            blob_count: DEFAULT_BLOBS,
            ray_count: DEFAULT_RAYS,
            blob_size: None,
            speed_factor: 1.0,
            rng,
        }
    }

    /// Blob radii are random until a size is configured.
    fn spawn_blobs(&mut self, viewport: (f64, f64)) {
        let (size, speed) = (self.blob_size, self.speed_factor);
        self.blobs = (0..self.blob_count)
            .map(|_| {
                let radius = size.unwrap_or_else(|| self.rng.gen_range(50.0..150.0));
                Blob::spawn(&mut self.rng, viewport, radius, speed)
            })
            .collect();
    }

    fn spawn_rays(&mut self, viewport: (f64, f64)) {
        self.rays = (0..self.ray_count).map(|_| LightRay::spawn(&mut self.rng, viewport)).collect();
    }

    fn set_speed(&mut self, factor: f64) {
        self.speed_factor = factor;
        for blob in &mut self.blobs {
            blob.vx = spread(&mut self.rng, 0.25) * factor;
            blob.vy = spread(&mut self.rng, 0.25) * factor;
        }
    }

    fn set_blob_size(&mut self, size: f64) {
        self.blob_size = Some(size);
        for blob in &mut self.blobs {
            blob.base_radius = size;
            blob.radius = size;
        }
    }

    fn step(&mut self, width: f64, height: f64) {
        self.rays.iter_mut().for_each(LightRay::update);
        self.blobs.iter_mut().for_each(|b| b.update(width, height));
    }
}

struct Layers {
    gradient: HtmlElement,
    canvas: HtmlCanvasElement,
    ctx: CanvasRenderingContext2d,
}

impl Layers {
    fn apply_colors(&self, theme: Rgb) -> Result<(), DomError> {
        let style = self.gradient.style();
        for (name, value) in css_variables("bg5", theme) {
            style.set_property(&name, &value)?;
        }
        Ok(())
    }

    fn set_play_state(&self, state: &str) {
        if let Err(err) = self.gradient.style().set_property("animation-play-state", state) {
            warn!("bg5: animation-play-state: {}", js_error_text(&err));
        }
    }

    fn draw(&self, effects: &Effects) -> Result<(), JsValue> {
        let ctx = &self.ctx;
        let (w, h) = (f64::from(self.canvas.width()), f64::from(self.canvas.height()));
        ctx.set_fill_style(&JsValue::from_str("rgba(0, 0, 0, 0.05)"));
        ctx.fill_rect(0.0, 0.0, w, h);

        let theme = effects.theme;
        for ray in &effects.rays {
            ctx.save();
            ctx.translate(ray.x, ray.y)?;
            ctx.rotate(ray.angle)?;
            let gradient = ctx.create_linear_gradient(0.0, 0.0, ray.length, 0.0);
            gradient.add_color_stop(0.0, &theme.css_alpha(ray.opacity))?;
            gradient.add_color_stop(0.5, &theme.css_alpha(ray.opacity * 0.5))?;
            gradient.add_color_stop(1.0, &theme.css_alpha(0.0))?;
            ctx.set_fill_style(&gradient);
            ctx.fill_rect(0.0, -2.0, ray.length, 4.0);
            ctx.restore();
        }

        let (core, edge) = (theme.css_alpha(0.3), theme.css_alpha(0.0));
        for blob in &effects.blobs {
            let radius = blob.radius.max(0.0);
            let gradient = ctx.create_radial_gradient(blob.x, blob.y, 0.0, blob.x, blob.y, radius)?;
            gradient.add_color_stop(0.0, &core)?;
            gradient.add_color_stop(1.0, &edge)?;
            ctx.set_fill_style(&gradient);
            ctx.begin_path();
            ctx.arc(blob.x, blob.y, radius, 0.0, TAU)?;
            ctx.fill();
        }
        Ok(())
    }
}

struct Scene {
    effects: Effects,
    layers: Option<Layers>,
}

pub struct Hybrid {
    scene: Rc<RefCell<Scene>>,
    frames: Option<FrameLoop>,
}

impl Default for Hybrid {
    fn default() -> Self {
        Self {
            scene: Rc::new(RefCell::new(Scene { effects: Effects::new(rng::from_entropy()), layers: None })),
            frames: None,
        }
    }
}

impl Background<Dom> for Hybrid {
    fn init<'a>(&'a mut self, container: &'a HtmlElement) -> LocalBoxFuture<'a, Result<(), HostError>> {
        async move {
            info!("initializing hybrid effects");
            let fail = init_error("bg5");
            let gradient = div("bg5-gradient", "bg5-gradient-base").map_err(&fail)?;
            container.append_child(&gradient).map_err(|e| fail(e.into()))?;

            let canvas = backdrop_canvas("bg5-canvas").map_err(&fail)?;
            canvas
                .style()
                .set_property("pointer-events", "none")
                .map_err(|e| fail(e.into()))?;
            let ctx = context_2d(&canvas).map_err(&fail)?;
            container.append_child(&canvas).map_err(|e| fail(e.into()))?;

            {
                let mut scene = self.scene.borrow_mut();
                let layers = Layers { gradient, canvas, ctx };
                layers.apply_colors(scene.effects.theme).map_err(&fail)?;
                scene.layers = Some(layers);
                let viewport = viewport_size();
                scene.effects.spawn_blobs(viewport);
                scene.effects.spawn_rays(viewport);
            }

            let scene = self.scene.clone();
            let frames = FrameLoop::new(move |_| {
                let mut scene = scene.borrow_mut();
                let (w, h) = viewport_size();
                scene.effects.step(w, h);
                let Some(layers) = &scene.layers else { return false };
                match layers.draw(&scene.effects) {
                    Ok(()) => true,
                    Err(err) => {
                        warn!("bg5: drawing failed: {}", js_error_text(&err));
                        false
                    }
                }
            });
            frames.start();
            self.frames = Some(frames);
            Ok(())
        }
        .boxed_local()
    }

    fn destroy(&mut self) -> LocalBoxFuture<'_, ()> {
        async move {
            self.frames = None;
            let mut scene = self.scene.borrow_mut();
            if let Some(layers) = scene.layers.take() {
                layers.gradient.remove();
                layers.canvas.remove();
            }
            scene.effects.blobs.clear();
            scene.effects.rays.clear();
            info!("hybrid effects destroyed");
        }
        .boxed_local()
    }

    fn update_theme(&mut self, color: Rgb) {
        let mut scene = self.scene.borrow_mut();
        scene.effects.theme = color;
        if let Some(layers) = &scene.layers {
            if let Err(err) = layers.apply_colors(color) {
                warn!("bg5: failed to update colours: {err}");
            }
        }
    }

    fn resize(&mut self) {
        if let Some(layers) = &self.scene.borrow().layers {
            fit_to_viewport(&layers.canvas);
        }
    }

    fn pause(&mut self) {
        if let Some(frames) = &self.frames {
            frames.stop();
        }
        if let Some(layers) = &self.scene.borrow().layers {
            layers.set_play_state("paused");
        }
    }

    fn play(&mut self) {
        if let Some(frames) = &self.frames {
            frames.start();
        }
        if let Some(layers) = &self.scene.borrow().layers {
            layers.set_play_state("running");
        }
    }

    fn configure(&mut self, key: &str, value: &str) -> bool {
        let Some(n) = option_number(value) else { return false };
        let mut scene = self.scene.borrow_mut();
        let effects = &mut scene.effects;
        match key {
            "blob-count" if n >= 0.0 => {
                effects.blob_count = (n as usize).min(MAX_EFFECTS);
                effects.blob_size.get_or_insert(DEFAULT_BLOB_SIZE);
                effects.spawn_blobs(viewport_size());
            }
            "blob-size" if n > 0.0 => effects.set_blob_size(n),
            "ray-count" if n >= 0.0 => {
                effects.ray_count = (n as usize).min(MAX_EFFECTS);
                effects.spawn_rays(viewport_size());
            }
            "movement-speed" if n >= 0.0 => effects.set_speed(n / 5.0),
            _ => return false,
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use rand::SeedableRng;

    use super::*;

    fn blob(x: f64, vx: f64) -> Blob {
        Blob { x, y: 50.0, vx, vy: 0.0, base_radius: 75.0, radius: 75.0, pulse: 0.0 }
    }

    #[test]
    fn test_blob_bounces_off_edges() {
        let mut b = blob(99.9, 0.2);
        b.update(100.0, 100.0);
        assert!(b.vx < 0.0);
        b.update(100.0, 100.0);
        assert!(b.x < 100.0);

        let mut b = blob(0.1, -0.2);
        b.update(100.0, 100.0);
        assert!(b.vx > 0.0);
    }

    #[test]
    fn test_blob_pulses_around_base_radius() {
        let mut b = blob(50.0, 0.0);
        for _ in 0..500 {
            b.update(100.0, 100.0);
            assert!((b.radius - b.base_radius).abs() <= 10.0);
        }
        assert!((b.pulse - 10.0).abs() < 1e-9);
    }

    #[test]
    fn test_ray_opacity_oscillates() {
        let mut ray = LightRay { x: 0.0, y: 0.0, length: 300.0, angle: 0.0, opacity: 0.39, fade_speed: 0.015 };
        ray.update();
        assert!(ray.fade_speed < 0.0);
        let mut seen_turn = false;
        for _ in 0..200 {
            ray.update();
            assert!((0.08..=0.42).contains(&ray.opacity));
            seen_turn |= ray.fade_speed > 0.0;
        }
        assert!(seen_turn);
    }

    #[test]
    fn test_spawn_ranges() {
        let mut effects = Effects::new(SmallRng::seed_from_u64(3));
        effects.spawn_blobs((800.0, 600.0));
        effects.spawn_rays((800.0, 600.0));
        assert_eq!(effects.blobs.len(), DEFAULT_BLOBS);
        assert_eq!(effects.rays.len(), DEFAULT_RAYS);
        for b in &effects.blobs {
            assert!((50.0..150.0).contains(&b.base_radius));
            assert!(b.vx.abs() <= 0.25 && b.vy.abs() <= 0.25);
        }
        for r in &effects.rays {
            assert!((200.0..500.0).contains(&r.length));
            assert!((0.1..0.4).contains(&r.opacity));
        }
    }

    #[test]
    fn test_size_and_speed_apply_to_live_blobs() {
        let mut effects = Effects::new(SmallRng::seed_from_u64(5));
        effects.spawn_blobs((800.0, 600.0));
        effects.set_blob_size(120.0);
        assert!(effects.blobs.iter().all(|b| b.base_radius == 120.0 && b.radius == 120.0));
        effects.set_speed(0.0);
        assert!(effects.blobs.iter().all(|b| b.vx == 0.0 && b.vy == 0.0));
    }

    #[test]
    fn test_configure_rejects_bad_values() {
        let mut bg = Hybrid::default();
        assert!(bg.configure("blob-size", "90"));
        assert!(bg.configure("movement-speed", "10"));
        assert!(!bg.configure("blob-size", "-4"));
        assert!(!bg.configure("ray-count", "many"));
        assert!(!bg.configure("fog-density", "8"));
        let scene = bg.scene.borrow();
        assert_eq!(scene.effects.blob_size, Some(90.0));
        assert_eq!(scene.effects.speed_factor, 2.0);
    }
}
