//! bg4: a field of tumbling solids drawn through a perspective camera on a
//! 2D canvas. The camera eases toward the mouse and distant
//! shapes fade out in exponential-squared fog.

use std::cell::{Cell, RefCell};
use std::f64::consts::{PI, TAU};
use std::rc::Rc;

use futures::future::{FutureExt, LocalBoxFuture};
use glam::{DMat4, DVec3};
use rand::Rng;
use rand::rngs::SmallRng;
use log::{info, warn};
use wasm_bindgen::JsCast;
use wasm_bindgen::prelude::*;
use web_sys::{CanvasRenderingContext2d, HtmlCanvasElement, HtmlElement, MouseEvent};

use super::color::{DEFAULT_THEME, Rgb};
use super::dom::{Dom, backdrop_canvas, context_2d, document, fit_to_viewport, init_error, viewport_size};
use super::frame::FrameLoop;
use super::{Background, option_number};
use crate::error::HostError;
use crate::rng::{self, spread};

/// Particles live in the cube `[-BOUND, BOUND]^3`.
pub const BOUND: f64 = 100.0;
const CAMERA_Z: f64 = 100.0;
const FOV_DEGREES: f64 = 75.0;
const NEAR: f64 = 0.1;
const FAR: f64 = 1_000.0;
const DEFAULT_COUNT: usize = 200;
const MAX_COUNT: usize = 2_000;

/// Screen position of a projected point, the pixels-per-unit scale at its
/// depth, and the depth itself.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Projected {
    pub x: f64,
    pub y: f64,
    pub scale: f64,
    pub depth: f64,
}

/// Perspective camera looking down -z, sized to the canvas.
pub struct Projection {
    view: DMat4,
    clip: DMat4,
    width: f64,
    height: f64,
}

impl Projection {
    pub fn new(camera: DVec3, width: f64, height: f64, fov_degrees: f64) -> Self {
        let aspect = if width > 0.0 && height > 0.0 { width / height } else { 1.0 };
        Self {
            view: DMat4::look_to_rh(camera, DVec3::NEG_Z, DVec3::Y),
            clip: DMat4::perspective_rh(fov_degrees.to_radians(), aspect, NEAR, FAR),
            width,
            height,
        }
    }

    /// Points outside the near/far planes are culled.
    pub fn project(&self, point: DVec3) -> Option<Projected> {
        let eye = self.view.transform_point3(point);
        let depth = -eye.z;
        if !(NEAR..=FAR).contains(&depth) {
            return None;
        }
        let ndc = self.clip.project_point3(eye);
        Some(Projected {
            x: (ndc.x + 1.0) * 0.5 * self.width,
            y: (1.0 - ndc.y) * 0.5 * self.height,
            scale: self.clip.y_axis.y * self.height / 2.0 / depth,
            depth,
        })
    }
}

/// Leaving one face of the cube re-enters from the opposite face.
pub fn wrap(v: f64, bound: f64) -> f64 {
    if v > bound {
        -bound
    } else if v < -bound {
        bound
    } else {
        v
    }
}

/// Visibility left after `depth` units of exponential-squared fog.
pub fn fog_factor(depth: f64, density: f64) -> f64 {
    (-(density * depth).powi(2)).exp()
}

pub fn ease(current: f64, target: f64, rate: f64) -> f64 {
    current + (target - current) * rate
}

/// Pointer coordinate mapped to `[-10, 10]` across the viewport.
pub fn mouse_target(client: f64, extent: f64) -> f64 {
    if extent <= 0.0 {
        return 0.0;
    }
    client / extent * 20.0 - 10.0
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Shape {
    Cube,
    Sphere,
    Tetrahedron,
    Octahedron,
    Icosahedron,
}

impl Shape {
    const ALL: [Shape; 5] = [Shape::Cube, Shape::Sphere, Shape::Tetrahedron, Shape::Octahedron, Shape::Icosahedron];

    /// Silhouette radius in world units at scale 1.
    fn radius(self) -> f64 {
        match self {
            Shape::Cube => 0.7,
            Shape::Sphere | Shape::Icosahedron => 0.5,
            Shape::Tetrahedron => 0.7,
            Shape::Octahedron => 0.6,
        }
    }

    /// Outline corners and their angular offset; `None` draws a circle.
    fn outline(self) -> Option<(usize, f64)> {
        match self {
            Shape::Sphere => None,
            Shape::Cube => Some((4, PI / 4.0)),
            Shape::Tetrahedron => Some((3, -PI / 2.0)),
            Shape::Octahedron => Some((4, 0.0)),
            Shape::Icosahedron => Some((6, 0.0)),
        }
    }
}

#[derive(Debug, Clone)]
struct Particle {
    position: DVec3,
    velocity: DVec3,
    rotation: DVec3,
    spin: DVec3,
    scale: f64,
    shape: Shape,
    color: Rgb,
}

fn jitter(rng: &mut SmallRng, amount: f64) -> DVec3 {
    let half = amount / 2.0;
    DVec3::new(spread(rng, half), spread(rng, half), spread(rng, half))
}

fn tint(rng: &mut SmallRng, theme: Rgb) -> Rgb {
    let mut up = || rng.gen_range(0..50i16);
    theme.shifted(up(), up(), up())
}

impl Particle {
    fn spawn(rng: &mut SmallRng, theme: Rgb, spin_factor: f64) -> Self {
        Self {
            position: DVec3::new(spread(rng, BOUND), spread(rng, BOUND), spread(rng, BOUND)),
            velocity: jitter(rng, 0.02),
            rotation: DVec3::new(rng.gen_range(0.0..PI), rng.gen_range(0.0..PI), rng.gen_range(0.0..PI)),
            spin: jitter(rng, 0.02 * spin_factor),
            scale: rng.gen_range(0.5..2.5),
            shape: Shape::ALL[rng.gen_range(0..Shape::ALL.len())],
            color: tint(rng, theme),
        }
    }

    fn step(&mut self) {
        self.position += self.velocity;
        self.rotation += self.spin;
        self.position.x = wrap(self.position.x, BOUND);
        self.position.y = wrap(self.position.y, BOUND);
        self.position.z = wrap(self.position.z, BOUND);
    }
}

/// Simulation state, independent of the canvas.
struct Field {
    particles: Vec<Particle>,
    camera: DVec3,
    theme: Rgb,
    count: usize,
    /// Uniform scale override from the size option.
    size_scale: Option<f64>,
    spin_factor: f64,
    camera_speed: f64,
    fog_density: f64,
    rng: SmallRng,
}

impl Field {
    fn new(rng: SmallRng) -> Self {
        Self {
            particles: Vec::new(),
            camera: DVec3::new(0.0, 0.0, CAMERA_Z),
            theme: DEFAULT_THEME,
            count: DEFAULT_COUNT,
            size_scale: None,
            spin_factor: 1.0,
            camera_speed: 5.0,
            fog_density: 8.0,
            rng,
        }
    }

    fn populate(&mut self) {
        let (theme, spin) = (self.theme, self.spin_factor);
        self.particles = (0..self.count)
            .map(|_| Particle::spawn(&mut self.rng, theme, spin))
            .collect();
        if let Some(scale) = self.size_scale {
            self.particles.iter_mut().for_each(|p| p.scale = scale);
        }
    }

    fn step(&mut self, mouse: (f64, f64)) {
        let rate = self.camera_speed / 100.0;
        self.camera.x = ease(self.camera.x, mouse.0, rate);
        self.camera.y = ease(self.camera.y, -mouse.1, rate);
        self.particles.iter_mut().for_each(Particle::step);
    }

    fn recolor(&mut self, theme: Rgb) {
        self.theme = theme;
        for p in &mut self.particles {
            p.color = tint(&mut self.rng, theme);
        }
    }

    fn respin(&mut self, factor: f64) {
        self.spin_factor = factor;
        for p in &mut self.particles {
            p.spin = jitter(&mut self.rng, 0.02 * factor);
        }
    }

    fn density(&self) -> f64 {
        self.fog_density / 10_000.0
    }
}

struct Painter {
    canvas: HtmlCanvasElement,
    ctx: CanvasRenderingContext2d,
}

impl Painter {
    fn draw(&self, field: &Field) -> Result<(), JsValue> {
        let (w, h) = (f64::from(self.canvas.width()), f64::from(self.canvas.height()));
        self.ctx.clear_rect(0.0, 0.0, w, h);

        let projection = Projection::new(field.camera, w, h, FOV_DEGREES);
        let mut visible: Vec<(&Particle, Projected)> = field
            .particles
            .iter()
            .filter_map(|p| projection.project(p.position).map(|at| (p, at)))
            .collect();
        // far to near
        visible.sort_by(|a, b| b.1.depth.total_cmp(&a.1.depth));

        let density = field.density();
        for (p, at) in visible {
            let alpha = 0.8 * fog_factor(at.depth, density);
            if alpha < 0.01 {
                continue;
            }
            let radius = p.shape.radius() * p.scale * at.scale;
            self.ctx.set_fill_style(&JsValue::from_str(&p.color.css_alpha(alpha)));
            self.ctx.begin_path();
            match p.shape.outline() {
                None => self.ctx.arc(at.x, at.y, radius, 0.0, TAU)?,
                Some((corners, offset)) => {
                    // tilt about x flattens the outline vertically
                    let squash = 0.6 + 0.4 * p.rotation.x.cos().abs();
                    for k in 0..corners {
                        let angle = offset + p.rotation.z + k as f64 / corners as f64 * TAU;
                        let (x, y) = (at.x + angle.cos() * radius, at.y + angle.sin() * radius * squash);
                        if k == 0 {
                            self.ctx.move_to(x, y);
                        } else {
                            self.ctx.line_to(x, y);
                        }
                    }
                    self.ctx.close_path();
                }
            }
            self.ctx.fill();
        }
        Ok(())
    }
}

struct Scene {
    field: Field,
    painter: Option<Painter>,
}

pub struct Particles {
    scene: Rc<RefCell<Scene>>,
    mouse: Rc<Cell<(f64, f64)>>,
    on_mouse_move: Option<Closure<dyn FnMut(MouseEvent)>>,
    frames: Option<FrameLoop>,
}

impl Default for Particles {
    fn default() -> Self {
        Self {
            scene: Rc::new(RefCell::new(Scene { field: Field::new(rng::from_entropy()), painter: None })),
            mouse: Rc::new(Cell::new((0.0, 0.0))),
            on_mouse_move: None,
            frames: None,
        }
    }
}

impl Background<Dom> for Particles {
    fn init<'a>(&'a mut self, container: &'a HtmlElement) -> LocalBoxFuture<'a, Result<(), HostError>> {
        async move {
            info!("initializing 3D particles");
            let fail = init_error("bg4");
            let canvas = backdrop_canvas("bg4-canvas").map_err(&fail)?;
            let ctx = context_2d(&canvas).map_err(&fail)?;
            container.append_child(&canvas).map_err(|e| fail(e.into()))?;
            {
                let mut scene = self.scene.borrow_mut();
                scene.field.populate();
                scene.painter = Some(Painter { canvas, ctx });
            }

            let mouse = self.mouse.clone();
            let on_mouse_move = Closure::wrap(Box::new(move |event: MouseEvent| {
                let (w, h) = viewport_size();
                mouse.set((
                    mouse_target(f64::from(event.client_x()), w),
                    mouse_target(f64::from(event.client_y()), h),
                ));
            }) as Box<dyn FnMut(_)>);
            document()
                .map_err(&fail)?
                .add_event_listener_with_callback("mousemove", on_mouse_move.as_ref().unchecked_ref())
                .map_err(|e| fail(e.into()))?;
            self.on_mouse_move = Some(on_mouse_move);

            let scene = self.scene.clone();
            let mouse = self.mouse.clone();
            let frames = FrameLoop::new(move |_| {
                let mut scene = scene.borrow_mut();
                scene.field.step(mouse.get());
                let Some(painter) = &scene.painter else { return false };
                match painter.draw(&scene.field) {
                    Ok(()) => true,
                    Err(err) => {
                        warn!("bg4: drawing failed: {}", crate::error::js_error_text(&err));
                        false
                    }
                }
            });
            frames.start();
            self.frames = Some(frames);
            info!("3D particles initialized");
            Ok(())
        }
        .boxed_local()
    }

    fn destroy(&mut self) -> LocalBoxFuture<'_, ()> {
        async move {
            self.frames = None;
            if let Some(listener) = self.on_mouse_move.take() {
                if let Ok(doc) = document() {
                    let _ = doc.remove_event_listener_with_callback("mousemove", listener.as_ref().unchecked_ref());
                }
            }
            let mut scene = self.scene.borrow_mut();
            if let Some(painter) = scene.painter.take() {
                painter.canvas.remove();
            }
            scene.field.particles.clear();
            info!("3D particles destroyed");
        }
        .boxed_local()
    }

    fn update_theme(&mut self, color: Rgb) {
        self.scene.borrow_mut().field.recolor(color);
    }

    fn resize(&mut self) {
        if let Some(painter) = &self.scene.borrow().painter {
            fit_to_viewport(&painter.canvas);
        }
    }

    fn pause(&mut self) {
        if let Some(frames) = &self.frames {
            frames.stop();
        }
    }

    fn play(&mut self) {
        if let Some(frames) = &self.frames {
            frames.start();
        }
    }

    fn configure(&mut self, key: &str, value: &str) -> bool {
        let Some(n) = option_number(value) else { return false };
        let mut scene = self.scene.borrow_mut();
        let Scene { field, painter } = &mut *scene;
        match key {
            "particle-count" if n >= 0.0 => {
                field.count = (n as usize).min(MAX_COUNT);
                if painter.is_some() {
                    field.populate();
                }
            }
            "particle-size" if n > 0.0 => {
                field.size_scale = Some(n / 2.0);
                field.particles.iter_mut().for_each(|p| p.scale = n / 2.0);
            }
            "rotation-speed" if n >= 0.0 => field.respin(n / 5.0),
            "camera-speed" if n >= 0.0 => field.camera_speed = n,
            "fog-density" if n >= 0.0 => field.fog_density = n,
            _ => return false,
        }
        true
    }
}
