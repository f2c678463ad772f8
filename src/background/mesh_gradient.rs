//! bg1: flowing mesh gradient drawn by a WebGL fragment shader.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use futures::future::{FutureExt, LocalBoxFuture};
use log::{info, warn};
use wasm_bindgen::JsCast;
use web_sys::{HtmlCanvasElement, HtmlElement, WebGlProgram, WebGlRenderingContext as Gl, WebGlShader};

use super::color::{DEFAULT_THEME, Rgb, palette};
use super::dom::{Dom, backdrop_canvas, fit_to_viewport, init_error};
use super::frame::{FrameLoop, now_ms};
use super::{Background, option_number};
use crate::error::{DomError, HostError};

const VERTEX_SHADER: &str = r#"
attribute vec2 position;
void main() {
    gl_Position = vec4(position, 0.0, 1.0);
}
"#;

const FRAGMENT_SHADER: &str = r#"
precision mediump float;
uniform float time;
uniform vec2 resolution;
uniform vec3 color1;
uniform vec3 color2;
uniform vec3 color3;
uniform vec3 color4;

float random(vec2 st) {
    return fract(sin(dot(st.xy, vec2(12.9898, 78.233))) * 43758.5453123);
}

float noise(vec2 st) {
    vec2 i = floor(st);
    vec2 f = fract(st);
    float a = random(i);
    float b = random(i + vec2(1.0, 0.0));
    float c = random(i + vec2(0.0, 1.0));
    float d = random(i + vec2(1.0, 1.0));
    vec2 u = f * f * (3.0 - 2.0 * f);
    return mix(a, b, u.x) + (c - a) * u.y * (1.0 - u.x) + (d - b) * u.x * u.y;
}

void main() {
    vec2 st = gl_FragCoord.xy / resolution.xy;
    vec2 pos = st * 3.0;
    pos.x += time * 0.1;
    pos.y += time * 0.08;

    float n1 = noise(pos);
    float n2 = noise(pos * 2.0 + time * 0.1);
    float n3 = noise(pos * 0.5 - time * 0.05);
    float pattern = n1 * 0.5 + n2 * 0.3 + n3 * 0.2;

    vec3 color;
    if (pattern < 0.33) {
        color = mix(color1, color2, pattern * 3.0);
    } else if (pattern < 0.66) {
        color = mix(color2, color3, (pattern - 0.33) * 3.0);
    } else {
        color = mix(color3, color4, (pattern - 0.66) * 3.0);
    }

    color *= sin(time * 0.5) * 0.1 + 0.9;
    gl_FragColor = vec4(color, 1.0);
}
"#;

/// Full-screen quad as a triangle strip.
const QUAD: [f32; 8] = [-1.0, -1.0, 1.0, -1.0, -1.0, 1.0, 1.0, 1.0];

const FALLBACK_BACKGROUND: &str = "linear-gradient(45deg, #ff8e53, #fe6b8b, #ff8e53)";

/// Shader clock in seconds. `speed` 10 runs at wall-clock rate.
pub fn shader_time(elapsed_ms: f64, speed: f64) -> f32 {
    ((elapsed_ms.max(0.0) / 1000.0) * (speed / 10.0)) as f32
}

struct GlScene {
    canvas: HtmlCanvasElement,
    gl: Option<(Gl, WebGlProgram)>,
    started_ms: f64,
}

impl GlScene {
    fn draw(&self, now: f64, speed: f64) {
        let Some((gl, program)) = &self.gl else { return };
        let time = shader_time(now - self.started_ms, speed);
        let (w, h) = (self.canvas.width(), self.canvas.height());
        gl.uniform1f(gl.get_uniform_location(program, "time").as_ref(), time);
        gl.uniform2f(gl.get_uniform_location(program, "resolution").as_ref(), w as f32, h as f32);
        gl.viewport(0, 0, w as i32, h as i32);
        gl.draw_arrays(Gl::TRIANGLE_STRIP, 0, 4);
    }

    fn apply_palette(&self, theme: Rgb) {
        let Some((gl, program)) = &self.gl else { return };
        for (i, color) in palette(theme).iter().enumerate() {
            let location = gl.get_uniform_location(program, &format!("color{}", i + 1));
            gl.uniform3fv_with_f32_array(location.as_ref(), &color.unit_scaled(1.0));
        }
    }
}

pub struct MeshGradient {
    scene: Rc<RefCell<Option<GlScene>>>,
    speed: Rc<Cell<f64>>,
    theme: Rgb,
    frames: Option<FrameLoop>,
}

impl Default for MeshGradient {
    fn default() -> Self {
        Self {
            scene: Rc::new(RefCell::new(None)),
            speed: Rc::new(Cell::new(10.0)),
            theme: DEFAULT_THEME,
            frames: None,
        }
    }
}

fn compile(gl: &Gl, kind: u32, source: &str) -> Result<WebGlShader, DomError> {
    let shader = gl
        .create_shader(kind)
        .ok_or_else(|| DomError::Js("cannot create shader".into()))?;
    gl.shader_source(&shader, source);
    gl.compile_shader(&shader);
    if gl.get_shader_parameter(&shader, Gl::COMPILE_STATUS).as_bool().unwrap_or(false) {
        return Ok(shader);
    }
    let log = gl.get_shader_info_log(&shader).unwrap_or_default();
    gl.delete_shader(Some(&shader));
    Err(DomError::Js(format!("shader compile error: {log}")))
}

fn link(gl: &Gl) -> Result<WebGlProgram, DomError> {
    let vertex = compile(gl, Gl::VERTEX_SHADER, VERTEX_SHADER)?;
    let fragment = compile(gl, Gl::FRAGMENT_SHADER, FRAGMENT_SHADER)?;
    let program = gl
        .create_program()
        .ok_or_else(|| DomError::Js("cannot create program".into()))?;
    gl.attach_shader(&program, &vertex);
    gl.attach_shader(&program, &fragment);
    gl.link_program(&program);
    if !gl.get_program_parameter(&program, Gl::LINK_STATUS).as_bool().unwrap_or(false) {
        let log = gl.get_program_info_log(&program).unwrap_or_default();
        return Err(DomError::Js(format!("program link error: {log}")));
    }
    gl.use_program(Some(&program));

    let buffer = gl
        .create_buffer()
        .ok_or_else(|| DomError::Js("cannot create buffer".into()))?;
    gl.bind_buffer(Gl::ARRAY_BUFFER, Some(&buffer));
    let vertices = js_sys::Float32Array::from(QUAD.as_slice());
    gl.buffer_data_with_array_buffer_view(Gl::ARRAY_BUFFER, &vertices, Gl::STATIC_DRAW);

    let position = gl.get_attrib_location(&program, "position");
    if position >= 0 {
        gl.enable_vertex_attrib_array(position as u32);
        gl.vertex_attrib_pointer_with_i32(position as u32, 2, Gl::FLOAT, false, 0, 0);
    }
    Ok(program)
}

fn webgl_context(canvas: &HtmlCanvasElement) -> Option<Gl> {
    ["webgl", "experimental-webgl"]
        .iter()
        .find_map(|kind| canvas.get_context(kind).ok().flatten())
        .and_then(|ctx| ctx.dyn_into::<Gl>().ok())
}

impl Background<Dom> for MeshGradient {
    fn init<'a>(&'a mut self, container: &'a HtmlElement) -> LocalBoxFuture<'a, Result<(), HostError>> {
        async move {
            info!("initializing mesh gradient");
            let fail = init_error("bg1");
            let canvas = backdrop_canvas("bg1-canvas").map_err(&fail)?;

            let gl = match webgl_context(&canvas) {
                Some(gl) => {
                    let program = link(&gl).map_err(&fail)?;
                    Some((gl, program))
                }
                None => {
                    warn!("WebGL not supported, falling back to a CSS gradient");
                    canvas
                        .style()
                        .set_property("background", FALLBACK_BACKGROUND)
                        .map_err(|e| fail(e.into()))?;
                    None
                }
            };
            container.append_child(&canvas).map_err(|e| fail(e.into()))?;

            let scene = GlScene { canvas, gl, started_ms: now_ms() };
            scene.apply_palette(self.theme);
            let animated = scene.gl.is_some();
            *self.scene.borrow_mut() = Some(scene);

            if animated {
                let scene = self.scene.clone();
                let speed = self.speed.clone();
                let frames = FrameLoop::new(move |now| match scene.borrow().as_ref() {
                    Some(s) => {
                        s.draw(now, speed.get());
                        true
                    }
                    None => false,
                });
                frames.start();
                self.frames = Some(frames);
            }
            Ok(())
        }
        .boxed_local()
    }

    fn destroy(&mut self) -> LocalBoxFuture<'_, ()> {
        async move {
            self.frames = None;
            if let Some(scene) = self.scene.borrow_mut().take() {
                scene.canvas.remove();
            }
            info!("mesh gradient destroyed");
        }
        .boxed_local()
    }

    fn update_theme(&mut self, color: Rgb) {
        self.theme = color;
        if let Some(scene) = self.scene.borrow().as_ref() {
            scene.apply_palette(color);
        }
    }

    fn resize(&mut self) {
        if let Some(scene) = self.scene.borrow().as_ref() {
            fit_to_viewport(&scene.canvas);
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
        match (key, option_number(value)) {
            ("animation-speed", Some(speed)) if speed >= 0.0 => {
                self.speed.set(speed);
                true
            }
            _ => false,
        }
    }
}
