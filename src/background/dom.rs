//! Browser side of the background host: the DOM surface, `<link>`/`<script>`
//! injection, canvas helpers and the built-in catalogue.

use std::rc::Rc;

use futures::future::{FutureExt, LocalBoxFuture};
use wasm_bindgen::JsCast;
use wasm_bindgen_futures::JsFuture;
use web_sys::{CanvasRenderingContext2d, Document, HtmlAudioElement, HtmlCanvasElement, HtmlElement, Window};

use super::{
    AudioVisualizer, Background, BackgroundDescriptor, CssGradient, Hybrid, MeshGradient, Particles,
    ResourceFetcher, ResourceKind, Surface,
};
use crate::error::{DomError, HostError, js_error_text};

#[derive(Debug, Clone, Copy, Default)]
pub struct Dom;

impl Surface for Dom {
    type Container = HtmlElement;
    type Audio = HtmlAudioElement;

    fn locate(&self, container_id: &str) -> Option<HtmlElement> {
        document().ok()?.get_element_by_id(container_id)?.dyn_into().ok()
    }

    fn clear(&self, container: &HtmlElement) {
        container.set_inner_html("");
    }
}

/// Injects stylesheets into `<head>` and scripts into `<body>`, resolving on the
/// element's `load` event.
#[derive(Debug, Clone, Copy, Default)]
pub struct DomFetcher;

impl ResourceFetcher for DomFetcher {
    fn fetch(&self, kind: ResourceKind, url: &str) -> LocalBoxFuture<'static, Result<(), String>> {
        let url = url.to_owned();
        async move { inject(kind, &url).await.map_err(|e| e.to_string()) }.boxed_local()
    }
}

async fn inject(kind: ResourceKind, url: &str) -> Result<(), DomError> {
    let doc = document()?;
    let element: HtmlElement = match kind {
        ResourceKind::Style => {
            let link: web_sys::HtmlLinkElement = doc.create_element("link")?.dyn_into().map_err(|_| not_a("link"))?;
            link.set_rel("stylesheet");
            link.set_href(url);
            link.into()
        }
        ResourceKind::Script => {
            let script: web_sys::HtmlScriptElement =
                doc.create_element("script")?.dyn_into().map_err(|_| not_a("script"))?;
            script.set_src(url);
            script.into()
        }
    };

    let loaded = js_sys::Promise::new(&mut |resolve, reject| {
        element.set_onload(Some(&resolve));
        element.set_onerror(Some(&reject));
    });

    match kind {
        ResourceKind::Style => {
            let head = doc.head().ok_or_else(|| DomError::MissingElement("head".into()))?;
            head.append_child(&element)?;
        }
        ResourceKind::Script => {
            let body = doc.body().ok_or_else(|| DomError::MissingElement("body".into()))?;
            body.append_child(&element)?;
        }
    }

    let outcome = JsFuture::from(loaded).await;
    element.set_onload(None);
    element.set_onerror(None);
    outcome
        .map(|_| ())
        .map_err(|e| DomError::Js(format!("{url} did not load ({})", js_error_text(&e))))
}

fn not_a(tag: &str) -> DomError {
    DomError::Js(format!("created element is not a <{tag}>"))
}

pub fn window() -> Result<Window, DomError> {
    web_sys::window().ok_or_else(|| DomError::MissingElement("window".into()))
}

pub fn document() -> Result<Document, DomError> {
    window()?
        .document()
        .ok_or_else(|| DomError::MissingElement("document".into()))
}

/// Inner size of the window in CSS pixels.
pub fn viewport_size() -> (f64, f64) {
    let Some(w) = web_sys::window() else { return (0.0, 0.0) };
    let width = w.inner_width().ok().and_then(|v| v.as_f64()).unwrap_or(0.0);
    let height = w.inner_height().ok().and_then(|v| v.as_f64()).unwrap_or(0.0);
    (width, height)
}

/// A fixed, full-viewport canvas sitting behind the page content.
pub fn backdrop_canvas(id: &str) -> Result<HtmlCanvasElement, DomError> {
    let canvas: HtmlCanvasElement = document()?
        .create_element("canvas")?
        .dyn_into()
        .map_err(|_| not_a("canvas"))?;
    canvas.set_id(id);
    let style = canvas.style();
    for (prop, value) in [
        ("position", "fixed"),
        ("top", "0"),
        ("left", "0"),
        ("width", "100%"),
        ("height", "100%"),
        ("z-index", "-1"),
    ] {
        style.set_property(prop, value)?;
    }
    fit_to_viewport(&canvas);
    Ok(canvas)
}

pub fn fit_to_viewport(canvas: &HtmlCanvasElement) {
    let (w, h) = viewport_size();
    canvas.set_width(w as u32);
    canvas.set_height(h as u32);
}

pub fn context_2d(canvas: &HtmlCanvasElement) -> Result<CanvasRenderingContext2d, DomError> {
    canvas
        .get_context("2d")?
        .ok_or_else(|| DomError::Js("2d context unavailable".into()))?
        .dyn_into()
        .map_err(|_| DomError::Js("2d context has unexpected type".into()))
}

pub fn div(id: &str, class: &str) -> Result<HtmlElement, DomError> {
    let el: HtmlElement = document()?.create_element("div")?.dyn_into().map_err(|_| not_a("div"))?;
    el.set_id(id);
    el.set_class_name(class);
    Ok(el)
}

/// Map a glue-level failure during renderer init.
pub(crate) fn init_error(id: &str) -> impl Fn(DomError) -> HostError + '_ {
    move |err| HostError::Init { id: id.to_owned(), reason: err.to_string() }
}

fn entry(
    id: &'static str,
    name: &'static str,
    stylesheet: &str,
    style_root: &str,
    factory: fn() -> Box<dyn Background<Dom>>,
) -> BackgroundDescriptor<Dom> {
    BackgroundDescriptor {
        id,
        name,
        scripts: Vec::new(),
        styles: vec![format!("{}/{stylesheet}", style_root.trim_end_matches('/'))],
        factory: Rc::new(factory),
    }
}

/// The five built-in backgrounds. Stylesheets are resolved against `style_root`.
pub fn catalogue(style_root: &str) -> Vec<BackgroundDescriptor<Dom>> {
    vec![
        entry("bg1", "Mesh Gradient", "bg1-mesh-gradient.css", style_root, || Box::new(MeshGradient::default())),
        entry("bg2", "CSS Gradient", "bg2-css-gradient.css", style_root, || Box::new(CssGradient::default())),
        entry("bg3", "Audio Visualizer", "bg3-audio-visualizer.css", style_root, || {
            Box::new(AudioVisualizer::default())
        }),
        entry("bg4", "3D Particles", "bg4-threejs-particles.css", style_root, || Box::new(Particles::default())),
        entry("bg5", "Hybrid Effects", "bg5-hybrid.css", style_root, || Box::new(Hybrid::default())),
    ]
}
