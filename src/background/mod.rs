//! Background plugin host.
//!
//! Exactly one renderer owns the shared container at a time. Switching runs the
//! previous renderer's `destroy` to completion before the next one's resources are
//! fetched and its `init` runs; loads are serialized behind an async lock so a
//! second switch issued mid-load cannot interleave with the first.
//!
//! The host is generic over a [`Surface`] (what a container and an audio source are)
//! and a [`ResourceFetcher`] (how a stylesheet or script gets onto the page), so the
//! lifecycle runs natively in tests with fakes and in the browser with [`dom::Dom`].

pub mod color;
pub mod dom;
pub mod frame;

mod audio_visualizer;
mod css_gradient;
mod hybrid;
mod mesh_gradient;
mod particles;

use std::cell::{Cell, RefCell};
use std::collections::{HashMap, HashSet};
use std::rc::Rc;

use futures::future::LocalBoxFuture;
use futures::lock::Mutex;
use log::{debug, error, info, warn};
use serde::Serialize;

use crate::error::HostError;
use color::Rgb;

pub use audio_visualizer::{AudioVisualizer, VisualizerStyle};
pub use css_gradient::CssGradient;
pub use hybrid::Hybrid;
pub use mesh_gradient::MeshGradient;
pub use particles::Particles;

/// What the renderers draw into.
pub trait Surface {
    type Container: Clone;
    type Audio: Clone + PartialEq;

    fn locate(&self, container_id: &str) -> Option<Self::Container>;
    /// Remove whatever a renderer left in the container.
    fn clear(&self, container: &Self::Container);
}

/// A background renderer. Only `init` and `destroy` are mandatory; every other
/// hook defaults to doing nothing.
pub trait Background<S: Surface> {
    fn init<'a>(&'a mut self, container: &'a S::Container) -> LocalBoxFuture<'a, Result<(), HostError>>;
    fn destroy(&mut self) -> LocalBoxFuture<'_, ()>;

    fn update_theme(&mut self, _color: Rgb) {}
    fn resize(&mut self) {}
    fn pause(&mut self) {}
    fn play(&mut self) {}

    /// Plays the song's audio itself and wants the audio element.
    fn supports_audio(&self) -> bool {
        false
    }
    /// Route the song's audio through the renderer. Returns whether it is now
    /// connected and can be driven with `play_audio`/`pause_audio`.
    fn set_audio(&mut self, _audio: &S::Audio) -> bool {
        false
    }
    fn play_audio(&mut self) {}
    fn pause_audio(&mut self) {}
    /// Lyrics and audio are both loaded.
    fn start_rendering(&mut self) {}

    /// Apply a tuning option. Returns `false` for keys the renderer does not know
    /// or values it cannot use.
    fn configure(&mut self, _key: &str, _value: &str) -> bool {
        false
    }
}

/// Numeric tuning value from an `<input>`. Rejects empty and non-finite input.
pub(crate) fn option_number(value: &str) -> Option<f64> {
    value.trim().parse::<f64>().ok().filter(|v| v.is_finite())
}

pub type Factory<S> = Rc<dyn Fn() -> Box<dyn Background<S>>>;

/// Static registry entry for one background.
pub struct BackgroundDescriptor<S: Surface> {
    pub id: &'static str,
    pub name: &'static str,
    pub scripts: Vec<String>,
    pub styles: Vec<String>,
    pub factory: Factory<S>,
}

impl<S: Surface> Clone for BackgroundDescriptor<S> {
    fn clone(&self) -> Self {
        Self {
            id: self.id,
            name: self.name,
            scripts: self.scripts.clone(),
            styles: self.styles.clone(),
            factory: self.factory.clone(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CatalogueEntry {
    pub id: &'static str,
    pub name: &'static str,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PluginState {
    #[default]
    Unloaded,
    Loading,
    Active,
    Destroying,
}

/// Gate for the audio-reactive renderer: it starts drawing only once both the
/// lyric file and the audio file are in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Readiness {
    pub lrc_loaded: bool,
    pub audio_loaded: bool,
}

impl Readiness {
    pub fn is_ready(&self) -> bool {
        self.lrc_loaded && self.audio_loaded
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceKind {
    Script,
    Style,
}

pub trait ResourceFetcher {
    /// Put the resource on the page; resolves once it has loaded.
    fn fetch(&self, kind: ResourceKind, url: &str) -> LocalBoxFuture<'static, Result<(), String>>;
}

/// Memoizes successful fetches by URL. Failures are not remembered, so a later
/// load retries them.
pub struct ResourceLoader<F> {
    fetcher: F,
    loaded: RefCell<HashSet<String>>,
}

impl<F: ResourceFetcher> ResourceLoader<F> {
    pub fn new(fetcher: F) -> Self {
        Self { fetcher, loaded: RefCell::new(HashSet::new()) }
    }

    pub fn is_loaded(&self, url: &str) -> bool {
        self.loaded.borrow().contains(url)
    }

    pub async fn ensure(&self, kind: ResourceKind, url: &str) -> Result<(), HostError> {
        if self.is_loaded(url) {
            debug!("resource already loaded: {url}");
            return Ok(());
        }
        self.fetcher.fetch(kind, url).await.map_err(|reason| HostError::ResourceLoad {
            url: url.to_owned(),
            reason,
        })?;
        self.loaded.borrow_mut().insert(url.to_owned());
        Ok(())
    }
}

struct ActivePlugin<S: Surface> {
    id: &'static str,
    instance: Box<dyn Background<S>>,
}

pub struct BackgroundHost<S: Surface, F: ResourceFetcher> {
    surface: S,
    container_id: String,
    catalogue: Vec<BackgroundDescriptor<S>>,
    loader: ResourceLoader<F>,
    switching: Mutex<()>,
    latest_request: Cell<u64>,
    active: RefCell<Option<ActivePlugin<S>>>,
    states: RefCell<HashMap<&'static str, PluginState>>,
    theme: Cell<Option<Rgb>>,
    audio: RefCell<Option<S::Audio>>,
    wired_audio: RefCell<Option<S::Audio>>,
    readiness: Cell<Readiness>,
}

impl<S: Surface, F: ResourceFetcher> BackgroundHost<S, F> {
    pub fn new(
        surface: S,
        fetcher: F,
        container_id: impl Into<String>,
        catalogue: Vec<BackgroundDescriptor<S>>,
    ) -> Self {
        Self {
            surface,
            container_id: container_id.into(),
            catalogue,
            loader: ResourceLoader::new(fetcher),
            switching: Mutex::new(()),
            latest_request: Cell::new(0),
            active: RefCell::new(None),
            states: RefCell::new(HashMap::new()),
            theme: Cell::new(None),
            audio: RefCell::new(None),
            wired_audio: RefCell::new(None),
            readiness: Cell::new(Readiness::default()),
        }
    }

    pub fn backgrounds(&self) -> Vec<CatalogueEntry> {
        self.catalogue.iter().map(|d| CatalogueEntry { id: d.id, name: d.name }).collect()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.descriptor(id).is_some()
    }

    /// Id of the background that currently owns the container.
    pub fn current(&self) -> Option<&'static str> {
        self.active.borrow().as_ref().map(|a| a.id)
    }

    pub fn state(&self, id: &str) -> PluginState {
        self.states.borrow().get(id).copied().unwrap_or_default()
    }

    pub fn readiness(&self) -> Readiness {
        self.readiness.get()
    }

    pub fn resources(&self) -> &ResourceLoader<F> {
        &self.loader
    }

    fn descriptor(&self, id: &str) -> Option<&BackgroundDescriptor<S>> {
        self.catalogue.iter().find(|d| d.id == id)
    }

    fn set_state(&self, id: &'static str, state: PluginState) {
        debug!("background {id}: {state:?}");
        self.states.borrow_mut().insert(id, state);
    }

    /// Switch to background `id`.
    ///
    /// An unknown id is rejected before anything is torn down. Any other failure
    /// happens after the previous background was destroyed, leaving the container
    /// empty. If another `load` is requested while this one waits for the switch
    /// lock, this one yields to it and returns `Ok(())` without doing anything.
    pub async fn load(&self, id: &str) -> Result<(), HostError> {
        let Some(descriptor) = self.descriptor(id).cloned() else {
            error!("background {id} not found");
            return Err(HostError::UnknownBackground(id.to_owned()));
        };
        let ticket = self.latest_request.get() + 1;
        self.latest_request.set(ticket);

        let _guard = self.switching.lock().await;
        if self.latest_request.get() != ticket {
            debug!("load of {id} superseded by a newer request");
            return Ok(());
        }

        info!("loading background {id}");
        self.teardown().await;

        let result = self.activate(&descriptor).await;
        if let Err(err) = &result {
            error!("error loading background {id}: {err}");
            self.set_state(descriptor.id, PluginState::Unloaded);
        }
        result
    }

    async fn activate(&self, descriptor: &BackgroundDescriptor<S>) -> Result<(), HostError> {
        let id = descriptor.id;
        self.set_state(id, PluginState::Loading);

        for url in &descriptor.styles {
            self.loader.ensure(ResourceKind::Style, url).await?;
        }
        for url in &descriptor.scripts {
            self.loader.ensure(ResourceKind::Script, url).await?;
        }

        let container = self
            .surface
            .locate(&self.container_id)
            .ok_or_else(|| HostError::MissingContainer(self.container_id.clone()))?;

        let mut instance = (descriptor.factory)();
        instance.init(&container).await?;

        if let Some(theme) = self.theme.get() {
            instance.update_theme(theme);
        }
        if instance.supports_audio() {
            if let Some(audio) = self.audio.borrow().clone() {
                if instance.set_audio(&audio) {
                    *self.wired_audio.borrow_mut() = Some(audio);
                } else {
                    warn!("background {id} could not connect the audio element");
                }
            }
            if self.readiness.get().is_ready() {
                instance.start_rendering();
            }
        }

        *self.active.borrow_mut() = Some(ActivePlugin { id, instance });
        self.set_state(id, PluginState::Active);
        info!("background {id} loaded");
        Ok(())
    }

    /// Destroy the active background (awaited) and empty the container.
    pub async fn teardown(&self) {
        let previous = self.active.borrow_mut().take();
        if let Some(ActivePlugin { id, mut instance }) = previous {
            info!("cleaning up background {id}");
            self.set_state(id, PluginState::Destroying);
            instance.destroy().await;
            self.set_state(id, PluginState::Unloaded);
        }
        self.wired_audio.borrow_mut().take();
        if let Some(container) = self.surface.locate(&self.container_id) {
            self.surface.clear(&container);
        }
    }

    fn with_active<R>(&self, f: impl FnOnce(&mut dyn Background<S>) -> R) -> Option<R> {
        let mut active = self.active.borrow_mut();
        active.as_mut().map(|a| f(a.instance.as_mut()))
    }

    pub fn update_theme(&self, color: Rgb) {
        self.theme.set(Some(color));
        self.with_active(|bg| bg.update_theme(color));
    }

    pub fn resize(&self) {
        self.with_active(|bg| bg.resize());
    }

    pub fn pause(&self) {
        self.with_active(|bg| bg.pause());
    }

    pub fn play(&self) {
        self.with_active(|bg| bg.play());
    }

    /// Hand the song's audio to the active background. Re-sending the element that
    /// is already wired does nothing.
    pub fn set_audio(&self, audio: S::Audio) {
        *self.audio.borrow_mut() = Some(audio.clone());
        if self.wired_audio.borrow().as_ref() == Some(&audio) {
            debug!("audio element already wired; skipping");
            return;
        }
        let wired = self
            .with_active(|bg| bg.supports_audio() && bg.set_audio(&audio))
            .unwrap_or(false);
        if wired {
            info!("audio connected to background");
            *self.wired_audio.borrow_mut() = Some(audio);
        } else {
            self.wired_audio.borrow_mut().take();
        }
    }

    /// The active background plays the song's audio, so the lyric transport must
    /// drive it.
    pub fn has_audio_transport(&self) -> bool {
        self.wired_audio.borrow().is_some()
            && self.with_active(|bg| bg.supports_audio()).unwrap_or(false)
    }

    pub fn play_audio(&self) {
        self.with_active(|bg| {
            if bg.supports_audio() {
                bg.play_audio();
            }
        });
    }

    pub fn pause_audio(&self) {
        self.with_active(|bg| {
            if bg.supports_audio() {
                bg.pause_audio();
            }
        });
    }

    pub fn mark_lyrics_loaded(&self) {
        let mut r = self.readiness.get();
        r.lrc_loaded = true;
        self.update_readiness(r);
    }

    pub fn mark_audio_loaded(&self) {
        let mut r = self.readiness.get();
        r.audio_loaded = true;
        self.update_readiness(r);
    }

    fn update_readiness(&self, readiness: Readiness) {
        self.readiness.set(readiness);
        if readiness.is_ready() {
            self.with_active(|bg| {
                if bg.supports_audio() {
                    bg.start_rendering();
                }
            });
        }
    }

    /// Forward a tuning option to the active background.
    pub fn configure(&self, key: &str, value: &str) -> bool {
        let applied = self.with_active(|bg| bg.configure(key, value)).unwrap_or(false);
        if !applied {
            warn!("background option {key}={value} not applied");
        }
        applied
    }
}
