//! Cancelable `requestAnimationFrame` loop.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use wasm_bindgen::JsCast;
use wasm_bindgen::prelude::*;
use web_sys::window;

type FrameCallback = Rc<RefCell<Option<Closure<dyn FnMut(f64)>>>>;

/// Runs `tick` once per animation frame until stopped, dropped, or `tick` returns
/// `false`. At most one frame request is in flight at a time.
pub struct FrameLoop {
    callback: FrameCallback,
    pending: Rc<Cell<Option<i32>>>,
}

impl FrameLoop {
    pub fn new<T>(mut tick: T) -> Self
    where
        T: FnMut(f64) -> bool + 'static,
    {
        let callback: FrameCallback = Rc::new(RefCell::new(None));
        let pending = Rc::new(Cell::new(None));

        // Weak: the closure must not keep its own cell alive.
        let this = Rc::downgrade(&callback);
        let in_flight = pending.clone();
        *callback.borrow_mut() = Some(Closure::wrap(Box::new(move |ts: f64| {
            in_flight.set(None);
            if !tick(ts) {
                return;
            }
            if let Some(cb) = this.upgrade() {
                in_flight.set(request_frame(&cb));
            }
        }) as Box<dyn FnMut(f64)>));

        Self { callback, pending }
    }

    pub fn start(&self) {
        if self.pending.get().is_none() {
            self.pending.set(request_frame(&self.callback));
        }
    }

    pub fn stop(&self) {
        if let Some(id) = self.pending.take() {
            if let Some(w) = window() {
                let _ = w.cancel_animation_frame(id);
            }
        }
    }

    pub fn is_running(&self) -> bool {
        self.pending.get().is_some()
    }
}

impl Drop for FrameLoop {
    fn drop(&mut self) {
        self.stop();
    }
}

fn request_frame(cb: &FrameCallback) -> Option<i32> {
    let w = window()?;
    let cb = cb.borrow();
    w.request_animation_frame(cb.as_ref()?.as_ref().unchecked_ref()).ok()
}

/// `performance.now()` in milliseconds (0 outside a browser).
pub fn now_ms() -> f64 {
    window()
        .and_then(|w| w.performance())
        .map(|p| p.now())
        .unwrap_or(0.0)
}
