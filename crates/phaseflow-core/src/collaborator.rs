//! Contracts of the collaborators the engine drives.
//!
//! Rendering, animation, the immersive session and spatial queries are
//! external to the engine and consumed only through these traits. All of
//! them live on the frame thread, so they take `&self` and are shared as
//! `Rc`.

use std::fmt;
use std::rc::Rc;
use std::time::Duration;

use crate::completion::Completion;
use crate::id::ViewId;

/// Interactive controls a view may expose.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Control {
    /// Primary continue action.
    Continue,
    /// Secondary / back action.
    Back,
    /// Gating checkbox.
    Gate,
}

/// Shows and hides views and drives their controls.
pub trait Presenter {
    /// Makes a view visible or hidden without animation.
    fn set_visible(&self, view: &ViewId, visible: bool);

    /// Enables or disables a control on a view.
    fn set_control_enabled(&self, view: &ViewId, control: Control, enabled: bool);

    /// Selects the body text variant shown by a view.
    fn set_body_text(&self, view: &ViewId, text_key: &str);
}

/// Scoped fade animations. Every call must eventually invoke `done`
/// exactly once, including when the fade is cut short by [`Fader::cancel`].
pub trait Fader {
    /// Fades a view to fully opaque.
    fn fade_in(&self, view: &ViewId, duration: Duration, done: Completion);

    /// Fades a view to fully transparent.
    fn fade_out(&self, view: &ViewId, duration: Duration, done: Completion);

    /// Stops any fade running on a view.
    fn cancel(&self, view: &ViewId);
}

/// Commands for the immersive (camera-backed) session.
pub trait SessionControl {
    /// Starts the session; `ready` fires once the first camera frame is available.
    fn start(&self, ready: Completion);

    /// Tears down the session and releases its resources.
    fn stop(&self);

    /// Turns the camera feed on or off.
    fn set_camera_active(&self, active: bool);
}

/// Named boolean queries evaluated synchronously, e.g. "is the user close
/// enough to retry".
pub trait Probes {
    /// Returns `None` when the query cannot be evaluated right now.
    fn query(&self, name: &str) -> Option<bool>;
}

/// Bundle of collaborator handles given to a flow graph.
#[derive(Clone)]
pub struct Collaborators {
    /// View visibility and controls.
    pub presenter: Rc<dyn Presenter>,
    /// Fade animations.
    pub fader: Rc<dyn Fader>,
    /// Immersive session commands.
    pub session: Rc<dyn SessionControl>,
    /// Spatial and environment queries.
    pub probes: Rc<dyn Probes>,
}

impl fmt::Debug for Collaborators {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Collaborators").finish_non_exhaustive()
    }
}
