//! Console collaborators.
//!
//! Views and session commands are reported through `tracing`; fades and
//! session warm-up complete after their duration has elapsed in frame time.

use std::cell::{Cell, RefCell};
use std::rc::Rc;
use std::time::Duration;

use phaseflow_core::collaborator::{
    Collaborators, Control, Fader, Presenter, Probes, SessionControl,
};
use phaseflow_core::completion::Completion;
use phaseflow_core::id::ViewId;
use tracing::{debug, info};

/// Logs view changes.
#[derive(Debug, Default)]
pub struct ConsolePresenter;

impl Presenter for ConsolePresenter {
    fn set_visible(&self, view: &ViewId, visible: bool) {
        if visible {
            info!(view = %view, "view shown");
        } else {
            info!(view = %view, "view hidden");
        }
    }

    fn set_control_enabled(&self, view: &ViewId, control: Control, enabled: bool) {
        info!(view = %view, ?control, enabled, "control toggled");
    }

    fn set_body_text(&self, view: &ViewId, text_key: &str) {
        info!(view = %view, text = text_key, "body text");
    }
}

#[derive(Debug)]
struct Fade {
    view: ViewId,
    remaining: Duration,
    done: Completion,
}

/// Completes each fade once its duration has elapsed.
#[derive(Debug, Default)]
pub struct TimedFader {
    fades: RefCell<Vec<Fade>>,
}

impl TimedFader {
    /// Number of fades still running.
    #[must_use]
    pub fn in_flight(&self) -> usize {
        self.fades.borrow().len()
    }

    /// Moves every running fade forward by `elapsed`.
    pub fn advance(&self, elapsed: Duration) {
        let finished: Vec<Fade> = {
            let mut fades = self.fades.borrow_mut();
            for fade in fades.iter_mut() {
                fade.remaining = fade.remaining.saturating_sub(elapsed);
            }
            let (finished, running): (Vec<Fade>, Vec<Fade>) =
                fades.drain(..).partition(|f| f.remaining.is_zero());
            *fades = running;
            finished
        };
        for fade in finished {
            debug!(view = %fade.view, "fade finished");
            fade.done.complete();
        }
    }

    fn start(&self, view: &ViewId, duration: Duration, done: Completion) {
        if duration.is_zero() {
            done.complete();
            return;
        }
        self.fades.borrow_mut().push(Fade {
            view: view.clone(),
            remaining: duration,
            done,
        });
    }
}

impl Fader for TimedFader {
    fn fade_in(&self, view: &ViewId, duration: Duration, done: Completion) {
        debug!(view = %view, ?duration, "fade in");
        self.start(view, duration, done);
    }

    fn fade_out(&self, view: &ViewId, duration: Duration, done: Completion) {
        debug!(view = %view, ?duration, "fade out");
        self.start(view, duration, done);
    }

    fn cancel(&self, view: &ViewId) {
        let cancelled: Vec<Fade> = {
            let mut fades = self.fades.borrow_mut();
            let (cancelled, running): (Vec<Fade>, Vec<Fade>) =
                fades.drain(..).partition(|f| &f.view == view);
            *fades = running;
            cancelled
        };
        for fade in cancelled {
            debug!(view = %fade.view, "fade cancelled");
            fade.done.complete();
        }
    }
}

/// Pretends to run the immersive session; it reports ready after `warmup`.
#[derive(Debug, Default)]
pub struct ConsoleSession {
    warmup: Duration,
    starting: RefCell<Option<(Duration, Completion)>>,
    running: Cell<bool>,
}

impl ConsoleSession {
    /// Session whose start completes after `warmup` of frame time.
    #[must_use]
    pub fn new(warmup: Duration) -> Self {
        Self {
            warmup,
            ..Self::default()
        }
    }

    /// `true` between `start` and `stop`.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.running.get()
    }

    /// Counts down a pending start.
    pub fn advance(&self, elapsed: Duration) {
        let ready = {
            let mut starting = self.starting.borrow_mut();
            match starting.take() {
                Some((remaining, done)) => {
                    let remaining = remaining.saturating_sub(elapsed);
                    if remaining.is_zero() {
                        Some(done)
                    } else {
                        *starting = Some((remaining, done));
                        None
                    }
                }
                None => None,
            }
        };
        if let Some(done) = ready {
            info!("session ready");
            done.complete();
        }
    }
}

impl SessionControl for ConsoleSession {
    fn start(&self, ready: Completion) {
        info!(warmup = ?self.warmup, "session starting");
        self.running.set(true);
        if self.warmup.is_zero() {
            info!("session ready");
            ready.complete();
        } else if let Some((_, superseded)) = self.starting.replace(Some((self.warmup, ready))) {
            superseded.complete();
        }
    }

    fn stop(&self) {
        info!("session stopped");
        self.running.set(false);
        if let Some((_, pending)) = self.starting.take() {
            pending.complete();
        }
    }

    fn set_camera_active(&self, active: bool) {
        info!(active, "camera");
    }
}

/// Answers one named probe from the last `near`/`far` command.
#[derive(Debug)]
pub struct ConsoleProbes {
    name: String,
    answer: Cell<Option<bool>>,
}

impl ConsoleProbes {
    /// Probe that is unknown until answered.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            answer: Cell::new(None),
        }
    }

    /// Sets the probe's answer.
    pub fn answer(&self, value: bool) {
        debug!(probe = %self.name, value, "probe answered");
        self.answer.set(Some(value));
    }
}

impl Probes for ConsoleProbes {
    fn query(&self, name: &str) -> Option<bool> {
        if name == self.name {
            self.answer.get()
        } else {
            None
        }
    }
}

/// The console collaborator set, kept typed so the driver can advance it.
#[derive(Debug, Clone)]
pub struct ConsoleCollaborators {
    /// View logger.
    pub presenter: Rc<ConsolePresenter>,
    /// Frame-time fades.
    pub fader: Rc<TimedFader>,
    /// Simulated session.
    pub session: Rc<ConsoleSession>,
    /// Proximity answers.
    pub probes: Rc<ConsoleProbes>,
}

impl ConsoleCollaborators {
    /// Builds the set for the given probe name and session warm-up.
    #[must_use]
    pub fn new(probe: impl Into<String>, warmup: Duration) -> Self {
        Self {
            presenter: Rc::new(ConsolePresenter),
            fader: Rc::new(TimedFader::default()),
            session: Rc::new(ConsoleSession::new(warmup)),
            probes: Rc::new(ConsoleProbes::new(probe)),
        }
    }

    /// Trait-object handles for the flow graph.
    #[must_use]
    pub fn collaborators(&self) -> Collaborators {
        Collaborators {
            presenter: self.presenter.clone(),
            fader: self.fader.clone(),
            session: self.session.clone(),
            probes: self.probes.clone(),
        }
    }

    /// Moves fades and session warm-up forward.
    pub fn advance(&self, elapsed: Duration) {
        self.session.advance(elapsed);
        self.fader.advance(elapsed);
    }
}
