//! Instrumented collaborator stubs.
//!
//! Every stub appends to one shared [`CallLog`], so tests can assert the
//! order of calls across presenter, fader and session (e.g. "the next view
//! became visible only after the previous one finished fading out").

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::rc::Rc;
use std::time::Duration;

use phaseflow_core::collaborator::{
    Collaborators, Control, Fader, Presenter, Probes, SessionControl,
};
use phaseflow_core::completion::Completion;
use phaseflow_core::id::ViewId;

/// One observed collaborator call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    /// `Presenter::set_visible`.
    SetVisible { view: String, visible: bool },
    /// `Presenter::set_control_enabled`.
    SetControlEnabled {
        view: String,
        control: Control,
        enabled: bool,
    },
    /// `Presenter::set_body_text`.
    SetBodyText { view: String, text: String },
    /// `Fader::fade_in` started.
    FadeIn { view: String, duration: Duration },
    /// `Fader::fade_out` started.
    FadeOut { view: String, duration: Duration },
    /// A fade's completion was invoked.
    FadeFinished { view: String },
    /// `Fader::cancel`.
    CancelFade { view: String },
    /// `SessionControl::start`.
    SessionStart,
    /// The session reported its first camera frame.
    SessionReady,
    /// `SessionControl::stop`.
    SessionStop,
    /// `SessionControl::set_camera_active`.
    CameraActive(bool),
    /// `Probes::query` and what it returned.
    Probe { name: String, result: Option<bool> },
}

/// Shared, ordered record of collaborator calls.
#[derive(Debug, Clone, Default)]
pub struct CallLog(Rc<RefCell<Vec<Call>>>);

impl CallLog {
    /// Creates an empty log.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn push(&self, call: Call) {
        self.0.borrow_mut().push(call);
    }

    /// Returns a snapshot of all calls.
    #[must_use]
    pub fn calls(&self) -> Vec<Call> {
        self.0.borrow().clone()
    }

    /// Returns the position of the first call equal to `call`.
    #[must_use]
    pub fn position(&self, call: &Call) -> Option<usize> {
        self.0.borrow().iter().position(|c| c == call)
    }

    /// Returns `true` if `call` was observed.
    #[must_use]
    pub fn contains(&self, call: &Call) -> bool {
        self.position(call).is_some()
    }

    /// Counts calls matching a predicate.
    pub fn count(&self, predicate: impl Fn(&Call) -> bool) -> usize {
        self.0.borrow().iter().filter(|c| predicate(c)).count()
    }

    /// Forgets everything recorded so far.
    pub fn clear(&self) {
        self.0.borrow_mut().clear();
    }
}

/// Convenience constructor for [`Call::SetVisible`].
#[must_use]
pub fn shown(view: &str) -> Call {
    Call::SetVisible {
        view: view.to_owned(),
        visible: true,
    }
}

/// Convenience constructor for a hidden [`Call::SetVisible`].
#[must_use]
pub fn hidden(view: &str) -> Call {
    Call::SetVisible {
        view: view.to_owned(),
        visible: false,
    }
}

/// Convenience constructor for [`Call::FadeFinished`].
#[must_use]
pub fn fade_finished(view: &str) -> Call {
    Call::FadeFinished {
        view: view.to_owned(),
    }
}

/// Presenter that only records.
#[derive(Debug)]
pub struct RecordingPresenter {
    log: CallLog,
}

impl Presenter for RecordingPresenter {
    fn set_visible(&self, view: &ViewId, visible: bool) {
        self.log.push(Call::SetVisible {
            view: view.to_string(),
            visible,
        });
    }

    fn set_control_enabled(&self, view: &ViewId, control: Control, enabled: bool) {
        self.log.push(Call::SetControlEnabled {
            view: view.to_string(),
            control,
            enabled,
        });
    }

    fn set_body_text(&self, view: &ViewId, text_key: &str) {
        self.log.push(Call::SetBodyText {
            view: view.to_string(),
            text: text_key.to_owned(),
        });
    }
}

/// When a stub invokes the completions it is handed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompletionMode {
    /// Inside the call that received the completion.
    Immediate,
    /// Only when the test says so.
    Manual,
}

/// Fader that records calls and completes either immediately or on demand.
#[derive(Debug)]
pub struct RecordingFader {
    log: CallLog,
    mode: Cell<CompletionMode>,
    held: RefCell<Vec<(ViewId, Completion)>>,
}

impl RecordingFader {
    /// Switches the completion mode for subsequent fades.
    pub fn set_mode(&self, mode: CompletionMode) {
        self.mode.set(mode);
    }

    /// Number of fades waiting for [`RecordingFader::finish_all`].
    #[must_use]
    pub fn in_flight(&self) -> usize {
        self.held.borrow().len()
    }

    /// Completes every held fade, oldest first.
    pub fn finish_all(&self) {
        let held: Vec<_> = self.held.borrow_mut().drain(..).collect();
        for (view, done) in held {
            self.finish(view, done);
        }
    }

    fn finish(&self, view: ViewId, done: Completion) {
        self.log.push(Call::FadeFinished {
            view: view.to_string(),
        });
        done.complete();
    }

    fn accept(&self, view: &ViewId, done: Completion) {
        match self.mode.get() {
            CompletionMode::Immediate => self.finish(view.clone(), done),
            CompletionMode::Manual => self.held.borrow_mut().push((view.clone(), done)),
        }
    }
}

impl Fader for RecordingFader {
    fn fade_in(&self, view: &ViewId, duration: Duration, done: Completion) {
        self.log.push(Call::FadeIn {
            view: view.to_string(),
            duration,
        });
        self.accept(view, done);
    }

    fn fade_out(&self, view: &ViewId, duration: Duration, done: Completion) {
        self.log.push(Call::FadeOut {
            view: view.to_string(),
            duration,
        });
        self.accept(view, done);
    }

    fn cancel(&self, view: &ViewId) {
        self.log.push(Call::CancelFade {
            view: view.to_string(),
        });
        let held: Vec<_> = self.held.borrow_mut().drain(..).collect();
        let mut keep = Vec::with_capacity(held.len());
        for (held_view, done) in held {
            if &held_view == view {
                done.complete();
            } else {
                keep.push((held_view, done));
            }
        }
        *self.held.borrow_mut() = keep;
    }
}

/// Session stub that records commands and reports readiness on demand.
#[derive(Debug)]
pub struct RecordingSession {
    log: CallLog,
    mode: Cell<CompletionMode>,
    ready: RefCell<Option<Completion>>,
}

impl RecordingSession {
    /// Switches when `start` reports the first camera frame.
    pub fn set_mode(&self, mode: CompletionMode) {
        self.mode.set(mode);
    }

    /// Reports the first camera frame for a pending `start`.
    pub fn frame_available(&self) {
        if let Some(ready) = self.ready.borrow_mut().take() {
            self.log.push(Call::SessionReady);
            ready.complete();
        }
    }
}

impl SessionControl for RecordingSession {
    fn start(&self, ready: Completion) {
        self.log.push(Call::SessionStart);
        match self.mode.get() {
            CompletionMode::Immediate => {
                self.log.push(Call::SessionReady);
                ready.complete();
            }
            CompletionMode::Manual => {
                self.ready.borrow_mut().replace(ready);
            }
        }
    }

    fn stop(&self) {
        self.log.push(Call::SessionStop);
    }

    fn set_camera_active(&self, active: bool) {
        self.log.push(Call::CameraActive(active));
    }
}

/// Probe stub answering from a table; unknown names are "cannot evaluate".
#[derive(Debug)]
pub struct StubProbes {
    log: CallLog,
    answers: RefCell<HashMap<String, bool>>,
}

impl StubProbes {
    /// Sets the answer for a probe.
    pub fn set(&self, name: &str, answer: bool) {
        self.answers.borrow_mut().insert(name.to_owned(), answer);
    }

    /// Makes a probe unavailable again.
    pub fn unset(&self, name: &str) {
        self.answers.borrow_mut().remove(name);
    }
}

impl Probes for StubProbes {
    fn query(&self, name: &str) -> Option<bool> {
        let result = self.answers.borrow().get(name).copied();
        self.log.push(Call::Probe {
            name: name.to_owned(),
            result,
        });
        result
    }
}

/// Every stub wired to one call log.
#[derive(Debug, Clone)]
pub struct RecordingCollaborators {
    /// The shared call log.
    pub log: CallLog,
    /// Presenter stub.
    pub presenter: Rc<RecordingPresenter>,
    /// Fader stub, completing immediately by default.
    pub fader: Rc<RecordingFader>,
    /// Session stub, ready immediately by default.
    pub session: Rc<RecordingSession>,
    /// Probe stub with no answers configured.
    pub probes: Rc<StubProbes>,
}

impl Default for RecordingCollaborators {
    fn default() -> Self {
        Self::new()
    }
}

impl RecordingCollaborators {
    /// Creates stubs sharing a fresh log.
    #[must_use]
    pub fn new() -> Self {
        let log = CallLog::new();
        Self {
            presenter: Rc::new(RecordingPresenter { log: log.clone() }),
            fader: Rc::new(RecordingFader {
                log: log.clone(),
                mode: Cell::new(CompletionMode::Immediate),
                held: RefCell::new(Vec::new()),
            }),
            session: Rc::new(RecordingSession {
                log: log.clone(),
                mode: Cell::new(CompletionMode::Immediate),
                ready: RefCell::new(None),
            }),
            probes: Rc::new(StubProbes {
                log: log.clone(),
                answers: RefCell::new(HashMap::new()),
            }),
            log,
        }
    }

    /// Returns the trait-object bundle a flow graph consumes.
    #[must_use]
    pub fn collaborators(&self) -> Collaborators {
        Collaborators {
            presenter: self.presenter.clone(),
            fader: self.fader.clone(),
            session: self.session.clone(),
            probes: self.probes.clone(),
        }
    }
}
