//! Shared test doubles for the phaseflow engine.

mod clock;
mod collaborators;
mod flag_store;
mod journal;

pub use clock::FixedClock;
pub use collaborators::{
    Call, CallLog, CompletionMode, RecordingCollaborators, RecordingFader, RecordingPresenter,
    RecordingSession, StubProbes, fade_finished, hidden, shown,
};
pub use flag_store::{FailingFlagStore, RecordingFlagStore};
pub use journal::RecordingJournal;
