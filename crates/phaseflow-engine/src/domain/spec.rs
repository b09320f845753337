//! Static declaration of a phase node: its view, timing, skip rule and
//! candidate successors. Declarations are checked when a graph is
//! assembled; see `FlowGraphBuilder::build`.

use std::time::Duration;

use phaseflow_core::bus::Topic;
use phaseflow_core::error::FlowError;
use phaseflow_core::flag::FlagKey;
use phaseflow_core::id::{NodeId, ViewId};

/// Whether a node runs on top of the immersive session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionMode {
    /// Plain screen UI.
    #[default]
    Flat,
    /// Needs the immersive session running.
    Immersive,
}

/// When a node fast-forwards past its UI.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum SkipPolicy {
    /// Always presents.
    #[default]
    Never,
    /// Skips once the persisted flag is done.
    PersistedFlag(FlagKey),
    /// Presents at most once per process.
    OncePerProcess,
}

/// Entry timing: the fixed delay before content appears and the fade-in length.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct EntryTiming {
    /// Wait before the view is shown.
    pub delay: Duration,
    /// Fade duration used for both fade-in and fade-out.
    pub fade: Duration,
}

/// A candidate successor guarded by a signal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Branch {
    /// Label used in logs and the journal.
    pub label: String,
    /// Signal that selects this branch.
    pub trigger: Topic,
    /// The successor; `None` is a configuration error.
    pub target: Option<NodeId>,
    /// Flag to persist when leaving through this branch.
    pub persist: Option<FlagKey>,
    /// Ignore the trigger until the node's gate is satisfied.
    pub gated: bool,
}

impl Branch {
    /// Declares a branch taken when `trigger` is published.
    #[must_use]
    pub fn on(trigger: Topic, label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            trigger,
            target: None,
            persist: None,
            gated: false,
        }
    }

    /// Sets the successor.
    #[must_use]
    pub fn to(mut self, target: impl Into<NodeId>) -> Self {
        self.target = Some(target.into());
        self
    }

    /// Persists `key` when the node completes through this branch.
    #[must_use]
    pub fn persisting(mut self, key: FlagKey) -> Self {
        self.persist = Some(key);
        self
    }

    /// Requires the node's gate before the trigger counts.
    #[must_use]
    pub fn gated(mut self) -> Self {
        self.gated = true;
        self
    }
}

/// One outcome of an entry probe: the body text to show and where the
/// probe's trigger leads.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeVariant {
    /// Body text key handed to the presenter.
    pub body_text: String,
    /// Successor for this outcome.
    pub target: Option<NodeId>,
}

impl ProbeVariant {
    /// Declares a variant.
    #[must_use]
    pub fn new(body_text: impl Into<String>, target: impl Into<NodeId>) -> Self {
        Self {
            body_text: body_text.into(),
            target: Some(target.into()),
        }
    }
}

/// A boolean query evaluated once at entry that picks between two variants.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeBranch {
    /// Probe name passed to `Probes::query`.
    pub probe: String,
    /// Signal that confirms the chosen variant.
    pub trigger: Topic,
    /// Variant used when the probe answers `true`.
    pub when_true: ProbeVariant,
    /// Variant used when the probe answers `false`.
    pub when_false: ProbeVariant,
    /// Answer assumed when the probe cannot be evaluated.
    pub when_unknown: bool,
}

/// Complete static declaration of a node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeSpec {
    /// Stable identity.
    pub id: NodeId,
    /// View presented while the node runs.
    pub view: Option<ViewId>,
    /// Session requirement.
    pub session: SessionMode,
    /// Skip rule.
    pub skip: SkipPolicy,
    /// Entry timing.
    pub timing: EntryTiming,
    /// Gating toggle feeding the continue affordance.
    pub gate: Option<Topic>,
    /// Signal-guarded successors, in registration order. The first one is
    /// the primary successor used when the node skips.
    pub branches: Vec<Branch>,
    /// Successor chosen by a probe at entry.
    pub probe: Option<ProbeBranch>,
    /// Reaching this node finishes the flow.
    pub terminal: bool,
}

impl NodeSpec {
    /// The successor a skipping node exits to.
    #[must_use]
    pub fn primary_target(&self) -> Option<&NodeId> {
        self.branches.first().and_then(|b| b.target.as_ref())
    }

    /// Every successor reference with a description of where it comes from.
    pub(crate) fn successor_refs(&self) -> Vec<(String, Option<&NodeId>)> {
        let mut refs: Vec<(String, Option<&NodeId>)> = self
            .branches
            .iter()
            .map(|b| (b.label.clone(), b.target.as_ref()))
            .collect();
        if let Some(probe) = &self.probe {
            refs.push((format!("{}:true", probe.probe), probe.when_true.target.as_ref()));
            refs.push((format!("{}:false", probe.probe), probe.when_false.target.as_ref()));
        }
        refs
    }

    /// Checks the declaration on its own; cross-node references are checked
    /// by the graph builder.
    ///
    /// # Errors
    ///
    /// Returns the first configuration error found.
    pub fn validate(&self) -> Result<(), FlowError> {
        for (branch, target) in self.successor_refs() {
            if target.is_none() {
                return Err(FlowError::MissingSuccessor {
                    node: self.id.clone(),
                    branch,
                });
            }
        }

        let has_exit = !self.branches.is_empty() || self.probe.is_some();
        if self.terminal && has_exit {
            return Err(FlowError::InvalidConfiguration(format!(
                "terminal node {} declares successors",
                self.id
            )));
        }
        if !self.terminal && !has_exit {
            return Err(FlowError::InvalidConfiguration(format!(
                "node {} has no successor and is not terminal",
                self.id
            )));
        }

        if self.skip != SkipPolicy::Never && self.branches.is_empty() {
            return Err(FlowError::InvalidConfiguration(format!(
                "node {} can skip but has no primary branch",
                self.id
            )));
        }

        if self.view.is_none() {
            if self.gate.is_some() {
                return Err(FlowError::MissingView {
                    node: self.id.clone(),
                    reason: "gating control".to_owned(),
                });
            }
            if self.probe.is_some() {
                return Err(FlowError::MissingView {
                    node: self.id.clone(),
                    reason: "probe body text".to_owned(),
                });
            }
        }

        if self.gate.is_none() {
            if let Some(branch) = self.branches.iter().find(|b| b.gated) {
                return Err(FlowError::InvalidConfiguration(format!(
                    "node {}: branch `{}` is gated but the node has no gate",
                    self.id, branch.label
                )));
            }
        }

        Ok(())
    }
}

/// Fluent constructor for [`NodeSpec`].
#[derive(Debug, Clone)]
pub struct NodeBuilder {
    spec: NodeSpec,
}

impl NodeBuilder {
    /// Starts a declaration for `id`.
    #[must_use]
    pub fn new(id: impl Into<NodeId>) -> Self {
        Self {
            spec: NodeSpec {
                id: id.into(),
                view: None,
                session: SessionMode::Flat,
                skip: SkipPolicy::Never,
                timing: EntryTiming::default(),
                gate: None,
                branches: Vec::new(),
                probe: None,
                terminal: false,
            },
        }
    }

    /// Sets the presented view.
    #[must_use]
    pub fn view(mut self, view: impl Into<ViewId>) -> Self {
        self.spec.view = Some(view.into());
        self
    }

    /// Sets the session requirement.
    #[must_use]
    pub fn session(mut self, session: SessionMode) -> Self {
        self.spec.session = session;
        self
    }

    /// Sets the skip rule.
    #[must_use]
    pub fn skip_when(mut self, skip: SkipPolicy) -> Self {
        self.spec.skip = skip;
        self
    }

    /// Sets entry delay and fade duration.
    #[must_use]
    pub fn timing(mut self, delay: Duration, fade: Duration) -> Self {
        self.spec.timing = EntryTiming { delay, fade };
        self
    }

    /// Declares the gating toggle.
    #[must_use]
    pub fn gate(mut self, topic: Topic) -> Self {
        self.spec.gate = Some(topic);
        self
    }

    /// Adds a signal-guarded successor.
    #[must_use]
    pub fn branch(mut self, branch: Branch) -> Self {
        self.spec.branches.push(branch);
        self
    }

    /// Adds the entry probe.
    #[must_use]
    pub fn probe(mut self, probe: ProbeBranch) -> Self {
        self.spec.probe = Some(probe);
        self
    }

    /// Marks the node as the end of the flow.
    #[must_use]
    pub fn terminal(mut self) -> Self {
        self.spec.terminal = true;
        self
    }

    /// Finishes the declaration.
    #[must_use]
    pub fn build(self) -> NodeSpec {
        self.spec
    }
}
