//! Static wiring of the guided experience.

use phaseflow_core::error::FlowError;
use phaseflow_core::flag::FlagKey;
use phaseflow_engine::{
    Branch, FlowGraph, FlowGraphBuilder, NodeBuilder, NodeSpec, ProbeBranch, ProbeVariant,
    SessionMode, SkipPolicy,
};
use tracing::info;

use crate::config::ExperienceConfig;
use crate::topics::{
    BACK, CONTINUE, FORCE_LOCALIZED, GATE_TOGGLED, LOCALIZATION_FAILED, LOCALIZED,
    TRACKING_DESTABILIZED,
};

/// Node identities.
pub mod nodes {
    /// Legal document acceptance.
    pub const LEGAL: &str = "legal";
    /// Safety warning, shown once per process.
    pub const SAFETY: &str = "safety";
    /// How to scan the surroundings.
    pub const INSTRUCTIONS: &str = "instructions";
    /// Immersive localization against the anchor map.
    pub const LOCALIZE: &str = "localize";
    /// Debug diagnostics reached through the override.
    pub const DIAGNOSTICS: &str = "diagnostics";
    /// Localized; content is placed.
    pub const SUCCESS: &str = "success";
    /// Tracking lost after localization.
    pub const DESTABILIZED: &str = "destabilized";
    /// Localization failed.
    pub const FAILURE: &str = "failure";
    /// Flat map to walk back to the anchor area.
    pub const MAP: &str = "map";
    /// Leaves the experience.
    pub const EXIT: &str = "exit";
}

/// Body text shown by the destabilized node when the user is near the anchor.
pub const RELOCALIZE_TEXT: &str = "relocalize";

/// Body text shown by the destabilized node when the user is far away.
pub const RETURN_TO_MAP_TEXT: &str = "return_to_map";

/// Declares every node of the experience.
#[must_use]
pub fn experience_nodes(config: &ExperienceConfig) -> Vec<NodeSpec> {
    use nodes::{
        DESTABILIZED, DIAGNOSTICS, EXIT, FAILURE, INSTRUCTIONS, LEGAL, LOCALIZE, MAP, SAFETY,
        SUCCESS,
    };

    let legal_flag = FlagKey::new(config.legal_doc_pref_name.as_str());
    let presented = |id: &str, view: &str| {
        NodeBuilder::new(id)
            .view(view)
            .timing(config.content_delay(), config.fade())
    };

    let mut localize = presented(LOCALIZE, "scan_prompt")
        .session(SessionMode::Immersive)
        .branch(Branch::on(LOCALIZED, "localized").to(SUCCESS))
        .branch(Branch::on(LOCALIZATION_FAILED, "failed").to(FAILURE))
        .branch(Branch::on(TRACKING_DESTABILIZED, "destabilized").to(DESTABILIZED));
    if config.debug_overrides {
        localize = localize.branch(Branch::on(FORCE_LOCALIZED, "debug").to(DIAGNOSTICS));
    }

    vec![
        presented(LEGAL, "legal_panel")
            .skip_when(SkipPolicy::PersistedFlag(legal_flag.clone()))
            .gate(GATE_TOGGLED)
            .branch(
                Branch::on(CONTINUE, "continue")
                    .to(SAFETY)
                    .persisting(legal_flag)
                    .gated(),
            )
            .branch(Branch::on(BACK, "back").to(EXIT))
            .build(),
        presented(SAFETY, "safety_panel")
            .skip_when(SkipPolicy::OncePerProcess)
            .branch(Branch::on(CONTINUE, "continue").to(INSTRUCTIONS))
            .build(),
        presented(INSTRUCTIONS, "instructions_panel")
            .branch(Branch::on(CONTINUE, "continue").to(LOCALIZE))
            .branch(Branch::on(BACK, "back").to(EXIT))
            .build(),
        localize.build(),
        presented(DIAGNOSTICS, "diagnostics_panel")
            .session(SessionMode::Immersive)
            .branch(Branch::on(CONTINUE, "continue").to(SUCCESS))
            .build(),
        presented(SUCCESS, "success_panel")
            .session(SessionMode::Immersive)
            .branch(Branch::on(CONTINUE, "continue").to(EXIT))
            .branch(Branch::on(TRACKING_DESTABILIZED, "destabilized").to(DESTABILIZED))
            .build(),
        presented(DESTABILIZED, "recovery_panel")
            .session(SessionMode::Immersive)
            .probe(ProbeBranch {
                probe: config.proximity_probe.clone(),
                trigger: CONTINUE,
                when_true: ProbeVariant::new(RELOCALIZE_TEXT, LOCALIZE),
                when_false: ProbeVariant::new(RETURN_TO_MAP_TEXT, MAP),
                when_unknown: config.assume_near_when_unknown,
            })
            .build(),
        presented(FAILURE, "failure_panel")
            .branch(Branch::on(CONTINUE, "retry").to(LOCALIZE))
            .branch(Branch::on(BACK, "back").to(MAP))
            .build(),
        presented(MAP, "map_panel")
            .branch(Branch::on(CONTINUE, "continue").to(LOCALIZE))
            .branch(Branch::on(BACK, "back").to(EXIT))
            .build(),
        NodeBuilder::new(EXIT).terminal().build(),
    ]
}

/// Adds the experience to `builder` (which must already carry the flag
/// store and collaborators) and assembles the graph.
///
/// # Errors
///
/// Returns a configuration error if the wiring is invalid or the builder
/// lacks its store or collaborators.
pub fn build_experience(
    builder: FlowGraphBuilder,
    config: &ExperienceConfig,
) -> Result<FlowGraph, FlowError> {
    let graph = experience_nodes(config)
        .into_iter()
        .fold(builder, FlowGraphBuilder::node)
        .start(nodes::LEGAL)
        .overlay_fade(config.overlay_fade())
        .build()?;
    info!(
        flow_id = %graph.flow_id(),
        legal_flag = %config.legal_doc_pref_name,
        debug_overrides = config.debug_overrides,
        "experience wired"
    );
    Ok(graph)
}
