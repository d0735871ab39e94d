//! Blocker eligibility: which entities may stand between attacker and target

use crate::core::config::{BlockerFilterConfig, VisibilityPerspective};
use crate::scene::{Entity, Visibility, VisibilityProvider};

/// Why a candidate was not considered as a blocker
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Exclusion {
    /// The attacker, the target, or a token the acting user controls
    Participant,
    NonBlockingType,
    ExemptFlag,
    SceneHidden,
    Undetected,
    Dead,
    Prone,
    Ally,
}

/// First rule that excludes `candidate`, or `None` if it may block
pub fn exclusion_reason(
    attacker: &Entity,
    target: &Entity,
    candidate: &Entity,
    perspective: &Entity,
    visibility: &dyn VisibilityProvider,
    config: &BlockerFilterConfig,
) -> Option<Exclusion> {
    if candidate.id == attacker.id || candidate.id == target.id || candidate.flags.controlled {
        return Some(Exclusion::Participant);
    }
    if !candidate.actor_type.can_block() {
        return Some(Exclusion::NonBlockingType);
    }
    if config.respect_ignore_flag && candidate.flags.ignores_cover {
        return Some(Exclusion::ExemptFlag);
    }
    if candidate.flags.hidden {
        return Some(Exclusion::SceneHidden);
    }
    if config.ignore_undetected_blockers
        && visibility.visibility(perspective, candidate) == Visibility::Undetected
    {
        return Some(Exclusion::Undetected);
    }
    if config.ignore_dead_blockers && candidate.is_dead() {
        return Some(Exclusion::Dead);
    }
    if candidate.flags.prone && !config.allow_prone_blockers {
        return Some(Exclusion::Prone);
    }
    if config.ignore_ally_blockers && candidate.flags.alliance.is_allied_with(attacker.flags.alliance) {
        return Some(Exclusion::Ally);
    }
    None
}

/// Entity whose view decides the undetected check
///
/// A named observer that is no longer on the scene falls back to the attacker.
fn perspective_entity<'a>(
    attacker: &'a Entity,
    target: &'a Entity,
    scene: &'a [Entity],
    perspective: VisibilityPerspective,
) -> &'a Entity {
    match perspective {
        VisibilityPerspective::Attacker => attacker,
        VisibilityPerspective::Target => target,
        VisibilityPerspective::Observer(id) => {
            scene.iter().find(|e| e.id == id).unwrap_or(attacker)
        }
    }
}

/// Filter `scene` down to the entities that may grant cover to `target`
pub fn eligible_blockers<'a>(
    attacker: &Entity,
    target: &Entity,
    scene: &'a [Entity],
    visibility: &dyn VisibilityProvider,
    config: &BlockerFilterConfig,
) -> Vec<&'a Entity> {
    let perspective = perspective_entity(attacker, target, scene, config.visibility_perspective);
    scene
        .iter()
        .filter(|candidate| {
            match exclusion_reason(attacker, target, candidate, perspective, visibility, config) {
                Some(reason) => {
                    tracing::trace!(blocker = %candidate.id, ?reason, "blocker excluded");
                    false
                }
                None => true,
            }
        })
        .collect()
}
