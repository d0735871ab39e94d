//! Geometric cover resolution for one attacker -> target pair
//!
//! Draws the segment between the two centers and checks it against every
//! eligible blocker's footprint. Any blocker on the line grants lesser cover;
//! a blocker at least two size classes larger than the attacker grants
//! standard cover. Blockers never stack past standard, and the resolver never
//! yields greater cover (that is only ever declared explicitly).

use crate::core::config::CoverConfig;
use crate::core::types::CoverSeverity;
use crate::cover::eligibility::eligible_blockers;
use crate::scene::{Entity, VisibilityProvider};
use crate::spatial::segment_intersects_rect;

/// Size-rank gap at which a single blocker grants standard cover
pub const OVERSIZED_RANK_GAP: i32 = 2;

/// What the scan along the line of attack found
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct BlockerScan {
    any: bool,
    oversized: bool,
}

impl BlockerScan {
    fn severity(self) -> CoverSeverity {
        if self.oversized {
            CoverSeverity::Standard
        } else if self.any {
            CoverSeverity::Lesser
        } else {
            CoverSeverity::None
        }
    }
}

/// Compute the cover `target` has against `attacker`
///
/// Pure and synchronous. Missing or malformed geometry resolves to
/// [`CoverSeverity::None`].
pub fn resolve_cover(
    attacker: &Entity,
    target: &Entity,
    scene: &[Entity],
    visibility: &dyn VisibilityProvider,
    config: &CoverConfig,
) -> CoverSeverity {
    let Some(scan) = scan_line(attacker, target, scene, visibility, config) else {
        tracing::debug!(attacker = %attacker.id, target = %target.id, "no usable geometry, no cover");
        return CoverSeverity::None;
    };
    let severity = scan.severity();
    tracing::trace!(attacker = %attacker.id, target = %target.id, %severity, "cover resolved");
    severity
}

fn scan_line(
    attacker: &Entity,
    target: &Entity,
    scene: &[Entity],
    visibility: &dyn VisibilityProvider,
    config: &CoverConfig,
) -> Option<BlockerScan> {
    let grid = config.grid_size;
    let from = attacker.center(grid)?;
    let to = target.center(grid)?;
    let attacker_rank = attacker.size_rank();

    let mut scan = BlockerScan::default();
    for blocker in eligible_blockers(attacker, target, scene, visibility, &config.blockers) {
        // A blocker with broken geometry simply cannot be on the line
        let Some(rect) = blocker.world_rect(grid) else {
            continue;
        };
        if !segment_intersects_rect(from, to, &rect) {
            continue;
        }
        scan.any = true;
        if blocker.size_rank() - attacker_rank >= OVERSIZED_RANK_GAP {
            scan.oversized = true;
            break;
        }
    }
    Some(scan)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::SizeClass;
    use crate::scene::VisibilityTable;
    use glam::Vec2;

    /// Grid of 20 world units keeps the numbers in these tests readable
    fn config() -> CoverConfig {
        CoverConfig {
            grid_size: 20.0,
            ..Default::default()
        }
    }

    /// One-square entity centred on `(x, y)`
    fn at(name: &str, x: f32, y: f32) -> Entity {
        Entity::creature(name, Vec2::new(x - 10.0, y - 10.0))
    }

    fn resolve(attacker: &Entity, target: &Entity, blockers: &[Entity]) -> CoverSeverity {
        let mut scene = vec![attacker.clone(), target.clone()];
        scene.extend_from_slice(blockers);
        resolve_cover(attacker, target, &scene, &VisibilityTable::new(), &config())
    }

    #[test]
    fn test_no_blockers_no_cover() {
        let attacker = at("Archer", 0.0, 0.0);
        let target = at("Orc", 300.0, 0.0);
        assert_eq!(resolve(&attacker, &target, &[]), CoverSeverity::None);
    }

    #[test]
    fn test_blocker_off_the_line_no_cover() {
        let attacker = at("Archer", 0.0, 0.0);
        let target = at("Orc", 300.0, 0.0);
        let bystander = at("Bystander", 150.0, 100.0);
        assert_eq!(resolve(&attacker, &target, &[bystander]), CoverSeverity::None);
    }

    #[test]
    fn test_same_size_blocker_lesser_cover() {
        let attacker = at("Archer", 0.0, 0.0);
        let target = at("Orc", 300.0, 0.0);
        let blocker = at("Goblin", 150.0, 0.0);
        assert_eq!(resolve(&attacker, &target, &[blocker]), CoverSeverity::Lesser);
    }

    #[test]
    fn test_one_size_larger_still_lesser() {
        let attacker = at("Archer", 0.0, 0.0);
        let target = at("Orc", 300.0, 0.0);
        let ogre = at("Ogre", 150.0, 0.0).with_size(SizeClass::Large);
        assert_eq!(resolve(&attacker, &target, &[ogre]), CoverSeverity::Lesser);
    }

    #[test]
    fn test_two_sizes_larger_standard_cover() {
        let attacker = at("Archer", 0.0, 0.0);
        let target = at("Orc", 300.0, 0.0);
        let giant = at("Giant", 150.0, 0.0).with_size(SizeClass::Huge);
        assert_eq!(resolve(&attacker, &target, &[giant]), CoverSeverity::Standard);
    }

    #[test]
    fn test_threshold_relative_to_attacker_size() {
        let attacker = at("Ogre Archer", 0.0, 0.0).with_size(SizeClass::Large);
        let target = at("Orc", 300.0, 0.0);
        let huge = at("Giant", 150.0, 0.0).with_size(SizeClass::Huge);
        assert_eq!(resolve(&attacker, &target, &[huge.clone()]), CoverSeverity::Lesser);

        let tiny_attacker = at("Pixie", 0.0, 0.0).with_size(SizeClass::Tiny);
        let medium = at("Guard", 150.0, 0.0);
        assert_eq!(resolve(&tiny_attacker, &target, &[medium]), CoverSeverity::Standard);
    }

    #[test]
    fn test_smaller_blocker_only_lesser() {
        let attacker = at("Archer", 0.0, 0.0);
        let target = at("Orc", 300.0, 0.0);
        let rat = at("Rat", 150.0, 0.0).with_size(SizeClass::Tiny);
        assert_eq!(resolve(&attacker, &target, &[rat]), CoverSeverity::Lesser);
    }

    #[test]
    fn test_many_blockers_do_not_stack_past_standard() {
        let attacker = at("Archer", 0.0, 0.0);
        let target = at("Orc", 300.0, 0.0);
        let giant = at("Giant", 100.0, 0.0).with_size(SizeClass::Huge);
        let goblins: Vec<Entity> = (0..4)
            .map(|i| at("Goblin", 150.0 + 25.0 * i as f32, 0.0))
            .collect();
        let mut blockers = vec![giant];
        blockers.extend(goblins.clone());
        assert_eq!(resolve(&attacker, &target, &blockers), CoverSeverity::Standard);

        // Scan order is irrelevant
        blockers.reverse();
        assert_eq!(resolve(&attacker, &target, &blockers), CoverSeverity::Standard);

        // Many lesser blockers still only add up to lesser
        assert_eq!(resolve(&attacker, &target, &goblins), CoverSeverity::Lesser);
    }

    #[test]
    fn test_unknown_attacker_size_counts_as_medium() {
        let mut attacker = at("Shapechanger", 0.0, 0.0);
        attacker.size = None;
        let target = at("Orc", 300.0, 0.0);
        let giant = at("Giant", 150.0, 0.0).with_size(SizeClass::Huge);
        assert_eq!(resolve(&attacker, &target, &[giant]), CoverSeverity::Standard);
    }

    #[test]
    fn test_missing_geometry_degrades_to_none() {
        let mut attacker = at("Archer", 0.0, 0.0);
        attacker.position = Vec2::new(f32::NAN, 0.0);
        let target = at("Orc", 300.0, 0.0);
        let giant = at("Giant", 150.0, 0.0).with_size(SizeClass::Huge);
        assert_eq!(resolve(&attacker, &target, &[giant]), CoverSeverity::None);
    }

    #[test]
    fn test_broken_blocker_geometry_skipped() {
        let attacker = at("Archer", 0.0, 0.0);
        let target = at("Orc", 300.0, 0.0);
        let mut broken = at("Glitch", 150.0, 0.0).with_size(SizeClass::Huge);
        broken.width = f32::INFINITY;
        let goblin = at("Goblin", 200.0, 0.0);
        assert_eq!(resolve(&attacker, &target, &[broken, goblin]), CoverSeverity::Lesser);
    }

    #[test]
    fn test_ineligible_giant_grants_nothing() {
        let attacker = at("Archer", 0.0, 0.0);
        let target = at("Orc", 300.0, 0.0);
        let mut giant = at("Sleeping Giant", 150.0, 0.0).with_size(SizeClass::Huge);
        giant.flags.prone = true;
        assert_eq!(resolve(&attacker, &target, &[giant]), CoverSeverity::None);
    }
}
