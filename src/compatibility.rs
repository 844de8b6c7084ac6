//! Static compatibility between audio problem categories and the image damage
//! states and complaint component classes that may appear on the same car.
//!
//! The tables are keyed `generic_problem -> detailed_problem -> allowed`.
//! Categories outside the tables resolve through [`CompatibilityRule`].

use indexmap::IndexMap;
use once_cell::sync::Lazy;

pub const NO_DAMAGE: &str = "no_damage";

/// Placeholder damage state used by the fallback rules. No image in the raw
/// pool carries it, so drawing it always results in a skipped image.
pub const GENERIC_DAMAGED: &str = "damaged";

/// Fallback image states for combined and unmapped audio categories.
pub const FALLBACK_IMAGES: &[&str] = &[NO_DAMAGE, GENERIC_DAMAGED];

/// Complaint classes for combined power-steering recordings.
pub const COMBINED_COMPLAINTS: &[&str] = &["ENGINE", "POWER TRAIN", "ELECTRICAL SYSTEM", "STEERING"];

/// Complaint class for audio categories the tables do not know.
pub const UNMAPPED_COMPLAINTS: &[&str] = &["UNKNOWN"];

pub static COMPATIBILITY: Lazy<CompatibilityTable> = Lazy::new(CompatibilityTable::builtin);

/// Every damage combination present in the damage-detection image pool.
pub const DAMAGE_COMBINATIONS: &[&str] = &[
    "lost_parts;dented;torn;paint_scratches",
    "lost_parts;torn;paint_scratches",
    "lost_parts;torn",
    "torn;paint_scratches",
    "broken_glass;lost_parts;dented;torn",
    "broken_glass;lost_parts;paint_scratches;torn",
    "lost_parts;puncture;paint_scratches;torn;broken_glass",
    "lost_parts;dented",
    "torn",
    "broken_glass;lost_parts",
    "lost_parts",
    "broken_glass",
    "puncture;paint_scratches",
    "dented;puncture;paint_scratches",
    "broken_lamp",
    "paint_scratches;broken_lamp",
    "puncture;broken_lamp",
    "broken_glass;dented;paint_scratches",
    "broken_glass;torn",
    "broken_glass;dented",
    "broken_glass;paint_scratches",
    "dented;puncture;paint_scratches;torn",
    "puncture;torn",
    "dented;puncture",
    "torn;puncture;paint_scratches",
    "lost_parts;paint_scratches",
    "dented",
    "torn;broken_lamp",
    "paint_scratches",
    "dented;broken_lamp",
    "dented;paint_scratches",
    "dented;torn;paint_scratches",
    "dented;paint_scratches;torn",
    "dented;torn",
    "paint_scratches;torn",
    "puncture",
    "lost_parts;puncture;paint_scratches",
    "puncture;paint_scratches;torn",
    "lost_parts;puncture",
    "lost_parts;dented;puncture;paint_scratches",
    "lost_parts;dented;paint_scratches;puncture",
    "lost_parts;paint_scratches;broken_lamp",
    "dented;torn;broken_lamp",
    "dented;paint_scratches;broken_lamp",
    "lost_parts;dented;torn",
    "lost_parts;dented;paint_scratches",
    "broken_glass;lost_parts;torn;paint_scratches",
    "lost_parts;paint_scratches;torn",
    "broken_glass;lost_parts;dented;broken_lamp",
    "dented;puncture;paint_scratches;broken_glass;broken_lamp",
    "broken_glass;dented;broken_lamp",
    "broken_glass;dented;puncture",
    "dented;puncture;paint_scratches;torn;broken_lamp",
    "paint_scratches;puncture;torn",
    "lost_parts;puncture;torn;paint_scratches",
    "dented;puncture;torn",
    "puncture;torn;paint_scratches",
    "broken_glass;lost_parts;paint_scratches",
    "lost_parts;broken_lamp",
    "broken_glass;dented;torn;broken_lamp",
    "puncture;paint_scratches;broken_lamp",
    "puncture;paint_scratches;torn;broken_lamp",
    "lost_parts;dented;puncture;paint_scratches;torn;broken_lamp",
    "broken_glass;torn;paint_scratches",
    "broken_glass;lost_parts;torn",
    "broken_glass;paint_scratches;torn",
    "paint_scratches;puncture",
    "dented;puncture;paint_scratches;broken_lamp",
    "dented;paint_scratches;puncture;torn",
    "torn;paint_scratches;broken_lamp",
    "paint_scratches;torn;broken_lamp",
    "lost_parts;dented;puncture",
    "dented;torn;paint_scratches;broken_lamp",
    "dented;paint_scratches;torn;broken_lamp",
    "lost_parts;dented;puncture;paint_scratches;torn",
    "dented;paint_scratches;puncture",
    "puncture;dented;torn;paint_scratches",
    "dented;torn;puncture;paint_scratches",
    "broken_glass;lost_parts;dented",
    "broken_glass;puncture",
    "lost_parts;dented;torn;paint_scratches;broken_lamp",
    "lost_parts;dented;paint_scratches;torn;broken_lamp",
    "broken_glass;puncture;paint_scratches",
    "puncture;torn;broken_lamp",
    "dented;puncture;torn;paint_scratches;broken_lamp",
    "broken_glass;dented;torn",
    "broken_glass;dented;torn;paint_scratches",
    "lost_parts;dented;puncture;torn;paint_scratches;broken_lamp",
    "lost_parts;dented;paint_scratches;broken_glass;broken_lamp",
    "lost_parts;dented;torn;paint_scratches;broken_glass",
    "lost_parts;dented;torn;broken_glass;broken_lamp",
    "broken_glass;lost_parts;dented;paint_scratches",
    "lost_parts;torn;paint_scratches;broken_lamp",
    "lost_parts;torn;broken_lamp",
    "lost_parts;dented;paint_scratches;broken_lamp",
    "lost_parts;dented;broken_lamp",
    "lost_parts;dented;puncture;torn;paint_scratches",
    "lost_parts;dented;paint_scratches;torn",
    "lost_parts;dented;torn;broken_lamp",
    "lost_parts;puncture;torn;broken_lamp",
    "torn;puncture",
    "paint_scratches;puncture;torn;broken_lamp",
    "lost_parts;dented;paint_scratches;torn;broken_glass",
    "lost_parts;paint_scratches;puncture;torn",
    "lost_parts;paint_scratches;torn;broken_lamp",
    "lost_parts;dented;torn;puncture",
    "lost_parts;torn;puncture;paint_scratches",
    "lost_parts;puncture;torn",
    "lost_parts;puncture;paint_scratches;torn",
    "dented;puncture;paint_scratches;torn;broken_glass",
    "lost_parts;puncture;broken_lamp",
    "dented;paint_scratches;puncture;broken_lamp",
    "dented;puncture;broken_lamp",
    "paint_scratches;torn;puncture;broken_lamp",
    "dented;torn;paint_scratches;broken_glass;broken_lamp",
    "dented;puncture;torn;broken_lamp",
    "dented;paint_scratches;torn;broken_glass;broken_lamp",
    "lost_parts;puncture;paint_scratches;torn;broken_lamp",
    "dented;torn;puncture;broken_lamp",
    "lost_parts;dented;puncture;torn",
    "lost_parts;paint_scratches;puncture;broken_lamp",
    "lost_parts;dented;puncture;torn;broken_lamp",
    "lost_parts;torn;puncture;broken_lamp",
    "dented;torn;puncture",
    "broken_glass;dented;paint_scratches;torn",
    "torn;puncture;broken_lamp",
    "lost_parts;dented;puncture;paint_scratches;torn;broken_glass",
    "puncture;torn;paint_scratches;broken_lamp",
    "lost_parts;paint_scratches;puncture",
    "dented;puncture;torn;broken_glass;broken_lamp",
    "broken_glass;broken_lamp",
    "lost_parts;dented;puncture;paint_scratches;broken_glass",
    "lost_parts;puncture;torn;paint_scratches;broken_lamp",
    "broken_glass;paint_scratches;puncture;torn",
    "broken_glass;torn;puncture;paint_scratches",
    "broken_glass;puncture;paint_scratches;torn",
    "broken_glass;torn;puncture;broken_lamp",
    "broken_glass;puncture;paint_scratches;broken_lamp",
    "broken_glass;paint_scratches;puncture",
    "broken_glass;dented;paint_scratches;broken_lamp",
    "broken_glass;torn;paint_scratches;broken_lamp",
    "dented;puncture;paint_scratches;torn;broken_glass;broken_lamp",
];

const STARTUP_COMPONENTS: &[&str] = &[
    "AIR BAGS",
    "BACK OVER PREVENTION",
    "ELECTRICAL SYSTEM",
    "EQUIPMENT",
    "EXTERIOR LIGHTING",
    "FORWARD COLLISION AVOIDANCE",
    "FUEL SYSTEM",
    "FUEL/PROPULSION SYSTEM",
    "LANE DEPARTURE",
    "LATCHES/LOCKS/LINKAGES",
    "POWER TRAIN",
    "SEAT BELTS",
    "SEATS",
    "SERVICE BRAKES",
    "STEERING",
    "STRUCTURE",
    "SUSPENSION",
    "TIRES",
    "VEHICLE SPEED CONTROL",
    "VISIBILITY",
    "VISIBILITY/WIPER",
    "WHEELS",
];

const ALL_COMPONENTS: &[&str] = &[
    "AIR BAGS",
    "BACK OVER PREVENTION",
    "ELECTRICAL SYSTEM",
    "ENGINE",
    "ENGINE AND ENGINE COOLING",
    "EQUIPMENT",
    "EXTERIOR LIGHTING",
    "FORWARD COLLISION AVOIDANCE",
    "FUEL SYSTEM",
    "FUEL/PROPULSION SYSTEM",
    "LANE DEPARTURE",
    "LATCHES/LOCKS/LINKAGES",
    "POWER TRAIN",
    "SEAT BELTS",
    "SEATS",
    "SERVICE BRAKES",
    "STEERING",
    "STRUCTURE",
    "SUSPENSION",
    "TIRES",
    "VEHICLE SPEED CONTROL",
    "VISIBILITY",
    "VISIBILITY/WIPER",
    "WHEELS",
];

const OIL_AND_BELT_COMPONENTS: &[&str] = &[
    "ELECTRICAL SYSTEM",
    "ENGINE",
    "ENGINE AND ENGINE COOLING",
    "FUEL SYSTEM",
    "FUEL/PROPULSION SYSTEM",
    "POWER TRAIN",
    "SERVICE BRAKES",
    "STEERING",
    "STRUCTURE",
    "SUSPENSION",
    "TIRES",
];

const BELT_COMPONENTS: &[&str] = &[
    "ELECTRICAL SYSTEM",
    "ENGINE",
    "ENGINE AND ENGINE COOLING",
    "EXTERIOR LIGHTING",
    "FORWARD COLLISION AVOIDANCE",
    "FUEL SYSTEM",
    "FUEL/PROPULSION SYSTEM",
    "LANE DEPARTURE",
    "LATCHES/LOCKS/LINKAGES",
    "POWER TRAIN",
    "SEAT BELTS",
    "SEATS",
    "SERVICE BRAKES",
    "STEERING",
    "STRUCTURE",
    "SUSPENSION",
    "VEHICLE SPEED CONTROL",
];

const POWER_STEERING_NO_OIL_COMPONENTS: &[&str] = &[
    "ELECTRICAL SYSTEM",
    "ENGINE",
    "ENGINE AND ENGINE COOLING",
    "EQUIPMENT",
    "EXTERIOR LIGHTING",
    "FORWARD COLLISION AVOIDANCE",
    "FUEL SYSTEM",
    "FUEL/PROPULSION SYSTEM",
    "LANE DEPARTURE",
    "LATCHES/LOCKS/LINKAGES",
    "POWER TRAIN",
    "SEAT BELTS",
    "SEATS",
    "SERVICE BRAKES",
    "STEERING",
    "STRUCTURE",
    "SUSPENSION",
    "VEHICLE SPEED CONTROL",
];

const WORN_BRAKES_COMPONENTS: &[&str] = &[
    "SERVICE BRAKES",
    "STEERING",
    "STRUCTURE",
    "SUSPENSION",
    "TIRES",
    "VEHICLE SPEED CONTROL",
    "VISIBILITY",
    "VISIBILITY/WIPER",
    "WHEELS",
];

/// Which images an audio category tolerates on the same car.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ImageAllowance {
    /// The recording implies an intact body.
    NoDamageOnly,
    /// Any damage state, including none.
    AnyState,
}

// (generic, detailed, images, complaints)
const BUILTIN_ENTRIES: &[(&str, &str, ImageAllowance, &[&str])] = &[
    (
        "startup state",
        "normal_engine_startup",
        ImageAllowance::NoDamageOnly,
        STARTUP_COMPONENTS,
    ),
    (
        "startup state",
        "bad_ignition",
        ImageAllowance::AnyState,
        &["ENGINE", "ELECTRICAL SYSTEM", "FUEL SYSTEM"],
    ),
    (
        "startup state",
        "dead_battery",
        ImageAllowance::NoDamageOnly,
        &["ELECTRICAL SYSTEM"],
    ),
    (
        "idle state",
        "normal_engine_idle",
        ImageAllowance::AnyState,
        ALL_COMPONENTS,
    ),
    (
        "idle state",
        "no oil_serpentine belt",
        ImageAllowance::AnyState,
        OIL_AND_BELT_COMPONENTS,
    ),
    (
        "idle state",
        "power_steering",
        ImageAllowance::AnyState,
        ALL_COMPONENTS,
    ),
    (
        "idle state",
        "serpentine_belt",
        ImageAllowance::AnyState,
        BELT_COMPONENTS,
    ),
    (
        "idle state",
        "power steering combined_no oil",
        ImageAllowance::AnyState,
        POWER_STEERING_NO_OIL_COMPONENTS,
    ),
    (
        "idle state",
        "power steering combined_serpentine belt",
        ImageAllowance::AnyState,
        BELT_COMPONENTS,
    ),
    (
        "idle state",
        "power steering combined_no oil_serpentine belt",
        ImageAllowance::AnyState,
        BELT_COMPONENTS,
    ),
    (
        "braking state",
        "normal_brakes",
        ImageAllowance::NoDamageOnly,
        ALL_COMPONENTS,
    ),
    (
        "braking state",
        "worn_out_brakes",
        ImageAllowance::AnyState,
        WORN_BRAKES_COMPONENTS,
    ),
];

/// How an audio category resolves against the tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompatibilityRule {
    /// Listed in the tables.
    Mapped,
    /// A combined recording (power steering plus another fault). The generic
    /// combined fallback applies even when the exact category is listed.
    Combined,
    /// Not listed anywhere.
    Unmapped,
}

type CategoryMap = IndexMap<&'static str, IndexMap<&'static str, Vec<&'static str>>>;

#[derive(Debug, Clone)]
pub struct CompatibilityTable {
    images: CategoryMap,
    complaints: CategoryMap,
}

impl CompatibilityTable {
    pub fn builtin() -> Self {
        let any_state: Vec<&'static str> = std::iter::once(NO_DAMAGE)
            .chain(DAMAGE_COMBINATIONS.iter().copied())
            .collect();

        let mut images: CategoryMap = IndexMap::new();
        let mut complaints: CategoryMap = IndexMap::new();
        for (generic, detailed, allowance, components) in BUILTIN_ENTRIES {
            let allowed_images = match allowance {
                ImageAllowance::NoDamageOnly => vec![NO_DAMAGE],
                ImageAllowance::AnyState => any_state.clone(),
            };
            images
                .entry(*generic)
                .or_default()
                .insert(*detailed, allowed_images);
            complaints
                .entry(*generic)
                .or_default()
                .insert(*detailed, components.to_vec());
        }

        Self { images, complaints }
    }

    pub fn is_combined(detailed_problem: &str) -> bool {
        detailed_problem.starts_with("power steering")
            || detailed_problem.to_lowercase().contains("combined")
    }

    pub fn rule(&self, generic_problem: &str, detailed_problem: &str) -> CompatibilityRule {
        if Self::is_combined(detailed_problem) {
            CompatibilityRule::Combined
        } else if Self::lookup(&self.images, generic_problem, detailed_problem).is_some() {
            CompatibilityRule::Mapped
        } else {
            CompatibilityRule::Unmapped
        }
    }

    /// Damage states an image may carry when it shares a car with audio of
    /// the given category.
    pub fn allowed_images(&self, generic_problem: &str, detailed_problem: &str) -> &[&'static str] {
        match self.rule(generic_problem, detailed_problem) {
            CompatibilityRule::Mapped => {
                Self::lookup(&self.images, generic_problem, detailed_problem)
                    .unwrap_or(FALLBACK_IMAGES)
            }
            CompatibilityRule::Combined | CompatibilityRule::Unmapped => FALLBACK_IMAGES,
        }
    }

    /// Component classes a complaint may carry when it shares a car with audio
    /// of the given category.
    pub fn allowed_complaints(
        &self,
        generic_problem: &str,
        detailed_problem: &str,
    ) -> &[&'static str] {
        match self.rule(generic_problem, detailed_problem) {
            CompatibilityRule::Mapped => {
                Self::lookup(&self.complaints, generic_problem, detailed_problem)
                    .unwrap_or(UNMAPPED_COMPLAINTS)
            }
            CompatibilityRule::Combined => COMBINED_COMPLAINTS,
            CompatibilityRule::Unmapped => UNMAPPED_COMPLAINTS,
        }
    }

    pub fn allows_image(&self, generic_problem: &str, detailed_problem: &str, status: &str) -> bool {
        self.allowed_images(generic_problem, detailed_problem)
            .contains(&status)
    }

    pub fn allows_complaint(
        &self,
        generic_problem: &str,
        detailed_problem: &str,
        component_class: &str,
    ) -> bool {
        self.allowed_complaints(generic_problem, detailed_problem)
            .contains(&component_class)
    }

    fn lookup<'a>(
        map: &'a CategoryMap,
        generic_problem: &str,
        detailed_problem: &str,
    ) -> Option<&'a [&'static str]> {
        map.get(generic_problem)
            .and_then(|inner| inner.get(detailed_problem))
            .map(|allowed| allowed.as_slice())
    }
}

impl Default for CompatibilityTable {
    fn default() -> Self {
        Self::builtin()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dead_battery_only_allows_intact_cars() {
        let table = CompatibilityTable::builtin();
        assert_eq!(
            table.allowed_images("startup state", "dead_battery"),
            &[NO_DAMAGE]
        );
        assert_eq!(
            table.allowed_complaints("startup state", "dead_battery"),
            &["ELECTRICAL SYSTEM"]
        );
        assert_eq!(
            table.rule("startup state", "dead_battery"),
            CompatibilityRule::Mapped
        );
    }

    #[test]
    fn damage_tolerant_categories_accept_every_combination() {
        let table = CompatibilityTable::builtin();
        let allowed = table.allowed_images("startup state", "bad_ignition");
        assert_eq!(allowed.len(), DAMAGE_COMBINATIONS.len() + 1);
        assert!(table.allows_image("startup state", "bad_ignition", "torn"));
        assert!(table.allows_image("startup state", "bad_ignition", NO_DAMAGE));
        assert!(!table.allows_image("startup state", "dead_battery", "torn"));
    }

    #[test]
    fn combined_recordings_use_fallback_even_when_listed() {
        let table = CompatibilityTable::builtin();
        let generic = "idle state";
        let detailed = "power steering combined_no oil";
        assert_eq!(table.rule(generic, detailed), CompatibilityRule::Combined);
        assert_eq!(table.allowed_images(generic, detailed), FALLBACK_IMAGES);
        assert_eq!(table.allowed_complaints(generic, detailed), COMBINED_COMPLAINTS);
    }

    #[test]
    fn underscore_power_steering_is_not_combined() {
        let table = CompatibilityTable::builtin();
        assert_eq!(
            table.rule("idle state", "power_steering"),
            CompatibilityRule::Mapped
        );
    }

    #[test]
    fn unknown_categories_fall_back() {
        let table = CompatibilityTable::builtin();
        assert_eq!(
            table.rule("cruising state", "rattle"),
            CompatibilityRule::Unmapped
        );
        assert_eq!(table.allowed_images("cruising state", "rattle"), FALLBACK_IMAGES);
        assert_eq!(
            table.allowed_complaints("cruising state", "rattle"),
            UNMAPPED_COMPLAINTS
        );
    }

    #[test]
    fn damage_combinations_are_unique() {
        let unique: std::collections::HashSet<_> = DAMAGE_COMBINATIONS.iter().collect();
        assert_eq!(unique.len(), DAMAGE_COMBINATIONS.len());
        assert!(!DAMAGE_COMBINATIONS.contains(&NO_DAMAGE));
    }
}
