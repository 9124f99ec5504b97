/// Detection class table.
///
/// Maps the numeric class IDs emitted by the animal-detection model to the
/// display names used everywhere else (filter, history, status poll).
/// Only the IDs in `TARGET_CLASS_IDS` are ever requested from the engine.

use serde::Serialize;

/// One recognised target category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct DetectionClass {
    pub id: u32,
    pub name: &'static str,
}

/// Static class table of the bundled animal model.
pub const CLASS_NAMES: &[DetectionClass] = &[
    DetectionClass { id: 21, name: "lion" },
    DetectionClass { id: 20, name: "leopard" },
    DetectionClass { id: 40, name: "tiger" },
    DetectionClass { id: 7,  name: "elephant" },
    DetectionClass { id: 17, name: "hyena" },
    DetectionClass { id: 2,  name: "cheetah" },
    DetectionClass { id: 1,  name: "bear" },
    DetectionClass { id: 15, name: "horse" },
];

/// Class IDs requested from the engine when the filter is `all`.
pub const TARGET_CLASS_IDS: &[u32] = &[21, 20, 40, 7, 17, 2, 1, 15];

/// Immutable lookup over a class table plus its targetable subset.
#[derive(Debug, Clone)]
pub struct ClassTable {
    classes: Vec<DetectionClass>,
    targets: Vec<u32>,
}

impl Default for ClassTable {
    fn default() -> Self {
        Self::new(CLASS_NAMES.to_vec(), TARGET_CLASS_IDS.to_vec())
    }
}

impl ClassTable {
    pub fn new(classes: Vec<DetectionClass>, targets: Vec<u32>) -> Self {
        Self { classes, targets }
    }

    /// Resolve a model class ID to its display name.
    /// Unmapped IDs yield `None`.
    pub fn name_of(&self, id: u32) -> Option<&'static str> {
        self.classes.iter().find(|c| c.id == id).map(|c| c.name)
    }

    /// IDs whose display name equals `name`.
    pub fn ids_named(&self, name: &str) -> Vec<u32> {
        self.classes
            .iter()
            .filter(|c| c.name == name)
            .map(|c| c.id)
            .collect()
    }

    pub fn contains_name(&self, name: &str) -> bool {
        self.classes.iter().any(|c| c.name == name)
    }

    pub fn target_ids(&self) -> &[u32] {
        &self.targets
    }

    pub fn classes(&self) -> &[DetectionClass] {
        &self.classes
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_name_lookup() {
        let table = ClassTable::default();
        assert_eq!(table.name_of(21), Some("lion"));
        assert_eq!(table.name_of(40), Some("tiger"));
        assert_eq!(table.name_of(24), None);
    }

    #[test]
    fn test_ids_named() {
        let table = ClassTable::default();
        assert_eq!(table.ids_named("elephant"), vec![7]);
        assert!(table.ids_named("zebra").is_empty());
    }

    #[test]
    fn test_every_target_is_mapped() {
        let table = ClassTable::default();
        for id in table.target_ids() {
            assert!(table.name_of(*id).is_some(), "target {} has no name", id);
        }
    }
}
