use std::sync::{Arc, Mutex, MutexGuard};

use crate::kubernetes::model::Workload;

/// Number of physical slots on the device, eight per channel.
pub const SLOT_COUNT: usize = 16;

pub type SharedRegistry = Arc<Mutex<SlotRegistry>>;

/// Slots hold plain data, a panic elsewhere can not leave them half updated.
pub fn lock(registry: &Mutex<SlotRegistry>) -> MutexGuard<'_, SlotRegistry> {
    registry.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
#[error("slot index {0} is out of range 0..{}", SLOT_COUNT)]
pub struct RegistryError(pub usize);

/// Fixed table mapping a physical slot to the workload shown on it.
#[derive(Debug, Default)]
pub struct SlotRegistry {
    slots: [Option<Workload>; SLOT_COUNT],
}

impl SlotRegistry {
    pub fn new() -> SlotRegistry {
        SlotRegistry::default()
    }

    pub fn find_by_name(&self, name: &str) -> Option<usize> {
        self.slots
            .iter()
            .position(|slot| slot.as_ref().map_or(false, |w| w.name == name))
    }

    /// The labelled slot if the workload asks for one, else the first empty slot.
    /// `None` means there is no capacity left for it.
    pub fn find_free_or_by_label(&self, workload: &Workload) -> Option<usize> {
        match workload.index {
            Some(index) if index < SLOT_COUNT => Some(index),
            Some(index) => {
                tracing::warn!(workload = %workload.name, index, "index label outside of the device");
                None
            }
            None => self.slots.iter().position(Option::is_none),
        }
    }

    /// Puts `workload` into slot `index` and returns whatever occupied it before.
    pub fn assign(&mut self, index: usize, workload: Workload) -> Result<Option<Workload>, RegistryError> {
        self.slots
            .get_mut(index)
            .map(|slot| slot.replace(workload))
            .ok_or(RegistryError(index))
    }

    pub fn clear(&mut self, index: usize) -> Result<Option<Workload>, RegistryError> {
        self.slots
            .get_mut(index)
            .map(Option::take)
            .ok_or(RegistryError(index))
    }

    /// Empties every slot, returning the indices which were occupied.
    pub fn clear_all(&mut self) -> Vec<usize> {
        self.slots
            .iter_mut()
            .enumerate()
            .filter_map(|(index, slot)| slot.take().map(|_| index))
            .collect()
    }

    pub fn occupant(&self, index: usize) -> Option<&Workload> {
        self.slots.get(index).and_then(Option::as_ref)
    }

    pub fn occupied(&self) -> impl Iterator<Item = (usize, &Workload)> {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(index, slot)| slot.as_ref().map(|w| (index, w)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn workload(name: &str, index: Option<usize>) -> Workload {
        Workload {
            name: name.into(),
            replicas: 1,
            enabled: true,
            index,
        }
    }

    #[test]
    fn assign_then_occupant() {
        let mut registry = SlotRegistry::new();
        for i in 0..SLOT_COUNT {
            let w = workload(&format!("w{i}"), None);
            assert_eq!(registry.assign(i, w.clone()), Ok(None));
            assert_eq!(registry.occupant(i), Some(&w));
        }
    }

    #[test]
    fn clear_then_empty() {
        let mut registry = SlotRegistry::new();
        registry.assign(5, workload("api", None)).unwrap();
        assert_eq!(registry.clear(5).unwrap().map(|w| w.name), Some("api".to_string()));
        assert_eq!(registry.occupant(5), None);
        assert_eq!(registry.clear(5), Ok(None));
    }

    #[test]
    fn out_of_range_is_an_error() {
        let mut registry = SlotRegistry::new();
        assert_eq!(registry.assign(16, workload("x", None)), Err(RegistryError(16)));
        assert_eq!(registry.clear(99), Err(RegistryError(99)));
        assert_eq!(registry.occupant(16), None);
    }

    #[test]
    fn finds_by_name() {
        let mut registry = SlotRegistry::new();
        registry.assign(7, workload("api", None)).unwrap();
        assert_eq!(registry.find_by_name("api"), Some(7));
        assert_eq!(registry.find_by_name("web"), None);
    }

    #[test]
    fn label_wins_over_first_free() {
        let registry = SlotRegistry::new();
        assert_eq!(registry.find_free_or_by_label(&workload("a", Some(3))), Some(3));
        assert_eq!(registry.find_free_or_by_label(&workload("a", None)), Some(0));
        assert_eq!(registry.find_free_or_by_label(&workload("a", Some(16))), None);
    }

    #[test]
    fn first_free_scans_upward() {
        let mut registry = SlotRegistry::new();
        registry.assign(0, workload("a", None)).unwrap();
        registry.assign(1, workload("b", None)).unwrap();
        registry.assign(3, workload("c", None)).unwrap();
        assert_eq!(registry.find_free_or_by_label(&workload("d", None)), Some(2));
    }

    #[test]
    fn full_registry_has_no_capacity() {
        let mut registry = SlotRegistry::new();
        for i in 0..SLOT_COUNT {
            registry.assign(i, workload(&format!("w{i}"), None)).unwrap();
        }
        assert_eq!(registry.find_free_or_by_label(&workload("late", None)), None);
    }

    #[test]
    fn clear_all_reports_occupied() {
        let mut registry = SlotRegistry::new();
        registry.assign(2, workload("a", None)).unwrap();
        registry.assign(11, workload("b", None)).unwrap();
        assert_eq!(registry.clear_all(), vec![2, 11]);
        assert_eq!(registry.occupied().count(), 0);
    }
}
