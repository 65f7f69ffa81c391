//! Grouped, weighted progress manager (spec §4.6, supplemented from
//! `original_source/app/src/import/worker.h`'s `Worker::Pg` and
//! `Qx::GroupedProgressManager`): six named groups each contribute a
//! weighted share of one aggregate percentage, so a long `ImageDownload`
//! pass doesn't make the bar crawl at the same rate as a quick
//! `PlaylistImport` pass.

use std::collections::BTreeMap;

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ProgressGroup {
    AddAppPreload,
    ImageDownload,
    ImageTransfer,
    IconTransfer,
    GameImport,
    PlaylistImport,
}

impl ProgressGroup {
    pub const ALL: [ProgressGroup; 6] = [
        ProgressGroup::AddAppPreload,
        ProgressGroup::ImageDownload,
        ProgressGroup::ImageTransfer,
        ProgressGroup::IconTransfer,
        ProgressGroup::GameImport,
        ProgressGroup::PlaylistImport,
    ];
}

#[derive(Clone, Copy, Debug, Default)]
struct GroupState {
    weight: u64,
    value: u64,
    maximum: u64,
}

/// Aggregates weighted percentages from the six named groups into one
/// absolute value/maximum pair (spec §8 "progress monotonicity").
#[derive(Default)]
pub struct GroupedProgressManager {
    groups: BTreeMap<ProgressGroup, GroupState>,
}

impl GroupedProgressManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Assigns `group`'s share of the aggregate and its own unit count,
    /// called once per group during `Prepare` once the worker knows how
    /// much work each group has.
    pub fn set_group(&mut self, group: ProgressGroup, weight: u64, maximum: u64) {
        self.groups.insert(
            group,
            GroupState {
                weight,
                value: 0,
                maximum,
            },
        );
    }

    pub fn advance(&mut self, group: ProgressGroup, delta: u64) {
        if let Some(state) = self.groups.get_mut(&group) {
            state.value = (state.value + delta).min(state.maximum);
        }
    }

    pub fn set_value(&mut self, group: ProgressGroup, value: u64) {
        if let Some(state) = self.groups.get_mut(&group) {
            state.value = value.min(state.maximum);
        }
    }

    /// Weighted sum scaled to a fixed-point absolute range, proportional to
    /// [`Self::maximum`] so that `value == maximum` exactly at completion.
    pub fn value(&self) -> u64 {
        self.groups
            .values()
            .map(|g| {
                if g.maximum == 0 {
                    g.weight
                } else {
                    (g.weight as u128 * g.value as u128 / g.maximum as u128) as u64
                }
            })
            .sum()
    }

    pub fn maximum(&self) -> u64 {
        self.groups.values().map(|g| g.weight).sum()
    }

    pub fn is_complete(&self) -> bool {
        self.groups.values().all(|g| g.value >= g.maximum)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn value_reaches_maximum_once_every_group_completes() {
        let mut pg = GroupedProgressManager::new();
        pg.set_group(ProgressGroup::GameImport, 70, 10);
        pg.set_group(ProgressGroup::PlaylistImport, 30, 5);

        assert_eq!(pg.maximum(), 100);
        pg.advance(ProgressGroup::GameImport, 10);
        pg.advance(ProgressGroup::PlaylistImport, 5);

        assert_eq!(pg.value(), pg.maximum());
        assert!(pg.is_complete());
    }

    #[test]
    fn value_is_nondecreasing_as_groups_advance() {
        let mut pg = GroupedProgressManager::new();
        pg.set_group(ProgressGroup::GameImport, 100, 4);

        let mut last = 0;
        for _ in 0..4 {
            pg.advance(ProgressGroup::GameImport, 1);
            let now = pg.value();
            assert!(now >= last);
            last = now;
        }
    }
}
