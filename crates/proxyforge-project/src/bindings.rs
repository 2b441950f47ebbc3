//! Timelines that opted into proxy substitution.

use proxyforge_timeline::SharedTimeline;
use std::sync::Arc;
use tracing::debug;

#[derive(Debug, Default)]
pub struct TimelineBindings {
    timelines: Vec<SharedTimeline>,
}

impl TimelineBindings {
    pub fn new() -> Self {
        Self::default()
    }

    /// Opt `timeline` in or out. Returns false when nothing changed.
    ///
    /// Opting out leaves already substituted clips on their proxies.
    pub fn set(&mut self, timeline: &SharedTimeline, enabled: bool) -> bool {
        let bound = self.contains(timeline);
        match (enabled, bound) {
            (true, false) => {
                self.timelines.push(Arc::clone(timeline));
                true
            }
            (false, true) => {
                self.timelines.retain(|t| !Arc::ptr_eq(t, timeline));
                true
            }
            _ => false,
        }
    }

    pub fn contains(&self, timeline: &SharedTimeline) -> bool {
        self.timelines.iter().any(|t| Arc::ptr_eq(t, timeline))
    }

    pub fn len(&self) -> usize {
        self.timelines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.timelines.is_empty()
    }

    /// Rebind clips playing `parent_id` to `proxy_id` and commit each
    /// timeline. Returns the number of clips rebound.
    pub fn substitute(&self, parent_id: &str, proxy_id: &str) -> usize {
        let mut total = 0;
        for timeline in &self.timelines {
            let mut timeline = timeline.write();
            let changed = timeline.rebind_asset(parent_id, proxy_id);
            timeline.commit();
            if changed > 0 {
                debug!(timeline = %timeline.id, parent = %parent_id, proxy = %proxy_id, clips = changed, "Substituted proxy");
            }
            total += changed;
        }
        total
    }
}
