//! Swapchain size tracking
//!
//! Pure state machine deciding what a resize event means for the surface,
//! kept separate from gpu_state so the resize rules are testable without a
//! device.

/// What the frame loop should do after observing a window size
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum SizeAction {
    /// Size unchanged; keep the current surface set
    Keep,
    /// Non-zero size change; replace the surface set at this size
    Recreate(u32, u32),
    /// Zero-area surface (minimized); stop rendering until a real size arrives
    Suspend,
}

#[derive(Debug)]
pub struct SurfaceSizeTracker {
    width: u32,
    height: u32,
    suspended: bool,
    recreations: u32,
}

impl SurfaceSizeTracker {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            suspended: false,
            recreations: 0,
        }
    }

    /// Feed an observed window size and get the required action.
    /// Exactly one `Recreate` is issued per distinct non-zero size change;
    /// leaving the suspended state always recreates, even at the old size,
    /// because the surface may have been lost while minimized.
    pub fn observe(&mut self, width: u32, height: u32) -> SizeAction {
        if width == 0 || height == 0 {
            self.suspended = true;
            return SizeAction::Suspend;
        }

        let resumed = std::mem::take(&mut self.suspended);
        if !resumed && width == self.width && height == self.height {
            return SizeAction::Keep;
        }

        self.width = width;
        self.height = height;
        self.recreations += 1;
        SizeAction::Recreate(width, height)
    }

    pub fn is_suspended(&self) -> bool {
        self.suspended
    }

    pub fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn recreation_count(&self) -> u32 {
        self.recreations
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn repeated_same_size_keeps_the_surface() {
        let mut tracker = SurfaceSizeTracker::new(800, 600);
        assert_eq!(tracker.observe(800, 600), SizeAction::Keep);
        assert_eq!(tracker.observe(800, 600), SizeAction::Keep);
        assert_eq!(tracker.recreation_count(), 0);
    }

    #[test]
    fn one_recreation_per_distinct_size() {
        let mut tracker = SurfaceSizeTracker::new(800, 600);
        assert_eq!(tracker.observe(1024, 768), SizeAction::Recreate(1024, 768));
        assert_eq!(tracker.observe(1024, 768), SizeAction::Keep);
        assert_eq!(tracker.observe(800, 600), SizeAction::Recreate(800, 600));
        assert_eq!(tracker.recreation_count(), 2);
    }

    #[test]
    fn zero_area_suspends_instead_of_recreating() {
        let mut tracker = SurfaceSizeTracker::new(800, 600);
        assert_eq!(tracker.observe(0, 600), SizeAction::Suspend);
        assert!(tracker.is_suspended());
        assert_eq!(tracker.observe(0, 0), SizeAction::Suspend);
        assert_eq!(tracker.recreation_count(), 0);
    }

    #[test]
    fn resume_recreates_even_at_the_previous_size() {
        let mut tracker = SurfaceSizeTracker::new(800, 600);
        tracker.observe(0, 0);
        assert_eq!(tracker.observe(800, 600), SizeAction::Recreate(800, 600));
        assert!(!tracker.is_suspended());
    }

    #[test]
    fn resize_storm_settles_to_one_set_per_final_size() {
        let mut tracker = SurfaceSizeTracker::new(800, 600);
        for w in [801, 850, 900, 1000, 1000, 1000] {
            tracker.observe(w, 600);
        }
        assert_eq!(tracker.recreation_count(), 4);
        assert_eq!(tracker.size(), (1000, 600));
    }
}
