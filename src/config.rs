//! Per-session editing knobs

use crate::float_types::{Real, set_tolerance, tolerance};
use serde::{Deserialize, Serialize};
use tracing::warn;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DesignerConfig {
    /// Coincidence epsilon; installed process-wide by [`DesignerConfig::apply`]
    pub tolerance: Real,
    /// Ray distance within which vertices and edges are picked
    pub pick_radius: Real,
    /// Cap on bevel spread back-off halvings
    pub max_backoff_iterations: usize,
    pub max_subdivisions: usize,
    /// Model units of bevel width per pixel of drag
    pub bevel_drag_scale: Real,
    /// Pixels of drag per extra bevel subdivision
    pub subdivision_drag_pixels: Real,
    /// Auto-smooth threshold in degrees
    pub smoothing_angle: Real,
    pub remove_doubles_distance: Real,
}

impl Default for DesignerConfig {
    fn default() -> Self {
        DesignerConfig {
            tolerance: tolerance(),
            pick_radius: 0.05,
            max_backoff_iterations: 100,
            max_subdivisions: 16,
            bevel_drag_scale: 0.01,
            subdivision_drag_pixels: 20.0,
            smoothing_angle: 30.0,
            remove_doubles_distance: 0.01,
        }
    }
}

impl DesignerConfig {
    pub fn from_json(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }

    /// Install the tolerance. Returns `false` when a different tolerance was
    /// already fixed earlier in the process.
    pub fn apply(&self) -> bool {
        if set_tolerance(self.tolerance) {
            return true;
        }
        let current = tolerance();
        if current != self.tolerance {
            warn!(requested = self.tolerance, current, "tolerance already fixed");
            return false;
        }
        true
    }
}
