use serde::{Serialize, Deserialize};
use crate::label::Label;

/// Number of stem cells carrying each label.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabelCounts {
    pub virgin: u32,
    pub endoderm: u32,
    pub mesoderm: u32,
    pub ectoderm: u32,
}

impl LabelCounts {
    pub fn record(&mut self, label: Label) {
        match label {
            Label::Virgin => self.virgin += 1,
            Label::Endoderm => self.endoderm += 1,
            Label::Mesoderm => self.mesoderm += 1,
            Label::Ectoderm => self.ectoderm += 1,
        }
    }

    pub fn total(&self) -> u32 {
        self.virgin + self.endoderm + self.mesoderm + self.ectoderm
    }

    pub fn differentiated(&self) -> u32 {
        self.endoderm + self.mesoderm + self.ectoderm
    }
}

/// A summary of the population at the end of a tick.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Snapshot {
    /// Tick number the snapshot was taken after.
    pub tick: u32,
    pub stem_cells: LabelCounts,
    pub factor_a_total: u32,
    pub factor_a_active: u32,
    pub factor_a_immobilized: u32,
    pub factor_b_total: u32,
    pub factor_b_absorbed: u32,
    /// Stem cell centroid; `None` when there are no stem cells.
    pub centroid: Option<(f64, f64)>,
    /// Mean distance of stem cells to the centroid.
    pub mean_radius: Option<f64>,
    /// Undirected touching pairs in this tick's contact graph.
    pub contact_edges: u32,
    pub cascade_enabled: bool,
    /// Label of the stem cell chosen for tracking at setup.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tracked_label: Option<Label>,
    /// Exposure counter of a randomly sampled stem cell this tick.
    pub sampled_exposure: u32,
    /// Sum of interior field values (boundary ring excluded).
    pub interior_mass: f64,
}
