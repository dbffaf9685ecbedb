use stemcell_common::{distance, Label, Vec2};

/// Unique, monotonically increasing agent identifier.
pub type AgentId = u64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AgentKind {
    StemCell,
    FactorA,
    FactorB,
}

impl AgentKind {
    pub fn as_str(self) -> &'static str {
        match self {
            AgentKind::StemCell => "stem_cell",
            AgentKind::FactorA => "factor_a",
            AgentKind::FactorB => "factor_b",
        }
    }
}

/// Per-kind mutable state of a stem cell.
#[derive(Debug, Clone, PartialEq)]
pub struct StemCell {
    pub label: Label,
    /// Accumulated contacts with active factor A agents.
    pub exposure: u32,
    pub energy: u32,
    /// Ticks left before the differentiation check fires.
    pub diff_timer: u32,
}

impl StemCell {
    pub fn new(diff_timer: u32) -> Self {
        Self { label: Label::Virgin, exposure: 0, energy: 0, diff_timer }
    }
}

/// Intermittently mobile factor that can be switched off by factor B.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FactorA {
    pub immobilized: bool,
    pub immobilized_timer: u32,
    pub active: bool,
    pub inactive_timer: u32,
}

impl FactorA {
    pub fn new() -> Self {
        Self { active: true, ..Self::default() }
    }
}

/// Factor consumed on its first contact with a stem cell.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FactorB {
    pub absorbed: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Behavior {
    Stem(StemCell),
    FactorA(FactorA),
    FactorB(FactorB),
}

/// A mobile point agent with a fixed interaction radius.
#[derive(Debug, Clone, PartialEq)]
pub struct Agent {
    pub id: AgentId,
    pub position: Vec2,
    pub radius: f64,
    pub behavior: Behavior,
}

impl Agent {
    pub fn kind(&self) -> AgentKind {
        match self.behavior {
            Behavior::Stem(_) => AgentKind::StemCell,
            Behavior::FactorA(_) => AgentKind::FactorA,
            Behavior::FactorB(_) => AgentKind::FactorB,
        }
    }

    pub fn stem(&self) -> Option<&StemCell> {
        match &self.behavior {
            Behavior::Stem(cell) => Some(cell),
            _ => None,
        }
    }

    pub fn stem_mut(&mut self) -> Option<&mut StemCell> {
        match &mut self.behavior {
            Behavior::Stem(cell) => Some(cell),
            _ => None,
        }
    }

    pub fn label(&self) -> Option<Label> {
        self.stem().map(|cell| cell.label)
    }

    pub fn is_touching(&self, other: &Agent) -> bool {
        let reach = self.radius + other.radius;
        self.position.distance_squared(other.position) <= reach * reach
    }
}

/// Centroid and mean centroid distance of the stem cells.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PopulationSummary {
    pub centroid: Vec2,
    pub mean_radius: f64,
    pub count: usize,
}

/// Registry owning every agent, in scheduling order.
#[derive(Debug, Clone, Default)]
pub struct Population {
    agents: Vec<Agent>,
    last_id: AgentId,
}

impl Population {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends an agent and returns its freshly issued id.
    pub fn add_agent(&mut self, position: Vec2, radius: f64, behavior: Behavior) -> AgentId {
        self.last_id += 1;
        self.agents.push(Agent { id: self.last_id, position, radius, behavior });
        self.last_id
    }

    pub fn len(&self) -> usize {
        self.agents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.agents.is_empty()
    }

    pub fn agents(&self) -> &[Agent] {
        &self.agents
    }

    pub fn agents_mut(&mut self) -> &mut [Agent] {
        &mut self.agents
    }

    pub fn get(&self, idx: usize) -> Option<&Agent> {
        self.agents.get(idx)
    }

    pub fn get_mut(&mut self, idx: usize) -> Option<&mut Agent> {
        self.agents.get_mut(idx)
    }

    /// Slot of the agent with `id`. Ids are issued in slot order.
    pub fn index_of(&self, id: AgentId) -> Option<usize> {
        self.agents.binary_search_by_key(&id, |a| a.id).ok()
    }

    pub fn positions(&self) -> Vec<Vec2> {
        self.agents.iter().map(|a| a.position).collect()
    }

    pub fn stem_indices(&self) -> Vec<usize> {
        self.agents
            .iter()
            .enumerate()
            .filter(|(_, a)| a.kind() == AgentKind::StemCell)
            .map(|(idx, _)| idx)
            .collect()
    }

    pub fn count(&self, kind: AgentKind) -> usize {
        self.agents.iter().filter(|a| a.kind() == kind).count()
    }

    /// Centroid and mean radius of the stem cells; `None` without any.
    pub fn summary(&self) -> Option<PopulationSummary> {
        let stems: Vec<Vec2> = self
            .agents
            .iter()
            .filter(|a| a.kind() == AgentKind::StemCell)
            .map(|a| a.position)
            .collect();
        if stems.is_empty() {
            return None;
        }
        let count = stems.len();
        let sum = stems.iter().fold(Vec2::zero(), |acc, &p| acc + p);
        let centroid = sum / count as f64;
        let mean_radius = stems.iter().map(|&p| distance(p, centroid)).sum::<f64>() / count as f64;
        Some(PopulationSummary { centroid, mean_radius, count })
    }
}
