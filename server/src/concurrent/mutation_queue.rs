// world_server_core/server/src/concurrent/mutation_queue.rs
use crate::core::types::ObjectGuid;
use crate::entities::world_object::WorldObject;
use crate::world::grid::CellCoord;
use crossbeam_queue::SegQueue;

/// Structural change to a map's object set, applied in the delayed pass.
#[derive(Debug)]
pub enum MapMutation {
    Remove(ObjectGuid),
    Add(WorldObject),
    Relocate { guid: ObjectGuid, from: CellCoord, to: CellCoord },
    UnloadCell(CellCoord),
}

impl MapMutation {
    fn priority(&self) -> MutationPriority {
        match self {
            MapMutation::Remove(_) => MutationPriority::High,
            MapMutation::Add(_) | MapMutation::Relocate { .. } => MutationPriority::Normal,
            MapMutation::UnloadCell(_) => MutationPriority::Low,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MutationPriority {
    High,
    Normal,
    Low,
}

/// Lock-free queue drained removals first, then adds and moves, then cell
/// unloads. Any thread may push.
pub struct MutationQueue {
    high_priority: SegQueue<MapMutation>,
    normal_priority: SegQueue<MapMutation>,
    low_priority: SegQueue<MapMutation>,
}

impl MutationQueue {
    pub fn new() -> Self {
        MutationQueue {
            high_priority: SegQueue::new(),
            normal_priority: SegQueue::new(),
            low_priority: SegQueue::new(),
        }
    }

    pub fn push(&self, mutation: MapMutation) {
        match mutation.priority() {
            MutationPriority::High => self.high_priority.push(mutation),
            MutationPriority::Normal => self.normal_priority.push(mutation),
            MutationPriority::Low => self.low_priority.push(mutation),
        }
    }

    /// Takes everything queued so far. Mutations pushed while the batch is
    /// applied wait for the next pass.
    pub fn drain(&self) -> Vec<MapMutation> {
        let mut batch = Vec::with_capacity(self.len());
        for queue in [&self.high_priority, &self.normal_priority, &self.low_priority] {
            let n = queue.len();
            for _ in 0..n {
                match queue.pop() {
                    Some(m) => batch.push(m),
                    None => break,
                }
            }
        }
        batch
    }

    pub fn is_empty(&self) -> bool {
        self.high_priority.is_empty() && self.normal_priority.is_empty() && self.low_priority.is_empty()
    }

    pub fn len(&self) -> usize {
        self.high_priority.len() + self.normal_priority.len() + self.low_priority.len()
    }
}

impl Default for MutationQueue {
    fn default() -> Self {
        Self::new()
    }
}
