// world_server_core/server/src/world/instance_ids.rs
use crate::core::error::{ServerError, ServerResult};
use crate::core::types::InstanceId;
use tracing::{debug, error};

/// Free-list of instance ids. Slot 0 is never handed out.
#[derive(Debug, Clone)]
pub struct InstanceIdAllocator {
    free: Vec<bool>,
    next: InstanceId,
}

impl Default for InstanceIdAllocator {
    fn default() -> Self {
        Self::new(0)
    }
}

impl InstanceIdAllocator {
    /// Sizes the free-list to cover every id up to `max_existing`.
    pub fn new(max_existing: InstanceId) -> Self {
        let mut free = vec![true; max_existing as usize + 2];
        free[0] = false;
        InstanceIdAllocator { free, next: 1 }
    }

    /// Marks an id loaded from the instance registry as in use.
    pub fn register(&mut self, id: InstanceId) {
        if id == 0 {
            return;
        }
        let idx = id as usize;
        if idx >= self.free.len() {
            self.free.resize(idx + 2, true);
        }
        self.free[idx] = false;
        if self.next == id {
            self.advance_from(id);
        }
    }

    /// Hands out the lowest free id and moves the cursor past it.
    pub fn generate(&mut self) -> ServerResult<InstanceId> {
        if self.next == InstanceId::MAX {
            error!("Instance ID overflow!! Can't continue, shutting down server.");
            return Err(ServerError::InstanceIdOverflow);
        }
        if !self.is_free(self.next) {
            self.advance_from(self.next);
        }
        let new_id = self.next;
        self.free[new_id as usize] = false;
        self.advance_from(new_id);
        debug!("[InstanceIds] generated {}, next {}", new_id, self.next);
        Ok(new_id)
    }

    pub fn free(&mut self, id: InstanceId) {
        if id == 0 || id as usize >= self.free.len() {
            return;
        }
        self.next = self.next.min(id);
        self.free[id as usize] = true;
    }

    pub fn is_free(&self, id: InstanceId) -> bool {
        self.free.get(id as usize).copied().unwrap_or(id != 0)
    }

    pub fn next_id(&self) -> InstanceId {
        self.next
    }

    /// Overrides the cursor, e.g. after loading the registry.
    pub fn set_next_id(&mut self, id: InstanceId) {
        self.next = id.max(1);
        if self.next as usize >= self.free.len() && self.next != InstanceId::MAX {
            self.free.resize(self.next as usize + 1, true);
        }
    }

    // Finds the lowest free slot after `from`, growing the set when full.
    fn advance_from(&mut self, from: InstanceId) {
        let start = from as usize;
        match self.free.iter().skip(start).position(|&f| f) {
            Some(offset) => self.next = (start + offset) as InstanceId,
            None => {
                let len = self.free.len();
                if len > InstanceId::MAX as usize {
                    self.next = InstanceId::MAX;
                    return;
                }
                self.free.push(true);
                self.next = len as InstanceId;
            }
        }
    }
}
