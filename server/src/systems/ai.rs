// world_server_core/server/src/systems/ai.rs
use crate::core::types::{ObjectGuid, SpellId};
use crate::entities::creature::Creature;
use crate::world::content::CreatureAiKind;
use tracing::debug;

const PERIODIC_TRIGGER_GROUP: u32 = 1;

/// Work produced by a creature's scheduler, executed by its map.
#[derive(Clone, Debug, PartialEq)]
pub enum CreatureAction {
    CastSpell { spell_id: SpellId, target: ObjectGuid },
}

/// Arms the scheduler for the creature's AI kind.
pub fn install(creature: &mut Creature) {
    creature.scheduler.cancel_group(PERIODIC_TRIGGER_GROUP);
    match creature.ai {
        CreatureAiKind::Null => {}
        CreatureAiKind::PeriodicTrigger { spell_id, interval_ms } => {
            debug!("[AI] {} periodic trigger spell {} every {} ms", creature.guid, spell_id, interval_ms);
            creature.scheduler.schedule_repeating(
                interval_ms as u64,
                PERIODIC_TRIGGER_GROUP,
                CreatureAction::CastSpell { spell_id, target: creature.guid },
            );
        }
    }
}
