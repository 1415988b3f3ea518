// world_server_core/server/src/movement/flags.rs
//! Movement generator state bits.
//!
//! Transitions driven by the random movement generator:
//!
//! | operation          | adds                     | removes                                                   |
//! |--------------------|--------------------------|-----------------------------------------------------------|
//! | construct          | INITIALIZATION_PENDING   |                                                           |
//! | initialize         | INITIALIZED              | INITIALIZATION_PENDING, TRANSITORY, DEACTIVATED, PAUSED    |
//! | reset              | (initialize)             | TRANSITORY, DEACTIVATED                                   |
//! | update, blocked    | INTERRUPTED              |                                                           |
//! | update, free       |                          | INTERRUPTED                                               |
//! | path accepted      |                          | TRANSITORY, TIMED_PAUSED, SPEED_UPDATE_PENDING            |
//! | pause(0)           | PAUSED                   | TIMED_PAUSED                                              |
//! | pause(t > 0)       | TIMED_PAUSED             | PAUSED                                                    |
//! | resume             |                          | PAUSED                                                    |
//! | speed changed      | SPEED_UPDATE_PENDING     |                                                           |
//! | deactivate         | DEACTIVATED              |                                                           |
//! | finalize           | FINALIZED                |                                                           |
//!
//! `FINALIZED` is terminal. `PAUSED` and `TIMED_PAUSED` never coexist, nor do
//! `INITIALIZATION_PENDING` and `INITIALIZED`.

use std::fmt;
use std::ops::{BitOr, BitOrAssign};

#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct MovementGeneratorFlags(u16);

impl MovementGeneratorFlags {
    pub const NONE: Self = Self(0);
    pub const INITIALIZATION_PENDING: Self = Self(1 << 0);
    pub const INITIALIZED: Self = Self(1 << 1);
    pub const SPEED_UPDATE_PENDING: Self = Self(1 << 2);
    pub const INTERRUPTED: Self = Self(1 << 3);
    pub const PAUSED: Self = Self(1 << 4);
    pub const TIMED_PAUSED: Self = Self(1 << 5);
    pub const DEACTIVATED: Self = Self(1 << 6);
    pub const INFORM_ENABLED: Self = Self(1 << 7);
    pub const FINALIZED: Self = Self(1 << 8);
    pub const PERSIST_ON_DEATH: Self = Self(1 << 9);

    pub const TRANSITORY: Self = Self(Self::SPEED_UPDATE_PENDING.0 | Self::INTERRUPTED.0);

    pub fn bits(&self) -> u16 {
        self.0
    }

    pub fn has(&self, other: Self) -> bool {
        self.0 & other.0 != 0
    }

    pub fn add(&mut self, other: Self) {
        self.0 |= other.0;
    }

    pub fn remove(&mut self, other: Self) {
        self.0 &= !other.0;
    }

    /// Combinations the transition table never produces.
    pub fn is_consistent(&self) -> bool {
        !(self.has(Self::PAUSED) && self.has(Self::TIMED_PAUSED))
            && !(self.has(Self::INITIALIZATION_PENDING) && self.has(Self::INITIALIZED))
    }
}

impl BitOr for MovementGeneratorFlags {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl BitOrAssign for MovementGeneratorFlags {
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

impl fmt::Debug for MovementGeneratorFlags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        const NAMES: [(MovementGeneratorFlags, &str); 10] = [
            (MovementGeneratorFlags::INITIALIZATION_PENDING, "InitializationPending"),
            (MovementGeneratorFlags::INITIALIZED, "Initialized"),
            (MovementGeneratorFlags::SPEED_UPDATE_PENDING, "SpeedUpdatePending"),
            (MovementGeneratorFlags::INTERRUPTED, "Interrupted"),
            (MovementGeneratorFlags::PAUSED, "Paused"),
            (MovementGeneratorFlags::TIMED_PAUSED, "TimedPaused"),
            (MovementGeneratorFlags::DEACTIVATED, "Deactivated"),
            (MovementGeneratorFlags::INFORM_ENABLED, "InformEnabled"),
            (MovementGeneratorFlags::FINALIZED, "Finalized"),
            (MovementGeneratorFlags::PERSIST_ON_DEATH, "PersistOnDeath"),
        ];
        let set: Vec<&str> = NAMES.iter().filter(|(flag, _)| self.has(*flag)).map(|(_, n)| *n).collect();
        write!(f, "MovementGeneratorFlags({})", set.join(" | "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transitory_covers_both_bits() {
        let mut f = MovementGeneratorFlags::INITIALIZED | MovementGeneratorFlags::INTERRUPTED;
        assert!(f.has(MovementGeneratorFlags::TRANSITORY));
        f.remove(MovementGeneratorFlags::TRANSITORY);
        assert_eq!(f, MovementGeneratorFlags::INITIALIZED);
    }

    #[test]
    fn pause_kinds_conflict() {
        let f = MovementGeneratorFlags::PAUSED | MovementGeneratorFlags::TIMED_PAUSED;
        assert!(!f.is_consistent());
        assert_eq!(format!("{:?}", MovementGeneratorFlags::PAUSED), "MovementGeneratorFlags(Paused)");
    }
}
