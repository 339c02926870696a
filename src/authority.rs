//! Authority-tagged replicated fields.
//!
//! Every replicated value carries the single actor allowed to write it. Writes
//! go through [`Replicated::set`], which rejects any other actor instead of
//! silently ignoring the write.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::territory::NationId;

/// Who is performing a write.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "nation", rename_all = "snake_case")]
pub enum Actor {
    Server,
    Nation(NationId),
}

impl Actor {
    pub fn is_server(self) -> bool {
        matches!(self, Actor::Server)
    }

    pub fn nation(self) -> Option<NationId> {
        match self {
            Actor::Server => None,
            Actor::Nation(id) => Some(id),
        }
    }
}

impl fmt::Display for Actor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Actor::Server => write!(f, "server"),
            Actor::Nation(id) => write!(f, "nation {id}"),
        }
    }
}

/// A write attempted by someone other than the field's writer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Denied {
    pub writer: Actor,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Replicated<T> {
    value: T,
    writer: Actor,
}

impl<T: Copy + PartialEq> Replicated<T> {
    pub fn new(value: T, writer: Actor) -> Self {
        Self { value, writer }
    }

    pub fn get(&self) -> T {
        self.value
    }

    pub fn writer(&self) -> Actor {
        self.writer
    }

    /// Writes `value` if `actor` holds authority. Returns whether the value
    /// actually changed.
    pub fn set(&mut self, value: T, actor: Actor) -> Result<bool, Denied> {
        if actor != self.writer {
            return Err(Denied {
                writer: self.writer,
            });
        }
        Ok(self.replace(value))
    }

    /// Moves write authority to another actor.
    pub(crate) fn hand_over(&mut self, writer: Actor) {
        self.writer = writer;
    }

    /// Unchecked write for server-side operations that already validated
    /// their caller.
    pub(crate) fn replace(&mut self, value: T) -> bool {
        if self.value == value {
            return false;
        }
        self.value = value;
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_the_writer_may_set() {
        let mut field = Replicated::new(3_u8, Actor::Nation(2));
        assert_eq!(
            field.set(1, Actor::Server),
            Err(Denied {
                writer: Actor::Nation(2)
            })
        );
        assert_eq!(field.set(1, Actor::Nation(4)).map_err(|d| d.writer), Err(Actor::Nation(2)));
        assert_eq!(field.get(), 3);
        assert_eq!(field.set(1, Actor::Nation(2)), Ok(true));
        assert_eq!(field.set(1, Actor::Nation(2)), Ok(false));
        assert_eq!(field.get(), 1);
    }

    #[test]
    fn hand_over_moves_authority() {
        let mut field = Replicated::new(0_u8, Actor::Server);
        field.hand_over(Actor::Nation(5));
        assert!(field.set(2, Actor::Server).is_err());
        assert_eq!(field.set(2, Actor::Nation(5)), Ok(true));
    }
}
