// Error type for fallible simulation operations.

use std::fmt;

use crate::types::Entity;

#[derive(Clone, Debug, PartialEq)]
pub enum SimError {
    /// Blueprint name was never registered with the entity system.
    UnknownBlueprint(String),
    /// Board coordinates fall outside the created grid.
    OutOfBounds { x: u32, y: u32 },
    /// Operation needs a grid node the entity does not have.
    NotANode(Entity),
}

impl fmt::Display for SimError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SimError::UnknownBlueprint(name) => {
                write!(f, "unknown blueprint: {name}")
            }
            SimError::OutOfBounds { x, y } => {
                write!(f, "board coordinates ({x}, {y}) are out of bounds")
            }
            SimError::NotANode(entity) => {
                write!(f, "{entity} is not a grid node")
            }
        }
    }
}

impl std::error::Error for SimError {}
