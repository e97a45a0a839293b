use std::path::PathBuf;

use thiserror::Error;

/// Fatal errors raised while loading and validating a scenario. Anything that
/// slips past validation and violates a simulation invariant at runtime is a
/// bug and panics instead.
#[derive(Debug, Error)]
pub enum SimulationError {
    #[error("Failed to read file {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to parse {path:?}: {message}")]
    Parse { path: PathBuf, message: String },
    #[error("Link {link} references unknown node {node}")]
    UnknownNode { link: String, node: String },
    #[error("Route of person {person} references unknown link {link}")]
    UnknownLink { person: String, link: String },
    #[error("Activity of person {person} references unknown link {link}")]
    UnknownActivityLink { person: String, link: String },
    #[error("Link {link} has non-positive {attribute}: {value}")]
    InvalidLinkAttribute {
        link: String,
        attribute: &'static str,
        value: f64,
    },
    #[error("Plan of person {person} is invalid: {reason}")]
    InvalidPlan { person: String, reason: String },
    #[error("Route of person {person} is not connected: link {from} does not lead to link {to}")]
    DisconnectedRoute {
        person: String,
        from: String,
        to: String,
    },
}

pub type Result<T> = std::result::Result<T, SimulationError>;
