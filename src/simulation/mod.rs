pub mod agents;
pub mod config;
pub mod controller;
pub mod engines;
pub mod error;
pub mod events;
pub mod id;
pub mod io;
pub mod logging;
pub mod network;
pub mod population;
pub mod scenario;
#[allow(clippy::module_inception)]
pub mod simulation;
#[cfg(any(test, feature = "test_util"))]
pub mod test_utils;
pub mod time_queue;
pub mod vehicles;
