//! Library for importing a Flashpoint game catalog into third-party
//! launcher frontends (LaunchBox, AttractMode, EmulationStation/ES-DE).
//! Most of this crate was not originally written with the intention of
//! being exposed as a library on its own, so the API is still settling.

#![allow(unused)]

pub mod backup;
pub mod catalog;
pub mod clifp;
pub mod container;
pub mod doc;
pub mod error;
pub mod image;
pub mod launcher;
pub mod logging;
pub mod model;
pub mod options;
pub mod path;
pub mod prelude;
pub mod progress;
pub mod registry;
mod serialization;
pub mod worker;

#[cfg(test)]
mod testing;
