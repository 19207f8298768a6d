//! Capability surface of the dashboard core.
//!
//! Five effects cover everything the shell does on our behalf: rendering,
//! HTTP, delays, one-shot geolocation, and persistent session storage.
//! All domain decisions stay in `update`; capabilities only describe work.

pub mod location;
pub mod storage;
pub mod timer;

pub use location::{Location, LocationOperation, LocationOutput};
pub use storage::{KeyValueError, Storage};
pub use timer::{Timer, TimerElapsed, TimerOperation};

use crux_core::render::Render;
use crux_http::Http;

use crate::app::App;
use crate::Event;

#[derive(crux_core::macros::Effect)]
pub struct Capabilities {
    pub render: Render<Event>,
    pub http: Http<Event>,
    pub timer: Timer<Event>,
    pub location: Location<Event>,
    pub storage: Storage<Event>,
}
