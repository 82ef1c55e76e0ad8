//! Rigel's plugin-hosting core: the object model, format adapters, and
//! engine described across this crate's modules. Driving a real audio
//! device, persisting projects, and rendering a GUI are all callers'
//! concerns — this crate only hosts plugins and routes audio between
//! them (§1 "Scope").

pub mod client;
pub mod customdata;
pub mod delay;
pub mod driver;
pub mod engine;
pub mod event;
pub mod midiqueue;
pub mod osc;
pub mod parameter;
pub mod plugin;
pub mod port;
pub mod postevent;
pub mod program;
pub mod transport;

pub use engine::{CallbackSink, Engine, EngineOptions};
