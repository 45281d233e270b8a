pub mod level;
pub mod timer;
pub mod ports;
pub mod event;
pub mod world;
pub mod step;
