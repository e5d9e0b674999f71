//! Parking mesh relay node.
//!
//! Peers broadcast the occupancy of their parking sections on the mesh. This
//! node keeps the latest report per section and, each time the display
//! trigger line is pressed, writes the aggregated view to the display
//! controller as one line per section followed by a sentinel.
//!
//! - [`codec`]     : wire format between peers and towards the display
//! - [`store`]     : latest metrics per section
//! - [`trigger`]   : falling-edge detection on the trigger line
//! - [`publisher`] : downstream report and retention policy
//! - [`gateway`]   : mesh collaborator contract, [`mqtt`] its MQTT transport
//! - [`node`]      : single-task runtime tying it together

pub mod codec;
pub mod config;
pub mod gateway;
pub mod health;
pub mod models;
pub mod mqtt;
pub mod node;
pub mod publisher;
pub mod sink;
pub mod state;
pub mod store;
pub mod trigger;
