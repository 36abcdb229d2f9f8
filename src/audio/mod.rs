//! Orquestación de reproducción por guild: el núcleo con estado del bot.
//!
//! Cada guild activo tiene una [`session::GuildSession`] (cola FIFO, track en
//! curso, volumen) y un bucle propio en [`playback`]. El
//! [`registry::SessionRegistry`] garantiza como mucho una sesión por guild y
//! aloja el derribo idempotente.

pub mod playback;
pub mod queue;
pub mod registry;
pub mod session;
pub mod track;
