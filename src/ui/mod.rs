//! Construcción de mensajes y embeds para el chat.

pub mod embeds;
