//! # Bot
//!
//! Implementación del [`EventHandler`] de serenity: recibe mensajes con
//! prefijo, los despacha a los comandos y reenvía los cambios de presencia de
//! voz al monitor. El estado compartido (registro de sesiones, resolutor,
//! configuración) vive aquí y se inyecta hacia abajo.

use serenity::all::{Message, Ready, VoiceState};
use serenity::async_trait;
use serenity::client::{Context, EventHandler};
use std::sync::Arc;
use tracing::info;

pub mod handlers;
pub mod monitor;

use crate::audio::registry::SessionRegistry;
use crate::config::Config;
use crate::sources::Resolver;
use monitor::PresenceMonitor;

pub struct MelodiaBot {
    pub(crate) config: Arc<Config>,
    /// Única fuente de verdad sobre las sesiones activas por guild
    pub(crate) registry: Arc<SessionRegistry>,
    pub(crate) resolver: Resolver,
    monitor: PresenceMonitor,
}

impl MelodiaBot {
    pub fn new(config: Config) -> Self {
        let config = Arc::new(config);
        let registry = Arc::new(SessionRegistry::new());
        let monitor = PresenceMonitor::new(registry.clone(), config.solitude_timeout());

        Self {
            config,
            registry,
            resolver: Resolver::new(),
            monitor,
        }
    }
}

#[async_trait]
impl EventHandler for MelodiaBot {
    async fn ready(&self, _ctx: Context, ready: Ready) {
        info!("🤖 {} está en línea!", ready.user.name);
        info!("📊 Conectado a {} servidores", ready.guilds.len());
    }

    async fn message(&self, ctx: Context, msg: Message) {
        // Los mensajes de otros bots (incluido uno mismo) no son comandos
        if msg.author.bot {
            return;
        }

        handlers::dispatch(&ctx, &msg, self).await;
    }

    async fn voice_state_update(&self, ctx: Context, old: Option<VoiceState>, new: VoiceState) {
        self.monitor
            .on_voice_state_update(&ctx, old.as_ref(), &new)
            .await;
    }
}
