//! Vigilancia de presencia en canales de voz.
//!
//! Dos disparadores de derribo: la desconexión forzosa del propio bot
//! (inmediato) y quedarse solo en el canal (diferido y cancelable). El
//! temporizador de soledad se cancela si alguien vuelve a entrar, y además
//! revalida la membresía en el momento de disparar: la cancelación directa es
//! la primera defensa, la revalidación la segunda.

use dashmap::DashMap;
use serenity::all::{ChannelId, GuildId, UserId, VoiceState};
use serenity::client::Context;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::audio::registry::SessionRegistry;

/// Tareas diferidas cancelables, como mucho una por guild.
pub struct SolitudeTimers {
    pending: Arc<DashMap<GuildId, (u64, JoinHandle<()>)>>,
    next_generation: AtomicU64,
}

impl SolitudeTimers {
    pub fn new() -> Self {
        Self {
            pending: Arc::new(DashMap::new()),
            next_generation: AtomicU64::new(0),
        }
    }

    /// Programa `action` tras `delay`, reemplazando (y abortando) cualquier
    /// tarea pendiente del mismo guild.
    pub fn schedule<F>(&self, guild_id: GuildId, delay: Duration, action: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let generation = self.next_generation.fetch_add(1, Ordering::Relaxed);
        let pending = Arc::clone(&self.pending);

        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            action.await;

            // Solo esta generación se borra a sí misma; una reprogramación
            // posterior no se ve afectada.
            pending.remove_if(&guild_id, |_, (gen, _)| *gen == generation);
        });

        if let Some((_, previous)) = self.pending.insert(guild_id, (generation, handle)) {
            previous.abort();
        }
    }

    /// Cancela la tarea pendiente del guild, si existe.
    pub fn cancel(&self, guild_id: GuildId) {
        if let Some((_, (_, handle))) = self.pending.remove(&guild_id) {
            handle.abort();
            debug!("⏳ Temporizador de soledad cancelado para guild {guild_id}");
        }
    }

    #[cfg(test)]
    fn pending_count(&self) -> usize {
        self.pending.len()
    }
}

impl Default for SolitudeTimers {
    fn default() -> Self {
        Self::new()
    }
}

/// Observa los cambios de presencia y decide cuándo derribar sesiones.
pub struct PresenceMonitor {
    registry: Arc<SessionRegistry>,
    timers: SolitudeTimers,
    solitude_timeout: Duration,
}

impl PresenceMonitor {
    pub fn new(registry: Arc<SessionRegistry>, solitude_timeout: Duration) -> Self {
        Self {
            registry,
            timers: SolitudeTimers::new(),
            solitude_timeout,
        }
    }

    pub async fn on_voice_state_update(
        &self,
        ctx: &Context,
        old: Option<&VoiceState>,
        new: &VoiceState,
    ) {
        let Some(guild_id) = new.guild_id.or_else(|| old.and_then(|o| o.guild_id)) else {
            return;
        };
        let bot_id = ctx.cache.current_user().id;

        let Some(manager) = songbird::get(ctx).await else {
            return;
        };

        // Desconexión forzosa del propio bot: derribo inmediato
        if new.user_id == bot_id {
            if old.is_some() && new.channel_id.is_none() {
                info!("🔌 Me desconectaron del canal de voz en guild {guild_id}");
                self.timers.cancel(guild_id);
                self.registry.cleanup(&manager, guild_id).await;
            }
            return;
        }

        let Some(call) = manager.get(guild_id) else {
            return;
        };
        let bot_channel = {
            let call = call.lock().await;
            call.current_channel()
        };
        let Some(bot_channel) = bot_channel else {
            return;
        };
        let bot_channel = ChannelId::from(bot_channel.0);

        // Alguien entró donde está el bot: el derribo pendiente ya no procede
        if new.channel_id == Some(bot_channel) {
            self.timers.cancel(guild_id);
            return;
        }

        // ¿Esta salida dejó al bot solo en su canal?
        if old.and_then(|o| o.channel_id) != Some(bot_channel) {
            return;
        }
        if !bot_is_alone(ctx, guild_id, bot_channel, bot_id) {
            return;
        }

        info!(
            "🚪 Me quedé solo en guild {guild_id}; derribo en {}s si nadie vuelve",
            self.solitude_timeout.as_secs()
        );

        let ctx = ctx.clone();
        let registry = self.registry.clone();
        let manager = manager.clone();
        self.timers
            .schedule(guild_id, self.solitude_timeout, async move {
                // La membresía pudo cambiar durante la espera: revalidar
                // antes de actuar sobre un estado que quizá ya no existe.
                if manager.get(guild_id).is_none()
                    || !bot_is_alone(&ctx, guild_id, bot_channel, bot_id)
                {
                    debug!("El canal de guild {guild_id} ya no está solo; derribo descartado");
                    return;
                }

                let origin = registry.get(guild_id).map(|session| session.origin_channel());
                registry.cleanup(&manager, guild_id).await;

                if let Some(channel) = origin {
                    let aviso = "🚪 Me quedé solo en el canal de voz, así que me desconecto.";
                    if let Err(e) = channel.say(&ctx.http, aviso).await {
                        warn!("No se pudo avisar de la desconexión por soledad: {e}");
                    }
                }
            });
    }
}

/// ¿El bot es el único miembro del canal? Según la vista de presencia de la
/// caché de la gateway.
fn bot_is_alone(ctx: &Context, guild_id: GuildId, channel: ChannelId, bot_id: UserId) -> bool {
    let Some(guild) = ctx.cache.guild(guild_id) else {
        return false;
    };

    guild
        .voice_states
        .values()
        .filter(|state| state.channel_id == Some(channel) && state.user_id != bot_id)
        .count()
        == 0
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicBool;
    use std::sync::atomic::Ordering::SeqCst;

    fn flag() -> (Arc<AtomicBool>, Arc<AtomicBool>) {
        let flag = Arc::new(AtomicBool::new(false));
        (flag.clone(), flag)
    }

    #[tokio::test(start_paused = true)]
    async fn dispara_despues_del_retraso() {
        let timers = Arc::new(SolitudeTimers::new());
        let (fired, flag) = flag();

        timers.schedule(GuildId::new(1), Duration::from_secs(120), async move {
            flag.store(true, SeqCst);
        });

        tokio::time::sleep(Duration::from_secs(119)).await;
        assert!(!fired.load(SeqCst));

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert!(fired.load(SeqCst));
        // La tarea disparada se limpia sola del mapa
        assert_eq!(timers.pending_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn cancelar_evita_el_disparo() {
        let timers = Arc::new(SolitudeTimers::new());
        let (fired, flag) = flag();

        timers.schedule(GuildId::new(1), Duration::from_secs(120), async move {
            flag.store(true, SeqCst);
        });
        timers.cancel(GuildId::new(1));

        tokio::time::sleep(Duration::from_secs(300)).await;
        assert!(!fired.load(SeqCst));
        assert_eq!(timers.pending_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn reprogramar_reemplaza_al_pendiente() {
        let timers = Arc::new(SolitudeTimers::new());
        let (fired_a, flag_a) = flag();
        let (fired_b, flag_b) = flag();

        timers.schedule(GuildId::new(1), Duration::from_secs(120), async move {
            flag_a.store(true, SeqCst);
        });
        tokio::time::sleep(Duration::from_secs(60)).await;
        timers.schedule(GuildId::new(1), Duration::from_secs(120), async move {
            flag_b.store(true, SeqCst);
        });

        // t=121: el primero habría disparado ya, pero fue reemplazado
        tokio::time::sleep(Duration::from_secs(61)).await;
        assert!(!fired_a.load(SeqCst));
        assert!(!fired_b.load(SeqCst));

        // t=181: dispara el segundo
        tokio::time::sleep(Duration::from_secs(60)).await;
        assert!(!fired_a.load(SeqCst));
        assert!(fired_b.load(SeqCst));
    }

    #[tokio::test(start_paused = true)]
    async fn guilds_distintos_no_se_pisan() {
        let timers = Arc::new(SolitudeTimers::new());
        let (fired_a, flag_a) = flag();
        let (fired_b, flag_b) = flag();

        timers.schedule(GuildId::new(1), Duration::from_secs(120), async move {
            flag_a.store(true, SeqCst);
        });
        timers.schedule(GuildId::new(2), Duration::from_secs(120), async move {
            flag_b.store(true, SeqCst);
        });
        timers.cancel(GuildId::new(1));

        tokio::time::sleep(Duration::from_secs(121)).await;
        assert!(!fired_a.load(SeqCst));
        assert!(fired_b.load(SeqCst));
    }
}
