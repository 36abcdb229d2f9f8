use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use serenity::all::{ChannelId, GuildId};
use songbird::Songbird;
use std::sync::Arc;
use tracing::{debug, info};

use crate::audio::session::GuildSession;

/// Registro de sesiones a nivel de proceso: la única fuente de verdad sobre
/// "¿hay sesión activa para este guild?".
///
/// Inyectable y sin estado ambiente; solo se muta por crear-si-falta y
/// eliminar. Las sesiones de guilds distintos son independientes entre sí.
pub struct SessionRegistry {
    sessions: DashMap<GuildId, Arc<GuildSession>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self {
            sessions: DashMap::new(),
        }
    }

    /// Devuelve la sesión del guild, creándola atómicamente si no existe.
    ///
    /// El booleano indica si esta llamada la creó: exactamente un llamante lo
    /// recibe a `true` bajo concurrencia, y es el responsable de arrancar el
    /// bucle de reproducción.
    pub fn get_or_create(
        &self,
        guild_id: GuildId,
        origin_channel: ChannelId,
        default_volume: f32,
        max_queue_size: usize,
    ) -> (Arc<GuildSession>, bool) {
        match self.sessions.entry(guild_id) {
            Entry::Occupied(entry) => (entry.get().clone(), false),
            Entry::Vacant(entry) => {
                let session = Arc::new(GuildSession::new(
                    guild_id,
                    origin_channel,
                    default_volume,
                    max_queue_size,
                ));
                entry.insert(session.clone());
                info!("🆕 Sesión creada para guild {guild_id}");

                (session, true)
            }
        }
    }

    /// Búsqueda sin efectos, para comandos de estado.
    pub fn get(&self, guild_id: GuildId) -> Option<Arc<GuildSession>> {
        self.sessions.get(&guild_id).map(|entry| entry.value().clone())
    }

    /// Elimina la sesión del guild. Quitar una clave ausente no es un error.
    pub fn remove(&self, guild_id: GuildId) {
        if self.sessions.remove(&guild_id).is_some() {
            debug!("🗑️ Sesión eliminada para guild {guild_id}");
        }
    }

    /// ¿Sigue siendo `session` la sesión registrada de este guild? El bucle
    /// lo comprueba por identidad para no operar tras un derribo-y-recreado.
    pub(crate) fn owns(&self, guild_id: GuildId, session: &Arc<GuildSession>) -> bool {
        self.sessions
            .get(&guild_id)
            .map(|entry| Arc::ptr_eq(entry.value(), session))
            .unwrap_or(false)
    }

    /// Derribo idempotente de la sesión de un guild.
    ///
    /// Orden: desconectar la voz (mejor esfuerzo, "ya desconectado" se
    /// traga) y después quitar la entrada del registro. No cancela la tarea
    /// del bucle: su comprobación defensiva la hace terminar sola al
    /// siguiente despertar.
    pub async fn cleanup(&self, manager: &Songbird, guild_id: GuildId) {
        if manager.get(guild_id).is_some() {
            if let Err(e) = manager.remove(guild_id).await {
                debug!("La voz de guild {guild_id} ya estaba cerrada: {e}");
            }
        }

        self.remove(guild_id);
    }
}

impl Default for SessionRegistry {
    fn default() -> Self {
        Self::new()
    }
}
