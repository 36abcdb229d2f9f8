use parking_lot::Mutex;
use serenity::all::{ChannelId, GuildId, MessageId};
use songbird::tracks::TrackHandle;
use tokio::sync::Notify;

use crate::audio::queue::TrackQueue;
use crate::audio::track::{Track, TrackInfo};
use crate::error::MusicResult;

/// Cuántos pendientes muestra un snapshot como máximo.
pub const QUEUE_PREVIEW_LIMIT: usize = 10;

/// Estado de reproducción de un servidor.
///
/// Existe como mucho una instancia por guild (lo garantiza el registro) y un
/// único bucle de reproducción la consume. Toda mutación pasa por el mutex
/// interno; el lock nunca se mantiene a través de un await.
pub struct GuildSession {
    guild_id: GuildId,
    origin_channel: ChannelId,
    state: Mutex<SessionState>,
    /// Despierta al bucle cuando entra un track. `notify_one` deja el permiso
    /// guardado si el bucle no está esperando todavía, así un encolado nunca
    /// se pierde entre la comprobación de la cola y la espera.
    wakeup: Notify,
}

struct SessionState {
    queue: TrackQueue,
    current: Option<NowPlaying>,
    volume: f32,
    now_playing_msg: Option<MessageId>,
}

/// El track en curso junto con su handle vivo en el driver.
struct NowPlaying {
    info: TrackInfo,
    handle: TrackHandle,
    /// Volumen propio del track; el de la sesión lo escala.
    track_volume: f32,
}

/// Vista de solo lectura del estado de la cola, para el comando `queue`.
#[derive(Debug, Clone)]
pub struct QueueSnapshot {
    pub current: Option<TrackInfo>,
    pub upcoming: Vec<TrackInfo>,
    pub remaining: usize,
}

impl QueueSnapshot {
    pub fn is_empty(&self) -> bool {
        self.current.is_none() && self.upcoming.is_empty()
    }
}

impl GuildSession {
    pub fn new(
        guild_id: GuildId,
        origin_channel: ChannelId,
        default_volume: f32,
        max_queue_size: usize,
    ) -> Self {
        Self {
            guild_id,
            origin_channel,
            state: Mutex::new(SessionState {
                queue: TrackQueue::new(max_queue_size),
                current: None,
                volume: default_volume,
                now_playing_msg: None,
            }),
            wakeup: Notify::new(),
        }
    }

    pub fn guild_id(&self) -> GuildId {
        self.guild_id
    }

    /// Canal de texto donde nació la sesión; ahí van los avisos del bucle.
    pub fn origin_channel(&self) -> ChannelId {
        self.origin_channel
    }

    /// Encola un track y despierta al bucle. Devuelve la posición (base 1).
    pub fn enqueue(&self, track: Track) -> MusicResult<usize> {
        let position = self.state.lock().queue.push(track)?;
        self.wakeup.notify_one();

        Ok(position)
    }

    pub(crate) fn pop_next(&self) -> Option<Track> {
        self.state.lock().queue.pop()
    }

    /// Punto único de suspensión para "hay track disponible".
    pub(crate) async fn notified(&self) {
        self.wakeup.notified().await;
    }

    /// Marca el comienzo de una reproducción. `current` queda poblado solo
    /// entre esta llamada y [`GuildSession::end_playback`].
    pub(crate) fn begin_playback(&self, info: TrackInfo, handle: TrackHandle, track_volume: f32) {
        self.state.lock().current = Some(NowPlaying {
            info,
            handle,
            track_volume,
        });
    }

    /// Limpia el track en curso y devuelve el mensaje de estado a retirar.
    pub(crate) fn end_playback(&self) -> Option<MessageId> {
        let mut state = self.state.lock();
        state.current = None;

        state.now_playing_msg.take()
    }

    pub(crate) fn set_now_playing_message(&self, message_id: MessageId) {
        self.state.lock().now_playing_msg = Some(message_id);
    }

    pub fn current_handle(&self) -> Option<TrackHandle> {
        self.state
            .lock()
            .current
            .as_ref()
            .map(|now| now.handle.clone())
    }

    pub fn volume(&self) -> f32 {
        self.state.lock().volume
    }

    /// Persiste el volumen de la sesión. Si hay un track sonando devuelve su
    /// handle y el volumen efectivo a aplicar al sink.
    pub fn set_volume(&self, volume: f32) -> Option<(TrackHandle, f32)> {
        let mut state = self.state.lock();
        state.volume = volume;

        state
            .current
            .as_ref()
            .map(|now| (now.handle.clone(), volume * now.track_volume))
    }

    /// Snapshot de solo lectura: track en curso, hasta
    /// [`QUEUE_PREVIEW_LIMIT`] pendientes y cuántos quedan sin listar.
    pub fn snapshot(&self) -> QueueSnapshot {
        let state = self.state.lock();
        let (upcoming, remaining) = state.queue.preview(QUEUE_PREVIEW_LIMIT);

        QueueSnapshot {
            current: state.current.as_ref().map(|now| now.info.clone()),
            upcoming,
            remaining,
        }
    }
}
