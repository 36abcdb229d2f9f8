//! Bucle de reproducción por guild.
//!
//! Una tarea de larga vida por sesión: saca tracks de la cola, arranca la
//! reproducción en el driver, espera la señal de finalización y repite. Los
//! dos puntos de suspensión (track disponible y finalización del sink) son
//! únicos y cancelables: un Cleanup concurrente hace que el bucle observe el
//! estado derribado en su siguiente despertar y termine solo.

use std::sync::Arc;
use std::time::Duration;

use serenity::builder::CreateMessage;
use serenity::http::Http;
use songbird::{Call, Event, EventContext, Songbird, TrackEvent};
use tokio::sync::oneshot;
use tokio::time::{timeout_at, Instant};
use tracing::{debug, info, warn};

use crate::audio::registry::SessionRegistry;
use crate::audio::session::GuildSession;
use crate::audio::track::{Track, TrackInfo};
use crate::ui::embeds;

/// Dependencias compartidas del bucle. Clonables por guild; no hay estado
/// global más allá del registro.
#[derive(Clone)]
pub struct PlaybackContext {
    pub manager: Arc<Songbird>,
    pub http: Arc<Http>,
    pub registry: Arc<SessionRegistry>,
    pub idle_timeout: Duration,
}

/// Lanza la tarea del bucle para una sesión recién creada.
pub fn spawn(session: Arc<GuildSession>, cx: PlaybackContext) {
    tokio::spawn(run(session, cx));
}

async fn run(session: Arc<GuildSession>, cx: PlaybackContext) {
    let guild_id = session.guild_id();
    debug!("🎧 Bucle de reproducción iniciado para guild {guild_id}");

    loop {
        // Comprobación defensiva en cabeza de iteración: si la conexión de
        // voz ya no existe, o el registro apunta a otra sesión de este guild,
        // el bucle está operando sobre estado derribado y debe terminar.
        let Some(call) = cx.manager.get(guild_id) else {
            break;
        };
        if !cx.registry.owns(guild_id, &session) {
            break;
        }

        let track = match session.pop_next() {
            Some(track) => track,
            None => match wait_for_track(&session, cx.idle_timeout).await {
                Some(track) => track,
                None => {
                    on_idle_timeout(&session, &cx).await;
                    break;
                }
            },
        };

        play_track(&session, &cx, &call, track).await;
    }

    debug!("🛑 Bucle de reproducción terminado para guild {guild_id}");
}

/// Espera un track con una ventana de inactividad fija desde que la cola se
/// vació. Devuelve `None` si la ventana expira sin encolados.
async fn wait_for_track(session: &GuildSession, idle_timeout: Duration) -> Option<Track> {
    let deadline = Instant::now() + idle_timeout;

    loop {
        if timeout_at(deadline, session.notified()).await.is_err() {
            return None;
        }

        if let Some(track) = session.pop_next() {
            return Some(track);
        }
        // Permiso sobrante de un encolado ya consumido: se sigue esperando
        // contra la misma ventana, sin reiniciarla.
    }
}

/// Reproduce un track de principio a fin. Los errores del sink confluyen en
/// la señal de finalización: terminan el track, nunca el bucle.
async fn play_track(
    session: &GuildSession,
    cx: &PlaybackContext,
    call: &Arc<tokio::sync::Mutex<Call>>,
    track: Track,
) {
    let info = track.info();
    info!(
        "▶️ Reproduciendo `{}` en guild {}",
        info.title,
        session.guild_id()
    );

    let handle = {
        let mut call = call.lock().await;
        call.play_input(track.input())
    };

    // El volumen de la sesión escala el propio del track.
    let _ = handle.set_volume(session.volume() * track.volume());

    let (signal, done) = completion_channel();

    // Fin natural, skip explícito y error del sink confluyen en la misma
    // señal; solo el primero en llegar la resuelve.
    let end = handle.add_event(
        Event::Track(TrackEvent::End),
        SignalCompletion {
            signal: signal.clone(),
        },
    );
    let error = handle.add_event(
        Event::Track(TrackEvent::Error),
        SignalCompletion {
            signal: signal.clone(),
        },
    );
    if end.is_err() || error.is_err() {
        // El track murió antes de poder observarlo
        signal.fire();
    }

    session.begin_playback(info.clone(), handle, track.volume());
    announce(session, cx, &info).await;

    // Punto único de suspensión hasta la finalización. Si el driver se
    // derriba en medio (Cleanup concurrente) el emisor se descarta y la
    // espera se resuelve igualmente.
    let _ = done.await;

    if let Some(message_id) = session.end_playback() {
        if let Err(e) = session
            .origin_channel()
            .delete_message(&cx.http, message_id)
            .await
        {
            debug!("No se pudo retirar el aviso de reproducción: {e}");
        }
    }
}

/// Anuncia el track en curso en el canal de origen y recuerda el mensaje
/// para retirarlo al terminar.
async fn announce(session: &GuildSession, cx: &PlaybackContext, info: &TrackInfo) {
    let embed = embeds::now_playing_embed(info);
    let message = session
        .origin_channel()
        .send_message(&cx.http, CreateMessage::new().embed(embed))
        .await;

    match message {
        Ok(message) => session.set_now_playing_message(message.id),
        Err(e) => warn!("No se pudo anunciar la reproducción: {e}"),
    }
}

async fn on_idle_timeout(session: &GuildSession, cx: &PlaybackContext) {
    let guild_id = session.guild_id();
    info!(
        "⏰ {}s sin reproducir nada en guild {guild_id}, desconectando",
        cx.idle_timeout.as_secs()
    );

    // Si la conexión ya no existe, otro camino derribó la sesión: salir en
    // silencio, sin despedida.
    if cx.manager.get(guild_id).is_some() {
        let despedida = "⏰ Llevo un buen rato sin reproducir nada, me desconecto. ¡Hasta luego! 👋";
        if let Err(e) = session.origin_channel().say(&cx.http, despedida).await {
            warn!("No se pudo enviar la despedida: {e}");
        }
    }

    cx.registry.cleanup(&cx.manager, guild_id).await;
}

/// Crea el par señal/espera de finalización de una reproducción concreta.
pub(crate) fn completion_channel() -> (CompletionSignal, oneshot::Receiver<()>) {
    let (tx, rx) = oneshot::channel();
    let signal = CompletionSignal {
        tx: Arc::new(parking_lot::Mutex::new(Some(tx))),
    };

    (signal, rx)
}

/// Señal de finalización de un solo disparo.
///
/// Tanto el fin natural como el stop explícito y el error del sink intentan
/// dispararla; el emisor se extrae bajo el lock, así que como mucho uno lo
/// consigue y la espera se resuelve exactamente una vez por reproducción.
#[derive(Clone)]
pub(crate) struct CompletionSignal {
    tx: Arc<parking_lot::Mutex<Option<oneshot::Sender<()>>>>,
}

impl CompletionSignal {
    /// Dispara la señal. Devuelve `false` si alguien llegó antes.
    pub(crate) fn fire(&self) -> bool {
        match self.tx.lock().take() {
            Some(tx) => tx.send(()).is_ok(),
            None => false,
        }
    }
}

/// Adaptador de eventos de songbird a la señal de finalización.
struct SignalCompletion {
    signal: CompletionSignal,
}

#[async_trait::async_trait]
impl songbird::EventHandler for SignalCompletion {
    async fn act(&self, _ctx: &EventContext<'_>) -> Option<Event> {
        self.signal.fire();
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serenity::all::{ChannelId, GuildId, UserId};
    use songbird::input::YoutubeDl;

    fn session() -> Arc<GuildSession> {
        Arc::new(GuildSession::new(GuildId::new(1), ChannelId::new(2), 0.5, 100))
    }

    fn track(title: &str) -> Track {
        let url = format!("https://www.youtube.com/watch?v={title}");
        let source = YoutubeDl::new(reqwest::Client::new(), url.clone());
        Track::new(title.to_string(), None, url, source, UserId::new(1))
    }

    #[tokio::test]
    async fn la_senal_se_dispara_una_sola_vez() {
        let (signal, done) = completion_channel();
        let clon = signal.clone();

        assert!(signal.fire());
        // Segundo y tercer intento (p. ej. End tras Error) no encuentran emisor
        assert!(!signal.fire());
        assert!(!clon.fire());

        done.await.expect("la espera debería resolverse");
    }

    #[tokio::test]
    async fn descartar_el_emisor_resuelve_la_espera() {
        let (signal, done) = completion_channel();
        drop(signal);

        // El bucle trata el error del canal como finalización, no como cuelgue
        assert!(done.await.is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn la_espera_expira_sin_encolados() {
        let session = session();
        let track = wait_for_track(&session, Duration::from_secs(300)).await;

        assert!(track.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn un_encolado_durante_la_espera_entrega_el_track() {
        let session = session();
        let en_espera = {
            let session = session.clone();
            tokio::spawn(async move { wait_for_track(&session, Duration::from_secs(300)).await })
        };

        tokio::time::sleep(Duration::from_secs(10)).await;
        session.enqueue(track("uno")).unwrap();

        let entregado = en_espera.await.unwrap();
        assert_eq!(entregado.unwrap().title(), "uno");
    }

    /// Un permiso que quedó guardado de un encolado ya consumido despierta la
    /// espera pero no reinicia la ventana ni entrega nada.
    #[tokio::test(start_paused = true)]
    async fn un_permiso_sobrante_no_entrega_nada() {
        let session = session();
        session.enqueue(track("uno")).unwrap();
        session.pop_next().unwrap();

        let track = wait_for_track(&session, Duration::from_secs(300)).await;
        assert!(track.is_none());
    }
}
