use serenity::all::Timestamp;
use serenity::builder::{CreateEmbed, CreateEmbedFooter};
use std::time::Duration;

use crate::audio::session::{QueueSnapshot, QUEUE_PREVIEW_LIMIT};
use crate::audio::track::TrackInfo;
use crate::error::MusicError;

/// Paleta de colores estandarizada para el bot
pub mod colors {
    use serenity::all::Colour;

    pub const SUCCESS_GREEN: Colour = Colour::from_rgb(67, 181, 129);
    pub const ERROR_RED: Colour = Colour::from_rgb(220, 53, 69);
    pub const INFO_BLUE: Colour = Colour::from_rgb(52, 144, 220);
    pub const MUSIC_PURPLE: Colour = Colour::from_rgb(138, 43, 226);
}

/// Footer estandarizado para todos los embeds
const STANDARD_FOOTER: &str = "🎵 Melodía";

/// Embed de "reproduciendo ahora"; el bucle lo envía al arrancar un track y
/// lo retira cuando llega la señal de finalización.
pub fn now_playing_embed(track: &TrackInfo) -> CreateEmbed {
    CreateEmbed::default()
        .title("🎵 Reproduciendo Ahora")
        .description(format!("**{}**", track.title))
        .color(colors::SUCCESS_GREEN)
        .field("⏱️ Duración", duration_label(track.duration), true)
        .field(
            "👤 Solicitado por",
            format!("<@{}>", track.requested_by),
            true,
        )
        .url(&track.url)
        .timestamp(Timestamp::now())
        .footer(CreateEmbedFooter::new(STANDARD_FOOTER))
}

/// Confirmación de encolado con la posición en la cola.
pub fn track_added_embed(track: &TrackInfo, position: usize) -> CreateEmbed {
    CreateEmbed::default()
        .title("✅ Añadida a la cola")
        .description(format!("**{}**", track.title))
        .color(colors::MUSIC_PURPLE)
        .field("⏱️ Duración", duration_label(track.duration), true)
        .field("📍 Posición", position.to_string(), true)
        .url(&track.url)
        .footer(CreateEmbedFooter::new(STANDARD_FOOTER))
}

/// Embed del comando `queue`: track en curso más los primeros pendientes.
pub fn queue_embed(snapshot: &QueueSnapshot) -> CreateEmbed {
    let mut embed = CreateEmbed::default()
        .title("📜 Cola de reproducción")
        .color(colors::INFO_BLUE)
        .footer(CreateEmbedFooter::new(STANDARD_FOOTER));

    if let Some(current) = &snapshot.current {
        embed = embed.field(
            "🎵 Reproduciendo ahora",
            format!("**{}** ({})", current.title, duration_label(current.duration)),
            false,
        );
    }

    if snapshot.upcoming.is_empty() {
        embed = embed.description("No hay más canciones en espera.");
    } else {
        embed = embed.field("⏭️ A continuación", upcoming_lines(snapshot), false);
    }

    if snapshot.remaining > 0 {
        embed = embed.footer(CreateEmbedFooter::new(format!(
            "… y {} canciones más en la cola",
            snapshot.remaining
        )));
    }

    embed
}

/// Embed de error con el mensaje de dominio tal cual.
pub fn error_embed(error: &MusicError) -> CreateEmbed {
    CreateEmbed::default()
        .title("❌ Ups")
        .description(error.to_string())
        .color(colors::ERROR_RED)
        .footer(CreateEmbedFooter::new(STANDARD_FOOTER))
}

pub fn help_embed(prefix: &str) -> CreateEmbed {
    CreateEmbed::default()
        .title("🎵 Melodía - Comandos")
        .color(colors::INFO_BLUE)
        .field(
            "🎵 Reproducción",
            format!(
                "• `{prefix}play <URL o búsqueda>` (`p`) - Resuelve y encola una canción\n\
                 • `{prefix}pause` / `{prefix}resume` - Pausa o reanuda la actual\n\
                 • `{prefix}skip` (`s`) - Salta la canción actual\n\
                 • `{prefix}volume <0-100>` (`vol`) - Ajusta el volumen"
            ),
            false,
        )
        .field(
            "📜 Cola y conexión",
            format!(
                "• `{prefix}queue` (`q`) - Muestra la cola\n\
                 • `{prefix}join` (`j`) - Me conecto a tu canal de voz\n\
                 • `{prefix}stop` - Detiene todo y me voy\n\
                 • `{prefix}leave` (`disconnect`, `dc`) - Me desconecto"
            ),
            false,
        )
        .footer(CreateEmbedFooter::new(STANDARD_FOOTER))
}

/// Lista numerada de pendientes, como mucho [`QUEUE_PREVIEW_LIMIT`] líneas.
fn upcoming_lines(snapshot: &QueueSnapshot) -> String {
    snapshot
        .upcoming
        .iter()
        .take(QUEUE_PREVIEW_LIMIT)
        .enumerate()
        .map(|(i, track)| {
            format!(
                "`{}.` **{}** ({})",
                i + 1,
                track.title,
                duration_label(track.duration)
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn duration_label(duration: Option<Duration>) -> String {
    match duration {
        Some(duration) => format_duration(duration),
        None => "🔴 En vivo".to_string(),
    }
}

fn format_duration(duration: Duration) -> String {
    let total_seconds = duration.as_secs();
    let hours = total_seconds / 3600;
    let minutes = (total_seconds % 3600) / 60;
    let seconds = total_seconds % 60;

    if hours > 0 {
        format!("{}:{:02}:{:02}", hours, minutes, seconds)
    } else {
        format!("{}:{:02}", minutes, seconds)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serenity::all::UserId;

    fn info(title: &str, secs: Option<u64>) -> TrackInfo {
        TrackInfo {
            title: title.to_string(),
            duration: secs.map(Duration::from_secs),
            url: "https://ejemplo.com".to_string(),
            requested_by: UserId::new(1),
        }
    }

    #[test]
    fn formatea_duraciones_cortas_y_largas() {
        assert_eq!(format_duration(Duration::from_secs(5)), "0:05");
        assert_eq!(format_duration(Duration::from_secs(185)), "3:05");
        assert_eq!(format_duration(Duration::from_secs(3600)), "1:00:00");
        assert_eq!(format_duration(Duration::from_secs(3725)), "1:02:05");
    }

    #[test]
    fn sin_duracion_se_etiqueta_como_directo() {
        assert_eq!(duration_label(None), "🔴 En vivo");
    }

    #[test]
    fn la_lista_de_pendientes_numera_desde_uno() {
        let snapshot = QueueSnapshot {
            current: Some(info("actual", Some(60))),
            upcoming: vec![info("primera", Some(61)), info("segunda", None)],
            remaining: 0,
        };

        let lines = upcoming_lines(&snapshot);
        assert_eq!(
            lines,
            "`1.` **primera** (1:01)\n`2.` **segunda** (🔴 En vivo)"
        );
    }
}
