use chrono::{DateTime, Utc};
use serenity::all::UserId;
use songbird::input::{Input, YoutubeDl};
use std::time::Duration;

/// Un elemento reproducible ya resuelto.
///
/// Inmutable una vez construido: el volumen propio puede fijarse con
/// [`Track::with_volume`] en la construcción, y la sesión lo escala con su
/// propio volumen en el momento de reproducir. Se consume exactamente una vez;
/// no hay re-reproducción.
#[derive(Clone)]
pub struct Track {
    title: String,
    duration: Option<Duration>,
    url: String,
    source: YoutubeDl<'static>,
    volume: f32,
    requested_by: UserId,
    enqueued_at: DateTime<Utc>,
}

impl Track {
    pub fn new(
        title: String,
        duration: Option<Duration>,
        url: String,
        source: YoutubeDl<'static>,
        requested_by: UserId,
    ) -> Self {
        Self {
            title,
            duration,
            url,
            source,
            volume: 1.0,
            requested_by,
            enqueued_at: Utc::now(),
        }
    }

    /// Volumen propio del track, en [0, 1]. Valores fuera de rango se recortan.
    pub fn with_volume(mut self, volume: f32) -> Self {
        self.volume = volume.clamp(0.0, 1.0);
        self
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn duration(&self) -> Option<Duration> {
        self.duration
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn volume(&self) -> f32 {
        self.volume
    }

    pub fn requested_by(&self) -> UserId {
        self.requested_by
    }

    #[allow(dead_code)]
    pub fn enqueued_at(&self) -> DateTime<Utc> {
        self.enqueued_at
    }

    /// Instancia el stream de audio para songbird. La fuente es perezosa:
    /// el proceso de extracción arranca cuando el driver empieza a leer.
    pub fn input(&self) -> Input {
        self.source.clone().into()
    }

    /// Copia de solo lectura de los metadatos, para snapshots y embeds.
    pub fn info(&self) -> TrackInfo {
        TrackInfo {
            title: self.title.clone(),
            duration: self.duration,
            url: self.url.clone(),
            requested_by: self.requested_by,
        }
    }
}

/// Metadatos de un track sin la fuente de audio. Es lo único que sale de la
/// sesión hacia los comandos de estado.
#[derive(Debug, Clone, PartialEq)]
pub struct TrackInfo {
    pub title: String,
    pub duration: Option<Duration>,
    pub url: String,
    pub requested_by: UserId,
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn track_de_prueba(title: &str) -> Track {
        let source = YoutubeDl::new(
            reqwest::Client::new(),
            "https://www.youtube.com/watch?v=prueba".to_string(),
        );
        Track::new(
            title.to_string(),
            Some(Duration::from_secs(185)),
            "https://www.youtube.com/watch?v=prueba".to_string(),
            source,
            UserId::new(42),
        )
    }

    #[test]
    fn el_volumen_propio_se_recorta_al_rango() {
        assert_eq!(track_de_prueba("a").with_volume(2.0).volume(), 1.0);
        assert_eq!(track_de_prueba("a").with_volume(-0.5).volume(), 0.0);
        assert_eq!(track_de_prueba("a").with_volume(0.7).volume(), 0.7);
    }

    #[test]
    fn info_copia_los_metadatos() {
        let track = track_de_prueba("Prueba");
        let info = track.info();
        assert_eq!(info.title, "Prueba");
        assert_eq!(info.duration, Some(Duration::from_secs(185)));
        assert_eq!(info.requested_by, UserId::new(42));
        assert_eq!(info.url, track.url());
    }
}
