//! Resolución de medios: de una consulta del usuario a un [`Track`].
//!
//! El puente con yt-dlp lo pone songbird ([`YoutubeDl`]); aquí solo se decide
//! si la consulta es una URL directa o una búsqueda, y se extraen los
//! metadatos (título, duración) antes de encolar. La resolución corre en la
//! tarea del comando, nunca en el camino crítico de ningún bucle de
//! reproducción.

use serenity::all::UserId;
use songbird::input::{Compose, YoutubeDl};
use tracing::{debug, info};
use url::Url;

use crate::audio::track::Track;
use crate::error::{MusicError, MusicResult};

const UNKNOWN_TITLE: &str = "Título desconocido";

pub struct Resolver {
    /// Cliente HTTP compartido por todas las fuentes que cree.
    client: reqwest::Client,
}

impl Resolver {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
        }
    }

    /// Resuelve `query` a un track listo para encolar.
    ///
    /// Un fallo aquí se informa al usuario y no afecta ni a la cola ni al
    /// bucle: el intento de encolado simplemente no ocurre.
    pub async fn resolve(&self, query: &str, requested_by: UserId) -> MusicResult<Track> {
        let query = query.trim();
        if query.is_empty() {
            return Err(MusicError::EmptyQuery);
        }

        debug!("🔍 Resolviendo `{query}`");

        let mut source = if is_http_url(query) {
            YoutubeDl::new(self.client.clone(), query.to_string())
        } else {
            YoutubeDl::new_search(self.client.clone(), query.to_string())
        };

        let metadata = source
            .aux_metadata()
            .await
            .map_err(|e| MusicError::resolution(query, e))?;

        let title = metadata
            .title
            .unwrap_or_else(|| UNKNOWN_TITLE.to_string());
        let url = metadata.source_url.unwrap_or_else(|| query.to_string());

        info!("🎼 Resuelto `{query}` → `{title}`");

        Ok(Track::new(
            title,
            metadata.duration,
            url,
            source,
            requested_by,
        ))
    }
}

impl Default for Resolver {
    fn default() -> Self {
        Self::new()
    }
}

/// Solo http/https cuentan como URL directa; cualquier otra cosa se trata
/// como término de búsqueda.
fn is_http_url(query: &str) -> bool {
    Url::parse(query)
        .map(|url| matches!(url.scheme(), "http" | "https"))
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn distingue_urls_de_busquedas() {
        assert!(is_http_url("https://www.youtube.com/watch?v=dQw4w9WgXcQ"));
        assert!(is_http_url("http://ejemplo.com/audio.mp3"));

        assert!(!is_http_url("lofi hip hop radio"));
        assert!(!is_http_url("ftp://servidor/cancion.ogg"));
        // Sin esquema no es URL absoluta: se busca, no se descarga
        assert!(!is_http_url("www.youtube.com/watch?v=dQw4w9WgXcQ"));
    }

    #[tokio::test]
    async fn una_consulta_vacia_no_llega_a_ytdlp() {
        let resolver = Resolver::new();
        let error = resolver.resolve("   ", UserId::new(1)).await.err();

        match error {
            Some(MusicError::EmptyQuery) => {}
            otro => panic!("esperaba EmptyQuery, recibí {otro:?}"),
        }
    }
}
