//! Tipos de error del bot.
//!
//! Todos los errores de comandos se recuperan en el dispatcher y se muestran
//! al usuario como un embed; ninguno llega al bucle de reproducción.

use thiserror::Error;

pub type MusicResult<T> = Result<T, MusicError>;

/// Error de dominio para los comandos de música.
#[derive(Debug, Error)]
pub enum MusicError {
    /// El invocante no está en ningún canal de voz cuando hace falta uno
    #[error("Debes estar en un canal de voz")]
    NotInVoiceChannel,

    /// Comando que requiere voz sin conexión activa
    #[error("No estoy conectado a ningún canal de voz")]
    NotConnected,

    /// pause/resume/skip sin track activo
    #[error("No hay nada reproduciéndose ahora mismo")]
    NothingPlaying,

    /// Volumen fuera del rango aceptado (0 a 100, ambos incluidos)
    #[error("El volumen debe ser un número entre 0 y 100 (recibí `{0}`)")]
    InvalidVolume(String),

    #[error("Debes indicar una URL o un término de búsqueda")]
    EmptyQuery,

    /// La resolución de la búsqueda/URL falló; no afecta a la cola ni al bucle
    #[error("No pude resolver `{query}`: {reason}")]
    Resolution { query: String, reason: String },

    #[error("La cola está llena (máximo {0} canciones)")]
    QueueFull(usize),

    /// Songbird no quedó registrado en el cliente
    #[error("El cliente de voz no está inicializado")]
    VoiceClientMissing,

    #[error("Error de Discord: {0}")]
    Discord(#[from] serenity::Error),

    #[error("No me pude conectar al canal de voz: {0}")]
    Join(#[from] songbird::error::JoinError),
}

impl MusicError {
    /// Construye un error de resolución a partir de cualquier causa.
    pub fn resolution(query: impl Into<String>, reason: impl ToString) -> Self {
        Self::Resolution {
            query: query.into(),
            reason: reason.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn los_mensajes_son_aptos_para_el_usuario() {
        assert_eq!(
            MusicError::NotInVoiceChannel.to_string(),
            "Debes estar en un canal de voz"
        );
        assert_eq!(
            MusicError::QueueFull(100).to_string(),
            "La cola está llena (máximo 100 canciones)"
        );
        let err = MusicError::resolution("lofi beats", "sin resultados");
        assert_eq!(err.to_string(), "No pude resolver `lofi beats`: sin resultados");
    }
}
