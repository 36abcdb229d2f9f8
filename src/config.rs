use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    // Discord
    pub discord_token: String,
    pub command_prefix: String,

    // Audio
    pub default_volume: f32,
    pub max_queue_size: usize,

    // Temporizadores (en segundos)
    pub idle_timeout_secs: u64,
    pub solitude_timeout_secs: u64,
}

impl Config {
    pub fn load() -> Result<Self> {
        dotenvy::dotenv().ok();

        let config = Self {
            discord_token: std::env::var("DISCORD_TOKEN")?,
            command_prefix: std::env::var("COMMAND_PREFIX").unwrap_or_else(|_| "!".to_string()),

            default_volume: std::env::var("DEFAULT_VOLUME")
                .unwrap_or_else(|_| "0.5".to_string())
                .parse()?,
            max_queue_size: std::env::var("MAX_QUEUE_SIZE")
                .unwrap_or_else(|_| "100".to_string())
                .parse()?,

            // 5 minutos sin música y el bucle se despide
            idle_timeout_secs: std::env::var("IDLE_TIMEOUT_SECS")
                .unwrap_or_else(|_| "300".to_string())
                .parse()?,
            // 2 minutos solo en el canal y el bot se va
            solitude_timeout_secs: std::env::var("SOLITUDE_TIMEOUT_SECS")
                .unwrap_or_else(|_| "120".to_string())
                .parse()?,
        };

        config.validate()?;

        Ok(config)
    }

    /// Comprobaciones de sanidad sobre los valores cargados.
    pub fn validate(&self) -> Result<()> {
        if self.command_prefix.is_empty() {
            anyhow::bail!("El prefijo de comandos no puede estar vacío");
        }

        if !(0.0..=1.0).contains(&self.default_volume) {
            anyhow::bail!(
                "El volumen por defecto debe estar entre 0.0 y 1.0, recibí: {}",
                self.default_volume
            );
        }

        if self.max_queue_size == 0 {
            anyhow::bail!("El tamaño máximo de la cola debe ser mayor que 0");
        }

        if self.idle_timeout_secs == 0 {
            anyhow::bail!("El timeout de inactividad debe ser mayor que 0");
        }

        if self.solitude_timeout_secs == 0 {
            anyhow::bail!("El timeout de soledad debe ser mayor que 0");
        }

        Ok(())
    }

    pub fn idle_timeout(&self) -> Duration {
        Duration::from_secs(self.idle_timeout_secs)
    }

    pub fn solitude_timeout(&self) -> Duration {
        Duration::from_secs(self.solitude_timeout_secs)
    }
}

/// Valores por defecto, usados como base en tests y cuando no hay entorno.
impl Default for Config {
    fn default() -> Self {
        Self {
            discord_token: String::new(),
            command_prefix: "!".to_string(),
            default_volume: 0.5,
            max_queue_size: 100,
            idle_timeout_secs: 300,
            solitude_timeout_secs: 120,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn la_configuracion_por_defecto_es_valida() {
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn rechaza_volumen_fuera_de_rango() {
        let config = Config {
            default_volume: 1.5,
            ..Config::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn rechaza_prefijo_vacio() {
        let config = Config {
            command_prefix: String::new(),
            ..Config::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn rechaza_timeouts_a_cero() {
        let config = Config {
            idle_timeout_secs: 0,
            ..Config::default()
        };
        assert!(config.validate().is_err());

        let config = Config {
            solitude_timeout_secs: 0,
            ..Config::default()
        };
        assert!(config.validate().is_err());
    }
}
