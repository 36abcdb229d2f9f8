use anyhow::Result;
use serenity::{model::gateway::GatewayIntents, Client};
use songbird::SerenityInit;
use tracing::{error, info};

mod audio;
mod bot;
mod config;
mod error;
mod sources;
mod ui;

use crate::bot::MelodiaBot;
use crate::config::Config;

#[tokio::main]
async fn main() -> Result<()> {
    // Inicializar logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("melodia=debug".parse()?)
                .add_directive("serenity=info".parse()?)
                .add_directive("songbird=info".parse()?),
        )
        .init();

    info!("🎵 Iniciando Melodía v{}", env!("CARGO_PKG_VERSION"));

    // Cargar y validar configuración
    let config = Config::load()?;
    info!(
        "⚙️ Prefijo `{}`, volumen por defecto {}%, timeouts {}s/{}s",
        config.command_prefix,
        (config.default_volume * 100.0) as u32,
        config.idle_timeout_secs,
        config.solitude_timeout_secs,
    );

    // Intents mínimos: comandos por mensaje y presencia de voz
    let intents = GatewayIntents::GUILDS
        | GatewayIntents::GUILD_VOICE_STATES
        | GatewayIntents::GUILD_MESSAGES
        | GatewayIntents::MESSAGE_CONTENT;

    let handler = MelodiaBot::new(config.clone());

    let mut client = Client::builder(&config.discord_token, intents)
        .event_handler(handler)
        .register_songbird()
        .await?;

    // Shutdown ordenado con Ctrl+C
    tokio::spawn(async move {
        tokio::signal::ctrl_c()
            .await
            .expect("Error al registrar Ctrl+C");
        info!("⚠️ Señal de shutdown recibida, cerrando...");
        std::process::exit(0);
    });

    info!("🚀 Bot iniciado");
    if let Err(why) = client.start().await {
        error!("Error al ejecutar el cliente: {:?}", why);
    }

    Ok(())
}
