use serenity::all::{ChannelId, GuildId, Message, UserId};
use serenity::builder::CreateMessage;
use serenity::client::Context;
use songbird::Songbird;
use std::sync::Arc;
use tracing::{error, info, warn};

use crate::audio::playback::{self, PlaybackContext};
use crate::audio::session::GuildSession;
use crate::bot::MelodiaBot;
use crate::error::{MusicError, MusicResult};
use crate::ui::embeds;

/// Despacha un mensaje con prefijo hacia su comando.
///
/// Todo error de dominio se recupera aquí y se muestra como embed; nada de lo
/// que pase en un comando llega a los bucles de reproducción.
pub async fn dispatch(ctx: &Context, msg: &Message, bot: &MelodiaBot) {
    let Some(guild_id) = msg.guild_id else {
        return;
    };
    let Some((command, args)) = parse_command(&msg.content, &bot.config.command_prefix) else {
        return;
    };

    info!(
        "📝 Comando `{command}` de {} en guild {guild_id}",
        msg.author.name
    );

    let result = match command {
        "join" | "j" => cmd_join(ctx, msg, guild_id).await,
        "play" | "p" => cmd_play(ctx, msg, bot, guild_id, args).await,
        "volume" | "vol" => cmd_volume(ctx, msg, bot, guild_id, args).await,
        "stop" => cmd_stop(ctx, msg, bot, guild_id).await,
        "skip" | "s" => cmd_skip(ctx, msg, bot, guild_id).await,
        "queue" | "q" => cmd_queue(ctx, msg, bot, guild_id).await,
        "pause" => cmd_pause(ctx, msg, bot, guild_id).await,
        "resume" => cmd_resume(ctx, msg, bot, guild_id).await,
        "leave" | "disconnect" | "dc" => cmd_leave(ctx, msg, bot, guild_id).await,
        "help" => cmd_help(ctx, msg, bot).await,
        // Token desconocido: puede ser de otro bot con el mismo prefijo
        _ => return,
    };

    if let Err(err) = result {
        warn!("Comando `{command}` falló en guild {guild_id}: {err}");

        let embed = embeds::error_embed(&err);
        let envio = msg
            .channel_id
            .send_message(&ctx.http, CreateMessage::new().embed(embed))
            .await;
        if let Err(e) = envio {
            error!("No se pudo informar del error al usuario: {e}");
        }
    }
}

/// Separa `prefijo + comando + resto-de-línea`. Devuelve `None` si el mensaje
/// no va dirigido al bot.
fn parse_command<'a>(content: &'a str, prefix: &str) -> Option<(&'a str, &'a str)> {
    let rest = content.trim().strip_prefix(prefix)?;
    let mut parts = rest.trim().splitn(2, char::is_whitespace);
    let command = parts.next().filter(|token| !token.is_empty())?;
    let args = parts.next().unwrap_or("").trim();

    Some((command, args))
}

// Comandos

async fn cmd_join(ctx: &Context, msg: &Message, guild_id: GuildId) -> MusicResult<()> {
    let manager = voice_manager(ctx).await?;
    let channel = user_voice_channel(ctx, guild_id, msg.author.id)?;

    // `join` mueve la conexión si ya estaba en otro canal del guild
    manager.join(guild_id, channel).await?;

    msg.channel_id
        .say(&ctx.http, format!("🔊 Conectado a <#{channel}>"))
        .await?;

    Ok(())
}

async fn cmd_play(
    ctx: &Context,
    msg: &Message,
    bot: &MelodiaBot,
    guild_id: GuildId,
    args: &str,
) -> MusicResult<()> {
    if args.is_empty() {
        return Err(MusicError::EmptyQuery);
    }

    let manager = voice_manager(ctx).await?;
    ensure_connected(ctx, msg, guild_id, &manager).await?;

    let session = ensure_session(ctx, bot, guild_id, msg.channel_id, &manager);

    // La resolución corre en la tarea de este comando; los bucles de otros
    // guilds no la ven pasar.
    let track = bot.resolver.resolve(args, msg.author.id).await?;
    let info = track.info();
    let position = session.enqueue(track)?;

    let embed = embeds::track_added_embed(&info, position);
    msg.channel_id
        .send_message(&ctx.http, CreateMessage::new().embed(embed))
        .await?;

    Ok(())
}

async fn cmd_volume(
    ctx: &Context,
    msg: &Message,
    bot: &MelodiaBot,
    guild_id: GuildId,
    args: &str,
) -> MusicResult<()> {
    let percent: i64 = args
        .parse()
        .map_err(|_| MusicError::InvalidVolume(args.to_string()))?;
    let volume = validate_volume(percent)?;

    let manager = voice_manager(ctx).await?;
    if manager.get(guild_id).is_none() {
        return Err(MusicError::NotConnected);
    }
    let session = ensure_session(ctx, bot, guild_id, msg.channel_id, &manager);

    // Persiste para los siguientes tracks y, si hay uno sonando, ajusta el
    // sink en vivo con su volumen efectivo.
    if let Some((handle, effective)) = session.set_volume(volume) {
        let _ = handle.set_volume(effective);
    }

    msg.channel_id
        .say(&ctx.http, format!("🔊 Volumen establecido al {percent}%"))
        .await?;

    Ok(())
}

/// Rango aceptado inclusivo por ambos extremos: 0 silencia, 100 es el máximo.
fn validate_volume(percent: i64) -> MusicResult<f32> {
    if (0..=100).contains(&percent) {
        Ok(percent as f32 / 100.0)
    } else {
        Err(MusicError::InvalidVolume(percent.to_string()))
    }
}

async fn cmd_skip(
    ctx: &Context,
    msg: &Message,
    bot: &MelodiaBot,
    guild_id: GuildId,
) -> MusicResult<()> {
    let manager = voice_manager(ctx).await?;
    if manager.get(guild_id).is_none() {
        return Err(MusicError::NotConnected);
    }

    let handle = bot
        .registry
        .get(guild_id)
        .and_then(|session| session.current_handle())
        .ok_or(MusicError::NothingPlaying)?;

    // El stop del sink dispara la misma señal de finalización que el fin
    // natural; el bucle avanza al siguiente track por sí solo.
    let _ = handle.stop();

    msg.channel_id.say(&ctx.http, "⏭️ Canción saltada").await?;

    Ok(())
}

async fn cmd_stop(
    ctx: &Context,
    msg: &Message,
    bot: &MelodiaBot,
    guild_id: GuildId,
) -> MusicResult<()> {
    let manager = voice_manager(ctx).await?;
    if manager.get(guild_id).is_none() && bot.registry.get(guild_id).is_none() {
        return Err(MusicError::NotConnected);
    }

    bot.registry.cleanup(&manager, guild_id).await;

    msg.channel_id
        .say(&ctx.http, "⏹️ Música detenida y cola vaciada")
        .await?;

    Ok(())
}

async fn cmd_queue(
    ctx: &Context,
    msg: &Message,
    bot: &MelodiaBot,
    guild_id: GuildId,
) -> MusicResult<()> {
    let snapshot = bot.registry.get(guild_id).map(|session| session.snapshot());

    match snapshot {
        Some(snapshot) if !snapshot.is_empty() => {
            let embed = embeds::queue_embed(&snapshot);
            msg.channel_id
                .send_message(&ctx.http, CreateMessage::new().embed(embed))
                .await?;
        }
        _ => {
            msg.channel_id.say(&ctx.http, "📭 La cola está vacía").await?;
        }
    }

    Ok(())
}

async fn cmd_pause(
    ctx: &Context,
    msg: &Message,
    bot: &MelodiaBot,
    guild_id: GuildId,
) -> MusicResult<()> {
    let handle = bot
        .registry
        .get(guild_id)
        .and_then(|session| session.current_handle())
        .ok_or(MusicError::NothingPlaying)?;

    let _ = handle.pause();
    msg.channel_id
        .say(&ctx.http, "⏸️ Reproducción pausada")
        .await?;

    Ok(())
}

async fn cmd_resume(
    ctx: &Context,
    msg: &Message,
    bot: &MelodiaBot,
    guild_id: GuildId,
) -> MusicResult<()> {
    let handle = bot
        .registry
        .get(guild_id)
        .and_then(|session| session.current_handle())
        .ok_or(MusicError::NothingPlaying)?;

    let _ = handle.play();
    msg.channel_id
        .say(&ctx.http, "▶️ Reproducción reanudada")
        .await?;

    Ok(())
}

async fn cmd_leave(
    ctx: &Context,
    msg: &Message,
    bot: &MelodiaBot,
    guild_id: GuildId,
) -> MusicResult<()> {
    let manager = voice_manager(ctx).await?;
    if manager.get(guild_id).is_none() && bot.registry.get(guild_id).is_none() {
        return Err(MusicError::NotConnected);
    }

    bot.registry.cleanup(&manager, guild_id).await;

    msg.channel_id
        .say(&ctx.http, "👋 Me desconecté del canal de voz")
        .await?;

    Ok(())
}

async fn cmd_help(ctx: &Context, msg: &Message, bot: &MelodiaBot) -> MusicResult<()> {
    let embed = embeds::help_embed(&bot.config.command_prefix);
    msg.channel_id
        .send_message(&ctx.http, CreateMessage::new().embed(embed))
        .await?;

    Ok(())
}

// Auxiliares

async fn voice_manager(ctx: &Context) -> MusicResult<Arc<Songbird>> {
    songbird::get(ctx).await.ok_or(MusicError::VoiceClientMissing)
}

/// Canal de voz del invocante, según la vista de presencia de la caché.
fn user_voice_channel(
    ctx: &Context,
    guild_id: GuildId,
    user_id: UserId,
) -> MusicResult<ChannelId> {
    let guild = ctx
        .cache
        .guild(guild_id)
        .ok_or(MusicError::Discord(serenity::Error::Other(
            "guild fuera de caché",
        )))?;

    guild
        .voice_states
        .get(&user_id)
        .and_then(|voice_state| voice_state.channel_id)
        .ok_or(MusicError::NotInVoiceChannel)
}

/// Join implícito: conecta al canal del invocante solo si no hay conexión.
async fn ensure_connected(
    ctx: &Context,
    msg: &Message,
    guild_id: GuildId,
    manager: &Arc<Songbird>,
) -> MusicResult<()> {
    if manager.get(guild_id).is_none() {
        let channel = user_voice_channel(ctx, guild_id, msg.author.id)?;
        manager.join(guild_id, channel).await?;
    }

    Ok(())
}

/// Sesión del guild, creándola y arrancando su bucle si es la primera vez.
fn ensure_session(
    ctx: &Context,
    bot: &MelodiaBot,
    guild_id: GuildId,
    origin_channel: ChannelId,
    manager: &Arc<Songbird>,
) -> Arc<GuildSession> {
    let (session, created) = bot.registry.get_or_create(
        guild_id,
        origin_channel,
        bot.config.default_volume,
        bot.config.max_queue_size,
    );

    if created {
        playback::spawn(
            session.clone(),
            PlaybackContext {
                manager: manager.clone(),
                http: ctx.http.clone(),
                registry: bot.registry.clone(),
                idle_timeout: bot.config.idle_timeout(),
            },
        );
    }

    session
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn parse_ignora_mensajes_sin_prefijo() {
        assert_eq!(parse_command("hola que tal", "!"), None);
        assert_eq!(parse_command("", "!"), None);
        assert_eq!(parse_command("!", "!"), None);
        assert_eq!(parse_command("!   ", "!"), None);
    }

    #[test]
    fn parse_separa_comando_y_argumentos() {
        assert_eq!(parse_command("!play lofi beats", "!"), Some(("play", "lofi beats")));
        assert_eq!(parse_command("!skip", "!"), Some(("skip", "")));
        // El resto de línea se conserva entero, espacios internos incluidos
        assert_eq!(
            parse_command("!p   night drive 2   ", "!"),
            Some(("p", "night drive 2"))
        );
    }

    #[test]
    fn parse_respeta_prefijos_de_varios_caracteres() {
        assert_eq!(parse_command("m!queue", "m!"), Some(("queue", "")));
        assert_eq!(parse_command("!queue", "m!"), None);
    }

    #[test]
    fn el_volumen_acepta_los_extremos_del_rango() {
        assert_eq!(validate_volume(0).unwrap(), 0.0);
        assert_eq!(validate_volume(50).unwrap(), 0.5);
        assert_eq!(validate_volume(100).unwrap(), 1.0);
    }

    #[test]
    fn el_volumen_rechaza_fuera_de_rango() {
        assert!(validate_volume(-1).is_err());
        assert!(validate_volume(101).is_err());
        assert!(validate_volume(1000).is_err());
    }
}
