use chrono::Utc;
use futures::stream::{self, StreamExt};
use std::io::ErrorKind;
use tracing::{debug, error, info, warn};

use super::context::BotContext;
use super::error::BotError;
use super::intent::{CallbackAction, Intent};
use super::menus;
use super::session::{BroadcastTarget, ConversationState};
use crate::calculator::{self, CalculatorState, CalculatorStep, Projection, Threshold, percent};
use crate::db;
use crate::deadlines::{DigestOutcome, TokenStatus};
use crate::telegram::keyboards::remove_keyboard;
use crate::telegram::models::{CallbackQuery, ChatKind, Message};
use crate::telegram::{
    MAX_MESSAGE_LEN, OutgoingMessage, ReplyMarkup, Update, escape_markdown_v2, pack_messages,
};

/// Stored as the display name when Telegram sends no first name.
const UNKNOWN_NAME: &str = "unknown";
const DIGEST_SEPARATOR: &str = "\n\n";
const EXPORT_FALLBACK_NAME: &str = "users.db";

/// Catalogue locale for a Telegram `language_code`.
pub fn locale_for(language_code: Option<&str>) -> &'static str {
    match language_code {
        Some(code) if code.to_lowercase().starts_with("ru") => "ru",
        _ => "en",
    }
}

/// Where an update came from and where the answer goes.
#[derive(Debug, Clone)]
struct Sender {
    chat_id: i64,
    chat_kind: ChatKind,
    /// Credential key: the Telegram user id, equal to the chat id in private chats.
    user_id: i64,
    first_name: Option<String>,
    locale: &'static str,
}

impl Sender {
    fn from_message(message: &Message) -> Self {
        let user = message.from.as_ref();
        Self {
            chat_id: message.chat.id,
            chat_kind: message.chat.kind,
            user_id: user.map_or(message.chat.id, |u| u.id),
            first_name: user.map(|u| u.first_name.clone()),
            locale: locale_for(user.and_then(|u| u.language_code.as_deref())),
        }
    }

    fn from_callback(query: &CallbackQuery, message: &Message) -> Self {
        Self {
            chat_id: message.chat.id,
            chat_kind: message.chat.kind,
            user_id: query.from.id,
            first_name: Some(query.from.first_name.clone()),
            locale: locale_for(query.from.language_code.as_deref()),
        }
    }

    fn is_private(&self) -> bool {
        self.chat_kind == ChatKind::Private
    }
}

/// Handles one update end to end. Failures are logged and answered, never propagated.
pub async fn handle_update(ctx: &BotContext, update: Update) {
    if let Some(message) = update.message {
        let sender = Sender::from_message(&message);
        let result = handle_message(ctx, &sender, &message).await;
        report(ctx, &sender, result).await;
    } else if let Some(query) = update.callback_query {
        let Some(message) = query.message.as_ref() else {
            debug!(update_id = update.update_id, "Callback without a message, ignoring.");
            return;
        };
        let sender = Sender::from_callback(&query, message);
        let result = handle_callback(ctx, &sender, &query, message.message_id).await;
        report(ctx, &sender, result).await;
    }
}

async fn report(ctx: &BotContext, sender: &Sender, result: Result<(), BotError>) {
    let Err(err) = result else {
        return;
    };
    match &err {
        BotError::Database(_) | BotError::Crypto(_) | BotError::Telegram(_) | BotError::Io(_) => {
            error!(chat_id = sender.chat_id, error = %err, "Update handler failed.");
        }
        _ => {
            info!(chat_id = sender.chat_id, error = %err, "Request rejected.");
        }
    }
    let message = OutgoingMessage::text(sender.chat_id, err.user_message(sender.locale));
    if let Err(e) = ctx.telegram.send_message(message).await {
        warn!(chat_id = sender.chat_id, error = %e, "Failed to deliver error message.");
    }
}

async fn say(ctx: &BotContext, chat_id: i64, text: impl Into<String>) -> Result<(), BotError> {
    ctx.telegram
        .send_message(OutgoingMessage::text(chat_id, text))
        .await?;
    Ok(())
}

async fn reply(
    ctx: &BotContext,
    chat_id: i64,
    text: impl Into<String>,
    markup: ReplyMarkup,
) -> Result<(), BotError> {
    ctx.telegram
        .send_message(OutgoingMessage::text(chat_id, text).with_markup(markup))
        .await?;
    Ok(())
}

async fn handle_message(
    ctx: &BotContext,
    sender: &Sender,
    message: &Message,
) -> Result<(), BotError> {
    let Some(text) = message.text.as_deref() else {
        if sender.is_private() {
            say(ctx, sender.chat_id, t!("common.text_only", locale = sender.locale)).await?;
        }
        return Ok(());
    };
    let intent = Intent::parse(text);

    if !sender.is_private() {
        // group chats only ask for deadlines
        return match intent {
            Some(Intent::Deadlines) => show_deadlines(ctx, sender).await,
            _ => Ok(()),
        };
    }

    let menu_intent = intent.filter(|i| *i != Intent::Exit);
    match ctx.sessions.get(sender.chat_id) {
        ConversationState::AwaitingBroadcast(_) if intent == Some(Intent::Exit) => {
            ctx.sessions.clear(sender.chat_id);
            reply(
                ctx,
                sender.chat_id,
                t!("admin.broadcast_canceled", locale = sender.locale),
                menus::admin_menu(),
            )
            .await
        }
        ConversationState::AwaitingBroadcast(target) => broadcast(ctx, sender, target, text).await,
        ConversationState::Calculator(state) if menu_intent.is_none() => {
            calculator_input(ctx, sender, state, text).await
        }
        ConversationState::AwaitingToken { updating } if intent.is_none() => {
            submit_token(ctx, sender, text, updating).await
        }
        _ => match intent {
            Some(intent) => {
                ctx.sessions.clear(sender.chat_id);
                route(ctx, sender, intent).await
            }
            None => {
                reply(
                    ctx,
                    sender.chat_id,
                    t!("common.unknown", locale = sender.locale),
                    menus::main_menu(ctx.config.is_admin(sender.chat_id)),
                )
                .await
            }
        },
    }
}

async fn route(ctx: &BotContext, sender: &Sender, intent: Intent) -> Result<(), BotError> {
    if intent.is_admin_only() && !ctx.config.is_admin(sender.chat_id) {
        return Err(BotError::NotAdmin);
    }
    let locale = sender.locale;
    match intent {
        Intent::Start => start(ctx, sender).await,
        Intent::Deadlines => show_deadlines(ctx, sender).await,
        Intent::Calculator => {
            reply(
                ctx,
                sender.chat_id,
                t!("calculator.info", locale = locale),
                menus::calculator_menu(),
            )
            .await
        }
        Intent::Scholarship => {
            ctx.sessions.set(
                sender.chat_id,
                ConversationState::Calculator(CalculatorState::AwaitingMidTerm),
            );
            reply(
                ctx,
                sender.chat_id,
                t!("calculator.ask_mid_term", locale = locale),
                menus::exit_menu(),
            )
            .await
        }
        Intent::Gpa => {
            reply(
                ctx,
                sender.chat_id,
                t!("calculator.gpa_soon", locale = locale),
                menus::calculator_menu(),
            )
            .await
        }
        Intent::Profile => show_profile(ctx, sender).await,
        Intent::Admin => {
            reply(
                ctx,
                sender.chat_id,
                t!("admin.welcome", locale = locale),
                menus::admin_menu(),
            )
            .await
        }
        Intent::ExportUsers => export_users(ctx, sender).await,
        Intent::Broadcast => {
            reply(
                ctx,
                sender.chat_id,
                t!("menu.choose_action", locale = locale),
                menus::broadcast_menu(),
            )
            .await
        }
        Intent::BroadcastUsers => begin_broadcast(ctx, sender, BroadcastTarget::Users).await,
        Intent::BroadcastGroups => begin_broadcast(ctx, sender, BroadcastTarget::Groups).await,
        Intent::Exit => show_main_menu(ctx, sender).await,
    }
}

async fn show_main_menu(ctx: &BotContext, sender: &Sender) -> Result<(), BotError> {
    reply(
        ctx,
        sender.chat_id,
        t!("menu.choose_action", locale = sender.locale),
        menus::main_menu(ctx.config.is_admin(sender.chat_id)),
    )
    .await
}

/// Link target inside MarkdownV2 `(...)`: only `)` and `\` need escaping.
fn escape_link_url(url: &str) -> String {
    url.replace('\\', "\\\\").replace(')', "\\)")
}

fn welcome_text(locale: &str, token_help_url: Option<&str>) -> String {
    let mut text = escape_markdown_v2(&t!("start.welcome", locale = locale));
    if let Some(url) = token_help_url {
        text.push_str(&format!(
            "\n\n[{}]({})",
            escape_markdown_v2(&t!("start.token_link", locale = locale)),
            escape_link_url(url)
        ));
    }
    text
}

async fn start(ctx: &BotContext, sender: &Sender) -> Result<(), BotError> {
    if ctx.store.is_registered(sender.user_id).await? {
        return show_main_menu(ctx, sender).await;
    }
    ctx.sessions.set(
        sender.chat_id,
        ConversationState::AwaitingToken { updating: false },
    );
    let text = welcome_text(sender.locale, ctx.config.token_help_url.as_deref());
    ctx.telegram
        .send_message(
            OutgoingMessage::text(sender.chat_id, text)
                .markdown()
                .with_markup(remove_keyboard()),
        )
        .await?;
    Ok(())
}

/// Opens the token prompt so the next message registers the chat.
fn await_first_token(ctx: &BotContext, sender: &Sender) -> BotError {
    ctx.sessions.set(
        sender.chat_id,
        ConversationState::AwaitingToken { updating: false },
    );
    BotError::NotRegistered
}

async fn submit_token(
    ctx: &BotContext,
    sender: &Sender,
    text: &str,
    updating: bool,
) -> Result<(), BotError> {
    let token = text.trim();
    match ctx.aggregator.check_token(token).await {
        TokenStatus::Valid(lms_user_id) => {
            let name = sender.first_name.as_deref().unwrap_or(UNKNOWN_NAME);
            ctx.store.put(sender.user_id, name, token).await?;
            ctx.sessions.clear(sender.chat_id);
            info!(
                chat_id = sender.chat_id,
                lms_user_id, updating, "LMS token registered."
            );
            let confirmation = if updating {
                t!("token.updated", locale = sender.locale)
            } else {
                t!("token.registered", locale = sender.locale)
            };
            reply(
                ctx,
                sender.chat_id,
                confirmation,
                menus::main_menu(ctx.config.is_admin(sender.chat_id)),
            )
            .await
        }
        TokenStatus::Rejected => Err(BotError::InvalidCredential),
        TokenStatus::Unreachable => Err(BotError::RemoteUnavailable),
    }
}

async fn show_deadlines(ctx: &BotContext, sender: &Sender) -> Result<(), BotError> {
    if !sender.is_private() && ctx.store.register_group_chat(sender.chat_id).await? {
        info!(chat_id = sender.chat_id, "Group chat registered.");
    }

    let Some(token) = ctx.store.get(sender.user_id).await? else {
        if sender.is_private() {
            return Err(await_first_token(ctx, sender));
        }
        return say(
            ctx,
            sender.chat_id,
            t!("token.register_in_private", locale = sender.locale),
        )
        .await;
    };

    let Some(_ticket) = ctx.guard.try_acquire(sender.chat_id) else {
        debug!(chat_id = sender.chat_id, "Deadline digest already in flight.");
        return say(
            ctx,
            sender.chat_id,
            t!("deadlines.in_progress", locale = sender.locale),
        )
        .await;
    };

    let locale = sender.locale;
    let messages = match ctx.aggregator.build_digest(&token, Utc::now()).await {
        DigestOutcome::InvalidToken => vec![t!("deadlines.invalid_token", locale = locale).into_owned()],
        DigestOutcome::NoCourses => vec![t!("deadlines.no_courses", locale = locale).into_owned()],
        DigestOutcome::NoDeadlines => vec![t!("deadlines.none", locale = locale).into_owned()],
        DigestOutcome::Digest(entries) => {
            let offset = ctx.config.display_offset();
            let parts: Vec<String> = entries.iter().map(|e| e.render(&offset)).collect();
            pack_messages(&parts, DIGEST_SEPARATOR, MAX_MESSAGE_LEN)
        }
    };
    for text in messages {
        say(ctx, sender.chat_id, text).await?;
    }
    Ok(())
}

/// Final-exam requirements as shown to the user; every figure is truncated to a whole percent.
pub fn render_projection(projection: &Projection, locale: &str) -> String {
    let high = match projection.high_scholarship_threshold {
        Threshold::Reachable(value) => format!("{}%", percent(value)),
        Threshold::Unreachable => t!("calculator.unreachable", locale = locale).into_owned(),
    };
    t!(
        "calculator.result",
        locale = locale,
        retake = percent(projection.retake_threshold).to_string(),
        scholarship = percent(projection.scholarship_threshold).to_string(),
        high = high,
        total = percent(projection.final_if_max).to_string()
    )
    .into_owned()
}

async fn calculator_input(
    ctx: &BotContext,
    sender: &Sender,
    state: CalculatorState,
    text: &str,
) -> Result<(), BotError> {
    let locale = sender.locale;
    match calculator::advance(state, text) {
        CalculatorStep::Advanced(next) => {
            ctx.sessions
                .set(sender.chat_id, ConversationState::Calculator(next));
            reply(
                ctx,
                sender.chat_id,
                t!("calculator.ask_end_term", locale = locale),
                menus::exit_menu(),
            )
            .await
        }
        CalculatorStep::Reprompt(state, e) => {
            // keeps the step and refreshes the idle timer
            ctx.sessions
                .set(sender.chat_id, ConversationState::Calculator(state));
            Err(e.into())
        }
        CalculatorStep::Done(projection) => {
            ctx.sessions.clear(sender.chat_id);
            reply(
                ctx,
                sender.chat_id,
                render_projection(&projection, locale),
                menus::calculator_menu(),
            )
            .await
        }
        CalculatorStep::Exit => {
            ctx.sessions.clear(sender.chat_id);
            show_main_menu(ctx, sender).await
        }
    }
}

async fn show_profile(ctx: &BotContext, sender: &Sender) -> Result<(), BotError> {
    let Some(record) = ctx.store.get_record(sender.user_id).await? else {
        return Err(await_first_token(ctx, sender));
    };
    reply(
        ctx,
        sender.chat_id,
        t!("profile.your_token", locale = sender.locale, token = record.token),
        menus::profile_keyboard(),
    )
    .await
}

async fn handle_callback(
    ctx: &BotContext,
    sender: &Sender,
    query: &CallbackQuery,
    message_id: i64,
) -> Result<(), BotError> {
    if let Err(e) = ctx.telegram.answer_callback_query(&query.id).await {
        warn!(chat_id = sender.chat_id, error = %e, "Failed to answer callback query.");
    }
    let Some(action) = query.data.as_deref().and_then(CallbackAction::parse) else {
        debug!(chat_id = sender.chat_id, data = ?query.data, "Unknown callback data.");
        return Ok(());
    };

    match action {
        CallbackAction::DeleteToken => {
            let removed = ctx.store.delete(sender.user_id).await?;
            info!(chat_id = sender.chat_id, removed, "LMS token deleted on request.");
            ctx.telegram
                .edit_message_text(
                    sender.chat_id,
                    message_id,
                    &t!("token.deleted", locale = sender.locale),
                )
                .await?;
            start(ctx, sender).await
        }
        CallbackAction::ModifyToken => {
            ctx.sessions.set(
                sender.chat_id,
                ConversationState::AwaitingToken { updating: true },
            );
            ctx.telegram
                .edit_message_text(
                    sender.chat_id,
                    message_id,
                    &t!("token.ask_new", locale = sender.locale),
                )
                .await?;
            Ok(())
        }
        CallbackAction::CloseProfile => {
            ctx.telegram
                .delete_message(sender.chat_id, message_id)
                .await?;
            show_main_menu(ctx, sender).await
        }
    }
}

async fn export_users(ctx: &BotContext, sender: &Sender) -> Result<(), BotError> {
    let Some(path) = db::database_file_path(&ctx.config.database_url) else {
        return say(
            ctx,
            sender.chat_id,
            t!("admin.users_not_found", locale = sender.locale),
        )
        .await;
    };
    // WAL pages must be folded into the main file before it is copied
    sqlx::query("PRAGMA wal_checkpoint(FULL)")
        .execute(ctx.store.pool())
        .await?;
    let bytes = match tokio::fs::read(&path).await {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == ErrorKind::NotFound => {
            return say(
                ctx,
                sender.chat_id,
                t!("admin.users_not_found", locale = sender.locale),
            )
            .await;
        }
        Err(e) => return Err(e.into()),
    };
    let file_name = path
        .file_name()
        .and_then(|name| name.to_str())
        .unwrap_or(EXPORT_FALLBACK_NAME);
    let size = bytes.len();
    ctx.telegram
        .send_document(sender.chat_id, file_name, bytes)
        .await?;
    info!(chat_id = sender.chat_id, bytes = size, "User database exported.");
    Ok(())
}

async fn begin_broadcast(
    ctx: &BotContext,
    sender: &Sender,
    target: BroadcastTarget,
) -> Result<(), BotError> {
    ctx.sessions
        .set(sender.chat_id, ConversationState::AwaitingBroadcast(target));
    reply(
        ctx,
        sender.chat_id,
        t!("admin.enter_broadcast", locale = sender.locale),
        menus::exit_menu(),
    )
    .await
}

async fn broadcast(
    ctx: &BotContext,
    sender: &Sender,
    target: BroadcastTarget,
    text: &str,
) -> Result<(), BotError> {
    ctx.sessions.clear(sender.chat_id);
    if !ctx.config.is_admin(sender.chat_id) {
        return Err(BotError::NotAdmin);
    }
    let recipients = match target {
        BroadcastTarget::Users => ctx.store.list_user_chat_ids().await?,
        BroadcastTarget::Groups => ctx.store.list_group_chat_ids().await?,
    };
    let total = recipients.len();

    let delivered = stream::iter(recipients)
        .map(|chat_id| async move {
            match ctx
                .telegram
                .send_message(OutgoingMessage::text(chat_id, text))
                .await
            {
                Ok(()) => true,
                Err(e) => {
                    warn!(chat_id, error = %e, "Broadcast delivery failed.");
                    false
                }
            }
        })
        .buffer_unordered(ctx.config.max_concurrent_requests.max(1))
        .filter(|ok| futures::future::ready(*ok))
        .count()
        .await;
    let failed = total - delivered;
    info!(?target, delivered, failed, "Broadcast finished.");

    reply(
        ctx,
        sender.chat_id,
        t!(
            "admin.broadcast_done",
            locale = sender.locale,
            sent = delivered.to_string(),
            failed = failed.to_string()
        ),
        menus::admin_menu(),
    )
    .await
}
