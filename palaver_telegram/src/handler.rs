//! Update dispatch: routes messages and callback queries to commands,
//! attachment handling, or the response pipeline, and persists the
//! resulting turns.

use crate::attach;
use crate::bot::Gateway;
use crate::command::Command;
use crate::pipeline::{self, Reply};
use crate::request::ChatRequest;
use crate::types::{CallbackQuery, Message, Update};
use palaver_conversation::UiTimer;
use palaver_core::{Role, SUPPORTED_MODELS, find_model, find_persona};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// Lifetime of the model picker keyboard.
const MODEL_LIST_TIMEOUT: Duration = Duration::from_secs(8);
/// Lifetime of the persona picker keyboard.
const ROLE_LIST_TIMEOUT: Duration = Duration::from_secs(6);

/// Entry point for one accepted update. Never returns an error: every
/// failure ends as a chat notice or a log line, never an error bubbled
/// back to the webhook.
pub(crate) async fn handle_update(gateway: &Arc<Gateway>, update: Update) {
    if let Some(message) = update.message {
        handle_message(gateway, message).await;
    } else if let Some(callback) = update.callback_query {
        handle_callback(gateway, callback).await;
    }
}

async fn handle_message(gateway: &Arc<Gateway>, message: Message) {
    let chat_id = message.chat.id;
    if message.photo.is_some() {
        if let Some(group_id) = message.media_group_id.clone() {
            attach::buffer_grouped_photo(gateway, chat_id, &group_id, &message).await;
            return;
        }
        if let Some(request) = attach::photo_request(gateway, chat_id, &message).await {
            respond_with(gateway, chat_id, request).await;
        }
        return;
    }
    if message.document.is_some() {
        if let Some(request) = attach::document_request(gateway, chat_id, &message).await {
            respond_with(gateway, chat_id, request).await;
        }
        return;
    }
    if message.voice.is_some() {
        if let Some(request) = attach::voice_request(gateway, chat_id, &message).await {
            respond_with(gateway, chat_id, request).await;
        }
        return;
    }
    if message.audio.is_some() {
        if let Some(request) = attach::audio_request(gateway, chat_id, &message).await {
            respond_with(gateway, chat_id, request).await;
        }
        return;
    }
    if let Some(text) = message.text.as_deref() {
        handle_text(gateway, &message, text).await;
    }
}

async fn handle_text(gateway: &Arc<Gateway>, message: &Message, text: &str) {
    let chat_id = message.chat.id;
    let username = message.sender_name();
    if let Some(command) = Command::parse(text) {
        info!("[@{username}] Command: {text}");
        run_command(gateway, message, command).await;
        return;
    }
    info!("[@{username}] Message: {text}");
    let search = gateway.store.search_mode(chat_id).await;
    if search && text.trim().is_empty() {
        gateway
            .outbox
            .send(chat_id, "❌ Please provide search content", false)
            .await;
        return;
    }
    respond_with(
        gateway,
        chat_id,
        ChatRequest::Text {
            content: text.to_string(),
            search,
        },
    )
    .await;
}

/// Runs one request through the pipeline and delivers the outcome.
async fn respond_with(gateway: &Arc<Gateway>, chat_id: i64, request: ChatRequest) {
    let user_content = request.content().to_string();
    let reply = pipeline::respond(gateway, chat_id, request).await;
    deliver(gateway, chat_id, &user_content, reply).await;
}

/// Applies a pipeline outcome to the chat: successful turns are recorded
/// in history, failure notices are sent but never recorded.
pub(crate) async fn deliver(gateway: &Gateway, chat_id: i64, user_content: &str, reply: Reply) {
    match reply {
        Reply::ImagesSent { caption } => {
            gateway
                .store
                .append_turn(chat_id, Role::User, user_content)
                .await;
            gateway
                .store
                .append_turn(chat_id, Role::Assistant, caption.trim())
                .await;
        }
        Reply::Text { full, answer } => {
            gateway
                .store
                .append_turn(chat_id, Role::User, user_content)
                .await;
            gateway.outbox.send(chat_id, &full, true).await;
            gateway
                .store
                .append_turn(chat_id, Role::Assistant, answer.trim())
                .await;
        }
        Reply::Failure { notice } => {
            gateway.outbox.send(chat_id, &notice, true).await;
        }
    }
}

async fn run_command(gateway: &Arc<Gateway>, message: &Message, command: Command) {
    let chat_id = message.chat.id;
    match command {
        Command::Start => {
            gateway
                .outbox
                .send(chat_id, Command::welcome_text(), false)
                .await;
        }
        Command::Model => {
            if message.chat.kind != "private" {
                gateway
                    .outbox
                    .send(chat_id, "❌ Model switching only available in private chats", false)
                    .await;
                return;
            }
            let models: Vec<&str> = SUPPORTED_MODELS.iter().map(|spec| spec.id).collect();
            let sent = gateway
                .outbox
                .send_list_with_timeout(chat_id, "Choose a model:", &models, MODEL_LIST_TIMEOUT)
                .await;
            if sent.is_none() {
                gateway
                    .outbox
                    .send(chat_id, "❌ Failed to send model list, please try again", false)
                    .await;
            }
        }
        Command::Role => show_role_list(gateway, chat_id).await,
        Command::Balance(scope) => {
            let report = balance_report(gateway, scope.as_deref()).await;
            gateway.outbox.send(chat_id, &report, false).await;
        }
        Command::Clear => {
            gateway.store.clear_history(chat_id).await;
            gateway
                .outbox
                .send(chat_id, "✅ Conversation history cleared", false)
                .await;
        }
        Command::Search => {
            let enabled = gateway.store.toggle_search_mode(chat_id).await;
            let notice = if enabled {
                "🔍 <b>Search mode enabled</b>. Enter your search query. Use <code>/search</code> again to disable."
            } else {
                "✅ <b>Search mode disabled</b>, returning to normal mode."
            };
            gateway.outbox.send(chat_id, notice, false).await;
        }
    }
}

/// Shows the persona picker, refreshing the live one in place when it is
/// still on screen.
async fn show_role_list(gateway: &Arc<Gateway>, chat_id: i64) {
    let active = gateway.store.persona(chat_id).await;
    if let Some(existing) = gateway.store.role_prompt_message(chat_id).await {
        if gateway
            .outbox
            .update_role_list(chat_id, existing, active.as_deref())
            .await
        {
            arm_role_expiry(gateway, chat_id, existing).await;
            return;
        }
    }
    resend_role_list(gateway, chat_id, active.as_deref()).await;
}

async fn resend_role_list(gateway: &Arc<Gateway>, chat_id: i64, active: Option<&str>) {
    if let Some(message_id) = gateway.outbox.send_role_list(chat_id, active).await {
        arm_role_expiry(gateway, chat_id, message_id).await;
    }
}

/// Arms the picker expiry. Re-arming replaces the previous timer, so a
/// refreshed keyboard gets its full lifetime back; the expiry check keeps
/// a superseded timer from deleting a newer message.
async fn arm_role_expiry(gateway: &Arc<Gateway>, chat_id: i64, message_id: i64) {
    let expiry = Arc::clone(gateway);
    let timer = UiTimer::new(tokio::spawn(async move {
        tokio::time::sleep(ROLE_LIST_TIMEOUT).await;
        if expiry.store.expire_role_prompt(chat_id, message_id).await {
            expiry.outbox.delete_message(chat_id, message_id).await;
        }
    }));
    gateway.store.arm_role_prompt(chat_id, message_id, timer).await;
}

async fn handle_callback(gateway: &Arc<Gateway>, callback: CallbackQuery) {
    let Some(message) = callback.message.as_ref() else {
        warn!("Callback query without source message, ignoring");
        return;
    };
    let chat_id = message.chat.id;
    let message_id = message.message_id;
    // Keyboards live in private chats; a mismatched sender is someone
    // pressing buttons in a forwarded or group copy.
    if callback.from.id != chat_id {
        gateway
            .outbox
            .send(chat_id, "❌ Unauthorized to change other users' settings", false)
            .await;
        return;
    }
    let Some(data) = callback.data.as_deref() else {
        warn!("Callback query without data, ignoring");
        return;
    };

    if let Some(persona) = find_persona(data) {
        let selected = gateway.store.toggle_persona(chat_id, persona.key).await;
        let notice = match selected.as_deref().and_then(find_persona) {
            Some(spec) => {
                info!("Switched role for chat {chat_id} to {}", spec.key);
                format!("已切换到: <b>{}</b>", spec.display_name)
            }
            None => "已取消角色设定".to_string(),
        };
        refresh_role_list(gateway, chat_id, message_id, selected.as_deref()).await;
        gateway
            .outbox
            .send(chat_id, &format!("✅ {notice}"), false)
            .await;
    } else if let Some(spec) = find_model(data) {
        gateway.store.set_model(chat_id, spec.id).await;
        let notice = format!("✅ Switched model to: <b>{}</b>", spec.display_name);
        gateway.outbox.send(chat_id, &notice, false).await;
        gateway.outbox.delete_message(chat_id, message_id).await;
    }

    if let Err(e) = gateway.client.answer_callback(&callback.id).await {
        warn!("Callback query response failed: {e}");
    }
}

/// Redraws the picker the button press came from, falling back to a fresh
/// one when that message is already gone.
async fn refresh_role_list(
    gateway: &Arc<Gateway>,
    chat_id: i64,
    message_id: i64,
    active: Option<&str>,
) {
    let tracked = gateway.store.role_prompt_message(chat_id).await;
    if tracked == Some(message_id)
        && gateway
            .outbox
            .update_role_list(chat_id, message_id, active)
            .await
    {
        arm_role_expiry(gateway, chat_id, message_id).await;
        return;
    }
    resend_role_list(gateway, chat_id, active).await;
}

async fn balance_report(gateway: &Gateway, scope: Option<&str>) -> String {
    match scope {
        None | Some("all") => {
            let deepseek = deepseek_line(gateway.balances.deepseek().await);
            let openrouter = openrouter_line(gateway.balances.openrouter().await);
            format!("{deepseek}\n{openrouter}")
        }
        Some("deepseek" | "ds") => deepseek_line(gateway.balances.deepseek().await),
        Some("openrouter" | "or") => openrouter_line(gateway.balances.openrouter().await),
        Some(_) => {
            "❌ 无效的服务名称\n可用选项: <code>deepseek</code>, <code>openrouter</code>, <code>all</code>"
                .to_string()
        }
    }
}

fn deepseek_line(balance: Option<palaver_providers::DeepSeekBalance>) -> String {
    balance.map_or_else(
        || "⚠️ <b>DeepSeek</b>: 查询失败".to_string(),
        |b| format!("💰 <b>DeepSeek 余额</b>: {} {}", b.total, b.currency),
    )
}

fn openrouter_line(credit: Option<f64>) -> String {
    credit.map_or_else(
        || "⚠️ <b>OpenRouter</b>: 查询失败".to_string(),
        |amount| format!("💰 <b>OpenRouter 余额</b>: ${amount:.3} USD"),
    )
}
