use serde::{Deserialize, Serialize};
use teloxide::{
    dispatching::{
        dialogue::{self, Dialogue, InMemStorage, InMemStorageError},
        UpdateHandler,
    },
    prelude::*,
    types::{
        CallbackQuery, ChatMemberStatus, FileId, InlineKeyboardButton, InlineKeyboardMarkup,
        InputFile, ReplyParameters,
    },
    utils::command::BotCommands,
};
use thiserror::Error;
use tracing::warn;

use crate::config::Config;
use crate::hygiene::LastMessages;
use crate::storage::{CatalogStore, StorageError};

/* ====== Данные callback-кнопок ======
   check_subscription — кнопка «Подписался»
   movie:<название>   — выбор фильма из меню */
const CHECK_SUBSCRIPTION: &str = "check_subscription";
const MOVIE_PREFIX: &str = "movie";

/// Название для видео, присланного без подписи.
const UNTITLED: &str = "Без названия";

#[derive(Debug, Error)]
pub enum BotError {
    #[error("telegram api: {0}")]
    Telegram(#[from] teloxide::RequestError),
    #[error("dialogue storage: {0}")]
    Dialogue(#[from] InMemStorageError),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

type HandlerResult = Result<(), BotError>;
type BotDialogue = Dialogue<State, InMemStorage<State>>;

/// Где пользователь находится в сценарии: ждём подтверждения подписки
/// или уже в меню. Заводится при первом контакте, живёт до рестарта.
#[derive(Clone, Default, Debug, Serialize, Deserialize)]
pub enum State {
    #[default]
    AwaitingSubscription,
    InMenu,
}

/* ====== Команды ====== */
#[derive(BotCommands, Clone)]
#[command(rename_rule = "lowercase", description = "Команды:")]
enum Command {
    /// начать работу с ботом
    #[command(description = "начать работу с ботом")]
    Start,
}

pub async fn run(bot: Bot, config: Config, catalog: CatalogStore, last_messages: LastMessages) {
    Dispatcher::builder(bot, schema())
        .dependencies(dptree::deps![
            config,
            catalog,
            last_messages,
            InMemStorage::<State>::new()
        ])
        .enable_ctrlc_handler()
        .build()
        .dispatch()
        .await;
}

fn schema() -> UpdateHandler<BotError> {
    let message_handler = Update::filter_message()
        .branch(
            dptree::entry()
                .filter_command::<Command>()
                .endpoint(on_command),
        )
        .branch(
            dptree::filter(|msg: Message| msg.video().is_some()).endpoint(on_video_upload),
        )
        .branch(dptree::endpoint(on_unrecognized));

    let callback_handler = Update::filter_callback_query()
        .branch(
            dptree::filter(|q: CallbackQuery| q.data.as_deref() == Some(CHECK_SUBSCRIPTION))
                .endpoint(on_check_subscription),
        )
        .branch(dptree::endpoint(on_movie_selected));

    dialogue::enter::<Update, InMemStorage<State>, State, _>()
        .branch(message_handler)
        .branch(callback_handler)
}

/* ====== Команды ====== */
async fn on_command(
    bot: Bot,
    dialogue: BotDialogue,
    config: Config,
    msg: Message,
    cmd: Command,
) -> HandlerResult {
    match cmd {
        Command::Start => {
            let text = match config.channel_tag() {
                Some(tag) => format!(
                    "Для использования бота подпишитесь на спонсорский канал {tag} и нажмите «Подписался»."
                ),
                None => "Для использования бота подпишитесь на спонсорский канал и нажмите «Подписался»."
                    .to_string(),
            };
            bot.send_message(msg.chat.id, text)
                .reply_markup(subscribe_keyboard())
                .await?;
            dialogue.update(State::AwaitingSubscription).await?;
        }
    }
    Ok(())
}

/* ====== Проверка подписки ====== */
async fn on_check_subscription(
    bot: Bot,
    dialogue: BotDialogue,
    config: Config,
    catalog: CatalogStore,
    q: CallbackQuery,
) -> HandlerResult {
    let subscribed = match bot.get_chat_member(config.channel(), q.from.id).await {
        Ok(member) => is_subscribed(member.status()),
        // не смогли спросить канал — считаем, что подписки нет, кнопка останется
        Err(err) => {
            warn!(error = %err, user_id = q.from.id.0, "не удалось проверить подписку");
            false
        }
    };

    if subscribed {
        bot.answer_callback_query(q.id.clone()).await?;
        if let Some(msg) = q.message.as_ref() {
            bot.edit_message_text(
                msg.chat().id,
                msg.id(),
                "Спасибо за подписку! Добро пожаловать в меню.",
            )
            .await?;
            send_menu(&bot, msg.chat().id, &catalog).await?;
        }
        dialogue.update(State::InMenu).await?;
    } else {
        bot.answer_callback_query(q.id.clone())
            .text("Пожалуйста, подпишитесь на канал и повторите попытку.")
            .show_alert(true)
            .await?;
    }
    Ok(())
}

/// Статусы участника канала, которые считаются подпиской.
fn is_subscribed(status: ChatMemberStatus) -> bool {
    matches!(
        status,
        ChatMemberStatus::Member | ChatMemberStatus::Administrator | ChatMemberStatus::Owner
    )
}

/* ====== Меню и выбор фильма ====== */
async fn send_menu(bot: &Bot, chat_id: ChatId, catalog: &CatalogStore) -> HandlerResult {
    let titles = catalog.list_titles().await?;
    if titles.is_empty() {
        bot.send_message(chat_id, "В данный момент нет доступных фильмов.")
            .await?;
        return Ok(());
    }
    bot.send_message(chat_id, "Выберите фильм:")
        .reply_markup(menu_keyboard(&titles))
        .await?;
    Ok(())
}

// выбор принимается из любого состояния: кнопки старого меню должны работать
async fn on_movie_selected(bot: Bot, catalog: CatalogStore, q: CallbackQuery) -> HandlerResult {
    let Some(data) = q.data.clone() else {
        return Ok(());
    };
    let Some(msg) = q.message.as_ref() else {
        return Ok(());
    };
    let chat_id = msg.chat().id;

    let Some(title) = parse_movie_title(&data) else {
        answer_cb(&bot, &q, "Неизвестная команда").await?;
        return Ok(());
    };

    bot.answer_callback_query(q.id.clone()).await?;
    match catalog.find_by_title(title).await? {
        Some(media_ref) => {
            bot.send_video(chat_id, InputFile::file_id(FileId(media_ref)))
                .caption(format!("Фильм: {title}"))
                .await?;
        }
        None => {
            bot.send_message(chat_id, "Фильм не найден.").await?;
        }
    }
    Ok(())
}

/* ====== Загрузка фильмов (только для загрузчиков из конфига) ====== */
async fn on_video_upload(
    bot: Bot,
    config: Config,
    catalog: CatalogStore,
    msg: Message,
) -> HandlerResult {
    let from_uploader = msg
        .from
        .as_ref()
        .is_some_and(|user| config.is_uploader(user.id));
    if !from_uploader {
        bot.send_message(msg.chat.id, "У вас нет прав для загрузки фильмов.")
            .reply_parameters(ReplyParameters::new(msg.id))
            .await?;
        return Ok(());
    }

    let Some(video) = msg.video() else {
        return Ok(());
    };
    let title = upload_title(msg.caption());
    let reply = match catalog.insert(&title, &video.file.id.0).await {
        Ok(()) => format!("Фильм «{title}» успешно сохранён!"),
        Err(StorageError::DuplicateTitle(_)) => {
            "Фильм с таким названием уже существует.".to_string()
        }
        Err(e) => return Err(e.into()),
    };
    bot.send_message(msg.chat.id, reply)
        .reply_parameters(ReplyParameters::new(msg.id))
        .await?;
    Ok(())
}

/* ====== Всё, что не распознано ====== */
async fn on_unrecognized(bot: Bot, last_messages: LastMessages, msg: Message) -> HandlerResult {
    let chat_id = msg.chat.id;

    // удаляем и триггер, и прошлую подсказку; ошибки удаления игнорируем
    bot.delete_message(chat_id, msg.id).await.ok();
    if let Some(previous) = last_messages.get(chat_id).await {
        bot.delete_message(chat_id, previous).await.ok();
    }

    let sent = bot
        .send_message(
            chat_id,
            "Команда не распознана. Введите /start для начала работы с ботом.",
        )
        .await?;
    last_messages.set(chat_id, sent.id).await;
    Ok(())
}

/* ====== Кнопки ====== */

fn subscribe_keyboard() -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new([[InlineKeyboardButton::callback(
        "Подписался",
        CHECK_SUBSCRIPTION,
    )]])
}

fn menu_keyboard(titles: &[String]) -> InlineKeyboardMarkup {
    // по одной кнопке в строке
    let rows = titles
        .iter()
        .map(|title| vec![InlineKeyboardButton::callback(title.clone(), movie_payload(title))])
        .collect::<Vec<_>>();
    InlineKeyboardMarkup::new(rows)
}

/* ====== Вспомогательные ====== */

fn movie_payload(title: &str) -> String {
    format!("{MOVIE_PREFIX}:{title}")
}

fn parse_movie_title(data: &str) -> Option<&str> {
    let mut parts = data.splitn(2, ':');
    match (parts.next(), parts.next()) {
        (Some(MOVIE_PREFIX), Some(title)) => Some(title),
        _ => None,
    }
}

fn upload_title(caption: Option<&str>) -> String {
    match caption.filter(|c| !c.is_empty()) {
        Some(caption) => caption.to_string(),
        None => UNTITLED.to_string(),
    }
}

async fn answer_cb(bot: &Bot, q: &CallbackQuery, text: &str) -> HandlerResult {
    bot.answer_callback_query(q.id.clone())
        .text(text)
        .show_alert(false)
        .await?;
    Ok(())
}
