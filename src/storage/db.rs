use chrono::{Duration, Utc};
use r2d2::{Pool, PooledConnection};
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::{params, OptionalExtension, Row};
use uuid::Uuid;

use crate::core::config;
use crate::core::error::{AppError, AppResult};
use crate::storage::migrations::run_migrations;

pub type DbPool = Pool<SqliteConnectionManager>;
pub type DbConnection = PooledConnection<SqliteConnectionManager>;

/// Формат хранения дат в БД (совместим с datetime('now') в SQLite,
/// строки сравниваются лексикографически)
const TS_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Текущее время в формате БД
pub fn now_ts() -> String {
    Utc::now().format(TS_FORMAT).to_string()
}

/// Время через `hours` часов в формате БД
pub fn ts_in_hours(hours: i64) -> String {
    (Utc::now() + Duration::hours(hours)).format(TS_FORMAT).to_string()
}

/// Время через `secs` секунд в формате БД
pub fn ts_in_secs(secs: i64) -> String {
    (Utc::now() + Duration::seconds(secs)).format(TS_FORMAT).to_string()
}

/// Структура, представляющая пользователя в базе данных.
#[derive(Debug, Clone)]
pub struct User {
    /// Внутренний идентификатор (UUID)
    pub id: String,
    /// Telegram ID пользователя
    pub telegram_id: i64,
    /// Имя пользователя (username) в Telegram, если доступно
    pub username: Option<String>,
    /// Имя
    pub first_name: String,
    /// Фамилия, если доступна
    pub last_name: Option<String>,
    /// Код языка Telegram-клиента ("ru", "en", ...)
    pub language_code: Option<String>,
    /// Флаг бота
    pub is_bot: bool,
    /// Флаг Telegram Premium
    pub is_premium: bool,
    /// Время последней активности
    pub last_activity: String,
    pub created_at: String,
    pub updated_at: String,
    /// Мягкое удаление (записи никогда не удаляются физически)
    pub is_deleted: bool,
}

/// Статус привязки канала к владельцу.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display, strum::EnumString)]
#[strum(serialize_all = "lowercase")]
pub enum ClaimStatus {
    /// Зарегистрирован без владельца, ждёт привязки
    Pending,
    /// Привязан к владельцу
    Claimed,
    /// Окно привязки истекло
    Expired,
}

/// Структура, представляющая канал в базе данных.
#[derive(Debug, Clone)]
pub struct Channel {
    /// Внутренний идентификатор (UUID)
    pub id: String,
    /// Telegram chat ID канала
    pub chat_id: i64,
    /// Название канала
    pub title: String,
    /// Username канала (для публичных каналов)
    pub username: Option<String>,
    pub description: Option<String>,
    pub member_count: Option<i64>,
    pub is_active: bool,
    pub is_public: bool,
    pub invite_link: Option<String>,
    /// Когда метаданные канала обновлялись в последний раз
    pub last_checked: Option<String>,
    pub claim_status: ClaimStatus,
    /// До какого момента канал можно привязать (только для pending)
    pub claim_expires_at: Option<String>,
    /// Telegram ID владельца (None до привязки)
    pub owner_id: Option<i64>,
    pub created_at: String,
    pub updated_at: String,
    pub is_deleted: bool,
}

/// Данные пользователя из входящего апдейта, синхронизируемые в БД.
#[derive(Debug, Clone, Default)]
pub struct TelegramUserInfo {
    pub telegram_id: i64,
    pub username: Option<String>,
    pub first_name: String,
    pub last_name: Option<String>,
    pub language_code: Option<String>,
    pub is_premium: bool,
}

/// Create a new database connection pool
///
/// Initializes a connection pool with up to 10 connections and runs schema migrations.
pub fn create_pool(database_path: &str) -> AppResult<DbPool> {
    let manager = SqliteConnectionManager::file(database_path);
    let pool = Pool::builder().max_size(10).build(manager)?;

    let mut conn = pool.get()?;
    if let Err(e) = run_migrations(&mut conn) {
        // Surface migration failures instead of limping along with a
        // partial schema
        return Err(AppError::Validation(format!("schema migration failed: {e}")));
    }

    Ok(pool)
}

/// Get a connection from the pool
///
/// The connection is automatically returned to the pool when dropped.
pub fn get_connection(pool: &DbPool) -> Result<DbConnection, r2d2::Error> {
    pool.get()
}

fn user_from_row(row: &Row<'_>) -> rusqlite::Result<User> {
    Ok(User {
        id: row.get(0)?,
        telegram_id: row.get(1)?,
        username: row.get(2)?,
        first_name: row.get(3)?,
        last_name: row.get(4)?,
        language_code: row.get(5)?,
        is_bot: row.get::<_, i64>(6)? != 0,
        is_premium: row.get::<_, i64>(7)? != 0,
        last_activity: row.get(8)?,
        created_at: row.get(9)?,
        updated_at: row.get(10)?,
        is_deleted: row.get::<_, i64>(11)? != 0,
    })
}

const USER_COLUMNS: &str = "id, telegram_id, username, first_name, last_name, language_code, \
     is_bot, is_premium, last_activity, created_at, updated_at, is_deleted";

/// Получает пользователя по Telegram ID (без учёта удалённых).
pub fn get_user(conn: &DbConnection, telegram_id: i64) -> AppResult<Option<User>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {USER_COLUMNS} FROM users WHERE telegram_id = ?1 AND is_deleted = 0"
    ))?;
    let user = stmt.query_row(params![telegram_id], user_from_row).optional()?;
    Ok(user)
}

/// Создаёт пользователя или синхронизирует имя/username/язык существующего.
///
/// Вызывается на каждом входящем апдейте: обновляет `last_activity` и
/// возвращает актуальную запись.
pub fn get_or_create_user(conn: &DbConnection, info: &TelegramUserInfo) -> AppResult<User> {
    let now = now_ts();

    if let Some(existing) = get_user(conn, info.telegram_id)? {
        let changed = existing.username != info.username
            || existing.first_name != info.first_name
            || existing.last_name != info.last_name
            || existing.language_code != info.language_code
            || existing.is_premium != info.is_premium;

        if changed {
            conn.execute(
                "UPDATE users SET username = ?1, first_name = ?2, last_name = ?3, language_code = ?4, \
                 is_premium = ?5, last_activity = ?6, updated_at = ?6 WHERE telegram_id = ?7 AND is_deleted = 0",
                params![
                    info.username,
                    info.first_name,
                    info.last_name,
                    info.language_code,
                    info.is_premium as i64,
                    now,
                    info.telegram_id
                ],
            )?;
            log::debug!("Synced profile for user {}", info.telegram_id);
        } else {
            conn.execute(
                "UPDATE users SET last_activity = ?1 WHERE telegram_id = ?2 AND is_deleted = 0",
                params![now, info.telegram_id],
            )?;
        }

        return get_user(conn, info.telegram_id)?.ok_or(AppError::UserNotFound(info.telegram_id));
    }

    let id = Uuid::new_v4().to_string();
    conn.execute(
        "INSERT INTO users (id, telegram_id, username, first_name, last_name, language_code, \
         is_bot, is_premium, last_activity, created_at, updated_at, is_deleted) \
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, 0, ?7, ?8, ?8, ?8, 0)",
        params![
            id,
            info.telegram_id,
            info.username,
            info.first_name,
            info.last_name,
            info.language_code,
            info.is_premium as i64,
            now
        ],
    )?;

    log::info!("Created new user {} ({:?})", info.telegram_id, info.username);

    get_user(conn, info.telegram_id)?.ok_or(AppError::UserNotFound(info.telegram_id))
}

/// Мягко удаляет пользователя. Запись остаётся в таблице.
pub fn soft_delete_user(conn: &DbConnection, telegram_id: i64) -> AppResult<bool> {
    let changed = conn.execute(
        "UPDATE users SET is_deleted = 1, updated_at = ?1 WHERE telegram_id = ?2 AND is_deleted = 0",
        params![now_ts(), telegram_id],
    )?;
    Ok(changed > 0)
}

fn channel_from_row(row: &Row<'_>) -> rusqlite::Result<Channel> {
    let status: String = row.get(11)?;
    Ok(Channel {
        id: row.get(0)?,
        chat_id: row.get(1)?,
        title: row.get(2)?,
        username: row.get(3)?,
        description: row.get(4)?,
        member_count: row.get(5)?,
        is_active: row.get::<_, i64>(6)? != 0,
        is_public: row.get::<_, i64>(7)? != 0,
        invite_link: row.get(8)?,
        last_checked: row.get(9)?,
        claim_expires_at: row.get(10)?,
        claim_status: status.parse().unwrap_or(ClaimStatus::Pending),
        owner_id: row.get(12)?,
        created_at: row.get(13)?,
        updated_at: row.get(14)?,
        is_deleted: row.get::<_, i64>(15)? != 0,
    })
}

const CHANNEL_COLUMNS: &str = "id, chat_id, title, username, description, member_count, is_active, \
     is_public, invite_link, last_checked, claim_expires_at, claim_status, owner_id, \
     created_at, updated_at, is_deleted";

/// Регистрирует канал без владельца со статусом pending и окном привязки.
///
/// Возвращает `None`, если канал с таким chat_id уже зарегистрирован.
pub fn register_channel(
    conn: &DbConnection,
    chat_id: i64,
    title: &str,
    username: Option<&str>,
) -> AppResult<Option<Channel>> {
    if get_channel_by_chat_id(conn, chat_id)?.is_some() {
        return Ok(None);
    }

    let id = Uuid::new_v4().to_string();
    let now = now_ts();
    let claim_deadline = ts_in_hours(config::claim::CLAIM_WINDOW_HOURS);
    conn.execute(
        "INSERT INTO channels (id, chat_id, title, username, is_active, is_public, claim_status, \
         claim_expires_at, owner_id, created_at, updated_at, is_deleted) \
         VALUES (?1, ?2, ?3, ?4, 1, ?5, 'pending', ?6, NULL, ?7, ?7, 0)",
        params![id, chat_id, title, username, username.is_some() as i64, claim_deadline, now],
    )?;

    log::info!("Registered channel {} ({}) as pending", chat_id, title);

    get_channel_by_chat_id(conn, chat_id)
}

/// Получает канал по Telegram chat ID (без учёта удалённых).
pub fn get_channel_by_chat_id(conn: &DbConnection, chat_id: i64) -> AppResult<Option<Channel>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {CHANNEL_COLUMNS} FROM channels WHERE chat_id = ?1 AND is_deleted = 0"
    ))?;
    let channel = stmt.query_row(params![chat_id], channel_from_row).optional()?;
    Ok(channel)
}

/// Получает канал по внутреннему идентификатору.
pub fn get_channel_by_id(conn: &DbConnection, id: &str) -> AppResult<Option<Channel>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {CHANNEL_COLUMNS} FROM channels WHERE id = ?1 AND is_deleted = 0"
    ))?;
    let channel = stmt.query_row(params![id], channel_from_row).optional()?;
    Ok(channel)
}

/// Получает канал по username (без учёта удалённых).
pub fn get_channel_by_username(conn: &DbConnection, username: &str) -> AppResult<Option<Channel>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {CHANNEL_COLUMNS} FROM channels WHERE username = ?1 AND is_deleted = 0"
    ))?;
    let channel = stmt.query_row(params![username], channel_from_row).optional()?;
    Ok(channel)
}

/// Активные каналы, привязанные к пользователю, по алфавиту.
pub fn get_owned_channels(conn: &DbConnection, owner_id: i64) -> AppResult<Vec<Channel>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {CHANNEL_COLUMNS} FROM channels \
         WHERE owner_id = ?1 AND is_active = 1 AND is_deleted = 0 ORDER BY title"
    ))?;
    let rows = stmt.query_map(params![owner_id], channel_from_row)?;
    let mut channels = Vec::new();
    for row in rows {
        channels.push(row?);
    }
    Ok(channels)
}

/// Непривязанные каналы с точным названием, в порядке регистрации.
pub fn find_pending_by_title(conn: &DbConnection, title: &str) -> AppResult<Vec<Channel>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {CHANNEL_COLUMNS} FROM channels \
         WHERE title = ?1 AND claim_status = 'pending' AND is_active = 1 AND is_deleted = 0 \
         ORDER BY created_at, rowid"
    ))?;
    let rows = stmt.query_map(params![title], channel_from_row)?;
    let mut channels = Vec::new();
    for row in rows {
        channels.push(row?);
    }
    Ok(channels)
}

/// Привязывает pending-канал к владельцу и снимает окно привязки.
pub fn claim_channel(conn: &DbConnection, channel_id: &str, owner_id: i64) -> AppResult<bool> {
    let changed = conn.execute(
        "UPDATE channels SET owner_id = ?1, claim_status = 'claimed', claim_expires_at = NULL, \
         updated_at = ?2 WHERE id = ?3 AND claim_status = 'pending' AND is_deleted = 0",
        params![owner_id, now_ts(), channel_id],
    )?;
    Ok(changed > 0)
}

/// Деактивирует канал (мягкое выключение, не удаление строки).
pub fn deactivate_channel(conn: &DbConnection, chat_id: i64) -> AppResult<bool> {
    let changed = conn.execute(
        "UPDATE channels SET is_active = 0, updated_at = ?1 WHERE chat_id = ?2 AND is_deleted = 0",
        params![now_ts(), chat_id],
    )?;
    Ok(changed > 0)
}

/// Обновляет метаданные канала и отметку last_checked.
pub fn update_channel_info(
    conn: &DbConnection,
    chat_id: i64,
    title: &str,
    username: Option<&str>,
    description: Option<&str>,
    member_count: Option<i64>,
    invite_link: Option<&str>,
) -> AppResult<()> {
    let now = now_ts();
    conn.execute(
        "UPDATE channels SET title = ?1, username = ?2, description = ?3, member_count = ?4, \
         invite_link = ?5, is_public = ?6, last_checked = ?7, updated_at = ?7 \
         WHERE chat_id = ?8 AND is_deleted = 0",
        params![
            title,
            username,
            description,
            member_count,
            invite_link,
            username.is_some() as i64,
            now,
            chat_id
        ],
    )?;
    Ok(())
}

/// Переводит pending-каналы с истёкшим окном привязки в expired.
///
/// Возвращает количество затронутых каналов.
pub fn expire_stale_claims(conn: &DbConnection) -> AppResult<usize> {
    let changed = conn.execute(
        "UPDATE channels SET claim_status = 'expired', updated_at = ?1 \
         WHERE claim_status = 'pending' AND claim_expires_at IS NOT NULL \
         AND claim_expires_at <= ?1 AND is_deleted = 0",
        params![now_ts()],
    )?;
    Ok(changed)
}

/// Проверяет, что канал привязан именно к этому пользователю.
pub fn is_user_channel_owner(conn: &DbConnection, chat_id: i64, user_id: i64) -> AppResult<bool> {
    Ok(get_channel_by_chat_id(conn, chat_id)?
        .map(|c| c.owner_id == Some(user_id))
        .unwrap_or(false))
}
