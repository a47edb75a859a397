//! # Postgres document store
//!
//! Maps the relational rows in `migrations/` onto the `domains` models.
//! Each repository write is a single statement; there is no multi-statement
//! transaction anywhere in the write path. Message mutations update one
//! column in place, and the participant-pair index from `0002_dialog_pair`
//! turns a duplicate dialog into a unique violation.

use async_trait::async_trait;
use domains::{
    Dialog, DialogRepository, DomainError, Message, MessageRepository, Result, User,
    UserRepository,
};
use sqlx::postgres::{PgPool, PgPoolOptions, PgRow};
use sqlx::Row;
use uuid::Uuid;

pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    /// Connects and applies pending migrations.
    pub async fn connect(url: &str, max_connections: u32) -> std::result::Result<Self, sqlx::Error> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(url)
            .await?;
        sqlx::migrate!("./migrations").run(&pool).await?;
        tracing::info!("postgres store ready");
        Ok(Self { pool })
    }
}

fn db_err(e: sqlx::Error) -> DomainError {
    tracing::error!(error = %e, "database error");
    DomainError::internal(e)
}

fn user_from_row(row: &PgRow) -> std::result::Result<User, sqlx::Error> {
    Ok(User {
        id: row.try_get("id")?,
        email: row.try_get("email")?,
        fullname: row.try_get("fullname")?,
        password_hash: row.try_get("password_hash")?,
        confirmed: row.try_get("confirmed")?,
        confirm_hash: row.try_get("confirm_hash")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn dialog_from_row(row: &PgRow) -> std::result::Result<Dialog, sqlx::Error> {
    Ok(Dialog {
        id: row.try_get("id")?,
        author: row.try_get("author")?,
        partner: row.try_get("partner")?,
        last_message: row.try_get("last_message")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn message_from_row(row: &PgRow) -> std::result::Result<Message, sqlx::Error> {
    Ok(Message {
        id: row.try_get("id")?,
        text: row.try_get("text")?,
        dialog_id: row.try_get("dialog_id")?,
        sender_id: row.try_get("sender_id")?,
        unchecked: row.try_get("unchecked")?,
        attachments: row.try_get("attachments")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn map_rows<T>(
    rows: Vec<PgRow>,
    decode: fn(&PgRow) -> std::result::Result<T, sqlx::Error>,
) -> Result<Vec<T>> {
    rows.iter()
        .map(decode)
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(db_err)
}

fn map_row<T>(
    row: Option<PgRow>,
    decode: fn(&PgRow) -> std::result::Result<T, sqlx::Error>,
) -> Result<Option<T>> {
    row.as_ref().map(decode).transpose().map_err(db_err)
}

/// `%query%` for ILIKE with the wildcard characters taken literally.
fn like_pattern(query: &str) -> String {
    let escaped = query
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    format!("%{escaped}%")
}

const USER_COLUMNS: &str =
    "id, email, fullname, password_hash, confirmed, confirm_hash, created_at, updated_at";
const DIALOG_COLUMNS: &str = "id, author, partner, last_message, created_at, updated_at";
const MESSAGE_COLUMNS: &str =
    "id, text, dialog_id, sender_id, unchecked, attachments, created_at, updated_at";

#[async_trait]
impl UserRepository for PgStore {
    async fn insert(&self, user: User) -> Result<User> {
        sqlx::query(
            "INSERT INTO users (id, email, fullname, password_hash, confirmed, confirm_hash, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8)",
        )
        .bind(user.id)
        .bind(&user.email)
        .bind(&user.fullname)
        .bind(&user.password_hash)
        .bind(user.confirmed)
        .bind(&user.confirm_hash)
        .bind(user.created_at)
        .bind(user.updated_at)
        .execute(&self.pool)
        .await
        .map_err(|e| match &e {
            sqlx::Error::Database(db) if db.is_unique_violation() => {
                DomainError::Conflict("Email already registered".into())
            }
            _ => db_err(e),
        })?;
        Ok(user)
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>> {
        let row = sqlx::query(&format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)?;
        map_row(row, user_from_row)
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>> {
        let row = sqlx::query(&format!("SELECT {USER_COLUMNS} FROM users WHERE email = $1"))
            .bind(email)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)?;
        map_row(row, user_from_row)
    }

    async fn find_by_confirm_hash(&self, hash: &str) -> Result<Option<User>> {
        let row = sqlx::query(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE confirm_hash = $1"
        ))
        .bind(hash)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_err)?;
        map_row(row, user_from_row)
    }

    async fn save(&self, user: &User) -> Result<()> {
        let result = sqlx::query(
            "UPDATE users SET fullname = $2, password_hash = $3, confirmed = $4, confirm_hash = $5, updated_at = $6 \
             WHERE id = $1",
        )
        .bind(user.id)
        .bind(&user.fullname)
        .bind(&user.password_hash)
        .bind(user.confirmed)
        .bind(&user.confirm_hash)
        .bind(user.updated_at)
        .execute(&self.pool)
        .await
        .map_err(db_err)?;
        if result.rows_affected() == 0 {
            return Err(DomainError::NotFound("User not found".into()));
        }
        Ok(())
    }

    async fn search(&self, query: &str) -> Result<Vec<User>> {
        let rows = sqlx::query(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE fullname ILIKE $1 OR email ILIKE $1 ORDER BY created_at ASC"
        ))
        .bind(like_pattern(query))
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;
        map_rows(rows, user_from_row)
    }

    async fn delete(&self, id: Uuid) -> Result<Option<User>> {
        let row = sqlx::query(&format!(
            "DELETE FROM users WHERE id = $1 RETURNING {USER_COLUMNS}"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_err)?;
        map_row(row, user_from_row)
    }
}

#[async_trait]
impl DialogRepository for PgStore {
    async fn insert(&self, dialog: Dialog) -> Result<Dialog> {
        sqlx::query(
            "INSERT INTO dialogs (id, author, partner, last_message, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6)",
        )
        .bind(dialog.id)
        .bind(dialog.author)
        .bind(dialog.partner)
        .bind(dialog.last_message)
        .bind(dialog.created_at)
        .bind(dialog.updated_at)
        .execute(&self.pool)
        .await
        .map_err(|e| match &e {
            sqlx::Error::Database(db) if db.is_unique_violation() => {
                DomainError::Conflict("Dialog already exists".into())
            }
            _ => db_err(e),
        })?;
        Ok(dialog)
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Dialog>> {
        let row = sqlx::query(&format!("SELECT {DIALOG_COLUMNS} FROM dialogs WHERE id = $1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)?;
        map_row(row, dialog_from_row)
    }

    async fn list_for_user(&self, user_id: Uuid) -> Result<Vec<Dialog>> {
        let rows = sqlx::query(&format!(
            "SELECT {DIALOG_COLUMNS} FROM dialogs WHERE author = $1 OR partner = $1 ORDER BY updated_at DESC"
        ))
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;
        map_rows(rows, dialog_from_row)
    }

    async fn set_last_message(&self, dialog_id: Uuid, message_id: Uuid) -> Result<()> {
        let result =
            sqlx::query("UPDATE dialogs SET last_message = $2, updated_at = NOW() WHERE id = $1")
                .bind(dialog_id)
                .bind(message_id)
                .execute(&self.pool)
                .await
                .map_err(db_err)?;
        if result.rows_affected() == 0 {
            return Err(DomainError::NotFound("Dialog not found".into()));
        }
        Ok(())
    }

    /// Messages go with it through `ON DELETE CASCADE`.
    async fn delete(&self, id: Uuid) -> Result<()> {
        sqlx::query("DELETE FROM dialogs WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(db_err)?;
        Ok(())
    }
}

#[async_trait]
impl MessageRepository for PgStore {
    async fn insert(&self, message: Message) -> Result<Message> {
        sqlx::query(
            "INSERT INTO messages (id, text, dialog_id, sender_id, unchecked, attachments, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8)",
        )
        .bind(message.id)
        .bind(&message.text)
        .bind(message.dialog_id)
        .bind(message.sender_id)
        .bind(message.unchecked)
        .bind(&message.attachments)
        .bind(message.created_at)
        .bind(message.updated_at)
        .execute(&self.pool)
        .await
        .map_err(db_err)?;
        Ok(message)
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Message>> {
        let row = sqlx::query(&format!("SELECT {MESSAGE_COLUMNS} FROM messages WHERE id = $1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)?;
        map_row(row, message_from_row)
    }

    async fn mark_checked(&self, id: Uuid) -> Result<bool> {
        let result = sqlx::query(
            "UPDATE messages SET unchecked = FALSE, updated_at = NOW() WHERE id = $1 AND unchecked",
        )
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(db_err)?;
        Ok(result.rows_affected() == 1)
    }

    async fn push_attachment(&self, id: Uuid, file: Uuid, max: usize) -> Result<Option<Message>> {
        let row = sqlx::query(&format!(
            "UPDATE messages SET attachments = array_append(attachments, $2), updated_at = NOW() \
             WHERE id = $1 AND cardinality(attachments) < $3 RETURNING {MESSAGE_COLUMNS}"
        ))
        .bind(id)
        .bind(file)
        .bind(i32::try_from(max).unwrap_or(i32::MAX))
        .fetch_optional(&self.pool)
        .await
        .map_err(db_err)?;
        if let Some(message) = map_row(row, message_from_row)? {
            return Ok(Some(message));
        }
        // No row: either the cap was hit or the message is gone.
        match MessageRepository::find_by_id(self, id).await? {
            Some(_) => Ok(None),
            None => Err(DomainError::NotFound("Message not found".into())),
        }
    }

    async fn list_by_dialog(&self, dialog_id: Uuid) -> Result<Vec<Message>> {
        let rows = sqlx::query(&format!(
            "SELECT {MESSAGE_COLUMNS} FROM messages WHERE dialog_id = $1 ORDER BY created_at ASC, id ASC"
        ))
        .bind(dialog_id)
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;
        map_rows(rows, message_from_row)
    }

    async fn list_by_sender(&self, sender_id: Uuid) -> Result<Vec<Message>> {
        let rows = sqlx::query(&format!(
            "SELECT {MESSAGE_COLUMNS} FROM messages WHERE sender_id = $1 ORDER BY created_at ASC, id ASC"
        ))
        .bind(sender_id)
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;
        map_rows(rows, message_from_row)
    }
}
