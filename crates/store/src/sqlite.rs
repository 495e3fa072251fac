use crate::types::{
    participants_key, Conversation, ConversationId, DoctorDocument, DocumentKind, MessageId,
    PendingSignup, Role, StoredMessage, UserId, UserRecord, VerificationStatus,
};
use crate::{Store, StoreError, StoreResult};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use physihome_types::normalize_email;
use physihome_uuid::CanonicalUuid;
use sqlx::{sqlite::SqlitePoolOptions, SqlitePool};
use std::collections::BTreeMap;

static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("./migrations");

const USER_COLUMNS: &str = "id,email,first_name,last_name,phone,gender,date_of_birth,role,\
     is_admin,restricted,doctor_verification_status,specialization,license_number,city,\
     preferred_pin,password_hash,otp_verified,otp_hash,otp_expires_at,pending_email,\
     has_logged_in,created_at";

pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    pub async fn open_in_memory() -> Result<Self, StoreError> {
        Self::open("sqlite::memory:").await
    }

    /// Opens (creating if needed) the database at `url` and runs pending migrations.
    pub async fn open(url: &str) -> Result<Self, StoreError> {
        let url = if url.starts_with("sqlite:") && !url.contains("memory") && !url.contains('?')
        {
            format!("{url}?mode=rwc")
        } else {
            url.to_string()
        };
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect(&url)
            .await
            .map_err(backend)?;

        MIGRATOR.run(&pool).await.map_err(backend)?;

        Ok(Self { pool })
    }

    async fn load_conversation(&self, id: &str) -> StoreResult<Option<Conversation>> {
        let row = sqlx::query_as::<_, (String, i64, i64)>(
            "SELECT id,created_at,updated_at FROM conversations WHERE id=?",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(backend)?;
        let Some((id, created_at, updated_at)) = row else {
            return Ok(None);
        };

        let members = sqlx::query_as::<_, (String,)>(
            "SELECT user_id FROM conversation_participants WHERE conversation_id=? ORDER BY user_id",
        )
        .bind(&id)
        .fetch_all(&self.pool)
        .await
        .map_err(backend)?;
        let mut participants = Vec::with_capacity(members.len());
        for (user_id,) in members {
            participants.push(UserId(parse_id(&user_id)?));
        }
        participants.sort();

        let reads = sqlx::query_as::<_, (String, i64)>(
            "SELECT user_id,read_at FROM conversation_reads WHERE conversation_id=?",
        )
        .bind(&id)
        .fetch_all(&self.pool)
        .await
        .map_err(backend)?;
        let mut last_read_at = BTreeMap::new();
        for (user_id, read_at) in reads {
            last_read_at.insert(UserId(parse_id(&user_id)?), from_nanos(read_at));
        }

        Ok(Some(Conversation {
            id: ConversationId(parse_id(&id)?),
            participants,
            created_at: from_nanos(created_at),
            updated_at: from_nanos(updated_at),
            last_read_at,
        }))
    }

    async fn fetch_users(
        &self,
        where_clause: &str,
        binds: &[&str],
    ) -> StoreResult<Vec<UserRecord>> {
        let sql = format!(
            "SELECT {USER_COLUMNS} FROM users WHERE {where_clause} ORDER BY created_at, id"
        );
        let mut query = sqlx::query_as::<_, UserRow>(&sql);
        for b in binds {
            query = query.bind(*b);
        }
        let rows = query.fetch_all(&self.pool).await.map_err(backend)?;
        rows.into_iter().map(UserRecord::try_from).collect()
    }
}

#[async_trait]
impl Store for SqliteStore {
    // ───────────────────────────── Users ─────────────────────────────

    async fn insert_user(&self, user: &UserRecord) -> StoreResult<()> {
        let sql = format!(
            "INSERT INTO users({USER_COLUMNS},email_key,pending_email_key) \
             VALUES(?,?,?,?,?,?,?,?,?,?,?,?,?,?,?,?,?,?,?,?,?,?,?,?)"
        );
        bind_user(sqlx::query(&sql), user)?
            .execute(&self.pool)
            .await
            .map_err(unique_to_exists)?;
        Ok(())
    }

    async fn get_user(&self, id: &UserId) -> StoreResult<Option<UserRecord>> {
        Ok(self
            .fetch_users("id=?", &[id.to_string().as_str()])
            .await?
            .into_iter()
            .next())
    }

    async fn find_user_by_email(&self, email: &str) -> StoreResult<Option<UserRecord>> {
        Ok(self.find_users_by_email_key(email).await?.into_iter().next())
    }

    async fn find_users_by_email_key(&self, email: &str) -> StoreResult<Vec<UserRecord>> {
        self.fetch_users("email_key=?", &[normalize_email(email).as_str()])
            .await
    }

    async fn find_user_by_phone(&self, phone: &str) -> StoreResult<Option<UserRecord>> {
        Ok(self.fetch_users("phone=?", &[phone]).await?.into_iter().next())
    }

    async fn find_user_by_pending_email(&self, email: &str) -> StoreResult<Option<UserRecord>> {
        Ok(self
            .fetch_users("pending_email_key=?", &[normalize_email(email).as_str()])
            .await?
            .into_iter()
            .next())
    }

    async fn update_user(&self, user: &UserRecord) -> StoreResult<()> {
        let result = sqlx::query(
            "UPDATE users SET email=?,first_name=?,last_name=?,phone=?,gender=?,date_of_birth=?,\
             role=?,is_admin=?,restricted=?,doctor_verification_status=?,specialization=?,\
             license_number=?,city=?,preferred_pin=?,password_hash=?,otp_verified=?,otp_hash=?,\
             otp_expires_at=?,pending_email=?,has_logged_in=?,email_key=?,pending_email_key=? \
             WHERE id=?",
        )
        .bind(&user.email)
        .bind(&user.first_name)
        .bind(&user.last_name)
        .bind(&user.phone)
        .bind(&user.gender)
        .bind(user.date_of_birth.map(|d| d.to_string()))
        .bind(user.role.as_str())
        .bind(user.is_admin)
        .bind(user.restricted)
        .bind(user.doctor_verification_status.as_ref().map(|v| v.as_str().to_string()))
        .bind(&user.specialization)
        .bind(&user.license_number)
        .bind(&user.city)
        .bind(&user.preferred_pin)
        .bind(&user.password_hash)
        .bind(user.otp_verified)
        .bind(&user.otp_hash)
        .bind(user.otp_expires_at.map(to_nanos).transpose()?)
        .bind(&user.pending_email)
        .bind(user.has_logged_in)
        .bind(normalize_email(&user.email))
        .bind(user.pending_email.as_deref().map(normalize_email))
        .bind(user.id.to_string())
        .execute(&self.pool)
        .await
        .map_err(backend)?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }

    async fn delete_user(&self, id: &UserId) -> StoreResult<()> {
        let mut tx = self.pool.begin().await.map_err(backend)?;
        let result = sqlx::query("DELETE FROM users WHERE id=?")
            .bind(id.to_string())
            .execute(&mut *tx)
            .await
            .map_err(backend)?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }
        sqlx::query("DELETE FROM doctor_documents WHERE user_id=?")
            .bind(id.to_string())
            .execute(&mut *tx)
            .await
            .map_err(backend)?;
        tx.commit().await.map_err(backend)?;
        Ok(())
    }

    async fn list_admin_candidates(&self, emails: &[String]) -> StoreResult<Vec<UserRecord>> {
        let mut clause = String::from("is_admin=1 OR role='admin'");
        if !emails.is_empty() {
            let placeholders = vec!["?"; emails.len()].join(",");
            clause.push_str(&format!(" OR email_key IN ({placeholders})"));
        }
        let binds: Vec<&str> = emails.iter().map(String::as_str).collect();
        self.fetch_users(&clause, &binds).await
    }

    async fn ensure_admin_mailbox(&self, user: &UserRecord) -> StoreResult<bool> {
        // Single statement: insert-if-absent on the normalised email.
        let sql = format!(
            "INSERT INTO users({USER_COLUMNS},email_key,pending_email_key) \
             SELECT ?,?,?,?,?,?,?,?,?,?,?,?,?,?,?,?,?,?,?,?,?,?,?,? \
             WHERE NOT EXISTS (SELECT 1 FROM users WHERE email_key=?)"
        );
        let result = bind_user(sqlx::query(&sql), user)?
            .bind(normalize_email(&user.email))
            .execute(&self.pool)
            .await
            .map_err(backend)?;
        Ok(result.rows_affected() == 1)
    }

    async fn list_doctors(&self) -> StoreResult<Vec<UserRecord>> {
        self.fetch_users("role='doctor'", &[]).await
    }

    // ───────────────────────────── Pending signups ─────────────────────────────

    async fn upsert_pending_signup(&self, p: &PendingSignup) -> StoreResult<()> {
        sqlx::query(
            "INSERT OR REPLACE INTO pending_signups(email_key,email,first_name,last_name,phone,\
             gender,date_of_birth,password_hash,specialization,license_number,city,preferred_pin,\
             otp_hash,otp_expires_at,created_at) VALUES(?,?,?,?,?,?,?,?,?,?,?,?,?,?,?)",
        )
        .bind(normalize_email(&p.email))
        .bind(&p.email)
        .bind(&p.first_name)
        .bind(&p.last_name)
        .bind(&p.phone)
        .bind(&p.gender)
        .bind(p.date_of_birth.to_string())
        .bind(&p.password_hash)
        .bind(&p.specialization)
        .bind(&p.license_number)
        .bind(&p.city)
        .bind(&p.preferred_pin)
        .bind(&p.otp_hash)
        .bind(to_nanos(p.otp_expires_at)?)
        .bind(to_nanos(p.created_at)?)
        .execute(&self.pool)
        .await
        .map_err(backend)?;
        Ok(())
    }

    async fn get_pending_signup(&self, email: &str) -> StoreResult<Option<PendingSignup>> {
        let row = sqlx::query_as::<_, PendingRow>(
            "SELECT * FROM pending_signups WHERE email_key=?",
        )
        .bind(normalize_email(email))
        .fetch_optional(&self.pool)
        .await
        .map_err(backend)?;
        row.map(PendingSignup::try_from).transpose()
    }

    async fn find_pending_signup_by_phone(
        &self,
        phone: &str,
    ) -> StoreResult<Option<PendingSignup>> {
        let row = sqlx::query_as::<_, PendingRow>(
            "SELECT * FROM pending_signups WHERE phone=? LIMIT 1",
        )
        .bind(phone)
        .fetch_optional(&self.pool)
        .await
        .map_err(backend)?;
        row.map(PendingSignup::try_from).transpose()
    }

    async fn delete_pending_signup(&self, email: &str) -> StoreResult<()> {
        sqlx::query("DELETE FROM pending_signups WHERE email_key=?")
            .bind(normalize_email(email))
            .execute(&self.pool)
            .await
            .map_err(backend)?;
        Ok(())
    }

    // ───────────────────────────── Doctor documents ─────────────────────────────

    async fn upsert_doctor_document(&self, d: &DoctorDocument) -> StoreResult<()> {
        if self.get_user(&d.user_id).await?.is_none() {
            return Err(StoreError::NotFound);
        }
        let byte_len = i64::try_from(d.byte_len).map_err(backend)?;
        sqlx::query(
            "INSERT INTO doctor_documents(user_id,kind,filename,content_type,byte_len,uploaded_at) \
             VALUES(?,?,?,?,?,?) ON CONFLICT(user_id,kind) DO UPDATE SET \
             filename=excluded.filename,content_type=excluded.content_type,\
             byte_len=excluded.byte_len,uploaded_at=excluded.uploaded_at",
        )
        .bind(d.user_id.to_string())
        .bind(d.kind.as_str())
        .bind(&d.filename)
        .bind(&d.content_type)
        .bind(byte_len)
        .bind(to_nanos(d.uploaded_at)?)
        .execute(&self.pool)
        .await
        .map_err(backend)?;
        Ok(())
    }

    async fn list_doctor_documents(&self, user: &UserId) -> StoreResult<Vec<DoctorDocument>> {
        let rows = sqlx::query_as::<_, (String, String, String, i64, i64)>(
            "SELECT kind,filename,content_type,byte_len,uploaded_at FROM doctor_documents \
             WHERE user_id=? ORDER BY kind",
        )
        .bind(user.to_string())
        .fetch_all(&self.pool)
        .await
        .map_err(backend)?;
        rows.into_iter()
            .map(|(kind, filename, content_type, byte_len, uploaded_at)| {
                Ok(DoctorDocument {
                    user_id: *user,
                    kind: DocumentKind::parse(&kind)
                        .ok_or_else(|| backend(format!("unknown document kind: {kind}")))?,
                    filename,
                    content_type,
                    byte_len: u64::try_from(byte_len).map_err(backend)?,
                    uploaded_at: from_nanos(uploaded_at),
                })
            })
            .collect()
    }

    // ───────────────────────────── Conversations ─────────────────────────────

    async fn get_conversation(&self, id: &ConversationId) -> StoreResult<Option<Conversation>> {
        self.load_conversation(&id.to_string()).await
    }

    async fn find_conversation_by_participants(
        &self,
        participants: &[UserId],
    ) -> StoreResult<Option<Conversation>> {
        let id = sqlx::query_as::<_, (String,)>(
            "SELECT id FROM conversations WHERE participants_key=?",
        )
        .bind(participants_key(participants))
        .fetch_optional(&self.pool)
        .await
        .map_err(backend)?;
        match id {
            Some((id,)) => self.load_conversation(&id).await,
            None => Ok(None),
        }
    }

    async fn find_conversation_with_members(
        &self,
        members: &[UserId],
    ) -> StoreResult<Option<Conversation>> {
        if members.is_empty() {
            return Ok(None);
        }
        let placeholders = vec!["?"; members.len()].join(",");
        let sql = format!(
            "SELECT c.id FROM conversations c \
             JOIN conversation_participants p ON p.conversation_id=c.id \
             GROUP BY c.id \
             HAVING COUNT(*)=? \
                AND SUM(CASE WHEN p.user_id IN ({placeholders}) THEN 1 ELSE 0 END)=? \
             ORDER BY c.created_at LIMIT 1"
        );
        let mut query = sqlx::query_as::<_, (String,)>(&sql).bind(members.len() as i64);
        for m in members {
            query = query.bind(m.to_string());
        }
        let id = query
            .bind(members.len() as i64)
            .fetch_optional(&self.pool)
            .await
            .map_err(backend)?;
        match id {
            Some((id,)) => self.load_conversation(&id).await,
            None => Ok(None),
        }
    }

    async fn find_or_create_conversation(
        &self,
        participants: &[UserId],
        now: DateTime<Utc>,
    ) -> StoreResult<(Conversation, bool)> {
        let key = participants_key(participants);
        let id = ConversationId::new().to_string();
        let ts = to_nanos(now)?;

        let mut tx = self.pool.begin().await.map_err(backend)?;
        let inserted = sqlx::query(
            "INSERT INTO conversations(id,participants_key,created_at,updated_at) VALUES(?,?,?,?) \
             ON CONFLICT(participants_key) DO NOTHING",
        )
        .bind(&id)
        .bind(&key)
        .bind(ts)
        .bind(ts)
        .execute(&mut *tx)
        .await
        .map_err(backend)?
        .rows_affected()
            == 1;
        if inserted {
            for p in participants {
                sqlx::query(
                    "INSERT INTO conversation_participants(conversation_id,user_id) VALUES(?,?)",
                )
                .bind(&id)
                .bind(p.to_string())
                .execute(&mut *tx)
                .await
                .map_err(backend)?;
            }
        }
        tx.commit().await.map_err(backend)?;

        let conv = self
            .find_conversation_by_participants(participants)
            .await?
            .ok_or(StoreError::Conflict)?;
        Ok((conv, inserted))
    }

    async fn list_conversations_for(&self, user: &UserId) -> StoreResult<Vec<Conversation>> {
        let ids = sqlx::query_as::<_, (String,)>(
            "SELECT c.id FROM conversations c \
             JOIN conversation_participants p ON p.conversation_id=c.id \
             WHERE p.user_id=? ORDER BY c.updated_at DESC",
        )
        .bind(user.to_string())
        .fetch_all(&self.pool)
        .await
        .map_err(backend)?;
        let mut out = Vec::with_capacity(ids.len());
        for (id,) in ids {
            if let Some(conv) = self.load_conversation(&id).await? {
                out.push(conv);
            }
        }
        Ok(out)
    }

    async fn touch_conversation(&self, id: &ConversationId, at: DateTime<Utc>) -> StoreResult<()> {
        let result = sqlx::query("UPDATE conversations SET updated_at=? WHERE id=?")
            .bind(to_nanos(at)?)
            .bind(id.to_string())
            .execute(&self.pool)
            .await
            .map_err(backend)?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }

    async fn set_last_read(
        &self,
        id: &ConversationId,
        user: &UserId,
        at: DateTime<Utc>,
    ) -> StoreResult<()> {
        if self.load_conversation(&id.to_string()).await?.is_none() {
            return Err(StoreError::NotFound);
        }
        sqlx::query(
            "INSERT INTO conversation_reads(conversation_id,user_id,read_at) VALUES(?,?,?) \
             ON CONFLICT(conversation_id,user_id) DO UPDATE SET read_at=excluded.read_at",
        )
        .bind(id.to_string())
        .bind(user.to_string())
        .bind(to_nanos(at)?)
        .execute(&self.pool)
        .await
        .map_err(backend)?;
        Ok(())
    }

    // ───────────────────────────── Messages ─────────────────────────────

    async fn insert_message(&self, m: &StoredMessage) -> StoreResult<()> {
        sqlx::query(
            "INSERT INTO messages(id,conversation_id,sender_id,ciphertext,created_at) \
             VALUES(?,?,?,?,?)",
        )
        .bind(m.id.to_string())
        .bind(m.conversation_id.to_string())
        .bind(m.sender_id.to_string())
        .bind(&m.ciphertext)
        .bind(to_nanos(m.created_at)?)
        .execute(&self.pool)
        .await
        .map_err(unique_to_exists)?;
        Ok(())
    }

    async fn list_messages(
        &self,
        conversation: &ConversationId,
        after: Option<DateTime<Utc>>,
    ) -> StoreResult<Vec<StoredMessage>> {
        let after = match after {
            Some(t) => to_nanos(t)?,
            None => i64::MIN,
        };
        let rows = sqlx::query_as::<_, (String, String, String, String, i64)>(
            "SELECT id,conversation_id,sender_id,ciphertext,created_at FROM messages \
             WHERE conversation_id=? AND created_at>? ORDER BY created_at, id",
        )
        .bind(conversation.to_string())
        .bind(after)
        .fetch_all(&self.pool)
        .await
        .map_err(backend)?;
        rows.into_iter().map(message_from_row).collect()
    }

    async fn count_unread(
        &self,
        conversation: &ConversationId,
        viewer: &UserId,
        since: Option<DateTime<Utc>>,
    ) -> StoreResult<u64> {
        let since = match since {
            Some(t) => to_nanos(t)?,
            None => i64::MIN,
        };
        let (n,) = sqlx::query_as::<_, (i64,)>(
            "SELECT COUNT(*) FROM messages \
             WHERE conversation_id=? AND sender_id<>? AND created_at>?",
        )
        .bind(conversation.to_string())
        .bind(viewer.to_string())
        .bind(since)
        .fetch_one(&self.pool)
        .await
        .map_err(backend)?;
        Ok(n.max(0) as u64)
    }

    async fn latest_message(
        &self,
        conversation: &ConversationId,
    ) -> StoreResult<Option<StoredMessage>> {
        let row = sqlx::query_as::<_, (String, String, String, String, i64)>(
            "SELECT id,conversation_id,sender_id,ciphertext,created_at FROM messages \
             WHERE conversation_id=? ORDER BY created_at DESC, id DESC LIMIT 1",
        )
        .bind(conversation.to_string())
        .fetch_optional(&self.pool)
        .await
        .map_err(backend)?;
        row.map(message_from_row).transpose()
    }
}

// ───────────────────────────── Row mapping ─────────────────────────────

#[derive(sqlx::FromRow)]
struct UserRow {
    id: String,
    email: String,
    first_name: String,
    last_name: String,
    phone: Option<String>,
    gender: Option<String>,
    date_of_birth: Option<String>,
    role: String,
    is_admin: bool,
    restricted: bool,
    doctor_verification_status: Option<String>,
    specialization: Option<String>,
    license_number: Option<String>,
    city: Option<String>,
    preferred_pin: Option<String>,
    password_hash: String,
    otp_verified: bool,
    otp_hash: Option<String>,
    otp_expires_at: Option<i64>,
    pending_email: Option<String>,
    has_logged_in: bool,
    created_at: i64,
}

impl TryFrom<UserRow> for UserRecord {
    type Error = StoreError;

    fn try_from(r: UserRow) -> Result<Self, Self::Error> {
        Ok(UserRecord {
            id: UserId(parse_id(&r.id)?),
            email: r.email,
            first_name: r.first_name,
            last_name: r.last_name,
            phone: r.phone,
            gender: r.gender,
            date_of_birth: r.date_of_birth.as_deref().map(parse_date).transpose()?,
            role: Role::parse(&r.role),
            is_admin: r.is_admin,
            restricted: r.restricted,
            doctor_verification_status: r
                .doctor_verification_status
                .as_deref()
                .and_then(VerificationStatus::parse),
            specialization: r.specialization,
            license_number: r.license_number,
            city: r.city,
            preferred_pin: r.preferred_pin,
            password_hash: r.password_hash,
            otp_verified: r.otp_verified,
            otp_hash: r.otp_hash,
            otp_expires_at: r.otp_expires_at.map(from_nanos),
            pending_email: r.pending_email,
            has_logged_in: r.has_logged_in,
            created_at: from_nanos(r.created_at),
        })
    }
}

#[derive(sqlx::FromRow)]
struct PendingRow {
    email: String,
    first_name: String,
    last_name: String,
    phone: String,
    gender: Option<String>,
    date_of_birth: String,
    password_hash: String,
    specialization: String,
    license_number: String,
    city: String,
    preferred_pin: String,
    otp_hash: String,
    otp_expires_at: i64,
    created_at: i64,
}

impl TryFrom<PendingRow> for PendingSignup {
    type Error = StoreError;

    fn try_from(r: PendingRow) -> Result<Self, Self::Error> {
        Ok(PendingSignup {
            email: r.email,
            first_name: r.first_name,
            last_name: r.last_name,
            phone: r.phone,
            gender: r.gender,
            date_of_birth: parse_date(&r.date_of_birth)?,
            password_hash: r.password_hash,
            specialization: r.specialization,
            license_number: r.license_number,
            city: r.city,
            preferred_pin: r.preferred_pin,
            otp_hash: r.otp_hash,
            otp_expires_at: from_nanos(r.otp_expires_at),
            created_at: from_nanos(r.created_at),
        })
    }
}

type SqliteQuery<'q> = sqlx::query::Query<'q, sqlx::Sqlite, sqlx::sqlite::SqliteArguments<'q>>;

/// Binds every `USER_COLUMNS` value followed by `email_key` and `pending_email_key`.
fn bind_user<'q>(query: SqliteQuery<'q>, user: &'q UserRecord) -> StoreResult<SqliteQuery<'q>> {
    Ok(query
        .bind(user.id.to_string())
        .bind(&user.email)
        .bind(&user.first_name)
        .bind(&user.last_name)
        .bind(&user.phone)
        .bind(&user.gender)
        .bind(user.date_of_birth.map(|d| d.to_string()))
        .bind(user.role.as_str())
        .bind(user.is_admin)
        .bind(user.restricted)
        .bind(user.doctor_verification_status.as_ref().map(|v| v.as_str().to_string()))
        .bind(&user.specialization)
        .bind(&user.license_number)
        .bind(&user.city)
        .bind(&user.preferred_pin)
        .bind(&user.password_hash)
        .bind(user.otp_verified)
        .bind(&user.otp_hash)
        .bind(user.otp_expires_at.map(to_nanos).transpose()?)
        .bind(&user.pending_email)
        .bind(user.has_logged_in)
        .bind(to_nanos(user.created_at)?)
        .bind(normalize_email(&user.email))
        .bind(user.pending_email.as_deref().map(normalize_email)))
}

fn message_from_row(
    (id, conversation_id, sender_id, ciphertext, created_at): (String, String, String, String, i64),
) -> StoreResult<StoredMessage> {
    Ok(StoredMessage {
        id: MessageId(parse_id(&id)?),
        conversation_id: ConversationId(parse_id(&conversation_id)?),
        sender_id: UserId(parse_id(&sender_id)?),
        ciphertext,
        created_at: from_nanos(created_at),
    })
}

fn parse_id(s: &str) -> StoreResult<CanonicalUuid> {
    CanonicalUuid::parse(s).map_err(backend)
}

fn parse_date(s: &str) -> StoreResult<NaiveDate> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").map_err(backend)
}

fn to_nanos(at: DateTime<Utc>) -> StoreResult<i64> {
    at.timestamp_nanos_opt()
        .ok_or_else(|| StoreError::Backend(format!("timestamp out of range: {at}")))
}

fn from_nanos(nanos: i64) -> DateTime<Utc> {
    DateTime::from_timestamp_nanos(nanos)
}

fn backend(e: impl std::fmt::Display) -> StoreError {
    StoreError::Backend(e.to_string())
}

fn unique_to_exists(e: sqlx::Error) -> StoreError {
    let s = e.to_string();
    if s.contains("UNIQUE") {
        StoreError::AlreadyExists
    } else {
        StoreError::Backend(s)
    }
}
