//! SQLite-backed `ContactDirectory` implementation with durable persistence.

use crate::{
    Contact, ContactDirectory, ContactId, ContactPatch, DirectoryError, LinkedIdMapping, Message,
    MessageId, NewContact, StoreResult, TenantId, Ticket, TicketId, TicketStatus,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::{
    params, Connection, OptionalExtension, Params, Row, Transaction, TransactionBehavior,
};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

const CONTACT_COLUMNS: &str = "id, tenant_id, name, number, is_group, profile_pic_url, \
     tags_json, extra_info_json, created_at, updated_at";
const MAPPING_COLUMNS: &str = "id, tenant_id, lid, contact_id, created_at";
const MESSAGE_COLUMNS: &str = "id, tenant_id, contact_id, body, created_at";
const TICKET_COLUMNS: &str = "id, tenant_id, contact_id, status, created_at, updated_at";

/// Persistent SQLite directory shared by every tenant.
#[derive(Debug)]
pub struct SqliteContactDirectory {
    db_path: PathBuf,
}

impl SqliteContactDirectory {
    /// Creates a SQLite-backed directory at `path`, creating schema if needed.
    pub fn new(path: impl AsRef<Path>) -> StoreResult<Self> {
        let db_path = path.as_ref().to_path_buf();
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let directory = Self { db_path };
        let connection = directory.open_connection()?;
        directory.initialize_schema(&connection)?;
        Ok(directory)
    }

    pub fn path(&self) -> &Path {
        &self.db_path
    }

    fn open_connection(&self) -> StoreResult<Connection> {
        let connection = Connection::open(&self.db_path)?;
        connection.busy_timeout(Duration::from_secs(5))?;
        connection.execute_batch(
            r#"
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA foreign_keys = ON;
            "#,
        )?;
        Ok(connection)
    }

    fn initialize_schema(&self, connection: &Connection) -> StoreResult<()> {
        connection.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS contacts (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                tenant_id INTEGER NOT NULL,
                name TEXT NOT NULL,
                number TEXT NOT NULL,
                is_group INTEGER NOT NULL,
                profile_pic_url TEXT NULL,
                tags_json TEXT NOT NULL,
                extra_info_json TEXT NOT NULL,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL,
                UNIQUE (tenant_id, number)
            );

            CREATE TABLE IF NOT EXISTS linked_id_mappings (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                tenant_id INTEGER NOT NULL,
                lid TEXT NOT NULL,
                contact_id INTEGER NOT NULL UNIQUE,
                created_at TEXT NOT NULL,
                UNIQUE (tenant_id, lid),
                FOREIGN KEY(contact_id) REFERENCES contacts(id) ON DELETE CASCADE
            );

            CREATE TABLE IF NOT EXISTS messages (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                tenant_id INTEGER NOT NULL,
                contact_id INTEGER NOT NULL,
                body TEXT NOT NULL,
                created_at TEXT NOT NULL,
                FOREIGN KEY(contact_id) REFERENCES contacts(id)
            );

            CREATE INDEX IF NOT EXISTS idx_messages_contact ON messages (tenant_id, contact_id);

            CREATE TABLE IF NOT EXISTS tickets (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                tenant_id INTEGER NOT NULL,
                contact_id INTEGER NOT NULL,
                status TEXT NOT NULL,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL,
                FOREIGN KEY(contact_id) REFERENCES contacts(id)
            );

            CREATE INDEX IF NOT EXISTS idx_tickets_contact ON tickets (tenant_id, contact_id, status);
            "#,
        )?;
        Ok(())
    }
}

#[async_trait]
impl ContactDirectory for SqliteContactDirectory {
    async fn insert_contact(&self, contact: NewContact) -> StoreResult<Contact> {
        let mut connection = self.open_connection()?;
        let transaction = connection.transaction_with_behavior(TransactionBehavior::Immediate)?;
        if number_taken(&transaction, contact.tenant_id, &contact.number, None)? {
            return Err(DirectoryError::DuplicateNumber {
                tenant_id: contact.tenant_id,
                number: contact.number,
            });
        }

        let now = timestamp_to_db(Utc::now());
        transaction.execute(
            r#"
            INSERT INTO contacts (
                tenant_id, name, number, is_group, profile_pic_url,
                tags_json, extra_info_json, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, '[]', '{}', ?6, ?6)
            "#,
            params![
                contact.tenant_id.get(),
                contact.name,
                contact.number,
                contact.is_group,
                contact.profile_pic_url,
                now,
            ],
        )?;
        let contact_id = ContactId(transaction.last_insert_rowid());
        let inserted = select_contact(&transaction, "id = ?1", params![contact_id.get()])?
            .ok_or(DirectoryError::ContactNotFound {
                tenant_id: contact.tenant_id,
                contact_id,
            })?;
        transaction.commit()?;
        Ok(inserted)
    }

    async fn get_contact(
        &self,
        tenant_id: TenantId,
        contact_id: ContactId,
    ) -> StoreResult<Option<Contact>> {
        let connection = self.open_connection()?;
        select_contact(
            &connection,
            "tenant_id = ?1 AND id = ?2",
            params![tenant_id.get(), contact_id.get()],
        )
    }

    async fn find_contact_by_number(
        &self,
        tenant_id: TenantId,
        number: &str,
    ) -> StoreResult<Option<Contact>> {
        let connection = self.open_connection()?;
        select_contact(
            &connection,
            "tenant_id = ?1 AND number = ?2",
            params![tenant_id.get(), number],
        )
    }

    async fn find_contact_by_any_number(
        &self,
        tenant_id: TenantId,
        numbers: &[String],
        exclude: Option<ContactId>,
    ) -> StoreResult<Option<Contact>> {
        let connection = self.open_connection()?;
        let mut best: Option<Contact> = None;
        for number in numbers {
            let candidate = select_contact(
                &connection,
                "tenant_id = ?1 AND number = ?2 AND id IS NOT ?3",
                params![tenant_id.get(), number, exclude.map(ContactId::get)],
            )?;
            if let Some(candidate) = candidate {
                if best.as_ref().map_or(true, |current| candidate.id < current.id) {
                    best = Some(candidate);
                }
            }
        }
        Ok(best)
    }

    async fn update_contact(
        &self,
        tenant_id: TenantId,
        contact_id: ContactId,
        patch: ContactPatch,
    ) -> StoreResult<Contact> {
        let mut connection = self.open_connection()?;
        let transaction = connection.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let mut contact = select_contact(
            &transaction,
            "tenant_id = ?1 AND id = ?2",
            params![tenant_id.get(), contact_id.get()],
        )?
        .ok_or(DirectoryError::ContactNotFound {
            tenant_id,
            contact_id,
        })?;
        if let Some(number) = patch.number.as_deref() {
            if number_taken(&transaction, tenant_id, number, Some(contact_id))? {
                return Err(DirectoryError::DuplicateNumber {
                    tenant_id,
                    number: number.to_string(),
                });
            }
        }

        if patch.apply_to(&mut contact) {
            contact.updated_at = Utc::now();
            transaction.execute(
                r#"
                UPDATE contacts
                SET name = ?1, number = ?2, profile_pic_url = ?3, updated_at = ?4
                WHERE id = ?5
                "#,
                params![
                    contact.name,
                    contact.number,
                    contact.profile_pic_url,
                    timestamp_to_db(contact.updated_at),
                    contact_id.get(),
                ],
            )?;
        }
        transaction.commit()?;
        Ok(contact)
    }

    async fn delete_contact(&self, tenant_id: TenantId, contact_id: ContactId) -> StoreResult<()> {
        let mut connection = self.open_connection()?;
        let transaction = connection.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let owned_rows: i64 = transaction.query_row(
            r#"
            SELECT
                (SELECT COUNT(*) FROM messages WHERE contact_id = ?1)
                + (SELECT COUNT(*) FROM tickets WHERE contact_id = ?1)
            "#,
            params![contact_id.get()],
            |row| row.get(0),
        )?;
        if owned_rows > 0 {
            return Err(DirectoryError::ContactInUse { contact_id });
        }

        let deleted = transaction.execute(
            "DELETE FROM contacts WHERE tenant_id = ?1 AND id = ?2",
            params![tenant_id.get(), contact_id.get()],
        )?;
        if deleted == 0 {
            return Err(DirectoryError::ContactNotFound {
                tenant_id,
                contact_id,
            });
        }
        transaction.commit()?;
        tracing::debug!(%tenant_id, %contact_id, "deleted contact row");
        Ok(())
    }

    async fn list_contacts(&self, tenant_id: TenantId) -> StoreResult<Vec<Contact>> {
        let connection = self.open_connection()?;
        let sql = format!("SELECT {CONTACT_COLUMNS} FROM contacts WHERE tenant_id = ?1 ORDER BY id");
        let mut statement = connection.prepare(&sql)?;
        let rows = statement
            .query_map(params![tenant_id.get()], read_contact_row)?
            .collect::<Result<Vec<_>, _>>()?;
        rows.into_iter().map(ContactRow::into_contact).collect()
    }

    async fn insert_mapping(
        &self,
        tenant_id: TenantId,
        lid: &str,
        contact_id: ContactId,
    ) -> StoreResult<LinkedIdMapping> {
        let mut connection = self.open_connection()?;
        let transaction = connection.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let contact_exists = transaction
            .query_row(
                "SELECT 1 FROM contacts WHERE tenant_id = ?1 AND id = ?2",
                params![tenant_id.get(), contact_id.get()],
                |row| row.get::<_, i64>(0),
            )
            .optional()?;
        if contact_exists.is_none() {
            return Err(DirectoryError::ContactNotFound {
                tenant_id,
                contact_id,
            });
        }
        let conflict = transaction
            .query_row(
                r#"
                SELECT 1 FROM linked_id_mappings
                WHERE (tenant_id = ?1 AND lid = ?2) OR contact_id = ?3
                LIMIT 1
                "#,
                params![tenant_id.get(), lid, contact_id.get()],
                |row| row.get::<_, i64>(0),
            )
            .optional()?;
        if conflict.is_some() {
            return Err(DirectoryError::DuplicateMapping {
                tenant_id,
                lid: lid.to_string(),
                contact_id,
            });
        }

        let created_at = Utc::now();
        transaction.execute(
            r#"
            INSERT INTO linked_id_mappings (tenant_id, lid, contact_id, created_at)
            VALUES (?1, ?2, ?3, ?4)
            "#,
            params![
                tenant_id.get(),
                lid,
                contact_id.get(),
                timestamp_to_db(created_at),
            ],
        )?;
        let id = transaction.last_insert_rowid();
        transaction.commit()?;
        Ok(LinkedIdMapping {
            id,
            tenant_id,
            lid: lid.to_string(),
            contact_id,
            created_at,
        })
    }

    async fn find_mapping_by_lid(
        &self,
        tenant_id: TenantId,
        lid: &str,
    ) -> StoreResult<Option<LinkedIdMapping>> {
        let connection = self.open_connection()?;
        select_mapping(
            &connection,
            "tenant_id = ?1 AND lid = ?2",
            params![tenant_id.get(), lid],
        )
    }

    async fn find_mapping_by_contact(
        &self,
        tenant_id: TenantId,
        contact_id: ContactId,
    ) -> StoreResult<Option<LinkedIdMapping>> {
        let connection = self.open_connection()?;
        select_mapping(
            &connection,
            "tenant_id = ?1 AND contact_id = ?2",
            params![tenant_id.get(), contact_id.get()],
        )
    }

    async fn list_mappings(&self, tenant_id: TenantId) -> StoreResult<Vec<LinkedIdMapping>> {
        let connection = self.open_connection()?;
        let sql = format!(
            "SELECT {MAPPING_COLUMNS} FROM linked_id_mappings WHERE tenant_id = ?1 ORDER BY id"
        );
        let mut statement = connection.prepare(&sql)?;
        let rows = statement
            .query_map(params![tenant_id.get()], read_mapping_row)?
            .collect::<Result<Vec<_>, _>>()?;
        rows.into_iter().map(MappingRow::into_mapping).collect()
    }

    async fn insert_message(
        &self,
        tenant_id: TenantId,
        contact_id: ContactId,
        body: &str,
    ) -> StoreResult<Message> {
        let mut connection = self.open_connection()?;
        let transaction = connection.transaction_with_behavior(TransactionBehavior::Immediate)?;
        require_contact(&transaction, tenant_id, contact_id)?;
        let created_at = Utc::now();
        transaction.execute(
            "INSERT INTO messages (tenant_id, contact_id, body, created_at) VALUES (?1, ?2, ?3, ?4)",
            params![
                tenant_id.get(),
                contact_id.get(),
                body,
                timestamp_to_db(created_at),
            ],
        )?;
        let id = MessageId(transaction.last_insert_rowid());
        transaction.commit()?;
        Ok(Message {
            id,
            tenant_id,
            contact_id,
            body: body.to_string(),
            created_at,
        })
    }

    async fn list_messages(
        &self,
        tenant_id: TenantId,
        contact_id: ContactId,
    ) -> StoreResult<Vec<Message>> {
        let connection = self.open_connection()?;
        let sql = format!(
            "SELECT {MESSAGE_COLUMNS} FROM messages WHERE tenant_id = ?1 AND contact_id = ?2 ORDER BY id"
        );
        let mut statement = connection.prepare(&sql)?;
        let rows = statement
            .query_map(params![tenant_id.get(), contact_id.get()], |row| {
                Ok((
                    row.get::<_, i64>(0)?,
                    row.get::<_, i64>(1)?,
                    row.get::<_, i64>(2)?,
                    row.get::<_, String>(3)?,
                    row.get::<_, String>(4)?,
                ))
            })?
            .collect::<Result<Vec<_>, _>>()?;
        rows.into_iter()
            .map(|(id, tenant_id, contact_id, body, created_at)| {
                Ok(Message {
                    id: MessageId(id),
                    tenant_id: TenantId(tenant_id),
                    contact_id: ContactId(contact_id),
                    body,
                    created_at: timestamp_from_db(&created_at)?,
                })
            })
            .collect()
    }

    async fn reassign_messages(
        &self,
        tenant_id: TenantId,
        from: ContactId,
        to: ContactId,
    ) -> StoreResult<u64> {
        let mut connection = self.open_connection()?;
        let transaction = connection.transaction_with_behavior(TransactionBehavior::Immediate)?;
        require_contact(&transaction, tenant_id, to)?;
        let moved = transaction.execute(
            "UPDATE messages SET contact_id = ?1 WHERE tenant_id = ?2 AND contact_id = ?3",
            params![to.get(), tenant_id.get(), from.get()],
        )?;
        transaction.commit()?;
        Ok(moved as u64)
    }

    async fn insert_ticket(
        &self,
        tenant_id: TenantId,
        contact_id: ContactId,
        status: TicketStatus,
    ) -> StoreResult<Ticket> {
        let mut connection = self.open_connection()?;
        let transaction = connection.transaction_with_behavior(TransactionBehavior::Immediate)?;
        require_contact(&transaction, tenant_id, contact_id)?;
        let now = Utc::now();
        transaction.execute(
            r#"
            INSERT INTO tickets (tenant_id, contact_id, status, created_at, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?4)
            "#,
            params![
                tenant_id.get(),
                contact_id.get(),
                status.as_str(),
                timestamp_to_db(now),
            ],
        )?;
        let id = TicketId(transaction.last_insert_rowid());
        transaction.commit()?;
        Ok(Ticket {
            id,
            tenant_id,
            contact_id,
            status,
            created_at: now,
            updated_at: now,
        })
    }

    async fn get_ticket(
        &self,
        tenant_id: TenantId,
        ticket_id: TicketId,
    ) -> StoreResult<Option<Ticket>> {
        let connection = self.open_connection()?;
        select_ticket(&connection, tenant_id, ticket_id)
    }

    async fn list_tickets(
        &self,
        tenant_id: TenantId,
        contact_id: ContactId,
    ) -> StoreResult<Vec<Ticket>> {
        let connection = self.open_connection()?;
        let sql = format!(
            "SELECT {TICKET_COLUMNS} FROM tickets WHERE tenant_id = ?1 AND contact_id = ?2 ORDER BY id"
        );
        let mut statement = connection.prepare(&sql)?;
        let rows = statement
            .query_map(params![tenant_id.get(), contact_id.get()], read_ticket_row)?
            .collect::<Result<Vec<_>, _>>()?;
        rows.into_iter().map(TicketRow::into_ticket).collect()
    }

    async fn set_ticket_status(
        &self,
        tenant_id: TenantId,
        ticket_id: TicketId,
        status: TicketStatus,
    ) -> StoreResult<Ticket> {
        let connection = self.open_connection()?;
        let updated = connection.execute(
            r#"
            UPDATE tickets SET status = ?1, updated_at = ?2
            WHERE tenant_id = ?3 AND id = ?4 AND status <> ?1
            "#,
            params![
                status.as_str(),
                timestamp_to_db(Utc::now()),
                tenant_id.get(),
                ticket_id.get(),
            ],
        )?;
        tracing::trace!(
            %tenant_id,
            %ticket_id,
            status = status.as_str(),
            updated,
            "set ticket status"
        );
        select_ticket(&connection, tenant_id, ticket_id)?.ok_or(DirectoryError::TicketNotFound {
            tenant_id,
            ticket_id,
        })
    }

    async fn reassign_tickets(
        &self,
        tenant_id: TenantId,
        from: ContactId,
        to: ContactId,
    ) -> StoreResult<u64> {
        let mut connection = self.open_connection()?;
        let transaction = connection.transaction_with_behavior(TransactionBehavior::Immediate)?;
        require_contact(&transaction, tenant_id, to)?;
        let moved = transaction.execute(
            r#"
            UPDATE tickets SET contact_id = ?1, updated_at = ?2
            WHERE tenant_id = ?3 AND contact_id = ?4
            "#,
            params![
                to.get(),
                timestamp_to_db(Utc::now()),
                tenant_id.get(),
                from.get(),
            ],
        )?;
        transaction.commit()?;
        Ok(moved as u64)
    }
}

struct ContactRow {
    id: i64,
    tenant_id: i64,
    name: String,
    number: String,
    is_group: bool,
    profile_pic_url: Option<String>,
    tags_json: String,
    extra_info_json: String,
    created_at: String,
    updated_at: String,
}

impl ContactRow {
    fn into_contact(self) -> StoreResult<Contact> {
        let tags: Vec<String> = serde_json::from_str(&self.tags_json)?;
        let extra_info: BTreeMap<String, String> = serde_json::from_str(&self.extra_info_json)?;
        Ok(Contact {
            id: ContactId(self.id),
            tenant_id: TenantId(self.tenant_id),
            name: self.name,
            number: self.number,
            is_group: self.is_group,
            profile_pic_url: self.profile_pic_url,
            tags,
            extra_info,
            created_at: timestamp_from_db(&self.created_at)?,
            updated_at: timestamp_from_db(&self.updated_at)?,
        })
    }
}

fn read_contact_row(row: &Row<'_>) -> rusqlite::Result<ContactRow> {
    Ok(ContactRow {
        id: row.get(0)?,
        tenant_id: row.get(1)?,
        name: row.get(2)?,
        number: row.get(3)?,
        is_group: row.get(4)?,
        profile_pic_url: row.get(5)?,
        tags_json: row.get(6)?,
        extra_info_json: row.get(7)?,
        created_at: row.get(8)?,
        updated_at: row.get(9)?,
    })
}

struct MappingRow {
    id: i64,
    tenant_id: i64,
    lid: String,
    contact_id: i64,
    created_at: String,
}

impl MappingRow {
    fn into_mapping(self) -> StoreResult<LinkedIdMapping> {
        Ok(LinkedIdMapping {
            id: self.id,
            tenant_id: TenantId(self.tenant_id),
            lid: self.lid,
            contact_id: ContactId(self.contact_id),
            created_at: timestamp_from_db(&self.created_at)?,
        })
    }
}

fn read_mapping_row(row: &Row<'_>) -> rusqlite::Result<MappingRow> {
    Ok(MappingRow {
        id: row.get(0)?,
        tenant_id: row.get(1)?,
        lid: row.get(2)?,
        contact_id: row.get(3)?,
        created_at: row.get(4)?,
    })
}

struct TicketRow {
    id: i64,
    tenant_id: i64,
    contact_id: i64,
    status: String,
    created_at: String,
    updated_at: String,
}

impl TicketRow {
    fn into_ticket(self) -> StoreResult<Ticket> {
        Ok(Ticket {
            id: TicketId(self.id),
            tenant_id: TenantId(self.tenant_id),
            contact_id: ContactId(self.contact_id),
            status: ticket_status_from_db(&self.status)?,
            created_at: timestamp_from_db(&self.created_at)?,
            updated_at: timestamp_from_db(&self.updated_at)?,
        })
    }
}

fn read_ticket_row(row: &Row<'_>) -> rusqlite::Result<TicketRow> {
    Ok(TicketRow {
        id: row.get(0)?,
        tenant_id: row.get(1)?,
        contact_id: row.get(2)?,
        status: row.get(3)?,
        created_at: row.get(4)?,
        updated_at: row.get(5)?,
    })
}

fn select_contact<P: Params>(
    connection: &Connection,
    predicate: &str,
    params: P,
) -> StoreResult<Option<Contact>> {
    let sql = format!("SELECT {CONTACT_COLUMNS} FROM contacts WHERE {predicate} ORDER BY id LIMIT 1");
    connection
        .query_row(&sql, params, read_contact_row)
        .optional()?
        .map(ContactRow::into_contact)
        .transpose()
}

fn select_mapping<P: Params>(
    connection: &Connection,
    predicate: &str,
    params: P,
) -> StoreResult<Option<LinkedIdMapping>> {
    let sql = format!("SELECT {MAPPING_COLUMNS} FROM linked_id_mappings WHERE {predicate} LIMIT 1");
    connection
        .query_row(&sql, params, read_mapping_row)
        .optional()?
        .map(MappingRow::into_mapping)
        .transpose()
}

fn select_ticket(
    connection: &Connection,
    tenant_id: TenantId,
    ticket_id: TicketId,
) -> StoreResult<Option<Ticket>> {
    let sql = format!("SELECT {TICKET_COLUMNS} FROM tickets WHERE tenant_id = ?1 AND id = ?2");
    connection
        .query_row(&sql, params![tenant_id.get(), ticket_id.get()], read_ticket_row)
        .optional()?
        .map(TicketRow::into_ticket)
        .transpose()
}

fn number_taken(
    transaction: &Transaction<'_>,
    tenant_id: TenantId,
    number: &str,
    exclude: Option<ContactId>,
) -> StoreResult<bool> {
    let found = transaction
        .query_row(
            "SELECT 1 FROM contacts WHERE tenant_id = ?1 AND number = ?2 AND id IS NOT ?3",
            params![tenant_id.get(), number, exclude.map(ContactId::get)],
            |row| row.get::<_, i64>(0),
        )
        .optional()?;
    Ok(found.is_some())
}

fn require_contact(
    transaction: &Transaction<'_>,
    tenant_id: TenantId,
    contact_id: ContactId,
) -> StoreResult<()> {
    let found = transaction
        .query_row(
            "SELECT 1 FROM contacts WHERE tenant_id = ?1 AND id = ?2",
            params![tenant_id.get(), contact_id.get()],
            |row| row.get::<_, i64>(0),
        )
        .optional()?;
    if found.is_none() {
        return Err(DirectoryError::ContactNotFound {
            tenant_id,
            contact_id,
        });
    }
    Ok(())
}

fn timestamp_to_db(value: DateTime<Utc>) -> String {
    value.to_rfc3339()
}

fn timestamp_from_db(value: &str) -> StoreResult<DateTime<Utc>> {
    Ok(DateTime::parse_from_rfc3339(value)?.with_timezone(&Utc))
}

fn ticket_status_from_db(value: &str) -> StoreResult<TicketStatus> {
    TicketStatus::parse(value).ok_or_else(|| DirectoryError::InvalidPersistedValue {
        field: "ticket_status",
        value: value.to_string(),
    })
}
