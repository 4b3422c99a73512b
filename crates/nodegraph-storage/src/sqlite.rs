//! SQLite implementation of [`DocumentStore`].
//!
//! One row per document and one row per element, keyed by document position.
//! Payloads are stored as the exact JSON text they were saved with. Every
//! write runs in a transaction.

use rusqlite::{params, Connection, OptionalExtension, Row};
use serde_json::value::RawValue;

use nodegraph_core::id::{Guid, ReferenceId};

use crate::document::{StoredDocument, StoredElement};
use crate::error::StorageError;
use crate::traits::DocumentStore;
use crate::types::{DocumentId, DocumentSummary};

pub struct SqliteStore {
    conn: Connection,
}

impl SqliteStore {
    /// Opens (or creates) a SQLite database at `path`.
    pub fn new(path: &str) -> Result<Self, StorageError> {
        let conn = crate::schema::open_database(path)?;
        Ok(SqliteStore { conn })
    }

    pub fn in_memory() -> Result<Self, StorageError> {
        let conn = crate::schema::open_in_memory()?;
        Ok(SqliteStore { conn })
    }

    fn assert_document_exists(&self, id: DocumentId) -> Result<(), StorageError> {
        let exists: bool = self.conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM documents WHERE id = ?1)",
            params![id.0],
            |row| row.get(0),
        )?;
        if exists {
            Ok(())
        } else {
            Err(StorageError::DocumentNotFound(id.0))
        }
    }
}

/// Raw column values of an element row, converted outside the rusqlite
/// closure so conversion errors keep their own variants.
struct ElementRow {
    guid: String,
    type_name: String,
    category: String,
    reference_id: i64,
    payload: String,
}

impl ElementRow {
    const COLUMNS: &'static str = "guid, type_name, category, reference_id, payload";

    fn read(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(ElementRow {
            guid: row.get(0)?,
            type_name: row.get(1)?,
            category: row.get(2)?,
            reference_id: row.get(3)?,
            payload: row.get(4)?,
        })
    }

    fn into_element(self) -> Result<StoredElement, StorageError> {
        let guid = parse_guid(&self.guid)?;
        let category = self
            .category
            .parse()
            .map_err(|reason| StorageError::InvalidRow { reason })?;
        Ok(StoredElement {
            type_name: self.type_name,
            category,
            guid,
            reference_id: ReferenceId(self.reference_id),
            payload: RawValue::from_string(self.payload)?,
        })
    }
}

fn parse_guid(text: &str) -> Result<Guid, StorageError> {
    Guid::parse(text).ok_or_else(|| StorageError::InvalidRow {
        reason: format!("malformed guid '{}'", text),
    })
}

impl DocumentStore for SqliteStore {
    fn create_document(&mut self, name: &str) -> Result<DocumentId, StorageError> {
        let tx = self.conn.transaction()?;
        tx.execute(
            "INSERT INTO documents (name, graph_guid, format_version) VALUES (?1, ?2, ?3)",
            params![
                name,
                Guid::generate().to_string(),
                crate::document::FORMAT_VERSION
            ],
        )?;
        let id = tx.last_insert_rowid();
        tx.commit()?;
        Ok(DocumentId(id))
    }

    fn save_document(
        &mut self,
        id: DocumentId,
        document: &StoredDocument,
    ) -> Result<(), StorageError> {
        self.assert_document_exists(id)?;
        let tx = self.conn.transaction()?;
        tx.execute(
            "UPDATE documents SET name = ?2, graph_guid = ?3, format_version = ?4 WHERE id = ?1",
            params![
                id.0,
                document.name,
                document.graph.to_string(),
                document.format_version
            ],
        )?;
        tx.execute("DELETE FROM elements WHERE document_id = ?1", params![id.0])?;
        {
            let mut stmt = tx.prepare_cached(
                "INSERT INTO elements (document_id, position, guid, type_name, category, reference_id, payload)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            )?;
            for (position, element) in document.elements.iter().enumerate() {
                stmt.execute(params![
                    id.0,
                    position as i64,
                    element.guid.to_string(),
                    element.type_name,
                    element.category.as_str(),
                    element.reference_id.0,
                    element.payload.get(),
                ])?;
            }
        }
        tx.commit()?;
        Ok(())
    }

    fn load_document(&self, id: DocumentId) -> Result<StoredDocument, StorageError> {
        let header: Option<(String, String, u32)> = self
            .conn
            .query_row(
                "SELECT name, graph_guid, format_version FROM documents WHERE id = ?1",
                params![id.0],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
            )
            .optional()?;
        let Some((name, graph, format_version)) = header else {
            return Err(StorageError::DocumentNotFound(id.0));
        };
        if format_version != crate::document::FORMAT_VERSION {
            return Err(StorageError::UnsupportedFormat {
                version: format_version,
            });
        }

        let mut stmt = self.conn.prepare_cached(&format!(
            "SELECT {} FROM elements WHERE document_id = ?1 ORDER BY position",
            ElementRow::COLUMNS
        ))?;
        let rows = stmt.query_map(params![id.0], ElementRow::read)?;
        let mut elements = Vec::new();
        for row in rows {
            elements.push(row?.into_element()?);
        }

        Ok(StoredDocument {
            format_version,
            graph: parse_guid(&graph)?,
            name,
            elements,
        })
    }

    fn delete_document(&mut self, id: DocumentId) -> Result<(), StorageError> {
        self.assert_document_exists(id)?;
        let tx = self.conn.transaction()?;
        // Element rows go with the document through ON DELETE CASCADE.
        tx.execute("DELETE FROM documents WHERE id = ?1", params![id.0])?;
        tx.commit()?;
        Ok(())
    }

    fn list_documents(&self) -> Result<Vec<DocumentSummary>, StorageError> {
        let mut stmt = self.conn.prepare_cached(
            "SELECT d.id, d.name, d.graph_guid, COUNT(e.guid)
             FROM documents d LEFT JOIN elements e ON e.document_id = d.id
             GROUP BY d.id ORDER BY d.id",
        )?;
        let rows = stmt.query_map([], |row| {
            let id: i64 = row.get(0)?;
            let name: String = row.get(1)?;
            let graph: String = row.get(2)?;
            let count: i64 = row.get(3)?;
            Ok((id, name, graph, count))
        })?;
        let mut result = Vec::new();
        for row in rows {
            let (id, name, graph, count) = row?;
            result.push(DocumentSummary {
                id: DocumentId(id),
                name,
                graph: parse_guid(&graph)?,
                element_count: count as usize,
            });
        }
        Ok(result)
    }

    fn get_element(&self, id: DocumentId, guid: Guid) -> Result<StoredElement, StorageError> {
        let row = self
            .conn
            .query_row(
                &format!(
                    "SELECT {} FROM elements WHERE document_id = ?1 AND guid = ?2 ORDER BY position LIMIT 1",
                    ElementRow::COLUMNS
                ),
                params![id.0, guid.to_string()],
                ElementRow::read,
            )
            .optional()?;
        match row {
            Some(row) => row.into_element(),
            None => Err(StorageError::ElementNotFound {
                document: id.0,
                guid,
            }),
        }
    }

    fn update_element(
        &mut self,
        id: DocumentId,
        element: &StoredElement,
    ) -> Result<(), StorageError> {
        let tx = self.conn.transaction()?;
        let rows = tx.execute(
            "UPDATE elements SET type_name = ?3, category = ?4, payload = ?5
             WHERE document_id = ?1 AND guid = ?2",
            params![
                id.0,
                element.guid.to_string(),
                element.type_name,
                element.category.as_str(),
                element.payload.get(),
            ],
        )?;
        tx.commit()?;
        if rows == 0 {
            return Err(StorageError::ElementNotFound {
                document: id.0,
                guid: element.guid,
            });
        }
        Ok(())
    }
}
