//! Document operations.

use rusqlite::{params, OptionalExtension};

use super::{Database, DocumentStore, StoreError, StoreResult};

impl DocumentStore for Database {
    fn get_document(&self, id: &str) -> StoreResult<Option<String>> {
        self.conn()?
            .query_row("SELECT body FROM documents WHERE id = ?", [id], |row| {
                row.get(0)
            })
            .optional()
            .map_err(Into::into)
    }

    fn put_document(&self, id: &str, body: &str) -> StoreResult<()> {
        let size = body.len();
        if size > self.max_document_bytes {
            return Err(StoreError::DocumentTooLarge {
                id: id.to_string(),
                size,
                limit: self.max_document_bytes,
            });
        }

        self.conn()?.execute(
            r#"
            INSERT INTO documents (id, body, size_bytes, updated_at)
            VALUES (?1, ?2, ?3, datetime('now'))
            ON CONFLICT(id) DO UPDATE SET
                body = excluded.body,
                size_bytes = excluded.size_bytes,
                updated_at = excluded.updated_at
            "#,
            params![id, body, size as i64],
        )?;
        Ok(())
    }

    fn delete_document(&self, id: &str) -> StoreResult<bool> {
        let rows_affected = self
            .conn()?
            .execute("DELETE FROM documents WHERE id = ?", [id])?;
        Ok(rows_affected > 0)
    }

    fn list_document_ids(&self, prefix: &str) -> StoreResult<Vec<String>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT id FROM documents
            WHERE substr(id, 1, length(?1)) = ?1
            ORDER BY id
            "#,
        )?;

        let rows = stmt.query_map([prefix], |row| row.get(0))?;
        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }

    fn max_document_bytes(&self) -> usize {
        self.max_document_bytes
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn setup_db() -> Database {
        Database::open_in_memory().unwrap()
    }

    #[test]
    fn test_put_and_get() {
        let db = setup_db();

        db.put_document("analytics/summary", r#"{"a":1}"#).unwrap();

        let body = db.get_document("analytics/summary").unwrap();
        assert_eq!(body, Some(r#"{"a":1}"#.into()));
        assert_eq!(db.get_document("analytics/missing").unwrap(), None);
    }

    #[test]
    fn test_put_replaces() {
        let db = setup_db();

        db.put_document("doc", "one").unwrap();
        db.put_document("doc", "two").unwrap();

        assert_eq!(db.get_document("doc").unwrap(), Some("two".into()));
        assert_eq!(db.list_document_ids("").unwrap().len(), 1);
    }

    #[test]
    fn test_size_ceiling() {
        let db = setup_db().with_max_document_bytes(8);

        assert!(db.put_document("small", "12345678").is_ok());
        let result = db.put_document("big", "123456789");
        assert!(matches!(
            result,
            Err(StoreError::DocumentTooLarge { size: 9, limit: 8, .. })
        ));
        assert_eq!(db.get_document("big").unwrap(), None);
    }

    #[test]
    fn test_list_by_prefix_is_ordered() {
        let db = setup_db();

        db.put_document("analytics/patients_002", "c").unwrap();
        db.put_document("analytics/patients_000", "a").unwrap();
        db.put_document("analytics/patients_001", "b").unwrap();
        db.put_document("analytics/summary", "s").unwrap();
        db.put_document("other/patients_000", "x").unwrap();

        let ids = db.list_document_ids("analytics/patients_").unwrap();
        assert_eq!(
            ids,
            vec![
                "analytics/patients_000",
                "analytics/patients_001",
                "analytics/patients_002",
            ]
        );
    }

    #[test]
    fn test_prefix_with_wildcard_characters() {
        let db = setup_db();

        db.put_document("a%b/1", "x").unwrap();
        db.put_document("aXb/1", "y").unwrap();

        assert_eq!(db.list_document_ids("a%b/").unwrap(), vec!["a%b/1"]);
    }

    #[test]
    fn test_delete() {
        let db = setup_db();

        db.put_document("doc", "x").unwrap();
        assert!(db.delete_document("doc").unwrap());
        assert!(!db.delete_document("doc").unwrap());
        assert_eq!(db.get_document("doc").unwrap(), None);
    }
}
