use async_trait::async_trait;
use sqlx::{PgConnection, Postgres, QueryBuilder};
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::cancel::ensure_live;
use crate::datasets::{
    dto::RowQuery,
    ordering,
    repo_types::{FileRecord, NewRow, RowRecord},
};
use crate::db::{FileId, PgStore, RowId, UserId};
use crate::error::Result;

/// Storage for files and their ordered rows.
///
/// Methods taking an `owner` fold the ownership check into the statement
/// itself; the others trust the caller to have checked it.
#[async_trait]
pub trait DatasetRepo: Send + Sync {
    /// Inserts the file record and every row in one transaction.
    async fn create_file_with_rows(
        &self,
        owner: UserId,
        filename: &str,
        rows: &[NewRow],
        cancel: &CancellationToken,
    ) -> Result<FileRecord>;

    async fn list_files(&self, owner: UserId) -> Result<Vec<FileRecord>>;

    async fn file_owned_by(&self, owner: UserId, file_id: FileId) -> Result<bool>;

    /// Rows ordered by `(position, id)`.
    async fn list_rows(&self, file_id: FileId, query: &RowQuery) -> Result<Vec<RowRecord>>;

    /// Inserts the row and, in the same transaction, renumbers the file when
    /// the new key crowds a neighbour. Returns the row as committed.
    async fn insert_row(
        &self,
        file_id: FileId,
        row: &NewRow,
        cancel: &CancellationToken,
    ) -> Result<RowRecord>;

    /// Update counterpart of [`DatasetRepo::insert_row`]. `None` when the row
    /// is absent, in another file, or not the owner's.
    async fn update_owned_row(
        &self,
        owner: UserId,
        file_id: FileId,
        row_id: RowId,
        row: &NewRow,
        cancel: &CancellationToken,
    ) -> Result<Option<RowRecord>>;

    /// Number of rows removed (0 or 1).
    async fn delete_owned_row(&self, owner: UserId, file_id: FileId, row_id: RowId) -> Result<u64>;
}

const ROW_COLUMNS: &str = "id, file_id, position, input_text, created_at";

#[async_trait]
impl DatasetRepo for PgStore {
    async fn create_file_with_rows(
        &self,
        owner: UserId,
        filename: &str,
        rows: &[NewRow],
        cancel: &CancellationToken,
    ) -> Result<FileRecord> {
        let mut tx = self.pool.begin().await?;

        let file = sqlx::query_as::<_, FileRecord>(
            r#"
            INSERT INTO csv_files (filename, uploaded_by)
            VALUES ($1, $2)
            RETURNING id, filename, uploaded_by, uploaded_at
            "#,
        )
        .bind(filename)
        .bind(owner)
        .fetch_one(&mut *tx)
        .await?;

        for row in rows {
            // dropping `tx` on early return rolls everything back
            ensure_live(cancel)?;
            sqlx::query(
                r#"
                INSERT INTO csv_rows (file_id, position, input_text)
                VALUES ($1, $2, $3)
                "#,
            )
            .bind(file.id)
            .bind(row.position)
            .bind(&row.input_text)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(file)
    }

    async fn list_files(&self, owner: UserId) -> Result<Vec<FileRecord>> {
        let files = sqlx::query_as::<_, FileRecord>(
            r#"
            SELECT id, filename, uploaded_by, uploaded_at
            FROM csv_files
            WHERE uploaded_by = $1
            ORDER BY id
            "#,
        )
        .bind(owner)
        .fetch_all(&self.pool)
        .await?;
        Ok(files)
    }

    async fn file_owned_by(&self, owner: UserId, file_id: FileId) -> Result<bool> {
        let owned: bool = sqlx::query_scalar(
            r#"SELECT EXISTS (SELECT 1 FROM csv_files WHERE id = $1 AND uploaded_by = $2)"#,
        )
        .bind(file_id)
        .bind(owner)
        .fetch_one(&self.pool)
        .await?;
        Ok(owned)
    }

    async fn list_rows(&self, file_id: FileId, query: &RowQuery) -> Result<Vec<RowRecord>> {
        let mut qb = QueryBuilder::<Postgres>::new(format!("SELECT {ROW_COLUMNS} FROM csv_rows WHERE file_id = "));
        qb.push_bind(file_id);
        if let Some(term) = query.search_term() {
            qb.push(" AND input_text ILIKE ").push_bind(format!("%{}%", escape_like(term)));
        }
        qb.push(" ORDER BY position ASC, id ASC");
        if let Some(limit) = query.limit {
            qb.push(" LIMIT ").push_bind(limit.max(0));
        }
        if query.offset > 0 {
            qb.push(" OFFSET ").push_bind(query.offset);
        }
        let rows = qb
            .build_query_as::<RowRecord>()
            .fetch_all(&self.pool)
            .await?;
        Ok(rows)
    }

    async fn insert_row(
        &self,
        file_id: FileId,
        row: &NewRow,
        cancel: &CancellationToken,
    ) -> Result<RowRecord> {
        let mut tx = self.pool.begin().await?;
        let created = sqlx::query_as::<_, RowRecord>(&format!(
            r#"
            INSERT INTO csv_rows (file_id, position, input_text, created_at)
            VALUES ($1, $2, $3, NOW())
            RETURNING {ROW_COLUMNS}
            "#
        ))
        .bind(file_id)
        .bind(row.position)
        .bind(&row.input_text)
        .fetch_one(&mut *tx)
        .await?;

        let stored = rebalance(&mut tx, created).await?;
        ensure_live(cancel)?;
        tx.commit().await?;
        Ok(stored)
    }

    async fn update_owned_row(
        &self,
        owner: UserId,
        file_id: FileId,
        row_id: RowId,
        row: &NewRow,
        cancel: &CancellationToken,
    ) -> Result<Option<RowRecord>> {
        let mut tx = self.pool.begin().await?;
        let updated = sqlx::query_as::<_, RowRecord>(
            r#"
            UPDATE csv_rows r
               SET position = $1, input_text = $2
              FROM csv_files f
             WHERE r.id = $3
               AND r.file_id = $4
               AND f.id = r.file_id
               AND f.uploaded_by = $5
            RETURNING r.id, r.file_id, r.position, r.input_text, r.created_at
            "#,
        )
        .bind(row.position)
        .bind(&row.input_text)
        .bind(row_id)
        .bind(file_id)
        .bind(owner)
        .fetch_optional(&mut *tx)
        .await?;

        let Some(updated) = updated else {
            return Ok(None);
        };
        let stored = rebalance(&mut tx, updated).await?;
        ensure_live(cancel)?;
        tx.commit().await?;
        Ok(Some(stored))
    }

    async fn delete_owned_row(&self, owner: UserId, file_id: FileId, row_id: RowId) -> Result<u64> {
        let result = sqlx::query(
            r#"
            DELETE FROM csv_rows
             WHERE id = $1
               AND file_id = $2
               AND EXISTS (SELECT 1 FROM csv_files WHERE id = $2 AND uploaded_by = $3)
            "#,
        )
        .bind(row_id)
        .bind(file_id)
        .bind(owner)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }
}

/// Positions of the rows directly before and after `row` in display order.
async fn neighbours(conn: &mut PgConnection, row: &RowRecord) -> Result<(Option<f64>, Option<f64>)> {
    let prev: Option<f64> = sqlx::query_scalar(
        r#"
        SELECT position FROM csv_rows
         WHERE file_id = $1 AND (position, id) < ($2, $3)
         ORDER BY position DESC, id DESC
         LIMIT 1
        "#,
    )
    .bind(row.file_id)
    .bind(row.position)
    .bind(row.id)
    .fetch_optional(&mut *conn)
    .await?;

    let next: Option<f64> = sqlx::query_scalar(
        r#"
        SELECT position FROM csv_rows
         WHERE file_id = $1 AND (position, id) > ($2, $3)
         ORDER BY position ASC, id ASC
         LIMIT 1
        "#,
    )
    .bind(row.file_id)
    .bind(row.position)
    .bind(row.id)
    .fetch_optional(&mut *conn)
    .await?;

    Ok((prev, next))
}

/// Renumbers the file when `row` crowds a neighbour and returns its final state.
async fn rebalance(conn: &mut PgConnection, row: RowRecord) -> Result<RowRecord> {
    let (prev, next) = neighbours(&mut *conn, &row).await?;
    if !ordering::crowds_neighbours(prev, row.position, next) {
        return Ok(row);
    }

    let renumbered = renumber_file(&mut *conn, row.file_id).await?;
    info!(file_id = row.file_id, rows = renumbered, "file renumbered");

    let row = sqlx::query_as::<_, RowRecord>(&format!(
        "SELECT {ROW_COLUMNS} FROM csv_rows WHERE id = $1"
    ))
    .bind(row.id)
    .fetch_one(&mut *conn)
    .await?;
    Ok(row)
}

/// Rewrites every key of the file to the initial stride, keeping display order.
async fn renumber_file(conn: &mut PgConnection, file_id: FileId) -> Result<usize> {
    // lock the file's rows so concurrent edits wait for the new keys
    let ids: Vec<RowId> = sqlx::query_scalar(
        r#"
        SELECT id FROM csv_rows
         WHERE file_id = $1
         ORDER BY position ASC, id ASC
         FOR UPDATE
        "#,
    )
    .bind(file_id)
    .fetch_all(&mut *conn)
    .await?;

    let (ids, positions): (Vec<RowId>, Vec<f64>) = ordering::renumbered(ids).into_iter().unzip();
    sqlx::query(
        r#"
        UPDATE csv_rows r
           SET position = s.position
          FROM UNNEST($1::BIGINT[], $2::DOUBLE PRECISION[]) AS s(id, position)
         WHERE r.id = s.id
        "#,
    )
    .bind(&ids)
    .bind(&positions)
    .execute(&mut *conn)
    .await?;
    Ok(ids.len())
}

/// Escapes LIKE metacharacters so search terms match literally.
fn escape_like(term: &str) -> String {
    let mut out = String::with_capacity(term.len());
    for c in term.chars() {
        if matches!(c, '%' | '_' | '\\') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::PgPool;

    use crate::auth::{repo::UserRepo, repo_types::NewUser};

    fn live() -> CancellationToken {
        CancellationToken::new()
    }

    async fn user(store: &PgStore, email: &str) -> UserId {
        store
            .insert_user(NewUser {
                email: email.into(),
                username: "u".into(),
                password_hash: "hash".into(),
            })
            .await
            .unwrap()
            .id
    }

    async fn file_with(store: &PgStore, owner: UserId, texts: &[&str]) -> FileRecord {
        let rows: Vec<NewRow> = texts
            .iter()
            .enumerate()
            .map(|(i, text)| NewRow {
                position: ordering::initial_position(i),
                input_text: text.to_string(),
            })
            .collect();
        store
            .create_file_with_rows(owner, "data.csv", &rows, &live())
            .await
            .unwrap()
    }

    async fn listed(store: &PgStore, file_id: FileId, query: &RowQuery) -> Vec<(f64, String)> {
        store
            .list_rows(file_id, query)
            .await
            .unwrap()
            .into_iter()
            .map(|r| (r.position, r.input_text))
            .collect()
    }

    #[test]
    fn like_metacharacters_are_escaped() {
        assert_eq!(escape_like("50%_off\\"), "50\\%\\_off\\\\");
        assert_eq!(escape_like("plain"), "plain");
    }

    #[sqlx::test(migrations = "./migrations")]
    #[ignore] // Requires Postgres via DATABASE_URL
    async fn update_and_delete_are_owner_scoped(pool: PgPool) {
        let store = PgStore { pool };
        let owner = user(&store, "owner@b.com").await;
        let other = user(&store, "other@b.com").await;
        let file = file_with(&store, owner, &["x"]).await;
        let row = store.list_rows(file.id, &RowQuery::default()).await.unwrap().remove(0);
        let edit = NewRow {
            position: 15.0,
            input_text: "edited".into(),
        };

        let foreign = store
            .update_owned_row(other, file.id, row.id, &edit, &live())
            .await
            .unwrap();
        assert!(foreign.is_none());
        assert_eq!(store.delete_owned_row(other, file.id, row.id).await.unwrap(), 0);

        let updated = store
            .update_owned_row(owner, file.id, row.id, &edit, &live())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(updated.input_text, "edited");
        assert_eq!(store.delete_owned_row(owner, file.id, row.id).await.unwrap(), 1);
        assert!(listed(&store, file.id, &RowQuery::default()).await.is_empty());
    }

    #[sqlx::test(migrations = "./migrations")]
    #[ignore] // Requires Postgres via DATABASE_URL
    async fn duplicate_key_renumbers_in_display_order(pool: PgPool) {
        let store = PgStore { pool };
        let owner = user(&store, "owner@b.com").await;
        let file = file_with(&store, owner, &["x", "y"]).await;

        let created = store
            .insert_row(
                file.id,
                &NewRow {
                    position: 10.0,
                    input_text: "dup".into(),
                },
                &live(),
            )
            .await
            .unwrap();
        assert_eq!(created.position, 20.0);
        assert_eq!(
            listed(&store, file.id, &RowQuery::default()).await,
            vec![
                (10.0, "x".to_string()),
                (20.0, "dup".to_string()),
                (30.0, "y".to_string())
            ]
        );
    }

    #[sqlx::test(migrations = "./migrations")]
    #[ignore] // Requires Postgres via DATABASE_URL
    async fn cancelled_insert_is_rolled_back(pool: PgPool) {
        let store = PgStore { pool };
        let owner = user(&store, "owner@b.com").await;
        let file = file_with(&store, owner, &["x"]).await;
        let cancel = live();
        cancel.cancel();

        let row = NewRow {
            position: 20.0,
            input_text: "ghost".into(),
        };
        let err = store.insert_row(file.id, &row, &cancel).await.unwrap_err();
        assert!(matches!(err, crate::error::AppError::Cancelled));
        assert_eq!(listed(&store, file.id, &RowQuery::default()).await.len(), 1);
    }

    #[sqlx::test(migrations = "./migrations")]
    #[ignore] // Requires Postgres via DATABASE_URL
    async fn search_matches_metacharacters_literally(pool: PgPool) {
        let store = PgStore { pool };
        let owner = user(&store, "owner@b.com").await;
        let file = file_with(&store, owner, &["50% OFF", "500 off", "other"]).await;

        let query = RowQuery {
            search: Some("50%".into()),
            ..RowQuery::default()
        };
        assert_eq!(
            listed(&store, file.id, &query).await,
            vec![(10.0, "50% OFF".to_string())]
        );

        let query = RowQuery {
            search: Some("off".into()),
            limit: Some(1),
            offset: 1,
        };
        assert_eq!(
            listed(&store, file.id, &query).await,
            vec![(20.0, "500 off".to_string())]
        );
    }
}
