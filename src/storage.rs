use std::str::FromStr;

use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("фильм «{0}» уже есть в каталоге")]
    DuplicateTitle(String),
    #[error(transparent)]
    Db(#[from] sqlx::Error),
}

/// Каталог фильмов: название -> file_id загруженного видео.
/// Записи создаются один раз и не меняются; правок и удаления нет.
#[derive(Clone)]
pub struct CatalogStore {
    pool: SqlitePool,
}

impl CatalogStore {
    pub async fn connect(url: &str) -> anyhow::Result<Self> {
        let options = SqliteConnectOptions::from_str(url)?.create_if_missing(true);
        // одно соединение: нагрузка копеечная, а `sqlite::memory:` живёт в рамках соединения
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await?;
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS Movies (
                Id INTEGER PRIMARY KEY AUTOINCREMENT,
                Title TEXT UNIQUE NOT NULL,
                MediaRef TEXT NOT NULL
            )",
        )
        .execute(&pool)
        .await?;
        Ok(Self { pool })
    }

    /// Дубликат по названию отклоняется, существующая запись не трогается.
    pub async fn insert(&self, title: &str, media_ref: &str) -> Result<(), StorageError> {
        let res = sqlx::query("INSERT INTO Movies (Title, MediaRef) VALUES (?, ?)")
            .bind(title)
            .bind(media_ref)
            .execute(&self.pool)
            .await;
        match res {
            Ok(_) => Ok(()),
            Err(sqlx::Error::Database(e)) if e.is_unique_violation() => {
                Err(StorageError::DuplicateTitle(title.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Точное совпадение названия, регистр учитывается.
    pub async fn find_by_title(&self, title: &str) -> Result<Option<String>, StorageError> {
        let row: Option<(String,)> = sqlx::query_as("SELECT MediaRef FROM Movies WHERE Title = ?")
            .bind(title)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(|(media_ref,)| media_ref))
    }

    pub async fn list_titles(&self) -> Result<Vec<String>, StorageError> {
        let rows: Vec<(String,)> = sqlx::query_as("SELECT Title FROM Movies")
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.into_iter().map(|(title,)| title).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn store() -> CatalogStore {
        CatalogStore::connect("sqlite::memory:").await.unwrap()
    }

    #[tokio::test]
    async fn duplicate_title_is_rejected_and_first_record_wins() {
        let store = store().await;
        store.insert("Matrix", "ref1").await.unwrap();

        let err = store.insert("Matrix", "ref2").await.unwrap_err();
        assert!(matches!(err, StorageError::DuplicateTitle(_)));
        assert_eq!(
            store.find_by_title("Matrix").await.unwrap().as_deref(),
            Some("ref1")
        );
    }

    #[tokio::test]
    async fn lookup_is_exact_and_case_sensitive() {
        let store = store().await;
        store.insert("Дюна", "ref-dune").await.unwrap();

        assert_eq!(
            store.find_by_title("Дюна").await.unwrap().as_deref(),
            Some("ref-dune")
        );
        assert_eq!(store.find_by_title("дюна").await.unwrap(), None);
        assert_eq!(store.find_by_title("Matrix").await.unwrap(), None);
    }

    #[tokio::test]
    async fn list_titles_returns_every_inserted_title() {
        let store = store().await;
        assert!(store.list_titles().await.unwrap().is_empty());

        store.insert("Дюна", "r1").await.unwrap();
        store.insert("Матрица", "r2").await.unwrap();

        let mut titles = store.list_titles().await.unwrap();
        titles.sort();
        assert_eq!(titles, ["Дюна", "Матрица"]);
    }

    #[tokio::test]
    async fn titles_sharing_media_ref_are_allowed() {
        let store = store().await;
        store.insert("Дюна", "same-ref").await.unwrap();
        store.insert("Дюна 2", "same-ref").await.unwrap();

        assert_eq!(store.list_titles().await.unwrap().len(), 2);
    }
}
