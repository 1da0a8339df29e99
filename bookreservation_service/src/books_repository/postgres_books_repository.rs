use anyhow::Context;
use serde_json::json;
use tokio_postgres::{Client, NoTls, Statement};

use crate::api::{
    Book, BookDraft, BookId, BookReplacement, BookStatusChange, BookStatusHistoryRecord,
};
use crate::books_repository::{BookRepository, BookRepositoryError};

pub struct PostgresBooksRepository {
    client: Client,
}

pub struct PostgresBooksRepositoryConfig {
    pub hostname: String,
    pub username: String,
    pub password: String,
}

impl PostgresBooksRepository {
    pub async fn init(config: PostgresBooksRepositoryConfig) -> anyhow::Result<Self> {
        let connection_str = format!(
            "postgresql://{}:{}@{}",
            config.username, config.password, config.hostname
        );
        tracing::info!("Postgres connection_str: {}", connection_str);
        let (client, connection) = tokio_postgres::connect(&connection_str, NoTls)
            .await
            .context("Failed to start postgres")?;

        tokio::spawn(async move {
            if let Err(e) = connection.await {
                eprintln!("connection error: {}", e);
            }
        });

        client
            .batch_execute(
                "
        CREATE TABLE IF NOT EXISTS books (
            id              SERIAL PRIMARY KEY,
            params          JSONB
            )
        ",
            )
            .await
            .context("Failed to setup books table")?;

        client
            .batch_execute(
                "
        CREATE TABLE IF NOT EXISTS book_status_history (
            id                   SERIAL PRIMARY KEY,
            book_id              INTEGER NOT NULL,
            reserved             BOOLEAN NOT NULL,
            status_changed_on    BIGINT NOT NULL
            )
        ",
            )
            .await
            .context("Failed to setup book_status_history table")?;

        Ok(Self { client })
    }
}

// The params column carries the mutable fields of a book, which is exactly
// the shape of BookReplacement. The id lives in the SERIAL column.
fn book_from_params(
    book_id: BookId,
    params: serde_json::Value,
) -> Result<Book, BookRepositoryError> {
    let params: BookReplacement = serde_json::from_value(params)?;
    Ok(Book {
        id: book_id,
        title: params.title,
        reserved: params.reserved,
        comment: params.comment,
    })
}

#[async_trait::async_trait]
impl BookRepository for PostgresBooksRepository {
    async fn add_book(&self, draft: BookDraft) -> Result<Book, BookRepositoryError> {
        if draft.title.is_empty() {
            return Err(BookRepositoryError::EmptyTitle);
        }
        let params = BookReplacement {
            title: draft.title,
            reserved: false,
            comment: draft.comment,
        };

        let stmt: Statement = self
            .client
            .prepare("INSERT INTO books (params) VALUES ($1) RETURNING id")
            .await?;

        let rows = self.client.query(&stmt, &[&json!(params)]).await?;

        let book_id: BookId = rows
            .first()
            .ok_or_else(|| BookRepositoryError::Other("Id not returned".to_string()))?
            .try_get(0)?;

        Ok(Book {
            id: book_id,
            title: params.title,
            reserved: params.reserved,
            comment: params.comment,
        })
    }

    async fn get_book(&self, book_id: BookId) -> Result<Book, BookRepositoryError> {
        let stmt: Statement = self
            .client
            .prepare("SELECT params FROM books WHERE id = ($1)")
            .await?;

        let rows = self.client.query(&stmt, &[&book_id]).await?;

        let params: serde_json::Value = rows
            .first()
            .ok_or_else(|| BookRepositoryError::NotFound(book_id))?
            .try_get(0)?;

        book_from_params(book_id, params)
    }

    async fn list_books(&self) -> Result<Vec<Book>, BookRepositoryError> {
        let stmt: Statement = self.client.prepare("SELECT id, params FROM books").await?;

        let rows = self.client.query(&stmt, &[]).await?;

        rows.iter()
            .map(|row| {
                let book_id: BookId = row.try_get(0)?;
                let params: serde_json::Value = row.try_get(1)?;
                book_from_params(book_id, params)
            })
            .collect()
    }

    async fn list_books_by_status(
        &self,
        reserved: bool,
    ) -> Result<Vec<Book>, BookRepositoryError> {
        let stmt: Statement = self
            .client
            .prepare("SELECT id, params FROM books WHERE (params->>'reserved')::BOOLEAN = ($1)")
            .await?;

        let rows = self.client.query(&stmt, &[&reserved]).await?;

        rows.iter()
            .map(|row| {
                let book_id: BookId = row.try_get(0)?;
                let params: serde_json::Value = row.try_get(1)?;
                book_from_params(book_id, params)
            })
            .collect()
    }

    async fn replace_book(
        &self,
        book_id: BookId,
        replacement: BookReplacement,
    ) -> Result<bool, BookRepositoryError> {
        let stmt: Statement = self
            .client
            .prepare("UPDATE books SET params = ($1) WHERE id = ($2) RETURNING id")
            .await?;

        let rows = self
            .client
            .query(&stmt, &[&json!(replacement), &book_id])
            .await?;
        Ok(!rows.is_empty())
    }

    async fn delete_book(&self, book_id: BookId) -> Result<bool, BookRepositoryError> {
        // History rows go first so a failure in between cannot leave orphan history
        let stmt: Statement = self
            .client
            .prepare("DELETE FROM book_status_history WHERE book_id = ($1)")
            .await?;
        self.client.execute(&stmt, &[&book_id]).await?;

        let stmt: Statement = self
            .client
            .prepare("DELETE FROM books WHERE id = ($1) RETURNING id")
            .await?;
        let rows = self.client.query(&stmt, &[&book_id]).await?;
        Ok(!rows.is_empty())
    }

    async fn append_history(
        &self,
        change: BookStatusChange,
    ) -> Result<BookStatusHistoryRecord, BookRepositoryError> {
        let stmt: Statement = self
            .client
            .prepare(
                "INSERT INTO book_status_history (book_id, reserved, status_changed_on) \
                 VALUES ($1, $2, $3) RETURNING id",
            )
            .await?;

        let rows = self
            .client
            .query(
                &stmt,
                &[&change.book_id, &change.reserved, &change.status_changed_on],
            )
            .await?;

        let id = rows
            .first()
            .ok_or_else(|| BookRepositoryError::Other("Id not returned".to_string()))?
            .try_get(0)?;

        Ok(BookStatusHistoryRecord {
            id,
            book_id: change.book_id,
            reserved: change.reserved,
            status_changed_on: change.status_changed_on,
        })
    }

    async fn list_history(
        &self,
        book_id: BookId,
    ) -> Result<Vec<BookStatusHistoryRecord>, BookRepositoryError> {
        let stmt: Statement = self
            .client
            .prepare("SELECT id FROM books WHERE id = ($1)")
            .await?;
        let rows = self.client.query(&stmt, &[&book_id]).await?;
        if rows.is_empty() {
            return Err(BookRepositoryError::NotFound(book_id));
        }

        let stmt: Statement = self
            .client
            .prepare(
                "SELECT id, book_id, reserved, status_changed_on \
                 FROM book_status_history WHERE book_id = ($1) ORDER BY id",
            )
            .await?;

        let rows = self.client.query(&stmt, &[&book_id]).await?;

        rows.iter()
            .map(|row| {
                Ok(BookStatusHistoryRecord {
                    id: row.try_get(0)?,
                    book_id: row.try_get(1)?,
                    reserved: row.try_get(2)?,
                    status_changed_on: row.try_get(3)?,
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod postgres_books_repository_tests {
    use serial_test::file_serial;
    use testcontainers::core::IntoContainerPort;
    use testcontainers::runners::AsyncRunner;
    use testcontainers::{ContainerAsync, GenericImage, ImageExt};

    use crate::api::{Book, BookDraft, BookReplacement, BookStatusChange};
    use crate::books_repository::{BookRepository, BookRepositoryError};

    async fn start_postgres_container_and_init_repo() -> (
        ContainerAsync<GenericImage>,
        crate::books_repository::PostgresBooksRepository,
    ) {
        let _pg_container = GenericImage::new("postgres", "latest")
            .with_mapped_port(5432, 5432.tcp())
            .with_env_var("POSTGRES_USER", "postgres")
            .with_env_var("POSTGRES_PASSWORD", "postgres")
            .start()
            .await
            .expect("Failed to start postgres");

        for _ in 0..10 {
            if let Ok(repo) = crate::books_repository::PostgresBooksRepository::init(
                crate::books_repository::PostgresBooksRepositoryConfig {
                    hostname: "127.0.0.1".to_string(),
                    username: "postgres".to_string(),
                    password: "postgres".to_string(),
                },
            )
            .await
            {
                return (_pg_container, repo);
            }
            tokio::time::sleep(std::time::Duration::from_millis(300)).await;
        }
        panic!("Failed to setup postgres container")
    }

    #[tokio::test]
    #[file_serial(key, path => "../.pgtestslock")]
    /// Tests if add_book and get_book work correctly
    /// for the sake of not starting container multiple times it tests everything in one testcase
    async fn test_add_book_and_get_it() {
        let (_container, repo) = start_postgres_container_and_init_repo().await;

        let not_existing_book_id = 20000;
        let book_not_found = repo.get_book(not_existing_book_id).await;
        assert!(matches!(
            book_not_found,
            Err(BookRepositoryError::NotFound(..))
        ));

        let empty_title = repo
            .add_book(BookDraft {
                title: "".to_string(),
                comment: None,
            })
            .await;
        assert!(matches!(empty_title, Err(BookRepositoryError::EmptyTitle)));

        let book = repo
            .add_book(BookDraft {
                title: "xx".to_string(),
                comment: Some("note".to_string()),
            })
            .await
            .expect("Failed to add book");
        assert!(!book.reserved);

        let returned = repo.get_book(book.id).await.expect("Failed to get book");
        assert_eq!(returned, book);
    }

    #[tokio::test]
    #[file_serial(key, path => "../.pgtestslock")]
    /// Tests if list_books, list_books_by_status and replace_book work correctly
    /// for the sake of not starting container multiple times it tests everything in one testcase
    async fn test_add_books_replace_and_list_them() {
        let (_container, repo) = start_postgres_container_and_init_repo().await;

        let list = repo.list_books().await.expect("Failed to list books");
        assert_eq!(list, vec![]);

        let book1 = repo
            .add_book(BookDraft {
                title: "title1".to_string(),
                comment: None,
            })
            .await
            .expect("Failed to add book");
        let book2 = repo
            .add_book(BookDraft {
                title: "title2".to_string(),
                comment: None,
            })
            .await
            .expect("Failed to add book");

        let replaced = repo
            .replace_book(
                book2.id,
                BookReplacement {
                    title: "title2".to_string(),
                    reserved: true,
                    comment: Some("taken".to_string()),
                },
            )
            .await
            .expect("Failed to replace book");
        assert!(replaced);

        let not_replaced = repo
            .replace_book(
                book2.id + 1000,
                BookReplacement {
                    title: "anything".to_string(),
                    reserved: false,
                    comment: None,
                },
            )
            .await
            .expect("Failed to replace book");
        assert!(!not_replaced);

        let mut list = repo.list_books().await.expect("Failed to list books");
        list.sort_by_key(|book| book.id);
        assert_eq!(list.len(), 2);
        assert_eq!(list[0], book1);
        assert_eq!(
            list[1],
            Book {
                id: book2.id,
                title: "title2".to_string(),
                reserved: true,
                comment: Some("taken".to_string()),
            }
        );

        let reserved = repo
            .list_books_by_status(true)
            .await
            .expect("Failed to list reserved books");
        assert_eq!(reserved.len(), 1);
        assert_eq!(reserved[0].id, book2.id);

        let available = repo
            .list_books_by_status(false)
            .await
            .expect("Failed to list available books");
        assert_eq!(available, vec![book1]);
    }

    #[tokio::test]
    #[file_serial(key, path => "../.pgtestslock")]
    /// Tests if history append, history list and cascade delete work correctly
    /// for the sake of not starting container multiple times it tests everything in one testcase
    async fn test_history_and_cascade_delete() {
        let (_container, repo) = start_postgres_container_and_init_repo().await;

        let unknown_history = repo.list_history(55555).await;
        assert!(matches!(
            unknown_history,
            Err(BookRepositoryError::NotFound(..))
        ));

        let book = repo
            .add_book(BookDraft {
                title: "tracked".to_string(),
                comment: None,
            })
            .await
            .expect("Failed to add book");

        assert_eq!(repo.list_history(book.id).await.unwrap(), vec![]);

        let first = repo
            .append_history(BookStatusChange {
                book_id: book.id,
                reserved: true,
                status_changed_on: 100,
            })
            .await
            .expect("Failed to append history");
        let second = repo
            .append_history(BookStatusChange {
                book_id: book.id,
                reserved: false,
                status_changed_on: 200,
            })
            .await
            .expect("Failed to append history");
        assert!(first.id < second.id);

        let history = repo.list_history(book.id).await.unwrap();
        assert_eq!(history, vec![first, second]);

        let deleted = repo.delete_book(book.id).await.expect("Failed to delete");
        assert!(deleted);

        assert!(matches!(
            repo.get_book(book.id).await,
            Err(BookRepositoryError::NotFound(..))
        ));
        assert!(matches!(
            repo.list_history(book.id).await,
            Err(BookRepositoryError::NotFound(..))
        ));

        let deleted_again = repo.delete_book(book.id).await.expect("Failed to delete");
        assert!(!deleted_again);
    }
}
