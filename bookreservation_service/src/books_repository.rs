pub use in_memory_books_repository::InMemoryBookRepository;
pub use postgres_books_repository::{PostgresBooksRepository, PostgresBooksRepositoryConfig};

use crate::api::{
    Book, BookDraft, BookId, BookReplacement, BookStatusChange, BookStatusHistoryRecord,
};

mod in_memory_books_repository;
mod postgres_books_repository;

#[derive(thiserror::Error, Debug)]
pub enum BookRepositoryError {
    #[error("Book title must not be empty")]
    EmptyTitle,

    #[error("Book {0} not found")]
    NotFound(BookId),

    #[error("Failed to deserialize book: {0}")]
    DeserializationError(#[from] serde_json::Error),

    #[error("DatabaseFailure failure {0}")]
    DatabaseFailure(#[from] tokio_postgres::Error),

    #[error("Other error {0}")]
    Other(String),
}

/// Dumb store for books and their status history.
/// Reservation transition rules live in the reservation service, not here.
#[async_trait::async_trait]
pub trait BookRepository: Send + Sync {
    /// Adds a book to the repository, returns the stored book with its assigned id
    async fn add_book(&self, draft: BookDraft) -> Result<Book, BookRepositoryError>;
    /// Retrieves a single book from the repository
    async fn get_book(&self, book_id: BookId) -> Result<Book, BookRepositoryError>;
    /// Lists all books in the repository
    async fn list_books(&self) -> Result<Vec<Book>, BookRepositoryError>;
    /// Lists books that are in the given reservation state
    async fn list_books_by_status(&self, reserved: bool)
        -> Result<Vec<Book>, BookRepositoryError>;
    /// Overwrites title, reserved and comment of an existing book,
    /// returns true if the book was updated and false if it was not found
    async fn replace_book(
        &self,
        book_id: BookId,
        replacement: BookReplacement,
    ) -> Result<bool, BookRepositoryError>;
    /// Removes a book together with its status history,
    /// returns true if the book was deleted and false if it was not found
    async fn delete_book(&self, book_id: BookId) -> Result<bool, BookRepositoryError>;
    /// Appends a status change to the history, returns the stored record
    async fn append_history(
        &self,
        change: BookStatusChange,
    ) -> Result<BookStatusHistoryRecord, BookRepositoryError>;
    /// Lists the status history of a book, oldest record first
    async fn list_history(
        &self,
        book_id: BookId,
    ) -> Result<Vec<BookStatusHistoryRecord>, BookRepositoryError>;
}
