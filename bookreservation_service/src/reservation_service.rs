use std::collections::HashMap;
use std::sync::Arc;
use std::time::UNIX_EPOCH;

use crate::api::{Book, BookId, BookReplacement, BookStatusChange};
use crate::books_repository::{BookRepository, BookRepositoryError};

#[derive(Debug, thiserror::Error)]
pub enum ReservationServiceError {
    #[error("Book {0} not found")]
    NotFound(BookId),

    #[error("Book {0} already reserved")]
    AlreadyReserved(BookId),

    #[error("Book {0} already available")]
    AlreadyAvailable(BookId),

    #[error("Repository failure {0}")]
    Repository(#[from] BookRepositoryError),
}

/// Owner of the reservation state machine.
///
/// A book moves between available and reserved, every successful transition
/// overwrites the comment and appends one status history record. All mutations
/// of a single book are serialized on a per-book mutex so that two concurrent
/// transitions on the same id cannot both pass the precondition check, while
/// operations on different books proceed in parallel.
pub struct ReservationService {
    books_repository: Arc<dyn BookRepository>,
    book_locks: parking_lot::Mutex<HashMap<BookId, Arc<tokio::sync::Mutex<()>>>>,
}

impl ReservationService {
    pub fn new(books_repository: Arc<dyn BookRepository>) -> Self {
        Self {
            books_repository,
            book_locks: Default::default(),
        }
    }

    /// Marks an available book as reserved and appends a history record.
    /// Fails with AlreadyReserved and leaves everything untouched if the book
    /// is currently reserved.
    pub async fn reserve(
        &self,
        book_id: BookId,
        comment: String,
    ) -> Result<Book, ReservationServiceError> {
        let lock = self.lock_for(book_id);
        let _guard = lock.lock().await;

        let book = self.fetch(book_id).await?;
        if book.reserved {
            return Err(ReservationServiceError::AlreadyReserved(book_id));
        }
        self.transition(book, true, comment).await
    }

    /// Releases a reserved book and appends a history record.
    /// Fails with AlreadyAvailable and leaves everything untouched if the book
    /// is not currently reserved.
    pub async fn unreserve(
        &self,
        book_id: BookId,
        comment: String,
    ) -> Result<Book, ReservationServiceError> {
        let lock = self.lock_for(book_id);
        let _guard = lock.lock().await;

        let book = self.fetch(book_id).await?;
        if !book.reserved {
            return Err(ReservationServiceError::AlreadyAvailable(book_id));
        }
        self.transition(book, false, comment).await
    }

    /// Overwrites all mutable fields of a book without any transition checks.
    /// Administrative operation, does not append to the status history.
    pub async fn replace_details(
        &self,
        book_id: BookId,
        replacement: BookReplacement,
    ) -> Result<(), ReservationServiceError> {
        let lock = self.lock_for(book_id);
        let _guard = lock.lock().await;

        if self.books_repository.replace_book(book_id, replacement).await? {
            Ok(())
        } else {
            Err(ReservationServiceError::NotFound(book_id))
        }
    }

    /// Removes a book together with its status history.
    /// Takes the per-book lock so a transition in flight can never append
    /// history for a book that is being deleted.
    pub async fn delete_book(&self, book_id: BookId) -> Result<(), ReservationServiceError> {
        let lock = self.lock_for(book_id);
        let _guard = lock.lock().await;

        if self.books_repository.delete_book(book_id).await? {
            Ok(())
        } else {
            Err(ReservationServiceError::NotFound(book_id))
        }
    }

    async fn transition(
        &self,
        book: Book,
        reserved: bool,
        comment: String,
    ) -> Result<Book, ReservationServiceError> {
        let updated = Book {
            reserved,
            comment: Some(comment),
            ..book
        };
        let replaced = self
            .books_repository
            .replace_book(
                updated.id,
                BookReplacement {
                    title: updated.title.clone(),
                    reserved: updated.reserved,
                    comment: updated.comment.clone(),
                },
            )
            .await?;
        if !replaced {
            // deletes take the per-book lock too, so the id cannot vanish here
            return Err(ReservationServiceError::NotFound(updated.id));
        }
        self.books_repository
            .append_history(BookStatusChange {
                book_id: updated.id,
                reserved,
                status_changed_on: unix_timestamp(),
            })
            .await?;
        Ok(updated)
    }

    async fn fetch(&self, book_id: BookId) -> Result<Book, ReservationServiceError> {
        self.books_repository
            .get_book(book_id)
            .await
            .map_err(|err| match err {
                BookRepositoryError::NotFound(id) => ReservationServiceError::NotFound(id),
                other => ReservationServiceError::Repository(other),
            })
    }

    /// Fetches or creates the mutex guarding a single book id.
    /// Entries are never evicted, removing one could hand two tasks
    /// different mutexes for the same id.
    fn lock_for(&self, book_id: BookId) -> Arc<tokio::sync::Mutex<()>> {
        self.book_locks.lock().entry(book_id).or_default().clone()
    }
}

fn unix_timestamp() -> i64 {
    std::time::SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_secs() as i64
}
