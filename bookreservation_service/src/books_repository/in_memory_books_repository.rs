use std::collections::HashMap;
use std::sync::atomic::{AtomicI32, Ordering};

use crate::api::{
    Book, BookDraft, BookId, BookReplacement, BookStatusChange, BookStatusHistoryRecord,
};
use crate::books_repository::{BookRepository, BookRepositoryError};

pub struct InMemoryBookRepository {
    book_sequence_generator: AtomicI32,
    history_sequence_generator: AtomicI32,
    books: parking_lot::RwLock<HashMap<BookId, Book>>,
    history: parking_lot::RwLock<HashMap<BookId, Vec<BookStatusHistoryRecord>>>,
}

impl Default for InMemoryBookRepository {
    fn default() -> Self {
        // Sequences start at 1 to match the ids a SERIAL column would assign
        Self {
            book_sequence_generator: AtomicI32::new(1),
            history_sequence_generator: AtomicI32::new(1),
            books: Default::default(),
            history: Default::default(),
        }
    }
}

#[async_trait::async_trait]
impl BookRepository for InMemoryBookRepository {
    async fn add_book(&self, draft: BookDraft) -> Result<Book, BookRepositoryError> {
        if draft.title.is_empty() {
            return Err(BookRepositoryError::EmptyTitle);
        }
        let id = self.book_sequence_generator.fetch_add(1, Ordering::Relaxed);
        let book = Book {
            id,
            title: draft.title,
            reserved: false,
            comment: draft.comment,
        };
        self.books.write().insert(id, book.clone());
        Ok(book)
    }

    async fn get_book(&self, book_id: BookId) -> Result<Book, BookRepositoryError> {
        self.books
            .read()
            .get(&book_id)
            .cloned()
            .ok_or(BookRepositoryError::NotFound(book_id))
    }

    async fn list_books(&self) -> Result<Vec<Book>, BookRepositoryError> {
        Ok(self.books.read().values().cloned().collect())
    }

    async fn list_books_by_status(
        &self,
        reserved: bool,
    ) -> Result<Vec<Book>, BookRepositoryError> {
        Ok(self
            .books
            .read()
            .values()
            .filter(|book| book.reserved == reserved)
            .cloned()
            .collect())
    }

    async fn replace_book(
        &self,
        book_id: BookId,
        replacement: BookReplacement,
    ) -> Result<bool, BookRepositoryError> {
        let mut locked_books = self.books.write();
        if let Some(book) = locked_books.get_mut(&book_id) {
            book.title = replacement.title;
            book.reserved = replacement.reserved;
            book.comment = replacement.comment;
            Ok(true)
        } else {
            Ok(false)
        }
    }

    async fn delete_book(&self, book_id: BookId) -> Result<bool, BookRepositoryError> {
        if self.books.write().remove(&book_id).is_some() {
            self.history.write().remove(&book_id);
            Ok(true)
        } else {
            Ok(false)
        }
    }

    async fn append_history(
        &self,
        change: BookStatusChange,
    ) -> Result<BookStatusHistoryRecord, BookRepositoryError> {
        let id = self.history_sequence_generator.fetch_add(1, Ordering::Relaxed);
        let record = BookStatusHistoryRecord {
            id,
            book_id: change.book_id,
            reserved: change.reserved,
            status_changed_on: change.status_changed_on,
        };
        self.history
            .write()
            .entry(change.book_id)
            .or_default()
            .push(record.clone());
        Ok(record)
    }

    async fn list_history(
        &self,
        book_id: BookId,
    ) -> Result<Vec<BookStatusHistoryRecord>, BookRepositoryError> {
        if !self.books.read().contains_key(&book_id) {
            return Err(BookRepositoryError::NotFound(book_id));
        }
        Ok(self
            .history
            .read()
            .get(&book_id)
            .cloned()
            .unwrap_or_default())
    }
}

#[cfg(test)]
mod in_memory_book_repository_tests {
    use crate::api::{Book, BookDraft, BookReplacement, BookStatusChange};
    use crate::books_repository::{BookRepository, BookRepositoryError, InMemoryBookRepository};

    #[tokio::test]
    /// Tests if add_book and get_book work correctly
    /// 1. Gets a book that does not exist to get not found
    /// 2. Rejects a draft with an empty title
    /// 3. Adds a book and reads it back, new books start not reserved
    async fn test_add_book_and_get_it() {
        let repo = InMemoryBookRepository::default();

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
                title: "Dune".to_string(),
                comment: None,
            })
            .await
            .expect("Failed to add book");
        assert!(!book.reserved);

        let returned = repo.get_book(book.id).await.expect("Failed to get book");
        assert_eq!(returned, book);
    }

    #[tokio::test]
    /// Tests if list_books and list_books_by_status work correctly
    /// 1. Lists an empty repository
    /// 2. Adds two books
    /// 3. Marks one of them reserved via replace_book
    /// 4. Checks the full list and both filtered lists
    async fn test_add_books_and_list_them() {
        let repo = InMemoryBookRepository::default();

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

        repo.replace_book(
            book2.id,
            BookReplacement {
                title: book2.title.clone(),
                reserved: true,
                comment: Some("taken".to_string()),
            },
        )
        .await
        .expect("Failed to replace book");

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
    /// Tests if replace_book overwrites every mutable field
    /// 1. Replaces a book that does not exist to get false
    /// 2. Adds a book and replaces all fields
    /// 3. Reads the book back and checks the overwrite
    async fn test_replace_book_overwrites_all_fields() {
        let repo = InMemoryBookRepository::default();

        let not_replaced = repo
            .replace_book(
                2000,
                BookReplacement {
                    title: "anything".to_string(),
                    reserved: false,
                    comment: None,
                },
            )
            .await
            .expect("Failed to replace");
        assert!(!not_replaced);

        let book = repo
            .add_book(BookDraft {
                title: "first title".to_string(),
                comment: Some("first".to_string()),
            })
            .await
            .expect("Failed to add book");

        let replaced = repo
            .replace_book(
                book.id,
                BookReplacement {
                    title: "replaced".to_string(),
                    reserved: true,
                    comment: None,
                },
            )
            .await
            .expect("Failed to replace");
        assert!(replaced);

        assert_eq!(
            repo.get_book(book.id).await.unwrap(),
            Book {
                id: book.id,
                title: "replaced".to_string(),
                reserved: true,
                comment: None,
            }
        );
    }

    #[tokio::test]
    /// Tests if history records are appended and listed in order
    /// and if delete_book removes the book together with its history
    async fn test_history_append_list_and_cascade_delete() {
        let repo = InMemoryBookRepository::default();

        let unknown_history = repo.list_history(555).await;
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
