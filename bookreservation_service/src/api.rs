use paperclip::actix::Apiv2Schema;
use serde::{Deserialize, Serialize};

pub type BookId = i32;
pub type HistoryId = i32;

#[derive(Debug, Clone, Serialize, Deserialize, Eq, PartialEq, Apiv2Schema)]
/// A single book as stored in the repository
pub struct Book {
    pub id: BookId,
    pub title: String,
    pub reserved: bool,
    pub comment: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Eq, PartialEq, Apiv2Schema)]
/// Input for creating a book, the repository assigns the id.
/// New books always start as not reserved.
pub struct BookDraft {
    pub title: String,
    pub comment: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Eq, PartialEq, Apiv2Schema)]
/// Full overwrite of all mutable fields of a book, every field is explicit
pub struct BookReplacement {
    pub title: String,
    pub reserved: bool,
    pub comment: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Eq, PartialEq, Apiv2Schema)]
/// One entry of the append only status history of a book.
/// `reserved` is the state the book transitioned to at `status_changed_on`.
pub struct BookStatusHistoryRecord {
    pub id: HistoryId,
    pub book_id: BookId,
    pub reserved: bool,
    pub status_changed_on: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, Eq, PartialEq, Apiv2Schema)]
/// Status change to be appended to the history, the repository assigns the record id
pub struct BookStatusChange {
    pub book_id: BookId,
    pub reserved: bool,
    pub status_changed_on: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, Eq, PartialEq, Apiv2Schema)]
/// Reservation note passed as a query parameter on reserve and unreserve
pub struct ReservationComment {
    pub comment: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, Eq, PartialEq, Apiv2Schema)]
pub struct GetAllBooksResponse {
    pub books: Vec<Book>,
}
