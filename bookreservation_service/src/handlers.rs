use std::sync::Arc;

use actix_web::http::header::LOCATION;
use actix_web::web::Data;
use actix_web::{Error, HttpResponse};
use paperclip::actix::{
    api_v2_operation,
    web::{self},
};

use crate::api::{BookDraft, BookId, BookReplacement, GetAllBooksResponse, ReservationComment};
use crate::books_repository::{BookRepository, BookRepositoryError};
use crate::reservation_service::{ReservationService, ReservationServiceError};

#[api_v2_operation]
pub async fn health() -> Result<HttpResponse, Error> {
    Ok(HttpResponse::Ok().finish())
}

#[api_v2_operation]
pub async fn get_all_books(
    books_repository: Data<Arc<dyn BookRepository>>,
) -> Result<HttpResponse, Error> {
    Ok(match books_repository.list_books().await {
        Ok(books) => HttpResponse::Ok().json(GetAllBooksResponse { books }),
        Err(err) => {
            tracing::error!("Get all books failed {}", err);
            HttpResponse::InternalServerError().finish()
        }
    })
}

#[api_v2_operation]
pub async fn get_reserved_books(
    books_repository: Data<Arc<dyn BookRepository>>,
) -> Result<HttpResponse, Error> {
    Ok(match books_repository.list_books_by_status(true).await {
        Ok(books) => HttpResponse::Ok().json(GetAllBooksResponse { books }),
        Err(err) => {
            tracing::error!("Get reserved books failed {}", err);
            HttpResponse::InternalServerError().finish()
        }
    })
}

#[api_v2_operation]
pub async fn get_available_books(
    books_repository: Data<Arc<dyn BookRepository>>,
) -> Result<HttpResponse, Error> {
    Ok(match books_repository.list_books_by_status(false).await {
        Ok(books) => HttpResponse::Ok().json(GetAllBooksResponse { books }),
        Err(err) => {
            tracing::error!("Get available books failed {}", err);
            HttpResponse::InternalServerError().finish()
        }
    })
}

#[api_v2_operation]
pub async fn add_book(
    books_repository: Data<Arc<dyn BookRepository>>,
    draft: web::Json<BookDraft>,
) -> Result<HttpResponse, Error> {
    Ok(match books_repository.add_book(draft.into_inner()).await {
        Ok(book) => HttpResponse::Created()
            .append_header((LOCATION, format!("/api/book/{}", book.id)))
            .json(book),
        Err(BookRepositoryError::EmptyTitle) => HttpResponse::BadRequest().finish(),
        Err(err) => {
            tracing::error!("Add book failed {}", err);
            HttpResponse::InternalServerError().finish()
        }
    })
}

#[api_v2_operation]
pub async fn get_book(
    books_repository: Data<Arc<dyn BookRepository>>,
    book_id: web::Path<BookId>,
) -> Result<HttpResponse, Error> {
    Ok(
        match books_repository.get_book(book_id.into_inner()).await {
            Ok(book) => HttpResponse::Ok().json(book),
            Err(BookRepositoryError::NotFound(_)) => HttpResponse::NotFound().finish(),
            Err(err) => {
                tracing::error!("Get book failed {}", err);
                HttpResponse::InternalServerError().finish()
            }
        },
    )
}

#[api_v2_operation]
pub async fn get_book_history(
    books_repository: Data<Arc<dyn BookRepository>>,
    book_id: web::Path<BookId>,
) -> Result<HttpResponse, Error> {
    Ok(
        match books_repository.list_history(book_id.into_inner()).await {
            Ok(history) => HttpResponse::Ok().json(history),
            Err(BookRepositoryError::NotFound(_)) => HttpResponse::NotFound().finish(),
            Err(err) => {
                tracing::error!("Get book history failed {}", err);
                HttpResponse::InternalServerError().finish()
            }
        },
    )
}

#[api_v2_operation]
pub async fn reserve_book(
    reservation_service: Data<Arc<ReservationService>>,
    book_id: web::Path<BookId>,
    note: web::Query<ReservationComment>,
) -> Result<HttpResponse, Error> {
    Ok(
        match reservation_service
            .reserve(book_id.into_inner(), note.into_inner().comment)
            .await
        {
            Ok(book) => HttpResponse::Ok().json(book),
            Err(ReservationServiceError::NotFound(_)) => HttpResponse::NotFound().finish(),
            Err(ReservationServiceError::AlreadyReserved(_))
            | Err(ReservationServiceError::AlreadyAvailable(_)) => {
                HttpResponse::Conflict().finish()
            }
            Err(err) => {
                tracing::error!("Reserve book failed {}", err);
                HttpResponse::InternalServerError().finish()
            }
        },
    )
}

#[api_v2_operation]
pub async fn unreserve_book(
    reservation_service: Data<Arc<ReservationService>>,
    book_id: web::Path<BookId>,
    note: web::Query<ReservationComment>,
) -> Result<HttpResponse, Error> {
    Ok(
        match reservation_service
            .unreserve(book_id.into_inner(), note.into_inner().comment)
            .await
        {
            Ok(book) => HttpResponse::Ok().json(book),
            Err(ReservationServiceError::NotFound(_)) => HttpResponse::NotFound().finish(),
            Err(ReservationServiceError::AlreadyReserved(_))
            | Err(ReservationServiceError::AlreadyAvailable(_)) => {
                HttpResponse::Conflict().finish()
            }
            Err(err) => {
                tracing::error!("Unreserve book failed {}", err);
                HttpResponse::InternalServerError().finish()
            }
        },
    )
}

#[api_v2_operation]
pub async fn replace_book(
    reservation_service: Data<Arc<ReservationService>>,
    book_id: web::Path<BookId>,
    replacement: web::Json<BookReplacement>,
) -> Result<HttpResponse, Error> {
    Ok(
        match reservation_service
            .replace_details(book_id.into_inner(), replacement.into_inner())
            .await
        {
            Ok(()) => HttpResponse::NoContent().finish(),
            Err(ReservationServiceError::NotFound(_)) => HttpResponse::NotFound().finish(),
            Err(err) => {
                tracing::error!("Replace book failed {}", err);
                HttpResponse::InternalServerError().finish()
            }
        },
    )
}

#[api_v2_operation]
pub async fn delete_book(
    reservation_service: Data<Arc<ReservationService>>,
    book_id: web::Path<BookId>,
) -> Result<HttpResponse, Error> {
    Ok(
        match reservation_service
            .delete_book(book_id.into_inner())
            .await
        {
            Ok(()) => HttpResponse::NoContent().finish(),
            Err(ReservationServiceError::NotFound(_)) => HttpResponse::NotFound().finish(),
            Err(err) => {
                tracing::error!("Delete book failed {}", err);
                HttpResponse::InternalServerError().finish()
            }
        },
    )
}
