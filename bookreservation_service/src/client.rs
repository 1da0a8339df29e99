use anyhow::{bail, Context};
use reqwest::header::LOCATION;
use reqwest::StatusCode;
use reqwest_middleware::{ClientBuilder, ClientWithMiddleware};
use reqwest_retry::policies::ExponentialBackoff;
use reqwest_retry::RetryTransientMiddleware;
use reqwest_tracing::TracingMiddleware;

use crate::api::{
    Book, BookDraft, BookId, BookReplacement, BookStatusHistoryRecord, GetAllBooksResponse,
};

pub struct BookReservationClient {
    url: String,
    client: ClientWithMiddleware,
}

impl BookReservationClient {
    pub fn new(url: &str) -> anyhow::Result<Self> {
        let reqwest_client = reqwest::Client::builder()
            .build()
            .context("Failed to build reqwest client")?;
        let retry_policy = ExponentialBackoff::builder().build_with_max_retries(3);
        let client = ClientBuilder::new(reqwest_client)
            // Insert the tracing middleware
            .with(TracingMiddleware::default())
            // Retry transient failures before giving up
            .with(RetryTransientMiddleware::new_with_policy(retry_policy))
            .build();

        Ok(Self {
            url: url.to_string(),
            client,
        })
    }

    /// Calls POST /api/books endpoint
    /// Returns the id of the added book
    pub async fn add_book(&self, draft: BookDraft) -> anyhow::Result<BookId> {
        let response = self
            .client
            .post(format!("{}/api/books", self.url))
            .json(&draft)
            .send()
            .await?;

        if !response.status().is_success() {
            let error: String = response.json().await.unwrap_or_default();
            bail!("Failed to add book {}", error)
        }

        let location_header = response
            .headers()
            .get(LOCATION)
            .context("No location header")?;

        location_header
            .to_str()
            .context("Failed to convert header to str")?
            .strip_prefix("/api/book/")
            .context("Invalid location header")?
            .parse()
            .context("Failed to parse book id")
    }

    /// Calls GET /api/book/{book_id} endpoint
    /// Returns the book if it was present
    /// None if it was not in the repository
    /// and error in case of any other failure
    pub async fn get_book(&self, book_id: BookId) -> anyhow::Result<Option<Book>> {
        let response = self
            .client
            .get(format!("{}/api/book/{}", self.url, book_id))
            .send()
            .await?;
        if response.status() == StatusCode::NOT_FOUND {
            Ok(None)
        } else if response.status().is_success() {
            Ok(Some(response.json().await?))
        } else {
            let error: String = response.json().await.unwrap_or_default();
            bail!("Failed to get book {}", error)
        }
    }

    /// Calls GET /api/books endpoint
    pub async fn list_books(&self) -> anyhow::Result<Vec<Book>> {
        let response = self
            .client
            .get(format!("{}/api/books", self.url))
            .send()
            .await?;
        if response.status().is_success() {
            let body: GetAllBooksResponse = response.json().await?;
            Ok(body.books)
        } else {
            let error: String = response.json().await.unwrap_or_default();
            bail!("Failed to list books {}", error)
        }
    }

    /// Calls GET /api/books/reserved endpoint
    pub async fn list_reserved_books(&self) -> anyhow::Result<Vec<Book>> {
        let response = self
            .client
            .get(format!("{}/api/books/reserved", self.url))
            .send()
            .await?;
        if response.status().is_success() {
            let body: GetAllBooksResponse = response.json().await?;
            Ok(body.books)
        } else {
            let error: String = response.json().await.unwrap_or_default();
            bail!("Failed to list reserved books {}", error)
        }
    }

    /// Calls GET /api/books/available endpoint
    pub async fn list_available_books(&self) -> anyhow::Result<Vec<Book>> {
        let response = self
            .client
            .get(format!("{}/api/books/available", self.url))
            .send()
            .await?;
        if response.status().is_success() {
            let body: GetAllBooksResponse = response.json().await?;
            Ok(body.books)
        } else {
            let error: String = response.json().await.unwrap_or_default();
            bail!("Failed to list available books {}", error)
        }
    }

    /// Calls POST /api/book/{book_id}/reservation endpoint
    /// Returns true if the book was reserved and false on a reservation conflict
    pub async fn reserve_book(&self, book_id: BookId, comment: &str) -> anyhow::Result<bool> {
        let response = self
            .client
            .post(format!("{}/api/book/{}/reservation", self.url, book_id))
            .query(&[("comment", comment)])
            .send()
            .await?;

        if response.status() == StatusCode::CONFLICT {
            Ok(false)
        } else if response.status().is_success() {
            Ok(true)
        } else {
            let error: String = response.json().await.unwrap_or_default();
            bail!("Failed to reserve book {}", error)
        }
    }

    /// Calls DELETE /api/book/{book_id}/reservation endpoint
    /// Returns true if the book was released and false on a reservation conflict
    pub async fn unreserve_book(&self, book_id: BookId, comment: &str) -> anyhow::Result<bool> {
        let response = self
            .client
            .delete(format!("{}/api/book/{}/reservation", self.url, book_id))
            .query(&[("comment", comment)])
            .send()
            .await?;

        if response.status() == StatusCode::CONFLICT {
            Ok(false)
        } else if response.status().is_success() {
            Ok(true)
        } else {
            let error: String = response.json().await.unwrap_or_default();
            bail!("Failed to unreserve book {}", error)
        }
    }

    /// Calls PUT /api/book/{book_id} endpoint
    /// Returns true if the book was overwritten and false if it was not found
    pub async fn replace_book(
        &self,
        book_id: BookId,
        replacement: BookReplacement,
    ) -> anyhow::Result<bool> {
        let response = self
            .client
            .put(format!("{}/api/book/{}", self.url, book_id))
            .json(&replacement)
            .send()
            .await?;

        if response.status() == StatusCode::NOT_FOUND {
            Ok(false)
        } else if response.status().is_success() {
            Ok(true)
        } else {
            let error: String = response.json().await.unwrap_or_default();
            bail!("Failed to replace book {}", error)
        }
    }

    /// Calls DELETE /api/book/{book_id} endpoint
    /// Returns true if the book was deleted and false if it was not found
    pub async fn delete_book(&self, book_id: BookId) -> anyhow::Result<bool> {
        let response = self
            .client
            .delete(format!("{}/api/book/{}", self.url, book_id))
            .send()
            .await?;

        if response.status() == StatusCode::NOT_FOUND {
            Ok(false)
        } else if response.status().is_success() {
            Ok(true)
        } else {
            let error: String = response.json().await.unwrap_or_default();
            bail!("Failed to delete book {}", error)
        }
    }

    /// Calls GET /api/book/{book_id}/history endpoint
    /// Returns the status history if the book was present
    /// None if it was not in the repository
    pub async fn get_book_history(
        &self,
        book_id: BookId,
    ) -> anyhow::Result<Option<Vec<BookStatusHistoryRecord>>> {
        let response = self
            .client
            .get(format!("{}/api/book/{}/history", self.url, book_id))
            .send()
            .await?;
        if response.status() == StatusCode::NOT_FOUND {
            Ok(None)
        } else if response.status().is_success() {
            Ok(Some(response.json().await?))
        } else {
            let error: String = response.json().await.unwrap_or_default();
            bail!("Failed to get book history {}", error)
        }
    }
}
