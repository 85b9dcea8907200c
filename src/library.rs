//! Wire messages of the `library.LibraryService` gRPC service and the
//! generated client/server stubs.

use crate::types;

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Book {
    #[prost(string, tag = "1")]
    pub id: ::prost::alloc::string::String,
    #[prost(string, tag = "2")]
    pub title: ::prost::alloc::string::String,
    #[prost(string, tag = "3")]
    pub author: ::prost::alloc::string::String,
    #[prost(string, tag = "4")]
    pub genre: ::prost::alloc::string::String,
    #[prost(bool, tag = "5")]
    pub is_available: bool,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct BookRequest {
    #[prost(message, optional, tag = "1")]
    pub book: ::core::option::Option<Book>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct BookResponse {
    #[prost(string, tag = "1")]
    pub message: ::prost::alloc::string::String,
    #[prost(message, optional, tag = "2")]
    pub book: ::core::option::Option<Book>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct EmptyRequest {}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct BorrowRequest {
    #[prost(string, tag = "1")]
    pub book_id: ::prost::alloc::string::String,
    #[prost(string, tag = "2")]
    pub user_id: ::prost::alloc::string::String,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct BorrowStatus {
    #[prost(string, tag = "1")]
    pub status: ::prost::alloc::string::String,
    #[prost(string, tag = "2")]
    pub message: ::prost::alloc::string::String,
}

pub const STATUS_SUCCESS: &str = "Success";
pub const STATUS_FAILED: &str = "Failed";

impl BorrowStatus {
    pub fn success() -> Self {
        Self {
            status: STATUS_SUCCESS.to_string(),
            message: "Books borrowed successfully".to_string(),
        }
    }

    pub fn failed(message: String) -> Self {
        Self {
            status: STATUS_FAILED.to_string(),
            message,
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == STATUS_SUCCESS
    }
}

impl From<Book> for types::Book {
    fn from(book: Book) -> Self {
        Self {
            id: book.id,
            title: book.title,
            author: book.author,
            genre: book.genre,
            is_available: book.is_available,
        }
    }
}

impl From<types::Book> for Book {
    fn from(book: types::Book) -> Self {
        Self {
            id: book.id,
            title: book.title,
            author: book.author,
            genre: book.genre,
            is_available: book.is_available,
        }
    }
}

impl From<types::AddOutcome> for BookResponse {
    fn from(outcome: types::AddOutcome) -> Self {
        Self {
            message: outcome.message().to_string(),
            book: Some(outcome.into_book().into()),
        }
    }
}

include!(concat!(env!("OUT_DIR"), "/library.LibraryService.rs"));
