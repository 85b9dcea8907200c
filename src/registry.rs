use crate::types::{
    AddOutcome,
    Book,
    BorrowOutcome,
};
use std::{
    collections::HashMap,
    sync::{
        Mutex,
        MutexGuard,
        PoisonError,
    },
};

/// In-memory collection of books shared by every call the service handles.
///
/// All access goes through one lock, held only for the duration of a single
/// map operation and never across an await point.
#[derive(Debug, Default)]
pub struct LibraryRegistry {
    books: Mutex<HashMap<String, Book>>,
}

impl LibraryRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn books(&self) -> MutexGuard<'_, HashMap<String, Book>> {
        // Every critical section is a single map operation, so a poisoned
        // lock still guards a consistent map.
        self.books.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Stores `book` unless its id is already taken, in which case the stored
    /// copy is returned untouched.
    pub fn add_book(&self, book: Book) -> AddOutcome {
        let mut books = self.books();
        if let Some(existing) = books.get(&book.id) {
            return AddOutcome::Duplicate(existing.clone());
        }
        books.insert(book.id.clone(), book.clone());
        AddOutcome::Added(book)
    }

    /// Snapshot of every available book, in no particular order.
    pub fn list_available(&self) -> Vec<Book> {
        self.books()
            .values()
            .filter(|book| book.is_available)
            .cloned()
            .collect()
    }

    /// Marks the book as borrowed if it exists and is available.
    pub fn try_borrow(&self, book_id: &str) -> BorrowOutcome {
        match self.books().get_mut(book_id) {
            None => BorrowOutcome::NotFound,
            Some(book) if !book.is_available => BorrowOutcome::AlreadyBorrowed,
            Some(book) => {
                book.is_available = false;
                BorrowOutcome::Available
            }
        }
    }

    pub fn lookup(&self, book_id: &str) -> Option<Book> {
        self.books().get(book_id).cloned()
    }

    pub fn len(&self) -> usize {
        self.books().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
