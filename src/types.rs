/// A book as kept by the registry.
///
/// `id` is assigned by the caller and never changes once stored; `is_available`
/// is the only field the service mutates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Book {
    pub id: String,
    pub title: String,
    pub author: String,
    pub genre: String,
    pub is_available: bool,
}

/// Result of inserting a book into the registry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AddOutcome {
    /// The book was stored as given.
    Added(Book),
    /// A book with the same id already existed; it is returned unchanged.
    Duplicate(Book),
}

impl AddOutcome {
    pub fn message(&self) -> &'static str {
        match self {
            AddOutcome::Added(_) => "Thanks, this book is added",
            AddOutcome::Duplicate(_) => "Sorry, this book is already stored",
        }
    }

    /// The book as it is now stored.
    pub fn book(&self) -> &Book {
        match self {
            AddOutcome::Added(book) | AddOutcome::Duplicate(book) => book,
        }
    }

    pub fn into_book(self) -> Book {
        match self {
            AddOutcome::Added(book) | AddOutcome::Duplicate(book) => book,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BorrowOutcome {
    /// The book was available and is now marked as borrowed.
    Available,
    NotFound,
    AlreadyBorrowed,
}

impl BorrowOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, BorrowOutcome::Available)
    }

    /// Reason reported to the client when a borrow stream fails on `book_id`.
    pub fn failure_message(&self, book_id: &str) -> Option<String> {
        match self {
            BorrowOutcome::Available => None,
            BorrowOutcome::NotFound => Some(format!("Book {} is not in the library", book_id)),
            BorrowOutcome::AlreadyBorrowed => Some(format!("Book {} is not available", book_id)),
        }
    }
}
