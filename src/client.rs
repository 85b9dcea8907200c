use crate::{
    config::ClientConfig,
    error::LibraryError,
    library::{
        Book,
        BookRequest,
        BorrowRequest,
        EmptyRequest,
        library_service_client::LibraryServiceClient,
    },
};
use opentelemetry::{
    Context,
    global,
    Key,
    trace::{
        FutureExt,
        TraceContextExt,
        Tracer,
    },
};
use slog::{
    info,
    Logger,
};
use tokio::sync::broadcast::Receiver;
use tonic::{
    transport::{
        Channel,
        Endpoint,
    },
    Request,
    Streaming,
};

fn demo_books() -> Vec<Book> {
    vec![
        Book {
            id: "1".to_string(),
            title: "Book Title 1".to_string(),
            author: "Sourabh Bagde".to_string(),
            genre: "Educational".to_string(),
            is_available: true,
        },
        Book {
            id: "2".to_string(),
            title: "Book Title 2".to_string(),
            author: "Sai Charan Challa".to_string(),
            genre: "Research".to_string(),
            is_available: true,
        },
    ]
}

fn requests_for(books: &[Book], users: &[&str]) -> Vec<BorrowRequest> {
    books.iter().zip(users)
        .map(|(book, user)| BorrowRequest {
            book_id: book.id.clone(),
            user_id: user.to_string(),
        })
        .collect()
}

enum Drained {
    Finished,
    Shutdown,
}

/// Reads every message of `inbound`, stopping early if the application shuts down.
async fn drain<T>(
    log: &Logger,
    shutdown_receiver: &mut Receiver<String>,
    inbound: &mut Streaming<T>,
    mut on_message: impl FnMut(T),
) -> Result<Drained, LibraryError> {
    loop {
        tokio::select! {
            message = inbound.message() => {
                if let Some(message) = message? {
                    on_message(message);
                } else {
                    info!(log, "no more messages");
                    return Ok(Drained::Finished);
                }
            }
            _ = shutdown_receiver.recv() => {
                info!(log, "application is shutting down, closing client");
                return Ok(Drained::Shutdown);
            }
        }
    }
}

/// Opens a channel that gives every call at most `config.timeout` to answer.
pub async fn connect(config: &ClientConfig) -> Result<LibraryServiceClient<Channel>, LibraryError> {
    let channel = Endpoint::from_shared(config.endpoint())?
        .timeout(config.timeout)
        .connect()
        .await?;
    Ok(LibraryServiceClient::new(channel))
}

/// Connects to the server and walks through the four call shapes, logging
/// every response.
pub async fn run_client(
    log: Logger,
    shutdown_receiver: &mut Receiver<String>,
    config: &ClientConfig,
) -> Result<(), LibraryError> {
    let address = config.endpoint();
    let tracer = global::tracer("run_client");
    let span = tracer.start(format!("running client at: {}", address));
    let cx = Context::current_with_span(span);

    info!(log, "starting client"; "address" => &address, "timeout" => format!("{:?}", config.timeout));
    let mut client = connect(config).with_context(cx.clone()).await?;

    let books = demo_books();
    for book in &books {
        let response = client.add_book(Request::new(BookRequest {
            book: Some(book.clone()),
        })).with_context(cx.clone()).await?.into_inner();
        let stored = response.book.ok_or(LibraryError::MissingBook("AddBook"))?;
        info!(log, "add_book"; "message" => response.message, "book_id" => stored.id);
    }

    info!(log, "requesting list_available_books");
    let mut inbound = client.list_available_books(Request::new(EmptyRequest {}))
        .with_context(cx.clone()).await?.into_inner();
    let listing = drain(&log, shutdown_receiver, &mut inbound, |response| {
        if let Some(book) = response.book {
            info!(log, "available"; "title" => book.title, "author" => book.author);
        }
    }).await?;
    if let Drained::Shutdown = listing {
        return Ok(());
    }

    let borrows = requests_for(&books, &["User1", "User2"]);
    let status = client.borrow_books(Request::new(tokio_stream::iter(borrows)))
        .with_context(cx.clone()).await?.into_inner();
    cx.span().add_event("borrowed", vec![Key::new("status").string(status.status.clone())]);
    info!(log, "borrow_books"; "status" => status.status, "message" => status.message);

    let lookups = requests_for(&books, &["Sourabh Bagde", "Sai Charan Challa"]);
    let mut updates = client.live_book_updates(Request::new(tokio_stream::iter(lookups)))
        .with_context(cx.clone()).await?.into_inner();
    drain(&log, shutdown_receiver, &mut updates, |book| {
        let state = if book.is_available { "Available" } else { "Not Available" };
        info!(log, "live update"; "title" => book.title, "state" => state);
    }).await?;

    Ok(())
}
