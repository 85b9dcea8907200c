use crate::{
    config::ServerConfig,
    error::LibraryError,
    library::{
        self,
        BookRequest,
        BookResponse,
        BorrowRequest,
        BorrowStatus,
        EmptyRequest,
        library_service_server::{
            LibraryService,
            LibraryServiceServer,
        },
    },
    registry::LibraryRegistry,
    types::Book,
};
use futures_util::{
    pin_mut,
    Stream,
    StreamExt,
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
    debug,
    info,
    o,
    warn,
    Logger,
};
use std::{
    future::Future,
    io,
    sync::Arc,
};
use tokio::sync::{
    broadcast::{
        Receiver,
        Sender,
    },
    mpsc,
};
use tokio_stream::wrappers::ReceiverStream;
use tonic::{
    transport::Server,
    Request,
    Response,
    Status,
    Streaming,
};

const AVAILABLE_BOOK_MESSAGE: &str = "Available book";

fn call_context(name: &'static str) -> Context {
    let tracer = global::tracer("library_service");
    let span = tracer.start(name);
    Context::current_with_span(span)
}

pub struct LibraryServiceImpl {
    log: Logger,
    registry: Arc<LibraryRegistry>,
    stream_buffer: usize,
}

impl LibraryServiceImpl {
    pub fn new(log: Logger, registry: Arc<LibraryRegistry>, stream_buffer: usize) -> Self {
        Self {
            log,
            registry,
            stream_buffer: stream_buffer.max(1),
        }
    }
}

#[tonic::async_trait]
impl LibraryService for LibraryServiceImpl {
    type ListAvailableBooksStream = ReceiverStream<Result<BookResponse, Status>>;
    type LiveBookUpdatesStream = ReceiverStream<Result<library::Book, Status>>;

    async fn add_book(
        &self, request: Request<BookRequest>,
    ) -> Result<Response<BookResponse>, Status> {
        let cx = call_context("AddBook");
        let log = self.log.new(o!("rpc" => "AddBook"));

        let book = match request.into_inner().book {
            Some(book) => book,
            None => {
                warn!(log, "rejecting request without a book");
                return Err(Status::invalid_argument("book is required"));
            }
        };

        let outcome = self.registry.add_book(book.into());
        info!(log, "{}", outcome.message(); "book_id" => &outcome.book().id);
        cx.span().add_event(
            outcome.message().to_string(),
            vec![Key::new("book_id").string(outcome.book().id.clone())],
        );

        Ok(Response::new(outcome.into()))
    }

    async fn list_available_books(
        &self, _: Request<EmptyRequest>,
    ) -> Result<Response<Self::ListAvailableBooksStream>, Status> {
        let cx = call_context("ListAvailableBooks");
        let log = self.log.new(o!("rpc" => "ListAvailableBooks"));

        let books = self.registry.list_available();
        info!(log, "listing available books"; "count" => books.len());

        let (tx, rx) = mpsc::channel(self.stream_buffer);
        tokio::spawn(stream_available_books(log, books, tx).with_context(cx));

        Ok(Response::new(ReceiverStream::new(rx)))
    }

    async fn borrow_books(
        &self, request: Request<Streaming<BorrowRequest>>,
    ) -> Result<Response<BorrowStatus>, Status> {
        let cx = call_context("BorrowBooks");
        let log = self.log.new(o!("rpc" => "BorrowBooks"));

        let status = borrow_books(&log, &self.registry, request.into_inner())
            .with_context(cx.clone())
            .await?;
        cx.span().add_event(
            "borrow finished",
            vec![Key::new("status").string(status.status.clone())],
        );

        Ok(Response::new(status))
    }

    async fn live_book_updates(
        &self, request: Request<Streaming<BorrowRequest>>,
    ) -> Result<Response<Self::LiveBookUpdatesStream>, Status> {
        let cx = call_context("LiveBookUpdates");
        let log = self.log.new(o!("rpc" => "LiveBookUpdates"));

        let (tx, rx) = mpsc::channel(self.stream_buffer);
        tokio::spawn(
            live_book_updates(log, self.registry.clone(), request.into_inner(), tx).with_context(cx),
        );

        Ok(Response::new(ReceiverStream::new(rx)))
    }
}

/// Sends one response per book of the snapshot, stopping at the first failed send.
pub async fn stream_available_books(
    log: Logger,
    books: Vec<Book>,
    tx: mpsc::Sender<Result<BookResponse, Status>>,
) {
    let total = books.len();
    for (sent, book) in books.into_iter().enumerate() {
        let response = BookResponse {
            message: AVAILABLE_BOOK_MESSAGE.to_string(),
            book: Some(book.into()),
        };
        if tx.send(Ok(response)).await.is_err() {
            info!(log, "client went away, aborting listing"; "sent" => sent, "total" => total);
            return;
        }
    }
    debug!(log, "listing complete"; "total" => total);
}

/// Borrows the requested books in arrival order, failing the whole call at
/// the first book that cannot be borrowed. Books borrowed before the failure
/// stay borrowed.
pub async fn borrow_books<S>(
    log: &Logger,
    registry: &LibraryRegistry,
    inbound: S,
) -> Result<BorrowStatus, Status>
    where S: Stream<Item = Result<BorrowRequest, Status>>,
{
    pin_mut!(inbound);

    let mut borrowed = 0usize;
    while let Some(request) = inbound.next().await {
        let request = request?;
        let outcome = registry.try_borrow(&request.book_id);
        debug!(
            log, "borrow request";
            "book_id" => &request.book_id, "user_id" => &request.user_id,
            "outcome" => format!("{:?}", outcome)
        );

        if let Some(message) = outcome.failure_message(&request.book_id) {
            info!(log, "borrow failed"; "book_id" => &request.book_id, "borrowed" => borrowed);
            return Ok(BorrowStatus::failed(message));
        }
        borrowed += 1;
    }

    info!(log, "borrow succeeded"; "borrowed" => borrowed);
    Ok(BorrowStatus::success())
}

/// Echoes the current state of every known book the client asks about until
/// the client closes its side of the stream.
pub async fn live_book_updates<S>(
    log: Logger,
    registry: Arc<LibraryRegistry>,
    inbound: S,
    tx: mpsc::Sender<Result<library::Book, Status>>,
)
    where S: Stream<Item = Result<BorrowRequest, Status>>,
{
    pin_mut!(inbound);

    loop {
        let request = tokio::select! {
            request = inbound.next() => request,
            _ = tx.closed() => {
                info!(log, "client went away, closing updates");
                return;
            }
        };

        let request = match request {
            Some(Ok(request)) => request,
            Some(Err(status)) => {
                warn!(log, "update stream failed"; "status" => format!("{}", status));
                let _ = tx.send(Err(status)).await;
                return;
            }
            None => {
                debug!(log, "client finished sending");
                return;
            }
        };

        // The lookup guard is released before sending.
        let book = match registry.lookup(&request.book_id) {
            Some(book) => book,
            None => {
                debug!(log, "unknown book, skipping"; "book_id" => &request.book_id);
                continue;
            }
        };

        if tx.send(Ok(book.into())).await.is_err() {
            info!(log, "client went away, closing updates");
            return;
        }
    }
}

pub async fn run_server(
    log: Logger,
    config: ServerConfig,
    mut shutdown_receiver: Receiver<String>,
) -> Result<(), LibraryError> {
    let tracer = global::tracer("run_server");
    let span = tracer.start(format!("running server at: {}", config.port));
    let cx = Context::current_with_span(span);

    let addr = config.address();
    let registry = Arc::new(LibraryRegistry::new());
    let library = LibraryServiceImpl::new(log.clone(), registry, config.stream_buffer);

    info!(log, "library server listening"; "address" => addr.to_string());

    let shutdown_log = log.clone();
    Server::builder()
        .add_service(LibraryServiceServer::new(library))
        .serve_with_shutdown(addr, async move {
            if let Ok(reason) = shutdown_receiver.recv().await {
                info!(shutdown_log, "shutting down"; "reason" => reason);
            }
        })
        .with_context(cx)
        .await?;

    info!(log, "library server stopped");
    Ok(())
}

/// Broadcasts a shutdown once `signal` fires.
///
/// If the signal cannot be listened for, `sender` is held forever so that
/// receivers keep waiting instead of seeing a closed channel.
pub async fn forward_shutdown<F>(log: Logger, signal: F, sender: Sender<String>)
    where F: Future<Output = io::Result<()>>,
{
    match signal.await {
        Ok(()) => {
            info!(log, "received ctrl-c");
            let _ = sender.send("ctrl-c".to_string());
        }
        Err(err) => {
            warn!(log, "cannot listen for ctrl-c, running until killed"; "error" => format!("{}", err));
            std::future::pending::<()>().await;
        }
    }
}

#[cfg(test)]
mod test {
    use crate::{
        library::{
            self,
            BorrowRequest,
            STATUS_FAILED,
            STATUS_SUCCESS,
        },
        registry::LibraryRegistry,
        server::{
            borrow_books,
            forward_shutdown,
            live_book_updates,
            stream_available_books,
        },
        types::Book,
    };
    use slog::{
        o,
        Logger,
    };
    use std::{
        io,
        sync::Arc,
        time::Duration,
    };
    use tokio::sync::{
        broadcast,
        mpsc,
    };
    use tokio_stream::wrappers::ReceiverStream;
    use tonic::Status;

    fn logger() -> Logger {
        Logger::root(slog::Discard, o!())
    }

    fn book(id: &str) -> Book {
        Book {
            id: id.to_string(),
            title: format!("Book Title {}", id),
            author: "Sai Charan Challa".to_string(),
            genre: "Research".to_string(),
            is_available: true,
        }
    }

    fn borrow(book_id: &str, user_id: &str) -> Result<BorrowRequest, Status> {
        Ok(BorrowRequest {
            book_id: book_id.to_string(),
            user_id: user_id.to_string(),
        })
    }

    fn registry_with(ids: &[&str]) -> Arc<LibraryRegistry> {
        let registry = Arc::new(LibraryRegistry::new());
        for id in ids {
            registry.add_book(book(id));
        }
        registry
    }

    #[tokio::test]
    async fn should_borrow_every_requested_book() {
        let registry = registry_with(&["1", "2"]);
        let inbound = tokio_stream::iter(vec![borrow("1", "u1"), borrow("2", "u2")]);

        let status = borrow_books(&logger(), &registry, inbound).await.unwrap();

        assert_eq!(STATUS_SUCCESS, status.status);
        assert!(registry.list_available().is_empty());
    }

    #[tokio::test]
    async fn should_succeed_on_an_empty_borrow_stream() {
        let registry = registry_with(&["1"]);
        let inbound = tokio_stream::iter(Vec::<Result<BorrowRequest, Status>>::new());

        let status = borrow_books(&logger(), &registry, inbound).await.unwrap();

        assert!(status.is_success());
        assert!(registry.lookup("1").unwrap().is_available);
    }

    #[tokio::test]
    async fn should_stop_at_the_first_missing_book() {
        let registry = registry_with(&["1", "2"]);
        let inbound = tokio_stream::iter(vec![
            borrow("1", "u1"),
            borrow("missing", "u2"),
            borrow("2", "u3"),
        ]);

        let status = borrow_books(&logger(), &registry, inbound).await.unwrap();

        assert_eq!(STATUS_FAILED, status.status);
        assert!(status.message.contains("missing"));
        assert!(!registry.lookup("1").unwrap().is_available);
        assert!(registry.lookup("2").unwrap().is_available);
    }

    #[tokio::test]
    async fn should_fail_on_an_already_borrowed_book() {
        let registry = registry_with(&["1"]);
        registry.try_borrow("1");
        let inbound = tokio_stream::iter(vec![borrow("1", "u1")]);

        let status = borrow_books(&logger(), &registry, inbound).await.unwrap();

        assert!(!status.is_success());
        assert_eq!("Book 1 is not available", status.message);
    }

    #[tokio::test]
    async fn should_propagate_receive_errors_from_borrow_streams() {
        let registry = registry_with(&["1", "2"]);
        let inbound = tokio_stream::iter(vec![
            borrow("1", "u1"),
            Err(Status::aborted("connection reset")),
            borrow("2", "u2"),
        ]);

        let result = borrow_books(&logger(), &registry, inbound).await;

        assert_eq!(tonic::Code::Aborted, result.unwrap_err().code());
        assert!(!registry.lookup("1").unwrap().is_available);
        assert!(registry.lookup("2").unwrap().is_available);
    }

    #[tokio::test]
    async fn should_stream_each_available_book() {
        let (tx, mut rx) = mpsc::channel(4);

        stream_available_books(logger(), vec![book("1"), book("2")], tx).await;

        let mut ids = Vec::new();
        while let Some(response) = rx.recv().await {
            let response = response.unwrap();
            assert_eq!("Available book", response.message);
            ids.push(response.book.unwrap().id);
        }
        assert_eq!(vec!["1".to_string(), "2".to_string()], ids);
    }

    #[tokio::test]
    async fn should_abort_listing_when_the_client_goes_away() {
        let (tx, mut rx) = mpsc::channel(1);
        let watcher = tx.clone();
        let listing = tokio::spawn(
            stream_available_books(logger(), vec![book("1"), book("2"), book("3")], tx),
        );

        // Hang up once the first response fills the channel.
        while watcher.capacity() > 0 {
            tokio::task::yield_now().await;
        }
        drop(watcher);
        rx.close();
        listing.await.unwrap();

        let mut sent = Vec::new();
        while let Some(response) = rx.recv().await {
            sent.push(response.unwrap().book.unwrap().id);
        }
        assert_eq!(vec!["1".to_string()], sent);
    }

    #[tokio::test]
    async fn should_stop_updates_when_the_client_goes_away() {
        let registry = registry_with(&["1"]);
        let (_requests, inbound) = mpsc::channel::<Result<BorrowRequest, Status>>(1);
        let (tx, rx) = mpsc::channel(4);
        drop(rx);

        let finished = tokio::time::timeout(
            Duration::from_secs(2),
            live_book_updates(logger(), registry, ReceiverStream::new(inbound), tx),
        ).await;

        assert!(finished.is_ok());
    }

    #[tokio::test]
    async fn should_broadcast_shutdown_on_ctrl_c() {
        let (sender, mut receiver) = broadcast::channel(1);

        forward_shutdown(logger(), async { Ok(()) }, sender).await;

        assert_eq!("ctrl-c", receiver.recv().await.unwrap());
    }

    #[tokio::test]
    async fn should_keep_running_when_ctrl_c_is_unavailable() {
        let (sender, mut receiver) = broadcast::channel::<String>(1);
        let failing = async { Err(io::Error::new(io::ErrorKind::Other, "no signal handler")) };
        let forwarding = tokio::spawn(forward_shutdown(logger(), failing, sender));

        let waited = tokio::time::timeout(Duration::from_millis(200), receiver.recv()).await;

        assert!(waited.is_err());
        forwarding.abort();
    }

    #[tokio::test]
    async fn should_echo_known_books_and_skip_unknown_ones() {
        let registry = registry_with(&["1", "2"]);
        registry.try_borrow("2");
        let inbound = tokio_stream::iter(vec![
            borrow("missing", "u1"),
            borrow("1", "u1"),
            borrow("2", "u2"),
        ]);
        let (tx, mut rx) = mpsc::channel(4);

        live_book_updates(logger(), registry.clone(), inbound, tx).await;

        let first: library::Book = rx.recv().await.unwrap().unwrap();
        let second: library::Book = rx.recv().await.unwrap().unwrap();
        assert_eq!(("1", true), (first.id.as_str(), first.is_available));
        assert_eq!(("2", false), (second.id.as_str(), second.is_available));
        assert!(rx.recv().await.is_none());
        assert!(!registry.lookup("2").unwrap().is_available);
        assert!(registry.lookup("1").unwrap().is_available);
    }

    #[tokio::test]
    async fn should_end_updates_with_the_receive_error() {
        let registry = registry_with(&["1"]);
        let inbound = tokio_stream::iter(vec![
            Err(Status::unavailable("gone")),
            borrow("1", "u1"),
        ]);
        let (tx, mut rx) = mpsc::channel(4);

        live_book_updates(logger(), registry, inbound, tx).await;

        let status = rx.recv().await.unwrap().unwrap_err();
        assert_eq!(tonic::Code::Unavailable, status.code());
        assert!(rx.recv().await.is_none());
    }
}
