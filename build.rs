use tonic_build::manual::{
    Builder,
    Method,
    Service,
};

const CODEC: &str = "tonic::codec::ProstCodec";

fn method(name: &str, route: &str, input: &str, output: &str) -> tonic_build::manual::MethodBuilder {
    Method::builder()
        .name(name)
        .route_name(route)
        .input_type(format!("crate::library::{}", input))
        .output_type(format!("crate::library::{}", output))
        .codec_path(CODEC)
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // The messages are hand-written prost types in src/library.rs, so only the
    // service stubs are generated here and no protoc is needed.
    let library_service = Service::builder()
        .name("LibraryService")
        .package("library")
        .method(method("add_book", "AddBook", "BookRequest", "BookResponse").build())
        .method(
            method("list_available_books", "ListAvailableBooks", "EmptyRequest", "BookResponse")
                .server_streaming()
                .build(),
        )
        .method(
            method("borrow_books", "BorrowBooks", "BorrowRequest", "BorrowStatus")
                .client_streaming()
                .build(),
        )
        .method(
            method("live_book_updates", "LiveBookUpdates", "BorrowRequest", "Book")
                .client_streaming()
                .server_streaming()
                .build(),
        )
        .build();

    Builder::new()
        .build_server(true)
        .build_client(true)
        .compile(&[library_service]);

    println!("cargo:rerun-if-changed=build.rs");
    Ok(())
}
