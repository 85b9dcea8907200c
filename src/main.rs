use clap::{
    arg,
    value_parser,
    ArgMatches,
    Command,
};
use library_grpc::{
    client::run_client,
    config::{
        ClientConfig,
        ServerConfig,
    },
    server::{
        forward_shutdown,
        run_server,
    },
};
use opentelemetry::trace::TraceError;
use opentelemetry::{
    global,
    sdk::trace as sdktrace,
};
use slog::{
    error,
    o,
    Drain,
    Logger,
};
use std::{
    net::IpAddr,
    sync::Mutex,
    time::Duration,
};
use tokio::sync::broadcast;

fn cli() -> Command {
    Command::new("library-grpc")
        .about("Library gRPC service CLI")
        .subcommand_required(true)
        .arg_required_else_help(true)
        .subcommand(
            Command::new("server")
                .about("Starts an instance of the server")
                .arg(arg!([PORT] "The server port")
                    .value_parser(value_parser!(u16))
                    .default_value("50052"))
                .arg(arg!(--host <HOST> "The address to listen on")
                    .required(false)
                    .value_parser(value_parser!(IpAddr))
                    .default_value("::"))
                .arg(arg!(--buffer <SIZE> "Responses buffered per streaming call")
                    .required(false)
                    .value_parser(value_parser!(usize))
                    .default_value("16")),
        )
        .subcommand(
            Command::new("client")
                .about("Starts an instance of the client")
                .arg(arg!([PORT] "The server port for the client to connect")
                    .value_parser(value_parser!(u16))
                    .default_value("50052"))
                .arg(arg!(--host <HOST> "The server host")
                    .required(false)
                    .default_value("localhost"))
                .arg(arg!(--timeout <SECS> "Deadline for each call, in seconds")
                    .required(false)
                    .value_parser(value_parser!(u64))
                    .default_value("10")),
        )
}

fn init_tracer() -> Result<sdktrace::Tracer, TraceError> {
    opentelemetry_jaeger::new_agent_pipeline()
        .with_service_name("library-grpc")
        .install_batch(opentelemetry::runtime::Tokio)
}

fn init_logger() -> Logger {
    let decorator = slog_term::TermDecorator::new().build();
    let drain = slog_term::FullFormat::new(decorator).build();
    Logger::root(Mutex::new(drain).fuse(), o!("app" => "library-grpc"))
}

fn server_config(matches: &ArgMatches) -> ServerConfig {
    let defaults = ServerConfig::default();
    ServerConfig {
        host: matches.get_one::<IpAddr>("host").copied().unwrap_or(defaults.host),
        port: matches.get_one::<u16>("PORT").copied().unwrap_or(defaults.port),
        stream_buffer: matches.get_one::<usize>("buffer").copied().unwrap_or(defaults.stream_buffer),
    }
}

fn client_config(matches: &ArgMatches) -> ClientConfig {
    let defaults = ClientConfig::default();
    ClientConfig {
        host: matches.get_one::<String>("host").cloned().unwrap_or(defaults.host),
        port: matches.get_one::<u16>("PORT").copied().unwrap_or(defaults.port),
        timeout: matches.get_one::<u64>("timeout")
            .map(|secs| Duration::from_secs(*secs))
            .unwrap_or(defaults.timeout),
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let _tracer = init_tracer()?;
    let log = init_logger();
    let matches = cli().get_matches();

    let (shutdown_sender, mut shutdown_receiver) = broadcast::channel(1);
    tokio::spawn(forward_shutdown(log.clone(), tokio::signal::ctrl_c(), shutdown_sender));

    let result = match matches.subcommand() {
        Some(("server", sub_matches)) => {
            run_server(log.clone(), server_config(sub_matches), shutdown_receiver).await
        }
        Some(("client", sub_matches)) => {
            let config = client_config(sub_matches);
            run_client(log.clone(), &mut shutdown_receiver, &config).await
        }
        _ => {
            error!(log, "unexpected subcommand");
            Ok(())
        }
    };

    if let Err(err) = &result {
        error!(log, "a problem occurred"; "error" => format!("{}", err));
    }

    global::shutdown_tracer_provider();
    result.map_err(Into::into)
}
