//! metrics-tail
//!
//! Connects to an Eventara metrics stream and logs state changes and
//! snapshot arrivals until interrupted. The endpoint must serve bare JSON
//! envelopes over WebSocket; STOMP framing is not spoken.

use std::path::PathBuf;

use tracing::info;
use tracing_subscriber::EnvFilter;

use eventara_client::{StreamConfig, StreamRuntime, WebSocketConnector};

struct Args {
    url: Option<String>,
    config: Option<PathBuf>,
    max_attempts: Option<u32>,
}

fn parse_args() -> Args {
    let args: Vec<String> = std::env::args().collect();
    let mut out = Args {
        url: None,
        config: None,
        max_attempts: None,
    };

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--url" | "-u" => {
                if i + 1 < args.len() {
                    out.url = Some(args[i + 1].clone());
                    i += 2;
                } else {
                    eprintln!("error: --url requires a value");
                    std::process::exit(1);
                }
            }
            "--config" | "-c" => {
                if i + 1 < args.len() {
                    out.config = Some(PathBuf::from(&args[i + 1]));
                    i += 2;
                } else {
                    eprintln!("error: --config requires a value");
                    std::process::exit(1);
                }
            }
            "--max-attempts" => {
                if i + 1 < args.len() {
                    let n: u32 = args[i + 1].parse().unwrap_or_else(|_| {
                        eprintln!("error: invalid attempt count: {}", args[i + 1]);
                        std::process::exit(1);
                    });
                    out.max_attempts = Some(n);
                    i += 2;
                } else {
                    eprintln!("error: --max-attempts requires a value");
                    std::process::exit(1);
                }
            }
            "--help" | "-h" => {
                println!("metrics-tail - follow an Eventara metrics stream");
                println!();
                println!("USAGE:");
                println!("    metrics-tail [OPTIONS]");
                println!();
                println!("OPTIONS:");
                println!("    -u, --url <URL>           Stream endpoint [default: ws://localhost:8080/ws]");
                println!("    -c, --config <FILE>       JSON stream config; --url overrides its url");
                println!("        --max-attempts <N>    Give up after N consecutive reconnects");
                println!("    -h, --help                Print help information");
                std::process::exit(0);
            }
            other => {
                eprintln!("error: unknown argument: {other}");
                std::process::exit(1);
            }
        }
    }
    out
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = parse_args();

    let mut config = match &args.config {
        Some(path) => StreamConfig::from_json_file(path).unwrap_or_else(|e| {
            eprintln!("error: {e}");
            std::process::exit(1);
        }),
        None => StreamConfig::new("ws://localhost:8080/ws"),
    };
    if let Some(url) = args.url {
        config.url = url;
    }
    if let Some(n) = args.max_attempts {
        config.reconnect = config.reconnect.with_max_attempts(n);
    }

    let connector = WebSocketConnector::new().with_read_timeout(config.poll_interval());
    let handle = StreamRuntime::start(&config, connector).unwrap_or_else(|e| {
        eprintln!("error: {e}");
        std::process::exit(1);
    });

    let _subscription = handle.subscribe(|state, snapshot| match snapshot {
        Some(s) => info!(
            %state,
            timestamp = ?s.timestamp(),
            total_events = ?s.total_events(),
            health = ?s.system_health(),
            "metrics update"
        ),
        None => info!(%state, "no snapshot yet"),
    });

    info!(url = %config.url, "tailing metrics stream; Ctrl-C to stop");
    loop {
        std::thread::park();
    }
}
