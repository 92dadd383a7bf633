use std::{env, process, time::Duration};

use client_core::{JsonKind, Schema, check_response, ensure_valid, retry};
use client_http::HttpClient;

mod logging;

const DEFAULT_TIME_LIMIT_MS: u64 = 10_000;

fn versions_schema() -> Schema {
    Schema::shape([
        ("versions", Schema::array_of(Schema::Kind(JsonKind::String))),
        (
            "unstable_features",
            Schema::optional(Schema::map_of(JsonKind::String, Schema::Kind(JsonKind::Bool))),
        ),
    ])
}

#[tokio::main]
async fn main() {
    logging::init();

    let homeserver = env::var("FINCHCHAT_HOMESERVER")
        .unwrap_or_else(|_| "https://matrix.example.org".to_owned());
    let time_limit = env::var("FINCHCHAT_TIME_LIMIT_MS")
        .ok()
        .and_then(|value| value.parse().ok())
        .unwrap_or(DEFAULT_TIME_LIMIT_MS);

    let client = match HttpClient::new() {
        Ok(client) => client,
        Err(err) => {
            eprintln!("Failed to build HTTP client: {err}");
            process::exit(1);
        }
    };

    let url = format!(
        "{}/_matrix/client/versions",
        homeserver.trim_end_matches('/')
    );

    let result = retry(Duration::from_millis(time_limit), || client.get(&url)).await;
    let mut resp = match result {
        Ok(resp) => resp,
        Err(err) => {
            eprintln!("Transport failure reaching {url}: {err}");
            process::exit(1);
        }
    };

    let (status, body) = match check_response(&mut resp).await {
        Ok(ok) => ok,
        Err(err) => {
            eprintln!("{homeserver} did not answer like a Matrix homeserver: {err}");
            process::exit(1);
        }
    };

    if let Err(err) = ensure_valid(&body, &versions_schema()) {
        eprintln!("Unexpected versions payload from {homeserver}: {err}");
        process::exit(1);
    }

    println!("{homeserver} answered HTTP {status} with a valid versions payload:");
    println!("{body:#}");
}
