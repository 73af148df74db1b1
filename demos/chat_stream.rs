//! Interactive chat against a completion endpoint, or offline.
//!
//! Run with:
//! ```bash
//! export STUDYCHAT_API_KEY="your-api-key"
//! cargo run --example chat_stream
//! ```
//!
//! Without `STUDYCHAT_API_KEY` and `STUDYCHAT_BASE_URL` the offline assistant
//! answers instead. Set `RUST_LOG=studychat=debug` to watch the stream.

use std::io::{BufRead, Write};

use studychat::options::{HttpTransport, ModelOptions, SessionOptions, TransportOptions};
use studychat::providers::{CompletionsClient, OfflineAssistant};
use studychat::{ChatBackend, Conversation};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let transport = HttpTransport::from_env();
    if transport.api_key.is_some() || transport.base_url.is_some() {
        let model = std::env::var("STUDYCHAT_MODEL").unwrap_or_else(|_| "gpt-4o-mini".to_string());
        let client = CompletionsClient::new(
            ModelOptions::default().with_model(model),
            TransportOptions::new(transport),
        )?;
        run(&client).await
    } else {
        println!("(no endpoint configured, answering offline)");
        run(&OfflineAssistant::new()).await
    }
}

async fn run<B: ChatBackend>(backend: &B) -> Result<(), Box<dyn std::error::Error>> {
    let mut conversation = Conversation::new(SessionOptions::default());
    println!("assistant: {}", conversation.messages()[0].content);

    let stdin = std::io::stdin();
    loop {
        print!("you: ");
        std::io::stdout().flush()?;

        let mut line = String::new();
        if stdin.lock().read_line(&mut line)? == 0 {
            return Ok(());
        }

        let mut shown = 0;
        let result = conversation
            .send(backend, line.trim_end(), |partial: &str| {
                if shown == 0 {
                    print!("assistant: ");
                }
                print!("{}", &partial[shown..]);
                let _ = std::io::stdout().flush();
                shown = partial.len();
            })
            .await;

        match result {
            Ok(Some(_)) => println!(),
            Ok(None) => {}
            Err(e) => {
                println!();
                eprintln!("error: {e}");
                if let Some(notice) = conversation.messages().last() {
                    println!("assistant: {}", notice.content);
                }
            }
        }
    }
}
