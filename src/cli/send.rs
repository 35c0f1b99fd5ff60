//! `convo-stream MESSAGE`: one turn, printed to stdout.

use color_eyre::eyre::{eyre, WrapErr};
use color_eyre::Result;
use std::io::Write;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::args::SendArgs;
use crate::client::{ChatClient, SendOptions};
use crate::config::StreamConfig;
use crate::events::{self, StreamEvent};
use crate::models::StreamRequest;

/// Config from the environment with the command-line overrides applied.
pub fn resolve_config(args: &SendArgs) -> Result<StreamConfig> {
    let mut config = StreamConfig::try_from_env().wrap_err("invalid environment")?;
    if let Some(url) = &args.url {
        config = config.with_base_url(url.as_str());
    }
    if !args.fallback {
        config = config.with_fallback(false);
    }
    config.validate()?;
    Ok(config)
}

/// Send one message. Chunks are printed as they arrive unless `--collect`
/// was given; a cancelled turn exits quietly.
pub async fn run_send(args: SendArgs, cancel: CancellationToken) -> Result<()> {
    let client = ChatClient::new(resolve_config(&args)?)?;
    let request = StreamRequest::new(args.message.as_str());
    let options = SendOptions::new().with_cancel(cancel);

    let result = if args.collect {
        client.collect(request, options).await
    } else {
        let (tx, mut rx) = events::channel();
        let printer = tokio::spawn(async move {
            let mut stdout = std::io::stdout();
            while let Some(event) = rx.recv().await {
                match event {
                    StreamEvent::Chunk { text, .. } => {
                        let _ = write!(stdout, "{}", text);
                        let _ = stdout.flush();
                    }
                    StreamEvent::Watchdog { reason } => debug!("watchdog: {}", reason),
                    StreamEvent::Error { message, .. } => eprintln!("\n{}", message),
                    _ => {}
                }
            }
        });
        let result = client.stream(request, options, Some(tx)).await;
        let _ = printer.await;
        result
    };

    match result {
        Ok(outcome) => {
            if args.collect {
                println!("{}", outcome.text);
            } else {
                println!();
            }
            if outcome.no_text_received && outcome.text.is_empty() {
                eprintln!("(no text received)");
            }
            Ok(())
        }
        Err(e) if e.is_abort() => {
            eprintln!("\n{}", e.user_message());
            Ok(())
        }
        Err(e) => Err(eyre!("{} ({})", e.user_message(), e.error_code())),
    }
}
