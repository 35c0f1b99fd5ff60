use convo_stream::cli::{parse_args, run_cli_command, run_send, CliCommand};
use convo_stream::logging::init_logging;

use color_eyre::Result;
use tokio_util::sync::CancellationToken;

fn main() -> Result<()> {
    let command = parse_args(std::env::args());
    if let Some(result) = run_cli_command(&command) {
        return result;
    }
    let CliCommand::Send(args) = command else {
        return Ok(());
    };

    color_eyre::install()?;
    init_logging();

    // Ctrl+C cancels the caller token; the session reports it as user_cancel
    let cancel = CancellationToken::new();
    {
        let cancel = cancel.clone();
        ctrlc::set_handler(move || cancel.cancel())?;
    }

    let runtime = tokio::runtime::Runtime::new()?;
    runtime.block_on(run_send(args, cancel))
}
