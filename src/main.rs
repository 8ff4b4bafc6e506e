// src/main.rs

use dlqueue::{EXIT_CANCELLED, cli, logging, run};

#[tokio::main]
async fn main() {
    let args = cli::parse();
    if let Err(err) = logging::init_logging(args.log_level) {
        eprintln!("dlqueue error: {err:?}");
        std::process::exit(1);
    }

    if let Err(err) = run(args).await {
        eprintln!("dlqueue: {err}");
        std::process::exit(if err.is_cancelled() { EXIT_CANCELLED } else { 1 });
    }
}
