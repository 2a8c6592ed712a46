use tracing_subscriber::{fmt, prelude::*, EnvFilter};

fn main() {
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("warn,pdf_annotator=info,pdf_engine=info")),
        )
        .with(fmt::layer().with_writer(std::io::stderr))
        .init();

    if let Err(error) = pdf_annotator_cli::run(std::env::args_os()) {
        eprintln!("{error:#}");
        std::process::exit(1);
    }
}
