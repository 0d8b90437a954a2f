//! Tree Shell Binary
//!
//! Interactive text host for the tree editor. Reads commands from stdin,
//! prints the visible rows after every change, and answers name-conflict
//! prompts on the same stream.
//!
//! # Usage
//!
//! ```bash
//! cargo run --bin tree-shell
//!
//! # Edit a specific document with a custom configuration
//! TREE_FILE=/tmp/tree.json TREE_CONFIG=/tmp/config.json cargo run --bin tree-shell
//! ```
//!
//! # Environment Variables
//!
//! - `TREE_FILE`: Document path (default: `~/.treeview/treeview.json`)
//! - `TREE_CONFIG`: Optional editor configuration JSON
//! - `RUST_LOG`: Logging level (e.g., "info", "debug", "trace")

use std::io::{self, Write};

use treeview_core::EditorSession;
use treeview_dev_tools::{
    shell::HELP, default_document_path, load_config, load_document, LinePrompt, Outcome, Shell,
};

fn main() -> anyhow::Result<()> {
    // Logs go to stderr so they never interleave with the row listing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(io::stderr)
        .init();

    let path = default_document_path()?;
    let config = load_config()?;
    let document = load_document(&path, &config)?;

    tracing::info!("Document: {}", path.display());

    let session = EditorSession::from_document(&document, config);
    let mut shell = Shell::new(session, path);

    let mut prompt = LinePrompt::new(io::stdin().lock(), io::stdout());

    println!("{}", HELP);
    if let Ok(Outcome::Output(rows)) = shell.run_line("ls", &mut prompt) {
        print!("{}", rows);
    }

    loop {
        print!("tree> ");
        io::stdout().flush()?;

        let Some(line) = prompt.read_line()? else {
            break;
        };

        match shell.run_line(&line, &mut prompt) {
            Ok(Outcome::Output(text)) => print!("{}", text),
            Ok(Outcome::Quit) => return Ok(()),
            Err(e) => eprintln!("error: {:#}", e),
        }
    }

    // End of input behaves like `quit`
    shell.run_line("quit", &mut prompt)?;
    Ok(())
}
