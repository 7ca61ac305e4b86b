use clap::Parser;
use pairvault::cli::{Cli, Commands};
use pairvault::commands;

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Some(Commands::Import { archive }) => {
            let outcome = commands::import(&archive, |stage| println!("{stage}"))?;
            for base in &outcome.skipped {
                eprintln!("warning: skipped '{base}': entry could not be read as text");
            }
            println!("Imported {} artifact set(s)", outcome.imported.len());
            Ok(())
        }
        Some(Commands::List) => {
            let records = commands::list()?;
            if records.is_empty() {
                println!("No artifact sets found");
                return Ok(());
            }
            for record in &records {
                if record.comment.is_empty() {
                    println!("{} [{}] {}", record.base, record.language, record.state);
                } else {
                    println!(
                        "{} [{}] {} ({})",
                        record.base, record.language, record.state, record.comment
                    );
                }
            }
            println!("{} artifact set(s)", records.len());
            Ok(())
        }
        Some(Commands::Show { base, render }) => {
            let content = commands::show(&base, render)?;
            println!("{content}");
            Ok(())
        }
        Some(Commands::Mark { base, status }) => {
            let state = commands::mark(&base, status)?;
            println!("Marked '{base}' as {state}");
            Ok(())
        }
        Some(Commands::Comment { base, text }) => {
            commands::comment(&base, &text)?;
            println!("Comment saved for '{base}'");
            Ok(())
        }
        Some(Commands::Reset) => {
            commands::reset()?;
            println!("Store cleared");
            Ok(())
        }
        None => {
            Cli::parse_from(["pairvault", "--help"]);
            Ok(())
        }
    }
}
