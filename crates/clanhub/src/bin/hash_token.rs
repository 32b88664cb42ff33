use clanhub::domain::hash_token;
use clap::Parser;

/// Print the Argon2 hash of an operator token for `auth_settings.operators`
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Bearer token the operator will send
    token: String,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    if cli.token.trim().is_empty() {
        anyhow::bail!("token must not be empty");
    }
    let hash = hash_token(&cli.token)?;
    println!("{}", hash);
    Ok(())
}
