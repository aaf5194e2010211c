use anyhow::Result;
use clap::Parser;
use tracing::debug;

use redical::{Cmd, Connection, ConnectOptions};

#[derive(Parser, Debug)]
#[clap(name = "redical-cli", about = "Run a single Redis command")]
struct Opt {
    /// Server URI
    #[clap(long, default_value = "redis://127.0.0.1:6379")]
    uri: String,

    /// Database index to select
    #[clap(long, default_value = "0")]
    db: u32,

    /// Command name, e.g. GET
    command: String,

    /// Command arguments
    args: Vec<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt::init();

    let opt = Opt::parse();
    debug!("connecting to {}", opt.uri);

    let options = ConnectOptions::from_uri(&opt.uri)?.db(opt.db);
    let mut conn = Connection::connect(options).await?;

    let cmd = Cmd::new(&opt.command).args(opt.args.iter());
    let reply = conn.command(cmd).await?;
    println!("{}", reply);

    conn.close().await?;
    Ok(())
}
