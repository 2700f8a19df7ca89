//! SFTP Listing Example
//!
//! This example demonstrates how to:
//! - Open the SFTP subsystem through the system `ssh` client
//! - List a remote directory
//! - Walk a remote tree and report files not seen before
//!
//! Usage:
//!   cargo run --example sftp_ls <user> <host> <port> <identity_file> <path>
//!
//! Example:
//!   RUST_LOG=usftp_proto=debug cargo run --example sftp_ls test localhost 2222 ~/.ssh/id_ed25519 /share

use std::collections::{HashMap, HashSet};
use std::env;
use tracing_subscriber::EnvFilter;
use usftp_proto::sftp::{connect, UnseenFileVisitor, Visitor};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let args: Vec<String> = env::args().collect();
    if args.len() != 6 {
        eprintln!(
            "Usage: {} <user> <host> <port> <identity_file> <path>",
            args[0]
        );
        std::process::exit(1);
    }

    let port: u16 = args[3].parse()?;
    let path = &args[5];

    let conn = connect(&args[1], &args[2], port, &args[4])?;
    let session = conn.new_session().await?;
    println!("✓ SFTP session open (server version {})", session.server_version());

    for node in session.ls(path).await? {
        let attrs = node.attrs();
        println!(
            "{} {:>10} {}",
            attrs.permissions.unwrap_or_default(),
            attrs.size.unwrap_or(0),
            node.filename()
        );
    }

    // Everything is unseen on a first run
    let mut visitor = UnseenFileVisitor::new(HashMap::new(), HashSet::new());
    session.walk(path, &mut visitor).await?;
    println!();
    println!("{} files under {}:", visitor.files().len(), path);
    for node in visitor.files() {
        println!("  {}", node.full_path());
    }

    for warning in session.cleanup_warnings() {
        eprintln!("⚠️ close failed for {}: {}", warning.path, warning.error);
    }

    session.close().await?;
    conn.close();
    Ok(())
}
