//! CLI wrapper to inspect the persisted trust anchor.

use std::path::PathBuf;

use clap::Args;

use crate::anchor::{AnchorStore, FileAnchorStore};

/// CLI arguments for the `anchor` subcommand
#[derive(Clone, Debug, Args)]
pub struct InspectArgs {
    /// Path to the persisted trust anchor
    #[arg(long, env = "SEALKV_ANCHOR_PATH", default_value = "sealkv-anchor.json")]
    anchor_path: PathBuf,
}

/// Run the `anchor` subcommand: print the persisted trust anchor.
pub fn run(args: InspectArgs) -> Result<(), anyhow::Error> {
    let store = FileAnchorStore::new(&args.anchor_path);
    match store.load()? {
        Some(anchor) => {
            println!("database:   {}", anchor.database);
            println!("tx id:      {}", anchor.tx_id);
            println!("tree size:  {}", anchor.tree_size);
            println!("root:       {}", anchor.root);
            if let Some(key) = &anchor.public_key {
                println!("public key: {}", hex::encode(key));
            }
        }
        None => println!(
            "no trust anchor persisted at {}",
            args.anchor_path.display()
        ),
    }
    Ok(())
}
