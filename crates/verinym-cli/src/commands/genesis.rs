//! `verinym genesis`: Write a genesis file with one steward NYM.

use clap::Args;
use std::path::PathBuf;

use verinym_core::Role;
use verinym_crypto::KeyPair;
use verinym_sdk::{write_genesis, GenesisTxn};

#[derive(Args, Debug)]
pub struct GenesisArgs {
    /// 32-character steward seed.
    #[arg(long, default_value = "000000000000000000000000Steward1")]
    pub seed: String,

    /// Output path.
    #[arg(long, default_value = "./pool1.txn")]
    pub out: PathBuf,
}

pub async fn run(args: &GenesisArgs) -> anyhow::Result<()> {
    let steward = KeyPair::from_seed_str(&args.seed)?;
    let txn = GenesisTxn {
        dest: steward.did(),
        verkey: steward.verkey(),
        role: Some(Role::Steward),
        alias: Some("Steward1".into()),
    };
    write_genesis(&args.out, &[txn]).await?;
    tracing::info!(path = %args.out.display(), did = %steward.did(), "genesis written");
    println!("Genesis file written to {}", args.out.display());
    println!("  Steward DID:    {}", steward.did());
    println!("  Steward verkey: {}", steward.verkey());
    Ok(())
}
