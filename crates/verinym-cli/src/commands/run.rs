//! `verinym run`: Run the walkthrough against the in-process backend.

use clap::Args;
use std::path::PathBuf;
use std::sync::Arc;

use verinym_core::ScenarioConfig;
use verinym_scenario::Walkthrough;
use verinym_sdk::LocalBackend;

#[derive(Args, Debug)]
pub struct RunArgs {
    /// Wallet storage type.
    #[arg(short = 't', long = "storage-type")]
    pub storage_type: Option<String>,

    /// Native storage plug-in library.
    #[arg(short = 'l', long)]
    pub library: Option<PathBuf>,

    /// Entry point symbol of the storage plug-in.
    #[arg(short = 'e', long)]
    pub entrypoint: Option<String>,

    /// Storage configuration (JSON).
    #[arg(short = 'c', long = "storage-config")]
    pub storage_config: Option<String>,

    /// Storage credentials (JSON).
    #[arg(short = 's', long = "storage-creds")]
    pub storage_creds: Option<String>,

    /// Override the genesis transactions file.
    #[arg(long)]
    pub genesis: Option<PathBuf>,
}

impl RunArgs {
    fn apply(&self, config: &mut ScenarioConfig) {
        let storage = &mut config.wallet_storage;
        if let Some(t) = &self.storage_type {
            storage.storage_type = Some(t.clone());
        }
        if let Some(l) = &self.library {
            storage.library = Some(l.clone());
        }
        if let Some(e) = &self.entrypoint {
            storage.entrypoint = Some(e.clone());
        }
        if let Some(c) = &self.storage_config {
            storage.storage_config = Some(c.clone());
        }
        if let Some(s) = &self.storage_creds {
            storage.storage_credentials = Some(s.clone());
        }
        if let Some(g) = &self.genesis {
            config.pool.genesis_path = g.clone();
        }
    }
}

pub async fn run(args: &RunArgs, mut config: ScenarioConfig) -> anyhow::Result<()> {
    args.apply(&mut config);
    config.validate()?;

    let backend = LocalBackend::new();
    let storage = &config.wallet_storage;
    if let (Some(storage_type), Some(library)) = (&storage.storage_type, &storage.library) {
        let entrypoint = storage
            .entrypoint
            .as_deref()
            .ok_or_else(|| anyhow::anyhow!("--library requires --entrypoint"))?;
        backend
            .storage()
            .register_plugin(storage_type, library, entrypoint)?;
    }

    tracing::info!(
        pool = %config.pool.name,
        genesis = %config.pool.genesis_path.display(),
        storage_type = ?config.wallet_storage.storage_type,
        "Verinym walkthrough v{}",
        env!("CARGO_PKG_VERSION")
    );

    let walkthrough = Walkthrough::new(Arc::new(backend), config);
    let report = walkthrough.run().await?;

    println!("Walkthrough complete");
    for (actor, did) in &report.verinyms {
        println!("  {:<12} {}", actor, did);
    }
    println!("  Transcript schema:      {}", report.transcript_schema_id);
    println!("  Job-Certificate schema: {}", report.job_certificate_schema_id);
    println!("  Transcript registry:    {}", report.transcript_rev_reg_id);
    println!("  Certificate registry:   {}", report.job_certificate_rev_reg_id);
    println!("  Transcripts issued:     {}", report.transcripts.len());
    for (referent, value) in &report.job_application_revealed {
        println!("  Job application {:<16} {}", referent, value);
    }
    println!("  Loan application verified: {}", report.loan_verified);
    println!("  KYC verified:              {}", report.kyc_verified);
    println!(
        "  Loan proof valid after revocation: {}",
        report.loan_valid_after_revocation
    );
    Ok(())
}
