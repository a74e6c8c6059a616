//! Fixtures shared by the integration tests: a scratch directory with a
//! genesis file, an in-process backend and actors wired to it.

use std::path::PathBuf;
use std::sync::Arc;

use verinym_core::{Role, ScenarioConfig, REGISTRY_CAPACITY};
use verinym_crypto::KeyPair;
use verinym_scenario::walkthrough::TRANSCRIPT_ATTRS;
use verinym_scenario::{
    create_and_publish_cred_def, create_and_publish_revoc_reg, create_and_publish_schema,
    get_verinym, onboarding, Actor, CredDefSetup, PoolSession,
};
use verinym_sdk::{
    write_genesis, GenesisTxn, IdentitySdk, IssuanceType, LocalBackend, RevocationRegistryConfig,
    SchemaId,
};

pub const STEWARD_SEED: &str = "000000000000000000000000Steward1";
pub const NONCE: u64 = 123_456_789;

pub struct Fixture {
    pub dir: PathBuf,
    pub backend: Arc<LocalBackend>,
    pub config: ScenarioConfig,
}

impl Fixture {
    /// Fresh directory, genesis with the steward NYM, and a config whose
    /// pool name and tails directory are unique to this fixture.
    pub async fn new(label: &str) -> Self {
        let id = uuid::Uuid::now_v7();
        let dir = std::env::temp_dir().join(format!("verinym-it-{}-{}", label, id));
        let genesis_path = dir.join("pool.txn");
        let steward = KeyPair::from_seed_str(STEWARD_SEED).unwrap();
        write_genesis(
            &genesis_path,
            &[GenesisTxn {
                dest: steward.did(),
                verkey: steward.verkey(),
                role: Some(Role::Steward),
                alias: Some("Steward1".into()),
            }],
        )
        .await
        .unwrap();

        let mut config = ScenarioConfig::default();
        config.pool.name = format!("{}-{}", label, id);
        config.pool.genesis_path = genesis_path;
        config.tails.base_dir = dir.join("tails");

        Self {
            dir,
            backend: Arc::new(LocalBackend::new()),
            config,
        }
    }

    pub fn sdk(&self) -> &dyn IdentitySdk {
        self.backend.as_ref()
    }

    pub fn shared(&self) -> Arc<dyn IdentitySdk> {
        self.backend.clone()
    }

    pub async fn open_session(&self) -> PoolSession {
        PoolSession::open(self.sdk(), &self.config.pool).await.unwrap()
    }

    pub fn actor(&self, session: &PoolSession, name: &str, wallet: &str) -> Actor {
        Actor::new(name, session.handle(), wallet, format!("{}_key", wallet))
    }

    /// The seeded steward with its wallet open.
    pub async fn steward(&self, session: &mut PoolSession) -> Actor {
        let mut steward = self
            .actor(session, "Sovrin Steward", "sovrin_steward_wallet")
            .with_seed(STEWARD_SEED);
        steward.ensure_wallet(self.sdk(), session).await.unwrap();
        steward.create_did(self.sdk()).await.unwrap();
        steward
    }

    /// An actor onboarded by `steward` and holding a trust-anchor verinym.
    pub async fn trust_anchor(
        &self,
        session: &mut PoolSession,
        steward: &mut Actor,
        name: &str,
        wallet: &str,
    ) -> Actor {
        let mut anchor = self.actor(session, name, wallet).with_role(Role::TrustAnchor);
        let connection = onboarding(self.sdk(), session, steward, &mut anchor, NONCE)
            .await
            .unwrap();
        get_verinym(self.sdk(), steward, &mut anchor, &connection)
            .await
            .unwrap();
        anchor
    }

    async fn transcript_schema(&self, issuer: &Actor) -> SchemaId {
        let (schema_id, _) =
            create_and_publish_schema(self.sdk(), issuer, "Transcript", "1.2", TRANSCRIPT_ATTRS)
                .await
                .unwrap();
        schema_id
    }

    /// Transcript schema and a non-revocable definition issued by `issuer`.
    pub async fn transcript_definition(&self, issuer: &Actor) -> CredDefSetup {
        let schema_id = self.transcript_schema(issuer).await;
        create_and_publish_cred_def(self.sdk(), issuer, "transcript", &schema_id, "TAG1", false)
            .await
            .unwrap()
    }

    /// Transcript schema and a revocable definition backed by its own
    /// on-demand registry.
    pub async fn revocable_transcript_definition(&self, issuer: &Actor) -> CredDefSetup {
        let schema_id = self.transcript_schema(issuer).await;
        let mut setup =
            create_and_publish_cred_def(self.sdk(), issuer, "transcript", &schema_id, "TAG1", true)
                .await
                .unwrap();
        create_and_publish_revoc_reg(
            self.sdk(),
            issuer,
            &mut setup,
            "cred_def_tag",
            &RevocationRegistryConfig {
                issuance_type: IssuanceType::IssuanceOnDemand,
                max_cred_num: REGISTRY_CAPACITY,
            },
            &self.config.tails.base_dir.join(issuer.name().to_lowercase()),
        )
        .await
        .unwrap();
        setup
    }
}

impl Drop for Fixture {
    fn drop(&mut self) {
        std::fs::remove_dir_all(&self.dir).ok();
    }
}
