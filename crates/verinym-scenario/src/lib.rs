//! Verinym Scenario: Actors, pool session, onboarding, verinym issuance,
//! ledger publication, credential issuance and proof exchange, driven
//! through `dyn IdentitySdk`.

pub mod actor;
pub mod error;
pub mod issuance;
pub mod onboarding;
pub mod presentation;
pub mod publish;
pub mod selection;
pub mod session;
pub mod verinym;
pub mod walkthrough;

pub use actor::{Actor, Artifact, ArtifactLog, Pairwise};
pub use error::{ignore_already_exists, ScenarioError, ScenarioResult};
pub use issuance::{issue_credential, revoke_credential, IssuedCredential};
pub use onboarding::{
    auth_receive, auth_send, onboarding, ConnectionRequest, ConnectionResponse, Onboarding,
};
pub use presentation::{
    check_proof, expect_revealed, expect_self_attested, present_proof,
    prover_get_entities_from_ledger, request_proof, revoked_as_of,
    verifier_get_entities_from_ledger, verify_presentation, PresentationPlan,
    ProofRequestBuilder, ProverEntities, VerifierEntities,
};
pub use publish::{
    create_and_publish_cred_def, create_and_publish_revoc_reg, create_and_publish_schema,
    get_cred_def, get_revoc_reg, get_revoc_reg_def, get_revoc_reg_delta, get_schema,
    send_cred_def, send_nym, send_revoc_reg_def, send_revoc_reg_entry, send_schema, CredDefSetup,
    RevRegSetup,
};
pub use selection::SelectionPolicy;
pub use session::{PoolSession, Resource};
pub use verinym::get_verinym;
pub use walkthrough::{Walkthrough, WalkthroughReport};
