//! Verinym SDK: Ledger, wallet, DID, crypto, anoncreds and tails storage
//! capabilities behind async traits, with an in-process backend.

pub mod api;
pub mod blob_storage;
pub mod credential;
pub mod error;
pub mod genesis;
pub mod handles;
pub mod ledger;
pub mod local;
pub mod proof;
pub mod revocation;
pub mod rocksdb_storage;
pub mod storage;
pub mod types;
pub mod wallet;

pub use api::{
    AnoncredsApi, BlobStorageApi, CredentialDefinitions, CryptoApi, DidApi, IdentitySdk,
    LedgerApi, PoolApi, RevocationRegistries, RevocationRegistryDefinitions, Schemas, WalletApi,
};
pub use blob_storage::{TailsStorageConfig, DEFAULT_BLOB_STORAGE_TYPE};
pub use credential::{
    AttributeValue, Credential, CredentialInfo, CredentialOffer, CredentialRequest,
    CredentialRequestMetadata, CredentialValues, RevocationState, RevocationStates,
};
pub use error::{ErrorCode, SdkError, SdkResult};
pub use genesis::{read_genesis, write_genesis, GenesisTxn};
pub use handles::{BlobReaderHandle, BlobWriterHandle, PoolHandle, SearchHandle, WalletHandle};
pub use ledger::{LedgerOperation, LedgerReply, LedgerRequest, NymData};
pub use local::{JournalEntry, LifecycleEvent, LocalBackend};
pub use proof::{
    AttributeInfo, NonRevokedInterval, PredicateInfo, PredicateType, Proof, ProofRequest,
    RequestedAttribute, RequestedCredential, RequestedCredentials, RequestedPredicate, Restriction,
};
pub use storage::{StorageRegistry, WalletStorage, WalletStorageDriver, DEFAULT_STORAGE_TYPE};
pub use types::{
    CredDefId, CredRevId, CredentialDefinition, CredentialDefinitionConfig, IssuanceType,
    RevRegId, RevocationRegistry, RevocationRegistryConfig, RevocationRegistryDefinition,
    RevocationRegistryDelta, Schema, SchemaId,
};
pub use wallet::{WalletConfig, WalletCredentials};
