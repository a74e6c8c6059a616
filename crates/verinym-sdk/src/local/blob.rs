use async_trait::async_trait;

use crate::api::BlobStorageApi;
use crate::blob_storage::{check_storage_type, TailsStorageConfig};
use crate::error::SdkResult;
use crate::handles::{BlobReaderHandle, BlobWriterHandle};

use super::LocalBackend;

#[async_trait]
impl BlobStorageApi for LocalBackend {
    async fn open_blob_storage_writer(
        &self,
        storage_type: &str,
        config: &TailsStorageConfig,
    ) -> SdkResult<BlobWriterHandle> {
        check_storage_type(storage_type)?;
        let handle = BlobWriterHandle(self.handles.next());
        self.blob_writers.insert(handle, config.clone());
        Ok(handle)
    }

    async fn open_blob_storage_reader(
        &self,
        storage_type: &str,
        config: &TailsStorageConfig,
    ) -> SdkResult<BlobReaderHandle> {
        check_storage_type(storage_type)?;
        let handle = BlobReaderHandle(self.handles.next());
        self.blob_readers.insert(handle, config.clone());
        Ok(handle)
    }
}
