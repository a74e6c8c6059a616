use async_trait::async_trait;

use verinym_core::Verkey;
use verinym_crypto::PublicKey;

use crate::api::CryptoApi;
use crate::error::SdkResult;
use crate::handles::WalletHandle;

use super::did::signing_key;
use super::LocalBackend;

#[async_trait]
impl CryptoApi for LocalBackend {
    async fn auth_crypt(
        &self,
        wallet: WalletHandle,
        sender_vk: &Verkey,
        recipient_vk: &Verkey,
        message: &[u8],
    ) -> SdkResult<Vec<u8>> {
        let wallet = self.wallet(wallet)?;
        let sender = signing_key(&wallet, sender_vk)?;
        let recipient = PublicKey::from_verkey(recipient_vk)?;
        Ok(verinym_crypto::auth_crypt(&sender, &recipient, message)?)
    }

    async fn auth_decrypt(
        &self,
        wallet: WalletHandle,
        recipient_vk: &Verkey,
        message: &[u8],
    ) -> SdkResult<(Verkey, Vec<u8>)> {
        let wallet = self.wallet(wallet)?;
        let recipient = signing_key(&wallet, recipient_vk)?;
        let (sender, plaintext) = verinym_crypto::auth_decrypt(&recipient, message)?;
        Ok((sender.verkey(), plaintext))
    }

    async fn anon_crypt(&self, recipient_vk: &Verkey, message: &[u8]) -> SdkResult<Vec<u8>> {
        let recipient = PublicKey::from_verkey(recipient_vk)?;
        Ok(verinym_crypto::anon_crypt(&recipient, message)?)
    }

    async fn anon_decrypt(
        &self,
        wallet: WalletHandle,
        recipient_vk: &Verkey,
        message: &[u8],
    ) -> SdkResult<Vec<u8>> {
        let wallet = self.wallet(wallet)?;
        let recipient = signing_key(&wallet, recipient_vk)?;
        Ok(verinym_crypto::anon_decrypt(&recipient, message)?)
    }
}
