use anyhow::{anyhow, bail, Context, Result};
use solana_sdk::signature::{Keypair, Signer};
use solana_sdk::signer::keypair::keypair_from_seed;
use std::path::Path;

/// Loads the wallet keypair. Accepted formats: the Solana CLI JSON byte array
/// (64 bytes, secret then public), or a hex or base58 string holding the
/// 32-byte secret or the 64-byte keypair.
pub fn load_keypair(path: &Path) -> Result<Keypair> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read keypair file: {}", path.display()))?;
    let bytes = decode_key_material(content.trim())
        .with_context(|| format!("Failed to decode keypair file: {}", path.display()))?;
    keypair_from_bytes(&bytes)
}

fn decode_key_material(text: &str) -> Result<Vec<u8>> {
    if text.starts_with('[') {
        return serde_json::from_str::<Vec<u8>>(text)
            .context("Keypair JSON must be an array of bytes");
    }
    if let Ok(bytes) = hex::decode(text) {
        return Ok(bytes);
    }
    bs58::decode(text)
        .into_vec()
        .context("Keypair must be a JSON byte array, hex or base58")
}

fn keypair_from_bytes(bytes: &[u8]) -> Result<Keypair> {
    if bytes.len() != 32 && bytes.len() != 64 {
        bail!(
            "Ed25519 keypair must be 32 or 64 bytes, got {} bytes",
            bytes.len()
        );
    }
    let keypair =
        keypair_from_seed(&bytes[..32]).map_err(|e| anyhow!("Invalid secret key: {}", e))?;
    if bytes.len() == 64 && keypair.pubkey().to_bytes()[..] != bytes[32..] {
        bail!("Keypair public half does not match its secret key");
    }
    Ok(keypair)
}
