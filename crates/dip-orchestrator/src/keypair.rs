//! One SSH keypair generated per cluster (`spec.md` §4.2/§4.3): the public
//! half is registered with the provider via `ProviderDriver::ensure_ssh_key`
//! and baked into every server's cloud-init, the private half is what C3
//! connects with. Uses `ssh-key` rather than hand-rolling key encoding —
//! the same "pull in the crate that already does the wire format" rule
//! `dip-provider`/`dip-kube` follow for their own protocols.

use dip_core::{Error, Result};
use rand::rngs::OsRng;
use ssh_key::{Algorithm, LineEnding, PrivateKey};

pub struct GeneratedKeypair {
    pub public_key_openssh: String,
    pub private_key_pem: String,
}

/// Generates a fresh Ed25519 keypair. A new keypair per cluster (rather
/// than one shared operator key) means a compromised or leaked cluster
/// can't be used to pivot into any other cluster's nodes.
pub fn generate() -> Result<GeneratedKeypair> {
    let private_key = PrivateKey::random(&mut OsRng, Algorithm::Ed25519)
        .map_err(|e| Error::Internal(format!("failed to generate ssh keypair: {e}")))?;
    let public_key_openssh = private_key
        .public_key()
        .to_openssh()
        .map_err(|e| Error::Internal(format!("failed to encode ssh public key: {e}")))?;
    let private_key_pem = private_key
        .to_openssh(LineEnding::LF)
        .map_err(|e| Error::Internal(format!("failed to encode ssh private key: {e}")))?
        .to_string();
    Ok(GeneratedKeypair { public_key_openssh, private_key_pem })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generates_a_usable_ed25519_pair() {
        let kp = generate().unwrap();
        assert!(kp.public_key_openssh.starts_with("ssh-ed25519"));
        assert!(kp.private_key_pem.contains("BEGIN OPENSSH PRIVATE KEY"));
    }

    #[test]
    fn two_generations_never_collide() {
        let a = generate().unwrap();
        let b = generate().unwrap();
        assert_ne!(a.private_key_pem, b.private_key_pem);
    }
}
