//! Public key material, JWS algorithms and the `did:key` encoding.

use std::fmt;

use anyhow::{anyhow, bail, Context, Result};
use base64::prelude::*;
use serde::{Deserialize, Serialize};

const DID_KEY_PREFIX: &str = "did:key:";

// Multicodec prefixes (unsigned varint) of the supported public key types.
const ED25519_CODEC: [u8; 2] = [0xed, 0x01];
const SECP256K1_CODEC: [u8; 2] = [0xe7, 0x01];
const P256_CODEC: [u8; 2] = [0x80, 0x24];

/// JWS signing algorithm.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Algorithm {
    EdDSA,
    ES256,
    ES256K,
}

impl Algorithm {
    pub fn as_str(&self) -> &'static str {
        match self {
            Algorithm::EdDSA => "EdDSA",
            Algorithm::ES256 => "ES256",
            Algorithm::ES256K => "ES256K",
        }
    }
}

impl fmt::Display for Algorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Algorithm {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "EdDSA" => Ok(Algorithm::EdDSA),
            "ES256" => Ok(Algorithm::ES256),
            "ES256K" => Ok(Algorithm::ES256K),
            other => bail!("unsupported JWS algorithm: {other}"),
        }
    }
}

/// Type of a holder, issuer or verifier key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KeyType {
    Ed25519,
    Secp256k1,
    P256,
}

impl KeyType {
    /// The JWS algorithm used to sign with a key of this type.
    pub fn algorithm(&self) -> Algorithm {
        match self {
            KeyType::Ed25519 => Algorithm::EdDSA,
            KeyType::Secp256k1 => Algorithm::ES256K,
            KeyType::P256 => Algorithm::ES256,
        }
    }

    fn codec(&self) -> [u8; 2] {
        match self {
            KeyType::Ed25519 => ED25519_CODEC,
            KeyType::Secp256k1 => SECP256K1_CODEC,
            KeyType::P256 => P256_CODEC,
        }
    }
}

/// A public JSON Web Key, limited to the members needed for OKP and EC keys.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Jwk {
    pub kty: String,
    pub crv: String,
    pub x: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub y: Option<String>,
}

/// A verification key.
#[derive(Debug, Clone)]
pub enum PublicKey {
    Ed25519(ed25519_dalek::VerifyingKey),
    Secp256k1(k256::ecdsa::VerifyingKey),
    P256(p256::ecdsa::VerifyingKey),
}

impl PublicKey {
    pub fn key_type(&self) -> KeyType {
        match self {
            PublicKey::Ed25519(_) => KeyType::Ed25519,
            PublicKey::Secp256k1(_) => KeyType::Secp256k1,
            PublicKey::P256(_) => KeyType::P256,
        }
    }

    /// Raw public key bytes: 32 bytes for Ed25519, SEC1 compressed points for EC keys.
    pub fn to_bytes(&self) -> Vec<u8> {
        match self {
            PublicKey::Ed25519(key) => key.to_bytes().to_vec(),
            PublicKey::Secp256k1(key) => key.to_encoded_point(true).as_bytes().to_vec(),
            PublicKey::P256(key) => key.to_encoded_point(true).as_bytes().to_vec(),
        }
    }

    pub fn from_bytes(key_type: KeyType, bytes: &[u8]) -> Result<Self> {
        Ok(match key_type {
            KeyType::Ed25519 => {
                let bytes: [u8; 32] = bytes
                    .try_into()
                    .map_err(|_| anyhow!("Ed25519 public key must be 32 bytes"))?;
                PublicKey::Ed25519(
                    ed25519_dalek::VerifyingKey::from_bytes(&bytes)
                        .context("invalid Ed25519 public key")?,
                )
            }
            KeyType::Secp256k1 => PublicKey::Secp256k1(
                k256::ecdsa::VerifyingKey::from_sec1_bytes(bytes)
                    .context("invalid secp256k1 public key")?,
            ),
            KeyType::P256 => PublicKey::P256(
                p256::ecdsa::VerifyingKey::from_sec1_bytes(bytes)
                    .context("invalid P-256 public key")?,
            ),
        })
    }

    pub fn to_jwk(&self) -> Jwk {
        match self {
            PublicKey::Ed25519(key) => Jwk {
                kty: "OKP".into(),
                crv: "Ed25519".into(),
                x: BASE64_URL_SAFE_NO_PAD.encode(key.to_bytes()),
                y: None,
            },
            PublicKey::Secp256k1(key) => {
                let point = key.to_encoded_point(false);
                ec_jwk(
                    "secp256k1",
                    point.x().map(|v| v.as_slice()),
                    point.y().map(|v| v.as_slice()),
                )
            }
            PublicKey::P256(key) => {
                let point = key.to_encoded_point(false);
                ec_jwk(
                    "P-256",
                    point.x().map(|v| v.as_slice()),
                    point.y().map(|v| v.as_slice()),
                )
            }
        }
    }

    pub fn from_jwk(jwk: &Jwk) -> Result<Self> {
        let x = BASE64_URL_SAFE_NO_PAD
            .decode(&jwk.x)
            .context("JWK `x` is not base64url")?;

        match (jwk.kty.as_str(), jwk.crv.as_str()) {
            ("OKP", "Ed25519") => Self::from_bytes(KeyType::Ed25519, &x),
            ("EC", crv @ ("P-256" | "secp256k1")) => {
                let y = jwk
                    .y
                    .as_ref()
                    .context("EC JWK is missing `y`")
                    .and_then(|y| {
                        BASE64_URL_SAFE_NO_PAD
                            .decode(y)
                            .context("JWK `y` is not base64url")
                    })?;
                if x.len() != 32 || y.len() != 32 {
                    bail!("EC JWK coordinates must be 32 bytes")
                }
                // Uncompressed SEC1 point.
                let mut sec1 = Vec::with_capacity(65);
                sec1.push(0x04);
                sec1.extend_from_slice(&x);
                sec1.extend_from_slice(&y);

                let key_type = if crv == "P-256" {
                    KeyType::P256
                } else {
                    KeyType::Secp256k1
                };
                Self::from_bytes(key_type, &sec1)
            }
            (kty, crv) => bail!("unsupported JWK key type {kty}/{crv}"),
        }
    }

    /// Verify a JWS signature over `message`.
    ///
    /// EC signatures are the fixed-size `r || s` concatenation used by JWS.
    pub fn verify(&self, alg: Algorithm, message: &[u8], signature: &[u8]) -> Result<()> {
        if alg != self.key_type().algorithm() {
            bail!(
                "algorithm {alg} cannot be used with a {:?} key",
                self.key_type()
            )
        }

        match self {
            PublicKey::Ed25519(key) => {
                use ed25519_dalek::Verifier;
                let signature = ed25519_dalek::Signature::from_slice(signature)
                    .context("malformed Ed25519 signature")?;
                key.verify(message, &signature)
                    .context("Ed25519 signature verification failed")
            }
            PublicKey::Secp256k1(key) => {
                use k256::ecdsa::signature::Verifier;
                let signature = k256::ecdsa::Signature::from_slice(signature)
                    .context("malformed ES256K signature")?;
                key.verify(message, &signature)
                    .context("ES256K signature verification failed")
            }
            PublicKey::P256(key) => {
                use p256::ecdsa::signature::Verifier;
                let signature = p256::ecdsa::Signature::from_slice(signature)
                    .context("malformed ES256 signature")?;
                key.verify(message, &signature)
                    .context("ES256 signature verification failed")
            }
        }
    }

    /// The `did:key` identifier of this key.
    pub fn to_did_key(&self) -> String {
        let mut bytes = self.key_type().codec().to_vec();
        bytes.extend(self.to_bytes());
        format!(
            "{DID_KEY_PREFIX}{}",
            multibase::encode(multibase::Base::Base58Btc, bytes)
        )
    }

    /// Decode the public key embedded in a `did:key` identifier (a fragment, if any, is ignored).
    pub fn from_did_key(did: &str) -> Result<Self> {
        let did = did.split('#').next().unwrap_or(did);
        let Some(encoded) = did.strip_prefix(DID_KEY_PREFIX) else {
            bail!("not a did:key identifier: {did}")
        };

        let (_, bytes) = multibase::decode(encoded).context("did:key is not multibase encoded")?;
        if bytes.len() < 2 {
            bail!("did:key value is too short")
        }

        let (codec, key) = bytes.split_at(2);
        let key_type = [KeyType::Ed25519, KeyType::Secp256k1, KeyType::P256]
            .into_iter()
            .find(|key_type| key_type.codec() == codec)
            .ok_or_else(|| anyhow!("unsupported did:key multicodec {codec:02x?}"))?;

        Self::from_bytes(key_type, key)
    }
}

fn ec_jwk(crv: &str, x: Option<&[u8]>, y: Option<&[u8]>) -> Jwk {
    // Uncompressed points always carry both coordinates.
    Jwk {
        kty: "EC".into(),
        crv: crv.into(),
        x: BASE64_URL_SAFE_NO_PAD.encode(x.unwrap_or_default()),
        y: y.map(|y| BASE64_URL_SAFE_NO_PAD.encode(y)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn did_key_identifiers_round_trip_each_key_type() {
        let ed = ed25519_dalek::SigningKey::from_bytes(&[7u8; 32]);
        let ed = PublicKey::Ed25519(ed.verifying_key());
        let did = ed.to_did_key();
        assert!(did.starts_with("did:key:z6Mk"), "{did}");
        assert_eq!(PublicKey::from_did_key(&did).unwrap().to_bytes(), ed.to_bytes());

        let p256 = p256::ecdsa::SigningKey::random(&mut rand::rngs::OsRng);
        let p256 = PublicKey::P256(*p256.verifying_key());
        let did = p256.to_did_key();
        assert!(did.starts_with("did:key:zDn"), "{did}");
        let decoded = PublicKey::from_did_key(&format!("{did}#key-1")).unwrap();
        assert_eq!(decoded.key_type(), KeyType::P256);

        let k256 = k256::ecdsa::SigningKey::random(&mut rand::rngs::OsRng);
        let k256 = PublicKey::Secp256k1(*k256.verifying_key());
        let did = k256.to_did_key();
        assert!(did.starts_with("did:key:zQ3s"), "{did}");
        assert_eq!(
            PublicKey::from_did_key(&did).unwrap().key_type(),
            KeyType::Secp256k1
        );
    }

    #[test]
    fn jwk_round_trip_preserves_ec_points() {
        let p256 = p256::ecdsa::SigningKey::random(&mut rand::rngs::OsRng);
        let k256 = k256::ecdsa::SigningKey::random(&mut rand::rngs::OsRng);
        for (public, crv) in [
            (PublicKey::P256(*p256.verifying_key()), "P-256"),
            (PublicKey::Secp256k1(*k256.verifying_key()), "secp256k1"),
        ] {
            let jwk = public.to_jwk();
            assert_eq!(jwk.kty, "EC");
            assert_eq!(jwk.crv, crv);
            assert!(jwk.y.is_some());
            assert_eq!(PublicKey::from_jwk(&jwk).unwrap().to_bytes(), public.to_bytes());
        }
    }

    #[test]
    fn rejects_algorithm_for_wrong_key_type() {
        let ed = ed25519_dalek::SigningKey::from_bytes(&[1u8; 32]);
        let public = PublicKey::Ed25519(ed.verifying_key());
        assert!(public.verify(Algorithm::ES256, b"msg", &[0u8; 64]).is_err());
        assert!("HS256".parse::<Algorithm>().is_err());
    }
}
