//! HTTP client of the local threshold signing service.

use async_trait::async_trait;
use bf_03_thorchain_bridge::{BackOffConfig, RetryingHttpClient};
use serde::de::DeserializeOwned;
use serde::Serialize;
use shared_types::PubKey;
use tracing::{debug, info, warn};

use crate::{
    KeygenRequest, KeygenResponse, KeysignRequest, KeysignResponse, ThresholdSigner, TssConfig,
    TssError,
};

/// `POST /keysign`, `POST /keygen` and `GET /p2pid` against
/// `scheme://host:port`.
///
/// Rounds are not retried: a failed round is reported to consensus, which
/// schedules the next attempt.
pub struct TssClient {
    http: RetryingHttpClient,
}

impl TssClient {
    /// Client for the service in `config`.
    pub fn new(config: &TssConfig) -> Result<Self, TssError> {
        config.validate()?;
        let http = RetryingHttpClient::new(
            config.base_url(),
            config.request_timeout,
            BackOffConfig::default(),
            1,
        )?;
        Ok(Self { http })
    }

    async fn post<B: Serialize, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, TssError> {
        let text = self.http.post_json(path, body).await?;
        serde_json::from_str(&text).map_err(|e| TssError::Decode(e.to_string()))
    }
}

#[async_trait]
impl ThresholdSigner for TssClient {
    async fn keysign(
        &self,
        digest: &[u8],
        pool_pub_key: &PubKey,
        signers: &[PubKey],
    ) -> Result<Option<[u8; 64]>, TssError> {
        if digest.len() != 32 {
            return Err(TssError::InvalidMessage(digest.len()));
        }
        let request = KeysignRequest::new(pool_pub_key.clone(), digest, signers.to_vec());
        debug!(pool = %pool_pub_key, signers = signers.len(), "[bf-04] Sending keysign request");
        let response: KeysignResponse = self.post("/keysign", &request).await?;
        let result = response.into_signature();
        match &result {
            Ok(None) => debug!(pool = %pool_pub_key, "[bf-04] Not selected for keysign"),
            Err(e) => warn!(pool = %pool_pub_key, error = %e, "[bf-04] Keysign failed"),
            Ok(Some(_)) => {}
        }
        result
    }

    async fn keygen(&self, members: &[PubKey]) -> Result<Option<PubKey>, TssError> {
        let request = KeygenRequest {
            keys: members.to_vec(),
        };
        info!(members = members.len(), "[bf-04] Sending keygen request");
        let response: KeygenResponse = self.post("/keygen", &request).await?;
        response.into_pubkey()
    }

    async fn p2p_id(&self) -> Result<String, TssError> {
        let text = self.http.get("/p2pid").await?;
        Ok(text.trim().trim_matches('"').to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::routing::{get, post};
    use axum::{Json, Router};
    use base64::engine::general_purpose::STANDARD as BASE64;
    use base64::Engine;
    use serde_json::{json, Value};
    use shared_crypto::{sha256, Secp256k1KeyPair, Secp256k1Signature};
    use shared_types::ChainNetwork;
    use std::sync::Arc;

    async fn serve(router: Router) -> TssClient {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        TssClient::new(&TssConfig {
            host: addr.ip().to_string(),
            port: addr.port(),
            ..Default::default()
        })
        .unwrap()
    }

    #[tokio::test]
    async fn test_keysign_round_trip() {
        let pair = Arc::new(Secp256k1KeyPair::generate());
        let vault = PubKey::from_secp256k1(&pair.public_key(), ChainNetwork::Testnet).unwrap();
        let signer = pair.clone();
        let router = Router::new().route(
            "/keysign",
            post(move |Json(body): Json<Value>| {
                let signer = signer.clone();
                async move {
                    let digest = BASE64.decode(body["message"].as_str().unwrap()).unwrap();
                    let digest: [u8; 32] = digest.try_into().unwrap();
                    let sig = signer.sign_prehash(&digest).unwrap();
                    // leading zeros stripped, as big-integer encoders do
                    let r: Vec<u8> = sig.r().iter().copied().skip_while(|b| *b == 0).collect();
                    Json(json!({
                        "r": BASE64.encode(r),
                        "s": BASE64.encode(sig.s()),
                        "status": 0,
                        "blame": {"fail_reason": "", "blame_nodes": []}
                    }))
                }
            }),
        );
        let client = serve(router).await;

        let digest = sha256(b"outbound");
        let sig = client
            .keysign(&digest, &vault, &[vault.clone()])
            .await
            .unwrap()
            .unwrap();
        assert!(pair
            .public_key()
            .verify_prehash(&digest, &Secp256k1Signature::from_bytes(sig))
            .is_ok());
    }

    #[tokio::test]
    async fn test_keysign_blame_and_not_selected() {
        let router = Router::new().route(
            "/keysign",
            post(|Json(body): Json<Value>| async move {
                if body["signer_pub_keys"].as_array().map(|a| a.is_empty()).unwrap_or(true) {
                    Json(json!({"status": 2}))
                } else {
                    Json(json!({
                        "status": 1,
                        "blame": {"fail_reason": "timeout", "blame_nodes": [{"pubkey": "tthorpub1bad"}]}
                    }))
                }
            }),
        );
        let client = serve(router).await;
        let vault = PubKey::new_unchecked("tthorpub1vault");

        assert!(client.keysign(&[1u8; 32], &vault, &[]).await.unwrap().is_none());

        let err = client
            .keysign(&[1u8; 32], &vault, &[vault.clone()])
            .await
            .unwrap_err();
        let blame = err.blame().unwrap();
        assert_eq!(blame.blame_nodes[0].pubkey, "tthorpub1bad");
    }

    #[tokio::test]
    async fn test_keygen_and_p2p_id() {
        let router = Router::new()
            .route(
                "/keygen",
                post(|Json(body): Json<Value>| async move {
                    assert_eq!(body["keys"].as_array().unwrap().len(), 2);
                    Json(json!({"pub_key": "tthorpub1new", "status": 0}))
                }),
            )
            .route("/p2pid", get(|| async { "16Uiu2HAmPeer" }));
        let client = serve(router).await;

        let pk = client
            .keygen(&[
                PubKey::new_unchecked("tthorpub1a"),
                PubKey::new_unchecked("tthorpub1b"),
            ])
            .await
            .unwrap();
        assert_eq!(pk, Some(PubKey::new_unchecked("tthorpub1new")));
        assert_eq!(client.p2p_id().await.unwrap(), "16Uiu2HAmPeer");
    }

    #[tokio::test]
    async fn test_digest_length_is_checked() {
        let client = serve(Router::new()).await;
        let err = client
            .keysign(b"short", &PubKey::new_unchecked("tthorpub1v"), &[])
            .await
            .unwrap_err();
        assert!(matches!(err, TssError::InvalidMessage(5)));
    }
}
