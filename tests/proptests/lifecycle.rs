//! Properties of the full split/combine lifecycle

use std::sync::Arc;
use std::time::Duration;

use quickcheck::{Arbitrary, Gen};
use quickcheck_macros::quickcheck;
use zeroize::Zeroizing;

use quorum::cipher::{KdfParams, ShareCipher};
use quorum::domain::{SecretStatus, SplitConfig};
use quorum::primitive::Shamir;
use quorum::registry::CoordinationRegistry;
use quorum::repository::{MemoryRepository, Repository};
use quorum::{EngineConfig, SecretLifecycle, SessionContext, SignOutcome, UnsignOutcome};

/// A secret, a split configuration, a signing order and the holders who
/// later unsign
#[derive(Clone, Debug)]
struct Scenario {
    secret: Vec<u8>,
    parts: u8,
    threshold: u8,
    sign_order: Vec<usize>,
    unsigners: Vec<usize>,
}

fn shuffled(g: &mut Gen, n: usize) -> Vec<usize> {
    let mut order: Vec<usize> = (0..n).collect();
    // Fisher-Yates driven by the generator
    for i in (1..n).rev() {
        let j = usize::arbitrary(g) % (i + 1);
        order.swap(i, j);
    }
    order
}

impl Arbitrary for Scenario {
    fn arbitrary(g: &mut Gen) -> Self {
        let len = usize::from(u8::arbitrary(g) % 64) + 1;
        let secret = (0..len).map(|_| u8::arbitrary(g)).collect();
        let parts = u8::arbitrary(g) % 5 + 1; // 1..=5
        let threshold = u8::arbitrary(g) % parts + 1; // 1..=parts

        // the owner always signs first
        let mut sign_order = vec![0];
        sign_order.extend(shuffled(g, usize::from(parts) - 1).into_iter().map(|i| i + 1));

        let mut unsigners = shuffled(g, usize::from(parts));
        unsigners.truncate(usize::from(threshold));

        Scenario {
            secret,
            parts,
            threshold,
            sign_order,
            unsigners,
        }
    }
}

fn passphrase(holder: usize) -> Zeroizing<String> {
    Zeroizing::new(format!("passphrase-{holder}"))
}

fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap()
}

/// Any `threshold` holders recover exactly what was split, whatever order
/// the signatures arrived in
#[quickcheck]
fn prop_lifecycle_round_trip(scenario: Scenario) -> bool {
    runtime().block_on(async move {
        let repo = Arc::new(MemoryRepository::new());
        let engine = SecretLifecycle::new(
            repo.clone(),
            Arc::new(Shamir),
            Arc::new(CoordinationRegistry::new()),
            EngineConfig {
                wait_timeout: Duration::from_secs(30),
                kdf: KdfParams::new(64, 1),
            },
        );
        let holders: Vec<SessionContext> = (0..usize::from(scenario.parts))
            .map(|i| SessionContext::authenticate(repo.as_ref(), &format!("holder{i}"), "key").unwrap())
            .collect();

        let config = SplitConfig::from_raw(scenario.parts, scenario.threshold).unwrap();
        let handle = engine
            .create(
                &holders[0],
                "prop",
                Zeroizing::new(scenario.secret.clone()),
                passphrase(0),
                config,
            )
            .unwrap();
        let id = handle.secret().id;
        let waiter = tokio::spawn(handle.wait());

        for &holder in &scenario.sign_order[1..] {
            if !matches!(
                engine.sign(&holders[holder], &id, passphrase(holder)),
                Ok(SignOutcome::Accepted(_))
            ) {
                return false;
            }
        }
        match waiter.await {
            Ok(Ok(secret)) if secret.status() == SecretStatus::Ready => {}
            _ => return false,
        }

        let handle = engine.begin_combine(&holders[0], &id).unwrap();
        for &holder in &scenario.unsigners {
            if !matches!(
                engine.unsign(&holders[holder], &id, &passphrase(holder)).await,
                Ok(UnsignOutcome::Accepted { .. })
            ) {
                return false;
            }
        }
        matches!(handle.recover().await, Ok(plaintext) if *plaintext == scenario.secret)
    })
}

/// A share sealed under one passphrase never opens under another
#[quickcheck]
fn prop_wrong_passphrase_never_decrypts(fragment: Vec<u8>, right: String, wrong: String) -> bool {
    if right == wrong {
        return true;
    }
    let cipher = ShareCipher::new(KdfParams::new(64, 1));
    let sealed = cipher.encrypt(&fragment, &right).unwrap();
    cipher.decrypt(&sealed, &wrong).is_err()
        && cipher.decrypt(&sealed, &right).map(|f| *f == fragment).unwrap_or(false)
}

/// Every holder ends up with exactly one share and no two share an index
#[quickcheck]
fn prop_one_share_per_holder(scenario: Scenario) -> bool {
    runtime().block_on(async move {
        let repo = Arc::new(MemoryRepository::new());
        let engine = SecretLifecycle::new(
            repo.clone(),
            Arc::new(Shamir),
            Arc::new(CoordinationRegistry::new()),
            EngineConfig {
                wait_timeout: Duration::from_secs(30),
                kdf: KdfParams::new(64, 1),
            },
        );
        let holders: Vec<SessionContext> = (0..usize::from(scenario.parts))
            .map(|i| SessionContext::authenticate(repo.as_ref(), &format!("holder{i}"), "key").unwrap())
            .collect();

        let config = SplitConfig::from_raw(scenario.parts, scenario.threshold).unwrap();
        let handle = engine
            .create(&holders[0], "prop", Zeroizing::new(scenario.secret.clone()), passphrase(0), config)
            .unwrap();
        let id = handle.secret().id;
        let waiter = tokio::spawn(handle.wait());
        for &holder in &scenario.sign_order[1..] {
            engine.sign(&holders[holder], &id, passphrase(holder)).unwrap();
        }
        waiter.await.unwrap().unwrap();

        let mut indices = Vec::new();
        for holder in &holders {
            let shares = repo.list_shares_for_user_and_secret(&holder.user_id(), &id).unwrap();
            if shares.len() != 1 {
                return false;
            }
            indices.push(*shares[0].index);
        }
        indices.sort_unstable();
        indices.dedup();
        indices.len() == usize::from(scenario.parts)
    })
}
