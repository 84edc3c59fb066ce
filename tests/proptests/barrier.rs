//! Properties of the threshold barrier

use quickcheck::{Arbitrary, Gen};
use quickcheck_macros::quickcheck;
use quorum::barrier::{Phase, RefuseReason, ThresholdBarrier, WaitError};

/// An expected count and a number of offered contributions around it
#[derive(Clone, Copy, Debug)]
struct Offers {
    expected: usize,
    offered: usize,
}

impl Arbitrary for Offers {
    fn arbitrary(g: &mut Gen) -> Self {
        let expected = usize::from(u8::arbitrary(g) % 16) + 1;
        let offered = usize::from(u8::arbitrary(g) % 32);
        Offers { expected, offered }
    }
}

fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_current_thread()
        .enable_time()
        .build()
        .unwrap()
}

/// The barrier accepts exactly `expected` contributions and refuses the rest
#[quickcheck]
fn prop_accepts_at_most_expected(offers: Offers) -> bool {
    let barrier = ThresholdBarrier::new(offers.expected);
    let mut accepted = 0;
    for n in 0..offers.offered {
        match barrier.contribute(n) {
            Ok(_) => accepted += 1,
            Err(refused) => {
                if refused.reason != RefuseReason::Full || refused.contribution != n {
                    return false;
                }
            }
        }
    }

    let progress = barrier.progress();
    accepted == offers.offered.min(offers.expected)
        && progress.received == accepted
        && (progress.phase == Phase::Full) == (accepted == offers.expected)
}

/// A full barrier hands every contribution, in arrival order, to exactly one waiter
#[quickcheck]
fn prop_fires_exactly_once(expected: u8, waiters: u8) -> bool {
    let expected = usize::from(expected % 12) + 1;
    let waiters = usize::from(waiters % 4) + 1;

    runtime().block_on(async {
        let barrier = std::sync::Arc::new(ThresholdBarrier::new(expected));
        let handles: Vec<_> = (0..waiters)
            .map(|_| {
                let barrier = barrier.clone();
                tokio::spawn(async move { barrier.await_full().await })
            })
            .collect();

        for n in 0..expected {
            if barrier.contribute(n).is_err() {
                return false;
            }
        }

        let mut fired = 0;
        for handle in handles {
            match handle.await {
                Ok(Ok(items)) => {
                    if items != (0..expected).collect::<Vec<_>>() {
                        return false;
                    }
                    fired += 1;
                }
                Ok(Err(WaitError::AlreadyFired)) => {}
                _ => return false,
            }
        }
        fired == 1 && barrier.progress().phase == Phase::Fired
    })
}

/// Cancelling releases every waiter before the count is reached
#[quickcheck]
fn prop_cancel_releases_waiters(offers: Offers) -> bool {
    let Offers { expected, offered } = offers;
    let offered = offered.min(expected - 1);

    runtime().block_on(async {
        let barrier = std::sync::Arc::new(ThresholdBarrier::new(expected));
        for n in 0..offered {
            let _ = barrier.contribute(n);
        }
        let waiter = {
            let barrier = barrier.clone();
            tokio::spawn(async move { barrier.await_full().await })
        };
        tokio::task::yield_now().await;

        barrier.cancel();
        matches!(waiter.await, Ok(Err(WaitError::Cancelled)))
            && matches!(barrier.contribute(0), Err(r) if r.reason == RefuseReason::Cancelled)
    })
}
