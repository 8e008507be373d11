//! Browser profile seeds.
//!
//! A session presents one consistent client identity for its whole
//! lifetime, picked from a small pool.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProfileSeed {
    pub user_agent: &'static str,
    pub accept_language: &'static str,
    pub viewport: (u32, u32),
    pub mobile: bool,
}

const POOL: [ProfileSeed; 2] = [
    ProfileSeed {
        user_agent: "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
                     (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36",
        accept_language: "en-US,en;q=0.9",
        viewport: (1366, 768),
        mobile: false,
    },
    ProfileSeed {
        user_agent: "Mozilla/5.0 (iPhone; CPU iPhone OS 16_0 like Mac OS X) \
                     AppleWebKit/605.1.15 (KHTML, like Gecko) Version/16.0 Mobile/15E148 Safari/604.1",
        accept_language: "en-US,en;q=0.9",
        viewport: (390, 844),
        mobile: true,
    },
];

/// Pick a profile; a fixed `seed` always yields the same one.
pub fn make_seed(seed: Option<u64>) -> ProfileSeed {
    let profile = match seed {
        Some(seed) => pick(&mut StdRng::seed_from_u64(seed)),
        None => pick(&mut rand::rng()),
    };
    tracing::debug!(
        user_agent = profile.user_agent,
        mobile = profile.mobile,
        "Session profile selected"
    );
    profile
}

fn pick<R: Rng>(rng: &mut R) -> ProfileSeed {
    POOL[rng.random_range(0..POOL.len())]
}
