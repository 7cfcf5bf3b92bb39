use rand::{distributions::Alphanumeric, thread_rng, Rng};

/// Returns a random alphanumeric string, used for room ids
pub fn random_string(length: usize) -> String {
    thread_rng()
        .sample_iter(&Alphanumeric)
        .take(length)
        .map(char::from)
        .collect()
}
