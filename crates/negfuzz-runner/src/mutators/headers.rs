//! Built-in header mutators

use rand::{Rng, RngCore};

use negfuzz_core::http::Header;

use super::body::random_alnum;
use super::{Mutator, MutatorCapability};

fn pick_index(headers: &[Header], rng: &mut dyn RngCore) -> Option<usize> {
    (!headers.is_empty()).then(|| rng.gen_range(0..headers.len()))
}

pub struct RemoveHeader;

impl Mutator for RemoveHeader {
    fn name(&self) -> &str {
        "remove-header"
    }
    fn description(&self) -> &str {
        "drop one random header"
    }
    fn capability(&self) -> MutatorCapability {
        MutatorCapability::Headers
    }
    fn mutate_headers(&self, headers: &[Header], rng: &mut dyn RngCore) -> Vec<Header> {
        let mut out = headers.to_vec();
        if let Some(i) = pick_index(headers, rng) {
            out.remove(i);
        }
        out
    }
}

pub struct DuplicateHeader;

impl Mutator for DuplicateHeader {
    fn name(&self) -> &str {
        "duplicate-header"
    }
    fn description(&self) -> &str {
        "send one random header twice"
    }
    fn capability(&self) -> MutatorCapability {
        MutatorCapability::Headers
    }
    fn mutate_headers(&self, headers: &[Header], rng: &mut dyn RngCore) -> Vec<Header> {
        let mut out = headers.to_vec();
        if let Some(i) = pick_index(headers, rng) {
            out.push(headers[i].clone());
        }
        out
    }
}

pub struct RandomHeaderValue;

impl Mutator for RandomHeaderValue {
    fn name(&self) -> &str {
        "random-header-value"
    }
    fn description(&self) -> &str {
        "replace one random header value with random characters"
    }
    fn capability(&self) -> MutatorCapability {
        MutatorCapability::Headers
    }
    fn mutate_headers(&self, headers: &[Header], rng: &mut dyn RngCore) -> Vec<Header> {
        let mut out = headers.to_vec();
        if let Some(i) = pick_index(headers, rng) {
            let len = rng.gen_range(1..=128);
            out[i].value = random_alnum(rng, len);
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::SmallRng;

    fn headers() -> Vec<Header> {
        vec![Header::new("Accept", "application/json"), Header::new("X-Tenant", "acme")]
    }

    #[test]
    fn remove_drops_exactly_one() {
        let out = RemoveHeader.mutate_headers(&headers(), &mut SmallRng::seed_from_u64(1));
        assert_eq!(out.len(), 1);
    }

    #[test]
    fn duplicate_adds_a_copy() {
        let out = DuplicateHeader.mutate_headers(&headers(), &mut SmallRng::seed_from_u64(1));
        assert_eq!(out.len(), 3);
        let last = out.last().unwrap();
        assert_eq!(out.iter().filter(|h| h.name == last.name).count(), 2);
    }

    #[test]
    fn random_value_changes_one_value() {
        let original = headers();
        let out = RandomHeaderValue.mutate_headers(&original, &mut SmallRng::seed_from_u64(1));
        let changed = out.iter().zip(&original).filter(|(a, b)| a.value != b.value).count();
        assert_eq!(changed, 1);
    }

    #[test]
    fn empty_headers_unchanged() {
        let mut rng = SmallRng::seed_from_u64(1);
        assert!(RemoveHeader.mutate_headers(&[], &mut rng).is_empty());
        assert!(DuplicateHeader.mutate_headers(&[], &mut rng).is_empty());
    }
}
