//! Skewed selection: which agent acts next, which community gets the traffic.

use crate::error::SimError;

use rand::distributions::WeightedIndex;
use rand::Rng;
use rand_distr::{Distribution, Zipf};

/// Zipf-distributed agent index selection.
///
/// Index 0 is the most popular agent. The skew and population size are
/// fixed at construction.
#[derive(Debug, Clone)]
pub struct AgentSelector {
    zipf: Zipf<f64>,
    population: usize,
    skew: f64,
}

impl AgentSelector {
    pub fn new(population: usize, skew: f64) -> Result<Self, SimError> {
        if population == 0 {
            return Err(SimError::Distribution("agent population is empty".to_string()));
        }
        let zipf = Zipf::new(population as u64, skew)
            .map_err(|e| SimError::Distribution(format!("zipf(n={}, s={}): {}", population, skew, e)))?;
        Ok(Self { zipf, population, skew })
    }

    /// Draws an agent index in `0..population`.
    pub fn select<R: Rng + ?Sized>(&self, rng: &mut R) -> usize {
        // Zipf yields ranks in [1, n]
        let rank = self.zipf.sample(rng) as usize;
        rank.saturating_sub(1).min(self.population - 1)
    }

    pub fn population(&self) -> usize {
        self.population
    }

    pub fn skew(&self) -> f64 {
        self.skew
    }
}

/// A community agents can post into.
#[derive(Debug, Clone, PartialEq)]
pub struct CommunityEntry {
    pub id: String,
    pub name: String,
    /// Chance that a post drawn into this community is actually sent
    pub post_probability: f64,
}

/// Weighted community selection plus the per-community should-post check.
///
/// Built once during population setup and shared read-only afterwards.
#[derive(Debug, Clone, Default)]
pub struct CommunityDistribution {
    entries: Vec<CommunityEntry>,
    weights: Option<WeightedIndex<f64>>,
}

impl CommunityDistribution {
    /// Builds a distribution where community `i` has weight `1 / (i+1)^skew`.
    pub fn new(entries: Vec<CommunityEntry>, skew: f64) -> Result<Self, SimError> {
        if entries.is_empty() {
            return Ok(Self::default());
        }
        let weights = (1..=entries.len()).map(|rank| 1.0 / (rank as f64).powf(skew));
        let weights = WeightedIndex::new(weights)
            .map_err(|e| SimError::Distribution(format!("community weights: {}", e)))?;
        Ok(Self {
            entries,
            weights: Some(weights),
        })
    }

    /// Draws a community, or `None` when there are no communities.
    pub fn random_community<R: Rng + ?Sized>(&self, rng: &mut R) -> Option<&CommunityEntry> {
        let weights = self.weights.as_ref()?;
        self.entries.get(weights.sample(rng))
    }

    /// Rolls the community's should-post probability. Unknown ids never post.
    pub fn should_create_post<R: Rng + ?Sized>(&self, community_id: &str, rng: &mut R) -> bool {
        match self.entries.iter().find(|e| e.id == community_id) {
            Some(entry) => rng.gen::<f64>() < entry.post_probability,
            None => false,
        }
    }

    pub fn communities(&self) -> &[CommunityEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn entry(id: &str, post_probability: f64) -> CommunityEntry {
        CommunityEntry {
            id: id.to_string(),
            name: format!("r/{}", id),
            post_probability,
        }
    }

    #[test]
    fn test_empty_population_rejected() {
        assert!(matches!(AgentSelector::new(0, 1.1), Err(SimError::Distribution(_))));
    }

    #[test]
    fn test_single_agent_always_selected() {
        let selector = AgentSelector::new(1, 1.1).unwrap();
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        for _ in 0..100 {
            assert_eq!(selector.select(&mut rng), 0);
        }
    }

    #[test]
    fn test_zipf_favors_low_indices() {
        let selector = AgentSelector::new(100, 1.1).unwrap();
        let mut rng = ChaCha8Rng::seed_from_u64(42);
        let mut counts = vec![0u32; 100];
        for _ in 0..10_000 {
            counts[selector.select(&mut rng)] += 1;
        }

        assert!(counts[0] > counts[99] * 5, "head={} tail={}", counts[0], counts[99]);

        // Decile totals decrease with index
        let deciles: Vec<u32> = counts.chunks(10).map(|c| c.iter().sum()).collect();
        for pair in deciles.windows(2) {
            assert!(pair[0] >= pair[1], "deciles not decreasing: {:?}", deciles);
        }
    }

    #[test]
    fn test_empty_communities() {
        let dist = CommunityDistribution::new(Vec::new(), 1.1).unwrap();
        let mut rng = ChaCha8Rng::seed_from_u64(3);
        assert!(dist.is_empty());
        assert!(dist.random_community(&mut rng).is_none());
        assert!(!dist.should_create_post("c1", &mut rng));
    }

    #[test]
    fn test_first_community_most_popular() {
        let dist = CommunityDistribution::new(
            vec![entry("c1", 0.5), entry("c2", 0.5), entry("c3", 0.5), entry("c4", 0.5)],
            1.1,
        )
        .unwrap();
        let mut rng = ChaCha8Rng::seed_from_u64(9);
        let mut first = 0;
        let mut last = 0;
        for _ in 0..5_000 {
            match dist.random_community(&mut rng).map(|c| c.id.as_str()) {
                Some("c1") => first += 1,
                Some("c4") => last += 1,
                _ => {}
            }
        }
        assert!(first > last * 2);
    }

    #[test]
    fn test_should_post_probability() {
        let dist = CommunityDistribution::new(vec![entry("always", 1.0), entry("never", 0.0)], 1.0).unwrap();
        let mut rng = ChaCha8Rng::seed_from_u64(5);
        for _ in 0..100 {
            assert!(dist.should_create_post("always", &mut rng));
            assert!(!dist.should_create_post("never", &mut rng));
            assert!(!dist.should_create_post("missing", &mut rng));
        }
    }
}
