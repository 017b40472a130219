//! Behavior profiles - per-agent action probabilities, active hours, persona.
//!
//! An agent picks its action by drawing one uniform sample in `[0, 1)` and
//! walking the cumulative buckets in fixed order:
//!
//! ```text
//! 0 ── post ──┬── comment ──┬──── vote ────┬──── join (residual) ──── 1
//!            p_post    p_post+p_comment   p_post+p_comment+p_vote
//! ```

use crate::error::SimError;

use agora_core::ActionKind;
use rand::distributions::WeightedIndex;
use rand::Rng;
use rand_distr::{Distribution, Normal};
use std::collections::BTreeSet;

/// Persona label used to group agents in metrics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Persona {
    /// Mostly votes, rarely writes
    Lurker,

    /// A bit of everything, daytime
    Casual,

    /// Lives in comment threads
    Commenter,

    /// Creates posts, long active window
    Poster,

    /// Active around the clock
    PowerUser,
}

/// Baseline numbers a persona's profiles are jittered around.
struct PersonaTemplate {
    post: f64,
    comment: f64,
    vote: f64,
    /// First active hour (UTC)
    window_start: u8,
    /// Number of consecutive active hours
    window_span: u8,
    /// Relative share of the population
    share: f64,
}

impl Persona {
    /// Returns all personas.
    pub fn all() -> [Persona; 5] {
        [
            Persona::Lurker,
            Persona::Casual,
            Persona::Commenter,
            Persona::Poster,
            Persona::PowerUser,
        ]
    }

    /// Returns the persona label.
    pub fn name(&self) -> &'static str {
        match self {
            Persona::Lurker => "lurker",
            Persona::Casual => "casual",
            Persona::Commenter => "commenter",
            Persona::Poster => "poster",
            Persona::PowerUser => "power_user",
        }
    }

    fn template(&self) -> PersonaTemplate {
        match self {
            Persona::Lurker => PersonaTemplate { post: 0.02, comment: 0.05, vote: 0.60, window_start: 19, window_span: 5, share: 0.35 },
            Persona::Casual => PersonaTemplate { post: 0.08, comment: 0.15, vote: 0.50, window_start: 12, window_span: 8, share: 0.30 },
            Persona::Commenter => PersonaTemplate { post: 0.05, comment: 0.45, vote: 0.30, window_start: 9, window_span: 10, share: 0.15 },
            Persona::Poster => PersonaTemplate { post: 0.35, comment: 0.20, vote: 0.30, window_start: 8, window_span: 12, share: 0.12 },
            Persona::PowerUser => PersonaTemplate { post: 0.25, comment: 0.30, vote: 0.35, window_start: 0, window_span: 24, share: 0.08 },
        }
    }
}

impl std::fmt::Display for Persona {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Per-agent behavior configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct BehaviorProfile {
    post_probability: f64,
    comment_probability: f64,
    vote_probability: f64,
    active_hours: BTreeSet<u8>,
    persona: Persona,
}

impl BehaviorProfile {
    /// Creates a profile, checking that the probabilities form valid buckets.
    ///
    /// The join probability is whatever `post + comment + vote` leaves of 1.
    pub fn new(
        post_probability: f64,
        comment_probability: f64,
        vote_probability: f64,
        active_hours: impl IntoIterator<Item = u8>,
        persona: Persona,
    ) -> Result<Self, SimError> {
        let probabilities = [post_probability, comment_probability, vote_probability];
        if probabilities.iter().any(|p| !p.is_finite() || *p < 0.0) {
            return Err(SimError::InvalidProfile(format!(
                "probabilities must be non-negative, got {:?}",
                probabilities
            )));
        }
        let total: f64 = probabilities.iter().sum();
        if total > 1.0 + 1e-9 {
            return Err(SimError::InvalidProfile(format!(
                "post + comment + vote = {:.3} exceeds 1",
                total
            )));
        }

        let active_hours: BTreeSet<u8> = active_hours.into_iter().collect();
        if let Some(hour) = active_hours.iter().find(|h| **h > 23) {
            return Err(SimError::InvalidProfile(format!("hour {} out of range", hour)));
        }

        Ok(Self {
            post_probability,
            comment_probability,
            vote_probability,
            active_hours,
            persona,
        })
    }

    /// Generates a random profile: persona by population share, template
    /// probabilities with Gaussian jitter, and a shifted active window.
    pub fn generate<R: Rng + ?Sized>(rng: &mut R) -> Self {
        let personas = Persona::all();
        let persona = match WeightedIndex::new(personas.iter().map(|p| p.template().share)) {
            Ok(index) => personas[index.sample(rng)],
            Err(_) => Persona::Casual,
        };
        let template = persona.template();

        let jitter = Normal::new(0.0, 0.03).ok();
        let mut draw = |base: f64| -> f64 {
            let noise = jitter.as_ref().map(|n| n.sample(rng)).unwrap_or(0.0);
            (base + noise).max(0.0)
        };
        let mut post = draw(template.post);
        let mut comment = draw(template.comment);
        let mut vote = draw(template.vote);

        // Leave at least a sliver for joins
        let total = post + comment + vote;
        if total > 0.95 {
            let scale = 0.95 / total;
            post *= scale;
            comment *= scale;
            vote *= scale;
        }

        let active_hours = if template.window_span >= 24 {
            (0..24).collect()
        } else {
            let shift = rng.gen_range(-3i32..=3);
            let span = (template.window_span as i32 + rng.gen_range(-2i32..=2)).clamp(1, 23);
            let start = (template.window_start as i32 + shift).rem_euclid(24);
            (0..span).map(|i| ((start + i) % 24) as u8).collect()
        };

        Self {
            post_probability: post,
            comment_probability: comment,
            vote_probability: vote,
            active_hours,
            persona,
        }
    }

    /// Maps a sample in `[0, 1)` to exactly one action.
    pub fn select_action(&self, sample: f64) -> ActionKind {
        let post_bound = self.post_probability;
        let comment_bound = post_bound + self.comment_probability;
        let vote_bound = comment_bound + self.vote_probability;

        if sample < post_bound {
            ActionKind::Post
        } else if sample < comment_bound {
            ActionKind::Comment
        } else if sample < vote_bound {
            ActionKind::Vote
        } else {
            ActionKind::Join
        }
    }

    pub fn is_active_hour(&self, hour: u8) -> bool {
        self.active_hours.contains(&hour)
    }

    pub fn persona(&self) -> Persona {
        self.persona
    }

    pub fn active_hours(&self) -> &BTreeSet<u8> {
        &self.active_hours
    }

    pub fn post_probability(&self) -> f64 {
        self.post_probability
    }

    pub fn comment_probability(&self) -> f64 {
        self.comment_probability
    }

    pub fn vote_probability(&self) -> f64 {
        self.vote_probability
    }

    /// The residual bucket.
    pub fn join_probability(&self) -> f64 {
        (1.0 - self.post_probability - self.comment_probability - self.vote_probability).max(0.0)
    }
}
