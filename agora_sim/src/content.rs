//! Synthetic text for posts, comments, users and communities.

use rand::seq::SliceRandom;
use rand::Rng;

const ADJECTIVES: &[&str] = &[
    "quiet", "bright", "strange", "ancient", "tiny", "endless", "honest", "broken",
    "golden", "hidden", "noisy", "curious", "frozen", "electric", "lazy", "wild",
];

const NOUNS: &[&str] = &[
    "river", "keyboard", "garden", "compiler", "mountain", "coffee", "library",
    "engine", "lantern", "bicycle", "forest", "protocol", "recipe", "harbor",
    "telescope", "notebook",
];

const VERBS: &[&str] = &[
    "explains", "breaks", "rebuilds", "ignores", "discovers", "questions",
    "celebrates", "measures", "replaces", "remembers",
];

const TOPICS: &[&str] = &[
    "rust", "gardening", "astronomy", "cooking", "cycling", "history", "music",
    "photography", "databases", "chess", "travel", "woodworking",
];

fn pick<'a, R: Rng + ?Sized>(rng: &mut R, words: &'a [&'a str]) -> &'a str {
    words.choose(rng).copied().unwrap_or("thing")
}

/// A short headline, e.g. "The hidden compiler rebuilds a library".
pub fn random_title<R: Rng + ?Sized>(rng: &mut R) -> String {
    format!(
        "The {} {} {} a {}",
        pick(rng, ADJECTIVES),
        pick(rng, NOUNS),
        pick(rng, VERBS),
        pick(rng, NOUNS)
    )
}

/// One to three sentences of filler text.
pub fn random_content<R: Rng + ?Sized>(rng: &mut R) -> String {
    let sentences = rng.gen_range(1..=3);
    (0..sentences)
        .map(|_| {
            format!(
                "A {} {} {} every {}.",
                pick(rng, ADJECTIVES),
                pick(rng, NOUNS),
                pick(rng, VERBS),
                pick(rng, NOUNS)
            )
        })
        .collect::<Vec<_>>()
        .join(" ")
}

pub fn username(index: usize) -> String {
    format!("user_{:05}", index)
}

/// Community name for rank `index`; names stay unique past the topic list.
pub fn community_name(index: usize) -> String {
    let topic = TOPICS[index % TOPICS.len()];
    match index / TOPICS.len() {
        0 => topic.to_string(),
        round => format!("{}{}", topic, round + 1),
    }
}
