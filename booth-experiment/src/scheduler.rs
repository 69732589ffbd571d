//! Per-trial stimulus category selection.

use booth_core::{Category, ConfigError, SceneAsset};
use rand::Rng;
use rand::seq::SliceRandom;

pub(crate) fn check_probability(probability: f64) -> Result<(), ConfigError> {
    if (0.0..=1.0).contains(&probability) {
        Ok(())
    } else {
        Err(ConfigError::Probability(probability))
    }
}

/// Number of go labels in a stratified block of `n` trials.
pub fn go_count(n: usize, probability: f64) -> usize {
    (probability * n as f64).round() as usize
}

/// Unconstrained Bernoulli draw, one per trial.
#[derive(Debug, Clone, Copy)]
pub struct IndependentDraw {
    probability: f64,
}

impl IndependentDraw {
    pub fn new(probability: f64) -> Result<Self, ConfigError> {
        check_probability(probability)?;
        Ok(Self { probability })
    }

    pub fn draw<R: Rng + ?Sized>(&self, rng: &mut R) -> Category {
        if rng.random_bool(self.probability) {
            Category::Go
        } else {
            Category::NoGo
        }
    }
}

/// Labels in fixed proportions, consumed in a shuffled order.
///
/// The label multiset never changes after construction; only the permutation
/// is redrawn by [`StratifiedBlock::regenerate`]. Labels are consumed with
/// [`peek`](StratifiedBlock::peek) followed by
/// [`commit`](StratifiedBlock::commit) so a trial that never happened leaves
/// the block untouched.
#[derive(Debug, Clone)]
pub struct StratifiedBlock<T> {
    labels: Vec<T>,
    order: Vec<usize>,
    cursor: usize,
}

impl<T> StratifiedBlock<T> {
    pub fn new<R: Rng + ?Sized>(labels: Vec<T>, rng: &mut R) -> Self {
        let mut block = Self {
            order: (0..labels.len()).collect(),
            labels,
            cursor: 0,
        };
        block.order.shuffle(rng);
        block
    }

    pub fn peek(&self) -> Option<&T> {
        self.order.get(self.cursor).map(|&i| &self.labels[i])
    }

    pub fn commit(&mut self) {
        if self.cursor < self.order.len() {
            self.cursor += 1;
        }
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    pub fn remaining(&self) -> usize {
        self.order.len() - self.cursor
    }

    pub fn is_exhausted(&self) -> bool {
        self.remaining() == 0
    }

    /// Fresh permutation over the same labels.
    pub fn regenerate<R: Rng + ?Sized>(&mut self, rng: &mut R) {
        self.order.shuffle(rng);
        self.cursor = 0;
    }

    /// Labels in presentation order.
    pub fn sequence(&self) -> impl Iterator<Item = &T> {
        self.order.iter().map(|&i| &self.labels[i])
    }
}

impl StratifiedBlock<Category> {
    /// Exactly `round(probability × n)` go labels, the rest no-go.
    pub fn go_nogo<R: Rng + ?Sized>(
        n: usize,
        probability: f64,
        rng: &mut R,
    ) -> Result<Self, ConfigError> {
        check_probability(probability)?;
        let go = go_count(n, probability);
        let mut labels = vec![Category::Go; go];
        labels.resize(n, Category::NoGo);
        Ok(Self::new(labels, rng))
    }

    pub fn count(&self, category: Category) -> usize {
        self.labels.iter().filter(|&&c| c == category).count()
    }
}

/// A scene block of `size` assets: the go share is filled by cycling through
/// `go`, the rest by cycling through `nogo`.
pub fn scene_block<R: Rng + ?Sized>(
    go: &[SceneAsset],
    nogo: &[SceneAsset],
    size: usize,
    probability: f64,
    rng: &mut R,
) -> Result<StratifiedBlock<SceneAsset>, ConfigError> {
    check_probability(probability)?;
    if size == 0 {
        return Err(ConfigError::NonPositive("block_size"));
    }
    let go_slots = go_count(size, probability);
    if go_slots > 0 && go.is_empty() {
        return Err(ConfigError::NoAssets("go"));
    }
    if go_slots < size && nogo.is_empty() {
        return Err(ConfigError::NoAssets("no-go"));
    }
    let labels = go
        .iter()
        .cycle()
        .take(go_slots)
        .chain(nogo.iter().cycle().take(size - go_slots))
        .cloned()
        .collect();
    Ok(StratifiedBlock::new(labels, rng))
}
