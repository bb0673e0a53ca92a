//! Root visit-count distribution and final action selection.

use games_connect4::COLS;
use rand::Rng;
use rand_chacha::ChaCha20Rng;

use crate::config::GREEDY_TEMPERATURE;
use crate::tree::MctsTree;

/// Visit counts of the root's children, one slot per column.
///
/// Only columns in `legal_mask` can carry visits; the others stay at zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ActionDistribution {
    visits: [u32; COLS],
    legal_mask: u8,
}

impl ActionDistribution {
    pub fn new(visits: [u32; COLS], legal_mask: u8) -> Self {
        let mut visits = visits;
        for (col, v) in visits.iter_mut().enumerate() {
            if (legal_mask >> col) & 1 == 0 {
                *v = 0;
            }
        }
        Self { visits, legal_mask }
    }

    /// Distribution at the root of a finished (or running) search.
    pub fn from_tree(tree: &MctsTree) -> Self {
        let root = tree.get(tree.root());
        Self::new(tree.root_visits(), root.board.legal_moves_mask())
    }

    #[inline]
    pub fn visits(&self) -> [u32; COLS] {
        self.visits
    }

    #[inline]
    pub fn legal_mask(&self) -> u8 {
        self.legal_mask
    }

    #[inline]
    pub fn is_legal(&self, column: u8) -> bool {
        (column as usize) < COLS && (self.legal_mask >> column) & 1 == 1
    }

    /// Total visits; equals the number of simulations that ran.
    pub fn total(&self) -> u32 {
        self.visits.iter().sum()
    }

    /// (column, visits) for every legal column, ascending.
    pub fn iter(&self) -> impl Iterator<Item = (u8, u32)> + '_ {
        (0..COLS as u8)
            .filter(|&col| self.is_legal(col))
            .map(|col| (col, self.visits[col as usize]))
    }

    /// Legal column with the most visits; ties go to the lowest column.
    pub fn argmax(&self) -> Option<u8> {
        self.iter()
            .fold(None, |best: Option<(u8, u32)>, (col, visits)| match best {
                Some((_, best_visits)) if visits <= best_visits => best,
                _ => Some((col, visits)),
            })
            .map(|(col, _)| col)
    }

    /// Probabilities proportional to `N^(1/temperature)`.
    ///
    /// A temperature near zero puts all mass on [`ActionDistribution::argmax`],
    /// as does a distribution without visits.
    pub fn probabilities(&self, temperature: f32) -> [f32; COLS] {
        let mut policy = [0.0f32; COLS];
        let max_visits = self.visits.iter().copied().max().unwrap_or(0);

        if temperature < GREEDY_TEMPERATURE || max_visits == 0 {
            if let Some(col) = self.argmax() {
                policy[col as usize] = 1.0;
            }
            return policy;
        }

        // Scale by the maximum first so large counts cannot overflow.
        let inv_t = 1.0 / temperature;
        for (col, visits) in self.iter() {
            let ratio = visits as f32 / max_visits as f32;
            policy[col as usize] = if temperature == 1.0 {
                ratio
            } else {
                ratio.powf(inv_t)
            };
        }

        let total: f32 = policy.iter().sum();
        for p in &mut policy {
            *p /= total;
        }
        policy
    }

    /// Pick a column: argmax when greedy, otherwise sampled from
    /// [`ActionDistribution::probabilities`].
    pub fn select(&self, temperature: f32, rng: &mut ChaCha20Rng) -> Option<u8> {
        if temperature < GREEDY_TEMPERATURE {
            return self.argmax();
        }
        sample_action(&self.probabilities(temperature), rng)
    }
}

/// Sample an action from a probability distribution.
fn sample_action(policy: &[f32; COLS], rng: &mut ChaCha20Rng) -> Option<u8> {
    let r: f32 = rng.gen();
    let mut cumsum = 0.0;

    for (i, &p) in policy.iter().enumerate() {
        cumsum += p;
        if r < cumsum {
            return Some(i as u8);
        }
    }

    // Fallback to last non-zero action (handles floating point issues)
    policy.iter().rposition(|&p| p > 0.0).map(|i| i as u8)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    const ALL: u8 = 0b111_1111;

    #[test]
    fn test_illegal_columns_are_zeroed() {
        let dist = ActionDistribution::new([5, 5, 5, 5, 5, 5, 5], 0b000_0101);
        assert_eq!(dist.visits(), [5, 0, 5, 0, 0, 0, 0]);
        assert_eq!(dist.total(), 10);
        assert_eq!(dist.iter().collect::<Vec<_>>(), vec![(0, 5), (2, 5)]);
    }

    #[test]
    fn test_argmax_ties_lowest_column() {
        let dist = ActionDistribution::new([1, 9, 3, 9, 0, 0, 0], ALL);
        assert_eq!(dist.argmax(), Some(1));

        let unvisited = ActionDistribution::new([0; COLS], 0b110_0000);
        assert_eq!(unvisited.argmax(), Some(5));

        let empty = ActionDistribution::new([0; COLS], 0);
        assert_eq!(empty.argmax(), None);
    }

    #[test]
    fn test_probabilities() {
        let dist = ActionDistribution::new([30, 70, 0, 0, 0, 0, 0], ALL);

        // Temperature 1.0: proportional to visits
        let policy = dist.probabilities(1.0);
        assert!((policy[0] - 0.3).abs() < 1e-6);
        assert!((policy[1] - 0.7).abs() < 1e-6);
        for p in policy.iter().skip(2) {
            assert!(p.abs() < 1e-6);
        }

        // Temperature 0.0: greedy
        let greedy = dist.probabilities(0.0);
        assert_eq!(greedy, [0.0, 1.0, 0.0, 0.0, 0.0, 0.0, 0.0]);

        // Low temperature sharpens without overflowing
        let sharp = ActionDistribution::new([40_000, 60_000, 0, 0, 0, 0, 0], ALL).probabilities(0.1);
        assert!(sharp.iter().all(|p| p.is_finite()));
        assert!(sharp[1] > 0.95);
    }

    #[test]
    fn test_select_samples_only_visited() {
        let dist = ActionDistribution::new([0, 0, 10, 0, 30, 0, 0], ALL);
        let mut rng = ChaCha20Rng::seed_from_u64(3);
        let mut counts = [0u32; COLS];

        for _ in 0..1000 {
            let col = dist.select(1.0, &mut rng).unwrap();
            counts[col as usize] += 1;
        }

        assert_eq!(counts[2] + counts[4], 1000);
        assert!(counts[4] > counts[2]);
        assert_eq!(dist.select(0.0, &mut rng), Some(4));
    }
}
