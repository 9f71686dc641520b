use std::collections::HashMap;

/// An ordered class distribution: the candidate labels among the nearest
/// neighbours, each with a non-negative vote frequency.
///
/// Order is the order in which labels were first encountered during the
/// neighbour scan, which makes tie-breaking deterministic. Labels are unique.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ClassDistribution {
    entries: Vec<(String, f64)>,
}

impl ClassDistribution {
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// Adds `frequency` votes for `label`, inserting the label at the end of
    /// the order if it has not been seen before.
    pub fn add(&mut self, label: &str, frequency: f64) {
        match self.entries.iter_mut().find(|(l, _)| l == label) {
            Some((_, freq)) => *freq += frequency,
            None => self.entries.push((label.to_string(), frequency)),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// The label with the highest frequency; ties go to the earlier entry.
    pub fn best_label(&self) -> Option<&str> {
        let mut best: Option<&(String, f64)> = None;
        for entry in &self.entries {
            match best {
                Some((_, freq)) if entry.1 <= *freq => {}
                _ => best = Some(entry),
            }
        }
        best.map(|(label, _)| label.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = &(String, f64)> {
        self.entries.iter()
    }

    /// Converts the distribution into a label -> score mapping.
    ///
    /// With `normalize` set, each frequency is divided by the maximum
    /// frequency in the distribution, yielding scores in `[0, 1]`. A
    /// degenerate all-zero distribution normalizes to all-zero scores rather
    /// than dividing by zero. Entries whose score falls below `min_score`
    /// are left out; pass `0.0` to include everything.
    pub fn score_map(&self, normalize: bool, min_score: f64) -> HashMap<String, f64> {
        let max_frequency = if normalize {
            self.entries
                .iter()
                .map(|(_, f)| *f)
                .fold(0.0_f64, f64::max)
        } else {
            0.0
        };

        let mut scores = HashMap::with_capacity(self.entries.len());
        for (label, frequency) in &self.entries {
            let score = if normalize {
                if max_frequency > 0.0 {
                    frequency / max_frequency
                } else {
                    0.0
                }
            } else {
                *frequency
            };
            if score >= min_score {
                scores.insert(label.clone(), score);
            }
        }
        scores
    }
}

impl FromIterator<(String, f64)> for ClassDistribution {
    fn from_iter<I: IntoIterator<Item = (String, f64)>>(iter: I) -> Self {
        let mut dist = ClassDistribution::new();
        for (label, frequency) in iter {
            dist.add(&label, frequency);
        }
        dist
    }
}
