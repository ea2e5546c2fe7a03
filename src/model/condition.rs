use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum Condition {
    Healthy,
    LatentTb,
}

impl Condition {
    /// Canonical class order used by every classifier.
    pub const ALL: [Condition; 2] = [Condition::Healthy, Condition::LatentTb];

    pub fn class_index(self) -> usize {
        match self {
            Condition::Healthy => 0,
            Condition::LatentTb => 1,
        }
    }

    pub fn from_class_index(idx: usize) -> Condition {
        if idx == 0 {
            Condition::Healthy
        } else {
            Condition::LatentTb
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Condition::Healthy => "Healthy",
            Condition::LatentTb => "LatentTB",
        }
    }

    /// Maps a raw metadata group value onto a condition.
    pub fn from_group(value: &str, healthy_label: &str) -> Option<Condition> {
        let v = value.trim();
        if v.is_empty() {
            return None;
        }
        if v.eq_ignore_ascii_case(healthy_label.trim()) {
            Some(Condition::Healthy)
        } else {
            Some(Condition::LatentTb)
        }
    }
}

pub fn class_counts(labels: &[Condition]) -> [usize; 2] {
    let mut counts = [0usize; 2];
    for &c in labels {
        counts[c.class_index()] += 1;
    }
    counts
}
