use std::collections::HashMap;
use std::path::Path;

use crate::input::InputError;
use crate::input::reader::csv_reader;
use crate::model::Condition;

#[derive(Debug, Clone)]
pub struct MetaColumns {
    pub sample: String,
    pub group: String,
    pub healthy_label: String,
}

impl Default for MetaColumns {
    fn default() -> Self {
        Self {
            sample: "title".to_string(),
            group: "characteristics_ch1.0.disease group".to_string(),
            healthy_label: "Healthy".to_string(),
        }
    }
}

/// Per-sample labels, aligned with the count matrix columns.
#[derive(Debug, Clone)]
pub struct SampleSheet {
    pub samples: Vec<String>,
    pub groups: Vec<String>,
    pub conditions: Vec<Condition>,
}

impl SampleSheet {
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    /// Distinct raw group values in first-seen order.
    pub fn distinct_groups(&self) -> Vec<&str> {
        let mut out: Vec<&str> = Vec::new();
        for g in &self.groups {
            if !out.contains(&g.as_str()) {
                out.push(g);
            }
        }
        out
    }
}

pub fn load_sample_sheet(
    path: &Path,
    columns: &MetaColumns,
    sample_order: &[String],
) -> Result<SampleSheet, InputError> {
    let mut reader = csv_reader(path)?;
    let header = reader.headers()?.clone();
    let header_cols: Vec<String> = header.iter().map(|s| s.to_string()).collect();

    let sample_col = find_column(&header_cols, &columns.sample).ok_or_else(|| {
        InputError::MissingInput(format!(
            "metadata column '{}' not found in {}",
            columns.sample,
            path.display()
        ))
    })?;
    let group_col = find_column(&header_cols, &columns.group).ok_or_else(|| {
        InputError::MissingInput(format!(
            "metadata column '{}' not found in {}",
            columns.group,
            path.display()
        ))
    })?;

    let mut map: HashMap<String, String> = HashMap::new();
    let mut n_rows = 0usize;
    for record in reader.records() {
        let record = record?;
        let line = record.position().map(|p| p.line()).unwrap_or(0);
        if record.iter().all(|f| f.is_empty()) {
            continue;
        }
        let sample = record.get(sample_col).unwrap_or("").to_string();
        if sample.is_empty() {
            return Err(InputError::Parse(format!(
                "metadata line {line}: empty sample id"
            )));
        }
        let group = record.get(group_col).unwrap_or("").to_string();
        if map.contains_key(&sample) {
            return Err(InputError::InvalidInput(format!(
                "metadata line {line}: duplicate sample id {sample}"
            )));
        }
        map.insert(sample, group);
        n_rows += 1;
    }

    let mut samples = Vec::with_capacity(sample_order.len());
    let mut groups = Vec::with_capacity(sample_order.len());
    let mut conditions = Vec::with_capacity(sample_order.len());
    for sample in sample_order {
        let group = map.get(sample).ok_or_else(|| {
            InputError::InvalidInput(format!("sample {sample} has no metadata row"))
        })?;
        let condition = Condition::from_group(group, &columns.healthy_label).ok_or_else(|| {
            InputError::InvalidInput(format!("sample {sample} has an empty group value"))
        })?;
        samples.push(sample.clone());
        groups.push(group.clone());
        conditions.push(condition);
    }

    if n_rows != sample_order.len() {
        return Err(InputError::InvalidInput(format!(
            "metadata has {} rows but the count matrix has {} samples",
            n_rows,
            sample_order.len()
        )));
    }

    Ok(SampleSheet {
        samples,
        groups,
        conditions,
    })
}

fn find_column(header: &[String], wanted: &str) -> Option<usize> {
    if let Some(idx) = header.iter().position(|h| h == wanted) {
        return Some(idx);
    }
    let wanted = wanted.trim().to_ascii_lowercase();
    header
        .iter()
        .position(|h| h.trim().to_ascii_lowercase() == wanted)
}
