use std::collections::HashSet;
use std::path::Path;

use ndarray::Array2;

use crate::input::InputError;
use crate::input::reader::csv_reader;

/// Dense genes x samples count matrix.
#[derive(Debug, Clone)]
pub struct CountMatrix {
    pub gene_id_column: String,
    pub genes: Vec<String>,
    pub samples: Vec<String>,
    pub counts: Array2<f64>,
}

impl CountMatrix {
    pub fn n_genes(&self) -> usize {
        self.genes.len()
    }

    pub fn n_samples(&self) -> usize {
        self.samples.len()
    }

    pub fn sample_totals(&self) -> Vec<f64> {
        (0..self.n_samples())
            .map(|s| self.counts.column(s).sum())
            .collect()
    }
}

pub fn parse_counts(path: &Path) -> Result<CountMatrix, InputError> {
    let mut reader = csv_reader(path)?;
    let header = reader.headers()?.clone();
    if header.len() < 2 {
        return Err(InputError::Parse(format!(
            "{}: header needs a gene id column and at least one sample",
            path.display()
        )));
    }
    let gene_id_column = header[0].to_string();
    let samples: Vec<String> = header.iter().skip(1).map(|s| s.to_string()).collect();

    let mut seen_samples = HashSet::new();
    for sample in &samples {
        if sample.is_empty() {
            return Err(InputError::Parse("empty sample id in count header".to_string()));
        }
        if !seen_samples.insert(sample.as_str()) {
            return Err(InputError::InvalidInput(format!(
                "duplicate sample id in count header: {sample}"
            )));
        }
    }

    let n_samples = samples.len();
    let mut genes = Vec::new();
    let mut seen_genes: HashSet<String> = HashSet::new();
    let mut values: Vec<f64> = Vec::new();
    let mut duplicates = 0usize;

    for record in reader.records() {
        let record = record?;
        let line = record.position().map(|p| p.line()).unwrap_or(0);
        if record.iter().all(|f| f.is_empty()) {
            continue;
        }
        if record.len() != n_samples + 1 {
            return Err(InputError::Parse(format!(
                "line {line}: expected {} fields, found {}",
                n_samples + 1,
                record.len()
            )));
        }
        let gene = record[0].to_string();
        if gene.is_empty() {
            return Err(InputError::Parse(format!("line {line}: empty gene id")));
        }
        if seen_genes.contains(&gene) {
            duplicates += 1;
            tracing::warn!(line, gene = %gene, "duplicate gene id; keeping first occurrence");
            continue;
        }
        for (col, field) in record.iter().enumerate().skip(1) {
            values.push(parse_count(field, line, &samples[col - 1])?);
        }
        seen_genes.insert(gene.clone());
        genes.push(gene);
    }

    if genes.is_empty() {
        return Err(InputError::Parse(format!(
            "{}: count matrix has no gene rows",
            path.display()
        )));
    }
    if duplicates > 0 {
        tracing::warn!(duplicates, "skipped duplicate gene rows");
    }

    let counts = Array2::from_shape_vec((genes.len(), n_samples), values)
        .map_err(|e| InputError::InvalidInput(format!("count matrix shape: {e}")))?;

    Ok(CountMatrix {
        gene_id_column,
        genes,
        samples,
        counts,
    })
}

fn parse_count(field: &str, line: u64, sample: &str) -> Result<f64, InputError> {
    let value: f64 = field.parse().map_err(|_| {
        InputError::Parse(format!(
            "line {line}, sample {sample}: count '{field}' is not a number"
        ))
    })?;
    if !value.is_finite() || value < 0.0 {
        return Err(InputError::Parse(format!(
            "line {line}, sample {sample}: count {field} must be a non-negative integer"
        )));
    }
    if value.fract() != 0.0 {
        return Err(InputError::Parse(format!(
            "line {line}, sample {sample}: count {field} is not integral"
        )));
    }
    Ok(value)
}
