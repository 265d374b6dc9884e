use crate::error::{Error, Result};
use crate::table::{offsets_of, TablePotential};
use crate::variable::{Catalog, Variable};
use csv_core::{ReadFieldResult, ReaderBuilder};
use lasso::{Rodeo, Spur};
use log::debug;
use std::io;
use std::str;

/// Observed cases over a catalog of variables, each case giving a state for every variable and
/// carrying a weight (how many times it was observed).
#[derive(Clone, Debug, Default)]
pub struct Dataset {
    catalog: Catalog,
    cases: Vec<usize>,
    weights: Vec<f64>,
}

impl Dataset {
    /// Creates a dataset with no cases over the variables of `catalog`.
    pub fn new(catalog: Catalog) -> Self {
        Dataset {
            catalog,
            cases: Vec::new(),
            weights: Vec::new(),
        }
    }

    /// Reads tab-separated cases.
    ///
    /// The first record names the variables. Every later record gives a state label per variable,
    /// optionally preceded by an extra field holding the number of times the case was observed.
    /// States are numbered in order of first appearance in each column. Cases with a count of
    /// zero or less are skipped.
    ///
    /// ```
    /// use potential_inference::Dataset;
    ///
    /// let input = "rain\twet\n3\tyes\tyes\nno\tno\n1\tno\tyes\n";
    /// let data = Dataset::read_tsv(input.as_bytes()).unwrap();
    /// let rain = data.catalog().variable("rain").unwrap();
    /// assert_eq!(data.catalog().states(rain), &["yes", "no"]);
    /// assert_eq!(data.len(), 3);
    /// assert_eq!(data.sample_size(), 5.0);
    /// ```
    pub fn read_tsv<I: io::Read>(mut input: I) -> Result<Dataset> {
        let mut inputbuf = [0; 16384];
        let mut fieldbuf = [0; 1024];
        let mut fieldlen = 0;
        let mut record: Vec<Spur> = Vec::new();
        let mut header: Option<Vec<Spur>> = None;
        let mut rows: Vec<(Vec<Spur>, f64)> = Vec::new();
        let mut labels = Rodeo::new();
        let mut tsv = ReaderBuilder::new().delimiter(b'\t').build();

        'read: loop {
            let read = input.read(&mut inputbuf)?;
            let mut bytes = &inputbuf[..read];
            loop {
                let (result, nin, nout) = tsv.read_field(bytes, &mut fieldbuf[fieldlen..]);
                bytes = &bytes[nin..];
                fieldlen += nout;
                match result {
                    ReadFieldResult::InputEmpty => break,
                    ReadFieldResult::OutputFull => {
                        return Err(Error::Dataset {
                            line: tsv.line(),
                            message: "field too long".to_owned(),
                        });
                    }
                    ReadFieldResult::Field { record_end } => {
                        let field =
                            str::from_utf8(&fieldbuf[..fieldlen]).map_err(|e| Error::Dataset {
                                line: tsv.line(),
                                message: e.to_string(),
                            })?;
                        fieldlen = 0;
                        record.push(labels.get_or_intern(field));

                        if record_end {
                            let fields = std::mem::take(&mut record);
                            match header.as_ref().map(Vec::len) {
                                None => header = Some(fields),
                                Some(width) => {
                                    // `line` has already moved past the record's terminator.
                                    let line = tsv.line().saturating_sub(1).max(1);
                                    if let Some(row) = parse_row(&labels, width, fields, line)? {
                                        rows.push(row);
                                    }
                                }
                            }
                        }
                    }
                    ReadFieldResult::End => break 'read,
                }
            }
        }

        let names = header.unwrap_or_default();
        let mut catalog = Catalog::new();
        let mut state_labels: Vec<Vec<Spur>> = vec![Vec::new(); names.len()];
        for (fields, _) in rows.iter() {
            for (column, label) in fields.iter().enumerate() {
                if !state_labels[column].contains(label) {
                    state_labels[column].push(*label);
                }
            }
        }
        for (name, states) in names.iter().zip(state_labels.iter()) {
            let states: Vec<&str> = states.iter().map(|s| labels.resolve(s)).collect();
            catalog.add_variable(labels.resolve(name), &states)?;
        }

        let mut dataset = Dataset::new(catalog);
        for (fields, weight) in rows {
            let case: Vec<usize> = fields
                .iter()
                .zip(state_labels.iter())
                .map(|(label, states)| states.iter().position(|s| s == label).unwrap_or(0))
                .collect();
            dataset.add_case(&case, weight)?;
        }
        debug!(
            "read {} distinct cases over {} variables, sample size {}",
            dataset.len(),
            dataset.catalog.len(),
            dataset.sample_size()
        );
        Ok(dataset)
    }

    /// The variables and their states.
    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    /// Adds a case: one state index per variable in id order, seen `weight` times.
    pub fn add_case(&mut self, states: &[usize], weight: f64) -> Result<()> {
        if states.len() != self.catalog.len() {
            return Err(Error::InvalidParameter(format!(
                "a case needs {} states, got {}",
                self.catalog.len(),
                states.len()
            )));
        }
        for (variable, state) in self.catalog.iter().zip(states) {
            variable.check_state(*state)?;
        }
        self.cases.extend_from_slice(states);
        self.weights.push(weight);
        Ok(())
    }

    /// Number of cases (not counting weights).
    pub fn len(&self) -> usize {
        self.weights.len()
    }

    /// Returns `true` if there are no cases.
    pub fn is_empty(&self) -> bool {
        self.weights.is_empty()
    }

    /// Total weight of every case.
    pub fn sample_size(&self) -> f64 {
        self.weights.iter().sum()
    }

    /// Every case with its weight.
    pub fn cases(&self) -> impl Iterator<Item = (&[usize], f64)> + '_ {
        let width = self.catalog.len().max(1);
        self.cases
            .chunks(width)
            .zip(self.weights.iter().copied())
    }

    /// The total weight of the cases in each configuration of `scope`.
    ///
    /// ```
    /// use potential_inference::Dataset;
    ///
    /// let input = "a\tb\n2\tx\tx\n1\ty\tx\n4\ty\ty\n";
    /// let data = Dataset::read_tsv(input.as_bytes()).unwrap();
    /// let a = data.catalog().variable("a").unwrap();
    /// let b = data.catalog().variable("b").unwrap();
    /// assert_eq!(data.frequencies(&[b, a]).unwrap().values(), &[2., 0., 1., 4.]);
    /// assert_eq!(data.frequencies(&[]).unwrap().values(), &[7.]);
    /// ```
    pub fn frequencies(&self, scope: &[Variable]) -> Result<TablePotential> {
        for variable in scope {
            if !self.catalog.contains(*variable) {
                return Err(Error::UnknownVariable(format!("{:?}", variable)));
            }
        }
        let (offsets, size) = offsets_of(scope);
        let mut table = TablePotential::new(scope, vec![0.0; size])?;
        for (case, weight) in self.cases() {
            let index: usize = scope
                .iter()
                .zip(offsets.iter())
                .map(|(variable, offset)| offset * case[variable.id()])
                .sum();
            table.values_mut()[index] += weight;
        }
        Ok(table)
    }
}

/// Splits off the optional leading count. Returns `None` for cases that should be skipped.
fn parse_row(
    labels: &Rodeo,
    width: usize,
    mut fields: Vec<Spur>,
    line: u64,
) -> Result<Option<(Vec<Spur>, f64)>> {
    if fields.len() == 1 && width != 1 && labels.resolve(&fields[0]).is_empty() {
        // Blank line.
        return Ok(None);
    }
    let count = if fields.len() == width + 1 {
        let count = fields.remove(0);
        labels
            .resolve(&count)
            .trim()
            .parse::<f64>()
            .map_err(|e| Error::Dataset {
                line,
                message: format!("bad count: {}", e),
            })?
    } else if fields.len() == width {
        1.0
    } else {
        return Err(Error::Dataset {
            line,
            message: format!("expected {} fields, found {}", width, fields.len()),
        });
    };
    if count > 0.0 {
        Ok(Some((fields, count)))
    } else {
        Ok(None)
    }
}
