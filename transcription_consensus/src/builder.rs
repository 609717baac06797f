use std::collections::BTreeMap;

use crate::assembly::*;
pub use crate::config::*;
use crate::fields::*;

/// A builder for resolving the cells of a workflow, field by field, and joining
/// them into a table.
///
/// Each cell is resolved as soon as it is added, so the candidates do not need
/// to be kept in memory.
///
/// ```
/// use std::collections::BTreeMap;
/// use transcription_consensus::builder::TableBuilder;
/// use transcription_consensus::*;
/// # use transcription_consensus::ConsensusError;
///
/// let mut builder = TableBuilder::new(&ResolutionRules::DEFAULT_RULES)
///     .field(FieldSpec::new("age", FieldKind::Number))?;
///
/// builder.add_candidates(
///     "age",
///     CellKey::new(17, 0),
///     &Candidates::Aligned(AlignedCandidates {
///         aligned: vec![vec!["3".to_string(), "3".to_string(), "4".to_string()]],
///         number_views: Some(3),
///         ..AlignedCandidates::default()
///     }),
/// )?;
///
/// let pages = BTreeMap::from([(
///     17,
///     PageInfo { volume: 1, page: 4, location: "v1_0025.jpg".to_string() },
/// )]);
/// let rules = AssemblyRules { rows_per_page: 1, ..AssemblyRules::default() };
/// let table = builder.assemble(&pages, &rules, None)?;
/// assert_eq!(table.rows[0].rendered_values(), vec!["3".to_string()]);
/// assert_eq!(table.rows[0].autoresolved_text(), "age");
///
/// # Ok::<(), ConsensusError>(())
/// ```
pub struct TableBuilder {
    pub(crate) _rules: ResolutionRules,
    pub(crate) _fields: Vec<FieldSpec>,
    pub(crate) _columns: Vec<FieldColumn>,
}

impl TableBuilder {
    pub fn new(rules: &ResolutionRules) -> TableBuilder {
        TableBuilder {
            _rules: rules.clone(),
            _fields: Vec::new(),
            _columns: Vec::new(),
        }
    }

    /// Registers a field. Columns are written in the order of registration.
    pub fn field(mut self, spec: FieldSpec) -> Result<TableBuilder, ConsensusError> {
        if self._fields.iter().any(|f| f.name == spec.name) {
            return Err(ConsensusError::DuplicateField(spec.name));
        }
        self._columns.push(FieldColumn::new(&spec.name));
        self._fields.push(spec);
        Ok(self)
    }

    pub fn fields(&self) -> &[FieldSpec] {
        &self._fields
    }

    /// Resolves the candidates of one cell of a registered field.
    ///
    /// A cell added twice keeps the last resolution.
    pub fn add_candidates(
        &mut self,
        field: &str,
        key: CellKey,
        candidates: &Candidates,
    ) -> Result<CellResolution, ConsensusError> {
        let idx = self
            ._fields
            .iter()
            .position(|f| f.name == field)
            .ok_or_else(|| ConsensusError::UnknownField(field.to_string()))?;
        let res = resolve_cell(&self._fields[idx], key, candidates, &self._rules)?;
        self._columns[idx].cells.insert(key, res.clone());
        Ok(res)
    }

    /// Joins the columns. See [assemble].
    pub fn assemble(
        &self,
        pages: &BTreeMap<u64, PageInfo>,
        rules: &AssemblyRules,
        previous: Option<&ViewsLedger>,
    ) -> Result<AssembledTable, ConsensusError> {
        assemble(&self._columns, pages, rules, previous)
    }
}
