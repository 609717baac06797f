// Readers for the label tables of the dropdown fields.

use std::collections::BTreeMap;
use std::io::Read;

use serde_yaml::Value as YValue;
use transcription_consensus::LabelTable;

use crate::reconcile::*;

/// The option code of a label key, for example `a1f` in
/// `T1.selects.0.options.*.a1f.label`.
fn option_code(key: &str) -> Option<&str> {
    let (prefix, code) = key.strip_suffix(".label")?.rsplit_once('.')?;
    if prefix.starts_with('T') && prefix.contains(".selects.") && prefix.ends_with(".options.*") {
        Some(code)
    } else {
        None
    }
}

/// Reads a label table. Keys that are not dropdown options are skipped.
///
/// Each option maps to a single-entry map whose value is the label.
pub fn read_label_table<R: Read>(rdr: R, source: &str) -> ReconcileResult<LabelTable> {
    let entries: BTreeMap<String, YValue> =
        serde_yaml::from_reader(rdr).context(ParsingYamlSnafu { path: source })?;
    let mut table = LabelTable::new();
    for (key, value) in entries.iter() {
        let code = match option_code(key) {
            Some(code) => code,
            None => {
                debug!("read_label_table: {}: skipping {:?}", source, key);
                continue;
            }
        };
        let label = match value {
            YValue::String(s) => s.clone(),
            YValue::Mapping(m) if m.len() == 1 => match m.iter().next().map(|(_, v)| v) {
                Some(YValue::String(s)) => s.clone(),
                x => {
                    return BadLabelsSnafu {
                        path: source,
                        detail: format!("{}: expected a label, found {:?}", key, x),
                    }
                    .fail()
                }
            },
            x => {
                return BadLabelsSnafu {
                    path: source,
                    detail: format!("{}: expected a single label, found {:?}", key, x),
                }
                .fail()
            }
        };
        table.insert(code.to_string(), label);
    }
    if table.is_empty() {
        warn!("read_label_table: {}: no dropdown option found", source);
    }
    Ok(table)
}

/// Applies the label rewrites to a table.
pub fn apply_fixups(table: &mut LabelTable, fixups: &BTreeMap<String, String>, source: &str) {
    for (from, to) in fixups.iter() {
        let n = table.rewrite(from, to);
        if n > 0 {
            debug!(
                "apply_fixups: {}: {:?} -> {:?} ({} labels)",
                source, from, to, n
            );
        }
    }
}
