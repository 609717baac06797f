/*!

This is the long-form manual for `transcription_consensus` and `reconcile`.

## Cells and candidates

A *subject* is one scanned page. Each subject is split into *tasks*, one per
logical row of the ledger (25 by default). A *cell* is a task of a subject in one
field. Every volunteer who looks at a task produces a *view* of each of its cells.

The reducer upstream of this crate groups the views of each cell:
* text-like fields (`text`, `number`, `date`, `compoundNumber`) come as aligned
  transcriptions: one group per aligned position, holding one entry per view, plus
  the number of views and, for free text, a consensus score and text;
* `dropdown` fields come as one group of option codes with their number of votes.
  An abstention is recorded under the code `None`.

## Outcomes

Every cell resolves to one of:
* *blank*: no view, or only empty views;
* *resolved*: a value was accepted. It is *autoresolved* when the support was not
  unanimous;
* *unresolved*: the candidates are kept for manual review.

An unresolved cell is written as a best guess (or `<No best guess>`), a line of ten
dashes, and one line per distinct candidate with its count:

```text
John Smith
----------
John Smith @2
Jon Smith @1
```

## Rules per kind of field

### Voting

A vote over categories visits the categories in the order in which they were
first seen. A category that holds all the votes wins unanimously. Otherwise the
first category holding at least the vote threshold (by default 0.66) of the votes
wins, and the cell is autoresolved. If no category reaches the threshold, the cell
is unresolved. The threshold is inclusive: with a threshold of 0.5, a vote of 1
against 1 is won by the first category.

### `text`

The text is accepted when `consensus score / number of views` reaches the text
threshold (by default 0.66). The consensus text becomes the value, and the cell is
autoresolved unless the score equals the number of views.

### `number`

The views must form one group. Each view must read as a whole number (`3` and
`3.0` agree) that fits in a signed 64-bit integer. The numbers are then voted on.

### `date`

The views must form one group. Each view must look like `day-month-year`, with `-`,
`/`, `.` or a space between the components. A zero in any component always sends
the cell to review: it is the mark of a damaged source. Years are written in full.
Dates are voted on as calendar days and written like `Apr 01 1800`.

### `compoundNumber`

Two numbers separated by a delimiter (by default `;`), such as years at sea in two
fleets. Each view must have exactly two finite numbers. The two parts are voted on
independently and the cell is resolved only if both are. It is autoresolved if
either vote was not unanimous.

### `dropdown`

The vote is on the option codes, and the winner is decoded after the vote. A field
may list one label table per version of the workflow: the code must decode to the
same label in every table where it appears. An abstention that wins leaves the cell
blank.

### Uncertainty check

When enabled, a cell is sent to review before the vote if any of its views
contains:
* text in brackets: `[illegible]`
* a question mark in parentheses: `Smith (?)`
* two question marks or more: `Sm??h`
* a leading letter followed by a period: `J. Smith`

## Rows and pages

The fields are joined into one row per task. The `Problems` column lists:
* `Blank(s)` when a field has no value;
* `N unresolved` for the fields sent to review;
* `Transcriptionism in <field>` when a resolved value still contains brackets,
  braces, a double period or a question mark, or else `Zero in <field>` when a
  resolved value is only zeros in a field that does not allow zero.

The `Autoresolved` column lists the fields that were autoresolved.

A row is complete when every field has at least the retirement count of views (by
default 3). A page is complete when it has all its rows, all complete. Unfinished
pages are left out of the output unless requested, and do not count in the
summary.

An *exemption* declares that a field does not exist on the pages of a volume: any
value found there is cleared and the field is listed as autoresolved, and the field
counts neither for blanks nor for completeness.

The *views ledger* records the views and completeness of every row. Given the ledger
of a previous run, rows that were already complete stay complete.

## Configuration file

`reconcile` reads a JSON configuration. Paths are relative to the configuration
file.

```json
{
  "subjects": "subjects.csv",
  "reductionDir": "reductions",
  "fields": [
    { "name": "name", "kind": "text", "reduction": "text_reducer_name.csv" },
    { "name": "age", "kind": "number", "reduction": "text_reducer_age.csv" },
    {
      "name": "how disposed",
      "kind": "dropdown",
      "reduction": "dropdown_reducer_disposed.csv",
      "labels": ["labels_V1.1.yaml", "labels_V2.3.yaml"]
    }
  ],
  "rules": {
    "textThreshold": 0.66,
    "voteThreshold": 0.66,
    "uncertaintyCheck": false,
    "compoundDelimiter": ";"
  },
  "outputSettings": {
    "retirementCount": 3,
    "rowsPerPage": 25,
    "includeUnfinished": false,
    "transcriptionismCheck": true,
    "zeroAllowed": ["days victualled"],
    "outputFile": "reconciled.csv"
  },
  "exemptions": [{ "field": "port sailed out of", "volume": 1 }],
  "labelFixups": { "To a Ship Cured": "To a/his Ship Cured" }
}
```

### Reduction tables

CSV files with the columns `subject_id`, `task` (`T0`, `T1`, ...) and:
* for text-like fields: `data.aligned_text` (for example `[['3', '3', '4']]`),
  `data.number_views`, `data.consensus_score`, `data.consensus_text`;
* for dropdown fields: `data.value` (for example `[{'a1f': 2, 'None': 1}]`).

### Subjects

A CSV file with the columns `subject_id`, `volume`, `page`, `location`.

### Label tables

YAML files mapping `T<n>.selects.<n>.options.*.<code>.label` to a single-entry map
whose value is the label.

### Outputs

The reconciled table has the columns `subject_id`, `task`, `volume`, `page`,
`location`, one column per field in the order of the configuration, then
`Autoresolved` and `Problems`. Rows are ordered by volume, page, subject and task.
`--out` overrides `outputFile`; the table goes to the standard output when neither
is given.

The views ledger (`--views-out`, read back with `--views`) has the columns
`subject_id`, `task`, one column of views per field, and `complete`.

`--summary` writes the counts of the run in JSON. `--reference` compares the table
with an expected table and fails on any difference.

*/
