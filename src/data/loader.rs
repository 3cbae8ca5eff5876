use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use anyhow::{Context, Result, bail};
use log::info;
use serde::{Deserialize, Serialize};

use super::attribute::{Attribute, AttributeKind, DEFAULT_DATE_FORMAT, Value};
use super::date_pattern::java_to_strftime;
use super::model::{AttributeSpec, Dataset};

// ---------------------------------------------------------------------------
// File kinds
// ---------------------------------------------------------------------------

/// The on-disk formats a dataset can be loaded from and saved to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileKind {
    Arff,
    Csv,
    Json,
    C45,
}

impl FileKind {
    /// Infer the kind from a file extension. C4.5 accepts `.names` and `.data`.
    pub fn from_path(path: &Path) -> Result<Self> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("")
            .to_ascii_lowercase();
        match ext.as_str() {
            "arff" => Ok(FileKind::Arff),
            "csv" => Ok(FileKind::Csv),
            "json" => Ok(FileKind::Json),
            "names" | "data" => Ok(FileKind::C45),
            other => bail!("Unsupported file extension: .{other}"),
        }
    }

    pub fn extension(self) -> &'static str {
        match self {
            FileKind::Arff => "arff",
            FileKind::Csv => "csv",
            FileKind::Json => "json",
            FileKind::C45 => "names",
        }
    }
}

impl FromStr for FileKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "arff" => Ok(FileKind::Arff),
            "csv" => Ok(FileKind::Csv),
            "json" => Ok(FileKind::Json),
            "c45" | "c4.5" => Ok(FileKind::C45),
            other => bail!("Unknown file kind '{other}'"),
        }
    }
}

impl fmt::Display for FileKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FileKind::Arff => "arff",
            FileKind::Csv => "csv",
            FileKind::Json => "json",
            FileKind::C45 => "c45",
        };
        f.write_str(name)
    }
}

// ---------------------------------------------------------------------------
// Public entry-points
// ---------------------------------------------------------------------------

/// Load a dataset, dispatching on the file extension.
pub fn load_file(path: &Path) -> Result<Dataset> {
    load(FileKind::from_path(path)?, path)
}

/// Load a dataset of the given kind.
///
/// For C4.5, `path` may name either the `.names` or the `.data` file; the
/// sibling is read from the same directory.
pub fn load(kind: FileKind, path: &Path) -> Result<Dataset> {
    let dataset = match kind {
        FileKind::Arff => load_arff(path),
        FileKind::Csv => load_csv(path, &CsvOptions::default()),
        FileKind::Json => load_json(path),
        FileKind::C45 => load_c45(path),
    }
    .with_context(|| format!("loading {kind} file {}", path.display()))?;

    info!(
        "loaded '{}' from {}: {} attributes, {} instances",
        dataset.relation_name(),
        path.display(),
        dataset.num_attributes(),
        dataset.len()
    );
    Ok(dataset)
}

fn relation_from_path(path: &Path) -> String {
    path.file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or(Dataset::DEFAULT_RELATION)
        .to_string()
}

/// `?` (and the empty cell for CSV) mark missing values.
fn external(token: &str, missing: &[String]) -> Value {
    if missing.iter().any(|m| m == token) {
        Value::Missing
    } else {
        Value::Text(token.to_string())
    }
}

// ---------------------------------------------------------------------------
// JSON loader
// ---------------------------------------------------------------------------

/// On-disk JSON layout:
///
/// ```json
/// {
///   "relation": "weather",
///   "attributes": [
///     {"name": "age", "type": "numeric"},
///     {"name": "label", "type": "nominal", "values": ["yes", "no"], "class_attribute": true}
///   ],
///   "instances": [
///     {"weight": 1.0, "values": [42, "no"]}
///   ]
/// }
/// ```
#[derive(Debug, Serialize, Deserialize)]
pub(crate) struct JsonDataset {
    pub relation: String,
    pub attributes: Vec<AttributeSpec>,
    pub instances: Vec<JsonInstance>,
}

#[derive(Debug, Serialize, Deserialize)]
pub(crate) struct JsonInstance {
    #[serde(default = "default_weight")]
    pub weight: f64,
    pub values: Vec<Value>,
}

fn default_weight() -> f64 {
    1.0
}

fn load_json(path: &Path) -> Result<Dataset> {
    let text = std::fs::read_to_string(path).context("reading JSON file")?;
    let root: JsonDataset = serde_json::from_str(&text).context("parsing JSON")?;

    let mut dataset = Dataset::new(root.relation);
    dataset.add_attributes(root.attributes)?;
    for (i, inst) in root.instances.into_iter().enumerate() {
        dataset
            .add_instance(inst.values, inst.weight)
            .with_context(|| format!("Row {i}"))?;
    }
    Ok(dataset)
}

// ---------------------------------------------------------------------------
// CSV loader
// ---------------------------------------------------------------------------

/// How CSV columns are typed on load.
///
/// A column is numeric when every non-missing cell parses as a number,
/// string when listed in `strings`, and nominal otherwise with labels in
/// order of first appearance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CsvOptions {
    pub delimiter: u8,
    /// Cell contents read as missing values.
    pub missing: Vec<String>,
    /// Columns to load as string attributes.
    pub strings: Vec<String>,
    /// Column to designate as the class attribute.
    pub class_attribute: Option<String>,
}

impl Default for CsvOptions {
    fn default() -> Self {
        Self {
            delimiter: b',',
            missing: vec![String::new(), "?".to_string()],
            strings: Vec::new(),
            class_attribute: None,
        }
    }
}

pub fn load_csv(path: &Path, options: &CsvOptions) -> Result<Dataset> {
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(options.delimiter)
        .from_path(path)
        .context("opening CSV")?;
    let headers: Vec<String> = reader
        .headers()
        .context("reading CSV headers")?
        .iter()
        .map(|h| h.trim().to_string())
        .collect();

    let mut rows: Vec<Vec<String>> = Vec::new();
    for (row_no, result) in reader.records().enumerate() {
        let record = result.with_context(|| format!("CSV row {row_no}"))?;
        if record.len() != headers.len() {
            bail!(
                "CSV row {row_no}: {} cells but {} columns",
                record.len(),
                headers.len()
            );
        }
        rows.push(record.iter().map(|c| c.trim().to_string()).collect());
    }

    let mut dataset = Dataset::new(relation_from_path(path));
    for (col, name) in headers.iter().enumerate() {
        let cells = rows
            .iter()
            .map(|r| r[col].as_str())
            .filter(|c| !options.missing.iter().any(|m| m == c));
        let kind = if options.strings.iter().any(|s| s == name) {
            AttributeKind::String
        } else {
            guess_kind(cells)
        };
        dataset.add_attribute(Attribute::new(name.clone(), kind)?)?;
    }

    for (row_no, row) in rows.iter().enumerate() {
        let values: Vec<Value> = row.iter().map(|c| external(c, &options.missing)).collect();
        dataset
            .add_instance(values, 1.0)
            .with_context(|| format!("CSV row {row_no}"))?;
    }

    if let Some(class) = &options.class_attribute {
        dataset.set_class_attribute(Some(class))?;
    }
    Ok(dataset)
}

fn guess_kind<'a>(cells: impl Iterator<Item = &'a str> + Clone) -> AttributeKind {
    if cells.clone().all(|c| c.parse::<f64>().is_ok_and(|v| !v.is_nan())) {
        return AttributeKind::Numeric;
    }
    let mut labels: Vec<String> = Vec::new();
    for c in cells {
        if !labels.iter().any(|l| l == c) {
            labels.push(c.to_string());
        }
    }
    if labels.is_empty() {
        return AttributeKind::Numeric;
    }
    AttributeKind::Nominal { values: labels }
}

// ---------------------------------------------------------------------------
// ARFF loader
// ---------------------------------------------------------------------------

/// Dense ARFF: `@relation`, `@attribute` lines, `@data` with comma-separated
/// rows. `?` is missing and an optional trailing `{w}` token is the weight.
fn load_arff(path: &Path) -> Result<Dataset> {
    let text = std::fs::read_to_string(path).context("reading ARFF file")?;
    parse_arff(&text, &relation_from_path(path))
}

pub(crate) fn parse_arff(text: &str, fallback_relation: &str) -> Result<Dataset> {
    let mut dataset = Dataset::new(fallback_relation);
    let mut in_data = false;
    let missing = ["?".to_string()];

    for (line_no, raw) in text.lines().enumerate() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with('%') {
            continue;
        }
        let line_no = line_no + 1;

        if in_data {
            if line.starts_with('{') {
                bail!("line {line_no}: sparse ARFF rows are not supported");
            }
            let mut tokens = split_tokens(line, ',')
                .with_context(|| format!("line {line_no}"))?;
            let mut weight = 1.0;
            if let Some(last) = tokens.last() {
                if !last.quoted && last.text.starts_with('{') && last.text.ends_with('}') {
                    let w = &last.text[1..last.text.len() - 1];
                    weight = w
                        .trim()
                        .parse::<f64>()
                        .with_context(|| format!("line {line_no}: bad weight '{w}'"))?;
                    tokens.pop();
                }
            }
            let values: Vec<Value> = tokens
                .iter()
                .map(|t| {
                    if t.quoted {
                        Value::Text(t.text.clone())
                    } else {
                        external(&t.text, &missing)
                    }
                })
                .collect();
            dataset
                .add_instance(values, weight)
                .with_context(|| format!("line {line_no}"))?;
            continue;
        }

        let (keyword, rest) = split_keyword(line);
        match keyword.to_ascii_lowercase().as_str() {
            "@relation" => {
                let (name, _) = first_token(rest).with_context(|| format!("line {line_no}"))?;
                dataset.set_relation_name(name);
            }
            "@attribute" => {
                let (name, kind) = first_token(rest).with_context(|| format!("line {line_no}"))?;
                let kind = parse_arff_kind(kind.trim())
                    .with_context(|| format!("line {line_no}: attribute '{name}'"))?;
                dataset.add_attribute(Attribute::new(name, kind)?)?;
            }
            "@data" => in_data = true,
            other => bail!("line {line_no}: unexpected '{other}'"),
        }
    }
    Ok(dataset)
}

fn parse_arff_kind(decl: &str) -> Result<AttributeKind> {
    if let Some(inner) = decl.strip_prefix('{') {
        let inner = inner
            .strip_suffix('}')
            .context("unterminated nominal value list")?;
        let values = split_tokens(inner, ',')?
            .into_iter()
            .map(|t| t.text)
            .collect();
        return Ok(AttributeKind::Nominal { values });
    }
    let (keyword, rest) = split_keyword(decl);
    match keyword.to_ascii_lowercase().as_str() {
        "numeric" | "real" | "integer" => Ok(AttributeKind::Numeric),
        "string" => Ok(AttributeKind::String),
        "date" => {
            let format = if rest.trim().is_empty() {
                DEFAULT_DATE_FORMAT.to_string()
            } else {
                let (pattern, _) = first_token(rest)?;
                java_to_strftime(&pattern)?
            };
            Ok(AttributeKind::Date { format })
        }
        other => bail!("unsupported attribute type '{other}'"),
    }
}

fn split_keyword(line: &str) -> (&str, &str) {
    match line.find(char::is_whitespace) {
        Some(i) => (&line[..i], line[i..].trim_start()),
        None => (line, ""),
    }
}

#[derive(Debug, Clone, PartialEq)]
struct Token {
    text: String,
    quoted: bool,
}

/// First whitespace-delimited (or quoted) token and the remainder.
fn first_token(s: &str) -> Result<(String, &str)> {
    let s = s.trim_start();
    let Some(open) = s.chars().next() else {
        bail!("missing name");
    };
    if open == '\'' || open == '"' {
        let mut text = String::new();
        let mut escaped = false;
        for (i, c) in s.char_indices().skip(1) {
            if escaped {
                text.push(c);
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == open {
                return Ok((text, &s[i + c.len_utf8()..]));
            } else {
                text.push(c);
            }
        }
        bail!("unterminated quote in '{s}'");
    }
    let (name, rest) = split_keyword(s);
    Ok((name.to_string(), rest))
}

/// Split on `sep`, honouring single/double quotes and backslash escapes.
fn split_tokens(line: &str, sep: char) -> Result<Vec<Token>> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut quote: Option<char> = None;
    let mut quoted = false;
    let mut escaped = false;

    for c in line.chars() {
        if escaped {
            current.push(c);
            escaped = false;
            continue;
        }
        match quote {
            Some(q) if c == q => quote = None,
            Some(_) if c == '\\' => escaped = true,
            Some(_) => current.push(c),
            None if c == sep => {
                tokens.push(finish_token(&mut current, &mut quoted));
            }
            // whitespace between a closing quote and the separator
            None if quoted && c.is_whitespace() => {}
            None if c == '\'' || c == '"' => {
                quote = Some(c);
                quoted = true;
                current.clear();
            }
            None => current.push(c),
        }
    }
    if quote.is_some() {
        bail!("unterminated quote in '{line}'");
    }
    tokens.push(finish_token(&mut current, &mut quoted));
    Ok(tokens)
}

fn finish_token(current: &mut String, quoted: &mut bool) -> Token {
    let text = if *quoted {
        std::mem::take(current)
    } else {
        let t = current.trim().to_string();
        current.clear();
        t
    };
    let token = Token {
        text,
        quoted: *quoted,
    };
    *quoted = false;
    token
}

// ---------------------------------------------------------------------------
// C4.5 loader
// ---------------------------------------------------------------------------

/// Paths of the `.names` / `.data` pair sharing `path`'s stem.
pub(crate) fn c45_pair(path: &Path) -> (PathBuf, PathBuf) {
    (path.with_extension("names"), path.with_extension("data"))
}

/// `.names`: first statement lists the class labels, then one
/// `name: continuous.` or `name: a, b, c.` line per attribute. `|` starts a
/// comment. The class is the last column of `.data`.
fn load_c45(path: &Path) -> Result<Dataset> {
    let (names_path, data_path) = c45_pair(path);
    let names = std::fs::read_to_string(&names_path)
        .with_context(|| format!("reading {}", names_path.display()))?;
    let data = std::fs::read_to_string(&data_path)
        .with_context(|| format!("reading {}", data_path.display()))?;

    let mut dataset = Dataset::new(relation_from_path(path));
    let mut class_labels: Option<Vec<String>> = None;

    for (line_no, raw) in names.lines().enumerate() {
        let line = strip_c45_line(raw);
        if line.is_empty() {
            continue;
        }
        if class_labels.is_none() {
            class_labels = Some(c45_labels(line)?);
            continue;
        }
        let (name, decl) = line
            .split_once(':')
            .with_context(|| format!("{}:{}: expected 'name: type.'", names_path.display(), line_no + 1))?;
        let decl = decl.trim();
        let kind = if decl.eq_ignore_ascii_case("continuous") {
            AttributeKind::Numeric
        } else {
            AttributeKind::Nominal {
                values: c45_labels(decl)?,
            }
        };
        dataset.add_attribute(Attribute::new(name.trim(), kind)?)?;
    }

    let labels = class_labels.context("C4.5 names file declares no class labels")?;
    dataset.nominal("class", &labels, true)?;

    let missing = ["?".to_string()];
    for (line_no, raw) in data.lines().enumerate() {
        let line = strip_c45_line(raw);
        if line.is_empty() {
            continue;
        }
        let values: Vec<Value> = line
            .split(',')
            .map(|cell| external(cell.trim(), &missing))
            .collect();
        dataset
            .add_instance(values, 1.0)
            .with_context(|| format!("{}:{}", data_path.display(), line_no + 1))?;
    }
    Ok(dataset)
}

/// Drop `|` comments and a statement-terminating period.
/// Drops the `|` comment and the period ending the statement. A period
/// after a number also ends the statement: `70.` reads as `70`.
fn strip_c45_line(raw: &str) -> &str {
    let line = raw.split('|').next().unwrap_or("").trim();
    line.strip_suffix('.').map_or(line, str::trim_end)
}

fn c45_labels(list: &str) -> Result<Vec<String>> {
    let labels: Vec<String> = list
        .split(',')
        .map(|l| l.trim().to_string())
        .filter(|l| !l.is_empty())
        .collect();
    if labels.is_empty() {
        bail!("empty value list '{list}'");
    }
    Ok(labels)
}
