use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use anyhow::{Context, Result, bail};
use log::{info, warn};

use super::attribute::{AttributeKind, Value, format_number};
use super::date_pattern::strftime_to_java;
use super::loader::{FileKind, JsonDataset, JsonInstance, c45_pair};
use super::model::{AttributeSpec, Dataset};

// ---------------------------------------------------------------------------
// Public entry-points
// ---------------------------------------------------------------------------

/// Save a dataset, dispatching on the file extension.
pub fn save_file(path: &Path, dataset: &Dataset) -> Result<()> {
    save(FileKind::from_path(path)?, path, dataset)
}

/// Save a dataset in the given format.
///
/// For C4.5 the names file is written at `path` and the rows go to a sibling
/// `.data` file, replacing any file already there.
pub fn save(kind: FileKind, path: &Path, dataset: &Dataset) -> Result<()> {
    match kind {
        FileKind::Arff => write_to(path, |w| write_arff(w, dataset)),
        FileKind::Csv => save_csv(path, dataset),
        FileKind::Json => write_to(path, |w| write_json(w, dataset)),
        FileKind::C45 => save_c45(path, dataset),
    }
    .with_context(|| format!("saving {kind} file {}", path.display()))?;

    info!(
        "saved '{}' to {}: {} instances",
        dataset.relation_name(),
        path.display(),
        dataset.len()
    );
    Ok(())
}

fn write_to(path: &Path, body: impl FnOnce(&mut BufWriter<File>) -> Result<()>) -> Result<()> {
    let file = File::create(path).with_context(|| format!("creating {}", path.display()))?;
    let mut writer = BufWriter::new(file);
    body(&mut writer)?;
    writer.flush().context("flushing output")?;
    Ok(())
}

fn external_text(value: &Value) -> String {
    match value {
        Value::Number(v) => format_number(*v),
        Value::Text(s) => s.clone(),
        Value::Missing => "?".to_string(),
    }
}

// ---------------------------------------------------------------------------
// ARFF
// ---------------------------------------------------------------------------

pub fn write_arff(w: &mut impl Write, dataset: &Dataset) -> Result<()> {
    writeln!(w, "@relation {}", quote_arff(dataset.relation_name()))?;
    writeln!(w)?;
    for attribute in dataset.iter_attributes() {
        let decl = match attribute.kind() {
            AttributeKind::Numeric => "numeric".to_string(),
            AttributeKind::String => "string".to_string(),
            AttributeKind::Nominal { values } => {
                let labels: Vec<String> = values.iter().map(|v| quote_arff(v)).collect();
                format!("{{{}}}", labels.join(","))
            }
            AttributeKind::Date { format } => {
                format!("date \"{}\"", strftime_to_java(format)?)
            }
        };
        writeln!(w, "@attribute {} {decl}", quote_arff(attribute.name()))?;
    }
    writeln!(w)?;
    writeln!(w, "@data")?;

    for instance in dataset.iter_instances() {
        let cells: Vec<String> = dataset
            .external_values(instance)
            .iter()
            .map(|v| match v {
                Value::Text(s) => quote_arff(s),
                other => external_text(other),
            })
            .collect();
        write!(w, "{}", cells.join(","))?;
        if instance.weight() != 1.0 {
            write!(w, ",{{{}}}", instance.weight())?;
        }
        writeln!(w)?;
    }
    Ok(())
}

/// Single-quote tokens the ARFF reader would otherwise split or misread.
fn quote_arff(s: &str) -> String {
    let needs_quotes = s.is_empty()
        || s == "?"
        || s.starts_with('{')
        || s.chars()
            .any(|c| c.is_whitespace() || matches!(c, ',' | '\'' | '"' | '%' | '\\'));
    if needs_quotes {
        format!("'{}'", s.replace('\\', "\\\\").replace('\'', "\\'"))
    } else {
        s.to_string()
    }
}

// ---------------------------------------------------------------------------
// CSV
// ---------------------------------------------------------------------------

fn save_csv(path: &Path, dataset: &Dataset) -> Result<()> {
    let mut writer = csv::Writer::from_path(path).context("opening CSV for writing")?;
    writer.write_record(dataset.attribute_names())?;

    let mut weighted = 0usize;
    for instance in dataset.iter_instances() {
        if instance.weight() != 1.0 {
            weighted += 1;
        }
        let cells: Vec<String> = dataset
            .external_values(instance)
            .iter()
            .map(external_text)
            .collect();
        writer.write_record(&cells)?;
    }
    if weighted > 0 {
        warn!("CSV has no weight column; dropped the weights of {weighted} instances");
    }
    writer.flush()?;
    Ok(())
}

// ---------------------------------------------------------------------------
// JSON
// ---------------------------------------------------------------------------

pub fn write_json(w: &mut impl Write, dataset: &Dataset) -> Result<()> {
    let attributes = dataset
        .iter_attributes()
        .enumerate()
        .map(|(i, a)| AttributeSpec {
            name: a.name().to_string(),
            kind: a.kind().clone(),
            class_attribute: dataset.class_index() == Some(i),
        })
        .collect();
    let instances = dataset
        .iter_instances()
        .map(|inst| JsonInstance {
            weight: inst.weight(),
            values: dataset.external_values(inst),
        })
        .collect();
    let root = JsonDataset {
        relation: dataset.relation_name().to_string(),
        attributes,
        instances,
    };
    serde_json::to_writer_pretty(&mut *w, &root).context("serialising JSON")?;
    writeln!(w)?;
    Ok(())
}

// ---------------------------------------------------------------------------
// C4.5
// ---------------------------------------------------------------------------

/// Writes `<path>` as the names file and `<stem>.data` beside it. The class
/// attribute must be nominal and is written as the last column.
fn save_c45(path: &Path, dataset: &Dataset) -> Result<()> {
    let Some(class_index) = dataset.class_index() else {
        bail!("C4.5 needs a class attribute");
    };
    let class = &dataset.attributes()[class_index];
    if !class.is_nominal() {
        bail!("C4.5 class attribute '{}' must be nominal", class.name());
    }

    let order: Vec<usize> = (0..dataset.num_attributes())
        .filter(|&i| i != class_index)
        .chain(std::iter::once(class_index))
        .collect();

    write_to(path, |w| {
        writeln!(w, "{}.", class.nominal_values().join(", "))?;
        writeln!(w)?;
        for &i in &order[..order.len() - 1] {
            let attribute = &dataset.attributes()[i];
            let decl = match attribute.kind() {
                AttributeKind::Numeric => "continuous".to_string(),
                AttributeKind::Nominal { values } => values.join(", "),
                other => bail!(
                    "C4.5 cannot represent {other} attribute '{}'",
                    attribute.name()
                ),
            };
            writeln!(w, "{}: {decl}.", attribute.name())?;
        }
        Ok(())
    })?;

    let (_, data_path) = c45_pair(path);
    write_to(&data_path, |w| {
        for instance in dataset.iter_instances() {
            let values = dataset.external_values(instance);
            let cells: Vec<String> = order.iter().map(|&i| external_text(&values[i])).collect();
            writeln!(w, "{}", cells.join(","))?;
        }
        Ok(())
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::loader::{load, parse_arff};
    use crate::row;

    fn sample() -> Dataset {
        let mut d = Dataset::new("sample set");
        d.numeric("age", false)
            .unwrap()
            .string("note", false)
            .unwrap()
            .date("seen", "%Y-%m-%d", false)
            .unwrap()
            .nominal("label", &["yes", "no"], true)
            .unwrap();
        d.add_instance(row![42, "it's, fine", "2024-01-02", "no"], 1.0)
            .unwrap();
        d.add_instance(row![None::<f64>, "?", None::<&str>, "yes"], 3.0)
            .unwrap();
        d
    }

    #[test]
    fn arff_output_reads_back() {
        let d = sample();
        let mut buf = Vec::new();
        write_arff(&mut buf, &d).unwrap();
        let text = String::from_utf8(buf).unwrap();
        assert!(text.contains("@attribute seen date \"yyyy-MM-dd\""));
        assert!(text.contains("@attribute label {yes,no}"));

        let back = parse_arff(&text, "x").unwrap();
        assert_eq!(back.relation_name(), "sample set");
        assert_eq!(back.attributes(), d.attributes());
        assert_eq!(back.len(), 2);
        assert_eq!(
            back.external_values(back.instance(0).unwrap()),
            d.external_values(d.instance(0).unwrap())
        );
        let second = back.instance(1).unwrap();
        assert_eq!(second.weight(), 3.0);
        assert!(second.is_missing(0));
        assert_eq!(
            back.attribute(1).unwrap().external_value_of(second.values()[1]).as_deref(),
            Some("?")
        );
    }

    #[test]
    fn json_keeps_class_and_weights() {
        let d = sample();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sample.json");
        save(FileKind::Json, &path, &d).unwrap();

        let back = load(FileKind::Json, &path).unwrap();
        assert_eq!(back.class_index(), Some(3));
        assert_eq!(back.sum_of_weights(), 4.0);
        assert_eq!(back.attributes(), d.attributes());
    }

    #[test]
    fn c45_writes_class_last() {
        let mut d = Dataset::new("golf");
        d.nominal("play", &["yes", "no"], true)
            .unwrap()
            .numeric("humidity", false)
            .unwrap();
        d.add_instance(row!["no", 80], 1.0).unwrap();

        let dir = tempfile::tempdir().unwrap();
        let names = dir.path().join("golf.names");
        save(FileKind::C45, &names, &d).unwrap();
        let data = std::fs::read_to_string(dir.path().join("golf.data")).unwrap();
        assert_eq!(data, "80,no\n");

        let back = load(FileKind::C45, &names).unwrap();
        assert_eq!(back.attribute_names(), ["humidity", "class"]);
        assert_eq!(back.instance(0).unwrap().values(), [80.0, 1.0]);
    }

    #[test]
    fn c45_round_trips_numeric_class_labels() {
        let mut d = Dataset::new("bin");
        d.numeric("x", false)
            .unwrap()
            .nominal("y", &["0", "1"], true)
            .unwrap();
        d.add_instances([row![5, "1"], row![6, "0"]], 1.0).unwrap();

        let dir = tempfile::tempdir().unwrap();
        let names = dir.path().join("bin.names");
        save(FileKind::C45, &names, &d).unwrap();

        let back = load(FileKind::C45, &names).unwrap();
        assert_eq!(back.class_attribute().unwrap().nominal_values(), ["0", "1"]);
        let rows: Vec<_> = back.iter_instances().map(|i| back.external_values(i)).collect();
        assert_eq!(
            rows,
            [
                vec![Value::Number(5.0), Value::from("1")],
                vec![Value::Number(6.0), Value::from("0")],
            ]
        );
    }

    #[test]
    fn arff_offset_dates_save_and_reload() {
        let text = "@relation log\n\
                    @attribute at date \"yyyy-MM-dd'T'HH:mm:ssZ\"\n\
                    @data\n\
                    \"2024-01-01T10:00:00+0200\"\n";
        let d = parse_arff(text, "log").unwrap();
        assert_eq!(d.instance(0).unwrap().values(), [1_704_096_000_000.0]);

        let mut buf = Vec::new();
        write_arff(&mut buf, &d).unwrap();
        let saved = String::from_utf8(buf).unwrap();
        assert!(saved.contains("2024-01-01T08:00:00+0000"));

        let back = parse_arff(&saved, "log").unwrap();
        assert_eq!(back.instances(), d.instances());
    }

    #[test]
    fn c45_requires_nominal_class() {
        let d = sample();
        let dir = tempfile::tempdir().unwrap();
        // string and date attributes cannot be declared
        assert!(save(FileKind::C45, &dir.path().join("s.names"), &d).is_err());

        let mut unclassed = Dataset::default();
        unclassed.numeric("x", false).unwrap();
        assert!(save(FileKind::C45, &dir.path().join("u.names"), &unclassed).is_err());
    }
}
