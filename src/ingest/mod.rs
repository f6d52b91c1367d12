// src/ingest/mod.rs
pub mod csv_source;
pub mod types;

use anyhow::{Context, Result};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use crate::aggregate::Bucket;
use crate::ingest::types::ChatMessage;

/// Parse chat rows (`time_in_seconds,message`); extra columns are ignored.
pub fn read_events<R: Read>(reader: R) -> Result<Vec<ChatMessage>> {
    let mut rdr = csv::ReaderBuilder::new().flexible(true).from_reader(reader);
    let mut out = Vec::new();
    for (i, row) in rdr.deserialize::<ChatMessage>().enumerate() {
        // +2: header line and 1-based numbering
        let msg = row.with_context(|| format!("parsing chat row at line {}", i + 2))?;
        out.push(msg);
    }
    Ok(out)
}

pub fn write_events<W: Write>(writer: W, events: &[ChatMessage]) -> Result<()> {
    let mut wtr = csv::Writer::from_writer(writer);
    if events.is_empty() {
        wtr.write_record(["time_in_seconds", "message"])?;
    }
    for ev in events {
        wtr.serialize(ev)?;
    }
    wtr.flush()?;
    Ok(())
}

/// Serialize buckets as `time_in_seconds,number_of_comments`.
pub fn write_buckets<W: Write>(writer: W, buckets: &[Bucket]) -> Result<()> {
    let mut wtr = csv::Writer::from_writer(writer);
    if buckets.is_empty() {
        wtr.write_record(["time_in_seconds", "number_of_comments"])?;
    }
    for b in buckets {
        wtr.serialize(b)?;
    }
    wtr.flush()?;
    Ok(())
}

pub fn read_buckets<R: Read>(reader: R) -> Result<Vec<Bucket>> {
    let mut rdr = csv::Reader::from_reader(reader);
    rdr.deserialize::<Bucket>()
        .map(|r| r.context("parsing bucket row"))
        .collect()
}

pub fn read_events_file(path: &Path) -> Result<Vec<ChatMessage>> {
    let file = std::fs::File::open(path)
        .with_context(|| format!("opening chat dataset {}", path.display()))?;
    read_events(std::io::BufReader::new(file))
        .with_context(|| format!("reading chat dataset {}", path.display()))
}

/// All `*.csv` datasets in `dir`, as `(name, path)` sorted by name.
pub fn discover_datasets(dir: &Path) -> Result<Vec<(String, PathBuf)>> {
    let entries = std::fs::read_dir(dir)
        .with_context(|| format!("listing datasets in {}", dir.display()))?;

    let mut out = Vec::new();
    for e in entries.flatten() {
        let path = e.path();
        let is_csv = path
            .extension()
            .and_then(|s| s.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("csv"));
        if !is_csv || !path.is_file() {
            continue;
        }
        if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
            out.push((stem.to_string(), path.clone()));
        }
    }
    out.sort_by(|a, b| a.0.cmp(&b.0));
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_quoted_messages_and_ignores_extra_columns() {
        let raw = "time_in_seconds,message,author\n\
                   -3.5,\"hello, world\",a\n\
                   0,\"she said \"\"hi\"\"\",b\n\
                   12.25,plain,c\n";
        let evs = read_events(raw.as_bytes()).unwrap();
        assert_eq!(evs.len(), 3);
        assert_eq!(evs[0], ChatMessage::new(-3.5, "hello, world"));
        assert_eq!(evs[1].text, "she said \"hi\"");
        assert_eq!(evs[2].timestamp_seconds, 12.25);
    }

    #[test]
    fn bad_timestamp_names_the_line() {
        let raw = "time_in_seconds,message\n1,ok\nsoon,broken\n";
        let err = read_events(raw.as_bytes()).unwrap_err();
        assert!(format!("{err:#}").contains("line 3"));
    }

    #[test]
    fn buckets_use_the_stored_column_names() {
        let mut buf = Vec::new();
        write_buckets(
            &mut buf,
            &[Bucket {
                start_seconds: 70.0,
                count: 3,
            }],
        )
        .unwrap();
        let text = String::from_utf8(buf.clone()).unwrap();
        assert!(text.starts_with("time_in_seconds,number_of_comments\n"));
        assert_eq!(read_buckets(buf.as_slice()).unwrap()[0].count, 3);
    }

    #[test]
    fn empty_outputs_still_carry_a_header() {
        let mut buf = Vec::new();
        write_buckets(&mut buf, &[]).unwrap();
        assert_eq!(
            String::from_utf8(buf).unwrap(),
            "time_in_seconds,number_of_comments\n"
        );
        let mut buf = Vec::new();
        write_events(&mut buf, &[]).unwrap();
        assert!(read_events(buf.as_slice()).unwrap().is_empty());
    }
}
