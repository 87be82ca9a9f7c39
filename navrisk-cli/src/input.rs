//! CSV readers for the tabular exports the analyzer consumes.
//!
//! - valuations / net assets: wide layout, a `Date` column then one column per fund
//! - flows: one row per operation with date, fund, operation, amount, client segment
//! - benchmark: `Date` plus one level column, converted to returns

use std::collections::BTreeMap;
use std::fs::File;
use std::io::Read;
use std::path::Path;

use anyhow::{bail, Context, Result};
use chrono::NaiveDate;
use navrisk_core::domain::{FlowKind, FlowRecord, FlowSeries, FundId, RawObservation, ReturnSeries, ValuationSeries};
use navrisk_core::SeriesPreparer;

const DATE_FORMATS: [&str; 3] = ["%Y-%m-%d", "%d/%m/%Y", "%Y/%m/%d"];

pub fn parse_date(s: &str) -> Result<NaiveDate> {
    let s = s.trim();
    // Spreadsheet exports often carry a midnight time component.
    let s = s.split_whitespace().next().unwrap_or(s);
    for fmt in DATE_FORMATS {
        if let Ok(d) = NaiveDate::parse_from_str(s, fmt) {
            return Ok(d);
        }
    }
    bail!("unrecognized date '{s}'")
}

/// Empty cells are `None`. Accepts `1 234,5`, `1.234,5` and `1,234.5`: the
/// separator that appears last is the decimal one.
pub fn parse_number(s: &str) -> Result<Option<f64>> {
    let cleaned: String = s.chars().filter(|c| !c.is_whitespace() && *c != '\u{a0}').collect();
    if cleaned.is_empty() {
        return Ok(None);
    }
    let normalized = match (cleaned.rfind(','), cleaned.rfind('.')) {
        (Some(comma), Some(dot)) if comma > dot => cleaned.replace('.', "").replace(',', "."),
        (Some(_), Some(_)) => cleaned.replace(',', ""),
        (Some(_), None) => cleaned.replace(',', "."),
        _ => cleaned,
    };
    let v = normalized
        .parse::<f64>()
        .with_context(|| format!("invalid number '{s}'"))?;
    Ok(Some(v))
}

fn header_index(headers: &csv::StringRecord, names: &[&str]) -> Option<usize> {
    headers
        .iter()
        .position(|h| names.iter().any(|n| h.trim().eq_ignore_ascii_case(n)))
}

/// Wide table: first column is the date, every other column is a fund.
/// Rows are sorted by date; each fund keeps its own gaps as missing cells.
pub fn read_wide<R: Read>(reader: R) -> Result<BTreeMap<FundId, Vec<RawObservation>>> {
    Ok(read_wide_columns(reader)?.into_iter().collect())
}

/// Same as [`read_wide`], keeping the file's column order.
pub fn read_wide_columns<R: Read>(reader: R) -> Result<Vec<(FundId, Vec<RawObservation>)>> {
    let mut rdr = csv::ReaderBuilder::new().flexible(true).from_reader(reader);
    let headers = rdr.headers()?.clone();
    if headers.len() < 2 {
        bail!("expected a date column followed by at least one fund column");
    }
    let funds: Vec<FundId> = headers.iter().skip(1).map(|h| FundId::new(h.trim())).collect();

    let mut rows: Vec<(NaiveDate, Vec<Option<f64>>)> = Vec::new();
    for (line, record) in rdr.records().enumerate() {
        let record = record?;
        let Some(first) = record.get(0).filter(|s| !s.trim().is_empty()) else {
            continue;
        };
        let date = parse_date(first).with_context(|| format!("row {}", line + 2))?;
        let values = (1..headers.len())
            .map(|i| parse_number(record.get(i).unwrap_or("")))
            .collect::<Result<Vec<_>>>()
            .with_context(|| format!("row {}", line + 2))?;
        rows.push((date, values));
    }
    rows.sort_by_key(|(d, _)| *d);

    Ok(funds
        .into_iter()
        .enumerate()
        .map(|(col, fund)| {
            let series = rows
                .iter()
                .map(|(date, values)| RawObservation {
                    date: *date,
                    value: values[col],
                })
                .collect();
            (fund, series)
        })
        .collect())
}

pub fn read_wide_file(path: &Path) -> Result<BTreeMap<FundId, Vec<RawObservation>>> {
    let file = File::open(path).with_context(|| format!("opening {}", path.display()))?;
    read_wide(file).with_context(|| format!("reading {}", path.display()))
}

/// Net assets as clean positive level series per fund.
pub fn read_net_assets_file(path: &Path) -> Result<BTreeMap<FundId, ValuationSeries>> {
    let preparer = SeriesPreparer::new(1);
    Ok(read_wide_file(path)?
        .into_iter()
        .map(|(fund, raw)| {
            let prepared = preparer.prepare(&fund, &raw);
            (fund, prepared.valuations)
        })
        .collect())
}

pub fn parse_operation(s: &str) -> Result<FlowKind> {
    match s.trim().to_lowercase().as_str() {
        "souscriptions" | "souscription" | "subscription" | "subscriptions" => Ok(FlowKind::Subscription),
        "rachats" | "rachat" | "redemption" | "redemptions" => Ok(FlowKind::Redemption),
        other => bail!("unknown operation '{other}'"),
    }
}

pub fn read_flows<R: Read>(reader: R) -> Result<BTreeMap<FundId, FlowSeries>> {
    let mut rdr = csv::ReaderBuilder::new().flexible(true).from_reader(reader);
    let headers = rdr.headers()?.clone();
    let col = |names: &[&str]| {
        header_index(&headers, names).with_context(|| format!("missing column (one of {names:?})"))
    };
    let date_col = col(&["date"])?;
    let fund_col = col(&["fund", "fcp"])?;
    let op_col = col(&["operation", "opérations", "operations"])?;
    let amount_col = col(&["amount", "montant"])?;
    let segment_col = header_index(&headers, &["segment", "type de clients", "client type"]);

    let mut by_fund: BTreeMap<FundId, Vec<FlowRecord>> = BTreeMap::new();
    for (line, record) in rdr.records().enumerate() {
        let record = record?;
        let field = |i: usize| record.get(i).unwrap_or("").trim();
        if field(date_col).is_empty() {
            continue;
        }
        let row = || format!("row {}", line + 2);
        let fund = FundId::new(field(fund_col));
        let amount = parse_number(field(amount_col)).with_context(row)?.unwrap_or(0.0);
        let rec = FlowRecord {
            date: parse_date(field(date_col)).with_context(row)?,
            fund: fund.clone(),
            kind: parse_operation(field(op_col)).with_context(row)?,
            amount,
            segment: segment_col.map(field).unwrap_or("Unspecified").to_string(),
        };
        by_fund.entry(fund).or_default().push(rec);
    }
    Ok(by_fund.into_iter().map(|(f, recs)| (f, FlowSeries::new(recs))).collect())
}

pub fn read_flows_file(path: &Path) -> Result<BTreeMap<FundId, FlowSeries>> {
    let file = File::open(path).with_context(|| format!("opening {}", path.display()))?;
    read_flows(file).with_context(|| format!("reading {}", path.display()))
}

/// Benchmark levels from the first value column in file order, as simple returns.
pub fn read_benchmark_file(path: &Path) -> Result<ReturnSeries> {
    let file = File::open(path).with_context(|| format!("opening {}", path.display()))?;
    let columns = read_wide_columns(file).with_context(|| format!("reading {}", path.display()))?;
    let Some((name, raw)) = columns.into_iter().next() else {
        bail!("benchmark file {} has no value column", path.display());
    };
    let prepared = SeriesPreparer::default().prepare(&name, &raw);
    if !prepared.is_computable() {
        bail!("benchmark '{name}' has fewer than two usable levels");
    }
    Ok(prepared.returns)
}
