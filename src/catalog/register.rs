//! Batch registration of maps with automatic valid-time assignment.
//!
//! A [`RegisterRequest`] names maps either as an identifier list or as a
//! lazily read line source in the form `name|start[|end][|semantic_label]`.
//! Maps not yet in the catalog are inserted with a valid time built from
//! the request; map `i` of an identifier list starts at `start + i·increment`.
//! Maps already in the catalog keep their time unless `overwrite` is set.
//!
//! Every listed map, old or new, is checked against the target dataset
//! before anything is written. Map rows, register rows and the refreshed
//! rows of every affected dataset then go to the store in one batch.

use std::collections::BTreeSet;
use std::io::BufRead;

use itertools::Itertools;

use crate::catalog::catalog::{Catalog, MemberChanges, check_map_time, map_registrations, map_update};
use crate::catalog::dataset::{DatasetKind, SpaceTimeDataset};
use crate::catalog::ident::{DatasetId, MapId};
use crate::catalog::map_record::{MapKind, MapRecord};
use crate::catalog::store::{Batch, KEY_COLUMN, RelationalStore, Row, Statement};
use crate::catalog_error::CatalogError;
use crate::time::datetime_math::{increment_datetime_by_string, parse_datetime, parse_time_point};
use crate::time::extent::TimeExtent;
use crate::time::point::{RelativeUnit, TemporalType, TimePoint};

/// One map to register, with optional per-map time.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RegisterEntry {
    pub name: String,
    pub start: Option<String>,
    pub end: Option<String>,
    pub semantic_label: Option<String>,
}

impl RegisterEntry {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into(), ..Self::default() }
    }

    /// Parse `name[|start[|end|label]]`.
    ///
    /// With three fields the last one is an end time if `ttype` is absolute
    /// and it parses as a datetime, otherwise a semantic label.
    pub fn parse_line(line: &str, separator: char, ttype: Option<TemporalType>) -> Result<Self, CatalogError> {
        let fields: Vec<&str> = line.split(separator).map(str::trim).collect();
        let mut entry = RegisterEntry::new(fields[0]);
        match fields.len() {
            1 => {}
            2 => entry.start = Some(fields[1].to_string()),
            3 => {
                entry.start = Some(fields[1].to_string());
                let is_end = ttype != Some(TemporalType::Relative) && parse_datetime(fields[2]).is_ok();
                if is_end {
                    entry.end = Some(fields[2].to_string());
                } else {
                    entry.semantic_label = Some(fields[2].to_string());
                }
            }
            4 => {
                entry.start = Some(fields[1].to_string());
                entry.end = Some(fields[2].to_string());
                entry.semantic_label = Some(fields[3].to_string());
            }
            _ => {
                return Err(CatalogError::InvalidRegisterRequest(format!(
                    "cannot parse register line \"{line}\""
                )));
            }
        }
        if entry.name.is_empty() {
            return Err(CatalogError::InvalidRegisterRequest(format!("no map name in \"{line}\"")));
        }
        Ok(entry)
    }
}

/// Options of a batch registration.
pub struct RegisterRequest<'a> {
    pub map_kind: MapKind,
    /// Dataset to register the maps in; `None` only commits the maps.
    pub dataset: Option<DatasetId>,
    pub maps: Option<Vec<String>>,
    pub lines: Option<Box<dyn Iterator<Item = std::io::Result<String>> + 'a>>,
    pub separator: char,
    pub start: Option<String>,
    pub end: Option<String>,
    pub unit: Option<RelativeUnit>,
    pub increment: Option<String>,
    /// Give every map the interval `[start_i, start_i + increment)`.
    pub interval: bool,
    /// Replace the time of maps that are already in the catalog.
    pub overwrite: bool,
}

impl<'a> RegisterRequest<'a> {
    pub fn new(map_kind: MapKind, dataset: Option<DatasetId>) -> Self {
        Self {
            map_kind,
            dataset,
            maps: None,
            lines: None,
            separator: '|',
            start: None,
            end: None,
            unit: None,
            increment: None,
            interval: false,
            overwrite: false,
        }
    }

    pub fn with_maps<I, T>(mut self, maps: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        self.maps = Some(maps.into_iter().map(Into::into).collect());
        self
    }

    /// Read entries line by line from `reader`; reading stops at the first
    /// empty line.
    pub fn with_reader(mut self, reader: impl BufRead + 'a) -> Self {
        self.lines = Some(Box::new(reader.lines()));
        self
    }

    pub fn with_start(mut self, start: impl Into<String>) -> Self {
        self.start = Some(start.into());
        self
    }

    pub fn with_end(mut self, end: impl Into<String>) -> Self {
        self.end = Some(end.into());
        self
    }

    pub fn with_unit(mut self, unit: RelativeUnit) -> Self {
        self.unit = Some(unit);
        self
    }

    pub fn with_increment(mut self, increment: impl Into<String>, interval: bool) -> Self {
        self.increment = Some(increment.into());
        self.interval = interval;
        self
    }

    pub fn overwrite(mut self, overwrite: bool) -> Self {
        self.overwrite = overwrite;
        self
    }

    /// Reject conflicting or incomplete options.
    pub fn validate(&self) -> Result<(), CatalogError> {
        let fail = |msg: &str| Err(CatalogError::InvalidRegisterRequest(msg.to_string()));
        let start = self.start.is_some();
        if self.maps.is_some() && self.lines.is_some() {
            return fail("maps and file are mutually exclusive");
        }
        if self.end.is_some() && self.increment.is_some() {
            return fail("end and increment are mutually exclusive");
        }
        if self.end.is_some() && self.interval {
            return fail("end and the interval flag are mutually exclusive");
        }
        if self.increment.is_some() && !start {
            return fail("the increment option requires the start option");
        }
        if self.interval && !start {
            return fail("the interval flag requires the start option");
        }
        if self.end.is_some() && !start {
            return fail("please specify start and end time");
        }
        if self.maps.is_none() && self.lines.is_none() {
            return fail("please specify maps or file");
        }
        Ok(())
    }
}

/// Outcome of [`Catalog::register_maps`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RegisterReport {
    /// Maps newly committed to the catalog.
    pub inserted: usize,
    /// Existing maps whose time was replaced.
    pub updated: usize,
    /// Existing maps left unchanged.
    pub skipped: usize,
    /// Maps newly registered in the dataset.
    pub registered: usize,
    /// Datasets reconciled at the end, in key order.
    pub reconciled: Vec<String>,
}

/// Build the valid time of a map from start/end strings.
///
/// With an `increment` the start is moved by `mult` increments, and with
/// `interval` the map ends one increment after its start.
///
/// # Errors
/// `InvalidDatetime` for unparsable times, `InvalidRegisterRequest` for a
/// unit on absolute time or a relative time without unit.
pub fn assign_valid_time(
    start: &str,
    end: Option<&str>,
    unit: Option<RelativeUnit>,
    increment: Option<&str>,
    mult: i64,
    interval: bool,
) -> Result<TimeExtent, CatalogError> {
    match parse_time_point(start)? {
        TimePoint::Absolute(mut start_time) => {
            if unit.is_some() {
                return Err(CatalogError::InvalidRegisterRequest(
                    "unit can only be set for relative time".into(),
                ));
            }
            let mut end_time = end.map(parse_datetime).transpose()?;
            if let Some(inc) = increment {
                start_time = increment_datetime_by_string(start_time, inc, mult)?;
                if interval {
                    end_time = Some(increment_datetime_by_string(start_time, inc, 1)?);
                }
            }
            TimeExtent::absolute(start_time, end_time)
        }
        TimePoint::Relative(mut start_time) => {
            let unit = unit.ok_or_else(|| {
                CatalogError::InvalidRegisterRequest("unit must be set in case of relative time stamps".into())
            })?;
            let int = |s: &str| {
                s.trim()
                    .parse::<i64>()
                    .map_err(|_| CatalogError::InvalidDatetime(s.to_string()))
            };
            let mut end_time = end.map(int).transpose()?;
            if let Some(inc) = increment {
                let inc = int(inc)?;
                let overflow = move || CatalogError::InvalidDateArithmetic(format!("{start_time} + {mult} * {inc}"));
                start_time = mult
                    .checked_mul(inc)
                    .and_then(|d| start_time.checked_add(d))
                    .ok_or_else(overflow)?;
                if interval {
                    end_time = Some(start_time.checked_add(inc).ok_or_else(overflow)?);
                }
            }
            TimeExtent::relative(start_time, end_time, unit)
        }
    }
}

impl<S: RelationalStore> Catalog<S> {
    /// Commit and register a batch of maps.
    ///
    /// # Errors
    /// Option conflicts fail before anything is read. A new map without a
    /// start time, any listed map that does not fit the dataset, or an
    /// affected dataset of another scope fails before any row is written.
    pub fn register_maps(&mut self, mut req: RegisterRequest<'_>) -> Result<RegisterReport, CatalogError> {
        req.validate()?;
        let ds_kind = DatasetKind::for_map_kind(req.map_kind);
        let ds: Option<SpaceTimeDataset> = match &req.dataset {
            Some(id) => Some(self.require_dataset(ds_kind, id)?),
            None => None,
        };
        if let Some(ds) = &ds {
            self.config.check_scope(&ds.id.to_string(), ds.id.scope())?;
            if ds.temporal_type == TemporalType::Relative
                && (req.start.is_some() || req.end.is_some())
                && req.unit.is_none()
            {
                return Err(CatalogError::InvalidRegisterRequest(format!(
                    "space time dataset <{}> has relative time, but no relative unit is set",
                    ds.id
                )));
            }
        }
        let ttype = ds.as_ref().map(|d| d.temporal_type);
        let separator = req.separator;
        let entries: Box<dyn Iterator<Item = Result<RegisterEntry, CatalogError>> + '_> =
            match (req.maps.take(), req.lines.take()) {
                (Some(maps), _) => Box::new(maps.into_iter().map(|m| Ok(RegisterEntry::new(m.trim())))),
                (None, Some(lines)) => Box::new(
                    lines
                        .map_while(|l| match l {
                            Ok(l) if l.trim().is_empty() => None,
                            Ok(l) => Some(Ok(l)),
                            Err(e) => Some(Err(e)),
                        })
                        .map(move |l| {
                            let l = l.map_err(|e| CatalogError::InvalidRegisterRequest(e.to_string()))?;
                            RegisterEntry::parse_line(&l, separator, ttype)
                        }),
                ),
                (None, None) => Box::new(std::iter::empty()),
            };

        let mut report = RegisterReport::default();
        let mut batch = Batch::new();
        let mut changes = MemberChanges::default();
        let mut seen: BTreeSet<MapId> = BTreeSet::new();
        let mut warned_time_in_file = false;
        let mut target = match ds {
            Some(ds) => {
                let table = self.register_table(&ds)?;
                let has_members = self.has_members(&table)?;
                Some((ds, table, has_members))
            }
            None => None,
        };

        for (i, entry) in entries.enumerate() {
            let entry = entry?;
            let id = MapId::parse_in_scope(&entry.name, &self.config.current_scope)?;
            if !seen.insert(id.clone()) {
                log::warn!("map <{id}> is listed more than once, ignoring the repetition");
                continue;
            }
            let time_in_file = entry.start.is_some();
            if time_in_file && (req.increment.is_some() || req.interval) && !warned_time_in_file {
                log::warn!("the increment option and the interval flag are ignored because of time stamps in the input");
                warned_time_in_file = true;
            }
            let (start, end, increment, mult) = if time_in_file {
                (entry.start.as_deref(), entry.end.as_deref(), None, 1)
            } else {
                (req.start.as_deref(), req.end.as_deref(), req.increment.as_deref(), i as i64)
            };
            let interval = req.interval && !time_in_file;

            let (mut map, write) = match self.map(req.map_kind, &id)? {
                None => {
                    let start = start.ok_or_else(|| CatalogError::MissingStartTime(id.to_string()))?;
                    let extent = assign_valid_time(start, end, req.unit, increment, mult, interval)?;
                    log::debug!("set valid time of map <{id}> to {extent}");
                    self.config.check_scope(&id.to_string(), id.scope())?;
                    let mut map = MapRecord::new(id.clone(), req.map_kind, extent);
                    map.semantic_label = entry.semantic_label;
                    check_map_time(&map)?;
                    report.inserted += 1;
                    (map, MapWrite::Insert)
                }
                Some(mut map) if req.overwrite => {
                    self.config.check_scope(&id.to_string(), id.scope())?;
                    if let Some(start) = start {
                        map.extent = assign_valid_time(start, end, req.unit, increment, mult, interval)?;
                        log::debug!("set valid time of map <{id}> to {}", map.extent);
                    }
                    if let Some(label) = entry.semantic_label {
                        map.semantic_label = Some(label);
                    }
                    check_map_time(&map)?;
                    report.updated += 1;
                    (map, MapWrite::Update)
                }
                Some(map) => {
                    log::warn!(
                        "map <{id}> is already registered in the temporal catalog, overwrite flag is not set"
                    );
                    report.skipped += 1;
                    (map, MapWrite::Keep)
                }
            };

            let mut register_row = None;
            if let Some((ds, table, has_members)) = target.as_mut() {
                self.check_member(ds, *has_members, &map)?;
                if self.store.select_row(table, &id.to_string())?.is_some() {
                    log::warn!("map <{id}> is already registered in space time dataset <{}>", ds.id);
                } else {
                    *has_members = true;
                    map.datasets.insert(ds.id.to_string());
                    let mut reg = Row::new();
                    reg.insert(KEY_COLUMN.into(), id.to_string().into());
                    register_row = Some(Statement::Insert { table: table.clone(), row: reg });
                    changes.joining.entry(ds.id.to_string()).or_default().push(map.clone());
                    report.registered += 1;
                }
            }
            match write {
                MapWrite::Insert => {
                    batch.push(Statement::Insert { table: req.map_kind.table().into(), row: map.to_row() });
                }
                MapWrite::Update => {
                    batch.push(map_update(&map));
                }
                MapWrite::Keep if register_row.is_some() => {
                    batch.push(map_registrations(&map));
                }
                MapWrite::Keep => continue,
            }
            if let Some(reg) = register_row {
                batch.push(reg);
            }
            changes.change(&map);
        }

        // Every dataset holding a written map is refreshed in the same batch.
        let mut affected: BTreeSet<String> = changes
            .changed
            .values()
            .flat_map(|m| m.datasets.iter().cloned())
            .collect();
        let mut datasets = Vec::new();
        if let Some((ds, _, _)) = target {
            if affected.remove(&ds.id.to_string()) {
                datasets.push(ds);
            }
        }
        for key in &affected {
            match self.dataset(ds_kind, &DatasetId::parse(key)?)? {
                Some(ds) => datasets.push(ds),
                None => log::warn!("a registered map lists unknown dataset <{key}>"),
            }
        }
        let refreshed = self.commit_with_refresh(batch, datasets, &changes)?;
        report.reconciled = refreshed.iter().map(|ds| ds.id.to_string()).sorted().collect();
        Ok(report)
    }
}

/// What a registration batch writes for one listed map.
enum MapWrite {
    Insert,
    Update,
    Keep,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn dt(y: i32, m: u32, d: u32) -> chrono::NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d).unwrap().and_hms_opt(0, 0, 0).unwrap()
    }

    #[test]
    fn lines_with_three_fields() {
        let e = RegisterEntry::parse_line("a|2001-01-01|2001-02-01", '|', Some(TemporalType::Absolute)).unwrap();
        assert_eq!(e.end.as_deref(), Some("2001-02-01"));
        let e = RegisterEntry::parse_line("a|2001-01-01|S2_1", '|', Some(TemporalType::Absolute)).unwrap();
        assert_eq!(e.semantic_label.as_deref(), Some("S2_1"));
        let e = RegisterEntry::parse_line("a|5|7", '|', Some(TemporalType::Relative)).unwrap();
        assert_eq!(e.semantic_label.as_deref(), Some("7"));
        assert!(RegisterEntry::parse_line("a|1|2|3|4", '|', None).is_err());
    }

    #[test]
    fn absolute_increment_and_interval() {
        let ext = assign_valid_time("2001-01-01", None, None, Some("1 month"), 2, true).unwrap();
        assert_eq!(ext, TimeExtent::absolute(dt(2001, 3, 1), Some(dt(2001, 4, 1))).unwrap());
    }

    #[test]
    fn relative_requires_unit() {
        assert!(matches!(
            assign_valid_time("5", None, None, None, 0, false),
            Err(CatalogError::InvalidRegisterRequest(_))
        ));
        let ext = assign_valid_time("5", None, Some(RelativeUnit::Days), Some("2"), 3, true).unwrap();
        assert_eq!(ext, TimeExtent::relative(11, Some(13), RelativeUnit::Days).unwrap());
        assert!(assign_valid_time("2001-01-01", None, Some(RelativeUnit::Days), None, 0, false).is_err());
    }

    #[test]
    fn option_conflicts() {
        let base = || RegisterRequest::new(MapKind::Raster, None).with_maps(["a"]);
        assert!(base().validate().is_ok());
        assert!(base().with_end("3").validate().is_err());
        assert!(base().with_start("1").with_end("3").with_increment("1", false).validate().is_err());
        assert!(base().with_start("1").with_end("3").with_increment("1", true).validate().is_err());
        assert!(RegisterRequest::new(MapKind::Raster, None).validate().is_err());
        let both = base().with_reader(std::io::Cursor::new("a|1\n"));
        assert!(both.validate().is_err());
    }
}
