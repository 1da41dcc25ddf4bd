//! The space time dataset catalog.
//!
//! [`Catalog`] owns a [`RelationalStore`] and keeps three kinds of tables in
//! it: one base table per [`MapKind`], one dataset table per
//! [`DatasetKind`], and one register table per dataset listing its member
//! maps.
//!
//! # Batch, then reconcile
//!
//! [`register`](Catalog::register) and [`unregister`](Catalog::unregister)
//! only touch membership; the derived dataset fields (extent, granularity,
//! map time, spatial box) are stale until
//! [`update_from_registered_maps`](Catalog::update_from_registered_maps)
//! runs once for the whole batch.
//!
//! Operations that change map times or membership of several datasets at
//! once stage the refreshed dataset rows next to the map rows, so every
//! check runs before the single batch is written.
//!
//! # Failure policy
//!
//! Inconsistent registrations and mutations of objects owned by another
//! scope are fatal errors. Registering a member twice or unregistering a
//! non-member returns `Ok(false)` and logs a warning.

use std::collections::{BTreeMap, BTreeSet};

use itertools::Itertools;

use crate::catalog::config::CatalogConfig;
use crate::catalog::dataset::{
    DATASET_COLUMNS, DatasetKind, MapTimeKind, SpaceTimeDataset, register_table_name,
};
use crate::catalog::filter::TemporalFilter;
use crate::catalog::ident::{DatasetId, MapId};
use crate::catalog::map_record::{MAP_COLUMNS, MapKind, MapRecord, MapSlot, datasets_value};
use crate::catalog::store::{Batch, KEY_COLUMN, RelationalStore, Row, RowReader, Statement};
use crate::catalog_error::CatalogError;
use crate::debug_invariants::{DebugInvariants, validate_all};
use crate::granularity::compute::compute_granularity;
use crate::time::extent::{RelationKind, TimeExtent};
use crate::time::point::TemporalType;
use crate::topology::relation_graph::{TopologyBuilder, TopologyOptions};
use crate::topology::spatial::SpatialExtent;

/// Map rows a pending batch will write, as seen by the datasets it touches.
#[derive(Debug, Clone, Default)]
pub(crate) struct MemberChanges {
    /// New or rewritten map records.
    pub(crate) changed: BTreeMap<MapId, MapRecord>,
    /// Maps joining a dataset, by dataset key.
    pub(crate) joining: BTreeMap<String, Vec<MapRecord>>,
    /// Maps leaving every dataset.
    pub(crate) leaving: BTreeSet<MapId>,
}

impl MemberChanges {
    pub(crate) fn change(&mut self, map: &MapRecord) {
        self.changed.insert(map.id.clone(), map.clone());
    }
}

/// Number of points, intervals and invalid extents in a series.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TemporalTypeCounts {
    pub point: usize,
    pub interval: usize,
    pub invalid: usize,
}

impl TemporalTypeCounts {
    pub fn map_time(&self) -> MapTimeKind {
        MapTimeKind::classify(self.interval, self.point, self.invalid)
    }
}

/// Count instants, proper intervals and intervals with `end <= start`.
pub fn count_temporal_types<'a, I>(extents: I) -> TemporalTypeCounts
where
    I: IntoIterator<Item = &'a TimeExtent>,
{
    let mut counts = TemporalTypeCounts::default();
    for ext in extents {
        match ext.end() {
            None => counts.point += 1,
            Some(e) if e > ext.start() => counts.interval += 1,
            Some(_) => counts.invalid += 1,
        }
    }
    counts
}

/// Number of gaps in a start-ordered series: consecutive pairs where the
/// later element lies strictly after the earlier one.
pub fn count_gaps(extents: &[TimeExtent]) -> usize {
    extents
        .iter()
        .tuple_windows()
        .filter(|(prev, next)| next.relation(prev) == Some(RelationKind::After))
        .count()
}

/// A start-ordered map list with a gap slot inserted wherever the next map
/// lies strictly after the previous one.
pub fn with_gaps(maps: Vec<MapRecord>) -> Result<Vec<MapSlot>, CatalogError> {
    let mut out = Vec::with_capacity(maps.len());
    let mut iter = maps.into_iter().peekable();
    while let Some(map) = iter.next() {
        let gap = match iter.peek() {
            Some(next) if next.extent.relation(&map.extent) == Some(RelationKind::After) => {
                Some(TimeExtent::new(map.extent.upper(), Some(next.extent.start()), map.extent.unit())?)
            }
            _ => None,
        };
        out.push(MapSlot::map(map));
        if let Some(g) = gap {
            out.push(MapSlot::gap(g));
        }
    }
    Ok(out)
}

/// Whether the relation counts of a series are acceptable for its map time.
///
/// Interval and mixed series may not overlap in any way; point series may
/// not contain duplicates. An invalid or unknown map time never passes.
pub fn topology_is_valid(map_time: Option<MapTimeKind>, counts: &BTreeMap<RelationKind, usize>) -> bool {
    use RelationKind::*;
    let present = |k: RelationKind| counts.get(&k).copied().unwrap_or(0) > 0;
    match map_time {
        Some(MapTimeKind::Interval | MapTimeKind::Mixed) => ![
            Equal, During, Contains, Overlaps, Overlapped, Starts, Finishes, Started, Finished,
        ]
        .into_iter()
        .any(present),
        Some(MapTimeKind::Point) => !present(Equal),
        _ => false,
    }
}

/// Dataset and map catalog over a relational store.
#[derive(Debug)]
pub struct Catalog<S: RelationalStore> {
    pub(crate) store: S,
    pub(crate) config: CatalogConfig,
}

impl<S: RelationalStore> Catalog<S> {
    /// Open a catalog, creating the base tables the store does not have yet.
    pub fn new(mut store: S, config: CatalogConfig) -> Result<Self, CatalogError> {
        let mut batch = Batch::new();
        for kind in MapKind::ALL {
            if !store.has_table(kind.table()) {
                batch.push(Statement::CreateTable {
                    table: kind.table().into(),
                    columns: MAP_COLUMNS.clone(),
                });
            }
        }
        for kind in DatasetKind::ALL {
            if !store.has_table(kind.table()) {
                batch.push(Statement::CreateTable {
                    table: kind.table().into(),
                    columns: DATASET_COLUMNS.clone(),
                });
            }
        }
        store.execute_batch(&batch)?;
        Ok(Self { store, config })
    }

    pub fn config(&self) -> &CatalogConfig {
        &self.config
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn into_store(self) -> S {
        self.store
    }

    pub(crate) fn execute(&mut self, batch: &Batch) -> Result<(), CatalogError> {
        log::debug!("executing {} catalog statements", batch.len());
        self.store.execute_batch(batch)?;
        Ok(())
    }

    // ------------------------------------------------------------------
    // Maps
    // ------------------------------------------------------------------

    /// Commit a new map. Its dataset memberships start empty.
    pub fn insert_map(&mut self, mut map: MapRecord) -> Result<(), CatalogError> {
        self.config.check_scope(&map.id.to_string(), map.id.scope())?;
        check_map_time(&map)?;
        if self.has_map(map.kind, &map.id)? {
            return Err(CatalogError::MapExists(map.id.to_string()));
        }
        map.datasets.clear();
        self.store.insert_row(map.kind.table(), map.to_row())?;
        Ok(())
    }

    pub fn map(&self, kind: MapKind, id: &MapId) -> Result<Option<MapRecord>, CatalogError> {
        self.store
            .select_row(kind.table(), &id.to_string())?
            .map(|row| MapRecord::from_row(kind, &row))
            .transpose()
    }

    pub fn has_map(&self, kind: MapKind, id: &MapId) -> Result<bool, CatalogError> {
        Ok(self.store.select_row(kind.table(), &id.to_string())?.is_some())
    }

    /// The map, or `MapNotInCatalog`/`MapKindMismatch` naming `dataset`.
    fn require_map(&self, kind: MapKind, id: &MapId, dataset: &DatasetId) -> Result<MapRecord, CatalogError> {
        if let Some(map) = self.map(kind, id)? {
            return Ok(map);
        }
        for other in MapKind::ALL.into_iter().filter(|k| *k != kind) {
            if self.has_map(other, id)? {
                return Err(CatalogError::MapKindMismatch {
                    dataset: dataset.to_string(),
                    map: id.to_string(),
                    expected: kind.to_string(),
                    found: other.to_string(),
                });
            }
        }
        Err(CatalogError::MapNotInCatalog(id.to_string()))
    }

    /// Replace the valid time of a map and reconcile every dataset it is
    /// registered in.
    ///
    /// # Errors
    /// Fails before writing anything if the new extent is invalid, does not
    /// fit the temporal type or unit of one of the datasets, or one of the
    /// datasets is owned by another scope.
    pub fn update_map_time(&mut self, kind: MapKind, id: &MapId, extent: TimeExtent) -> Result<(), CatalogError> {
        self.config.check_scope(&id.to_string(), id.scope())?;
        let mut map = self
            .map(kind, id)?
            .ok_or_else(|| CatalogError::MapNotInCatalog(id.to_string()))?;
        map.extent = extent;
        check_map_time(&map)?;
        let datasets = self.member_datasets(DatasetKind::for_map_kind(kind), &map)?;
        let mut changes = MemberChanges::default();
        changes.change(&map);
        self.commit_with_refresh(map_update(&map).into(), datasets, &changes)?;
        Ok(())
    }

    /// Unregister a map from every dataset, delete it, and reconcile the
    /// datasets it belonged to.
    pub fn remove_map(&mut self, kind: MapKind, id: &MapId) -> Result<(), CatalogError> {
        self.config.check_scope(&id.to_string(), id.scope())?;
        let map = self
            .map(kind, id)?
            .ok_or_else(|| CatalogError::MapNotInCatalog(id.to_string()))?;
        let datasets = self.member_datasets(DatasetKind::for_map_kind(kind), &map)?;
        let mut batch = Batch::new();
        for ds in &datasets {
            let table = self.register_table(ds)?;
            if self.store.select_row(&table, &id.to_string())?.is_some() {
                batch.push(Statement::Delete { table, key: id.to_string() });
            }
        }
        batch.push(Statement::Delete { table: kind.table().into(), key: id.to_string() });
        let mut changes = MemberChanges::default();
        changes.leaving.insert(id.clone());
        self.commit_with_refresh(batch, datasets, &changes)?;
        log::info!("removed map <{id}> from the temporal catalog");
        Ok(())
    }

    pub(crate) fn member_datasets(
        &self,
        kind: DatasetKind,
        map: &MapRecord,
    ) -> Result<Vec<SpaceTimeDataset>, CatalogError> {
        let mut out = Vec::new();
        for key in &map.datasets {
            let id = DatasetId::parse(key)?;
            match self.dataset(kind, &id)? {
                Some(ds) => out.push(ds),
                None => log::warn!("map <{}> lists unknown dataset <{key}>", map.id),
            }
        }
        Ok(out)
    }

    // ------------------------------------------------------------------
    // Datasets
    // ------------------------------------------------------------------

    /// Create an empty dataset together with its register table.
    pub fn create_dataset(
        &mut self,
        id: DatasetId,
        kind: DatasetKind,
        temporal_type: TemporalType,
        semantic_type: &str,
        title: &str,
        description: &str,
    ) -> Result<SpaceTimeDataset, CatalogError> {
        self.config.check_scope(&id.to_string(), id.scope())?;
        if self.dataset(kind, &id)?.is_some() {
            return Err(CatalogError::DatasetExists(id.to_string()));
        }
        let mut ds = SpaceTimeDataset::new(id, kind, temporal_type);
        ds.semantic_type = semantic_type.to_string();
        ds.title = title.to_string();
        ds.description = description.to_string();
        let table = register_table_name(&ds.id, ds.map_kind());
        ds.register_table = Some(table.clone());

        let mut batch = Batch::new();
        batch
            .push(Statement::CreateTable { table, columns: Vec::new() })
            .push(Statement::Insert { table: kind.table().into(), row: ds.to_row() });
        self.execute(&batch)?;
        log::info!("created space time {} dataset <{}>", kind, ds.id);
        Ok(ds)
    }

    pub fn dataset(&self, kind: DatasetKind, id: &DatasetId) -> Result<Option<SpaceTimeDataset>, CatalogError> {
        self.store
            .select_row(kind.table(), &id.to_string())?
            .map(|row| SpaceTimeDataset::from_row(kind, &row))
            .transpose()
    }

    /// The dataset, or `DatasetNotFound`.
    pub fn require_dataset(&self, kind: DatasetKind, id: &DatasetId) -> Result<SpaceTimeDataset, CatalogError> {
        self.dataset(kind, id)?
            .ok_or_else(|| CatalogError::DatasetNotFound(id.to_string()))
    }

    /// All datasets of `kind`, read one row at a time.
    pub fn datasets(
        &self,
        kind: DatasetKind,
    ) -> Result<impl Iterator<Item = Result<SpaceTimeDataset, CatalogError>> + '_, CatalogError> {
        let rows = self.store.select_rows(kind.table(), None)?;
        Ok(rows.map(move |row| SpaceTimeDataset::from_row(kind, &row)))
    }

    /// Whether the register table lists at least one map.
    pub(crate) fn has_members(&self, table: &str) -> Result<bool, CatalogError> {
        Ok(self.store.select_rows(table, None)?.next().is_some())
    }

    /// Name of the dataset's register table; it must exist in the store.
    pub(crate) fn register_table(&self, ds: &SpaceTimeDataset) -> Result<String, CatalogError> {
        match &ds.register_table {
            Some(t) if self.store.has_table(t) => Ok(t.clone()),
            _ => Err(CatalogError::MissingRegisterTable(ds.id.to_string())),
        }
    }

    // ------------------------------------------------------------------
    // Membership
    // ------------------------------------------------------------------

    /// Add a committed map to a dataset.
    ///
    /// The first map registered into a relative dataset whose register table
    /// is empty fixes the dataset's unit. Returns `Ok(false)` if the map is
    /// already a member.
    ///
    /// # Errors
    /// `ScopeMismatch`, `MissingRegisterTable`, `MapNotInCatalog`,
    /// `MapKindMismatch`, `InvalidMapTime`, `TemporalTypeMismatch` or
    /// `RelativeUnitMismatch`; nothing is written in that case.
    pub fn register(&mut self, kind: DatasetKind, dataset: &DatasetId, map_id: &MapId) -> Result<bool, CatalogError> {
        let mut ds = self.require_dataset(kind, dataset)?;
        self.config.check_scope(&ds.id.to_string(), ds.id.scope())?;
        let table = self.register_table(&ds)?;
        let mut map = self.require_map(ds.map_kind(), map_id, &ds.id)?;
        let has_members = self.has_members(&table)?;
        self.check_member(&mut ds, has_members, &map)?;
        if self.store.select_row(&table, &map.id.to_string())?.is_some() {
            log::warn!("map <{}> is already registered in space time dataset <{}>", map.id, ds.id);
            return Ok(false);
        }

        map.datasets.insert(ds.id.to_string());
        ds.pending_maps += 1;
        let mut reg = Row::new();
        reg.insert(KEY_COLUMN.into(), map.id.to_string().into());
        let mut batch = Batch::new();
        batch
            .push(Statement::Insert { table, row: reg })
            .push(map_registrations(&map))
            .push(dataset_update(&ds));
        self.execute(&batch)?;
        log::debug!("registered map <{}> in <{}>", map.id, ds.id);
        Ok(true)
    }

    /// Remove a map from a dataset. Returns `Ok(false)` if it is not a member.
    pub fn unregister(&mut self, kind: DatasetKind, dataset: &DatasetId, map_id: &MapId) -> Result<bool, CatalogError> {
        let mut ds = self.require_dataset(kind, dataset)?;
        self.config.check_scope(&ds.id.to_string(), ds.id.scope())?;
        let table = self.register_table(&ds)?;
        if self.store.select_row(&table, &map_id.to_string())?.is_none() {
            match map_id.layer() {
                Some(layer) => log::warn!(
                    "map <{}> with layer {layer} is not registered in space time dataset <{}>",
                    map_id.map_id(),
                    ds.id
                ),
                None => log::warn!("map <{map_id}> is not registered in space time dataset <{}>", ds.id),
            }
            return Ok(false);
        }

        let mut batch = Batch::new();
        batch.push(Statement::Delete { table, key: map_id.to_string() });
        if let Some(mut map) = self.map(ds.map_kind(), map_id)? {
            map.datasets.remove(&ds.id.to_string());
            batch.push(map_registrations(&map));
        }
        ds.pending_maps = ds.pending_maps.saturating_sub(1);
        batch.push(dataset_update(&ds));
        self.execute(&batch)?;
        log::debug!("unregistered map <{map_id}> from <{}>", ds.id);
        Ok(true)
    }

    /// Checks a map passes before it joins `ds`.
    ///
    /// A relative dataset without members or without a unit adopts the unit
    /// of the map.
    pub(crate) fn check_member(
        &self,
        ds: &mut SpaceTimeDataset,
        has_members: bool,
        map: &MapRecord,
    ) -> Result<(), CatalogError> {
        check_map_time(map)?;
        if map.temporal_type() != ds.temporal_type {
            return Err(CatalogError::TemporalTypeMismatch {
                dataset: ds.id.to_string(),
                map: map.id.to_string(),
                expected: ds.temporal_type,
                found: map.temporal_type(),
            });
        }
        if ds.temporal_type == TemporalType::Relative && (!has_members || ds.relative_unit.is_none()) {
            ds.relative_unit = map.extent.unit();
        }
        check_compatible(ds, map)?;
        if self.config.scope_check && map.id.scope() != ds.id.scope() {
            return Err(CatalogError::ScopeMismatch {
                id: map.id.to_string(),
                current: ds.id.scope().to_string(),
                found: map.id.scope().to_string(),
            });
        }
        Ok(())
    }

    pub fn is_map_registered(&self, kind: DatasetKind, dataset: &DatasetId, map_id: &MapId) -> Result<bool, CatalogError> {
        let ds = self.require_dataset(kind, dataset)?;
        let table = self.register_table(&ds)?;
        Ok(self.store.select_row(&table, &map_id.to_string())?.is_some())
    }

    /// Recompute extent, spatial box, map time and granularity of a dataset
    /// from its registered maps and persist them.
    ///
    /// Running it twice without membership changes leaves the dataset
    /// unchanged apart from `revision`.
    pub fn update_from_registered_maps(
        &mut self,
        kind: DatasetKind,
        dataset: &DatasetId,
    ) -> Result<SpaceTimeDataset, CatalogError> {
        let ds = self.require_dataset(kind, dataset)?;
        let (ds, update) = self.stage_refresh(ds, &MemberChanges::default())?;
        self.execute(&update.into())?;
        log_refresh(&ds);
        Ok(ds)
    }

    /// Refreshed `ds` as it will be once `changes` are written, and the
    /// statement persisting it. Nothing is written.
    ///
    /// # Errors
    /// `ScopeMismatch` for a dataset of another scope, a type or unit
    /// mismatch for a changed member, and any error of the refresh itself.
    pub(crate) fn stage_refresh(
        &self,
        mut ds: SpaceTimeDataset,
        changes: &MemberChanges,
    ) -> Result<(SpaceTimeDataset, Statement), CatalogError> {
        self.config.check_scope(&ds.id.to_string(), ds.id.scope())?;
        let mut maps = Vec::new();
        for map in self.registered_map_iter(ds.kind, &ds.id)? {
            let map = map?;
            if changes.leaving.contains(&map.id) {
                continue;
            }
            maps.push(changes.changed.get(&map.id).cloned().unwrap_or(map));
        }
        if let Some(joining) = changes.joining.get(&ds.id.to_string()) {
            maps.extend(joining.iter().cloned());
        }
        for map in maps.iter().filter(|m| changes.changed.contains_key(&m.id)) {
            check_compatible(&ds, map)?;
        }
        maps.sort_by(|a, b| a.extent.cmp_chronological(&b.extent));
        crate::debug_invariants!(validate_all(maps.iter().map(|m| &m.extent)), "member extents of <{}>", ds.id);
        refresh(&mut ds, &maps)?;
        ds.debug_assert_invariants();
        let update = dataset_update(&ds);
        Ok((ds, update))
    }

    /// Write `batch` together with the refreshed rows of `datasets`.
    ///
    /// Every dataset is staged first, so a failing check leaves the store
    /// untouched.
    pub(crate) fn commit_with_refresh(
        &mut self,
        mut batch: Batch,
        datasets: Vec<SpaceTimeDataset>,
        changes: &MemberChanges,
    ) -> Result<Vec<SpaceTimeDataset>, CatalogError> {
        let mut refreshed = Vec::with_capacity(datasets.len());
        for ds in datasets {
            let (ds, update) = self.stage_refresh(ds, changes)?;
            batch.push(update);
            refreshed.push(ds);
        }
        self.execute(&batch)?;
        refreshed.iter().for_each(log_refresh);
        Ok(refreshed)
    }

    /// Registered maps in register-key order, read one at a time.
    pub fn registered_map_iter(
        &self,
        kind: DatasetKind,
        dataset: &DatasetId,
    ) -> Result<impl Iterator<Item = Result<MapRecord, CatalogError>> + '_, CatalogError> {
        let ds = self.require_dataset(kind, dataset)?;
        let table = self.register_table(&ds)?;
        let map_kind = ds.map_kind();
        let rows = self.store.select_rows(&table, None)?;
        Ok(rows.map(move |row| {
            let key = RowReader::new(&table, &row).required_text(KEY_COLUMN)?.to_string();
            let map_row = self
                .store
                .select_row(map_kind.table(), &key)?
                .ok_or(CatalogError::MapNotInCatalog(key))?;
            MapRecord::from_row(map_kind, &map_row)
        }))
    }

    /// Registered maps ordered by start time, optionally restricted by a
    /// temporal filter.
    ///
    /// The filter is handed to the store, which selects the matching map
    /// rows among the register keys.
    pub fn registered_maps(
        &self,
        kind: DatasetKind,
        dataset: &DatasetId,
        filter: Option<&TemporalFilter>,
    ) -> Result<Vec<MapRecord>, CatalogError> {
        let mut maps = match filter {
            None => self.registered_map_iter(kind, dataset)?.collect::<Result<Vec<_>, _>>()?,
            Some(filter) => {
                let ds = self.require_dataset(kind, dataset)?;
                let table = self.register_table(&ds)?;
                let keys = self
                    .store
                    .select_rows(&table, None)?
                    .map(|row| RowReader::new(&table, &row).required_text(KEY_COLUMN).map(str::to_string))
                    .collect::<Result<Vec<_>, _>>()?;
                let map_kind = ds.map_kind();
                self.store
                    .select_where(map_kind.table(), Some(&keys), filter)?
                    .map(|row| MapRecord::from_row(map_kind, &row))
                    .collect::<Result<Vec<_>, _>>()?
            }
        };
        maps.sort_by(|a, b| a.extent.cmp_chronological(&b.extent));
        Ok(maps)
    }

    /// Registered maps with gap slots between temporally separated maps.
    pub fn maps_with_gaps(&self, kind: DatasetKind, dataset: &DatasetId) -> Result<Vec<MapSlot>, CatalogError> {
        with_gaps(self.registered_maps(kind, dataset, None)?)
    }

    pub fn count_temporal_types(&self, kind: DatasetKind, dataset: &DatasetId) -> Result<TemporalTypeCounts, CatalogError> {
        let maps = self.registered_maps(kind, dataset, None)?;
        Ok(count_temporal_types(maps.iter().map(|m| &m.extent)))
    }

    pub fn count_gaps(&self, kind: DatasetKind, dataset: &DatasetId) -> Result<usize, CatalogError> {
        let maps = self.registered_maps(kind, dataset, None)?;
        let extents: Vec<TimeExtent> = maps.iter().map(|m| m.extent).collect();
        Ok(count_gaps(&extents))
    }

    /// Number of relation entries per kind among the registered maps.
    pub fn count_temporal_relations(
        &self,
        kind: DatasetKind,
        dataset: &DatasetId,
    ) -> Result<BTreeMap<RelationKind, usize>, CatalogError> {
        let maps = self.registered_maps(kind, dataset, None)?;
        let graph = TopologyBuilder::new(TopologyOptions::default()).build::<_, MapRecord>(&maps, None)?;
        Ok(graph.count_relations())
    }

    /// Whether the registered maps form a valid temporal topology for the
    /// dataset's map time. An empty dataset is never valid.
    pub fn check_temporal_topology(&self, kind: DatasetKind, dataset: &DatasetId) -> Result<bool, CatalogError> {
        let ds = self.require_dataset(kind, dataset)?;
        let maps = self.registered_maps(kind, dataset, None)?;
        if maps.is_empty() {
            return Ok(false);
        }
        let map_time = count_temporal_types(maps.iter().map(|m| &m.extent)).map_time();
        if ds.map_time.is_some_and(|t| t != map_time) {
            log::warn!("map time of <{}> is stale, run an update first", ds.id);
        }
        let graph = TopologyBuilder::new(TopologyOptions::default()).build::<_, MapRecord>(&maps, None)?;
        Ok(topology_is_valid(Some(map_time), &graph.count_relations()))
    }
}

/// Recompute the derived fields of `ds` from its start-ordered members.
pub(crate) fn refresh(ds: &mut SpaceTimeDataset, maps: &[MapRecord]) -> Result<(), CatalogError> {
    ds.pending_maps = 0;
    ds.number_of_maps = maps.len();
    ds.revision = ds.revision.wrapping_add(1);
    if maps.is_empty() {
        ds.extent = None;
        ds.spatial = None;
        ds.map_time = None;
        ds.granularity = None;
        return Ok(());
    }
    let extents: Vec<TimeExtent> = maps.iter().map(|m| m.extent).collect();
    let mut span = extents[0].to_instant();
    for ext in &extents[1..] {
        span = span.disjoint_union(&ext.to_instant())?;
    }
    // The end is the latest end time, or the latest start time when that
    // lies after every end time.
    let latest_end = extents.iter().filter_map(TimeExtent::end).reduce(|a, b| if b > a { b } else { a });
    let end = match latest_end {
        Some(e) if e > span.upper() => e,
        _ => span.upper(),
    };
    ds.extent = Some(TimeExtent::new(span.start(), (end != span.start()).then_some(end), ds.relative_unit)?);
    ds.spatial = SpatialExtent::union_all(maps.iter().filter_map(|m| m.spatial.as_ref()));
    let map_time = count_temporal_types(&extents).map_time();
    ds.map_time = Some(map_time);
    ds.granularity = match map_time {
        MapTimeKind::Invalid => None,
        _ => compute_granularity(&extents)?,
    };
    Ok(())
}

fn log_refresh(ds: &SpaceTimeDataset) {
    log::info!(
        "updated <{}>: {} maps, extent {}, granularity {}",
        ds.id,
        ds.number_of_maps,
        ds.extent.map_or_else(|| "none".to_string(), |e| e.to_string()),
        ds.granularity.map_or_else(|| "none".to_string(), |g| g.to_string()),
    );
}

pub(crate) fn check_map_time(map: &MapRecord) -> Result<(), CatalogError> {
    if map.extent.is_valid_for_registration() {
        Ok(())
    } else {
        Err(CatalogError::InvalidMapTime {
            map: map.id.to_string(),
            reason: format!("{} is not an instant or a positive interval", map.extent),
        })
    }
}

/// Temporal type and relative unit of `map` fit `ds`.
fn check_compatible(ds: &SpaceTimeDataset, map: &MapRecord) -> Result<(), CatalogError> {
    if map.temporal_type() != ds.temporal_type {
        return Err(CatalogError::TemporalTypeMismatch {
            dataset: ds.id.to_string(),
            map: map.id.to_string(),
            expected: ds.temporal_type,
            found: map.temporal_type(),
        });
    }
    if let (Some(expected), Some(found)) = (ds.relative_unit, map.extent.unit()) {
        if expected != found {
            return Err(CatalogError::RelativeUnitMismatch {
                dataset: ds.id.to_string(),
                map: map.id.to_string(),
                expected,
                found,
            });
        }
    }
    Ok(())
}

fn without_key(mut row: Row) -> Row {
    row.remove(KEY_COLUMN);
    row
}

pub(crate) fn dataset_update(ds: &SpaceTimeDataset) -> Statement {
    Statement::Update {
        table: ds.kind.table().into(),
        key: ds.id.to_string(),
        values: without_key(ds.to_row()),
    }
}

pub(crate) fn map_update(map: &MapRecord) -> Statement {
    Statement::Update {
        table: map.kind.table().into(),
        key: map.id.to_string(),
        values: without_key(map.to_row()),
    }
}

/// Update of the `registered_stds` column only.
pub(crate) fn map_registrations(map: &MapRecord) -> Statement {
    let mut values = Row::new();
    values.insert("registered_stds".into(), datasets_value(&map.datasets));
    Statement::Update { table: map.kind.table().into(), key: map.id.to_string(), values }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::memory_store::InMemoryStore;
    use crate::time::point::RelativeUnit;

    fn r(s: i64, e: Option<i64>) -> TimeExtent {
        TimeExtent::relative(s, e, RelativeUnit::Days).unwrap()
    }

    fn catalog() -> Catalog<InMemoryStore> {
        Catalog::new(InMemoryStore::new(), CatalogConfig::default()).unwrap()
    }

    fn add_map(cat: &mut Catalog<InMemoryStore>, name: &str, ext: TimeExtent) -> MapId {
        let id = MapId::new(name, None, "PERMANENT").unwrap();
        cat.insert_map(MapRecord::new(id.clone(), MapKind::Raster, ext)).unwrap();
        id
    }

    #[test]
    fn counts_and_gaps() {
        let exts = [r(0, Some(1)), r(2, Some(3)), r(3, None), r(5, Some(5))];
        let counts = count_temporal_types(&exts);
        assert_eq!(counts, TemporalTypeCounts { point: 1, interval: 2, invalid: 1 });
        assert_eq!(counts.map_time(), MapTimeKind::Invalid);
        assert_eq!(count_gaps(&exts[..3]), 1);
    }

    #[test]
    fn register_then_update() {
        let mut cat = catalog();
        let ds = DatasetId::parse("precip@PERMANENT").unwrap();
        cat.create_dataset(ds.clone(), DatasetKind::Strds, TemporalType::Relative, "mean", "", "")
            .unwrap();
        let a = add_map(&mut cat, "a", r(0, Some(1)));
        let b = add_map(&mut cat, "b", r(2, Some(3)));
        assert!(cat.register(DatasetKind::Strds, &ds, &a).unwrap());
        assert!(cat.register(DatasetKind::Strds, &ds, &b).unwrap());
        let pending = cat.require_dataset(DatasetKind::Strds, &ds).unwrap();
        assert_eq!(pending.pending_maps, 2);
        assert_eq!(pending.extent, None);

        let upd = cat.update_from_registered_maps(DatasetKind::Strds, &ds).unwrap();
        assert_eq!(upd.extent, Some(r(0, Some(3))));
        assert_eq!(upd.relative_unit, Some(RelativeUnit::Days));
        assert_eq!(upd.map_time, Some(MapTimeKind::Interval));
        assert_eq!(upd.granularity.map(|g| g.to_string()), Some("1".to_string()));
        assert_eq!(upd.number_of_maps, 2);
        assert_eq!(cat.count_gaps(DatasetKind::Strds, &ds).unwrap(), 1);
        assert!(cat.check_temporal_topology(DatasetKind::Strds, &ds).unwrap());

        let rec = cat.map(MapKind::Raster, &a).unwrap().unwrap();
        assert!(rec.datasets.contains("precip@PERMANENT"));
    }

    #[test]
    fn points_extend_to_latest_start() {
        let mut cat = catalog();
        let ds = DatasetId::parse("p@PERMANENT").unwrap();
        cat.create_dataset(ds.clone(), DatasetKind::Strds, TemporalType::Relative, "mean", "", "")
            .unwrap();
        for (name, ext) in [("a", r(0, Some(2))), ("b", r(5, None))] {
            let id = add_map(&mut cat, name, ext);
            cat.register(DatasetKind::Strds, &ds, &id).unwrap();
        }
        let upd = cat.update_from_registered_maps(DatasetKind::Strds, &ds).unwrap();
        assert_eq!(upd.extent, Some(r(0, Some(5))));
        assert_eq!(upd.map_time, Some(MapTimeKind::Mixed));
    }

    #[test]
    fn other_kind_is_reported() {
        let mut cat = catalog();
        let ds = DatasetId::parse("v@PERMANENT").unwrap();
        cat.create_dataset(ds.clone(), DatasetKind::Stvds, TemporalType::Relative, "mean", "", "")
            .unwrap();
        let a = add_map(&mut cat, "a", r(0, Some(1)));
        let err = cat.register(DatasetKind::Stvds, &ds, &a).unwrap_err();
        assert!(matches!(err, CatalogError::MapKindMismatch { .. }));
        let missing = MapId::parse("nope@PERMANENT").unwrap();
        let err = cat.register(DatasetKind::Stvds, &ds, &missing).unwrap_err();
        assert_eq!(err, CatalogError::MapNotInCatalog("nope@PERMANENT".into()));
    }

    #[test]
    fn topology_rules_by_map_time() {
        let mut counts = BTreeMap::new();
        counts.insert(RelationKind::Follows, 2);
        assert!(topology_is_valid(Some(MapTimeKind::Interval), &counts));
        counts.insert(RelationKind::During, 1);
        assert!(!topology_is_valid(Some(MapTimeKind::Interval), &counts));
        assert!(topology_is_valid(Some(MapTimeKind::Point), &counts));
        assert!(!topology_is_valid(Some(MapTimeKind::Invalid), &BTreeMap::new()));
    }
}
