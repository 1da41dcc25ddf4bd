//! Bulk maintenance of a dataset: shift, snap, rename and delete.
//!
//! Each operation rewrites all affected rows in one batch. Shift and snap
//! stage the refreshed rows of the dataset and of every other dataset
//! sharing one of its maps into that batch, so an ownership or unit
//! conflict in any of them leaves the store untouched.

use std::collections::BTreeSet;

use crate::catalog::catalog::{Catalog, MemberChanges, dataset_update, map_registrations, map_update};
use crate::catalog::dataset::{DatasetKind, SpaceTimeDataset, register_table_name};
use crate::catalog::ident::DatasetId;
use crate::catalog::map_record::MapRecord;
use crate::catalog::store::{Batch, RelationalStore, Statement};
use crate::catalog_error::CatalogError;
use crate::granularity::unit::Granularity;
use crate::time::extent::TimeExtent;

impl<S: RelationalStore> Catalog<S> {
    /// Move every registered map by `by`.
    ///
    /// All shifted extents are computed first; a shift that lands on a
    /// nonexistent calendar date fails without writing anything.
    ///
    /// # Errors
    /// `InvalidGranularity` if `by` does not match the dataset's temporal
    /// type, `InvalidDateArithmetic` from the dry run.
    pub fn shift(&mut self, kind: DatasetKind, dataset: &DatasetId, by: &Granularity) -> Result<SpaceTimeDataset, CatalogError> {
        let ds = self.require_dataset(kind, dataset)?;
        self.config.check_scope(&ds.id.to_string(), ds.id.scope())?;
        if by.temporal_type() != ds.temporal_type {
            return Err(CatalogError::InvalidGranularity(by.to_string()));
        }
        let maps = self.registered_maps(kind, dataset, None)?;
        let shifted = maps
            .iter()
            .map(|m| m.extent.shifted(by))
            .collect::<Result<Vec<_>, _>>()?;
        log::info!("shifting {} maps of <{}> by {by}", maps.len(), ds.id);
        self.rewrite_times(kind, ds, maps, shifted)
    }

    /// Close the gaps between registered maps: every map ends where the next
    /// one starts. The last map keeps its end; if it is an instant it is
    /// extended by the dataset's granularity.
    pub fn snap(&mut self, kind: DatasetKind, dataset: &DatasetId) -> Result<SpaceTimeDataset, CatalogError> {
        let ds = self.require_dataset(kind, dataset)?;
        self.config.check_scope(&ds.id.to_string(), ds.id.scope())?;
        let maps = self.registered_maps(kind, dataset, None)?;
        let mut snapped = Vec::with_capacity(maps.len());
        for (i, map) in maps.iter().enumerate() {
            let ext = map.extent;
            let end = match maps.get(i + 1) {
                Some(next) if next.extent.start() != ext.start() => Some(next.extent.start()),
                Some(_) => ext.end(),
                None => match (ext.end(), ds.granularity.as_ref()) {
                    (Some(e), _) => Some(e),
                    (None, Some(g)) if !g.is_zero() => Some(ext.shifted(g)?.start()),
                    (None, _) => None,
                },
            };
            snapped.push(TimeExtent::new(ext.start(), end, ext.unit())?);
        }
        self.rewrite_times(kind, ds, maps, snapped)
    }

    fn rewrite_times(
        &mut self,
        kind: DatasetKind,
        ds: SpaceTimeDataset,
        maps: Vec<MapRecord>,
        extents: Vec<TimeExtent>,
    ) -> Result<SpaceTimeDataset, CatalogError> {
        let key = ds.id.to_string();
        let mut others = BTreeSet::new();
        let mut changes = MemberChanges::default();
        let mut batch = Batch::new();
        for (mut map, ext) in maps.into_iter().zip(extents) {
            if map.extent == ext {
                continue;
            }
            map.extent = ext;
            others.extend(map.datasets.iter().filter(|d| **d != key).cloned());
            batch.push(map_update(&map));
            changes.change(&map);
        }
        let mut datasets = vec![ds];
        for other in &others {
            match self.dataset(kind, &DatasetId::parse(other)?)? {
                Some(o) => datasets.push(o),
                None => log::warn!("a map of <{key}> lists unknown dataset <{other}>"),
            }
        }
        let refreshed = self.commit_with_refresh(batch, datasets, &changes)?;
        refreshed
            .into_iter()
            .next()
            .ok_or(CatalogError::DatasetNotFound(key))
    }

    /// Give a dataset a new identifier, moving its register table and
    /// updating the memberships of its maps.
    pub fn rename(&mut self, kind: DatasetKind, dataset: &DatasetId, new_id: DatasetId) -> Result<SpaceTimeDataset, CatalogError> {
        let mut ds = self.require_dataset(kind, dataset)?;
        self.config.check_scope(&ds.id.to_string(), ds.id.scope())?;
        self.config.check_scope(&new_id.to_string(), new_id.scope())?;
        if self.dataset(kind, &new_id)?.is_some() {
            return Err(CatalogError::DatasetExists(new_id.to_string()));
        }
        let old_table = self.register_table(&ds)?;
        let maps = self.registered_maps(kind, dataset, None)?;
        let old_key = ds.id.to_string();

        ds.id = new_id;
        let new_table = register_table_name(&ds.id, ds.map_kind());
        ds.register_table = Some(new_table.clone());

        let mut batch = Batch::new();
        batch
            .push(Statement::Delete { table: kind.table().into(), key: old_key.clone() })
            .push(Statement::Insert { table: kind.table().into(), row: ds.to_row() });
        if new_table != old_table {
            batch.push(Statement::RenameTable { from: old_table, to: new_table });
        }
        for mut map in maps {
            map.datasets.remove(&old_key);
            map.datasets.insert(ds.id.to_string());
            batch.push(map_registrations(&map));
        }
        self.execute(&batch)?;
        log::info!("renamed space time dataset <{old_key}> to <{}>", ds.id);
        Ok(ds)
    }

    /// Unregister every map, drop the register table and remove the dataset.
    ///
    /// Returns the dataset in its reset, uncommitted state. The maps stay in
    /// the catalog.
    pub fn delete(&mut self, kind: DatasetKind, dataset: &DatasetId) -> Result<SpaceTimeDataset, CatalogError> {
        let ds = self.require_dataset(kind, dataset)?;
        self.config.check_scope(&ds.id.to_string(), ds.id.scope())?;
        let table = self.register_table(&ds)?;
        let maps = self.registered_maps(kind, dataset, None)?;
        let key = ds.id.to_string();

        let mut batch = Batch::new();
        for mut map in maps {
            map.datasets.remove(&key);
            batch.push(map_registrations(&map));
        }
        batch
            .push(Statement::DropTable { table })
            .push(Statement::Delete { table: kind.table().into(), key: key.clone() });
        self.execute(&batch)?;
        log::info!("deleted space time dataset <{key}>");

        let mut reset = SpaceTimeDataset::new(ds.id, ds.kind, ds.temporal_type);
        reset.semantic_type = ds.semantic_type;
        reset.title = ds.title;
        reset.description = ds.description;
        Ok(reset)
    }

    /// Persist edited descriptive fields of a dataset.
    pub fn update_metadata(&mut self, ds: &SpaceTimeDataset) -> Result<(), CatalogError> {
        self.config.check_scope(&ds.id.to_string(), ds.id.scope())?;
        let mut stored = self.require_dataset(ds.kind, &ds.id)?;
        stored.semantic_type.clone_from(&ds.semantic_type);
        stored.title.clone_from(&ds.title);
        stored.description.clone_from(&ds.description);
        self.execute(&dataset_update(&stored).into())
    }
}
