//! Build items for every date found under a dataset's prefix.

use storage::ObjectStorage;
use tracing::{info, instrument, warn};

use crate::definition::{CompiledDefinition, DatasetDefinition, ItemGroup};
use crate::error::Result;
use crate::item::{build_item, AssetInfo, Item};

pub struct CatalogBuilder {
    definition: DatasetDefinition,
    compiled: CompiledDefinition,
    storage: ObjectStorage,
}

impl CatalogBuilder {
    pub fn new(definition: DatasetDefinition, storage: ObjectStorage) -> Result<Self> {
        let compiled = definition.compile()?;
        Ok(Self {
            definition,
            compiled,
            storage,
        })
    }

    pub fn definition(&self) -> &DatasetDefinition {
        &self.definition
    }

    /// `<collection>-<date token>`
    pub fn item_id(&self, group: &ItemGroup) -> String {
        format!("{}-{}", self.definition.collection, group.date_key)
    }

    pub async fn discover(&self) -> Result<Vec<ItemGroup>> {
        self.compiled
            .discover(&self.storage, &self.definition.prefix)
            .await
    }

    /// Read each asset COG and assemble the item.
    #[instrument(skip(self, group), fields(date = %group.date_key))]
    pub async fn build(&self, group: &ItemGroup) -> Result<Item> {
        let mut assets = Vec::with_capacity(group.assets.len());
        for (name, key) in &group.assets {
            let bytes = self.storage.get(key).await?;
            let raster = cog::read_geotiff(key, &bytes)?;
            let mut info = AssetInfo::from_raster(self.storage.uri(key), &raster)?;
            if let Some(def) = self.definition.assets.get(name) {
                info = info.with_text(&def.title, &def.description);
            }
            assets.push((name.clone(), info));
        }

        build_item(
            &self.item_id(group),
            &self.definition.collection,
            &group.date_key,
            self.definition.datetime_range,
            assets,
            &self.definition.properties,
        )
    }

    /// Items for every discovered date, in date order.
    pub async fn build_all(&self) -> Result<Vec<Item>> {
        let groups = self.discover().await?;
        let mut items = Vec::with_capacity(groups.len());
        for group in &groups {
            if group.assets.is_empty() {
                warn!(date = %group.date_key, "No assets, skipping item");
                continue;
            }
            items.push(self.build(group).await?);
        }
        info!(
            collection = %self.definition.collection,
            items = items.len(),
            "Built catalog items"
        );
        Ok(items)
    }
}
