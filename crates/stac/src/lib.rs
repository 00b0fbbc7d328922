//! STAC catalog items for converted COGs.
//!
//! A [`DatasetDefinition`] names the collection, the object-store prefix
//! and the regexes that pick asset files and their date token.
//! [`CatalogBuilder`] turns each date into an [`Item`] whose footprint,
//! projection and band statistics are read from the COGs themselves;
//! [`StacPublisher`] sends items to the ingestion API.

pub mod catalog;
pub mod definition;
pub mod error;
pub mod item;
pub mod publish;

pub use catalog::CatalogBuilder;
pub use definition::{AssetDefinition, CompiledDefinition, DatasetDefinition, ItemGroup};
pub use error::{Result, StacError};
pub use item::{build_item, datetime_properties, Asset, AssetInfo, Geometry, Item, Link};
pub use publish::{write_items, PublishOutcome, PublisherConfig, StacPublisher};
