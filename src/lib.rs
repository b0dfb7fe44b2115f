#![doc = include_str!("../README.md")]
#![warn(missing_docs)]

pub mod asset;
pub mod config;
pub mod error;
pub mod factory;
pub mod paths;
pub mod repository;

pub use asset::{
    Asset, AssetCollection, AssetNode, AssetSource, DeferredAsset, DeferredAssetCollection,
    DeferredAssetName, GlobAsset, ResolvedNode,
};
pub use config::{ResolverConfig, RootLayout};
pub use error::{AssetError, AssetResult};
pub use factory::{AssetFactory, AssetName, AssetOptions};
pub use repository::{InMemoryRepository, Repository, Resource};
