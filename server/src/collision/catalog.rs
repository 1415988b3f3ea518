// world_server_core/server/src/collision/catalog.rs
use super::model_instance::ModelSpawn;
use crate::core::error::ServerResult;
use crate::core::types::MapId;
use bytes::{Buf, BufMut, Bytes, BytesMut};
use dashmap::DashMap;
use std::path::Path;
use tracing::{debug, info, warn};

/// Raw catalog tiles keyed by (map, tile x, tile y). Decoding happens when a
/// map streams the tile in.
#[derive(Default)]
pub struct GeometryCatalog {
    tiles: DashMap<(MapId, u32, u32), Bytes>,
}

impl GeometryCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_tile(&self, map_id: MapId, tile_x: u32, tile_y: u32, data: Bytes) {
        self.tiles.insert((map_id, tile_x, tile_y), data);
    }

    pub fn insert_spawns(&self, map_id: MapId, tile_x: u32, tile_y: u32, spawns: &[ModelSpawn]) {
        self.insert_tile(map_id, tile_x, tile_y, write_tile(spawns));
    }

    pub fn tile(&self, map_id: MapId, tile_x: u32, tile_y: u32) -> Option<Bytes> {
        self.tiles.get(&(map_id, tile_x, tile_y)).map(|t| t.value().clone())
    }

    pub fn has_tile(&self, map_id: MapId, tile_x: u32, tile_y: u32) -> bool {
        self.tiles.contains_key(&(map_id, tile_x, tile_y))
    }

    pub fn has_map(&self, map_id: MapId) -> bool {
        self.tiles.iter().any(|t| t.key().0 == map_id)
    }

    pub fn tile_count(&self) -> usize {
        self.tiles.len()
    }

    /// Loads every `MMMM_XX_YY.vmtile` file in `dir`.
    pub fn load_directory(dir: impl AsRef<Path>) -> ServerResult<Self> {
        let catalog = GeometryCatalog::new();
        let dir = dir.as_ref();
        if !dir.is_dir() {
            warn!("Geometry directory {} missing, collision disabled", dir.display());
            return Ok(catalog);
        }
        for entry in std::fs::read_dir(dir)? {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some("vmtile") {
                continue;
            }
            let stem = path.file_stem().and_then(|s| s.to_str()).unwrap_or_default();
            let parts: Vec<u32> = stem.split('_').filter_map(|p| p.parse().ok()).collect();
            if parts.len() != 3 {
                warn!("Skipping oddly named tile file {}", path.display());
                continue;
            }
            let data = std::fs::read(&path)?;
            catalog.insert_tile(parts[0], parts[1], parts[2], Bytes::from(data));
        }
        info!("Geometry catalog loaded: {} tiles from {}", catalog.tile_count(), dir.display());
        Ok(catalog)
    }
}

/// Decodes a tile. A malformed record ends the tile; earlier spawns are kept.
pub fn read_tile(mut data: Bytes) -> Vec<ModelSpawn> {
    if data.remaining() < 4 {
        warn!("Geometry tile shorter than its header ({} bytes)", data.remaining());
        return Vec::new();
    }
    let count = data.get_u32_le() as usize;
    let mut spawns = Vec::with_capacity(count.min(4096));
    for i in 0..count {
        match ModelSpawn::read(&mut data) {
            Ok(spawn) => spawns.push(spawn),
            Err(e) => {
                warn!("Geometry tile record {} of {} unreadable: {}", i, count, e);
                break;
            }
        }
    }
    debug!("Decoded {} model spawns", spawns.len());
    spawns
}

pub fn write_tile(spawns: &[ModelSpawn]) -> Bytes {
    let mut buf = BytesMut::new();
    buf.put_u32_le(spawns.len() as u32);
    for spawn in spawns {
        spawn.write(&mut buf);
    }
    buf.freeze()
}
