//! Property tests for ownership bookkeeping, the sea level and map files.

use proptest::prelude::*;

use tideline::{
    authority::Actor,
    clock::WorldClock,
    hex::TerrainType,
    map_file,
    mapgen,
    scenario::MapSettings,
    territory::{NationId, TerritoryDirectory, MAX_NATIONS, UNOWNED},
    tiles::{TileId, TileRegistry, TileState},
};

const TILES: u32 = 12;

fn registry() -> TileRegistry {
    let states = (0..TILES)
        .map(|_| TileState::land(TerrainType::Grassland, 2))
        .collect();
    TileRegistry::new(TILES, 1, states)
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(256))]

    /// Every tile is in exactly one nation's cell set, and the tile's owner
    /// field agrees with the directory.
    #[test]
    fn prop_transfers_keep_ownership_exclusive(
        moves in prop::collection::vec((0..TILES, 0..=MAX_NATIONS), 0..64)
    ) {
        let mut tiles = registry();
        for (tile, to) in moves {
            tiles.transfer_ownership(tile, to, Actor::Server).unwrap();
        }
        let territory = tiles.territory();
        prop_assert!(territory.is_consistent());
        for tile in 0..TILES {
            let owner = tiles.get(tile).unwrap().nation;
            prop_assert_eq!(territory.owner_of(tile), owner);
            let holders = (1..=MAX_NATIONS)
                .filter(|&n| territory.cells_of(n).any(|t| t == tile))
                .count();
            prop_assert_eq!(holders, usize::from(owner != UNOWNED));
        }
    }

    /// A reassignment naming the wrong previous owner changes nothing.
    #[test]
    fn prop_stale_reassign_is_rejected(
        moves in prop::collection::vec((0..TILES, 0..=MAX_NATIONS, 0..=MAX_NATIONS), 0..64)
    ) {
        let mut directory = TerritoryDirectory::new();
        let mut owners: Vec<NationId> = vec![UNOWNED; TILES as usize];
        for (tile, from, to) in moves {
            let before = directory.owner_of(tile);
            match directory.reassign(tile as TileId, from, to) {
                Ok(()) => {
                    prop_assert_eq!(before, from);
                    owners[tile as usize] = to;
                }
                Err(_) => {
                    prop_assert_ne!(before, from);
                    prop_assert_eq!(directory.owner_of(tile), before);
                }
            }
            prop_assert!(directory.is_consistent());
        }
        for (tile, owner) in owners.iter().enumerate() {
            prop_assert_eq!(directory.owner_of(tile as TileId), *owner);
        }
    }

    /// The sea level never drops and rises by at most one per check.
    #[test]
    fn prop_sea_level_is_monotonic(
        totals in prop::collection::vec(0.0f64..1_000.0, 1..40),
        divisor in 0.5f64..4.0
    ) {
        let mut clock = WorldClock::new(vec![60.0, 150.0, 300.0, 600.0], divisor);
        let mut previous = clock.sea_level();
        for total in totals {
            let raised = clock.check(total);
            let level = clock.sea_level();
            prop_assert!(level >= previous);
            prop_assert!(level - previous <= 1);
            prop_assert_eq!(raised.is_some(), level > previous);
            previous = level;
        }
        prop_assert!(previous <= 4);
    }

    /// Any generated map survives a save and load unchanged.
    #[test]
    fn prop_generated_maps_reload(seed in any::<u64>(), nations in 1u8..=4) {
        let settings = MapSettings {
            width: 9,
            height: 7,
            water_ratio: 0.3,
            nations,
        };
        let states = mapgen::generate(&settings, seed);
        let tiles = TileRegistry::new(settings.width, settings.height, states.clone());
        let bytes = map_file::save(&tiles);
        prop_assert_eq!(bytes.len(), map_file::HEADER_BYTES + states.len() * map_file::TILE_BYTES);
        let loaded = map_file::load(&bytes, states.len()).unwrap();
        prop_assert_eq!(loaded, states);
    }
}
