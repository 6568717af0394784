// Copyright 2025 Crrow
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//      http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use std::{collections::BTreeMap, sync::LazyLock};

use strum::{EnumCount, IntoEnumIterator};

use crate::{
    color::{ColorRole, Rgb},
    palette::{Palette, ThemeProfile},
};

/// Theme served when a lookup names a theme the catalog does not have.
pub const DEFAULT_THEME: &str = "Ocean";

/// Read-only lookup of named themes.
pub trait ThemeCatalog: Send + Sync {
    /// The named theme, or the [`DEFAULT_THEME`] profile if `name` is unknown.
    fn theme(&self, name: &str) -> &ThemeProfile;

    fn exists(&self, name: &str) -> bool;

    /// All theme names in a stable order.
    fn names(&self) -> Vec<&str>;
}

/// The themes shipped with themelink.
#[derive(Debug, Clone, Copy, Default)]
pub struct BuiltinCatalog;

static BUILTIN_THEMES: LazyLock<BTreeMap<String, ThemeProfile>> = LazyLock::new(|| {
    [
        ("Dark", &DARK_DAY, &DARK_NIGHT),
        ("Dark capsule", &DARK_DAY, &DARK_NIGHT),
        ("Ocean", &OCEAN_DAY, &OCEAN_NIGHT),
        ("Arctic", &ARCTIC_DAY, &ARCTIC_NIGHT),
        ("Sunset", &SUNSET_DAY, &SUNSET_NIGHT),
        ("DeepSea", &DEEP_SEA_DAY, &DEEP_SEA_NIGHT),
        ("Storm", &STORM_DAY, &STORM_NIGHT),
    ]
    .into_iter()
    .map(|(name, day, night)| {
        let profile = ThemeProfile::builder()
            .name(name)
            .day(palette(day))
            .night(palette(night))
            .build();
        (name.to_string(), profile)
    })
    .collect()
});

impl ThemeCatalog for BuiltinCatalog {
    fn theme(&self, name: &str) -> &ThemeProfile {
        BUILTIN_THEMES
            .get(name)
            .or_else(|| BUILTIN_THEMES.get(DEFAULT_THEME))
            .unwrap_or_else(|| unreachable!("default theme {DEFAULT_THEME} is always built in"))
    }

    fn exists(&self, name: &str) -> bool { BUILTIN_THEMES.contains_key(name) }

    fn names(&self) -> Vec<&str> { BUILTIN_THEMES.keys().map(String::as_str).collect() }
}

type Table = [(u8, u8, u8); ColorRole::COUNT];

fn palette(table: &Table) -> Palette {
    ColorRole::iter()
        .zip(table.iter().copied())
        .map(|(role, rgb)| (role, Rgb::from(rgb)))
        .collect()
}

// Tables list roles in `ColorRole` declaration order.

const DARK_DAY: Table = [
    // text
    (255, 255, 255), (255, 255, 255), (200, 200, 200), (67, 67, 67),
    // background
    (24, 24, 24), (34, 34, 34), (24, 24, 24), (34, 34, 34), (0, 0, 0),
    // border
    (48, 49, 170), (32, 134, 12), (22, 247, 251), (172, 6, 154),
    // highlight
    (35, 110, 255), (100, 100, 100), (105, 105, 105),
];

const DARK_NIGHT: Table = [
    // text
    (100, 100, 100), (100, 100, 100), (60, 60, 60), (25, 25, 25),
    // background
    (6, 6, 6), (8, 8, 8), (6, 6, 6), (8, 8, 8), (0, 0, 0),
    // border
    (12, 12, 42), (8, 33, 3), (5, 60, 62), (43, 1, 38),
    // highlight
    (8, 27, 63), (30, 30, 30), (12, 12, 12),
];

const OCEAN_DAY: Table = [
    // text
    (255, 255, 255), (21, 37, 55), (200, 200, 200), (105, 105, 105),
    // background
    (21, 37, 55), (18, 32, 47), (21, 37, 55), (38, 60, 84), (10, 18, 28),
    // border
    (48, 49, 170), (32, 134, 12), (22, 247, 251), (172, 6, 154),
    // highlight
    (11, 197, 209), (100, 100, 100), (60, 60, 60),
];

const OCEAN_NIGHT: Table = [
    // text
    (100, 100, 100), (8, 14, 20), (60, 60, 60), (25, 25, 25),
    // background
    (5, 9, 13), (4, 7, 10), (5, 9, 13), (9, 15, 21), (3, 6, 9),
    // border
    (12, 12, 42), (8, 33, 3), (5, 60, 62), (43, 1, 38),
    // highlight
    (3, 49, 52), (30, 30, 30), (11, 11, 11),
];

const ARCTIC_DAY: Table = [
    // text
    (255, 255, 255), (15, 45, 75), (200, 200, 200), (18, 18, 18),
    // background
    (15, 45, 75), (12, 36, 60), (15, 45, 75), (25, 55, 85), (10, 30, 50),
    // border
    (0, 120, 255), (0, 255, 255), (100, 200, 255), (200, 100, 255),
    // highlight
    (0, 180, 255), (100, 100, 100), (145, 145, 145),
];

const ARCTIC_NIGHT: Table = [
    // text
    (100, 100, 100), (3, 11, 18), (60, 60, 60), (25, 25, 25),
    // background
    (3, 11, 18), (3, 9, 15), (3, 11, 18), (6, 13, 21), (2, 7, 12),
    // border
    (0, 30, 63), (0, 63, 63), (25, 50, 63), (50, 25, 63),
    // highlight
    (0, 45, 63), (30, 30, 30), (36, 36, 36),
];

const SUNSET_DAY: Table = [
    // text
    (255, 255, 255), (80, 30, 20), (200, 200, 200), (18, 18, 18),
    // background
    (80, 30, 20), (60, 25, 18), (80, 30, 20), (100, 40, 30), (40, 15, 10),
    // border
    (255, 100, 0), (255, 200, 0), (255, 120, 50), (200, 50, 100),
    // highlight
    (255, 140, 0), (100, 100, 100), (145, 145, 145),
];

const SUNSET_NIGHT: Table = [
    // text
    (100, 100, 100), (20, 7, 5), (60, 60, 60), (25, 25, 25),
    // background
    (20, 7, 5), (15, 6, 4), (20, 7, 5), (25, 10, 7), (10, 3, 2),
    // border
    (63, 25, 0), (63, 50, 0), (63, 30, 12), (50, 12, 25),
    // highlight
    (63, 35, 0), (30, 30, 30), (36, 36, 36),
];

const DEEP_SEA_DAY: Table = [
    // text
    (255, 255, 255), (10, 50, 40), (200, 200, 200), (18, 18, 18),
    // background
    (10, 50, 40), (8, 40, 32), (10, 50, 40), (15, 60, 48), (5, 25, 20),
    // border
    (0, 200, 150), (0, 255, 100), (0, 255, 200), (100, 200, 255),
    // highlight
    (0, 220, 180), (100, 100, 100), (145, 145, 145),
];

const DEEP_SEA_NIGHT: Table = [
    // text
    (100, 100, 100), (2, 12, 10), (60, 60, 60), (25, 25, 25),
    // background
    (2, 12, 10), (2, 10, 8), (2, 12, 10), (3, 15, 12), (1, 6, 5),
    // border
    (0, 50, 37), (0, 63, 25), (0, 63, 50), (25, 50, 63),
    // highlight
    (0, 55, 45), (30, 30, 30), (36, 36, 36),
];

const STORM_DAY: Table = [
    // text
    (255, 255, 255), (40, 35, 50), (200, 200, 200), (18, 18, 18),
    // background
    (40, 35, 50), (32, 28, 40), (40, 35, 50), (48, 42, 60), (20, 17, 25),
    // border
    (150, 100, 255), (100, 150, 255), (180, 100, 255), (255, 100, 200),
    // highlight
    (160, 120, 255), (100, 100, 100), (145, 145, 145),
];

const STORM_NIGHT: Table = [
    // text
    (100, 100, 100), (10, 8, 12), (60, 60, 60), (25, 25, 25),
    // background
    (10, 8, 12), (8, 7, 10), (10, 8, 12), (12, 10, 15), (5, 4, 6),
    // border
    (37, 25, 63), (25, 37, 63), (45, 25, 63), (63, 25, 50),
    // highlight
    (40, 30, 63), (30, 30, 30), (36, 36, 36),
];

#[cfg(test)]
mod tests {
    use super::*;
    use crate::color::ThemeMode;

    #[test]
    fn seven_sorted_names() {
        assert_eq!(
            BuiltinCatalog.names(),
            vec!["Arctic", "Dark", "Dark capsule", "DeepSea", "Ocean", "Storm", "Sunset"]
        );
    }

    #[test]
    fn every_palette_is_complete() {
        for name in BuiltinCatalog.names() {
            let profile = BuiltinCatalog.theme(name);
            assert_eq!(profile.name, name);
            assert!(profile.day.is_complete(), "{name} day");
            assert!(profile.night.is_complete(), "{name} night");
        }
    }

    #[test]
    fn ocean_reference_colors() {
        let ocean = BuiltinCatalog.theme("Ocean");
        assert_eq!(ocean.palette(ThemeMode::Day).get(ColorRole::Background1), Rgb::new(21, 37, 55));
        assert_eq!(
            ocean.palette(ThemeMode::Night).get(ColorRole::HighlightPrimary),
            Rgb::new(3, 49, 52)
        );
    }

    #[test]
    fn unknown_name_resolves_to_default() {
        assert!(!BuiltinCatalog.exists("DoesNotExist"));
        assert_eq!(BuiltinCatalog.theme("DoesNotExist").name, DEFAULT_THEME);
        // names are case-sensitive
        assert!(!BuiltinCatalog.exists("ocean"));
    }

    #[test]
    fn dark_capsule_shares_dark_tables() {
        let dark = BuiltinCatalog.theme("Dark");
        let capsule = BuiltinCatalog.theme("Dark capsule");
        assert_eq!(dark.day, capsule.day);
        assert_eq!(dark.night, capsule.night);
        assert_ne!(dark.name, capsule.name);
    }
}
