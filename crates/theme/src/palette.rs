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

use strum::{EnumCount, IntoEnumIterator};

use crate::color::{ColorRole, NEUTRAL_GRAY, Rgb, ThemeMode};

/// Colors for one mode of one theme, indexed by role.
///
/// A palette may leave roles undefined. Lookups never fail: an undefined role
/// resolves to [`NEUTRAL_GRAY`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Palette {
    colors: [Option<Rgb>; ColorRole::COUNT],
}

impl Default for Palette {
    fn default() -> Self { Self::empty() }
}

impl Palette {
    #[must_use]
    pub const fn empty() -> Self {
        Self {
            colors: [None; ColorRole::COUNT],
        }
    }

    /// The palette a consumer paints with before it has found a provider.
    #[must_use]
    pub fn fallback() -> Self {
        [
            (ColorRole::TextPrimary, Rgb::new(255, 255, 255)),
            (ColorRole::TextSecondary, Rgb::new(200, 200, 200)),
            (ColorRole::TextDisabled, Rgb::new(128, 128, 128)),
            (ColorRole::Background1, Rgb::new(24, 24, 24)),
            (ColorRole::Background2, Rgb::new(34, 34, 34)),
        ]
        .into_iter()
        .collect()
    }

    #[must_use]
    pub fn get(&self, role: ColorRole) -> Rgb { self.try_get(role).unwrap_or(NEUTRAL_GRAY) }

    #[must_use]
    pub const fn try_get(&self, role: ColorRole) -> Option<Rgb> { self.colors[role.index()] }

    pub const fn set(&mut self, role: ColorRole, color: Rgb) { self.colors[role.index()] = Some(color); }

    /// True when every role has a color.
    #[must_use]
    pub fn is_complete(&self) -> bool { self.colors.iter().all(Option::is_some) }

    /// Defined entries in role order.
    pub fn iter(&self) -> impl Iterator<Item = (ColorRole, Rgb)> + '_ {
        ColorRole::iter().filter_map(|role| self.try_get(role).map(|c| (role, c)))
    }
}

impl FromIterator<(ColorRole, Rgb)> for Palette {
    fn from_iter<I: IntoIterator<Item = (ColorRole, Rgb)>>(iter: I) -> Self {
        let mut palette = Self::empty();
        for (role, color) in iter {
            palette.set(role, color);
        }
        palette
    }
}

/// A named theme with one palette per mode. The name is its identity.
#[derive(Debug, Clone, PartialEq, Eq, bon::Builder)]
pub struct ThemeProfile {
    #[builder(into)]
    pub name:  String,
    pub day:   Palette,
    pub night: Palette,
}

impl ThemeProfile {
    #[must_use]
    pub const fn palette(&self, mode: ThemeMode) -> &Palette {
        match mode {
            ThemeMode::Day => &self.day,
            ThemeMode::Night => &self.night,
        }
    }
}
