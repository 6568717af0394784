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

use crate::{
    color::{ColorRole, Rgb, ThemeMode},
    registry::{CallbackId, ThemeCallback},
};

/// What a module sees of the active theme, whether it owns the state
/// ([`ThemeProvider`](crate::ThemeProvider)) or follows it
/// ([`ThemeBridge`](crate::ThemeBridge)).
///
/// Every method returns immediately and never fails.
pub trait ThemeApi: Send + Sync {
    /// Color for `role` in the active palette, neutral gray if undefined.
    fn color(&self, role: ColorRole) -> Rgb;

    fn mode(&self) -> ThemeMode;

    fn theme_name(&self) -> String;

    /// Register a closure run after every theme or mode change.
    fn add_change_callback(&self, callback: ThemeCallback) -> CallbackId;

    /// Unknown ids are ignored.
    fn remove_change_callback(&self, id: CallbackId);
}
