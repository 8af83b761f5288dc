use std::fmt;

use serde::{Deserialize, Serialize};

/// Supported runtime families — strongly typed, no magic strings.
///
/// A family is an independently versioned DLL set; two families may be
/// deployed side by side in the same game directory because their
/// payload filenames never overlap (see `tables_are_disjoint` test).
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "kebab-case")]
pub enum ComponentFamily {
    Dxvk,
    Vkd3dProton,
}

/// DLL names shipped by the Direct3D 8-11 translation layer.
const DXVK_PAYLOAD: &[&str] = &["d3d8.dll", "d3d9.dll", "d3d10core.dll", "d3d11.dll", "dxgi.dll"];

/// DLL names shipped by the Direct3D 12 translation layer.
const VKD3D_PAYLOAD: &[&str] = &["d3d12.dll", "d3d12core.dll"];

impl ComponentFamily {
    pub const ALL: [ComponentFamily; 2] = [ComponentFamily::Dxvk, ComponentFamily::Vkd3dProton];

    /// Stable identifier used in manifests, cache paths, and release URLs.
    pub fn id(&self) -> &'static str {
        match self {
            ComponentFamily::Dxvk => "dxvk",
            ComponentFamily::Vkd3dProton => "vkd3d-proton",
        }
    }

    pub fn from_id(id: &str) -> Option<ComponentFamily> {
        ComponentFamily::ALL.into_iter().find(|f| f.id() == id)
    }

    /// Filenames that constitute one installed version of this family.
    pub fn payload_names(&self) -> &'static [&'static str] {
        match self {
            ComponentFamily::Dxvk => DXVK_PAYLOAD,
            ComponentFamily::Vkd3dProton => VKD3D_PAYLOAD,
        }
    }

    /// The single authoritative ownership partition: which family, if
    /// any, claims a filename. Every ownership decision in install,
    /// uninstall, integrity checking, and untracked-file detection goes
    /// through here.
    pub fn owning(filename: &str) -> Option<ComponentFamily> {
        let lower = filename.to_ascii_lowercase();
        ComponentFamily::ALL
            .into_iter()
            .find(|family| family.payload_names().contains(&lower.as_str()))
    }
}

impl fmt::Display for ComponentFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}
